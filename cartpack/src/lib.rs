// Assembles encoded sprites and map data into the two fixed-size memory
// regions the runtime reads from.

use thiserror::Error;

pub mod manifest;
pub mod map;
pub mod region;
pub mod sprites;

pub use manifest::{body_anchors, Manifest};
pub use map::{
    pack_map, unpack_map, UnpackedLayer, UnpackedMap, MAP_REGION_SIZE,
};
pub use region::Region;
pub use sprites::{
    pack_sprites, unpack_sprites, PackedSprites, UnpackedSprites,
    SPRITE_REGION_SIZE,
};

#[derive(Error, Debug)]
pub enum Error {
    #[error("{count} {what} do not fit in a one-byte count")]
    TooMany { what: &'static str, count: usize },
    #[error(
        "animation {name:?} is {width}x{height}, but the cell size is \
         {cell_width}x{cell_height}"
    )]
    CellMismatch {
        name: String,
        width: usize,
        height: usize,
        cell_width: usize,
        cell_height: usize,
    },
    #[error("{what} offset {offset} does not fit in 16 bits")]
    OffsetOverflow { what: &'static str, offset: usize },
    #[error("unknown layer mode byte {0:#04x}")]
    UnknownLayerMode(u8),

    #[error("error encoding animation")]
    Sprite(#[from] spritecodec::Error),
    #[error("error building level")]
    Level(#[from] tilepack::Error),
    #[error("malformed region data")]
    Decode(#[from] spritecodec::DecodeError),
}

fn offset16(what: &'static str, offset: usize) -> Result<u16, Error> {
    u16::try_from(offset).map_err(|_| Error::OffsetOverflow { what, offset })
}

fn count8(what: &'static str, count: usize) -> Result<u8, Error> {
    u8::try_from(count).map_err(|_| Error::TooMany { what, count })
}
