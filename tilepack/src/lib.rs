// Tile and map packing.
//
// Source art comes in as a tileset image of 16x16 tiles. Levels reference
// those tiles with a rotation and flips; every distinct transformed
// appearance becomes one runtime tile, and each map layer is stored as a grid
// of one-byte cells pointing into that pool.

use thiserror::Error;

pub mod layer;
pub mod level;
pub mod pool;
pub mod remap;
pub mod slice;
pub mod transform;

pub use layer::{decode_layer, encode_layer, EncodedLayer, LayerMode};
pub use level::{
    build_level, BuiltLayer, BuiltLevel, CellPacking, Entity, LayerGeometry,
    LevelGeometry, TileRef,
};
pub use pool::TilePool;
pub use remap::BandPalette;
pub use slice::{
    slice_tileset, slice_tileset_indexed, SlicedTileset, SourceTile,
};
pub use transform::Transform;

/// Width and height of a tile, in pixels.
pub const TILE_SIZE: usize = 16;
pub const TILE_PIXELS: usize = TILE_SIZE * TILE_SIZE;

/// Runtime tiles addressable from a 6-bit cell (id 0 means empty).
pub const SPRITE_POOL_LIMIT: usize = 64;
/// Runtime tiles addressable from a full-byte cell (id 0 means empty).
pub const AUX_POOL_LIMIT: usize = 256;

#[derive(Error, Debug)]
pub enum Error {
    #[error("tileset is {width}x{height}, both must be multiples of {TILE_SIZE}")]
    BadDimensions { width: u32, height: u32 },
    #[error("tile has {0} pixels, expected a square of {TILE_PIXELS}")]
    NotSquare(usize),
    #[error("map must be at least 1x1 and at most 65535x65535 (got {width}x{height})")]
    BadMapSize { width: usize, height: usize },
    #[error("layer {layer} has {actual} cells, expected {expected}")]
    LayerSize {
        layer: usize,
        expected: usize,
        actual: usize,
    },
    #[error("level has no layers")]
    NoLayers,

    #[error("error processing image")]
    ImageError(#[from] image::ImageError),
}
