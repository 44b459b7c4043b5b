// Map region layout:
//
//   [tile_count][layer_count][map_w u16][map_h u16]
//   [spawn_x u16][spawn_y u16]                      0xFFFF when unset
//   [tile_blob_size u16]
//   [layer_mode ...]                                one per layer
//   [tile blob]                                     4bpp RLE, 256 px each
//   [layer ...]                                     back to back
//   [entity_count][kind, x, y, group ...]
//
// A layer_mode byte holds the encoding in bits 0-1 and sets bit 7 when the
// layer's cells carry flip bits. Tiles in the blob are back to back; a
// reader finds tile n by decoding the n tiles before it.

use log::warn;
use spritecodec::{
    bytes::{push_u16, ByteReader},
    rle,
};
use tilepack::{
    decode_layer, BuiltLevel, CellPacking, Entity, LayerMode, TILE_PIXELS,
};

use crate::{count8, offset16, region::Region, Error};

pub const MAP_REGION_SIZE: usize = 4096;

const NO_SPAWN: u16 = 0xFFFF;
const TILE_BPP: u8 = 4;
const FLIP_BITS_FLAG: u8 = 0x80;
const MODE_MASK: u8 = 0x03;

fn mode_byte(mode: LayerMode, packing: CellPacking) -> u8 {
    let flag = match packing {
        CellPacking::Flattened => 0,
        CellPacking::FlipBits => FLIP_BITS_FLAG,
    };
    mode as u8 | flag
}

fn parse_mode_byte(b: u8) -> Result<(LayerMode, CellPacking), Error> {
    let mode = LayerMode::from_byte(b & MODE_MASK)
        .ok_or(Error::UnknownLayerMode(b))?;
    let packing = if b & FLIP_BITS_FLAG != 0 {
        CellPacking::FlipBits
    } else {
        CellPacking::Flattened
    };
    Ok((mode, packing))
}

pub fn pack_map(level: &BuiltLevel) -> Result<Region, Error> {
    let tiles = level.pool.tiles();
    let stored = tiles.len().min(u8::MAX as usize);
    if stored < tiles.len() {
        warn!(
            "map: only the first {stored} of {} runtime tiles are stored",
            tiles.len()
        );
    }

    let blob = tiles[..stored]
        .iter()
        .flat_map(|tile| rle::encode(tile, TILE_BPP))
        .collect::<Vec<_>>();

    let mut out = vec![stored as u8, count8("layers", level.layers.len())?];
    push_u16(&mut out, level.width as u16);
    push_u16(&mut out, level.height as u16);
    let (sx, sy) = level.spawn.unwrap_or((NO_SPAWN, NO_SPAWN));
    push_u16(&mut out, sx);
    push_u16(&mut out, sy);
    push_u16(&mut out, offset16("tile blob", blob.len())?);
    out.extend(
        level
            .layers
            .iter()
            .map(|layer| mode_byte(layer.encoded.mode, layer.packing)),
    );

    out.extend(blob);
    for layer in &level.layers {
        out.extend(&layer.encoded.bytes);
    }

    out.push(count8("entities", level.entities.len())?);
    out.extend(level.entities.iter().flat_map(|e| e.to_bytes()));

    Ok(Region::new("map", MAP_REGION_SIZE, out))
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnpackedLayer {
    pub mode: LayerMode,
    pub packing: CellPacking,
    pub cells: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnpackedMap {
    pub width: usize,
    pub height: usize,
    pub spawn: Option<(u16, u16)>,
    pub tiles: Vec<Vec<u8>>,
    pub layers: Vec<UnpackedLayer>,
    pub entities: Vec<Entity>,
}

/// Read a map region back. Trailing padding is ignored.
pub fn unpack_map(data: &[u8]) -> Result<UnpackedMap, Error> {
    let mut r = ByteReader::new(data);
    let tile_count = r.u8("tile count")? as usize;
    let layer_count = r.u8("layer count")? as usize;
    let width = r.u16("map width")? as usize;
    let height = r.u16("map height")? as usize;
    let sx = r.u16("spawn x")?;
    let sy = r.u16("spawn y")?;
    let spawn = (sx != NO_SPAWN || sy != NO_SPAWN).then_some((sx, sy));
    let blob_size = r.u16("tile blob size")? as usize;

    let modes = r
        .bytes(layer_count, "layer modes")?
        .iter()
        .map(|&b| parse_mode_byte(b))
        .collect::<Result<Vec<_>, _>>()?;

    let mut blob = ByteReader::new(r.bytes(blob_size, "tile blob")?);
    let tiles = (0..tile_count)
        .map(|_| {
            let (pixels, used) =
                rle::decode_exact(blob.rest(), TILE_BPP, TILE_PIXELS)?;
            blob.skip(used);
            Ok(pixels)
        })
        .collect::<Result<Vec<_>, Error>>()?;
    if !blob.rest().is_empty() {
        warn!(
            "map: {} unused bytes at the end of the tile blob",
            blob.rest().len()
        );
    }

    let mut layers = Vec::with_capacity(layer_count);
    for (mode, packing) in modes {
        let (cells, used) = decode_layer(mode, r.rest(), width, height)?;
        r.skip(used);
        layers.push(UnpackedLayer {
            mode,
            packing,
            cells,
        });
    }

    let entity_count = r.u8("entity count")? as usize;
    let entities = (0..entity_count)
        .map(|_| {
            let [kind, x, y, group] = r.array::<4>("entity")?;
            Ok(Entity { kind, x, y, group })
        })
        .collect::<Result<Vec<_>, Error>>()?;

    Ok(UnpackedMap {
        width,
        height,
        spawn,
        tiles,
        layers,
        entities,
    })
}
