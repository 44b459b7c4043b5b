// Level geometry in, runtime tiles and encoded layers out.

use std::collections::{BTreeSet, HashMap};

use log::{debug, info, warn};

use crate::{
    layer::{encode_layer, EncodedLayer},
    pool::TilePool,
    remap::BandPalette,
    slice::SourceTile,
    transform::Transform,
    Error, AUX_POOL_LIMIT, SPRITE_POOL_LIMIT, TILE_SIZE,
};

/// One placed tile: an index into the sliced tileset plus how to orient it.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TileRef {
    pub tile: usize,
    pub transform: Transform,
}

impl TileRef {
    pub fn new(tile: usize, transform: Transform) -> Self {
        Self { tile, transform }
    }
}

/// How a layer's cells address the runtime tile pool.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum CellPacking {
    /// The cell is the id of the fully transformed tile.
    #[default]
    Flattened,
    /// Bits 0-5 hold the id of the unrotated or quarter-turned tile, bit 6
    /// asks for a horizontal flip and bit 7 for a vertical one.
    FlipBits,
}

impl CellPacking {
    pub fn max_id(self) -> usize {
        match self {
            Self::Flattened => AUX_POOL_LIMIT - 1,
            Self::FlipBits => SPRITE_POOL_LIMIT - 1,
        }
    }

    fn cell(
        self,
        pool: &mut TilePool,
        base: &[u8],
        r: TileRef,
        flags: u8,
    ) -> Result<u8, Error> {
        let (variant, fx, fy) = match self {
            Self::Flattened => (r.transform, false, false),
            Self::FlipBits => r.transform.split_flips(),
        };

        let pixels = variant.apply(base, TILE_SIZE)?;
        let (id, _) = pool.insert(pixels, flags);
        if id > self.max_id() {
            warn!(
                "runtime tile {id} for tile {} does not fit a {self:?} cell, \
                 leaving it empty",
                r.tile
            );
            return Ok(0);
        }

        Ok((id as u8) | (fx as u8) << 6 | (fy as u8) << 7)
    }
}

#[derive(Clone, Debug)]
pub struct LayerGeometry {
    // INVARIANT: cells.len() == width * height of the owning level
    pub cells: Vec<Option<TileRef>>,
    pub packing: CellPacking,
    /// Parallax factor relative to the camera; 1.0 scrolls with the world.
    pub scroll: f32,
}

impl LayerGeometry {
    pub fn new(cells: Vec<Option<TileRef>>) -> Self {
        Self {
            cells,
            packing: CellPacking::default(),
            scroll: 1.0,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Entity {
    pub kind: u8,
    pub x: u8,
    pub y: u8,
    pub group: u8,
}

impl Entity {
    pub fn to_bytes(self) -> [u8; 4] {
        [self.kind, self.x, self.y, self.group]
    }
}

#[derive(Clone, Debug)]
pub struct LevelGeometry {
    pub width: usize,
    pub height: usize,
    pub layers: Vec<LayerGeometry>,
    pub spawn: Option<(u16, u16)>,
    /// Editor flag byte per source tile.
    pub flags: Vec<u8>,
    pub band_colors: Option<Vec<u8>>,
    pub entities: Vec<Entity>,
}

impl LevelGeometry {
    pub fn validate(&self) -> Result<(), Error> {
        let size_ok = |n: usize| (1..=u16::MAX as usize).contains(&n);
        if !size_ok(self.width) || !size_ok(self.height) {
            return Err(Error::BadMapSize {
                width: self.width,
                height: self.height,
            });
        }

        if self.layers.is_empty() {
            return Err(Error::NoLayers);
        }

        let expected = self.width * self.height;
        for (layer, geometry) in self.layers.iter().enumerate() {
            if geometry.cells.len() != expected {
                return Err(Error::LayerSize {
                    layer,
                    expected,
                    actual: geometry.cells.len(),
                });
            }
        }

        Ok(())
    }

    /// The band palette this level asks for, starting from `base`.
    pub fn bands(&self, base: &BandPalette) -> BandPalette {
        base.with_colors(self.band_colors.as_deref())
    }
}

#[derive(Clone, Debug)]
pub struct BuiltLayer {
    pub cells: Vec<u8>,
    pub packing: CellPacking,
    pub scroll: f32,
    pub encoded: EncodedLayer,
}

#[derive(Clone, Debug)]
pub struct BuiltLevel {
    pub width: usize,
    pub height: usize,
    pub pool: TilePool,
    pub layers: Vec<BuiltLayer>,
    pub spawn: Option<(u16, u16)>,
    pub entities: Vec<Entity>,
}

/// Resolve every placed tile to a runtime tile and encode each layer.
///
/// Every layer shares one pool, so a tile appearance used on several layers
/// is stored once. References past the end of `tileset` are reported and
/// dropped.
pub fn build_level(
    geometry: &LevelGeometry,
    tileset: &[SourceTile],
    bands: &BandPalette,
) -> Result<BuiltLevel, Error> {
    geometry.validate()?;

    let bands = geometry.bands(bands);
    let mut pool = TilePool::new();
    let mut remapped = HashMap::new();
    let mut layers = Vec::with_capacity(geometry.layers.len());

    for (index, layer) in geometry.layers.iter().enumerate() {
        let used =
            layer.cells.iter().flatten().copied().collect::<BTreeSet<_>>();

        let mut lookup = HashMap::new();
        for r in used {
            let Some(source) = tileset.get(r.tile) else {
                warn!(
                    "layer {index}: tile index {} out of range ({} tiles), \
                     skipping",
                    r.tile,
                    tileset.len()
                );
                continue;
            };

            let base = remapped
                .entry(r.tile)
                .or_insert_with(|| bands.remap(source));
            let flags = geometry.flags.get(r.tile).copied().unwrap_or(0);
            lookup.insert(r, layer.packing.cell(&mut pool, base, r, flags)?);
        }

        let cells = layer
            .cells
            .iter()
            .map(|c| c.and_then(|r| lookup.get(&r).copied()).unwrap_or(0))
            .collect::<Vec<_>>();
        let encoded = encode_layer(&cells, geometry.width);
        debug!(
            "layer {index}: {} distinct refs, {:?} encoding, {} bytes",
            lookup.len(),
            encoded.mode,
            encoded.len()
        );

        layers.push(BuiltLayer {
            cells,
            packing: layer.packing,
            scroll: layer.scroll,
            encoded,
        });
    }

    info!(
        "level {}x{}: {} runtime tiles",
        geometry.width,
        geometry.height,
        pool.len()
    );
    if pool.len() >= AUX_POOL_LIMIT {
        warn!(
            "{} runtime tiles exceeds the {} tile limit",
            pool.len(),
            AUX_POOL_LIMIT - 1
        );
    } else if pool.len() >= SPRITE_POOL_LIMIT {
        warn!(
            "{} runtime tiles exceeds the {} tile sprite sheet limit",
            pool.len(),
            SPRITE_POOL_LIMIT - 1
        );
    }

    Ok(BuiltLevel {
        width: geometry.width,
        height: geometry.height,
        pool,
        layers,
        spawn: geometry.spawn,
        entities: geometry.entities.clone(),
    })
}
