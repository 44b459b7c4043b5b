use std::collections::{hash_map::Entry, HashMap};

use image::{GenericImageView, Pixel, Rgba};
use log::debug;

use crate::{
    level::TileRef, transform::Transform, Error, TILE_PIXELS, TILE_SIZE,
};

/// A 16x16 tile cut from the tileset image, kept as (luma, alpha) pairs
/// until a level decides how to color it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceTile {
    /// Position in the source image, in tiles.
    pub row: usize,
    pub col: usize,
    // INVARIANT: pixels.len() == TILE_PIXELS
    pixels: Vec<[u8; 2]>,
}

impl SourceTile {
    pub fn new(
        row: usize,
        col: usize,
        pixels: Vec<[u8; 2]>,
    ) -> Result<Self, Error> {
        if pixels.len() != TILE_PIXELS {
            return Err(Error::NotSquare(pixels.len()));
        }
        Ok(Self { row, col, pixels })
    }

    pub fn pixels(&self) -> &[[u8; 2]] {
        &self.pixels
    }

    pub fn is_blank(&self) -> bool {
        self.pixels.iter().all(|&[_, alpha]| alpha == 0)
    }
}

/// ITU-R 601 luma in 16.16 fixed point, rounded.
pub fn luma(Rgba([r, g, b, _]): Rgba<u8>) -> u8 {
    let l = r as u32 * 19595 + g as u32 * 38470 + b as u32 * 7471 + 0x8000;
    (l >> 16) as u8
}

/// A sliced tileset, plus where every grid position of the image went.
#[derive(Clone, Debug)]
pub struct SlicedTileset {
    pub tiles: Vec<SourceTile>,
    pub cols: usize,
    // INVARIANT: grid.len() == rows * cols, in reading order. Blank
    // positions are None; the rest name a kept tile and the transform that
    // turns it into the tile drawn at that position.
    pub grid: Vec<Option<TileRef>>,
}

impl SlicedTileset {
    /// Turn a reference by grid position (as Tiled numbers tiles) into one
    /// by kept tile.
    pub fn resolve(&self, r: TileRef) -> Option<TileRef> {
        let base = (*self.grid.get(r.tile)?)?;
        Some(TileRef::new(base.tile, base.transform.then(r.transform)))
    }

    /// Per-grid-position flags to per-kept-tile flags. A kept tile takes the
    /// flags of the position it was first seen at.
    pub fn tile_flags(&self, grid_flags: &[u8]) -> Vec<u8> {
        self.tiles
            .iter()
            .map(|t| {
                grid_flags
                    .get(t.row * self.cols + t.col)
                    .copied()
                    .unwrap_or(0)
            })
            .collect()
    }
}

/// Cut a tileset into distinct 16x16 tiles, in reading order.
///
/// Fully transparent tiles are dropped, and so is any tile that is a
/// rotation or mirror image of one already kept: levels recover those with
/// a transform.
pub fn slice_tileset<V>(img: &V) -> Result<Vec<SourceTile>, Error>
where
    V: GenericImageView,
    V::Pixel: Pixel<Subpixel = u8>,
{
    Ok(slice_tileset_indexed(img)?.tiles)
}

/// Like [slice_tileset], also recording what happened to every grid
/// position.
pub fn slice_tileset_indexed<V>(img: &V) -> Result<SlicedTileset, Error>
where
    V: GenericImageView,
    V::Pixel: Pixel<Subpixel = u8>,
{
    let (width, height) = img.dimensions();
    if width as usize % TILE_SIZE != 0 || height as usize % TILE_SIZE != 0 {
        return Err(Error::BadDimensions { width, height });
    }

    let cols = width as usize / TILE_SIZE;
    let rows = height as usize / TILE_SIZE;

    let mut seen = HashMap::new();
    let mut tiles = Vec::new();
    let mut grid = Vec::with_capacity(rows * cols);
    for row in 0..rows {
        for col in 0..cols {
            let pixels = (0..TILE_PIXELS)
                .map(|i| {
                    let x = (col * TILE_SIZE + i % TILE_SIZE) as u32;
                    let y = (row * TILE_SIZE + i / TILE_SIZE) as u32;
                    let px = img.get_pixel(x, y).to_rgba();
                    [luma(px), px.0[3]]
                })
                .collect::<Vec<_>>();
            let tile = SourceTile::new(row, col, pixels)?;

            if tile.is_blank() {
                grid.push(None);
                continue;
            }

            if let Some(&r) = seen.get(&tile.pixels) {
                debug!("tile ({row}, {col}) duplicates an earlier tile");
                grid.push(Some(r));
                continue;
            }

            // Symmetric tiles keep the first transform that produces them.
            let id = tiles.len();
            for t in Transform::dihedral() {
                if let Entry::Vacant(e) =
                    seen.entry(t.apply(&tile.pixels, TILE_SIZE)?)
                {
                    e.insert(TileRef::new(id, t));
                }
            }
            grid.push(Some(TileRef::new(id, Transform::IDENTITY)));
            tiles.push(tile);
        }
    }

    debug!(
        "sliced {} distinct tiles from a {cols}x{rows} tileset",
        tiles.len()
    );
    Ok(SlicedTileset { tiles, cols, grid })
}
