// Turning strip images into color index frames.

use std::{collections::HashMap, path::Path};

use anyhow::{bail, Context, Result};
use image::{GenericImageView, ImageReader, Pixel, Rgba};
use spritecodec::{Animation, TRANSPARENT};

/// The fixed 16-color runtime palette.
pub const PALETTE: [[u8; 3]; 16] = [
    [0, 0, 0],
    [29, 43, 83],
    [126, 37, 83],
    [0, 135, 81],
    [171, 82, 54],
    [95, 87, 79],
    [194, 195, 199],
    [255, 241, 232],
    [255, 0, 77],
    [255, 163, 0],
    [255, 236, 39],
    [0, 228, 54],
    [41, 173, 255],
    [131, 118, 156],
    [255, 119, 168],
    [255, 204, 170],
];

/// Nearest palette entry by squared RGB distance, never the transparent
/// slot. Art tends to use few distinct colors, so answers are memoized.
#[derive(Default)]
pub struct ColorMapper {
    cache: HashMap<[u8; 3], u8>,
}

impl ColorMapper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn nearest(&mut self, rgb: [u8; 3]) -> u8 {
        *self.cache.entry(rgb).or_insert_with(|| {
            let distance = |c: &[u8; 3]| {
                c.iter()
                    .zip(rgb)
                    .map(|(&a, b)| (a as i32 - b as i32).pow(2))
                    .sum::<i32>()
            };
            PALETTE
                .iter()
                .enumerate()
                .filter(|&(i, _)| i != TRANSPARENT as usize)
                .min_by_key(|&(_, c)| distance(c))
                .map_or(0, |(i, _)| i as u8)
        })
    }

    /// Fully transparent pixels map to `TRANSPARENT`; any other alpha is
    /// drawn.
    pub fn index_of(&mut self, Rgba([r, g, b, a]): Rgba<u8>) -> u8 {
        if a == 0 {
            TRANSPARENT
        } else {
            self.nearest([r, g, b])
        }
    }
}

/// Cut a vertical strip into `cell_width x cell_height` frames.
pub fn strip_frames<V>(
    img: &V,
    cell_width: usize,
    cell_height: usize,
    frames: Option<usize>,
    mapper: &mut ColorMapper,
) -> Result<Vec<Vec<u8>>>
where
    V: GenericImageView,
    V::Pixel: Pixel<Subpixel = u8>,
{
    let (width, height) = img.dimensions();
    let (width, height) = (width as usize, height as usize);
    if width < cell_width || cell_height == 0 {
        bail!("a {width}x{height} strip cannot hold {cell_width}x{cell_height} cells");
    }

    let available = height / cell_height;
    let count = frames.unwrap_or(available);
    if count > available {
        bail!("strip holds {available} frames, {count} were requested");
    }

    Ok((0..count)
        .map(|f| {
            (0..cell_width * cell_height)
                .map(|i| {
                    let x = (i % cell_width) as u32;
                    let y = (f * cell_height + i / cell_width) as u32;
                    mapper.index_of(img.get_pixel(x, y).to_rgba())
                })
                .collect()
        })
        .collect())
}

pub fn load_animation(
    name: &str,
    path: &Path,
    cell_width: usize,
    cell_height: usize,
    frames: Option<usize>,
    mapper: &mut ColorMapper,
) -> Result<Animation> {
    let img = ImageReader::open(path)
        .with_context(|| format!("opening {}", path.display()))?
        .decode()?;
    let frames = strip_frames(&img, cell_width, cell_height, frames, mapper)
        .with_context(|| format!("slicing {}", path.display()))?;
    Ok(Animation::new(name, cell_width, cell_height, frames)?)
}
