// Reduced palettes.
//
// When an animation only uses a handful of colors, the RLE stream can spend
// fewer bits on color and more on run length. The block then carries a small
// table mapping the reduced indices back to real color indices.

use std::collections::BTreeSet;

use itertools::Itertools;

use crate::{DecodeError, MAX_COLORS, TRANSPARENT};

/// Padding value for unused palette slots.
const FILLER: u8 = 0;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Palette(Vec<u8>);

impl Palette {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn colors(&self) -> &[u8] {
        &self.0
    }

    pub fn bpp(&self) -> u8 {
        self.0.len().trailing_zeros() as u8
    }

    pub fn lookup(&self, idx: u8) -> Option<u8> {
        self.0.get(idx as usize).copied()
    }

    pub fn index_of(&self, color: u8) -> Option<u8> {
        self.0.iter().position(|&c| c == color).map(|i| i as u8)
    }

    /// Two entries per byte, low nibble first.
    pub fn packed(&self) -> Vec<u8> {
        self.0
            .iter()
            .chunks(2)
            .into_iter()
            .map(|mut pair| {
                let lo = pair.next().copied().unwrap_or(FILLER);
                let hi = pair.next().copied().unwrap_or(FILLER);
                (lo & 0xF) | ((hi & 0xF) << 4)
            })
            .collect()
    }

    pub fn from_packed(bytes: &[u8], bpp: u8) -> Self {
        Self(
            bytes
                .iter()
                .flat_map(|b| [b & 0xF, b >> 4])
                .take(1 << bpp)
                .collect(),
        )
    }
}

/// Size of the packed table for a block at `bpp`.
pub fn packed_len(bpp: u8) -> usize {
    if bpp >= 4 {
        0
    } else {
        ((1usize << bpp) + 1) / 2
    }
}

pub fn distinct_colors<F: AsRef<[u8]>>(frames: &[F]) -> BTreeSet<u8> {
    frames
        .iter()
        .flat_map(|f| f.as_ref().iter().copied())
        .collect()
}

/// Smallest bit depth that can name every color used by `frames`.
pub fn min_bit_depth<F: AsRef<[u8]>>(frames: &[F]) -> u8 {
    let count = distinct_colors(frames).len();
    (1..=4).find(|&bpp| (1 << bpp) >= count).unwrap_or(4)
}

/// Build a `2^bpp` entry palette: transparency first when used, the rest in
/// ascending order, then filler.
pub fn build_palette<F: AsRef<[u8]>>(frames: &[F], bpp: u8) -> Palette {
    let colors = distinct_colors(frames);
    let size = usize::min(1 << bpp, MAX_COLORS);
    debug_assert!(colors.len() <= size);

    let transparent = colors.contains(&TRANSPARENT).then_some(TRANSPARENT);
    let entries = transparent
        .into_iter()
        .chain(colors.iter().copied().filter(|&c| c != TRANSPARENT))
        .pad_using(size, |_| FILLER)
        .take(size)
        .collect();

    Palette(entries)
}

/// Map every pixel to its position in `palette`. Colors missing from the
/// palette fall back to index 0.
pub fn quantize(pixels: &[u8], palette: &Palette) -> Vec<u8> {
    let mut table = [0u8; MAX_COLORS];
    for (idx, &color) in palette.colors().iter().enumerate().rev() {
        table[color as usize & 0xF] = idx as u8;
    }
    pixels.iter().map(|&p| table[p as usize & 0xF]).collect()
}

pub fn dequantize(
    indices: &[u8],
    palette: &Palette,
) -> Result<Vec<u8>, DecodeError> {
    indices
        .iter()
        .map(|&i| palette.lookup(i).ok_or(DecodeError::BadPaletteIndex(i)))
        .collect()
}
