// Greyscale tileset art is colored by luminance band.

use spritecodec::TRANSPARENT;

use crate::slice::SourceTile;

/// Pixels with alpha below this are treated as transparent.
const ALPHA_CUTOFF: u8 = 128;

const DEFAULT_BANDS: [(u8, u8); 5] =
    [(0, 20), (21, 45), (46, 100), (101, 185), (186, 255)];
// black, dark grey, lavender, light grey, white
const DEFAULT_COLORS: [u8; 5] = [0, 5, 13, 6, 7];

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BandPalette {
    bands: [(u8, u8); 5],
    colors: [u8; 5],
}

impl Default for BandPalette {
    fn default() -> Self {
        Self {
            bands: DEFAULT_BANDS,
            colors: DEFAULT_COLORS,
        }
    }
}

impl BandPalette {
    pub fn colors(&self) -> &[u8] {
        &self.colors
    }

    /// Same bands, different colors. An override of the wrong length (or
    /// none at all) leaves the palette as it is.
    pub fn with_colors(&self, colors: Option<&[u8]>) -> Self {
        match colors.and_then(|c| <[u8; 5]>::try_from(c).ok()) {
            Some(colors) => Self {
                bands: self.bands,
                colors: colors.map(|c| c & 0xF),
            },
            None => self.clone(),
        }
    }

    pub fn color_for(&self, luma: u8, alpha: u8) -> u8 {
        if alpha < ALPHA_CUTOFF {
            return TRANSPARENT;
        }

        self.bands
            .iter()
            .zip(self.colors)
            .find(|((lo, hi), _)| (*lo..=*hi).contains(&luma))
            .map(|(_, color)| color)
            .unwrap_or(self.colors[self.colors.len() - 1])
    }

    pub fn remap(&self, tile: &SourceTile) -> Vec<u8> {
        tile.pixels()
            .iter()
            .map(|&[luma, alpha]| self.color_for(luma, alpha))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_bands() {
        let bands = BandPalette::default();
        assert_eq!(bands.color_for(0, 255), 0);
        assert_eq!(bands.color_for(30, 255), 5);
        assert_eq!(bands.color_for(100, 255), 13);
        assert_eq!(bands.color_for(150, 255), 6);
        assert_eq!(bands.color_for(255, 255), 7);
        assert_eq!(bands.color_for(255, 127), TRANSPARENT);
    }

    #[test]
    fn override_needs_every_band() {
        let base = BandPalette::default();
        let custom = base.with_colors(Some(&[1, 2, 3, 4, 5]));
        assert_eq!(custom.color_for(30, 255), 2);
        assert_eq!(base.with_colors(Some(&[1, 2])), base);
        assert_eq!(base.with_colors(None), base);
    }
}
