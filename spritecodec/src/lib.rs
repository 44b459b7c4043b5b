// Sprite animation codec for a fixed-size sprite memory region.
//
// Everything in here works on already-quantized color indices (0..=15), with
// `TRANSPARENT` reserved for see-through pixels. Converting real images into
// index buffers is somebody else's job.

use thiserror::Error;

pub mod animation;
pub mod bbox;
pub mod bytes;
pub mod delta;
pub mod keyframes;
pub mod palette;
pub mod rle;
pub mod select;

pub use animation::{
    decode_block, encode_animation, BlockKind, EncodedBlock, Geometry,
};
pub use bbox::BBox;
pub use palette::Palette;

/// Color index that is never drawn.
pub const TRANSPARENT: u8 = 14;

/// Number of entries in the full runtime palette.
pub const MAX_COLORS: usize = 16;

#[derive(Error, Debug)]
pub enum Error {
    // Malformed content. These would silently corrupt the output format, so
    // they are reported instead of patched up.
    #[error("animation {name:?} has no frames")]
    NoFrames { name: String },
    #[error("animation {name:?} has {count} frames, at most 255 fit in a block")]
    TooManyFrames { name: String, count: usize },
    #[error("frame {frame} of {name:?} has {actual} pixels, expected {expected}")]
    FrameLength {
        name: String,
        frame: usize,
        expected: usize,
        actual: usize,
    },
    #[error("cell size {width}x{height} must be between 1x1 and 255x255")]
    BadCellSize { width: usize, height: usize },
    #[error("frame {frame} of {name:?} contains color index {color} (>15)")]
    BadColorIndex { name: String, frame: usize, color: u8 },

    // The block format stores offsets as u16.
    #[error("encoded data for {name:?} is too large for a 16-bit offset ({size} bytes)")]
    OffsetOverflow { name: String, size: usize },
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum DecodeError {
    #[error("input data is incomplete (got eof, expected {expected})")]
    UnexpectedEof { expected: &'static str },
    #[error("delta position {pos} is outside a {len}-pixel frame")]
    PositionOutOfRange { pos: usize, len: usize },
    #[error("unknown block type {0}")]
    UnknownBlockType(u8),
    #[error("invalid bit depth {0} (must be 1 to 4)")]
    BadBitDepth(u8),
    #[error("palette index {0} is not in the block palette")]
    BadPaletteIndex(u8),
    #[error("bounding box {bbox:?} does not fit in the cell")]
    BadBoundingBox { bbox: [u8; 4] },
    #[error("keyframe reference {0} is out of range")]
    BadKeyReference(usize),
    #[error("decoded {actual} pixels, expected {expected}")]
    LengthMismatch { expected: usize, actual: usize },
}

/// A named sequence of same-sized frames.
#[derive(Clone, Debug)]
pub struct Animation {
    pub name: String,
    pub width: usize,
    pub height: usize,
    // INVARIANT: 1 <= frames.len() <= 255
    // INVARIANT: forall f . f.len() = width * height, row-major, every
    //            entry < 16.
    frames: Vec<Vec<u8>>,
}

impl Animation {
    pub fn new(
        name: impl Into<String>,
        width: usize,
        height: usize,
        frames: Vec<Vec<u8>>,
    ) -> Result<Self, Error> {
        let anim = Self {
            name: name.into(),
            width,
            height,
            frames,
        };
        anim.validate()?;
        Ok(anim)
    }

    pub fn validate(&self) -> Result<(), Error> {
        if !(1..=255).contains(&self.width) || !(1..=255).contains(&self.height)
        {
            return Err(Error::BadCellSize {
                width: self.width,
                height: self.height,
            });
        }

        if self.frames.is_empty() {
            return Err(Error::NoFrames {
                name: self.name.clone(),
            });
        }

        if self.frames.len() > 255 {
            return Err(Error::TooManyFrames {
                name: self.name.clone(),
                count: self.frames.len(),
            });
        }

        let expected = self.width * self.height;
        for (frame, pixels) in self.frames.iter().enumerate() {
            if pixels.len() != expected {
                return Err(Error::FrameLength {
                    name: self.name.clone(),
                    frame,
                    expected,
                    actual: pixels.len(),
                });
            }

            if let Some(&color) =
                pixels.iter().find(|&&c| c as usize >= MAX_COLORS)
            {
                return Err(Error::BadColorIndex {
                    name: self.name.clone(),
                    frame,
                    color,
                });
            }
        }

        Ok(())
    }

    pub fn frames(&self) -> &[Vec<u8>] {
        &self.frames
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn pixel_count(&self) -> usize {
        self.width * self.height
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_mismatched_frames() {
        let err = Animation::new("walk", 2, 2, vec![vec![0; 4], vec![0; 3]])
            .unwrap_err();
        assert!(matches!(
            err,
            Error::FrameLength {
                frame: 1,
                expected: 4,
                actual: 3,
                ..
            }
        ));
    }

    #[test]
    fn rejects_empty_and_oversized() {
        assert!(matches!(
            Animation::new("none", 2, 2, vec![]),
            Err(Error::NoFrames { .. })
        ));
        assert!(matches!(
            Animation::new("wide", 256, 1, vec![vec![0; 256]]),
            Err(Error::BadCellSize { .. })
        ));
        assert!(matches!(
            Animation::new("many", 1, 1, vec![vec![0]; 256]),
            Err(Error::TooManyFrames { count: 256, .. })
        ));
    }

    #[test]
    fn rejects_wide_color_index() {
        assert!(matches!(
            Animation::new("bad", 1, 2, vec![vec![3, 16]]),
            Err(Error::BadColorIndex { color: 16, .. })
        ));
    }
}
