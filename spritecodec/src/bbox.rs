use crate::TRANSPARENT;

/// A rectangle inside a frame. Zero width or height means "nothing drawn".
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct BBox {
    pub x: usize,
    pub y: usize,
    pub width: usize,
    pub height: usize,
}

impl BBox {
    pub const EMPTY: Self = Self {
        x: 0,
        y: 0,
        width: 0,
        height: 0,
    };

    pub fn new(x: usize, y: usize, width: usize, height: usize) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn area(&self) -> usize {
        self.width * self.height
    }

    // Boxes always lie inside a cell of at most 255x255 pixels.
    pub fn to_bytes(&self) -> [u8; 4] {
        [
            self.x as u8,
            self.y as u8,
            self.width as u8,
            self.height as u8,
        ]
    }

    pub fn from_bytes([x, y, width, height]: [u8; 4]) -> Self {
        Self::new(x as usize, y as usize, width as usize, height as usize)
    }

    pub fn union(self, other: Self) -> Self {
        if self.is_empty() {
            return other;
        }
        if other.is_empty() {
            return self;
        }

        let x = usize::min(self.x, other.x);
        let y = usize::min(self.y, other.y);
        let right = usize::max(self.x + self.width, other.x + other.width);
        let bottom = usize::max(self.y + self.height, other.y + other.height);
        Self::new(x, y, right - x, bottom - y)
    }
}

/// Tight box around the non-transparent pixels of one frame.
pub fn frame_bbox(frame: &[u8], width: usize) -> BBox {
    let mut opaque = frame
        .iter()
        .enumerate()
        .filter(|&(_, &c)| c != TRANSPARENT)
        .map(|(idx, _)| (idx % width, idx / width));

    let Some((x, y)) = opaque.next() else {
        return BBox::EMPTY;
    };

    let (min_x, min_y, max_x, max_y) =
        opaque.fold((x, y, x, y), |(x0, y0, x1, y1), (x, y)| {
            (x0.min(x), y0.min(y), x1.max(x), y1.max(y))
        });

    BBox::new(min_x, min_y, max_x - min_x + 1, max_y - min_y + 1)
}

/// Union of the boxes of every frame.
pub fn animation_bbox<F: AsRef<[u8]>>(frames: &[F], width: usize) -> BBox {
    frames
        .iter()
        .map(|f| frame_bbox(f.as_ref(), width))
        .fold(BBox::EMPTY, BBox::union)
}

/// Copy the pixels under `bbox` out of a `width`-wide frame, row-major.
pub fn crop(frame: &[u8], width: usize, bbox: BBox) -> Vec<u8> {
    (bbox.y..bbox.y + bbox.height)
        .flat_map(|y| {
            let start = y * width + bbox.x;
            frame[start..start + bbox.width].iter().copied()
        })
        .collect()
}

/// Inverse of [crop]: paint `pixels` into an otherwise transparent frame.
pub fn uncrop(
    pixels: &[u8],
    bbox: BBox,
    width: usize,
    height: usize,
) -> Vec<u8> {
    let mut frame = vec![TRANSPARENT; width * height];
    if bbox.is_empty() {
        return frame;
    }

    for (row, src) in pixels.chunks(bbox.width).enumerate() {
        let start = (bbox.y + row) * width + bbox.x;
        frame[start..start + src.len()].copy_from_slice(src);
    }

    frame
}
