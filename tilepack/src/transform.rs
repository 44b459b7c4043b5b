// Square-grid symmetries.
//
// A transform is applied as: rotate clockwise `rotation` quarter turns, then
// flip vertically, then flip horizontally. The order matters; level data is
// authored against exactly this sequence.

use crate::Error;

#[derive(
    Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
pub struct Transform {
    pub rotation: u8,
    pub hflip: bool,
    pub vflip: bool,
}

impl Transform {
    pub const IDENTITY: Self = Self {
        rotation: 0,
        hflip: false,
        vflip: false,
    };

    pub fn new(rotation: u8, hflip: bool, vflip: bool) -> Self {
        Self {
            rotation: rotation % 4,
            hflip,
            vflip,
        }
    }

    /// Editor packing: bits 0-1 rotation, bit 2 hflip, bit 3 vflip.
    pub fn from_packed(bits: u8) -> Self {
        Self::new(bits & 3, bits & 4 != 0, bits & 8 != 0)
    }

    pub fn packed(self) -> u8 {
        self.rotation | ((self.hflip as u8) << 2) | ((self.vflip as u8) << 3)
    }

    /// Tiled stores a diagonal flip (applied first) plus horizontal and
    /// vertical flips. A diagonal flip is a quarter turn followed by a
    /// horizontal flip.
    pub fn from_tiled(flip_h: bool, flip_v: bool, flip_d: bool) -> Self {
        if flip_d {
            Self::new(1, !flip_h, flip_v)
        } else {
            Self::new(0, flip_h, flip_v)
        }
    }

    /// All 8 symmetries of a square.
    pub fn dihedral() -> impl Iterator<Item = Self> {
        (0..4).flat_map(|rotation| {
            [false, true]
                .into_iter()
                .map(move |hflip| Self::new(rotation, hflip, false))
        })
    }

    /// Split into a base variant (0 or 90 degrees) plus the flips a runtime
    /// draw call applies on top. Half turns are both flips at once.
    pub fn split_flips(self) -> (Self, bool, bool) {
        let half_turn = self.rotation >= 2;
        (
            Self::new(self.rotation & 1, false, false),
            self.hflip ^ half_turn,
            self.vflip ^ half_turn,
        )
    }

    /// Where the four corners of a square end up, as a permutation of
    /// [top-left, top-right, bottom-left, bottom-right]. Corners pin down a
    /// symmetry completely.
    fn corners<T: Copy>(self, [a, b, c, d]: [T; 4]) -> [T; 4] {
        let mut g = [a, b, c, d];
        for _ in 0..self.rotation {
            g = [g[2], g[0], g[3], g[1]];
        }
        if self.vflip {
            g = [g[2], g[3], g[0], g[1]];
        }
        if self.hflip {
            g = [g[1], g[0], g[3], g[2]];
        }
        g
    }

    /// `self` followed by `next`, as a single transform.
    pub fn then(self, next: Self) -> Self {
        let target = next.corners(self.corners([0u8, 1, 2, 3]));
        // INVARIANT: dihedral() has every symmetry, so this always matches.
        Self::dihedral()
            .find(|t| t.corners([0u8, 1, 2, 3]) == target)
            .unwrap_or_default()
    }

    pub fn apply<T: Copy>(
        self,
        pixels: &[T],
        size: usize,
    ) -> Result<Vec<T>, Error> {
        if pixels.len() != size * size {
            return Err(Error::NotSquare(pixels.len()));
        }
        if size == 0 {
            return Ok(Vec::new());
        }

        let mut grid = pixels.to_vec();
        for _ in 0..self.rotation {
            grid = (0..size * size)
                .map(|i| {
                    let (row, col) = (i / size, i % size);
                    grid[(size - 1 - col) * size + row]
                })
                .collect();
        }

        if self.vflip {
            grid = grid.chunks(size).rev().flatten().copied().collect();
        }

        if self.hflip {
            grid.chunks_mut(size).for_each(|row| row.reverse());
        }

        Ok(grid)
    }
}
