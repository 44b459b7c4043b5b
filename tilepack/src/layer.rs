// Map layer encodings.
//
// A layer is a row-major grid of one-byte cells (0 is empty). Three encodings
// compete and the smallest wins, earlier modes winning ties:
//
//  Rle:      (cell, run) pairs, run <= 255, restarting at each row.
//  Tiling:   [bx][by][bw][bh][tw][th] + tw*th cells. The bounding box of the
//            non-empty cells is filled with a repeating tw x th pattern
//            anchored at (bx, by); everything outside it is empty.
//  PackBits: over the flattened grid; ctrl 0..=127 is followed by ctrl+1
//            literal cells, ctrl 128..=255 by one cell repeated ctrl-125
//            times.

use itertools::Itertools;
use log::debug;
use spritecodec::{
    bytes::ByteReader,
    select::{smallest_of, Encoded},
    BBox, DecodeError,
};

/// Cell comparisons the tiling search may spend before it gives up and
/// leaves the layer to the other encodings.
pub const DEFAULT_TILING_BUDGET: usize = 1 << 24;

const MAX_REPEAT: usize = 130;
const MAX_LITERAL: usize = 128;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum LayerMode {
    Rle = 0,
    Tiling = 1,
    PackBits = 2,
}

impl LayerMode {
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0 => Some(Self::Rle),
            1 => Some(Self::Tiling),
            2 => Some(Self::PackBits),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncodedLayer {
    pub mode: LayerMode,
    pub bytes: Vec<u8>,
}

impl EncodedLayer {
    fn new(mode: LayerMode, bytes: Vec<u8>) -> Self {
        Self { mode, bytes }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl Encoded for EncodedLayer {
    fn encoded_len(&self) -> usize {
        self.bytes.len()
    }
}

pub fn encode_layer(cells: &[u8], width: usize) -> EncodedLayer {
    encode_layer_with_budget(cells, width, DEFAULT_TILING_BUDGET)
}

pub fn encode_layer_with_budget(
    cells: &[u8],
    width: usize,
    budget: usize,
) -> EncodedLayer {
    let rle = EncodedLayer::new(LayerMode::Rle, encode_rle(cells, width));
    let tiling = encode_tiling(cells, width, budget)
        .map(|bytes| EncodedLayer::new(LayerMode::Tiling, bytes));
    let packbits =
        EncodedLayer::new(LayerMode::PackBits, encode_packbits(cells));

    let best = smallest_of(rle, tiling.into_iter().chain([packbits]));
    debug!("layer: {:?}, {} bytes", best.mode, best.len());
    best
}

pub fn encode_rle(cells: &[u8], width: usize) -> Vec<u8> {
    if width == 0 {
        return Vec::new();
    }

    cells
        .chunks(width)
        .flat_map(|row| row.iter().dedup_with_count())
        .flat_map(|(count, &cell)| {
            // A run longer than 255 is split into full runs plus a remainder.
            let full = std::iter::repeat([cell, u8::MAX]).take(count / 255);
            let rest = (count % 255 != 0).then_some([cell, (count % 255) as u8]);
            full.chain(rest)
        })
        .flatten()
        .collect()
}

fn occupied_box(cells: &[u8], width: usize) -> BBox {
    cells
        .iter()
        .positions(|&c| c != 0)
        .map(|i| (i % width, i / width))
        .fold(None, |acc: Option<(usize, usize, usize, usize)>, (x, y)| {
            Some(match acc {
                None => (x, y, x, y),
                Some((x0, y0, x1, y1)) => {
                    (x0.min(x), y0.min(y), x1.max(x), y1.max(y))
                }
            })
        })
        .map_or(BBox::EMPTY, |(x0, y0, x1, y1)| {
            BBox::new(x0, y0, x1 - x0 + 1, y1 - y0 + 1)
        })
}

/// Smallest repeating pattern covering the occupied part of the layer, or
/// `None` when the layer is empty, too large to describe in byte-sized
/// coordinates, or too expensive to search.
pub fn encode_tiling(
    cells: &[u8],
    width: usize,
    budget: usize,
) -> Option<Vec<u8>> {
    if width == 0 {
        return None;
    }

    let bbox = occupied_box(cells, width);
    if bbox.is_empty() {
        return None;
    }

    let header = [bbox.x, bbox.y, bbox.width, bbox.height]
        .into_iter()
        .map(u8::try_from)
        .collect::<Result<Vec<_>, _>>()
        .ok()?;

    let at = |x: usize, y: usize| cells[(bbox.y + y) * width + bbox.x + x];

    // Ascending area means ascending cost, so the first pattern that
    // reproduces the box is the answer.
    let sizes = (1..=bbox.height)
        .cartesian_product(1..=bbox.width)
        .map(|(th, tw)| (tw * th, th, tw))
        .sorted();

    let mut spent = 0;
    for (_, th, tw) in sizes {
        let mut repeats = true;
        'check: for y in 0..bbox.height {
            for x in 0..bbox.width {
                spent += 1;
                if at(x, y) != at(x % tw, y % th) {
                    repeats = false;
                    break 'check;
                }
            }
        }

        if repeats {
            let mut out = header;
            out.extend([tw as u8, th as u8]);
            out.extend((0..th).flat_map(|y| (0..tw).map(move |x| (x, y))).map(
                |(x, y)| at(x, y),
            ));
            return Some(out);
        }

        if spent > budget {
            debug!("tiling search gave up after {spent} comparisons");
            return None;
        }
    }

    None
}

pub fn encode_packbits(cells: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    let mut i = 0;

    while i < cells.len() {
        let run = cells[i..]
            .iter()
            .take(MAX_REPEAT)
            .take_while(|&&c| c == cells[i])
            .count();

        if run >= 3 {
            out.extend([(run + 125) as u8, cells[i]]);
            i += run;
            continue;
        }

        let start = i;
        while i < cells.len() && i - start < MAX_LITERAL {
            let repeat_ahead = i + 2 < cells.len()
                && cells[i] == cells[i + 1]
                && cells[i] == cells[i + 2];
            if repeat_ahead && i > start {
                break;
            }
            i += 1;
        }

        out.push((i - start - 1) as u8);
        out.extend(&cells[start..i]);
    }

    out
}

/// Rebuild a `width * height` grid. Also returns how many bytes were read,
/// since layers are stored back to back.
pub fn decode_layer(
    mode: LayerMode,
    data: &[u8],
    width: usize,
    height: usize,
) -> Result<(Vec<u8>, usize), DecodeError> {
    let expected = width * height;
    let mut reader = ByteReader::new(data);

    let cells = match mode {
        LayerMode::Rle => {
            let mut cells = Vec::with_capacity(expected);
            while cells.len() < expected {
                let [cell, run] = reader.array::<2>("layer run")?;
                cells.extend(std::iter::repeat(cell).take(run as usize));
            }
            cells
        }
        LayerMode::Tiling => {
            let header = reader.array::<6>("tiling header")?;
            let [bx, by, bw, bh, tw, th] = header.map(usize::from);
            if bw == 0
                || bh == 0
                || tw == 0
                || th == 0
                || bx + bw > width
                || by + bh > height
            {
                return Err(DecodeError::BadBoundingBox {
                    bbox: [header[0], header[1], header[2], header[3]],
                });
            }

            let pattern = reader.bytes(tw * th, "tiling pattern")?;
            (0..expected)
                .map(|i| (i % width, i / width))
                .map(|(x, y)| {
                    let inside =
                        (bx..bx + bw).contains(&x) && (by..by + bh).contains(&y);
                    if inside {
                        pattern[((y - by) % th) * tw + (x - bx) % tw]
                    } else {
                        0
                    }
                })
                .collect()
        }
        LayerMode::PackBits => {
            let mut cells = Vec::with_capacity(expected);
            while cells.len() < expected {
                let ctrl = reader.u8("packbits control")? as usize;
                if ctrl < 128 {
                    cells.extend(reader.bytes(ctrl + 1, "packbits literal")?);
                } else {
                    let cell = reader.u8("packbits repeat")?;
                    cells.extend(std::iter::repeat(cell).take(ctrl - 125));
                }
            }
            cells
        }
    };

    if cells.len() != expected {
        return Err(DecodeError::LengthMismatch {
            expected,
            actual: cells.len(),
        });
    }

    Ok((cells, reader.position()))
}

#[cfg(test)]
mod tests {
    use quickcheck::{Arbitrary, Gen};
    use quickcheck_macros::quickcheck;

    use super::*;

    #[derive(Clone, Debug)]
    struct Grid {
        width: usize,
        height: usize,
        cells: Vec<u8>,
    }

    impl Arbitrary for Grid {
        fn arbitrary(g: &mut Gen) -> Self {
            let width = usize::arbitrary(g) % 24 + 1;
            let height = usize::arbitrary(g) % 24 + 1;
            // Few distinct values, so runs and patterns actually show up.
            let cells = (0..width * height)
                .map(|_| *g.choose(&[0, 0, 1, 2, 7]).unwrap())
                .collect();
            Self {
                width,
                height,
                cells,
            }
        }
    }

    fn roundtrip(layer: &EncodedLayer, grid: &Grid) -> bool {
        let decoded =
            decode_layer(layer.mode, &layer.bytes, grid.width, grid.height);
        decoded == Ok((grid.cells.clone(), layer.len()))
    }

    #[quickcheck]
    fn never_worse_than_rle(grid: Grid) -> bool {
        let layer = encode_layer(&grid.cells, grid.width);
        layer.len() <= encode_rle(&grid.cells, grid.width).len()
    }

    #[quickcheck]
    fn chosen_encoding_decodes(grid: Grid) -> bool {
        roundtrip(&encode_layer(&grid.cells, grid.width), &grid)
    }

    #[quickcheck]
    fn every_encoding_decodes(grid: Grid) -> bool {
        let rle = EncodedLayer::new(
            LayerMode::Rle,
            encode_rle(&grid.cells, grid.width),
        );
        let packbits =
            EncodedLayer::new(LayerMode::PackBits, encode_packbits(&grid.cells));
        let tiling = encode_tiling(&grid.cells, grid.width, usize::MAX)
            .map(|b| EncodedLayer::new(LayerMode::Tiling, b));

        roundtrip(&rle, &grid)
            && roundtrip(&packbits, &grid)
            && tiling.map_or(true, |t| roundtrip(&t, &grid))
    }

    #[test]
    fn uniform_layer_tiles() {
        let cells = vec![5; 400];
        assert_eq!(encode_rle(&cells, 20).len(), 40);

        let layer = encode_layer(&cells, 20);
        assert_eq!(layer.mode, LayerMode::Tiling);
        assert_eq!(layer.bytes, vec![0, 0, 20, 20, 1, 1, 5]);

        let (decoded, used) = decode_layer(layer.mode, &layer.bytes, 20, 20)
            .unwrap();
        assert_eq!(decoded, cells);
        assert_eq!(used, 7);
    }

    #[test]
    fn repeated_pattern_tiles() {
        let pattern = [[1, 2], [3, 4]];
        let cells = (0..20)
            .flat_map(|y| (0..20).map(move |x| pattern[y % 2][x % 2]))
            .collect::<Vec<u8>>();

        let layer = encode_layer(&cells, 20);
        assert_eq!(layer.mode, LayerMode::Tiling);
        assert_eq!(&layer.bytes[4..], &[2, 2, 1, 2, 3, 4]);
    }

    #[test]
    fn tiling_skips_empty_border() {
        let mut cells = vec![0u8; 6 * 4];
        for y in 1..3 {
            for x in 2..5 {
                cells[y * 6 + x] = 9;
            }
        }
        let bytes = encode_tiling(&cells, 6, usize::MAX).unwrap();
        assert_eq!(bytes, vec![2, 1, 3, 2, 1, 1, 9]);
        assert_eq!(decode_layer(LayerMode::Tiling, &bytes, 6, 4).unwrap().0, cells);
    }

    #[test]
    fn tiling_unavailable() {
        assert_eq!(encode_tiling(&[0; 16], 4, usize::MAX), None);

        let wide = vec![1u8; 300];
        assert_eq!(encode_tiling(&wide, 300, usize::MAX), None);

        // Out of budget before the only valid pattern (the whole box).
        let noise = (0..64).map(|i| (i * 7 % 5 + 1) as u8).collect::<Vec<_>>();
        assert_eq!(encode_tiling(&noise, 8, 10), None);
        assert!(encode_tiling(&noise, 8, usize::MAX).is_some());
    }

    #[test]
    fn long_rows_split_runs() {
        let cells = vec![3u8; 600];
        assert_eq!(encode_rle(&cells, 600), vec![3, 255, 3, 255, 3, 90]);
    }

    #[test]
    fn packbits_layout() {
        let cells = [1, 2, 3, 3, 3, 3, 4];
        assert_eq!(
            encode_packbits(&cells),
            vec![1, 1, 2, 129, 3, 0, 4]
        );

        let long = vec![8u8; 131];
        assert_eq!(encode_packbits(&long), vec![255, 8, 0, 8]);

        let literal = (0..=200).map(|i| i as u8).collect::<Vec<_>>();
        let packed = encode_packbits(&literal);
        assert_eq!(packed[0], 127);
        assert_eq!(packed[129], 72);
        assert_eq!(packed.len(), 201 + 2);
    }

    #[test]
    fn truncated_layer() {
        assert_eq!(
            decode_layer(LayerMode::Rle, &[1, 2, 1], 4, 1),
            Err(DecodeError::UnexpectedEof {
                expected: "layer run"
            })
        );
        assert!(matches!(
            decode_layer(LayerMode::Tiling, &[0, 0, 5, 1, 1, 1, 2], 4, 1),
            Err(DecodeError::BadBoundingBox { .. })
        ));
    }
}
