// Variable-depth run-length coding.
//
// Each unit is a single byte `(color << run_bits) | (run - 1)`, where
// `run_bits = 8 - bpp`. A saturated run field (`run_mask`) means one more
// byte follows, adding up to 255 to the run. Runs that are longer than that
// are split into several units.

use itertools::Itertools;

use crate::DecodeError;

pub fn run_mask(bpp: u8) -> usize {
    (1 << (8 - bpp)) - 1
}

/// Encode `pixels` at `bpp` bits per color. Every pixel must be `< 2^bpp`.
pub fn encode(pixels: &[u8], bpp: u8) -> Vec<u8> {
    debug_assert!((1..=4).contains(&bpp));
    debug_assert!(pixels.iter().all(|&p| (p as u16) < (1 << bpp)));

    let run_bits = 8 - bpp;
    let run_mask = run_mask(bpp);
    let mut out = Vec::new();

    for (count, &color) in pixels.iter().dedup_with_count() {
        let head = color << run_bits;
        let mut remaining = count;

        while remaining > 0 {
            if remaining - 1 < run_mask {
                out.push(head | (remaining - 1) as u8);
                break;
            }

            let ext = usize::min(remaining - 1 - run_mask, 0xFF);
            out.push(head | run_mask as u8);
            out.push(ext as u8);
            remaining -= run_mask + 1 + ext;
        }
    }

    out
}

/// Decode an entire buffer.
pub fn decode(data: &[u8], bpp: u8) -> Result<Vec<u8>, DecodeError> {
    let mut out = Vec::new();
    let mut pos = 0;

    while pos < data.len() {
        let (color, run, used) = read_unit(&data[pos..], bpp)?;
        out.extend(std::iter::repeat(color).take(run));
        pos += used;
    }

    Ok(out)
}

/// Decode exactly `count` pixels from the front of `data`. Returns the pixels
/// and the number of bytes consumed.
pub fn decode_exact(
    data: &[u8],
    bpp: u8,
    count: usize,
) -> Result<(Vec<u8>, usize), DecodeError> {
    let mut out = Vec::with_capacity(count);
    let mut pos = 0;

    while out.len() < count {
        let (color, run, used) = read_unit(&data[pos..], bpp)?;
        out.extend(std::iter::repeat(color).take(run));
        pos += used;
    }

    if out.len() != count {
        return Err(DecodeError::LengthMismatch {
            expected: count,
            actual: out.len(),
        });
    }

    Ok((out, pos))
}

fn read_unit(data: &[u8], bpp: u8) -> Result<(u8, usize, usize), DecodeError> {
    let run_bits = 8 - bpp;
    let run_mask = run_mask(bpp);

    let byte = *data.first().ok_or(DecodeError::UnexpectedEof {
        expected: "run byte",
    })?;
    let color = byte >> run_bits;
    let run = byte as usize & run_mask;

    if run < run_mask {
        return Ok((color, run + 1, 1));
    }

    let ext = *data.get(1).ok_or(DecodeError::UnexpectedEof {
        expected: "run extension byte",
    })?;
    Ok((color, run_mask + 1 + ext as usize, 2))
}

#[cfg(test)]
mod tests {
    use quickcheck_macros::quickcheck;

    use super::*;

    fn depth(bpp: u8) -> u8 {
        bpp % 4 + 1
    }

    fn clamp(pixels: Vec<u8>, bpp: u8) -> Vec<u8> {
        let mask = (1u8 << bpp) - 1;
        pixels.into_iter().map(|p| p & mask).collect()
    }

    #[quickcheck]
    fn roundtrip(pixels: Vec<u8>, bpp: u8) -> bool {
        let bpp = depth(bpp);
        let pixels = clamp(pixels, bpp);
        decode(&encode(&pixels, bpp), bpp) == Ok(pixels)
    }

    #[quickcheck]
    fn roundtrip_long_runs(runs: Vec<(u8, u16)>, bpp: u8) -> bool {
        let bpp = depth(bpp);
        let pixels = clamp(
            runs.iter()
                .flat_map(|&(c, n)| std::iter::repeat(c).take(n as usize % 700 + 1))
                .collect(),
            bpp,
        );
        let encoded = encode(&pixels, bpp);
        decode(&encoded, bpp) == Ok(pixels.clone())
            && decode_exact(&encoded, bpp, pixels.len())
                == Ok((pixels, encoded.len()))
    }

    #[quickcheck]
    fn reencode_is_stable(pixels: Vec<u8>, bpp: u8) -> bool {
        let bpp = depth(bpp);
        let encoded = encode(&clamp(pixels, bpp), bpp);
        decode(&encoded, bpp).map(|p| encode(&p, bpp)) == Ok(encoded)
    }

    #[test]
    fn escape_boundary() {
        for bpp in 1..=4 {
            let limit = 1usize << (8 - bpp);
            for len in [limit - 1, limit, limit + 1] {
                let pixels = vec![1; len];
                let encoded = encode(&pixels, bpp);
                let expected_len = if len < limit { 1 } else { 2 };
                assert_eq!(encoded.len(), expected_len, "bpp={bpp} len={len}");
                assert_eq!(decode(&encoded, bpp), Ok(pixels));
            }
        }
    }

    #[test]
    fn four_bit_layout() {
        // 3 x color 2, then a 16-long run of 7 which needs the extension.
        let mut pixels = vec![2, 2, 2];
        pixels.extend([7; 16]);
        assert_eq!(encode(&pixels, 4), vec![0x22, 0x7F, 0x00]);
    }

    #[test]
    fn splits_runs_past_extension() {
        // 16 + 255 = 271 pixels per escaped unit at 4 bpp.
        let pixels = vec![3; 600];
        let encoded = encode(&pixels, 4);
        assert_eq!(encoded, vec![0x3F, 0xFF, 0x3F, 0xFF, 0x3F, 42]);
        assert_eq!(decode(&encoded, 4), Ok(pixels));
    }

    #[test]
    fn empty_input() {
        assert!(encode(&[], 2).is_empty());
        assert_eq!(decode(&[], 2), Ok(vec![]));
    }

    #[test]
    fn truncated_extension() {
        assert_eq!(
            decode(&[0x1F], 4),
            Err(DecodeError::UnexpectedEof {
                expected: "run extension byte"
            })
        );
    }

    #[test]
    fn exact_stops_at_count() {
        let mut data = encode(&[1, 1, 0, 0, 0], 1);
        let used = data.len();
        data.extend([0xAB, 0xCD]);
        assert_eq!(decode_exact(&data, 1, 5), Ok((vec![1, 1, 0, 0, 0], used)));
        assert!(matches!(
            decode_exact(&data[..used], 1, 4),
            Err(DecodeError::LengthMismatch { .. })
        ));
    }
}
