// Sparse frame deltas.
//
// Layout:
//   count       u8, or 0xFF followed by a u16 when there are >= 255 entries
//   first       u16 absolute position, then the full color byte
//   rest        (skip << 4) | color, skip = distance to the previous entry - 1
//
// A skip that doesn't fit in the nibble is written as 15 followed by
// `skip - 15`, or by 0xFF and the whole skip as a u16 when even that is too
// small.

use itertools::Itertools;

use crate::{
    bytes::{push_u16, ByteReader},
    DecodeError,
};

const COUNT_ESCAPE: u8 = 0xFF;
const SKIP_ESCAPE: usize = 15;
const WIDE_SKIP: u8 = 0xFF;

/// Positions and new colors of every pixel where `frame` differs from `base`.
pub fn differences(base: &[u8], frame: &[u8]) -> Vec<(usize, u8)> {
    debug_assert_eq!(base.len(), frame.len());
    base.iter()
        .zip(frame)
        .enumerate()
        .filter(|(_, (old, new))| old != new)
        .map(|(i, (_, &new))| (i, new))
        .collect()
}

pub fn encode(base: &[u8], frame: &[u8]) -> Vec<u8> {
    let entries = differences(base, frame);
    let mut out = Vec::new();

    if entries.len() >= COUNT_ESCAPE as usize {
        out.push(COUNT_ESCAPE);
        push_u16(&mut out, entries.len() as u16);
    } else {
        out.push(entries.len() as u8);
    }

    let Some(&(first, color)) = entries.first() else {
        return out;
    };
    push_u16(&mut out, first as u16);
    out.push(color);

    for (&(prev, _), &(pos, color)) in entries.iter().tuple_windows() {
        let skip = pos - prev - 1;
        if skip < SKIP_ESCAPE {
            out.push(((skip as u8) << 4) | color);
        } else if skip - SKIP_ESCAPE < WIDE_SKIP as usize {
            out.push(((SKIP_ESCAPE as u8) << 4) | color);
            out.push((skip - SKIP_ESCAPE) as u8);
        } else {
            out.push(((SKIP_ESCAPE as u8) << 4) | color);
            out.push(WIDE_SKIP);
            push_u16(&mut out, skip as u16);
        }
    }

    out
}

/// Apply an encoded delta onto `target` (a copy of the base frame). Returns
/// the number of bytes read from `data`.
pub fn decode(data: &[u8], target: &mut [u8]) -> Result<usize, DecodeError> {
    let mut reader = ByteReader::new(data);

    let count = match reader.u8("delta count")? {
        COUNT_ESCAPE => reader.u16("escaped delta count")? as usize,
        n => n as usize,
    };

    if count == 0 {
        return Ok(reader.position());
    }

    let mut pos = reader.u16("first delta position")? as usize;
    let color = reader.u8("first delta color")?;
    put(target, pos, color)?;

    for _ in 1..count {
        let byte = reader.u8("delta entry")?;
        let mut skip = (byte >> 4) as usize;
        if skip == SKIP_ESCAPE {
            skip = match reader.u8("skip extension")? {
                WIDE_SKIP => reader.u16("wide skip")? as usize,
                ext => SKIP_ESCAPE + ext as usize,
            };
        }
        pos += skip + 1;
        put(target, pos, byte & 0xF)?;
    }

    Ok(reader.position())
}

fn put(target: &mut [u8], pos: usize, color: u8) -> Result<(), DecodeError> {
    let len = target.len();
    let slot = target
        .get_mut(pos)
        .ok_or(DecodeError::PositionOutOfRange { pos, len })?;
    *slot = color;
    Ok(())
}

#[cfg(test)]
mod tests {
    use quickcheck_macros::quickcheck;

    use super::*;

    fn apply(base: &[u8], delta: &[u8]) -> Vec<u8> {
        let mut out = base.to_vec();
        let used = decode(delta, &mut out).unwrap();
        assert_eq!(used, delta.len());
        out
    }

    #[quickcheck]
    fn reproduces_frame(pairs: Vec<(u8, u8)>) -> bool {
        let base: Vec<u8> = pairs.iter().map(|(b, _)| b & 0xF).collect();
        let frame: Vec<u8> = pairs.iter().map(|(_, f)| f & 0xF).collect();
        apply(&base, &encode(&base, &frame)) == frame
    }

    #[test]
    fn identical_frames_are_one_byte() {
        let base = vec![3; 40];
        assert_eq!(encode(&base, &base), vec![0]);
        assert_eq!(apply(&base, &[0]), base);
    }

    #[test]
    fn count_escape_boundary() {
        for diffs in [254, 255, 256] {
            let base = vec![0u8; 600];
            let mut frame = base.clone();
            for i in 0..diffs {
                frame[i * 2] = 5;
            }
            let delta = encode(&base, &frame);
            if diffs < 255 {
                assert_eq!(delta[0], diffs as u8);
            } else {
                assert_eq!(delta[0], 0xFF);
                assert_eq!(u16::from_le_bytes([delta[1], delta[2]]), diffs as u16);
            }
            assert_eq!(apply(&base, &delta), frame);
        }
    }

    #[test]
    fn skip_escape_boundaries() {
        // gap 14 -> nibble, gap 15 -> nibble (skip 14), gap 16 -> one extra
        // byte, gap 270 -> one extra byte (skip 269), gap 271 -> wide skip
        for (gap, len) in [(14, 5), (15, 5), (16, 6), (270, 6), (271, 8)] {
            let base = vec![1u8; 400];
            let mut frame = base.clone();
            frame[3] = 9;
            frame[3 + gap] = 2;
            let delta = encode(&base, &frame);
            assert_eq!(delta.len(), len, "gap {gap}");
            assert_eq!(apply(&base, &delta), frame, "gap {gap}");
        }
    }

    #[test]
    fn first_entry_layout() {
        let base = vec![0u8; 300];
        let mut frame = base.clone();
        frame[258] = 7;
        frame[259] = 6;
        assert_eq!(encode(&base, &frame), vec![2, 0x02, 0x01, 7, 0x06]);
    }

    #[test]
    fn rejects_out_of_range_position() {
        let mut target = vec![0u8; 4];
        assert_eq!(
            decode(&[1, 9, 0, 3], &mut target),
            Err(DecodeError::PositionOutOfRange { pos: 9, len: 4 })
        );
    }

    #[test]
    fn truncated_delta() {
        let mut target = vec![0u8; 4];
        assert_eq!(
            decode(&[2, 0, 0, 3], &mut target),
            Err(DecodeError::UnexpectedEof {
                expected: "delta entry"
            })
        );
    }
}
