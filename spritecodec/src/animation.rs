// Animation blocks.
//
// Every block starts with
//
//   [frame_count] [type] [bpp] [packed palette, only when bpp < 4]
//
// Type 0 (keyframe + delta) crops every frame to one shared box:
//
//   [key_count] [bx by bw bh] [key indices...] [key sizes, u16...]
//   [assignments, one per frame] [delta offsets, u16 per frame]
//   [keyframe RLE...] [deltas...]
//
// Delta offsets count from the start of the keyframe RLE data.
//
// Type 1 (per frame) crops each frame to its own box:
//
//   [frame offsets, u16 per frame] then per frame [bx by bw bh] [RLE]
//
// A frame with nothing drawn is just four zero bytes.

use std::collections::HashMap;

use log::debug;

use crate::{
    bbox::{self, BBox},
    bytes::{push_u16, ByteReader},
    delta,
    keyframes::{self, DistanceTable},
    palette::{self, Palette},
    rle,
    select::{smallest_of, Encoded, Smallest},
    Animation, DecodeError, Error,
};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BlockKind {
    KeyframeDelta = 0,
    PerFrame = 1,
}

impl BlockKind {
    pub fn from_byte(b: u8) -> Result<Self, DecodeError> {
        match b {
            0 => Ok(Self::KeyframeDelta),
            1 => Ok(Self::PerFrame),
            b => Err(DecodeError::UnknownBlockType(b)),
        }
    }

    pub fn short_name(self) -> &'static str {
        match self {
            Self::KeyframeDelta => "KD",
            Self::PerFrame => "PF",
        }
    }
}

/// Where the pixels of each frame ended up.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Geometry {
    KeyframeDelta {
        bbox: BBox,
        keys: Vec<usize>,
        assignments: Vec<usize>,
    },
    PerFrame {
        boxes: Vec<BBox>,
    },
}

#[derive(Clone, Debug)]
pub struct EncodedBlock {
    pub bpp: u8,
    pub geometry: Geometry,
    bytes: Vec<u8>,
}

impl EncodedBlock {
    pub fn kind(&self) -> BlockKind {
        match self.geometry {
            Geometry::KeyframeDelta { .. } => BlockKind::KeyframeDelta,
            Geometry::PerFrame { .. } => BlockKind::PerFrame,
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn key_count(&self) -> Option<usize> {
        match &self.geometry {
            Geometry::KeyframeDelta { keys, .. } => Some(keys.len()),
            Geometry::PerFrame { .. } => None,
        }
    }
}

impl Encoded for EncodedBlock {
    fn encoded_len(&self) -> usize {
        self.bytes.len()
    }
}

/// A bit depth to try, with the reduced palette it needs (if any).
struct Depth {
    bpp: u8,
    palette: Option<Palette>,
}

impl Depth {
    // The reduced depth comes first so it wins ties against raw indices.
    fn choices<F: AsRef<[u8]>>(frames: &[F]) -> Vec<Self> {
        let bpp = palette::min_bit_depth(frames);
        let mut out = Vec::with_capacity(2);
        if bpp < 4 {
            out.push(Self {
                bpp,
                palette: Some(palette::build_palette(frames, bpp)),
            });
        }
        out.push(Self {
            bpp: 4,
            palette: None,
        });
        out
    }

    fn apply(&self, pixels: &[u8]) -> Vec<u8> {
        match &self.palette {
            Some(palette) => palette::quantize(pixels, palette),
            None => pixels.to_vec(),
        }
    }

    fn write_prefix(&self, out: &mut Vec<u8>, frames: usize, kind: BlockKind) {
        out.push(frames as u8);
        out.push(kind as u8);
        out.push(self.bpp);
        if let Some(palette) = &self.palette {
            out.extend(palette.packed());
        }
    }
}

fn offset16(anim: &Animation, value: usize) -> Result<u16, Error> {
    u16::try_from(value).map_err(|_| Error::OffsetOverflow {
        name: anim.name.clone(),
        size: value,
    })
}

/// Encode an animation both ways and keep whichever is smaller. Ties go to
/// keyframe + delta. A kind whose offsets don't fit in 16 bits drops out;
/// only when neither fits is that an error.
pub fn encode_animation(anim: &Animation) -> Result<EncodedBlock, Error> {
    anim.validate()?;

    match (encode_keyframe_delta(anim), encode_per_frame(anim)) {
        (Ok(kd), Ok(pf)) => {
            debug!(
                "{}: {} frames, KD {}b ({} keys, {}bpp), PF {}b ({}bpp)",
                anim.name,
                anim.frame_count(),
                kd.len(),
                kd.key_count().unwrap_or(0),
                kd.bpp,
                pf.len(),
                pf.bpp,
            );
            Ok(smallest_of(kd, [pf]))
        }
        (Ok(block), Err(err)) | (Err(err), Ok(block)) => {
            debug!(
                "{}: only {} fits ({err})",
                anim.name,
                block.kind().short_name()
            );
            Ok(block)
        }
        (Err(err), Err(_)) => Err(err),
    }
}

/// Offer `candidate` unless it needs offsets wider than 16 bits, in which
/// case the overflow is kept for reporting if nothing else fits.
fn offer_fitting(
    best: &mut Smallest<EncodedBlock>,
    overflow: &mut Option<Error>,
    candidate: Result<EncodedBlock, Error>,
) -> Result<(), Error> {
    match candidate {
        Ok(block) => best.offer(block),
        Err(err @ Error::OffsetOverflow { .. }) => {
            debug!("skipping candidate: {err}");
            *overflow = Some(err);
        }
        Err(err) => return Err(err),
    }
    Ok(())
}

// RLE streams and deltas are reused across keyframe candidates, so each one
// is only built once per depth.
struct FrameCodes<'a> {
    pixels: &'a [Vec<u8>],
    bpp: u8,
    rle: HashMap<usize, Vec<u8>>,
    deltas: HashMap<(usize, usize), Vec<u8>>,
}

impl<'a> FrameCodes<'a> {
    fn new(pixels: &'a [Vec<u8>], bpp: u8) -> Self {
        Self {
            pixels,
            bpp,
            rle: HashMap::new(),
            deltas: HashMap::new(),
        }
    }

    fn keyframe(&mut self, frame: usize) -> &[u8] {
        let (pixels, bpp) = (self.pixels, self.bpp);
        self.rle
            .entry(frame)
            .or_insert_with(|| rle::encode(&pixels[frame], bpp))
    }

    fn delta(&mut self, key: usize, frame: usize) -> &[u8] {
        let pixels = self.pixels;
        self.deltas
            .entry((key, frame))
            .or_insert_with(|| delta::encode(&pixels[key], &pixels[frame]))
    }
}

pub fn encode_keyframe_delta(anim: &Animation) -> Result<EncodedBlock, Error> {
    let bbox = bbox::animation_bbox(anim.frames(), anim.width);
    let cropped = anim
        .frames()
        .iter()
        .map(|f| bbox::crop(f, anim.width, bbox))
        .collect::<Vec<_>>();

    // Quantizing is a bijection on the colors in use, so distances (and
    // therefore assignments) are the same at every depth.
    let distances = DistanceTable::new(&cropped);
    let keysets = keyframes::candidates(anim.frame_count());

    let mut best = Smallest::new();
    let mut overflow = None;
    for depth in Depth::choices(&cropped) {
        let pixels = cropped.iter().map(|f| depth.apply(f)).collect::<Vec<_>>();
        let mut codes = FrameCodes::new(&pixels, depth.bpp);

        for keys in keysets.iter() {
            let assignments = distances.assign(keys);
            let block = write_keyframe_delta(
                anim,
                &depth,
                bbox,
                keys,
                assignments,
                &mut codes,
            );
            offer_fitting(&mut best, &mut overflow, block)?;
        }
    }

    best.into_inner().ok_or_else(|| {
        overflow.unwrap_or_else(|| Error::NoFrames {
            name: anim.name.clone(),
        })
    })
}

fn write_keyframe_delta(
    anim: &Animation,
    depth: &Depth,
    bbox: BBox,
    keys: &[usize],
    assignments: Vec<usize>,
    codes: &mut FrameCodes,
) -> Result<EncodedBlock, Error> {
    let n = anim.frame_count();
    let mut out = Vec::new();
    depth.write_prefix(&mut out, n, BlockKind::KeyframeDelta);

    out.push(keys.len() as u8);
    out.extend(bbox.to_bytes());
    out.extend(keys.iter().map(|&k| k as u8));

    let mut data = Vec::new();
    for &key in keys {
        let rle = codes.keyframe(key);
        push_u16(&mut out, offset16(anim, rle.len())?);
        data.extend_from_slice(rle);
    }

    out.extend(assignments.iter().map(|&a| a as u8));

    let mut deltas = Vec::with_capacity(n);
    for (frame, &assigned) in assignments.iter().enumerate() {
        push_u16(&mut out, offset16(anim, data.len() + deltas.len())?);
        deltas.extend_from_slice(codes.delta(keys[assigned], frame));
    }

    out.extend(data);
    out.extend(deltas);

    Ok(EncodedBlock {
        bpp: depth.bpp,
        geometry: Geometry::KeyframeDelta {
            bbox,
            keys: keys.to_vec(),
            assignments,
        },
        bytes: out,
    })
}

pub fn encode_per_frame(anim: &Animation) -> Result<EncodedBlock, Error> {
    let crops = anim
        .frames()
        .iter()
        .map(|f| {
            let bbox = bbox::frame_bbox(f, anim.width);
            (bbox, bbox::crop(f, anim.width, bbox))
        })
        .collect::<Vec<_>>();
    let boxes = crops.iter().map(|(bbox, _)| *bbox).collect::<Vec<_>>();
    let pixels = crops.iter().map(|(_, p)| p).collect::<Vec<_>>();

    let mut best = Smallest::new();
    let mut overflow = None;
    for depth in Depth::choices(&pixels) {
        let block = write_per_frame(anim, &depth, &crops).map(|bytes| {
            EncodedBlock {
                bpp: depth.bpp,
                geometry: Geometry::PerFrame {
                    boxes: boxes.clone(),
                },
                bytes,
            }
        });
        offer_fitting(&mut best, &mut overflow, block)?;
    }

    best.into_inner().ok_or_else(|| {
        overflow.unwrap_or_else(|| Error::NoFrames {
            name: anim.name.clone(),
        })
    })
}

fn write_per_frame(
    anim: &Animation,
    depth: &Depth,
    crops: &[(BBox, Vec<u8>)],
) -> Result<Vec<u8>, Error> {
    let mut out = Vec::new();
    depth.write_prefix(&mut out, anim.frame_count(), BlockKind::PerFrame);

    let mut data = Vec::new();
    for (bbox, pixels) in crops {
        push_u16(&mut out, offset16(anim, data.len())?);
        data.extend(bbox.to_bytes());
        if !bbox.is_empty() {
            data.extend(rle::encode(&depth.apply(pixels), depth.bpp));
        }
    }
    out.extend(data);
    Ok(out)
}

fn check_bbox(
    bbox: BBox,
    width: usize,
    height: usize,
) -> Result<BBox, DecodeError> {
    if bbox.x + bbox.width > width || bbox.y + bbox.height > height {
        return Err(DecodeError::BadBoundingBox {
            bbox: bbox.to_bytes(),
        });
    }
    Ok(bbox)
}

fn read_offsets(
    r: &mut ByteReader,
    count: usize,
    expected: &'static str,
) -> Result<Vec<usize>, DecodeError> {
    (0..count)
        .map(|_| r.u16(expected).map(usize::from))
        .collect()
}

/// Rebuild every full-size frame of an encoded block. Pixels outside the
/// stored boxes come back transparent.
pub fn decode_block(
    data: &[u8],
    width: usize,
    height: usize,
) -> Result<Vec<Vec<u8>>, DecodeError> {
    let mut r = ByteReader::new(data);
    let n = r.u8("frame count")? as usize;
    let kind = BlockKind::from_byte(r.u8("block type")?)?;
    let bpp = r.u8("bit depth")?;
    if !(1..=4).contains(&bpp) {
        return Err(DecodeError::BadBitDepth(bpp));
    }

    let palette = if bpp < 4 {
        let packed = r.bytes(palette::packed_len(bpp), "block palette")?;
        Some(Palette::from_packed(packed, bpp))
    } else {
        None
    };
    let restore = |indices: Vec<u8>| match &palette {
        Some(palette) => palette::dequantize(&indices, palette),
        None => Ok(indices),
    };

    let mut frames = Vec::with_capacity(n);
    match kind {
        BlockKind::KeyframeDelta => {
            let key_count = r.u8("key count")? as usize;
            let bbox = check_bbox(
                BBox::from_bytes(r.array("bounding box")?),
                width,
                height,
            )?;
            r.bytes(key_count, "key indices")?;
            let sizes = read_offsets(&mut r, key_count, "key size")?;
            let assignments = r.bytes(n, "key assignments")?;
            let offsets = read_offsets(&mut r, n, "delta offset")?;
            let blob = r.rest();

            let mut keyframes = Vec::with_capacity(key_count);
            let mut pos = 0;
            for size in sizes {
                let chunk = blob.get(pos..pos + size).ok_or(
                    DecodeError::UnexpectedEof {
                        expected: "keyframe data",
                    },
                )?;
                keyframes.push(rle::decode_exact(chunk, bpp, bbox.area())?.0);
                pos += size;
            }

            for (&assigned, &offset) in assignments.iter().zip(offsets.iter()) {
                let mut pixels = keyframes
                    .get(assigned as usize)
                    .ok_or(DecodeError::BadKeyReference(assigned as usize))?
                    .clone();
                let delta = blob.get(offset..).ok_or(
                    DecodeError::UnexpectedEof {
                        expected: "delta data",
                    },
                )?;
                delta::decode(delta, &mut pixels)?;
                frames.push(bbox::uncrop(&restore(pixels)?, bbox, width, height));
            }
        }
        BlockKind::PerFrame => {
            let offsets = read_offsets(&mut r, n, "frame offset")?;
            let blob = r.rest();

            for offset in offsets {
                let mut fr = ByteReader::new(blob.get(offset..).ok_or(
                    DecodeError::UnexpectedEof {
                        expected: "frame data",
                    },
                )?);
                let bbox = check_bbox(
                    BBox::from_bytes(fr.array("frame bounding box")?),
                    width,
                    height,
                )?;
                let pixels = if bbox.is_empty() {
                    Vec::new()
                } else {
                    rle::decode_exact(fr.rest(), bpp, bbox.area())?.0
                };
                frames.push(bbox::uncrop(&restore(pixels)?, bbox, width, height));
            }
        }
    }

    Ok(frames)
}

#[cfg(test)]
mod tests {
    use quickcheck::{Arbitrary, Gen};
    use quickcheck_macros::quickcheck;

    use super::*;
    use crate::TRANSPARENT;

    const T: u8 = TRANSPARENT;

    #[derive(Clone, Debug)]
    struct SmallAnimation(Animation);

    impl Arbitrary for SmallAnimation {
        fn arbitrary(g: &mut Gen) -> Self {
            let width = usize::from(u8::arbitrary(g) % 6) + 1;
            let height = usize::from(u8::arbitrary(g) % 6) + 1;
            let count = usize::from(u8::arbitrary(g) % 5) + 1;
            let colors = [0, 1, 7, 9, T, T, T];
            let frames = (0..count)
                .map(|_| {
                    (0..width * height)
                        .map(|_| *g.choose(&colors).unwrap_or(&T))
                        .collect()
                })
                .collect();
            match Animation::new("arb", width, height, frames) {
                Ok(anim) => Self(anim),
                Err(err) => panic!("generated a bad animation: {err}"),
            }
        }
    }

    #[quickcheck]
    fn never_larger_than_either_encoding(anim: SmallAnimation) -> bool {
        let anim = anim.0;
        let best = encode_animation(&anim).unwrap();
        let kd = encode_keyframe_delta(&anim).unwrap();
        let pf = encode_per_frame(&anim).unwrap();
        best.len() <= kd.len() && best.len() <= pf.len()
    }

    #[quickcheck]
    fn blocks_decode_to_frames(anim: SmallAnimation) -> bool {
        let anim = anim.0;
        let (w, h) = (anim.width, anim.height);
        [
            encode_keyframe_delta(&anim).unwrap(),
            encode_per_frame(&anim).unwrap(),
        ]
        .iter()
        .all(|block| decode_block(block.bytes(), w, h).unwrap() == anim.frames())
    }

    fn noisy_frames() -> Vec<Vec<u8>> {
        // 16 different colors, so no runs to speak of
        let first = (0..16).collect::<Vec<u8>>();
        let mut third = first.clone();
        third[5] = 9;
        vec![first.clone(), first, third]
    }

    #[test]
    fn repeated_frame_is_an_empty_delta() {
        let anim = Animation::new("blink", 4, 4, noisy_frames()).unwrap();
        let block = encode_animation(&anim).unwrap();
        assert_eq!(block.kind(), BlockKind::KeyframeDelta);
        assert_eq!(block.bpp, 4);

        let Geometry::KeyframeDelta {
            keys, assignments, ..
        } = &block.geometry
        else {
            panic!("expected a keyframe block");
        };
        assert!((1..=2).contains(&keys.len()));
        assert_eq!(keys, &vec![0]);

        // prefix(3) + key_count(1) + bbox(4) + keys(k) + sizes(2k) + assignments(3)
        let k = keys.len();
        let offsets_at = 3 + 1 + 4 + k + 2 * k + 3;
        let data_at = offsets_at + 2 * 3;
        let bytes = block.bytes();
        let second =
            u16::from_le_bytes([bytes[offsets_at + 2], bytes[offsets_at + 3]]);
        assert_eq!(bytes[data_at + second as usize], 0);
        assert_eq!(keys[assignments[1]], 0);

        let frames = decode_block(bytes, 4, 4).unwrap();
        assert_eq!(frames, anim.frames());
    }

    #[test]
    fn byte_layout_of_keyframe_block() {
        let frames = vec![vec![T, 1, 1, T], vec![T, 1, 2, T]];
        let anim = Animation::new("tiny", 4, 1, frames).unwrap();
        let block = encode_keyframe_delta(&anim).unwrap();
        // bbox is 2x1 at (1, 0). The 1bpp palette would cost a byte more
        // than it saves, so raw indices win.
        assert_eq!(block.bpp, 4);
        assert_eq!(
            block.bytes(),
            &[
                2, 0, 4, // frame count, type, bpp
                1, 1, 0, 2, 1, // key count, bbox
                0, // key index
                1, 0, // key size
                0, 0, // assignments
                1, 0, 2, 0, // delta offsets
                0x11, // key: two of color 1
                0, // frame 0: no change
                1, 1, 0, 2, // frame 1: position 1 -> color 2
            ][..]
        );
    }

    #[test]
    fn transparent_frames_per_frame() {
        let frames = vec![vec![T; 6], vec![T, T, 3, T, T, T]];
        let anim = Animation::new("flash", 3, 2, frames).unwrap();
        let block = encode_per_frame(&anim).unwrap();
        assert_eq!(
            block.geometry,
            Geometry::PerFrame {
                boxes: vec![BBox::EMPTY, BBox::new(2, 0, 1, 1)]
            }
        );
        assert_eq!(decode_block(block.bytes(), 3, 2).unwrap(), anim.frames());
    }

    #[test]
    fn fully_transparent_animation() {
        let anim = Animation::new("gone", 2, 2, vec![vec![T; 4]; 3]).unwrap();
        let block = encode_animation(&anim).unwrap();
        assert_eq!(decode_block(block.bytes(), 2, 2).unwrap(), anim.frames());
    }

    // Deterministic noise over colors 0..=13, so there is nothing to crop
    // and runs are short.
    fn noise(seed: u32, len: usize) -> Vec<u8> {
        let mut state = seed.wrapping_mul(2654435761).wrapping_add(7);
        (0..len)
            .map(|_| {
                state = state.wrapping_mul(1103515245).wrapping_add(12345);
                ((state >> 16) % 14) as u8
            })
            .collect()
    }

    #[test]
    fn oversized_candidates_drop_out() {
        let frames = vec![noise(1, 200 * 200), noise(2, 200 * 200)];
        let anim = Animation::new("big", 200, 200, frames).unwrap();

        // Two keys would put the second delta past 64k; one key does not.
        let kd = encode_keyframe_delta(&anim).unwrap();
        assert_eq!(kd.key_count(), Some(1));
        assert!(encode_per_frame(&anim).is_ok());

        let best = encode_animation(&anim).unwrap();
        let decoded = decode_block(best.bytes(), 200, 200).unwrap();
        assert_eq!(decoded, anim.frames());
    }

    #[test]
    fn overflow_when_nothing_fits() {
        let frames = (0..3).map(|i| noise(i, 255 * 255)).collect();
        let anim = Animation::new("huge", 255, 255, frames).unwrap();
        assert!(matches!(
            encode_animation(&anim),
            Err(Error::OffsetOverflow { .. })
        ));
    }

    #[test]
    fn rejects_unknown_type() {
        assert_eq!(
            decode_block(&[1, 7, 4], 2, 2),
            Err(DecodeError::UnknownBlockType(7))
        );
    }
}
