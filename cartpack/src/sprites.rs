// Sprite region layout:
//
//   [anim_count][cell_w][cell_h][anim_offset u16 ...][block ...]
//
// Offsets are measured from the first block, so the header can grow without
// touching them.

use log::info;
use rayon::prelude::*;
use spritecodec::{
    bytes::{push_u16, ByteReader},
    decode_block, encode_animation, Animation, EncodedBlock,
};

use crate::{count8, offset16, region::Region, Error};

pub const SPRITE_REGION_SIZE: usize = 8192;

#[derive(Clone, Debug)]
pub struct PackedSprites {
    pub region: Region,
    pub cell_width: usize,
    pub cell_height: usize,
    pub blocks: Vec<EncodedBlock>,
    /// Start of each block, relative to the first one.
    pub offsets: Vec<usize>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnpackedSprites {
    pub cell_width: usize,
    pub cell_height: usize,
    pub animations: Vec<Vec<Vec<u8>>>,
}

fn cell_byte(width: usize, height: usize) -> Result<[u8; 2], Error> {
    match (u8::try_from(width), u8::try_from(height)) {
        (Ok(w), Ok(h)) if w > 0 && h > 0 => Ok([w, h]),
        _ => Err(spritecodec::Error::BadCellSize { width, height }.into()),
    }
}

/// Encode every animation (in parallel) and lay the blocks out in input
/// order.
pub fn pack_sprites(
    anims: &[Animation],
    cell_width: usize,
    cell_height: usize,
) -> Result<PackedSprites, Error> {
    let count = count8("animations", anims.len())?;
    let cell = cell_byte(cell_width, cell_height)?;

    if let Some(anim) = anims
        .iter()
        .find(|a| a.width != cell_width || a.height != cell_height)
    {
        return Err(Error::CellMismatch {
            name: anim.name.clone(),
            width: anim.width,
            height: anim.height,
            cell_width,
            cell_height,
        });
    }

    let blocks = anims
        .par_iter()
        .map(encode_animation)
        .collect::<Result<Vec<_>, _>>()?;

    let mut header = vec![count];
    header.extend(cell);
    let mut data: Vec<u8> = Vec::new();
    let mut offsets = Vec::with_capacity(blocks.len());
    for (anim, block) in anims.iter().zip(&blocks) {
        push_u16(&mut header, offset16("animation", data.len())?);
        offsets.push(data.len());
        data.extend(block.bytes());

        info!(
            "{}: {} frames, {} {}bpp, {} bytes",
            anim.name,
            anim.frame_count(),
            block.kind().short_name(),
            block.bpp,
            block.len()
        );
    }

    header.extend(data);
    Ok(PackedSprites {
        region: Region::new("sprites", SPRITE_REGION_SIZE, header),
        cell_width,
        cell_height,
        blocks,
        offsets,
    })
}

/// Read a sprite region back into full frames.
pub fn unpack_sprites(data: &[u8]) -> Result<UnpackedSprites, Error> {
    let mut r = ByteReader::new(data);
    let count = r.u8("animation count")? as usize;
    let [w, h] = r.array::<2>("cell size")?;
    let (cell_width, cell_height) = (w as usize, h as usize);

    let offsets = (0..count)
        .map(|_| r.u16("animation offset"))
        .collect::<Result<Vec<_>, _>>()?;
    let blocks = r.rest();

    let animations = offsets
        .into_iter()
        .map(|offset| {
            let block = blocks.get(offset as usize..).unwrap_or_default();
            decode_block(block, cell_width, cell_height)
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(UnpackedSprites {
        cell_width,
        cell_height,
        animations,
    })
}
