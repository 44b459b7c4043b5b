// Everything the runtime code needs to know about the packed data that
// isn't in the regions themselves.

use itertools::Itertools;
use serde::Serialize;
use spritecodec::{Animation, TRANSPARENT};
use tilepack::{BuiltLevel, CellPacking};

use crate::{region::Region, sprites::PackedSprites};

/// Used when a frame has no body pixels at all.
const DEFAULT_ANCHOR: u8 = 15;
const BODY_COLOR: u8 = 0;

#[derive(Serialize, Debug)]
pub struct RegionInfo {
    pub used: usize,
    pub capacity: usize,
    pub overflow: usize,
}

impl From<&Region> for RegionInfo {
    fn from(region: &Region) -> Self {
        Self {
            used: region.used(),
            capacity: region.capacity,
            overflow: region.overflow(),
        }
    }
}

#[derive(Serialize, Debug)]
pub struct AnimationInfo {
    pub name: String,
    /// 1-based, the way the runtime numbers animations.
    pub id: usize,
    pub frames: usize,
    pub offset: usize,
    pub size: usize,
    pub kind: &'static str,
    pub bpp: u8,
    pub keyframes: Option<usize>,
    pub anchors: Vec<u8>,
}

#[derive(Serialize, Debug)]
pub struct SpriteInfo {
    pub region: RegionInfo,
    pub cell_width: usize,
    pub cell_height: usize,
    pub transparent: u8,
    pub animations: Vec<AnimationInfo>,
}

#[derive(Serialize, Debug)]
pub struct LayerInfo {
    pub mode: String,
    pub flip_bits: bool,
    pub scroll: f32,
    pub size: usize,
}

#[derive(Serialize, Debug)]
pub struct MapInfo {
    pub region: RegionInfo,
    pub width: usize,
    pub height: usize,
    pub spawn: Option<(u16, u16)>,
    pub tiles: usize,
    /// Editor flags for runtime tile `id`, at index `id - 1`.
    pub tile_flags: Vec<u8>,
    pub layers: Vec<LayerInfo>,
    pub entities: usize,
}

#[derive(Serialize, Debug)]
pub struct Manifest {
    pub sprites: SpriteInfo,
    pub map: Option<MapInfo>,
}

/// Horizontal center of each frame's body (color 0) pixels.
pub fn body_anchors(anim: &Animation) -> Vec<u8> {
    anim.frames()
        .iter()
        .map(|frame| {
            let xs = frame
                .iter()
                .enumerate()
                .filter(|&(_, &c)| c == BODY_COLOR)
                .map(|(i, _)| i % anim.width);
            match xs.minmax().into_option() {
                Some((lo, hi)) => ((lo + hi) / 2) as u8,
                None => DEFAULT_ANCHOR,
            }
        })
        .collect()
}

impl Manifest {
    pub fn new(
        anims: &[Animation],
        sprites: &PackedSprites,
        map: Option<(&BuiltLevel, &Region)>,
    ) -> Self {
        let animations = anims
            .iter()
            .zip(&sprites.blocks)
            .zip(&sprites.offsets)
            .enumerate()
            .map(|(i, ((anim, block), &offset))| AnimationInfo {
                name: anim.name.clone(),
                id: i + 1,
                frames: anim.frame_count(),
                offset,
                size: block.len(),
                kind: block.kind().short_name(),
                bpp: block.bpp,
                keyframes: block.key_count(),
                anchors: body_anchors(anim),
            })
            .collect();

        Self {
            sprites: SpriteInfo {
                region: RegionInfo::from(&sprites.region),
                cell_width: sprites.cell_width,
                cell_height: sprites.cell_height,
                transparent: TRANSPARENT,
                animations,
            },
            map: map.map(|(level, region)| MapInfo {
                region: RegionInfo::from(region),
                width: level.width,
                height: level.height,
                spawn: level.spawn,
                tiles: level.pool.len(),
                tile_flags: level.pool.flags().to_vec(),
                layers: level
                    .layers
                    .iter()
                    .map(|layer| LayerInfo {
                        mode: format!("{:?}", layer.encoded.mode),
                        flip_bits: layer.packing == CellPacking::FlipBits,
                        scroll: layer.scroll,
                        size: layer.encoded.len(),
                    })
                    .collect(),
                entities: level.entities.len(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anchors_center_on_body_pixels() {
        let t = TRANSPARENT;
        let anim = Animation::new(
            "idle",
            4,
            2,
            vec![
                vec![t, 0, 0, t, t, t, t, t],
                vec![0, t, t, t, t, t, t, 0],
                vec![t, 3, 3, t, t, t, t, t],
            ],
        )
        .unwrap();
        assert_eq!(body_anchors(&anim), vec![1, 1, DEFAULT_ANCHOR]);
    }
}
