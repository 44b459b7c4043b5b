// JSON level records, as written by the level editor.
//
// Cells hold a tileset index, with 255 (or anything negative) meaning empty.
// A record either has one top-level `map` / `mapXform` pair or a `layers`
// list of them.

use std::{fs, path::Path};

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use tilepack::{
    CellPacking, Entity, LayerGeometry, LevelGeometry, TileRef, Transform,
};

const EMPTY_CELL: i64 = 255;
const FLAG_COUNT: usize = 256;

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
struct LayerRecord {
    #[serde(default)]
    map: Vec<Vec<i64>>,
    #[serde(default)]
    map_xform: Vec<Vec<u8>>,
    #[serde(default)]
    packing: Option<String>,
    #[serde(default)]
    scroll: Option<f32>,
}

#[derive(Deserialize, Debug)]
struct EntityRecord {
    #[serde(rename = "type")]
    kind: u8,
    x: u8,
    y: u8,
    #[serde(default)]
    group: u8,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct LevelRecord {
    width: usize,
    height: usize,
    #[serde(default = "no_spawn")]
    spawn_x: i64,
    #[serde(default = "no_spawn")]
    spawn_y: i64,
    #[serde(flatten)]
    single: LayerRecord,
    #[serde(default)]
    layers: Vec<LayerRecord>,
    #[serde(default)]
    flags: Vec<u8>,
    band_colors: Option<Vec<u8>>,
    #[serde(default)]
    entities: Vec<EntityRecord>,
}

fn no_spawn() -> i64 {
    -1
}

fn parse_packing(name: Option<&str>) -> Result<CellPacking> {
    match name.map(str::to_lowercase).as_deref() {
        None | Some("flattened") => Ok(CellPacking::Flattened),
        Some("flipbits") | Some("flip_bits") => Ok(CellPacking::FlipBits),
        Some(other) => bail!("unknown layer packing {other:?}"),
    }
}

impl LayerRecord {
    fn to_geometry(&self, width: usize, height: usize) -> Result<LayerGeometry> {
        // Short rows and missing rows are empty.
        let cells = (0..height)
            .flat_map(|y| (0..width).map(move |x| (x, y)))
            .map(|(x, y)| {
                let tile = self.map.get(y).and_then(|row| row.get(x)).copied();
                let xform = self
                    .map_xform
                    .get(y)
                    .and_then(|row| row.get(x))
                    .copied()
                    .unwrap_or(0);
                match tile {
                    Some(t) if (0..EMPTY_CELL).contains(&t) => Some(TileRef::new(
                        t as usize,
                        Transform::from_packed(xform),
                    )),
                    _ => None,
                }
            })
            .collect();

        Ok(LayerGeometry {
            cells,
            packing: parse_packing(self.packing.as_deref())?,
            scroll: self.scroll.unwrap_or(1.0),
        })
    }
}

fn spawn_point(x: i64, y: i64) -> Option<(u16, u16)> {
    match (u16::try_from(x), u16::try_from(y)) {
        (Ok(x), Ok(y)) => Some((x, y)),
        _ => None,
    }
}

pub fn parse_level(text: &str) -> Result<LevelGeometry> {
    let record: LevelRecord = serde_json::from_str(text)?;
    let (width, height) = (record.width, record.height);

    let layers = if record.layers.is_empty() {
        vec![record.single.to_geometry(width, height)?]
    } else {
        if !record.single.map.is_empty() {
            bail!("level has both a top-level map and a layer list");
        }
        record
            .layers
            .iter()
            .map(|layer| layer.to_geometry(width, height))
            .collect::<Result<Vec<_>>>()?
    };

    let mut flags = record.flags;
    flags.truncate(FLAG_COUNT);

    let geometry = LevelGeometry {
        width,
        height,
        layers,
        spawn: spawn_point(record.spawn_x, record.spawn_y),
        flags,
        band_colors: record.band_colors,
        entities: record
            .entities
            .iter()
            .map(|e| Entity {
                kind: e.kind,
                x: e.x,
                y: e.y,
                group: e.group,
            })
            .collect(),
    };
    geometry.validate()?;
    Ok(geometry)
}

pub fn load_level(path: &Path) -> Result<LevelGeometry> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    parse_level(&text).with_context(|| format!("parsing {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_layer_record() {
        let level = parse_level(
            r#"{
                "width": 3, "height": 2, "spawnX": 1, "spawnY": 0,
                "map": [[0, 255, 4], [-1, 2]],
                "mapXform": [[0, 0, 5]],
                "flags": [0, 3],
                "bandColors": [0, 1, 2, 3, 4]
            }"#,
        )
        .unwrap();

        assert_eq!(level.spawn, Some((1, 0)));
        assert_eq!(level.layers.len(), 1);
        let cells = &level.layers[0].cells;
        assert_eq!(cells.len(), 6);
        assert_eq!(cells[0], Some(TileRef::new(0, Transform::IDENTITY)));
        assert_eq!(cells[1], None);
        assert_eq!(
            cells[2],
            Some(TileRef::new(4, Transform::new(1, true, false)))
        );
        assert_eq!(cells[3], None);
        assert_eq!(cells[4], Some(TileRef::new(2, Transform::IDENTITY)));
        assert_eq!(cells[5], None);
        assert_eq!(level.band_colors, Some(vec![0, 1, 2, 3, 4]));
    }

    #[test]
    fn layered_record() {
        let level = parse_level(
            r#"{
                "width": 1, "height": 1,
                "layers": [
                    {"map": [[1]]},
                    {"map": [[2]], "packing": "flipbits", "scroll": 0.25}
                ],
                "entities": [{"type": 2, "x": 0, "y": 0}]
            }"#,
        )
        .unwrap();

        assert_eq!(level.spawn, None);
        assert_eq!(level.layers.len(), 2);
        assert_eq!(level.layers[1].packing, CellPacking::FlipBits);
        assert_eq!(level.layers[1].scroll, 0.25);
        assert_eq!(level.entities[0].kind, 2);
    }

    #[test]
    fn rejects_bad_records() {
        assert!(parse_level(r#"{"height": 1}"#).is_err());
        assert!(parse_level(r#"{"width": 0, "height": 1}"#).is_err());
        assert!(parse_level(
            r#"{"width": 1, "height": 1, "layers": [{"packing": "zigzag"}]}"#
        )
        .is_err());
    }
}
