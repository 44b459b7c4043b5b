// Tiled maps as level geometry.
//
// Every finite tile layer becomes a map layer, in file order. Object layers
// become entities. Only the first tileset is sliced from the tileset image,
// so cells drawn from any other tileset are left empty.
//
// Tiled numbers tiles by their position in the tileset image, while slicing
// drops blank and repeated tiles. Cells and flags are translated through the
// slice's grid, folding a repeated tile's transform into the cell's.

use anyhow::{bail, Result};
use log::warn;
use tiled::{
    FiniteTileLayer, LayerTile, ObjectLayer, Properties, PropertyValue,
    TileLayer,
};
use tilepack::{
    CellPacking, Entity, LayerGeometry, LevelGeometry, SlicedTileset, TileRef,
    Transform,
};

const FLAG_COUNT: usize = 256;

fn int_property(props: &Properties, key: &str) -> Option<i32> {
    match props.get(key)? {
        PropertyValue::IntValue(v) => Some(*v),
        PropertyValue::FloatValue(v) => Some(*v as i32),
        _ => None,
    }
}

fn packing_property(props: &Properties) -> Result<CellPacking> {
    match props.get("packing") {
        None => Ok(CellPacking::Flattened),
        Some(PropertyValue::StringValue(s)) => match s.to_lowercase().as_str()
        {
            "flattened" => Ok(CellPacking::Flattened),
            "flipbits" | "flip_bits" => Ok(CellPacking::FlipBits),
            other => bail!("unknown layer packing {other:?}"),
        },
        Some(other) => bail!("layer packing must be a string, got {other:?}"),
    }
}

fn scroll_property(props: &Properties) -> f32 {
    match props.get("scroll") {
        Some(PropertyValue::FloatValue(v)) => *v,
        Some(PropertyValue::IntValue(v)) => *v as f32,
        _ => 1.0,
    }
}

pub fn process_level(
    map: &tiled::Map,
    sliced: &SlicedTileset,
) -> Result<LevelGeometry> {
    let width = map.width as usize;
    let height = map.height as usize;
    let mut layers = Vec::new();
    let mut entities = Vec::new();

    for layer in map.layers() {
        if let Some(objects) = layer.as_object_layer() {
            entities.extend(make_entities(map, &objects)?);
            continue;
        }

        let ftlayer = match layer.as_tile_layer() {
            Some(TileLayer::Finite(ftlayer)) => ftlayer,
            Some(TileLayer::Infinite(_)) => {
                warn!("skipping infinite layer {:?}", layer.name);
                continue;
            }
            None => continue,
        };

        if ftlayer.width() as usize != width
            || ftlayer.height() as usize != height
        {
            bail!(
                "layer {:?} is {}x{}, the map is {width}x{height}",
                layer.name,
                ftlayer.width(),
                ftlayer.height()
            );
        }

        layers.push(LayerGeometry {
            cells: TileIterator::new(&ftlayer)
                .map(|tile| tile_ref(tile, sliced))
                .collect(),
            packing: packing_property(&layer.properties)?,
            scroll: scroll_property(&layer.properties),
        });
    }

    let spawn = match (
        int_property(&map.properties, "spawn_x"),
        int_property(&map.properties, "spawn_y"),
    ) {
        (Some(x), Some(y)) => u16::try_from(x).ok().zip(u16::try_from(y).ok()),
        _ => None,
    };

    let geometry = LevelGeometry {
        width,
        height,
        layers,
        spawn,
        flags: sliced.tile_flags(&grid_flags(map)),
        band_colors: None,
        entities,
    };
    geometry.validate()?;
    Ok(geometry)
}

fn tile_ref(
    tile: Option<LayerTile>,
    sliced: &SlicedTileset,
) -> Option<TileRef> {
    let tile = tile?;
    if tile.tileset_index() != 0 {
        warn!("ignoring tile from tileset {}", tile.tileset_index());
        return None;
    }
    let placed = TileRef::new(
        tile.id() as usize,
        Transform::from_tiled(tile.flip_h, tile.flip_v, tile.flip_d),
    );
    let resolved = sliced.resolve(placed);
    if resolved.is_none() {
        warn!("tile {} is blank or outside the tileset image", tile.id());
    }
    resolved
}

/// Per-tile `flags` properties of the first tileset, by grid position.
fn grid_flags(map: &tiled::Map) -> Vec<u8> {
    let Some(tileset) = map.tilesets().first() else {
        return Vec::new();
    };

    let mut flags = Vec::new();
    for (id, tile) in tileset.tiles() {
        let id = id as usize;
        let Some(value) = int_property(&tile.properties, "flags") else {
            continue;
        };
        if id >= FLAG_COUNT {
            warn!("tile {id} has flags but only {FLAG_COUNT} are stored");
            continue;
        }
        if flags.len() <= id {
            flags.resize(id + 1, 0);
        }
        flags[id] = value as u8;
    }
    flags
}

fn make_entities(map: &tiled::Map, layer: &ObjectLayer) -> Result<Vec<Entity>> {
    let (tw, th) = (map.tile_width as f32, map.tile_height as f32);
    layer
        .objects()
        .map(|obj| {
            let kind = int_property(&obj.properties, "kind").unwrap_or(0);
            let group = int_property(&obj.properties, "group").unwrap_or(0);
            let x = (obj.x / tw).floor() as i64;
            let y = (obj.y / th).floor() as i64;
            let byte = |v: i64, what: &str| match u8::try_from(v) {
                Ok(b) => Ok(b),
                Err(_) => bail!("object {} has {what} {v} out of range", obj.id()),
            };
            Ok(Entity {
                kind: byte(kind.into(), "kind")?,
                x: byte(x, "x")?,
                y: byte(y, "y")?,
                group: byte(group.into(), "group")?,
            })
        })
        .collect()
}

struct TileIterator<'a, 'map> {
    x: usize,
    y: usize,
    width: usize,
    height: usize,
    src: &'a FiniteTileLayer<'map>,
}

impl<'a, 'map> TileIterator<'a, 'map> {
    fn new(src: &'a FiniteTileLayer<'map>) -> Self {
        Self {
            x: 0,
            y: 0,
            width: src.width() as usize,
            height: src.height() as usize,
            src,
        }
    }
}

impl<'a, 'map> Iterator for TileIterator<'a, 'map> {
    type Item = Option<LayerTile<'map>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.x >= self.width {
            self.x = 0;
            self.y += 1;
        }

        if self.y >= self.height {
            return None;
        }

        let result = self.src.get_tile(self.x as i32, self.y as i32);
        self.x += 1;
        Some(result)
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use image::{Rgba, RgbaImage};
    use tiled::Loader;
    use tilepack::slice_tileset_indexed;

    use super::*;

    // 2x2 tileset: a marked tile, a blank one, a plain grey one, and the
    // marked tile mirrored.
    fn tileset() -> SlicedTileset {
        let img = RgbaImage::from_fn(32, 32, |x, y| {
            let (lx, ly) = (x % 16, y % 16);
            let marked = |x: u32| x < 3 && ly == 0;
            match (x / 16, y / 16) {
                (0, 0) if marked(lx) => Rgba([255, 255, 255, 255]),
                (1, 1) if marked(15 - lx) => Rgba([255, 255, 255, 255]),
                (1, 0) => Rgba([0, 0, 0, 0]),
                (0, 1) => Rgba([90, 90, 90, 255]),
                _ => Rgba([0, 0, 0, 255]),
            }
        });
        slice_tileset_indexed(&img).unwrap()
    }

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<map version="1.10" orientation="orthogonal" renderorder="right-down" width="2" height="2" tilewidth="16" tileheight="16" infinite="0" nextlayerid="4" nextobjectid="2">
 <properties>
  <property name="spawn_x" type="int" value="1"/>
  <property name="spawn_y" type="int" value="0"/>
 </properties>
 <tileset firstgid="1" name="tiles" tilewidth="16" tileheight="16" tilecount="4" columns="2">
  <image source="tiles.png" width="32" height="32"/>
  <tile id="2">
   <properties>
    <property name="flags" type="int" value="3"/>
   </properties>
  </tile>
 </tileset>
 <layer id="1" name="front" width="2" height="2">
  <data encoding="csv">
1,2,
3,2147483652
</data>
 </layer>
 <layer id="2" name="back" width="2" height="2">
  <properties>
   <property name="scroll" type="float" value="0.5"/>
   <property name="packing" value="flipbits"/>
  </properties>
  <data encoding="csv">
4,4,
4,0
</data>
 </layer>
 <objectgroup id="3" name="entities">
  <object id="1" x="16" y="17">
   <properties>
    <property name="kind" type="int" value="4"/>
   </properties>
  </object>
 </objectgroup>
</map>
"#;

    #[test]
    fn reads_layers_and_properties() {
        let path = std::env::temp_dir()
            .join(format!("cartbuild-tmx-{}.tmx", std::process::id()));
        fs::write(&path, SAMPLE).unwrap();
        let map = Loader::new().load_tmx_map(&path).unwrap();
        fs::remove_file(&path).unwrap();

        let sliced = tileset();
        assert_eq!(sliced.tiles.len(), 2);

        let level = process_level(&map, &sliced).unwrap();
        assert_eq!((level.width, level.height), (2, 2));
        assert_eq!(level.spawn, Some((1, 0)));
        assert_eq!(level.layers.len(), 2);
        // The grey tile sits at grid position 2 but is kept second.
        assert_eq!(level.flags, vec![0, 3]);

        let plain = |t| Some(TileRef::new(t, Transform::IDENTITY));
        let front = &level.layers[0];
        assert_eq!(front.packing, CellPacking::Flattened);
        // Position 0 is kept tile 0 and position 1 is blank.
        assert_eq!(front.cells[0], plain(0));
        assert_eq!(front.cells[1], None);
        assert_eq!(front.cells[2], plain(1));
        // Mirroring the mirrored copy draws kept tile 0 as is.
        assert_eq!(front.cells[3], plain(0));

        let back = &level.layers[1];
        assert_eq!(back.packing, CellPacking::FlipBits);
        assert_eq!(back.scroll, 0.5);
        assert_eq!(
            back.cells,
            vec![
                Some(TileRef::new(0, Transform::new(0, true, false))),
                Some(TileRef::new(0, Transform::new(0, true, false))),
                Some(TileRef::new(0, Transform::new(0, true, false))),
                None
            ]
        );

        assert_eq!(
            level.entities,
            vec![Entity {
                kind: 4,
                x: 1,
                y: 1,
                group: 0
            }]
        );
    }
}
