use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::Deserialize;

fn default_sprites() -> PathBuf {
    PathBuf::from("sprites.bin")
}

fn default_map() -> PathBuf {
    PathBuf::from("map.bin")
}

fn default_manifest() -> PathBuf {
    PathBuf::from("manifest.json")
}

#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct AnimationEntry {
    pub name: String,
    /// Vertical strip of `cell_height`-tall frames.
    pub strip: PathBuf,
    /// Defaults to as many whole frames as the strip holds.
    pub frames: Option<usize>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct LevelEntry {
    pub tileset: PathBuf,
    /// `.json` level record or Tiled `.tmx` map.
    pub path: PathBuf,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct OutputEntry {
    #[serde(default = "default_sprites")]
    pub sprites: PathBuf,
    #[serde(default = "default_map")]
    pub map: PathBuf,
    #[serde(default = "default_manifest")]
    pub manifest: PathBuf,
}

impl Default for OutputEntry {
    fn default() -> Self {
        Self {
            sprites: default_sprites(),
            map: default_map(),
            manifest: default_manifest(),
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct BuildConfig {
    pub cell_width: usize,
    pub cell_height: usize,
    #[serde(default, rename = "animation")]
    pub animations: Vec<AnimationEntry>,
    pub level: Option<LevelEntry>,
    #[serde(default)]
    pub output: OutputEntry,
}

impl BuildConfig {
    pub fn parse(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Load a config file. Relative paths inside it are taken relative to
    /// the file's own directory.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let mut config = Self::parse(&text)
            .with_context(|| format!("parsing {}", path.display()))?;

        let base = path.parent().unwrap_or(Path::new(""));
        config.rebase(base);
        Ok(config)
    }

    fn rebase(&mut self, base: &Path) {
        let fix = |p: &mut PathBuf| *p = base.join(&*p);

        for anim in &mut self.animations {
            fix(&mut anim.strip);
        }
        if let Some(level) = &mut self.level {
            fix(&mut level.tileset);
            fix(&mut level.path);
        }
        fix(&mut self.output.sprites);
        fix(&mut self.output.map);
        fix(&mut self.output.manifest);
    }
}
