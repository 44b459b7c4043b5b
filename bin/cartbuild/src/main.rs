use std::{fs, path::PathBuf};

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Parser};
use env_logger::Env;
use image::ImageReader;
use log::{info, warn};
use tiled::Loader;

use cartpack::{pack_map, pack_sprites, Manifest};
use tilepack::{
    build_level, slice_tileset_indexed, BandPalette, LevelGeometry,
    SlicedTileset,
};

mod config;
mod frames;
mod level;
mod tmx;

use config::{BuildConfig, LevelEntry};
use frames::ColorMapper;

/// Build the sprite and map regions of a cart from source art
#[derive(Parser, Debug)]
#[command(version, about, long_about = None, disable_help_flag = true)]
struct Args {
    /// Build file (TOML)
    config: PathBuf,
    /// Sprite region output (overrides the build file)
    #[arg(long)]
    sprites_out: Option<PathBuf>,
    /// Map region output (overrides the build file)
    #[arg(long)]
    map_out: Option<PathBuf>,
    /// Manifest output (overrides the build file)
    #[arg(long)]
    manifest_out: Option<PathBuf>,
    /// More logging; repeat for more (RUST_LOG wins if set)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
    /// Print help information
    #[arg(long, action=clap::ArgAction::HelpLong)]
    help: Option<bool>,
}

fn load_geometry(
    entry: &LevelEntry,
    sliced: &SlicedTileset,
) -> Result<LevelGeometry> {
    match entry.path.extension().and_then(|e| e.to_str()) {
        Some("json") => level::load_level(&entry.path),
        Some("tmx") => {
            let map = Loader::new()
                .load_tmx_map(&entry.path)
                .with_context(|| format!("loading {}", entry.path.display()))?;
            tmx::process_level(&map, sliced)
        }
        _ => bail!("unrecognized level type: {}", entry.path.display()),
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    let default_level = match args.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(
        Env::default().default_filter_or(default_level),
    )
    .init();

    let mut config = BuildConfig::load(&args.config)?;
    if let Some(p) = args.sprites_out {
        config.output.sprites = p;
    }
    if let Some(p) = args.map_out {
        config.output.map = p;
    }
    if let Some(p) = args.manifest_out {
        config.output.manifest = p;
    }

    if config.animations.is_empty() {
        warn!("no animations configured, the sprite region will be empty");
    }

    let mut mapper = ColorMapper::new();
    let anims = config
        .animations
        .iter()
        .map(|entry| {
            frames::load_animation(
                &entry.name,
                &entry.strip,
                config.cell_width,
                config.cell_height,
                entry.frames,
                &mut mapper,
            )
        })
        .collect::<Result<Vec<_>>>()?;

    let sprites = pack_sprites(&anims, config.cell_width, config.cell_height)?;
    let out = &config.output;
    fs::write(&out.sprites, sprites.region.padded())
        .with_context(|| format!("writing {}", out.sprites.display()))?;

    let level = match &config.level {
        None => None,
        Some(entry) => {
            let img = ImageReader::open(&entry.tileset)
                .with_context(|| {
                    format!("opening {}", entry.tileset.display())
                })?
                .decode()?;
            let sliced = slice_tileset_indexed(&img)?;
            let geometry = load_geometry(entry, &sliced)?;
            let built = build_level(
                &geometry,
                &sliced.tiles,
                &BandPalette::default(),
            )?;
            let region = pack_map(&built)?;
            fs::write(&out.map, region.padded())
                .with_context(|| format!("writing {}", out.map.display()))?;
            Some((built, region))
        }
    };

    let manifest = Manifest::new(
        &anims,
        &sprites,
        level.as_ref().map(|(built, region)| (built, region)),
    );
    fs::write(&out.manifest, serde_json::to_string_pretty(&manifest)?)
        .with_context(|| format!("writing {}", out.manifest.display()))?;

    info!(
        "wrote {} animations{}",
        anims.len(),
        if level.is_some() { " and a map" } else { "" }
    );

    Ok(())
}
