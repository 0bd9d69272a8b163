use std::fs;
use std::path::{Path, PathBuf};

use gamestartr::config::{DrawingSettings, FrameLoopSettings, QuadrantSettings, ScreenSettings};
use gamestartr::EngineSettings;
use serde::Deserialize;
use thiserror::Error;

use crate::art::GRASS;

pub const OVERWORLD_FILE: &str = "overworld.json";

/// Edge length of one map tile in pixels; scenery is placed on this grid.
pub const TILE: f64 = 16.0;

#[derive(Debug, Error)]
pub enum OverworldConfigError {
    #[error("failed to read overworld file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid overworld file {path} at '{field}': {message}")]
    Parse {
        path: PathBuf,
        field: String,
        message: String,
    },
}

/// Map generation and hero tuning. Densities are percentages of tiles.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OverworldConfig {
    pub seed: u64,
    pub tree_percent: u64,
    pub rock_percent: u64,
    pub flower_percent: u64,
    pub fence_percent: u64,
    pub pond_percent: u64,
    pub hero_speed: f64,
}

impl Default for OverworldConfig {
    fn default() -> Self {
        Self {
            seed: 0x5EED,
            tree_percent: 6,
            rock_percent: 3,
            flower_percent: 10,
            fence_percent: 1,
            pond_percent: 1,
            hero_speed: 72.0,
        }
    }
}

pub fn load_overworld_config(path: &Path) -> Result<OverworldConfig, OverworldConfigError> {
    if !path.is_file() {
        return Ok(OverworldConfig::default());
    }
    let raw = fs::read_to_string(path).map_err(|source| OverworldConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_overworld_config(&raw, path)
}

fn parse_overworld_config(
    raw: &str,
    path: &Path,
) -> Result<OverworldConfig, OverworldConfigError> {
    let deserializer = &mut serde_json::Deserializer::from_str(raw);
    serde_path_to_error::deserialize(deserializer).map_err(|error| {
        OverworldConfigError::Parse {
            path: path.to_path_buf(),
            field: error.path().to_string(),
            message: error.inner().to_string(),
        }
    })
}

/// Engine settings used when the project has no settings file: a 256x224 screen over a grid
/// with one spare tile-aligned cell on every side, so recycling never exposes the screen edge.
pub fn default_engine_settings() -> EngineSettings {
    EngineSettings {
        screen: ScreenSettings {
            width: 256.0,
            height: 224.0,
            background: GRASS,
        },
        quadrants: QuadrantSettings {
            num_rows: 6,
            num_cols: 7,
            quadrant_width: 64.0,
            quadrant_height: 64.0,
            group_names: ["Scenery", "Solid", "Character"]
                .into_iter()
                .map(str::to_string)
                .collect(),
            start_left: -64.0,
            start_top: -64.0,
        },
        drawing: DrawingSettings {
            sprite_cache_cutoff: 1024.0,
            ..DrawingSettings::default()
        },
        frame_loop: FrameLoopSettings {
            window_title: "Overworld".to_string(),
            window_scale: 3,
            ..FrameLoopSettings::default()
        },
    }
}
