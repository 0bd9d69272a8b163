use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::app::{LoopConfig, RenderPath, Viewport};
use crate::canvas::Rgba;
use crate::drawing::CompositorSettings;
use crate::quadrants::QuadsKeeperSettings;

pub const SETTINGS_FILE: &str = "gamestartr.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read settings file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid settings file {path} at '{field}': {message}")]
    Parse {
        path: PathBuf,
        field: String,
        message: String,
    },
}

/// Everything a game can tune without code: screen size, the Quadrant grid, the compositor,
/// and frame pacing. Every section and field is optional.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineSettings {
    pub screen: ScreenSettings,
    pub quadrants: QuadrantSettings,
    pub drawing: DrawingSettings,
    #[serde(rename = "loop")]
    pub frame_loop: FrameLoopSettings,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScreenSettings {
    pub width: f64,
    pub height: f64,
    pub background: Rgba,
}

impl Default for ScreenSettings {
    fn default() -> Self {
        Self {
            width: 320.0,
            height: 240.0,
            background: [0, 0, 0, 255],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct QuadrantSettings {
    pub num_rows: usize,
    pub num_cols: usize,
    pub quadrant_width: f64,
    pub quadrant_height: f64,
    pub group_names: Vec<String>,
    pub start_left: f64,
    pub start_top: f64,
}

impl Default for QuadrantSettings {
    fn default() -> Self {
        Self {
            num_rows: 5,
            num_cols: 6,
            quadrant_width: 64.0,
            quadrant_height: 60.0,
            group_names: ["Scenery", "Solid", "Character", "Text"]
                .into_iter()
                .map(str::to_string)
                .collect(),
            start_left: 0.0,
            start_top: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DrawingSettings {
    pub unitsize: f64,
    pub no_refill: bool,
    pub sprite_cache_cutoff: f64,
    pub framerate_skip: u32,
    pub epsilon: f32,
    pub render_path: RenderPath,
}

impl Default for DrawingSettings {
    fn default() -> Self {
        let compositor = CompositorSettings::default();
        Self {
            unitsize: compositor.unitsize,
            no_refill: compositor.no_refill,
            sprite_cache_cutoff: compositor.sprite_cache_cutoff,
            framerate_skip: compositor.framerate_skip,
            epsilon: compositor.epsilon,
            render_path: RenderPath::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FrameLoopSettings {
    pub window_title: String,
    pub window_scale: u32,
    pub target_tps: u32,
    pub max_frame_delta_ms: u64,
    pub max_ticks_per_frame: u32,
    pub metrics_log_interval_ms: u64,
    pub simulated_slow_frame_ms: u64,
    pub max_render_fps: Option<u32>,
}

impl Default for FrameLoopSettings {
    fn default() -> Self {
        let config = LoopConfig::default();
        Self {
            window_title: config.window_title,
            window_scale: config.window_scale,
            target_tps: config.target_tps,
            max_frame_delta_ms: config.max_frame_delta.as_millis() as u64,
            max_ticks_per_frame: config.max_ticks_per_frame,
            metrics_log_interval_ms: config.metrics_log_interval.as_millis() as u64,
            simulated_slow_frame_ms: config.simulated_slow_frame_ms,
            max_render_fps: config.max_render_fps,
        }
    }
}

impl EngineSettings {
    pub fn viewport(&self) -> Viewport {
        Viewport::new(self.screen.width, self.screen.height)
    }

    /// Grid settings without boundary callbacks; attach those with
    /// [`QuadsKeeperSettings::on_add`] and [`QuadsKeeperSettings::on_remove`].
    pub fn quads_keeper_settings(&self) -> QuadsKeeperSettings {
        let quadrants = &self.quadrants;
        QuadsKeeperSettings::new(
            quadrants.num_rows,
            quadrants.num_cols,
            quadrants.quadrant_width,
            quadrants.quadrant_height,
            quadrants.group_names.as_slice(),
        )
        .with_start(quadrants.start_left, quadrants.start_top)
    }

    pub fn compositor_settings(&self) -> CompositorSettings {
        CompositorSettings {
            unitsize: self.drawing.unitsize,
            no_refill: self.drawing.no_refill,
            sprite_cache_cutoff: self.drawing.sprite_cache_cutoff,
            framerate_skip: self.drawing.framerate_skip,
            epsilon: self.drawing.epsilon,
        }
    }

    pub fn loop_config(&self) -> LoopConfig {
        let frame_loop = &self.frame_loop;
        LoopConfig {
            window_title: frame_loop.window_title.clone(),
            window_scale: frame_loop.window_scale,
            target_tps: frame_loop.target_tps,
            max_frame_delta: Duration::from_millis(frame_loop.max_frame_delta_ms),
            max_ticks_per_frame: frame_loop.max_ticks_per_frame,
            metrics_log_interval: Duration::from_millis(frame_loop.metrics_log_interval_ms),
            simulated_slow_frame_ms: frame_loop.simulated_slow_frame_ms,
            max_render_fps: frame_loop.max_render_fps,
        }
    }
}

pub fn load_settings(path: &Path) -> Result<EngineSettings, ConfigError> {
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_settings(&raw, path)
}

/// Loads `path` when it exists, otherwise falls back to the defaults.
pub fn load_settings_or_default(path: &Path) -> Result<EngineSettings, ConfigError> {
    if path.is_file() {
        load_settings(path)
    } else {
        Ok(EngineSettings::default())
    }
}

fn parse_settings(raw: &str, path: &Path) -> Result<EngineSettings, ConfigError> {
    let deserializer = &mut serde_json::Deserializer::from_str(raw);
    serde_path_to_error::deserialize(deserializer).map_err(|error| ConfigError::Parse {
        path: path.to_path_buf(),
        field: error.path().to_string(),
        message: error.inner().to_string(),
    })
}
