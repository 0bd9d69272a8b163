use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

pub mod app;
pub mod canvas;
pub mod config;
pub mod drawing;
pub mod geometry;
pub mod quadrants;
pub mod sprites;
pub mod things;

pub use app::{
    run_app, run_app_with_metrics, AppError, InputAction, InputState, LoopConfig,
    LoopMetricsSnapshot, MetricsHandle, RenderPath, Stage, StageController, StageError, Viewport,
    SLOW_FRAME_ENV_VAR,
};
pub use canvas::{Canvas, CanvasFactory, Rgba, SoftwareCanvasFactory};
pub use config::{load_settings, load_settings_or_default, ConfigError, EngineSettings};
pub use drawing::{Compositor, CompositorSettings, DrawError, RefillStats};
pub use geometry::{Bounds, Positionable};
pub use quadrants::{EdgeDirection, Quadrant, QuadsError, QuadsKeeper, QuadsKeeperSettings};
pub use sprites::{SpriteDecoder, SpriteError, SpriteImage, SpriteLibrary};
pub use things::{Thing, ThingId, ThingStore, ThingStoreError};

pub const ROOT_ENV_VAR: &str = "GAMESTARTR_ROOT";

/// Files the engine reads, all hanging off one project root.
#[derive(Debug, Clone)]
pub struct AppPaths {
    pub root: PathBuf,
    pub settings_file: PathBuf,
    pub sprites_dir: PathBuf,
}

impl AppPaths {
    pub fn under(root: PathBuf) -> Self {
        Self {
            settings_file: root.join(config::SETTINGS_FILE),
            sprites_dir: root.join("assets").join("sprites"),
            root,
        }
    }
}

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("{var} could not be read: {source}")]
    EnvVar {
        var: &'static str,
        #[source]
        source: env::VarError,
    },
    #[error("cannot locate the running executable: {0}")]
    CurrentExe(#[source] std::io::Error),
    #[error("executable {0} sits in no directory")]
    ExeHasNoParent(PathBuf),
    #[error(
        "{var} points at {path}, which is not a project root \
(expected Cargo.toml next to assets/ or gamestartr.json)"
    )]
    InvalidEnvRoot { var: &'static str, path: PathBuf },
    #[error(
        "no project root above {start_dir} (expected Cargo.toml next to assets/ or \
gamestartr.json); set {var} to the directory holding them"
    )]
    RootNotFound {
        start_dir: PathBuf,
        var: &'static str,
    },
}

/// Resolves the project root from `GAMESTARTR_ROOT`, falling back to the nearest root above the
/// executable.
pub fn resolve_app_paths() -> Result<AppPaths, StartupError> {
    let root = match root_from_env(env::var(ROOT_ENV_VAR))? {
        Some(root) => root,
        None => root_above_executable()?,
    };
    Ok(AppPaths::under(root))
}

fn root_from_env(value: Result<String, env::VarError>) -> Result<Option<PathBuf>, StartupError> {
    let value = match value {
        Ok(value) => value,
        Err(env::VarError::NotPresent) => return Ok(None),
        Err(source) => {
            return Err(StartupError::EnvVar {
                var: ROOT_ENV_VAR,
                source,
            })
        }
    };
    let path = canonical_or_raw(Path::new(&value));
    if !looks_like_root(&path) {
        return Err(StartupError::InvalidEnvRoot {
            var: ROOT_ENV_VAR,
            path,
        });
    }
    Ok(Some(path))
}

fn root_above_executable() -> Result<PathBuf, StartupError> {
    let exe = env::current_exe().map_err(StartupError::CurrentExe)?;
    let Some(exe_dir) = exe.parent() else {
        return Err(StartupError::ExeHasNoParent(exe.clone()));
    };
    find_root_above(exe_dir).ok_or_else(|| StartupError::RootNotFound {
        start_dir: canonical_or_raw(exe_dir),
        var: ROOT_ENV_VAR,
    })
}

fn find_root_above(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| looks_like_root(dir))
        .map(canonical_or_raw)
}

fn looks_like_root(dir: &Path) -> bool {
    dir.join("Cargo.toml").is_file()
        && (dir.join("assets").is_dir() || dir.join(config::SETTINGS_FILE).is_file())
}

fn canonical_or_raw(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}
