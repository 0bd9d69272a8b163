mod art;
mod controller;
mod settings;
mod spawner;

use gamestartr::sprites::SPRITE_MANIFEST_FILE;
use gamestartr::{
    load_settings, resolve_app_paths, run_app, AppError, Bounds, Compositor, ConfigError,
    DrawError, QuadsError, QuadsKeeper, SpriteError, SpriteLibrary, Stage, StageError, Thing,
};
use thiserror::Error;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::art::Facing;
use crate::controller::OverworldController;
use crate::settings::{
    default_engine_settings, load_overworld_config, OverworldConfig, OverworldConfigError,
    OVERWORLD_FILE, TILE,
};
use crate::spawner::MapSpawner;

#[derive(Debug, Error)]
enum OverworldError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Overworld(#[from] OverworldConfigError),
    #[error(transparent)]
    Sprites(#[from] SpriteError),
    #[error(transparent)]
    Quadrants(#[from] QuadsError),
    #[error(transparent)]
    Draw(#[from] DrawError),
    #[error(transparent)]
    Stage(#[from] StageError),
    #[error(transparent)]
    App(#[from] AppError),
}

fn main() {
    init_tracing();
    info!("=== Overworld Startup ===");

    if let Err(err) = run() {
        error!(error = %err, "startup_failed");
        std::process::exit(1);
    }
}

fn run() -> Result<(), OverworldError> {
    let paths = match resolve_app_paths() {
        Ok(paths) => Some(paths),
        Err(err) => {
            warn!(error = %err, "project_root_unresolved_using_defaults");
            None
        }
    };

    let settings = match &paths {
        Some(paths) if paths.settings_file.is_file() => load_settings(&paths.settings_file)?,
        _ => default_engine_settings(),
    };
    let config = match &paths {
        Some(paths) => load_overworld_config(&paths.root.join(OVERWORLD_FILE))?,
        None => OverworldConfig::default(),
    };

    let mut library = match &paths {
        Some(paths) if paths.sprites_dir.join(SPRITE_MANIFEST_FILE).is_file() => {
            SpriteLibrary::load_dir(&paths.sprites_dir)?
        }
        _ => SpriteLibrary::new(),
    };
    let loaded = library.len();
    art::register_missing(&mut library)?;
    info!(loaded, total = library.len(), "sprites_ready");

    let hero_left = ((settings.screen.width - TILE) / 2.0).floor();
    let hero_top = ((settings.screen.height - TILE) / 2.0).floor();
    let keep_clear =
        Bounds::from_pixels(hero_left - TILE, hero_top - TILE, TILE * 3.0, TILE * 3.0);
    let hero_speed = config.hero_speed;
    let mut spawner = MapSpawner::new(config, keep_clear);

    let keeper = QuadsKeeper::new(spawner.attach(settings.quads_keeper_settings()))?;
    let mut compositor = Compositor::new(
        settings.compositor_settings(),
        settings.viewport(),
        Box::new(library),
    )?;
    compositor.set_background(settings.screen.background);
    let mut stage = Stage::new(keeper, compositor).with_render_path(settings.drawing.render_path);

    let hero = stage.spawn(
        Thing::new("Hero", "Character", TILE, TILE)
            .with_class(Facing::Down.class())
            .at(hero_left, hero_top),
    )?;
    let report = spawner.apply(&mut stage)?;
    info!(
        scenery = report.spawned,
        render_path = ?stage.render_path(),
        "overworld_ready"
    );

    let controller = OverworldController::new(hero, spawner, hero_speed);
    run_app(settings.loop_config(), stage, Box::new(controller))?;
    info!("=== Overworld Shutdown ===");
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .compact()
        .init();
}
