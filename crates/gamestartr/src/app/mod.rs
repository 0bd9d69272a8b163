mod input;
mod loop_runner;
mod metrics;
mod stage;
mod viewport;

pub use input::{InputAction, InputState};
pub use loop_runner::{
    run_app, run_app_with_metrics, AppError, LoopConfig, StageController, SLOW_FRAME_ENV_VAR,
};
pub use metrics::{LoopMetricsSnapshot, MetricsHandle};
pub use stage::{RenderPath, Stage, StageError};
pub use viewport::Viewport;
