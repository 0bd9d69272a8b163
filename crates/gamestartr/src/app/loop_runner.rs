use std::env;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use pixels::{Error as PixelsError, Pixels, SurfaceTexture};
use thiserror::Error;
use tracing::{info, warn};
use winit::dpi::LogicalSize;
use winit::error::{EventLoopError, OsError};
use winit::event::{ElementState, Event, KeyEvent, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::keyboard::PhysicalKey;
use winit::window::{Window, WindowBuilder};

use super::metrics::MetricsAccumulator;
use super::{InputAction, InputState, MetricsHandle, Stage, StageError};

pub const SLOW_FRAME_ENV_VAR: &str = "GAMESTARTR_SLOW_FRAME_MS";

#[derive(Debug, Clone)]
pub struct LoopConfig {
    pub window_title: String,
    /// Integer window scale applied to the stage's pixel size.
    pub window_scale: u32,
    pub target_tps: u32,
    pub max_frame_delta: Duration,
    pub max_ticks_per_frame: u32,
    pub metrics_log_interval: Duration,
    pub simulated_slow_frame_ms: u64,
    pub max_render_fps: Option<u32>,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            window_title: "GameStartr".to_string(),
            window_scale: 2,
            target_tps: 60,
            max_frame_delta: Duration::from_millis(250),
            max_ticks_per_frame: 5,
            metrics_log_interval: Duration::from_secs(1),
            simulated_slow_frame_ms: 0,
            max_render_fps: None,
        }
    }
}

/// Game logic driven at the fixed simulation rate. Movement and scrolling happen here; the loop
/// runs [`Stage::tick`] once per presented frame afterwards.
pub trait StageController {
    fn update(
        &mut self,
        stage: &mut Stage,
        input: &InputState,
        fixed_dt_seconds: f32,
    ) -> Result<(), StageError>;
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("failed to create event loop: {0}")]
    CreateEventLoop(#[source] EventLoopError),
    #[error("failed to create application window: {0}")]
    CreateWindow(#[source] OsError),
    #[error("failed to initialize pixel surface: {0}")]
    CreatePixels(#[source] PixelsError),
    #[error("event loop failed: {0}")]
    EventLoopRun(#[source] EventLoopError),
}

pub fn run_app(
    config: LoopConfig,
    stage: Stage,
    controller: Box<dyn StageController>,
) -> Result<(), AppError> {
    run_app_with_metrics(config, stage, controller, MetricsHandle::default())
}

/// Opens a window sized to the stage's screen times `window_scale` and runs the stage until the
/// window closes or Escape is pressed. Snapshots are published to `metrics_handle` once per
/// metrics interval.
pub fn run_app_with_metrics(
    config: LoopConfig,
    mut stage: Stage,
    mut controller: Box<dyn StageController>,
    metrics_handle: MetricsHandle,
) -> Result<(), AppError> {
    let (canvas_width, canvas_height) = stage.viewport().pixel_size();
    let window_scale = config.window_scale.max(1);

    let event_loop = EventLoop::new().map_err(AppError::CreateEventLoop)?;
    let window = Arc::new(
        WindowBuilder::new()
            .with_title(config.window_title.clone())
            .with_inner_size(LogicalSize::new(
                f64::from(canvas_width * window_scale),
                f64::from(canvas_height * window_scale),
            ))
            .build(&event_loop)
            .map_err(AppError::CreateWindow)?,
    );
    let mut presenter = Presenter::new(Arc::clone(&window), canvas_width, canvas_height)
        .map_err(AppError::CreatePixels)?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut pacer = FramePacer::new(&config, Instant::now());
    let slow_frame_delay = slow_frame_delay(config.simulated_slow_frame_ms);
    let metrics_interval = non_zero_or(config.metrics_log_interval, Duration::from_secs(1));
    let fixed_dt_seconds = pacer.fixed_dt.as_secs_f32();
    info!(
        target_tps = config.target_tps.max(1),
        max_frame_delta_ms = pacer.max_frame_delta.as_millis() as u64,
        max_ticks_per_frame = pacer.max_ticks_per_frame,
        metrics_log_interval_ms = metrics_interval.as_millis() as u64,
        slow_frame_delay_ms = slow_frame_delay.as_millis() as u64,
        render_fps_cap = ?config.max_render_fps.filter(|fps| *fps > 0),
        canvas_width,
        canvas_height,
        window_scale,
        render_path = ?stage.render_path(),
        "loop_config"
    );

    let mut input = InputState::default();
    let mut metrics = MetricsAccumulator::new(metrics_interval);

    event_loop
        .run(move |event, window_target| match event {
            Event::WindowEvent { window_id, event } if window_id == window.id() => match event {
                WindowEvent::CloseRequested => {
                    info!(reason = "window_close", "shutdown_requested");
                    window_target.exit();
                }
                WindowEvent::Resized(size) => {
                    if let Err(error) = presenter.resize(size.width, size.height) {
                        warn!(error = %error, "surface_resize_failed");
                        window_target.exit();
                    }
                }
                WindowEvent::ScaleFactorChanged { .. } => {
                    let size = window.inner_size();
                    if let Err(error) = presenter.resize(size.width, size.height) {
                        warn!(error = %error, "surface_resize_failed");
                        window_target.exit();
                    }
                }
                WindowEvent::KeyboardInput { event, .. } => {
                    if apply_key_event(&mut input, &event) {
                        info!(reason = "escape_key", "shutdown_requested");
                        window_target.exit();
                    }
                }
                WindowEvent::RedrawRequested => {
                    if !slow_frame_delay.is_zero() {
                        thread::sleep(slow_frame_delay);
                    }

                    let now = Instant::now();
                    let steps = pacer.begin_frame(now);
                    for _ in 0..steps.ticks {
                        if let Err(error) = controller.update(&mut stage, &input, fixed_dt_seconds)
                        {
                            warn!(error = %error, "stage_update_failed");
                            window_target.exit();
                            return;
                        }
                        metrics.record_tick();
                    }
                    if !steps.dropped.is_zero() {
                        warn!(
                            dropped_backlog_ms = steps.dropped.as_millis() as u64,
                            max_ticks_per_frame = pacer.max_ticks_per_frame,
                            "sim_clamp_triggered"
                        );
                    }

                    let wait = pacer.render_wait(Instant::now());
                    if !wait.is_zero() {
                        thread::sleep(wait);
                    }
                    match stage.tick() {
                        Ok(stats) => metrics.record_refill(stats),
                        Err(error) => {
                            warn!(error = %error, "stage_tick_failed");
                            window_target.exit();
                            return;
                        }
                    }
                    if let Err(error) = presenter.present(&stage) {
                        warn!(error = %error, "present_failed");
                        window_target.exit();
                    }
                    pacer.presented(Instant::now());
                    metrics.record_frame(steps.frame_dt);

                    if let Some(snapshot) = metrics.maybe_snapshot(now) {
                        metrics_handle.publish(snapshot);
                        info!(
                            fps = snapshot.fps,
                            tps = snapshot.tps,
                            frame_time_ms = snapshot.frame_time_ms,
                            quadrants_per_frame = snapshot.quadrants_per_frame,
                            things_per_frame = snapshot.things_per_frame,
                            skipped_frames = snapshot.skipped_frames,
                            thing_count = stage.things().len(),
                            quadrant_count = stage.quadrants().quadrant_count(),
                            "loop_metrics"
                        );
                    }
                }
                _ => {}
            },
            Event::AboutToWait => window.request_redraw(),
            Event::LoopExiting => info!(ticks = stage.ticks(), "shutdown"),
            _ => {}
        })
        .map_err(AppError::EventLoopRun)
}

/// Simulation ticks owed by one presented frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FrameSteps {
    ticks: u32,
    /// Backlog thrown away because the per-frame tick cap was hit.
    dropped: Duration,
    /// Unclamped time since the previous frame.
    frame_dt: Duration,
}

/// Fixed-timestep bookkeeping: frame time accumulates into a backlog that is paid out in whole
/// ticks, and an optional render cap spaces out presents.
#[derive(Debug)]
struct FramePacer {
    fixed_dt: Duration,
    max_frame_delta: Duration,
    max_ticks_per_frame: u32,
    render_interval: Option<Duration>,
    backlog: Duration,
    last_frame: Instant,
    last_present: Instant,
}

impl FramePacer {
    fn new(config: &LoopConfig, now: Instant) -> Self {
        let target_tps = config.target_tps.max(1);
        Self {
            fixed_dt: Duration::from_secs_f64(1.0 / f64::from(target_tps)),
            max_frame_delta: non_zero_or(config.max_frame_delta, Duration::from_millis(250)),
            max_ticks_per_frame: config.max_ticks_per_frame.max(1),
            render_interval: config
                .max_render_fps
                .filter(|fps| *fps > 0)
                .map(|fps| Duration::from_secs_f64(1.0 / f64::from(fps))),
            backlog: Duration::ZERO,
            last_frame: now,
            last_present: now,
        }
    }

    /// Adds the clamped time since the previous frame to the backlog and takes as many whole
    /// ticks from it as the per-frame cap allows. A backlog still owing a full tick after that is
    /// dropped instead of carried, so a stall never snowballs.
    fn begin_frame(&mut self, now: Instant) -> FrameSteps {
        let frame_dt = now.saturating_duration_since(self.last_frame);
        self.last_frame = now;

        let mut backlog = self
            .backlog
            .saturating_add(frame_dt.min(self.max_frame_delta));
        let mut ticks = 0;
        while backlog >= self.fixed_dt && ticks < self.max_ticks_per_frame {
            backlog -= self.fixed_dt;
            ticks += 1;
        }
        let dropped = if backlog >= self.fixed_dt {
            std::mem::take(&mut backlog)
        } else {
            Duration::ZERO
        };
        self.backlog = backlog;

        FrameSteps {
            ticks,
            dropped,
            frame_dt,
        }
    }

    /// How long to wait before presenting so presents stay under the render cap.
    fn render_wait(&self, now: Instant) -> Duration {
        self.render_interval.map_or(Duration::ZERO, |interval| {
            interval.saturating_sub(now.saturating_duration_since(self.last_present))
        })
    }

    fn presented(&mut self, now: Instant) {
        self.last_present = now;
    }
}

/// Copies the stage's primary canvas into the window's pixel buffer. The buffer keeps the
/// canvas size; the surface follows the window and scales it.
struct Presenter {
    window: Arc<Window>,
    pixels: Pixels<'static>,
    buffer_width: u32,
    buffer_height: u32,
    warned_size_mismatch: bool,
}

impl Presenter {
    fn new(
        window: Arc<Window>,
        buffer_width: u32,
        buffer_height: u32,
    ) -> Result<Self, PixelsError> {
        let size = window.inner_size();
        let surface = SurfaceTexture::new(size.width, size.height, Arc::clone(&window));
        Ok(Self {
            pixels: Pixels::new(buffer_width, buffer_height, surface)?,
            window,
            buffer_width,
            buffer_height,
            warned_size_mismatch: false,
        })
    }

    /// Rebuilds the surface for the new window size; minimized windows are ignored.
    fn resize(&mut self, width: u32, height: u32) -> Result<(), PixelsError> {
        if width == 0 || height == 0 {
            return Ok(());
        }
        let surface = SurfaceTexture::new(width, height, Arc::clone(&self.window));
        self.pixels = Pixels::new(self.buffer_width, self.buffer_height, surface)?;
        Ok(())
    }

    fn present(&mut self, stage: &Stage) -> Result<(), PixelsError> {
        let source = stage.canvas().data();
        let frame = self.pixels.frame_mut();
        if frame.len() == source.len() {
            frame.copy_from_slice(source);
        } else if !self.warned_size_mismatch {
            self.warned_size_mismatch = true;
            warn!(
                frame_len = frame.len(),
                canvas_len = source.len(),
                "canvas_size_mismatch"
            );
        }
        self.pixels.render()
    }
}

/// Updates held actions from a key event. Returns true when the event requests shutdown.
fn apply_key_event(input: &mut InputState, key_event: &KeyEvent) -> bool {
    apply_physical_key(input, key_event.physical_key, key_event.state)
}

fn apply_physical_key(input: &mut InputState, key: PhysicalKey, state: ElementState) -> bool {
    let Some(action) = InputAction::from_physical_key(key) else {
        return false;
    };
    let pressed = state == ElementState::Pressed;
    input.set(action, pressed);
    action == InputAction::Quit && pressed
}

fn non_zero_or(value: Duration, fallback: Duration) -> Duration {
    if value.is_zero() {
        fallback
    } else {
        value
    }
}

/// Artificial per-frame delay: the environment variable wins over the configured value.
fn slow_frame_delay(configured_ms: u64) -> Duration {
    let millis = slow_frame_override(env::var(SLOW_FRAME_ENV_VAR)).unwrap_or(configured_ms);
    Duration::from_millis(millis)
}

fn slow_frame_override(raw: Result<String, env::VarError>) -> Option<u64> {
    match raw {
        Ok(value) => match value.trim().parse() {
            Ok(millis) => Some(millis),
            Err(_) => {
                warn!(env_var = SLOW_FRAME_ENV_VAR, value = %value, "slow_frame_env_invalid");
                None
            }
        },
        Err(env::VarError::NotPresent) => None,
        Err(error) => {
            warn!(env_var = SLOW_FRAME_ENV_VAR, error = %error, "slow_frame_env_unreadable");
            None
        }
    }
}
