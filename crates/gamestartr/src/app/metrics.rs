use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};

use crate::drawing::RefillStats;

/// Loop rates and redraw work averaged over one metrics interval.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LoopMetricsSnapshot {
    pub fps: f32,
    pub tps: f32,
    pub frame_time_ms: f32,
    /// Average Quadrants repainted per drawn frame.
    pub quadrants_per_frame: f32,
    /// Average Things drawn per drawn frame.
    pub things_per_frame: f32,
    /// Refills that `framerate_skip` turned into no-ops.
    pub skipped_frames: u32,
}

/// Read side of the loop metrics, shareable with other threads. A poisoned lock still yields
/// the last published snapshot.
#[derive(Clone, Debug, Default)]
pub struct MetricsHandle {
    latest: Arc<RwLock<LoopMetricsSnapshot>>,
}

impl MetricsHandle {
    pub fn snapshot(&self) -> LoopMetricsSnapshot {
        *self.latest.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn publish(&self, snapshot: LoopMetricsSnapshot) {
        *self.latest.write().unwrap_or_else(PoisonError::into_inner) = snapshot;
    }
}

#[derive(Debug, Default)]
struct IntervalCounts {
    frames: u32,
    ticks: u32,
    frame_time: Duration,
    drawn_frames: u32,
    skipped_frames: u32,
    quadrants_redrawn: u64,
    things_drawn: u64,
}

impl IntervalCounts {
    fn per_drawn_frame(&self, total: u64) -> f32 {
        match self.drawn_frames {
            0 => 0.0,
            drawn => total as f32 / drawn as f32,
        }
    }
}

#[derive(Debug)]
pub(crate) struct MetricsAccumulator {
    started: Instant,
    interval: Duration,
    counts: IntervalCounts,
}

impl MetricsAccumulator {
    pub(crate) fn new(interval: Duration) -> Self {
        Self {
            started: Instant::now(),
            interval,
            counts: IntervalCounts::default(),
        }
    }

    pub(crate) fn record_frame(&mut self, frame_dt: Duration) {
        self.counts.frames = self.counts.frames.saturating_add(1);
        self.counts.frame_time = self.counts.frame_time.saturating_add(frame_dt);
    }

    pub(crate) fn record_tick(&mut self) {
        self.counts.ticks = self.counts.ticks.saturating_add(1);
    }

    pub(crate) fn record_refill(&mut self, stats: RefillStats) {
        let counts = &mut self.counts;
        if stats.skipped_frame {
            counts.skipped_frames = counts.skipped_frames.saturating_add(1);
            return;
        }
        counts.drawn_frames = counts.drawn_frames.saturating_add(1);
        counts.quadrants_redrawn += stats.quadrants_redrawn as u64;
        counts.things_drawn += stats.things_drawn as u64;
    }

    /// Closes the interval once it has run its length, returning its averages.
    pub(crate) fn maybe_snapshot(&mut self, now: Instant) -> Option<LoopMetricsSnapshot> {
        let elapsed = now.saturating_duration_since(self.started);
        if elapsed < self.interval {
            return None;
        }
        let counts = std::mem::take(&mut self.counts);
        self.started = now;

        let seconds = elapsed.as_secs_f32().max(f32::EPSILON);
        let frame_time_ms = match counts.frames {
            0 => 0.0,
            frames => counts.frame_time.as_secs_f32() * 1000.0 / frames as f32,
        };
        Some(LoopMetricsSnapshot {
            fps: counts.frames as f32 / seconds,
            tps: counts.ticks as f32 / seconds,
            frame_time_ms,
            quadrants_per_frame: counts.per_drawn_frame(counts.quadrants_redrawn),
            things_per_frame: counts.per_drawn_frame(counts.things_drawn),
            skipped_frames: counts.skipped_frames,
        })
    }
}
