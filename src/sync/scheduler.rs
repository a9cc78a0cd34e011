//! # Frame Scheduler
//!
//! Frame budget accounting for the tick loop.
//!
//! ## Features
//!
//! - **Fixed budget**: one tick per frame (default 16.67 ms)
//! - **Overrun tracking**: a tick that runs past the budget counts as a
//!   dropped frame
//! - **Immediate follow-up**: a tick that leaves work in the queue asks for
//!   the next tick to run without waiting for the frame boundary

use std::time::{Duration, Instant};

/// Timing of one finished frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameReport {
    pub duration: Duration,
    pub overran: bool,
}

#[derive(Debug)]
pub struct FrameScheduler {
    budget: Duration,
    running: bool,
    last_tick: Option<Instant>,
    frame_start: Option<Instant>,
    frames: u64,
    dropped_frames: u64,
    last_frame_time: Duration,
    immediate: bool,
}

impl FrameScheduler {
    pub fn new(budget: Duration) -> Self {
        Self {
            budget,
            running: false,
            last_tick: None,
            frame_start: None,
            frames: 0,
            dropped_frames: 0,
            last_frame_time: Duration::ZERO,
            immediate: false,
        }
    }

    pub fn start(&mut self) {
        self.running = true;
    }

    pub fn stop(&mut self) {
        self.running = false;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn budget(&self) -> Duration {
        self.budget
    }

    /// Check if a tick is due now
    pub fn should_tick(&self) -> bool {
        if !self.running {
            return false;
        }
        if self.immediate {
            return true;
        }
        match self.last_tick {
            Some(time) => time.elapsed() >= self.budget,
            None => true,
        }
    }

    /// Time left before the next frame boundary
    pub fn time_until_next_tick(&self) -> Duration {
        if self.immediate {
            return Duration::ZERO;
        }
        match self.last_tick {
            Some(time) => self.budget.saturating_sub(time.elapsed()),
            None => Duration::ZERO,
        }
    }

    pub fn begin_frame(&mut self) -> Instant {
        let now = Instant::now();
        self.frame_start = Some(now);
        self.last_tick = Some(now);
        now
    }

    /// Close the current frame. `residual` marks work left in the queue.
    pub fn end_frame(&mut self, residual: bool) -> FrameReport {
        let duration = self
            .frame_start
            .take()
            .map(|start| start.elapsed())
            .unwrap_or_default();
        self.record_frame(duration, residual)
    }

    pub(crate) fn record_frame(&mut self, duration: Duration, residual: bool) -> FrameReport {
        self.frames += 1;
        self.last_frame_time = duration;
        self.immediate = residual;
        let overran = duration > self.budget;
        if overran {
            self.dropped_frames += 1;
            tracing::warn!(
                "[Scheduler] Frame took {:.2} ms, budget {:.2} ms",
                duration.as_secs_f64() * 1000.0,
                self.budget.as_secs_f64() * 1000.0
            );
        }
        FrameReport { duration, overran }
    }

    /// The last frame left residual work
    pub fn needs_immediate_tick(&self) -> bool {
        self.immediate
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn dropped_frames(&self) -> u64 {
        self.dropped_frames
    }

    pub fn last_frame_time(&self) -> Duration {
        self.last_frame_time
    }
}
