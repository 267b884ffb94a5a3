//! Frame scheduling
//!
//! The relay runs one cycle per display refresh rather than on an
//! arbitrary timer. Missed ticks are skipped, never bunched up.

use async_trait::async_trait;
use std::time::Duration;
use tokio::time::{interval, Interval, MissedTickBehavior};

/// Source of frame ticks
#[async_trait]
pub trait FrameScheduler: Send {
    /// Wait for the next frame. Returns false when the scheduler is done.
    async fn next_frame(&mut self) -> bool;
}

/// Ticks at a fixed refresh rate
pub struct IntervalScheduler {
    interval: Interval,
}

impl IntervalScheduler {
    /// Must be called within a tokio runtime
    pub fn new(period: Duration) -> Self {
        let mut interval = interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        Self { interval }
    }

    pub fn from_refresh_rate(hz: u32) -> Self {
        Self::new(Duration::from_secs_f64(1.0 / hz.max(1) as f64))
    }
}

#[async_trait]
impl FrameScheduler for IntervalScheduler {
    async fn next_frame(&mut self) -> bool {
        self.interval.tick().await;
        true
    }
}

/// Yields a fixed number of frames immediately, then stops
#[derive(Debug, Clone, Copy)]
pub struct CountedScheduler {
    remaining: usize,
}

impl CountedScheduler {
    pub fn new(frames: usize) -> Self {
        Self { remaining: frames }
    }
}

#[async_trait]
impl FrameScheduler for CountedScheduler {
    async fn next_frame(&mut self) -> bool {
        if self.remaining == 0 {
            return false;
        }
        self.remaining -= 1;
        tokio::task::yield_now().await;
        true
    }
}
