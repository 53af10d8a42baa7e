//! Gyro motion filter
//!
//! Integrates a gyro rate over the time since the previous sample and drops
//! results inside the dead zone. The same filter drives pointer movement and
//! gesture detection, with different thresholds.

use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Per-axis gain applied to gyro rate x elapsed milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MoveCoefficients {
    #[serde(default = "default_coefficient")]
    pub cx: f64,
    #[serde(default = "default_coefficient")]
    pub cy: f64,
}

impl Default for MoveCoefficients {
    fn default() -> Self {
        Self {
            cx: default_coefficient(),
            cy: default_coefficient(),
        }
    }
}

fn default_coefficient() -> f64 { 1.0 }

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionFilter {
    pub coefficients: MoveCoefficients,
    /// Dead zone in pixels
    pub threshold: i32,
}

impl MotionFilter {
    pub fn new(coefficients: MoveCoefficients, threshold: i32) -> Self {
        Self {
            coefficients,
            threshold,
        }
    }

    /// Filtered (dx, dy) for a gyro sample `dt_ms` after the previous one
    pub fn apply(&self, gx: i32, gy: i32, dt_ms: i64) -> (i32, i32) {
        let dt = dt_ms as f64;
        let dx = (f64::from(gx) * dt * self.coefficients.cx).round() as i32;
        let dy = (f64::from(gy) * dt * self.coefficients.cy).round() as i32;
        (self.dead_zone(dx), self.dead_zone(dy))
    }

    fn dead_zone(&self, v: i32) -> i32 {
        if v != 0 && v.abs() < self.threshold {
            0
        } else {
            v
        }
    }
}

/// Adds one second to a negative elapsed time. This only papers over a
/// clock read that went backwards; it is not a wraparound handler.
pub fn correct_delta(dt_ms: i64) -> i64 {
    if dt_ms < 0 {
        dt_ms + 1000
    } else {
        dt_ms
    }
}

/// Last sample time of one logical gyro stream
#[derive(Debug, Clone, Copy, Default)]
pub struct StreamClock {
    last: Option<Instant>,
}

impl StreamClock {
    pub fn new() -> Self {
        Self { last: None }
    }

    /// Record a sample at `now` and return milliseconds since the previous
    /// one, or `None` for the first sample of the stream.
    pub fn tick(&mut self, now: Instant) -> Option<i64> {
        let previous = self.last.replace(now)?;
        let dt_ms = match now.checked_duration_since(previous) {
            Some(elapsed) => elapsed.as_millis() as i64,
            None => -(previous.duration_since(now).as_millis() as i64),
        };
        Some(correct_delta(dt_ms))
    }

    /// Forget the previous sample so the next one is treated as first
    pub fn reset(&mut self) {
        self.last = None;
    }

    pub fn is_started(&self) -> bool {
        self.last.is_some()
    }
}
