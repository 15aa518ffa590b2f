use std::sync::Arc;
use crate::genlock::{SharedAccumulator, WindowSnapshot};
use crate::types::{Micros, Period};

/// The statistics derived from one measurement window. All zero when the window held no
/// valid periods.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WindowStats {
    /// Mean frame period (µs).
    pub mean_period_us: f64,

    /// Frames per second, `1e6 / mean_period_us`.
    pub fps: f64,

    /// RMS deviation of the period from its mean (µs).
    pub rms_jitter_us: f64,

    /// Longest minus shortest period (µs).
    pub pp_jitter_us: Period,

    /// RMS jitter relative to the mean period, in parts per million.
    pub jitter_ppm: f64,
}

impl WindowStats {
    /// Derive the window statistics from a drained snapshot.
    pub fn from_snapshot(snapshot: &WindowSnapshot) -> Self {
        if snapshot.count == 0 || snapshot.sum == 0 {
            return Self::default();
        }

        let count = f64::from(snapshot.count);
        let mean_period_us = snapshot.sum as f64 / count;
        let fps = 1e6 / mean_period_us;

        // Var = E[p^2] - E[p]^2. Rounding can push this slightly below zero.
        let mean_sq = snapshot.sum_sq as f64 / count;
        let variance = (mean_sq - mean_period_us * mean_period_us).max(0.0);
        let rms_jitter_us = variance.sqrt();

        let pp_jitter_us = match (snapshot.min, snapshot.max) {
            (Some(min), Some(max)) if max >= min => max - min,
            _ => 0,
        };

        let jitter_ppm = rms_jitter_us / mean_period_us * 1e6;

        Self {
            mean_period_us,
            fps,
            rms_jitter_us,
            pp_jitter_us,
            jitter_ppm,
        }
    }
}

/// The outcome of one window: what was measured, and how long ago the last edge arrived.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WindowReport {
    /// Number of valid periods in the window.
    pub count: u32,

    pub stats: WindowStats,

    /// Time since the most recent edge, `None` if no edge has ever been seen.
    pub since_last_edge: Option<Micros>,
}

/// Drains the shared accumulator once per window and turns the totals into statistics.
#[derive(Debug, Clone)]
pub struct Aggregator {
    accumulator: Arc<SharedAccumulator>,
}

impl Aggregator {
    pub fn new(accumulator: Arc<SharedAccumulator>) -> Self {
        Self { accumulator }
    }

    /// Close the current window at time `now`.
    pub fn run_window(&self, now: Micros) -> WindowReport {
        let snapshot = self.accumulator.drain();

        WindowReport {
            count: snapshot.count,
            stats: WindowStats::from_snapshot(&snapshot),
            since_last_edge: snapshot.last_edge.map(|edge| now.saturating_sub(edge)),
        }
    }
}
