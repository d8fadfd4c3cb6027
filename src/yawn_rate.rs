//! Trailing-window yawn counter
//!
//! Keeps the end timestamps of recent yawns in time order and drops those
//! older than the window on every update.

use crate::config::YawnRateConfig;
use std::collections::VecDeque;

#[derive(Debug, Clone)]
pub struct YawnRateWindow {
    window_secs: f64,
    max_yawns: usize,
    timestamps: VecDeque<f64>,
}

impl YawnRateWindow {
    pub fn new(config: &YawnRateConfig) -> Self {
        Self {
            window_secs: config.window_secs,
            max_yawns: config.max_yawns,
            timestamps: VecDeque::with_capacity(config.max_yawns + 1),
        }
    }

    /// Record a yawn that ended at `at`
    pub fn record(&mut self, at: f64) {
        self.timestamps.push_back(at);
    }

    /// Drop yawns that fell out of the window ending at `now`
    pub fn trim(&mut self, now: f64) {
        let cutoff = now - self.window_secs;
        while let Some(front) = self.timestamps.front() {
            if *front < cutoff {
                self.timestamps.pop_front();
            } else {
                break;
            }
        }
    }

    /// Yawns currently in the window
    pub fn count(&self) -> usize {
        self.timestamps.len()
    }

    /// Whether the window holds at least the configured number of yawns
    pub fn exceeded(&self) -> bool {
        self.timestamps.len() >= self.max_yawns
    }

    /// Yawns per minute over the window
    pub fn rate_per_minute(&self) -> f64 {
        (self.timestamps.len() as f64 / self.window_secs) * 60.0
    }
}
