//! Signal smoothing
//!
//! Sliding-window mean over the last N valid samples. The window is cleared
//! on every absent sample so a post-gap average never mixes in pre-gap values.

use crate::types::{Sample, SmoothedSignal};
use std::collections::VecDeque;

/// Fixed-size moving-average filter for one signal
#[derive(Debug, Clone)]
pub struct SignalSmoother {
    history: VecDeque<f64>,
    window_size: usize,
}

impl SignalSmoother {
    /// Create a smoother averaging at most `window_size` samples
    pub fn new(window_size: usize) -> Self {
        let window_size = window_size.max(1);
        Self {
            history: VecDeque::with_capacity(window_size),
            window_size,
        }
    }

    /// Feed one sample and return the current smoothed value
    pub fn push(&mut self, sample: Sample) -> SmoothedSignal {
        let value = match sample {
            Sample::Valid(v) => v,
            Sample::Absent => {
                self.reset();
                return SmoothedSignal::absent();
            }
        };

        self.history.push_back(value);
        while self.history.len() > self.window_size {
            self.history.pop_front();
        }

        let sum: f64 = self.history.iter().sum();
        SmoothedSignal {
            value: Some(sum / self.history.len() as f64),
            window_fill: self.history.len(),
        }
    }

    /// Drop all history
    pub fn reset(&mut self) {
        self.history.clear();
    }

    pub fn window_fill(&self) -> usize {
        self.history.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean_over_partial_window() {
        let mut smoother = SignalSmoother::new(4);
        smoother.push(Sample::Valid(0.2));
        let out = smoother.push(Sample::Valid(0.4));

        assert!((out.value.unwrap() - 0.3).abs() < 1e-9);
        assert_eq!(out.window_fill, 2);
    }

    #[test]
    fn test_oldest_sample_evicted() {
        let mut smoother = SignalSmoother::new(3);
        for v in [1.0, 2.0, 3.0, 4.0, 5.0] {
            smoother.push(Sample::Valid(v));
        }
        // Window holds 3, 4, 5
        let out = smoother.push(Sample::Valid(6.0));
        assert!((out.value.unwrap() - 5.0).abs() < 1e-9);
        assert_eq!(out.window_fill, 3);
    }

    #[test]
    fn test_absent_sample_clears_history() {
        let mut smoother = SignalSmoother::new(8);
        for _ in 0..8 {
            smoother.push(Sample::Valid(0.3));
        }

        let gap = smoother.push(Sample::Absent);
        assert_eq!(gap, SmoothedSignal::absent());
        assert_eq!(smoother.window_fill(), 0);

        // First sample after a gap stands alone
        let out = smoother.push(Sample::Valid(0.1));
        assert_eq!(out.value, Some(0.1));
        assert_eq!(out.window_fill, 1);
    }

    #[test]
    fn test_zero_is_a_real_value() {
        let mut smoother = SignalSmoother::new(2);
        let out = smoother.push(Sample::Valid(0.0));
        assert_eq!(out.value, Some(0.0));
    }
}
