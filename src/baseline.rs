//! Baseline calibration
//!
//! During the first seconds of a session each signal's smoothed samples are
//! collected. At the end of the window a percentile of those samples (near
//! the top for the eye, the median for the mouth) becomes the subject's
//! reference, and the closed/drowsy thresholds are derived as fixed
//! fractions of it.

use crate::config::{EyeConfig, MouthConfig};
use crate::error::MonitorError;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Percentile of the collected eye samples used as the open-state reference
pub const REFERENCE_PERCENTILE: f64 = 0.95;

/// Percentile of the collected mouth samples used as the resting reference
pub const RESTING_PERCENTILE: f64 = 0.5;

/// How a baseline was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BaselineSource {
    Calibrated,
    Fallback,
}

/// Subject-specific reference and thresholds for one signal. Immutable once built.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Baseline {
    pub open_reference: f64,
    pub closed_threshold: f64,
    pub drowsy_threshold: f64,
    pub source: BaselineSource,
    /// Positive samples the reference was drawn from
    pub samples: usize,
}

impl Baseline {
    /// Derive thresholds from a measured reference
    pub fn from_reference(open_reference: f64, policy: &BaselinePolicy, samples: usize) -> Self {
        Self {
            open_reference,
            closed_threshold: open_reference * policy.closed_ratio,
            drowsy_threshold: open_reference * policy.drowsy_ratio,
            source: BaselineSource::Calibrated,
            samples,
        }
    }

    /// Baseline anchored on the static threshold, keeping the configured ratios
    pub fn fallback(policy: &BaselinePolicy) -> Self {
        Self {
            open_reference: policy.fallback_threshold / policy.closed_ratio,
            closed_threshold: policy.fallback_threshold,
            drowsy_threshold: policy.fallback_threshold * (policy.drowsy_ratio / policy.closed_ratio),
            source: BaselineSource::Fallback,
            samples: 0,
        }
    }

    pub fn is_calibrated(&self) -> bool {
        self.source == BaselineSource::Calibrated
    }

    fn validate(&self, name: &str) -> Result<(), MonitorError> {
        let finite = [self.open_reference, self.closed_threshold, self.drowsy_threshold]
            .iter()
            .all(|v| v.is_finite() && *v > 0.0);
        if !finite {
            return Err(MonitorError::InvalidBaseline(format!(
                "{} baseline values must be positive",
                name
            )));
        }
        if self.closed_threshold < self.drowsy_threshold {
            return Err(MonitorError::InvalidBaseline(format!(
                "{} closed_threshold ({}) is below drowsy_threshold ({})",
                name, self.closed_threshold, self.drowsy_threshold
            )));
        }
        Ok(())
    }
}

/// Ratios applied to a reference, plus the static threshold used on failure
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BaselinePolicy {
    /// Percentile of the positive samples taken as the reference
    pub reference_percentile: f64,
    pub closed_ratio: f64,
    pub drowsy_ratio: f64,
    pub fallback_threshold: f64,
}

impl BaselinePolicy {
    /// Blink dips sit at the low end of the calibration samples, so the
    /// reference is taken near the top.
    pub fn eye(config: &EyeConfig) -> Self {
        Self {
            reference_percentile: REFERENCE_PERCENTILE,
            closed_ratio: config.closed_ratio,
            drowsy_ratio: config.drowsy_ratio,
            fallback_threshold: config.default_threshold,
        }
    }

    /// The mouth has a single activation level: the resting reference scaled by
    /// the margin. Talking and yawn onsets sit at the high end of the samples,
    /// so the reference is the median.
    pub fn mouth(config: &MouthConfig) -> Self {
        Self {
            reference_percentile: RESTING_PERCENTILE,
            closed_ratio: config.yawn_margin,
            drowsy_ratio: config.yawn_margin,
            fallback_threshold: config.yawn_threshold,
        }
    }
}

/// Collects samples for a fixed duration and produces a [`Baseline`] exactly once
#[derive(Debug, Clone)]
pub struct BaselineCalibrator {
    label: &'static str,
    collected: Vec<f64>,
    start_time: f64,
    duration: f64,
    policy: BaselinePolicy,
    spent: bool,
}

impl BaselineCalibrator {
    pub fn new(label: &'static str, start_time: f64, duration: f64, policy: BaselinePolicy) -> Self {
        Self {
            label,
            collected: Vec::new(),
            start_time,
            duration,
            policy,
            spent: false,
        }
    }

    /// Record `value` while calibrating. The first call at or past the end of
    /// the window returns the baseline; later calls return `None`.
    pub fn feed(&mut self, value: f64, now: f64) -> Option<Baseline> {
        if self.spent {
            return None;
        }
        if !self.is_complete(now) {
            self.collected.push(value);
            return None;
        }
        Some(self.finish())
    }

    /// Whether the calibration window has elapsed at `now`
    pub fn is_complete(&self, now: f64) -> bool {
        now - self.start_time >= self.duration
    }

    /// Close the window and compute the baseline, falling back to the static
    /// threshold when no positive sample was collected.
    pub fn finish(&mut self) -> Baseline {
        self.spent = true;
        let samples = std::mem::take(&mut self.collected);

        match percentile_reference(samples, self.policy.reference_percentile) {
            Some((reference, count)) => {
                let baseline = Baseline::from_reference(reference, &self.policy, count);
                info!(
                    signal = self.label,
                    open_reference = reference,
                    closed_threshold = baseline.closed_threshold,
                    drowsy_threshold = baseline.drowsy_threshold,
                    samples = count,
                    "Calibration complete"
                );
                baseline
            }
            None => {
                warn!(
                    signal = self.label,
                    fallback_threshold = self.policy.fallback_threshold,
                    "Calibration collected no usable samples, using static threshold"
                );
                Baseline::fallback(&self.policy)
            }
        }
    }

    pub fn collected(&self) -> usize {
        self.collected.len()
    }

    pub fn is_spent(&self) -> bool {
        self.spent
    }
}

/// Value at `percentile` of the positive samples (no interpolation), with how many there were
fn percentile_reference(mut samples: Vec<f64>, percentile: f64) -> Option<(f64, usize)> {
    samples.retain(|v| v.is_finite() && *v > 0.0);
    if samples.is_empty() {
        return None;
    }
    samples.sort_by(f64::total_cmp);
    let index = ((samples.len() - 1) as f64 * percentile).floor() as usize;
    Some((samples[index], samples.len()))
}

/// Both signals' baselines, persisted so a later session can skip calibration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibratedBaselines {
    pub eye: Baseline,
    pub mouth: Baseline,
}

impl CalibratedBaselines {
    pub fn validate(&self) -> Result<(), MonitorError> {
        self.eye.validate("eye")?;
        self.mouth.validate("mouth")
    }

    /// Load baselines from JSON
    pub fn from_json(json: &str) -> Result<Self, MonitorError> {
        let baselines: CalibratedBaselines = serde_json::from_str(json)?;
        baselines.validate()?;
        Ok(baselines)
    }

    /// Serialize baselines to JSON
    pub fn to_json(&self) -> Result<String, MonitorError> {
        Ok(serde_json::to_string(self)?)
    }
}
