//! Duration-based event detection
//!
//! One two-state machine serves both signals. A comparison policy decides
//! when the event condition holds (eye shut, mouth open past the yawn
//! threshold) and a classification policy turns the elapsed time of each
//! completed excursion into an [`EventKind`].
//!
//! Comparisons are strict: a value exactly on the threshold counts as the
//! inactive side, for both directions.

use crate::config::{EyeConfig, MouthConfig};
use crate::types::{ClassifiedEvent, DetectorRunState, EventKind, SignalKind, TrackingState};
use std::marker::PhantomData;
use tracing::debug;

/// Direction of the activation test
pub trait ComparisonPolicy {
    fn is_active(value: f64, threshold: f64) -> bool;
}

/// Active when the value drops below the threshold (eye closure)
#[derive(Debug, Clone, Copy, Default)]
pub struct BelowThreshold;

impl ComparisonPolicy for BelowThreshold {
    fn is_active(value: f64, threshold: f64) -> bool {
        value < threshold
    }
}

/// Active when the value rises above the threshold (mouth opening)
#[derive(Debug, Clone, Copy, Default)]
pub struct AboveThreshold;

impl ComparisonPolicy for AboveThreshold {
    fn is_active(value: f64, threshold: f64) -> bool {
        value > threshold
    }
}

/// Maps the duration of a completed excursion to its kind
pub trait ClassificationPolicy {
    fn classify(&self, duration: f64) -> EventKind;
}

/// Blink bands: noise, normal, (uncounted gap), long
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlinkClassifier {
    pub min_duration: f64,
    pub max_normal_duration: f64,
    pub long_duration: f64,
}

impl BlinkClassifier {
    pub fn from_config(config: &EyeConfig) -> Self {
        Self {
            min_duration: config.min_blink_secs,
            max_normal_duration: config.max_normal_blink_secs,
            long_duration: config.long_blink_secs,
        }
    }
}

impl ClassificationPolicy for BlinkClassifier {
    fn classify(&self, duration: f64) -> EventKind {
        if duration < self.min_duration {
            EventKind::Ignored
        } else if duration >= self.long_duration {
            EventKind::Long
        } else if duration <= self.max_normal_duration {
            EventKind::Normal
        } else {
            EventKind::Ignored
        }
    }
}

/// Single floor: long enough is a yawn, anything shorter is ignored
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct YawnClassifier {
    pub min_duration: f64,
}

impl YawnClassifier {
    pub fn from_config(config: &MouthConfig) -> Self {
        Self {
            min_duration: config.min_yawn_secs,
        }
    }
}

impl ClassificationPolicy for YawnClassifier {
    fn classify(&self, duration: f64) -> EventKind {
        if duration >= self.min_duration {
            EventKind::Yawn
        } else {
            EventKind::Ignored
        }
    }
}

/// Open/closed state machine for one signal
#[derive(Debug, Clone)]
pub struct DurationEventDetector<C, K> {
    signal: SignalKind,
    state: DetectorRunState,
    threshold: f64,
    classifier: K,
    _comparison: PhantomData<C>,
}

pub type EyeDetector = DurationEventDetector<BelowThreshold, BlinkClassifier>;
pub type MouthDetector = DurationEventDetector<AboveThreshold, YawnClassifier>;

impl<C: ComparisonPolicy, K: ClassificationPolicy> DurationEventDetector<C, K> {
    /// Create a detector in the calibrating phase
    pub fn new(signal: SignalKind, classifier: K) -> Self {
        Self {
            signal,
            state: DetectorRunState::Calibrating,
            threshold: f64::NAN,
            classifier,
            _comparison: PhantomData,
        }
    }

    /// Create a detector that is already tracking against `threshold`
    pub fn tracking(signal: SignalKind, classifier: K, threshold: f64) -> Self {
        let mut detector = Self::new(signal, classifier);
        detector.begin_tracking(threshold);
        detector
    }

    /// Leave calibration and start tracking. Only the first call has effect.
    pub fn begin_tracking(&mut self, threshold: f64) {
        if self.state != DetectorRunState::Calibrating {
            debug!(signal = self.signal.as_str(), "Detector already tracking");
            return;
        }
        self.threshold = threshold;
        self.state = DetectorRunState::Tracking(TrackingState::Open);
        debug!(signal = self.signal.as_str(), threshold, "Tracking started");
    }

    /// Feed one smoothed value. Returns the classified event when an
    /// excursion ends on this call (including `Ignored` ones).
    pub fn update(&mut self, value: f64, now: f64) -> Option<ClassifiedEvent> {
        let tracking = match self.state {
            DetectorRunState::Calibrating => return None,
            DetectorRunState::Tracking(tracking) => tracking,
        };
        let active = C::is_active(value, self.threshold);

        match (tracking, active) {
            (TrackingState::Open, true) => {
                self.state = DetectorRunState::Tracking(TrackingState::Closed { closed_since: now });
                debug!(signal = self.signal.as_str(), at = now, value, "Excursion started");
                None
            }
            (TrackingState::Closed { closed_since }, false) => {
                self.state = DetectorRunState::Tracking(TrackingState::Open);
                let duration = now - closed_since;
                let kind = self.classifier.classify(duration);
                debug!(
                    signal = self.signal.as_str(),
                    ?kind,
                    duration,
                    "Excursion ended"
                );
                Some(ClassifiedEvent {
                    kind,
                    signal: self.signal,
                    started_at: closed_since,
                    duration,
                })
            }
            // Repeated activation while closed, or staying open
            _ => None,
        }
    }

    /// Forced return to `Open` after the signal became unreliable. Any
    /// in-progress excursion is discarded unclassified; its elapsed time is
    /// returned for diagnostics.
    pub fn reset(&mut self, now: f64) -> Option<f64> {
        let closed_since = self.state.closed_since()?;
        self.state = DetectorRunState::Tracking(TrackingState::Open);
        let discarded = now - closed_since;
        debug!(
            signal = self.signal.as_str(),
            discarded,
            "Signal lost, excursion discarded"
        );
        Some(discarded)
    }

    pub fn state(&self) -> DetectorRunState {
        self.state
    }

    pub fn signal(&self) -> SignalKind {
        self.signal
    }

    /// Active threshold, `None` while calibrating
    pub fn threshold(&self) -> Option<f64> {
        match self.state {
            DetectorRunState::Calibrating => None,
            DetectorRunState::Tracking(_) => Some(self.threshold),
        }
    }

    pub fn is_tracking(&self) -> bool {
        matches!(self.state, DetectorRunState::Tracking(_))
    }

    pub fn classifier(&self) -> &K {
        &self.classifier
    }
}
