//! Core types for the fatigue monitor
//!
//! This module defines the values that flow through each stage of a frame:
//! raw samples, smoothed signals, detector state, classified events and the
//! aggregated per-frame result.

use serde::{Deserialize, Serialize};

/// One per-frame measurement of a monitored ratio.
///
/// `Absent` means the ratio could not be measured this frame (no face,
/// missing landmarks, degenerate geometry). It is never the same as `0.0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sample {
    Valid(f64),
    Absent,
}

impl Sample {
    /// Map a raw ratio to a sample. Negative, NaN or infinite values are the
    /// ratio source's "unreliable" sentinel and become `Absent`.
    pub fn from_ratio(value: f64) -> Self {
        if value.is_finite() && value >= 0.0 {
            Sample::Valid(value)
        } else {
            Sample::Absent
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, Sample::Valid(_))
    }

    pub fn value(&self) -> Option<f64> {
        match self {
            Sample::Valid(v) => Some(*v),
            Sample::Absent => None,
        }
    }
}

impl From<Option<f64>> for Sample {
    fn from(value: Option<f64>) -> Self {
        value.map(Sample::from_ratio).unwrap_or(Sample::Absent)
    }
}

/// Output of the smoothing stage
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SmoothedSignal {
    /// Window mean, absent until a valid sample arrives after the last reset
    pub value: Option<f64>,
    /// Number of samples currently in the window
    pub window_fill: usize,
}

impl SmoothedSignal {
    pub fn absent() -> Self {
        Self {
            value: None,
            window_fill: 0,
        }
    }
}

/// Which physiological signal a component is monitoring
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalKind {
    Eye,
    Mouth,
}

impl SignalKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalKind::Eye => "eye",
            SignalKind::Mouth => "mouth",
        }
    }
}

/// Classification of a completed excursion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Too short, or outside every counted band
    Ignored,
    /// Normal blink
    Normal,
    /// Long (drowsy) blink
    Long,
    /// Yawn
    Yawn,
}

impl EventKind {
    /// Whether events of this kind are persisted to the event store
    pub fn is_reportable(&self) -> bool {
        matches!(self, EventKind::Long | EventKind::Yawn)
    }
}

/// A completed, classified excursion. Produced once per Closed→Open transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedEvent {
    pub kind: EventKind,
    pub signal: SignalKind,
    /// When the excursion began (seconds)
    pub started_at: f64,
    /// How long the excursion lasted (seconds)
    pub duration: f64,
}

impl ClassifiedEvent {
    /// When the excursion ended (seconds)
    pub fn ended_at(&self) -> f64 {
        self.started_at + self.duration
    }
}

/// Sub-state of a tracking detector
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TrackingState {
    Open,
    Closed { closed_since: f64 },
}

/// Run state of one monitored signal
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DetectorRunState {
    Calibrating,
    Tracking(TrackingState),
}

impl DetectorRunState {
    /// Start of the in-progress excursion, if any
    pub fn closed_since(&self) -> Option<f64> {
        match self {
            DetectorRunState::Tracking(TrackingState::Closed { closed_since }) => {
                Some(*closed_since)
            }
            _ => None,
        }
    }
}

/// Running event counters. Never decrease for the lifetime of a monitor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counters {
    pub normal_count: u32,
    pub long_count: u32,
    pub yawn_count: u32,
}

impl Counters {
    /// Count a classified event. Ignored events leave the counters untouched.
    pub fn record(&mut self, kind: EventKind) {
        match kind {
            EventKind::Normal => self.normal_count += 1,
            EventKind::Long => self.long_count += 1,
            EventKind::Yawn => self.yawn_count += 1,
            EventKind::Ignored => {}
        }
    }
}

/// Global phase of a monitor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FramePhase {
    Calibrating,
    Tracking,
}

/// One input frame as read from an NDJSON stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameInput {
    /// Frame timestamp (seconds)
    #[serde(rename = "t")]
    pub timestamp: f64,
    /// Eye aspect ratio, null when unavailable
    #[serde(default)]
    pub ear: Option<f64>,
    /// Mouth aspect ratio, null when unavailable
    #[serde(default)]
    pub mar: Option<f64>,
}

impl FrameInput {
    pub fn eye_sample(&self) -> Sample {
        Sample::from(self.ear)
    }

    pub fn mouth_sample(&self) -> Sample {
        Sample::from(self.mar)
    }
}

/// Aggregated result of processing one frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameResult {
    pub timestamp: f64,
    pub phase: FramePhase,
    pub normal_count: u32,
    pub long_count: u32,
    pub yawn_count: u32,
    /// Eye held closed for at least the long-blink duration right now
    pub drowsy_alert: bool,
    /// Yawns in the trailing window reached the configured count
    pub yawn_rate_alert: bool,
    pub smoothed_eye: Option<f64>,
    pub smoothed_mouth: Option<f64>,
    /// Non-ignored events completed on this frame
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub events: Vec<ClassifiedEvent>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_sentinels_are_absent() {
        assert_eq!(Sample::from_ratio(-1.0), Sample::Absent);
        assert_eq!(Sample::from_ratio(f64::NAN), Sample::Absent);
        assert_eq!(Sample::from_ratio(f64::INFINITY), Sample::Absent);
        assert_eq!(Sample::from_ratio(0.0), Sample::Valid(0.0));
        assert_eq!(Sample::from(None), Sample::Absent);
    }

    #[test]
    fn test_counters_ignore_ignored() {
        let mut counters = Counters::default();
        counters.record(EventKind::Ignored);
        counters.record(EventKind::Normal);
        counters.record(EventKind::Long);
        counters.record(EventKind::Yawn);
        counters.record(EventKind::Yawn);

        assert_eq!(
            counters,
            Counters {
                normal_count: 1,
                long_count: 1,
                yawn_count: 2,
            }
        );
    }

    #[test]
    fn test_frame_input_parsing() {
        let frame: FrameInput = serde_json::from_str(r#"{"t": 1.5, "ear": 0.3, "mar": null}"#).unwrap();
        assert_eq!(frame.eye_sample(), Sample::Valid(0.3));
        assert_eq!(frame.mouth_sample(), Sample::Absent);

        let frame: FrameInput = serde_json::from_str(r#"{"t": 2.0}"#).unwrap();
        assert!(!frame.eye_sample().is_valid());
    }

    #[test]
    fn test_closed_since_only_when_closed() {
        assert_eq!(DetectorRunState::Calibrating.closed_since(), None);
        assert_eq!(
            DetectorRunState::Tracking(TrackingState::Open).closed_since(),
            None
        );
        assert_eq!(
            DetectorRunState::Tracking(TrackingState::Closed { closed_since: 3.0 }).closed_since(),
            Some(3.0)
        );
    }
}
