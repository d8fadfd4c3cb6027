//! Monitor configuration
//!
//! One immutable [`MonitorConfig`] is validated once and handed to every
//! component constructor. Defaults match a 30 FPS webcam stream and a single
//! seated subject.

use crate::error::MonitorError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default smoothing window (frames)
pub const DEFAULT_SMOOTHING_WINDOW: usize = 8;

/// Default calibration duration (seconds)
pub const DEFAULT_CALIBRATION_SECS: f64 = 5.0;

/// Eye (EAR) thresholds and blink duration bands
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EyeConfig {
    /// Closed threshold as a fraction of the calibrated open-eye reference
    pub closed_ratio: f64,
    /// Drowsy threshold as a fraction of the calibrated open-eye reference
    pub drowsy_ratio: f64,
    /// Static EAR threshold used when calibration collects nothing usable
    pub default_threshold: f64,
    /// Closures shorter than this are noise (seconds)
    pub min_blink_secs: f64,
    /// Longest closure still counted as a normal blink (seconds)
    pub max_normal_blink_secs: f64,
    /// Closures at least this long are long blinks and raise the drowsy alert (seconds)
    pub long_blink_secs: f64,
}

impl Default for EyeConfig {
    fn default() -> Self {
        Self {
            closed_ratio: 0.70,
            drowsy_ratio: 0.50,
            default_threshold: 0.22,
            min_blink_secs: 0.1,
            max_normal_blink_secs: 0.5,
            long_blink_secs: 1.0,
        }
    }
}

/// Mouth (MAR) threshold and yawn duration floor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MouthConfig {
    /// Static MAR above which the mouth counts as yawning
    pub yawn_threshold: f64,
    /// Multiple of the calibrated resting MAR the yawn threshold never drops below
    pub yawn_margin: f64,
    /// Openings shorter than this are not yawns (seconds)
    pub min_yawn_secs: f64,
}

impl Default for MouthConfig {
    fn default() -> Self {
        Self {
            yawn_threshold: 0.6,
            yawn_margin: 1.5,
            min_yawn_secs: 1.0,
        }
    }
}

/// Trailing-window yawn counter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct YawnRateConfig {
    /// Window length (seconds)
    pub window_secs: f64,
    /// Yawns within the window that raise the yawn-rate flag
    pub max_yawns: usize,
}

impl Default for YawnRateConfig {
    fn default() -> Self {
        Self {
            window_secs: 300.0,
            max_yawns: 3,
        }
    }
}

/// Complete monitor configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Sliding-window size for the per-signal mean filter (frames)
    pub smoothing_window: usize,
    /// Length of the calibration phase (seconds)
    pub calibration_secs: f64,
    pub eye: EyeConfig,
    pub mouth: MouthConfig,
    /// Disabled when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub yawn_rate: Option<YawnRateConfig>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            smoothing_window: DEFAULT_SMOOTHING_WINDOW,
            calibration_secs: DEFAULT_CALIBRATION_SECS,
            eye: EyeConfig::default(),
            mouth: MouthConfig::default(),
            yawn_rate: None,
        }
    }
}

impl MonitorConfig {
    /// Check every invariant the detectors rely on.
    pub fn validate(&self) -> Result<(), MonitorError> {
        if self.smoothing_window == 0 {
            return Err(invalid("smoothing_window must be at least 1"));
        }
        positive("calibration_secs", self.calibration_secs)?;

        let eye = &self.eye;
        positive("eye.closed_ratio", eye.closed_ratio)?;
        positive("eye.drowsy_ratio", eye.drowsy_ratio)?;
        if eye.closed_ratio <= eye.drowsy_ratio {
            return Err(invalid(format!(
                "eye.closed_ratio ({}) must be greater than eye.drowsy_ratio ({})",
                eye.closed_ratio, eye.drowsy_ratio
            )));
        }
        if eye.closed_ratio > 1.0 {
            return Err(invalid(format!(
                "eye.closed_ratio ({}) must not exceed 1.0",
                eye.closed_ratio
            )));
        }
        positive("eye.default_threshold", eye.default_threshold)?;
        positive("eye.min_blink_secs", eye.min_blink_secs)?;
        positive("eye.max_normal_blink_secs", eye.max_normal_blink_secs)?;
        positive("eye.long_blink_secs", eye.long_blink_secs)?;
        if eye.min_blink_secs > eye.max_normal_blink_secs {
            return Err(invalid(
                "eye.min_blink_secs must not exceed eye.max_normal_blink_secs",
            ));
        }
        if eye.max_normal_blink_secs >= eye.long_blink_secs {
            return Err(invalid(
                "eye.max_normal_blink_secs must be below eye.long_blink_secs",
            ));
        }

        positive("mouth.yawn_threshold", self.mouth.yawn_threshold)?;
        positive("mouth.yawn_margin", self.mouth.yawn_margin)?;
        positive("mouth.min_yawn_secs", self.mouth.min_yawn_secs)?;

        if let Some(rate) = &self.yawn_rate {
            positive("yawn_rate.window_secs", rate.window_secs)?;
            if rate.max_yawns == 0 {
                return Err(invalid("yawn_rate.max_yawns must be at least 1"));
            }
        }

        Ok(())
    }

    /// Parse and validate a JSON configuration. Missing fields take defaults.
    pub fn from_json(json: &str) -> Result<Self, MonitorError> {
        let config: MonitorConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON configuration file
    pub fn from_file(path: &Path) -> Result<Self, MonitorError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Serialize to pretty-printed JSON
    pub fn to_json_pretty(&self) -> Result<String, MonitorError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

fn invalid(msg: impl Into<String>) -> MonitorError {
    MonitorError::InvalidConfig(msg.into())
}

fn positive(name: &str, value: f64) -> Result<(), MonitorError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(invalid(format!("{} must be positive, got {}", name, value)))
    }
}
