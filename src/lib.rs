//! Fatigue Monitor - real-time drowsiness detection from facial aspect ratios
//!
//! The monitor consumes a per-frame eye-aspect ratio (EAR) and mouth-aspect
//! ratio (MAR) and turns sustained excursions into discrete events through a
//! deterministic pipeline: smoothing → per-subject calibration → duration
//! segmentation → classification → alerting and reporting.
//!
//! ## Modules
//!
//! - **Detection**: smoothing, calibration, the duration state machine and the drowsy alert
//! - **Reporting**: semantic event records handed to a session-scoped event store

pub mod alert;
pub mod baseline;
pub mod config;
pub mod detector;
pub mod error;
pub mod monitor;
pub mod reporter;
pub mod session;
pub mod smoother;
pub mod types;
pub mod yawn_rate;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use alert::{AlertSink, DetachedAlert, NullAlertSink, TerminalBell};
pub use baseline::{Baseline, CalibratedBaselines};
pub use config::MonitorConfig;
pub use error::{MonitorError, ReportError};
pub use monitor::FatigueMonitor;
pub use reporter::EventStore;
pub use session::SessionLog;
pub use types::{ClassifiedEvent, EventKind, FrameInput, FrameResult, Sample, SignalKind};

/// Crate version embedded in CLI and FFI output
pub const MONITOR_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for exported records
pub const PRODUCER_NAME: &str = "fatigue-monitor";
