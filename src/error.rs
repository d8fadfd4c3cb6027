//! Error types for the fatigue monitor

use thiserror::Error;

/// Errors that stop a monitor from being built or its state from being loaded.
///
/// Per-frame conditions (no face, degenerate geometry) are never errors; they
/// arrive as [`crate::types::Sample::Absent`].
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse input: {0}")]
    ParseError(String),

    #[error("Invalid baseline: {0}")]
    InvalidBaseline(String),
}

/// Errors raised by an event store when a classified event cannot be persisted.
///
/// The monitor logs and drops these; they never interrupt detection.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReportError {
    #[error("No active session")]
    NoActiveSession,

    #[error("Session {0} is not the active session")]
    UnknownSession(String),

    #[error("Event store unavailable: {0}")]
    StoreUnavailable(String),
}
