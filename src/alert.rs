//! Drowsiness alert
//!
//! [`AlertHysteresis`] is a pure predicate over the eye detector's state: it
//! holds for as long as the eye has been closed for at least the long-blink
//! duration. [`AlertDispatcher`] turns that level into a one-shot action by
//! firing its sink only on the false→true edge.

use crate::types::DetectorRunState;
use std::io::Write;
use std::sync::Arc;
use tracing::{debug, warn};

/// Sustained-closure predicate
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlertHysteresis {
    long_duration: f64,
}

impl AlertHysteresis {
    pub fn new(long_duration: f64) -> Self {
        Self { long_duration }
    }

    /// True iff the detector is closed and has been for at least the long duration
    pub fn evaluate(&self, now: f64, run_state: &DetectorRunState) -> bool {
        match run_state.closed_since() {
            Some(closed_since) => now - closed_since >= self.long_duration,
            None => false,
        }
    }

    pub fn long_duration(&self) -> f64 {
        self.long_duration
    }
}

/// External alert action (sound, vibration, notification)
pub trait AlertSink {
    fn fire_alert(&self);
}

impl<S: AlertSink + ?Sized> AlertSink for Arc<S> {
    fn fire_alert(&self) {
        (**self).fire_alert()
    }
}

impl<S: AlertSink + ?Sized> AlertSink for Box<S> {
    fn fire_alert(&self) {
        (**self).fire_alert()
    }
}

/// Sink that does nothing; the alert is still visible in each frame result
#[derive(Debug, Clone, Copy, Default)]
pub struct NullAlertSink;

impl AlertSink for NullAlertSink {
    fn fire_alert(&self) {}
}

/// Rings the terminal bell on stderr
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalBell;

impl AlertSink for TerminalBell {
    fn fire_alert(&self) {
        let mut stderr = std::io::stderr();
        let _ = stderr.write_all(b"\x07");
        let _ = stderr.flush();
    }
}

/// Runs the wrapped sink on its own thread so a slow sink never stalls frame processing
#[derive(Debug)]
pub struct DetachedAlert<S> {
    inner: Arc<S>,
}

impl<S> DetachedAlert<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner: Arc::new(inner),
        }
    }
}

impl<S: AlertSink + Send + Sync + 'static> AlertSink for DetachedAlert<S> {
    fn fire_alert(&self) {
        let inner = Arc::clone(&self.inner);
        let spawned = std::thread::Builder::new()
            .name("fatigue-alert".to_string())
            .spawn(move || inner.fire_alert());
        if let Err(e) = spawned {
            warn!(error = %e, "Failed to launch alert thread");
        }
    }
}

/// Edge-triggered dispatch of the alert level to a sink
pub struct AlertDispatcher {
    sink: Box<dyn AlertSink + Send>,
    active: bool,
    fired: u64,
}

impl std::fmt::Debug for AlertDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlertDispatcher")
            .field("active", &self.active)
            .field("fired", &self.fired)
            .finish()
    }
}

impl Default for AlertDispatcher {
    fn default() -> Self {
        Self::new(Box::new(NullAlertSink))
    }
}

impl AlertDispatcher {
    pub fn new(sink: Box<dyn AlertSink + Send>) -> Self {
        Self {
            sink,
            active: false,
            fired: 0,
        }
    }

    /// Track the current alert level. Fires the sink once per continuous
    /// true interval and returns whether it fired on this call.
    pub fn update(&mut self, active: bool) -> bool {
        let rising = active && !self.active;
        if active != self.active {
            debug!(active, "Drowsy alert level changed");
        }
        self.active = active;
        if rising {
            self.fired += 1;
            warn!(alerts = self.fired, "Drowsiness alert");
            self.sink.fire_alert();
        }
        rising
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Number of times the sink has fired
    pub fn fired(&self) -> u64 {
        self.fired
    }
}
