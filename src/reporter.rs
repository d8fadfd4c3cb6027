//! Event reporting
//!
//! Translates classified events into semantic records (event type plus a
//! human-readable description) and appends them to the current session of an
//! external [`EventStore`].

use crate::error::ReportError;
use crate::types::{ClassifiedEvent, EventKind, SignalKind};
use tracing::debug;

/// Session-scoped event log the monitor reports into.
///
/// Session lifecycle belongs to the store; the reporter only appends.
pub trait EventStore {
    /// Identifier of the currently open session, if any
    fn active_session(&self) -> Option<&str>;

    /// Append one event to `session_id`
    fn append_event(
        &mut self,
        session_id: &str,
        event_type: &str,
        description: &str,
        timestamp: f64,
    ) -> Result<(), ReportError>;
}

/// Semantic event type for a kind/signal pair, `None` when the pair has no meaning
pub fn event_type(kind: EventKind, signal: SignalKind) -> Option<&'static str> {
    match (signal, kind) {
        (SignalKind::Eye, EventKind::Normal) => Some("blink"),
        (SignalKind::Eye, EventKind::Long) => Some("fatigue"),
        (SignalKind::Mouth, EventKind::Yawn) => Some("yawn"),
        _ => None,
    }
}

/// Human-readable description including the duration at 2-decimal precision
pub fn describe(event: &ClassifiedEvent) -> String {
    let what = match (event.signal, event.kind) {
        (SignalKind::Eye, EventKind::Normal) => "Normal blink",
        (SignalKind::Eye, EventKind::Long) => "Long blink",
        (SignalKind::Mouth, EventKind::Yawn) => "Yawn",
        (SignalKind::Eye, _) => "Eye closure",
        (SignalKind::Mouth, _) => "Mouth opening",
    };
    format!("{} detected. Duration: {:.2} s.", what, event.duration)
}

/// Adapter from classified events to an [`EventStore`]
#[derive(Debug)]
pub struct EventReporter<S> {
    store: S,
    reported: u64,
}

impl<S: EventStore> EventReporter<S> {
    pub fn new(store: S) -> Self {
        Self { store, reported: 0 }
    }

    /// Persist `event` if its kind is reportable. Non-reportable kinds are a no-op.
    pub fn report(&mut self, event: &ClassifiedEvent) -> Result<(), ReportError> {
        if !event.kind.is_reportable() {
            return Ok(());
        }
        let Some(event_type) = event_type(event.kind, event.signal) else {
            return Ok(());
        };

        let session_id = self
            .store
            .active_session()
            .ok_or(ReportError::NoActiveSession)?
            .to_string();
        let description = describe(event);

        self.store
            .append_event(&session_id, event_type, &description, event.ended_at())?;
        self.reported += 1;
        debug!(session_id = %session_id, event_type, "Event reported");
        Ok(())
    }

    /// Number of events successfully handed to the store
    pub fn reported(&self) -> u64 {
        self.reported
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }
}
