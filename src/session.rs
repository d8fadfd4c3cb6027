//! In-memory session log
//!
//! A session spans one monitoring run. Events are appended to the active
//! session only; appending with no session open, or to a session that is no
//! longer active, is rejected.

use crate::error::{MonitorError, ReportError};
use crate::reporter::EventStore;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

/// One persisted event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub event_type: String,
    pub description: String,
    /// Stream timestamp of the event (seconds)
    pub timestamp: f64,
    /// Wall-clock time the record was written
    pub recorded_at: DateTime<Utc>,
}

/// One monitoring session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub events: Vec<EventRecord>,
}

/// Sessions and their events, in creation order
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionLog {
    sessions: Vec<SessionRecord>,
    #[serde(skip)]
    active: Option<usize>,
}

impl SessionLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Log with a session already open
    pub fn with_session() -> Self {
        let mut log = Self::new();
        log.start_session();
        log
    }

    /// Open a new session, closing any session still open. Returns its id.
    pub fn start_session(&mut self) -> String {
        self.end_session();

        let id = Uuid::new_v4().to_string();
        self.sessions.push(SessionRecord {
            id: id.clone(),
            started_at: Utc::now(),
            ended_at: None,
            events: Vec::new(),
        });
        self.active = Some(self.sessions.len() - 1);
        info!(session_id = %id, "Session started");
        id
    }

    /// Close the active session. Returns false when none was open.
    pub fn end_session(&mut self) -> bool {
        let Some(index) = self.active.take() else {
            return false;
        };
        let session = &mut self.sessions[index];
        session.ended_at = Some(Utc::now());
        info!(
            session_id = %session.id,
            events = session.events.len(),
            "Session ended"
        );
        true
    }

    pub fn active(&self) -> Option<&SessionRecord> {
        self.active.map(|i| &self.sessions[i])
    }

    pub fn sessions(&self) -> &[SessionRecord] {
        &self.sessions
    }

    /// Total events across all sessions
    pub fn event_count(&self) -> usize {
        self.sessions.iter().map(|s| s.events.len()).sum()
    }

    /// Serialize all sessions to pretty JSON
    pub fn to_json_pretty(&self) -> Result<String, MonitorError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl EventStore for SessionLog {
    fn active_session(&self) -> Option<&str> {
        self.active().map(|s| s.id.as_str())
    }

    fn append_event(
        &mut self,
        session_id: &str,
        event_type: &str,
        description: &str,
        timestamp: f64,
    ) -> Result<(), ReportError> {
        let index = self.active.ok_or(ReportError::NoActiveSession)?;
        let session = &mut self.sessions[index];
        if session.id != session_id {
            return Err(ReportError::UnknownSession(session_id.to_string()));
        }
        session.events.push(EventRecord {
            event_type: event_type.to_string(),
            description: description.to_string(),
            timestamp,
            recorded_at: Utc::now(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_lifecycle() {
        let mut log = SessionLog::new();
        assert!(log.active_session().is_none());

        let id = log.start_session();
        assert_eq!(log.active_session(), Some(id.as_str()));

        log.append_event(&id, "yawn", "Yawn detected. Duration: 1.50 s.", 12.0)
            .unwrap();
        assert!(log.end_session());
        assert!(!log.end_session());

        let session = &log.sessions()[0];
        assert!(session.ended_at.is_some());
        assert_eq!(session.events.len(), 1);
        assert_eq!(session.events[0].event_type, "yawn");
    }

    #[test]
    fn test_append_without_session_rejected() {
        let mut log = SessionLog::new();
        assert_eq!(
            log.append_event("x", "fatigue", "d", 0.0),
            Err(ReportError::NoActiveSession)
        );
    }

    #[test]
    fn test_stale_session_rejected() {
        let mut log = SessionLog::new();
        let first = log.start_session();
        let second = log.start_session();
        assert_ne!(first, second);

        assert_eq!(
            log.append_event(&first, "fatigue", "d", 0.0),
            Err(ReportError::UnknownSession(first.clone()))
        );
        assert!(log.append_event(&second, "fatigue", "d", 0.0).is_ok());
        // Starting the second session closed the first
        assert!(log.sessions()[0].ended_at.is_some());
        assert_eq!(log.event_count(), 1);
    }

    #[test]
    fn test_json_export() {
        let mut log = SessionLog::with_session();
        let id = log.active_session().unwrap().to_string();
        log.append_event(&id, "fatigue", "Long blink detected. Duration: 1.20 s.", 4.2)
            .unwrap();

        let json: serde_json::Value = serde_json::from_str(&log.to_json_pretty().unwrap()).unwrap();
        assert_eq!(json["sessions"][0]["id"], id.as_str());
        assert_eq!(json["sessions"][0]["events"][0]["event_type"], "fatigue");
    }
}
