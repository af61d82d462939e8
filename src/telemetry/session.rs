//! Session tracking: groups telemetry events emitted between a
//! `start_session`/`end_session` pair, e.g. one scraping run.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};

use super::event::TelemetryEvent;

struct SessionRecord {
    correlation_id: String,
    context: String,
    started_at: DateTime<Utc>,
    events: Vec<TelemetryEvent>,
}

#[derive(Debug, Clone)]
pub struct SessionSummary {
    pub duration_ms: i64,
    pub event_count: usize,
    pub events: Vec<TelemetryEvent>,
}

#[derive(Default)]
pub struct SessionTracker {
    sessions: Mutex<HashMap<String, SessionRecord>>,
}

impl SessionTracker {
    pub fn start_session(
        &self,
        session_id: impl Into<String>,
        correlation_id: impl Into<String>,
        context: impl Into<String>,
    ) {
        let session_id = session_id.into();
        self.sessions.lock().unwrap().insert(
            session_id,
            SessionRecord {
                correlation_id: correlation_id.into(),
                context: context.into(),
                started_at: Utc::now(),
                events: Vec::new(),
            },
        );
    }

    pub fn correlation_id_for(&self, session_id: &str) -> Option<String> {
        self.sessions
            .lock()
            .unwrap()
            .get(session_id)
            .map(|session| session.correlation_id.clone())
    }

    pub fn record_event(&self, session_id: &str, event: TelemetryEvent) {
        if let Some(session) = self.sessions.lock().unwrap().get_mut(session_id) {
            session.events.push(event);
        }
    }

    pub fn end_session(&self, session_id: &str) -> Option<SessionSummary> {
        let session = self.sessions.lock().unwrap().remove(session_id)?;
        let duration_ms = (Utc::now() - session.started_at).num_milliseconds();
        Some(SessionSummary {
            duration_ms,
            event_count: session.events.len(),
            events: session.events,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::event::OperationType;

    #[test]
    fn end_session_returns_collected_events() {
        let tracker = SessionTracker::default();
        tracker.start_session("session-1", "corr-1", "production");
        tracker.record_event(
            "session-1",
            TelemetryEvent::new("home_team_name", "corr-1", OperationType::Resolution),
        );
        let summary = tracker.end_session("session-1").unwrap();
        assert_eq!(summary.event_count, 1);
        assert!(tracker.end_session("session-1").is_none());
    }
}
