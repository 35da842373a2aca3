//! Relay Event Logger
//!
//! Structured session lifecycle events, emitted on the `relay_events` target
//! so they can be filtered or routed to the NDJSON file separately.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::redact::{fingerprint, redact_sensitive_data};

#[derive(Debug, Serialize)]
#[serde(tag = "type")]
pub enum RelayEvent {
    SessionOpened,
    KeyAnnounced { key: String, catch_up: usize },
    PayloadRouted { receiver: String, recipients: usize },
    SessionClosed { reason: String },
}

#[derive(Debug, Serialize)]
pub struct EventLogEntry {
    pub session_id: String,
    pub timestamp: DateTime<Utc>,
    pub event: RelayEvent,
}

pub struct EventLogger;

impl EventLogger {
    /// Logs a relay event. Keys become fingerprints and free text is
    /// redacted before anything reaches the subscriber.
    pub fn log_event(session_id: &str, event: RelayEvent) {
        let entry = Self::entry(session_id, event);
        info!(target: "relay_events", event = ?entry, "Relay event");
    }

    fn entry(session_id: &str, mut event: RelayEvent) -> EventLogEntry {
        match &mut event {
            RelayEvent::KeyAnnounced { key, .. } => *key = fingerprint(key),
            RelayEvent::PayloadRouted { receiver, .. } => *receiver = fingerprint(receiver),
            RelayEvent::SessionClosed { reason } => *reason = redact_sensitive_data(reason),
            RelayEvent::SessionOpened => {}
        }

        EventLogEntry {
            session_id: session_id.into(),
            timestamp: Utc::now(),
            event,
        }
    }
}
