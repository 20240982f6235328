//! Append-only audit trail.
//!
//! Recording is best-effort: a failed insert is reported through tracing and
//! never surfaces to the operation that triggered it.

use std::sync::Arc;

use super::clock::Clock;
use super::store::EventRepository;
use super::ServiceError;
use crate::models::{EventLog, EventType, NewEvent};

/// Builder for one audit record; the timestamp is taken when it is recorded.
#[derive(Debug, Clone)]
pub struct AuditEntry {
    event_type: EventType,
    user_id: Option<i64>,
    client_id: Option<String>,
    description: String,
    ip: Option<String>,
}

impl AuditEntry {
    pub fn new(event_type: EventType, description: impl Into<String>) -> Self {
        Self {
            event_type,
            user_id: None,
            client_id: None,
            description: description.into(),
            ip: None,
        }
    }

    pub fn user(mut self, user_id: i64) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn client(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    pub fn ip(mut self, ip: Option<&str>) -> Self {
        self.ip = ip.map(str::to_string);
        self
    }
}

#[derive(Clone)]
pub struct AuditLog {
    events: Arc<dyn EventRepository>,
    clock: Arc<dyn Clock>,
}

impl AuditLog {
    pub fn new(events: Arc<dyn EventRepository>, clock: Arc<dyn Clock>) -> Self {
        Self { events, clock }
    }

    /// Persist one event. Never fails the caller.
    pub async fn record(&self, entry: AuditEntry) {
        let event = NewEvent {
            event_type: entry.event_type,
            user_id: entry.user_id,
            client_id: entry.client_id,
            description: entry.description,
            ip: entry.ip,
            created_at: self.clock.now(),
        };

        if let Err(e) = self.events.insert_event(&event).await {
            tracing::error!(
                error = %e,
                event_type = event.event_type.as_str(),
                user_id = ?event.user_id,
                client_id = ?event.client_id,
                "Failed to write audit event"
            );
        }
    }

    /// Newest events first.
    pub async fn recent(&self, limit: i64) -> Result<Vec<EventLog>, ServiceError> {
        self.events.recent_events(limit).await
    }
}
