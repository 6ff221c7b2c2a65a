//! Lifecycle event types published by the desk.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ticket::{Priority, TicketId};

/// Events emitted once per occurrence, after the change is stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LifecycleEvent {
    /// Remaining budget reached zero
    TicketBreached {
        ticket_id: TicketId,
        ticket_no: String,
        priority: Priority,
        /// Instant the budget ran out
        breached_at: DateTime<Utc>,
        /// Instant the desk noticed
        detected_at: DateTime<Utc>,
    },

    /// Ticket closed with a feedback link
    TicketCompleted {
        ticket_id: TicketId,
        ticket_no: String,
        feedback_url: String,
        completed_at: DateTime<Utc>,
    },
}

impl LifecycleEvent {
    /// Get the timestamp of this event
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            LifecycleEvent::TicketBreached { detected_at, .. } => *detected_at,
            LifecycleEvent::TicketCompleted { completed_at, .. } => *completed_at,
        }
    }

    /// Get the event type as a string
    pub fn event_type(&self) -> &'static str {
        match self {
            LifecycleEvent::TicketBreached { .. } => "ticket_breached",
            LifecycleEvent::TicketCompleted { .. } => "ticket_completed",
        }
    }

    pub fn ticket_id(&self) -> &str {
        match self {
            LifecycleEvent::TicketBreached { ticket_id, .. }
            | LifecycleEvent::TicketCompleted { ticket_id, .. } => ticket_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_serialized_with_type_tag() {
        let at = Utc.with_ymd_and_hms(2026, 3, 2, 11, 0, 0).unwrap();
        let event = LifecycleEvent::TicketBreached {
            ticket_id: "t-1".into(),
            ticket_no: "SR-20260302-0001".into(),
            priority: Priority::Critical,
            breached_at: at,
            detected_at: at,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "ticket_breached");
        assert_eq!(json["priority"], "CRITICAL");
        assert_eq!(event.event_type(), "ticket_breached");
        assert_eq!(event.ticket_id(), "t-1");

        let back: LifecycleEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }
}
