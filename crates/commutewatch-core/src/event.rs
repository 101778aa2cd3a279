//! Notification events.
//!
//! One `Event` is appended each time the decision engine fires. Events are
//! immutable once created and are returned to the webhook caller newest
//! first, sorted on `meta.timestamp`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// IFTTT item metadata: globally unique id plus the unix-seconds sort key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventMeta {
    pub id: String,
    /// Unix timestamp in seconds; recency sort key.
    pub timestamp: i64,
}

/// Immutable record of one notification firing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Observed commute duration in minutes.
    pub commute_duration: u32,
    pub origin_address: String,
    pub destination_address: String,
    /// Free-text route summary from the directions lookup.
    pub route_to_take: String,
    /// RFC 3339 instant of the firing.
    pub created_at: String,
    pub meta: EventMeta,
}

impl Event {
    /// Build an event for a firing observed at `at`.
    pub fn new(
        commute_duration: u32,
        origin_address: impl Into<String>,
        destination_address: impl Into<String>,
        route_to_take: impl Into<String>,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            commute_duration,
            origin_address: origin_address.into(),
            destination_address: destination_address.into(),
            route_to_take: route_to_take.into(),
            created_at: at.to_rfc3339(),
            meta: EventMeta {
                id: Uuid::new_v4().to_string(),
                timestamp: at.timestamp(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_carries_unix_seconds() {
        let at = Utc::now();
        let event = Event::new(12, "home", "office", "I-5 N", at);
        assert_eq!(event.meta.timestamp, at.timestamp());
        assert_eq!(event.commute_duration, 12);
    }

    #[test]
    fn test_event_ids_unique() {
        let at = Utc::now();
        let a = Event::new(10, "home", "office", "I-5 N", at);
        let b = Event::new(10, "home", "office", "I-5 N", at);
        assert_ne!(a.meta.id, b.meta.id);
    }

    #[test]
    fn test_event_serializes_ifttt_shape() {
        let at = Utc::now();
        let event = Event::new(12, "home", "office", "I-5 N", at);
        let json = serde_json::to_value(&event).unwrap();
        assert!(json["commute_duration"].is_u64());
        assert!(json["created_at"].is_string());
        assert!(json["meta"]["id"].is_string());
        assert!(json["meta"]["timestamp"].is_i64());
    }
}
