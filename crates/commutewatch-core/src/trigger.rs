//! Trigger evaluation orchestration.
//!
//! Glues the window predicate, the commute lookup, the decision engine and
//! the registry together for one inbound evaluation. Every path yields a
//! definite outcome; a lookup or registry failure propagates as an error
//! with zero state written for that attempt.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::decision::{decide, SubscriptionState};
use crate::directions::DirectionsClient;
use crate::error::{CoreError, Result};
use crate::event::Event;
use crate::storage::{EventStore, KeyedLocks, Registry};
use crate::subscription::EvaluationRequest;

/// Evaluates inbound trigger requests against stored subscription state.
pub struct TriggerService {
    registry: Arc<dyn Registry>,
    events: Arc<dyn EventStore>,
    directions: Arc<dyn DirectionsClient>,
    locks: Arc<KeyedLocks>,
}

impl TriggerService {
    pub fn new(
        registry: Arc<dyn Registry>,
        events: Arc<dyn EventStore>,
        directions: Arc<dyn DirectionsClient>,
        locks: Arc<KeyedLocks>,
    ) -> Self {
        Self {
            registry,
            events,
            directions,
            locks,
        }
    }

    /// Evaluate a trigger request now.
    pub async fn evaluate(&self, request: &EvaluationRequest) -> Result<Vec<Event>> {
        self.evaluate_at(request, Utc::now()).await
    }

    /// Evaluate a trigger request at a given instant (injectable for tests).
    ///
    /// Outside the window: refresh stored config, clear decay state, return
    /// the existing event log without a lookup. Inside: lookup, decide,
    /// persist state and a new event when it fired.
    pub async fn evaluate_at(
        &self,
        request: &EvaluationRequest,
        now: DateTime<Utc>,
    ) -> Result<Vec<Event>> {
        let sub = request.parse()?;
        let limit = request.event_limit();

        let _guard = self.locks.lock(&sub.id).await;

        if !sub.window().contains(now) {
            self.registry.refresh_config(&sub).await?;
            self.registry.set_last_notified(&sub.id, None).await?;
            tracing::debug!(id = %sub.id, "outside commute window, decay state cleared");
            return self.list_events(&sub.id, limit).await;
        }

        let estimate = self
            .directions
            .route(&sub.origin_address, &sub.destination_address)
            .await?;
        tracing::debug!(
            id = %sub.id,
            summary = %estimate.summary,
            minutes = estimate.duration_in_traffic_minutes,
            threshold = sub.threshold_minutes,
            "commute lookup complete"
        );

        let stored = self.registry.get(&sub.id).await?;
        let state = SubscriptionState {
            threshold_minutes: sub.threshold_minutes,
            last_notified_minutes: stored.and_then(|s| s.last_notified_minutes),
        };
        let decision = decide(state, estimate.duration_in_traffic_minutes);

        let mut record = sub.clone();
        record.last_notified_minutes = decision.state.last_notified_minutes;
        self.registry.upsert(&record).await?;

        if decision.fire {
            let event = Event::new(
                estimate.duration_in_traffic_minutes,
                sub.origin_address.clone(),
                sub.destination_address.clone(),
                estimate.summary.clone(),
                now,
            );
            self.events.append(&sub.id, &event).await?;
            tracing::info!(
                id = %sub.id,
                minutes = estimate.duration_in_traffic_minutes,
                route = %estimate.summary,
                "commute threshold reached, notification fired"
            );
        }

        self.list_events(&sub.id, limit).await
    }

    /// Event log projection, newest first, truncated to `limit`.
    /// `limit <= 0` short-circuits to empty without touching storage.
    pub async fn list_events(&self, id: &str, limit: i64) -> Result<Vec<Event>> {
        if limit <= 0 {
            return Ok(Vec::new());
        }
        self.events
            .list_recent(id, limit)
            .await
            .map_err(CoreError::from)
    }

    /// Delete a subscription. Idempotent: unknown ids are not an error.
    pub async fn unsubscribe(&self, id: &str) -> Result<()> {
        let guard = self.locks.lock(id).await;
        self.registry.delete(id).await?;
        drop(guard);
        // Identities are untrusted input; drop the lock entry with the
        // subscription so the map stays bounded by live subscriptions.
        self.locks.release(id);
        tracing::info!(id = %id, "subscription removed");
        Ok(())
    }
}
