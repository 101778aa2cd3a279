//! Realtime sweep.
//!
//! Periodic pass over every known subscription: identities currently inside
//! their window are batched into one outbound realtime-notification POST so
//! the poller re-polls them promptly; subscriptions that are outside get
//! their decay state cleared. A failure on any one step is logged and the
//! pass continues.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::json;

use crate::storage::{KeyedLocks, Registry};

/// Reference cadence between sweep passes.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

const NOTIFY_TIMEOUT: Duration = Duration::from_secs(10);

/// Settings for the sweep task.
#[derive(Debug, Clone)]
pub struct SweepSettings {
    /// Batched realtime notification endpoint.
    pub realtime_url: String,
    /// Shared service key sent on the outbound request.
    pub service_key: String,
    pub interval: Duration,
}

/// Periodic window sweep over the subscription registry.
pub struct RealtimeSweep {
    registry: Arc<dyn Registry>,
    locks: Arc<KeyedLocks>,
    client: reqwest::Client,
    settings: SweepSettings,
}

impl RealtimeSweep {
    pub fn new(
        registry: Arc<dyn Registry>,
        locks: Arc<KeyedLocks>,
        settings: SweepSettings,
    ) -> Self {
        Self {
            registry,
            locks,
            client: reqwest::Client::new(),
            settings,
        }
    }

    /// Spawn the sweep loop on the current runtime. The loop never exits on
    /// its own; errors inside a pass are logged and the next tick proceeds.
    pub fn spawn(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.settings.interval);
            loop {
                ticker.tick().await;
                self.run_once(Utc::now()).await;
            }
        })
    }

    /// One sweep pass at `now` (injectable for tests).
    ///
    /// Returns the identities that were signaled, mostly for tests and
    /// logging.
    pub async fn run_once(&self, now: DateTime<Utc>) -> Vec<String> {
        let subscriptions = match self.registry.list_all().await {
            Ok(subs) => subs,
            Err(err) => {
                tracing::warn!(error = %err, "sweep could not list subscriptions, skipping pass");
                return Vec::new();
            }
        };

        let mut active = Vec::new();
        for sub in subscriptions {
            if sub.window().contains(now) {
                active.push(sub.id);
            } else {
                let _guard = self.locks.lock(&sub.id).await;
                if let Err(err) = self.registry.set_last_notified(&sub.id, None).await {
                    tracing::warn!(id = %sub.id, error = %err, "window-exit reset failed, skipping");
                }
            }
        }

        if active.is_empty() {
            return active;
        }

        // One batched signal per pass, never one call per subscription.
        if let Err(err) = self.notify_batch(&active).await {
            tracing::warn!(
                count = active.len(),
                error = %err,
                "realtime notification batch failed"
            );
        } else {
            tracing::debug!(count = active.len(), "realtime notification batch sent");
        }
        active
    }

    async fn notify_batch(&self, identities: &[String]) -> Result<(), reqwest::Error> {
        let body = json!({
            "data": identities
                .iter()
                .map(|id| json!({ "trigger_identity": id }))
                .collect::<Vec<_>>(),
        });

        self.client
            .post(&self.settings.realtime_url)
            .timeout(NOTIFY_TIMEOUT)
            .header("IFTTT-Service-Key", &self.settings.service_key)
            .json(&body)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use chrono_tz::America::Los_Angeles;

    use crate::directions::{DirectionsClient, RouteEstimate};
    use crate::error::DirectionsError;
    use crate::storage::{MemoryStore, Registry};
    use crate::subscription::{EvaluationRequest, Subscription, TriggerFields, UserFields};
    use crate::trigger::TriggerService;
    use crate::window::TimeOfDay;

    fn sub(id: &str, start_hour: u32, end_hour: u32, last: Option<u32>) -> Subscription {
        Subscription {
            id: id.to_string(),
            time_zone: Los_Angeles,
            window_start: TimeOfDay::new(start_hour, 0).unwrap(),
            window_end: TimeOfDay::new(end_hour, 0).unwrap(),
            threshold_minutes: 15,
            origin_address: "123 Fake St".to_string(),
            destination_address: "456 Work Ave".to_string(),
            last_notified_minutes: last,
        }
    }

    /// Wednesday 18:00 Los Angeles.
    fn wednesday_evening() -> DateTime<Utc> {
        Los_Angeles
            .with_ymd_and_hms(2024, 6, 12, 18, 0, 0)
            .unwrap()
            .with_timezone(&Utc)
    }

    fn sweep(store: Arc<MemoryStore>, url: String) -> RealtimeSweep {
        RealtimeSweep::new(
            store,
            Arc::new(KeyedLocks::new()),
            SweepSettings {
                realtime_url: url,
                service_key: "service-key".to_string(),
                interval: DEFAULT_SWEEP_INTERVAL,
            },
        )
    }

    #[tokio::test]
    async fn test_sweep_batches_active_and_resets_inactive() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/notifications")
            .match_header("IFTTT-Service-Key", "service-key")
            .match_body(mockito::Matcher::PartialJson(serde_json::json!({
                "data": [{ "trigger_identity": "active-1" }]
            })))
            .with_status(200)
            .create_async()
            .await;

        let store = Arc::new(MemoryStore::new());
        store.upsert(&sub("active-1", 17, 19, None)).await.unwrap();
        store.upsert(&sub("idle-1", 6, 9, Some(12))).await.unwrap();

        let sweep = sweep(store.clone(), format!("{}/v1/notifications", server.url()));
        let signaled = sweep.run_once(wednesday_evening()).await;

        assert_eq!(signaled, vec!["active-1".to_string()]);
        mock.assert_async().await;

        // Window-exit reset applied to the inactive subscription.
        let idle = store.get("idle-1").await.unwrap().unwrap();
        assert_eq!(idle.last_notified_minutes, None);
    }

    #[tokio::test]
    async fn test_sweep_no_outbound_call_when_nothing_active() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/notifications")
            .expect(0)
            .create_async()
            .await;

        let store = Arc::new(MemoryStore::new());
        store.upsert(&sub("idle-1", 6, 9, Some(12))).await.unwrap();

        let sweep = sweep(store.clone(), format!("{}/v1/notifications", server.url()));
        let signaled = sweep.run_once(wednesday_evening()).await;

        assert!(signaled.is_empty());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_sweep_continues_past_notify_failure() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/notifications")
            .with_status(500)
            .create_async()
            .await;

        let store = Arc::new(MemoryStore::new());
        store.upsert(&sub("active-1", 17, 19, None)).await.unwrap();
        store.upsert(&sub("idle-1", 6, 9, Some(9))).await.unwrap();

        let sweep = sweep(store.clone(), format!("{}/v1/notifications", server.url()));
        // Notify fails; resets still applied and the pass returns.
        let signaled = sweep.run_once(wednesday_evening()).await;
        assert_eq!(signaled.len(), 1);

        let idle = store.get("idle-1").await.unwrap().unwrap();
        assert_eq!(idle.last_notified_minutes, None);
    }

    #[tokio::test]
    async fn test_sweep_skips_weekends_entirely() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/notifications")
            .expect(0)
            .create_async()
            .await;

        let store = Arc::new(MemoryStore::new());
        store.upsert(&sub("active-1", 0, 23, Some(5))).await.unwrap();

        // Saturday noon: even an all-day window is inactive.
        let saturday = Los_Angeles
            .with_ymd_and_hms(2024, 6, 15, 12, 0, 0)
            .unwrap()
            .with_timezone(&Utc);

        let sweep = sweep(store.clone(), format!("{}/v1/notifications", server.url()));
        let signaled = sweep.run_once(saturday).await;

        assert!(signaled.is_empty());
        mock.assert_async().await;
        let stored = store.get("active-1").await.unwrap().unwrap();
        assert_eq!(stored.last_notified_minutes, None);
    }

    /// Lookup double that answers after a delay, keeping the evaluation's
    /// read-modify-write in flight long enough for a sweep tick to overlap.
    struct SlowDirections {
        minutes: u32,
        delay: Duration,
    }

    #[async_trait]
    impl DirectionsClient for SlowDirections {
        async fn route(
            &self,
            _origin: &str,
            _destination: &str,
        ) -> Result<RouteEstimate, DirectionsError> {
            tokio::time::sleep(self.delay).await;
            Ok(RouteEstimate {
                summary: "I-5 N".to_string(),
                duration_in_traffic_minutes: self.minutes,
            })
        }
    }

    #[tokio::test]
    async fn test_sweep_clear_not_stomped_by_inflight_evaluation() {
        let store = Arc::new(MemoryStore::new());
        let locks = Arc::new(KeyedLocks::new());
        store.upsert(&sub("sub-1", 17, 19, Some(12))).await.unwrap();

        let service = Arc::new(TriggerService::new(
            store.clone(),
            store.clone(),
            Arc::new(SlowDirections {
                minutes: 7,
                delay: Duration::from_millis(50),
            }),
            locks.clone(),
        ));
        let sweep = RealtimeSweep::new(
            store.clone(),
            locks,
            SweepSettings {
                // Never reached: nothing is active at the sweep's instant.
                realtime_url: "http://127.0.0.1:9/unused".to_string(),
                service_key: "service-key".to_string(),
                interval: DEFAULT_SWEEP_INTERVAL,
            },
        );

        let request = EvaluationRequest {
            trigger_identity: Some("sub-1".to_string()),
            trigger_fields: Some(TriggerFields {
                origin_address: Some("123 Fake St".to_string()),
                destination_address: Some("456 Work Ave".to_string()),
                threshold_duration: Some("15".to_string()),
                commute_window_start: Some("17".to_string()),
                commute_window_end: Some("19".to_string()),
            }),
            user: Some(UserFields {
                timezone: Some("America/Los_Angeles".to_string()),
            }),
            limit: None,
        };

        // Evaluation inside the window; it holds the key lock across its
        // slow lookup and its state write.
        let eval = tokio::spawn({
            let service = Arc::clone(&service);
            async move {
                service
                    .evaluate_at(&request, wednesday_evening())
                    .await
                    .unwrap()
            }
        });
        tokio::time::sleep(Duration::from_millis(10)).await;

        // Sweep at Wednesday noon sees the subscription outside its window.
        // Its reset must serialize after the in-flight write; an unlocked
        // interleaving would let the evaluation stomp the clear with a
        // stale `Some(7)`.
        let noon = Los_Angeles
            .with_ymd_and_hms(2024, 6, 12, 12, 0, 0)
            .unwrap()
            .with_timezone(&Utc);
        sweep.run_once(noon).await;

        let events = eval.await.unwrap();
        assert_eq!(events.len(), 1); // 7 <= 12 - 5: the evaluation fired

        let stored = store.get("sub-1").await.unwrap().unwrap();
        assert_eq!(stored.last_notified_minutes, None);
    }
}
