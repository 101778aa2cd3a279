//! In-memory registry and event store.
//!
//! Replaces the process-global mutable table of the earliest service
//! variant with an owned, injectable store. Suitable for tests and for
//! single-process deployments that accept losing state on restart.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::RegistryError;
use crate::event::Event;
use crate::storage::{EventStore, Registry};
use crate::subscription::Subscription;

#[derive(Default)]
struct Tables {
    subscriptions: HashMap<String, Subscription>,
    events: HashMap<String, Vec<Event>>,
}

/// In-memory store implementing both [`Registry`] and [`EventStore`].
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Registry for MemoryStore {
    async fn get(&self, id: &str) -> Result<Option<Subscription>, RegistryError> {
        Ok(self.tables.lock().await.subscriptions.get(id).cloned())
    }

    async fn upsert(&self, sub: &Subscription) -> Result<(), RegistryError> {
        self.tables
            .lock()
            .await
            .subscriptions
            .insert(sub.id.clone(), sub.clone());
        Ok(())
    }

    async fn refresh_config(&self, sub: &Subscription) -> Result<(), RegistryError> {
        let mut tables = self.tables.lock().await;
        match tables.subscriptions.get_mut(&sub.id) {
            Some(stored) => {
                let last_notified = stored.last_notified_minutes;
                *stored = sub.clone();
                stored.last_notified_minutes = last_notified;
            }
            None => {
                let mut record = sub.clone();
                record.last_notified_minutes = None;
                tables.subscriptions.insert(record.id.clone(), record);
            }
        }
        Ok(())
    }

    async fn set_last_notified(
        &self,
        id: &str,
        minutes: Option<u32>,
    ) -> Result<(), RegistryError> {
        if let Some(stored) = self.tables.lock().await.subscriptions.get_mut(id) {
            stored.last_notified_minutes = minutes;
        }
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), RegistryError> {
        let mut tables = self.tables.lock().await;
        tables.subscriptions.remove(id);
        tables.events.remove(id);
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<Subscription>, RegistryError> {
        Ok(self.tables.lock().await.subscriptions.values().cloned().collect())
    }
}

#[async_trait]
impl EventStore for MemoryStore {
    async fn append(&self, subscription_id: &str, event: &Event) -> Result<(), RegistryError> {
        self.tables
            .lock()
            .await
            .events
            .entry(subscription_id.to_string())
            .or_default()
            .push(event.clone());
        Ok(())
    }

    async fn list_recent(
        &self,
        subscription_id: &str,
        limit: i64,
    ) -> Result<Vec<Event>, RegistryError> {
        if limit <= 0 {
            return Ok(Vec::new());
        }
        let tables = self.tables.lock().await;
        let mut events = tables
            .events
            .get(subscription_id)
            .cloned()
            .unwrap_or_default();
        events.sort_by(|a, b| b.meta.timestamp.cmp(&a.meta.timestamp));
        events.truncate(limit as usize);
        Ok(events)
    }
}
