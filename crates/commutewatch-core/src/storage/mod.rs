//! Subscription registry and event store abstractions.
//!
//! The registry is an injected collaborator so persistence technology stays
//! swappable: an in-memory table for tests and single-process deployments,
//! SQLite for anything that must survive a restart. Every operation is
//! atomic per subscription id; cross-operation read-modify-write sequences
//! additionally serialize through [`KeyedLocks`].

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::OwnedMutexGuard;

use crate::error::RegistryError;
use crate::event::Event;
use crate::subscription::Subscription;

/// Keyed store of one record per trigger identity.
///
/// `get` distinguishes "record absent" (`Ok(None)`) from "backend failed"
/// (`Err`); callers must never collapse the two, or a failed decay-state
/// read would look like a fresh subscription and re-notify spuriously.
#[async_trait]
pub trait Registry: Send + Sync {
    async fn get(&self, id: &str) -> Result<Option<Subscription>, RegistryError>;

    /// Write the full record, creating or replacing.
    async fn upsert(&self, sub: &Subscription) -> Result<(), RegistryError>;

    /// Merge-refresh the caller-supplied config fields (window, threshold,
    /// addresses, zone), preserving any stored decay state. Creates the
    /// record when absent.
    async fn refresh_config(&self, sub: &Subscription) -> Result<(), RegistryError>;

    /// Set (`Some`) or clear (`None`) the decay field. No-op when the
    /// record is absent, mirroring a field delete on a missing document.
    async fn set_last_notified(
        &self,
        id: &str,
        minutes: Option<u32>,
    ) -> Result<(), RegistryError>;

    /// Remove the record. Idempotent: an absent id is not an error.
    async fn delete(&self, id: &str) -> Result<(), RegistryError>;

    /// All known subscriptions, for the sweep.
    async fn list_all(&self) -> Result<Vec<Subscription>, RegistryError>;
}

/// Append-only notification event log, queried most-recent-first.
#[async_trait]
pub trait EventStore: Send + Sync {
    async fn append(&self, subscription_id: &str, event: &Event) -> Result<(), RegistryError>;

    /// Up to `limit` events for `subscription_id`, newest first by
    /// `meta.timestamp`. Unknown ids yield an empty list.
    async fn list_recent(
        &self,
        subscription_id: &str,
        limit: i64,
    ) -> Result<Vec<Event>, RegistryError>;
}

/// Per-subscription async locks.
///
/// An inbound evaluation and a sweep tick may race on the same identity;
/// holding the key's lock across a read-modify-write keeps a decay clear
/// from being overwritten by a stale write. Isolation is per key only, no
/// global lock.
#[derive(Default)]
pub struct KeyedLocks {
    inner: std::sync::Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock for `key`, creating it on first use.
    pub async fn lock(&self, key: &str) -> OwnedMutexGuard<()> {
        let entry = {
            let mut map = self.inner.lock().expect("keyed lock map poisoned");
            Arc::clone(
                map.entry(key.to_string())
                    .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(()))),
            )
        };
        entry.lock_owned().await
    }

    /// Drop the entry for `key` when no task holds or awaits its lock.
    ///
    /// Keys are untrusted trigger identities, so the map must not grow for
    /// the lifetime of the process; callers release on unsubscribe. Holders
    /// and waiters keep an `Arc` clone of the entry, which keeps removal
    /// safe: a live lock is never replaced by a fresh one.
    pub fn release(&self, key: &str) {
        let mut map = self.inner.lock().expect("keyed lock map poisoned");
        if let Some(entry) = map.get(key) {
            if Arc::strong_count(entry) == 1 {
                map.remove(key);
            }
        }
    }

    /// Whether an entry exists for `key`.
    pub fn contains(&self, key: &str) -> bool {
        self.inner
            .lock()
            .expect("keyed lock map poisoned")
            .contains_key(key)
    }
}
