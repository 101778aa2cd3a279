//! SQLite-backed registry and event store.
//!
//! One connection behind a mutex; schema is migrated on open. Each trait
//! operation is a single statement or transaction, so it is atomic per
//! subscription id.

use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::RegistryError;
use crate::event::{Event, EventMeta};
use crate::storage::{EventStore, Registry};
use crate::subscription::Subscription;
use crate::window::{TimeOfDay, TimeWindow};

/// SQLite store implementing both [`Registry`] and [`EventStore`].
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the database at `path` and migrate the schema.
    pub fn open(path: &Path) -> Result<Self, RegistryError> {
        let conn = Connection::open(path)
            .map_err(|e| RegistryError::Unavailable(format!("{}: {e}", path.display())))?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.migrate()?;
        Ok(store)
    }

    /// Open an in-memory database (for tests).
    pub fn open_memory() -> Result<Self, RegistryError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| RegistryError::Unavailable(e.to_string()))?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.migrate()?;
        Ok(store)
    }

    fn migrate(&self) -> Result<(), RegistryError> {
        self.lock_conn().execute_batch(
            "CREATE TABLE IF NOT EXISTS subscriptions (
                id                    TEXT PRIMARY KEY,
                time_zone             TEXT NOT NULL,
                window_start_hour     INTEGER NOT NULL,
                window_start_minute   INTEGER NOT NULL,
                window_end_hour       INTEGER NOT NULL,
                window_end_minute     INTEGER NOT NULL,
                threshold_minutes     INTEGER NOT NULL,
                origin_address        TEXT NOT NULL,
                destination_address   TEXT NOT NULL,
                last_notified_minutes INTEGER
            );

            CREATE TABLE IF NOT EXISTS events (
                id                  TEXT PRIMARY KEY,
                subscription_id     TEXT NOT NULL,
                commute_duration    INTEGER NOT NULL,
                origin_address      TEXT NOT NULL,
                destination_address TEXT NOT NULL,
                route_to_take       TEXT NOT NULL,
                created_at          TEXT NOT NULL,
                timestamp           INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_events_subscription_ts
                ON events(subscription_id, timestamp DESC);",
        )?;
        Ok(())
    }

    fn lock_conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().expect("sqlite connection lock poisoned")
    }
}

fn row_to_subscription(row: &rusqlite::Row<'_>) -> rusqlite::Result<(String, Subscription)> {
    let id: String = row.get("id")?;
    let zone_name: String = row.get("time_zone")?;
    Ok((
        zone_name,
        Subscription {
            id,
            // Zone validity is re-checked by the caller; a placeholder here
            // keeps the row decode infallible.
            time_zone: chrono_tz::UTC,
            window_start: TimeOfDay {
                hour: row.get("window_start_hour")?,
                minute: row.get("window_start_minute")?,
            },
            window_end: TimeOfDay {
                hour: row.get("window_end_hour")?,
                minute: row.get("window_end_minute")?,
            },
            threshold_minutes: row.get("threshold_minutes")?,
            origin_address: row.get("origin_address")?,
            destination_address: row.get("destination_address")?,
            last_notified_minutes: row.get("last_notified_minutes")?,
        },
    ))
}

fn resolve_zone(
    (zone_name, mut sub): (String, Subscription),
) -> Result<Subscription, RegistryError> {
    sub.time_zone =
        TimeWindow::parse_zone(&zone_name).map_err(|_| RegistryError::CorruptRecord {
            id: sub.id.clone(),
            message: format!("unknown stored timezone '{zone_name}'"),
        })?;
    Ok(sub)
}

#[async_trait]
impl Registry for SqliteStore {
    async fn get(&self, id: &str) -> Result<Option<Subscription>, RegistryError> {
        let conn = self.lock_conn();
        let row = conn
            .query_row(
                "SELECT * FROM subscriptions WHERE id = ?1",
                params![id],
                row_to_subscription,
            )
            .optional()?;
        row.map(resolve_zone).transpose()
    }

    async fn upsert(&self, sub: &Subscription) -> Result<(), RegistryError> {
        self.lock_conn().execute(
            "INSERT INTO subscriptions (id, time_zone, window_start_hour, window_start_minute,
                window_end_hour, window_end_minute, threshold_minutes, origin_address,
                destination_address, last_notified_minutes)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
             ON CONFLICT(id) DO UPDATE SET
                time_zone = excluded.time_zone,
                window_start_hour = excluded.window_start_hour,
                window_start_minute = excluded.window_start_minute,
                window_end_hour = excluded.window_end_hour,
                window_end_minute = excluded.window_end_minute,
                threshold_minutes = excluded.threshold_minutes,
                origin_address = excluded.origin_address,
                destination_address = excluded.destination_address,
                last_notified_minutes = excluded.last_notified_minutes",
            params![
                sub.id,
                sub.time_zone.name(),
                sub.window_start.hour,
                sub.window_start.minute,
                sub.window_end.hour,
                sub.window_end.minute,
                sub.threshold_minutes,
                sub.origin_address,
                sub.destination_address,
                sub.last_notified_minutes,
            ],
        )?;
        Ok(())
    }

    async fn refresh_config(&self, sub: &Subscription) -> Result<(), RegistryError> {
        // Same upsert, but the conflict arm leaves last_notified_minutes alone.
        self.lock_conn().execute(
            "INSERT INTO subscriptions (id, time_zone, window_start_hour, window_start_minute,
                window_end_hour, window_end_minute, threshold_minutes, origin_address,
                destination_address, last_notified_minutes)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, NULL)
             ON CONFLICT(id) DO UPDATE SET
                time_zone = excluded.time_zone,
                window_start_hour = excluded.window_start_hour,
                window_start_minute = excluded.window_start_minute,
                window_end_hour = excluded.window_end_hour,
                window_end_minute = excluded.window_end_minute,
                threshold_minutes = excluded.threshold_minutes,
                origin_address = excluded.origin_address,
                destination_address = excluded.destination_address",
            params![
                sub.id,
                sub.time_zone.name(),
                sub.window_start.hour,
                sub.window_start.minute,
                sub.window_end.hour,
                sub.window_end.minute,
                sub.threshold_minutes,
                sub.origin_address,
                sub.destination_address,
            ],
        )?;
        Ok(())
    }

    async fn set_last_notified(
        &self,
        id: &str,
        minutes: Option<u32>,
    ) -> Result<(), RegistryError> {
        self.lock_conn().execute(
            "UPDATE subscriptions SET last_notified_minutes = ?2 WHERE id = ?1",
            params![id, minutes],
        )?;
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), RegistryError> {
        let conn = self.lock_conn();
        conn.execute("DELETE FROM subscriptions WHERE id = ?1", params![id])?;
        conn.execute("DELETE FROM events WHERE subscription_id = ?1", params![id])?;
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<Subscription>, RegistryError> {
        let conn = self.lock_conn();
        let mut stmt = conn.prepare("SELECT * FROM subscriptions")?;
        let rows = stmt.query_map([], row_to_subscription)?;
        let mut subs = Vec::new();
        for row in rows {
            subs.push(resolve_zone(row?)?);
        }
        Ok(subs)
    }
}

#[async_trait]
impl EventStore for SqliteStore {
    async fn append(&self, subscription_id: &str, event: &Event) -> Result<(), RegistryError> {
        self.lock_conn().execute(
            "INSERT INTO events (id, subscription_id, commute_duration, origin_address,
                destination_address, route_to_take, created_at, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                event.meta.id,
                subscription_id,
                event.commute_duration,
                event.origin_address,
                event.destination_address,
                event.route_to_take,
                event.created_at,
                event.meta.timestamp,
            ],
        )?;
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
        let conn = self.lock_conn();
        let mut stmt = conn.prepare(
            "SELECT id, commute_duration, origin_address, destination_address,
                    route_to_take, created_at, timestamp
             FROM events WHERE subscription_id = ?1
             ORDER BY timestamp DESC LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![subscription_id, limit], |row| {
            Ok(Event {
                commute_duration: row.get("commute_duration")?,
                origin_address: row.get("origin_address")?,
                destination_address: row.get("destination_address")?,
                route_to_take: row.get("route_to_take")?,
                created_at: row.get("created_at")?,
                meta: EventMeta {
                    id: row.get("id")?,
                    timestamp: row.get("timestamp")?,
                },
            })
        })?;
        let mut events = Vec::new();
        for row in rows {
            events.push(row?);
        }
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use chrono_tz::America::Los_Angeles;

    fn sub(id: &str) -> Subscription {
        Subscription {
            id: id.to_string(),
            time_zone: Los_Angeles,
            window_start: TimeOfDay { hour: 17, minute: 0 },
            window_end: TimeOfDay { hour: 19, minute: 0 },
            threshold_minutes: 15,
            origin_address: "123 Fake St".to_string(),
            destination_address: "456 Work Ave".to_string(),
            last_notified_minutes: None,
        }
    }

    #[tokio::test]
    async fn test_upsert_get_roundtrip() {
        let store = SqliteStore::open_memory().unwrap();
        let mut record = sub("a");
        record.last_notified_minutes = Some(12);
        store.upsert(&record).await.unwrap();

        let stored = store.get("a").await.unwrap().unwrap();
        assert_eq!(stored, record);
        assert!(store.get("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_refresh_config_preserves_decay() {
        let store = SqliteStore::open_memory().unwrap();
        let mut record = sub("a");
        record.last_notified_minutes = Some(9);
        store.upsert(&record).await.unwrap();

        let mut refreshed = sub("a");
        refreshed.threshold_minutes = 25;
        refreshed.last_notified_minutes = Some(99);
        store.refresh_config(&refreshed).await.unwrap();

        let stored = store.get("a").await.unwrap().unwrap();
        assert_eq!(stored.threshold_minutes, 25);
        assert_eq!(stored.last_notified_minutes, Some(9));
    }

    #[tokio::test]
    async fn test_set_and_clear_last_notified() {
        let store = SqliteStore::open_memory().unwrap();
        store.upsert(&sub("a")).await.unwrap();

        store.set_last_notified("a", Some(11)).await.unwrap();
        assert_eq!(
            store.get("a").await.unwrap().unwrap().last_notified_minutes,
            Some(11)
        );

        store.set_last_notified("a", None).await.unwrap();
        assert_eq!(
            store.get("a").await.unwrap().unwrap().last_notified_minutes,
            None
        );

        // Missing id is a no-op, not an error.
        store.set_last_notified("ghost", Some(1)).await.unwrap();
    }

    #[tokio::test]
    async fn test_delete_removes_subscription_and_events() {
        let store = SqliteStore::open_memory().unwrap();
        store.upsert(&sub("a")).await.unwrap();
        let event = Event::new(12, "o", "d", "I-5 N", Utc::now());
        store.append("a", &event).await.unwrap();

        store.delete("a").await.unwrap();
        assert!(store.get("a").await.unwrap().is_none());
        assert!(store.list_recent("a", 10).await.unwrap().is_empty());

        store.delete("a").await.unwrap(); // idempotent
    }

    #[tokio::test]
    async fn test_list_recent_orders_and_limits() {
        let store = SqliteStore::open_memory().unwrap();
        let now = Utc::now();
        for i in 0..4i64 {
            let event = Event::new(10 + i as u32, "o", "d", "route", now + Duration::seconds(i));
            store.append("a", &event).await.unwrap();
        }

        let events = store.list_recent("a", 2).await.unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].commute_duration, 13);
        assert_eq!(events[1].commute_duration, 12);

        assert!(store.list_recent("a", 0).await.unwrap().is_empty());
        assert!(store.list_recent("a", -3).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_open_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("commutewatch.db");
        {
            let store = SqliteStore::open(&path).unwrap();
            store.upsert(&sub("persist")).await.unwrap();
        }
        let store = SqliteStore::open(&path).unwrap();
        assert!(store.get("persist").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_list_all() {
        let store = SqliteStore::open_memory().unwrap();
        store.upsert(&sub("a")).await.unwrap();
        store.upsert(&sub("b")).await.unwrap();
        let mut ids: Vec<String> = store
            .list_all()
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.id)
            .collect();
        ids.sort();
        assert_eq!(ids, vec!["a", "b"]);
    }
}
