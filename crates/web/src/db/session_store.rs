//! Session store adapter with touch debouncing.
//!
//! The session manager runs with `always_save`, so every request ends with a
//! `save`. Most of those saves carry exactly what is already persisted and
//! only exist to slide the expiry forward. [`TouchDebouncedStore`] remembers
//! the last persisted state of each session and turns such saves into
//! touches, which reach the backing store at most once per `touch_after`.
//! A save whose data differs from the persisted copy is always written.
//!
//! The time of the last write is recovered from a loaded record as
//! `expiry_date - ttl`: with inactivity expiry every write sets
//! `expiry_date = now + ttl`.

use std::collections::HashMap;
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use moka::future::Cache;
use serde_json::Value;
use tower_sessions::cookie::time::{Duration, OffsetDateTime};
use tower_sessions::session::{Id, Record};
use tower_sessions::session_store::{self, SessionStore};

use crate::config::SessionConfig;

/// Upper bound on sessions whose persisted state is remembered.
const MAX_TRACKED_SESSIONS: u64 = 100_000;

/// Longest a remembered state is kept without being read.
const MAX_TRACKED_IDLE: StdDuration = StdDuration::from_secs(365 * 24 * 60 * 60);

#[derive(Debug, Clone)]
struct Persisted {
    data: HashMap<String, Value>,
    written_at: OffsetDateTime,
}

/// Wraps a [`SessionStore`] and rate-limits writes that do not change data.
#[derive(Debug, Clone)]
pub struct TouchDebouncedStore<S> {
    inner: S,
    ttl: Duration,
    touch_after: Duration,
    persisted: Cache<Id, Persisted>,
}

impl<S: SessionStore> TouchDebouncedStore<S> {
    /// Wrap `inner` using the lifetime and touch window from `config`.
    #[must_use]
    pub fn new(inner: S, config: &SessionConfig) -> Self {
        Self::with_windows(inner, config.ttl, config.touch_after)
    }

    /// Wrap `inner` with explicit lifetime and touch window.
    #[must_use]
    pub fn with_windows(inner: S, ttl: StdDuration, touch_after: StdDuration) -> Self {
        let persisted = Cache::builder()
            .max_capacity(MAX_TRACKED_SESSIONS)
            .time_to_idle(ttl.min(MAX_TRACKED_IDLE))
            .build();

        Self {
            inner,
            ttl: Duration::try_from(ttl).unwrap_or(Duration::MAX),
            touch_after: Duration::try_from(touch_after).unwrap_or(Duration::MAX),
            persisted,
        }
    }

    /// The wrapped store.
    #[must_use]
    pub const fn inner(&self) -> &S {
        &self.inner
    }

    /// Refresh the persisted expiry of `record` without changing its content.
    ///
    /// Writes only if the last write is at least `touch_after` old (or
    /// unknown). Returns whether a write happened.
    ///
    /// # Errors
    ///
    /// Propagates errors from the backing store.
    pub async fn touch(&self, record: &Record) -> session_store::Result<bool> {
        let now = OffsetDateTime::now_utc();
        if let Some(persisted) = self.persisted.get(&record.id).await
            && now - persisted.written_at < self.touch_after
        {
            tracing::trace!(session_id = %record.id, "session touch debounced");
            return Ok(false);
        }

        self.write(record).await?;
        tracing::debug!(session_id = %record.id, "session touched");
        Ok(true)
    }

    async fn write(&self, record: &Record) -> session_store::Result<()> {
        self.inner.save(record).await?;
        self.remember(record, OffsetDateTime::now_utc()).await;
        Ok(())
    }

    async fn remember(&self, record: &Record, written_at: OffsetDateTime) {
        self.persisted
            .insert(
                record.id,
                Persisted {
                    data: record.data.clone(),
                    written_at,
                },
            )
            .await;
    }
}

#[async_trait]
impl<S> SessionStore for TouchDebouncedStore<S>
where
    S: SessionStore,
{
    async fn create(&self, record: &mut Record) -> session_store::Result<()> {
        self.inner.create(record).await?;
        self.remember(record, OffsetDateTime::now_utc()).await;
        Ok(())
    }

    async fn save(&self, record: &Record) -> session_store::Result<()> {
        let unchanged = self
            .persisted
            .get(&record.id)
            .await
            .is_some_and(|persisted| persisted.data == record.data);

        if unchanged {
            self.touch(record).await.map(|_| ())
        } else {
            self.write(record).await
        }
    }

    async fn load(&self, session_id: &Id) -> session_store::Result<Option<Record>> {
        let record = self.inner.load(session_id).await?;
        match &record {
            Some(record) => {
                let written_at = record
                    .expiry_date
                    .checked_sub(self.ttl)
                    .unwrap_or(OffsetDateTime::UNIX_EPOCH);
                self.remember(record, written_at).await;
            }
            None => self.persisted.invalidate(session_id).await,
        }
        Ok(record)
    }

    async fn delete(&self, session_id: &Id) -> session_store::Result<()> {
        self.persisted.invalidate(session_id).await;
        self.inner.delete(session_id).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use tower_sessions::MemoryStore;

    use super::*;

    const TTL: StdDuration = StdDuration::from_secs(7 * 24 * 60 * 60);
    const TOUCH_AFTER: StdDuration = StdDuration::from_secs(24 * 60 * 7);

    /// Memory store that counts writes reaching it.
    #[derive(Debug, Clone, Default)]
    struct CountingStore {
        store: MemoryStore,
        writes: Arc<AtomicUsize>,
    }

    impl CountingStore {
        fn writes(&self) -> usize {
            self.writes.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl SessionStore for CountingStore {
        async fn create(&self, record: &mut Record) -> session_store::Result<()> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            self.store.create(record).await
        }

        async fn save(&self, record: &Record) -> session_store::Result<()> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            self.store.save(record).await
        }

        async fn load(&self, session_id: &Id) -> session_store::Result<Option<Record>> {
            self.store.load(session_id).await
        }

        async fn delete(&self, session_id: &Id) -> session_store::Result<()> {
            self.store.delete(session_id).await
        }
    }

    fn record_with(key: &str, value: &str) -> Record {
        let mut data = HashMap::new();
        data.insert(key.to_string(), Value::String(value.to_string()));
        Record {
            id: Id::default(),
            data,
            expiry_date: OffsetDateTime::now_utc() + Duration::try_from(TTL).unwrap(),
        }
    }

    /// Seed `record` as if it had been written `age` ago.
    async fn seed_aged(counting: &CountingStore, record: &Record, age: StdDuration) {
        let mut aged = record.clone();
        aged.expiry_date = OffsetDateTime::now_utc() + Duration::try_from(TTL).unwrap()
            - Duration::try_from(age).unwrap();
        counting.store.save(&aged).await.unwrap();
    }

    #[tokio::test]
    async fn test_two_touches_within_window_write_once() {
        let counting = CountingStore::default();
        let store = TouchDebouncedStore::with_windows(counting.clone(), TTL, TOUCH_AFTER);
        let record = record_with("flash", "hello");
        seed_aged(&counting, &record, TOUCH_AFTER + StdDuration::from_secs(60)).await;

        let loaded = store.load(&record.id).await.unwrap().unwrap();
        assert!(store.touch(&loaded).await.unwrap());
        assert!(!store.touch(&loaded).await.unwrap());
        assert_eq!(counting.writes(), 1);
    }

    #[tokio::test]
    async fn test_recently_written_session_is_not_touched() {
        let counting = CountingStore::default();
        let store = TouchDebouncedStore::with_windows(counting.clone(), TTL, TOUCH_AFTER);
        let record = record_with("principal", "7");
        seed_aged(&counting, &record, StdDuration::from_secs(5)).await;

        let loaded = store.load(&record.id).await.unwrap().unwrap();
        store.save(&loaded).await.unwrap();
        store.save(&loaded).await.unwrap();
        assert_eq!(counting.writes(), 0);
    }

    #[tokio::test]
    async fn test_changed_data_is_always_written() {
        let counting = CountingStore::default();
        let store = TouchDebouncedStore::with_windows(counting.clone(), TTL, TOUCH_AFTER);
        let mut record = record_with("principal", "7");

        store.create(&mut record).await.unwrap();
        assert_eq!(counting.writes(), 1);

        record
            .data
            .insert("flash".to_string(), Value::String("Welcome back!".to_string()));
        store.save(&record).await.unwrap();
        assert_eq!(counting.writes(), 2);

        record.data.remove("principal");
        store.save(&record).await.unwrap();
        assert_eq!(counting.writes(), 3);

        // Identical content right after a write is only a touch.
        store.save(&record).await.unwrap();
        assert_eq!(counting.writes(), 3);

        let persisted = counting.store.load(&record.id).await.unwrap().unwrap();
        assert!(!persisted.data.contains_key("principal"));
    }

    #[tokio::test]
    async fn test_unknown_session_save_writes() {
        let counting = CountingStore::default();
        let store = TouchDebouncedStore::with_windows(counting.clone(), TTL, TOUCH_AFTER);
        let record = record_with("flash", "x");

        store.save(&record).await.unwrap();
        assert_eq!(counting.writes(), 1);
        assert!(store.load(&record.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_delete_forgets_session() {
        let counting = CountingStore::default();
        let store = TouchDebouncedStore::with_windows(counting.clone(), TTL, TOUCH_AFTER);
        let mut record = record_with("principal", "7");
        store.create(&mut record).await.unwrap();

        store.delete(&record.id).await.unwrap();
        assert!(store.load(&record.id).await.unwrap().is_none());

        // Nothing is remembered, so a save goes straight through.
        store.save(&record).await.unwrap();
        assert_eq!(counting.writes(), 2);
    }

    #[tokio::test]
    async fn test_unbounded_lifetime_does_not_overflow() {
        let counting = CountingStore::default();
        let store = TouchDebouncedStore::with_windows(counting.clone(), StdDuration::MAX, TOUCH_AFTER);
        let record = record_with("principal", "7");
        counting.store.save(&record).await.unwrap();

        // The write time cannot be recovered, so the first touch writes.
        let loaded = store.load(&record.id).await.unwrap().unwrap();
        assert!(store.touch(&loaded).await.unwrap());
        assert!(!store.touch(&loaded).await.unwrap());
        assert_eq!(counting.writes(), 1);
    }
}
