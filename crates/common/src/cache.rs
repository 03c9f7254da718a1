//! Key/value storage with per-entry expiry.
//!
//! Entries are evicted lazily: an expired entry is dropped the next time it
//! is read. [`MemoryTtlStore`] keeps everything in process; a shared backend
//! can implement [`TtlStore`] so several router instances see the same state.

use std::{
    collections::HashMap,
    hash::Hash,
    sync::{Mutex, MutexGuard},
    time::{Duration, Instant},
};

use async_trait::async_trait;

#[async_trait]
pub trait TtlStore<K, V>: Send + Sync
where
    K: Send + Sync + 'static,
    V: Send + 'static,
{
    /// Return the live value for `key`, evicting it if it has expired.
    async fn get(&self, key: &K) -> Option<V>;

    /// Insert or replace `key`, live for `ttl` from now.
    async fn insert(&self, key: K, value: V, ttl: Duration);

    /// Remove `key` and return its value if it was still live.
    async fn take(&self, key: &K) -> Option<V>;

    /// Drop every expired entry. Returns how many were removed.
    async fn purge_expired(&self) -> usize;
}

struct Entry<V> {
    value: V,
    expires_at: Instant,
}

impl<V> Entry<V> {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// Process-local [`TtlStore`] guarded by a single mutex.
pub struct MemoryTtlStore<K, V> {
    entries: Mutex<HashMap<K, Entry<V>>>,
}

impl<K, V> Default for MemoryTtlStore<K, V> {
    fn default() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }
}

impl<K, V> MemoryTtlStore<K, V>
where
    K: Eq + Hash,
{
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<K, Entry<V>>> {
        self.entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Number of stored entries, expired ones included.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

#[async_trait]
impl<K, V> TtlStore<K, V> for MemoryTtlStore<K, V>
where
    K: Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    async fn get(&self, key: &K) -> Option<V> {
        let now = Instant::now();
        let mut entries = self.lock();
        match entries.get(key) {
            Some(entry) if entry.is_live(now) => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            },
            None => None,
        }
    }

    async fn insert(&self, key: K, value: V, ttl: Duration) {
        let expires_at = Instant::now() + ttl;
        self.lock().insert(key, Entry { value, expires_at });
    }

    async fn take(&self, key: &K) -> Option<V> {
        let now = Instant::now();
        self.lock()
            .remove(key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.value)
    }

    async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|_, e| e.is_live(now));
        before - entries.len()
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    const HOUR: Duration = Duration::from_secs(3600);

    #[tokio::test]
    async fn get_returns_live_value() {
        let store = MemoryTtlStore::new();
        store.insert("u1".to_string(), "Ana".to_string(), HOUR).await;
        assert_eq!(store.get(&"u1".to_string()).await.as_deref(), Some("Ana"));
        // Still there after a read.
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn expired_entry_is_evicted_on_read() {
        let store = MemoryTtlStore::new();
        store.insert("u1".to_string(), 1u8, Duration::ZERO).await;
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(&"u1".to_string()).await, None);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn take_consumes_the_entry() {
        let store = MemoryTtlStore::new();
        store.insert(7u32, true, HOUR).await;
        assert_eq!(store.take(&7).await, Some(true));
        assert_eq!(store.take(&7).await, None);
    }

    #[tokio::test]
    async fn take_ignores_expired_entry() {
        let store = MemoryTtlStore::new();
        store.insert(7u32, true, Duration::ZERO).await;
        assert_eq!(store.take(&7).await, None);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn insert_replaces_and_refreshes() {
        let store = MemoryTtlStore::new();
        store.insert(1u32, "old", Duration::ZERO).await;
        store.insert(1u32, "new", HOUR).await;
        assert_eq!(store.get(&1).await, Some("new"));
    }

    #[tokio::test]
    async fn purge_expired_keeps_live_entries() {
        let store = MemoryTtlStore::new();
        store.insert(1u32, (), Duration::ZERO).await;
        store.insert(2u32, (), HOUR).await;
        assert_eq!(store.purge_expired().await, 1);
        assert_eq!(store.len(), 1);
    }
}
