//! Per-conversation serialization.
//!
//! Records for the same thread are processed one at a time so the
//! read-then-write on `bot_enabled` and the Instagram echo flag cannot
//! interleave. Different threads proceed in parallel.

use std::sync::Arc;

use {
    dashmap::DashMap,
    handoff_common::ConversationKey,
    tokio::sync::{Mutex, OwnedMutexGuard},
};

#[derive(Default)]
pub struct ThreadLocks {
    locks: DashMap<ConversationKey, Arc<Mutex<()>>>,
}

/// Held while a record is processed. Unused entries are dropped on release.
pub struct ThreadGuard<'a> {
    owner: &'a ThreadLocks,
    key: ConversationKey,
    guard: Option<OwnedMutexGuard<()>>,
}

impl ThreadLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, key: &ConversationKey) -> ThreadGuard<'_> {
        // Clone out of the map so the shard lock is not held across the await.
        let mutex = Arc::clone(self.locks.entry(key.clone()).or_default().value());
        let guard = mutex.lock_owned().await;
        ThreadGuard {
            owner: self,
            key: key.clone(),
            guard: Some(guard),
        }
    }

    /// Threads with a holder or waiter.
    pub fn active(&self) -> usize {
        self.locks.len()
    }
}

impl Drop for ThreadGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        // Only the map's own reference left means nobody is waiting.
        self.owner
            .locks
            .remove_if(&self.key, |_, mutex| Arc::strong_count(mutex) == 1);
    }
}
