//! Concurrent in-memory table of cache entries keyed by discovery URI.

use std::{sync::Arc, time::SystemTime};

use dashmap::DashMap;
use tracing::debug;

use super::CacheEntry;

/// A thread-safe map from discovery URI to [`CacheEntry`].
///
/// Entries are swapped atomically per key; there is no coordination across
/// keys or across tables.
#[derive(Debug)]
pub struct CacheTable<T> {
    entries: DashMap<String, CacheEntry<T>>,
}

impl<T> Default for CacheTable<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> CacheTable<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Returns the cached value for `key` if it is still fresh at `now`.
    pub fn get_fresh(&self, key: &str, now: SystemTime) -> Option<Arc<T>> {
        self.entries
            .get(key)
            .filter(|entry| entry.is_fresh(now))
            .map(|entry| Arc::clone(entry.value().value()))
    }

    /// Returns the entry for `key` regardless of freshness.
    pub fn get(&self, key: &str) -> Option<CacheEntry<T>> {
        self.entries.get(key).map(|entry| entry.clone())
    }

    /// Stores `entry` under `key`, replacing any previous entry.
    pub fn insert(&self, key: &str, entry: CacheEntry<T>) {
        self.entries.insert(key.to_string(), entry);
    }

    pub fn remove(&self, key: &str) -> Option<CacheEntry<T>> {
        self.entries.remove(key).map(|(_, entry)| entry)
    }

    /// Removes every entry whose expiry lies before `threshold`.
    ///
    /// Candidates are collected first and removed one by one. Each removal
    /// re-checks the expiry, so an entry replaced by a refetch in between is
    /// kept. Returns the number of entries removed.
    pub fn evict_older_than(&self, threshold: SystemTime) -> usize {
        let candidates: Vec<String> = self
            .entries
            .iter()
            .filter(|entry| entry.expires_at() < threshold)
            .map(|entry| entry.key().clone())
            .collect();

        let mut evicted = 0;
        for key in candidates {
            match self
                .entries
                .remove_if(&key, |_, entry| entry.expires_at() < threshold)
            {
                Some(_) => evicted += 1,
                None => debug!(key = %key, "Skipped eviction of refreshed or removed entry"),
            }
        }
        evicted
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
