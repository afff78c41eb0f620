//! Caching primitives for discovery documents and key sets.
//!
//! A cached value is paired with an absolute expiry and is never mutated in
//! place: a refetch replaces the whole [`CacheEntry`] under its key.

use std::{sync::Arc, time::SystemTime};

pub mod memory;

pub use memory::CacheTable;

/// A cached value and the instant it stops being fresh.
#[derive(Debug)]
pub struct CacheEntry<T> {
    value: Arc<T>,
    stored_at: SystemTime,
    expires_at: SystemTime,
}

impl<T> Clone for CacheEntry<T> {
    fn clone(&self) -> Self {
        Self {
            value: Arc::clone(&self.value),
            stored_at: self.stored_at,
            expires_at: self.expires_at,
        }
    }
}

impl<T> CacheEntry<T> {
    #[must_use]
    pub fn new(value: Arc<T>, stored_at: SystemTime, expires_at: SystemTime) -> Self {
        Self {
            value,
            stored_at,
            expires_at,
        }
    }

    #[must_use]
    pub fn value(&self) -> &Arc<T> {
        &self.value
    }

    /// When the value was fetched and stored.
    #[must_use]
    pub fn stored_at(&self) -> SystemTime {
        self.stored_at
    }

    #[must_use]
    pub fn expires_at(&self) -> SystemTime {
        self.expires_at
    }

    /// An entry is fresh strictly before its expiry.
    #[must_use]
    pub fn is_fresh(&self, now: SystemTime) -> bool {
        now < self.expires_at
    }
}

/// Number of entries held by each table of a discovery cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub discovery_entries: usize,
    pub key_set_entries: usize,
}

/// Number of entries removed by one eviction sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepStats {
    pub discovery_evicted: usize,
    pub key_sets_evicted: usize,
}
