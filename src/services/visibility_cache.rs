//! Shared bucket visibility cache.
//!
//! Maps a bucket name to "is publicly readable". The marker file on disk is
//! authoritative; this cache only saves a stat per lookup and is overwritten
//! on every visibility change.

use moka::sync::Cache;
use std::time::Duration;

pub const DEFAULT_CAPACITY: u64 = 1024;
pub const DEFAULT_TTL: Duration = Duration::from_secs(60 * 60);

/// Thread-safe bucket-name → public flag cache.
///
/// Cloning is cheap and every clone shares the same entries, so one instance
/// built at startup is handed to the storage service and each bucket handle.
#[derive(Clone)]
pub struct VisibilityCache {
    entries: Cache<String, bool>,
}

impl VisibilityCache {
    pub fn new(capacity: u64, ttl: Duration) -> Self {
        Self {
            entries: Cache::builder()
                .max_capacity(capacity)
                .time_to_live(ttl)
                .build(),
        }
    }

    /// Return the cached value for `key`, computing it when absent.
    ///
    /// Concurrent callers for the same absent key wait on a single `compute`.
    /// A `None` result is not cached and reads as `false`.
    pub fn get_or_compute<F>(&self, key: &str, compute: F) -> bool
    where
        F: FnOnce() -> Option<bool>,
    {
        self.entries
            .optionally_get_with(key.to_owned(), compute)
            .unwrap_or(false)
    }

    /// Overwrite the entry for `key`.
    pub fn put(&self, key: &str, value: bool) {
        self.entries.insert(key.to_owned(), value);
    }
}

impl Default for VisibilityCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY, DEFAULT_TTL)
    }
}
