//! TTL key-value cache for remote resources.
//!
//! Entries carry an absolute expiry fixed at `set` time; reads never extend
//! it. Expired entries are evicted lazily on `get`/`has`. Access is
//! single-threaded, so there is no locking here; callers that share a cache
//! wrap it in a `RefCell`.
//!
//! Every `clear()` advances a generation counter. A fetch that captured the
//! generation before suspending writes back with [`RemoteCache::set_if_current`],
//! which refuses the write when a clear happened meanwhile, so stale data is
//! never resurrected.

use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;

#[cfg(test)]
#[path = "cache_tests.rs"]
mod tests;

/// Default time-to-live: five minutes.
pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

/// One stored value with its lifetime. Overwritten wholesale, never patched.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry<V> {
    value: V,
    created_at: Instant,
    expires_at: Instant,
}

impl<V> CacheEntry<V> {
    fn new(value: V, ttl: Duration) -> Self {
        let created_at = Instant::now();
        Self {
            value,
            created_at,
            expires_at: created_at + ttl,
        }
    }

    /// The cached value.
    pub fn value(&self) -> &V {
        &self.value
    }

    /// When the entry was stored.
    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    /// When the entry stops being served.
    pub fn expires_at(&self) -> Instant {
        self.expires_at
    }

    fn is_expired_at(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Diagnostics for one entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheEntryStat {
    /// Entry key.
    pub key: String,
    /// Time left before expiry, in milliseconds (zero once expired).
    pub remaining_ttl_ms: u64,
    /// Whether the entry has expired but not yet been evicted.
    pub expired: bool,
}

/// Cache-wide diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct CacheStats {
    /// Number of stored entries, expired ones included.
    pub entry_count: usize,
    /// Per-entry detail, sorted by key.
    pub entries: Vec<CacheEntryStat>,
}

/// Generic TTL cache keyed by string.
#[derive(Debug, Clone)]
pub struct RemoteCache<V> {
    entries: HashMap<String, CacheEntry<V>>,
    default_ttl: Duration,
    generation: u64,
}

impl<V> Default for RemoteCache<V> {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

impl<V> RemoteCache<V> {
    /// Create an empty cache whose `set` uses `default_ttl`.
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            default_ttl,
            generation: 0,
        }
    }

    /// TTL applied by [`RemoteCache::set`].
    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Store `value` under `key` with the default TTL, replacing any prior entry.
    pub fn set(&mut self, key: impl Into<String>, value: V) {
        let ttl = self.default_ttl;
        self.set_with_ttl(key, value, ttl);
    }

    /// Store `value` under `key` expiring `ttl` from now.
    pub fn set_with_ttl(&mut self, key: impl Into<String>, value: V, ttl: Duration) {
        let key = key.into();
        tracing::debug!(key = %key, ttl_ms = ttl.as_millis() as u64, "Cache entry set");
        self.entries.insert(key, CacheEntry::new(value, ttl));
    }

    /// Store with the default TTL only if no `clear()` happened since `generation`.
    ///
    /// Returns whether the value was stored.
    pub fn set_if_current(&mut self, key: impl Into<String>, value: V, generation: u64) -> bool {
        if generation != self.generation {
            return false;
        }
        self.set(key, value);
        true
    }

    /// Whether a live entry exists for `key`; evicts it if expired.
    pub fn has(&mut self, key: &str) -> bool {
        self.live_entry(key).is_some()
    }

    /// Borrow the full entry for `key` if it is live; evicts it if expired.
    pub fn entry(&mut self, key: &str) -> Option<&CacheEntry<V>> {
        self.live_entry(key)
    }

    /// Remove one entry.
    pub fn delete(&mut self, key: &str) {
        if self.entries.remove(key).is_some() {
            tracing::debug!(key, "Cache entry deleted");
        }
    }

    /// Remove every entry and advance the generation.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.generation += 1;
        tracing::debug!(generation = self.generation, "Cache cleared");
    }

    /// Counter advanced by every `clear()`.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Number of stored entries, including expired ones not yet evicted.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Snapshot of entry lifetimes.
    pub fn stats(&self) -> CacheStats {
        let now = Instant::now();
        let mut entries: Vec<CacheEntryStat> = self
            .entries
            .iter()
            .map(|(key, entry)| CacheEntryStat {
                key: key.clone(),
                remaining_ttl_ms: entry.expires_at.saturating_duration_since(now).as_millis()
                    as u64,
                expired: entry.is_expired_at(now),
            })
            .collect();
        entries.sort_by(|a, b| a.key.cmp(&b.key));
        CacheStats {
            entry_count: entries.len(),
            entries,
        }
    }

    fn live_entry(&mut self, key: &str) -> Option<&CacheEntry<V>> {
        let expired = self.entries.get(key)?.is_expired_at(Instant::now());
        if expired {
            tracing::debug!(key, "Cache entry expired");
            self.entries.remove(key);
            return None;
        }
        self.entries.get(key)
    }
}

impl<V: Clone> RemoteCache<V> {
    /// Clone out the live value for `key`; evicts it if expired.
    ///
    /// Does not extend the entry's lifetime.
    pub fn get(&mut self, key: &str) -> Option<V> {
        self.live_entry(key).map(|entry| entry.value.clone())
    }
}
