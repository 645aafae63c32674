//! TTL Cache Store Module
//!
//! In-memory key-value cache with time-based expiry, mirrored to a
//! [`SnapshotStore`] after every change.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::cache::entry::current_timestamp_ms;
use crate::cache::{CacheEntry, CacheStats, SnapshotStore};
use crate::error::{CacheError, Result};

/// Snapshot key used when none is configured
pub const DEFAULT_SNAPSHOT_KEY: &str = "storefront-cache";

/// Default entry lifetime (30 minutes)
pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(30 * 60);

/// Handle shared by every consumer of the process-wide cache.
pub type SharedTtlCache = Arc<RwLock<TtlCache>>;

type Snapshot = HashMap<String, CacheEntry<Value>>;

// == Memory Cache Config ==
#[derive(Debug, Clone)]
pub struct MemoryCacheConfig {
    /// How long an entry may be served after it was set
    pub max_age: Duration,
    /// Key the snapshot is stored under
    pub snapshot_key: String,
}

impl Default for MemoryCacheConfig {
    fn default() -> Self {
        Self {
            max_age: DEFAULT_MAX_AGE,
            snapshot_key: DEFAULT_SNAPSHOT_KEY.to_string(),
        }
    }
}

// == TTL Cache ==
/// Process-wide TTL cache.
///
/// Expiry is purely time based: an entry is served while
/// `now - timestamp <= max_age`, regardless of how often it is read.
pub struct TtlCache {
    /// Key-value storage
    entries: Snapshot,
    /// Performance statistics
    stats: CacheStats,
    config: MemoryCacheConfig,
    snapshot: Arc<dyn SnapshotStore>,
}

impl TtlCache {
    // == Constructor ==
    /// Creates a cache and rehydrates it from the snapshot store.
    ///
    /// Entries that expired while the process was down are swept out
    /// before the cache is returned.
    pub fn new(config: MemoryCacheConfig, snapshot: Arc<dyn SnapshotStore>) -> Self {
        let entries = load_snapshot(snapshot.as_ref(), &config.snapshot_key);
        if !entries.is_empty() {
            info!(entries = entries.len(), "Rehydrated cache from snapshot");
        }

        let mut cache = Self {
            entries,
            stats: CacheStats::new(),
            config,
            snapshot,
        };

        let dropped = cache.sweep();
        if dropped > 0 {
            info!(dropped, "Dropped entries that expired while offline");
        }
        cache.stats.set_total_entries(cache.entries.len());
        cache
    }

    /// Wraps the cache in the shared handle consumers hold.
    pub fn into_shared(self) -> SharedTtlCache {
        Arc::new(RwLock::new(self))
    }

    // == Get ==
    /// Returns the value for `key` if it is still fresh.
    ///
    /// An expired entry is removed as a side effect.
    pub fn get(&mut self, key: &str) -> Option<Value> {
        let now = current_timestamp_ms();
        let expired = match self.entries.get(key) {
            Some(entry) => entry.is_expired_at(self.config.max_age, now),
            None => {
                self.stats.record_miss();
                debug!(key = %key, "Cache MISS");
                return None;
            }
        };

        if expired {
            self.entries.remove(key);
            self.stats.record_miss();
            self.stats.record_evictions(1);
            self.persist();
            debug!(key = %key, "Cache entry expired on read");
            return None;
        }

        self.stats.record_hit();
        debug!(key = %key, "Cache HIT");
        self.entries.get(key).map(|entry| entry.data.clone())
    }

    /// Reads and deserializes a fresh entry.
    ///
    /// A value that no longer matches `T` is treated as a miss.
    pub fn get_as<T: DeserializeOwned>(&mut self, key: &str) -> Option<T> {
        let value = self.get(key)?;
        match serde_json::from_value(value) {
            Ok(typed) => Some(typed),
            Err(e) => {
                warn!(key = %key, error = %e, "Cached value has unexpected shape");
                None
            }
        }
    }

    // == Set ==
    /// Inserts or replaces `key`, stamping it with the current time.
    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.entries.insert(key.into(), CacheEntry::new(value));
        self.persist();
    }

    /// Serializes `value` and stores it under `key`.
    pub fn set_serialized<T: Serialize>(&mut self, key: impl Into<String>, value: &T) -> Result<()> {
        let value = serde_json::to_value(value)?;
        self.set(key, value);
        Ok(())
    }

    // == Remove ==
    /// Removes `key`. Removing a missing key changes nothing.
    pub fn remove(&mut self, key: &str) {
        if self.entries.remove(key).is_some() {
            self.persist();
        }
    }

    // == Clear ==
    pub fn clear(&mut self) {
        self.entries.clear();
        self.persist();
    }

    // == Has ==
    /// Freshness check without the removal side effect of [`TtlCache::get`].
    pub fn has(&self, key: &str) -> bool {
        self.entries
            .get(key)
            .is_some_and(|entry| !entry.is_expired(self.config.max_age))
    }

    // == Sweep ==
    /// Removes every expired entry and returns how many were dropped.
    pub fn sweep(&mut self) -> usize {
        let now = current_timestamp_ms();
        let max_age = self.config.max_age;
        let before = self.entries.len();

        self.entries
            .retain(|_, entry| !entry.is_expired_at(max_age, now));

        let removed = before - self.entries.len();
        if removed > 0 {
            self.stats.record_evictions(removed);
            self.persist();
        }
        removed
    }

    /// Interval between background sweeps: a tenth of the TTL, never zero.
    pub fn sweep_interval(&self) -> Duration {
        (self.config.max_age / 10).max(Duration::from_millis(1))
    }

    pub fn max_age(&self) -> Duration {
        self.config.max_age
    }

    // == Stats ==
    /// Returns current cache statistics.
    pub fn stats(&self) -> CacheStats {
        let mut stats = self.stats.clone();
        stats.set_total_entries(self.entries.len());
        stats
    }

    /// Raw entry, including stale ones.
    pub fn entry(&self, key: &str) -> Option<&CacheEntry<Value>> {
        self.entries.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.entries.keys()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    // == Persist ==
    /// Writes the full map to the snapshot store.
    ///
    /// Failures are logged; the in-memory state stays authoritative.
    fn persist(&self) {
        let result = serde_json::to_string(&self.entries)
            .map_err(CacheError::from)
            .and_then(|json| self.snapshot.set_item(&self.config.snapshot_key, &json));

        if let Err(e) = result {
            warn!(error = %e, "Failed to persist cache snapshot");
        }
    }
}

impl std::fmt::Debug for TtlCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TtlCache")
            .field("entries", &self.entries.len())
            .field("max_age", &self.config.max_age)
            .field("snapshot_key", &self.config.snapshot_key)
            .finish()
    }
}

/// Reads the snapshot, falling back to an empty map on any failure.
fn load_snapshot(store: &dyn SnapshotStore, key: &str) -> Snapshot {
    let raw = match store.get_item(key) {
        Ok(Some(raw)) => raw,
        Ok(None) => return Snapshot::new(),
        Err(e) => {
            warn!(error = %e, "Failed to read cache snapshot, starting empty");
            return Snapshot::new();
        }
    };

    serde_json::from_str(&raw).unwrap_or_else(|e| {
        warn!(error = %e, "Discarding unreadable cache snapshot");
        Snapshot::new()
    })
}
