//! Cache Module
//!
//! Provides the in-memory TTL cache and the snapshot stores that keep it
//! across restarts.

mod entry;
mod snapshot;
mod stats;
mod store;


// Re-export public types
pub use entry::{current_timestamp_ms, CacheEntry};
pub use snapshot::{FileSnapshotStore, MemorySnapshotStore, SnapshotStore};
pub use stats::CacheStats;
pub use store::{
    MemoryCacheConfig, SharedTtlCache, TtlCache, DEFAULT_MAX_AGE, DEFAULT_SNAPSHOT_KEY,
};
