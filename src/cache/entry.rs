//! Cache Entry Module
//!
//! Defines the structure for individual cache entries with TTL support.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

// == Cache Entry ==
/// A cached value together with the time it was stored.
///
/// Serialized as `{"data": ..., "timestamp": ...}` inside the snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry<T> {
    /// The stored value
    pub data: T,
    /// Creation or refresh time (Unix milliseconds)
    pub timestamp: u64,
}

impl<T> CacheEntry<T> {
    // == Constructor ==
    /// Creates a new entry stamped with the current time.
    pub fn new(data: T) -> Self {
        Self::with_timestamp(data, current_timestamp_ms())
    }

    /// Creates an entry with an explicit timestamp.
    pub fn with_timestamp(data: T, timestamp: u64) -> Self {
        Self { data, timestamp }
    }

    // == Age ==
    /// Milliseconds elapsed between `timestamp` and `now`.
    pub fn age_ms(&self, now: u64) -> u64 {
        now.saturating_sub(self.timestamp)
    }

    // == Is Expired ==
    /// Checks whether the entry is older than `max_age` at time `now`.
    ///
    /// An entry aged exactly `max_age` is still fresh; it expires once the
    /// age strictly exceeds the limit.
    pub fn is_expired_at(&self, max_age: Duration, now: u64) -> bool {
        u128::from(self.age_ms(now)) > max_age.as_millis()
    }

    /// Checks expiry against the current wall clock.
    pub fn is_expired(&self, max_age: Duration) -> bool {
        self.is_expired_at(max_age, current_timestamp_ms())
    }
}

// == Utility Functions ==
/// Returns current Unix timestamp in milliseconds.
///
/// A clock set before the epoch reads as 0, which makes everything look
/// fresh rather than panicking.
pub fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    #[test]
    fn test_entry_creation() {
        let before = current_timestamp_ms();
        let entry = CacheEntry::new("test_value".to_string());

        assert_eq!(entry.data, "test_value");
        assert!(entry.timestamp >= before);
        assert!(!entry.is_expired(Duration::from_secs(60)));
    }

    #[test]
    fn test_entry_expiration() {
        let entry = CacheEntry::new(1u32);

        assert!(!entry.is_expired(Duration::from_millis(10)));

        sleep(Duration::from_millis(50));

        assert!(entry.is_expired(Duration::from_millis(10)));
    }

    #[test]
    fn test_expiration_boundary_condition() {
        let entry = CacheEntry::with_timestamp((), 1_000);
        let max_age = Duration::from_millis(500);

        assert!(!entry.is_expired_at(max_age, 1_500), "age == max_age is fresh");
        assert!(entry.is_expired_at(max_age, 1_501), "age > max_age is expired");
    }

    #[test]
    fn test_age_saturates_for_future_timestamps() {
        let entry = CacheEntry::with_timestamp((), 10_000);
        assert_eq!(entry.age_ms(5_000), 0);
        assert!(!entry.is_expired_at(Duration::ZERO, 5_000));
    }

    #[test]
    fn test_entry_json_shape() {
        let entry = CacheEntry::with_timestamp(serde_json::json!({"x": 1}), 42);
        let json = serde_json::to_value(&entry).unwrap();

        assert_eq!(json, serde_json::json!({"data": {"x": 1}, "timestamp": 42}));
    }
}
