//! Request DTOs for the cache sidecar API
//!
//! Defines the structure of incoming HTTP request bodies and query strings.

use serde::Deserialize;
use serde_json::Value;

/// Longest accepted memory-cache key, in bytes
pub const MAX_KEY_LENGTH: usize = 512;

/// Request body for PUT /memory
///
/// # Fields
/// - `key`: The cache key to store the value under
/// - `value`: Any JSON value
#[derive(Debug, Clone, Deserialize)]
pub struct SetRequest {
    /// The cache key
    pub key: String,
    /// The value to store
    pub value: Value,
}

impl SetRequest {
    /// Validates the request data
    ///
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        if self.key.is_empty() {
            return Some("Key cannot be empty".to_string());
        }
        if self.key.len() > MAX_KEY_LENGTH {
            return Some(format!(
                "Key exceeds maximum length of {} bytes",
                MAX_KEY_LENGTH
            ));
        }
        None
    }
}

/// Query string for the /images endpoints (`?url=...`)
#[derive(Debug, Clone, Deserialize)]
pub struct ImageQuery {
    /// Source URL of the image
    pub url: String,
}

impl ImageQuery {
    pub fn validate(&self) -> Option<String> {
        if self.url.trim().is_empty() {
            return Some("url cannot be empty".to_string());
        }
        None
    }
}
