//! Configuration Module
//!
//! Handles loading and managing sidecar configuration from environment variables.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::cache::MemoryCacheConfig;
use crate::images::ImageCacheConfig;

/// Default in-memory TTL in seconds (30 minutes)
const DEFAULT_MEMORY_MAX_AGE_SECS: u64 = 30 * 60;

/// Entry ceiling used by the storefront deployment
const DEFAULT_IMAGE_MAX_ENTRIES: usize = 200;

/// Image TTL used by the storefront deployment (14 days)
const DEFAULT_IMAGE_MAX_AGE_SECS: u64 = 14 * 24 * 60 * 60;

/// Sidecar configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// In-memory cache TTL in seconds
    pub memory_max_age: u64,
    /// Directory holding the in-memory cache snapshot
    pub snapshot_dir: PathBuf,
    /// SQLite file backing the image cache
    pub image_db_path: PathBuf,
    /// Maximum number of cached images
    pub image_max_entries: usize,
    /// Image TTL in seconds
    pub image_max_age: u64,
    /// HTTP server port
    pub server_port: u16,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `MEMORY_MAX_AGE_SECS` - In-memory TTL (default: 1800)
    /// - `SNAPSHOT_DIR` - Snapshot directory (default: `<data dir>/storefront-cache/snapshots`)
    /// - `IMAGE_DB_PATH` - Image database file (default: `<data dir>/storefront-cache/images.db`)
    /// - `IMAGE_MAX_ENTRIES` - Maximum cached images (default: 200)
    /// - `IMAGE_MAX_AGE_SECS` - Image TTL (default: 14 days)
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            memory_max_age: parse_env("MEMORY_MAX_AGE_SECS").unwrap_or(defaults.memory_max_age),
            snapshot_dir: env::var("SNAPSHOT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.snapshot_dir),
            image_db_path: env::var("IMAGE_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.image_db_path),
            image_max_entries: parse_env("IMAGE_MAX_ENTRIES")
                .unwrap_or(defaults.image_max_entries),
            image_max_age: parse_env("IMAGE_MAX_AGE_SECS").unwrap_or(defaults.image_max_age),
            server_port: parse_env("SERVER_PORT").unwrap_or(defaults.server_port),
        }
    }

    /// In-memory cache settings derived from this config.
    pub fn memory_cache(&self) -> MemoryCacheConfig {
        MemoryCacheConfig {
            max_age: Duration::from_secs(self.memory_max_age),
            ..MemoryCacheConfig::default()
        }
    }

    /// Image cache settings derived from this config.
    pub fn image_cache(&self) -> ImageCacheConfig {
        ImageCacheConfig {
            max_entries: self.image_max_entries,
            max_age: Duration::from_secs(self.image_max_age),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let base = data_dir();
        Self {
            memory_max_age: DEFAULT_MEMORY_MAX_AGE_SECS,
            snapshot_dir: base.join("snapshots"),
            image_db_path: base.join("images.db"),
            image_max_entries: DEFAULT_IMAGE_MAX_ENTRIES,
            image_max_age: DEFAULT_IMAGE_MAX_AGE_SECS,
            server_port: 3000,
        }
    }
}

fn parse_env<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.parse().ok())
}

fn data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("storefront-cache")
}
