//! Image Cache Module
//!
//! Durable, URL-keyed cache for image bytes with TTL expiry and a bounded
//! entry count.

mod cache;
mod db;

pub use cache::{CleanupReport, ImageCache, ImageCacheConfig, DEFAULT_MAX_AGE, DEFAULT_MAX_ENTRIES};
pub use db::{ImageDb, ImageRecord};
