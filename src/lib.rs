//! Storefront Cache - client-side caching layer for a storefront
//!
//! Provides a TTL cache for JSON query results with snapshot persistence,
//! a durable image blob cache with bounded size, and a cache-first query
//! helper over a remote document source.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod images;
pub mod models;
pub mod query;
pub mod tasks;

pub use api::AppState;
pub use config::Config;
pub use tasks::spawn_sweep_task;
