//! API Module
//!
//! HTTP handlers and routing for the cache sidecar.
//!
//! # Endpoints
//! - `GET /health` - Health check endpoint
//! - `GET /stats` - Statistics for both caches
//! - `PUT /memory` - Store a JSON value in the TTL cache
//! - `GET /memory/*key` - Read a fresh value (keys may contain `/`)
//! - `DELETE /memory/*key` - Remove a key
//! - `DELETE /memory` - Clear the TTL cache
//! - `PUT /images?url=` - Store image bytes
//! - `GET /images?url=` - Read image bytes
//! - `DELETE /images` - Clear the image cache

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
