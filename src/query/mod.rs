//! Query Cache Module
//!
//! Caches remote collection queries in the shared TTL cache.

mod cached;
mod source;

pub use cached::{CachedQuery, QueryError, QueryOptions, QueryState};
pub use source::{
    derive_cache_key, Direction, Document, DocumentSource, FilterOp, QueryConstraint,
};
