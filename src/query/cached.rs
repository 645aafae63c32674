//! Cached Query Module
//!
//! Fronts a [`DocumentSource`] with the shared TTL cache: serve from cache
//! when possible, otherwise fetch, store and return.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, warn};

use crate::cache::SharedTtlCache;
use crate::query::{derive_cache_key, Document, DocumentSource, QueryConstraint};

// == Query Error ==
/// A remote query failed. Never cached, never retried automatically.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("query on '{collection}' failed: {message}")]
pub struct QueryError {
    pub collection: String,
    pub message: String,
}

// == Query State ==
/// What a consumer renders from: the documents, whether a fetch is in
/// progress, and the last error.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryState {
    pub data: Vec<Document>,
    pub loading: bool,
    pub error: Option<QueryError>,
}

// == Query Options ==
#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    pub collection: String,
    pub constraints: Vec<QueryConstraint>,
    /// Explicit cache key; derived from collection and constraints if unset
    pub cache_key: Option<String>,
    /// Always go to the source, but still store the result
    pub skip_cache: bool,
}

impl QueryOptions {
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            ..Self::default()
        }
    }

    pub fn with_constraints(mut self, constraints: Vec<QueryConstraint>) -> Self {
        self.constraints = constraints;
        self
    }

    pub fn with_cache_key(mut self, key: impl Into<String>) -> Self {
        self.cache_key = Some(key.into());
        self
    }

    pub fn skip_cache(mut self, skip: bool) -> Self {
        self.skip_cache = skip;
        self
    }

    fn resolved_key(&self) -> String {
        self.cache_key
            .clone()
            .unwrap_or_else(|| derive_cache_key(&self.collection, &self.constraints))
    }
}

// == Cached Query ==
/// A collection query whose results live in the shared TTL cache.
///
/// Staleness is bounded only by the cache TTL or an explicit
/// [`CachedQuery::refresh`]; remote changes do not invalidate.
pub struct CachedQuery<S> {
    source: Arc<S>,
    cache: SharedTtlCache,
    options: QueryOptions,
    key: String,
    state: QueryState,
}

impl<S: DocumentSource> CachedQuery<S> {
    pub fn new(source: Arc<S>, cache: SharedTtlCache, options: QueryOptions) -> Self {
        let key = options.resolved_key();
        Self {
            source,
            cache,
            options,
            key,
            state: QueryState::default(),
        }
    }

    pub fn state(&self) -> &QueryState {
        &self.state
    }

    pub fn cache_key(&self) -> &str {
        &self.key
    }

    // == Fetch ==
    /// Serves the query from cache, or from the source on a miss.
    pub async fn fetch(&mut self) -> &QueryState {
        self.state.loading = true;
        self.state.error = None;

        if !self.options.skip_cache {
            let cached = self.cache.write().await.get_as::<Vec<Document>>(&self.key);
            if let Some(data) = cached {
                debug!(key = %self.key, "Query served from cache");
                self.state.data = data;
                self.state.loading = false;
                return &self.state;
            }
        }

        let collection = &self.options.collection;
        match self.source.get_docs(collection, &self.options.constraints).await {
            Ok(data) => {
                let stored = self.cache.write().await.set_serialized(self.key.clone(), &data);
                if let Err(e) = stored {
                    warn!(key = %self.key, error = %e, "Failed to cache query result");
                }
                debug!(key = %self.key, documents = data.len(), "Query fetched from source");
                self.state.data = data;
            }
            Err(e) => {
                warn!(collection = %collection, error = %e, "Query failed");
                self.state.error = Some(QueryError {
                    collection: collection.clone(),
                    message: format!("{e:#}"),
                });
            }
        }

        self.state.loading = false;
        &self.state
    }

    // == Refresh ==
    /// Evicts this query's cache entry and fetches again.
    pub async fn refresh(&mut self) -> &QueryState {
        self.cache.write().await.remove(&self.key);
        self.fetch().await
    }

    // == Set Constraints ==
    /// Replaces the constraints and re-runs the query.
    ///
    /// An explicit cache key stays as configured; a derived one follows
    /// the new constraints.
    pub async fn set_constraints(&mut self, constraints: Vec<QueryConstraint>) -> &QueryState {
        self.options.constraints = constraints;
        self.key = self.options.resolved_key();
        self.fetch().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{MemoryCacheConfig, MemorySnapshotStore, TtlCache};
    use crate::query::{Direction, FilterOp};
    use serde_json::{json, Map};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Counts calls and returns one document per call, or fails on demand.
    #[derive(Default)]
    struct FakeSource {
        calls: AtomicUsize,
        fail: bool,
    }

    impl DocumentSource for FakeSource {
        async fn get_docs(
            &self,
            collection: &str,
            constraints: &[QueryConstraint],
        ) -> anyhow::Result<Vec<Document>> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if self.fail {
                anyhow::bail!("backend unreachable");
            }
            let mut fields = Map::new();
            fields.insert("call".to_string(), json!(call));
            fields.insert("constraints".to_string(), json!(constraints.len()));
            Ok(vec![Document::new(format!("{collection}-{call}"), fields)])
        }
    }

    fn shared_cache(max_age: Duration) -> SharedTtlCache {
        let config = MemoryCacheConfig {
            max_age,
            ..MemoryCacheConfig::default()
        };
        TtlCache::new(config, Arc::new(MemorySnapshotStore::new())).into_shared()
    }

    fn products_query() -> QueryOptions {
        QueryOptions::new("products").with_constraints(vec![
            QueryConstraint::filter("category", FilterOp::Eq, "mugs"),
            QueryConstraint::order_by("price", Direction::Asc),
        ])
    }

    #[tokio::test]
    async fn test_identical_queries_hit_source_once() {
        let source = Arc::new(FakeSource::default());
        let cache = shared_cache(Duration::from_secs(60));

        let mut first = CachedQuery::new(source.clone(), cache.clone(), products_query());
        let mut second = CachedQuery::new(source.clone(), cache.clone(), products_query());

        let a = first.fetch().await.clone();
        let b = second.fetch().await.clone();

        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
        assert_eq!(a.data, b.data);
        assert!(!b.loading);
        assert!(b.error.is_none());
    }

    #[tokio::test]
    async fn test_refresh_forces_second_call() {
        let source = Arc::new(FakeSource::default());
        let cache = shared_cache(Duration::from_secs(60));
        let mut query = CachedQuery::new(source.clone(), cache.clone(), products_query());

        query.fetch().await;
        let refreshed = query.refresh().await.clone();
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
        assert_eq!(refreshed.data[0].field("call"), Some(&json!(2)));

        let mut other = CachedQuery::new(source.clone(), cache, products_query());
        let cached = other.fetch().await;
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
        assert_eq!(cached.data[0].field("call"), Some(&json!(2)));
    }

    #[tokio::test]
    async fn test_expired_entry_refetches() {
        let source = Arc::new(FakeSource::default());
        let cache = shared_cache(Duration::from_millis(10));
        let mut query = CachedQuery::new(source.clone(), cache, products_query());

        query.fetch().await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        query.fetch().await;

        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_skip_cache_always_fetches_but_stores() {
        let source = Arc::new(FakeSource::default());
        let cache = shared_cache(Duration::from_secs(60));
        let mut query =
            CachedQuery::new(source.clone(), cache.clone(), products_query().skip_cache(true));

        query.fetch().await;
        query.fetch().await;

        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
        assert!(cache.read().await.has(query.cache_key()));
    }

    #[tokio::test]
    async fn test_errors_surface_and_are_not_cached() {
        let source = Arc::new(FakeSource {
            fail: true,
            ..FakeSource::default()
        });
        let cache = shared_cache(Duration::from_secs(60));
        let mut query = CachedQuery::new(source.clone(), cache.clone(), products_query());

        let state = query.fetch().await.clone();
        let error = state.error.expect("error surfaced");
        assert_eq!(error.collection, "products");
        assert!(error.message.contains("backend unreachable"));
        assert!(!state.loading);
        assert!(cache.read().await.is_empty());

        query.fetch().await;
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_changed_constraints_use_new_key() {
        let source = Arc::new(FakeSource::default());
        let cache = shared_cache(Duration::from_secs(60));
        let mut query = CachedQuery::new(source.clone(), cache, products_query());

        query.fetch().await;
        let old_key = query.cache_key().to_string();
        let state = query
            .set_constraints(vec![QueryConstraint::limit(5)])
            .await
            .clone();

        assert_ne!(query.cache_key(), old_key);
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
        assert_eq!(state.data[0].field("constraints"), Some(&json!(1)));
    }

    #[tokio::test]
    async fn test_explicit_cache_key() {
        let source = Arc::new(FakeSource::default());
        let cache = shared_cache(Duration::from_secs(60));
        let mut query = CachedQuery::new(
            source.clone(),
            cache.clone(),
            products_query().with_cache_key("featured-mugs"),
        );

        query.fetch().await;
        query.set_constraints(vec![]).await;

        assert_eq!(query.cache_key(), "featured-mugs");
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
        assert!(cache.read().await.has("featured-mugs"));
    }
}
