//! API Handlers
//!
//! HTTP request handlers for each sidecar endpoint.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::header,
    response::IntoResponse,
    Json,
};

use crate::cache::{FileSnapshotStore, SharedTtlCache, TtlCache};
use crate::config::Config;
use crate::error::{CacheError, Result};
use crate::images::ImageCache;
use crate::models::{
    DeleteResponse, GetResponse, HealthResponse, ImageQuery, MessageResponse, SetRequest,
    SetResponse, StatsResponse,
};

/// Application state shared across all handlers.
///
/// Both caches are constructed once at startup and injected here.
#[derive(Clone)]
pub struct AppState {
    /// Process-wide TTL cache
    pub memory: SharedTtlCache,
    /// Durable image cache (cheap to clone)
    pub images: ImageCache,
}

impl AppState {
    pub fn new(memory: SharedTtlCache, images: ImageCache) -> Self {
        Self { memory, images }
    }

    /// Creates both caches from configuration.
    ///
    /// The image store is not opened here; it opens on first use.
    pub fn from_config(config: &Config) -> Result<Self> {
        let snapshot = FileSnapshotStore::open(config.snapshot_dir.clone())?;
        let memory = TtlCache::new(config.memory_cache(), Arc::new(snapshot)).into_shared();
        let images = ImageCache::new(config.image_db_path.clone(), config.image_cache());
        Ok(Self::new(memory, images))
    }
}

/// Handler for PUT /memory
pub async fn set_handler(
    State(state): State<AppState>,
    Json(req): Json<SetRequest>,
) -> Result<Json<SetResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(CacheError::InvalidRequest(error_msg));
    }

    state.memory.write().await.set(req.key.clone(), req.value);

    Ok(Json(SetResponse::new(req.key)))
}

/// Handler for GET /memory/*key
pub async fn get_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<GetResponse>> {
    // Write lock: an expired entry is removed on read
    let value = state.memory.write().await.get(&key);

    match value {
        Some(value) => Ok(Json(GetResponse::new(key, value))),
        None => Err(CacheError::NotFound(key)),
    }
}

/// Handler for DELETE /memory/*key
///
/// Removing an absent key still succeeds.
pub async fn delete_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Json<DeleteResponse> {
    state.memory.write().await.remove(&key);
    Json(DeleteResponse::new(key))
}

/// Handler for DELETE /memory
pub async fn clear_memory_handler(State(state): State<AppState>) -> Json<MessageResponse> {
    state.memory.write().await.clear();
    Json(MessageResponse::new("Memory cache cleared"))
}

/// Handler for PUT /images?url=
pub async fn put_image_handler(
    State(state): State<AppState>,
    Query(query): Query<ImageQuery>,
    body: Bytes,
) -> Result<Json<MessageResponse>> {
    if let Some(error_msg) = query.validate() {
        return Err(CacheError::InvalidRequest(error_msg));
    }
    if body.is_empty() {
        return Err(CacheError::InvalidRequest(
            "Image body cannot be empty".to_string(),
        ));
    }

    state.images.cache_image(&query.url, body.to_vec()).await;

    Ok(Json(MessageResponse::new(format!(
        "Image '{}' accepted",
        query.url
    ))))
}

/// Handler for GET /images?url=
pub async fn get_image_handler(
    State(state): State<AppState>,
    Query(query): Query<ImageQuery>,
) -> Result<impl IntoResponse> {
    if let Some(error_msg) = query.validate() {
        return Err(CacheError::InvalidRequest(error_msg));
    }

    match state.images.get_image(&query.url).await {
        Some(blob) => Ok((
            [(header::CONTENT_TYPE, "application/octet-stream")],
            blob,
        )),
        None => Err(CacheError::NotFound(query.url)),
    }
}

/// Handler for DELETE /images
pub async fn clear_images_handler(State(state): State<AppState>) -> Json<MessageResponse> {
    state.images.clear_cache().await;
    Json(MessageResponse::new("Image cache cleared"))
}

/// Handler for GET /stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    let memory = state.memory.read().await.stats();
    let images = state.images.stats().await;

    Json(StatsResponse::new(memory, images))
}

/// Handler for GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}
