//! Error types for the storefront caches
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for both caches and the sidecar API.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Key or URL not present (or expired)
    #[error("Key not found: {0}")]
    NotFound(String),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The durable image store could not be opened
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// A read or write against the image database failed
    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    /// The snapshot store rejected a read or write
    #[error("Snapshot error: {0}")]
    Snapshot(String),

    /// A cached value could not be (de)serialized
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Filesystem failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let status = match &self {
            CacheError::NotFound(_) => StatusCode::NOT_FOUND,
            CacheError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            CacheError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            CacheError::Storage(_)
            | CacheError::Snapshot(_)
            | CacheError::Serialization(_)
            | CacheError::Io(_)
            | CacheError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the caches.
pub type Result<T> = std::result::Result<T, CacheError>;
