//! API Routes
//!
//! Configures the Axum router with all sidecar endpoints.

use axum::{
    routing::{get, put},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    clear_images_handler, clear_memory_handler, delete_handler, get_handler, get_image_handler,
    health_handler, put_image_handler, set_handler, stats_handler, AppState,
};

/// Largest image body accepted by PUT /images
const MAX_IMAGE_BYTES: usize = 20 * 1024 * 1024;

/// Creates the main router with all endpoints configured.
///
/// # Middleware
/// - CORS: Allows any origin, so storefront pages can read cached images
/// - Tracing: Logs all requests for debugging
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/memory", put(set_handler).delete(clear_memory_handler))
        .route("/memory/*key", get(get_handler).delete(delete_handler))
        .route(
            "/images",
            get(get_image_handler)
                .put(put_image_handler)
                .delete(clear_images_handler),
        )
        .route("/stats", get(stats_handler))
        .route("/health", get(health_handler))
        .layer(axum::extract::DefaultBodyLimit::max(MAX_IMAGE_BYTES))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
