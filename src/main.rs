//! Storefront Cache sidecar server.

use std::net::SocketAddr;

use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use storefront_cache::{api::create_router, spawn_sweep_task, AppState, Config};

/// Main entry point for the cache sidecar.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Rehydrate the TTL cache from its snapshot
/// 4. Open the image store (a failure only disables image caching)
/// 5. Start the background sweep task
/// 6. Serve HTTP until SIGINT/SIGTERM
#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "storefront_cache=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Storefront Cache");

    let config = Config::from_env();
    info!(
        "Configuration loaded: memory_max_age={}s, image_max_entries={}, image_max_age={}s, port={}",
        config.memory_max_age, config.image_max_entries, config.image_max_age, config.server_port
    );

    let state = match AppState::from_config(&config) {
        Ok(state) => state,
        Err(e) => {
            error!("Failed to initialize caches: {}", e);
            std::process::exit(1);
        }
    };
    info!(
        "Memory cache ready with {} entries",
        state.memory.read().await.len()
    );

    if let Err(e) = state.images.init().await {
        warn!("Image cache unavailable, continuing without it: {}", e);
    }

    let sweep_handle = spawn_sweep_task(state.memory.clone()).await;
    info!("Background sweep task started");

    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind {}: {}", addr, e);
            std::process::exit(1);
        }
    };
    info!("Server listening on http://{}", addr);

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(sweep_handle))
        .await
    {
        error!("Server error: {}", e);
    }

    info!("Server shutdown complete");
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM), then stops the sweep task.
async fn shutdown_signal(sweep_handle: tokio::task::JoinHandle<()>) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }

    sweep_handle.abort();
    warn!("Sweep task aborted");
}
