//! TTL Sweep Task
//!
//! Background task that periodically removes expired in-memory cache entries.

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::SharedTtlCache;

/// Spawns a background task that sweeps expired entries out of the cache.
///
/// The first sweep runs immediately. After that the task sleeps for the
/// cache's sweep interval (a tenth of its TTL) between runs.
///
/// # Returns
/// A JoinHandle for the spawned task, which can be used to abort the task
/// during graceful shutdown.
///
/// # Example
/// ```ignore
/// let cache = TtlCache::new(MemoryCacheConfig::default(), store).into_shared();
/// let sweep_handle = spawn_sweep_task(cache.clone()).await;
/// // Later, during shutdown:
/// sweep_handle.abort();
/// ```
pub async fn spawn_sweep_task(cache: SharedTtlCache) -> JoinHandle<()> {
    let interval = cache.read().await.sweep_interval();

    tokio::spawn(async move {
        info!(interval_ms = interval.as_millis() as u64, "Starting TTL sweep task");

        loop {
            let removed = cache.write().await.sweep();

            if removed > 0 {
                info!("TTL sweep: removed {} expired entries", removed);
            } else {
                debug!("TTL sweep: no expired entries found");
            }

            tokio::time::sleep(interval).await;
        }
    })
}
