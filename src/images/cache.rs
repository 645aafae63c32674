//! Image Cache Module
//!
//! Best-effort durable cache for downloaded image bytes. Every failure is
//! logged and degrades to a miss or a dropped write; callers never see an
//! error except from [`ImageCache::init`].

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::cache::{current_timestamp_ms, CacheStats};
use crate::error::{CacheError, Result};
use crate::images::ImageDb;

/// Default maximum number of cached images
pub const DEFAULT_MAX_ENTRIES: usize = 100;

/// Default image lifetime (7 days)
pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(7 * 24 * 60 * 60);

// == Image Cache Config ==
#[derive(Debug, Clone)]
pub struct ImageCacheConfig {
    /// Entry ceiling enforced by every cleanup pass
    pub max_entries: usize,
    /// How long an image may be served after it was stored or last read
    pub max_age: Duration,
}

impl Default for ImageCacheConfig {
    fn default() -> Self {
        Self {
            max_entries: DEFAULT_MAX_ENTRIES,
            max_age: DEFAULT_MAX_AGE,
        }
    }
}

// == Cleanup Report ==
/// Outcome of one cleanup pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    /// Entries removed for exceeding max_age
    pub expired: usize,
    /// Entries removed to get back under max_entries
    pub evicted: usize,
    /// Entries left afterwards
    pub remaining: usize,
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

// == Image Cache ==
/// URL-keyed blob cache with TTL expiry and an entry ceiling.
///
/// Cheap to clone; clones share the same database handle and counters.
#[derive(Clone)]
pub struct ImageCache {
    path: PathBuf,
    config: ImageCacheConfig,
    /// Opened on first use, then reused for the life of the process
    db: Arc<OnceCell<Arc<ImageDb>>>,
    counters: Arc<Counters>,
}

impl ImageCache {
    /// Creates a cache backed by the SQLite file at `path`.
    ///
    /// Nothing is opened until the first operation.
    pub fn new(path: impl Into<PathBuf>, config: ImageCacheConfig) -> Self {
        Self {
            path: path.into(),
            config,
            db: Arc::new(OnceCell::new()),
            counters: Arc::new(Counters::default()),
        }
    }

    pub fn config(&self) -> &ImageCacheConfig {
        &self.config
    }

    // == Init ==
    /// Opens the store now instead of on first use.
    ///
    /// This is the one place a store-unavailable error is reported. A
    /// failed attempt is not memoized; the next operation tries again.
    pub async fn init(&self) -> Result<()> {
        self.db().await.map(|_| ())
    }

    async fn db(&self) -> Result<Arc<ImageDb>> {
        let db = self
            .db
            .get_or_try_init(|| async {
                let path = self.path.clone();
                let db = tokio::task::spawn_blocking(move || ImageDb::open(&path))
                    .await
                    .map_err(|e| CacheError::Internal(format!("spawn_blocking failed: {e}")))?
                    .map_err(|e| match e {
                        CacheError::StoreUnavailable(_) => e,
                        other => CacheError::StoreUnavailable(other.to_string()),
                    })?;
                info!(path = %self.path.display(), "Image cache opened");
                Ok::<_, CacheError>(Arc::new(db))
            })
            .await?;
        Ok(Arc::clone(db))
    }

    // == Cache Image ==
    /// Stores `blob` under `url`, then schedules a cleanup pass.
    ///
    /// Returns once the write is done; cleanup runs in the background and
    /// may race with other calls.
    pub async fn cache_image(&self, url: &str, blob: Vec<u8>) {
        let db = match self.db().await {
            Ok(db) => db,
            Err(e) => {
                warn!(url = %url, error = %e, "Image cache unavailable, dropping write");
                return;
            }
        };

        let owned_url = url.to_string();
        let now = current_timestamp_ms();
        let write = run_blocking(Arc::clone(&db), move |db| db.put(&owned_url, &blob, now)).await;
        if let Err(e) = write {
            warn!(url = %url, error = %e, "Failed to cache image");
            return;
        }
        debug!(url = %url, "Cached image");

        self.spawn_cleanup(db);
    }

    // == Get Image ==
    /// Returns the cached bytes for `url`, or `None` on miss, expiry or error.
    ///
    /// A hit refreshes the entry's timestamp in the background; the refresh
    /// is lost if the process exits before it lands.
    pub async fn get_image(&self, url: &str) -> Option<Vec<u8>> {
        let db = match self.db().await {
            Ok(db) => db,
            Err(e) => {
                warn!(url = %url, error = %e, "Image cache unavailable");
                self.counters.misses.fetch_add(1, Ordering::Relaxed);
                return None;
            }
        };

        let owned_url = url.to_string();
        let record = match run_blocking(Arc::clone(&db), move |db| db.get(&owned_url)).await {
            Ok(record) => record,
            Err(e) => {
                warn!(url = %url, error = %e, "Failed to read cached image");
                None
            }
        };

        let Some(record) = record else {
            self.counters.misses.fetch_add(1, Ordering::Relaxed);
            debug!(url = %url, "Image cache MISS");
            return None;
        };

        let now = current_timestamp_ms();
        if record.is_expired_at(self.config.max_age, now) {
            self.counters.misses.fetch_add(1, Ordering::Relaxed);
            self.counters.evictions.fetch_add(1, Ordering::Relaxed);
            debug!(url = %url, "Cached image expired");
            // A write that lands first must survive this delete.
            let (owned_url, stale_ts) = (record.url, record.timestamp);
            spawn_detached(db, "delete expired image", move |db| {
                db.delete_if_unchanged(&owned_url, stale_ts).map(|_| ())
            });
            return None;
        }

        self.counters.hits.fetch_add(1, Ordering::Relaxed);
        debug!(url = %url, "Image cache HIT");
        let owned_url = record.url;
        spawn_detached(db, "refresh image timestamp", move |db| {
            db.touch(&owned_url, now).map(|_| ())
        });
        Some(record.blob)
    }

    // == Clear Cache ==
    /// Deletes every cached image.
    pub async fn clear_cache(&self) {
        let db = match self.db().await {
            Ok(db) => db,
            Err(e) => {
                warn!(error = %e, "Image cache unavailable, nothing cleared");
                return;
            }
        };

        match run_blocking(db, |db| db.clear()).await {
            Ok(removed) => info!(removed, "Image cache cleared"),
            Err(e) => warn!(error = %e, "Failed to clear image cache"),
        }
    }

    // == Cleanup ==
    /// Runs one cleanup pass and waits for it.
    ///
    /// First drops expired entries, then trims the oldest until the count
    /// is back under `max_entries`.
    pub async fn cleanup(&self) -> Result<CleanupReport> {
        let db = self.db().await?;
        let report = cleanup_pass(db, self.config.clone()).await?;
        self.record_cleanup(&report);
        Ok(report)
    }

    fn spawn_cleanup(&self, db: Arc<ImageDb>) {
        let config = self.config.clone();
        let counters = Arc::clone(&self.counters);
        tokio::spawn(async move {
            match cleanup_pass(db, config).await {
                Ok(report) => {
                    let removed = report.expired + report.evicted;
                    counters.evictions.fetch_add(removed as u64, Ordering::Relaxed);
                    if removed > 0 {
                        info!(
                            expired = report.expired,
                            evicted = report.evicted,
                            remaining = report.remaining,
                            "Image cache cleanup"
                        );
                    }
                }
                Err(e) => warn!(error = %e, "Image cache cleanup failed"),
            }
        });
    }

    fn record_cleanup(&self, report: &CleanupReport) {
        let removed = (report.expired + report.evicted) as u64;
        self.counters.evictions.fetch_add(removed, Ordering::Relaxed);
    }

    // == Length ==
    /// Number of stored images, expired ones included; 0 if unavailable.
    pub async fn len(&self) -> usize {
        let Ok(db) = self.db().await else {
            return 0;
        };
        run_blocking(db, |db| db.count()).await.unwrap_or_else(|e| {
            warn!(error = %e, "Failed to count cached images");
            0
        })
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    // == Stats ==
    pub async fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            evictions: self.counters.evictions.load(Ordering::Relaxed),
            total_entries: self.len().await,
        }
    }
}

impl std::fmt::Debug for ImageCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageCache")
            .field("path", &self.path)
            .field("config", &self.config)
            .field("opened", &self.db.initialized())
            .finish()
    }
}

async fn cleanup_pass(db: Arc<ImageDb>, config: ImageCacheConfig) -> Result<CleanupReport> {
    run_blocking(db, move |db| {
        let expired = db.purge_expired(config.max_age, current_timestamp_ms())?;
        let evicted = db.evict_oldest(config.max_entries)?;
        Ok(CleanupReport {
            expired,
            evicted,
            remaining: db.count()?,
        })
    })
    .await
}

/// Runs a blocking database call off the async runtime.
async fn run_blocking<T, F>(db: Arc<ImageDb>, f: F) -> Result<T>
where
    F: FnOnce(&ImageDb) -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(move || f(&db))
        .await
        .map_err(|e| CacheError::Internal(format!("spawn_blocking failed: {e}")))?
}

/// Fire-and-forget database call; failures are only logged.
fn spawn_detached<F>(db: Arc<ImageDb>, what: &'static str, f: F)
where
    F: FnOnce(&ImageDb) -> Result<()> + Send + 'static,
{
    tokio::spawn(async move {
        if let Err(e) = run_blocking(db, f).await {
            warn!(error = %e, task = what, "Background image cache task failed");
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn cache_in(dir: &tempfile::TempDir, config: ImageCacheConfig) -> ImageCache {
        ImageCache::new(dir.path().join("images.db"), config)
    }

    #[tokio::test]
    async fn test_cache_and_get_image() {
        let dir = tempdir().unwrap();
        let cache = cache_in(&dir, ImageCacheConfig::default());
        let blob_a = b"\x89PNG fake image".to_vec();

        cache.cache_image("http://x/1.jpg", blob_a.clone()).await;

        assert_eq!(cache.get_image("http://x/1.jpg").await, Some(blob_a));
    }

    #[tokio::test]
    async fn test_get_missing_image() {
        let dir = tempdir().unwrap();
        let cache = cache_in(&dir, ImageCacheConfig::default());

        assert_eq!(cache.get_image("http://x/missing.jpg").await, None);
        assert_eq!(cache.stats().await.misses, 1);
    }

    #[tokio::test]
    async fn test_expired_image_is_miss_and_deleted() {
        let dir = tempdir().unwrap();
        let cache = cache_in(
            &dir,
            ImageCacheConfig {
                max_age: Duration::from_millis(20),
                ..ImageCacheConfig::default()
            },
        );

        cache.cache_image("http://x/old.jpg", b"old".to_vec()).await;
        tokio::time::sleep(Duration::from_millis(60)).await;

        assert_eq!(cache.get_image("http://x/old.jpg").await, None);

        // The delete is fire-and-forget; give it a moment to land.
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(cache.len().await, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_recache_after_expired_read_survives() {
        let dir = tempdir().unwrap();
        let cache = cache_in(
            &dir,
            ImageCacheConfig {
                max_age: Duration::from_secs(60),
                ..ImageCacheConfig::default()
            },
        );
        let db = cache.db().await.unwrap();

        for round in 0..50 {
            let url = format!("http://x/{round}.jpg");
            db.put(&url, b"stale", current_timestamp_ms() - 120_000).unwrap();
            assert_eq!(cache.get_image(&url).await, None, "round {round}");

            cache.cache_image(&url, b"fresh".to_vec()).await;
            tokio::time::sleep(Duration::from_millis(20)).await;

            assert_eq!(
                cache.get_image(&url).await,
                Some(b"fresh".to_vec()),
                "round {round}"
            );
        }
    }

    #[tokio::test]
    async fn test_background_cleanup_enforces_max_entries() {
        let dir = tempdir().unwrap();
        let cache = cache_in(
            &dir,
            ImageCacheConfig {
                max_entries: 10,
                max_age: Duration::from_secs(60),
            },
        );

        for i in 0..15 {
            cache
                .cache_image(&format!("http://x/{i}.jpg"), vec![i as u8])
                .await;
        }

        // Cleanup after each write is fire-and-forget; give it time to land.
        tokio::time::sleep(Duration::from_millis(300)).await;

        assert!(cache.len().await <= 10);
        let db = cache.db().await.unwrap();
        for i in 0..5 {
            assert!(db.get(&format!("http://x/{i}.jpg")).unwrap().is_none());
        }
        assert!(db.get("http://x/14.jpg").unwrap().is_some());
    }

    #[tokio::test]
    async fn test_hit_refreshes_timestamp() {
        let dir = tempdir().unwrap();
        let cache = cache_in(&dir, ImageCacheConfig::default());

        cache.cache_image("u", b"bytes".to_vec()).await;
        let db = cache.db().await.unwrap();
        let earlier = current_timestamp_ms() - 60_000;
        db.touch("u", earlier).unwrap();

        assert!(cache.get_image("u").await.is_some());

        // The refresh is fire-and-forget; give it a moment to land.
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(db.get("u").unwrap().unwrap().timestamp > earlier);
    }

    #[tokio::test]
    async fn test_cleanup_enforces_max_entries() {
        let dir = tempdir().unwrap();
        let cache = cache_in(
            &dir,
            ImageCacheConfig {
                max_entries: 200,
                max_age: Duration::from_secs(14 * 24 * 60 * 60),
            },
        );

        for i in 0..205 {
            cache
                .cache_image(&format!("http://x/{i}.jpg"), vec![i as u8])
                .await;
        }

        let report = cache.cleanup().await.unwrap();
        assert_eq!(report.remaining, 200);
        assert_eq!(cache.len().await, 200);

        let db = cache.db().await.unwrap();
        for i in 0..5 {
            assert!(
                db.get(&format!("http://x/{i}.jpg")).unwrap().is_none(),
                "oldest entry {i} should be evicted"
            );
        }
        for i in 5..205 {
            assert!(db.get(&format!("http://x/{i}.jpg")).unwrap().is_some());
        }
    }

    #[tokio::test]
    async fn test_cleanup_drops_expired_first() {
        let dir = tempdir().unwrap();
        let cache = cache_in(
            &dir,
            ImageCacheConfig {
                max_entries: 10,
                max_age: Duration::from_secs(60),
            },
        );
        let db = cache.db().await.unwrap();
        let now = current_timestamp_ms();
        db.put("stale", b"s", now - 120_000).unwrap();
        db.put("fresh", b"f", now).unwrap();

        let report = cache.cleanup().await.unwrap();

        assert_eq!(
            report,
            CleanupReport {
                expired: 1,
                evicted: 0,
                remaining: 1
            }
        );
        assert_eq!(cache.stats().await.evictions, 1);
    }

    #[tokio::test]
    async fn test_clear_cache() {
        let dir = tempdir().unwrap();
        let cache = cache_in(&dir, ImageCacheConfig::default());

        cache.cache_image("a", b"1".to_vec()).await;
        cache.cache_image("b", b"2".to_vec()).await;
        cache.clear_cache().await;

        assert!(cache.is_empty().await);
        assert_eq!(cache.get_image("a").await, None);
    }

    #[tokio::test]
    async fn test_unavailable_store_degrades_to_miss() {
        let dir = tempdir().unwrap();
        // A regular file where the parent directory should be.
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"").unwrap();
        let cache = ImageCache::new(blocker.join("images.db"), ImageCacheConfig::default());

        assert!(matches!(
            cache.init().await,
            Err(CacheError::StoreUnavailable(_))
        ));

        cache.cache_image("u", b"x".to_vec()).await;
        assert_eq!(cache.get_image("u").await, None);
        cache.clear_cache().await;
        assert_eq!(cache.len().await, 0);
        assert!(cache.cleanup().await.is_err());
    }

    #[tokio::test]
    async fn test_concurrent_first_use_shares_one_handle() {
        let dir = tempdir().unwrap();
        let cache = cache_in(&dir, ImageCacheConfig::default());

        let other = cache.clone();

        let (a, b) = tokio::join!(cache.db(), other.db());

        assert!(Arc::ptr_eq(&a.unwrap(), &b.unwrap()));
    }
}
