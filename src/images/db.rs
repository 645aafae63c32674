//! Image Database Module
//!
//! SQLite-backed storage for cached image bytes, keyed by URL with a
//! secondary index on timestamp.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info};

use crate::error::{CacheError, Result};

/// Schema version written on first open
const SCHEMA_VERSION: i64 = 1;

const CREATE_SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS images (
        url TEXT PRIMARY KEY NOT NULL,
        blob BLOB NOT NULL,
        timestamp INTEGER NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_images_timestamp ON images(timestamp);
";

// == Image Record ==
/// One cached image.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageRecord {
    pub url: String,
    pub blob: Vec<u8>,
    /// Store or last-read time (Unix milliseconds)
    pub timestamp: u64,
}

impl ImageRecord {
    /// True once the record is strictly older than `max_age` at `now`.
    pub fn is_expired_at(&self, max_age: Duration, now: u64) -> bool {
        u128::from(now.saturating_sub(self.timestamp)) > max_age.as_millis()
    }
}

// == Image Database ==
/// Blocking handle to the image store.
///
/// Every method takes the connection lock for its whole duration; callers
/// on the async runtime go through `spawn_blocking`.
#[derive(Debug)]
pub struct ImageDb {
    conn: Mutex<Connection>,
}

impl ImageDb {
    /// Opens (creating if needed) the database file at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)
            .map_err(|e| CacheError::StoreUnavailable(format!("{}: {e}", path.display())))?;
        Self::from_connection(conn)
    }

    /// Opens a private in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| CacheError::StoreUnavailable(e.to_string()))?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        let version: i64 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
        if version == 0 {
            conn.execute_batch(CREATE_SCHEMA)?;
            conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
            info!(version = SCHEMA_VERSION, "Created image cache schema");
        }

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| CacheError::Internal(format!("mutex poisoned: {e}")))
    }

    // == Put ==
    /// Inserts or replaces the record for `url`.
    pub fn put(&self, url: &str, blob: &[u8], timestamp: u64) -> Result<()> {
        self.conn()?.execute(
            "INSERT OR REPLACE INTO images (url, blob, timestamp) VALUES (?1, ?2, ?3)",
            params![url, blob, timestamp as i64],
        )?;
        Ok(())
    }

    // == Get ==
    pub fn get(&self, url: &str) -> Result<Option<ImageRecord>> {
        let record = self
            .conn()?
            .query_row(
                "SELECT url, blob, timestamp FROM images WHERE url = ?1",
                params![url],
                |row| {
                    Ok(ImageRecord {
                        url: row.get(0)?,
                        blob: row.get(1)?,
                        timestamp: row.get::<_, i64>(2)? as u64,
                    })
                },
            )
            .optional()?;
        Ok(record)
    }

    // == Touch ==
    /// Moves `url` to the fresh end of the timestamp index.
    ///
    /// Returns false if the record no longer exists.
    pub fn touch(&self, url: &str, timestamp: u64) -> Result<bool> {
        let updated = self.conn()?.execute(
            "UPDATE images SET timestamp = ?2 WHERE url = ?1",
            params![url, timestamp as i64],
        )?;
        Ok(updated > 0)
    }

    // == Delete ==
    /// Deletes `url`. Deleting a missing URL is not an error.
    pub fn delete(&self, url: &str) -> Result<bool> {
        let deleted = self
            .conn()?
            .execute("DELETE FROM images WHERE url = ?1", params![url])?;
        Ok(deleted > 0)
    }

    /// Deletes `url` only if its row still carries `timestamp`.
    ///
    /// A row rewritten or touched since it was read is left alone.
    pub fn delete_if_unchanged(&self, url: &str, timestamp: u64) -> Result<bool> {
        let deleted = self.conn()?.execute(
            "DELETE FROM images WHERE url = ?1 AND timestamp = ?2",
            params![url, timestamp as i64],
        )?;
        Ok(deleted > 0)
    }

    // == Purge Expired ==
    /// Deletes every record older than `max_age` at `now`.
    pub fn purge_expired(&self, max_age: Duration, now: u64) -> Result<usize> {
        let max_age_ms = u64::try_from(max_age.as_millis()).unwrap_or(u64::MAX);
        let cutoff = now.saturating_sub(max_age_ms) as i64;
        let deleted = self
            .conn()?
            .execute("DELETE FROM images WHERE timestamp < ?1", params![cutoff])?;
        if deleted > 0 {
            debug!(deleted, "Purged expired images");
        }
        Ok(deleted)
    }

    // == Evict Oldest ==
    /// Deletes records from the old end of the timestamp index until at
    /// most `max_entries` remain. Equal timestamps go in insertion order.
    pub fn evict_oldest(&self, max_entries: usize) -> Result<usize> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM images", [], |row| row.get(0))?;
        let excess = count - max_entries as i64;
        if excess <= 0 {
            return Ok(0);
        }

        let deleted = conn.execute(
            "DELETE FROM images WHERE url IN (
                SELECT url FROM images ORDER BY timestamp ASC, rowid ASC LIMIT ?1
            )",
            params![excess],
        )?;
        debug!(deleted, max_entries, "Evicted oldest images");
        Ok(deleted)
    }

    // == Count ==
    pub fn count(&self) -> Result<usize> {
        let count: i64 =
            self.conn()?
                .query_row("SELECT COUNT(*) FROM images", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    // == Clear ==
    pub fn clear(&self) -> Result<usize> {
        Ok(self.conn()?.execute("DELETE FROM images", [])?)
    }
}
