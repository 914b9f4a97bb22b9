//! Shared on-disk cache backend for multi-worker deployments.

use super::stats::{CacheStats, CacheStatsSnapshot};
use super::store::CacheStore;
use super::types::{CacheError, CacheKey};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, warn};

/// How many writes between sweeps of expired rows.
const SWEEP_EVERY_WRITES: u32 = 200;

/// Durable cache backend on SQLite.
///
/// Multiple worker processes open the same database file; an entry written
/// by one process's prefetch job is immediately visible to another
/// process's request handler, making this the cross-process coordination
/// point. Each write commits `(key, value, expires_at)` in a single upsert
/// so no partial entry is ever observable.
///
/// Expired rows are evicted lazily on read and swept every
/// [`SWEEP_EVERY_WRITES`] writes.
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
    stats: CacheStats,
    writes_since_sweep: AtomicU32,
}

impl SqliteStore {
    /// Open (or create) the cache database at `path`.
    pub fn open(path: &Path) -> Result<Self, CacheError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.busy_timeout(Duration::from_secs(5))?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS cache_entries (
                key        TEXT PRIMARY KEY,
                value      BLOB NOT NULL,
                expires_at INTEGER NOT NULL
            )",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_cache_expires_at
             ON cache_entries(expires_at)",
            [],
        )?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            stats: CacheStats::new(),
            writes_since_sweep: AtomicU32::new(0),
        })
    }

    fn now_millis() -> i64 {
        Utc::now().timestamp_millis()
    }

    /// Remove expired rows, returning the number removed.
    pub fn sweep_expired(&self) -> Result<usize, CacheError> {
        let conn = self.conn.lock().unwrap();
        let removed = conn.execute(
            "DELETE FROM cache_entries WHERE expires_at <= ?1",
            params![Self::now_millis()],
        )?;
        if removed > 0 {
            debug!(removed, "swept expired cache entries");
        }
        Ok(removed)
    }

    fn get_inner(&self, key: &CacheKey) -> Result<Option<Vec<u8>>, CacheError> {
        let now = Self::now_millis();
        let conn = self.conn.lock().unwrap();

        let row: Option<(Vec<u8>, i64)> = conn
            .query_row(
                "SELECT value, expires_at FROM cache_entries WHERE key = ?1",
                params![key.as_str()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        match row {
            Some((_, expires_at)) if expires_at <= now => {
                conn.execute(
                    "DELETE FROM cache_entries WHERE key = ?1",
                    params![key.as_str()],
                )?;
                self.stats.record_expired_eviction();
                Ok(None)
            }
            Some((value, _)) => Ok(Some(value)),
            None => Ok(None),
        }
    }
}

impl CacheStore for SqliteStore {
    fn get(&self, key: &CacheKey) -> Option<Vec<u8>> {
        // A backend I/O error degrades to a miss; the caller falls through
        // to a live fetch.
        match self.get_inner(key) {
            Ok(Some(value)) => {
                self.stats.record_hit();
                Some(value)
            }
            Ok(None) => {
                self.stats.record_miss();
                None
            }
            Err(err) => {
                warn!(key = %key, error = %err, "cache read failed, treating as miss");
                self.stats.record_miss();
                None
            }
        }
    }

    fn set(&self, key: &CacheKey, value: Vec<u8>, ttl: Duration) -> Result<(), CacheError> {
        let expires_at = Self::now_millis() + ttl.as_millis() as i64;

        {
            let conn = self.conn.lock().unwrap();
            conn.execute(
                "INSERT INTO cache_entries(key, value, expires_at)
                 VALUES(?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET
                     value = excluded.value,
                     expires_at = excluded.expires_at",
                params![key.as_str(), value, expires_at],
            )?;
        }
        self.stats.record_write();

        let writes = self.writes_since_sweep.fetch_add(1, Ordering::Relaxed) + 1;
        if writes >= SWEEP_EVERY_WRITES {
            self.writes_since_sweep.store(0, Ordering::Relaxed);
            self.sweep_expired()?;
        }
        Ok(())
    }

    fn delete(&self, key: &CacheKey) -> Result<(), CacheError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "DELETE FROM cache_entries WHERE key = ?1",
            params![key.as_str()],
        )?;
        Ok(())
    }

    fn clear(&self) -> Result<(), CacheError> {
        let conn = self.conn.lock().unwrap();
        conn.execute("DELETE FROM cache_entries", [])?;
        Ok(())
    }

    fn len(&self) -> usize {
        let conn = self.conn.lock().unwrap();
        conn.query_row("SELECT COUNT(*) FROM cache_entries", [], |row| {
            row.get::<_, i64>(0)
        })
        .map(|count| count as usize)
        .unwrap_or(0)
    }

    fn stats(&self) -> CacheStatsSnapshot {
        self.stats.snapshot()
    }
}
