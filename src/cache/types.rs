//! Core types for the cache system.

use crate::model::{BoardView, ProviderKind, ServiceRef};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Cache key uniquely identifying a cached resource view.
///
/// Keys are composed as `<provider>:<resource>:<view>` (for example
/// `nr:LHD:departures` or `tfl:940GZZLUWSM:status`), but the store treats
/// them as opaque strings; the structure is owned by the constructors here.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Key for a board snapshot of one station/stop in one view.
    pub fn board(provider: ProviderKind, station_id: &str, view: BoardView) -> Self {
        let station = match provider {
            ProviderKind::NationalRail => station_id.to_uppercase(),
            ProviderKind::Tfl => station_id.to_lowercase(),
        };
        Self(format!("{}:{}:{}", provider.tag(), station, view))
    }

    /// Key for an assembled service detail record.
    ///
    /// The service fingerprint already encodes provider and resource
    /// identifiers, so it doubles as the key body.
    pub fn service_detail(service: &ServiceRef) -> Self {
        Self(format!("{}:detail", service.fingerprint()))
    }

    /// Key for a line-status snapshot covering the given scope (a line id
    /// or a comma-joined mode list).
    pub fn line_status(provider: ProviderKind, scope: &str) -> Self {
        Self(format!("{}:{}:status", provider.tag(), scope.to_lowercase()))
    }

    /// Raw key for operator-driven invalidation of an arbitrary entry.
    pub fn raw(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Cache-related errors.
///
/// Read failures are absorbed by the backends (a failed read is a miss);
/// write failures surface here so callers can log and move on — caching is
/// best-effort, never a correctness dependency.
#[derive(Debug, Error)]
pub enum CacheError {
    /// I/O error during cache operations.
    #[error("cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// SQLite backend error.
    #[error("cache database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Payload (de)serialization failure.
    #[error("cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid cache configuration.
    #[error("invalid cache configuration: {0}")]
    InvalidConfig(String),
}

/// Which backend the cache store factory builds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheBackend {
    #[default]
    Memory,
    Sqlite,
}

/// Cache configuration.
#[derive(Debug, Clone)]
pub struct CacheSettings {
    /// Backend selector.
    pub backend: CacheBackend,
    /// Freshness window for board and status entries.
    pub board_ttl: Duration,
    /// Independent freshness window for assembled service details.
    /// Detail assembly is more expensive and changes less often.
    pub detail_ttl: Duration,
    /// Database path for the SQLite backend.
    pub sqlite_path: PathBuf,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            backend: CacheBackend::Memory,
            board_ttl: Duration::from_secs(60),
            detail_ttl: Duration::from_secs(300),
            sqlite_path: PathBuf::from("/tmp/liveboard_cache.sqlite3"),
        }
    }
}

impl CacheSettings {
    pub fn with_backend(mut self, backend: CacheBackend) -> Self {
        self.backend = backend;
        self
    }

    pub fn with_board_ttl(mut self, ttl: Duration) -> Self {
        self.board_ttl = ttl;
        self
    }

    pub fn with_detail_ttl(mut self, ttl: Duration) -> Self {
        self.detail_ttl = ttl;
        self
    }

    pub fn with_sqlite_path(mut self, path: PathBuf) -> Self {
        self.sqlite_path = path;
        self
    }
}
