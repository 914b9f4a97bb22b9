//! TTL key/value cache shared across request handlers and prefetch jobs.
//!
//! Two interchangeable backends satisfy the [`CacheStore`] contract: a
//! process-local [`MemoryStore`] and a shared on-disk [`SqliteStore`] that
//! acts as the coordination point for multi-worker deployments.

mod memory;
mod sqlite;
mod stats;
mod store;
mod types;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use stats::{CacheStats, CacheStatsSnapshot};
pub use store::{CacheStore, NoOpStore};
pub use types::{CacheBackend, CacheError, CacheKey, CacheSettings};

use std::sync::Arc;
use tracing::info;

/// Builds the configured cache backend.
///
/// The selector comes from [`CacheSettings::backend`]; both variants are
/// returned behind the same trait object so callers never branch on the
/// backend again.
pub fn build_store(settings: &CacheSettings) -> Result<Arc<dyn CacheStore>, CacheError> {
    match settings.backend {
        CacheBackend::Memory => {
            info!(backend = "memory", "cache store initialized");
            Ok(Arc::new(MemoryStore::new()))
        }
        CacheBackend::Sqlite => {
            let store = SqliteStore::open(&settings.sqlite_path)?;
            info!(
                backend = "sqlite",
                path = %settings.sqlite_path.display(),
                "cache store initialized"
            );
            Ok(Arc::new(store))
        }
    }
}
