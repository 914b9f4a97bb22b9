//! Cache store trait for dependency injection.

use super::stats::CacheStatsSnapshot;
use super::types::{CacheError, CacheKey};
use std::time::Duration;

/// TTL key/value store shared across concurrent request handlers and
/// background prefetch jobs.
///
/// All operations are safe to call concurrently. An entry is never
/// returned once its TTL has elapsed: expired entries are lazily evicted
/// on read, never served stale.
///
/// Implementations absorb read I/O errors (a failed read is a miss, so
/// callers fall through to a live fetch). Write errors are returned, but
/// callers treat them as log-and-continue — the cache is an optimization,
/// not a correctness dependency.
pub trait CacheStore: Send + Sync {
    /// Get the value for `key`, or `None` on a miss or expired entry.
    fn get(&self, key: &CacheKey) -> Option<Vec<u8>>;

    /// Store `value` under `key` for `ttl`, overwriting any previous entry.
    fn set(&self, key: &CacheKey, value: Vec<u8>, ttl: Duration) -> Result<(), CacheError>;

    /// Remove a single entry. Removing an absent key is not an error.
    fn delete(&self, key: &CacheKey) -> Result<(), CacheError>;

    /// Remove all entries.
    fn clear(&self) -> Result<(), CacheError>;

    /// Number of entries currently stored (including not-yet-swept expired
    /// entries in backends that sweep lazily).
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Hit/miss/write counters for this store.
    fn stats(&self) -> CacheStatsSnapshot;
}

/// Store that never caches anything.
///
/// Always misses; writes succeed but are dropped. Useful for measuring
/// upstream behavior without caching and for exercising the miss path in
/// tests.
#[derive(Debug, Clone, Default)]
pub struct NoOpStore;

impl NoOpStore {
    pub fn new() -> Self {
        Self
    }
}

impl CacheStore for NoOpStore {
    fn get(&self, _key: &CacheKey) -> Option<Vec<u8>> {
        None
    }

    fn set(&self, _key: &CacheKey, _value: Vec<u8>, _ttl: Duration) -> Result<(), CacheError> {
        Ok(())
    }

    fn delete(&self, _key: &CacheKey) -> Result<(), CacheError> {
        Ok(())
    }

    fn clear(&self) -> Result<(), CacheError> {
        Ok(())
    }

    fn len(&self) -> usize {
        0
    }

    fn stats(&self) -> CacheStatsSnapshot {
        CacheStatsSnapshot::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BoardView, ProviderKind};

    fn test_key() -> CacheKey {
        CacheKey::board(ProviderKind::NationalRail, "LHD", BoardView::Departures)
    }

    #[test]
    fn test_noop_store_always_misses() {
        let store = NoOpStore::new();
        let key = test_key();

        store
            .set(&key, vec![1, 2, 3], Duration::from_secs(60))
            .unwrap();
        assert_eq!(store.get(&key), None);
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn test_noop_store_clear_and_delete_succeed() {
        let store = NoOpStore::new();
        assert!(store.delete(&test_key()).is_ok());
        assert!(store.clear().is_ok());
    }

    #[test]
    fn test_store_is_object_safe() {
        let store: Box<dyn CacheStore> = Box::new(NoOpStore::new());
        assert!(store.is_empty());
        assert_eq!(store.get(&test_key()), None);
    }

    #[test]
    fn test_noop_store_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<NoOpStore>();
    }
}
