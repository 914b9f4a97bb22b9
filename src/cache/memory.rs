//! Process-local in-memory cache backend.

use super::stats::{CacheStats, CacheStatsSnapshot};
use super::store::CacheStore;
use super::types::{CacheError, CacheKey};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Entry in the memory store.
#[derive(Debug, Clone)]
struct Entry {
    value: Vec<u8>,
    expires_at: Instant,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Volatile cache backend: an associative map behind a single lock.
///
/// Reads also take the lock because an expiry check on read evicts the
/// entry. Visibility is scoped to one process; multi-process deployments
/// wanting a shared cache use [`super::SqliteStore`] instead.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<CacheKey, Entry>>,
    stats: CacheStats,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            stats: CacheStats::new(),
        }
    }
}

impl CacheStore for MemoryStore {
    fn get(&self, key: &CacheKey) -> Option<Vec<u8>> {
        let mut entries = self.entries.lock().unwrap();

        match entries.get(key) {
            Some(entry) if entry.is_expired(Instant::now()) => {
                entries.remove(key);
                self.stats.record_expired_eviction();
                self.stats.record_miss();
                None
            }
            Some(entry) => {
                self.stats.record_hit();
                Some(entry.value.clone())
            }
            None => {
                self.stats.record_miss();
                None
            }
        }
    }

    fn set(&self, key: &CacheKey, value: Vec<u8>, ttl: Duration) -> Result<(), CacheError> {
        let mut entries = self.entries.lock().unwrap();
        entries.insert(
            key.clone(),
            Entry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
        self.stats.record_write();
        Ok(())
    }

    fn delete(&self, key: &CacheKey) -> Result<(), CacheError> {
        let mut entries = self.entries.lock().unwrap();
        entries.remove(key);
        Ok(())
    }

    fn clear(&self) -> Result<(), CacheError> {
        let mut entries = self.entries.lock().unwrap();
        entries.clear();
        Ok(())
    }

    fn len(&self) -> usize {
        let entries = self.entries.lock().unwrap();
        entries.len()
    }

    fn stats(&self) -> CacheStatsSnapshot {
        self.stats.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BoardView, ProviderKind};

    fn test_key(station: &str) -> CacheKey {
        CacheKey::board(ProviderKind::NationalRail, station, BoardView::Departures)
    }

    #[test]
    fn test_set_then_get_returns_value() {
        let store = MemoryStore::new();
        let key = test_key("LHD");

        store
            .set(&key, vec![1, 2, 3], Duration::from_secs(60))
            .unwrap();

        assert_eq!(store.get(&key), Some(vec![1, 2, 3]));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_get_unknown_key_misses() {
        let store = MemoryStore::new();
        assert_eq!(store.get(&test_key("XXX")), None);
        assert_eq!(store.stats().misses, 1);
    }

    #[test]
    fn test_entry_expires_after_ttl() {
        let store = MemoryStore::new();
        let key = test_key("LHD");

        store
            .set(&key, vec![42], Duration::from_millis(20))
            .unwrap();
        assert_eq!(store.get(&key), Some(vec![42]));

        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(store.get(&key), None, "entry must not be served past TTL");
        assert_eq!(store.len(), 0, "expired entry is evicted on read");
        assert_eq!(store.stats().expired_evictions, 1);
    }

    #[test]
    fn test_overwrite_replaces_value_and_ttl() {
        let store = MemoryStore::new();
        let key = test_key("LHD");

        store
            .set(&key, vec![1], Duration::from_millis(10))
            .unwrap();
        store.set(&key, vec![2], Duration::from_secs(60)).unwrap();

        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(store.get(&key), Some(vec![2]));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_delete_removes_entry() {
        let store = MemoryStore::new();
        let key = test_key("LHD");

        store.set(&key, vec![1], Duration::from_secs(60)).unwrap();
        store.delete(&key).unwrap();
        assert_eq!(store.get(&key), None);
    }

    #[test]
    fn test_delete_absent_key_is_ok() {
        let store = MemoryStore::new();
        assert!(store.delete(&test_key("XXX")).is_ok());
    }

    #[test]
    fn test_clear_removes_all_entries() {
        let store = MemoryStore::new();
        store
            .set(&test_key("LHD"), vec![1], Duration::from_secs(60))
            .unwrap();
        store
            .set(&test_key("WAT"), vec![2], Duration::from_secs(60))
            .unwrap();

        store.clear().unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_hit_and_miss_counters() {
        let store = MemoryStore::new();
        let key = test_key("LHD");

        store.set(&key, vec![1], Duration::from_secs(60)).unwrap();
        store.get(&key);
        store.get(&key);
        store.get(&test_key("WAT"));

        let stats = store.stats();
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.writes, 1);
    }

    #[test]
    fn test_concurrent_access() {
        use std::sync::Arc;

        let store = Arc::new(MemoryStore::new());
        let mut handles = Vec::new();

        for i in 0..8 {
            let store = Arc::clone(&store);
            handles.push(std::thread::spawn(move || {
                let key = test_key(&format!("S{i:02}"));
                for _ in 0..100 {
                    store.set(&key, vec![i], Duration::from_secs(60)).unwrap();
                    assert_eq!(store.get(&key), Some(vec![i]));
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(store.len(), 8);
    }
}
