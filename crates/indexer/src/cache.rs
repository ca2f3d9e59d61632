//! TTL-keyed memoization shared by the scan cache and the selection cache.

use lru::LruCache;
use serde::Serialize;
use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;

const DEFAULT_CAPACITY: NonZeroUsize = match NonZeroUsize::new(64) {
    Some(value) => value,
    None => NonZeroUsize::MIN,
};

#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    pub key: String,
    pub inserted_at: Instant,
    pub payload: T,
    pub ttl: Duration,
}

impl<T> CacheEntry<T> {
    fn is_expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.inserted_at) >= self.ttl
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheEntryStats {
    pub key: String,
    pub age_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub size: usize,
    pub entries: Vec<CacheEntryStats>,
}

/// Bounded LRU map whose entries expire `ttl` after insertion.
///
/// A zero TTL disables caching: every read misses.
#[derive(Debug)]
pub struct TtlCache<T: Clone> {
    ttl: Duration,
    entries: Mutex<LruCache<String, CacheEntry<T>>>,
}

impl<T: Clone> TtlCache<T> {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(DEFAULT_CAPACITY);
        Self {
            ttl,
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn get(&self, key: &str) -> Option<T> {
        let now = Instant::now();
        let mut entries = self.lock();
        let expired = match entries.get(key) {
            Some(entry) if !entry.is_expired(now) => return Some(entry.payload.clone()),
            Some(_) => true,
            None => false,
        };
        if expired {
            entries.pop(key);
            log::debug!("cache entry expired: {key}");
        }
        None
    }

    pub fn insert(&self, key: impl Into<String>, payload: T) {
        let key = key.into();
        let entry = CacheEntry {
            key: key.clone(),
            inserted_at: Instant::now(),
            payload,
            ttl: self.ttl,
        };
        self.lock().put(key, entry);
    }

    pub fn invalidate(&self, key: &str) -> bool {
        self.lock().pop(key).is_some()
    }

    /// Drops every entry whose key starts with `prefix`; returns how many.
    pub fn invalidate_prefix(&self, prefix: &str) -> usize {
        let mut entries = self.lock();
        let doomed: Vec<String> = entries
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &doomed {
            entries.pop(key);
        }
        doomed.len()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot sorted by key.
    pub fn stats(&self) -> CacheStats {
        let now = Instant::now();
        let entries = self.lock();
        let mut stats: Vec<CacheEntryStats> = entries
            .iter()
            .map(|(key, entry)| CacheEntryStats {
                key: key.clone(),
                age_ms: u64::try_from(now.saturating_duration_since(entry.inserted_at).as_millis())
                    .unwrap_or(u64::MAX),
            })
            .collect();
        stats.sort_by(|a, b| a.key.cmp(&b.key));
        CacheStats {
            size: stats.len(),
            entries: stats,
        }
    }

    fn lock(&self) -> MutexGuard<'_, LruCache<String, CacheEntry<T>>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test(start_paused = true)]
    async fn entries_expire_after_ttl() {
        let cache = TtlCache::new(Duration::from_secs(10), 8);
        cache.insert("root", 1u32);
        assert_eq!(cache.get("root"), Some(1));

        tokio::time::advance(Duration::from_secs(9)).await;
        assert_eq!(cache.get("root"), Some(1));

        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(cache.get("root"), None);
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn stats_report_age() {
        let cache = TtlCache::new(Duration::from_secs(60), 8);
        cache.insert("b", ());
        tokio::time::advance(Duration::from_millis(1500)).await;
        cache.insert("a", ());

        let stats = cache.stats();
        assert_eq!(stats.size, 2);
        assert_eq!(
            stats.entries,
            vec![
                CacheEntryStats {
                    key: "a".into(),
                    age_ms: 0
                },
                CacheEntryStats {
                    key: "b".into(),
                    age_ms: 1500
                },
            ]
        );
    }

    #[test]
    fn prefix_invalidation_is_scoped() {
        let cache = TtlCache::new(Duration::from_secs(60), 8);
        cache.insert("/ws/a|1", 1);
        cache.insert("/ws/a|2", 2);
        cache.insert("/ws/b|1", 3);
        assert_eq!(cache.invalidate_prefix("/ws/a|"), 2);
        assert_eq!(cache.get("/ws/b|1"), Some(3));
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn zero_ttl_never_hits() {
        let cache = TtlCache::new(Duration::ZERO, 8);
        cache.insert("k", 1);
        assert_eq!(cache.get("k"), None);
    }

    #[test]
    fn capacity_evicts_least_recent() {
        let cache = TtlCache::new(Duration::from_secs(60), 2);
        cache.insert("a", 1);
        cache.insert("b", 2);
        assert_eq!(cache.get("a"), Some(1));
        cache.insert("c", 3);
        assert_eq!(cache.get("b"), None);
        assert_eq!(cache.get("a"), Some(1));
    }
}
