//! Shared TTL cache. Entries expire after a fixed lifetime and are evicted
//! lazily, when a read finds them stale.

use serde::Serialize;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

#[derive(Clone)]
struct CacheEntry<V> {
    value: V,
    inserted_at: Instant,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub entries: usize,
}

pub struct TtlCache<V> {
    entries: RwLock<HashMap<String, CacheEntry<V>>>,
    ttl: Duration,
    stats: RwLock<CacheStats>,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
            stats: RwLock::new(CacheStats::default()),
        }
    }

    pub async fn get(&self, key: &str) -> Option<V> {
        let fresh = {
            let entries = self.entries.read().await;
            match entries.get(key) {
                Some(entry) if entry.inserted_at.elapsed() < self.ttl => Some(Some(entry.value.clone())),
                Some(_) => Some(None),
                None => None,
            }
        };

        let mut stats = self.stats.write().await;
        match fresh {
            Some(Some(value)) => {
                stats.hits += 1;
                Some(value)
            }
            Some(None) => {
                stats.misses += 1;
                stats.evictions += 1;
                drop(stats);
                self.evict_if_stale(key).await;
                None
            }
            None => {
                stats.misses += 1;
                None
            }
        }
    }

    pub async fn set(&self, key: impl Into<String>, value: V) {
        let entry = CacheEntry {
            value,
            inserted_at: Instant::now(),
        };
        self.entries.write().await.insert(key.into(), entry);
    }

    pub async fn invalidate(&self, key: &str) {
        self.entries.write().await.remove(key);
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Counters so far plus the current entry count (stale entries included)
    pub async fn stats(&self) -> CacheStats {
        let mut stats = *self.stats.read().await;
        stats.entries = self.len().await;
        stats
    }

    // Another writer may have refreshed the entry between the read and this lock
    async fn evict_if_stale(&self, key: &str) {
        let mut entries = self.entries.write().await;
        if entries.get(key).map_or(false, |e| e.inserted_at.elapsed() >= self.ttl) {
            entries.remove(key);
        }
    }
}
