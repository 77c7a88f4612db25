//! In-memory LRU cache with per-entry TTL
//!
//! Used to skip repeated retrieval and response generation for identical or
//! near-identical queries. Entries live for the process lifetime at most.

mod key;

pub use key::{cache_key, cache_key_bounded, normalize_query, DEFAULT_MAX_KEY_CHARS};

use lru::LruCache;
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

struct CacheEntry<V> {
    value: V,
    /// `None` never expires
    expiry: Option<Instant>,
}

impl<V> CacheEntry<V> {
    fn new(value: V, ttl: Duration) -> Self {
        let expiry = if ttl.is_zero() {
            None
        } else {
            Instant::now().checked_add(ttl)
        };
        Self { value, expiry }
    }

    fn is_expired(&self, now: Instant) -> bool {
        self.expiry.is_some_and(|expiry| now > expiry)
    }
}

/// Point-in-time cache statistics
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    pub size: usize,
    pub max_size: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    /// hits / (hits + misses), 0 when nothing was requested yet
    pub hit_rate: f64,
    pub total_requests: u64,
}

struct Inner<V> {
    /// Iteration order is recency order; the tail is least recently used
    entries: LruCache<String, CacheEntry<V>>,
    hits: u64,
    misses: u64,
    evictions: u64,
}

/// Thread-safe LRU cache with TTL support
///
/// Every operation takes one mutex over the whole map and the counters.
/// The per-call work is a hash lookup and a list splice, so the coarse lock
/// is held for microseconds; sharding was not worth the complexity.
pub struct CacheManager<V> {
    max_size: usize,
    inner: Mutex<Inner<V>>,
}

impl<V: Clone> CacheManager<V> {
    /// Create a cache holding at most `max_size` entries (minimum 1)
    pub fn new(max_size: usize) -> Self {
        let max_size = max_size.max(1);
        tracing::info!("Cache manager initialized with max_size={}", max_size);

        Self {
            max_size,
            inner: Mutex::new(Inner {
                entries: LruCache::unbounded(),
                hits: 0,
                misses: 0,
                evictions: 0,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner<V>> {
        // Counters and entries stay consistent even if a holder panicked
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Get a value, refreshing its recency
    ///
    /// Absent and expired keys count as misses; expired entries are removed.
    pub fn get(&self, key: &str) -> Option<V> {
        let mut inner = self.lock();
        let now = Instant::now();

        match inner.entries.peek(key).map(|entry| entry.is_expired(now)) {
            None => {
                inner.misses += 1;
                None
            }
            Some(true) => {
                inner.entries.pop(key);
                inner.misses += 1;
                tracing::debug!("Cache expired: {}", key);
                None
            }
            Some(false) => {
                let value = inner.entries.get(key).map(|entry| entry.value.clone());
                inner.hits += 1;
                tracing::debug!("Cache hit: {}", key);
                value
            }
        }
    }

    /// Insert a value as most recently used
    ///
    /// A zero `ttl` never expires. Re-setting an existing key refreshes both
    /// its value and its recency without counting an eviction.
    pub fn set(&self, key: impl Into<String>, value: V, ttl: Duration) {
        let key = key.into();
        let mut inner = self.lock();

        inner.entries.pop(&key);

        if inner.entries.len() >= self.max_size {
            if let Some((oldest, _)) = inner.entries.pop_lru() {
                inner.evictions += 1;
                tracing::debug!("Cache evicted: {}", oldest);
            }
        }

        tracing::debug!("Cache set: {} (TTL: {:?})", key, ttl);
        inner.entries.put(key, CacheEntry::new(value, ttl));
    }

    /// Remove one entry; true if it was present
    pub fn invalidate(&self, key: &str) -> bool {
        self.lock().entries.pop(key).is_some()
    }

    /// Drop every expired entry, returning how many were removed
    pub fn purge_expired(&self) -> usize {
        let mut inner = self.lock();
        let now = Instant::now();

        let expired: Vec<String> = inner
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired(now))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            inner.entries.pop(key);
        }
        expired.len()
    }

    /// Clear all entries; statistics are kept
    pub fn clear(&self) {
        self.lock().entries.clear();
        tracing::info!("Cache cleared");
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.lock();
        let total_requests = inner.hits + inner.misses;
        let hit_rate = if total_requests > 0 {
            inner.hits as f64 / total_requests as f64
        } else {
            0.0
        };

        CacheStats {
            size: inner.entries.len(),
            max_size: self.max_size,
            hits: inner.hits,
            misses: inner.misses,
            evictions: inner.evictions,
            hit_rate,
            total_requests,
        }
    }

    pub fn reset_stats(&self) {
        let mut inner = self.lock();
        inner.hits = 0;
        inner.misses = 0;
        inner.evictions = 0;
        tracing::info!("Cache statistics reset");
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }
}
