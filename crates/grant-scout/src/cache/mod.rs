//! Bounded in-memory cache with per-entry TTL and LRU eviction.
//!
//! One mutex guards both the map and its recency order; every operation is
//! O(1) and no lock is ever held across an await point. Expired entries are
//! removed lazily on `get` and counted separately from capacity evictions.

pub mod key;

use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use lru::LruCache;
use serde::Serialize;
use tracing::debug;

struct Entry<V> {
    value: V,
    inserted_at: Instant,
    ttl: Duration,
}

impl<V> Entry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        now.duration_since(self.inserted_at) > self.ttl
    }
}

#[derive(Debug, Default)]
struct Counters {
    hits: u64,
    misses: u64,
    evictions: u64,
    expirations: u64,
}

/// Point-in-time cache statistics for observability endpoints.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheStats {
    pub size: usize,
    pub max_size: usize,
    pub ttl_seconds: u64,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub expirations: u64,
    pub hit_rate: f64,
    pub total_requests: u64,
}

/// Thread-safe TTL + LRU cache keyed by string.
///
/// Values are cloned out on `get`; callers typically store `Arc`s or cheap
/// serde values. A missing or expired key is a plain `None`, never an error.
pub struct TtlCache<V> {
    inner: Mutex<CacheInner<V>>,
    default_ttl: Duration,
    max_size: usize,
}

struct CacheInner<V> {
    entries: LruCache<String, Entry<V>>,
    counters: Counters,
}

impl<V: Clone> TtlCache<V> {
    /// Create a cache holding at most `max_size` entries, each living for
    /// `default_ttl` unless overridden per entry.
    pub fn new(default_ttl: Duration, max_size: usize) -> Self {
        let capacity = NonZeroUsize::new(max_size.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(CacheInner {
                entries: LruCache::new(capacity),
                counters: Counters::default(),
            }),
            default_ttl,
            max_size: max_size.max(1),
        }
    }

    /// Fetch a value, refreshing its recency. Expired entries are removed
    /// and reported as a miss plus exactly one expiration.
    pub fn get(&self, key: &str) -> Option<V> {
        let now = Instant::now();
        let mut inner = self.inner.lock().expect("cache mutex poisoned");

        let expired = match inner.entries.get(key) {
            Some(entry) if entry.is_expired(now) => true,
            Some(entry) => {
                let value = entry.value.clone();
                inner.counters.hits += 1;
                return Some(value);
            }
            None => {
                inner.counters.misses += 1;
                return None;
            }
        };

        if expired {
            inner.entries.pop(key);
            inner.counters.expirations += 1;
            inner.counters.misses += 1;
            debug!(key, "cache entry expired");
        }
        None
    }

    /// Insert with the default TTL, evicting the least-recently-used entry
    /// when at capacity.
    pub fn set(&self, key: impl Into<String>, value: V) {
        self.set_with_ttl(key, value, self.default_ttl);
    }

    /// Insert with an explicit TTL override.
    pub fn set_with_ttl(&self, key: impl Into<String>, value: V, ttl: Duration) {
        let key = key.into();
        let mut inner = self.inner.lock().expect("cache mutex poisoned");

        let at_capacity = inner.entries.len() >= self.max_size;
        if at_capacity && !inner.entries.contains(&key) {
            if let Some((evicted, _)) = inner.entries.pop_lru() {
                inner.counters.evictions += 1;
                debug!(key = %evicted, "evicted least-recently-used cache entry");
            }
        }

        inner.entries.put(
            key,
            Entry {
                value,
                inserted_at: Instant::now(),
                ttl,
            },
        );
    }

    /// Remove a specific entry. Returns whether anything was removed.
    pub fn invalidate(&self, key: &str) -> bool {
        let mut inner = self.inner.lock().expect("cache mutex poisoned");
        inner.entries.pop(key).is_some()
    }

    /// Drop every entry, keeping counters.
    pub fn clear(&self) {
        let mut inner = self.inner.lock().expect("cache mutex poisoned");
        inner.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("cache mutex poisoned").entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the key is present, expired or not.
    pub fn contains(&self, key: &str) -> bool {
        self.inner
            .lock()
            .expect("cache mutex poisoned")
            .entries
            .contains(key)
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock().expect("cache mutex poisoned");
        let counters = &inner.counters;
        let total = counters.hits + counters.misses;
        let hit_rate = if total > 0 {
            counters.hits as f64 / total as f64
        } else {
            0.0
        };

        CacheStats {
            size: inner.entries.len(),
            max_size: self.max_size,
            ttl_seconds: self.default_ttl.as_secs(),
            hits: counters.hits,
            misses: counters.misses,
            evictions: counters.evictions,
            expirations: counters.expirations,
            hit_rate,
            total_requests: total,
        }
    }
}
