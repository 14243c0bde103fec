//! Generic in-memory TTL cache with LRU eviction.
//!
//! [`TtlCache`] stores cloneable values under string keys. Every entry
//! carries its own time-to-live; a full cache evicts the least recently
//! accessed entry to make room for a new key. Expired entries are dropped
//! lazily on read and proactively by a background sweeper (see
//! [`TtlCache::spawn_sweeper`]).
//!
//! All reads and writes go through one mutex, which also guards the hit /
//! miss / eviction / expiration counters, so statistics are always
//! consistent with the entry map.
//!
//! # Soft expiry bound
//!
//! An entry past its TTL is never returned by [`get`](TtlCache::get), but it
//! may occupy a slot until the next read of that key or the next sweep.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::sweeper::{self, SweepOutcome};
use crate::telemetry;

/// Configuration for a [`TtlCache`].
///
/// ```rust
/// # use ollama_relay::cache::CacheConfig;
/// # use std::time::Duration;
/// let config = CacheConfig::new()
///     .max_size(500)
///     .default_ttl(Duration::from_secs(120));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Maximum number of entries. Default: 100.
    pub max_size: usize,
    /// TTL applied by [`TtlCache::set`]. Default: 5 minutes.
    pub default_ttl: Duration,
    /// Interval between background sweeps. Default: 1 minute.
    pub cleanup_interval: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_size: 100,
            default_ttl: Duration::from_secs(300),
            cleanup_interval: Duration::from_secs(60),
        }
    }
}

impl CacheConfig {
    /// Create a new config with sensible defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Preset for model listings: 50 hosts, 5 minute TTL, 1 minute sweep.
    pub fn models() -> Self {
        Self {
            max_size: 50,
            default_ttl: Duration::from_secs(300),
            cleanup_interval: Duration::from_secs(60),
        }
    }

    /// Preset for general-purpose data: 100 entries, 1 minute TTL, 30 second sweep.
    pub fn general() -> Self {
        Self {
            max_size: 100,
            default_ttl: Duration::from_secs(60),
            cleanup_interval: Duration::from_secs(30),
        }
    }

    /// Set the maximum number of entries.
    pub fn max_size(mut self, n: usize) -> Self {
        self.max_size = n;
        self
    }

    /// Set the TTL used when none is given explicitly.
    pub fn default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    /// Set the background sweep interval.
    pub fn cleanup_interval(mut self, interval: Duration) -> Self {
        self.cleanup_interval = interval;
        self
    }
}

/// A cached value plus its bookkeeping.
#[derive(Debug, Clone)]
struct CacheEntry<V> {
    data: V,
    created_at: Instant,
    last_accessed: Instant,
    access_count: u64,
    ttl: Duration,
    tag: Option<String>,
    /// Tie-breaker for entries touched at the same instant.
    recency: u64,
}

impl<V> CacheEntry<V> {
    /// A zero TTL expires on the very next read.
    fn is_expired(&self, now: Instant) -> bool {
        self.ttl.is_zero() || now.duration_since(self.created_at) > self.ttl
    }
}

/// Read-only view of an entry's bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryMetadata {
    pub created_at: Instant,
    pub last_accessed: Instant,
    pub access_count: u64,
    pub ttl: Duration,
    pub tag: Option<String>,
}

#[derive(Debug, Clone, Copy, Default)]
struct Counters {
    hits: u64,
    misses: u64,
    evictions: u64,
    expirations: u64,
}

/// Snapshot of cache statistics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub expirations: u64,
    /// Entries currently held, including expired ones not yet purged.
    pub size: usize,
    /// `hits / (hits + misses)`, or 0.0 before the first lookup.
    pub hit_rate: f64,
    pub max_size: usize,
    pub default_ttl_secs: f64,
    pub cleanup_interval_secs: f64,
}

struct Inner<V> {
    entries: HashMap<String, CacheEntry<V>>,
    counters: Counters,
    next_recency: u64,
}

impl<V> Inner<V> {
    fn bump(&mut self) -> u64 {
        self.next_recency += 1;
        self.next_recency
    }
}

/// Thread-safe TTL cache with LRU eviction.
pub struct TtlCache<V> {
    name: String,
    config: CacheConfig,
    inner: Mutex<Inner<V>>,
}

impl<V: Clone + Send + 'static> TtlCache<V> {
    /// Create a cache. `name` labels log lines and metrics.
    ///
    /// `max_size` is clamped to at least 1.
    pub fn new(name: impl Into<String>, config: CacheConfig) -> Self {
        let config = CacheConfig {
            max_size: config.max_size.max(1),
            ..config
        };
        let name = name.into();
        info!(
            cache = %name,
            max_size = config.max_size,
            default_ttl_secs = config.default_ttl.as_secs_f64(),
            cleanup_interval_secs = config.cleanup_interval.as_secs_f64(),
            "TTL cache initialized"
        );
        Self {
            name,
            config,
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                counters: Counters::default(),
                next_recency: 0,
            }),
        }
    }

    /// Cache name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Effective configuration.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    fn lock(&self) -> MutexGuard<'_, Inner<V>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Look up a value.
    ///
    /// An expired entry is removed and reported as both an expiration and
    /// a miss. A hit refreshes the entry's recency and access count.
    pub fn get(&self, key: &str) -> Option<V> {
        let now = Instant::now();
        let mut inner = self.lock();

        match inner.entries.get(key).map(|e| e.is_expired(now)) {
            None => {
                inner.counters.misses += 1;
                metrics::counter!(telemetry::CACHE_MISSES_TOTAL, "cache" => self.name.clone())
                    .increment(1);
                return None;
            }
            Some(true) => {
                inner.entries.remove(key);
                inner.counters.expirations += 1;
                inner.counters.misses += 1;
                metrics::counter!(telemetry::CACHE_EXPIRATIONS_TOTAL, "cache" => self.name.clone())
                    .increment(1);
                metrics::counter!(telemetry::CACHE_MISSES_TOTAL, "cache" => self.name.clone())
                    .increment(1);
                debug!(cache = %self.name, key = short(key), "expired on read");
                return None;
            }
            Some(false) => {}
        }

        let recency = inner.bump();
        inner.counters.hits += 1;
        let entry = inner.entries.get_mut(key)?;
        entry.last_accessed = now;
        entry.access_count += 1;
        entry.recency = recency;
        metrics::counter!(telemetry::CACHE_HITS_TOTAL, "cache" => self.name.clone()).increment(1);
        debug!(cache = %self.name, key = short(key), "cache hit");
        Some(entry.data.clone())
    }

    /// Insert or replace a value with the default TTL.
    pub fn set(&self, key: impl Into<String>, value: V) {
        self.insert(key.into(), value, self.config.default_ttl, None);
    }

    /// Insert or replace a value with an explicit TTL.
    pub fn set_with_ttl(&self, key: impl Into<String>, value: V, ttl: Duration) {
        self.insert(key.into(), value, ttl, None);
    }

    /// Insert or replace a value, recording `tag` for [`remove_tagged`](Self::remove_tagged).
    pub fn set_tagged(
        &self,
        key: impl Into<String>,
        value: V,
        ttl: Duration,
        tag: impl Into<String>,
    ) {
        self.insert(key.into(), value, ttl, Some(tag.into()));
    }

    fn insert(&self, key: String, value: V, ttl: Duration, tag: Option<String>) {
        let now = Instant::now();
        let mut inner = self.lock();

        // Replacing an existing key never needs room.
        if !inner.entries.contains_key(&key) && inner.entries.len() >= self.config.max_size {
            self.evict_lru(&mut inner);
        }

        let recency = inner.bump();
        debug!(cache = %self.name, key = short(&key), ttl_secs = ttl.as_secs_f64(), "cached");
        inner.entries.insert(
            key,
            CacheEntry {
                data: value,
                created_at: now,
                last_accessed: now,
                access_count: 0,
                ttl,
                tag,
                recency,
            },
        );
    }

    fn evict_lru(&self, inner: &mut Inner<V>) {
        let lru_key = inner
            .entries
            .iter()
            .min_by_key(|(_, e)| (e.last_accessed, e.recency))
            .map(|(k, _)| k.clone());

        if let Some(key) = lru_key {
            inner.entries.remove(&key);
            inner.counters.evictions += 1;
            metrics::counter!(telemetry::CACHE_EVICTIONS_TOTAL, "cache" => self.name.clone())
                .increment(1);
            debug!(cache = %self.name, key = short(&key), "evicted LRU entry");
        }
    }

    /// Remove a key. Returns whether it was present.
    pub fn delete(&self, key: &str) -> bool {
        let removed = self.lock().entries.remove(key).is_some();
        if removed {
            debug!(cache = %self.name, key = short(key), "deleted");
        }
        removed
    }

    /// Remove every entry whose tag equals `tag` exactly. Returns the count.
    pub fn remove_tagged(&self, tag: &str) -> usize {
        let mut inner = self.lock();
        let before = inner.entries.len();
        inner
            .entries
            .retain(|_, e| e.tag.as_deref() != Some(tag));
        before - inner.entries.len()
    }

    /// Remove all entries, counting each as an eviction.
    pub fn clear(&self) {
        let mut inner = self.lock();
        let count = inner.entries.len();
        inner.entries.clear();
        inner.counters.evictions += count as u64;
        if count > 0 {
            metrics::counter!(telemetry::CACHE_EVICTIONS_TOTAL, "cache" => self.name.clone())
                .increment(count as u64);
        }
        info!(cache = %self.name, count, "cleared cache");
    }

    /// Drop all expired entries, counting each as an expiration.
    ///
    /// This is one sweep pass; [`spawn_sweeper`](Self::spawn_sweeper) calls
    /// it periodically.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut inner = self.lock();
        let before = inner.entries.len();
        inner.entries.retain(|_, e| !e.is_expired(now));
        let removed = before - inner.entries.len();

        if removed > 0 {
            inner.counters.expirations += removed as u64;
            metrics::counter!(telemetry::CACHE_EXPIRATIONS_TOTAL, "cache" => self.name.clone())
                .increment(removed as u64);
            debug!(cache = %self.name, removed, "purged expired entries");
        }
        removed
    }

    /// Bookkeeping for a key, without counting as an access.
    pub fn entry(&self, key: &str) -> Option<EntryMetadata> {
        self.lock().entries.get(key).map(|e| EntryMetadata {
            created_at: e.created_at,
            last_accessed: e.last_accessed,
            access_count: e.access_count,
            ttl: e.ttl,
            tag: e.tag.clone(),
        })
    }

    /// Number of entries currently held.
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of counters and size.
    pub fn stats(&self) -> CacheStats {
        let inner = self.lock();
        let c = inner.counters;
        let lookups = c.hits + c.misses;
        CacheStats {
            hits: c.hits,
            misses: c.misses,
            evictions: c.evictions,
            expirations: c.expirations,
            size: inner.entries.len(),
            hit_rate: if lookups > 0 {
                c.hits as f64 / lookups as f64
            } else {
                0.0
            },
            max_size: self.config.max_size,
            default_ttl_secs: self.config.default_ttl.as_secs_f64(),
            cleanup_interval_secs: self.config.cleanup_interval.as_secs_f64(),
        }
    }

    /// Start the background sweeper.
    ///
    /// The task holds only a weak reference, so it ends on its own once the
    /// cache is dropped; cancel `token` to stop it earlier.
    pub fn spawn_sweeper(self: &Arc<Self>, token: CancellationToken) -> JoinHandle<()> {
        let weak = Arc::downgrade(self);
        sweeper::spawn_periodic("ttl-cache", self.config.cleanup_interval, token, move || {
            let weak = weak.clone();
            async move {
                match weak.upgrade() {
                    Some(cache) => {
                        cache.purge_expired();
                        SweepOutcome::Continue
                    }
                    None => SweepOutcome::Stop,
                }
            }
        })
    }
}

/// Truncate long keys in log lines.
fn short(key: &str) -> &str {
    match key.char_indices().nth(50) {
        Some((idx, _)) => &key[..idx],
        None => key,
    }
}
