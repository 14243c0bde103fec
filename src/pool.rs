//! Per-host connection pool of reusable client handles.
//!
//! [`ConnectionPool::get_client`] prefers a healthy pooled client for the
//! requested host over constructing a new one. Each host has its own
//! sub-pool bounded by [`PoolConfig::max_connections_per_host`]; when a
//! sub-pool is full, the least recently used entry makes room.
//!
//! # Leasing
//!
//! A handle returned by `get_client` is leased: until the [`PooledHandle`]
//! is dropped, the pool will not hand the same pooled client to another
//! caller and will construct a new one instead. Dropping the handle
//! returns the client to the pool; there is no explicit release call.
//!
//! # Locking
//!
//! One async mutex guards every sub-pool and the statistics. Health probes
//! run while it is held, so a slow probe delays other `get_client` calls
//! by at most [`PoolConfig::health_check_timeout`].

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::ops::Deref;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::client::{ClientFactory, LlmClient};
use crate::sweeper::{self, SweepOutcome};
use crate::telemetry;

/// Configuration for a [`ConnectionPool`].
///
/// ```rust
/// # use ollama_relay::pool::PoolConfig;
/// # use std::time::Duration;
/// let config = PoolConfig::new()
///     .max_connections_per_host(2)
///     .connection_ttl(Duration::from_secs(60));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    /// Upper bound on pooled clients per host. Default: 5.
    pub max_connections_per_host: usize,
    /// Idle time after which a pooled client is discarded. Default: 5 minutes.
    pub connection_ttl: Duration,
    /// Interval between background sweeps. Default: 1 minute.
    pub cleanup_interval: Duration,
    /// Upper bound on a single health probe. Default: 5s.
    pub health_check_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections_per_host: 5,
            connection_ttl: Duration::from_secs(300),
            cleanup_interval: Duration::from_secs(60),
            health_check_timeout: Duration::from_secs(5),
        }
    }
}

impl PoolConfig {
    /// Create a new config with sensible defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the per-host capacity.
    pub fn max_connections_per_host(mut self, n: usize) -> Self {
        self.max_connections_per_host = n;
        self
    }

    /// Set the idle timeout.
    pub fn connection_ttl(mut self, ttl: Duration) -> Self {
        self.connection_ttl = ttl;
        self
    }

    /// Set the background sweep interval.
    pub fn cleanup_interval(mut self, interval: Duration) -> Self {
        self.cleanup_interval = interval;
        self
    }

    /// Set the health probe timeout.
    pub fn health_check_timeout(mut self, timeout: Duration) -> Self {
        self.health_check_timeout = timeout;
        self
    }
}

struct PooledClient {
    client: Arc<dyn LlmClient>,
    created_at: Instant,
    last_used: Instant,
    use_count: u64,
    leased: Arc<AtomicBool>,
    /// Tie-breaker for entries used at the same instant.
    recency: u64,
}

impl PooledClient {
    fn is_idle_past(&self, now: Instant, ttl: Duration) -> bool {
        now.duration_since(self.last_used) > ttl
    }

    fn is_leased(&self) -> bool {
        self.leased.load(Ordering::Acquire)
    }
}

/// Global pool counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PoolCounters {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub health_checks: u64,
    pub failed_health_checks: u64,
}

/// Per-client statistics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClientStats {
    pub id: u64,
    pub use_count: u64,
    pub age_secs: f64,
    pub idle_secs: f64,
    pub in_use: bool,
}

/// Per-host statistics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HostStats {
    pub active_connections: usize,
    pub clients: Vec<ClientStats>,
}

/// Snapshot of pool statistics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PoolStats {
    pub global: PoolCounters,
    pub total_active_connections: usize,
    pub hosts: BTreeMap<String, HostStats>,
    pub max_connections_per_host: usize,
    pub connection_ttl_secs: f64,
    pub cleanup_interval_secs: f64,
}

impl PoolStats {
    /// Fraction of `get_client` calls served from the pool (0.0 before any).
    pub fn hit_rate(&self) -> f64 {
        let lookups = self.global.hits + self.global.misses;
        if lookups == 0 {
            0.0
        } else {
            self.global.hits as f64 / lookups as f64
        }
    }

    /// Statistics for one host, if it has a sub-pool.
    pub fn host(&self, host: &str) -> Option<&HostStats> {
        self.hosts.get(host)
    }
}

#[derive(Default)]
struct PoolState {
    hosts: HashMap<String, BTreeMap<u64, PooledClient>>,
    counters: PoolCounters,
    next_id: u64,
    next_recency: u64,
}

/// A leased client handle.
///
/// Derefs to the underlying [`LlmClient`]. Dropping it returns the client
/// to the pool.
pub struct PooledHandle {
    id: u64,
    host: String,
    client: Arc<dyn LlmClient>,
    lease: Arc<AtomicBool>,
}

impl PooledHandle {
    /// Pool-assigned id of the entry backing this handle.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Host the client is bound to.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Shared reference to the client, usable beyond the lease.
    pub fn client(&self) -> Arc<dyn LlmClient> {
        Arc::clone(&self.client)
    }
}

impl Deref for PooledHandle {
    type Target = dyn LlmClient;

    fn deref(&self) -> &Self::Target {
        self.client.as_ref()
    }
}

impl Drop for PooledHandle {
    fn drop(&mut self) {
        self.lease.store(false, Ordering::Release);
    }
}

impl fmt::Debug for PooledHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledHandle")
            .field("id", &self.id)
            .field("host", &self.host)
            .finish_non_exhaustive()
    }
}

/// Per-host pool of reusable clients with health checks and LRU eviction.
pub struct ConnectionPool {
    config: PoolConfig,
    factory: Arc<dyn ClientFactory>,
    state: Mutex<PoolState>,
}

impl ConnectionPool {
    /// Create a pool. `max_connections_per_host` is clamped to at least 1.
    pub fn new(config: PoolConfig, factory: Arc<dyn ClientFactory>) -> Self {
        let config = PoolConfig {
            max_connections_per_host: config.max_connections_per_host.max(1),
            ..config
        };
        info!(
            max_per_host = config.max_connections_per_host,
            ttl_secs = config.connection_ttl.as_secs_f64(),
            cleanup_interval_secs = config.cleanup_interval.as_secs_f64(),
            "connection pool initialized"
        );
        Self {
            config,
            factory,
            state: Mutex::new(PoolState::default()),
        }
    }

    /// Effective configuration.
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Lease a client bound to `host`.
    ///
    /// Idle-expired entries are evicted, unhealthy entries are evicted
    /// after a failed probe, and the first healthy free entry is reused.
    /// Otherwise a new client is constructed and pooled, evicting the
    /// least recently used entry of this host if the sub-pool is full.
    pub async fn get_client(&self, host: &str) -> PooledHandle {
        let mut guard = self.state.lock().await;
        let now = Instant::now();
        let PoolState {
            hosts,
            counters,
            next_id,
            next_recency,
        } = &mut *guard;
        let pool = hosts.entry(host.to_string()).or_default();

        let ids: Vec<u64> = pool.keys().copied().collect();
        for id in ids {
            let Some(entry) = pool.get(&id) else {
                continue;
            };

            if entry.is_idle_past(now, self.config.connection_ttl) {
                pool.remove(&id);
                record_evictions(counters, 1);
                debug!(host, id, "evicted idle client");
                continue;
            }

            if entry.is_leased() {
                continue;
            }

            let client = Arc::clone(&entry.client);
            if self.probe(client.as_ref(), counters).await {
                *next_recency += 1;
                let Some(entry) = pool.get_mut(&id) else {
                    continue;
                };
                entry.last_used = Instant::now();
                entry.use_count += 1;
                entry.recency = *next_recency;
                entry.leased.store(true, Ordering::Release);
                counters.hits += 1;
                metrics::counter!(telemetry::POOL_HITS_TOTAL).increment(1);
                debug!(host, id, uses = entry.use_count, "reusing pooled client");
                return PooledHandle {
                    id,
                    host: host.to_string(),
                    client,
                    lease: Arc::clone(&entry.leased),
                };
            }

            pool.remove(&id);
            debug!(host, id, "removed unhealthy client");
        }

        counters.misses += 1;
        metrics::counter!(telemetry::POOL_MISSES_TOTAL).increment(1);
        let client = self.factory.create(host);

        if pool.len() >= self.config.max_connections_per_host {
            let lru = pool
                .iter()
                .min_by_key(|(_, e)| (e.last_used, e.recency))
                .map(|(id, _)| *id);
            if let Some(lru) = lru {
                pool.remove(&lru);
                record_evictions(counters, 1);
                debug!(host, evicted = lru, "evicted LRU client to make room");
            }
        }

        // Probes above may have run since the lock was taken
        let now = Instant::now();
        let id = *next_id;
        *next_id += 1;
        *next_recency += 1;
        let lease = Arc::new(AtomicBool::new(true));
        pool.insert(
            id,
            PooledClient {
                client: Arc::clone(&client),
                created_at: now,
                last_used: now,
                use_count: 1,
                leased: Arc::clone(&lease),
                recency: *next_recency,
            },
        );
        debug!(host, id, pool_size = pool.len(), "created pooled client");

        PooledHandle {
            id,
            host: host.to_string(),
            client,
            lease,
        }
    }

    /// Run one health probe, recording the outcome.
    async fn probe(&self, client: &dyn LlmClient, counters: &mut PoolCounters) -> bool {
        counters.health_checks += 1;
        let healthy =
            match tokio::time::timeout(self.config.health_check_timeout, client.test_connection())
                .await
            {
                Ok(Ok(healthy)) => healthy,
                Ok(Err(e)) => {
                    debug!(host = client.host(), error = %e, "health check failed");
                    false
                }
                Err(_) => {
                    debug!(host = client.host(), "health check timed out");
                    false
                }
            };

        if !healthy {
            counters.failed_health_checks += 1;
        }
        let status = if healthy { "ok" } else { "failed" };
        metrics::counter!(telemetry::POOL_HEALTH_CHECKS_TOTAL, "status" => status).increment(1);
        healthy
    }

    /// Drop entries idle longer than the TTL across all hosts, and hosts
    /// left empty. Returns the number of entries removed.
    pub async fn cleanup_stale(&self) -> usize {
        let ttl = self.config.connection_ttl;
        let mut guard = self.state.lock().await;
        let now = Instant::now();
        let PoolState {
            hosts, counters, ..
        } = &mut *guard;

        let mut removed = 0;
        hosts.retain(|_, pool| {
            let before = pool.len();
            pool.retain(|_, e| !e.is_idle_past(now, ttl));
            removed += before - pool.len();
            !pool.is_empty()
        });

        if removed > 0 {
            record_evictions(counters, removed);
            debug!(removed, "cleaned up stale connections");
        }
        removed
    }

    /// Drop every pooled client for `host`. Returns how many were dropped.
    pub async fn invalidate_host(&self, host: &str) -> usize {
        let mut guard = self.state.lock().await;
        let count = guard.hosts.remove(host).map_or(0, |pool| pool.len());
        if count > 0 {
            record_evictions(&mut guard.counters, count);
        }
        info!(host, count, "invalidated host connections");
        count
    }

    /// Drop every pooled client. Returns how many were dropped.
    pub async fn clear_all(&self) -> usize {
        let mut guard = self.state.lock().await;
        let total: usize = guard.hosts.values().map(BTreeMap::len).sum();
        guard.hosts.clear();
        if total > 0 {
            record_evictions(&mut guard.counters, total);
        }
        info!(total, "cleared all pooled connections");
        total
    }

    /// Number of pooled clients for `host`.
    pub async fn connection_count(&self, host: &str) -> usize {
        self.state
            .lock()
            .await
            .hosts
            .get(host)
            .map_or(0, BTreeMap::len)
    }

    /// Snapshot of counters and per-host occupancy.
    pub async fn stats(&self) -> PoolStats {
        let guard = self.state.lock().await;
        let now = Instant::now();

        let hosts: BTreeMap<String, HostStats> = guard
            .hosts
            .iter()
            .map(|(host, pool)| {
                let clients = pool
                    .iter()
                    .map(|(id, e)| ClientStats {
                        id: *id,
                        use_count: e.use_count,
                        age_secs: now.duration_since(e.created_at).as_secs_f64(),
                        idle_secs: now.duration_since(e.last_used).as_secs_f64(),
                        in_use: e.is_leased(),
                    })
                    .collect();
                (
                    host.clone(),
                    HostStats {
                        active_connections: pool.len(),
                        clients,
                    },
                )
            })
            .collect();

        PoolStats {
            global: guard.counters,
            total_active_connections: hosts.values().map(|h| h.active_connections).sum(),
            hosts,
            max_connections_per_host: self.config.max_connections_per_host,
            connection_ttl_secs: self.config.connection_ttl.as_secs_f64(),
            cleanup_interval_secs: self.config.cleanup_interval.as_secs_f64(),
        }
    }

    /// Start the background idle sweeper.
    ///
    /// Holds only a weak reference; ends when the pool is dropped or
    /// `token` is cancelled.
    pub fn spawn_sweeper(self: &Arc<Self>, token: CancellationToken) -> JoinHandle<()> {
        let weak = Arc::downgrade(self);
        sweeper::spawn_periodic("connection-pool", self.config.cleanup_interval, token, move || {
            let weak = weak.clone();
            async move {
                match weak.upgrade() {
                    Some(pool) => {
                        pool.cleanup_stale().await;
                        SweepOutcome::Continue
                    }
                    None => SweepOutcome::Stop,
                }
            }
        })
    }
}

fn record_evictions(counters: &mut PoolCounters, n: usize) {
    counters.evictions += n as u64;
    metrics::counter!(telemetry::POOL_EVICTIONS_TOTAL).increment(n as u64);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults() {
        let config = PoolConfig::default();
        assert_eq!(config.max_connections_per_host, 5);
        assert_eq!(config.connection_ttl, Duration::from_secs(300));
        assert_eq!(config.cleanup_interval, Duration::from_secs(60));
        assert_eq!(config.health_check_timeout, Duration::from_secs(5));
    }

    #[test]
    fn hit_rate_without_lookups_is_zero() {
        let stats = PoolStats {
            global: PoolCounters::default(),
            total_active_connections: 0,
            hosts: BTreeMap::new(),
            max_connections_per_host: 5,
            connection_ttl_secs: 300.0,
            cleanup_interval_secs: 60.0,
        };
        assert_eq!(stats.hit_rate(), 0.0);
    }

    #[test]
    fn hit_rate_counts_hits_over_lookups() {
        let stats = PoolStats {
            global: PoolCounters {
                hits: 3,
                misses: 1,
                ..PoolCounters::default()
            },
            total_active_connections: 1,
            hosts: BTreeMap::new(),
            max_connections_per_host: 5,
            connection_ttl_secs: 300.0,
            cleanup_interval_secs: 60.0,
        };
        assert!((stats.hit_rate() - 0.75).abs() < f64::EPSILON);
    }
}
