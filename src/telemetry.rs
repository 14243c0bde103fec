//! Telemetry metric name constants.
//!
//! Consumers install their own `metrics` recorder (e.g. prometheus,
//! statsd); without a recorder installed, all metric calls are no-ops.
//!
//! # Metric naming conventions
//!
//! All metrics are prefixed with `relay_`. Counters end in `_total`.
//!
//! # Common labels
//!
//! - `cache` - cache instance name ("models", "general")
//! - `status` - probe outcome: "ok" or "failed"

/// Cache lookups that returned a live entry.
///
/// Labels: `cache`.
pub const CACHE_HITS_TOTAL: &str = "relay_cache_hits_total";

/// Cache lookups that found nothing, or only an expired entry.
///
/// Labels: `cache`.
pub const CACHE_MISSES_TOTAL: &str = "relay_cache_misses_total";

/// Entries removed to make room, or by `clear()`.
///
/// Labels: `cache`.
pub const CACHE_EVICTIONS_TOTAL: &str = "relay_cache_evictions_total";

/// Entries removed because their TTL elapsed.
///
/// Labels: `cache`.
pub const CACHE_EXPIRATIONS_TOTAL: &str = "relay_cache_expirations_total";

/// Pooled client reused for a request.
pub const POOL_HITS_TOTAL: &str = "relay_pool_hits_total";

/// New client constructed because no reusable one was available.
pub const POOL_MISSES_TOTAL: &str = "relay_pool_misses_total";

/// Pooled clients dropped (idle timeout, capacity, invalidation).
pub const POOL_EVICTIONS_TOTAL: &str = "relay_pool_evictions_total";

/// Health probes run against pooled clients.
///
/// Labels: `status` ("ok" | "failed").
pub const POOL_HEALTH_CHECKS_TOTAL: &str = "relay_pool_health_checks_total";
