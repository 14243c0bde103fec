//! Cache-backed call composition.
//!
//! [`ModelLookup`] serves "list models at host H" from the model cache
//! within a TTL window and falls through to a pooled client on a miss.
//! [`cached_call`] is the general-purpose equivalent for any serialisable
//! result stored in a `TtlCache<serde_json::Value>`.
//!
//! Entries written by `ModelLookup` are tagged with their host, so
//! [`ModelLookup::invalidate_host`] removes exactly that host's listings
//! instead of pattern-matching on keys.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::key::{cache_key, positional_key};
use super::ttl::TtlCache;
use crate::Result;
use crate::pool::ConnectionPool;
use crate::types::ModelSummary;

/// Default freshness window for model listings.
pub const DEFAULT_MODEL_TTL: Duration = Duration::from_secs(300);

/// Prefix for model listing keys.
const MODELS_PREFIX: &str = "models";

/// Cached "list models" lookups backed by the connection pool.
pub struct ModelLookup {
    pool: Arc<ConnectionPool>,
    cache: Arc<TtlCache<Vec<ModelSummary>>>,
    ttl: Duration,
}

impl ModelLookup {
    /// Compose a pool and a cache with the default 5 minute TTL.
    pub fn new(pool: Arc<ConnectionPool>, cache: Arc<TtlCache<Vec<ModelSummary>>>) -> Self {
        Self::with_ttl(pool, cache, DEFAULT_MODEL_TTL)
    }

    /// Compose with an explicit TTL.
    pub fn with_ttl(
        pool: Arc<ConnectionPool>,
        cache: Arc<TtlCache<Vec<ModelSummary>>>,
        ttl: Duration,
    ) -> Self {
        Self { pool, cache, ttl }
    }

    /// TTL applied to stored listings.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Cache key for a host's listing.
    pub fn key_for(host: &str) -> String {
        format!("{MODELS_PREFIX}:{}", positional_key(&[Value::from(host)]))
    }

    /// Models available at `host`.
    ///
    /// A cache hit does not touch the pool. Errors from the server are
    /// returned unchanged and nothing is cached for them.
    pub async fn list_models(&self, host: &str) -> Result<Vec<ModelSummary>> {
        let key = Self::key_for(host);
        if let Some(models) = self.cache.get(&key) {
            debug!(host, "model cache hit");
            return Ok(models);
        }

        debug!(host, "model cache miss");
        let models = {
            let client = self.pool.get_client(host).await;
            client.list_models().await?
        };
        self.cache
            .set_tagged(key, models.clone(), self.ttl, host.to_string());
        Ok(models)
    }

    /// Drop cached listings for `host`. Returns how many entries were removed.
    pub fn invalidate_host(&self, host: &str) -> usize {
        let removed = self.cache.remove_tagged(host);
        info!(host, removed, "invalidated model cache for host");
        removed
    }

    /// Drop every cached listing.
    pub fn invalidate_all(&self) {
        self.cache.clear();
        info!("cleared model cache");
    }

    /// Invalidate `host` and fetch a fresh listing.
    pub async fn refresh(&self, host: &str) -> Result<Vec<ModelSummary>> {
        self.invalidate_host(host);
        self.list_models(host).await
    }
}

/// Memoise an async call in a JSON-valued cache.
///
/// The key is `"{name}:{digest}"`, where the digest covers the positional
/// and named arguments (see [`cache_key`]). Only `Ok` results are stored.
/// A stored value that no longer deserialises into `T` is treated as a
/// miss and overwritten.
pub async fn cached_call<T, F, Fut>(
    cache: &TtlCache<Value>,
    name: &str,
    positional: &[Value],
    named: &BTreeMap<String, Value>,
    ttl: Duration,
    f: F,
) -> Result<T>
where
    T: Serialize + DeserializeOwned,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let key = format!("{name}:{}", cache_key(positional, named));

    if let Some(value) = cache.get(&key) {
        match serde_json::from_value(value) {
            Ok(hit) => {
                debug!(call = name, "cache hit");
                return Ok(hit);
            }
            Err(e) => warn!(call = name, error = %e, "cached value has unexpected shape"),
        }
    }

    debug!(call = name, "cache miss");
    let result = f().await?;
    cache.set_with_ttl(key, serde_json::to_value(&result)?, ttl);
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_is_prefixed_and_fixed_length() {
        let key = ModelLookup::key_for("http://localhost:11434");
        assert!(key.starts_with("models:"));
        assert_eq!(key.len(), "models:".len() + 64);
        assert_ne!(key, ModelLookup::key_for("http://localhost:11435"));
    }
}
