//! Process-wide relay state.
//!
//! [`RelayContext`] is built once at startup and handed to request handlers
//! (typically behind an `Arc`). It owns the single connection pool, the
//! model listing cache, the general-purpose cache and the background
//! sweepers that maintain them.

use std::sync::Arc;

use futures_util::future::join_all;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::cache::{CacheStats, ModelLookup, TtlCache};
use crate::client::{ClientFactory, OllamaClientFactory};
use crate::config::Config;
use crate::pool::{ConnectionPool, PoolStats};
use crate::types::ModelSummary;

/// Name of the model listing cache in logs and metrics.
pub const MODEL_CACHE_NAME: &str = "models";
/// Name of the general-purpose cache in logs and metrics.
pub const GENERAL_CACHE_NAME: &str = "general";

/// Owner of the pool, both caches and their sweepers.
pub struct RelayContext {
    config: Config,
    pool: Arc<ConnectionPool>,
    model_cache: Arc<TtlCache<Vec<ModelSummary>>>,
    general_cache: Arc<TtlCache<Value>>,
    models: ModelLookup,
    shutdown: CancellationToken,
    sweepers: Mutex<Vec<JoinHandle<()>>>,
}

impl RelayContext {
    /// Build the context with Ollama clients and start the sweepers.
    ///
    /// # Panics
    ///
    /// Requires a tokio runtime context.
    pub fn new(config: Config) -> Self {
        let factory = Arc::new(OllamaClientFactory::new(config.ollama_timeouts()));
        Self::with_factory(config, factory)
    }

    /// Build the context with a custom client factory.
    ///
    /// # Panics
    ///
    /// Requires a tokio runtime context.
    pub fn with_factory(config: Config, factory: Arc<dyn ClientFactory>) -> Self {
        let pool = Arc::new(ConnectionPool::new(config.pool_config(), factory));
        let model_cache = Arc::new(TtlCache::new(
            MODEL_CACHE_NAME,
            config.model_cache_config(),
        ));
        let general_cache = Arc::new(TtlCache::new(
            GENERAL_CACHE_NAME,
            config.general_cache_config(),
        ));
        let models = ModelLookup::with_ttl(
            Arc::clone(&pool),
            Arc::clone(&model_cache),
            config.model_ttl(),
        );

        let shutdown = CancellationToken::new();
        let sweepers = vec![
            pool.spawn_sweeper(shutdown.child_token()),
            model_cache.spawn_sweeper(shutdown.child_token()),
            general_cache.spawn_sweeper(shutdown.child_token()),
        ];

        info!(default_host = %config.ollama.default_host, "relay context ready");

        Self {
            config,
            pool,
            model_cache,
            general_cache,
            models,
            shutdown,
            sweepers: Mutex::new(sweepers),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Host used when a caller has none configured.
    pub fn default_host(&self) -> &str {
        &self.config.ollama.default_host
    }

    pub fn pool(&self) -> &Arc<ConnectionPool> {
        &self.pool
    }

    pub fn models(&self) -> &ModelLookup {
        &self.models
    }

    pub fn model_cache(&self) -> &Arc<TtlCache<Vec<ModelSummary>>> {
        &self.model_cache
    }

    pub fn general_cache(&self) -> &Arc<TtlCache<Value>> {
        &self.general_cache
    }

    /// Combined statistics, e.g. for a status endpoint.
    pub async fn stats(&self) -> RelayStats {
        RelayStats {
            pool: self.pool.stats().await,
            model_cache: self.model_cache.stats(),
            general_cache: self.general_cache.stats(),
        }
    }

    /// Stop all sweepers and wait for them to finish. Idempotent.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        let handles: Vec<_> = self.sweepers.lock().await.drain(..).collect();
        let count = handles.len();
        for result in join_all(handles).await {
            if let Err(e) = result {
                debug!(error = %e, "sweeper ended abnormally");
            }
        }
        if count > 0 {
            info!(sweepers = count, "relay context shut down");
        }
    }
}

impl Drop for RelayContext {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Pool and cache statistics together.
#[derive(Debug, Clone, Serialize)]
pub struct RelayStats {
    pub pool: PoolStats,
    pub model_cache: CacheStats,
    pub general_cache: CacheStats,
}
