//! Configuration loading.
//!
//! Configuration is loaded from TOML files with the following resolution order:
//! 1. `--config <path>` (CLI flag)
//! 2. `~/.ollama-relay/config.toml` (user)
//! 3. `/etc/ollama-relay/config.toml` (system)
//!
//! When no file exists, built-in defaults apply. `DEFAULT_OLLAMA_HOST`
//! overrides `ollama.default_host` from any source.

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cache::CacheConfig;
use crate::client::OllamaTimeouts;
use crate::pool::PoolConfig;
use crate::{RelayError, Result};

/// Environment variable overriding the default Ollama host.
pub const DEFAULT_HOST_ENV: &str = "DEFAULT_OLLAMA_HOST";

/// Relay configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub ollama: OllamaConfig,
    #[serde(default)]
    pub pool: PoolSection,
    #[serde(default)]
    pub cache: CacheSections,
    #[serde(default)]
    pub lookup: LookupSection,
}

/// Ollama server settings.
#[derive(Debug, Clone, Deserialize)]
pub struct OllamaConfig {
    /// Host used when a user has not configured one (default: http://localhost:11434).
    #[serde(default = "default_host")]
    pub default_host: String,
    /// Health probe timeout in seconds (default: 5).
    #[serde(default = "default_health_timeout")]
    pub health_timeout_secs: u64,
    /// Listing/version request timeout in seconds (default: 10).
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// Chat request timeout in seconds (default: 120).
    #[serde(default = "default_chat_timeout")]
    pub chat_timeout_secs: u64,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            default_host: default_host(),
            health_timeout_secs: default_health_timeout(),
            request_timeout_secs: default_request_timeout(),
            chat_timeout_secs: default_chat_timeout(),
        }
    }
}

fn default_host() -> String {
    "http://localhost:11434".to_string()
}

fn default_health_timeout() -> u64 {
    5
}

fn default_request_timeout() -> u64 {
    10
}

fn default_chat_timeout() -> u64 {
    120
}

/// Connection pool settings.
#[derive(Debug, Clone, Deserialize)]
pub struct PoolSection {
    /// Pooled clients per host (default: 5).
    #[serde(default = "default_max_per_host")]
    pub max_connections_per_host: usize,
    /// Idle seconds before a pooled client is discarded (default: 300).
    #[serde(default = "default_connection_ttl")]
    pub connection_ttl_secs: u64,
    /// Seconds between idle sweeps (default: 60).
    #[serde(default = "default_pool_cleanup")]
    pub cleanup_interval_secs: u64,
}

impl Default for PoolSection {
    fn default() -> Self {
        Self {
            max_connections_per_host: default_max_per_host(),
            connection_ttl_secs: default_connection_ttl(),
            cleanup_interval_secs: default_pool_cleanup(),
        }
    }
}

fn default_max_per_host() -> usize {
    5
}

fn default_connection_ttl() -> u64 {
    300
}

fn default_pool_cleanup() -> u64 {
    60
}

/// Both cache instances. Keys missing from a table take that instance's
/// preset, so `[cache.general]` with only `max_size` keeps the general TTL.
#[derive(Debug, Clone)]
pub struct CacheSections {
    pub models: CacheSection,
    pub general: CacheSection,
}

impl Default for CacheSections {
    fn default() -> Self {
        Self {
            models: CacheSection::from(&CacheConfig::models()),
            general: CacheSection::from(&CacheConfig::general()),
        }
    }
}

impl<'de> Deserialize<'de> for CacheSections {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Raw {
            #[serde(default)]
            models: PartialCacheSection,
            #[serde(default)]
            general: PartialCacheSection,
        }

        let raw = Raw::deserialize(deserializer)?;
        let presets = CacheSections::default();
        Ok(Self {
            models: raw.models.over(presets.models),
            general: raw.general.over(presets.general),
        })
    }
}

/// One cache instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheSection {
    pub max_size: usize,
    pub default_ttl_secs: u64,
    pub cleanup_interval_secs: u64,
}

#[derive(Debug, Default, Deserialize)]
struct PartialCacheSection {
    max_size: Option<usize>,
    default_ttl_secs: Option<u64>,
    cleanup_interval_secs: Option<u64>,
}

impl PartialCacheSection {
    fn over(self, preset: CacheSection) -> CacheSection {
        CacheSection {
            max_size: self.max_size.unwrap_or(preset.max_size),
            default_ttl_secs: self.default_ttl_secs.unwrap_or(preset.default_ttl_secs),
            cleanup_interval_secs: self
                .cleanup_interval_secs
                .unwrap_or(preset.cleanup_interval_secs),
        }
    }
}

impl From<&CacheConfig> for CacheSection {
    fn from(config: &CacheConfig) -> Self {
        Self {
            max_size: config.max_size,
            default_ttl_secs: config.default_ttl.as_secs(),
            cleanup_interval_secs: config.cleanup_interval.as_secs(),
        }
    }
}

impl From<&CacheSection> for CacheConfig {
    fn from(section: &CacheSection) -> Self {
        CacheConfig::new()
            .max_size(section.max_size)
            .default_ttl(Duration::from_secs(section.default_ttl_secs))
            .cleanup_interval(Duration::from_secs(section.cleanup_interval_secs))
    }
}

/// Cached lookup settings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LookupSection {
    /// Freshness window for model listings in seconds. Defaults to
    /// `[cache.models] default_ttl_secs`.
    #[serde(default)]
    pub model_ttl_secs: Option<u64>,
}

impl Config {
    /// Load configuration from the standard locations.
    ///
    /// Resolution order:
    /// 1. Explicit path (if provided; must exist)
    /// 2. `~/.ollama-relay/config.toml`
    /// 3. `/etc/ollama-relay/config.toml`
    /// 4. Built-in defaults
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let config = match Self::resolve_config_path(explicit_path)? {
            Some(path) => Self::load_from_file(&path)?,
            None => Config::default(),
        };
        Ok(config.with_host_override(std::env::var(DEFAULT_HOST_ENV).ok()))
    }

    /// Parse a specific file, without environment overrides.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            RelayError::Configuration(format!("Failed to read config file {path:?}: {e}"))
        })?;
        toml::from_str(&content).map_err(|e| {
            RelayError::Configuration(format!("Failed to parse config file {path:?}: {e}"))
        })
    }

    /// Resolve the config file path, if any.
    fn resolve_config_path(explicit: Option<&Path>) -> Result<Option<PathBuf>> {
        if let Some(path) = explicit {
            if path.exists() {
                return Ok(Some(path.to_path_buf()));
            }
            return Err(RelayError::Configuration(format!(
                "Config file not found: {path:?}"
            )));
        }

        // User config
        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".ollama-relay").join("config.toml");
            if user_config.exists() {
                return Ok(Some(user_config));
            }
        }

        // System config
        let system_config = PathBuf::from("/etc/ollama-relay/config.toml");
        if system_config.exists() {
            return Ok(Some(system_config));
        }

        Ok(None)
    }

    /// Replace the default host when `host` is a non-empty value.
    pub fn with_host_override(mut self, host: Option<String>) -> Self {
        if let Some(host) = host.filter(|h| !h.trim().is_empty()) {
            self.ollama.default_host = host;
        }
        self
    }

    /// Client timeouts.
    pub fn ollama_timeouts(&self) -> OllamaTimeouts {
        OllamaTimeouts {
            health: Duration::from_secs(self.ollama.health_timeout_secs),
            request: Duration::from_secs(self.ollama.request_timeout_secs),
            chat: Duration::from_secs(self.ollama.chat_timeout_secs),
        }
    }

    /// Pool settings. The probe timeout follows `ollama.health_timeout_secs`.
    pub fn pool_config(&self) -> PoolConfig {
        PoolConfig::new()
            .max_connections_per_host(self.pool.max_connections_per_host)
            .connection_ttl(Duration::from_secs(self.pool.connection_ttl_secs))
            .cleanup_interval(Duration::from_secs(self.pool.cleanup_interval_secs))
            .health_check_timeout(Duration::from_secs(self.ollama.health_timeout_secs))
    }

    /// Model listing cache settings.
    pub fn model_cache_config(&self) -> CacheConfig {
        CacheConfig::from(&self.cache.models)
    }

    /// General-purpose cache settings.
    pub fn general_cache_config(&self) -> CacheConfig {
        CacheConfig::from(&self.cache.general)
    }

    /// Freshness window for model listings.
    pub fn model_ttl(&self) -> Duration {
        Duration::from_secs(
            self.lookup
                .model_ttl_secs
                .unwrap_or(self.cache.models.default_ttl_secs),
        )
    }
}
