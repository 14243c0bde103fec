//! ollama-relay - connection pooling and response caching for Ollama servers
//!
//! This crate sits between a multi-user chat front-end and the Ollama
//! servers its users configure. It keeps a bounded, health-checked pool of
//! HTTP clients per host and caches model listings so that repeated page
//! loads do not hammer the inference server.
//!
//! # Example
//!
//! ```rust,no_run
//! use ollama_relay::{Config, Message, RelayContext};
//!
//! #[tokio::main]
//! async fn main() -> ollama_relay::Result<()> {
//!     let relay = RelayContext::new(Config::load(None)?);
//!     let host = relay.default_host().to_string();
//!
//!     // Served from cache for five minutes after the first call.
//!     let models = relay.models().list_models(&host).await?;
//!     let Some(model) = models.first().map(|m| m.name.clone()) else {
//!         return Ok(());
//!     };
//!
//!     let client = relay.pool().get_client(&host).await;
//!     let reply = client
//!         .chat(&model, &[Message::user("What is the capital of France?")])
//!         .await?;
//!     println!("{}", reply.content());
//!
//!     relay.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod client;
pub mod config;
pub mod context;
pub mod error;
pub mod pool;
pub mod sweeper;
pub mod telemetry;
pub mod types;

// Re-export main types at crate root
pub use cache::{CacheConfig, CacheStats, ModelLookup, TtlCache, cached_call};
pub use client::{ClientFactory, LlmClient, OllamaClient, OllamaClientFactory, OllamaTimeouts};
pub use config::Config;
pub use context::{RelayContext, RelayStats};
pub use error::{RelayError, Result};
pub use pool::{ConnectionPool, PoolConfig, PoolStats, PooledHandle};
pub use types::{ChatResponse, Message, ModelCategory, ModelSummary, Role, ServerVersion};

/// Package version from Cargo.toml.
pub const PKG_VERSION: &str = env!("CARGO_PKG_VERSION");
