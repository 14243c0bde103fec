//! Client capability traits and the Ollama HTTP client.
//!
//! The pool and the cached lookup never talk HTTP themselves; they hold
//! `Arc<dyn LlmClient>` handles produced by a [`ClientFactory`]. This keeps
//! the bookkeeping testable with in-memory fakes.
//!
//! # Thread safety
//!
//! Handles are shared through `Arc` and may be used from several tasks at
//! once, so implementations must be safe for concurrent use (the bundled
//! [`OllamaClient`] wraps a `reqwest::Client`, which is). The pool
//! additionally leases handles so that it never hands the same pooled
//! handle to two callers at the same time.

mod ollama;

use std::sync::Arc;

use async_trait::async_trait;

use crate::Result;
use crate::types::{ChatResponse, Message, ModelSummary, ServerVersion};

pub use ollama::{OllamaClient, OllamaClientFactory, OllamaTimeouts};

/// Operations the relay needs from an inference server.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Base URL this client is bound to.
    fn host(&self) -> &str;

    /// Cheap connectivity probe.
    ///
    /// `Ok(false)` means the server answered but is not usable; `Err` means
    /// the probe itself failed. The pool treats both as unhealthy.
    async fn test_connection(&self) -> Result<bool>;

    /// Models installed on the server.
    async fn list_models(&self) -> Result<Vec<ModelSummary>>;

    /// Single non-streaming chat completion.
    async fn chat(&self, model: &str, messages: &[Message]) -> Result<ChatResponse>;

    /// Server build information.
    async fn version(&self) -> Result<ServerVersion>;
}

/// Constructs a fresh client bound to a host.
pub trait ClientFactory: Send + Sync {
    fn create(&self, host: &str) -> Arc<dyn LlmClient>;
}
