//! Ollama REST API client.
//!
//! Covers the endpoints the relay needs: `/api/tags`, `/api/version` and
//! non-streaming `/api/chat`.
//! See: <https://github.com/ollama/ollama/blob/main/docs/api.md>

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{ClientFactory, LlmClient};
use crate::types::{ChatResponse, Message, ModelSummary, ServerVersion};
use crate::{RelayError, Result};

/// Per-request timeouts for the Ollama client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OllamaTimeouts {
    /// Health probe timeout. Default: 5s.
    pub health: Duration,
    /// Listing and version requests. Default: 10s.
    pub request: Duration,
    /// Chat completions, which may include model load time. Default: 120s.
    pub chat: Duration,
}

impl Default for OllamaTimeouts {
    fn default() -> Self {
        Self {
            health: Duration::from_secs(5),
            request: Duration::from_secs(10),
            chat: Duration::from_secs(120),
        }
    }
}

/// Client for a single Ollama server.
#[derive(Clone)]
pub struct OllamaClient {
    base_url: String,
    http: Client,
    timeouts: OllamaTimeouts,
}

impl OllamaClient {
    /// Create a client for the given base URL with default timeouts.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_timeouts(base_url, OllamaTimeouts::default())
    }

    /// Create a client with explicit timeouts.
    pub fn with_timeouts(base_url: impl Into<String>, timeouts: OllamaTimeouts) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            base_url,
            http: Client::new(),
            timeouts,
        }
    }

    /// Timeouts in effect.
    pub fn timeouts(&self) -> OllamaTimeouts {
        self.timeouts
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        timeout: Duration,
    ) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .http
            .get(&url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| RelayError::from_reqwest(e, timeout))?;

        let response = check_status(response).await?;
        response
            .json()
            .await
            .map_err(|e| RelayError::from_reqwest(e, timeout))
    }
}

/// Turn non-2xx responses into [`RelayError::Api`], using Ollama's
/// `{"error": "..."}` body when present.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&body)
        .map(|b| b.error)
        .unwrap_or_else(|_| {
            if body.is_empty() {
                format!("Ollama API error: {status}")
            } else {
                body
            }
        });

    Err(RelayError::Api {
        status: status.as_u16(),
        message,
    })
}

#[async_trait]
impl LlmClient for OllamaClient {
    fn host(&self) -> &str {
        &self.base_url
    }

    async fn test_connection(&self) -> Result<bool> {
        let url = format!("{}/api/tags", self.base_url);
        match self
            .http
            .get(&url)
            .timeout(self.timeouts.health)
            .send()
            .await
        {
            Ok(response) => Ok(response.status() == reqwest::StatusCode::OK),
            Err(e) => {
                debug!(host = %self.base_url, error = %e, "connection test failed");
                Ok(false)
            }
        }
    }

    async fn list_models(&self) -> Result<Vec<ModelSummary>> {
        let tags: TagsResponse = self.get_json("/api/tags", self.timeouts.request).await?;
        Ok(tags.models)
    }

    async fn chat(&self, model: &str, messages: &[Message]) -> Result<ChatResponse> {
        if model.is_empty() {
            return Err(RelayError::InvalidInput("model name is empty".to_string()));
        }

        let url = format!("{}/api/chat", self.base_url);
        let timeout = self.timeouts.chat;
        let response = self
            .http
            .post(&url)
            .timeout(timeout)
            .json(&ChatRequest {
                model,
                messages,
                stream: false,
            })
            .send()
            .await
            .map_err(|e| RelayError::from_reqwest(e, timeout))?;

        let response = check_status(response).await?;
        let body = response
            .text()
            .await
            .map_err(|e| RelayError::from_reqwest(e, timeout))?;
        if body.trim().is_empty() {
            return Err(RelayError::EmptyResponse);
        }
        Ok(serde_json::from_str(&body)?)
    }

    async fn version(&self) -> Result<ServerVersion> {
        let raw: VersionResponse = self.get_json("/api/version", self.timeouts.health).await?;
        let details = raw.details.unwrap_or_default();
        Ok(ServerVersion {
            version: raw.version,
            llama_cpp_version: details.llama_cpp_version,
            architecture: details.architecture,
            cuda_version: details.cuda_version,
            git_commit: details.git_commit,
        })
    }
}

/// Builds an [`OllamaClient`] per pooled entry.
///
/// Each client owns its own `reqwest::Client`, so every pooled entry keeps
/// its own keep-alive connections.
#[derive(Debug, Clone, Default)]
pub struct OllamaClientFactory {
    timeouts: OllamaTimeouts,
}

impl OllamaClientFactory {
    pub fn new(timeouts: OllamaTimeouts) -> Self {
        Self { timeouts }
    }
}

impl ClientFactory for OllamaClientFactory {
    fn create(&self, host: &str) -> Arc<dyn LlmClient> {
        Arc::new(OllamaClient::with_timeouts(host, self.timeouts))
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    stream: bool,
}

#[derive(Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelSummary>,
}

#[derive(Deserialize)]
struct VersionResponse {
    #[serde(default = "unknown_version")]
    version: String,
    #[serde(default)]
    details: Option<VersionDetails>,
}

#[derive(Deserialize, Default)]
struct VersionDetails {
    #[serde(default)]
    llama_cpp_version: Option<String>,
    #[serde(default)]
    architecture: Option<String>,
    #[serde(default)]
    cuda_version: Option<String>,
    #[serde(default)]
    git_commit: Option<String>,
}

fn unknown_version() -> String {
    "unknown".to_string()
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_slash_is_trimmed() {
        let client = OllamaClient::new("http://localhost:11434/");
        assert_eq!(client.host(), "http://localhost:11434");
    }

    #[test]
    fn factory_binds_host() {
        let factory = OllamaClientFactory::default();
        let client = factory.create("http://gpu-box:11434");
        assert_eq!(client.host(), "http://gpu-box:11434");
    }

    #[test]
    fn parse_tags_response() {
        let json = r#"{
            "models": [{
                "name": "llama3.2:latest",
                "model": "llama3.2:latest",
                "modified_at": "2024-10-01T12:00:00Z",
                "size": 2019393189,
                "digest": "a80c4f17acd5",
                "details": {"family": "llama"}
            }]
        }"#;
        let tags: TagsResponse = serde_json::from_str(json).unwrap();
        assert_eq!(tags.models.len(), 1);
        assert_eq!(tags.models[0].name, "llama3.2:latest");
        assert_eq!(tags.models[0].size, 2_019_393_189);
    }

    #[test]
    fn default_timeouts() {
        let t = OllamaTimeouts::default();
        assert_eq!(t.health, Duration::from_secs(5));
        assert_eq!(t.request, Duration::from_secs(10));
        assert_eq!(t.chat, Duration::from_secs(120));
    }
}
