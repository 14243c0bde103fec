//! Chat response types

use super::message::Message;
use serde::{Deserialize, Serialize};

/// Non-streaming chat response.
///
/// Durations are nanoseconds, as reported by the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub message: Message,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default = "default_done")]
    pub done: bool,
    #[serde(default)]
    pub total_duration: u64,
    #[serde(default)]
    pub load_duration: u64,
    #[serde(default)]
    pub prompt_eval_count: u32,
    #[serde(default)]
    pub eval_count: u32,
}

fn default_done() -> bool {
    true
}

impl ChatResponse {
    /// Assistant reply text.
    pub fn content(&self) -> &str {
        &self.message.content
    }
}
