// Ollama Protocol Types
//
// Request and response shapes of Ollama's streaming chat API.

use codepair_core::llm_drivers::{LlmMessage, LlmMessageRole};
use serde::{Deserialize, Serialize};

/// Chat message in Ollama's format
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OllamaMessage {
    pub role: String,
    #[serde(default)]
    pub content: String,
}

impl From<&LlmMessage> for OllamaMessage {
    fn from(message: &LlmMessage) -> Self {
        let role = match message.role {
            LlmMessageRole::System => "system",
            LlmMessageRole::User => "user",
            LlmMessageRole::Assistant => "assistant",
        };
        Self {
            role: role.to_string(),
            content: message.content.clone(),
        }
    }
}

/// Generation parameters
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct OllamaOptions {
    pub temperature: f32,
    /// Context window in tokens
    pub num_ctx: u32,
}

/// Body of `POST /api/chat`
#[derive(Debug, Clone, Serialize)]
pub struct OllamaChatRequest {
    pub model: String,
    pub messages: Vec<OllamaMessage>,
    pub stream: bool,
    pub options: OllamaOptions,
}

/// One line of a streamed chat response
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OllamaChatChunk {
    #[serde(default)]
    pub message: Option<OllamaMessage>,
    #[serde(default)]
    pub done: bool,
    /// Set when the runtime fails mid-stream
    #[serde(default)]
    pub error: Option<String>,
}

impl OllamaChatChunk {
    /// Text carried by this chunk, if any
    pub fn content(&self) -> Option<&str> {
        self.message
            .as_ref()
            .map(|m| m.content.as_str())
            .filter(|content| !content.is_empty())
    }
}

/// Error body returned with non-success statuses
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct OllamaErrorBody {
    pub error: String,
}
