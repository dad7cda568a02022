use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A single message in the conversation history handed to an LLM provider.
/// Adapted directly from `skynet-agent/src/provider.rs`'s `Message`/`Role`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// A tool call requested by the LLM, e.g. `schedule_meeting` with arguments
/// (§4.5). Adapted from `skynet-agent/src/provider.rs`'s `ToolCall`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub name: String,
    pub arguments: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
}

/// Request to an LLM provider. Trimmed from the teacher's `ChatRequest`:
/// drops `system_prompt` cache-breakpoint tiering and `thinking` level,
/// which are Anthropic-console ergonomics this domain has no use for.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub model: String,
    pub system: String,
    pub messages: Vec<Message>,
    pub max_tokens: u32,
    pub tools: Vec<ToolDefinition>,
}

/// An agent's reply is either text or a tool call (§4.5).
#[derive(Debug, Clone)]
pub enum ChatResponse {
    Text(String),
    ToolCall(ToolCall),
}

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("parse error: {0}")]
    Parse(String),

    #[error("rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    #[error("provider unavailable: {0}")]
    Unavailable(String),
}

/// Common interface for all LLM providers, adapted from
/// `skynet-agent/src/provider.rs`'s `LlmProvider` trait (dropped streaming,
/// token refresh, and auth introspection — this domain calls providers
/// strictly request/response, per-agent invocation, never session-long).
#[async_trait]
pub trait LlmProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn send(&self, req: &ChatRequest) -> Result<ChatResponse, ProviderError>;
}
