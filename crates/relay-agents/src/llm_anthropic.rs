use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::llm::{ChatRequest, ChatResponse, LlmProvider, ProviderError, ToolCall};

const API_VERSION: &str = "2023-06-01";

/// Adapted from `anthropic.rs`'s `AnthropicProvider`: same request-building
/// and status-code handling, trimmed of streaming and OAuth-token detection
/// (every custom agent in this domain carries a plain API key, §4.5 "opaque
/// to the core").
pub struct AnthropicProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl AnthropicProvider {
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn send(&self, req: &ChatRequest) -> Result<ChatResponse, ProviderError> {
        let body = build_request_body(req);
        let url = format!("{}/v1/messages", self.base_url);

        debug!(model = %req.model, "sending request to Anthropic");

        let resp = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = resp.status().as_u16();
        if status == 429 {
            let retry = resp
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(5000);
            return Err(ProviderError::RateLimited { retry_after_ms: retry });
        }

        if !resp.status().is_success() {
            let text = resp.text().await.unwrap_or_default();
            warn!(status, body = %text, "Anthropic API error");
            return Err(ProviderError::Api { status, message: text });
        }

        let api_resp: ApiResponse = resp
            .json()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))?;

        Ok(parse_response(api_resp))
    }
}

fn build_request_body(req: &ChatRequest) -> serde_json::Value {
    let messages: Vec<serde_json::Value> = req
        .messages
        .iter()
        .map(|m| serde_json::json!({"role": m.role, "content": m.content}))
        .collect();

    let mut body = serde_json::json!({
        "model": req.model,
        "system": req.system,
        "messages": messages,
        "max_tokens": req.max_tokens,
    });

    if !req.tools.is_empty() {
        body["tools"] = serde_json::json!(req
            .tools
            .iter()
            .map(|t| serde_json::json!({
                "name": t.name,
                "description": t.description,
                "input_schema": t.input_schema,
            }))
            .collect::<Vec<_>>());
    }

    body
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text { text: String },
    ToolUse { name: String, input: serde_json::Value },
}

fn parse_response(resp: ApiResponse) -> ChatResponse {
    for block in resp.content {
        match block {
            ContentBlock::ToolUse { name, input } => {
                return ChatResponse::ToolCall(ToolCall { name, arguments: input });
            }
            ContentBlock::Text { text } => {
                if !text.trim().is_empty() {
                    return ChatResponse::Text(text);
                }
            }
        }
    }
    ChatResponse::Text(String::new())
}
