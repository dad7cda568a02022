//! Fallback `LlmProvider` used when no provider credential is configured.
//! Fails immediately so `Agent::respond`'s deadline/fallback-apology path
//! (§4.5) engages without ever reaching the network.

use async_trait::async_trait;
use relay_agents::{ChatRequest, ChatResponse, LlmProvider, ProviderError};

pub struct NullLlmProvider;

#[async_trait]
impl LlmProvider for NullLlmProvider {
    fn name(&self) -> &str {
        "none"
    }

    async fn send(&self, _req: &ChatRequest) -> Result<ChatResponse, ProviderError> {
        Err(ProviderError::Unavailable("no LLM provider configured".to_string()))
    }
}
