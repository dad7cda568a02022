pub mod agent;
pub mod error;
pub mod llm;
pub mod llm_anthropic;
pub mod registry;

pub use agent::{Agent, AgentReply, BuiltInConfig, BuiltInKind};
pub use error::AgentError;
pub use llm::{ChatRequest, ChatResponse, LlmProvider, Message, ProviderError, Role, ToolCall, ToolDefinition};
pub use llm_anthropic::AnthropicProvider;
pub use registry::{AgentStore, CustomAgentRow, NewCustomAgent};

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::time::Duration;

    struct EchoProvider;

    #[async_trait]
    impl LlmProvider for EchoProvider {
        fn name(&self) -> &str {
            "echo"
        }

        async fn send(&self, req: &ChatRequest) -> Result<ChatResponse, ProviderError> {
            let last = req.messages.last().map(|m| m.content.clone()).unwrap_or_default();
            Ok(ChatResponse::Text(format!("echo: {last}")))
        }
    }

    struct FailingProvider;

    #[async_trait]
    impl LlmProvider for FailingProvider {
        fn name(&self) -> &str {
            "failing"
        }

        async fn send(&self, _req: &ChatRequest) -> Result<ChatResponse, ProviderError> {
            Err(ProviderError::Unavailable("down for maintenance".to_string()))
        }
    }

    struct StallingProvider;

    #[async_trait]
    impl LlmProvider for StallingProvider {
        fn name(&self) -> &str {
            "stalling"
        }

        async fn send(&self, _req: &ChatRequest) -> Result<ChatResponse, ProviderError> {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok(ChatResponse::Text("too late".to_string()))
        }
    }

    fn concierge() -> Agent {
        Agent::BuiltIn(
            BuiltInKind::Concierge,
            BuiltInConfig { model: "claude-3-5-sonnet".to_string(), max_tokens: 512, auto_commit: false },
        )
    }

    #[tokio::test]
    async fn built_in_agent_echoes_through_provider() {
        let agent = concierge();
        let reply = agent
            .respond(&EchoProvider, &[], "hello there", "", &[], Duration::from_secs(5))
            .await;
        match reply {
            AgentReply::Text(text) => assert!(text.contains("hello there")),
            AgentReply::Tool(_) => panic!("expected text reply"),
        }
    }

    #[tokio::test]
    async fn provider_error_becomes_fallback_apology() {
        let agent = concierge();
        let reply = agent
            .respond(&FailingProvider, &[], "hello", "", &[], Duration::from_secs(5))
            .await;
        match reply {
            AgentReply::Text(text) => assert!(text.to_lowercase().contains("trouble")),
            AgentReply::Tool(_) => panic!("expected text reply"),
        }
    }

    #[tokio::test]
    async fn deadline_elapsed_becomes_fallback_apology() {
        let agent = concierge();
        let reply = agent
            .respond(&StallingProvider, &[], "hello", "", &[], Duration::from_millis(20))
            .await;
        match reply {
            AgentReply::Text(text) => assert!(text.to_lowercase().contains("trouble")),
            AgentReply::Tool(_) => panic!("expected text reply"),
        }
    }

    #[tokio::test]
    async fn sdr_agent_carries_toolbelt_custom_agent_filters_it() {
        let sdr = Agent::BuiltIn(
            BuiltInKind::Sdr,
            BuiltInConfig { model: "claude-3-5-sonnet".to_string(), max_tokens: 512, auto_commit: true },
        );
        let toolbelt = vec![agent::schedule_meeting_tool(), agent::fetch_availability_tool()];

        struct CapturingProvider;
        #[async_trait]
        impl LlmProvider for CapturingProvider {
            fn name(&self) -> &str {
                "capturing"
            }
            async fn send(&self, req: &ChatRequest) -> Result<ChatResponse, ProviderError> {
                Ok(ChatResponse::Text(format!("tools:{}", req.tools.len())))
            }
        }

        let reply = sdr
            .respond(&CapturingProvider, &[], "book a slot", "", &toolbelt, Duration::from_secs(5))
            .await;
        match reply {
            AgentReply::Text(text) => assert_eq!(text, "tools:2"),
            AgentReply::Tool(_) => panic!("expected text reply"),
        }

        let custom = Agent::Custom(CustomAgentRow {
            key: "billing".to_string(),
            display_name: "Billing Bot".to_string(),
            emoji: "💳".to_string(),
            system_prompt: "help with billing".to_string(),
            allowed_tools: vec!["fetch_availability".to_string()],
            credential_handle: "cred".to_string(),
            provider_label: "anthropic".to_string(),
            created_at: chrono::Utc::now(),
        });
        let reply = custom
            .respond(&CapturingProvider, &[], "what slots are open", "", &toolbelt, Duration::from_secs(5))
            .await;
        match reply {
            AgentReply::Text(text) => assert_eq!(text, "tools:1"),
            AgentReply::Tool(_) => panic!("expected text reply"),
        }
    }
}
