use std::time::Duration;

use relay_core::types::AgentKey;
use tracing::warn;

use crate::llm::{ChatRequest, LlmProvider, Message, Role, ToolCall, ToolDefinition};
use crate::registry::CustomAgentRow;

/// A built-in agent kind (§4.8 router addressing: "scheduling → SDR, legal
/// → legal specialist"). Hard-coded prompts and policies, per §4.5.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltInKind {
    Concierge,
    Sdr,
    Legal,
    TechnicalSupport,
}

impl BuiltInKind {
    pub fn agent_key(&self) -> AgentKey {
        AgentKey::new(match self {
            BuiltInKind::Concierge => "concierge",
            BuiltInKind::Sdr => "sdr",
            BuiltInKind::Legal => "legal",
            BuiltInKind::TechnicalSupport => "support",
        })
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            BuiltInKind::Concierge => "Concierge",
            BuiltInKind::Sdr => "Scheduling",
            BuiltInKind::Legal => "Legal",
            BuiltInKind::TechnicalSupport => "Technical Support",
        }
    }

    fn system_prompt(&self) -> &'static str {
        match self {
            BuiltInKind::Concierge => {
                "You are the default concierge for a customer conversation platform. \
                 Greet warmly, answer general questions, and route to a specialist when needed."
            }
            BuiltInKind::Sdr => {
                "You are a scheduling assistant. Help the customer find and book a meeting \
                 slot. When the customer has chosen a slot, call the schedule_meeting tool."
            }
            BuiltInKind::Legal => {
                "You are a legal intake specialist. Answer general contract and compliance \
                 questions; never give binding legal advice, and recommend human review for \
                 anything contractual."
            }
            BuiltInKind::TechnicalSupport => {
                "You are a technical support specialist. Help the customer diagnose and \
                 resolve product issues; recommend a human handover for anything requiring \
                 account-level changes."
            }
        }
    }
}

/// Policy knobs for a built-in agent (§4.5, §9 Open Question #1: the SDR
/// agent's `auto_commit` flag is a per-(tenant, agent) setting read from
/// this config, not per-conversation).
#[derive(Debug, Clone)]
pub struct BuiltInConfig {
    pub model: String,
    pub max_tokens: u32,
    /// Only meaningful for `BuiltInKind::Sdr`: when true, a confirmed slot
    /// commits to the calendar without an extra confirmation round-trip.
    pub auto_commit: bool,
}

/// §4.5 redesign note: `Agent::BuiltIn(..) | Agent::Custom(..)` sum type
/// rather than a duck-typed trait object — every caller pattern-matches the
/// two concrete shapes instead of routing through dynamic dispatch.
pub enum Agent {
    BuiltIn(BuiltInKind, BuiltInConfig),
    Custom(CustomAgentRow),
}

/// Either a plain text reply or a tool invocation (§4.5).
#[derive(Debug, Clone)]
pub enum AgentReply {
    Text(String),
    Tool(ToolCall),
}

const FALLBACK_APOLOGY: &str =
    "Sorry, I'm having trouble responding right now. A team member will follow up shortly.";

impl Agent {
    pub fn key(&self) -> AgentKey {
        match self {
            Agent::BuiltIn(kind, _) => kind.agent_key(),
            Agent::Custom(row) => AgentKey::new(row.key.clone()),
        }
    }

    pub fn display_name(&self) -> String {
        match self {
            Agent::BuiltIn(kind, _) => kind.display_name().to_string(),
            Agent::Custom(row) => row.display_name.clone(),
        }
    }

    /// §4.7 `auto_commit` vs `require_operator_ok`, read from this agent's
    /// own config row rather than any deployment-wide default. Custom agents
    /// carry no scheduling policy of their own and always require operator
    /// confirmation.
    pub fn auto_commit(&self) -> bool {
        match self {
            Agent::BuiltIn(_, config) => config.auto_commit,
            Agent::Custom(_) => false,
        }
    }

    /// respond(conversationHistory, userMessage, extractedEntities, toolbelt)
    /// → agentReply (§4.5). Bounded by `deadline`; on any provider error or
    /// deadline elapse, returns a fallback apology — provider errors never
    /// reach the customer.
    pub async fn respond(
        &self,
        provider: &dyn LlmProvider,
        history: &[Message],
        user_message: &str,
        extracted_entities_summary: &str,
        toolbelt: &[ToolDefinition],
        deadline: Duration,
    ) -> AgentReply {
        let (system, model, max_tokens) = match self {
            Agent::BuiltIn(kind, config) => {
                (kind.system_prompt().to_string(), config.model.clone(), config.max_tokens)
            }
            Agent::Custom(row) => (row.system_prompt.clone(), row.provider_label.clone(), 1024),
        };

        let mut messages = history.to_vec();
        let mut content = user_message.to_string();
        if !extracted_entities_summary.is_empty() {
            content.push_str("\n\n[entities] ");
            content.push_str(extracted_entities_summary);
        }
        messages.push(Message { role: Role::User, content });

        let tools = match self {
            Agent::BuiltIn(BuiltInKind::Sdr, _) => toolbelt.to_vec(),
            Agent::Custom(row) => toolbelt
                .iter()
                .filter(|t| row.allowed_tools.iter().any(|name| name == &t.name))
                .cloned()
                .collect(),
            _ => Vec::new(),
        };

        let request = ChatRequest {
            model,
            system,
            messages,
            max_tokens,
            tools,
        };

        match tokio::time::timeout(deadline, provider.send(&request)).await {
            Ok(Ok(crate::llm::ChatResponse::Text(text))) => AgentReply::Text(text),
            Ok(Ok(crate::llm::ChatResponse::ToolCall(call))) => AgentReply::Tool(call),
            Ok(Err(err)) => {
                warn!(agent = %self.key(), %err, "agent invocation failed");
                AgentReply::Text(FALLBACK_APOLOGY.to_string())
            }
            Err(_) => {
                warn!(agent = %self.key(), "agent invocation deadline elapsed");
                AgentReply::Text(FALLBACK_APOLOGY.to_string())
            }
        }
    }
}

pub fn schedule_meeting_tool() -> ToolDefinition {
    ToolDefinition {
        name: "schedule_meeting".to_string(),
        description: "Propose or confirm a calendar meeting slot with the customer.".to_string(),
        input_schema: serde_json::json!({
            "type": "object",
            "properties": {
                "customer_email": {"type": "string"},
                "customer_phone": {"type": "string"},
                "start": {"type": "string", "description": "ISO-8601 start time"},
                "duration_minutes": {"type": "integer"},
            },
            "required": ["start", "duration_minutes"],
        }),
    }
}

pub fn fetch_availability_tool() -> ToolDefinition {
    ToolDefinition {
        name: "fetch_availability".to_string(),
        description: "Fetch available calendar slots for a given date.".to_string(),
        input_schema: serde_json::json!({
            "type": "object",
            "properties": {
                "date": {"type": "string", "description": "ISO-8601 date"},
                "duration_minutes": {"type": "integer"},
            },
            "required": ["date"],
        }),
    }
}
