//! Typed payload shapes for the real-time event surface (§6). Each event and
//! HTTP body is a named record with documented required/optional fields —
//! the core never speaks in ad-hoc JSON (§9 redesign note).

use serde::{Deserialize, Serialize};

/// `chat:send` — client submits a new message.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatSendParams {
    pub text: Option<String>,
    #[serde(default)]
    pub kind: Option<String>,
    pub temp_id: String,
    pub contact_id: Option<String>,
    pub attachment: Option<AttachmentRef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttachmentRef {
    pub bucket: String,
    pub key: String,
    pub filename: String,
    pub mime_type: String,
}

/// `chat:mark-read` — bulk advance the read cursor.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatMarkReadParams {
    pub conversation_id: String,
    pub as_of: Option<String>,
}

/// `user:typing` — transient, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserTypingParams {
    pub conversation_id: String,
    pub is_typing: bool,
}

/// `agent:open` / `agent:close` — subscribe/unsubscribe an agent panel room.
#[derive(Debug, Clone, Deserialize)]
pub struct AgentPanelParams {
    pub agent_key: String,
    pub contact_id: Option<String>,
}

/// `chat:new-message` — server echo of a persisted message.
#[derive(Debug, Clone, Serialize)]
pub struct ChatNewMessageEvent {
    pub id: String,
    pub author: String,
    pub conversation_id: String,
    pub timestamp: String,
    pub status: String,
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attachment: Option<AttachmentRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_key: Option<String>,
}

/// `chat:delivery` — a delivery-status transition.
#[derive(Debug, Clone, Serialize)]
pub struct ChatDeliveryEvent {
    pub message_id: String,
    pub status: String,
}

/// `agent:message` — delivered only to the matching agent-panel subscribers.
#[derive(Debug, Clone, Serialize)]
pub struct AgentMessageEvent {
    pub agent_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact_id: Option<String>,
    pub id: String,
    pub author: String,
    pub text: String,
    pub timestamp: String,
}

/// `agent:show-slot-picker` — open the customer-facing slot picker UI.
#[derive(Debug, Clone, Serialize)]
pub struct ShowSlotPickerEvent {
    pub agent_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_phone: Option<String>,
    pub working_days: Vec<String>,
    pub working_hours: (u32, u32),
    pub default_duration_minutes: u32,
}

/// `user:presence` — online/offline/typing state for a user.
#[derive(Debug, Clone, Serialize)]
pub struct UserPresenceEvent {
    pub user_id: String,
    pub state: String,
}
