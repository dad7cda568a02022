use relay_core::types::{AgentKey, ConversationId, DeliveryStatus, MessageKind, MessageId, UserId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttachmentRef {
    pub bucket: String,
    pub key: String,
    pub filename: String,
    pub mime_type: String,
}

/// A canonicalized {userA, userB} or {user, externalContact} pair (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: ConversationId,
    pub participant_a: UserId,
    pub participant_b: UserId,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// A message as submitted by a caller, before the store assigns id/timestamp.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub conversation_id: ConversationId,
    pub author: UserId,
    pub kind: MessageKind,
    pub text: String,
    pub attachment: Option<AttachmentRef>,
    pub agent_key: Option<AgentKey>,
    pub contact_id: Option<ConversationId>,
    pub client_temp_id: Option<String>,
}

/// The canonical, persisted form of a Message (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub conversation_id: ConversationId,
    pub author: UserId,
    pub kind: MessageKind,
    pub text: String,
    pub attachment: Option<AttachmentRef>,
    pub status: DeliveryStatus,
    pub agent_key: Option<AgentKey>,
    pub contact_id: Option<ConversationId>,
    pub client_temp_id: Option<String>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// A page of messages returned by `get`, plus the cursor for the next page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagePage {
    pub messages: Vec<Message>,
    pub next_before: Option<MessageId>,
}

/// Summary row for the contact list view (`recent_per_peer`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerSummary {
    pub peer: UserId,
    pub conversation_id: ConversationId,
    pub last_message: Message,
    pub unread_count: u64,
}
