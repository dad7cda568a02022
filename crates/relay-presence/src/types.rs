use relay_core::types::{AgentKey, ConversationId, UserId};
use serde::{Deserialize, Serialize};

/// The set of rooms a connection can belong to (§4.2).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RoomKey {
    /// All connections with an open view of this conversation's timeline.
    Conversation(ConversationId),
    /// Private room for every connection of one user — used for cross-device
    /// echo and for events that are not conversation-scoped.
    User(UserId),
    /// One user's open panel for one agent, scoped further by the optional
    /// external-contact context the panel is viewing.
    AgentPanel(UserId, AgentKey),
}

/// Presence states broadcast via `broadcast_presence` (§4.2). `Typing` is
/// transient and must never be persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresenceState {
    Typing,
    Online,
    Offline,
}
