//! Well-known real-time event/method names (§6 External Interfaces).

// handshake
pub const CONNECT: &str = "connect";

// client → server
pub const CHAT_SEND: &str = "chat:send";
pub const CHAT_MARK_READ: &str = "chat:mark-read";
pub const USER_TYPING: &str = "user:typing";
pub const AGENT_OPEN: &str = "agent:open";
pub const AGENT_CLOSE: &str = "agent:close";

// server → client
pub const CHAT_NEW_MESSAGE: &str = "chat:new-message";
pub const CHAT_DELIVERY: &str = "chat:delivery";
pub const AGENT_MESSAGE: &str = "agent:message";
pub const AGENT_SHOW_SLOT_PICKER: &str = "agent:show-slot-picker";
pub const USER_PRESENCE: &str = "user:presence";
