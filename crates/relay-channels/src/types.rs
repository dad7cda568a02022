use relay_core::types::MessageKind;
use serde::{Deserialize, Serialize};

/// The four customer-facing channels a conversation can originate from (§1
/// "Customers reach the system through WhatsApp (Cloud API and
/// device-session), Instagram, Facebook Messenger, or a first-party web
/// client"). The web client talks to the gateway's WS surface directly and
/// has no adapter here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    WhatsAppCloud,
    WhatsAppDevice,
    Instagram,
    Messenger,
}

impl ChannelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelKind::WhatsAppCloud => "whatsapp_cloud",
            ChannelKind::WhatsAppDevice => "whatsapp_device",
            ChannelKind::Instagram => "instagram",
            ChannelKind::Messenger => "messenger",
        }
    }

    pub fn from_str_opt(s: &str) -> Option<Self> {
        match s {
            "whatsapp_cloud" => Some(ChannelKind::WhatsAppCloud),
            "whatsapp_device" => Some(ChannelKind::WhatsAppDevice),
            "instagram" => Some(ChannelKind::Instagram),
            "messenger" => Some(ChannelKind::Messenger),
            _ => None,
        }
    }
}

impl std::fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A message received from an external channel, normalized to a common
/// shape before it reaches the core (§6a "an inbound delivery pipeline that
/// calls the core with a normalized message shape").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedInbound {
    pub channel: ChannelKind,

    /// Provider-native message id (`wamid....`, Messenger `mid`, …). The
    /// core dedups re-delivery of the same provider-native id on this field.
    pub provider_message_id: String,

    /// Platform-native identifier for the sender (WhatsApp `wa_id`,
    /// Messenger/Instagram PSID, …).
    pub sender_external_id: String,

    pub sender_display_name: Option<String>,

    pub kind: MessageKind,

    pub text: String,

    pub media_url: Option<String>,

    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl NormalizedInbound {
    /// The idempotency token `relay-messages::MessageStore::append` keys its
    /// `client_temp_id` dedup on, scoped by channel so two providers can
    /// never collide on the same numeric id.
    pub fn dedup_token(&self) -> String {
        format!("{}:{}", self.channel.as_str(), self.provider_message_id)
    }
}

/// A message to be delivered to an external channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub channel: ChannelKind,

    /// Platform-native identifier for the recipient.
    pub recipient_id: String,

    pub text: String,

    pub media_url: Option<String>,

    pub format: MessageFormat,
}

/// Formatting hint for outbound message content.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageFormat {
    #[default]
    PlainText,
    Markdown,
}

/// Runtime connection state of a channel adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelStatus {
    Connected,
    Connecting,
    Disconnected,
    Error(String),
}
