use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::{
    channel::Channel,
    error::ChannelError,
    types::{ChannelKind, ChannelStatus, OutboundMessage},
};

const GRAPH_API_VERSION: &str = "v19.0";

/// WhatsApp Cloud API adapter — Meta's hosted Business Platform endpoint.
/// Grounded on `AnthropicProvider`'s bearer-auth reqwest client shape,
/// generalized from the chat-completions endpoint to the Graph API's Send
/// Message endpoint.
pub struct WhatsAppCloudAdapter {
    client: reqwest::Client,
    phone_number_id: String,
    access_token: String,
    status: ChannelStatus,
}

impl WhatsAppCloudAdapter {
    pub fn new(phone_number_id: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            phone_number_id: phone_number_id.into(),
            access_token: access_token.into(),
            status: ChannelStatus::Disconnected,
        }
    }
}

#[async_trait]
impl Channel for WhatsAppCloudAdapter {
    fn name(&self) -> &str {
        "whatsapp_cloud"
    }

    fn kind(&self) -> ChannelKind {
        ChannelKind::WhatsAppCloud
    }

    async fn connect(&mut self) -> Result<(), ChannelError> {
        if self.access_token.is_empty() {
            return Err(ChannelError::ConfigError(
                "missing WhatsApp Cloud access token".to_string(),
            ));
        }
        self.status = ChannelStatus::Connected;
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), ChannelError> {
        self.status = ChannelStatus::Disconnected;
        Ok(())
    }

    async fn send(&self, msg: &OutboundMessage) -> Result<String, ChannelError> {
        let url = format!(
            "https://graph.facebook.com/{GRAPH_API_VERSION}/{}/messages",
            self.phone_number_id
        );
        let body = build_send_body(msg);

        debug!(to = %msg.recipient_id, "sending WhatsApp Cloud message");

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| ChannelError::SendFailed(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            warn!(%status, body = %text, "WhatsApp Cloud API rejected the message");
            return Err(ChannelError::SendFailed(format!("{status}: {text}")));
        }

        let parsed: SendResponse = resp
            .json()
            .await
            .map_err(|e| ChannelError::SendFailed(format!("malformed response: {e}")))?;

        parsed
            .messages
            .into_iter()
            .next()
            .map(|m| m.id)
            .ok_or_else(|| ChannelError::SendFailed("response carried no message id".to_string()))
    }

    fn status(&self) -> ChannelStatus {
        self.status.clone()
    }
}

fn build_send_body(msg: &OutboundMessage) -> serde_json::Value {
    match &msg.media_url {
        Some(url) => serde_json::json!({
            "messaging_product": "whatsapp",
            "to": msg.recipient_id,
            "type": "image",
            "image": { "link": url, "caption": msg.text },
        }),
        None => serde_json::json!({
            "messaging_product": "whatsapp",
            "to": msg.recipient_id,
            "type": "text",
            "text": { "body": msg.text },
        }),
    }
}

#[derive(Debug, Deserialize)]
struct SendResponse {
    messages: Vec<SendResponseMessage>,
}

#[derive(Debug, Deserialize)]
struct SendResponseMessage {
    id: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MessageFormat;

    #[test]
    fn text_message_builds_whatsapp_text_payload() {
        let msg = OutboundMessage {
            channel: ChannelKind::WhatsAppCloud,
            recipient_id: "15551234567".to_string(),
            text: "hello".to_string(),
            media_url: None,
            format: MessageFormat::PlainText,
        };
        let body = build_send_body(&msg);
        assert_eq!(body["type"], "text");
        assert_eq!(body["text"]["body"], "hello");
    }

    #[test]
    fn media_message_builds_whatsapp_image_payload() {
        let msg = OutboundMessage {
            channel: ChannelKind::WhatsAppCloud,
            recipient_id: "15551234567".to_string(),
            text: "caption".to_string(),
            media_url: Some("https://cdn.example/img.png".to_string()),
            format: MessageFormat::PlainText,
        };
        let body = build_send_body(&msg);
        assert_eq!(body["type"], "image");
        assert_eq!(body["image"]["link"], "https://cdn.example/img.png");
    }
}
