use serde::Deserialize;
use tracing::{debug, warn};

use crate::{error::ChannelError, types::OutboundMessage};

const GRAPH_API_VERSION: &str = "v19.0";

/// Meta's Send API is shared verbatim between Messenger and Instagram
/// Messaging (both ride the same `/me/messages` endpoint, keyed by the
/// page/IG-scoped access token passed in). Factored out so the two
/// adapters don't duplicate the request/response shape.
pub(crate) async fn send_message(
    client: &reqwest::Client,
    access_token: &str,
    msg: &OutboundMessage,
) -> Result<String, ChannelError> {
    let url = format!("https://graph.facebook.com/{GRAPH_API_VERSION}/me/messages");
    let body = build_send_body(msg);

    debug!(to = %msg.recipient_id, "sending Graph Send API message");

    let resp = client
        .post(&url)
        .query(&[("access_token", access_token)])
        .json(&body)
        .send()
        .await
        .map_err(|e| ChannelError::SendFailed(e.to_string()))?;

    if !resp.status().is_success() {
        let status = resp.status();
        let text = resp.text().await.unwrap_or_default();
        warn!(%status, body = %text, "Graph Send API rejected the message");
        return Err(ChannelError::SendFailed(format!("{status}: {text}")));
    }

    let parsed: SendResponse = resp
        .json()
        .await
        .map_err(|e| ChannelError::SendFailed(format!("malformed response: {e}")))?;

    Ok(parsed.message_id)
}

pub(crate) fn build_send_body(msg: &OutboundMessage) -> serde_json::Value {
    let message = match &msg.media_url {
        Some(url) => serde_json::json!({ "attachment": { "type": "image", "payload": { "url": url } } }),
        None => serde_json::json!({ "text": msg.text }),
    };

    serde_json::json!({
        "recipient": { "id": msg.recipient_id },
        "messaging_type": "RESPONSE",
        "message": message,
    })
}

#[derive(Debug, Deserialize)]
struct SendResponse {
    message_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ChannelKind, MessageFormat};

    #[test]
    fn text_message_builds_send_api_text_payload() {
        let msg = OutboundMessage {
            channel: ChannelKind::Messenger,
            recipient_id: "psid-1".to_string(),
            text: "hi there".to_string(),
            media_url: None,
            format: MessageFormat::PlainText,
        };
        let body = build_send_body(&msg);
        assert_eq!(body["message"]["text"], "hi there");
        assert_eq!(body["recipient"]["id"], "psid-1");
    }

    #[test]
    fn media_message_builds_send_api_attachment_payload() {
        let msg = OutboundMessage {
            channel: ChannelKind::Instagram,
            recipient_id: "igsid-1".to_string(),
            text: String::new(),
            media_url: Some("https://cdn.example/photo.jpg".to_string()),
            format: MessageFormat::PlainText,
        };
        let body = build_send_body(&msg);
        assert_eq!(body["message"]["attachment"]["type"], "image");
        assert_eq!(body["message"]["attachment"]["payload"]["url"], "https://cdn.example/photo.jpg");
    }
}
