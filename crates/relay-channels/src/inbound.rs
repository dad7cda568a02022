use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;
use tracing::warn;

use crate::types::{ChannelKind, NormalizedInbound};
use relay_core::types::MessageKind;

/// Normalize a WhatsApp Cloud API webhook body (`entry[].changes[].value`)
/// into zero or more [`NormalizedInbound`] messages. Malformed entries are
/// logged and skipped rather than failing the whole webhook (§7 channel
/// failures are absorbed, never surfaced to the customer).
pub fn parse_whatsapp_cloud_webhook(body: &Value) -> Vec<NormalizedInbound> {
    let mut out = Vec::new();
    for entry in body["entry"].as_array().into_iter().flatten() {
        for change in entry["changes"].as_array().into_iter().flatten() {
            let value = &change["value"];
            let contacts = value["contacts"].as_array().cloned().unwrap_or_default();
            for message in value["messages"].as_array().into_iter().flatten() {
                let Some(from) = message["from"].as_str() else {
                    warn!("whatsapp cloud webhook message missing 'from'");
                    continue;
                };
                let Some(id) = message["id"].as_str() else {
                    warn!("whatsapp cloud webhook message missing 'id'");
                    continue;
                };

                let display_name = contacts
                    .iter()
                    .find(|c| c["wa_id"].as_str() == Some(from))
                    .and_then(|c| c["profile"]["name"].as_str())
                    .map(str::to_string);

                let (kind, text, media_url) = match message["type"].as_str() {
                    Some("text") => (MessageKind::Text, message["text"]["body"].as_str().unwrap_or_default().to_string(), None),
                    Some("image") => (MessageKind::Image, message["image"]["caption"].as_str().unwrap_or_default().to_string(), message["image"]["link"].as_str().map(str::to_string)),
                    Some("audio") => (MessageKind::Audio, String::new(), message["audio"]["link"].as_str().map(str::to_string)),
                    Some("document") => (MessageKind::File, message["document"]["caption"].as_str().unwrap_or_default().to_string(), message["document"]["link"].as_str().map(str::to_string)),
                    other => {
                        warn!(kind = ?other, "whatsapp cloud webhook message has an unrecognized type");
                        continue;
                    }
                };

                let timestamp = message["timestamp"]
                    .as_str()
                    .and_then(|s| s.parse::<i64>().ok())
                    .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
                    .unwrap_or_else(Utc::now);

                out.push(NormalizedInbound {
                    channel: ChannelKind::WhatsAppCloud,
                    provider_message_id: id.to_string(),
                    sender_external_id: from.to_string(),
                    sender_display_name: display_name,
                    kind,
                    text,
                    media_url,
                    timestamp,
                });
            }
        }
    }
    out
}

/// Normalize a Messenger or Instagram webhook body (`entry[].messaging[]`
/// — the two platforms share this shape because Instagram DMs ride the
/// same Messenger Platform infrastructure).
pub fn parse_messaging_webhook(body: &Value, channel: ChannelKind) -> Vec<NormalizedInbound> {
    let mut out = Vec::new();
    for entry in body["entry"].as_array().into_iter().flatten() {
        for event in entry["messaging"].as_array().into_iter().flatten() {
            let Some(sender) = event["sender"]["id"].as_str() else {
                warn!(channel = %channel, "messaging webhook event missing sender id");
                continue;
            };
            let message = &event["message"];
            let Some(mid) = message["mid"].as_str() else {
                // Delivery/read receipts and postbacks have no `message` block; not an error.
                continue;
            };

            let (kind, media_url) = message["attachments"]
                .as_array()
                .and_then(|atts| atts.first())
                .map(|att| {
                    let media_kind = match att["type"].as_str() {
                        Some("image") => MessageKind::Image,
                        Some("audio") => MessageKind::Audio,
                        _ => MessageKind::File,
                    };
                    (media_kind, att["payload"]["url"].as_str().map(str::to_string))
                })
                .unwrap_or((MessageKind::Text, None));

            let text = message["text"].as_str().unwrap_or_default().to_string();

            let timestamp: DateTime<Utc> = event["timestamp"]
                .as_i64()
                .and_then(|millis| Utc.timestamp_millis_opt(millis).single())
                .unwrap_or_else(Utc::now);

            out.push(NormalizedInbound {
                channel,
                provider_message_id: mid.to_string(),
                sender_external_id: sender.to_string(),
                sender_display_name: None,
                kind,
                text,
                media_url,
                timestamp,
            });
        }
    }
    out
}

/// Normalize a push event from the WhatsApp device-session pairing bridge:
/// `{"from", "id", "type", "text", "timestamp"}`.
pub fn parse_whatsapp_device_event(body: &Value) -> Option<NormalizedInbound> {
    let from = body["from"].as_str()?;
    let id = body["id"].as_str()?;
    let text = body["text"].as_str().unwrap_or_default().to_string();
    let timestamp = body["timestamp"]
        .as_i64()
        .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
        .unwrap_or_else(Utc::now);

    Some(NormalizedInbound {
        channel: ChannelKind::WhatsAppDevice,
        provider_message_id: id.to_string(),
        sender_external_id: from.to_string(),
        sender_display_name: None,
        kind: MessageKind::Text,
        text,
        media_url: None,
        timestamp,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn whatsapp_cloud_text_message_is_normalized() {
        let body = json!({
            "entry": [{
                "changes": [{
                    "value": {
                        "contacts": [{"profile": {"name": "Ana"}, "wa_id": "15551234567"}],
                        "messages": [{
                            "from": "15551234567",
                            "id": "wamid.ABC123",
                            "timestamp": "1690000000",
                            "type": "text",
                            "text": {"body": "hello"}
                        }]
                    }
                }]
            }]
        });
        let msgs = parse_whatsapp_cloud_webhook(&body);
        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0].provider_message_id, "wamid.ABC123");
        assert_eq!(msgs[0].sender_display_name.as_deref(), Some("Ana"));
        assert_eq!(msgs[0].text, "hello");
    }

    #[test]
    fn whatsapp_cloud_skips_unrecognized_message_types() {
        let body = json!({
            "entry": [{"changes": [{"value": {"messages": [{"from": "1", "id": "m1", "type": "sticker"}]}}]}]
        });
        assert!(parse_whatsapp_cloud_webhook(&body).is_empty());
    }

    #[test]
    fn messenger_text_message_is_normalized() {
        let body = json!({
            "entry": [{
                "messaging": [{
                    "sender": {"id": "psid-1"},
                    "recipient": {"id": "page-1"},
                    "timestamp": 1_690_000_000_000_i64,
                    "message": {"mid": "mid.1", "text": "hi"}
                }]
            }]
        });
        let msgs = parse_messaging_webhook(&body, ChannelKind::Messenger);
        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0].channel, ChannelKind::Messenger);
        assert_eq!(msgs[0].sender_external_id, "psid-1");
    }

    #[test]
    fn messenger_delivery_receipt_without_message_is_skipped() {
        let body = json!({
            "entry": [{"messaging": [{"sender": {"id": "psid-1"}, "delivery": {"mids": ["mid.1"]}}]}]
        });
        assert!(parse_messaging_webhook(&body, ChannelKind::Messenger).is_empty());
    }

    #[test]
    fn device_session_event_is_normalized() {
        let body = json!({"from": "15551234567", "id": "dev-1", "text": "hey", "timestamp": 1_690_000_000_i64});
        let msg = parse_whatsapp_device_event(&body).unwrap();
        assert_eq!(msg.channel, ChannelKind::WhatsAppDevice);
        assert_eq!(msg.provider_message_id, "dev-1");
    }
}
