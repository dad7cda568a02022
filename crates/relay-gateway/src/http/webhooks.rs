//! Webhook ingress — POST /webhooks/:source (§6 "webhook endpoints for
//! inbound WhatsApp/Instagram/Facebook"). Each configured source is
//! authenticated independently per its `auth_mode`, exactly as the
//! teacher's webhook endpoint does; the payload is then normalized through
//! `relay_channels::inbound` instead of forwarded to a single agent.

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use hmac::{Hmac, Mac};
use relay_channels::ChannelKind;
use relay_core::config::WebhookAuthMode;
use relay_core::types::{MessageKind, UserId};
use relay_messages::NewMessage;
use serde_json::{json, Value};
use sha2::Sha256;
use std::sync::Arc;
use tracing::{info, warn};

use crate::app::AppState;
use crate::router::{self, RouterJob, SYSTEM_USER_ID};

type HmacSha256 = Hmac<Sha256>;

/// POST /webhooks/:source
pub async fn webhook_handler(
    State(state): State<Arc<AppState>>,
    Path(source): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let cfg = &state.config.webhooks;

    if !cfg.enabled {
        warn!(source = %source, "webhook received but the subsystem is disabled");
        return Err((StatusCode::NOT_FOUND, Json(json!({"error": "webhook subsystem is disabled"}))));
    }

    let source_cfg = cfg.sources.iter().find(|s| s.name == source).ok_or_else(|| {
        warn!(source = %source, "unknown webhook source");
        (StatusCode::NOT_FOUND, Json(json!({"error": "unknown webhook source"})))
    })?;

    info!(source = %source, bytes = body.len(), "webhook arrived");

    match &source_cfg.auth_mode {
        WebhookAuthMode::HmacSha256 => {
            verify_hmac_sha256(&headers, &body, source_cfg.secret.as_deref()).map_err(|e| auth_error(&e))?;
        }
        WebhookAuthMode::BearerToken => {
            verify_bearer_token(&headers, source_cfg.secret.as_deref()).map_err(|e| auth_error(&e))?;
        }
        WebhookAuthMode::None => {}
    }

    let payload: Value = serde_json::from_slice(&body).map_err(|e| {
        warn!(source = %source, error = %e, "invalid JSON in webhook body");
        (StatusCode::BAD_REQUEST, Json(json!({"error": "invalid JSON body"})))
    })?;

    let accepted = normalize_and_route(&state, &source, &payload).await;

    Ok(Json(json!({"ok": true, "accepted": accepted})))
}

/// Parse every inbound message the payload carries (there may be several,
/// or none — delivery receipts normalize to zero) and hand each to the
/// router as a fully-resolved customer message.
async fn normalize_and_route(state: &Arc<AppState>, source: &str, payload: &Value) -> usize {
    let inbounds = match source {
        "whatsapp_cloud" | "whatsapp" => relay_channels::parse_whatsapp_cloud_webhook(payload),
        "instagram" => relay_channels::parse_messaging_webhook(payload, ChannelKind::Instagram),
        "messenger" => relay_channels::parse_messaging_webhook(payload, ChannelKind::Messenger),
        "whatsapp_device" => relay_channels::parse_whatsapp_device_event(payload).into_iter().collect(),
        other => {
            warn!(source = %other, "webhook source has no normalization rule");
            Vec::new()
        }
    };

    let mut accepted = 0;
    for inbound in inbounds {
        let resolved = state.contacts.resolve(
            inbound.channel.as_str(),
            &inbound.sender_external_id,
            inbound.sender_display_name.as_deref().unwrap_or(""),
        );
        let customer = match resolved {
            Ok(contact) => contact.user().id.clone(),
            Err(err) => {
                warn!(%err, source, "failed to resolve webhook sender to a contact");
                continue;
            }
        };

        let conversation_id = match state.messages.get_or_create_conversation(&customer, &UserId::from(SYSTEM_USER_ID)) {
            Ok(id) => id,
            Err(err) => {
                warn!(%err, source, "failed to resolve conversation for webhook sender");
                continue;
            }
        };

        let new_message = NewMessage {
            conversation_id,
            author: customer,
            kind: inbound.kind,
            text: inbound.text,
            attachment: inbound.media_url.map(|url| relay_messages::AttachmentRef {
                bucket: "external".to_string(),
                key: url,
                filename: "attachment".to_string(),
                mime_type: default_mime(inbound.kind),
            }),
            agent_key: None,
            contact_id: None,
            client_temp_id: Some(inbound.dedup_token()),
        };

        router::dispatch(state, RouterJob { new_message, respond_to: None });
        accepted += 1;
    }
    accepted
}

fn default_mime(kind: MessageKind) -> String {
    match kind {
        MessageKind::Image => "image/jpeg",
        MessageKind::Audio => "audio/ogg",
        _ => "application/octet-stream",
    }
    .to_string()
}

fn verify_hmac_sha256(headers: &HeaderMap, body: &Bytes, secret: Option<&str>) -> Result<(), String> {
    let secret = secret.ok_or_else(|| "no HMAC secret configured for this source".to_string())?;

    let sig_header = headers
        .get("x-hub-signature-256")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| "missing X-Hub-Signature-256 header".to_string())?;

    let sig_hex = sig_header.strip_prefix("sha256=").ok_or_else(|| "malformed X-Hub-Signature-256 header".to_string())?;
    let expected = hex::decode(sig_hex).map_err(|_| "X-Hub-Signature-256 is not valid hex".to_string())?;

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| "invalid HMAC key length".to_string())?;
    mac.update(body);
    mac.verify_slice(&expected).map_err(|_| "HMAC signature mismatch".to_string())
}

fn verify_bearer_token(headers: &HeaderMap, secret: Option<&str>) -> Result<(), String> {
    let expected = secret.ok_or_else(|| "no bearer token configured for this source".to_string())?;
    let auth_header = headers.get("authorization").and_then(|v| v.to_str().ok()).ok_or_else(|| "missing Authorization header".to_string())?;
    let token = auth_header.strip_prefix("Bearer ").ok_or_else(|| "Authorization header must use Bearer scheme".to_string())?;
    if token == expected {
        Ok(())
    } else {
        Err("bearer token mismatch".to_string())
    }
}

fn auth_error(reason: &str) -> (StatusCode, Json<Value>) {
    warn!(reason = %reason, "webhook authentication failed");
    (StatusCode::UNAUTHORIZED, Json(json!({"error": "authentication failed", "reason": reason})))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn signed(secret: &str, body: &[u8]) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(body);
        format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
    }

    #[test]
    fn hmac_verification_accepts_a_correctly_signed_body() {
        let body = Bytes::from_static(b"{\"entry\":[]}");
        let mut headers = HeaderMap::new();
        headers.insert("x-hub-signature-256", HeaderValue::from_str(&signed("s3cret", &body)).unwrap());
        assert!(verify_hmac_sha256(&headers, &body, Some("s3cret")).is_ok());
    }

    #[test]
    fn hmac_verification_rejects_a_tampered_body() {
        let body = Bytes::from_static(b"{\"entry\":[]}");
        let mut headers = HeaderMap::new();
        headers.insert("x-hub-signature-256", HeaderValue::from_str(&signed("s3cret", b"{\"entry\":[1]}")).unwrap());
        assert!(verify_hmac_sha256(&headers, &body, Some("s3cret")).is_err());
    }

    #[test]
    fn hmac_verification_rejects_a_missing_header() {
        let body = Bytes::from_static(b"{}");
        assert!(verify_hmac_sha256(&HeaderMap::new(), &body, Some("s3cret")).is_err());
    }

    #[test]
    fn bearer_verification_accepts_the_configured_token() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Bearer topsecret"));
        assert!(verify_bearer_token(&headers, Some("topsecret")).is_ok());
    }

    #[test]
    fn bearer_verification_rejects_a_wrong_token() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Bearer wrong"));
        assert!(verify_bearer_token(&headers, Some("topsecret")).is_err());
    }

    #[test]
    fn default_mime_maps_image_and_audio_distinctly() {
        assert_eq!(default_mime(MessageKind::Image), "image/jpeg");
        assert_eq!(default_mime(MessageKind::Audio), "audio/ogg");
        assert_eq!(default_mime(MessageKind::File), "application/octet-stream");
    }
}
