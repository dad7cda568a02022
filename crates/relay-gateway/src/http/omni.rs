//! GET /v1/channels, POST /v1/omni/send (§6 "POST /omni/send", §6a).

use std::sync::Arc;

use axum::{extract::State, http::HeaderMap, Json};
use relay_channels::{ChannelKind, MessageFormat, OutboundMessage};
use relay_core::{types::MessageKind, RelayError};
use relay_messages::NewMessage;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::app::AppState;
use crate::auth::authenticate_user;
use crate::error::ApiResult;

/// GET /v1/channels — adapter connection status for the operator console,
/// the same data `health_handler` folds into the liveness probe but
/// exposed on its own for the channel-admin panel.
pub async fn channel_statuses(State(state): State<Arc<AppState>>, headers: HeaderMap) -> ApiResult<Json<Vec<Value>>> {
    authenticate_user(&state, &headers)?;
    let statuses = state
        .channels
        .statuses()
        .into_iter()
        .map(|(name, status)| json!({ "name": name, "status": status }))
        .collect();
    Ok(Json(statuses))
}

#[derive(Debug, Deserialize)]
pub struct SendRequest {
    pub channel: String,
    pub recipient: String,
    pub text: String,
    /// Device-session selector for the WhatsApp device-session variant;
    /// accepted for wire compatibility, unused until that adapter supports
    /// more than one paired session.
    #[serde(default)]
    #[allow(dead_code)]
    pub session: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SendResponse {
    pub provider_message_id: String,
    pub message_id: String,
}

/// POST /v1/omni/send — an operator-initiated proactive send, not a reply
/// to an inbound message. Grounded on `router::dispatch_to_channel`'s
/// adapter lookup and `OutboundMessage` construction; unlike that path
/// (which only logs delivery failure for an already-persisted agent
/// reply), a failed adapter send here is reported directly to the caller
/// and nothing is persisted.
pub async fn send(State(state): State<Arc<AppState>>, headers: HeaderMap, Json(req): Json<SendRequest>) -> ApiResult<Json<SendResponse>> {
    authenticate_user(&state, &headers)?;

    let kind = ChannelKind::from_str_opt(&req.channel).ok_or_else(|| RelayError::Invalid(format!("unknown channel '{}'", req.channel)))?;
    let adapter = state
        .channels
        .get(kind.as_str())
        .ok_or_else(|| RelayError::Unavailable(format!("no adapter registered for channel '{}'", req.channel)))?;

    let outbound = OutboundMessage {
        channel: kind,
        recipient_id: req.recipient.clone(),
        text: req.text.clone(),
        media_url: None,
        format: MessageFormat::PlainText,
    };
    let provider_message_id = adapter
        .send(&outbound)
        .await
        .map_err(|e| RelayError::Unavailable(format!("channel send failed: {e}")))?;

    let contact = state.contacts.resolve(kind.as_str(), &req.recipient, "")?;
    let customer = contact.user().id.clone();
    let conversation_id = state.messages.get_or_create_conversation(&customer, &relay_core::types::UserId::from(crate::router::SYSTEM_USER_ID))?;

    let message = state.messages.append(NewMessage {
        conversation_id,
        author: relay_core::types::UserId::from(crate::router::SYSTEM_USER_ID),
        kind: MessageKind::Text,
        text: req.text,
        attachment: None,
        agent_key: None,
        contact_id: None,
        client_temp_id: Some(format!("omni-send:{}:{provider_message_id}", req.channel)),
    })?;
    state.presence.broadcast_message(&message, None);

    Ok(Json(SendResponse { provider_message_id, message_id: message.id.as_str().to_string() }))
}
