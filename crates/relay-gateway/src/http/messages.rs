//! GET/POST /v1/conversations/{peer}/messages, POST .../read, GET /v1/conversations.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    Json,
};
use chrono::{DateTime, Utc};
use relay_core::types::{MessageKind, UserId};
use relay_messages::{AttachmentRef, Message, MessagePage, NewMessage, PeerSummary};
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

use crate::app::AppState;
use crate::auth::authenticate;
use crate::error::ApiResult;
use crate::router::{self, RouterJob};

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub before: Option<String>,
    pub limit: Option<u32>,
}

/// GET /v1/conversations/{peer}/messages
pub async fn list_messages(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(peer): Path<String>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<MessagePage>> {
    let user_id = authenticate(&state, &headers)?;
    let conversation_id = state.messages.get_or_create_conversation(&user_id, &UserId::from(peer.as_str()))?;
    let before = query.before.map(|b| relay_core::types::MessageId::from(b.as_str()));
    let page = state.messages.get(&conversation_id, before.as_ref(), query.limit)?;
    Ok(Json(page))
}

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub text: Option<String>,
    #[serde(default)]
    pub kind: Option<String>,
    pub client_temp_id: Option<String>,
    pub attachment: Option<AttachmentRef>,
}

/// POST /v1/conversations/{peer}/messages — synchronous send: blocks until
/// the router worker has persisted the message, so the caller gets a real
/// id/status back in the response body.
pub async fn send_message(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(peer): Path<String>,
    Json(req): Json<SendMessageRequest>,
) -> ApiResult<Json<Message>> {
    let user_id = authenticate(&state, &headers)?;
    let conversation_id = state.messages.get_or_create_conversation(&user_id, &UserId::from(peer.as_str()))?;

    let kind = match req.kind.as_deref() {
        Some("image") => MessageKind::Image,
        Some("audio") => MessageKind::Audio,
        Some("file") => MessageKind::File,
        _ => MessageKind::Text,
    };

    let new_message = NewMessage {
        conversation_id,
        author: user_id,
        kind,
        text: req.text.unwrap_or_default(),
        attachment: req.attachment,
        agent_key: None,
        contact_id: None,
        client_temp_id: req.client_temp_id,
    };

    let (tx, rx) = oneshot::channel();
    router::dispatch(&state, RouterJob { new_message, respond_to: Some(tx) });
    let message = rx
        .await
        .map_err(|_| relay_core::RelayError::Internal("router worker dropped the response channel".to_string()))??;
    Ok(Json(message))
}

#[derive(Debug, Deserialize)]
pub struct MarkReadRequest {
    pub as_of: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct MarkReadResponse {
    pub advanced: usize,
}

/// POST /v1/conversations/{peer}/read
pub async fn mark_read(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(peer): Path<String>,
    Json(req): Json<MarkReadRequest>,
) -> ApiResult<Json<MarkReadResponse>> {
    let user_id = authenticate(&state, &headers)?;
    let conversation_id = state.messages.get_or_create_conversation(&user_id, &UserId::from(peer.as_str()))?;
    let advanced = state.messages.mark_conversation_read(&conversation_id, &user_id, req.as_of)?;
    for message_id in &advanced {
        state
            .presence
            .broadcast_delivery(&conversation_id, message_id, relay_core::types::DeliveryStatus::Read);
    }
    Ok(Json(MarkReadResponse { advanced: advanced.len() }))
}

/// GET /v1/conversations — per-peer inbox summary (§3a "conversations list").
pub async fn recent_conversations(State(state): State<Arc<AppState>>, headers: HeaderMap) -> ApiResult<Json<Vec<PeerSummary>>> {
    let user_id = authenticate(&state, &headers)?;
    let summaries = state.messages.recent_per_peer(&user_id)?;
    Ok(Json(summaries))
}
