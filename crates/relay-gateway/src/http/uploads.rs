//! POST /v1/uploads/grant, POST /v1/uploads/confirm (§3a attachments).

use std::sync::Arc;

use axum::{extract::State, http::HeaderMap, Json};
use relay_core::types::{AgentKey, ConversationId};
use relay_uploads::{ReadCredential, WriteCredential};
use serde::{Deserialize, Serialize};

use crate::app::AppState;
use crate::auth::authenticate;
use crate::error::ApiResult;

#[derive(Debug, Deserialize)]
pub struct GrantRequest {
    pub filename: String,
    pub mime_type: String,
    pub declared_size: u64,
}

/// POST /v1/uploads/grant — mint a time-bounded, size/mime-bounded write
/// credential the client uploads the raw bytes to directly.
pub async fn grant(State(state): State<Arc<AppState>>, headers: HeaderMap, Json(req): Json<GrantRequest>) -> ApiResult<Json<WriteCredential>> {
    let user_id = authenticate(&state, &headers)?;
    let credential = state.uploads.grant(&req.filename, &req.mime_type, req.declared_size, &user_id)?;
    Ok(Json(credential))
}

#[derive(Debug, Deserialize)]
pub struct ConfirmRequest {
    pub key: String,
    pub filename: String,
    pub mime_type: String,
    pub conversation_peer: String,
    pub agent_key: Option<String>,
    pub contact_id: Option<String>,
    pub client_temp_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ConfirmResponse {
    pub message_id: String,
    pub read: ReadCredential,
}

/// POST /v1/uploads/confirm — the upload finished; materialize the message
/// that carries it and hand back a short-lived read credential for the
/// caller's own immediate display.
pub async fn confirm(State(state): State<Arc<AppState>>, headers: HeaderMap, Json(req): Json<ConfirmRequest>) -> ApiResult<Json<ConfirmResponse>> {
    let user_id = authenticate(&state, &headers)?;
    let conversation_id = state
        .messages
        .get_or_create_conversation(&user_id, &relay_core::types::UserId::from(req.conversation_peer.as_str()))?;

    let (message, read) = state.uploads.confirm(
        &req.key,
        &req.filename,
        &req.mime_type,
        &user_id,
        &conversation_id,
        req.agent_key.as_deref().map(AgentKey::from),
        req.contact_id.as_deref().map(ConversationId::from),
        req.client_temp_id,
    )?;

    state.presence.broadcast_message(&message, None);

    Ok(Json(ConfirmResponse { message_id: message.id.as_str().to_string(), read }))
}
