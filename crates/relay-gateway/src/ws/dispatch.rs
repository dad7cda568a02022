//! Post-auth request dispatch (§6 client→server methods). Each handler does
//! just enough to validate and hand off to the domain crates; fan-out back
//! to subscribers happens inside `relay_presence::Registry` (driven by the
//! router for `chat:send`, directly here for the transient ones).

use std::sync::Arc;

use chrono::{DateTime, Utc};
use relay_core::types::{AgentKey, ConnId, ConversationId, MessageKind, UserId};
use relay_core::RelayError;
use relay_messages::NewMessage;
use relay_protocol::events::{AgentPanelParams, ChatMarkReadParams, ChatSendParams, UserTypingParams};
use relay_protocol::{frames::ResFrame, methods};
use tokio::sync::oneshot;

use crate::app::AppState;
use crate::router::{self, RouterJob, SYSTEM_USER_ID};

/// Route one authenticated `ReqFrame` to its handler, producing the `ResFrame`
/// to send back on the same connection.
pub async fn handle_req(
    state: &Arc<AppState>,
    conn_id: &ConnId,
    user_id: &UserId,
    req_id: &str,
    method: &str,
    params: Option<serde_json::Value>,
) -> ResFrame {
    let result = match method {
        methods::CHAT_SEND => chat_send(state, conn_id, user_id, params).await,
        methods::CHAT_MARK_READ => chat_mark_read(state, conn_id, user_id, params).await,
        methods::USER_TYPING => user_typing(state, user_id, params),
        methods::AGENT_OPEN => agent_open(state, conn_id, params),
        methods::AGENT_CLOSE => agent_close(state, conn_id, params),
        other => Err(RelayError::Invalid(format!("unknown method '{other}'"))),
    };

    match result {
        Ok(payload) => ResFrame::ok(req_id, payload),
        Err(err) => ResFrame::err(req_id, err.code(), &err.to_string()),
    }
}

fn parse_params<T: serde::de::DeserializeOwned>(params: Option<serde_json::Value>) -> Result<T, RelayError> {
    let value = params.ok_or_else(|| RelayError::Invalid("missing params".to_string()))?;
    serde_json::from_value(value).map_err(|e| RelayError::Invalid(format!("invalid params: {e}")))
}

/// `chat:send` — resolve the target conversation, persist through the
/// router, and wait for the persisted `Message` so the client's `temp_id`
/// can be reconciled against a real id in the same response.
async fn chat_send(
    state: &Arc<AppState>,
    conn_id: &ConnId,
    user_id: &UserId,
    params: Option<serde_json::Value>,
) -> Result<serde_json::Value, RelayError> {
    let params: ChatSendParams = parse_params(params)?;

    let conversation_id = match &params.contact_id {
        // the client already knows which conversation this belongs to
        // (it came from a prior history fetch or `chat:new-message`)
        Some(raw) => ConversationId::from(raw.as_str()),
        None => state.messages.get_or_create_conversation(user_id, &UserId::from(SYSTEM_USER_ID))?,
    };

    state.presence.join(conn_id, conversation_id.clone()).ok();

    let kind = match params.kind.as_deref() {
        Some("image") => MessageKind::Image,
        Some("audio") => MessageKind::Audio,
        Some("file") => MessageKind::File,
        _ => MessageKind::Text,
    };

    let new_message = NewMessage {
        conversation_id,
        author: user_id.clone(),
        kind,
        text: params.text.unwrap_or_default(),
        attachment: params.attachment.map(|a| relay_messages::AttachmentRef {
            bucket: a.bucket,
            key: a.key,
            filename: a.filename,
            mime_type: a.mime_type,
        }),
        agent_key: None,
        contact_id: None,
        client_temp_id: Some(params.temp_id),
    };

    let (tx, rx) = oneshot::channel();
    router::dispatch(state, RouterJob { new_message, respond_to: Some(tx) });
    let message = rx
        .await
        .map_err(|_| RelayError::Internal("router worker dropped the response channel".to_string()))??;

    Ok(serde_json::json!({ "id": message.id, "status": message.status }))
}

/// `chat:mark-read` — advances the reader's cursor and echoes delivery
/// transitions to every subscriber of the conversation room.
async fn chat_mark_read(
    state: &Arc<AppState>,
    conn_id: &ConnId,
    user_id: &UserId,
    params: Option<serde_json::Value>,
) -> Result<serde_json::Value, RelayError> {
    let params: ChatMarkReadParams = parse_params(params)?;
    let conversation_id = ConversationId::from(params.conversation_id.as_str());
    state.presence.join(conn_id, conversation_id.clone()).ok();

    let as_of: Option<DateTime<Utc>> = match params.as_of {
        Some(raw) => Some(
            DateTime::parse_from_rfc3339(&raw)
                .map(|d| d.with_timezone(&Utc))
                .map_err(|e| RelayError::Invalid(format!("invalid as_of timestamp: {e}")))?,
        ),
        None => None,
    };

    let advanced = state.messages.mark_conversation_read(&conversation_id, user_id, as_of)?;
    for message_id in &advanced {
        state
            .presence
            .broadcast_delivery(&conversation_id, message_id, relay_core::types::DeliveryStatus::Read);
    }

    Ok(serde_json::json!({ "advanced": advanced.len() }))
}

/// `user:typing` — transient, never persisted.
fn user_typing(state: &Arc<AppState>, user_id: &UserId, params: Option<serde_json::Value>) -> Result<serde_json::Value, RelayError> {
    let params: UserTypingParams = parse_params(params)?;
    let conversation_id = ConversationId::from(params.conversation_id.as_str());
    state.presence.broadcast_typing(&conversation_id, params.is_typing);
    state.presence.broadcast_presence(
        user_id,
        if params.is_typing {
            relay_presence::PresenceState::Typing
        } else {
            relay_presence::PresenceState::Online
        },
    );
    Ok(serde_json::json!({ "ok": true }))
}

/// `agent:open` — an operator subscribes to a custom agent's live panel.
fn agent_open(state: &Arc<AppState>, conn_id: &ConnId, params: Option<serde_json::Value>) -> Result<serde_json::Value, RelayError> {
    let params: AgentPanelParams = parse_params(params)?;
    let agent_key = AgentKey::from(params.agent_key.as_str());
    state.presence.join_agent_panel(conn_id, agent_key)?;
    Ok(serde_json::json!({ "ok": true }))
}

/// `agent:close` — drop the agent-panel subscription for this connection.
fn agent_close(state: &Arc<AppState>, conn_id: &ConnId, params: Option<serde_json::Value>) -> Result<serde_json::Value, RelayError> {
    let params: AgentPanelParams = parse_params(params)?;
    let agent_key = AgentKey::from(params.agent_key.as_str());
    state.presence.leave_agent_panel(conn_id, agent_key)?;
    Ok(serde_json::json!({ "ok": true }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_params_rejects_a_missing_body() {
        let err = parse_params::<ChatSendParams>(None).unwrap_err();
        assert_eq!(err.code(), "INVALID");
    }

    #[test]
    fn parse_params_rejects_a_shape_mismatch() {
        let params = Some(serde_json::json!({ "conversation_id": 123 }));
        let err = parse_params::<ChatMarkReadParams>(params).unwrap_err();
        assert_eq!(err.code(), "INVALID");
    }

    #[test]
    fn parse_params_accepts_a_well_formed_body() {
        let params = Some(serde_json::json!({ "temp_id": "t1", "text": "hi" }));
        let parsed: ChatSendParams = parse_params(params).unwrap();
        assert_eq!(parsed.temp_id, "t1");
        assert_eq!(parsed.text.as_deref(), Some("hi"));
    }
}
