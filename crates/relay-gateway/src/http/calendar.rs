//! GET /v1/calendar/commitments, POST .../{id}, POST .../{id}/cancel,
//! POST /v1/scheduling/{conversationId}/confirm
//! (§4.7 scheduling sub-protocol commitments).

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    Json,
};
use relay_agents::AgentReply;
use relay_core::types::{CalendarCommitmentId, ConversationId};
use relay_core::RelayError;
use relay_scheduling::CalendarCommitment;
use serde::Deserialize;

use crate::app::AppState;
use crate::auth::authenticate_user;
use crate::error::ApiResult;
use crate::router::persist_agent_reply;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn default_limit() -> u32 {
    50
}

pub async fn list_commitments(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Vec<CalendarCommitment>>> {
    authenticate_user(&state, &headers)?;
    Ok(Json(state.scheduling.list_commitments(query.limit)?))
}

#[derive(Debug, Deserialize)]
pub struct UpdateCommitmentRequest {
    pub notes: Option<String>,
    #[serde(default)]
    pub attendees: Vec<String>,
}

pub async fn update_commitment(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(req): Json<UpdateCommitmentRequest>,
) -> ApiResult<Json<CalendarCommitment>> {
    authenticate_user(&state, &headers)?;
    let commitment = state.scheduling.update_commitment(
        &CalendarCommitmentId::from(id.as_str()),
        req.notes.as_deref(),
        &req.attendees,
    )?;
    Ok(Json(commitment))
}

pub async fn cancel_commitment(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    authenticate_user(&state, &headers)?;
    state.scheduling.cancel_commitment(&CalendarCommitmentId::from(id.as_str()))?;
    Ok(Json(serde_json::json!({ "ok": true })))
}

/// POST /v1/scheduling/{conversationId}/confirm — the operator
/// side of `require_operator_ok` (§4.7): `Confirming` → `Committing` →
/// exactly one external-calendar commit attempt, same as the conversational
/// path an `auto_commit` agent takes on its own.
pub async fn confirm_slot(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(conversation_id): Path<String>,
) -> ApiResult<Json<CalendarCommitment>> {
    authenticate_user(&state, &headers)?;
    let conversation_id = ConversationId::from(conversation_id.as_str());

    let agent_key = state
        .scheduling_agent
        .get(&conversation_id)
        .map(|entry| entry.value().clone())
        .ok_or_else(|| RelayError::NotFound(format!("no pending slot proposal for conversation {conversation_id}")))?;

    state.scheduling.confirm(&conversation_id)?;
    let commitment = state.scheduling.commit(&conversation_id, agent_key.as_str()).await?;
    state.scheduling_agent.remove(&conversation_id);

    let text = format!(
        "You're booked for {} — join here: {}",
        commitment.start.to_rfc3339(),
        commitment.meeting_url.as_deref().unwrap_or("(link pending)")
    );
    persist_agent_reply(&state, &conversation_id, &agent_key, &AgentReply::Text(text))?;

    Ok(Json(commitment))
}
