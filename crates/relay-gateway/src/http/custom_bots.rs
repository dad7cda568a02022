//! GET/POST /v1/agents/custom, DELETE/POST .../{key}, .../{key}/prompt
//! (§3a custom_agents, §4.5).

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::HeaderMap,
    Json,
};
use relay_agents::{CustomAgentRow, NewCustomAgent};
use serde::Deserialize;

use crate::app::AppState;
use crate::auth::authenticate_user;
use crate::error::{ApiError, ApiResult};

fn require_operator(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    let user = authenticate_user(state, headers)?;
    if !user.role.is_human_operator() {
        return Err(ApiError::from(relay_core::RelayError::Forbidden(
            "custom agent management requires an operator or admin role".to_string(),
        )));
    }
    Ok(())
}

pub async fn list(State(state): State<Arc<AppState>>, headers: HeaderMap) -> ApiResult<Json<Vec<CustomAgentRow>>> {
    require_operator(&state, &headers)?;
    Ok(Json(state.agent_store.list()?))
}

#[derive(Debug, Deserialize)]
pub struct CreateCustomAgentRequest {
    pub key: String,
    pub display_name: String,
    pub emoji: String,
    pub system_prompt: String,
    #[serde(default)]
    pub allowed_tools: Vec<String>,
    pub credential_handle: String,
    pub provider_label: String,
}

pub async fn create(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<CreateCustomAgentRequest>,
) -> ApiResult<Json<CustomAgentRow>> {
    require_operator(&state, &headers)?;
    let created = state.agent_store.create(NewCustomAgent {
        key: req.key,
        display_name: req.display_name,
        emoji: req.emoji,
        system_prompt: req.system_prompt,
        allowed_tools: req.allowed_tools,
        credential_handle: req.credential_handle,
        provider_label: req.provider_label,
    })?;
    Ok(Json(created))
}

pub async fn delete(State(state): State<Arc<AppState>>, headers: HeaderMap, Path(key): Path<String>) -> ApiResult<Json<serde_json::Value>> {
    require_operator(&state, &headers)?;
    state.agent_store.delete(&key)?;
    Ok(Json(serde_json::json!({ "ok": true })))
}

#[derive(Debug, Deserialize)]
pub struct UpdatePromptRequest {
    pub system_prompt: String,
}

pub async fn update_prompt(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(key): Path<String>,
    Json(req): Json<UpdatePromptRequest>,
) -> ApiResult<Json<CustomAgentRow>> {
    require_operator(&state, &headers)?;
    let updated = state.agent_store.update_prompt(&key, &req.system_prompt)?;
    Ok(Json(updated))
}
