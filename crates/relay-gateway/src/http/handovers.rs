//! GET /v1/handovers, POST .../{id}/accept|in-progress|resolve|cancel (§4.6).

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    Json,
};
use relay_core::types::HandoverTicketId;
use relay_handover::{HandoverTicket, TicketFilter, TicketStatus};
use serde::Deserialize;

use crate::app::AppState;
use crate::auth::authenticate_user;
use crate::error::ApiResult;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub status: Option<String>,
    pub min_priority: Option<u8>,
    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn default_limit() -> u32 {
    50
}

/// GET /v1/handovers — the operator-facing queue (§4.6 "operators work a
/// shared queue, ordered by priority then age").
pub async fn list(State(state): State<Arc<AppState>>, headers: HeaderMap, Query(query): Query<ListQuery>) -> ApiResult<Json<Vec<HandoverTicket>>> {
    authenticate_user(&state, &headers)?;
    let filter = TicketFilter {
        status: query.status.as_deref().and_then(TicketStatus::from_str_opt),
        min_priority: query.min_priority,
        limit: query.limit,
    };
    Ok(Json(state.handovers.list(filter)?))
}

/// POST /v1/handovers/{id}/accept — compare-and-swap claim by the calling
/// operator; a second operator racing the same ticket gets `CONFLICT`.
pub async fn accept(State(state): State<Arc<AppState>>, headers: HeaderMap, Path(id): Path<String>) -> ApiResult<Json<HandoverTicket>> {
    let user = authenticate_user(&state, &headers)?;
    let ticket = state.handovers.accept(&HandoverTicketId::from(id.as_str()), &user.id)?;
    Ok(Json(ticket))
}

/// POST /v1/handovers/{id}/in-progress — accepted → in_progress, once the
/// operator who accepted the ticket actually starts working it.
pub async fn mark_in_progress(State(state): State<Arc<AppState>>, headers: HeaderMap, Path(id): Path<String>) -> ApiResult<Json<HandoverTicket>> {
    authenticate_user(&state, &headers)?;
    let ticket = state.handovers.mark_in_progress(&HandoverTicketId::from(id.as_str()))?;
    Ok(Json(ticket))
}

#[derive(Debug, Deserialize)]
pub struct ResolveRequest {
    pub notes: String,
}

pub async fn resolve(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(req): Json<ResolveRequest>,
) -> ApiResult<Json<HandoverTicket>> {
    authenticate_user(&state, &headers)?;
    let ticket = state.handovers.resolve(&HandoverTicketId::from(id.as_str()), &req.notes)?;
    Ok(Json(ticket))
}

pub async fn cancel(State(state): State<Arc<AppState>>, headers: HeaderMap, Path(id): Path<String>) -> ApiResult<Json<HandoverTicket>> {
    authenticate_user(&state, &headers)?;
    let ticket = state.handovers.cancel(&HandoverTicketId::from(id.as_str()))?;
    Ok(Json(ticket))
}
