use axum::{extract::State, Json};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::app::AppState;

/// GET /health — liveness probe: server metadata plus each channel
/// adapter's current connection status (§6a, generalized from the
/// teacher's single-provider health map to `ChannelManager::statuses`).
pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    let channels: Vec<Value> = state
        .channels
        .statuses()
        .into_iter()
        .map(|(name, status)| json!({ "name": name, "status": status }))
        .collect();

    Json(json!({
        "status": "ok",
        "channels": channels,
    }))
}
