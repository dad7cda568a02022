//! POST /v1/nlu/classify — on-demand classification, mainly for operator
//! tooling and tests; the router itself calls `Classifier::classify` inline
//! on every customer-originated message (§4.4/§4.8).

use std::sync::Arc;

use axum::{extract::State, http::HeaderMap, Json};
use relay_nlu::Classification;
use serde::Deserialize;

use crate::app::AppState;
use crate::auth::authenticate;
use crate::error::ApiResult;

#[derive(Debug, Deserialize)]
pub struct ClassifyRequest {
    pub text: String,
    #[serde(default = "default_speaker")]
    pub speaker: String,
}

fn default_speaker() -> String {
    "customer".to_string()
}

pub async fn classify(State(state): State<Arc<AppState>>, headers: HeaderMap, Json(req): Json<ClassifyRequest>) -> ApiResult<Json<Classification>> {
    authenticate(&state, &headers)?;
    let classification = state.nlu.classify(&req.text, &req.speaker).await;
    Ok(Json(classification))
}
