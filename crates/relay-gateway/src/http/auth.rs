//! POST /v1/auth/register, POST /v1/auth/login (§3 Identity).

use std::sync::Arc;

use axum::{extract::State, Json};
use relay_core::types::UserRole;
use relay_users::{Credential, NewUser, User};
use serde::Deserialize;

use crate::app::AppState;
use crate::error::ApiResult;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub display_name: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub role: Option<UserRole>,
}

pub async fn register(State(state): State<Arc<AppState>>, Json(req): Json<RegisterRequest>) -> ApiResult<Json<User>> {
    let conn = state.users_db.lock().unwrap();
    let user = relay_users::auth::register(
        &conn,
        NewUser {
            display_name: req.display_name,
            email: req.email,
            password: req.password,
            role: req.role.unwrap_or(UserRole::Operator),
        },
    )?;
    Ok(Json(user))
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

pub async fn login(State(state): State<Arc<AppState>>, Json(req): Json<LoginRequest>) -> ApiResult<Json<Credential>> {
    let user = {
        let conn = state.users_db.lock().unwrap();
        relay_users::auth::login(&conn, &req.email, &req.password)?
    };
    let ttl = chrono::Duration::seconds(state.config.gateway.token_ttl_secs as i64);
    let credential = relay_users::issue_credential(&state.config.gateway.auth_token_secret, &user.id, ttl);
    Ok(Json(credential))
}
