//! Bearer credential verification shared by the HTTP and WS surfaces.
//! Grounded on `http/chat.rs`'s `extract_bearer`/`check_auth` pair, adapted
//! from a single static token comparison to signed-credential verification
//! via `relay_users::verify_credential` (§1a Authentication).

use axum::http::HeaderMap;
use relay_core::types::UserId;
use relay_core::RelayError;
use relay_users::User;

use crate::app::AppState;

pub fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

/// Verify the request's bearer credential and return the owning user id.
pub fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<UserId, RelayError> {
    let token = extract_bearer(headers).ok_or(RelayError::AuthRequired)?;
    relay_users::verify_credential(&state.config.gateway.auth_token_secret, token)
        .map_err(RelayError::from)
}

/// `authenticate` plus a row load — most handlers need the full `User` to
/// check role (operator vs external).
pub fn authenticate_user(state: &AppState, headers: &HeaderMap) -> Result<User, RelayError> {
    let user_id = authenticate(state, headers)?;
    let conn = state.users_db.lock().unwrap();
    relay_users::identity::get_user(&conn, &user_id)?
        .ok_or_else(|| RelayError::AuthInvalid("credential refers to an unknown user".to_string()))
}
