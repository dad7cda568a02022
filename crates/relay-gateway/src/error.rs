//! Maps every domain crate's `RelayError` onto an HTTP status + JSON body
//! (§7 "relay-gateway's HTTP layer maps `code()` to a status code").

use axum::{http::StatusCode, response::IntoResponse, Json};
use relay_core::RelayError;
use serde_json::json;

pub struct ApiError(pub RelayError);

/// Every domain crate's error type already converts to `RelayError` (see
/// each crate's `error.rs`); this blanket impl lets handlers `?`-propagate
/// `relay_messages::MessageError`, `relay_users::UserError`, etc. directly
/// without an intermediate `.map_err(RelayError::from)`.
impl<E: Into<RelayError>> From<E> for ApiError {
    fn from(e: E) -> Self {
        Self(e.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = Json(json!({
            "error": self.0.code(),
            "message": self.0.to_string(),
        }));
        (status, body).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
