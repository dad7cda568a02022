use thiserror::Error;

/// Shared error taxonomy. Every domain crate's own error enum maps onto one
/// of these variants via its `code()` method; the gateway never invents a
/// new status outside this set when talking to a client.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("authentication required")]
    AuthRequired,

    #[error("invalid credentials: {0}")]
    AuthInvalid(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid request: {0}")]
    Invalid(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("rate limited")]
    RateLimited,

    #[error("service unavailable: {0}")]
    Unavailable(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl RelayError {
    /// Stable wire error code — part of §7's taxonomy, never a provider
    /// error message or a stack trace.
    pub fn code(&self) -> &'static str {
        match self {
            RelayError::AuthRequired => "AUTH_REQUIRED",
            RelayError::AuthInvalid(_) => "AUTH_INVALID",
            RelayError::Forbidden(_) => "FORBIDDEN",
            RelayError::NotFound(_) => "NOT_FOUND",
            RelayError::Invalid(_) => "INVALID",
            RelayError::Conflict(_) => "CONFLICT",
            RelayError::RateLimited => "RATE_LIMITED",
            RelayError::Unavailable(_) => "UNAVAILABLE",
            RelayError::Internal(_) => "INTERNAL",
        }
    }

    /// HTTP status the gateway maps this onto.
    pub fn status_code(&self) -> u16 {
        match self {
            RelayError::AuthRequired | RelayError::AuthInvalid(_) => 401,
            RelayError::Forbidden(_) => 403,
            RelayError::NotFound(_) => 404,
            RelayError::Invalid(_) => 400,
            RelayError::Conflict(_) => 409,
            RelayError::RateLimited => 429,
            RelayError::Unavailable(_) => 503,
            RelayError::Internal(_) => 500,
        }
    }
}

pub type Result<T> = std::result::Result<T, RelayError>;
