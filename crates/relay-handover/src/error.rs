use relay_core::RelayError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HandoverError {
    #[error("handover ticket not found: {0}")]
    NotFound(String),

    #[error("ticket is not in the expected state for this transition: {0}")]
    Conflict(String),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
}

impl HandoverError {
    pub fn code(&self) -> &'static str {
        match self {
            HandoverError::NotFound(_) => "NOT_FOUND",
            HandoverError::Conflict(_) => "CONFLICT",
            HandoverError::Database(_) => "INTERNAL",
        }
    }
}

impl From<HandoverError> for RelayError {
    fn from(e: HandoverError) -> Self {
        match e {
            HandoverError::NotFound(msg) => RelayError::NotFound(msg),
            HandoverError::Conflict(msg) => RelayError::Conflict(msg),
            HandoverError::Database(err) => RelayError::Internal(err.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, HandoverError>;
