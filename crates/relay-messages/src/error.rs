use relay_core::RelayError;
use thiserror::Error;

/// Message Store errors. Kept separate from `RelayError` so the gateway can
/// map them to the right wire code without coupling layers.
#[derive(Debug, Error)]
pub enum MessageError {
    #[error("message violates invariant: {0}")]
    Invalid(String),

    #[error("message not found: {0}")]
    NotFound(String),

    #[error("conversation not found: {0}")]
    ConversationNotFound(String),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
}

impl MessageError {
    pub fn code(&self) -> &'static str {
        match self {
            MessageError::Invalid(_) => "INVALID",
            MessageError::NotFound(_) | MessageError::ConversationNotFound(_) => "NOT_FOUND",
            MessageError::Database(_) => "INTERNAL",
        }
    }
}

impl From<MessageError> for RelayError {
    fn from(e: MessageError) -> Self {
        match &e {
            MessageError::Invalid(msg) => RelayError::Invalid(msg.clone()),
            MessageError::NotFound(msg) | MessageError::ConversationNotFound(msg) => {
                RelayError::NotFound(msg.clone())
            }
            MessageError::Database(err) => RelayError::Internal(err.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, MessageError>;
