use relay_core::RelayError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("mime type not allowed: {0}")]
    Invalid(String),

    #[error("pending upload not found, expired, or never granted: {0}")]
    NotFound(String),

    #[error("upload already consumed: {0}")]
    AlreadyConsumed(String),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
}

impl UploadError {
    pub fn code(&self) -> &'static str {
        match self {
            UploadError::Invalid(_) => "INVALID",
            UploadError::NotFound(_) => "NOT_FOUND",
            UploadError::AlreadyConsumed(_) => "CONFLICT",
            UploadError::Database(_) => "INTERNAL",
        }
    }
}

impl From<UploadError> for RelayError {
    fn from(e: UploadError) -> Self {
        match &e {
            UploadError::Invalid(msg) => RelayError::Invalid(msg.clone()),
            UploadError::NotFound(msg) => RelayError::NotFound(msg.clone()),
            UploadError::AlreadyConsumed(msg) => RelayError::Conflict(msg.clone()),
            UploadError::Database(err) => RelayError::Internal(err.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, UploadError>;
