use relay_core::RelayError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum UserError {
    #[error("user not found: {0}")]
    NotFound(String),

    #[error("email already registered: {0}")]
    AlreadyExists(String),

    #[error("invalid email or password")]
    InvalidCredentials,

    #[error("credential expired or malformed")]
    InvalidCredential,

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("password hashing error: {0}")]
    Hashing(String),
}

impl UserError {
    pub fn code(&self) -> &'static str {
        match self {
            UserError::NotFound(_) => "NOT_FOUND",
            UserError::AlreadyExists(_) => "CONFLICT",
            UserError::InvalidCredentials => "AUTH_INVALID",
            UserError::InvalidCredential => "AUTH_INVALID",
            UserError::Database(_) => "INTERNAL",
            UserError::Hashing(_) => "INTERNAL",
        }
    }
}

impl From<UserError> for RelayError {
    fn from(e: UserError) -> Self {
        match &e {
            UserError::NotFound(msg) => RelayError::NotFound(msg.clone()),
            UserError::AlreadyExists(msg) => RelayError::Conflict(msg.clone()),
            UserError::InvalidCredentials | UserError::InvalidCredential => {
                RelayError::AuthInvalid(e.to_string())
            }
            UserError::Database(err) => RelayError::Internal(err.to_string()),
            UserError::Hashing(msg) => RelayError::Internal(msg.clone()),
        }
    }
}

pub type Result<T> = std::result::Result<T, UserError>;
