use relay_core::RelayError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PresenceError {
    #[error("credential invalid or expired")]
    AuthInvalid,

    #[error("connection not attached to a user")]
    NotAttached,
}

impl PresenceError {
    pub fn code(&self) -> &'static str {
        match self {
            PresenceError::AuthInvalid => "AUTH_INVALID",
            PresenceError::NotAttached => "AUTH_REQUIRED",
        }
    }
}

impl From<PresenceError> for RelayError {
    fn from(e: PresenceError) -> Self {
        match e {
            PresenceError::AuthInvalid => RelayError::AuthInvalid("invalid credential".into()),
            PresenceError::NotAttached => RelayError::AuthRequired,
        }
    }
}

pub type Result<T> = std::result::Result<T, PresenceError>;
