use relay_core::RelayError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("no scheduling attempt in progress for this conversation")]
    NoActiveAttempt,

    #[error("scheduling attempt is not in the expected state for this transition")]
    WrongState,

    #[error("calendar provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("commitment not found: {0}")]
    CommitmentNotFound(String),
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("provider unavailable: {0}")]
    Unavailable(String),
}

impl SchedulerError {
    pub fn code(&self) -> &'static str {
        match self {
            SchedulerError::Database(_) => "INTERNAL",
            SchedulerError::NoActiveAttempt | SchedulerError::WrongState => "CONFLICT",
            SchedulerError::Provider(_) => "UNAVAILABLE",
            SchedulerError::CommitmentNotFound(_) => "NOT_FOUND",
        }
    }
}

impl From<SchedulerError> for RelayError {
    fn from(e: SchedulerError) -> Self {
        match e {
            SchedulerError::Database(err) => RelayError::Internal(err.to_string()),
            SchedulerError::NoActiveAttempt | SchedulerError::WrongState => {
                RelayError::Conflict(e.to_string())
            }
            SchedulerError::Provider(err) => RelayError::Unavailable(err.to_string()),
            SchedulerError::CommitmentNotFound(id) => RelayError::NotFound(id),
        }
    }
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
