use relay_core::error::RelayError;

#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("agent not found: {0}")]
    NotFound(String),

    #[error("agent already exists: {0}")]
    AlreadyExists(String),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
}

impl AgentError {
    pub fn code(&self) -> &'static str {
        match self {
            AgentError::NotFound(_) => "NOT_FOUND",
            AgentError::AlreadyExists(_) => "CONFLICT",
            AgentError::Database(_) => "INTERNAL",
        }
    }
}

impl From<AgentError> for RelayError {
    fn from(err: AgentError) -> Self {
        match err {
            AgentError::NotFound(msg) => RelayError::NotFound(msg),
            AgentError::AlreadyExists(msg) => RelayError::Conflict(msg),
            AgentError::Database(e) => RelayError::Internal(e.to_string()),
        }
    }
}
