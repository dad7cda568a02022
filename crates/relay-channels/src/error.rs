use relay_core::RelayError;
use thiserror::Error;

/// Errors that can occur within any channel adapter. Never surfaced to the
/// customer directly (§7 "Channel send ... failure is logged and surfaced
/// as a delivery status that does NOT advance past `sent`"); callers log
/// `code()` and stall the message's delivery status instead of propagating.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// The underlying transport could not be established.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// A message could not be delivered to the remote endpoint.
    #[error("Send failed: {0}")]
    SendFailed(String),

    /// The channel rejected the supplied credentials or token.
    #[error("Authentication failed: {0}")]
    AuthFailed(String),

    /// An operation exceeded its allowed time budget.
    #[error("Operation timed out after {ms}ms")]
    Timeout { ms: u64 },

    /// The channel-specific configuration is invalid or missing.
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl ChannelError {
    pub fn code(&self) -> &'static str {
        match self {
            ChannelError::ConnectionFailed(_) => "UNAVAILABLE",
            ChannelError::SendFailed(_) => "UNAVAILABLE",
            ChannelError::AuthFailed(_) => "INVALID",
            ChannelError::Timeout { .. } => "UNAVAILABLE",
            ChannelError::ConfigError(_) => "INVALID",
        }
    }
}

impl From<ChannelError> for RelayError {
    fn from(e: ChannelError) -> Self {
        match &e {
            ChannelError::AuthFailed(msg) | ChannelError::ConfigError(msg) => {
                RelayError::Invalid(msg.clone())
            }
            ChannelError::ConnectionFailed(_)
            | ChannelError::SendFailed(_)
            | ChannelError::Timeout { .. } => RelayError::Unavailable(e.to_string()),
        }
    }
}
