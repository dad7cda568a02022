use async_trait::async_trait;

use crate::{
    error::ChannelError,
    types::{ChannelKind, ChannelStatus, OutboundMessage},
};

/// Common interface implemented by every channel adapter (WhatsApp Cloud,
/// WhatsApp device-session, Instagram, Messenger).
///
/// Implementations must be `Send + Sync` so they can be stored in a
/// [`ChannelManager`](crate::manager::ChannelManager) and driven from
/// multiple Tokio tasks. `send` returns the provider's own message id
/// (§6a "send(recipient, payload) → providerMessageId | error") so the
/// caller can correlate delivery receipts arriving later on the webhook.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Stable identifier for this adapter, unique across all registered
    /// channels and used as the key inside `ChannelManager`.
    fn name(&self) -> &str;

    fn kind(&self) -> ChannelKind;

    /// Establish the connection to the external service. A no-op for the
    /// stateless Graph-API-backed adapters; for the device-session adapter
    /// this starts (or resumes) the paired WhatsApp Web session.
    async fn connect(&mut self) -> Result<(), ChannelError>;

    /// Gracefully close the connection.
    async fn disconnect(&mut self) -> Result<(), ChannelError>;

    /// Deliver a single outbound message and return the provider-assigned
    /// message id. `&self` rather than `&mut self` so a connected adapter
    /// can send concurrently without a mutable borrow.
    async fn send(&self, msg: &OutboundMessage) -> Result<String, ChannelError>;

    /// Return the current runtime status without blocking.
    fn status(&self) -> ChannelStatus;
}
