use async_trait::async_trait;

use crate::{
    channel::Channel,
    error::ChannelError,
    graph_send::send_message,
    types::{ChannelKind, ChannelStatus, OutboundMessage},
};

/// Instagram Messaging adapter — rides the same Graph Send API as
/// [`crate::messenger::MessengerAdapter`], keyed by the IG-scoped access
/// token instead of the page token.
pub struct InstagramAdapter {
    client: reqwest::Client,
    ig_access_token: String,
    status: ChannelStatus,
}

impl InstagramAdapter {
    pub fn new(ig_access_token: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            ig_access_token: ig_access_token.into(),
            status: ChannelStatus::Disconnected,
        }
    }
}

#[async_trait]
impl Channel for InstagramAdapter {
    fn name(&self) -> &str {
        "instagram"
    }

    fn kind(&self) -> ChannelKind {
        ChannelKind::Instagram
    }

    async fn connect(&mut self) -> Result<(), ChannelError> {
        if self.ig_access_token.is_empty() {
            return Err(ChannelError::ConfigError(
                "missing Instagram access token".to_string(),
            ));
        }
        self.status = ChannelStatus::Connected;
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), ChannelError> {
        self.status = ChannelStatus::Disconnected;
        Ok(())
    }

    async fn send(&self, msg: &OutboundMessage) -> Result<String, ChannelError> {
        send_message(&self.client, &self.ig_access_token, msg).await
    }

    fn status(&self) -> ChannelStatus {
        self.status.clone()
    }
}
