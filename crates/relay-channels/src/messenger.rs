use async_trait::async_trait;

use crate::{
    channel::Channel,
    error::ChannelError,
    graph_send::send_message,
    types::{ChannelKind, ChannelStatus, OutboundMessage},
};

/// Facebook Messenger adapter — Meta's Send API over a page-scoped access
/// token.
pub struct MessengerAdapter {
    client: reqwest::Client,
    page_access_token: String,
    status: ChannelStatus,
}

impl MessengerAdapter {
    pub fn new(page_access_token: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            page_access_token: page_access_token.into(),
            status: ChannelStatus::Disconnected,
        }
    }
}

#[async_trait]
impl Channel for MessengerAdapter {
    fn name(&self) -> &str {
        "messenger"
    }

    fn kind(&self) -> ChannelKind {
        ChannelKind::Messenger
    }

    async fn connect(&mut self) -> Result<(), ChannelError> {
        if self.page_access_token.is_empty() {
            return Err(ChannelError::ConfigError(
                "missing Messenger page access token".to_string(),
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
        send_message(&self.client, &self.page_access_token, msg).await
    }

    fn status(&self) -> ChannelStatus {
        self.status.clone()
    }
}
