pub mod channel;
pub mod error;
pub mod graph_send;
pub mod inbound;
pub mod instagram;
pub mod manager;
pub mod messenger;
pub mod types;
pub mod whatsapp_cloud;
pub mod whatsapp_device;

pub use channel::Channel;
pub use error::ChannelError;
pub use inbound::{parse_messaging_webhook, parse_whatsapp_cloud_webhook, parse_whatsapp_device_event};
pub use instagram::InstagramAdapter;
pub use manager::ChannelManager;
pub use messenger::MessengerAdapter;
pub use types::{ChannelKind, ChannelStatus, MessageFormat, NormalizedInbound, OutboundMessage};
pub use whatsapp_cloud::WhatsAppCloudAdapter;
pub use whatsapp_device::WhatsAppDeviceAdapter;

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn manager_connects_registered_adapters_and_reports_status() {
        let mut manager = ChannelManager::new();
        manager.register(Box::new(WhatsAppCloudAdapter::new("pnid-1", "token-1")));
        manager.register(Box::new(MessengerAdapter::new("page-token-1")));

        manager.connect_all().await;

        let statuses = manager.statuses();
        assert_eq!(statuses.len(), 2);
        assert!(statuses
            .iter()
            .all(|(_, status)| matches!(status, ChannelStatus::Connected)));
    }

    #[tokio::test]
    async fn connect_fails_fast_on_missing_credentials() {
        let mut adapter = WhatsAppCloudAdapter::new("pnid-1", "");
        let err = adapter.connect().await.unwrap_err();
        assert_eq!(err.code(), "INVALID");
    }

    #[test]
    fn dedup_token_is_scoped_by_channel() {
        let msg = NormalizedInbound {
            channel: ChannelKind::WhatsAppCloud,
            provider_message_id: "abc123".to_string(),
            sender_external_id: "15551234567".to_string(),
            sender_display_name: None,
            kind: relay_core::types::MessageKind::Text,
            text: "hi".to_string(),
            media_url: None,
            timestamp: chrono::Utc::now(),
        };
        assert_eq!(msg.dedup_token(), "whatsapp_cloud:abc123");
    }
}
