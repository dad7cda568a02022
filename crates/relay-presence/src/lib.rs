pub mod error;
pub mod registry;
pub mod types;

pub use error::{PresenceError, Result};
pub use registry::{ConnSender, Registry};
pub use types::{PresenceState, RoomKey};

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use relay_core::types::{AgentKey, ConnId, ConversationId, DeliveryStatus, MessageId, MessageKind, UserId};
    use relay_messages::Message;

    fn sample_message(conversation_id: ConversationId, author: UserId, agent_key: Option<AgentKey>) -> Message {
        Message {
            id: MessageId::new(),
            conversation_id,
            author,
            kind: MessageKind::Text,
            text: "hello".to_string(),
            attachment: None,
            status: DeliveryStatus::Sent,
            agent_key,
            contact_id: None,
            client_temp_id: None,
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn join_and_broadcast_delivers_to_conversation_room() {
        let registry = Registry::new();
        let conn = ConnId::new();
        let user = UserId::from("alice");
        let (_tx, mut rx) = registry.attach(conn.clone(), user.clone());

        let conversation = ConversationId::new();
        registry.join(&conn, conversation.clone()).unwrap();

        let message = sample_message(conversation.clone(), UserId::from("bob"), None);
        registry.broadcast_message(&message, None);

        let frame = rx.recv().await.expect("expected an event frame");
        assert_eq!(frame.event, "chat:new-message");
    }

    #[tokio::test]
    async fn agent_authored_message_routes_to_agent_panel_not_conversation() {
        let registry = Registry::new();
        let conn = ConnId::new();
        let user = UserId::from("alice");
        let (_tx, mut rx) = registry.attach(conn.clone(), user.clone());

        let conversation = ConversationId::new();
        registry.join(&conn, conversation.clone()).unwrap();
        registry
            .join_agent_panel(&conn, AgentKey::new("concierge"))
            .unwrap();

        let message = sample_message(conversation, UserId::from("concierge-bot"), Some(AgentKey::new("concierge")));
        registry.broadcast_message(&message, Some(&user));

        let frame = rx.recv().await.expect("expected an event frame");
        assert_eq!(frame.event, "agent:message");
    }

    #[tokio::test]
    async fn detach_stops_further_delivery() {
        let registry = Registry::new();
        let conn = ConnId::new();
        let user = UserId::from("alice");
        let (_tx, mut rx) = registry.attach(conn.clone(), user.clone());
        let conversation = ConversationId::new();
        registry.join(&conn, conversation.clone()).unwrap();

        registry.detach(&conn);

        let message = sample_message(conversation, UserId::from("bob"), None);
        registry.broadcast_message(&message, None);

        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn join_without_attach_is_rejected() {
        let registry = Registry::new();
        let conn = ConnId::new();
        let err = registry.join(&conn, ConversationId::new()).unwrap_err();
        assert_eq!(err.code(), "AUTH_REQUIRED");
    }
}
