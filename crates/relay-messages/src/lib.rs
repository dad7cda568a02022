pub mod db;
pub mod error;
pub mod store;
pub mod types;

pub use error::{MessageError, Result};
pub use store::{canonical_pair, MessageStore};
pub use types::{AttachmentRef, Conversation, Message, MessagePage, NewMessage, PeerSummary};

#[cfg(test)]
mod tests {
    use super::*;
    use relay_core::types::{DeliveryStatus, MessageKind, UserId};
    use rusqlite::Connection;

    fn store() -> MessageStore {
        MessageStore::new(Connection::open_in_memory().unwrap()).unwrap()
    }

    fn new_text(conversation_id: &relay_core::types::ConversationId, author: &UserId, text: &str) -> NewMessage {
        NewMessage {
            conversation_id: conversation_id.clone(),
            author: author.clone(),
            kind: MessageKind::Text,
            text: text.to_string(),
            attachment: None,
            agent_key: None,
            contact_id: None,
            client_temp_id: None,
        }
    }

    #[test]
    fn append_and_get_round_trip() {
        let store = store();
        let alice = UserId::from("alice");
        let bob = UserId::from("bob");
        let conv = store.get_or_create_conversation(&alice, &bob).unwrap();

        let stored = store.append(new_text(&conv, &alice, "hi bob")).unwrap();
        assert_eq!(stored.text, "hi bob");
        assert_eq!(stored.status, DeliveryStatus::Sent);

        let page = store.get(&conv, None, None).unwrap();
        assert_eq!(page.messages.len(), 1);
        assert_eq!(page.messages[0].id, stored.id);
    }

    #[test]
    fn get_or_create_conversation_is_order_independent() {
        let store = store();
        let alice = UserId::from("alice");
        let bob = UserId::from("bob");

        let conv1 = store.get_or_create_conversation(&alice, &bob).unwrap();
        let conv2 = store.get_or_create_conversation(&bob, &alice).unwrap();
        assert_eq!(conv1, conv2);
    }

    #[test]
    fn append_is_idempotent_on_client_temp_id() {
        let store = store();
        let alice = UserId::from("alice");
        let bob = UserId::from("bob");
        let conv = store.get_or_create_conversation(&alice, &bob).unwrap();

        let mut first_attempt = new_text(&conv, &alice, "retry me");
        first_attempt.client_temp_id = Some("temp-1".to_string());
        let mut second_attempt = new_text(&conv, &alice, "retry me");
        second_attempt.client_temp_id = Some("temp-1".to_string());

        let first = store.append(first_attempt).unwrap();
        let second = store.append(second_attempt).unwrap();
        assert_eq!(first.id, second.id);

        let page = store.get(&conv, None, None).unwrap();
        assert_eq!(page.messages.len(), 1);
    }

    #[test]
    fn non_text_without_attachment_is_invalid() {
        let store = store();
        let alice = UserId::from("alice");
        let bob = UserId::from("bob");
        let conv = store.get_or_create_conversation(&alice, &bob).unwrap();

        let mut msg = new_text(&conv, &alice, "");
        msg.kind = MessageKind::Image;
        let err = store.append(msg).unwrap_err();
        assert_eq!(err.code(), "INVALID");
    }

    #[test]
    fn transition_is_monotone_and_downgrade_is_noop() {
        let store = store();
        let alice = UserId::from("alice");
        let bob = UserId::from("bob");
        let conv = store.get_or_create_conversation(&alice, &bob).unwrap();
        let stored = store.append(new_text(&conv, &alice, "hi")).unwrap();

        store.transition(&stored.id, DeliveryStatus::Delivered).unwrap();
        store.transition(&stored.id, DeliveryStatus::Sent).unwrap();

        let page = store.get(&conv, None, None).unwrap();
        assert_eq!(page.messages[0].status, DeliveryStatus::Delivered);
    }

    #[test]
    fn mark_conversation_read_advances_peer_messages_only() {
        let store = store();
        let alice = UserId::from("alice");
        let bob = UserId::from("bob");
        let conv = store.get_or_create_conversation(&alice, &bob).unwrap();

        store.append(new_text(&conv, &bob, "from bob")).unwrap();
        store.append(new_text(&conv, &alice, "from alice")).unwrap();

        let advanced = store.mark_conversation_read(&conv, &alice, None).unwrap();
        assert_eq!(advanced.len(), 1);

        let page = store.get(&conv, None, None).unwrap();
        let bobs_message = page.messages.iter().find(|m| m.author == bob).unwrap();
        assert_eq!(bobs_message.status, DeliveryStatus::Read);
    }

    #[test]
    fn recent_per_peer_reports_unread_count() {
        let store = store();
        let alice = UserId::from("alice");
        let bob = UserId::from("bob");
        let conv = store.get_or_create_conversation(&alice, &bob).unwrap();
        store.append(new_text(&conv, &bob, "one")).unwrap();
        store.append(new_text(&conv, &bob, "two")).unwrap();

        let summaries = store.recent_per_peer(&alice).unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].unread_count, 2);
        assert_eq!(summaries[0].last_message.text, "two");
    }
}
