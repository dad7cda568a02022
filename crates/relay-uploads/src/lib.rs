pub mod broker;
pub mod credential;
pub mod db;
pub mod error;
pub mod types;

pub use broker::{Transcriber, UploadBroker};
pub use error::{Result, UploadError};
pub use types::{classify_kind, PendingUpload, ReadCredential, WriteCredential};

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use relay_core::config::UploadsConfig;
    use relay_core::types::{ConversationId, UserId};
    use relay_messages::MessageStore;
    use rusqlite::Connection;
    use std::sync::Arc;

    fn config() -> UploadsConfig {
        UploadsConfig {
            max_bytes: 1024 * 1024,
            allowed_mime_types: vec!["image/png".to_string(), "audio/ogg".to_string()],
            credential_ttl_secs: 600,
            presign_secret: "test-secret".to_string(),
        }
    }

    fn broker() -> UploadBroker {
        let messages = Arc::new(MessageStore::new(Connection::open_in_memory().unwrap()).unwrap());
        UploadBroker::new(Connection::open_in_memory().unwrap(), config(), messages).unwrap()
    }

    #[test]
    fn grant_rejects_disallowed_mime_type() {
        let broker = broker();
        let err = broker
            .grant("malware.exe", "application/x-msdownload", 10, &UserId::from("alice"))
            .unwrap_err();
        assert_eq!(err.code(), "INVALID");
    }

    #[test]
    fn grant_rejects_oversized_upload() {
        let broker = broker();
        let err = broker
            .grant("big.png", "image/png", 10 * 1024 * 1024, &UserId::from("alice"))
            .unwrap_err();
        assert_eq!(err.code(), "INVALID");
    }

    #[test]
    fn grant_then_confirm_materializes_a_message() {
        let broker = broker();
        let alice = UserId::from("alice");
        let conversation = ConversationId::new();

        let credential = broker.grant("photo.png", "image/png", 1024, &alice).unwrap();

        let (message, read_credential) = broker
            .confirm(
                &credential.key,
                "photo.png",
                "image/png",
                &alice,
                &conversation,
                None,
                None,
                None,
            )
            .unwrap();

        assert!(message.attachment.is_some());
        assert!(!read_credential.get_url.is_empty());
    }

    #[test]
    fn confirm_twice_fails_already_consumed() {
        let broker = broker();
        let alice = UserId::from("alice");
        let conversation = ConversationId::new();
        let credential = broker.grant("photo.png", "image/png", 1024, &alice).unwrap();

        broker
            .confirm(&credential.key, "photo.png", "image/png", &alice, &conversation, None, None, None)
            .unwrap();

        let err = broker
            .confirm(&credential.key, "photo.png", "image/png", &alice, &conversation, None, None, None)
            .unwrap_err();
        assert_eq!(err.code(), "CONFLICT");
    }

    #[test]
    fn confirm_unknown_key_fails_not_found() {
        let broker = broker();
        let err = broker
            .confirm(
                "messages/unknown.png",
                "photo.png",
                "image/png",
                &UserId::from("alice"),
                &ConversationId::new(),
                None,
                None,
                None,
            )
            .unwrap_err();
        assert_eq!(err.code(), "NOT_FOUND");
    }

    struct StubTranscriber;

    #[async_trait]
    impl Transcriber for StubTranscriber {
        async fn transcribe(&self, _key: &str, _mime_type: &str) -> Option<String> {
            Some("hello from the voice note".to_string())
        }
    }

    #[tokio::test]
    async fn audio_confirm_schedules_transcription() {
        let messages = Arc::new(MessageStore::new(Connection::open_in_memory().unwrap()).unwrap());
        let broker = UploadBroker::new(Connection::open_in_memory().unwrap(), config(), messages.clone())
            .unwrap()
            .with_transcriber(Arc::new(StubTranscriber));

        let alice = UserId::from("alice");
        let conversation = ConversationId::new();
        let credential = broker.grant("note.ogg", "audio/ogg", 1024, &alice).unwrap();

        broker
            .confirm(&credential.key, "note.ogg", "audio/ogg", &alice, &conversation, None, None, None)
            .unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        let page = messages.get(&conversation, None, None).unwrap();
        assert!(page
            .messages
            .iter()
            .any(|m| m.text.contains("transcription")));
    }
}
