use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use relay_core::config::UploadsConfig;
use relay_core::types::{AgentKey, ConversationId, MessageKind, UserId};
use relay_messages::{AttachmentRef, MessageStore, NewMessage};
use rusqlite::{params, OptionalExtension};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::credential::presigned_url;
use crate::error::{Result, UploadError};
use crate::types::{classify_kind, PendingUpload, ReadCredential, WriteCredential};

/// Best-effort transcription hook for audio attachments (§4.3). No concrete
/// ASR provider is in scope (§1); callers wire a real implementation, tests
/// use a stub. A `None` result or an error is always silent to the caller.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, key: &str, mime_type: &str) -> Option<String>;
}

/// Upload Broker (§4.3): grant/confirm protocol around a `PendingUpload`
/// compare-and-swap, mirroring the teacher's `Mutex<Connection>`-guarded
/// manager idiom used throughout its own persistence crates.
pub struct UploadBroker {
    db: Mutex<rusqlite::Connection>,
    config: UploadsConfig,
    messages: Arc<MessageStore>,
    transcriber: Option<Arc<dyn Transcriber>>,
}

impl UploadBroker {
    pub fn new(
        conn: rusqlite::Connection,
        config: UploadsConfig,
        messages: Arc<MessageStore>,
    ) -> Result<Self> {
        crate::db::init_db(&conn)?;
        Ok(Self {
            db: Mutex::new(conn),
            config,
            messages,
            transcriber: None,
        })
    }

    pub fn with_transcriber(mut self, transcriber: Arc<dyn Transcriber>) -> Self {
        self.transcriber = Some(transcriber);
        self
    }

    /// grant(filename, mimeType, declaredSize) (§4.3 step 1).
    #[instrument(skip(self))]
    pub fn grant(
        &self,
        filename: &str,
        mime_type: &str,
        declared_size: u64,
        issuer_user_id: &UserId,
    ) -> Result<WriteCredential> {
        if !self.config.allowed_mime_types.iter().any(|m| m == mime_type) {
            return Err(UploadError::Invalid(format!(
                "mime type {mime_type} is not allowed"
            )));
        }
        if declared_size > self.config.max_bytes {
            return Err(UploadError::Invalid(format!(
                "declared size {declared_size} exceeds maximum {}",
                self.config.max_bytes
            )));
        }

        let now = Utc::now();
        let ttl_secs = self
            .config
            .credential_ttl_secs
            .min(relay_core::config::MAX_UPLOAD_CREDENTIAL_SECS);
        let expires_at = now + chrono::Duration::seconds(ttl_secs as i64);

        let ext = extension_of(filename);
        let key = format!(
            "messages/{}/{}/{}",
            now.format("%Y/%m/%d"),
            Uuid::new_v4(),
            ext
        );

        let conn = self.db.lock().unwrap();
        conn.execute(
            "INSERT INTO pending_uploads
                (key, mime_type, max_size, issuer_user_id, issued_at, expires_at, consumed)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0)",
            params![
                key,
                mime_type,
                declared_size as i64,
                issuer_user_id.as_str(),
                now.to_rfc3339(),
                expires_at.to_rfc3339(),
            ],
        )?;

        let put_url = presigned_url(&self.config.presign_secret, &key, expires_at.timestamp(), "PUT");
        Ok(WriteCredential {
            key,
            put_url,
            expires_at,
        })
    }

    /// confirm(key, filename, mimeType, conversationOrAgentContext) (§4.3
    /// step 3). The compare-and-swap commit point: a second confirm for an
    /// already-consumed key fails `AlreadyConsumed` and never double-appends.
    #[allow(clippy::too_many_arguments)]
    #[instrument(skip(self))]
    pub fn confirm(
        &self,
        key: &str,
        filename: &str,
        mime_type: &str,
        author: &UserId,
        conversation_id: &ConversationId,
        agent_key: Option<AgentKey>,
        contact_id: Option<ConversationId>,
        client_temp_id: Option<String>,
    ) -> Result<(relay_messages::Message, ReadCredential)> {
        self.consume(key, mime_type)?;

        let kind = classify_kind(mime_type);
        let message = self.messages.append(NewMessage {
            conversation_id: conversation_id.clone(),
            author: author.clone(),
            kind,
            text: String::new(),
            attachment: Some(AttachmentRef {
                bucket: "default".to_string(),
                key: key.to_string(),
                filename: filename.to_string(),
                mime_type: mime_type.to_string(),
            }),
            agent_key,
            contact_id,
            client_temp_id,
        })?;

        if kind == MessageKind::Audio {
            self.spawn_transcription(key.to_string(), mime_type.to_string(), message.clone());
        }

        let expires_at = Utc::now() + chrono::Duration::seconds(self.config.credential_ttl_secs as i64);
        let get_url = presigned_url(&self.config.presign_secret, key, expires_at.timestamp(), "GET");

        Ok((message, ReadCredential { get_url, expires_at }))
    }

    /// Validate and compare-and-swap the `consumed` flag in one critical
    /// section — the only write contending with concurrent confirms of the
    /// same key (§5 "PendingUpload table... a confirm is a compare-and-set
    /// on its `consumed` flag"). A mime-type mismatch fails without
    /// consuming the slot; a race between two valid confirms leaves exactly
    /// one winner, the other observing `AlreadyConsumed`.
    fn consume(&self, key: &str, mime_type: &str) -> Result<PendingUpload> {
        let conn = self.db.lock().unwrap();

        let row: Option<(String, i64, String, String, String, bool)> = conn
            .query_row(
                "SELECT mime_type, max_size, issuer_user_id, issued_at, expires_at, consumed
                 FROM pending_uploads WHERE key = ?1",
                params![key],
                |row| {
                    Ok((
                        row.get(0)?,
                        row.get(1)?,
                        row.get(2)?,
                        row.get(3)?,
                        row.get(4)?,
                        row.get::<_, i64>(5)? != 0,
                    ))
                },
            )
            .optional()?;

        let Some((granted_mime, max_size, issuer, issued_at, expires_at_s, consumed)) = row else {
            return Err(UploadError::NotFound(key.to_string()));
        };

        if consumed {
            return Err(UploadError::AlreadyConsumed(key.to_string()));
        }

        let expires_at = chrono::DateTime::parse_from_rfc3339(&expires_at_s)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now());
        if expires_at < Utc::now() {
            return Err(UploadError::NotFound(format!("{key} expired")));
        }

        if granted_mime != mime_type {
            return Err(UploadError::Invalid(format!(
                "confirmed mime type {mime_type} does not match the granted mime type {granted_mime}"
            )));
        }

        let updated = conn.execute(
            "UPDATE pending_uploads SET consumed = 1 WHERE key = ?1 AND consumed = 0",
            params![key],
        )?;
        if updated == 0 {
            return Err(UploadError::AlreadyConsumed(key.to_string()));
        }

        Ok(PendingUpload {
            key: key.to_string(),
            mime_type: granted_mime,
            max_size: max_size as u64,
            issuer_user_id: issuer,
            issued_at: chrono::DateTime::parse_from_rfc3339(&issued_at)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now()),
            expires_at,
            consumed: true,
        })
    }

    fn spawn_transcription(&self, key: String, mime_type: String, message: relay_messages::Message) {
        let Some(transcriber) = self.transcriber.clone() else {
            return;
        };
        let messages = self.messages.clone();

        tokio::spawn(async move {
            match transcriber.transcribe(&key, &mime_type).await {
                Some(text) => {
                    let follow_up = NewMessage {
                        conversation_id: message.conversation_id.clone(),
                        author: message.author.clone(),
                        kind: MessageKind::Text,
                        text: format!("[transcription] {text}"),
                        attachment: None,
                        agent_key: message.agent_key.clone(),
                        contact_id: message.contact_id.clone(),
                        client_temp_id: None,
                    };
                    if let Err(err) = messages.append(follow_up) {
                        warn!(%err, key, "failed to persist transcription message");
                    } else {
                        info!(key, "transcription appended");
                    }
                }
                None => {
                    // Silent by design (§9 open question: transcription
                    // failures are never surfaced to the customer).
                    warn!(key, "transcription unavailable");
                }
            }
        });
    }
}

fn extension_of(filename: &str) -> String {
    filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_string())
        .unwrap_or_default()
}
