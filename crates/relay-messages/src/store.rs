use std::sync::Mutex;

use chrono::{DateTime, Utc};
use relay_core::types::{
    AgentKey, ConversationId, DeliveryStatus, MessageId, MessageKind, UserId,
};
use rusqlite::{params, OptionalExtension, Row};
use tracing::{debug, instrument, warn};

use crate::error::{MessageError, Result};
use crate::types::{AttachmentRef, Message, MessagePage, NewMessage, PeerSummary};

/// Default and hard-maximum page size for `get` (§4.1: "bounded by a
/// server-side hard maximum").
const DEFAULT_PAGE_LIMIT: u32 = 50;
const MAX_PAGE_LIMIT: u32 = 200;

/// Canonicalize a {userA, userB} pair by id ordering (§3 Conversation).
pub fn canonical_pair(a: &UserId, b: &UserId) -> (UserId, UserId) {
    if a.as_str() <= b.as_str() {
        (a.clone(), b.clone())
    } else {
        (b.clone(), a.clone())
    }
}

/// The Message Store (§4.1): durable persistence, ordered retrieval,
/// delivery-state transitions, and read cursors.
///
/// Mirrors the teacher's `SessionManager`/`MemoryManager` shape: a single
/// `Mutex<Connection>` guarding all writes, with insert-or-ignore-then-read-
/// back used wherever two callers might race to create the same row.
pub struct MessageStore {
    db: Mutex<rusqlite::Connection>,
    /// Per-conversation last-assigned timestamp, so bursts within the same
    /// wall-clock millisecond still produce strictly non-decreasing (I2)
    /// timestamps without changing the on-disk representation.
    last_timestamp: Mutex<std::collections::HashMap<String, DateTime<Utc>>>,
}

impl MessageStore {
    pub fn new(conn: rusqlite::Connection) -> Result<Self> {
        crate::db::init_db(&conn)?;
        Ok(Self {
            db: Mutex::new(conn),
            last_timestamp: Mutex::new(std::collections::HashMap::new()),
        })
    }

    /// Get the existing conversation for this pair, or create it. The pair
    /// is canonicalized first so {Alice,Bob} and {Bob,Alice} resolve to the
    /// same row.
    #[instrument(skip(self))]
    pub fn get_or_create_conversation(&self, a: &UserId, b: &UserId) -> Result<ConversationId> {
        let (pa, pb) = canonical_pair(a, b);
        let conn = self.db.lock().unwrap();

        if let Some(id) = conn
            .query_row(
                "SELECT id FROM conversations WHERE participant_a = ?1 AND participant_b = ?2",
                params![pa.as_str(), pb.as_str()],
                |row| row.get::<_, String>(0),
            )
            .optional()?
        {
            return Ok(ConversationId::from(id));
        }

        let id = ConversationId::new();
        let now = Utc::now().to_rfc3339();
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO conversations (id, participant_a, participant_b, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![id.as_str(), pa.as_str(), pb.as_str(), now],
        )?;

        if inserted == 0 {
            // Lost the race to a concurrent creator; read back their row.
            let existing: String = conn.query_row(
                "SELECT id FROM conversations WHERE participant_a = ?1 AND participant_b = ?2",
                params![pa.as_str(), pb.as_str()],
                |row| row.get(0),
            )?;
            return Ok(ConversationId::from(existing));
        }

        Ok(id)
    }

    /// append(message) → storedMessage (§4.1). Idempotent on `clientTempId`:
    /// a retried append with an already-stored tempId returns the existing
    /// row rather than inserting a duplicate (§8 round-trip law).
    #[instrument(skip(self, message), fields(conversation_id = %message.conversation_id))]
    pub fn append(&self, message: NewMessage) -> Result<Message> {
        if message.kind != MessageKind::Text && message.attachment.is_none() {
            return Err(MessageError::Invalid(
                "non-text message requires an attachment (I4)".to_string(),
            ));
        }
        if message.kind == MessageKind::Text && message.text.trim().is_empty() {
            return Err(MessageError::Invalid(
                "text message requires non-empty text (I4)".to_string(),
            ));
        }

        let conn = self.db.lock().unwrap();

        if let Some(temp_id) = &message.client_temp_id {
            if let Some(existing) = conn
                .query_row(
                    "SELECT id FROM messages WHERE author = ?1 AND client_temp_id = ?2",
                    params![message.author.as_str(), temp_id],
                    |row| row.get::<_, String>(0),
                )
                .optional()?
            {
                debug!(temp_id, "append is a retry; returning existing message");
                return self.get_by_id_locked(&conn, &MessageId::from(existing));
            }
        }

        let id = MessageId::new();
        let timestamp = self.next_timestamp(&message.conversation_id);

        let (bucket, key, filename, mime) = match &message.attachment {
            Some(a) => (
                Some(a.bucket.clone()),
                Some(a.key.clone()),
                Some(a.filename.clone()),
                Some(a.mime_type.clone()),
            ),
            None => (None, None, None, None),
        };

        conn.execute(
            "INSERT INTO messages (
                id, conversation_id, author, kind, text,
                attachment_bucket, attachment_key, attachment_filename, attachment_mime,
                status, agent_key, contact_id, client_temp_id, timestamp
             ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14)",
            params![
                id.as_str(),
                message.conversation_id.as_str(),
                message.author.as_str(),
                kind_to_str(message.kind),
                message.text,
                bucket,
                key,
                filename,
                mime,
                status_to_str(DeliveryStatus::Sent),
                message.agent_key.as_ref().map(|k| k.as_str()),
                message.contact_id.as_ref().map(|c| c.as_str()),
                message.client_temp_id,
                timestamp.to_rfc3339(),
            ],
        )?;

        self.get_by_id_locked(&conn, &id)
    }

    /// get(conversation, before?, limit) — lazy reverse-chronological page.
    #[instrument(skip(self))]
    pub fn get(
        &self,
        conversation_id: &ConversationId,
        before: Option<&MessageId>,
        limit: Option<u32>,
    ) -> Result<MessagePage> {
        let limit = limit.unwrap_or(DEFAULT_PAGE_LIMIT).min(MAX_PAGE_LIMIT);
        let conn = self.db.lock().unwrap();

        let mut rows = if let Some(before_id) = before {
            let before_ts: Option<String> = conn
                .query_row(
                    "SELECT timestamp FROM messages WHERE id = ?1",
                    params![before_id.as_str()],
                    |row| row.get(0),
                )
                .optional()?;
            let Some(before_ts) = before_ts else {
                return Ok(MessagePage {
                    messages: vec![],
                    next_before: None,
                });
            };
            let mut stmt = conn.prepare(
                "SELECT * FROM messages
                 WHERE conversation_id = ?1 AND timestamp < ?2
                 ORDER BY timestamp DESC LIMIT ?3",
            )?;
            let rows = stmt
                .query_map(
                    params![conversation_id.as_str(), before_ts, limit],
                    row_to_message,
                )?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows
        } else {
            let mut stmt = conn.prepare(
                "SELECT * FROM messages WHERE conversation_id = ?1
                 ORDER BY timestamp DESC LIMIT ?2",
            )?;
            stmt.query_map(params![conversation_id.as_str(), limit], row_to_message)?
                .collect::<std::result::Result<Vec<_>, _>>()?
        };

        let next_before = rows.last().map(|m| m.id.clone());
        rows.truncate(limit as usize);
        Ok(MessagePage {
            messages: rows,
            next_before,
        })
    }

    /// transition(messageId, newStatus) — applies I3; a downgrade is a
    /// silent no-op, not an error. A missing message also silently no-ops
    /// (logged, never surfaced — §4.1 failure semantics).
    #[instrument(skip(self))]
    pub fn transition(&self, message_id: &MessageId, new_status: DeliveryStatus) -> Result<()> {
        let conn = self.db.lock().unwrap();
        let current: Option<String> = conn
            .query_row(
                "SELECT status FROM messages WHERE id = ?1",
                params![message_id.as_str()],
                |row| row.get(0),
            )
            .optional()?;

        let Some(current) = current else {
            warn!(message_id = %message_id, "transition on missing message; no-op");
            return Ok(());
        };

        let current = str_to_status(&current);
        if new_status <= current {
            return Ok(());
        }

        conn.execute(
            "UPDATE messages SET status = ?1 WHERE id = ?2",
            params![status_to_str(new_status), message_id.as_str()],
        )?;
        Ok(())
    }

    /// mark_conversation_read(conversationId, readerUserId, asOf?) — advances
    /// every message authored by the peer and not yet read, up to `asOf`, to
    /// `read`. Idempotent: a repeat call with the same `asOf` advances zero
    /// rows the second time.
    #[instrument(skip(self))]
    pub fn mark_conversation_read(
        &self,
        conversation_id: &ConversationId,
        reader: &UserId,
        as_of: Option<DateTime<Utc>>,
    ) -> Result<Vec<MessageId>> {
        let as_of = as_of.unwrap_or_else(Utc::now);
        let conn = self.db.lock().unwrap();

        let mut stmt = conn.prepare(
            "SELECT id FROM messages
             WHERE conversation_id = ?1 AND author != ?2
               AND status != 'read' AND timestamp <= ?3",
        )?;
        let ids: Vec<String> = stmt
            .query_map(
                params![conversation_id.as_str(), reader.as_str(), as_of.to_rfc3339()],
                |row| row.get(0),
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        if ids.is_empty() {
            return Ok(vec![]);
        }

        conn.execute(
            "UPDATE messages SET status = 'read'
             WHERE conversation_id = ?1 AND author != ?2
               AND status != 'read' AND timestamp <= ?3",
            params![conversation_id.as_str(), reader.as_str(), as_of.to_rfc3339()],
        )?;

        Ok(ids.into_iter().map(MessageId::from).collect())
    }

    /// recent_per_peer(userId) — most recent message and unread count per peer.
    #[instrument(skip(self))]
    pub fn recent_per_peer(&self, user_id: &UserId) -> Result<Vec<PeerSummary>> {
        let conn = self.db.lock().unwrap();

        let mut stmt = conn.prepare(
            "SELECT id, participant_a, participant_b FROM conversations
             WHERE participant_a = ?1 OR participant_b = ?1",
        )?;
        let conversations: Vec<(String, String, String)> = stmt
            .query_map(params![user_id.as_str()], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut summaries = Vec::with_capacity(conversations.len());
        for (conv_id, a, b) in conversations {
            let peer = if a == user_id.as_str() { b } else { a };

            let last: Option<Message> = conn
                .query_row(
                    "SELECT * FROM messages WHERE conversation_id = ?1
                     ORDER BY timestamp DESC LIMIT 1",
                    params![conv_id],
                    row_to_message,
                )
                .optional()?;

            let Some(last_message) = last else {
                continue;
            };

            let unread_count: u64 = conn.query_row(
                "SELECT COUNT(*) FROM messages
                 WHERE conversation_id = ?1 AND author = ?2 AND status != 'read'",
                params![conv_id, peer],
                |row| row.get(0),
            )?;

            summaries.push(PeerSummary {
                peer: UserId::from(peer),
                conversation_id: ConversationId::from(conv_id),
                last_message,
                unread_count,
            });
        }

        Ok(summaries)
    }

    /// Global recent feed across every conversation, newest first. Debug/
    /// admin surface only (§6 `GET /messages?limit=`) — not part of the
    /// per-conversation delivery contract.
    #[instrument(skip(self))]
    pub fn recent_global(&self, limit: u32) -> Result<Vec<Message>> {
        let limit = limit.min(MAX_PAGE_LIMIT);
        let conn = self.db.lock().unwrap();
        let mut stmt = conn.prepare("SELECT * FROM messages ORDER BY timestamp DESC LIMIT ?1")?;
        let rows = stmt
            .query_map(params![limit], row_to_message)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn get_by_id_locked(
        &self,
        conn: &rusqlite::Connection,
        id: &MessageId,
    ) -> Result<Message> {
        conn.query_row(
            "SELECT * FROM messages WHERE id = ?1",
            params![id.as_str()],
            row_to_message,
        )
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => {
                MessageError::NotFound(id.as_str().to_string())
            }
            other => MessageError::Database(other),
        })
    }

    /// Ensure timestamps within a conversation are strictly non-decreasing
    /// (I2) even for messages appended within the same wall-clock instant.
    fn next_timestamp(&self, conversation_id: &ConversationId) -> DateTime<Utc> {
        let mut last = self.last_timestamp.lock().unwrap();
        let now = Utc::now();
        let key = conversation_id.as_str().to_string();
        let next = match last.get(&key) {
            Some(prev) if *prev >= now => *prev + chrono::Duration::microseconds(1),
            _ => now,
        };
        last.insert(key, next);
        next
    }
}

fn kind_to_str(kind: MessageKind) -> &'static str {
    match kind {
        MessageKind::Text => "text",
        MessageKind::Image => "image",
        MessageKind::Audio => "audio",
        MessageKind::File => "file",
    }
}

fn str_to_kind(s: &str) -> MessageKind {
    match s {
        "image" => MessageKind::Image,
        "audio" => MessageKind::Audio,
        "file" => MessageKind::File,
        _ => MessageKind::Text,
    }
}

fn status_to_str(status: DeliveryStatus) -> &'static str {
    match status {
        DeliveryStatus::Pending => "pending",
        DeliveryStatus::Sent => "sent",
        DeliveryStatus::Delivered => "delivered",
        DeliveryStatus::Read => "read",
    }
}

fn str_to_status(s: &str) -> DeliveryStatus {
    match s {
        "pending" => DeliveryStatus::Pending,
        "delivered" => DeliveryStatus::Delivered,
        "read" => DeliveryStatus::Read,
        _ => DeliveryStatus::Sent,
    }
}

fn row_to_message(row: &Row) -> rusqlite::Result<Message> {
    let attachment_key: Option<String> = row.get("attachment_key")?;
    let attachment = attachment_key.map(|key| AttachmentRef {
        bucket: row.get("attachment_bucket").unwrap_or_default(),
        key,
        filename: row.get("attachment_filename").unwrap_or_default(),
        mime_type: row.get("attachment_mime").unwrap_or_default(),
    });

    let timestamp: String = row.get("timestamp")?;
    let timestamp = DateTime::parse_from_rfc3339(&timestamp)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now());

    Ok(Message {
        id: MessageId::from(row.get::<_, String>("id")?),
        conversation_id: ConversationId::from(row.get::<_, String>("conversation_id")?),
        author: UserId::from(row.get::<_, String>("author")?),
        kind: str_to_kind(&row.get::<_, String>("kind")?),
        text: row.get("text")?,
        attachment,
        status: str_to_status(&row.get::<_, String>("status")?),
        agent_key: row.get::<_, Option<String>>("agent_key")?.map(AgentKey),
        contact_id: row
            .get::<_, Option<String>>("contact_id")?
            .map(ConversationId::from),
        client_temp_id: row.get("client_temp_id")?,
        timestamp,
    })
}
