use chrono::{DateTime, Utc};
use relay_core::types::MessageKind;
use serde::{Deserialize, Serialize};

/// A pending, not-yet-confirmed upload slot (§3a `pending_uploads`).
#[derive(Debug, Clone)]
pub struct PendingUpload {
    pub key: String,
    pub mime_type: String,
    pub max_size: u64,
    pub issuer_user_id: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub consumed: bool,
}

/// Returned by `grant` — the object key plus a time-bounded write credential.
#[derive(Debug, Clone, Serialize)]
pub struct WriteCredential {
    pub key: String,
    pub put_url: String,
    pub expires_at: DateTime<Utc>,
}

/// Returned by `confirm` — a short-lived read credential for immediate
/// display, alongside the materialized message id.
#[derive(Debug, Clone, Serialize)]
pub struct ReadCredential {
    pub get_url: String,
    pub expires_at: DateTime<Utc>,
}

pub fn classify_kind(mime_type: &str) -> MessageKind {
    if mime_type.starts_with("image/") {
        MessageKind::Image
    } else if mime_type.starts_with("audio/") {
        MessageKind::Audio
    } else {
        MessageKind::File
    }
}
