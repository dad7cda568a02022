use chrono::{DateTime, Utc};
use relay_core::types::{UserId, UserRole};
use serde::{Deserialize, Serialize};

/// `users(id, display_name, email, password_hash, role, created_at)` (§3a).
/// `password_hash` is `None` for `role = External`: an externalContact
/// authenticates via channel identity resolution, never via password.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub display_name: String,
    pub email: Option<String>,
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    pub role: UserRole,
    pub created_at: DateTime<Utc>,
}

/// Registration input before a password hash is computed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub display_name: String,
    pub email: String,
    pub password: String,
    pub role: UserRole,
}

/// A bearer credential embedding the user id and an absolute expiry (§3
/// "Users authenticate once and receive a bearer credential that embeds
/// the user id and an absolute expiry").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credential {
    pub token: String,
    pub user_id: UserId,
    pub expires_at: DateTime<Utc>,
}
