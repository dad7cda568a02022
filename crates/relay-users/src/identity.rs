use chrono::Utc;
use relay_core::types::{UserId, UserRole};
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{Result, UserError};
use crate::types::User;

const USER_SELECT_SQL: &str =
    "SELECT id, display_name, email, password_hash, role, created_at FROM users WHERE id = ?1";

/// Insert a brand-new, password-authenticated user row (§3 "Users
/// authenticate once and receive a bearer credential"). Caller already
/// hashed the password.
pub fn create_user(
    conn: &Connection,
    display_name: &str,
    email: &str,
    password_hash: &str,
    role: UserRole,
) -> Result<User> {
    let id = UserId::new();
    let now = Utc::now();
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO users (id, display_name, email, password_hash, role, created_at)
         VALUES (?1,?2,?3,?4,?5,?6)",
        params![
            id.as_str(),
            display_name,
            email,
            password_hash,
            role.to_string(),
            now.to_rfc3339(),
        ],
    )?;

    if inserted == 0 {
        return Err(UserError::AlreadyExists(email.to_string()));
    }

    get_user(conn, &id)?.ok_or_else(|| UserError::NotFound(id.as_str().to_string()))
}

pub fn get_user(conn: &Connection, user_id: &UserId) -> Result<Option<User>> {
    conn.query_row(USER_SELECT_SQL, params![user_id.as_str()], row_to_user)
        .optional()
        .map_err(UserError::Database)
}

pub fn find_by_email(conn: &Connection, email: &str) -> Result<Option<User>> {
    conn.query_row(
        "SELECT id, display_name, email, password_hash, role, created_at
         FROM users WHERE email = ?1",
        params![email],
        row_to_user,
    )
    .optional()
    .map_err(UserError::Database)
}

/// Materialize a brand-new externalContact: a `users` row tagged
/// `role=external` plus a linked `external_contacts` row sharing its id
/// (§3a). Uses a transaction since the two inserts must land together.
pub fn create_external_contact(
    conn: &Connection,
    channel: &str,
    channel_native_id: &str,
    display_name: &str,
) -> Result<User> {
    let id = UserId::new();
    let now = Utc::now();

    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "INSERT INTO users (id, display_name, email, password_hash, role, created_at)
         VALUES (?1,?2,NULL,NULL,?3,?4)",
        params![id.as_str(), display_name, UserRole::External.to_string(), now.to_rfc3339()],
    )?;
    tx.execute(
        "INSERT INTO external_contacts (id, channel, channel_native_id, display_name, created_at)
         VALUES (?1,?2,?3,?4,?5)",
        params![id.as_str(), channel, channel_native_id, display_name, now.to_rfc3339()],
    )?;
    tx.commit()?;

    get_user(conn, &id)?.ok_or_else(|| UserError::NotFound(id.as_str().to_string()))
}

/// Cross-channel lookup: given a channel + its native id, return the
/// materialized externalContact user, if any. Hot path: called on every
/// inbound channel message.
pub fn find_external_contact(
    conn: &Connection,
    channel: &str,
    channel_native_id: &str,
) -> Result<Option<User>> {
    conn.query_row(
        "SELECT u.id, u.display_name, u.email, u.password_hash, u.role, u.created_at
         FROM users u
         JOIN external_contacts e ON e.id = u.id
         WHERE e.channel = ?1 AND e.channel_native_id = ?2",
        params![channel, channel_native_id],
        row_to_user,
    )
    .optional()
    .map_err(UserError::Database)
}

fn row_to_user(row: &rusqlite::Row) -> rusqlite::Result<User> {
    let role: String = row.get(4)?;
    let created_at: String = row.get(5)?;
    Ok(User {
        id: UserId(row.get(0)?),
        display_name: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get(3)?,
        role: role.parse().unwrap_or_default(),
        created_at: chrono::DateTime::parse_from_rfc3339(&created_at)
            .map(|d| d.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
    })
}
