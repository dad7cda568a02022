use rusqlite::{Connection, Result};

/// Initialize the users subsystem's tables. Idempotent via `CREATE TABLE IF
/// NOT EXISTS`, matching the rest of the persistence layer's convention.
pub fn init_db(conn: &Connection) -> Result<()> {
    create_users_table(conn)?;
    create_external_contacts_table(conn)?;
    Ok(())
}

fn create_users_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS users (
            id            TEXT PRIMARY KEY NOT NULL,
            display_name  TEXT NOT NULL,
            email         TEXT UNIQUE,
            password_hash TEXT,
            role          TEXT NOT NULL DEFAULT 'external',
            created_at    TEXT NOT NULL
        );",
    )
}

/// `external_contacts(id, channel, channel_native_id, display_name,
/// created_at)` (§3a). `id` is shared with the matching `users` row created
/// at the same time — this table is the linked-identity side of the pair,
/// generalized from the teacher's `user_identities` down to the 1:1
/// relationship an externalContact actually has with its channel identity.
fn create_external_contacts_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS external_contacts (
            id                TEXT PRIMARY KEY NOT NULL REFERENCES users(id),
            channel           TEXT NOT NULL,
            channel_native_id TEXT NOT NULL,
            display_name      TEXT NOT NULL,
            created_at        TEXT NOT NULL,
            UNIQUE(channel, channel_native_id)
        );
        CREATE INDEX IF NOT EXISTS idx_external_contacts_lookup
            ON external_contacts (channel, channel_native_id);",
    )
}
