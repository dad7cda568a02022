use rusqlite::Connection;

use crate::error::Result;

/// Initialise the conversations/messages tables and their indexes.
///
/// Safe to call on every startup — uses `IF NOT EXISTS` throughout.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS conversations (
            id             TEXT PRIMARY KEY,
            participant_a  TEXT NOT NULL,
            participant_b  TEXT NOT NULL,
            created_at     TEXT NOT NULL,
            UNIQUE(participant_a, participant_b)
        );

        CREATE TABLE IF NOT EXISTS messages (
            id                  TEXT PRIMARY KEY,
            conversation_id     TEXT NOT NULL,
            author              TEXT NOT NULL,
            kind                TEXT NOT NULL,
            text                TEXT NOT NULL DEFAULT '',
            attachment_bucket   TEXT,
            attachment_key      TEXT,
            attachment_filename TEXT,
            attachment_mime     TEXT,
            status              TEXT NOT NULL,
            agent_key           TEXT,
            contact_id          TEXT,
            client_temp_id      TEXT,
            timestamp           TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_messages_conversation
            ON messages(conversation_id, timestamp);

        CREATE UNIQUE INDEX IF NOT EXISTS idx_messages_temp_id
            ON messages(author, client_temp_id)
            WHERE client_temp_id IS NOT NULL;",
    )?;
    Ok(())
}
