use rusqlite::Connection;

use crate::error::Result;

/// Initialise the `calendar_commitments` table (§3a).
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS calendar_commitments (
            id                  TEXT PRIMARY KEY,
            provider_event_id   TEXT,
            conversation_id     TEXT NOT NULL,
            agent_key           TEXT NOT NULL,
            customer_email      TEXT NOT NULL,
            start               TEXT NOT NULL,
            end                 TEXT NOT NULL,
            meeting_url         TEXT,
            calendar_url        TEXT,
            status              TEXT NOT NULL,
            attendees           TEXT NOT NULL DEFAULT '',
            notes               TEXT,
            dedup_key           TEXT NOT NULL
        );

        CREATE UNIQUE INDEX IF NOT EXISTS idx_commitments_dedup_key
            ON calendar_commitments(dedup_key);

        CREATE INDEX IF NOT EXISTS idx_commitments_conversation
            ON calendar_commitments(conversation_id);",
    )?;
    Ok(())
}
