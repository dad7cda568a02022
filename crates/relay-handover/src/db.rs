use rusqlite::Connection;

use crate::error::Result;

/// Initialise the `handover_tickets` table (§3a). Safe to call on every
/// startup — uses `IF NOT EXISTS` throughout.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS handover_tickets (
            id                TEXT PRIMARY KEY,
            conversation_id   TEXT NOT NULL,
            customer_name     TEXT,
            customer_email    TEXT,
            customer_phone    TEXT,
            reason            TEXT NOT NULL,
            priority          INTEGER NOT NULL,
            status            TEXT NOT NULL,
            created_at        TEXT NOT NULL,
            accepted_at       TEXT,
            resolved_at       TEXT,
            assigned_agent    TEXT,
            context_snapshot  TEXT NOT NULL,
            resolution_notes  TEXT,
            tags              TEXT NOT NULL DEFAULT ''
        );

        CREATE INDEX IF NOT EXISTS idx_handover_conversation
            ON handover_tickets(conversation_id, status);

        CREATE INDEX IF NOT EXISTS idx_handover_status_priority
            ON handover_tickets(status, priority);",
    )?;
    Ok(())
}
