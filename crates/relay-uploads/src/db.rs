use rusqlite::Connection;

use crate::error::Result;

/// Safe to call on every startup — `IF NOT EXISTS` throughout, mirroring
/// the teacher's session-store init idiom.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS pending_uploads (
            key             TEXT PRIMARY KEY,
            mime_type       TEXT NOT NULL,
            max_size        INTEGER NOT NULL,
            issuer_user_id  TEXT NOT NULL,
            issued_at       TEXT NOT NULL,
            expires_at      TEXT NOT NULL,
            consumed        INTEGER NOT NULL DEFAULT 0
        );

        CREATE INDEX IF NOT EXISTS idx_pending_uploads_issuer
            ON pending_uploads(issuer_user_id);",
    )?;
    Ok(())
}
