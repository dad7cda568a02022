use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use tracing::info;

use crate::error::AgentError;

/// A tenant-defined custom agent (§3a `custom_agents`, §4.5). The
/// `provider_label` names the concrete `LlmProvider` implementation to
/// invoke; `credential_handle` is opaque to the core — it is resolved to a
/// real API key by whatever wires up the provider, never stored here in the
/// clear.
#[derive(Debug, Clone, Serialize)]
pub struct CustomAgentRow {
    pub key: String,
    pub display_name: String,
    pub emoji: String,
    pub system_prompt: String,
    pub allowed_tools: Vec<String>,
    pub credential_handle: String,
    pub provider_label: String,
    pub created_at: DateTime<Utc>,
}

/// Fields accepted when creating or updating a custom agent.
#[derive(Debug, Clone)]
pub struct NewCustomAgent {
    pub key: String,
    pub display_name: String,
    pub emoji: String,
    pub system_prompt: String,
    pub allowed_tools: Vec<String>,
    pub credential_handle: String,
    pub provider_label: String,
}

/// Persistence for custom agents, grounded on the same `Mutex<Connection>`
/// manager shape `relay-messages::MessageStore` and `relay-uploads::UploadBroker`
/// use.
pub struct AgentStore {
    db: Mutex<Connection>,
}

impl AgentStore {
    pub fn open(conn: Connection) -> Result<Self, AgentError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS custom_agents (
                key                 TEXT PRIMARY KEY,
                display_name        TEXT NOT NULL,
                emoji               TEXT NOT NULL,
                system_prompt       TEXT NOT NULL,
                allowed_tools       TEXT NOT NULL,
                credential_handle   TEXT NOT NULL,
                provider_label      TEXT NOT NULL,
                created_at          TEXT NOT NULL
            );",
        )?;
        Ok(Self { db: Mutex::new(conn) })
    }

    pub fn create(&self, new_agent: NewCustomAgent) -> Result<CustomAgentRow, AgentError> {
        let created_at = Utc::now();
        let allowed_tools = new_agent.allowed_tools.join(",");
        let db = self.db.lock().unwrap();
        let inserted = db
            .execute(
                "INSERT OR IGNORE INTO custom_agents
                    (key, display_name, emoji, system_prompt, allowed_tools,
                     credential_handle, provider_label, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    new_agent.key,
                    new_agent.display_name,
                    new_agent.emoji,
                    new_agent.system_prompt,
                    allowed_tools,
                    new_agent.credential_handle,
                    new_agent.provider_label,
                    created_at.to_rfc3339(),
                ],
            )
            .map_err(AgentError::Database)?;

        if inserted == 0 {
            return Err(AgentError::AlreadyExists(new_agent.key));
        }

        info!(key = %new_agent.key, "custom agent created");
        get_by_key_locked(&db, &new_agent.key)?.ok_or_else(|| AgentError::NotFound(new_agent.key))
    }

    pub fn get(&self, key: &str) -> Result<Option<CustomAgentRow>, AgentError> {
        let db = self.db.lock().unwrap();
        get_by_key_locked(&db, key)
    }

    pub fn list(&self) -> Result<Vec<CustomAgentRow>, AgentError> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(
            "SELECT key, display_name, emoji, system_prompt, allowed_tools,
                    credential_handle, provider_label, created_at
             FROM custom_agents ORDER BY created_at ASC",
        )?;
        let rows = stmt
            .query_map([], row_to_agent)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn delete(&self, key: &str) -> Result<(), AgentError> {
        let db = self.db.lock().unwrap();
        let affected = db.execute("DELETE FROM custom_agents WHERE key = ?1", params![key])?;
        if affected == 0 {
            return Err(AgentError::NotFound(key.to_string()));
        }
        Ok(())
    }

    pub fn update_prompt(&self, key: &str, system_prompt: &str) -> Result<CustomAgentRow, AgentError> {
        let db = self.db.lock().unwrap();
        let affected = db.execute(
            "UPDATE custom_agents SET system_prompt = ?1 WHERE key = ?2",
            params![system_prompt, key],
        )?;
        if affected == 0 {
            return Err(AgentError::NotFound(key.to_string()));
        }
        get_by_key_locked(&db, key)?.ok_or_else(|| AgentError::NotFound(key.to_string()))
    }
}

fn get_by_key_locked(db: &Connection, key: &str) -> Result<Option<CustomAgentRow>, AgentError> {
    db.query_row(
        "SELECT key, display_name, emoji, system_prompt, allowed_tools,
                credential_handle, provider_label, created_at
         FROM custom_agents WHERE key = ?1",
        params![key],
        row_to_agent,
    )
    .optional()
    .map_err(AgentError::Database)
}

fn row_to_agent(row: &rusqlite::Row) -> rusqlite::Result<CustomAgentRow> {
    let allowed_tools: String = row.get(4)?;
    let created_at: String = row.get(7)?;
    Ok(CustomAgentRow {
        key: row.get(0)?,
        display_name: row.get(1)?,
        emoji: row.get(2)?,
        system_prompt: row.get(3)?,
        allowed_tools: if allowed_tools.is_empty() {
            Vec::new()
        } else {
            allowed_tools.split(',').map(str::to_string).collect()
        },
        credential_handle: row.get(5)?,
        provider_label: row.get(6)?,
        created_at: DateTime::parse_from_rfc3339(&created_at)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> AgentStore {
        AgentStore::open(Connection::open_in_memory().unwrap()).unwrap()
    }

    fn new_agent(key: &str) -> NewCustomAgent {
        NewCustomAgent {
            key: key.to_string(),
            display_name: "Billing Bot".to_string(),
            emoji: "💳".to_string(),
            system_prompt: "You help with billing questions.".to_string(),
            allowed_tools: vec!["fetch_availability".to_string()],
            credential_handle: "cred-123".to_string(),
            provider_label: "anthropic".to_string(),
        }
    }

    #[test]
    fn create_and_get_round_trip() {
        let store = store();
        let created = store.create(new_agent("billing")).unwrap();
        assert_eq!(created.key, "billing");
        assert_eq!(created.allowed_tools, vec!["fetch_availability".to_string()]);

        let fetched = store.get("billing").unwrap().unwrap();
        assert_eq!(fetched.display_name, "Billing Bot");
    }

    #[test]
    fn create_is_rejected_on_duplicate_key() {
        let store = store();
        store.create(new_agent("billing")).unwrap();
        let err = store.create(new_agent("billing")).unwrap_err();
        assert!(matches!(err, AgentError::AlreadyExists(_)));
    }

    #[test]
    fn delete_removes_agent() {
        let store = store();
        store.create(new_agent("billing")).unwrap();
        store.delete("billing").unwrap();
        assert!(store.get("billing").unwrap().is_none());
    }

    #[test]
    fn list_orders_by_creation() {
        let store = store();
        store.create(new_agent("first")).unwrap();
        store.create(new_agent("second")).unwrap();
        let rows = store.list().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].key, "first");
        assert_eq!(rows[1].key, "second");
    }
}
