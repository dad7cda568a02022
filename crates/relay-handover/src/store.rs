use std::sync::Mutex;

use chrono::{DateTime, Utc};
use relay_core::types::{ConversationId, HandoverTicketId, UserId};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{info, warn};

use crate::db::init_db;
use crate::error::{HandoverError, Result};
use crate::types::{
    resolve_trigger, ContextSnapshot, HandoverTicket, NewHandoverTicket, TicketFilter,
    TicketStats, TicketStatus,
};

/// Persistence and lifecycle for the handover queue (§4.6), grounded on the
/// same `Mutex<Connection>` manager shape as `relay-messages::MessageStore`
/// and the compare-and-swap idiom `SchedulerEngine::tick` uses for "collect
/// all due conditions, then commit a single transition."
pub struct HandoverQueue {
    db: Mutex<Connection>,
}

impl HandoverQueue {
    pub fn open(conn: Connection) -> Result<Self> {
        init_db(&conn)?;
        Ok(Self { db: Mutex::new(conn) })
    }

    /// Open a new ticket. Priority is the max over every trigger reason that
    /// fired on this inbound message; the recorded reason is the single
    /// highest-priority one (§4.6 implementation note).
    pub fn create(&self, new_ticket: NewHandoverTicket) -> Result<HandoverTicket> {
        let (reason, priority) = resolve_trigger(&new_ticket.fired_reasons)
            .ok_or_else(|| HandoverError::Conflict("no trigger reason supplied".to_string()))?;

        let id = HandoverTicketId::new();
        let created_at = Utc::now();
        let snapshot_json = serde_json::to_string(&new_ticket.context_snapshot)
            .unwrap_or_else(|_| "{}".to_string());

        let db = self.db.lock().unwrap();
        db.execute(
            "INSERT INTO handover_tickets
                (id, conversation_id, customer_name, customer_email, customer_phone,
                 reason, priority, status, created_at, accepted_at, resolved_at,
                 assigned_agent, context_snapshot, resolution_notes, tags)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 'pending', ?8, NULL, NULL, NULL, ?9, NULL, '')",
            params![
                id.as_str(),
                new_ticket.conversation_id.as_str(),
                new_ticket.customer_name,
                new_ticket.customer_email,
                new_ticket.customer_phone,
                reason.as_str(),
                priority,
                created_at.to_rfc3339(),
                snapshot_json,
            ],
        )?;

        info!(ticket_id = %id, conversation_id = %new_ticket.conversation_id, reason = reason.as_str(), priority, "handover ticket opened");

        get_by_id_locked(&db, id.as_str())?.ok_or_else(|| HandoverError::NotFound(id.0.clone()))
    }

    pub fn get(&self, id: &HandoverTicketId) -> Result<Option<HandoverTicket>> {
        let db = self.db.lock().unwrap();
        get_by_id_locked(&db, id.as_str())
    }

    /// True if `conversation_id` has a pending, accepted, or in-progress
    /// ticket — the Router (§4.8 step 3) consults this before dispatching to
    /// any bot.
    pub fn has_open_ticket(&self, conversation_id: &ConversationId) -> Result<bool> {
        let db = self.db.lock().unwrap();
        let count: i64 = db.query_row(
            "SELECT COUNT(*) FROM handover_tickets
             WHERE conversation_id = ?1 AND status IN ('pending', 'accepted', 'in_progress')",
            params![conversation_id.as_str()],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    pub fn list(&self, filter: TicketFilter) -> Result<Vec<HandoverTicket>> {
        let db = self.db.lock().unwrap();
        let limit = if filter.limit == 0 { 50 } else { filter.limit.min(200) };

        let mut sql = String::from(
            "SELECT id, conversation_id, customer_name, customer_email, customer_phone,
                    reason, priority, status, created_at, accepted_at, resolved_at,
                    assigned_agent, context_snapshot, resolution_notes, tags
             FROM handover_tickets WHERE 1 = 1",
        );
        if filter.status.is_some() {
            sql.push_str(" AND status = ?1");
        }
        if filter.min_priority.is_some() {
            sql.push_str(" AND priority >= ?2");
        }
        sql.push_str(" ORDER BY priority DESC, created_at ASC LIMIT ?3");

        let mut stmt = db.prepare(&sql)?;
        let status_str = filter.status.map(|s| s.as_str().to_string()).unwrap_or_default();
        let min_priority = filter.min_priority.unwrap_or(0);
        let rows = stmt
            .query_map(params![status_str, min_priority, limit], row_to_ticket)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Compare-and-swap: pending → accepted. At most one caller succeeds.
    pub fn accept(&self, id: &HandoverTicketId, human_user_id: &UserId) -> Result<HandoverTicket> {
        let db = self.db.lock().unwrap();
        let accepted_at = Utc::now().to_rfc3339();
        let affected = db.execute(
            "UPDATE handover_tickets SET status = 'accepted', accepted_at = ?1, assigned_agent = ?2
             WHERE id = ?3 AND status = 'pending'",
            params![accepted_at, human_user_id.as_str(), id.as_str()],
        )?;
        if affected == 0 {
            return Err(HandoverError::Conflict(id.0.clone()));
        }
        info!(ticket_id = %id, agent = %human_user_id, "handover ticket accepted");
        get_by_id_locked(&db, id.as_str())?.ok_or_else(|| HandoverError::NotFound(id.0.clone()))
    }

    /// Compare-and-swap: accepted → in_progress.
    pub fn mark_in_progress(&self, id: &HandoverTicketId) -> Result<HandoverTicket> {
        let db = self.db.lock().unwrap();
        let affected = db.execute(
            "UPDATE handover_tickets SET status = 'in_progress' WHERE id = ?1 AND status = 'accepted'",
            params![id.as_str()],
        )?;
        if affected == 0 {
            return Err(HandoverError::Conflict(id.0.clone()));
        }
        get_by_id_locked(&db, id.as_str())?.ok_or_else(|| HandoverError::NotFound(id.0.clone()))
    }

    /// Appends a resolution note and transitions to `resolved` from any open
    /// state. After this, new inbound messages in the conversation re-enter
    /// normal Router logic (§4.6).
    pub fn resolve(&self, id: &HandoverTicketId, notes: &str) -> Result<HandoverTicket> {
        let db = self.db.lock().unwrap();
        let resolved_at = Utc::now().to_rfc3339();
        let affected = db.execute(
            "UPDATE handover_tickets SET status = 'resolved', resolved_at = ?1, resolution_notes = ?2
             WHERE id = ?3 AND status IN ('pending', 'accepted', 'in_progress')",
            params![resolved_at, notes, id.as_str()],
        )?;
        if affected == 0 {
            return Err(HandoverError::Conflict(id.0.clone()));
        }
        info!(ticket_id = %id, "handover ticket resolved");
        get_by_id_locked(&db, id.as_str())?.ok_or_else(|| HandoverError::NotFound(id.0.clone()))
    }

    pub fn cancel(&self, id: &HandoverTicketId) -> Result<HandoverTicket> {
        let db = self.db.lock().unwrap();
        let affected = db.execute(
            "UPDATE handover_tickets SET status = 'cancelled' WHERE id = ?1 AND status IN ('pending', 'accepted', 'in_progress')",
            params![id.as_str()],
        )?;
        if affected == 0 {
            return Err(HandoverError::Conflict(id.0.clone()));
        }
        warn!(ticket_id = %id, "handover ticket cancelled");
        get_by_id_locked(&db, id.as_str())?.ok_or_else(|| HandoverError::NotFound(id.0.clone()))
    }

    pub fn stats(&self) -> Result<TicketStats> {
        let db = self.db.lock().unwrap();
        let mut stats = TicketStats::default();
        let mut stmt = db.prepare("SELECT status, COUNT(*) FROM handover_tickets GROUP BY status")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, u64>(1)?))
        })?;
        for row in rows {
            let (status, count) = row?;
            match TicketStatus::from_str_opt(&status) {
                Some(TicketStatus::Pending) => stats.pending = count,
                Some(TicketStatus::Accepted) => stats.accepted = count,
                Some(TicketStatus::InProgress) => stats.in_progress = count,
                Some(TicketStatus::Resolved) => stats.resolved = count,
                Some(TicketStatus::Cancelled) => stats.cancelled = count,
                None => {}
            }
        }
        Ok(stats)
    }
}

fn get_by_id_locked(db: &Connection, id: &str) -> Result<Option<HandoverTicket>> {
    db.query_row(
        "SELECT id, conversation_id, customer_name, customer_email, customer_phone,
                reason, priority, status, created_at, accepted_at, resolved_at,
                assigned_agent, context_snapshot, resolution_notes, tags
         FROM handover_tickets WHERE id = ?1",
        params![id],
        row_to_ticket,
    )
    .optional()
    .map_err(HandoverError::Database)
}

fn row_to_ticket(row: &rusqlite::Row) -> rusqlite::Result<HandoverTicket> {
    let reason: String = row.get(5)?;
    let status: String = row.get(7)?;
    let created_at: String = row.get(8)?;
    let accepted_at: Option<String> = row.get(9)?;
    let resolved_at: Option<String> = row.get(10)?;
    let snapshot: String = row.get(12)?;
    let tags: String = row.get(14)?;

    Ok(HandoverTicket {
        id: HandoverTicketId(row.get(0)?),
        conversation_id: ConversationId(row.get(1)?),
        customer_name: row.get(2)?,
        customer_email: row.get(3)?,
        customer_phone: row.get(4)?,
        reason: crate::types::TriggerReason::from_str_opt(&reason)
            .unwrap_or(crate::types::TriggerReason::ComplexQuery),
        priority: row.get(6)?,
        status: TicketStatus::from_str_opt(&status).unwrap_or(TicketStatus::Pending),
        created_at: parse_rfc3339(&created_at),
        accepted_at: accepted_at.as_deref().map(parse_rfc3339),
        resolved_at: resolved_at.as_deref().map(parse_rfc3339),
        assigned_agent: row.get::<_, Option<String>>(11)?.map(UserId),
        context_snapshot: serde_json::from_str::<ContextSnapshot>(&snapshot).unwrap_or_default(),
        resolution_notes: row.get(13)?,
        tags: if tags.is_empty() { Vec::new() } else { tags.split(',').map(str::to_string).collect() },
    })
}

fn parse_rfc3339(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}
