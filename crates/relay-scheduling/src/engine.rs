use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use dashmap::DashMap;
use relay_core::types::{CalendarCommitmentId, ConversationId};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{info, warn};

use crate::availability::slots_for_date;
use crate::db::init_db;
use crate::error::{ProviderError, Result, SchedulerError};
use crate::types::{dedup_key, CalendarCommitment, CommitmentStatus, SchedulingPolicy, SchedulingState, TimeSlot};

/// A confirmed or in-flight external calendar event.
#[derive(Debug, Clone)]
pub struct ExternalEvent {
    pub provider_event_id: String,
    pub meeting_url: String,
    pub calendar_url: String,
}

/// The external calendar the Scheduling Sub-Protocol commits into (§4.7).
/// `find_by_dedup_key` backs the crash-recovery path: on restart after a
/// crash between "about to commit" and "confirmed," the engine queries this
/// before retrying the insert.
#[async_trait]
pub trait CalendarProvider: Send + Sync {
    async fn busy_intervals(&self, date: NaiveDate) -> std::result::Result<Vec<(DateTime<Utc>, DateTime<Utc>)>, ProviderError>;

    async fn create_event(
        &self,
        dedup_key: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        customer_email: &str,
    ) -> std::result::Result<ExternalEvent, ProviderError>;

    async fn find_by_dedup_key(&self, dedup_key: &str) -> std::result::Result<Option<ExternalEvent>, ProviderError>;
}

/// Drives the per-conversation scheduling state machine (§4.7), grounded on
/// `SchedulerEngine`'s shape: a `Connection`-backed persistence layer plus an
/// in-memory table of live state, generalized from one global polling loop
/// over `jobs` into a `DashMap<ConversationId, SchedulingState>` advanced by
/// inbound events rather than a fixed-interval tick.
pub struct SchedulingEngine {
    states: DashMap<ConversationId, SchedulingState>,
    db: Mutex<Connection>,
    provider: Box<dyn CalendarProvider>,
    policy: SchedulingPolicy,
}

impl SchedulingEngine {
    pub fn new(conn: Connection, provider: Box<dyn CalendarProvider>, policy: SchedulingPolicy) -> Result<Self> {
        init_db(&conn)?;
        Ok(Self { states: DashMap::new(), db: Mutex::new(conn), provider, policy })
    }

    /// A fresh scheduling intent always (re)starts the state machine,
    /// discarding any prior terminal state for this conversation.
    pub fn start(&self, conversation_id: &ConversationId) {
        self.states.insert(conversation_id.clone(), SchedulingState::AwaitingIdentity);
    }

    pub fn state_of(&self, conversation_id: &ConversationId) -> Option<SchedulingState> {
        self.states.get(conversation_id).map(|s| s.clone())
    }

    /// `AwaitingIdentity` → `AwaitingSlot`, returning the available slots for
    /// the lookahead window so the caller can emit the "open slot picker"
    /// signal.
    pub async fn provide_identity(
        &self,
        conversation_id: &ConversationId,
        customer_email: &str,
        dates: &[NaiveDate],
    ) -> Result<Vec<TimeSlot>> {
        self.require_state(conversation_id, |s| matches!(s, SchedulingState::AwaitingIdentity))?;

        let mut all_slots = Vec::new();
        let now = Utc::now();
        for date in dates {
            let busy = self.provider.busy_intervals(*date).await?;
            all_slots.extend(slots_for_date(*date, &self.policy, &busy, now));
        }

        self.states.insert(
            conversation_id.clone(),
            SchedulingState::AwaitingSlot { customer_email: customer_email.to_string() },
        );
        Ok(all_slots)
    }

    /// `AwaitingSlot` → `Confirming` (or straight into `Committing` when the
    /// deployment's default policy is `auto_commit`). Prefer
    /// `propose_slot_for_agent` wherever the caller knows which agent is
    /// driving the conversation — the per-(tenant, agent) `auto_commit` flag
    /// takes precedence over this deployment default.
    pub fn propose_slot(&self, conversation_id: &ConversationId, slot: TimeSlot) -> Result<SchedulingState> {
        self.propose_slot_with(conversation_id, slot, self.policy.auto_commit)
    }

    /// `AwaitingSlot` → `Confirming` (or straight into `Committing` when
    /// `agent_auto_commit` is set) — the per-(tenant, agent) `auto_commit`
    /// vs `require_operator_ok` policy read off the resolved agent's config
    /// row, not the engine's deployment-wide default.
    pub fn propose_slot_for_agent(&self, conversation_id: &ConversationId, slot: TimeSlot, agent_auto_commit: bool) -> Result<SchedulingState> {
        self.propose_slot_with(conversation_id, slot, agent_auto_commit)
    }

    fn propose_slot_with(&self, conversation_id: &ConversationId, slot: TimeSlot, auto_commit: bool) -> Result<SchedulingState> {
        let customer_email = match self.states.get(conversation_id).map(|s| s.clone()) {
            Some(SchedulingState::AwaitingSlot { customer_email }) => customer_email,
            _ => return Err(SchedulerError::WrongState),
        };

        let next = if auto_commit {
            SchedulingState::Committing {
                customer_email: customer_email.clone(),
                slot,
                dedup_key: dedup_key(conversation_id, slot.start, &customer_email),
            }
        } else {
            SchedulingState::Confirming { customer_email, slot }
        };
        self.states.insert(conversation_id.clone(), next.clone());
        Ok(next)
    }

    /// Operator (or customer, when `auto_commit`) confirms: `Confirming` →
    /// `Committing`.
    pub fn confirm(&self, conversation_id: &ConversationId) -> Result<SchedulingState> {
        let (customer_email, slot) = match self.states.get(conversation_id).map(|s| s.clone()) {
            Some(SchedulingState::Confirming { customer_email, slot }) => (customer_email, slot),
            _ => return Err(SchedulerError::WrongState),
        };
        let key = dedup_key(conversation_id, slot.start, &customer_email);
        let next = SchedulingState::Committing { customer_email, slot, dedup_key: key };
        self.states.insert(conversation_id.clone(), next.clone());
        Ok(next)
    }

    /// Exactly one attempt to insert into the external calendar. Before the
    /// external call, persists a `proposed` commitment row carrying the
    /// dedup key; on success flips it to `confirmed`; on failure the state
    /// machine moves to `Failed` and no row is ever marked confirmed. Safe
    /// to call again after a crash: the dedup key is looked up both in local
    /// storage and, if absent there, against the provider directly.
    pub async fn commit(
        &self,
        conversation_id: &ConversationId,
        agent_key: &str,
    ) -> Result<CalendarCommitment> {
        let (customer_email, slot, key) = match self.states.get(conversation_id).map(|s| s.clone()) {
            Some(SchedulingState::Committing { customer_email, slot, dedup_key }) => {
                (customer_email, slot, dedup_key)
            }
            _ => return Err(SchedulerError::WrongState),
        };

        if let Some(existing) = self.find_commitment_by_dedup_key(&key)? {
            if existing.status == CommitmentStatus::Confirmed {
                self.states.insert(conversation_id.clone(), SchedulingState::AwaitingIdentity);
                return Ok(existing);
            }
        } else {
            self.insert_proposed(conversation_id, agent_key, &customer_email, slot, &key)?;
        }

        let result = match self.provider.find_by_dedup_key(&key).await {
            Ok(Some(event)) => Ok(event),
            Ok(None) => self.provider.create_event(&key, slot.start, slot.end, &customer_email).await,
            Err(err) => Err(err),
        };

        match result {
            Ok(event) => {
                let commitment = self.mark_confirmed(&key, &event)?;
                info!(conversation_id = %conversation_id, dedup_key = %key, "calendar commitment confirmed");
                self.states.insert(conversation_id.clone(), SchedulingState::AwaitingIdentity);
                Ok(commitment)
            }
            Err(err) => {
                warn!(conversation_id = %conversation_id, %err, "calendar commit failed");
                self.states.insert(
                    conversation_id.clone(),
                    SchedulingState::Failed { reason: err.to_string() },
                );
                Err(SchedulerError::Provider(err))
            }
        }
    }

    pub fn cancel(&self, conversation_id: &ConversationId) {
        self.states.insert(conversation_id.clone(), SchedulingState::Cancelled);
    }

    /// Operator-initiated booking that skips the interactive slot-picker
    /// handshake (§6 `POST /calendar/events`) — drives the same Committing
    /// step as the conversational path, so it carries the same dedup and
    /// crash-recovery guarantees.
    pub async fn book_directly(
        &self,
        conversation_id: &ConversationId,
        agent_key: &str,
        customer_email: &str,
        slot: TimeSlot,
    ) -> Result<CalendarCommitment> {
        let key = dedup_key(conversation_id, slot.start, customer_email);
        self.states.insert(
            conversation_id.clone(),
            SchedulingState::Committing {
                customer_email: customer_email.to_string(),
                slot,
                dedup_key: key,
            },
        );
        self.commit(conversation_id, agent_key).await
    }

    /// `GET /calendar/events` — admin listing, newest first.
    pub fn list_commitments(&self, limit: u32) -> Result<Vec<CalendarCommitment>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(
            "SELECT id, provider_event_id, conversation_id, agent_key, customer_email,
                    start, end, meeting_url, calendar_url, status, attendees, notes, dedup_key
             FROM calendar_commitments ORDER BY start DESC LIMIT ?1",
        )?;
        let rows = stmt
            .query_map(params![limit], row_to_commitment)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// `PUT /calendar/events/{id}` — notes/attendees are the only mutable
    /// fields once a commitment is confirmed; the time slot itself is
    /// immutable (rescheduling is a new booking).
    pub fn update_commitment(&self, id: &CalendarCommitmentId, notes: Option<&str>, attendees: &[String]) -> Result<CalendarCommitment> {
        let db = self.db.lock().unwrap();
        let updated = db.execute(
            "UPDATE calendar_commitments SET notes = ?1, attendees = ?2 WHERE id = ?3",
            params![notes, attendees.join(","), id.as_str()],
        )?;
        if updated == 0 {
            return Err(SchedulerError::CommitmentNotFound(id.as_str().to_string()));
        }
        db.query_row(
            "SELECT id, provider_event_id, conversation_id, agent_key, customer_email,
                    start, end, meeting_url, calendar_url, status, attendees, notes, dedup_key
             FROM calendar_commitments WHERE id = ?1",
            params![id.as_str()],
            row_to_commitment,
        )
        .map_err(SchedulerError::Database)
    }

    /// `DELETE /calendar/events/{id}` — marks the commitment cancelled; the
    /// external provider-side cancellation is out of scope (§1).
    pub fn cancel_commitment(&self, id: &CalendarCommitmentId) -> Result<()> {
        let updated = self
            .db
            .lock()
            .unwrap()
            .execute(
                "UPDATE calendar_commitments SET status = 'cancelled' WHERE id = ?1",
                params![id.as_str()],
            )?;
        if updated == 0 {
            return Err(SchedulerError::CommitmentNotFound(id.as_str().to_string()));
        }
        Ok(())
    }

    fn require_state(
        &self,
        conversation_id: &ConversationId,
        predicate: impl FnOnce(&SchedulingState) -> bool,
    ) -> Result<()> {
        match self.states.get(conversation_id) {
            Some(state) if predicate(&state) => Ok(()),
            Some(_) => Err(SchedulerError::WrongState),
            None => Err(SchedulerError::NoActiveAttempt),
        }
    }

    fn insert_proposed(
        &self,
        conversation_id: &ConversationId,
        agent_key: &str,
        customer_email: &str,
        slot: TimeSlot,
        dedup_key: &str,
    ) -> Result<()> {
        let db = self.db.lock().unwrap();
        let id = CalendarCommitmentId::new();
        db.execute(
            "INSERT INTO calendar_commitments
                (id, provider_event_id, conversation_id, agent_key, customer_email,
                 start, end, meeting_url, calendar_url, status, attendees, notes, dedup_key)
             VALUES (?1, NULL, ?2, ?3, ?4, ?5, ?6, NULL, NULL, 'proposed', '', NULL, ?7)",
            params![
                id.as_str(),
                conversation_id.as_str(),
                agent_key,
                customer_email,
                slot.start.to_rfc3339(),
                slot.end.to_rfc3339(),
                dedup_key,
            ],
        )?;
        Ok(())
    }

    fn mark_confirmed(&self, dedup_key: &str, event: &ExternalEvent) -> Result<CalendarCommitment> {
        let db = self.db.lock().unwrap();
        db.execute(
            "UPDATE calendar_commitments
             SET status = 'confirmed', provider_event_id = ?1, meeting_url = ?2, calendar_url = ?3
             WHERE dedup_key = ?4",
            params![event.provider_event_id, event.meeting_url, event.calendar_url, dedup_key],
        )?;
        get_by_dedup_key_locked(&db, dedup_key)?
            .ok_or_else(|| SchedulerError::CommitmentNotFound(dedup_key.to_string()))
    }

    fn find_commitment_by_dedup_key(&self, dedup_key: &str) -> Result<Option<CalendarCommitment>> {
        let db = self.db.lock().unwrap();
        get_by_dedup_key_locked(&db, dedup_key)
    }
}

fn get_by_dedup_key_locked(db: &Connection, dedup_key: &str) -> Result<Option<CalendarCommitment>> {
    db.query_row(
        "SELECT id, provider_event_id, conversation_id, agent_key, customer_email,
                start, end, meeting_url, calendar_url, status, attendees, notes, dedup_key
         FROM calendar_commitments WHERE dedup_key = ?1",
        params![dedup_key],
        row_to_commitment,
    )
    .optional()
    .map_err(SchedulerError::Database)
}

fn row_to_commitment(row: &rusqlite::Row) -> rusqlite::Result<CalendarCommitment> {
    let status: String = row.get(9)?;
    let start: String = row.get(5)?;
    let end: String = row.get(6)?;
    let attendees: String = row.get(10)?;
    Ok(CalendarCommitment {
        id: CalendarCommitmentId(row.get(0)?),
        provider_event_id: row.get(1)?,
        conversation_id: ConversationId(row.get(2)?),
        agent_key: row.get(3)?,
        customer_email: row.get(4)?,
        start: DateTime::parse_from_rfc3339(&start).map(|d| d.with_timezone(&Utc)).unwrap_or_else(|_| Utc::now()),
        end: DateTime::parse_from_rfc3339(&end).map(|d| d.with_timezone(&Utc)).unwrap_or_else(|_| Utc::now()),
        meeting_url: row.get(7)?,
        calendar_url: row.get(8)?,
        status: CommitmentStatus::from_str_opt(&status).unwrap_or(CommitmentStatus::Proposed),
        attendees: if attendees.is_empty() { Vec::new() } else { attendees.split(',').map(str::to_string).collect() },
        notes: row.get(11)?,
        dedup_key: row.get(12)?,
    })
}
