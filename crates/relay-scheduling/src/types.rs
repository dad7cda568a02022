use chrono::{DateTime, Utc};
use relay_core::types::{CalendarCommitmentId, ConversationId};
use serde::{Deserialize, Serialize};

/// A free slot on the calendar, `slot_duration_minutes` wide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSlot {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// §4.7 per-conversation state machine. `Idle` is the implicit state of a
/// conversation with no entry in the engine's map — a fresh scheduling
/// intent always starts from `AwaitingIdentity`.
#[derive(Debug, Clone, PartialEq)]
pub enum SchedulingState {
    AwaitingIdentity,
    AwaitingSlot {
        customer_email: String,
    },
    Confirming {
        customer_email: String,
        slot: TimeSlot,
    },
    Committing {
        customer_email: String,
        slot: TimeSlot,
        dedup_key: String,
    },
    Failed {
        reason: String,
    },
    Cancelled,
}

impl SchedulingState {
    pub fn label(&self) -> &'static str {
        match self {
            SchedulingState::AwaitingIdentity => "awaiting_identity",
            SchedulingState::AwaitingSlot { .. } => "awaiting_slot",
            SchedulingState::Confirming { .. } => "confirming",
            SchedulingState::Committing { .. } => "committing",
            SchedulingState::Failed { .. } => "failed",
            SchedulingState::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitmentStatus {
    Proposed,
    Confirmed,
    Cancelled,
}

impl CommitmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommitmentStatus::Proposed => "proposed",
            CommitmentStatus::Confirmed => "confirmed",
            CommitmentStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_str_opt(s: &str) -> Option<Self> {
        Some(match s {
            "proposed" => CommitmentStatus::Proposed,
            "confirmed" => CommitmentStatus::Confirmed,
            "cancelled" => CommitmentStatus::Cancelled,
            _ => return None,
        })
    }
}

/// §3 "CalendarCommitment" — produced by the Scheduling Sub-Protocol.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarCommitment {
    pub id: CalendarCommitmentId,
    pub provider_event_id: Option<String>,
    pub conversation_id: ConversationId,
    pub agent_key: String,
    pub customer_email: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub meeting_url: Option<String>,
    pub calendar_url: Option<String>,
    pub status: CommitmentStatus,
    pub attendees: Vec<String>,
    pub notes: Option<String>,
    pub dedup_key: String,
}

/// Working-hours + slot-granularity policy for availability queries and the
/// `auto_commit` vs `require_operator_ok` choice (§9 Open Question #1: a
/// per-(tenant, agent) setting, not per-conversation).
#[derive(Debug, Clone)]
pub struct SchedulingPolicy {
    pub working_hour_start: u8,
    pub working_hour_end: u8,
    pub slot_duration_minutes: i64,
    pub lookahead_days: i64,
    pub auto_commit: bool,
}

impl Default for SchedulingPolicy {
    fn default() -> Self {
        Self {
            working_hour_start: 9,
            working_hour_end: 18,
            slot_duration_minutes: 60,
            lookahead_days: 5,
            auto_commit: false,
        }
    }
}

/// Derives the idempotency key for a commit attempt (§4.7 "dedup key
/// derived from (conversation id, proposed start, customer email)").
pub fn dedup_key(conversation_id: &ConversationId, start: DateTime<Utc>, customer_email: &str) -> String {
    format!("{}:{}:{}", conversation_id.as_str(), start.to_rfc3339(), customer_email)
}
