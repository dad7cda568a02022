use chrono::{DateTime, Utc};
use relay_core::types::{ConversationId, HandoverTicketId, UserId};
use serde::{Deserialize, Serialize};

/// Why a conversation left bot control (§4.6). Ordered by ascending
/// priority for the mixed-trigger resolution rule below.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerReason {
    OutOfHours,
    LowConfidence,
    ComplexQuery,
    TechnicalProblem,
    ExplicitRequest,
    Complaint,
    Escalation,
}

impl TriggerReason {
    /// complaint/urgent → 4, explicit_request → 3, low_confidence → 2, else 1.
    pub fn priority(&self) -> u8 {
        match self {
            TriggerReason::Complaint | TriggerReason::Escalation => 4,
            TriggerReason::ExplicitRequest => 3,
            TriggerReason::LowConfidence => 2,
            TriggerReason::OutOfHours
            | TriggerReason::ComplexQuery
            | TriggerReason::TechnicalProblem => 1,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerReason::OutOfHours => "out_of_hours",
            TriggerReason::LowConfidence => "low_confidence",
            TriggerReason::ComplexQuery => "complex_query",
            TriggerReason::TechnicalProblem => "technical_problem",
            TriggerReason::ExplicitRequest => "explicit_request",
            TriggerReason::Complaint => "complaint",
            TriggerReason::Escalation => "escalation",
        }
    }

    pub fn from_str_opt(s: &str) -> Option<Self> {
        Some(match s {
            "out_of_hours" => TriggerReason::OutOfHours,
            "low_confidence" => TriggerReason::LowConfidence,
            "complex_query" => TriggerReason::ComplexQuery,
            "technical_problem" => TriggerReason::TechnicalProblem,
            "explicit_request" => TriggerReason::ExplicitRequest,
            "complaint" => TriggerReason::Complaint,
            "escalation" => TriggerReason::Escalation,
            _ => return None,
        })
    }
}

/// §4.6 lifecycle: pending → accepted → in_progress → resolved/cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    Pending,
    Accepted,
    InProgress,
    Resolved,
    Cancelled,
}

impl TicketStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketStatus::Pending => "pending",
            TicketStatus::Accepted => "accepted",
            TicketStatus::InProgress => "in_progress",
            TicketStatus::Resolved => "resolved",
            TicketStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_str_opt(s: &str) -> Option<Self> {
        Some(match s {
            "pending" => TicketStatus::Pending,
            "accepted" => TicketStatus::Accepted,
            "in_progress" => TicketStatus::InProgress,
            "resolved" => TicketStatus::Resolved,
            "cancelled" => TicketStatus::Cancelled,
            _ => return None,
        })
    }

    /// An open ticket blocks bot dispatch for its conversation (§4.6, §4.8 step 3).
    pub fn is_open(&self) -> bool {
        matches!(self, TicketStatus::Pending | TicketStatus::Accepted | TicketStatus::InProgress)
    }
}

/// A point-in-conversation snapshot captured at trigger time (§3
/// "conversation context snapshot").
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ContextSnapshot {
    pub last_messages: Vec<String>,
    pub extracted_entities: Vec<String>,
    pub last_intent: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandoverTicket {
    pub id: HandoverTicketId,
    pub conversation_id: ConversationId,
    pub customer_name: Option<String>,
    pub customer_email: Option<String>,
    pub customer_phone: Option<String>,
    pub reason: TriggerReason,
    pub priority: u8,
    pub status: TicketStatus,
    pub created_at: DateTime<Utc>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub assigned_agent: Option<UserId>,
    pub context_snapshot: ContextSnapshot,
    pub resolution_notes: Option<String>,
    pub tags: Vec<String>,
}

/// Inputs to open a new ticket. The caller (the Router, §4.8) has already
/// evaluated all fired triggers for this inbound message and passes the
/// full set here so priority resolution (max over fired reasons) happens
/// in one place.
#[derive(Debug, Clone)]
pub struct NewHandoverTicket {
    pub conversation_id: ConversationId,
    pub customer_name: Option<String>,
    pub customer_email: Option<String>,
    pub customer_phone: Option<String>,
    pub fired_reasons: Vec<TriggerReason>,
    pub context_snapshot: ContextSnapshot,
}

/// Resolve the winning reason for a set of fired triggers: highest priority
/// wins; ties are broken by trigger evaluation order (§4.6 implementation
/// note), i.e. the order the caller lists them in `fired_reasons`.
pub fn resolve_trigger(fired_reasons: &[TriggerReason]) -> Option<(TriggerReason, u8)> {
    fired_reasons
        .iter()
        .enumerate()
        .max_by_key(|(idx, reason)| (reason.priority(), std::cmp::Reverse(*idx)))
        .map(|(_, reason)| (*reason, reason.priority()))
}

#[derive(Debug, Clone, Default)]
pub struct TicketFilter {
    pub status: Option<TicketStatus>,
    pub min_priority: Option<u8>,
    pub limit: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TicketStats {
    pub pending: u64,
    pub accepted: u64,
    pub in_progress: u64,
    pub resolved: u64,
    pub cancelled: u64,
}
