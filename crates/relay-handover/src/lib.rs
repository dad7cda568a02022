pub mod db;
pub mod error;
pub mod store;
pub mod types;

pub use error::HandoverError;
pub use store::HandoverQueue;
pub use types::{
    resolve_trigger, ContextSnapshot, HandoverTicket, NewHandoverTicket, TicketFilter,
    TicketStats, TicketStatus, TriggerReason,
};

#[cfg(test)]
mod tests {
    use super::*;
    use relay_core::types::{ConversationId, UserId};
    use rusqlite::Connection;

    fn queue() -> HandoverQueue {
        HandoverQueue::open(Connection::open_in_memory().unwrap()).unwrap()
    }

    fn new_ticket(conversation_id: &ConversationId, reasons: Vec<TriggerReason>) -> NewHandoverTicket {
        NewHandoverTicket {
            conversation_id: conversation_id.clone(),
            customer_name: Some("Ana".to_string()),
            customer_email: None,
            customer_phone: Some("+5511999999999".to_string()),
            fired_reasons: reasons,
            context_snapshot: ContextSnapshot::default(),
        }
    }

    #[test]
    fn mixed_triggers_take_max_priority_and_record_winning_reason() {
        let queue = queue();
        let conversation_id = ConversationId::new();
        let ticket = queue
            .create(new_ticket(&conversation_id, vec![TriggerReason::ExplicitRequest, TriggerReason::Complaint]))
            .unwrap();

        assert_eq!(ticket.priority, 4);
        assert_eq!(ticket.reason, TriggerReason::Complaint);
        assert_eq!(ticket.status, TicketStatus::Pending);
    }

    #[test]
    fn open_ticket_blocks_bot_dispatch_until_resolved() {
        let queue = queue();
        let conversation_id = ConversationId::new();
        let ticket = queue
            .create(new_ticket(&conversation_id, vec![TriggerReason::LowConfidence]))
            .unwrap();

        assert!(queue.has_open_ticket(&conversation_id).unwrap());

        queue.resolve(&ticket.id, "handled by Ana").unwrap();
        assert!(!queue.has_open_ticket(&conversation_id).unwrap());
    }

    #[test]
    fn accept_is_compare_and_swap_only_one_operator_wins() {
        let queue = queue();
        let conversation_id = ConversationId::new();
        let ticket = queue
            .create(new_ticket(&conversation_id, vec![TriggerReason::Complaint]))
            .unwrap();

        let operator_a = UserId::new();
        let operator_b = UserId::new();

        let accepted = queue.accept(&ticket.id, &operator_a).unwrap();
        assert_eq!(accepted.status, TicketStatus::Accepted);
        assert_eq!(accepted.assigned_agent, Some(operator_a));

        let conflict = queue.accept(&ticket.id, &operator_b).unwrap_err();
        assert!(matches!(conflict, HandoverError::Conflict(_)));
    }

    #[test]
    fn lifecycle_progresses_accepted_to_in_progress_to_resolved() {
        let queue = queue();
        let conversation_id = ConversationId::new();
        let ticket = queue
            .create(new_ticket(&conversation_id, vec![TriggerReason::ExplicitRequest]))
            .unwrap();
        let operator = UserId::new();

        queue.accept(&ticket.id, &operator).unwrap();
        let in_progress = queue.mark_in_progress(&ticket.id).unwrap();
        assert_eq!(in_progress.status, TicketStatus::InProgress);

        let resolved = queue.resolve(&ticket.id, "done").unwrap();
        assert_eq!(resolved.status, TicketStatus::Resolved);
        assert_eq!(resolved.resolution_notes.as_deref(), Some("done"));

        let err = queue.mark_in_progress(&ticket.id).unwrap_err();
        assert!(matches!(err, HandoverError::Conflict(_)));
    }

    #[test]
    fn list_filters_by_status_and_orders_by_priority() {
        let queue = queue();
        let low = queue
            .create(new_ticket(&ConversationId::new(), vec![TriggerReason::OutOfHours]))
            .unwrap();
        let high = queue
            .create(new_ticket(&ConversationId::new(), vec![TriggerReason::Escalation]))
            .unwrap();

        let pending = queue
            .list(TicketFilter { status: Some(TicketStatus::Pending), min_priority: None, limit: 10 })
            .unwrap();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].id, high.id);
        assert_eq!(pending[1].id, low.id);
    }

    #[test]
    fn stats_summarizes_counts_per_status() {
        let queue = queue();
        let ticket = queue
            .create(new_ticket(&ConversationId::new(), vec![TriggerReason::LowConfidence]))
            .unwrap();
        queue.accept(&ticket.id, &UserId::new()).unwrap();

        let stats = queue.stats().unwrap();
        assert_eq!(stats.accepted, 1);
        assert_eq!(stats.pending, 0);
    }
}
