pub mod availability;
pub mod db;
pub mod engine;
pub mod error;
pub mod types;

pub use availability::{lookahead_dates, slots_for_date};
pub use engine::{CalendarProvider, ExternalEvent, SchedulingEngine};
pub use error::{ProviderError, Result, SchedulerError};
pub use types::{
    dedup_key, CalendarCommitment, CommitmentStatus, SchedulingPolicy, SchedulingState, TimeSlot,
};

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{NaiveDate, Utc};
    use relay_core::types::ConversationId;
    use rusqlite::Connection;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct FakeProvider {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl CalendarProvider for FakeProvider {
        async fn busy_intervals(&self, _date: NaiveDate) -> std::result::Result<Vec<(chrono::DateTime<Utc>, chrono::DateTime<Utc>)>, ProviderError> {
            Ok(Vec::new())
        }

        async fn create_event(
            &self,
            dedup_key: &str,
            _start: chrono::DateTime<Utc>,
            _end: chrono::DateTime<Utc>,
            _customer_email: &str,
        ) -> std::result::Result<ExternalEvent, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(ExternalEvent {
                provider_event_id: format!("evt-{dedup_key}"),
                meeting_url: "https://meet.example/abc".to_string(),
                calendar_url: "https://cal.example/abc".to_string(),
            })
        }

        async fn find_by_dedup_key(&self, _dedup_key: &str) -> std::result::Result<Option<ExternalEvent>, ProviderError> {
            Ok(None)
        }
    }

    fn engine(auto_commit: bool, calls: Arc<AtomicUsize>) -> SchedulingEngine {
        let policy = SchedulingPolicy { auto_commit, ..SchedulingPolicy::default() };
        SchedulingEngine::new(Connection::open_in_memory().unwrap(), Box::new(FakeProvider { calls }), policy).unwrap()
    }

    #[tokio::test]
    async fn happy_path_progresses_through_every_state_to_idle() {
        let calls = Arc::new(AtomicUsize::new(0));
        let eng = engine(false, calls.clone());
        let conversation_id = ConversationId::new();
        eng.start(&conversation_id);

        let monday = NaiveDate::from_ymd_opt(2026, 8, 3).unwrap();
        let slots = eng.provide_identity(&conversation_id, "ana@example.com", &[monday]).await.unwrap();
        assert!(!slots.is_empty());
        assert!(matches!(eng.state_of(&conversation_id), Some(SchedulingState::AwaitingSlot { .. })));

        let chosen = slots[0];
        eng.propose_slot(&conversation_id, chosen).unwrap();
        assert!(matches!(eng.state_of(&conversation_id), Some(SchedulingState::Confirming { .. })));

        eng.confirm(&conversation_id).unwrap();
        assert!(matches!(eng.state_of(&conversation_id), Some(SchedulingState::Committing { .. })));

        let commitment = eng.commit(&conversation_id, "sdr").await.unwrap();
        assert_eq!(commitment.status, CommitmentStatus::Confirmed);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(eng.state_of(&conversation_id), Some(SchedulingState::AwaitingIdentity)));
    }

    #[tokio::test]
    async fn auto_commit_policy_skips_the_confirming_state() {
        let calls = Arc::new(AtomicUsize::new(0));
        let eng = engine(true, calls);
        let conversation_id = ConversationId::new();
        eng.start(&conversation_id);

        let monday = NaiveDate::from_ymd_opt(2026, 8, 3).unwrap();
        let slots = eng.provide_identity(&conversation_id, "ana@example.com", &[monday]).await.unwrap();
        eng.propose_slot(&conversation_id, slots[0]).unwrap();
        assert!(matches!(eng.state_of(&conversation_id), Some(SchedulingState::Committing { .. })));
    }

    #[tokio::test]
    async fn committing_twice_with_same_dedup_key_only_calls_provider_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let eng = engine(true, calls.clone());
        let conversation_id = ConversationId::new();
        eng.start(&conversation_id);

        let monday = NaiveDate::from_ymd_opt(2026, 8, 3).unwrap();
        let slots = eng.provide_identity(&conversation_id, "ana@example.com", &[monday]).await.unwrap();
        eng.propose_slot(&conversation_id, slots[0]).unwrap();
        let first = eng.commit(&conversation_id, "sdr").await.unwrap();

        // A retry (e.g. after a crash-and-restart) re-enters the same state
        // machine for the same slot and customer email, so it derives the
        // same dedup key — the provider must only be hit once.
        eng.start(&conversation_id);
        let slots = eng.provide_identity(&conversation_id, "ana@example.com", &[monday]).await.unwrap();
        eng.propose_slot(&conversation_id, slots[0]).unwrap();
        let second = eng.commit(&conversation_id, "sdr").await.unwrap();

        assert_eq!(first.dedup_key, second.dedup_key);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn out_of_working_hours_and_weekends_yield_no_slots() {
        let calls = Arc::new(AtomicUsize::new(0));
        let eng = engine(false, calls);
        let conversation_id = ConversationId::new();
        eng.start(&conversation_id);

        let saturday = NaiveDate::from_ymd_opt(2026, 8, 1).unwrap();
        let slots = eng.provide_identity(&conversation_id, "ana@example.com", &[saturday]).await.unwrap();
        assert!(slots.is_empty());
    }
}
