use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc, Weekday};

use crate::types::{SchedulingPolicy, TimeSlot};

/// Partition the working-hours window for `date` into `policy.slot_duration_minutes`
/// slots, subtract `busy` intervals, and prune weekends and past instants
/// relative to `now` (§4.7 availability queries).
///
/// Adapted from `schedule.rs`'s `compute_next_run`: the same "build today's
/// candidate instant at a fixed wall-clock time, then walk forward" shape,
/// generalized from a single next-fire instant into a full partitioned slot
/// list for one day.
pub fn slots_for_date(
    date: NaiveDate,
    policy: &SchedulingPolicy,
    busy: &[(DateTime<Utc>, DateTime<Utc>)],
    now: DateTime<Utc>,
) -> Vec<TimeSlot> {
    if matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
        return Vec::new();
    }

    let Some(window_start) = Utc
        .with_ymd_and_hms(date.year(), date.month(), date.day(), policy.working_hour_start as u32, 0, 0)
        .single()
    else {
        return Vec::new();
    };
    let Some(window_end) = Utc
        .with_ymd_and_hms(date.year(), date.month(), date.day(), policy.working_hour_end as u32, 0, 0)
        .single()
    else {
        return Vec::new();
    };

    let slot_len = Duration::minutes(policy.slot_duration_minutes);
    let mut slots = Vec::new();
    let mut cursor = window_start;
    while cursor + slot_len <= window_end {
        let slot = TimeSlot { start: cursor, end: cursor + slot_len };
        if slot.start > now && !overlaps_any(&slot, busy) {
            slots.push(slot);
        }
        cursor += slot_len;
    }
    slots
}

fn overlaps_any(slot: &TimeSlot, busy: &[(DateTime<Utc>, DateTime<Utc>)]) -> bool {
    busy.iter().any(|(busy_start, busy_end)| slot.start < *busy_end && *busy_start < slot.end)
}

/// The next `policy.lookahead_days` working days starting from `now`'s date,
/// used to seed the "open slot picker" signal (§4.7 `AwaitingSlot`).
pub fn lookahead_dates(now: DateTime<Utc>, policy: &SchedulingPolicy) -> Vec<NaiveDate> {
    let mut dates = Vec::new();
    let mut cursor = now.date_naive();
    while dates.len() < policy.lookahead_days as usize {
        cursor += Duration::days(1);
        if !matches!(cursor.weekday(), Weekday::Sat | Weekday::Sun) {
            dates.push(cursor);
        }
    }
    dates
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn policy() -> SchedulingPolicy {
        SchedulingPolicy::default()
    }

    #[test]
    fn weekend_dates_produce_no_slots() {
        let saturday = NaiveDate::from_ymd_opt(2026, 8, 1).unwrap();
        let now = Utc.with_ymd_and_hms(2026, 7, 28, 0, 0, 0).unwrap();
        assert!(slots_for_date(saturday, &policy(), &[], now).is_empty());
    }

    #[test]
    fn working_day_partitions_into_hourly_slots() {
        let monday = NaiveDate::from_ymd_opt(2026, 8, 3).unwrap();
        let now = Utc.with_ymd_and_hms(2026, 7, 28, 0, 0, 0).unwrap();
        let slots = slots_for_date(monday, &policy(), &[], now);
        assert_eq!(slots.len(), 9);
    }

    #[test]
    fn busy_intervals_are_subtracted() {
        let monday = NaiveDate::from_ymd_opt(2026, 8, 3).unwrap();
        let now = Utc.with_ymd_and_hms(2026, 7, 28, 0, 0, 0).unwrap();
        let busy_start = Utc.with_ymd_and_hms(2026, 8, 3, 10, 0, 0).unwrap();
        let busy_end = Utc.with_ymd_and_hms(2026, 8, 3, 11, 0, 0).unwrap();
        let slots = slots_for_date(monday, &policy(), &[(busy_start, busy_end)], now);
        assert_eq!(slots.len(), 8);
        assert!(!slots.iter().any(|s| s.start == busy_start));
    }

    #[test]
    fn past_instants_are_pruned() {
        let today = NaiveDate::from_ymd_opt(2026, 8, 3).unwrap();
        let noon = Utc.with_ymd_and_hms(2026, 8, 3, 12, 0, 0).unwrap();
        let slots = slots_for_date(today, &policy(), &[], noon);
        assert!(slots.iter().all(|s| s.start > noon));
        assert_eq!(slots.len(), 5);
    }
}
