use regex::Regex;
use std::sync::LazyLock;

use crate::intents::Intent;

struct Pattern {
    intent: Intent,
    re: Regex,
}

static PATTERNS: LazyLock<Vec<Pattern>> = LazyLock::new(|| {
    let spec: &[(Intent, &str)] = &[
        (Intent::Greeting, r"(?i)\b(hi|hello|hey|good (morning|afternoon|evening))\b"),
        (Intent::Purchase, r"(?i)\b(buy|purchase|order|price|pricing|quote|checkout)\b"),
        (Intent::Scheduling, r"(?i)\b(schedule|book|appointment|meeting|availability|reschedule|calendar)\b"),
        (Intent::Legal, r"(?i)\b(contract|terms|legal|liability|lawsuit|compliance|gdpr)\b"),
        (Intent::TechnicalSupport, r"(?i)\b(bug|error|not working|crash|broken|issue|troubleshoot)\b"),
        (Intent::Complaint, r"(?i)\b(complain|unhappy|disappointed|refund|terrible|worst|unacceptable)\b"),
        (Intent::Cancellation, r"(?i)\b(cancel|unsubscribe|terminate|close my account)\b"),
        (Intent::RequestHuman, r"(?i)\b(human|agent|representative|real person|talk to someone)\b"),
    ];
    spec.iter()
        .map(|(intent, pattern)| Pattern {
            intent: *intent,
            re: Regex::new(pattern).expect("static pattern must compile"),
        })
        .collect()
});

/// Rule-based classification: pick the intent with the most pattern hits;
/// confidence is a bounded function of hit count relative to the text's
/// token count (§4.4 "bounded function of pattern hit count and coverage").
pub fn classify(text: &str) -> (Intent, f32) {
    let word_count = text.split_whitespace().count().max(1);
    let mut best: Option<(Intent, usize)> = None;

    for pattern in PATTERNS.iter() {
        let hits = pattern.re.find_iter(text).count();
        if hits == 0 {
            continue;
        }
        if best.map(|(_, best_hits)| hits > best_hits).unwrap_or(true) {
            best = Some((pattern.intent, hits));
        }
    }

    match best {
        Some((intent, hits)) => {
            let coverage = hits as f32 / word_count as f32;
            let confidence = (0.5 + coverage).min(0.95);
            (intent, confidence)
        }
        None => (Intent::Unknown, 0.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_scheduling_request() {
        let (intent, confidence) = classify("I'd like to book an appointment for next week");
        assert_eq!(intent, Intent::Scheduling);
        assert!(confidence > 0.5);
    }

    #[test]
    fn classifies_request_for_human() {
        let (intent, _) = classify("can I talk to a human please");
        assert_eq!(intent, Intent::RequestHuman);
    }

    #[test]
    fn unmatched_text_is_unknown() {
        let (intent, confidence) = classify("the quick brown fox jumps over the lazy dog");
        assert_eq!(intent, Intent::Unknown);
        assert_eq!(confidence, 0.0);
    }
}
