use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// A single extracted entity with its textual span (§4.4). Extractors are
/// pure functions of the text window; they never persist.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    pub kind: EntityKind,
    pub value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Email,
    Phone,
    NationalId,
    PostalCode,
    Date,
    Time,
    Money,
    Url,
}

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)[a-z0-9._%+-]+@[a-z0-9.-]+\.[a-z]{2,}").unwrap());
static PHONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\+?\d[\d ().-]{7,}\d").unwrap());
static NATIONAL_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d{2}-\d{7}-\d\b").unwrap());
static POSTAL_CODE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[A-Za-z]\d[A-Za-z][ -]?\d[A-Za-z]\d\b|\b\d{5}(-\d{4})?\b").unwrap());
static DATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(today|tomorrow|\d{4}-\d{2}-\d{2}|\d{1,2}/\d{1,2}/\d{2,4})\b").unwrap()
});
static TIME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b\d{1,2}:\d{2}\s?(am|pm)?\b").unwrap());
static MONEY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(\$|usd\s?|eur\s?|€)\s?\d+(\.\d{2})?\b").unwrap());
static URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)https?://[^\s]+").unwrap());

/// Extract every known entity kind from `text`. Order is deterministic
/// (declaration order of `EntityKind`) so callers can diff results.
pub fn extract(text: &str) -> Vec<Entity> {
    let mut out = Vec::new();
    extract_one(text, &EMAIL_RE, EntityKind::Email, &mut out);
    extract_one(text, &PHONE_RE, EntityKind::Phone, &mut out);
    extract_one(text, &NATIONAL_ID_RE, EntityKind::NationalId, &mut out);
    extract_one(text, &POSTAL_CODE_RE, EntityKind::PostalCode, &mut out);
    extract_one(text, &DATE_RE, EntityKind::Date, &mut out);
    extract_one(text, &TIME_RE, EntityKind::Time, &mut out);
    extract_one(text, &MONEY_RE, EntityKind::Money, &mut out);
    extract_one(text, &URL_RE, EntityKind::Url, &mut out);
    out
}

/// Map a model-returned entity kind label onto our closed `EntityKind` set.
pub fn entity_kind_from_str(s: &str) -> Option<EntityKind> {
    match s {
        "email" => Some(EntityKind::Email),
        "phone" => Some(EntityKind::Phone),
        "national_id" => Some(EntityKind::NationalId),
        "postal_code" => Some(EntityKind::PostalCode),
        "date" => Some(EntityKind::Date),
        "time" => Some(EntityKind::Time),
        "money" => Some(EntityKind::Money),
        "url" => Some(EntityKind::Url),
        _ => None,
    }
}

fn extract_one(text: &str, re: &Regex, kind: EntityKind, out: &mut Vec<Entity>) {
    for m in re.find_iter(text) {
        out.push(Entity {
            kind,
            value: m.as_str().to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_email_and_phone() {
        let entities = extract("reach me at jane@example.com or +1 415-555-0101");
        assert!(entities.iter().any(|e| e.kind == EntityKind::Email && e.value == "jane@example.com"));
        assert!(entities.iter().any(|e| e.kind == EntityKind::Phone));
    }

    #[test]
    fn extracts_relative_dates() {
        let entities = extract("can we meet tomorrow at 3:00 pm?");
        assert!(entities.iter().any(|e| e.kind == EntityKind::Date && e.value == "tomorrow"));
        assert!(entities.iter().any(|e| e.kind == EntityKind::Time));
    }

    #[test]
    fn extracts_money_and_url() {
        let entities = extract("the invoice is $129.99, details at https://example.com/inv/1");
        assert!(entities.iter().any(|e| e.kind == EntityKind::Money));
        assert!(entities.iter().any(|e| e.kind == EntityKind::Url));
    }
}
