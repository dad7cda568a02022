use serde::{Deserialize, Serialize};

/// Closed intent taxonomy (§4.4). Extend only by explicit registry change —
/// this enum IS the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Greeting,
    Purchase,
    Scheduling,
    Legal,
    TechnicalSupport,
    Complaint,
    Cancellation,
    RequestHuman,
    /// Agent-side labels, used when classifying text already routed into an
    /// agent panel rather than the main customer timeline.
    AgentAcknowledge,
    AgentEscalate,
    /// No pattern matched with sufficient confidence.
    Unknown,
}

/// Which strategy produced a classification (§4.4: "the returned object
/// MUST advertise method ∈ {rule, model}").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Method {
    Rule,
    Model,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Classification {
    pub intent: Intent,
    pub confidence: f32,
    pub method: Method,
    pub entities: Vec<crate::entities::Entity>,
}
