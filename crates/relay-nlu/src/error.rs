use thiserror::Error;

/// Internal failure modes for the model-backed strategy. Never surfaced to
/// callers of `Classifier::classify` — every one of these triggers the
/// unconditional fall back to the rule-based strategy (§4.4).
#[derive(Debug, Error)]
pub enum NluError {
    #[error("model endpoint unavailable: {0}")]
    ModelUnavailable(String),

    #[error("model response was not valid JSON in the expected shape: {0}")]
    ModelMalformed(String),

    #[error("model call timed out")]
    Timeout,
}
