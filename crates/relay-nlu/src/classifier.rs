use std::time::Duration;

use tracing::warn;

use crate::entities;
use crate::intents::{Classification, Method};
use crate::model::ModelClassifier;
use crate::rule;

/// NLU Classifier (§4.4): model-backed when configured and reachable,
/// rule-based as the unconditional fallback — specialized from the
/// teacher's N-provider `ProviderRouter` priority list down to this fixed
/// two-strategy decision. A model failure never propagates; there is no
/// retry, since the rule-based strategy is always available.
pub struct Classifier {
    model: Option<ModelClassifier>,
    deadline: Duration,
}

impl Classifier {
    pub fn new(model: Option<ModelClassifier>, deadline: Duration) -> Self {
        Self { model, deadline }
    }

    pub async fn classify(&self, text: &str, speaker: &str) -> Classification {
        let entities = entities::extract(text);

        if let Some(model) = &self.model {
            match tokio::time::timeout(self.deadline, model.classify(text)).await {
                Ok(Ok((intent, confidence, model_entities))) => {
                    let mut merged = model_entities;
                    merged.extend(entities);
                    return Classification {
                        intent,
                        confidence,
                        method: Method::Model,
                        entities: merged,
                    };
                }
                Ok(Err(err)) => {
                    warn!(%err, speaker, "model-backed NLU failed, falling back to rule-based");
                }
                Err(_) => {
                    warn!(speaker, "model-backed NLU timed out, falling back to rule-based");
                }
            }
        }

        let (intent, confidence) = rule::classify(text);
        Classification {
            intent,
            confidence,
            method: Method::Rule,
            entities,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn falls_back_to_rule_based_without_a_model() {
        let classifier = Classifier::new(None, Duration::from_millis(500));
        let result = classifier.classify("I want to book an appointment", "customer").await;
        assert_eq!(result.method, Method::Rule);
        assert_eq!(result.intent, crate::intents::Intent::Scheduling);
    }

    #[tokio::test]
    async fn falls_back_when_model_endpoint_is_unreachable() {
        let model = ModelClassifier::new("http://127.0.0.1:1/v1/chat", "test-key", "test-model");
        let classifier = Classifier::new(Some(model), Duration::from_millis(200));
        let result = classifier.classify("hello there", "customer").await;
        assert_eq!(result.method, Method::Rule);
        assert_eq!(result.intent, crate::intents::Intent::Greeting);
    }
}
