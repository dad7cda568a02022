use serde::Deserialize;
use tracing::warn;

use crate::entities::Entity;
use crate::error::NluError;
use crate::intents::Intent;

/// One call to a chat-completion-style external model, prompted to return a
/// strict JSON object drawn from the advertised taxonomy (§4.4). Mirrors the
/// request/response shape of `relay-agents`' `LlmProvider::send`, scaled
/// down to the single-shot classification use case.
pub struct ModelClassifier {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
}

#[derive(Debug, Deserialize)]
struct ModelOutput {
    intent: String,
    confidence: f32,
    #[serde(default)]
    entities: Vec<ModelEntity>,
}

#[derive(Debug, Deserialize)]
struct ModelEntity {
    kind: String,
    value: String,
}

impl ModelClassifier {
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    pub async fn classify(&self, text: &str) -> Result<(Intent, f32, Vec<Entity>), NluError> {
        let prompt = format!(
            "Classify the following customer message into exactly one of: \
             greeting, purchase, scheduling, legal, technical_support, complaint, \
             cancellation, request_human. Respond with strict JSON only: \
             {{\"intent\": string, \"confidence\": number between 0 and 1, \
             \"entities\": [{{\"kind\": string, \"value\": string}}]}}.\n\nMessage: {text}"
        );

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({
                "model": self.model,
                "messages": [{"role": "user", "content": prompt}],
                "max_tokens": 256,
            }))
            .send()
            .await
            .map_err(|e| NluError::ModelUnavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(NluError::ModelUnavailable(format!(
                "model endpoint returned {}",
                response.status()
            )));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| NluError::ModelMalformed(e.to_string()))?;

        let content = body
            .get("content")
            .and_then(|v| v.as_str())
            .ok_or_else(|| NluError::ModelMalformed("missing content field".to_string()))?;

        let output: ModelOutput = serde_json::from_str(content)
            .map_err(|e| NluError::ModelMalformed(e.to_string()))?;

        let intent = parse_intent(&output.intent).unwrap_or_else(|| {
            warn!(intent = %output.intent, "model returned an intent outside the taxonomy");
            Intent::Unknown
        });

        let entities = output
            .entities
            .into_iter()
            .filter_map(|e| {
                crate::entities::entity_kind_from_str(&e.kind).map(|kind| Entity { kind, value: e.value })
            })
            .collect();

        Ok((intent, output.confidence.clamp(0.0, 1.0), entities))
    }
}

fn parse_intent(s: &str) -> Option<Intent> {
    match s {
        "greeting" => Some(Intent::Greeting),
        "purchase" => Some(Intent::Purchase),
        "scheduling" => Some(Intent::Scheduling),
        "legal" => Some(Intent::Legal),
        "technical_support" => Some(Intent::TechnicalSupport),
        "complaint" => Some(Intent::Complaint),
        "cancellation" => Some(Intent::Cancellation),
        "request_human" => Some(Intent::RequestHuman),
        "agent_acknowledge" => Some(Intent::AgentAcknowledge),
        "agent_escalate" => Some(Intent::AgentEscalate),
        _ => None,
    }
}
