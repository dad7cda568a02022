//! HTTP adapter for the external calendar provider (§1: explicitly out of
//! scope — "the SMTP/calendar provider" — named only as a collaborator with
//! a defined contract). No vendor is specified, so this speaks a generic
//! REST shape; when no base URL is configured every operation degrades to
//! `Unavailable`, which is exactly the signal `SchedulingEngine::commit`
//! already knows how to turn into `Failed` + a customer-facing apology.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use relay_scheduling::{CalendarProvider, ExternalEvent, ProviderError};
use serde::Deserialize;
use std::time::Duration;

pub struct HttpCalendarProvider {
    client: reqwest::Client,
    base_url: Option<String>,
    api_key: Option<String>,
    deadline: Duration,
}

impl HttpCalendarProvider {
    pub fn new(base_url: Option<String>, api_key: Option<String>, deadline: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
            api_key,
            deadline,
        }
    }

    fn require_base_url(&self) -> Result<&str, ProviderError> {
        self.base_url
            .as_deref()
            .ok_or_else(|| ProviderError::Unavailable("no calendar provider configured".to_string()))
    }

    fn authed(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => req.bearer_auth(key),
            None => req,
        }
    }

    async fn with_deadline<T>(
        &self,
        fut: impl std::future::Future<Output = Result<T, ProviderError>>,
    ) -> Result<T, ProviderError> {
        tokio::time::timeout(self.deadline, fut)
            .await
            .unwrap_or_else(|_| Err(ProviderError::Unavailable("calendar provider deadline exceeded".to_string())))
    }
}

#[derive(Debug, Deserialize)]
struct BusyInterval {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct EventResponse {
    provider_event_id: String,
    meeting_url: String,
    calendar_url: String,
}

#[async_trait]
impl CalendarProvider for HttpCalendarProvider {
    async fn busy_intervals(&self, date: NaiveDate) -> Result<Vec<(DateTime<Utc>, DateTime<Utc>)>, ProviderError> {
        let base_url = self.require_base_url()?;
        self.with_deadline(async {
            let resp = self
                .authed(self.client.get(format!("{base_url}/availability")))
                .query(&[("date", date.to_string())])
                .send()
                .await?;
            if !resp.status().is_success() {
                return Err(ProviderError::Unavailable(format!(
                    "calendar provider returned {}",
                    resp.status()
                )));
            }
            let intervals: Vec<BusyInterval> = resp.json().await?;
            Ok(intervals.into_iter().map(|i| (i.start, i.end)).collect())
        })
        .await
    }

    async fn create_event(
        &self,
        dedup_key: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        customer_email: &str,
    ) -> Result<ExternalEvent, ProviderError> {
        let base_url = self.require_base_url()?;
        self.with_deadline(async {
            let resp = self
                .authed(self.client.post(format!("{base_url}/events")))
                .json(&serde_json::json!({
                    "dedup_key": dedup_key,
                    "start": start,
                    "end": end,
                    "customer_email": customer_email,
                }))
                .send()
                .await?;
            if !resp.status().is_success() {
                return Err(ProviderError::Unavailable(format!(
                    "calendar provider returned {}",
                    resp.status()
                )));
            }
            let body: EventResponse = resp.json().await?;
            Ok(ExternalEvent {
                provider_event_id: body.provider_event_id,
                meeting_url: body.meeting_url,
                calendar_url: body.calendar_url,
            })
        })
        .await
    }

    async fn find_by_dedup_key(&self, dedup_key: &str) -> Result<Option<ExternalEvent>, ProviderError> {
        let base_url = self.require_base_url()?;
        self.with_deadline(async {
            let resp = self
                .authed(self.client.get(format!("{base_url}/events")))
                .query(&[("dedup_key", dedup_key)])
                .send()
                .await?;
            if resp.status() == reqwest::StatusCode::NOT_FOUND {
                return Ok(None);
            }
            if !resp.status().is_success() {
                return Err(ProviderError::Unavailable(format!(
                    "calendar provider returned {}",
                    resp.status()
                )));
            }
            let body: EventResponse = resp.json().await?;
            Ok(Some(ExternalEvent {
                provider_event_id: body.provider_event_id,
                meeting_url: body.meeting_url,
                calendar_url: body.calendar_url,
            }))
        })
        .await
    }
}
