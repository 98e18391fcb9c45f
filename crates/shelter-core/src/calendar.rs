//! Remote calendar integration.
//!
//! The calendar is a reminder convenience, never the system of record. Gateways only
//! speak in terms of [`CalendarEvent`] and opaque event ids; vendor payloads stay in
//! this module.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::config::CalendarSettings;

/// Reminder event derived from an application record.
#[derive(Debug, Clone, PartialEq)]
pub struct CalendarEvent {
    pub summary: String,
    pub description: String,
    pub start: DateTime<Utc>,
    /// RRULE value without the `RRULE:` prefix.
    pub recurrence_rule: Option<String>,
    pub timezone: Tz,
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("calendar integration is not configured")]
    NotConfigured,
    #[error("calendar request timed out after {0:?}")]
    Timeout(Duration),
    #[error("calendar request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("calendar service returned HTTP {status}: {message}")]
    Status { status: u16, message: String },
    #[error("unexpected calendar response: {0}")]
    Decode(String),
}

#[async_trait]
pub trait CalendarGateway: Send + Sync {
    /// Create an event and return its external id.
    async fn create_event(&self, event: &CalendarEvent) -> Result<String, GatewayError>;

    /// Replace the fields of an existing event. No core workflow calls this yet.
    async fn update_event(&self, event_id: &str, event: &CalendarEvent)
    -> Result<(), GatewayError>;

    /// Delete an event. Implementations treat an already-missing event as success.
    async fn delete_event(&self, event_id: &str) -> Result<(), GatewayError>;
}

/// Gateway for installations without calendar credentials.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnconfiguredCalendar;

#[async_trait]
impl CalendarGateway for UnconfiguredCalendar {
    async fn create_event(&self, _event: &CalendarEvent) -> Result<String, GatewayError> {
        Err(GatewayError::NotConfigured)
    }

    async fn update_event(
        &self,
        _event_id: &str,
        _event: &CalendarEvent,
    ) -> Result<(), GatewayError> {
        Err(GatewayError::NotConfigured)
    }

    async fn delete_event(&self, _event_id: &str) -> Result<(), GatewayError> {
        Err(GatewayError::NotConfigured)
    }
}

/// Pick the gateway for `settings`, with a warning when reminders are unavailable.
pub fn gateway_from_settings(
    settings: &CalendarSettings,
) -> (Arc<dyn CalendarGateway>, Option<String>) {
    if !settings.enabled {
        return (Arc::new(UnconfiguredCalendar), None);
    }

    let Some(token) = settings.access_token() else {
        return (
            Arc::new(UnconfiguredCalendar),
            Some(format!(
                "{} is not set; reminders will not be scheduled.",
                settings.access_token_env
            )),
        );
    };

    match GoogleCalendarGateway::new(settings, token) {
        Ok(gateway) => (Arc::new(gateway), None),
        Err(err) => (
            Arc::new(UnconfiguredCalendar),
            Some(format!("Calendar client could not be created: {err}")),
        ),
    }
}

/// Google Calendar v3 REST adapter.
pub struct GoogleCalendarGateway {
    client: reqwest::Client,
    base_url: String,
    calendar_id: String,
    access_token: String,
    event_duration: chrono::Duration,
}

impl GoogleCalendarGateway {
    pub fn new(settings: &CalendarSettings, access_token: String) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .user_agent("shelter-scheduler/0.1")
            .timeout(settings.timeout())
            .build()?;

        Ok(Self {
            client,
            base_url: settings.api_base_url.trim_end_matches('/').to_string(),
            calendar_id: settings.calendar_id.clone(),
            access_token,
            event_duration: chrono::Duration::minutes(i64::from(settings.event_duration_minutes)),
        })
    }

    fn events_url(&self) -> String {
        format!(
            "{}/calendars/{}/events",
            self.base_url,
            urlencoding::encode(&self.calendar_id)
        )
    }

    fn event_url(&self, event_id: &str) -> String {
        format!("{}/{}", self.events_url(), urlencoding::encode(event_id))
    }
}

#[async_trait]
impl CalendarGateway for GoogleCalendarGateway {
    async fn create_event(&self, event: &CalendarEvent) -> Result<String, GatewayError> {
        #[derive(Deserialize)]
        struct CreatedEvent {
            id: String,
        }

        debug!(url = %self.events_url(), rule = ?event.recurrence_rule, "Creating calendar event");
        let response = self
            .client
            .post(self.events_url())
            .bearer_auth(&self.access_token)
            .json(&EventBody::new(event, self.event_duration))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let created: CreatedEvent = response
            .json()
            .await
            .map_err(|err| GatewayError::Decode(err.to_string()))?;
        Ok(created.id)
    }

    async fn update_event(
        &self,
        event_id: &str,
        event: &CalendarEvent,
    ) -> Result<(), GatewayError> {
        debug!(event_id, "Updating calendar event");
        let response = self
            .client
            .put(self.event_url(event_id))
            .bearer_auth(&self.access_token)
            .json(&EventBody::new(event, self.event_duration))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }
        Ok(())
    }

    async fn delete_event(&self, event_id: &str) -> Result<(), GatewayError> {
        debug!(event_id, "Deleting calendar event");
        let response = self
            .client
            .delete(self.event_url(event_id))
            .bearer_auth(&self.access_token)
            .send()
            .await?;

        let status = response.status();
        // 410 Gone is what Google returns for an event that was already deleted.
        if status.is_success()
            || status == reqwest::StatusCode::NOT_FOUND
            || status == reqwest::StatusCode::GONE
        {
            return Ok(());
        }
        Err(error_from_response(response).await)
    }
}

#[derive(Debug, Serialize)]
struct EventBody<'a> {
    summary: &'a str,
    description: &'a str,
    start: EventTime,
    end: EventTime,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    recurrence: Vec<String>,
    reminders: Reminders,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EventTime {
    date_time: String,
    time_zone: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Reminders {
    use_default: bool,
}

impl<'a> EventBody<'a> {
    fn new(event: &'a CalendarEvent, duration: chrono::Duration) -> Self {
        let time = |instant: DateTime<Utc>| EventTime {
            date_time: instant.with_timezone(&event.timezone).to_rfc3339(),
            time_zone: event.timezone.name().to_string(),
        };

        Self {
            summary: &event.summary,
            description: &event.description,
            start: time(event.start),
            end: time(event.start + duration),
            recurrence: event
                .recurrence_rule
                .iter()
                .map(|rule| format!("RRULE:{rule}"))
                .collect(),
            reminders: Reminders { use_default: true },
        }
    }
}

async fn error_from_response(response: reqwest::Response) -> GatewayError {
    #[derive(Deserialize)]
    struct ErrorEnvelope {
        error: ErrorDetail,
    }

    #[derive(Deserialize)]
    struct ErrorDetail {
        message: String,
    }

    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorEnvelope>(&body)
        .map(|envelope| envelope.error.message)
        .unwrap_or_else(|_| {
            status
                .canonical_reason()
                .unwrap_or("unknown error")
                .to_string()
        });

    GatewayError::Status {
        status: status.as_u16(),
        message,
    }
}
