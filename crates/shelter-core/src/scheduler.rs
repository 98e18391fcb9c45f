//! Keeps medicine application records and their calendar reminders loosely in step.
//!
//! The local record is authoritative. Calendar calls are bounded by a timeout and their
//! failures are downgraded to warnings; only validation and persistence can fail an
//! operation.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono_tz::Tz;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::application::{ApplicationDraft, ApplicationRecord, InvalidScheduleError, validate};
use crate::calendar::{CalendarEvent, CalendarGateway, GatewayError};
use crate::config::{CalendarSettings, DEFAULT_TIMEOUT_SECS};
use crate::recurrence::render_rule;
use crate::repository::{ApplicationRepository, RepositoryError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerSettings {
    /// Zone used for calendar days (end-date checks, UNTIL) and event times.
    pub timezone: Tz,
    /// Upper bound on every calendar call; expiry counts as a gateway failure.
    pub gateway_timeout: Duration,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            timezone: Tz::UTC,
            gateway_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl From<&CalendarSettings> for SchedulerSettings {
    fn from(settings: &CalendarSettings) -> Self {
        Self {
            timezone: settings.zone(),
            gateway_timeout: settings.timeout(),
        }
    }
}

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("invalid schedule: {0}")]
    InvalidSchedule(#[from] InvalidScheduleError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Result of a successful create. The record is always persisted; the warning is set
/// when no reminder could be scheduled.
#[derive(Debug)]
pub struct CreateOutcome {
    pub record: ApplicationRecord,
    pub calendar_warning: Option<GatewayError>,
}

impl CreateOutcome {
    pub fn is_linked(&self) -> bool {
        self.record.is_linked()
    }

    pub fn warning_message(&self) -> Option<String> {
        self.calendar_warning
            .as_ref()
            .map(|err| format!("Saved, but the reminder could not be scheduled: {err}"))
    }
}

#[derive(Debug)]
pub enum DeleteOutcome {
    Deleted {
        record: ApplicationRecord,
        /// Set when the linked calendar event could not be removed.
        calendar_warning: Option<GatewayError>,
    },
    /// Nothing stored under that id; treated as success.
    NotFound,
}

pub struct ApplicationScheduler {
    repository: Arc<dyn ApplicationRepository>,
    calendar: Arc<dyn CalendarGateway>,
    settings: SchedulerSettings,
}

impl ApplicationScheduler {
    pub fn new(
        repository: Arc<dyn ApplicationRepository>,
        calendar: Arc<dyn CalendarGateway>,
        settings: SchedulerSettings,
    ) -> Self {
        Self {
            repository,
            calendar,
            settings,
        }
    }

    pub fn settings(&self) -> SchedulerSettings {
        self.settings
    }

    /// Validate, schedule the reminder, then persist.
    ///
    /// If persistence fails after the reminder was created, the reminder is deleted
    /// again before the persistence error is returned.
    pub async fn create(&self, draft: ApplicationDraft) -> Result<CreateOutcome, SchedulerError> {
        let zone = self.settings.timezone;
        let validated = validate(&draft, zone)?;

        let rule = render_rule(validated.recurrence, validated.ends_on(zone));
        debug!(recurrence = %validated.recurrence, rule = ?rule, "Rendered recurrence rule");

        let event = CalendarEvent {
            summary: validated.summary.clone(),
            description: validated.description.clone(),
            start: validated.applied_at,
            recurrence_rule: rule,
            timezone: zone,
        };

        let (event_ref, calendar_warning) =
            match self.bounded(self.calendar.create_event(&event)).await {
                Ok(event_id) => (Some(event_id), None),
                Err(err) => {
                    warn!(error = %err, "Calendar event not created; saving without a reminder");
                    (None, Some(err))
                }
            };

        let record = validated.into_record(event_ref.clone());
        let application_id = record.id;

        match self.repository.save(record).await {
            Ok(saved) => {
                info!(
                    application_id = %saved.id,
                    animal_id = %saved.animal_id,
                    event_id = ?saved.external_event_ref,
                    "Medicine application created"
                );
                Ok(CreateOutcome {
                    record: saved,
                    calendar_warning,
                })
            }
            Err(err) => {
                if let Some(event_id) = event_ref.as_deref() {
                    self.compensate(application_id, event_id).await;
                }
                Err(err.into())
            }
        }
    }

    /// Delete a record and, best effort, its reminder. Missing ids succeed.
    pub async fn delete(&self, id: Uuid) -> Result<DeleteOutcome, SchedulerError> {
        let Some(record) = self.repository.find_by_id(id).await? else {
            debug!(application_id = %id, "Nothing to delete");
            return Ok(DeleteOutcome::NotFound);
        };

        let calendar_warning = match record.external_event_ref.as_deref() {
            Some(event_id) => match self.bounded(self.calendar.delete_event(event_id)).await {
                Ok(()) => None,
                Err(err) => {
                    warn!(
                        application_id = %id,
                        event_id,
                        error = %err,
                        "Calendar event not deleted; removing the record anyway"
                    );
                    Some(err)
                }
            },
            None => None,
        };

        self.repository.delete_by_id(id).await?;
        info!(application_id = %id, "Medicine application deleted");

        Ok(DeleteOutcome::Deleted {
            record,
            calendar_warning,
        })
    }

    pub async fn list_for_animal(
        &self,
        animal_id: Uuid,
    ) -> Result<Vec<ApplicationRecord>, SchedulerError> {
        Ok(self.repository.list_for_animal(animal_id).await?)
    }

    async fn compensate(&self, application_id: Uuid, event_id: &str) {
        warn!(
            application_id = %application_id,
            event_id,
            "Record not saved; deleting the orphaned calendar event"
        );
        if let Err(err) = self.bounded(self.calendar.delete_event(event_id)).await {
            error!(
                event_id,
                error = %err,
                "Orphaned calendar event could not be deleted"
            );
        }
    }

    async fn bounded<T, F>(&self, call: F) -> Result<T, GatewayError>
    where
        F: Future<Output = Result<T, GatewayError>>,
    {
        let limit = self.settings.gateway_timeout;
        tokio::time::timeout(limit, call)
            .await
            .unwrap_or(Err(GatewayError::Timeout(limit)))
    }
}
