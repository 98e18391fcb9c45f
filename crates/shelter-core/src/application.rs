use chrono::{DateTime, Days, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::recurrence::RecurrencePolicy;
use crate::time::local_date;

pub const DEFAULT_REMINDER_SUMMARY: &str = "Medicine application";

/// One logged medicine administration.
///
/// `external_event_ref` is a weak link to a calendar event: a missing or stale value is
/// a normal state, and nothing about the record's lifecycle depends on it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationRecord {
    pub id: Uuid,
    pub medicine_id: Uuid,
    pub user_id: Uuid,
    pub animal_id: Uuid,
    pub applied_at: DateTime<Utc>,
    pub quantity: f64,
    pub next_application_at: Option<DateTime<Utc>>,
    pub recurrence: RecurrencePolicy,
    pub ends_at: Option<DateTime<Utc>>,
    pub external_event_ref: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Relationship between a record and its calendar event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalendarLink {
    NoExternalEvent,
    ExternalEventLinked,
}

impl ApplicationRecord {
    pub fn calendar_link(&self) -> CalendarLink {
        match self.external_event_ref {
            Some(_) => CalendarLink::ExternalEventLinked,
            None => CalendarLink::NoExternalEvent,
        }
    }

    pub fn is_linked(&self) -> bool {
        self.calendar_link() == CalendarLink::ExternalEventLinked
    }
}

/// Unvalidated form input for a new application.
#[derive(Debug, Clone, Default)]
pub struct ApplicationDraft {
    pub medicine_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub animal_id: Option<Uuid>,
    pub applied_at: Option<DateTime<Utc>>,
    /// Raw text as typed; `,` is accepted as the decimal separator.
    pub quantity: String,
    pub next_application_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
    pub recurrence: RecurrencePolicy,
    pub summary: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidScheduleError {
    #[error("{0} is required")]
    MissingField(&'static str),
    #[error("quantity '{input}' is invalid: {reason}")]
    InvalidQuantity { input: String, reason: &'static str },
    #[error("end date {ends_on} is before the application date {applied_on}")]
    EndsBeforeStart {
        applied_on: NaiveDate,
        ends_on: NaiveDate,
    },
    #[error("end date {0} is out of range")]
    EndsOutOfRange(NaiveDate),
}

/// A draft that passed [`validate`]; nothing here has touched a collaborator yet.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedApplication {
    pub medicine_id: Uuid,
    pub user_id: Uuid,
    pub animal_id: Uuid,
    pub applied_at: DateTime<Utc>,
    pub quantity: f64,
    pub next_application_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
    pub recurrence: RecurrencePolicy,
    pub summary: String,
    pub description: String,
}

impl ValidatedApplication {
    /// Last calendar day covered by the recurrence, if it has one.
    pub fn ends_on(&self, zone: Tz) -> Option<NaiveDate> {
        self.ends_at.map(|ends_at| local_date(ends_at, zone))
    }

    pub fn into_record(self, external_event_ref: Option<String>) -> ApplicationRecord {
        ApplicationRecord {
            id: Uuid::new_v4(),
            medicine_id: self.medicine_id,
            user_id: self.user_id,
            animal_id: self.animal_id,
            applied_at: self.applied_at,
            quantity: self.quantity,
            next_application_at: self.next_application_at,
            recurrence: self.recurrence,
            ends_at: self.ends_at,
            external_event_ref,
            created_at: Utc::now(),
        }
    }
}

/// Parse a user-entered quantity, accepting both `.` and `,` as decimal separator.
pub fn parse_quantity(raw: &str) -> Result<f64, InvalidScheduleError> {
    let normalized = raw.trim().replace(',', ".");
    let invalid = |reason| InvalidScheduleError::InvalidQuantity {
        input: raw.trim().to_string(),
        reason,
    };

    if normalized.is_empty() {
        return Err(InvalidScheduleError::MissingField("quantity"));
    }

    let value: f64 = normalized.parse().map_err(|_| invalid("not a number"))?;
    if !value.is_finite() {
        return Err(invalid("not a finite number"));
    }
    if value < 0.0 {
        return Err(invalid("must not be negative"));
    }
    Ok(value)
}

/// Check a draft before any I/O. Reports the first failing field.
///
/// The end date is compared by calendar day in `zone`, so ending on the same day as
/// the first application is valid whatever the clock time.
pub fn validate(
    draft: &ApplicationDraft,
    zone: Tz,
) -> Result<ValidatedApplication, InvalidScheduleError> {
    let applied_at = draft
        .applied_at
        .ok_or(InvalidScheduleError::MissingField("applied_at"))?;
    let medicine_id = draft
        .medicine_id
        .ok_or(InvalidScheduleError::MissingField("medicine"))?;
    let animal_id = draft
        .animal_id
        .ok_or(InvalidScheduleError::MissingField("animal"))?;
    let user_id = draft
        .user_id
        .ok_or(InvalidScheduleError::MissingField("user"))?;
    let quantity = parse_quantity(&draft.quantity)?;

    if let Some(ends_at) = draft.ends_at {
        let applied_on = local_date(applied_at, zone);
        let ends_on = local_date(ends_at, zone);
        if ends_on < applied_on {
            return Err(InvalidScheduleError::EndsBeforeStart {
                applied_on,
                ends_on,
            });
        }
        if draft.recurrence.repeats() && ends_on.checked_add_days(Days::new(1)).is_none() {
            return Err(InvalidScheduleError::EndsOutOfRange(ends_on));
        }
    }

    let summary = draft
        .summary
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or(DEFAULT_REMINDER_SUMMARY)
        .to_string();
    let description = draft
        .description
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| {
            format!("Quantity: {quantity}\nAnimal: {animal_id}\nMedicine: {medicine_id}")
        });

    Ok(ValidatedApplication {
        medicine_id,
        user_id,
        animal_id,
        applied_at,
        quantity,
        next_application_at: draft.next_application_at,
        ends_at: draft.ends_at,
        recurrence: draft.recurrence,
        summary,
        description,
    })
}
