//! Timestamp parsing for user input and calendar-day projection in the shelter's timezone.

use chrono::{DateTime, LocalResult, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use thiserror::Error;

const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimeParseError {
    #[error("'{0}' is not a recognised date or time (expected RFC 3339, YYYY-MM-DD HH:MM or YYYY-MM-DD)")]
    Unrecognized(String),
    #[error("'{input}' does not exist in timezone {zone}")]
    Nonexistent { input: String, zone: Tz },
}

/// Parse a user-entered timestamp.
///
/// Inputs carrying an explicit offset are taken as-is; everything else is wall-clock
/// time in `zone`. A bare date means local midnight.
pub fn parse_timestamp(input: &str, zone: Tz) -> Result<DateTime<Utc>, TimeParseError> {
    let trimmed = input.trim();

    if let Ok(with_offset) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(with_offset.with_timezone(&Utc));
    }

    let naive = NAIVE_DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(trimmed, format).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
        .ok_or_else(|| TimeParseError::Unrecognized(trimmed.to_string()))?;

    localize(naive, zone).ok_or_else(|| TimeParseError::Nonexistent {
        input: trimmed.to_string(),
        zone,
    })
}

/// Resolve wall-clock time in `zone`; ambiguous times pick the earlier instant.
pub fn localize(naive: NaiveDateTime, zone: Tz) -> Option<DateTime<Utc>> {
    match zone.from_local_datetime(&naive) {
        LocalResult::Single(local) => Some(local.with_timezone(&Utc)),
        LocalResult::Ambiguous(earliest, _) => Some(earliest.with_timezone(&Utc)),
        LocalResult::None => None,
    }
}

/// Calendar day of `instant` as seen in `zone`.
pub fn local_date(instant: DateTime<Utc>, zone: Tz) -> NaiveDate {
    instant.with_timezone(&zone).date_naive()
}
