use std::fmt;
use std::str::FromStr;

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const WEEKDAYS_ONLY: &str = "BYDAY=MO,TU,WE,TH,FR";

/// How a logged medicine application repeats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecurrencePolicy {
    #[default]
    NoRepeat,
    Daily,
    /// Same weekday as the first application.
    Weekly,
    /// Same day of the month as the first application.
    Monthly,
    Annually,
    /// Monday through Friday.
    EveryWeekday,
}

impl RecurrencePolicy {
    pub const ALL: [RecurrencePolicy; 6] = [
        RecurrencePolicy::NoRepeat,
        RecurrencePolicy::Daily,
        RecurrencePolicy::Weekly,
        RecurrencePolicy::Monthly,
        RecurrencePolicy::Annually,
        RecurrencePolicy::EveryWeekday,
    ];

    /// Stable string stored in the `frequency` column.
    pub fn as_str(self) -> &'static str {
        match self {
            RecurrencePolicy::NoRepeat => "no_repeat",
            RecurrencePolicy::Daily => "daily",
            RecurrencePolicy::Weekly => "weekly",
            RecurrencePolicy::Monthly => "monthly",
            RecurrencePolicy::Annually => "annually",
            RecurrencePolicy::EveryWeekday => "every_weekday",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            RecurrencePolicy::NoRepeat => "Does not repeat",
            RecurrencePolicy::Daily => "Daily",
            RecurrencePolicy::Weekly => "Weekly",
            RecurrencePolicy::Monthly => "Monthly",
            RecurrencePolicy::Annually => "Annually",
            RecurrencePolicy::EveryWeekday => "Every weekday (Monday to Friday)",
        }
    }

    pub fn repeats(self) -> bool {
        self != RecurrencePolicy::NoRepeat
    }

    /// See [`render_rule`].
    pub fn to_rule(self, ends_on: Option<NaiveDate>) -> Option<String> {
        render_rule(self, ends_on)
    }
}

impl fmt::Display for RecurrencePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown recurrence policy '{0}'")]
pub struct UnknownPolicy(pub String);

impl FromStr for RecurrencePolicy {
    type Err = UnknownPolicy;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        let policy = match normalized.as_str() {
            "no_repeat" | "none" => RecurrencePolicy::NoRepeat,
            "daily" => RecurrencePolicy::Daily,
            "weekly" => RecurrencePolicy::Weekly,
            "monthly" => RecurrencePolicy::Monthly,
            "annually" | "yearly" => RecurrencePolicy::Annually,
            "every_weekday" | "weekdays" => RecurrencePolicy::EveryWeekday,
            _ => return Err(UnknownPolicy(value.to_string())),
        };
        Ok(policy)
    }
}

/// Render a policy as an RFC 5545 `RRULE` value (without the `RRULE:` prefix).
///
/// `ends_on` is the last day that still receives a dose. UNTIL is written as the
/// following day because calendars treat a date-only UNTIL as midnight, which would
/// otherwise drop the final occurrence. `NoRepeat` never produces a rule, even when
/// an end date is supplied.
pub fn render_rule(policy: RecurrencePolicy, ends_on: Option<NaiveDate>) -> Option<String> {
    let mut rule = match policy {
        RecurrencePolicy::NoRepeat => return None,
        RecurrencePolicy::Daily => "FREQ=DAILY".to_string(),
        RecurrencePolicy::Weekly => "FREQ=WEEKLY".to_string(),
        RecurrencePolicy::Monthly => "FREQ=MONTHLY".to_string(),
        RecurrencePolicy::Annually => "FREQ=YEARLY".to_string(),
        RecurrencePolicy::EveryWeekday => format!("FREQ=WEEKLY;{WEEKDAYS_ONLY}"),
    };

    // The last representable day has no successor and serves as its own bound.
    let until = ends_on.map(|date| date.checked_add_days(Days::new(1)).unwrap_or(date));
    if let Some(until) = until {
        rule.push_str(&format!(";UNTIL={}", until.format("%Y%m%d")));
    }

    Some(rule)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_no_repeat_never_renders() {
        assert_eq!(render_rule(RecurrencePolicy::NoRepeat, None), None);
        assert_eq!(
            render_rule(RecurrencePolicy::NoRepeat, Some(date(2024, 3, 12))),
            None
        );
    }

    #[test]
    fn test_rules_without_end_date() {
        assert_eq!(RecurrencePolicy::Daily.to_rule(None).unwrap(), "FREQ=DAILY");
        assert_eq!(RecurrencePolicy::Weekly.to_rule(None).unwrap(), "FREQ=WEEKLY");
        assert_eq!(RecurrencePolicy::Monthly.to_rule(None).unwrap(), "FREQ=MONTHLY");
        assert_eq!(RecurrencePolicy::Annually.to_rule(None).unwrap(), "FREQ=YEARLY");
        assert_eq!(
            RecurrencePolicy::EveryWeekday.to_rule(None).unwrap(),
            "FREQ=WEEKLY;BYDAY=MO,TU,WE,TH,FR"
        );
    }

    #[test]
    fn test_daily_until_is_day_after_end() {
        let rule = render_rule(RecurrencePolicy::Daily, Some(date(2024, 3, 12)));
        assert_eq!(rule.as_deref(), Some("FREQ=DAILY;UNTIL=20240313"));
    }

    #[test]
    fn test_until_crosses_month_and_year_boundaries() {
        for policy in RecurrencePolicy::ALL.into_iter().filter(|p| p.repeats()) {
            let rule = policy.to_rule(Some(date(2024, 2, 29))).unwrap();
            assert!(rule.ends_with(";UNTIL=20240301"), "{policy}: {rule}");

            let rule = policy.to_rule(Some(date(2023, 12, 31))).unwrap();
            assert!(rule.ends_with(";UNTIL=20240101"), "{policy}: {rule}");
        }
    }

    #[test]
    fn test_end_date_at_calendar_limit_stays_bounded() {
        assert_eq!(
            render_rule(RecurrencePolicy::Daily, Some(NaiveDate::MAX)).unwrap(),
            format!("FREQ=DAILY;UNTIL={}", NaiveDate::MAX.format("%Y%m%d"))
        );
    }

    #[test]
    fn test_weekday_rule_keeps_byday_before_until() {
        let rule = RecurrencePolicy::EveryWeekday.to_rule(Some(date(2024, 6, 7)));
        assert_eq!(
            rule.as_deref(),
            Some("FREQ=WEEKLY;BYDAY=MO,TU,WE,TH,FR;UNTIL=20240608")
        );
    }

    #[test]
    fn test_storage_strings_parse_back() {
        for policy in RecurrencePolicy::ALL {
            assert_eq!(policy.as_str().parse::<RecurrencePolicy>(), Ok(policy));
        }
        assert_eq!("Yearly".parse::<RecurrencePolicy>(), Ok(RecurrencePolicy::Annually));
        assert_eq!(
            "every-weekday".parse::<RecurrencePolicy>(),
            Ok(RecurrencePolicy::EveryWeekday)
        );
        assert!("fortnightly".parse::<RecurrencePolicy>().is_err());
    }
}
