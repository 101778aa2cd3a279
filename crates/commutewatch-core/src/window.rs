//! Recurring daily commute window.
//!
//! A window is a time-of-day interval interpreted every weekday in the
//! subscriber's timezone. Membership is decided on civil time obtained
//! through chrono-tz, never by reformatting instants through strings.

use chrono::{DateTime, Datelike, Timelike, Utc, Weekday};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Wall-clock time of day with minute precision. Seconds are always zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TimeOfDay {
    pub hour: u32,
    pub minute: u32,
}

impl TimeOfDay {
    /// Build from components, validating ranges.
    pub fn new(hour: u32, minute: u32) -> Result<Self, ValidationError> {
        if hour > 23 {
            return Err(ValidationError::InvalidField {
                field: "hour".to_string(),
                message: format!("{hour} is not in 0..=23"),
            });
        }
        if minute > 59 {
            return Err(ValidationError::InvalidField {
                field: "minute".to_string(),
                message: format!("{minute} is not in 0..=59"),
            });
        }
        Ok(Self { hour, minute })
    }

    /// Parse a caller-supplied hour-of-day string: `"17"` or `"17:30"`.
    ///
    /// Seconds are never accepted; the stored bound always truncates to
    /// minute precision.
    pub fn parse(field: &str, value: &str) -> Result<Self, ValidationError> {
        let invalid = |message: String| ValidationError::InvalidField {
            field: field.to_string(),
            message,
        };

        let value = value.trim();
        if value.is_empty() {
            return Err(ValidationError::MissingField(field.to_string()));
        }

        let (hour_part, minute_part) = match value.split_once(':') {
            Some((h, m)) => (h, Some(m)),
            None => (value, None),
        };

        let hour: u32 = hour_part
            .parse()
            .map_err(|_| invalid(format!("'{value}' is not a valid hour of day")))?;
        let minute: u32 = match minute_part {
            Some(m) => m
                .parse()
                .map_err(|_| invalid(format!("'{value}' is not a valid hour of day")))?,
            None => 0,
        };

        Self::new(hour, minute).map_err(|e| match e {
            ValidationError::InvalidField { message, .. } => invalid(message),
            other => other,
        })
    }
}

impl std::fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

/// A recurring weekday time window in a named timezone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: TimeOfDay,
    pub end: TimeOfDay,
    pub zone: Tz,
}

impl TimeWindow {
    /// Build a window, rejecting `end < start`.
    ///
    /// Midnight-crossing windows are rejected outright rather than silently
    /// never matching, which is what a naive same-day comparison would do.
    pub fn new(start: TimeOfDay, end: TimeOfDay, zone: Tz) -> Result<Self, ValidationError> {
        if end < start {
            return Err(ValidationError::WindowOrder {
                start: start.to_string(),
                end: end.to_string(),
            });
        }
        Ok(Self { start, end, zone })
    }

    /// Resolve a timezone name, mapping unknown names to a validation error.
    pub fn parse_zone(name: &str) -> Result<Tz, ValidationError> {
        name.parse::<Tz>()
            .map_err(|_| ValidationError::UnknownTimezone(name.to_string()))
    }

    /// Whether `now` falls inside this window.
    ///
    /// Commutes are a workday phenomenon: Saturday and Sunday are never
    /// active, regardless of hour. Bounds are inclusive on both ends and are
    /// constructed on the current local calendar day from hour/minute only.
    pub fn contains(&self, now: DateTime<Utc>) -> bool {
        let local = now.with_timezone(&self.zone);

        match local.weekday() {
            Weekday::Sat | Weekday::Sun => return false,
            _ => {}
        }

        let start = local
            .with_hour(self.start.hour)
            .and_then(|t| t.with_minute(self.start.minute))
            .and_then(|t| t.with_second(0))
            .and_then(|t| t.with_nanosecond(0));
        let end = local
            .with_hour(self.end.hour)
            .and_then(|t| t.with_minute(self.end.minute))
            .and_then(|t| t.with_second(0))
            .and_then(|t| t.with_nanosecond(0));

        // A DST gap can make a bound unrepresentable on this calendar day;
        // treat the window as inactive for that occurrence.
        match (start, end) {
            (Some(start), Some(end)) => start <= local && local <= end,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use chrono_tz::America::Los_Angeles;

    fn tod(hour: u32, minute: u32) -> TimeOfDay {
        TimeOfDay::new(hour, minute).unwrap()
    }

    fn window(start: (u32, u32), end: (u32, u32)) -> TimeWindow {
        TimeWindow::new(tod(start.0, start.1), tod(end.0, end.1), Los_Angeles).unwrap()
    }

    fn la_instant(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Los_Angeles
            .with_ymd_and_hms(y, mo, d, h, mi, 0)
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn test_parse_hour_only() {
        assert_eq!(TimeOfDay::parse("start", "17").unwrap(), tod(17, 0));
    }

    #[test]
    fn test_parse_hour_and_minute() {
        assert_eq!(TimeOfDay::parse("start", "17:30").unwrap(), tod(17, 30));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(TimeOfDay::parse("start", "late").is_err());
        assert!(TimeOfDay::parse("start", "25").is_err());
        assert!(TimeOfDay::parse("start", "17:61").is_err());
        assert!(matches!(
            TimeOfDay::parse("start", ""),
            Err(ValidationError::MissingField(_))
        ));
    }

    #[test]
    fn test_midnight_crossing_rejected() {
        let err = TimeWindow::new(tod(22, 0), tod(6, 0), Los_Angeles).unwrap_err();
        assert!(matches!(err, ValidationError::WindowOrder { .. }));
    }

    #[test]
    fn test_unknown_timezone_rejected() {
        assert!(matches!(
            TimeWindow::parse_zone("Mars/Olympus_Mons"),
            Err(ValidationError::UnknownTimezone(_))
        ));
        assert_eq!(
            TimeWindow::parse_zone("America/Los_Angeles").unwrap(),
            Los_Angeles
        );
    }

    #[test]
    fn test_inside_window_on_weekday() {
        // 2024-06-12 is a Wednesday.
        let w = window((17, 0), (19, 0));
        assert!(w.contains(la_instant(2024, 6, 12, 18, 0)));
    }

    #[test]
    fn test_bounds_inclusive() {
        let w = window((17, 0), (19, 0));
        assert!(w.contains(la_instant(2024, 6, 12, 17, 0)));
        assert!(w.contains(la_instant(2024, 6, 12, 19, 0)));
        assert!(!w.contains(la_instant(2024, 6, 12, 16, 59)));
        assert!(!w.contains(la_instant(2024, 6, 12, 19, 1)));
    }

    #[test]
    fn test_weekend_never_active() {
        // 2024-06-15 is a Saturday, 2024-06-16 a Sunday.
        let w = window((0, 0), (23, 59));
        assert!(!w.contains(la_instant(2024, 6, 15, 12, 0)));
        assert!(!w.contains(la_instant(2024, 6, 16, 12, 0)));
    }

    #[test]
    fn test_weekday_gate_uses_local_day() {
        // Friday 23:30 in LA is already Saturday 06:30 UTC; the local
        // weekday is what counts.
        let w = window((23, 0), (23, 59));
        assert!(w.contains(la_instant(2024, 6, 14, 23, 30)));
    }

    #[test]
    fn test_minutes_matter() {
        let w = window((8, 30), (9, 15));
        assert!(!w.contains(la_instant(2024, 6, 12, 8, 29)));
        assert!(w.contains(la_instant(2024, 6, 12, 8, 30)));
        assert!(w.contains(la_instant(2024, 6, 12, 9, 15)));
        assert!(!w.contains(la_instant(2024, 6, 12, 9, 16)));
    }
}
