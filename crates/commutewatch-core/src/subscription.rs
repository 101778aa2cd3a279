//! Subscription records and trigger-field parsing.
//!
//! A subscription is one tracked commute-alert configuration, keyed by the
//! caller-assigned `trigger_identity`. The identity is opaque: it is used as
//! a key and never validated for format. Window bounds and threshold are
//! re-supplied on every evaluation call and refreshed in the registry.

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::window::{TimeOfDay, TimeWindow};

/// Default number of events returned when the caller supplies no limit.
pub const DEFAULT_EVENT_LIMIT: i64 = 50;

/// One tracked commute-alert configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    /// Caller-assigned trigger identity; unique primary key.
    pub id: String,
    pub time_zone: Tz,
    pub window_start: TimeOfDay,
    pub window_end: TimeOfDay,
    /// Subscriber-chosen duration ceiling in minutes.
    pub threshold_minutes: u32,
    pub origin_address: String,
    pub destination_address: String,
    /// Present only while a notification has fired during the current
    /// window occurrence; cleared on window exit and on above-threshold
    /// observations.
    #[serde(default)]
    pub last_notified_minutes: Option<u32>,
}

impl Subscription {
    /// The recurring window this subscription is active in.
    pub fn window(&self) -> TimeWindow {
        // Construction validated the ordering, so this cannot fail again.
        TimeWindow {
            start: self.window_start,
            end: self.window_end,
            zone: self.time_zone,
        }
    }
}

/// Inbound evaluation request, wire shape.
///
/// All fields are optional at the serde layer so that missing fields become
/// [`ValidationError::MissingField`] with a usable message instead of an
/// opaque deserialization failure.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EvaluationRequest {
    pub trigger_identity: Option<String>,
    #[serde(rename = "triggerFields")]
    pub trigger_fields: Option<TriggerFields>,
    pub user: Option<UserFields>,
    pub limit: Option<i64>,
}

/// Caller-supplied trigger fields.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TriggerFields {
    pub origin_address: Option<String>,
    pub destination_address: Option<String>,
    /// Minutes, as a string (IFTTT sends field values as strings).
    pub threshold_duration: Option<String>,
    pub commute_window_start: Option<String>,
    pub commute_window_end: Option<String>,
}

/// Caller account fields.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserFields {
    pub timezone: Option<String>,
}

impl EvaluationRequest {
    /// Validate and parse into a [`Subscription`].
    ///
    /// Runs before any registry or lookup call; a failure here leaves all
    /// stored state untouched.
    pub fn parse(&self) -> Result<Subscription, ValidationError> {
        let id = required(self.trigger_identity.as_deref(), "trigger_identity")?;
        let fields = self
            .trigger_fields
            .as_ref()
            .ok_or_else(|| ValidationError::MissingField("triggerFields".to_string()))?;

        let origin = required(fields.origin_address.as_deref(), "triggerFields.origin_address")?;
        let destination = required(
            fields.destination_address.as_deref(),
            "triggerFields.destination_address",
        )?;

        let threshold_raw = required(
            fields.threshold_duration.as_deref(),
            "triggerFields.threshold_duration",
        )?;
        let threshold_minutes: u32 =
            threshold_raw
                .trim()
                .parse()
                .map_err(|_| ValidationError::InvalidField {
                    field: "triggerFields.threshold_duration".to_string(),
                    message: format!("'{threshold_raw}' is not a whole number of minutes"),
                })?;

        let window_start = TimeOfDay::parse(
            "triggerFields.commute_window_start",
            required(
                fields.commute_window_start.as_deref(),
                "triggerFields.commute_window_start",
            )?,
        )?;
        let window_end = TimeOfDay::parse(
            "triggerFields.commute_window_end",
            required(
                fields.commute_window_end.as_deref(),
                "triggerFields.commute_window_end",
            )?,
        )?;

        let zone_name = required(
            self.user.as_ref().and_then(|u| u.timezone.as_deref()),
            "user.timezone",
        )?;
        let time_zone: Tz = TimeWindow::parse_zone(zone_name)?;

        // Rejects midnight-crossing windows.
        TimeWindow::new(window_start, window_end, time_zone)?;

        Ok(Subscription {
            id: id.to_string(),
            time_zone,
            window_start,
            window_end,
            threshold_minutes,
            origin_address: origin.to_string(),
            destination_address: destination.to_string(),
            last_notified_minutes: None,
        })
    }

    /// Event-log limit for this request, defaulting to [`DEFAULT_EVENT_LIMIT`].
    pub fn event_limit(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_EVENT_LIMIT)
    }
}

fn required<'a>(value: Option<&'a str>, field: &str) -> Result<&'a str, ValidationError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ValidationError::MissingField(field.to_string())),
    }
}
