//! Event requests and the Calendar API event body.

use chrono::Duration;
use concierge_core::Moment;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

/// Length in hours of a timed event when no usable end is given.
const DEFAULT_EVENT_HOURS: i64 = 1;

/// An event as requested by a tool caller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRequest {
    /// Event title.
    pub summary: String,
    /// `YYYY-MM-DD` for an all-day event, or an ISO 8601 datetime.
    pub start: String,
    /// Optional end, in the same forms as `start`.
    #[serde(default)]
    pub end: Option<String>,
    /// Optional description.
    #[serde(default)]
    pub description: Option<String>,
    /// Optional location.
    #[serde(default)]
    pub location: Option<String>,
}

impl EventRequest {
    /// Creates a request with only the required fields.
    pub fn new(summary: impl Into<String>, start: impl Into<String>) -> Self {
        Self {
            summary: summary.into(),
            start: start.into(),
            ..Self::default()
        }
    }

    /// Sets the end.
    pub fn with_end(mut self, end: impl Into<String>) -> Self {
        self.end = Some(end.into());
        self
    }

    /// Sets the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets the location.
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }
}

/// Rejected event input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EventInputError {
    /// The start is neither a date nor a datetime.
    #[error("Invalid start date/time format: '{0}'. Use YYYY-MM-DD or ISO format.")]
    InvalidStart(String),
}

/// Start or end of an event in the Calendar API's shape.
///
/// All-day values set `date`; timed values set `dateTime` and `timeZone`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDateTime {
    /// `YYYY-MM-DD`, for all-day events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    /// ISO datetime, for timed events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_time: Option<String>,
    /// IANA timezone the datetime is interpreted in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_zone: Option<String>,
}

impl EventDateTime {
    fn all_day(moment: Moment) -> Self {
        Self {
            date: Some(moment.to_iso_string()),
            date_time: None,
            time_zone: None,
        }
    }

    fn timed(moment: Moment, timezone: &str) -> Self {
        Self {
            date: None,
            date_time: Some(moment.to_iso_string()),
            time_zone: Some(timezone.to_string()),
        }
    }
}

/// Body of an `events.insert` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventBody {
    /// Event title.
    pub summary: String,
    /// Free-form description; omitted when empty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Location; omitted when empty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// Event start.
    pub start: EventDateTime,
    /// Event end; exclusive for all-day events.
    pub end: EventDateTime,
}

impl EventBody {
    /// Builds the body for `request`, attaching `timezone` to timed events.
    ///
    /// All-day events use the API's exclusive end date: an end on or after
    /// the start becomes the following day, anything else (missing,
    /// unparseable, before the start, or a datetime) yields a single day.
    /// Timed events last an hour unless a later end of the same kind is
    /// given.
    pub fn from_request(request: &EventRequest, timezone: &str) -> Result<Self, EventInputError> {
        let start = Moment::parse(&request.start)
            .map_err(|_| EventInputError::InvalidStart(request.start.clone()))?;
        let end = request
            .end
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .map(|s| (s, Moment::parse(s)));

        let (start, end) = if start.is_all_day() {
            let next_day = |m: Moment| m.checked_add(Duration::days(1)).unwrap_or(m);
            let end = match end {
                Some((_, Ok(end))) if end.is_all_day() && end >= start => next_day(end),
                Some((raw, _)) => {
                    warn!("ignoring end '{}' for all-day event, using one day", raw);
                    next_day(start)
                }
                None => next_day(start),
            };
            (EventDateTime::all_day(start), EventDateTime::all_day(end))
        } else {
            let default_end = start.checked_add(Duration::hours(DEFAULT_EVENT_HOURS)).unwrap_or(start);
            let end = match end {
                Some((_, Ok(end))) if end > start => end,
                Some((raw, _)) => {
                    warn!("ignoring end '{}', defaulting to one hour after start", raw);
                    default_end
                }
                None => default_end,
            };
            (
                EventDateTime::timed(start, timezone),
                EventDateTime::timed(end, timezone),
            )
        };

        Ok(Self {
            summary: request.summary.clone(),
            description: non_empty(request.description.as_deref()),
            location: non_empty(request.location.as_deref()),
            start,
            end,
        })
    }

    /// Returns true for an all-day event.
    pub fn is_all_day(&self) -> bool {
        self.start.date.is_some()
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value.filter(|v| !v.is_empty()).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(request: EventRequest) -> EventBody {
        EventBody::from_request(&request, "Europe/Paris").unwrap()
    }

    fn date(value: &str) -> EventDateTime {
        EventDateTime {
            date: Some(value.to_string()),
            date_time: None,
            time_zone: None,
        }
    }

    fn timed(value: &str) -> EventDateTime {
        EventDateTime {
            date: None,
            date_time: Some(value.to_string()),
            time_zone: Some("Europe/Paris".to_string()),
        }
    }

    #[test]
    fn all_day_without_end_spans_one_day() {
        let body = body(EventRequest::new("Holiday", "2025-04-16"));
        assert!(body.is_all_day());
        assert_eq!(body.start, date("2025-04-16"));
        assert_eq!(body.end, date("2025-04-17"));
    }

    #[test]
    fn all_day_end_is_exclusive() {
        let body = body(EventRequest::new("Trip", "2025-04-16").with_end("2025-04-18"));
        assert_eq!(body.end, date("2025-04-19"));

        let same_day = body_for_end("2025-04-16");
        assert_eq!(same_day.end, date("2025-04-17"));
    }

    fn body_for_end(end: &str) -> EventBody {
        body(EventRequest::new("Trip", "2025-04-16").with_end(end))
    }

    #[test]
    fn all_day_bad_end_falls_back_to_one_day() {
        assert_eq!(body_for_end("2025-04-10").end, date("2025-04-17"));
        assert_eq!(body_for_end("someday").end, date("2025-04-17"));
        assert_eq!(body_for_end("2025-04-18T10:00:00").end, date("2025-04-17"));
        assert_eq!(body_for_end("").end, date("2025-04-17"));
    }

    #[test]
    fn all_day_crosses_month_end() {
        let body = body(EventRequest::new("Eve", "2025-12-31"));
        assert_eq!(body.end, date("2026-01-01"));
    }

    #[test]
    fn timed_defaults_to_one_hour() {
        let body = body(EventRequest::new("Call", "2025-04-16T10:00:00"));
        assert!(!body.is_all_day());
        assert_eq!(body.start, timed("2025-04-16T10:00:00"));
        assert_eq!(body.end, timed("2025-04-16T11:00:00"));
    }

    #[test]
    fn timed_uses_later_end() {
        let body = body(EventRequest::new("Call", "2025-04-16T10:00").with_end("2025-04-16T12:30"));
        assert_eq!(body.end, timed("2025-04-16T12:30:00"));
    }

    #[test]
    fn timed_ignores_earlier_or_unusable_end() {
        for end in ["2025-04-16T09:00:00", "2025-04-16T10:00:00", "tomorrow", "2025-04-17"] {
            let body = body(EventRequest::new("Call", "2025-04-16T10:00:00").with_end(end));
            assert_eq!(body.end, timed("2025-04-16T11:00:00"), "end = {}", end);
        }
    }

    #[test]
    fn timed_keeps_offset() {
        let body = body(
            EventRequest::new("Call", "2025-04-16T10:00:00+02:00").with_end("2025-04-16T09:30:00Z"),
        );
        assert_eq!(body.start, timed("2025-04-16T10:00:00+02:00"));
        // 09:30Z is 11:30+02:00, later than the start.
        assert_eq!(body.end, timed("2025-04-16T09:30:00+00:00"));
    }

    #[test]
    fn invalid_start_is_rejected() {
        let err = EventBody::from_request(&EventRequest::new("X", "next tuesday"), "UTC").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid start date/time format: 'next tuesday'. Use YYYY-MM-DD or ISO format."
        );
    }

    #[test]
    fn optional_fields() {
        let body = body(
            EventRequest::new("Lunch", "2025-04-16T12:00:00")
                .with_description("")
                .with_location("Cafe"),
        );
        assert_eq!(body.description, None);
        assert_eq!(body.location.as_deref(), Some("Cafe"));
    }

    #[test]
    fn serializes_api_shape() {
        let body = body(EventRequest::new("Call", "2025-04-16T10:00:00").with_description("Sync"));
        let json = serde_json::to_value(&body).unwrap();

        assert_eq!(json["summary"], "Call");
        assert_eq!(json["description"], "Sync");
        assert!(json.get("location").is_none());
        assert_eq!(json["start"]["dateTime"], "2025-04-16T10:00:00");
        assert_eq!(json["start"]["timeZone"], "Europe/Paris");
        assert!(json["start"].get("date").is_none());

        let all_day = serde_json::to_value(
            EventBody::from_request(&EventRequest::new("Off", "2025-04-16"), "UTC").unwrap(),
        )
        .unwrap();
        assert_eq!(all_day["start"]["date"], "2025-04-16");
        assert!(all_day["start"].get("timeZone").is_none());
    }
}
