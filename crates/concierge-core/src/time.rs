//! Date and time values accepted by the assistant's tools.
//!
//! Tool callers (usually a language model) pass start/end values as ISO 8601
//! strings. A value is either a whole day (`2025-04-16`) or a datetime, with
//! or without an explicit UTC offset. [`Moment`] keeps that distinction so
//! the calendar tool can decide between an all-day and a timed event.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Datetime layouts carrying an offset, tried in order.
const OFFSET_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f%:z",
    "%Y-%m-%dT%H:%M%:z",
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y-%m-%d %H:%M%:z",
];

/// Datetime layouts without an offset, tried in order.
const FLOATING_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Error returned when a string is neither an ISO date nor an ISO datetime.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("could not parse '{input}': expected YYYY-MM-DD or an ISO 8601 datetime")]
pub struct TimeParseError {
    input: String,
}

impl TimeParseError {
    /// Returns the rejected input.
    pub fn input(&self) -> &str {
        &self.input
    }
}

/// A point or day on the calendar, as supplied by a tool caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Moment {
    /// A wall-clock datetime without an offset. The calendar's configured
    /// timezone gives it meaning.
    Floating(NaiveDateTime),
    /// A datetime with an explicit UTC offset.
    Offset(DateTime<FixedOffset>),
    /// A whole day.
    Date(NaiveDate),
}

impl Moment {
    /// Parses an ISO 8601 date or datetime.
    ///
    /// Datetimes may use `T` or a space as separator, may omit seconds,
    /// and may carry fractional seconds and a `Z`/`±HH:MM` offset.
    pub fn parse(input: &str) -> Result<Self, TimeParseError> {
        let trimmed = input.trim();

        if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
            return Ok(Self::Offset(dt));
        }
        for format in OFFSET_FORMATS {
            if let Ok(dt) = DateTime::parse_from_str(trimmed, format) {
                return Ok(Self::Offset(dt));
            }
        }
        for format in FLOATING_FORMATS {
            if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, format) {
                return Ok(Self::Floating(dt));
            }
        }
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, DATE_FORMAT) {
            return Ok(Self::Date(date));
        }

        Err(TimeParseError {
            input: input.to_string(),
        })
    }

    /// Returns `true` for a whole-day value.
    pub fn is_all_day(&self) -> bool {
        matches!(self, Self::Date(_))
    }

    /// Returns the day if this is a whole-day value.
    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Self::Date(date) => Some(*date),
            _ => None,
        }
    }

    /// Shifts the value by `delta`, keeping its kind.
    ///
    /// Whole days move by whole days only; the sub-day part of `delta` is
    /// dropped for them.
    pub fn checked_add(&self, delta: Duration) -> Option<Self> {
        match self {
            Self::Floating(dt) => dt.checked_add_signed(delta).map(Self::Floating),
            Self::Offset(dt) => dt.checked_add_signed(delta).map(Self::Offset),
            Self::Date(date) => date
                .checked_add_signed(Duration::days(delta.num_days()))
                .map(Self::Date),
        }
    }

    /// Formats the value the way the calendar API expects it.
    pub fn to_iso_string(&self) -> String {
        match self {
            Self::Floating(dt) => dt.format("%Y-%m-%dT%H:%M:%S").to_string(),
            Self::Offset(dt) => dt.format("%Y-%m-%dT%H:%M:%S%:z").to_string(),
            Self::Date(date) => date.format(DATE_FORMAT).to_string(),
        }
    }
}

impl PartialOrd for Moment {
    /// Values of different kinds are not comparable: a floating datetime
    /// has no instant until a timezone is applied.
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Self::Floating(a), Self::Floating(b)) => Some(a.cmp(b)),
            (Self::Offset(a), Self::Offset(b)) => Some(a.cmp(b)),
            (Self::Date(a), Self::Date(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

impl FromStr for Moment {
    type Err = TimeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Moment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_iso_string())
    }
}
