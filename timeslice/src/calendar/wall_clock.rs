use std::{fmt::Display, str::FromStr};

use chrono::{Datelike, NaiveDateTime, Timelike};
use thiserror::Error;

use super::{Calendar, CalendarDate, CalendarDateError};

/// The format of a [`WallClock`] timestamp, `YYYY-MM-DDTHH:MM:SS`.
pub const WALL_CLOCK_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// A requested timestamp with no time zone, such as `2021-09-12T00:00:00`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WallClock(NaiveDateTime);

/// A timestamp which does not match [`WALL_CLOCK_FORMAT`].
#[derive(Clone, Debug, Error)]
#[error("timestamp `{timestamp}` does not match the format YYYY-MM-DDTHH:MM:SS")]
pub struct TimestampFormatError {
    timestamp: String,
}

impl TimestampFormatError {
    /// The offending timestamp.
    #[must_use]
    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }
}

fn has_wall_clock_shape(timestamp: &str) -> bool {
    let bytes = timestamp.as_bytes();
    bytes.len() == 19
        && bytes.iter().enumerate().all(|(i, &b)| match i {
            4 | 7 => b == b'-',
            10 => b == b'T',
            13 | 16 => b == b':',
            _ => b.is_ascii_digit(),
        })
}

impl WallClock {
    /// Parse a `YYYY-MM-DDTHH:MM:SS` timestamp.
    ///
    /// Every field must be zero padded, and no fractional seconds, time zone or surrounding whitespace are accepted.
    ///
    /// # Errors
    /// Returns [`TimestampFormatError`] if `timestamp` does not match the format or is not a valid date and time.
    pub fn parse(timestamp: &str) -> Result<Self, TimestampFormatError> {
        let error = || TimestampFormatError {
            timestamp: timestamp.to_string(),
        };
        if !has_wall_clock_shape(timestamp) {
            return Err(error());
        }
        let datetime = NaiveDateTime::parse_from_str(timestamp, WALL_CLOCK_FORMAT)
            .map_err(|_| error())?;
        // reject leap seconds
        if datetime.nanosecond() != 0 {
            return Err(error());
        }
        Ok(Self(datetime))
    }

    /// The timestamp as a [`NaiveDateTime`].
    #[must_use]
    pub const fn as_naive(&self) -> &NaiveDateTime {
        &self.0
    }

    /// Interpret the timestamp as a date in `calendar`, by its field values.
    ///
    /// # Errors
    /// Returns [`CalendarDateError`] if the date does not exist in `calendar`, such as 1582-10-10 in the `standard` calendar.
    #[allow(clippy::cast_possible_truncation)]
    pub fn to_calendar_date(&self, calendar: Calendar) -> Result<CalendarDate, CalendarDateError> {
        CalendarDate::new(
            calendar,
            i64::from(self.0.year()),
            self.0.month() as u8,
            self.0.day() as u8,
            self.0.hour() as u8,
            self.0.minute() as u8,
            self.0.second() as u8,
        )
    }
}

impl FromStr for WallClock {
    type Err = TimestampFormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Display for WallClock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.format(WALL_CLOCK_FORMAT))
    }
}
