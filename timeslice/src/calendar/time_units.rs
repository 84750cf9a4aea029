use std::{fmt::Display, str::FromStr};

use thiserror::Error;

use super::{Calendar, CalendarDate, CalendarDateError};

/// A unit of a CF time coordinate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TimeUnit {
    /// Microseconds.
    Microseconds,
    /// Milliseconds.
    Milliseconds,
    /// Seconds.
    Seconds,
    /// Minutes.
    Minutes,
    /// Hours.
    Hours,
    /// Days.
    Days,
}

impl TimeUnit {
    /// The length of the unit in microseconds.
    #[must_use]
    pub const fn microseconds(self) -> i64 {
        match self {
            Self::Microseconds => 1,
            Self::Milliseconds => 1_000,
            Self::Seconds => 1_000_000,
            Self::Minutes => 60_000_000,
            Self::Hours => 3_600_000_000,
            Self::Days => 86_400_000_000,
        }
    }
}

impl FromStr for TimeUnit {
    type Err = TimeUnitsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "microseconds" | "microsecond" | "us" => Ok(Self::Microseconds),
            "milliseconds" | "millisecond" | "ms" => Ok(Self::Milliseconds),
            "seconds" | "second" | "secs" | "sec" | "s" => Ok(Self::Seconds),
            "minutes" | "minute" | "mins" | "min" => Ok(Self::Minutes),
            "hours" | "hour" | "hrs" | "hr" | "h" => Ok(Self::Hours),
            "days" | "day" | "d" => Ok(Self::Days),
            _ => Err(TimeUnitsError::UnsupportedUnit(s.to_string())),
        }
    }
}

/// The units of a CF time coordinate, `<unit> since <epoch>`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TimeUnits {
    unit: TimeUnit,
    epoch: CalendarDate,
}

/// A time units error.
#[derive(Clone, Debug, Error)]
pub enum TimeUnitsError {
    /// The units are not of the form `<unit> since <epoch>`.
    #[error("invalid time units `{_0}`, expected `<unit> since <epoch>`")]
    InvalidUnits(String),
    /// The unit is not supported.
    #[error("unsupported time unit `{_0}`")]
    UnsupportedUnit(String),
    /// The epoch could not be parsed.
    #[error("invalid epoch `{_0}`")]
    InvalidEpoch(String),
    /// The epoch is not a date in the calendar.
    #[error(transparent)]
    CalendarDate(#[from] CalendarDateError),
    /// A time value is NaN or infinite.
    #[error("time value {_0} is not finite")]
    NonFinite(f64),
    /// A time value is too far from the epoch to be represented.
    #[error("time value {_0} is out of range")]
    OutOfRange(f64),
}

fn parse_number<T: FromStr>(s: &str) -> Option<T> {
    (!s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()))
        .then(|| s.parse().ok())
        .flatten()
}

/// Parse a signed UTC offset such as `+08:00`, `-0600` or `+8` into minutes.
fn parse_utc_offset(offset: &str) -> Option<i64> {
    let (sign, digits) = match offset.as_bytes().first()? {
        b'+' => (1, &offset[1..]),
        b'-' => (-1, &offset[1..]),
        _ => return None,
    };
    let (hours, minutes) = match digits.split_once(':') {
        Some((hours, minutes)) => (hours, minutes),
        None if digits.len() == 4 => digits.split_at(2),
        None => (digits, "0"),
    };
    let hours: i64 = parse_number(hours)?;
    let minutes: i64 = parse_number(minutes)?;
    (hours <= 14 && minutes < 60).then_some(sign * (hours * 60 + minutes))
}

/// Parse an epoch such as `2021-09-11`, `2021-09-11 00:00:00`, `2021-09-11T00:00:00Z` or `1970-01-01 00:00:00.0 -06:00`.
fn parse_epoch(epoch: &str, calendar: Calendar) -> Result<CalendarDate, TimeUnitsError> {
    let invalid = || TimeUnitsError::InvalidEpoch(epoch.to_string());
    let epoch_trimmed = epoch.trim();
    let (date, time) = match epoch_trimmed.find(['T', ' ']) {
        Some(index) => (&epoch_trimmed[..index], epoch_trimmed[index + 1..].trim()),
        None => (epoch_trimmed, ""),
    };

    let (year, month, day) = {
        let (negative, date) = match date.strip_prefix('-') {
            Some(date) => (true, date),
            None => (false, date),
        };
        let mut fields = date.split('-');
        let (Some(year), Some(month), Some(day), None) =
            (fields.next(), fields.next(), fields.next(), fields.next())
        else {
            return Err(invalid());
        };
        let year: i64 = parse_number(year).ok_or_else(invalid)?;
        (
            if negative { -year } else { year },
            parse_number(month).ok_or_else(invalid)?,
            parse_number(day).ok_or_else(invalid)?,
        )
    };

    // split off a time zone
    let time = time
        .strip_suffix("UTC")
        .or_else(|| time.strip_suffix("utc"))
        .or_else(|| time.strip_suffix('Z'))
        .unwrap_or(time)
        .trim();
    let (time, offset_minutes) = match time.find(['+', '-']) {
        Some(index) => (
            time[..index].trim(),
            parse_utc_offset(time[index..].trim()).ok_or_else(invalid)?,
        ),
        None => (time, 0),
    };

    let (hour, minute, second, microsecond) = if time.is_empty() {
        (0, 0, 0, 0)
    } else {
        let mut fields = time.split(':');
        let hour = fields.next().and_then(parse_number).ok_or_else(invalid)?;
        let minute = fields.next().map_or(Some(0), parse_number).ok_or_else(invalid)?;
        let (second, microsecond) = match fields.next() {
            Some(seconds) => {
                let (whole, fraction) = seconds.split_once('.').unwrap_or((seconds, ""));
                let second = parse_number(whole).ok_or_else(invalid)?;
                if !fraction.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(invalid());
                }
                // fractions beyond microseconds are truncated
                let digits: String = fraction.chars().chain(std::iter::repeat('0')).take(6).collect();
                (second, parse_number(&digits).ok_or_else(invalid)?)
            }
            None => (0, 0),
        };
        if fields.next().is_some() {
            return Err(invalid());
        }
        (hour, minute, second, microsecond)
    };

    let local = CalendarDate::new_with_microsecond(
        calendar,
        year,
        month,
        day,
        hour,
        minute,
        second,
        microsecond,
    )?;
    local
        .checked_add_microseconds(-offset_minutes * TimeUnit::Minutes.microseconds())
        .ok_or_else(invalid)
}

impl TimeUnits {
    /// Create new time units.
    #[must_use]
    pub const fn new(unit: TimeUnit, epoch: CalendarDate) -> Self {
        Self { unit, epoch }
    }

    /// Parse CF time units such as `hours since 2021-09-11 00:00:00` in `calendar`.
    ///
    /// An epoch with a UTC offset is converted to UTC.
    ///
    /// # Errors
    /// Returns [`TimeUnitsError`] if the units are not of the form `<unit> since <epoch>`, the unit is unsupported, or the epoch is invalid in `calendar`.
    pub fn parse(units: &str, calendar: Calendar) -> Result<Self, TimeUnitsError> {
        let mut words = units.trim().splitn(3, char::is_whitespace);
        let (Some(unit), Some(since), Some(epoch)) = (words.next(), words.next(), words.next())
        else {
            return Err(TimeUnitsError::InvalidUnits(units.to_string()));
        };
        if !since.eq_ignore_ascii_case("since") {
            return Err(TimeUnitsError::InvalidUnits(units.to_string()));
        }
        Ok(Self {
            unit: unit.parse()?,
            epoch: parse_epoch(epoch, calendar)?,
        })
    }

    /// The unit.
    #[must_use]
    pub const fn unit(&self) -> TimeUnit {
        self.unit
    }

    /// The epoch.
    #[must_use]
    pub const fn epoch(&self) -> &CalendarDate {
        &self.epoch
    }

    /// The calendar of the epoch.
    #[must_use]
    pub const fn calendar(&self) -> Calendar {
        self.epoch.calendar()
    }

    /// Decode a raw time coordinate value, `value` units after the epoch.
    ///
    /// The offset is rounded to the nearest microsecond.
    ///
    /// # Errors
    /// Returns [`TimeUnitsError`] if `value` is not finite or the date is out of range.
    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    pub fn decode(&self, value: f64) -> Result<CalendarDate, TimeUnitsError> {
        if !value.is_finite() {
            return Err(TimeUnitsError::NonFinite(value));
        }
        let microseconds = (value * self.unit.microseconds() as f64).round();
        if microseconds.abs() >= i64::MAX as f64 {
            return Err(TimeUnitsError::OutOfRange(value));
        }
        self.epoch
            .checked_add_microseconds(microseconds as i64)
            .ok_or(TimeUnitsError::OutOfRange(value))
    }
}

impl Display for TimeUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Microseconds => "microseconds",
            Self::Milliseconds => "milliseconds",
            Self::Seconds => "seconds",
            Self::Minutes => "minutes",
            Self::Hours => "hours",
            Self::Days => "days",
        })
    }
}

impl Display for TimeUnits {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} since {}", self.unit, self.epoch)
    }
}

/// Decode the raw values of a time coordinate with CF `units` in `calendar`.
///
/// # Errors
/// Returns [`TimeUnitsError`] if the units are invalid or any value cannot be decoded.
pub fn decode_coordinate(
    raw_values: &[f64],
    units: &str,
    calendar: Calendar,
) -> Result<Vec<CalendarDate>, TimeUnitsError> {
    let units = TimeUnits::parse(units, calendar)?;
    raw_values.iter().map(|&value| units.decode(value)).collect()
}
