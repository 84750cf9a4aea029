use std::fmt::Display;

use thiserror::Error;

use super::Calendar;

const MICROSECONDS_PER_SECOND: i64 = 1_000_000;
const MICROSECONDS_PER_DAY: i64 = 86_400 * MICROSECONDS_PER_SECOND;

/// Dates are limited to years within this distance of year zero so that microsecond offsets fit in an [`i64`].
const MAX_YEAR: i64 = 200_000;

/// A date and time of day in a [`Calendar`], with microsecond precision.
///
/// Dates in the same calendar are ordered chronologically.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CalendarDate {
    calendar: Calendar,
    year: i64,
    month: u8,
    day: u8,
    hour: u8,
    minute: u8,
    second: u8,
    microsecond: u32,
}

/// An invalid calendar date.
#[derive(Clone, Debug, Error)]
pub enum CalendarDateError {
    /// The date does not exist in the calendar.
    #[error("{year:04}-{month:02}-{day:02} is not a date in the {calendar} calendar")]
    InvalidDate {
        /// The calendar.
        calendar: Calendar,
        /// The year.
        year: i64,
        /// The month.
        month: u8,
        /// The day.
        day: u8,
    },
    /// The time of day is invalid.
    #[error("{hour:02}:{minute:02}:{second:02}.{microsecond:06} is not a valid time of day")]
    InvalidTime {
        /// The hour.
        hour: u8,
        /// The minute.
        minute: u8,
        /// The second.
        second: u8,
        /// The microsecond.
        microsecond: u32,
    },
    /// The date is too far from the calendar origin to be represented.
    #[error("date is out of range")]
    OutOfRange,
}

impl CalendarDate {
    /// Create a new calendar date.
    ///
    /// # Errors
    /// Returns [`CalendarDateError`] if the date does not exist in `calendar` or the time of day is invalid.
    pub fn new(
        calendar: Calendar,
        year: i64,
        month: u8,
        day: u8,
        hour: u8,
        minute: u8,
        second: u8,
    ) -> Result<Self, CalendarDateError> {
        Self::new_with_microsecond(calendar, year, month, day, hour, minute, second, 0)
    }

    /// Create a new calendar date with a microsecond component.
    ///
    /// # Errors
    /// Returns [`CalendarDateError`] if the date does not exist in `calendar` or the time of day is invalid.
    #[allow(clippy::too_many_arguments)]
    pub fn new_with_microsecond(
        calendar: Calendar,
        year: i64,
        month: u8,
        day: u8,
        hour: u8,
        minute: u8,
        second: u8,
        microsecond: u32,
    ) -> Result<Self, CalendarDateError> {
        if !calendar.is_valid_date(year, month, day) {
            return Err(CalendarDateError::InvalidDate {
                calendar,
                year,
                month,
                day,
            });
        }
        if hour > 23 || minute > 59 || second > 59 || microsecond > 999_999 {
            return Err(CalendarDateError::InvalidTime {
                hour,
                minute,
                second,
                microsecond,
            });
        }
        if year.abs() > MAX_YEAR {
            return Err(CalendarDateError::OutOfRange);
        }
        Ok(Self {
            calendar,
            year,
            month,
            day,
            hour,
            minute,
            second,
            microsecond,
        })
    }

    /// Create the calendar date `microseconds` after the origin of `calendar`.
    ///
    /// This is the inverse of [`to_microseconds`](CalendarDate::to_microseconds).
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn from_microseconds(calendar: Calendar, microseconds: i64) -> Self {
        let day_number = microseconds.div_euclid(MICROSECONDS_PER_DAY);
        let time_of_day = microseconds.rem_euclid(MICROSECONDS_PER_DAY);
        let (year, month, day) = calendar.from_day_number(day_number);
        let seconds = time_of_day / MICROSECONDS_PER_SECOND;
        Self {
            calendar,
            year,
            month,
            day,
            hour: (seconds / 3600) as u8,
            minute: (seconds / 60 % 60) as u8,
            second: (seconds % 60) as u8,
            microsecond: (time_of_day % MICROSECONDS_PER_SECOND) as u32,
        }
    }

    /// The number of microseconds from the origin of the calendar.
    #[must_use]
    pub fn to_microseconds(&self) -> i64 {
        let day_number = self.calendar.day_number(self.year, self.month, self.day);
        let seconds =
            i64::from(self.hour) * 3600 + i64::from(self.minute) * 60 + i64::from(self.second);
        day_number * MICROSECONDS_PER_DAY
            + seconds * MICROSECONDS_PER_SECOND
            + i64::from(self.microsecond)
    }

    /// Returns the date `microseconds` after this date, or [`None`] on overflow.
    #[must_use]
    pub fn checked_add_microseconds(&self, microseconds: i64) -> Option<Self> {
        let total = self.to_microseconds().checked_add(microseconds)?;
        let date = Self::from_microseconds(self.calendar, total);
        (date.year.abs() <= MAX_YEAR).then_some(date)
    }

    /// The calendar.
    #[must_use]
    pub const fn calendar(&self) -> Calendar {
        self.calendar
    }

    /// The year.
    #[must_use]
    pub const fn year(&self) -> i64 {
        self.year
    }

    /// The month, 1-12.
    #[must_use]
    pub const fn month(&self) -> u8 {
        self.month
    }

    /// The day of the month, starting at 1.
    #[must_use]
    pub const fn day(&self) -> u8 {
        self.day
    }

    /// The hour, 0-23.
    #[must_use]
    pub const fn hour(&self) -> u8 {
        self.hour
    }

    /// The minute, 0-59.
    #[must_use]
    pub const fn minute(&self) -> u8 {
        self.minute
    }

    /// The second, 0-59.
    #[must_use]
    pub const fn second(&self) -> u8 {
        self.second
    }

    /// The microsecond, 0-999999.
    #[must_use]
    pub const fn microsecond(&self) -> u32 {
        self.microsecond
    }
}

impl Display for CalendarDate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
            self.year, self.month, self.day, self.hour, self.minute, self.second
        )?;
        if self.microsecond != 0 {
            write!(f, ".{:06}", self.microsecond)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn calendar_date_new() {
        let date = CalendarDate::new(Calendar::Standard, 2021, 9, 12, 6, 30, 0).unwrap();
        assert_eq!(date.to_string(), "2021-09-12 06:30:00");
        assert!(CalendarDate::new(Calendar::NoLeap, 2024, 2, 29, 0, 0, 0).is_err());
        assert!(CalendarDate::new(Calendar::Day360, 2023, 2, 30, 0, 0, 0).is_ok());
        assert!(matches!(
            CalendarDate::new(Calendar::Standard, 1582, 10, 10, 0, 0, 0),
            Err(CalendarDateError::InvalidDate { .. })
        ));
        assert!(matches!(
            CalendarDate::new(Calendar::Standard, 2021, 9, 12, 24, 0, 0),
            Err(CalendarDateError::InvalidTime { .. })
        ));
    }

    #[test]
    fn calendar_date_microseconds() {
        let date =
            CalendarDate::new_with_microsecond(Calendar::Julian, 1066, 10, 14, 9, 0, 1, 250)
                .unwrap();
        assert_eq!(date.to_string(), "1066-10-14 09:00:01.000250");
        assert_eq!(
            CalendarDate::from_microseconds(Calendar::Julian, date.to_microseconds()),
            date
        );
    }

    #[test]
    fn calendar_date_arithmetic() {
        let epoch = CalendarDate::new(Calendar::ProlepticGregorian, 2021, 9, 11, 0, 0, 0).unwrap();
        let hour = 3_600_000_000;
        let date = epoch.checked_add_microseconds(24 * hour).unwrap();
        assert_eq!(date, CalendarDate::new(Calendar::ProlepticGregorian, 2021, 9, 12, 0, 0, 0).unwrap());
        let date = epoch.checked_add_microseconds(-hour).unwrap();
        assert_eq!(date.to_string(), "2021-09-10 23:00:00");
        assert!(epoch.checked_add_microseconds(i64::MAX).is_none());

        let noleap = CalendarDate::new(Calendar::NoLeap, 2024, 2, 28, 12, 0, 0).unwrap();
        let date = noleap.checked_add_microseconds(24 * hour).unwrap();
        assert_eq!(date.to_string(), "2024-03-01 12:00:00");

        let day360 = CalendarDate::new(Calendar::Day360, 2000, 2, 30, 0, 0, 0).unwrap();
        let date = day360.checked_add_microseconds(24 * hour).unwrap();
        assert_eq!(date.to_string(), "2000-03-01 00:00:00");
    }
}
