//! CF calendars.
//!
//! Time coordinates of climate data are stored as numeric offsets from an epoch, with a `units` attribute such as `hours since 2021-09-11 00:00:00` and a `calendar` attribute naming one of the [CF calendars](https://cfconventions.org/Data/cf-conventions/cf-conventions-1.11/cf-conventions.html#calendar).
//! Offsets are decoded into [`CalendarDate`]s, which are compared exactly with requested [`WallClock`] timestamps.

mod calendar_date;
mod time_units;
mod wall_clock;

use std::str::FromStr;

pub use calendar_date::{CalendarDate, CalendarDateError};
use derive_more::Display;
use serde::{Deserialize, Serialize};
use thiserror::Error;
pub use time_units::{decode_coordinate, TimeUnit, TimeUnits, TimeUnitsError};
pub use wall_clock::{TimestampFormatError, WallClock, WALL_CLOCK_FORMAT};

/// The Julian day number of 1582-10-15, the first day of the Gregorian calendar in the `standard` calendar.
const GREGORIAN_REFORM_DAY: i64 = 2_299_161;

const CUMULATIVE_DAYS: [i64; 13] = [0, 31, 59, 90, 120, 151, 181, 212, 243, 273, 304, 334, 365];
const CUMULATIVE_DAYS_LEAP: [i64; 13] = [0, 31, 60, 91, 121, 152, 182, 213, 244, 274, 305, 335, 366];

/// A CF calendar.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Display, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Calendar {
    /// The mixed Julian/Gregorian calendar, switching from Julian to Gregorian after 1582-10-04.
    #[display("standard")]
    Standard,
    /// The Gregorian calendar extended to dates before 1582-10-15.
    #[default]
    #[display("proleptic_gregorian")]
    ProlepticGregorian,
    /// The Julian calendar.
    #[display("julian")]
    Julian,
    /// A calendar with no leap years.
    #[display("noleap")]
    NoLeap,
    /// A calendar where every year is a leap year.
    #[display("all_leap")]
    AllLeap,
    /// A calendar of twelve 30 day months.
    #[display("360_day")]
    Day360,
}

/// An unknown calendar.
#[derive(Clone, Debug, Error)]
#[error("unknown calendar `{_0}`")]
pub struct UnknownCalendarError(String);

impl FromStr for Calendar {
    type Err = UnknownCalendarError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "standard" | "gregorian" => Ok(Self::Standard),
            "proleptic_gregorian" => Ok(Self::ProlepticGregorian),
            "julian" => Ok(Self::Julian),
            "noleap" | "365_day" => Ok(Self::NoLeap),
            "all_leap" | "366_day" => Ok(Self::AllLeap),
            "360_day" => Ok(Self::Day360),
            _ => Err(UnknownCalendarError(s.to_string())),
        }
    }
}

impl TryFrom<String> for Calendar {
    type Error = UnknownCalendarError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Calendar> for String {
    fn from(value: Calendar) -> Self {
        value.to_string()
    }
}

fn is_gregorian_leap_year(year: i64) -> bool {
    year.rem_euclid(4) == 0 && (year.rem_euclid(100) != 0 || year.rem_euclid(400) == 0)
}

fn is_julian_leap_year(year: i64) -> bool {
    year.rem_euclid(4) == 0
}

/// The Julian day number of a proleptic Gregorian date.
fn gregorian_to_jdn(year: i64, month: u8, day: u8) -> i64 {
    let a = (14 - i64::from(month)).div_euclid(12);
    let y = year + 4800 - a;
    let m = i64::from(month) + 12 * a - 3;
    i64::from(day) + (153 * m + 2).div_euclid(5) + 365 * y + y.div_euclid(4) - y.div_euclid(100)
        + y.div_euclid(400)
        - 32045
}

/// The Julian day number of a proleptic Julian date.
fn julian_to_jdn(year: i64, month: u8, day: u8) -> i64 {
    let a = (14 - i64::from(month)).div_euclid(12);
    let y = year + 4800 - a;
    let m = i64::from(month) + 12 * a - 3;
    i64::from(day) + (153 * m + 2).div_euclid(5) + 365 * y + y.div_euclid(4) - 32083
}

/// The proleptic Gregorian or Julian date of a Julian day number.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn jdn_to_date(jdn: i64, gregorian: bool) -> (i64, u8, u8) {
    let f = if gregorian {
        jdn + 1401 + (((4 * jdn + 274_277).div_euclid(146_097)) * 3).div_euclid(4) - 38
    } else {
        jdn + 1401
    };
    let e = 4 * f + 3;
    let g = e.rem_euclid(1461).div_euclid(4);
    let h = 5 * g + 2;
    let day = h.rem_euclid(153).div_euclid(5) + 1;
    let month = (h.div_euclid(153) + 2).rem_euclid(12) + 1;
    let year = e.div_euclid(1461) - 4716 + (14 - month).div_euclid(12);
    (year, month as u8, day as u8)
}

fn day_of_year_to_date(day_of_year: i64, cumulative: &[i64; 13]) -> (u8, u8) {
    let month = cumulative[1..]
        .iter()
        .position(|&end| day_of_year < end)
        .unwrap_or(11);
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let day = (day_of_year - cumulative[month] + 1) as u8;
    #[allow(clippy::cast_possible_truncation)]
    let month = month as u8 + 1;
    (month, day)
}

impl Calendar {
    /// Returns true if `year` is a leap year in the calendar.
    #[must_use]
    pub fn is_leap_year(self, year: i64) -> bool {
        match self {
            Self::Standard => {
                if year < 1583 {
                    is_julian_leap_year(year)
                } else {
                    is_gregorian_leap_year(year)
                }
            }
            Self::ProlepticGregorian => is_gregorian_leap_year(year),
            Self::Julian => is_julian_leap_year(year),
            Self::NoLeap | Self::Day360 => false,
            Self::AllLeap => true,
        }
    }

    /// Returns the number of days in `month` of `year`, or [`None`] if `month` is not in 1-12.
    #[must_use]
    pub fn days_in_month(self, year: i64, month: u8) -> Option<u8> {
        if !(1..=12).contains(&month) {
            return None;
        }
        if self == Self::Day360 {
            return Some(30);
        }
        let month = usize::from(month);
        let cumulative = if self.is_leap_year(year) {
            &CUMULATIVE_DAYS_LEAP
        } else {
            &CUMULATIVE_DAYS
        };
        u8::try_from(cumulative[month] - cumulative[month - 1]).ok()
    }

    /// Returns true if `year`-`month`-`day` is a date in the calendar.
    ///
    /// The ten days skipped by the Gregorian reform, 1582-10-05 to 1582-10-14, are not dates in the `standard` calendar.
    #[must_use]
    pub fn is_valid_date(self, year: i64, month: u8, day: u8) -> bool {
        let Some(days_in_month) = self.days_in_month(year, month) else {
            return false;
        };
        if day == 0 || day > days_in_month {
            return false;
        }
        !(self == Self::Standard && (year, month) == (1582, 10) && (5..=14).contains(&day))
    }

    /// The number of days between a fixed origin of the calendar and a valid date.
    pub(crate) fn day_number(self, year: i64, month: u8, day: u8) -> i64 {
        match self {
            Self::Standard => {
                if (year, month, day) >= (1582, 10, 15) {
                    gregorian_to_jdn(year, month, day)
                } else {
                    julian_to_jdn(year, month, day)
                }
            }
            Self::ProlepticGregorian => gregorian_to_jdn(year, month, day),
            Self::Julian => julian_to_jdn(year, month, day),
            Self::NoLeap => {
                365 * year + CUMULATIVE_DAYS[usize::from(month) - 1] + i64::from(day) - 1
            }
            Self::AllLeap => {
                366 * year + CUMULATIVE_DAYS_LEAP[usize::from(month) - 1] + i64::from(day) - 1
            }
            Self::Day360 => 360 * year + 30 * (i64::from(month) - 1) + i64::from(day) - 1,
        }
    }

    /// The date at `day_number` days from the origin of the calendar.
    pub(crate) fn from_day_number(self, day_number: i64) -> (i64, u8, u8) {
        match self {
            Self::Standard => jdn_to_date(day_number, day_number >= GREGORIAN_REFORM_DAY),
            Self::ProlepticGregorian => jdn_to_date(day_number, true),
            Self::Julian => jdn_to_date(day_number, false),
            Self::NoLeap => {
                let (month, day) =
                    day_of_year_to_date(day_number.rem_euclid(365), &CUMULATIVE_DAYS);
                (day_number.div_euclid(365), month, day)
            }
            Self::AllLeap => {
                let (month, day) =
                    day_of_year_to_date(day_number.rem_euclid(366), &CUMULATIVE_DAYS_LEAP);
                (day_number.div_euclid(366), month, day)
            }
            Self::Day360 => {
                let day_of_year = day_number.rem_euclid(360);
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                let (month, day) = ((day_of_year / 30 + 1) as u8, (day_of_year % 30 + 1) as u8);
                (day_number.div_euclid(360), month, day)
            }
        }
    }
}
