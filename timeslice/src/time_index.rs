//! Resolution of requested dates to positions along a time coordinate.

use std::collections::{hash_map::Entry, HashMap};

use thiserror::Error;

use crate::calendar::CalendarDate;

/// A requested date which is not in the time coordinate.
#[derive(Clone, Debug, Error)]
#[error("timestamp {timestamp} not found in the time coordinate")]
pub struct TimestampNotFoundError {
    timestamp: CalendarDate,
}

impl TimestampNotFoundError {
    /// The date which was not found.
    #[must_use]
    pub const fn timestamp(&self) -> &CalendarDate {
        &self.timestamp
    }
}

/// An index from the decoded dates of a time coordinate to their positions.
///
/// If a date occurs more than once, the first position is used.
#[derive(Clone, Debug, Default)]
pub struct TimeIndex {
    positions: HashMap<CalendarDate, u64>,
    len: u64,
}

impl TimeIndex {
    /// Create an index of `decoded` dates.
    #[must_use]
    pub fn new(decoded: &[CalendarDate]) -> Self {
        let mut positions = HashMap::with_capacity(decoded.len());
        let mut len = 0;
        for (position, date) in (0..).zip(decoded) {
            match positions.entry(*date) {
                Entry::Occupied(_) => {
                    log::debug!("duplicate date {date} at time position {position}");
                }
                Entry::Vacant(entry) => {
                    entry.insert(position);
                }
            }
            len = position + 1;
        }
        Self { positions, len }
    }

    /// The length of the indexed time coordinate.
    #[must_use]
    pub const fn len(&self) -> u64 {
        self.len
    }

    /// Returns true if the indexed time coordinate is empty.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The position of `date`, if present.
    #[must_use]
    pub fn position(&self, date: &CalendarDate) -> Option<u64> {
        self.positions.get(date).copied()
    }

    /// Resolve each `requested` date to its position, preserving order and duplicates.
    ///
    /// # Errors
    /// Returns [`TimestampNotFoundError`] for the first requested date which is not present.
    pub fn resolve(&self, requested: &[CalendarDate]) -> Result<Vec<u64>, TimestampNotFoundError> {
        requested
            .iter()
            .map(|date| {
                self.position(date)
                    .ok_or(TimestampNotFoundError { timestamp: *date })
            })
            .collect()
    }
}

/// Resolve each `requested` date to its position in `decoded`, preserving order and duplicates.
///
/// Equality is exact. If a date occurs more than once in `decoded`, its first position is used.
///
/// # Errors
/// Returns [`TimestampNotFoundError`] for the first requested date which is not present.
pub fn resolve(
    requested: &[CalendarDate],
    decoded: &[CalendarDate],
) -> Result<Vec<u64>, TimestampNotFoundError> {
    TimeIndex::new(decoded).resolve(requested)
}
