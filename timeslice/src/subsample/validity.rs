use thiserror::Error;
use timeslice_storage::{ListableStorageTraits, ReadableStorageTraits};

use super::SubsampleError;
use crate::{array::ArrayCreateError, group::Group};

/// A validation error.
#[derive(Clone, Debug, Error)]
pub enum ValidationError {
    /// A validity mask is not in the destination.
    #[error("validity mask `{_0}` is missing from the destination")]
    MissingMask(String),
    /// A validity mask is zero dimensional.
    #[error("validity mask `{_0}` has no time dimension")]
    ScalarMask(String),
    /// Validity masks disagree on the number of time steps.
    #[error("validity mask `{name}` has {length} time steps, expected {expected}")]
    InconsistentMaskLength {
        /// The name of the mask.
        name: String,
        /// The leading length of the mask.
        length: u64,
        /// The leading length of the first mask.
        expected: u64,
    },
    /// Some time steps are not valid.
    #[error("{} of {total} time steps are invalid: {invalid:?}", invalid.len())]
    InvalidTimeSteps {
        /// The positions of the invalid time steps in the destination.
        invalid: Vec<u64>,
        /// The number of time steps.
        total: u64,
    },
}

/// The validity of each time step of a destination.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ValidityReport {
    valid: Vec<bool>,
}

impl ValidityReport {
    /// The validity of each time step.
    #[must_use]
    pub fn valid(&self) -> &[bool] {
        &self.valid
    }

    /// Returns true if every time step is valid.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.valid.iter().all(|&valid| valid)
    }

    /// The positions of the invalid time steps.
    #[must_use]
    pub fn invalid_time_steps(&self) -> Vec<u64> {
        (0..)
            .zip(&self.valid)
            .filter_map(|(position, &valid)| (!valid).then_some(position))
            .collect()
    }
}

/// Compute the validity of each time step of `destination` from the `masks` arrays.
///
/// A time step is valid if every element of every mask at that step is nonzero, where NaN is nonzero.
/// With no masks the report is empty and valid.
///
/// # Errors
/// Returns [`SubsampleError`] if a mask is missing, zero dimensional, or the masks disagree on the number of time steps,
/// or on a storage or decoding error.
#[allow(clippy::cast_possible_truncation)]
pub fn check_validity<TStorage>(
    destination: &Group<TStorage>,
    masks: &[String],
) -> Result<ValidityReport, SubsampleError>
where
    TStorage: ?Sized + ReadableStorageTraits + ListableStorageTraits + 'static,
{
    let mut report: Option<(u64, Vec<bool>)> = None;
    for name in masks {
        let mask = match destination.array(name) {
            Ok(mask) => mask,
            Err(ArrayCreateError::MissingMetadata) => {
                return Err(ValidationError::MissingMask(name.clone()).into())
            }
            Err(err) => return Err(err.into()),
        };
        let Some(&length) = mask.shape().first() else {
            return Err(ValidationError::ScalarMask(name.clone()).into());
        };
        let nonzero = mask.retrieve_nonzero()?;
        let per_step = mask.shape()[1..].iter().product::<u64>() as usize;
        let mask_valid: Vec<bool> = if per_step == 0 {
            vec![true; length as usize]
        } else {
            nonzero
                .chunks_exact(per_step)
                .map(|step| step.iter().all(|&nonzero| nonzero))
                .collect()
        };
        match &mut report {
            None => report = Some((length, mask_valid)),
            Some((expected, valid)) => {
                if *expected != length {
                    return Err(ValidationError::InconsistentMaskLength {
                        name: name.clone(),
                        length,
                        expected: *expected,
                    }
                    .into());
                }
                for (valid, mask_valid) in valid.iter_mut().zip(mask_valid) {
                    *valid &= mask_valid;
                }
            }
        }
        log::debug!("checked validity mask `{name}`");
    }
    Ok(ValidityReport {
        valid: report.map(|(_, valid)| valid).unwrap_or_default(),
    })
}

/// Validate that every time step of `destination` is valid according to the `masks` arrays.
///
/// # Errors
/// Returns [`SubsampleError::Validation`] if any time step is invalid, or a [`check_validity`] error.
pub fn validate<TStorage>(
    destination: &Group<TStorage>,
    masks: &[String],
) -> Result<ValidityReport, SubsampleError>
where
    TStorage: ?Sized + ReadableStorageTraits + ListableStorageTraits + 'static,
{
    let report = check_validity(destination, masks)?;
    if report.is_valid() {
        Ok(report)
    } else {
        Err(ValidationError::InvalidTimeSteps {
            invalid: report.invalid_time_steps(),
            total: report.valid.len() as u64,
        }
        .into())
    }
}
