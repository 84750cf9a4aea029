//! `timeslice` extracts a time subsample from a [Zarr V2](https://zarr-specs.readthedocs.io/en/latest/v2/v2.0.html) hierarchy.
//!
//! A source hierarchy holds a CF time coordinate (`units` such as `hours since 2021-09-11 00:00:00` and an optional `calendar`) and any number of arrays.
//! Given a list of wall clock timestamps, `timeslice`:
//! - decodes the time coordinate in its calendar and resolves each timestamp to an offset,
//! - gathers the rows at those offsets from every time-varying array,
//! - copies every static array in full, keeping the attributes of each array,
//! - checks that the gathered time steps are valid according to a set of validity mask arrays, and
//! - seals the destination with consolidated metadata (`.zmetadata`).
//!
//! The destination is readable by any Zarr V2 implementation, for example `xarray.open_zarr`.
//!
//! ## Supported Zarr V2 data
//! - data types: NumPy type strings for bool, integers, floats (including `<f2`), complex, `datetime64`/`timedelta64`, bytes and unicode,
//! - compressors: `blosc`, `gzip`, `zlib` and `zstd` (each behind a default feature of the same name),
//! - C and F order, and `.` or `/` dimension separators.
//!
//! Filters and object data types are not supported.
//!
//! ## Calendars
//! The CF calendars `standard` (`gregorian`), `proleptic_gregorian`, `julian`, `noleap` (`365_day`), `all_leap` (`366_day`) and `360_day` are supported.
//! A time coordinate without a `calendar` attribute uses the proleptic Gregorian calendar.
//!
//! ## Example
//! ```no_run
//! # use timeslice::{extract_subsample, SubsampleConfig};
//! let config = SubsampleConfig::new(
//!     "cwa.zarr",
//!     "subset.zarr",
//!     vec!["2021-09-12T00:00:00".to_string()],
//! )
//! .with_validity_masks(["era5_valid", "cwb_valid"]);
//! let report = extract_subsample(&config)?;
//! assert_eq!(report.offsets().len(), 1);
//! # Ok::<_, Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Licence
//! `timeslice` is licensed under either of
//! - the Apache License, Version 2.0 <http://www.apache.org/licenses/LICENSE-2.0> or
//! - the MIT license <http://opensource.org/licenses/MIT>, at your option.

pub mod array;
pub mod array_subset;
pub mod calendar;
pub mod config;
pub mod group;
pub mod subsample;
pub mod time_index;

pub use timeslice_metadata as metadata;
pub use timeslice_storage as storage;

pub use config::SubsampleConfig;
pub use subsample::{extract_subsample, SubsampleError, SubsamplePlan, SubsampleReport};
