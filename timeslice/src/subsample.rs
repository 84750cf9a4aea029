//! Extraction of a time subsample of a hierarchy.
//!
//! A [`SubsamplePlan`] resolves requested wall clock timestamps to offsets along the time coordinate of a source group.
//! Executing the plan copies every array of the source to a new destination group:
//! time-varying arrays are gathered at the resolved offsets, static arrays are copied in full.
//! The destination is then validated against its validity masks and sealed with consolidated metadata.
//!
//! ```no_run
//! # use timeslice::{extract_subsample, SubsampleConfig};
//! let config = SubsampleConfig::new(
//!     "cwa.zarr",
//!     "subset.zarr",
//!     vec!["2021-09-12T00:00:00".to_string(), "2021-09-12T06:00:00".to_string()],
//! )
//! .with_excluded_arrays(["XTIME"]);
//! let report = extract_subsample(&config)?;
//! println!("gathered {:?}", report.gathered());
//! # Ok::<_, Box<dyn std::error::Error>>(())
//! ```

mod validity;

use std::{num::NonZeroU64, ops::Range, sync::Arc};

use derive_more::Display;
use itertools::Itertools;
use thiserror::Error;
use timeslice_storage::{
    store::{FilesystemStore, FilesystemStoreCreateError},
    ListableStorageTraits, ReadableStorageTraits, StorageError, StorePrefix, WritableStorageTraits,
};

pub use validity::{check_validity, validate, ValidationError, ValidityReport};

use crate::{
    array::{parse_dimension_names, Array, ArrayCreateError, ArrayError, ArrayShape},
    array_subset::{ArraySubset, IncompatibleDimensionalityError},
    calendar::{
        decode_coordinate, Calendar, CalendarDate, CalendarDateError, TimeUnitsError,
        TimestampFormatError, UnknownCalendarError, WallClock,
    },
    config::SubsampleConfig,
    group::{Group, GroupCreateError},
    time_index::{TimeIndex, TimestampNotFoundError},
};

/// The attribute holding the CF units of the time coordinate.
pub const UNITS_ATTRIBUTE: &str = "units";

/// The attribute holding the CF calendar of the time coordinate.
pub const CALENDAR_ATTRIBUTE: &str = "calendar";

/// A subsample error.
#[derive(Debug, Error)]
pub enum SubsampleError {
    /// A requested timestamp is malformed.
    #[error(transparent)]
    Format(#[from] TimestampFormatError),
    /// A requested timestamp is not in the time coordinate.
    #[error(transparent)]
    NotFound(#[from] TimestampNotFoundError),
    /// Storage error.
    #[error(transparent)]
    Storage(#[from] StorageError),
    /// The destination failed validation.
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// A filesystem store could not be created.
    #[error(transparent)]
    FilesystemStoreCreate(#[from] FilesystemStoreCreateError),
    /// The source group could not be opened.
    #[error(transparent)]
    GroupCreate(#[from] GroupCreateError),
    /// An array could not be opened or created.
    #[error(transparent)]
    ArrayCreate(#[from] ArrayCreateError),
    /// An array could not be read or written.
    #[error(transparent)]
    Array(#[from] ArrayError),
    /// The time coordinate could not be decoded.
    #[error(transparent)]
    TimeUnits(#[from] TimeUnitsError),
    /// A requested timestamp does not exist in the calendar of the time coordinate.
    #[error(transparent)]
    CalendarDate(#[from] CalendarDateError),
    /// The calendar of the time coordinate is unknown.
    #[error(transparent)]
    UnknownCalendar(#[from] UnknownCalendarError),
    /// The time coordinate array is missing.
    #[error("time coordinate `{_0}` is missing from the source")]
    MissingTimeCoordinate(String),
    /// The time coordinate array is not one dimensional.
    #[error("time coordinate `{name}` must be one dimensional, it has shape {shape:?}")]
    InvalidTimeCoordinate {
        /// The name of the time coordinate.
        name: String,
        /// The shape of the time coordinate.
        shape: ArrayShape,
    },
    /// The time coordinate has no units.
    #[error("time coordinate `{_0}` has no `units` attribute")]
    MissingTimeUnits(String),
    /// An array tagged with the time dimension does not have the length of the time coordinate.
    #[error("array `{name}` has time dimension `{dimension}` with length {length}, expected {expected}")]
    InconsistentTimeDimension {
        /// The name of the array.
        name: String,
        /// The name of the time dimension.
        dimension: String,
        /// The leading length of the array.
        length: u64,
        /// The length of the time coordinate.
        expected: u64,
    },
    /// A chunk shape override does not match the dimensionality of its array.
    #[error("chunk override for array `{name}` has {length} dimensions, the array has {dimensionality}")]
    InvalidChunkOverride {
        /// The name of the array.
        name: String,
        /// The number of dimensions of the override.
        length: usize,
        /// The dimensionality of the array.
        dimensionality: usize,
    },
}

/// Whether an array varies along the time coordinate.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Display)]
pub enum TimeRole {
    /// The leading dimension is the time dimension.
    #[display("time-varying")]
    TimeVarying,
    /// The array does not vary with time.
    #[display("static")]
    Static,
}

/// The elements of an array held in memory, in C order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArrayData {
    shape: ArrayShape,
    bytes: Vec<u8>,
}

impl ArrayData {
    /// Create array data with `shape` from `bytes`.
    #[must_use]
    pub fn new(shape: ArrayShape, bytes: Vec<u8>) -> Self {
        Self { shape, bytes }
    }

    /// The shape of the data.
    #[must_use]
    pub fn shape(&self) -> &[u64] {
        &self.shape
    }

    /// The bytes of the data.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Convert into the bytes of the data.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// Parse requested wall clock timestamps.
///
/// # Errors
/// Returns [`TimestampFormatError`] for the first malformed timestamp.
pub fn parse_timestamps<S: AsRef<str>>(
    timestamps: &[S],
) -> Result<Vec<WallClock>, TimestampFormatError> {
    timestamps
        .iter()
        .map(|timestamp| WallClock::parse(timestamp.as_ref()))
        .collect()
}

/// Enumerate the `(name, array)` pairs of `group` in name order.
///
/// An array which cannot be opened is paired with the error, so that the caller can still act on its name.
///
/// # Errors
/// Returns a [`StorageError`] if the arrays cannot be listed.
pub fn enumerate_arrays<TStorage>(
    group: &Group<TStorage>,
) -> Result<
    impl Iterator<Item = (String, Result<Array<TStorage>, ArrayCreateError>)> + '_,
    StorageError,
>
where
    TStorage: ?Sized + ReadableStorageTraits + ListableStorageTraits + 'static,
{
    group.arrays()
}

/// Returns true if the array `name` is excluded by `config`.
#[must_use]
pub fn is_excluded(name: &str, config: &SubsampleConfig) -> bool {
    config.excluded_arrays.contains(name)
}

/// Returns true if the leading dimension of `array` has length `time_length`.
#[must_use]
pub fn is_time_varying<TStorage: ?Sized>(array: &Array<TStorage>, time_length: u64) -> bool {
    array.shape().first() == Some(&time_length)
}

/// Classify `array` as time-varying or static.
///
/// If the array has dimension names it is time-varying if its first dimension is `time_dimension`.
/// Otherwise it is classified by [`is_time_varying`] and a warning is logged.
///
/// # Errors
/// Returns [`SubsampleError::InconsistentTimeDimension`] if the first dimension is `time_dimension` but its length is not `time_length`.
pub fn classify<TStorage: ?Sized>(
    array: &Array<TStorage>,
    time_length: u64,
    time_dimension: &str,
) -> Result<TimeRole, SubsampleError> {
    classify_shape(
        array.name(),
        array.shape(),
        array.dimension_names().as_deref(),
        time_length,
        time_dimension,
    )
}

/// Classify the array `name` with `shape` and `dimension_names` as time-varying or static.
///
/// This is [`classify`] for an array known only by its metadata.
///
/// # Errors
/// Returns [`SubsampleError::InconsistentTimeDimension`] if the first dimension is `time_dimension` but its length is not `time_length`.
pub fn classify_shape(
    name: &str,
    shape: &[u64],
    dimension_names: Option<&[String]>,
    time_length: u64,
    time_dimension: &str,
) -> Result<TimeRole, SubsampleError> {
    let Some(dimension_names) = dimension_names else {
        let role = if shape.first() == Some(&time_length) {
            TimeRole::TimeVarying
        } else {
            TimeRole::Static
        };
        log::warn!("array `{name}` has no dimension names, classified as {role} by its shape {shape:?}");
        return Ok(role);
    };
    if dimension_names.first().map(String::as_str) != Some(time_dimension) {
        return Ok(TimeRole::Static);
    }
    match shape.first() {
        Some(&length) if length == time_length => Ok(TimeRole::TimeVarying),
        length => Err(SubsampleError::InconsistentTimeDimension {
            name: name.to_string(),
            dimension: time_dimension.to_string(),
            length: length.copied().unwrap_or_default(),
            expected: time_length,
        }),
    }
}

/// Gather the rows of `array` at `offsets` along its leading dimension, in order.
///
/// Consecutive offsets are read together. Repeated offsets produce repeated rows.
///
/// # Errors
/// Returns an [`ArrayError`] if `array` is zero dimensional, an offset is out of bounds, or the array cannot be read.
pub fn gather<TStorage: ?Sized + ReadableStorageTraits + 'static>(
    array: &Array<TStorage>,
    offsets: &[u64],
) -> Result<ArrayData, ArrayError> {
    let Some((&length, trailing_shape)) = array.shape().split_first() else {
        return Err(IncompatibleDimensionalityError::new(0, 1).into());
    };
    if let Some(&offset) = offsets.iter().find(|&&offset| offset >= length) {
        return Err(ArrayError::OutOfBoundsIndex(offset, length));
    }
    // offsets are below the length, so `offset + 1` cannot overflow
    let runs = offsets
        .iter()
        .map(|&offset| offset..offset + 1)
        .coalesce(|a, b| {
            if a.end == b.start {
                Ok(a.start..b.end)
            } else {
                Err((a, b))
            }
        });

    let mut bytes = Vec::new();
    for run in runs {
        let ranges: Vec<Range<u64>> = std::iter::once(run)
            .chain(trailing_shape.iter().map(|&size| 0..size))
            .collect();
        bytes.extend(array.retrieve_array_subset(&ArraySubset::new_with_ranges(&ranges))?);
    }

    let shape = std::iter::once(offsets.len() as u64)
        .chain(trailing_shape.iter().copied())
        .collect();
    Ok(ArrayData::new(shape, bytes))
}

/// Read the whole of `array`.
///
/// # Errors
/// Returns an [`ArrayError`] if the array cannot be read.
pub fn copy_full<TStorage: ?Sized + ReadableStorageTraits + 'static>(
    array: &Array<TStorage>,
) -> Result<ArrayData, ArrayError> {
    let shape = array.shape().to_vec();
    let bytes = array.retrieve_array_subset(&ArraySubset::new_with_shape(shape.clone()))?;
    Ok(ArrayData::new(shape, bytes))
}

/// Write `data` to a new array `name` in `destination`, modelled on `template`.
///
/// The new array has the data type, fill value, compressor, order and attributes of `template`.
/// Its chunk shape is that of `template` unless `chunk_shape` is given.
/// Any existing array with the same name is replaced.
///
/// # Errors
/// Returns a [`SubsampleError`] if the array cannot be created or written.
pub fn write_array<TDestination, TSource>(
    destination: &Group<TDestination>,
    name: &str,
    data: &ArrayData,
    template: &Array<TSource>,
    chunk_shape: Option<&[NonZeroU64]>,
) -> Result<Array<TDestination>, SubsampleError>
where
    TDestination: ?Sized + ReadableStorageTraits + WritableStorageTraits + 'static,
    TSource: ?Sized,
{
    let mut metadata = template.metadata().clone();
    metadata.shape = data.shape().to_vec();
    if let Some(chunk_shape) = chunk_shape {
        metadata.chunks = chunk_shape.to_vec();
    }
    let array = Array::new_with_metadata(
        destination.storage(),
        name,
        metadata,
        template.attributes().clone(),
    )?;
    array.erase()?;
    array.store_metadata()?;
    array.store_array_subset(&ArraySubset::new_with_shape(data.shape().to_vec()), data.bytes())?;
    Ok(array)
}

/// Copy the documents and encoded chunks of the array `name` from `source` to `destination` byte for byte.
///
/// This copies a static array whose data type or compressor cannot be decoded.
/// Any existing array with the same name in `destination` is replaced.
/// Returns the number of keys copied.
///
/// # Errors
/// Returns a [`StorageError`] if `name` is not a valid prefix or there is an underlying store error.
pub fn copy_encoded<TSource, TDestination>(
    source: &Group<TSource>,
    destination: &Group<TDestination>,
    name: &str,
) -> Result<usize, StorageError>
where
    TSource: ?Sized + ReadableStorageTraits + ListableStorageTraits + 'static,
    TDestination: ?Sized + WritableStorageTraits + 'static,
{
    let prefix = StorePrefix::new(format!("{name}/"))?;
    let (source, destination) = (source.storage(), destination.storage());
    destination.erase_prefix(&prefix)?;
    let keys = source.list_prefix(&prefix)?;
    for key in &keys {
        if let Some(bytes) = source.get(key)? {
            destination.set(key, bytes)?;
        }
    }
    Ok(keys.len())
}

/// Seal `destination` by consolidating its metadata.
///
/// # Errors
/// Returns a [`StorageError`] if the metadata cannot be consolidated.
pub fn seal<TStorage>(destination: &mut Group<TStorage>) -> Result<(), StorageError>
where
    TStorage: ?Sized + ReadableStorageTraits + WritableStorageTraits + ListableStorageTraits + 'static,
{
    let consolidated_metadata = destination.consolidate_metadata()?;
    log::debug!(
        "consolidated metadata of {} documents",
        consolidated_metadata.metadata.len()
    );
    Ok(())
}

/// The outcome of a subsample extraction.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SubsampleReport {
    offsets: Vec<u64>,
    gathered: Vec<String>,
    copied: Vec<String>,
    excluded: Vec<String>,
}

impl SubsampleReport {
    /// The offsets along the time coordinate of the requested timestamps.
    #[must_use]
    pub fn offsets(&self) -> &[u64] {
        &self.offsets
    }

    /// The time-varying arrays, gathered at the offsets.
    #[must_use]
    pub fn gathered(&self) -> &[String] {
        &self.gathered
    }

    /// The static arrays, copied in full.
    #[must_use]
    pub fn copied(&self) -> &[String] {
        &self.copied
    }

    /// The arrays which were not copied.
    #[must_use]
    pub fn excluded(&self) -> &[String] {
        &self.excluded
    }
}

/// A resolved subsample of a source group, ready to be written to a destination.
#[derive(Debug)]
pub struct SubsamplePlan<TSource: ?Sized> {
    source: Group<TSource>,
    config: SubsampleConfig,
    requested: Vec<CalendarDate>,
    offsets: Vec<u64>,
    time_length: u64,
    time_dimension: String,
}

impl<TSource> SubsamplePlan<TSource>
where
    TSource: ?Sized + ReadableStorageTraits + ListableStorageTraits + 'static,
{
    /// Plan the subsample of `source` described by `config`.
    ///
    /// The requested timestamps are parsed, the time coordinate is decoded in its calendar, and each timestamp is resolved to an offset.
    /// Nothing is written.
    ///
    /// # Errors
    /// Returns a [`SubsampleError`] if
    ///  - a requested timestamp is malformed or not in the time coordinate,
    ///  - the source group or its time coordinate cannot be opened or decoded, or
    ///  - there is an underlying store error.
    pub fn new(source: Arc<TSource>, config: &SubsampleConfig) -> Result<Self, SubsampleError> {
        let timestamps = parse_timestamps(&config.requested_timestamps)?;
        let source = Group::open(source)?;

        let name = config.time_coordinate.as_str();
        let time = match source.array(name) {
            Ok(time) => time,
            Err(ArrayCreateError::MissingMetadata) => {
                return Err(SubsampleError::MissingTimeCoordinate(name.to_string()))
            }
            Err(err) => return Err(err.into()),
        };
        let &[time_length] = time.shape() else {
            return Err(SubsampleError::InvalidTimeCoordinate {
                name: name.to_string(),
                shape: time.shape().to_vec(),
            });
        };
        let units = time
            .attributes()
            .get(UNITS_ATTRIBUTE)
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| SubsampleError::MissingTimeUnits(name.to_string()))?;
        let calendar = match time.attributes().get(CALENDAR_ATTRIBUTE) {
            Some(serde_json::Value::String(calendar)) => calendar.parse::<Calendar>()?,
            Some(calendar) => calendar.to_string().parse::<Calendar>()?,
            None => Calendar::default(),
        };

        let decoded = decode_coordinate(&time.retrieve_f64()?, units, calendar)?;
        let requested = timestamps
            .iter()
            .map(|timestamp| timestamp.to_calendar_date(calendar))
            .collect::<Result<Vec<_>, _>>()?;
        let offsets = TimeIndex::new(&decoded).resolve(&requested)?;
        let time_dimension = time
            .dimension_names()
            .and_then(|names| names.into_iter().next())
            .unwrap_or_else(|| name.to_string());
        validate_chunk_overrides(&source, config)?;
        log::debug!(
            "resolved {} timestamps against `{name}` ({time_length} steps, {calendar} calendar) to offsets {offsets:?}",
            requested.len()
        );

        Ok(Self {
            source,
            config: config.clone(),
            requested,
            offsets,
            time_length,
            time_dimension,
        })
    }

    /// The source group.
    #[must_use]
    pub fn source(&self) -> &Group<TSource> {
        &self.source
    }

    /// The requested dates, in the calendar of the time coordinate.
    #[must_use]
    pub fn requested(&self) -> &[CalendarDate] {
        &self.requested
    }

    /// The offsets along the time coordinate of the requested dates.
    #[must_use]
    pub fn offsets(&self) -> &[u64] {
        &self.offsets
    }

    /// The length of the time coordinate.
    #[must_use]
    pub fn time_length(&self) -> u64 {
        self.time_length
    }

    /// The name of the time dimension.
    #[must_use]
    pub fn time_dimension(&self) -> &str {
        &self.time_dimension
    }

    /// Copy the array `name`, which cannot be opened because of `err`, by its encoded bytes.
    ///
    /// Only static arrays without a chunk override can be copied this way, otherwise `err` is returned.
    fn copy_undecodable<TDestination>(
        &self,
        destination: &Group<TDestination>,
        name: &str,
        err: ArrayCreateError,
    ) -> Result<(), SubsampleError>
    where
        TDestination: ?Sized + WritableStorageTraits + 'static,
    {
        let (metadata, attributes) = self.source.array_documents(name)?;
        let dimension_names = parse_dimension_names(&attributes, metadata.shape.len());
        let role = classify_shape(
            name,
            &metadata.shape,
            dimension_names.as_deref(),
            self.time_length,
            &self.time_dimension,
        )?;
        if role == TimeRole::TimeVarying || self.config.chunk_overrides.contains_key(name) {
            return Err(err.into());
        }
        let keys = copy_encoded(&self.source, destination, name)?;
        log::warn!("copied static array `{name}` as {keys} encoded keys, it cannot be decoded: {err}");
        Ok(())
    }

    /// Write the subsample to `destination`.
    ///
    /// Anything already in `destination` is erased.
    /// Arrays are read and written one at a time in name order.
    /// The destination is sealed only if it passes validation.
    ///
    /// # Errors
    /// Returns a [`SubsampleError`] if an array cannot be copied, the destination fails validation, or there is an underlying store error.
    pub fn execute<TDestination>(
        &self,
        destination: Arc<TDestination>,
    ) -> Result<SubsampleReport, SubsampleError>
    where
        TDestination:
            ?Sized + ReadableStorageTraits + WritableStorageTraits + ListableStorageTraits + 'static,
    {
        let mut destination = Group::create(destination)?;
        if !self.source.attributes().is_empty() {
            destination.store_attributes(self.source.attributes().clone())?;
        }

        let mut report = SubsampleReport {
            offsets: self.offsets.clone(),
            ..Default::default()
        };
        for (name, array) in enumerate_arrays(&self.source)? {
            if is_excluded(&name, &self.config) {
                log::info!("excluded array `{name}`");
                report.excluded.push(name);
                continue;
            }
            let array = match array {
                Ok(array) => array,
                Err(
                    err @ (ArrayCreateError::DataTypeError(_)
                    | ArrayCreateError::CodecsCreateError(_)),
                ) => {
                    self.copy_undecodable(&destination, &name, err)?;
                    report.copied.push(name);
                    continue;
                }
                Err(err) => return Err(err.into()),
            };

            let role = classify(&array, self.time_length, &self.time_dimension)?;
            let data = match role {
                TimeRole::TimeVarying => gather(&array, &self.offsets)?,
                TimeRole::Static => copy_full(&array)?,
            };
            let chunk_shape = self.config.chunk_overrides.get(&name).map(Vec::as_slice);
            write_array(&destination, &name, &data, &array, chunk_shape)?;
            log::info!("copied {role} array `{name}` with shape {:?}", data.shape());
            match role {
                TimeRole::TimeVarying => report.gathered.push(name),
                TimeRole::Static => report.copied.push(name),
            }
        }

        validate(&destination, &self.config.validity_masks)?;
        seal(&mut destination)?;
        Ok(report)
    }
}

/// Check every chunk override of `config` against the arrays of `source`.
///
/// An override naming an array absent from `source` is ignored with a warning.
///
/// # Errors
/// Returns [`SubsampleError::InvalidChunkOverride`] if an override does not match the dimensionality of its array,
/// or a [`SubsampleError`] if an overridden array cannot be opened.
fn validate_chunk_overrides<TSource>(
    source: &Group<TSource>,
    config: &SubsampleConfig,
) -> Result<(), SubsampleError>
where
    TSource: ?Sized + ReadableStorageTraits + ListableStorageTraits + 'static,
{
    for (name, chunk_shape) in &config.chunk_overrides {
        if is_excluded(name, config) {
            continue;
        }
        let metadata = match source.array_documents(name) {
            Ok((metadata, _)) => metadata,
            Err(ArrayCreateError::MissingMetadata | ArrayCreateError::InvalidName(_)) => {
                log::warn!("ignoring chunk override for `{name}`, it is not an array of the source");
                continue;
            }
            Err(err) => return Err(err.into()),
        };
        if chunk_shape.len() != metadata.shape.len() {
            return Err(SubsampleError::InvalidChunkOverride {
                name: name.clone(),
                length: chunk_shape.len(),
                dimensionality: metadata.shape.len(),
            });
        }
        // rechunking decodes the array
        source.array(name)?;
    }
    Ok(())
}

/// Extract the subsample described by `config` between filesystem stores.
///
/// The destination is only touched once the requested timestamps have been resolved.
///
/// # Errors
/// Returns a [`SubsampleError`] if planning or executing the subsample fails.
pub fn extract_subsample(config: &SubsampleConfig) -> Result<SubsampleReport, SubsampleError> {
    let source = Arc::new(FilesystemStore::new(&config.source_location)?.sorted());
    let plan = SubsamplePlan::new(source, config)?;
    let destination = Arc::new(FilesystemStore::new(&config.destination_location)?);
    let report = plan.execute(destination)?;
    log::info!(
        "wrote {} time steps to {}",
        report.offsets().len(),
        config.destination_location.display()
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use std::error::Error;

    use timeslice_metadata::{
        v2::{ArrayMetadataV2, DataTypeMetadataV2, FillValueMetadataV2},
        AttributesV2,
    };
    use timeslice_storage::{store::MemoryStore, Bytes, StoreKey};

    use super::*;

    fn metadata(dtype: &str, shape: ArrayShape, chunks: &[u64]) -> ArrayMetadataV2 {
        ArrayMetadataV2::new(
            shape,
            chunks.iter().map(|&c| NonZeroU64::new(c).unwrap()).collect(),
            DataTypeMetadataV2::from(dtype),
            FillValueMetadataV2::Null,
            None,
        )
    }

    fn attributes(json: serde_json::Value) -> AttributesV2 {
        json.as_object().cloned().unwrap_or_default()
    }

    fn f64_bytes(values: impl IntoIterator<Item = f64>) -> Vec<u8> {
        values.into_iter().flat_map(f64::to_le_bytes).collect()
    }

    fn store_array(
        store: &Arc<MemoryStore>,
        name: &str,
        metadata: ArrayMetadataV2,
        attributes: AttributesV2,
        bytes: &[u8],
    ) -> Result<Array<MemoryStore>, Box<dyn Error>> {
        let array = Array::new_with_metadata(store.clone(), name, metadata, attributes)?;
        array.store_metadata()?;
        array.store_array_subset(&ArraySubset::new_with_shape(array.shape().to_vec()), bytes)?;
        Ok(array)
    }

    /// A source with 6 hourly steps from 2021-09-11, a `temp` array of (time, 2) and a static `lat`.
    fn source() -> Result<Arc<MemoryStore>, Box<dyn Error>> {
        let store = Arc::new(MemoryStore::new());
        let mut group = Group::create(store.clone())?;
        group.store_attributes(attributes(serde_json::json!({"title": "test"})))?;
        store_array(
            &store,
            "time",
            metadata("<f8", vec![6], &[4]),
            attributes(serde_json::json!({
                "_ARRAY_DIMENSIONS": ["time"],
                "units": "hours since 2021-09-11 00:00:00",
                "calendar": "standard",
            })),
            &f64_bytes((0..6).map(f64::from)),
        )?;
        store_array(
            &store,
            "temp",
            metadata("<f8", vec![6, 2], &[4, 2]),
            attributes(serde_json::json!({"_ARRAY_DIMENSIONS": ["time", "x"], "units": "K"})),
            &f64_bytes((0..12).map(f64::from)),
        )?;
        store_array(
            &store,
            "lat",
            metadata("<f8", vec![2], &[2]),
            attributes(serde_json::json!({"_ARRAY_DIMENSIONS": ["x"]})),
            &f64_bytes([23.5, 24.0]),
        )?;
        group.consolidate_metadata()?;
        Ok(store)
    }

    fn timestamps(hours: &[u32]) -> Vec<String> {
        hours
            .iter()
            .map(|hour| format!("2021-09-11T{hour:02}:00:00"))
            .collect()
    }

    #[test]
    fn subsample_gather_runs() -> Result<(), Box<dyn Error>> {
        let store = source()?;
        let group = Group::open(store)?;
        let temp = group.array("temp")?;
        let data = gather(&temp, &[1, 2, 5, 1])?;
        assert_eq!(data.shape(), &[4, 2]);
        assert_eq!(
            data.into_bytes(),
            f64_bytes([2.0, 3.0, 4.0, 5.0, 10.0, 11.0, 2.0, 3.0])
        );
        assert!(matches!(
            gather(&temp, &[6]),
            Err(ArrayError::OutOfBoundsIndex(6, 6))
        ));
        assert!(matches!(
            gather(&temp, &[0, u64::MAX]),
            Err(ArrayError::OutOfBoundsIndex(u64::MAX, 6))
        ));
        assert_eq!(gather(&temp, &[])?.shape(), &[0, 2]);
        Ok(())
    }

    #[test]
    fn subsample_classify() -> Result<(), Box<dyn Error>> {
        let store = Arc::new(MemoryStore::new());
        let temp = Array::new_with_metadata(
            store.clone(),
            "temp",
            metadata("<f4", vec![6, 2], &[6, 2]),
            attributes(serde_json::json!({"_ARRAY_DIMENSIONS": ["time", "x"]})),
        )?;
        assert_eq!(classify(&temp, 6, "time")?, TimeRole::TimeVarying);
        assert!(matches!(
            classify(&temp, 7, "time"),
            Err(SubsampleError::InconsistentTimeDimension { length: 6, expected: 7, .. })
        ));

        let grid = Array::new_with_metadata(
            store.clone(),
            "grid",
            metadata("<f4", vec![6, 6], &[6, 6]),
            attributes(serde_json::json!({"_ARRAY_DIMENSIONS": ["y", "x"]})),
        )?;
        assert_eq!(classify(&grid, 6, "time")?, TimeRole::Static);
        assert!(is_time_varying(&grid, 6));

        let untagged = Array::new_with_metadata(
            store,
            "untagged",
            metadata("<f4", vec![6], &[6]),
            AttributesV2::new(),
        )?;
        assert_eq!(classify(&untagged, 6, "time")?, TimeRole::TimeVarying);
        assert_eq!(classify(&untagged, 5, "time")?, TimeRole::Static);
        Ok(())
    }

    #[test]
    fn subsample_write_array_chunk_override() -> Result<(), Box<dyn Error>> {
        let source = source()?;
        let source = Group::open(source)?;
        let temp = source.array("temp")?;
        let destination = Group::create(Arc::new(MemoryStore::new()))?;
        let data = gather(&temp, &[0, 3])?;
        let chunks = [NonZeroU64::new(1).unwrap(), NonZeroU64::new(1).unwrap()];
        let written = write_array(&destination, "temp", &data, &temp, Some(&chunks))?;
        assert_eq!(written.chunk_shape(), &chunks);
        assert_eq!(written.attributes(), temp.attributes());

        let reopened = Array::open(destination.storage(), "temp")?;
        assert_eq!(reopened.shape(), &[2, 2]);
        assert_eq!(reopened.retrieve_f64()?, vec![0.0, 1.0, 6.0, 7.0]);
        Ok(())
    }

    #[test]
    fn subsample_plan_execute() -> Result<(), Box<dyn Error>> {
        let config = SubsampleConfig::new("source", "destination", timestamps(&[3, 1, 1]));
        let plan = SubsamplePlan::new(source()?, &config)?;
        assert_eq!(plan.offsets(), &[3, 1, 1]);
        assert_eq!(plan.time_length(), 6);
        assert_eq!(plan.time_dimension(), "time");
        assert_eq!(plan.requested()[0].calendar(), Calendar::Standard);

        let destination = Arc::new(MemoryStore::new());
        let report = plan.execute(destination.clone())?;
        assert_eq!(report.gathered(), &["temp".to_string(), "time".to_string()]);
        assert_eq!(report.copied(), &["lat".to_string()]);
        assert!(report.excluded().is_empty());

        let group = Group::open(destination)?;
        assert!(group.consolidated_metadata().is_some());
        assert_eq!(group.attributes(), plan.source().attributes());
        assert_eq!(group.array("time")?.retrieve_f64()?, vec![3.0, 1.0, 1.0]);
        assert_eq!(
            group.array("temp")?.retrieve_f64()?,
            vec![6.0, 7.0, 2.0, 3.0, 2.0, 3.0]
        );
        assert_eq!(group.array("lat")?.retrieve_f64()?, vec![23.5, 24.0]);
        Ok(())
    }

    #[test]
    fn subsample_plan_errors() -> Result<(), Box<dyn Error>> {
        let config = SubsampleConfig::new(
            "source",
            "destination",
            vec!["2021-09-11 03:00:00".to_string()],
        );
        assert!(matches!(
            SubsamplePlan::new(source()?, &config),
            Err(SubsampleError::Format(_))
        ));

        let config = SubsampleConfig::new("source", "destination", timestamps(&[7]));
        assert!(matches!(
            SubsamplePlan::new(source()?, &config),
            Err(SubsampleError::NotFound(_))
        ));

        let config = SubsampleConfig::new("source", "destination", timestamps(&[1]))
            .with_time_coordinate("Time");
        assert!(matches!(
            SubsamplePlan::new(source()?, &config),
            Err(SubsampleError::MissingTimeCoordinate(name)) if name == "Time"
        ));

        let config = SubsampleConfig::new("source", "destination", timestamps(&[1]))
            .with_time_coordinate("temp");
        assert!(matches!(
            SubsamplePlan::new(source()?, &config),
            Err(SubsampleError::InvalidTimeCoordinate { .. })
        ));

        let config = SubsampleConfig::new("source", "destination", timestamps(&[1]))
            .with_time_coordinate("lat");
        assert!(matches!(
            SubsamplePlan::new(source()?, &config),
            Err(SubsampleError::MissingTimeUnits(_))
        ));
        Ok(())
    }

    #[test]
    fn subsample_chunk_overrides() -> Result<(), Box<dyn Error>> {
        let chunks = |n: usize| vec![NonZeroU64::new(1).unwrap(); n];
        let config = SubsampleConfig::new("source", "destination", timestamps(&[1]))
            .with_chunk_override("temp", chunks(3));
        assert!(matches!(
            SubsamplePlan::new(source()?, &config),
            Err(SubsampleError::InvalidChunkOverride { name, length: 3, dimensionality: 2 }) if name == "temp"
        ));

        let config = SubsampleConfig::new("source", "destination", timestamps(&[1]))
            .with_chunk_override("temp", chunks(2))
            .with_chunk_override("tmep", chunks(2));
        testing_logger::setup();
        let plan = SubsamplePlan::new(source()?, &config)?;
        testing_logger::validate(|captured_logs| {
            let warnings: Vec<_> = captured_logs
                .iter()
                .filter(|log| log.level == log::Level::Warn)
                .collect();
            assert_eq!(warnings.len(), 1);
            assert_eq!(
                warnings[0].body,
                "ignoring chunk override for `tmep`, it is not an array of the source"
            );
        });
        assert_eq!(plan.offsets(), &[1]);
        Ok(())
    }

    /// Adds an lz4 compressed array `name` with `shape` and `dimension_names` to `store`, written by another implementation.
    fn store_lz4_array(
        store: &MemoryStore,
        name: &str,
        shape: &[u64],
        dimension_names: &[&str],
    ) -> Result<(), Box<dyn Error>> {
        let metadata = serde_json::json!({
            "chunks": shape,
            "compressor": {"id": "lz4", "acceleration": 1},
            "dtype": "<f4",
            "fill_value": null,
            "filters": null,
            "order": "C",
            "shape": shape,
            "zarr_format": 2,
        });
        store.set(
            &StoreKey::new(format!("{name}/.zarray"))?,
            serde_json::to_vec(&metadata)?.into(),
        )?;
        store.set(
            &StoreKey::new(format!("{name}/.zattrs"))?,
            serde_json::to_vec(&serde_json::json!({"_ARRAY_DIMENSIONS": dimension_names}))?.into(),
        )?;
        let chunk_key = vec!["0"; shape.len()].join(".");
        store.set(
            &StoreKey::new(format!("{name}/{chunk_key}"))?,
            Bytes::from_static(b"\x04\x22\x4d\x18lz4 frame"),
        )?;
        Ok(())
    }

    #[test]
    fn subsample_undecodable_static_array() -> Result<(), Box<dyn Error>> {
        let store = source()?;
        store_lz4_array(&store, "orography", &[2], &["x"])?;
        Group::open(store.clone())?.consolidate_metadata()?;

        let config = SubsampleConfig::new("source", "destination", timestamps(&[2]));
        let plan = SubsamplePlan::new(store.clone(), &config)?;
        let destination = Arc::new(MemoryStore::new());
        let report = plan.execute(destination.clone())?;
        assert_eq!(report.copied(), &["lat".to_string(), "orography".to_string()]);

        let prefix = StorePrefix::new("orography/")?;
        let keys = destination.list_prefix(&prefix)?;
        assert_eq!(keys, store.list_prefix(&prefix)?);
        assert_eq!(keys.len(), 3);
        for key in &keys {
            assert_eq!(destination.get(key)?, store.get(key)?);
        }
        let group = Group::open(destination)?;
        assert_eq!(
            group.array_documents("orography")?,
            plan.source().array_documents("orography")?
        );

        // an overridden array must be decoded to be rechunked
        let config = config.with_chunk_override("orography", vec![NonZeroU64::new(1).unwrap()]);
        assert!(matches!(
            SubsamplePlan::new(store, &config),
            Err(SubsampleError::ArrayCreate(ArrayCreateError::CodecsCreateError(_)))
        ));
        Ok(())
    }

    #[test]
    fn subsample_undecodable_time_varying_array() -> Result<(), Box<dyn Error>> {
        let store = source()?;
        store_lz4_array(&store, "wind", &[6, 2], &["time", "x"])?;
        Group::open(store.clone())?.consolidate_metadata()?;

        let config = SubsampleConfig::new("source", "destination", timestamps(&[2]));
        let plan = SubsamplePlan::new(store, &config)?;
        assert!(matches!(
            plan.execute(Arc::new(MemoryStore::new())),
            Err(SubsampleError::ArrayCreate(ArrayCreateError::CodecsCreateError(_)))
        ));
        Ok(())
    }

    #[test]
    fn subsample_excluded() {
        let config = SubsampleConfig::new("source", "destination", vec![])
            .with_excluded_arrays(["XTIME"]);
        assert!(is_excluded("XTIME", &config));
        assert!(!is_excluded("xtime", &config));
    }
}
