#![allow(missing_docs)]

use std::{error::Error, num::NonZeroU64, path::Path, sync::Arc};

use timeslice::{
    array::{Array, ArrayMetadataV2, AttributesV2},
    array_subset::ArraySubset,
    calendar::Calendar,
    extract_subsample,
    group::Group,
    metadata::v2::{DataTypeMetadataV2, FillValueMetadataV2},
    storage::{
        store::{FilesystemStore, MemoryStore},
        ListableStorageTraits, ReadableStorageTraits, StoreKey, StorePrefix, WritableStorageTraits,
    },
    subsample::ValidationError,
    SubsampleConfig, SubsampleError, SubsamplePlan,
};

const TIME_LENGTH: u64 = 48;

fn metadata(dtype: &str, shape: Vec<u64>, chunks: &[u64]) -> ArrayMetadataV2 {
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

fn store_array<TStorage: ReadableStorageTraits + WritableStorageTraits + 'static>(
    store: &Arc<TStorage>,
    name: &str,
    metadata: ArrayMetadataV2,
    attributes: AttributesV2,
    bytes: &[u8],
) -> Result<(), Box<dyn Error>> {
    let array = Array::new_with_metadata(store.clone(), name, metadata, attributes)?;
    array.store_metadata()?;
    array.store_array_subset(&ArraySubset::new_with_shape(array.shape().to_vec()), bytes)?;
    Ok(())
}

fn f32_bytes(values: impl IntoIterator<Item = f32>) -> Vec<u8> {
    values.into_iter().flat_map(f32::to_le_bytes).collect()
}

fn i64_bytes(values: impl IntoIterator<Item = i64>) -> Vec<u8> {
    values.into_iter().flat_map(i64::to_le_bytes).collect()
}

/// The value of `temp` at `(step, y, x)`.
#[allow(clippy::cast_precision_loss)]
fn temp_value(step: u64, y: u64, x: u64) -> f32 {
    (step * 100 + y * 10 + x) as f32
}

/// A hierarchy of 48 hourly steps from 2021-09-11 00:00:00.
///
/// Step 40 is marked invalid by `era5_valid`.
fn create_source(path: &Path) -> Result<(), Box<dyn Error>> {
    let store = Arc::new(FilesystemStore::new(path)?);
    let mut group = Group::create(store.clone())?;
    group.store_attributes(attributes(serde_json::json!({"title": "hourly reanalysis"})))?;

    store_array(
        &store,
        "time",
        metadata("<i8", vec![TIME_LENGTH], &[24]),
        attributes(serde_json::json!({
            "_ARRAY_DIMENSIONS": ["time"],
            "units": "hours since 2021-09-11 00:00:00",
        })),
        &i64_bytes(0..48),
    )?;
    store_array(
        &store,
        "temp",
        metadata("<f4", vec![TIME_LENGTH, 3, 4], &[12, 2, 4]),
        attributes(serde_json::json!({
            "_ARRAY_DIMENSIONS": ["time", "y", "x"],
            "units": "K",
            "long_name": "air temperature",
            "coordinates": "lat lon",
        })),
        &f32_bytes((0..TIME_LENGTH).flat_map(|step| {
            (0..3).flat_map(move |y| (0..4).map(move |x| temp_value(step, y, x)))
        })),
    )?;
    store_array(
        &store,
        "lat",
        metadata("<f4", vec![3, 4], &[3, 4]),
        attributes(serde_json::json!({"_ARRAY_DIMENSIONS": ["y", "x"], "units": "degrees_north"})),
        &f32_bytes((0..12).map(|i| 20.0 + f32::from(i as u8))),
    )?;
    store_array(
        &store,
        "XTIME",
        metadata("<f4", vec![TIME_LENGTH], &[48]),
        AttributesV2::new(),
        &f32_bytes((0..48).map(|i| f32::from(i as u8) * 60.0)),
    )?;
    store_array(
        &store,
        "era5_valid",
        metadata("|b1", vec![TIME_LENGTH], &[48]),
        attributes(serde_json::json!({"_ARRAY_DIMENSIONS": ["time"]})),
        &(0..48).map(|step| u8::from(step != 40)).collect::<Vec<u8>>(),
    )?;
    store_array(
        &store,
        "cwb_valid",
        metadata("<f4", vec![TIME_LENGTH, 3, 4], &[48, 3, 4]),
        attributes(serde_json::json!({"_ARRAY_DIMENSIONS": ["time", "y", "x"]})),
        &f32_bytes((0..48 * 12).map(|i| if i % 7 == 0 { f32::NAN } else { 1.0 })),
    )?;
    group.consolidate_metadata()?;
    Ok(())
}

fn timestamps(timestamps: &[&str]) -> Vec<String> {
    timestamps.iter().map(ToString::to_string).collect()
}

fn config(directory: &Path, requested: &[&str]) -> SubsampleConfig {
    SubsampleConfig::new(
        directory.join("source.zarr"),
        directory.join("destination.zarr"),
        timestamps(requested),
    )
    .with_excluded_arrays(["XTIME"])
    .with_validity_masks(["era5_valid", "cwb_valid"])
}

#[test]
fn subsample_end_to_end() -> Result<(), Box<dyn Error>> {
    let directory = tempfile::TempDir::new()?;
    create_source(&directory.path().join("source.zarr"))?;
    let config = config(
        directory.path(),
        &["2021-09-12T00:00:00", "2021-09-12T06:00:00", "2021-09-12T12:00:00"],
    );

    let report = extract_subsample(&config)?;
    assert_eq!(report.offsets(), &[24, 30, 36]);
    assert_eq!(report.excluded(), &["XTIME".to_string()]);
    assert_eq!(
        report.gathered(),
        &["cwb_valid", "era5_valid", "temp", "time"].map(String::from)
    );
    assert_eq!(report.copied(), &["lat".to_string()]);

    let destination_path = directory.path().join("destination.zarr");
    assert!(destination_path.join(".zmetadata").exists());
    assert!(!destination_path.join("XTIME").exists());

    let destination = Group::open(Arc::new(FilesystemStore::new(&destination_path)?))?;
    assert_eq!(
        destination.array_names()?,
        vec!["cwb_valid", "era5_valid", "lat", "temp", "time"]
    );
    assert_eq!(destination.attributes()["title"], "hourly reanalysis");

    let time = destination.array("time")?;
    assert_eq!(time.retrieve_f64()?, vec![24.0, 30.0, 36.0]);
    assert_eq!(time.chunk_shape(), &[NonZeroU64::new(24).unwrap()]);

    let temp = destination.array("temp")?;
    assert_eq!(temp.shape(), &[3, 3, 4]);
    assert_eq!(temp.data_type().name(), "<f4");
    let expected: Vec<f64> = [24, 30, 36]
        .into_iter()
        .flat_map(|step| (0..3).flat_map(move |y| (0..4).map(move |x| f64::from(temp_value(step, y, x)))))
        .collect();
    assert_eq!(temp.retrieve_f64()?, expected);

    let lat = destination.array("lat")?;
    assert_eq!(lat.shape(), &[3, 4]);
    assert_eq!(lat.retrieve_f64()?[11], 31.0);
    Ok(())
}

#[test]
fn subsample_attributes_in_source_order() -> Result<(), Box<dyn Error>> {
    let directory = tempfile::TempDir::new()?;
    create_source(&directory.path().join("source.zarr"))?;
    extract_subsample(&config(directory.path(), &["2021-09-11T05:00:00"]))?;

    let zattrs = std::fs::read(directory.path().join("destination.zarr/temp/.zattrs"))?;
    let zattrs: AttributesV2 = serde_json::from_slice(&zattrs)?;
    assert_eq!(
        zattrs.keys().collect::<Vec<_>>(),
        vec!["_ARRAY_DIMENSIONS", "units", "long_name", "coordinates"]
    );
    assert_eq!(zattrs["long_name"], "air temperature");
    Ok(())
}

#[test]
fn subsample_duplicates_preserved() -> Result<(), Box<dyn Error>> {
    let directory = tempfile::TempDir::new()?;
    create_source(&directory.path().join("source.zarr"))?;
    let report = extract_subsample(&config(
        directory.path(),
        &["2021-09-12T12:00:00", "2021-09-12T00:00:00", "2021-09-12T12:00:00"],
    ))?;
    assert_eq!(report.offsets(), &[36, 24, 36]);

    let destination = Group::open(Arc::new(FilesystemStore::new(
        directory.path().join("destination.zarr"),
    )?))?;
    assert_eq!(
        destination.array("time")?.retrieve_f64()?,
        vec![36.0, 24.0, 36.0]
    );
    Ok(())
}

#[test]
fn subsample_format_error_writes_nothing() -> Result<(), Box<dyn Error>> {
    let directory = tempfile::TempDir::new()?;
    create_source(&directory.path().join("source.zarr"))?;
    let result = extract_subsample(&config(
        directory.path(),
        &["2021-09-12T00:00:00", "2021-09-12 06:00:00"],
    ));
    match result {
        Err(SubsampleError::Format(err)) => assert_eq!(err.timestamp(), "2021-09-12 06:00:00"),
        other => panic!("expected a format error, got {other:?}"),
    }
    assert!(!directory.path().join("destination.zarr").exists());
    Ok(())
}

#[test]
fn subsample_not_found_writes_nothing() -> Result<(), Box<dyn Error>> {
    let directory = tempfile::TempDir::new()?;
    create_source(&directory.path().join("source.zarr"))?;
    let result = extract_subsample(&config(
        directory.path(),
        &["2021-09-12T00:00:00", "2021-09-13T00:00:00"],
    ));
    match result {
        Err(SubsampleError::NotFound(err)) => {
            assert_eq!(err.timestamp().to_string(), "2021-09-13 00:00:00");
        }
        other => panic!("expected a not found error, got {other:?}"),
    }
    assert!(!directory.path().join("destination.zarr").exists());
    Ok(())
}

#[test]
fn subsample_invalid_time_step_is_not_sealed() -> Result<(), Box<dyn Error>> {
    let directory = tempfile::TempDir::new()?;
    create_source(&directory.path().join("source.zarr"))?;
    let result = extract_subsample(&config(
        directory.path(),
        &["2021-09-12T00:00:00", "2021-09-12T16:00:00"],
    ));
    assert!(matches!(
        result,
        Err(SubsampleError::Validation(ValidationError::InvalidTimeSteps { invalid, total: 2 })) if invalid == vec![1]
    ));

    let destination_path = directory.path().join("destination.zarr");
    assert!(destination_path.join("temp/.zarray").exists());
    assert!(!destination_path.join(".zmetadata").exists());
    Ok(())
}

#[test]
fn subsample_overwrites_destination() -> Result<(), Box<dyn Error>> {
    let directory = tempfile::TempDir::new()?;
    create_source(&directory.path().join("source.zarr"))?;
    std::fs::create_dir_all(directory.path().join("destination.zarr/stale"))?;
    std::fs::write(directory.path().join("destination.zarr/stale/.zarray"), "{}")?;

    let config = config(directory.path(), &["2021-09-11T00:00:00"]).with_chunk_override(
        "temp",
        vec![NonZeroU64::new(1).unwrap(), NonZeroU64::new(3).unwrap(), NonZeroU64::new(2).unwrap()],
    );
    extract_subsample(&config)?;
    extract_subsample(&config)?;

    let destination_path = directory.path().join("destination.zarr");
    assert!(!destination_path.join("stale").exists());
    let destination = Group::open(Arc::new(FilesystemStore::new(&destination_path)?))?;
    let temp = destination.array("temp")?;
    assert_eq!(temp.chunk_grid_shape(), vec![1, 1, 2]);
    assert_eq!(temp.retrieve_f64()?[5], f64::from(temp_value(0, 1, 1)));
    Ok(())
}

#[test]
fn subsample_calendar() -> Result<(), Box<dyn Error>> {
    let store = Arc::new(MemoryStore::new());
    let mut group = Group::create(store.clone())?;
    store_array(
        &store,
        "time",
        metadata("<f8", vec![3], &[3]),
        attributes(serde_json::json!({
            "units": "days since 2020-02-28",
            "calendar": "noleap",
        })),
        &[0.0f64, 1.0, 2.0]
            .into_iter()
            .flat_map(f64::to_le_bytes)
            .collect::<Vec<u8>>(),
    )?;
    group.consolidate_metadata()?;

    let config = SubsampleConfig::new("source", "destination", timestamps(&["2020-03-01T00:00:00"]));
    let plan = SubsamplePlan::new(store.clone(), &config)?;
    assert_eq!(plan.offsets(), &[1]);
    assert_eq!(plan.requested()[0].calendar(), Calendar::NoLeap);

    let config = SubsampleConfig::new("source", "destination", timestamps(&["2020-02-29T00:00:00"]));
    assert!(matches!(
        SubsamplePlan::new(store, &config),
        Err(SubsampleError::CalendarDate(_))
    ));
    Ok(())
}

#[test]
fn subsample_untagged_array_warns() -> Result<(), Box<dyn Error>> {
    let store = Arc::new(MemoryStore::new());
    let mut group = Group::create(store.clone())?;
    store_array(
        &store,
        "time",
        metadata("<i8", vec![4], &[4]),
        attributes(serde_json::json!({"units": "hours since 2021-09-11T00:00:00Z"})),
        &i64_bytes(0..4),
    )?;
    store_array(
        &store,
        "rain",
        metadata("<f4", vec![4, 2], &[2, 2]),
        AttributesV2::new(),
        &f32_bytes((0..8).map(|i| f32::from(i as u8))),
    )?;
    group.consolidate_metadata()?;

    let config = SubsampleConfig::new("source", "destination", timestamps(&["2021-09-11T02:00:00"]))
        .with_excluded_arrays(["time"]);
    let plan = SubsamplePlan::new(store, &config)?;
    testing_logger::setup();
    let report = plan.execute(Arc::new(MemoryStore::new()))?;
    testing_logger::validate(|captured_logs| {
        let warnings: Vec<_> = captured_logs
            .iter()
            .filter(|log| log.level == log::Level::Warn)
            .collect();
        assert_eq!(warnings.len(), 1);
        assert_eq!(
            warnings[0].body,
            "array `rain` has no dimension names, classified as time-varying by its shape [4, 2]"
        );
    });
    assert_eq!(report.gathered(), &["rain".to_string()]);
    Ok(())
}

#[test]
fn subsample_inconsistent_time_dimension() -> Result<(), Box<dyn Error>> {
    let store = Arc::new(MemoryStore::new());
    let mut group = Group::create(store.clone())?;
    store_array(
        &store,
        "time",
        metadata("<i8", vec![4], &[4]),
        attributes(serde_json::json!({
            "_ARRAY_DIMENSIONS": ["time"],
            "units": "hours since 2021-09-11",
        })),
        &i64_bytes(0..4),
    )?;
    store_array(
        &store,
        "rain",
        metadata("<f4", vec![3], &[3]),
        attributes(serde_json::json!({"_ARRAY_DIMENSIONS": ["time"]})),
        &f32_bytes([1.0, 2.0, 3.0]),
    )?;
    group.consolidate_metadata()?;

    let config = SubsampleConfig::new("source", "destination", timestamps(&["2021-09-11T01:00:00"]));
    let plan = SubsamplePlan::new(store, &config)?;
    assert!(matches!(
        plan.execute(Arc::new(MemoryStore::new())),
        Err(SubsampleError::InconsistentTimeDimension { name, length: 3, expected: 4, .. }) if name == "rain"
    ));
    Ok(())
}

/// The value of `elevation` at `(y, x)`.
fn elevation_value(y: u64, x: u64) -> f32 {
    f32::from(u16::try_from(y * 10 + x).unwrap_or_default()) * 12.5
}

/// A day of hourly reanalysis: `temp` of shape (48, 10, 10) and a static `elevation` of shape (10, 10).
fn create_hourly_source(path: &Path) -> Result<(), Box<dyn Error>> {
    let store = Arc::new(FilesystemStore::new(path)?);
    let mut group = Group::create(store.clone())?;
    store_array(
        &store,
        "time",
        metadata("<i8", vec![TIME_LENGTH], &[48]),
        attributes(serde_json::json!({
            "_ARRAY_DIMENSIONS": ["time"],
            "units": "hours since 2021-09-11 00:00:00",
            "calendar": "proleptic_gregorian",
        })),
        &i64_bytes(0..48),
    )?;
    store_array(
        &store,
        "temp",
        metadata("<f4", vec![TIME_LENGTH, 10, 10], &[12, 5, 5]),
        attributes(serde_json::json!({"_ARRAY_DIMENSIONS": ["time", "y", "x"], "units": "K"})),
        &f32_bytes((0..TIME_LENGTH).flat_map(|step| {
            (0..10).flat_map(move |y| (0..10).map(move |x| temp_value(step, y, x)))
        })),
    )?;
    store_array(
        &store,
        "elevation",
        metadata("<f4", vec![10, 10], &[4, 4]),
        attributes(serde_json::json!({"_ARRAY_DIMENSIONS": ["y", "x"], "units": "m"})),
        &f32_bytes((0..10).flat_map(|y| (0..10).map(move |x| elevation_value(y, x)))),
    )?;
    group.consolidate_metadata()?;
    Ok(())
}

#[test]
fn subsample_hourly_day() -> Result<(), Box<dyn Error>> {
    let directory = tempfile::TempDir::new()?;
    let source_path = directory.path().join("source.zarr");
    create_hourly_source(&source_path)?;
    let requested: Vec<String> = (0..24)
        .map(|hour| format!("2021-09-12T{hour:02}:00:00"))
        .collect();
    let config = SubsampleConfig::new(
        &source_path,
        directory.path().join("destination.zarr"),
        requested,
    );

    let report = extract_subsample(&config)?;
    assert_eq!(report.offsets(), (24..48).collect::<Vec<u64>>());
    assert_eq!(report.gathered(), &["temp", "time"].map(String::from));
    assert_eq!(report.copied(), &["elevation".to_string()]);

    let source_store = Arc::new(FilesystemStore::new(&source_path)?);
    let destination_store = Arc::new(FilesystemStore::new(directory.path().join("destination.zarr"))?);
    let source = Group::open(source_store.clone())?;
    let destination = Group::open(destination_store.clone())?;

    let source_temp = source.array("temp")?;
    let temp = destination.array("temp")?;
    assert_eq!(temp.shape(), &[24, 10, 10]);
    for row in 0..24 {
        assert_eq!(
            temp.retrieve_array_subset(&ArraySubset::new_with_ranges(&[row..row + 1, 0..10, 0..10]))?,
            source_temp.retrieve_array_subset(&ArraySubset::new_with_ranges(&[
                row + 24..row + 25,
                0..10,
                0..10
            ]))?,
            "row {row}"
        );
    }

    let full = ArraySubset::new_with_shape(vec![10, 10]);
    assert_eq!(
        destination.array("elevation")?.retrieve_array_subset(&full)?,
        source.array("elevation")?.retrieve_array_subset(&full)?
    );
    let prefix = StorePrefix::new("elevation/")?;
    let keys = source_store.list_prefix(&prefix)?;
    assert_eq!(destination_store.list_prefix(&prefix)?, keys);
    for key in &keys {
        assert_eq!(destination_store.get(key)?, source_store.get(key)?, "{key}");
    }
    Ok(())
}

#[test]
fn subsample_null_fill_value_zero_chunk() -> Result<(), Box<dyn Error>> {
    let store = Arc::new(MemoryStore::new());
    let mut group = Group::create(store.clone())?;
    store_array(
        &store,
        "time",
        metadata("<i8", vec![4], &[4]),
        attributes(serde_json::json!({
            "_ARRAY_DIMENSIONS": ["time"],
            "units": "hours since 2021-09-11",
        })),
        &i64_bytes(0..4),
    )?;
    store_array(
        &store,
        "landmask",
        metadata("|u1", vec![2], &[2]),
        attributes(serde_json::json!({"_ARRAY_DIMENSIONS": ["x"]})),
        &[0, 0],
    )?;
    group.consolidate_metadata()?;
    let chunk = StoreKey::new("landmask/0")?;
    assert!(store.get(&chunk)?.is_some());

    let config = SubsampleConfig::new("source", "destination", timestamps(&["2021-09-11T01:00:00"]));
    let destination = Arc::new(MemoryStore::new());
    let report = SubsamplePlan::new(store.clone(), &config)?.execute(destination.clone())?;
    assert_eq!(report.copied(), &["landmask".to_string()]);
    assert_eq!(destination.get(&chunk)?, store.get(&chunk)?);
    Ok(())
}
