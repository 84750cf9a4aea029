//! Subsample configuration.

use std::{
    collections::{BTreeMap, BTreeSet},
    num::NonZeroU64,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

fn time_coordinate_default() -> String {
    "time".to_string()
}

/// The configuration of a subsample extraction.
///
/// Can be deserialized from JSON, for example:
/// ```json
/// {
///     "source_location": "cwa.zarr",
///     "destination_location": "subset.zarr",
///     "requested_timestamps": ["2021-09-12T00:00:00", "2021-09-12T06:00:00"],
///     "excluded_arrays": ["XTIME"],
///     "validity_masks": ["era5_valid", "cwb_valid"],
///     "chunk_overrides": {"temp": [1, 10, 10]}
/// }
/// ```
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct SubsampleConfig {
    /// The location of the source hierarchy.
    pub source_location: PathBuf,
    /// The location of the destination hierarchy. Anything already there is replaced.
    pub destination_location: PathBuf,
    /// The requested timestamps, `YYYY-MM-DDTHH:MM:SS`, in output order.
    pub requested_timestamps: Vec<String>,
    /// The name of the time coordinate array.
    #[serde(default = "time_coordinate_default")]
    pub time_coordinate: String,
    /// Arrays which are not copied.
    #[serde(default)]
    pub excluded_arrays: BTreeSet<String>,
    /// Arrays of the destination which must mark every gathered time step as valid.
    #[serde(default)]
    pub validity_masks: Vec<String>,
    /// Chunk shapes of destination arrays which differ from the source.
    #[serde(default)]
    pub chunk_overrides: BTreeMap<String, Vec<NonZeroU64>>,
}

impl SubsampleConfig {
    /// Create a new configuration with the default time coordinate and no exclusions, masks or chunk overrides.
    #[must_use]
    pub fn new(
        source_location: impl AsRef<Path>,
        destination_location: impl AsRef<Path>,
        requested_timestamps: Vec<String>,
    ) -> Self {
        Self {
            source_location: source_location.as_ref().to_path_buf(),
            destination_location: destination_location.as_ref().to_path_buf(),
            requested_timestamps,
            time_coordinate: time_coordinate_default(),
            excluded_arrays: BTreeSet::new(),
            validity_masks: Vec::new(),
            chunk_overrides: BTreeMap::new(),
        }
    }

    /// Set the name of the time coordinate array.
    #[must_use]
    pub fn with_time_coordinate(mut self, time_coordinate: impl Into<String>) -> Self {
        self.time_coordinate = time_coordinate.into();
        self
    }

    /// Set the arrays which are not copied.
    #[must_use]
    pub fn with_excluded_arrays<I: IntoIterator<Item = S>, S: Into<String>>(
        mut self,
        excluded_arrays: I,
    ) -> Self {
        self.excluded_arrays = excluded_arrays.into_iter().map(Into::into).collect();
        self
    }

    /// Set the validity masks.
    #[must_use]
    pub fn with_validity_masks<I: IntoIterator<Item = S>, S: Into<String>>(
        mut self,
        validity_masks: I,
    ) -> Self {
        self.validity_masks = validity_masks.into_iter().map(Into::into).collect();
        self
    }

    /// Override the chunk shape of the destination array `name`.
    #[must_use]
    pub fn with_chunk_override(mut self, name: impl Into<String>, chunk_shape: Vec<NonZeroU64>) -> Self {
        self.chunk_overrides.insert(name.into(), chunk_shape);
        self
    }

    /// Parse a configuration from JSON.
    ///
    /// # Errors
    /// Returns a [`serde_json::Error`] if `json` is not a valid configuration.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
