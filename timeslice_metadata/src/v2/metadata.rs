use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::Configuration;

/// Zarr V2 codec metadata with an `id` and flattened `configuration`.
///
/// For example:
/// ```json
/// {
///     "id": "blosc",
///     "cname": "lz4",
///     "clevel": 5,
///     "shuffle": 1
/// }
/// ```
#[derive(Serialize, Deserialize, Clone, Eq, PartialEq, Debug)]
pub struct MetadataV2 {
    id: String,
    #[serde(flatten)]
    configuration: Configuration,
}

impl MetadataV2 {
    /// Create codec metadata from an `id` and `configuration`.
    #[must_use]
    pub fn new(id: impl Into<String>, configuration: Configuration) -> Self {
        Self {
            id: id.into(),
            configuration,
        }
    }

    /// Return the value of the `id` field.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Return the configuration, which includes all fields excluding the `id`.
    #[must_use]
    pub fn configuration(&self) -> &Configuration {
        &self.configuration
    }

    /// Try and convert the configuration to a specific serializable configuration.
    ///
    /// # Errors
    /// Returns a [`serde_json`] error if the metadata cannot be converted.
    pub fn to_typed_configuration<TConfiguration: DeserializeOwned>(
        &self,
    ) -> Result<TConfiguration, serde_json::Error> {
        self.configuration.to_typed()
    }
}
