use derive_more::Display;
use serde::{Deserialize, Serialize};

use crate::{
    v2::{ArrayMetadataV2, GroupMetadataV2},
    AttributesV2, ARRAY_METADATA_V2_KEY, ATTRIBUTES_V2_KEY, GROUP_METADATA_V2_KEY,
};

/// Zarr V2 consolidated metadata, the content of a `.zmetadata` document.
///
/// Maps the key of every metadata document in a hierarchy to its content:
/// ```json
/// {
///     "metadata": {
///         ".zgroup": {"zarr_format": 2},
///         "temp/.zarray": {"shape": [24, 10, 10], "...": "..."},
///         "temp/.zattrs": {"units": "K"}
///     },
///     "zarr_consolidated_format": 1
/// }
/// ```
#[derive(Serialize, Deserialize, Clone, PartialEq, Eq, Debug, Display)]
#[display("{}", serde_json::to_string(self).unwrap_or_default())]
pub struct ConsolidatedMetadataV2 {
    /// Metadata documents keyed by their store key.
    pub metadata: serde_json::Map<String, serde_json::Value>,
    /// The consolidated metadata format version. Must be `1`.
    pub zarr_consolidated_format: monostate::MustBe!(1u64),
}

impl Default for ConsolidatedMetadataV2 {
    fn default() -> Self {
        Self::new()
    }
}

impl ConsolidatedMetadataV2 {
    /// Create empty consolidated metadata.
    #[must_use]
    pub fn new() -> Self {
        Self {
            metadata: serde_json::Map::new(),
            zarr_consolidated_format: monostate::MustBe!(1u64),
        }
    }

    /// Add the document stored at `key`.
    pub fn insert(&mut self, key: impl Into<String>, document: serde_json::Value) {
        self.metadata.insert(key.into(), document);
    }

    /// Returns the root group metadata, if present.
    ///
    /// # Errors
    /// Returns a [`serde_json::Error`] if the document is not valid group metadata.
    pub fn group_metadata(&self) -> Result<Option<GroupMetadataV2>, serde_json::Error> {
        self.document(GROUP_METADATA_V2_KEY)
    }

    /// Returns the metadata of the array at `path`, if present.
    ///
    /// # Errors
    /// Returns a [`serde_json::Error`] if the document is not valid array metadata.
    pub fn array_metadata(&self, path: &str) -> Result<Option<ArrayMetadataV2>, serde_json::Error> {
        self.document(&format!("{path}/{ARRAY_METADATA_V2_KEY}"))
    }

    /// Returns the attributes of the node at `path`, or of the root if `path` is empty.
    ///
    /// # Errors
    /// Returns a [`serde_json::Error`] if the document is not a JSON object.
    pub fn attributes(&self, path: &str) -> Result<Option<AttributesV2>, serde_json::Error> {
        if path.is_empty() {
            self.document(ATTRIBUTES_V2_KEY)
        } else {
            self.document(&format!("{path}/{ATTRIBUTES_V2_KEY}"))
        }
    }

    /// Returns the names of the arrays which are direct children of the root, in key order.
    #[must_use]
    pub fn child_array_names(&self) -> Vec<String> {
        self.metadata
            .keys()
            .filter_map(|key| key.strip_suffix(ARRAY_METADATA_V2_KEY))
            .filter_map(|parent| parent.strip_suffix('/'))
            .filter(|name| !name.is_empty() && !name.contains('/'))
            .map(str::to_string)
            .collect()
    }

    fn document<T: serde::de::DeserializeOwned>(
        &self,
        key: &str,
    ) -> Result<Option<T>, serde_json::Error> {
        self.metadata
            .get(key)
            .map(|value| serde_json::from_value(value.clone()))
            .transpose()
    }
}
