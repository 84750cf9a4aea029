use derive_more::Display;
use serde::{Deserialize, Serialize};

/// Zarr V2 group metadata, the content of a `.zgroup` document.
///
/// Group attributes are stored separately in `.zattrs`.
#[derive(Serialize, Deserialize, Clone, PartialEq, Eq, Debug, Display)]
#[display("{}", serde_json::to_string(self).unwrap_or_default())]
pub struct GroupMetadataV2 {
    /// The Zarr format version of the group. Must be `2`.
    pub zarr_format: monostate::MustBe!(2u64),
}

impl Default for GroupMetadataV2 {
    fn default() -> Self {
        Self::new()
    }
}

impl GroupMetadataV2 {
    /// Create Zarr V2 group metadata.
    #[must_use]
    pub fn new() -> Self {
        Self {
            zarr_format: monostate::MustBe!(2u64),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_metadata_v2() {
        let group: GroupMetadataV2 = serde_json::from_str(r#"{"zarr_format":2}"#).unwrap();
        assert_eq!(group, GroupMetadataV2::new());
        assert_eq!(group.to_string(), r#"{"zarr_format":2}"#);
        assert!(serde_json::from_str::<GroupMetadataV2>(r#"{"zarr_format":3}"#).is_err());
    }
}
