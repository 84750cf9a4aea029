//! [Zarr](https://zarr-specs.readthedocs.io/) V2 metadata support for the [`timeslice`](../timeslice/index.html) crate.
//!
//! Covers the documents of a Zarr V2 directory hierarchy:
//! - `.zarray`: [`v2::ArrayMetadataV2`],
//! - `.zgroup`: [`v2::GroupMetadataV2`],
//! - `.zattrs`: [`AttributesV2`], and
//! - `.zmetadata`: [`v2::ConsolidatedMetadataV2`].
//!
//! ## Licence
//! `timeslice_metadata` is licensed under either of
//! - the Apache License, Version 2.0 <http://www.apache.org/licenses/LICENSE-2.0> or
//! - the MIT license <http://opensource.org/licenses/MIT>, at your option.

use std::num::NonZeroU64;

use derive_more::Display;
use serde::{Deserialize, Serialize};

pub mod v2;

mod configuration;
pub use configuration::Configuration;

/// The key of Zarr V2 array metadata.
pub const ARRAY_METADATA_V2_KEY: &str = ".zarray";

/// The key of Zarr V2 group metadata.
pub const GROUP_METADATA_V2_KEY: &str = ".zgroup";

/// The key of Zarr V2 user attributes.
pub const ATTRIBUTES_V2_KEY: &str = ".zattrs";

/// The key of Zarr V2 consolidated metadata.
pub const CONSOLIDATED_METADATA_V2_KEY: &str = ".zmetadata";

/// An array shape. Dimensions may be zero.
pub type ArrayShape = Vec<u64>;

/// A chunk shape. Dimensions must be non-zero.
pub type ChunkShape = Vec<NonZeroU64>;

/// User attributes, an ordered JSON object.
pub type AttributesV2 = serde_json::Map<String, serde_json::Value>;

/// The separator placed between the indices of a chunk key.
#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, Debug, Display)]
pub enum ChunkKeySeparator {
    /// The slash '/' character.
    #[serde(rename = "/")]
    #[display("/")]
    Slash,
    /// The dot '.' character.
    #[serde(rename = ".")]
    #[display(".")]
    Dot,
}

/// The endianness of each element in an array, either `big` or `little`.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Display)]
pub enum Endianness {
    /// Little endian.
    #[display("little")]
    Little,
    /// Big endian.
    #[display("big")]
    Big,
}

impl Endianness {
    /// The endianness of the target platform.
    #[must_use]
    pub const fn native() -> Self {
        if cfg!(target_endian = "big") {
            Self::Big
        } else {
            Self::Little
        }
    }
}
