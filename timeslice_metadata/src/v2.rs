//! Zarr V2 metadata.

mod array;
mod consolidated;
mod group;
mod metadata;

pub use array::{ArrayMetadataV2, ArrayMetadataV2Order, DataTypeMetadataV2, FillValueMetadataV2};
pub use consolidated::ConsolidatedMetadataV2;
pub use group::GroupMetadataV2;
pub use metadata::MetadataV2;
