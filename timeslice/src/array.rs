//! Zarr V2 arrays.
//!
//! An [`Array`] is a named, chunked, N-dimensional array in a store.
//! Its metadata is held in `<name>/.zarray`, its attributes in `<name>/.zattrs`, and each chunk in `<name>/<chunk key>`.
//!
//! Chunks are regular: every chunk, including those at the edge of the array, is stored at the full chunk shape.
//! Chunks absent from the store are read as the fill value.

mod array_errors;
mod array_sync_readable;
mod array_sync_writable;
pub mod codec;
pub mod data_type;
mod fill_value;

use std::{num::NonZeroU64, sync::Arc};

pub use array_errors::{ArrayCreateError, ArrayError};
pub(crate) use array_sync_readable::retrieve_array_documents;
pub use codec::CodecChain;
pub use data_type::{DataType, DataTypeKind};
pub use fill_value::FillValue;
use itertools::Itertools;
pub use timeslice_metadata::{
    v2::ArrayMetadataV2, ArrayShape, AttributesV2, ChunkKeySeparator, ChunkShape,
};
use timeslice_metadata::{ARRAY_METADATA_V2_KEY, ATTRIBUTES_V2_KEY};
use timeslice_storage::{StorageError, StoreKey, StorePrefix};

use crate::array_subset::ArraySubset;

/// The attribute holding the dimension names of an array, as written by xarray.
pub const ARRAY_DIMENSIONS_ATTRIBUTE: &str = "_ARRAY_DIMENSIONS";

/// Parse the dimension names of an array with `dimensionality` dimensions from the `_ARRAY_DIMENSIONS` entry of its `attributes`.
#[must_use]
pub fn parse_dimension_names(attributes: &AttributesV2, dimensionality: usize) -> Option<Vec<String>> {
    let names: Vec<String> = attributes
        .get(ARRAY_DIMENSIONS_ATTRIBUTE)?
        .as_array()?
        .iter()
        .map(|name| name.as_str().map(str::to_string))
        .collect::<Option<_>>()?;
    (names.len() == dimensionality).then_some(names)
}

/// A Zarr V2 array.
#[derive(Debug)]
pub struct Array<TStorage: ?Sized> {
    storage: Arc<TStorage>,
    name: String,
    metadata: ArrayMetadataV2,
    attributes: AttributesV2,
    data_type: DataType,
    fill_value: FillValue,
    codecs: CodecChain,
}

impl<TStorage: ?Sized> Array<TStorage> {
    /// Create an array in `storage` named `name` with `metadata` and `attributes`.
    ///
    /// This does not write to the store, use [`store_metadata`](Array::store_metadata) to write the metadata to `storage`.
    ///
    /// # Errors
    /// Returns [`ArrayCreateError`] if:
    ///  - `name` is not a valid array name,
    ///  - the data type, fill value or compressor are not supported, or
    ///  - the dimensionality of the chunks does not match the array shape.
    pub fn new_with_metadata(
        storage: Arc<TStorage>,
        name: &str,
        metadata: ArrayMetadataV2,
        attributes: AttributesV2,
    ) -> Result<Self, ArrayCreateError> {
        if !Self::validate_name(name) {
            return Err(ArrayCreateError::InvalidName(name.to_string()));
        }
        if metadata.chunks.len() != metadata.shape.len() {
            return Err(ArrayCreateError::InvalidChunkGridDimensionality(
                metadata.chunks.len(),
                metadata.shape.len(),
            ));
        }
        let data_type = DataType::from_metadata(&metadata.dtype)?;
        let fill_value = FillValue::from_metadata_v2(&metadata.fill_value, &data_type)
            .ok_or_else(|| ArrayCreateError::InvalidFillValueMetadata {
                data_type_name: data_type.name().to_string(),
                fill_value_metadata: metadata.fill_value.clone(),
            })?;
        let codecs = CodecChain::from_metadata(&metadata, &data_type)?;
        Ok(Self {
            storage,
            name: name.to_string(),
            metadata,
            attributes,
            data_type,
            fill_value,
            codecs,
        })
    }

    fn validate_name(name: &str) -> bool {
        !name.is_empty()
            && !name.starts_with('/')
            && !name.ends_with('/')
            && !name.split('/').any(|component| component.is_empty() || component == "." || component == "..")
    }

    /// Get the underlying storage backing the array.
    #[must_use]
    pub fn storage(&self) -> Arc<TStorage> {
        self.storage.clone()
    }

    /// Get the name of the array.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the array metadata.
    #[must_use]
    pub const fn metadata(&self) -> &ArrayMetadataV2 {
        &self.metadata
    }

    /// Get the array attributes.
    #[must_use]
    pub const fn attributes(&self) -> &AttributesV2 {
        &self.attributes
    }

    /// Get the data type.
    #[must_use]
    pub const fn data_type(&self) -> &DataType {
        &self.data_type
    }

    /// Get the fill value.
    #[must_use]
    pub const fn fill_value(&self) -> &FillValue {
        &self.fill_value
    }

    /// Get the codecs.
    #[must_use]
    pub const fn codecs(&self) -> &CodecChain {
        &self.codecs
    }

    /// Get the array shape.
    #[must_use]
    pub fn shape(&self) -> &[u64] {
        &self.metadata.shape
    }

    /// Get the array dimensionality.
    #[must_use]
    pub fn dimensionality(&self) -> usize {
        self.metadata.shape.len()
    }

    /// Get the chunk shape.
    #[must_use]
    pub fn chunk_shape(&self) -> &[NonZeroU64] {
        &self.metadata.chunks
    }

    fn chunk_shape_u64(&self) -> Vec<u64> {
        self.metadata.chunks.iter().map(|c| c.get()).collect()
    }

    /// Get the dimension names from the `_ARRAY_DIMENSIONS` attribute.
    ///
    /// Returns [`None`] if the attribute is absent, is not a list of strings, or does not match the dimensionality.
    #[must_use]
    pub fn dimension_names(&self) -> Option<Vec<String>> {
        parse_dimension_names(&self.attributes, self.dimensionality())
    }

    /// Return the shape of the chunk grid, the number of chunks along each dimension.
    #[must_use]
    pub fn chunk_grid_shape(&self) -> Vec<u64> {
        std::iter::zip(&self.metadata.shape, &self.metadata.chunks)
            .map(|(&size, chunk_size)| size.div_ceil(chunk_size.get()))
            .collect()
    }

    /// Return the subset of the array covered by the chunk at `chunk_indices`.
    ///
    /// Chunks on the edge of the array extend beyond its shape.
    ///
    /// # Errors
    /// Returns [`ArrayError::InvalidChunkGridIndicesError`] if the chunk indices are not within the chunk grid.
    pub fn chunk_subset(&self, chunk_indices: &[u64]) -> Result<ArraySubset, ArrayError> {
        self.validate_chunk_indices(chunk_indices)?;
        let chunk_shape = self.chunk_shape_u64();
        let start = std::iter::zip(chunk_indices, &chunk_shape)
            .map(|(index, size)| index * size)
            .collect();
        Ok(ArraySubset::new_with_start_shape(start, chunk_shape)?)
    }

    fn validate_chunk_indices(&self, chunk_indices: &[u64]) -> Result<(), ArrayError> {
        let grid_shape = self.chunk_grid_shape();
        if chunk_indices.len() == grid_shape.len()
            && std::iter::zip(chunk_indices, &grid_shape).all(|(index, size)| index < size)
        {
            Ok(())
        } else {
            Err(ArrayError::InvalidChunkGridIndicesError(
                chunk_indices.to_vec(),
            ))
        }
    }

    /// Return the store key of the chunk at `chunk_indices`.
    ///
    /// Indices are joined by the dimension separator, for example `temp/0.1.0`.
    /// The only chunk of a zero dimensional array is `0`.
    ///
    /// # Errors
    /// Returns a [`StorageError`] if the key is not a valid store key.
    pub fn chunk_key(&self, chunk_indices: &[u64]) -> Result<StoreKey, StorageError> {
        let encoded = if chunk_indices.is_empty() {
            "0".to_string()
        } else {
            chunk_indices
                .iter()
                .join(&self.metadata.dimension_separator.to_string())
        };
        Ok(StoreKey::new(format!("{}/{encoded}", self.name))?)
    }

    fn prefix(&self) -> Result<StorePrefix, StorageError> {
        Ok(StorePrefix::new(format!("{}/", self.name))?)
    }

    fn metadata_key(&self) -> Result<StoreKey, StorageError> {
        Ok(StoreKey::new(format!("{}/{ARRAY_METADATA_V2_KEY}", self.name))?)
    }

    fn attributes_key(&self) -> Result<StoreKey, StorageError> {
        Ok(StoreKey::new(format!("{}/{ATTRIBUTES_V2_KEY}", self.name))?)
    }
}

#[cfg(test)]
mod tests {
    use timeslice_metadata::v2::{DataTypeMetadataV2, FillValueMetadataV2};
    use timeslice_storage::store::MemoryStore;

    use super::*;

    pub(crate) fn test_metadata(shape: ArrayShape, chunks: &[u64]) -> ArrayMetadataV2 {
        ArrayMetadataV2::new(
            shape,
            chunks.iter().map(|&c| NonZeroU64::new(c).unwrap()).collect(),
            DataTypeMetadataV2::from("<f4"),
            FillValueMetadataV2::NaN,
            None,
        )
    }

    #[test]
    fn array_chunk_grid() {
        let store = Arc::new(MemoryStore::new());
        let array = Array::new_with_metadata(
            store,
            "temp",
            test_metadata(vec![48, 10, 10], &[24, 4, 10]),
            AttributesV2::new(),
        )
        .unwrap();
        assert_eq!(array.chunk_grid_shape(), vec![2, 3, 1]);
        assert_eq!(array.chunk_key(&[1, 2, 0]).unwrap().as_str(), "temp/1.2.0");
        assert_eq!(
            array.chunk_subset(&[1, 2, 0]).unwrap(),
            ArraySubset::new_with_ranges(&[24..48, 8..12, 0..10])
        );
        assert!(array.chunk_subset(&[2, 0, 0]).is_err());
        assert!(array.dimension_names().is_none());
    }

    #[test]
    fn array_chunk_key_nested() {
        let store = Arc::new(MemoryStore::new());
        let metadata = test_metadata(vec![4, 4], &[2, 2])
            .with_dimension_separator(ChunkKeySeparator::Slash);
        let array =
            Array::new_with_metadata(store.clone(), "mask", metadata, AttributesV2::new()).unwrap();
        assert_eq!(array.chunk_key(&[1, 0]).unwrap().as_str(), "mask/1/0");

        let scalar = Array::new_with_metadata(
            store,
            "scalar",
            test_metadata(vec![], &[]),
            AttributesV2::new(),
        )
        .unwrap();
        assert_eq!(scalar.chunk_key(&[]).unwrap().as_str(), "scalar/0");
        assert_eq!(scalar.chunk_grid_shape(), Vec::<u64>::new());
    }

    #[test]
    fn array_dimension_names() {
        let store = Arc::new(MemoryStore::new());
        let mut attributes = AttributesV2::new();
        attributes.insert(
            ARRAY_DIMENSIONS_ATTRIBUTE.to_string(),
            serde_json::json!(["time", "y", "x"]),
        );
        let array = Array::new_with_metadata(
            store,
            "temp",
            test_metadata(vec![48, 10, 10], &[24, 10, 10]),
            attributes,
        )
        .unwrap();
        assert_eq!(
            array.dimension_names(),
            Some(vec!["time".to_string(), "y".to_string(), "x".to_string()])
        );
    }

    #[test]
    fn array_invalid() {
        let store = Arc::new(MemoryStore::new());
        for name in ["", "/temp", "temp/", "a//b", "../temp"] {
            assert!(matches!(
                Array::new_with_metadata(
                    store.clone(),
                    name,
                    test_metadata(vec![4], &[2]),
                    AttributesV2::new()
                ),
                Err(ArrayCreateError::InvalidName(_))
            ));
        }
        assert!(matches!(
            Array::new_with_metadata(
                store.clone(),
                "temp",
                test_metadata(vec![4, 4], &[2]),
                AttributesV2::new()
            ),
            Err(ArrayCreateError::InvalidChunkGridDimensionality(1, 2))
        ));
        let mut metadata = test_metadata(vec![4], &[2]);
        metadata.fill_value = FillValueMetadataV2::String("abc".to_string());
        assert!(matches!(
            Array::new_with_metadata(store, "temp", metadata, AttributesV2::new()),
            Err(ArrayCreateError::InvalidFillValueMetadata { .. })
        ));
    }
}
