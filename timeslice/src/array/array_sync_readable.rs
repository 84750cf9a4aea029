use std::sync::Arc;

use timeslice_metadata::v2::ArrayMetadataV2;
use timeslice_storage::{MaybeBytes, ReadableStorageTraits, StorageError, StoreKey};

use super::{Array, ArrayCreateError, ArrayError, AttributesV2};
use crate::array_subset::{copy_region, ArraySubset};

fn key_for(name: &str, document: &str) -> Result<StoreKey, StorageError> {
    Ok(StoreKey::new(format!("{name}/{document}"))?)
}

/// Read the metadata of the array `name` from `<name>/.zarray` and its attributes from `<name>/.zattrs` if present.
///
/// The documents are parsed but their data type and codecs are not checked for support.
///
/// # Errors
/// Returns [`ArrayCreateError`] if `name` is invalid, the metadata is missing, or there is a storage error or any document is invalid.
pub(crate) fn retrieve_array_documents<TStorage: ?Sized + ReadableStorageTraits>(
    storage: &TStorage,
    name: &str,
) -> Result<(ArrayMetadataV2, AttributesV2), ArrayCreateError> {
    if !Array::<TStorage>::validate_name(name) {
        return Err(ArrayCreateError::InvalidName(name.to_string()));
    }
    let key = key_for(name, timeslice_metadata::ARRAY_METADATA_V2_KEY)?;
    let Some(metadata) = storage.get(&key)? else {
        return Err(ArrayCreateError::MissingMetadata);
    };
    let metadata: ArrayMetadataV2 = serde_json::from_slice(&metadata)
        .map_err(|err| StorageError::InvalidMetadata(key, err.to_string()))?;

    let attributes_key = key_for(name, timeslice_metadata::ATTRIBUTES_V2_KEY)?;
    let attributes: AttributesV2 = match storage.get(&attributes_key)? {
        Some(attributes) => serde_json::from_slice(&attributes)
            .map_err(|err| StorageError::InvalidMetadata(attributes_key, err.to_string()))?,
        None => AttributesV2::new(),
    };
    Ok((metadata, attributes))
}

impl<TStorage: ?Sized + ReadableStorageTraits + 'static> Array<TStorage> {
    /// Open an existing array in `storage` named `name`.
    ///
    /// The metadata is read from `<name>/.zarray` and the attributes from `<name>/.zattrs` if present.
    ///
    /// # Errors
    /// Returns [`ArrayCreateError`] if there is a storage error or any metadata is invalid.
    pub fn open(storage: Arc<TStorage>, name: &str) -> Result<Self, ArrayCreateError> {
        let (metadata, attributes) = retrieve_array_documents(&*storage, name)?;
        Self::new_with_metadata(storage, name, metadata, attributes)
    }

    /// Read the encoded bytes of the chunk at `chunk_indices`.
    ///
    /// Returns [`None`] if the chunk is not stored.
    ///
    /// # Errors
    /// Returns an [`ArrayError`] if `chunk_indices` are invalid or there is an underlying store error.
    pub fn retrieve_encoded_chunk(&self, chunk_indices: &[u64]) -> Result<MaybeBytes, ArrayError> {
        self.validate_chunk_indices(chunk_indices)?;
        Ok(self.storage.get(&self.chunk_key(chunk_indices)?)?)
    }

    /// Read and decode the chunk at `chunk_indices` into its bytes if it exists.
    ///
    /// # Errors
    /// Returns an [`ArrayError`] if
    ///  - `chunk_indices` are invalid,
    ///  - there is a codec decoding error, or
    ///  - an underlying store error.
    pub fn retrieve_chunk_if_exists(
        &self,
        chunk_indices: &[u64],
    ) -> Result<Option<Vec<u8>>, ArrayError> {
        let Some(encoded) = self.retrieve_encoded_chunk(chunk_indices)? else {
            return Ok(None);
        };
        let chunk_shape = self.chunk_shape_u64();
        let decoded = self
            .codecs
            .decode(&encoded, &chunk_shape, self.data_type.size())?;
        Ok(Some(decoded))
    }

    /// Read and decode the chunk at `chunk_indices` into its bytes, or the fill value if it does not exist.
    ///
    /// # Errors
    /// Returns an [`ArrayError`] if
    ///  - `chunk_indices` are invalid,
    ///  - there is a codec decoding error, or
    ///  - an underlying store error.
    #[allow(clippy::cast_possible_truncation)]
    pub fn retrieve_chunk(&self, chunk_indices: &[u64]) -> Result<Vec<u8>, ArrayError> {
        if let Some(chunk) = self.retrieve_chunk_if_exists(chunk_indices)? {
            Ok(chunk)
        } else {
            let num_elements = self.chunk_shape_u64().iter().product::<u64>() as usize;
            Ok(self.fill_value.as_bytes().repeat(num_elements))
        }
    }

    /// Read and decode the `array_subset` of the array into its bytes in C order.
    ///
    /// # Errors
    /// Returns an [`ArrayError`] if
    ///  - the `array_subset` is out of bounds of the array,
    ///  - there is a codec decoding error, or
    ///  - an underlying store error.
    #[allow(clippy::cast_possible_truncation)]
    pub fn retrieve_array_subset(&self, array_subset: &ArraySubset) -> Result<Vec<u8>, ArrayError> {
        if !array_subset.inbounds_shape(self.shape()) {
            return Err(ArrayError::InvalidArraySubset(
                array_subset.clone(),
                self.shape().to_vec(),
            ));
        }
        let element_size = self.data_type.size();
        let mut bytes = vec![0; array_subset.num_elements() as usize * element_size];
        let chunk_shape = self.chunk_shape_u64();
        for chunk_indices in array_subset.chunks(self.chunk_shape())? {
            let chunk_subset = self.chunk_subset(&chunk_indices)?;
            let overlap = array_subset.overlap(&chunk_subset)?;
            let chunk_bytes = self.retrieve_chunk(&chunk_indices)?;
            copy_region(
                &chunk_bytes,
                &chunk_shape,
                &overlap.relative_to(chunk_subset.start())?,
                &mut bytes,
                array_subset.shape(),
                overlap.relative_to(array_subset.start())?.start(),
                element_size,
            );
        }
        Ok(bytes)
    }

    /// Read the entire array and convert its elements to [`f64`].
    ///
    /// # Errors
    /// Returns an [`ArrayError`] if the data type is not numeric or on a [`retrieve_array_subset`](Array::retrieve_array_subset) error.
    pub fn retrieve_f64(&self) -> Result<Vec<f64>, ArrayError> {
        let bytes = self.retrieve_array_subset(&ArraySubset::new_with_shape(self.shape().to_vec()))?;
        Ok(self.data_type.to_f64_vec(&bytes)?)
    }

    /// Read the entire array and test whether each element is nonzero.
    ///
    /// # Errors
    /// Returns an [`ArrayError`] on a [`retrieve_array_subset`](Array::retrieve_array_subset) error.
    pub fn retrieve_nonzero(&self) -> Result<Vec<bool>, ArrayError> {
        let bytes = self.retrieve_array_subset(&ArraySubset::new_with_shape(self.shape().to_vec()))?;
        Ok(self.data_type.to_nonzero_vec(&bytes)?)
    }
}
