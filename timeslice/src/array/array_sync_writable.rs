use timeslice_metadata::v2::FillValueMetadataV2;
use timeslice_storage::{Bytes, ReadableStorageTraits, StorageError, WritableStorageTraits};

use super::{Array, ArrayError};
use crate::array_subset::{copy_region, ArraySubset};

impl<TStorage: ?Sized + WritableStorageTraits + 'static> Array<TStorage> {
    /// Store the array metadata.
    ///
    /// Writes `<name>/.zarray`, and `<name>/.zattrs` if the array has attributes.
    ///
    /// # Errors
    /// Returns [`StorageError`] if there is an underlying store error.
    pub fn store_metadata(&self) -> Result<(), StorageError> {
        if !self.attributes.is_empty() {
            // Store .zattrs
            let key = self.attributes_key()?;
            let json = serde_json::to_vec_pretty(&self.attributes)
                .map_err(|err| StorageError::InvalidMetadata(key.clone(), err.to_string()))?;
            self.storage.set(&key, json.into())?;
        }

        // Store .zarray
        let key = self.metadata_key()?;
        let json = serde_json::to_vec_pretty(&self.metadata)
            .map_err(|err| StorageError::InvalidMetadata(key.clone(), err.to_string()))?;
        self.storage.set(&key, json.into())
    }

    /// Erase the metadata and all chunks of the array.
    ///
    /// # Errors
    /// Returns [`StorageError`] if there is an underlying store error.
    pub fn erase(&self) -> Result<(), StorageError> {
        self.storage.erase_prefix(&self.prefix()?)
    }

    /// Encode `chunk_bytes` and store at `chunk_indices`.
    ///
    /// A chunk composed entirely of the fill value is erased rather than written.
    /// A `null` fill value leaves missing chunks undefined, so every chunk of such an array is written.
    ///
    /// # Errors
    /// Returns an [`ArrayError`] if
    ///  - `chunk_indices` are invalid,
    ///  - the length of `chunk_bytes` is not that of a chunk,
    ///  - there is a codec encoding error, or
    ///  - an underlying store error.
    pub fn store_chunk(&self, chunk_indices: &[u64], chunk_bytes: Vec<u8>) -> Result<(), ArrayError> {
        self.validate_chunk_indices(chunk_indices)?;
        let chunk_shape = self.chunk_shape_u64();
        let element_size = self.data_type.size();
        let expected_size = chunk_shape.iter().product::<u64>() * element_size as u64;
        if chunk_bytes.len() as u64 != expected_size {
            return Err(ArrayError::InvalidBytesInputSize(
                chunk_bytes.len(),
                expected_size,
            ));
        }

        let key = self.chunk_key(chunk_indices)?;
        let is_fill_value = !matches!(self.metadata.fill_value, FillValueMetadataV2::Null)
            && chunk_bytes
                .chunks_exact(element_size)
                .all(|element| element == self.fill_value.as_bytes());
        if is_fill_value {
            self.storage.erase(&key)?;
        } else {
            let encoded = self.codecs.encode(chunk_bytes, &chunk_shape, element_size)?;
            self.storage.set(&key, Bytes::from(encoded))?;
        }
        Ok(())
    }
}

impl<TStorage: ?Sized + ReadableStorageTraits + WritableStorageTraits + 'static> Array<TStorage> {
    /// Encode `subset_bytes` and store in `array_subset`.
    ///
    /// Chunks only partially covered by `array_subset` are read, updated and rewritten.
    ///
    /// # Errors
    /// Returns an [`ArrayError`] if
    ///  - `array_subset` is out of bounds of the array,
    ///  - the length of `subset_bytes` does not match the subset,
    ///  - there is a codec encoding or decoding error, or
    ///  - an underlying store error.
    #[allow(clippy::cast_possible_truncation)]
    pub fn store_array_subset(
        &self,
        array_subset: &ArraySubset,
        subset_bytes: &[u8],
    ) -> Result<(), ArrayError> {
        if !array_subset.inbounds_shape(self.shape()) {
            return Err(ArrayError::InvalidArraySubset(
                array_subset.clone(),
                self.shape().to_vec(),
            ));
        }
        let element_size = self.data_type.size();
        let expected_size = array_subset.num_elements() * element_size as u64;
        if subset_bytes.len() as u64 != expected_size {
            return Err(ArrayError::InvalidBytesInputSize(
                subset_bytes.len(),
                expected_size,
            ));
        }

        let array_bounds = ArraySubset::new_with_shape(self.shape().to_vec());
        let chunk_shape = self.chunk_shape_u64();
        for chunk_indices in array_subset.chunks(self.chunk_shape())? {
            let chunk_subset = self.chunk_subset(&chunk_indices)?;
            let overlap = array_subset.overlap(&chunk_subset)?;
            let mut chunk_bytes = if overlap == chunk_subset.overlap(&array_bounds)? {
                // the subset covers every element of the chunk within the array
                let num_elements = chunk_subset.num_elements() as usize;
                self.fill_value.as_bytes().repeat(num_elements)
            } else {
                self.retrieve_chunk(&chunk_indices)?
            };
            copy_region(
                subset_bytes,
                array_subset.shape(),
                &overlap.relative_to(array_subset.start())?,
                &mut chunk_bytes,
                &chunk_shape,
                overlap.relative_to(chunk_subset.start())?.start(),
                element_size,
            );
            self.store_chunk(&chunk_indices, chunk_bytes)?;
        }
        Ok(())
    }
}
