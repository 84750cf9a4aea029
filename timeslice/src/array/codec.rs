//! Zarr V2 codecs.
//!
//! A Zarr V2 chunk is the optionally compressed bytes of its elements, laid out in C or F order.
//! Compressors are [`BytesToBytesCodecTraits`] implementations selected by their numcodecs `id`:
#![cfg_attr(feature = "blosc", doc = "- `blosc`: [`BloscCodec`]")]
#![cfg_attr(feature = "gzip", doc = "- `gzip`: [`GzipCodec`]")]
#![cfg_attr(feature = "zlib", doc = "- `zlib`: [`ZlibCodec`]")]
#![cfg_attr(feature = "zstd", doc = "- `zstd`: [`ZstdCodec`]")]
//!
//! Filters are not supported.

#[cfg(feature = "blosc")]
mod blosc;
#[cfg(feature = "gzip")]
mod gzip;
#[cfg(feature = "zlib")]
mod zlib;
#[cfg(feature = "zstd")]
mod zstd;

#[cfg(feature = "blosc")]
pub use blosc::{BloscCodec, BloscCodecConfiguration, BloscCompressor, BloscShuffleMode};
#[cfg(feature = "gzip")]
pub use gzip::{GzipCodec, GzipCodecConfiguration};
#[cfg(feature = "zlib")]
pub use zlib::{ZlibCodec, ZlibCodecConfiguration};
#[cfg(feature = "zstd")]
pub use zstd::{ZstdCodec, ZstdCodecConfiguration};

use std::sync::Arc;

use serde::de::DeserializeOwned;
use thiserror::Error;
use timeslice_metadata::v2::{ArrayMetadataV2, ArrayMetadataV2Order, MetadataV2};

use super::data_type::DataType;
use crate::array_subset::{ravel_indices, ArraySubset};

/// Traits for bytes to bytes codecs.
pub trait BytesToBytesCodecTraits: std::fmt::Debug + Send + Sync {
    /// The numcodecs `id` of the codec.
    fn identifier(&self) -> &'static str;

    /// Encode chunk bytes.
    ///
    /// # Errors
    /// Returns [`CodecError`] if a codec fails.
    fn encode(&self, decoded_value: &[u8]) -> Result<Vec<u8>, CodecError>;

    /// Decode chunk bytes.
    ///
    /// `decoded_size` is the expected size of the decoded bytes.
    ///
    /// # Errors
    /// Returns [`CodecError`] if a codec fails.
    fn decode(&self, encoded_value: &[u8], decoded_size: usize) -> Result<Vec<u8>, CodecError>;
}

/// A codec error.
#[derive(Clone, Debug, Error)]
pub enum CodecError {
    /// An IO error.
    #[error(transparent)]
    IOError(#[from] Arc<std::io::Error>),
    /// An unexpected chunk decoded size.
    #[error("got chunk decoded size {_0}, expected {_1}")]
    UnexpectedChunkDecodedSize(usize, usize),
    /// Any other error.
    #[error("{_0}")]
    Other(String),
}

impl From<std::io::Error> for CodecError {
    fn from(err: std::io::Error) -> Self {
        Self::IOError(Arc::new(err))
    }
}

impl From<&str> for CodecError {
    fn from(err: &str) -> Self {
        Self::Other(err.to_string())
    }
}

impl From<String> for CodecError {
    fn from(err: String) -> Self {
        Self::Other(err)
    }
}

/// A codec creation error.
#[derive(Clone, Debug, Error)]
pub enum CodecCreateError {
    /// The compressor is not supported.
    #[error("unsupported compressor {_0}")]
    Unsupported(String),
    /// The compressor configuration is invalid.
    #[error("invalid configuration for compressor {_0}: {_1}")]
    InvalidConfiguration(String, String),
    /// Filters are not supported.
    #[error("unsupported filters {_0:?}")]
    UnsupportedFilters(Vec<String>),
}

fn configuration<T: DeserializeOwned>(metadata: &MetadataV2) -> Result<T, CodecCreateError> {
    metadata.to_typed_configuration().map_err(|err| {
        CodecCreateError::InvalidConfiguration(metadata.id().to_string(), err.to_string())
    })
}

/// Create a compressor from Zarr V2 compressor metadata.
///
/// `typesize` is the size of an element of the array, used by shuffling compressors.
///
/// # Errors
/// Returns [`CodecCreateError`] if the compressor is unsupported or its configuration is invalid.
#[cfg_attr(not(feature = "blosc"), allow(unused_variables))]
pub fn create_compressor(
    metadata: &MetadataV2,
    typesize: usize,
) -> Result<Arc<dyn BytesToBytesCodecTraits>, CodecCreateError> {
    match metadata.id() {
        #[cfg(feature = "blosc")]
        blosc::IDENTIFIER => Ok(Arc::new(BloscCodec::new_with_configuration(
            &configuration(metadata)?,
            typesize,
        )?)),
        #[cfg(feature = "gzip")]
        gzip::IDENTIFIER => Ok(Arc::new(GzipCodec::new_with_configuration(
            &configuration(metadata)?,
        )?)),
        #[cfg(feature = "zlib")]
        zlib::IDENTIFIER => Ok(Arc::new(ZlibCodec::new_with_configuration(
            &configuration(metadata)?,
        )?)),
        #[cfg(feature = "zstd")]
        zstd::IDENTIFIER => Ok(Arc::new(ZstdCodec::new_with_configuration(
            &configuration(metadata)?,
        )?)),
        id => Err(CodecCreateError::Unsupported(id.to_string())),
    }
}

/// The codecs of a Zarr V2 array: an optional compressor and the memory order of chunk elements.
///
/// Decoded chunks are always in C order.
#[derive(Clone, Debug)]
pub struct CodecChain {
    compressor: Option<Arc<dyn BytesToBytesCodecTraits>>,
    order: ArrayMetadataV2Order,
}

impl CodecChain {
    /// Create a new codec chain.
    #[must_use]
    pub fn new(
        compressor: Option<Arc<dyn BytesToBytesCodecTraits>>,
        order: ArrayMetadataV2Order,
    ) -> Self {
        Self { compressor, order }
    }

    /// Create the codec chain of an array from its metadata.
    ///
    /// # Errors
    /// Returns [`CodecCreateError`] if the array has filters, or the compressor is not supported.
    pub fn from_metadata(
        metadata: &ArrayMetadataV2,
        data_type: &DataType,
    ) -> Result<Self, CodecCreateError> {
        if let Some(filters) = metadata.filters.as_ref().filter(|filters| !filters.is_empty()) {
            return Err(CodecCreateError::UnsupportedFilters(
                filters.iter().map(|filter| filter.id().to_string()).collect(),
            ));
        }
        let compressor = metadata
            .compressor
            .as_ref()
            .map(|compressor| create_compressor(compressor, data_type.size()))
            .transpose()?;
        Ok(Self::new(compressor, metadata.order))
    }

    /// The compressor, if any.
    #[must_use]
    pub fn compressor(&self) -> Option<&Arc<dyn BytesToBytesCodecTraits>> {
        self.compressor.as_ref()
    }

    /// The memory order of chunk elements.
    #[must_use]
    pub const fn order(&self) -> ArrayMetadataV2Order {
        self.order
    }

    /// Encode the C order bytes of a chunk with `chunk_shape`.
    ///
    /// # Errors
    /// Returns [`CodecError`] if the compressor fails.
    pub fn encode(
        &self,
        decoded_value: Vec<u8>,
        chunk_shape: &[u64],
        element_size: usize,
    ) -> Result<Vec<u8>, CodecError> {
        let bytes = match self.order {
            ArrayMetadataV2Order::C => decoded_value,
            ArrayMetadataV2Order::F => transpose(&decoded_value, chunk_shape, element_size, true),
        };
        match &self.compressor {
            Some(compressor) => compressor.encode(&bytes),
            None => Ok(bytes),
        }
    }

    /// Decode the bytes of a chunk with `chunk_shape` into C order.
    ///
    /// # Errors
    /// Returns [`CodecError`] if the compressor fails or the decoded size is not that of the chunk.
    #[allow(clippy::cast_possible_truncation)]
    pub fn decode(
        &self,
        encoded_value: &[u8],
        chunk_shape: &[u64],
        element_size: usize,
    ) -> Result<Vec<u8>, CodecError> {
        let decoded_size = chunk_shape.iter().product::<u64>() as usize * element_size;
        let bytes = match &self.compressor {
            Some(compressor) => compressor.decode(encoded_value, decoded_size)?,
            None => encoded_value.to_vec(),
        };
        if bytes.len() != decoded_size {
            return Err(CodecError::UnexpectedChunkDecodedSize(
                bytes.len(),
                decoded_size,
            ));
        }
        Ok(match self.order {
            ArrayMetadataV2Order::C => bytes,
            ArrayMetadataV2Order::F => transpose(&bytes, chunk_shape, element_size, false),
        })
    }
}

/// Transpose elements between C and F order.
#[allow(clippy::cast_possible_truncation)]
fn transpose(bytes: &[u8], shape: &[u64], element_size: usize, to_fortran: bool) -> Vec<u8> {
    if shape.len() < 2 {
        return bytes.to_vec();
    }
    let reversed_shape: Vec<u64> = shape.iter().rev().copied().collect();
    let mut reversed_indices = vec![0; shape.len()];
    let mut out = vec![0; bytes.len()];
    for (c_index, indices) in ArraySubset::new_with_shape(shape.to_vec())
        .indices()
        .enumerate()
    {
        for (reversed, index) in reversed_indices.iter_mut().zip(indices.iter().rev()) {
            *reversed = *index;
        }
        let c_offset = c_index * element_size;
        let f_offset = ravel_indices(&reversed_indices, &reversed_shape) as usize * element_size;
        let (src, dst) = if to_fortran {
            (c_offset, f_offset)
        } else {
            (f_offset, c_offset)
        };
        out[dst..dst + element_size].copy_from_slice(&bytes[src..src + element_size]);
    }
    out
}
