use thiserror::Error;
use timeslice_metadata::{v2::FillValueMetadataV2, ArrayShape};
use timeslice_storage::StorageError;

use super::{codec::CodecCreateError, codec::CodecError, data_type::DataTypeError};
use crate::array_subset::{ArraySubset, IncompatibleDimensionalityError};

/// An array creation error.
#[derive(Clone, Debug, Error)]
pub enum ArrayCreateError {
    /// An invalid array name.
    #[error("invalid array name {_0:?}")]
    InvalidName(String),
    /// Unsupported data type.
    #[error(transparent)]
    DataTypeError(#[from] DataTypeError),
    /// Invalid fill value metadata.
    #[error("invalid fill value metadata for data type `{data_type_name}`: {fill_value_metadata:?}")]
    InvalidFillValueMetadata {
        /// The data type name.
        data_type_name: String,
        /// The fill value metadata.
        fill_value_metadata: FillValueMetadataV2,
    },
    /// Error creating codecs.
    #[error(transparent)]
    CodecsCreateError(#[from] CodecCreateError),
    /// The dimensionality of the chunk grid does not match the array shape.
    #[error("chunk grid dimensionality {_0} does not match array dimensionality {_1}")]
    InvalidChunkGridDimensionality(usize, usize),
    /// Storage error.
    #[error(transparent)]
    StorageError(#[from] StorageError),
    /// Missing metadata.
    #[error("array metadata is missing")]
    MissingMetadata,
}

/// Array errors.
#[derive(Clone, Debug, Error)]
pub enum ArrayError {
    /// A store error.
    #[error(transparent)]
    StorageError(#[from] StorageError),
    /// A codec error.
    #[error(transparent)]
    CodecError(#[from] CodecError),
    /// A data type error.
    #[error(transparent)]
    DataTypeError(#[from] DataTypeError),
    /// Invalid chunk grid indices.
    #[error("invalid chunk grid indices: {_0:?}")]
    InvalidChunkGridIndicesError(Vec<u64>),
    /// Incompatible dimensionality.
    #[error(transparent)]
    IncompatibleDimensionalityError(#[from] IncompatibleDimensionalityError),
    /// Incompatible array subset.
    #[error("array subset {_0} is not compatible with array shape {_1:?}")]
    InvalidArraySubset(ArraySubset, ArrayShape),
    /// An unexpected bytes input size.
    #[error("got bytes with size {_0:?}, expected {_1:?}")]
    InvalidBytesInputSize(usize, u64),
    /// An index beyond the length of a dimension.
    #[error("index {_0} is out of bounds of a dimension with length {_1}")]
    OutOfBoundsIndex(u64, u64),
}
