//! The `zstd` compressor.
//!
//! Applies [Zstandard](https://tools.ietf.org/html/rfc8878) compression.
//!
//! ### Configuration Example - [`ZstdCodecConfiguration`]:
//! ```json
//! {
//!     "id": "zstd",
//!     "level": 1,
//!     "checksum": false
//! }
//! ```

use std::io::Write;

use serde::{Deserialize, Serialize};

use super::{BytesToBytesCodecTraits, CodecCreateError, CodecError};

pub(super) const IDENTIFIER: &str = "zstd";

/// Configuration parameters for the `zstd` compressor.
#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Debug)]
pub struct ZstdCodecConfiguration {
    /// The compression level.
    #[serde(default)]
    pub level: i32,
    /// Whether to store a checksum of the uncompressed content.
    #[serde(default)]
    pub checksum: bool,
}

/// A `zstd` compressor.
#[derive(Clone, Debug)]
pub struct ZstdCodec {
    compression: i32,
    checksum: bool,
}

impl ZstdCodec {
    /// Create a new `zstd` codec.
    ///
    /// # Errors
    /// Returns [`CodecCreateError`] if `compression` is not a supported compression level.
    pub fn new(compression: i32, checksum: bool) -> Result<Self, CodecCreateError> {
        if zstd::compression_level_range().contains(&compression) {
            Ok(Self {
                compression,
                checksum,
            })
        } else {
            Err(CodecCreateError::InvalidConfiguration(
                IDENTIFIER.to_string(),
                format!("compression level {compression} is not supported"),
            ))
        }
    }

    /// Create a new `zstd` codec from configuration.
    ///
    /// # Errors
    /// Returns [`CodecCreateError`] if the configuration is not valid.
    pub fn new_with_configuration(
        configuration: &ZstdCodecConfiguration,
    ) -> Result<Self, CodecCreateError> {
        Self::new(configuration.level, configuration.checksum)
    }
}

impl BytesToBytesCodecTraits for ZstdCodec {
    fn identifier(&self) -> &'static str {
        IDENTIFIER
    }

    fn encode(&self, decoded_value: &[u8]) -> Result<Vec<u8>, CodecError> {
        let mut encoder = zstd::Encoder::new(Vec::new(), self.compression)?;
        encoder.include_checksum(self.checksum)?;
        encoder.write_all(decoded_value)?;
        Ok(encoder.finish()?)
    }

    fn decode(&self, encoded_value: &[u8], _decoded_size: usize) -> Result<Vec<u8>, CodecError> {
        zstd::decode_all(encoded_value).map_err(CodecError::from)
    }
}
