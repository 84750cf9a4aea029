//! The `gzip` compressor.
//!
//! Applies [gzip](https://datatracker.ietf.org/doc/html/rfc1952) compression.
//!
//! ### Configuration Example - [`GzipCodecConfiguration`]:
//! ```json
//! {
//!     "id": "gzip",
//!     "level": 1
//! }
//! ```

use std::io::{Cursor, Read};

use flate2::bufread::{GzDecoder, GzEncoder};
use serde::{Deserialize, Serialize};

use super::{BytesToBytesCodecTraits, CodecCreateError, CodecError};

pub(super) const IDENTIFIER: &str = "gzip";

/// Configuration parameters for the `gzip` compressor.
#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Debug)]
pub struct GzipCodecConfiguration {
    /// The compression level, 0-9.
    pub level: u32,
}

/// A `gzip` compressor.
#[derive(Clone, Debug)]
pub struct GzipCodec {
    compression_level: u32,
}

impl GzipCodec {
    /// Create a new `gzip` codec.
    ///
    /// # Errors
    /// Returns [`CodecCreateError`] if `compression_level` is not in 0-9.
    pub fn new(compression_level: u32) -> Result<Self, CodecCreateError> {
        if compression_level <= 9 {
            Ok(Self { compression_level })
        } else {
            Err(CodecCreateError::InvalidConfiguration(
                IDENTIFIER.to_string(),
                format!("compression level {compression_level} is not in 0-9"),
            ))
        }
    }

    /// Create a new `gzip` codec from configuration.
    ///
    /// # Errors
    /// Returns [`CodecCreateError`] if the configuration is not valid.
    pub fn new_with_configuration(
        configuration: &GzipCodecConfiguration,
    ) -> Result<Self, CodecCreateError> {
        Self::new(configuration.level)
    }
}

impl BytesToBytesCodecTraits for GzipCodec {
    fn identifier(&self) -> &'static str {
        IDENTIFIER
    }

    fn encode(&self, decoded_value: &[u8]) -> Result<Vec<u8>, CodecError> {
        let mut encoder = GzEncoder::new(
            Cursor::new(decoded_value),
            flate2::Compression::new(self.compression_level),
        );
        let mut out: Vec<u8> = Vec::new();
        encoder.read_to_end(&mut out)?;
        Ok(out)
    }

    fn decode(&self, encoded_value: &[u8], decoded_size: usize) -> Result<Vec<u8>, CodecError> {
        let mut decoder = GzDecoder::new(Cursor::new(encoded_value));
        let mut out: Vec<u8> = Vec::with_capacity(decoded_size);
        decoder.read_to_end(&mut out)?;
        Ok(out)
    }
}
