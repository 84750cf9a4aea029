//! The `zlib` compressor.
//!
//! Applies [zlib](https://datatracker.ietf.org/doc/html/rfc1950) compression.
//!
//! ### Configuration Example - [`ZlibCodecConfiguration`]:
//! ```json
//! {
//!     "id": "zlib",
//!     "level": 1
//! }
//! ```

use std::io::{Cursor, Read};

use serde::{Deserialize, Serialize};

use super::{BytesToBytesCodecTraits, CodecCreateError, CodecError};

pub(super) const IDENTIFIER: &str = "zlib";

/// Configuration parameters for the `zlib` compressor.
#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Debug)]
pub struct ZlibCodecConfiguration {
    /// The compression level, 0-9.
    pub level: u32,
}

/// A `zlib` compressor.
#[derive(Clone, Debug)]
pub struct ZlibCodec {
    compression_level: u32,
}

impl ZlibCodec {
    /// Create a new `zlib` codec.
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

    /// Create a new `zlib` codec from configuration.
    ///
    /// # Errors
    /// Returns [`CodecCreateError`] if the configuration is not valid.
    pub fn new_with_configuration(
        configuration: &ZlibCodecConfiguration,
    ) -> Result<Self, CodecCreateError> {
        Self::new(configuration.level)
    }
}

impl BytesToBytesCodecTraits for ZlibCodec {
    fn identifier(&self) -> &'static str {
        IDENTIFIER
    }

    fn encode(&self, decoded_value: &[u8]) -> Result<Vec<u8>, CodecError> {
        let mut encoder = flate2::read::ZlibEncoder::new(
            Cursor::new(decoded_value),
            flate2::Compression::new(self.compression_level),
        );
        let mut out: Vec<u8> = Vec::new();
        encoder.read_to_end(&mut out)?;
        Ok(out)
    }

    fn decode(&self, encoded_value: &[u8], decoded_size: usize) -> Result<Vec<u8>, CodecError> {
        let mut decoder = flate2::read::ZlibDecoder::new(Cursor::new(encoded_value));
        let mut out: Vec<u8> = Vec::with_capacity(decoded_size);
        decoder.read_to_end(&mut out)?;
        Ok(out)
    }
}
