//! The `blosc` compressor.
//!
//! Applies [blosc](https://github.com/Blosc/c-blosc) compression.
//!
//! ### Configuration Example - [`BloscCodecConfiguration`]:
//! ```json
//! {
//!     "id": "blosc",
//!     "cname": "lz4",
//!     "clevel": 5,
//!     "shuffle": 1,
//!     "blocksize": 0
//! }
//! ```
//!
//! Blosc is self describing, so the element size is only used for shuffling when encoding.

use std::ffi::{c_int, c_void, CStr};

use blosc_src::{
    blosc_cbuffer_validate, blosc_compress_ctx, blosc_decompress_ctx, blosc_get_complib_info,
    BLOSC_MAX_OVERHEAD,
};
use derive_more::Display;
use serde::{Deserialize, Serialize};

use super::{BytesToBytesCodecTraits, CodecCreateError, CodecError};

pub(super) const IDENTIFIER: &str = "blosc";

/// The blosc compressor.
#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Debug, Display)]
#[serde(rename_all = "lowercase")]
pub enum BloscCompressor {
    /// [BloscLZ](https://github.com/Blosc/c-blosc/blob/master/blosc/blosclz.h).
    #[serde(rename = "blosclz")]
    #[display("blosclz")]
    BloscLZ,
    /// [LZ4](http://fastcompression.blogspot.com/p/lz4.html).
    #[display("lz4")]
    LZ4,
    /// [LZ4HC](http://fastcompression.blogspot.com/p/lz4.html).
    #[display("lz4hc")]
    LZ4HC,
    /// [Snappy](https://code.google.com/p/snappy).
    #[display("snappy")]
    Snappy,
    /// [Zlib](http://www.zlib.net/zlib.html).
    #[display("zlib")]
    Zlib,
    /// [Zstandard](http://www.zstd.net).
    #[display("zstd")]
    Zstd,
}

impl BloscCompressor {
    const fn as_cstr(self) -> &'static CStr {
        match self {
            Self::BloscLZ => c"blosclz",
            Self::LZ4 => c"lz4",
            Self::LZ4HC => c"lz4hc",
            Self::Snappy => c"snappy",
            Self::Zlib => c"zlib",
            Self::Zstd => c"zstd",
        }
    }
}

/// The blosc shuffle mode.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[repr(i32)]
pub enum BloscShuffleMode {
    /// No shuffling.
    NoShuffle = 0,
    /// Byte-wise shuffling.
    Shuffle = 1,
    /// Bit-wise shuffling.
    BitShuffle = 2,
}

impl BloscShuffleMode {
    /// Create a shuffle mode from its numcodecs value for elements of `typesize` bytes.
    ///
    /// `-1` selects bit-wise shuffling for single byte elements and byte-wise shuffling otherwise.
    #[must_use]
    pub const fn from_numcodecs(shuffle: i64, typesize: usize) -> Option<Self> {
        match shuffle {
            -1 if typesize == 1 => Some(Self::BitShuffle),
            -1 => Some(Self::Shuffle),
            0 => Some(Self::NoShuffle),
            1 => Some(Self::Shuffle),
            2 => Some(Self::BitShuffle),
            _ => None,
        }
    }
}

const fn shuffle_default() -> i64 {
    1
}

/// Configuration parameters for the `blosc` compressor.
#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Debug)]
pub struct BloscCodecConfiguration {
    /// The compressor.
    pub cname: BloscCompressor,
    /// The compression level, 0-9.
    pub clevel: u8,
    /// The numcodecs shuffle mode: 0 (none), 1 (byte), 2 (bit) or -1 (automatic).
    #[serde(default = "shuffle_default")]
    pub shuffle: i64,
    /// The block size. Chosen automatically if zero.
    #[serde(default)]
    pub blocksize: usize,
}

/// A `blosc` compressor.
#[derive(Clone, Debug)]
pub struct BloscCodec {
    cname: BloscCompressor,
    clevel: u8,
    blocksize: usize,
    shuffle_mode: BloscShuffleMode,
    typesize: usize,
}

impl BloscCodec {
    /// Create a new `blosc` codec.
    ///
    /// # Errors
    /// Returns [`CodecCreateError`] if
    ///  - the compression level is not in 0-9, or
    ///  - the compressor is not available.
    pub fn new(
        cname: BloscCompressor,
        clevel: u8,
        blocksize: usize,
        shuffle_mode: BloscShuffleMode,
        typesize: usize,
    ) -> Result<Self, CodecCreateError> {
        if clevel > 9 {
            return Err(CodecCreateError::InvalidConfiguration(
                IDENTIFIER.to_string(),
                format!("compression level {clevel} is not in 0-9"),
            ));
        }

        // Check that the compressor is available
        let support = unsafe {
            blosc_get_complib_info(
                cname.as_cstr().as_ptr(),
                std::ptr::null_mut(),
                std::ptr::null_mut(),
            )
        };
        if support < 0 {
            return Err(CodecCreateError::InvalidConfiguration(
                IDENTIFIER.to_string(),
                format!("compressor {cname} is not supported"),
            ));
        }

        Ok(Self {
            cname,
            clevel,
            blocksize,
            shuffle_mode,
            typesize: typesize.max(1),
        })
    }

    /// Create a new `blosc` codec from configuration for elements of `typesize` bytes.
    ///
    /// # Errors
    /// Returns [`CodecCreateError`] if the configuration is not valid.
    pub fn new_with_configuration(
        configuration: &BloscCodecConfiguration,
        typesize: usize,
    ) -> Result<Self, CodecCreateError> {
        let shuffle_mode = BloscShuffleMode::from_numcodecs(configuration.shuffle, typesize)
            .ok_or_else(|| {
                CodecCreateError::InvalidConfiguration(
                    IDENTIFIER.to_string(),
                    format!("invalid shuffle mode {}", configuration.shuffle),
                )
            })?;
        Self::new(
            configuration.cname,
            configuration.clevel,
            configuration.blocksize,
            shuffle_mode,
            typesize,
        )
    }
}

impl BytesToBytesCodecTraits for BloscCodec {
    fn identifier(&self) -> &'static str {
        IDENTIFIER
    }

    fn encode(&self, decoded_value: &[u8]) -> Result<Vec<u8>, CodecError> {
        let destsize = decoded_value.len() + BLOSC_MAX_OVERHEAD as usize;
        let mut dest: Vec<u8> = Vec::with_capacity(destsize);
        let destsize = unsafe {
            blosc_compress_ctx(
                c_int::from(self.clevel),
                self.shuffle_mode as c_int,
                self.typesize,
                decoded_value.len(),
                decoded_value.as_ptr().cast::<c_void>(),
                dest.as_mut_ptr().cast::<c_void>(),
                destsize,
                self.cname.as_cstr().as_ptr(),
                self.blocksize,
                1,
            )
        };
        if let Ok(destsize @ 1..) = usize::try_from(destsize) {
            unsafe {
                dest.set_len(destsize);
            }
            dest.shrink_to_fit();
            Ok(dest)
        } else {
            Err(CodecError::from(format!(
                "blosc_compress_ctx(clevel: {}, doshuffle: {:?}, typesize: {}, nbytes: {}, compressor: {}, blocksize: {}) -> {destsize} (failure)",
                self.clevel,
                self.shuffle_mode,
                self.typesize,
                decoded_value.len(),
                self.cname,
                self.blocksize
            )))
        }
    }

    fn decode(&self, encoded_value: &[u8], _decoded_size: usize) -> Result<Vec<u8>, CodecError> {
        let mut destsize: usize = 0;
        let valid = unsafe {
            blosc_cbuffer_validate(
                encoded_value.as_ptr().cast::<c_void>(),
                encoded_value.len(),
                std::ptr::addr_of_mut!(destsize),
            )
        } == 0;
        if !valid {
            return Err(CodecError::from("blosc encoded value is invalid"));
        }
        if destsize == 0 {
            return Ok(Vec::new());
        }

        let mut dest: Vec<u8> = Vec::with_capacity(destsize);
        let decompressed = unsafe {
            blosc_decompress_ctx(
                encoded_value.as_ptr().cast::<c_void>(),
                dest.as_mut_ptr().cast::<c_void>(),
                destsize,
                1,
            )
        };
        match usize::try_from(decompressed) {
            Ok(decompressed @ 1..) if decompressed <= destsize => {
                unsafe {
                    dest.set_len(decompressed);
                }
                Ok(dest)
            }
            _ => Err(CodecError::from(format!(
                "blosc_decompress_ctx(nbytes: {}, destsize: {destsize}) -> {decompressed} (failure)",
                encoded_value.len()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codec_blosc_round_trip() {
        let bytes: Vec<u8> = (0u32..1024).flat_map(u32::to_le_bytes).collect();
        let configuration: BloscCodecConfiguration =
            serde_json::from_str(r#"{"cname": "lz4", "clevel": 5, "shuffle": 1, "blocksize": 0}"#)
                .unwrap();
        let codec = BloscCodec::new_with_configuration(&configuration, 4).unwrap();
        let encoded = codec.encode(&bytes).unwrap();
        assert!(encoded.len() < bytes.len());
        assert_eq!(codec.decode(&encoded, bytes.len()).unwrap(), bytes);
    }

    #[test]
    fn codec_blosc_shuffle_modes() {
        assert_eq!(
            BloscShuffleMode::from_numcodecs(-1, 1),
            Some(BloscShuffleMode::BitShuffle)
        );
        assert_eq!(
            BloscShuffleMode::from_numcodecs(-1, 8),
            Some(BloscShuffleMode::Shuffle)
        );
        assert_eq!(BloscShuffleMode::from_numcodecs(3, 8), None);
    }

    #[test]
    fn codec_blosc_invalid() {
        assert!(BloscCodec::new(BloscCompressor::Zstd, 10, 0, BloscShuffleMode::NoShuffle, 1).is_err());
        let codec = BloscCodec::new(BloscCompressor::Zstd, 5, 0, BloscShuffleMode::NoShuffle, 1).unwrap();
        assert!(codec.decode(&[0; 8], 8).is_err());
    }
}
