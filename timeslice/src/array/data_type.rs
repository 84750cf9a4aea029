//! Zarr V2 data types.
//!
//! A [`DataType`] is parsed from a NumPy type string such as `<f4`, `|b1` or `<M8[ns]`.
//! Every fixed size type string is accepted so that arrays of any such type can be copied byte for byte.
//! Only boolean, integer and floating point types can be interpreted numerically.

use derive_more::Display;
use thiserror::Error;
use timeslice_metadata::{v2::DataTypeMetadataV2, Endianness};

/// The kind of a [`DataType`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display)]
pub enum DataTypeKind {
    /// `b`: a boolean.
    #[display("bool")]
    Bool,
    /// `i`: a signed integer.
    #[display("int")]
    Int,
    /// `u`: an unsigned integer.
    #[display("uint")]
    UInt,
    /// `f`: an IEEE 754 floating point number.
    #[display("float")]
    Float,
    /// `c`: a pair of IEEE 754 floating point numbers.
    #[display("complex")]
    Complex,
    /// `M` or `m`: a 64-bit datetime or timedelta.
    #[display("datetime")]
    DateTime,
    /// `S` or `V`: a fixed length byte string.
    #[display("bytes")]
    Bytes,
    /// `U`: a fixed length UTF-32 string.
    #[display("unicode")]
    Unicode,
}

/// A fixed size data type.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Display)]
#[display("{name}")]
pub struct DataType {
    name: String,
    kind: DataTypeKind,
    size: usize,
    endianness: Option<Endianness>,
}

/// A data type error.
#[derive(Clone, Debug, Error)]
pub enum DataTypeError {
    /// The data type is not supported.
    #[error("unsupported data type {_0:?}")]
    Unsupported(DataTypeMetadataV2),
    /// The data type cannot be interpreted numerically.
    #[error("data type {_0} cannot be interpreted numerically")]
    NotNumeric(String),
    /// The bytes are not a whole number of elements.
    #[error("got {_0} bytes, which is not a multiple of the data type size {_1}")]
    InvalidBytesLength(usize, usize),
}

impl DataType {
    /// Create a data type from Zarr V2 data type metadata.
    ///
    /// # Errors
    /// Returns [`DataTypeError::Unsupported`] for structured and object data types, and for unrecognised type strings.
    pub fn from_metadata(metadata: &DataTypeMetadataV2) -> Result<Self, DataTypeError> {
        match metadata {
            DataTypeMetadataV2::Simple(name) => {
                Self::parse(name).ok_or_else(|| DataTypeError::Unsupported(metadata.clone()))
            }
            DataTypeMetadataV2::Structured(_) => Err(DataTypeError::Unsupported(metadata.clone())),
        }
    }

    fn parse(name: &str) -> Option<Self> {
        let mut chars = name.chars();
        let endianness = match chars.next()? {
            '<' => Some(Endianness::Little),
            '>' => Some(Endianness::Big),
            '=' => Some(Endianness::native()),
            '|' => None,
            _ => return None,
        };
        let kind_char = chars.next()?;
        let rest = chars.as_str();
        let (digits, unit) = match rest.split_once('[') {
            Some((digits, unit)) => (digits, Some(unit.strip_suffix(']')?)),
            None => (rest, None),
        };
        if !digits.bytes().all(|c| c.is_ascii_digit()) {
            return None;
        }
        let n: usize = digits.parse().ok()?;
        if unit.is_some() && !matches!(kind_char, 'M' | 'm') {
            return None;
        }
        let (kind, size) = match (kind_char, n) {
            ('b', 1) => (DataTypeKind::Bool, 1),
            ('i', 1 | 2 | 4 | 8) => (DataTypeKind::Int, n),
            ('u', 1 | 2 | 4 | 8) => (DataTypeKind::UInt, n),
            ('f', 2 | 4 | 8) => (DataTypeKind::Float, n),
            ('c', 8 | 16) => (DataTypeKind::Complex, n),
            ('M' | 'm', 8) => (DataTypeKind::DateTime, 8),
            ('S' | 'V', 1..) => (DataTypeKind::Bytes, n),
            ('U', 1..) => (DataTypeKind::Unicode, n.checked_mul(4)?),
            _ => return None,
        };
        // multi-byte numbers must declare their byte order
        if size > 1 && endianness.is_none() && !matches!(kind, DataTypeKind::Bytes) {
            return None;
        }
        Some(Self {
            name: name.to_string(),
            kind,
            size,
            endianness,
        })
    }

    /// The NumPy type string of the data type.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The kind of the data type.
    #[must_use]
    pub const fn kind(&self) -> DataTypeKind {
        self.kind
    }

    /// The size of an element in bytes.
    #[must_use]
    pub const fn size(&self) -> usize {
        self.size
    }

    /// The endianness of elements, or [`None`] if the byte order is not applicable.
    #[must_use]
    pub const fn endianness(&self) -> Option<Endianness> {
        self.endianness
    }

    /// Returns true if elements can be interpreted numerically.
    #[must_use]
    pub const fn is_numeric(&self) -> bool {
        matches!(
            self.kind,
            DataTypeKind::Bool | DataTypeKind::Int | DataTypeKind::UInt | DataTypeKind::Float
        )
    }

    pub(crate) fn endianness_or_native(&self) -> Endianness {
        self.endianness.unwrap_or(Endianness::native())
    }

    /// Interpret `bytes` as a sequence of elements converted to [`f64`].
    ///
    /// Booleans are converted to `0.0` or `1.0`. 64-bit integers beyond 2^53 lose precision.
    ///
    /// # Errors
    /// Returns a [`DataTypeError`] if the data type is not numeric or `bytes` is not a whole number of elements.
    #[allow(clippy::cast_precision_loss)]
    pub fn to_f64_vec(&self, bytes: &[u8]) -> Result<Vec<f64>, DataTypeError> {
        if !self.is_numeric() {
            return Err(DataTypeError::NotNumeric(self.name.clone()));
        }
        if bytes.len() % self.size != 0 {
            return Err(DataTypeError::InvalidBytesLength(bytes.len(), self.size));
        }
        let endianness = self.endianness_or_native();
        macro_rules! decode {
            ($t:ty) => {
                bytes
                    .chunks_exact(std::mem::size_of::<$t>())
                    .map(|element| {
                        let mut array = [0u8; std::mem::size_of::<$t>()];
                        array.copy_from_slice(element);
                        match endianness {
                            Endianness::Little => <$t>::from_le_bytes(array),
                            Endianness::Big => <$t>::from_be_bytes(array),
                        }
                    })
            };
        }
        let values = match (self.kind, self.size) {
            (DataTypeKind::Bool, _) => bytes.iter().map(|&b| f64::from(u8::from(b != 0))).collect(),
            (DataTypeKind::Int, 1) => decode!(i8).map(f64::from).collect(),
            (DataTypeKind::Int, 2) => decode!(i16).map(f64::from).collect(),
            (DataTypeKind::Int, 4) => decode!(i32).map(f64::from).collect(),
            (DataTypeKind::Int, _) => decode!(i64).map(|v| v as f64).collect(),
            (DataTypeKind::UInt, 1) => decode!(u8).map(f64::from).collect(),
            (DataTypeKind::UInt, 2) => decode!(u16).map(f64::from).collect(),
            (DataTypeKind::UInt, 4) => decode!(u32).map(f64::from).collect(),
            (DataTypeKind::UInt, _) => decode!(u64).map(|v| v as f64).collect(),
            (DataTypeKind::Float, 2) => decode!(u16)
                .map(|bits| half::f16::from_bits(bits).to_f64())
                .collect(),
            (DataTypeKind::Float, 4) => decode!(f32).map(f64::from).collect(),
            (DataTypeKind::Float, _) => decode!(f64).collect(),
            _ => return Err(DataTypeError::NotNumeric(self.name.clone())),
        };
        Ok(values)
    }

    /// Interpret `bytes` as a sequence of elements and test whether each is nonzero.
    ///
    /// Floating point elements are nonzero unless they compare equal to zero, so NaN is nonzero.
    /// Elements of any other kind are nonzero if any of their bytes are nonzero.
    ///
    /// # Errors
    /// Returns [`DataTypeError::InvalidBytesLength`] if `bytes` is not a whole number of elements.
    pub fn to_nonzero_vec(&self, bytes: &[u8]) -> Result<Vec<bool>, DataTypeError> {
        if bytes.len() % self.size != 0 {
            return Err(DataTypeError::InvalidBytesLength(bytes.len(), self.size));
        }
        if self.kind == DataTypeKind::Float {
            // negative zero has a set sign bit
            Ok(self
                .to_f64_vec(bytes)?
                .into_iter()
                .map(|value| value != 0.0)
                .collect())
        } else {
            Ok(bytes
                .chunks_exact(self.size)
                .map(|element| element.iter().any(|&b| b != 0))
                .collect())
        }
    }
}
