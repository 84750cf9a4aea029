use derive_more::{Display, From};
use serde::{Deserialize, Serialize, Serializer};

use crate::{v2::MetadataV2, ArrayShape, ChunkKeySeparator, ChunkShape};

/// Zarr V2 array metadata, the content of a `.zarray` document.
///
/// User attributes are stored separately in `.zattrs`.
///
/// An example `JSON` document for a Zarr V2 array:
/// ```json
/// {
///     "chunks": [24, 10, 10],
///     "compressor": {
///         "id": "blosc",
///         "cname": "lz4",
///         "clevel": 5,
///         "shuffle": 1
///     },
///     "dtype": "<f4",
///     "fill_value": "NaN",
///     "filters": null,
///     "order": "C",
///     "shape": [48, 10, 10],
///     "zarr_format": 2
/// }
/// ```
#[derive(Serialize, Deserialize, Clone, PartialEq, Eq, Debug, Display)]
#[display("{}", serde_json::to_string(self).unwrap_or_default())]
pub struct ArrayMetadataV2 {
    /// The Zarr format version of the array. Must be `2`.
    pub zarr_format: monostate::MustBe!(2u64),
    /// An array of integers providing the length of each dimension of the Zarr array.
    pub shape: ArrayShape,
    /// A list of integers defining the length of each dimension of a chunk of the array.
    pub chunks: ChunkShape,
    /// The data type of the Zarr array.
    pub dtype: DataTypeMetadataV2,
    /// A JSON object identifying the primary compression codec and providing configuration parameters, or null if no compressor is to be used.
    pub compressor: Option<MetadataV2>,
    /// A scalar value providing the default value to use for uninitialized portions of the array, or null if no fill value is to be used.
    pub fill_value: FillValueMetadataV2,
    /// Either “C” or “F”, defining the layout of bytes within each chunk of the array.
    pub order: ArrayMetadataV2Order,
    /// A list of JSON objects providing codec configurations, or null if no filters are to be applied.
    #[serde(default, serialize_with = "serialize_v2_filters")]
    pub filters: Option<Vec<MetadataV2>>,
    /// If present, either the string "." or "/" defining the separator placed between the dimensions of a chunk.
    #[serde(default = "chunk_key_separator_default_zarr_v2")]
    pub dimension_separator: ChunkKeySeparator,
}

#[allow(clippy::ref_option)]
fn serialize_v2_filters<S>(
    filters: &Option<Vec<MetadataV2>>,
    serializer: S,
) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match filters.as_ref().filter(|v| !v.is_empty()) {
        Some(filters) => serializer.collect_seq(filters),
        None => serializer.serialize_none(),
    }
}

const fn chunk_key_separator_default_zarr_v2() -> ChunkKeySeparator {
    ChunkKeySeparator::Dot
}

impl ArrayMetadataV2 {
    /// Create Zarr V2 array metadata.
    ///
    /// Defaults to C order, no filters and a `.` dimension separator.
    #[must_use]
    pub fn new(
        shape: ArrayShape,
        chunks: ChunkShape,
        dtype: DataTypeMetadataV2,
        fill_value: FillValueMetadataV2,
        compressor: Option<MetadataV2>,
    ) -> Self {
        Self {
            zarr_format: monostate::MustBe!(2u64),
            shape,
            chunks,
            dtype,
            compressor,
            fill_value,
            order: ArrayMetadataV2Order::C,
            filters: None,
            dimension_separator: ChunkKeySeparator::Dot,
        }
    }

    /// Serialize the metadata as a pretty-printed String of JSON.
    ///
    /// # Errors
    /// Returns a [`serde_json::Error`] if the metadata cannot be serialized.
    pub fn to_string_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Set the dimension separator.
    #[must_use]
    pub fn with_dimension_separator(mut self, dimension_separator: ChunkKeySeparator) -> Self {
        self.dimension_separator = dimension_separator;
        self
    }

    /// Set the order.
    #[must_use]
    pub fn with_order(mut self, order: ArrayMetadataV2Order) -> Self {
        self.order = order;
        self
    }

    /// Set the filters.
    #[must_use]
    pub fn with_filters(mut self, filters: Option<Vec<MetadataV2>>) -> Self {
        self.filters = filters.filter(|v| !v.is_empty());
        self
    }
}

/// Zarr V2 data type metadata.
///
/// Simple data types are NumPy type strings such as `<f4`, `|b1` or `<M8[ns]`.
#[derive(Serialize, Deserialize, Clone, PartialEq, Eq, Debug, From)]
#[serde(untagged)]
pub enum DataTypeMetadataV2 {
    /// A simple data type.
    #[from(String, &str)]
    Simple(String),
    /// A structured data type, a list of `[fieldname, datatype, shape]` entries.
    Structured(Vec<serde_json::Value>),
}

/// Zarr V2 fill value metadata.
///
/// Provides the default value to use for uninitialized portions of the array, or null if a default fill value is to be used.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum FillValueMetadataV2 {
    /// No fill value.
    Null,
    /// NaN (not-a-number).
    NaN,
    /// Positive infinity.
    Infinity,
    /// Negative infinity.
    NegInfinity,
    /// A number.
    Number(serde_json::Number),
    /// A string. Byte string data types encode their fill value in base64.
    String(String),
}

impl<'de> serde::Deserialize<'de> for FillValueMetadataV2 {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum FillValueMetadataV2Type {
            String(String),
            Number(serde_json::Number),
            Bool(bool),
            Null,
        }
        match FillValueMetadataV2Type::deserialize(d)? {
            FillValueMetadataV2Type::String(string) => match string.as_str() {
                "NaN" => Ok(Self::NaN),
                "Infinity" => Ok(Self::Infinity),
                "-Infinity" => Ok(Self::NegInfinity),
                _ => Ok(Self::String(string)),
            },
            FillValueMetadataV2Type::Number(number) => Ok(Self::Number(number)),
            FillValueMetadataV2Type::Bool(value) => Ok(Self::Number(u8::from(value).into())),
            FillValueMetadataV2Type::Null => Ok(Self::Null),
        }
    }
}

impl Serialize for FillValueMetadataV2 {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self {
            Self::Null => serializer.serialize_none(),
            Self::NaN => serializer.serialize_str("NaN"),
            Self::Infinity => serializer.serialize_str("Infinity"),
            Self::NegInfinity => serializer.serialize_str("-Infinity"),
            Self::Number(number) => number.serialize(serializer),
            Self::String(string) => string.serialize(serializer),
        }
    }
}

/// Zarr V2 order metadata. Indicates the layout of bytes within a chunk.
#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Debug)]
pub enum ArrayMetadataV2Order {
    /// Row-major order. The last dimension varies fastest.
    C,
    /// Column-major order. The first dimension varies fastest.
    F,
}
