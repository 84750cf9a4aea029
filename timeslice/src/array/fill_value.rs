use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine};
use timeslice_metadata::{v2::FillValueMetadataV2, Endianness};

use super::data_type::{DataType, DataTypeKind};

/// The fill value of an array, the encoded bytes of a single element.
///
/// Used for chunks which are absent from the store.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FillValue(Vec<u8>);

impl From<Vec<u8>> for FillValue {
    fn from(value: Vec<u8>) -> Self {
        Self(value)
    }
}

impl FillValue {
    /// Create a new fill value from its encoded bytes.
    #[must_use]
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Returns the encoded bytes of the fill value.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Returns the size in bytes of the fill value.
    #[must_use]
    pub fn size(&self) -> usize {
        self.0.len()
    }

    /// Create the fill value for `data_type` from Zarr V2 fill value metadata.
    ///
    /// A `null` fill value is encoded as zero bytes.
    ///
    /// Returns [`None`] if the metadata is not representable in the data type.
    #[must_use]
    pub fn from_metadata_v2(metadata: &FillValueMetadataV2, data_type: &DataType) -> Option<Self> {
        let size = data_type.size();
        let endianness = data_type.endianness_or_native();
        let bytes = match (metadata, data_type.kind()) {
            (FillValueMetadataV2::Null, _) => vec![0; size],
            (FillValueMetadataV2::NaN, DataTypeKind::Float) => float_bytes(f64::NAN, size, endianness),
            (FillValueMetadataV2::Infinity, DataTypeKind::Float) => {
                float_bytes(f64::INFINITY, size, endianness)
            }
            (FillValueMetadataV2::NegInfinity, DataTypeKind::Float) => {
                float_bytes(f64::NEG_INFINITY, size, endianness)
            }
            (FillValueMetadataV2::Number(number), DataTypeKind::Float) => {
                float_bytes(number.as_f64()?, size, endianness)
            }
            (FillValueMetadataV2::Number(number), DataTypeKind::Bool) => {
                vec![u8::from(number.as_f64()? != 0.0)]
            }
            (
                FillValueMetadataV2::Number(number),
                DataTypeKind::Int | DataTypeKind::UInt | DataTypeKind::DateTime,
            ) => {
                let signed = data_type.kind() != DataTypeKind::UInt;
                int_bytes(number_to_i128(number)?, size, endianness, signed)?
            }
            (FillValueMetadataV2::String(string), DataTypeKind::Bytes) => {
                let mut bytes = BASE64_STANDARD.decode(string).ok()?;
                if bytes.len() > size {
                    return None;
                }
                bytes.resize(size, 0);
                bytes
            }
            (FillValueMetadataV2::String(string), DataTypeKind::Unicode) => {
                let mut bytes: Vec<u8> = string
                    .chars()
                    .flat_map(|c| match endianness {
                        Endianness::Little => u32::from(c).to_le_bytes(),
                        Endianness::Big => u32::from(c).to_be_bytes(),
                    })
                    .collect();
                if bytes.len() > size {
                    return None;
                }
                bytes.resize(size, 0);
                bytes
            }
            _ => return None,
        };
        Some(Self(bytes))
    }
}

#[allow(clippy::cast_possible_truncation)]
fn float_bytes(value: f64, size: usize, endianness: Endianness) -> Vec<u8> {
    match (size, endianness) {
        (2, Endianness::Little) => half::f16::from_f64(value).to_le_bytes().to_vec(),
        (2, Endianness::Big) => half::f16::from_f64(value).to_be_bytes().to_vec(),
        (4, Endianness::Little) => (value as f32).to_le_bytes().to_vec(),
        (4, Endianness::Big) => (value as f32).to_be_bytes().to_vec(),
        (_, Endianness::Little) => value.to_le_bytes().to_vec(),
        (_, Endianness::Big) => value.to_be_bytes().to_vec(),
    }
}

#[allow(clippy::cast_possible_truncation)]
fn number_to_i128(number: &serde_json::Number) -> Option<i128> {
    if let Some(value) = number.as_i64() {
        Some(i128::from(value))
    } else if let Some(value) = number.as_u64() {
        Some(i128::from(value))
    } else {
        // integral floats such as `0.0`
        let value = number.as_f64()?;
        (value.fract() == 0.0 && value.abs() < 2f64.powi(64)).then_some(value as i128)
    }
}

fn int_bytes(value: i128, size: usize, endianness: Endianness, signed: bool) -> Option<Vec<u8>> {
    let bits = 8 * u32::try_from(size).ok()?;
    let (min, max) = if signed {
        (-(1i128 << (bits - 1)), (1i128 << (bits - 1)) - 1)
    } else {
        (0, (1i128 << bits) - 1)
    };
    if !(min..=max).contains(&value) {
        return None;
    }
    let mut bytes = value.to_le_bytes()[..size].to_vec();
    if endianness == Endianness::Big {
        bytes.reverse();
    }
    Some(bytes)
}

#[cfg(test)]
mod tests {
    use timeslice_metadata::v2::DataTypeMetadataV2;

    use super::*;

    fn fill_value(metadata: &str, data_type: &str) -> Option<FillValue> {
        let metadata: FillValueMetadataV2 = serde_json::from_str(metadata).unwrap();
        let data_type = DataType::from_metadata(&DataTypeMetadataV2::from(data_type)).unwrap();
        FillValue::from_metadata_v2(&metadata, &data_type)
    }

    #[test]
    fn fill_value_float() {
        assert_eq!(
            fill_value(r#""NaN""#, "<f4").unwrap().as_bytes(),
            f32::NAN.to_le_bytes()
        );
        assert_eq!(
            fill_value("1.5", ">f8").unwrap().as_bytes(),
            1.5f64.to_be_bytes()
        );
        assert_eq!(
            fill_value(r#""-Infinity""#, "<f2").unwrap().as_bytes(),
            half::f16::NEG_INFINITY.to_le_bytes()
        );
        assert_eq!(fill_value("null", "<f8").unwrap().as_bytes(), [0; 8]);
    }

    #[test]
    fn fill_value_int() {
        assert_eq!(fill_value("-1", "<i2").unwrap().as_bytes(), [255, 255]);
        assert_eq!(fill_value("258", ">u2").unwrap().as_bytes(), [1, 2]);
        assert_eq!(fill_value("0.0", "<i4").unwrap().as_bytes(), [0; 4]);
        assert_eq!(fill_value("true", "|b1").unwrap().as_bytes(), [1]);
        assert!(fill_value("256", "|u1").is_none());
        assert!(fill_value("-1", "<u4").is_none());
        assert!(fill_value("0.5", "<i4").is_none());
        assert!(fill_value(r#""NaN""#, "<i4").is_none());
    }

    #[test]
    fn fill_value_strings() {
        assert_eq!(fill_value(r#""YWI=""#, "|S3").unwrap().as_bytes(), b"ab\0");
        assert!(fill_value(r#""YWJjZA==""#, "|S3").is_none());
        assert_eq!(
            fill_value(r#""a""#, "<U2").unwrap().as_bytes(),
            [97, 0, 0, 0, 0, 0, 0, 0]
        );
    }
}
