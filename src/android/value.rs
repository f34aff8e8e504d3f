use crate::android::chunk::ChunkReader;
use crate::android::error::{ResError, ResErrorKind, ResResult};
use crate::android::string_pool::StringPool;
use crate::android::table::ResourceId;
use serde::Serialize;
use std::fmt;

pub const TYPE_NULL: u8 = 0x00;
pub const TYPE_REFERENCE: u8 = 0x01;
pub const TYPE_ATTRIBUTE: u8 = 0x02;
pub const TYPE_STRING: u8 = 0x03;
pub const TYPE_FLOAT: u8 = 0x04;
pub const TYPE_DIMENSION: u8 = 0x05;
pub const TYPE_FRACTION: u8 = 0x06;
pub const TYPE_DYNAMIC_REFERENCE: u8 = 0x07;
pub const TYPE_DYNAMIC_ATTRIBUTE: u8 = 0x08;
pub const TYPE_INT_DEC: u8 = 0x10;
pub const TYPE_INT_HEX: u8 = 0x11;
pub const TYPE_INT_BOOLEAN: u8 = 0x12;
pub const TYPE_INT_COLOR_ARGB8: u8 = 0x1c;
pub const TYPE_INT_COLOR_RGB8: u8 = 0x1d;
pub const TYPE_INT_COLOR_ARGB4: u8 = 0x1e;
pub const TYPE_INT_COLOR_RGB4: u8 = 0x1f;

/// `data` of a `TYPE_NULL` value that is explicitly empty rather than undefined.
pub const DATA_NULL_EMPTY: u32 = 1;

/// Size of a serialized `Res_value`.
pub const RES_VALUE_SIZE: u16 = 8;

const COMPLEX_UNIT_MASK: u32 = 0x0F;
const COMPLEX_RADIX_SHIFT: u32 = 4;
const COMPLEX_RADIX_MASK: u32 = 0x03;
const COMPLEX_MANTISSA_MASK: u32 = 0xFFFF_FF00;

// 23p0, 16p7, 8p15 and 0p23 fixed point
const RADIX_MULTS: [f32; 4] = [
    1.0 / (1u32 << 8) as f32,
    1.0 / (1u32 << 15) as f32,
    1.0 / (1u32 << 23) as f32,
    1.0 / (1u32 << 31) as f32,
];

/// The `dataType` tags of `Res_value` this decoder understands.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[repr(u8)]
pub enum ValueType {
    Null = TYPE_NULL,
    Reference = TYPE_REFERENCE,
    Attribute = TYPE_ATTRIBUTE,
    String = TYPE_STRING,
    Float = TYPE_FLOAT,
    Dimension = TYPE_DIMENSION,
    Fraction = TYPE_FRACTION,
    DynamicReference = TYPE_DYNAMIC_REFERENCE,
    DynamicAttribute = TYPE_DYNAMIC_ATTRIBUTE,
    IntDec = TYPE_INT_DEC,
    IntHex = TYPE_INT_HEX,
    IntBoolean = TYPE_INT_BOOLEAN,
    ColorArgb8 = TYPE_INT_COLOR_ARGB8,
    ColorRgb8 = TYPE_INT_COLOR_RGB8,
    ColorArgb4 = TYPE_INT_COLOR_ARGB4,
    ColorRgb4 = TYPE_INT_COLOR_RGB4,
}

impl TryFrom<u8> for ValueType {
    type Error = ResError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            TYPE_NULL => ValueType::Null,
            TYPE_REFERENCE => ValueType::Reference,
            TYPE_ATTRIBUTE => ValueType::Attribute,
            TYPE_STRING => ValueType::String,
            TYPE_FLOAT => ValueType::Float,
            TYPE_DIMENSION => ValueType::Dimension,
            TYPE_FRACTION => ValueType::Fraction,
            TYPE_DYNAMIC_REFERENCE => ValueType::DynamicReference,
            TYPE_DYNAMIC_ATTRIBUTE => ValueType::DynamicAttribute,
            TYPE_INT_DEC => ValueType::IntDec,
            TYPE_INT_HEX => ValueType::IntHex,
            TYPE_INT_BOOLEAN => ValueType::IntBoolean,
            TYPE_INT_COLOR_ARGB8 => ValueType::ColorArgb8,
            TYPE_INT_COLOR_RGB8 => ValueType::ColorRgb8,
            TYPE_INT_COLOR_ARGB4 => ValueType::ColorArgb4,
            TYPE_INT_COLOR_RGB4 => ValueType::ColorRgb4,
            other => return Err(ResError::new(ResErrorKind::UnsupportedValueType(other))),
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum DimensionUnit {
    Px,
    Dip,
    Sp,
    Pt,
    In,
    Mm,
}

impl DimensionUnit {
    fn from_complex(data: u32) -> Option<Self> {
        match data & COMPLEX_UNIT_MASK {
            0 => Some(DimensionUnit::Px),
            1 => Some(DimensionUnit::Dip),
            2 => Some(DimensionUnit::Sp),
            3 => Some(DimensionUnit::Pt),
            4 => Some(DimensionUnit::In),
            5 => Some(DimensionUnit::Mm),
            _ => None,
        }
    }

    pub fn suffix(&self) -> &'static str {
        match self {
            DimensionUnit::Px => "px",
            DimensionUnit::Dip => "dp",
            DimensionUnit::Sp => "sp",
            DimensionUnit::Pt => "pt",
            DimensionUnit::In => "in",
            DimensionUnit::Mm => "mm",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum FractionUnit {
    /// Fraction of the view itself (`%`).
    Fraction,
    /// Fraction of the parent (`%p`).
    FractionParent,
}

impl FractionUnit {
    fn from_complex(data: u32) -> Option<Self> {
        match data & COMPLEX_UNIT_MASK {
            0 => Some(FractionUnit::Fraction),
            1 => Some(FractionUnit::FractionParent),
            _ => None,
        }
    }

    pub fn suffix(&self) -> &'static str {
        match self {
            FractionUnit::Fraction => "%",
            FractionUnit::FractionParent => "%p",
        }
    }
}

/// Which literal form a color was written in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum ColorFormat {
    Argb8,
    Rgb8,
    Argb4,
    Rgb4,
}

/// Decodes the 24-bit signed mantissa and radix of a complex value.
pub fn complex_to_float(data: u32) -> f32 {
    let mantissa = (data & COMPLEX_MANTISSA_MASK) as i32 as f32;
    mantissa * RADIX_MULTS[((data >> COMPLEX_RADIX_SHIFT) & COMPLEX_RADIX_MASK) as usize]
}

/// A raw, undecoded `Res_value` cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResValue {
    pub size: u16,
    pub data_type: u8,
    pub data: u32,
}

impl ResValue {
    pub fn new(data_type: u8, data: u32) -> Self {
        ResValue {
            size: RES_VALUE_SIZE,
            data_type,
            data,
        }
    }

    pub fn read(reader: &mut ChunkReader<'_>) -> ResResult<Self> {
        let offset = reader.position();
        let size = reader.read_u16()?;
        let _res0 = reader.read_u8()?;
        let data_type = reader.read_u8()?;
        let data = reader.read_u32()?;
        if size < RES_VALUE_SIZE {
            return Err(malformed!(offset, "value size {} is below {}", size, RES_VALUE_SIZE));
        }
        Ok(ResValue {
            size,
            data_type,
            data,
        })
    }

    /// Decodes the cell. String values are looked up in `strings`, the pool
    /// that lives next to the value; references are left unresolved.
    pub fn decode(&self, strings: &StringPool) -> ResResult<DecodedValue> {
        let data = self.data;
        Ok(match ValueType::try_from(self.data_type)? {
            ValueType::Null if data == DATA_NULL_EMPTY => DecodedValue::Empty,
            ValueType::Null => DecodedValue::Null,
            ValueType::Reference => DecodedValue::Reference(ResourceId(data)),
            ValueType::Attribute => DecodedValue::Attribute(ResourceId(data)),
            ValueType::DynamicReference => DecodedValue::DynamicReference(ResourceId(data)),
            ValueType::DynamicAttribute => DecodedValue::DynamicAttribute(ResourceId(data)),
            ValueType::String => DecodedValue::String(strings.get(data)?.to_string()),
            ValueType::Float => DecodedValue::Float(f32::from_bits(data)),
            ValueType::Dimension => DecodedValue::Dimension {
                value: complex_to_float(data),
                unit: DimensionUnit::from_complex(data)
                    .ok_or_else(|| unknown_unit("dimension", data))?,
                raw: data,
            },
            ValueType::Fraction => DecodedValue::Fraction {
                value: complex_to_float(data),
                unit: FractionUnit::from_complex(data)
                    .ok_or_else(|| unknown_unit("fraction", data))?,
                raw: data,
            },
            ValueType::IntDec => DecodedValue::IntDec(data as i32),
            ValueType::IntHex => DecodedValue::IntHex(data),
            ValueType::IntBoolean => DecodedValue::Boolean(data != 0),
            ValueType::ColorArgb8 => DecodedValue::Color {
                argb: data,
                format: ColorFormat::Argb8,
            },
            ValueType::ColorRgb8 => DecodedValue::Color {
                argb: data | 0xFF00_0000,
                format: ColorFormat::Rgb8,
            },
            ValueType::ColorArgb4 => DecodedValue::Color {
                argb: data,
                format: ColorFormat::Argb4,
            },
            ValueType::ColorRgb4 => DecodedValue::Color {
                argb: data | 0xFF00_0000,
                format: ColorFormat::Rgb4,
            },
        })
    }
}

fn unknown_unit(kind: &str, data: u32) -> ResError {
    ResError::new(ResErrorKind::MalformedChunk(format!(
        "unknown {kind} unit {}",
        data & COMPLEX_UNIT_MASK
    )))
}

/// A typed resource value.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum DecodedValue {
    /// Undefined (`@null`).
    Null,
    /// Explicitly empty (`@empty`).
    Empty,
    Reference(ResourceId),
    Attribute(ResourceId),
    DynamicReference(ResourceId),
    DynamicAttribute(ResourceId),
    String(String),
    Float(f32),
    Dimension {
        value: f32,
        unit: DimensionUnit,
        raw: u32,
    },
    Fraction {
        value: f32,
        unit: FractionUnit,
        raw: u32,
    },
    IntDec(i32),
    IntHex(u32),
    Boolean(bool),
    /// Always normalized to 8 bits per channel.
    Color {
        argb: u32,
        format: ColorFormat,
    },
}

impl DecodedValue {
    pub fn value_type(&self) -> ValueType {
        match self {
            DecodedValue::Null | DecodedValue::Empty => ValueType::Null,
            DecodedValue::Reference(_) => ValueType::Reference,
            DecodedValue::Attribute(_) => ValueType::Attribute,
            DecodedValue::DynamicReference(_) => ValueType::DynamicReference,
            DecodedValue::DynamicAttribute(_) => ValueType::DynamicAttribute,
            DecodedValue::String(_) => ValueType::String,
            DecodedValue::Float(_) => ValueType::Float,
            DecodedValue::Dimension { .. } => ValueType::Dimension,
            DecodedValue::Fraction { .. } => ValueType::Fraction,
            DecodedValue::IntDec(_) => ValueType::IntDec,
            DecodedValue::IntHex(_) => ValueType::IntHex,
            DecodedValue::Boolean(_) => ValueType::IntBoolean,
            DecodedValue::Color { format, .. } => match format {
                ColorFormat::Argb8 => ValueType::ColorArgb8,
                ColorFormat::Rgb8 => ValueType::ColorRgb8,
                ColorFormat::Argb4 => ValueType::ColorArgb4,
                ColorFormat::Rgb4 => ValueType::ColorRgb4,
            },
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            DecodedValue::String(value) => Some(value),
            _ => None,
        }
    }

    /// The referenced id of a (possibly dynamic) resource reference.
    pub fn as_reference(&self) -> Option<ResourceId> {
        match self {
            DecodedValue::Reference(id) | DecodedValue::DynamicReference(id) => Some(*id),
            _ => None,
        }
    }
}

impl fmt::Display for DecodedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodedValue::Null => write!(f, "@null"),
            DecodedValue::Empty => write!(f, "@empty"),
            DecodedValue::Reference(id) | DecodedValue::DynamicReference(id) => {
                write!(f, "@{id}")
            }
            DecodedValue::Attribute(id) | DecodedValue::DynamicAttribute(id) => {
                write!(f, "?{id}")
            }
            DecodedValue::String(value) => write!(f, "{value}"),
            DecodedValue::Float(value) => write!(f, "{value}"),
            DecodedValue::Dimension { value, unit, .. } => write!(f, "{value}{}", unit.suffix()),
            DecodedValue::Fraction { value, unit, .. } => {
                write!(f, "{}{}", value * 100.0, unit.suffix())
            }
            DecodedValue::IntDec(value) => write!(f, "{value}"),
            DecodedValue::IntHex(value) => write!(f, "0x{value:x}"),
            DecodedValue::Boolean(value) => write!(f, "{value}"),
            DecodedValue::Color { argb, .. } => write!(f, "#{argb:08x}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::builder::StringPoolBuilder;

    fn pool() -> StringPool {
        let mut builder = StringPoolBuilder::new(true);
        builder.intern("Demo");
        let bytes = builder.to_chunk();
        let mut reader = ChunkReader::new(&bytes);
        let header = reader.read_chunk_header().unwrap();
        StringPool::parse(&ChunkReader::new(&bytes), &header).unwrap()
    }

    #[test]
    fn every_known_type_decodes_to_its_own_tag() {
        let strings = pool();
        let cells = [
            (TYPE_NULL, 0),
            (TYPE_REFERENCE, 0x7f01_0000),
            (TYPE_ATTRIBUTE, 0x0101_0000),
            (TYPE_STRING, 0),
            (TYPE_FLOAT, 1.5f32.to_bits()),
            (TYPE_DYNAMIC_REFERENCE, 0x0001_0000),
            (TYPE_DYNAMIC_ATTRIBUTE, 0x0001_0001),
            (TYPE_INT_DEC, 42),
            (TYPE_INT_HEX, 0x20),
            (TYPE_INT_BOOLEAN, 0xFFFF_FFFF),
            (TYPE_INT_COLOR_ARGB8, 0x80FF_0000),
            (TYPE_INT_COLOR_RGB8, 0xFF00_FF00),
            (TYPE_INT_COLOR_ARGB4, 0x8800_00FF),
            (TYPE_INT_COLOR_RGB4, 0xFF11_2233),
        ];
        let units = (0..6).map(|unit| (TYPE_DIMENSION, (16 << 8) | unit));
        let fractions = (0..2).map(|unit| (TYPE_FRACTION, (1 << 8) | unit));
        for (data_type, data) in cells.into_iter().chain(units).chain(fractions) {
            let decoded = ResValue::new(data_type, data).decode(&strings).unwrap();
            assert_eq!(decoded.value_type() as u8, data_type, "{decoded:?}");
        }
    }

    #[test]
    fn unknown_type_is_an_error() {
        let err = ResValue::new(0x13, 0).decode(&pool()).unwrap_err();
        assert!(matches!(err.kind(), ResErrorKind::UnsupportedValueType(0x13)));
    }

    #[test]
    fn formats_dimensions() {
        let strings = pool();
        let dp = ResValue::new(TYPE_DIMENSION, (16 << 8) | 1).decode(&strings).unwrap();
        assert_eq!(dp.to_string(), "16dp");
        // 1.5 in 16p7: mantissa 0xC0 with radix 1
        let sp = ResValue::new(TYPE_DIMENSION, (0xC0 << 8) | (1 << 4) | 2)
            .decode(&strings)
            .unwrap();
        assert_eq!(sp.to_string(), "1.5sp");
        let negative = ResValue::new(TYPE_DIMENSION, (-4i32 as u32) << 8)
            .decode(&strings)
            .unwrap();
        assert_eq!(negative.to_string(), "-4px");
    }

    #[test]
    fn formats_fractions_as_percentages() {
        // 0.5 in 0p23: mantissa 0x400000 with radix 3
        let half = ResValue::new(TYPE_FRACTION, (0x40_0000 << 8) | (3 << 4) | 1)
            .decode(&pool())
            .unwrap();
        assert_eq!(half.to_string(), "50%p");
    }

    #[test]
    fn formats_scalars() {
        let strings = pool();
        let text = |data_type, data| {
            ResValue::new(data_type, data)
                .decode(&strings)
                .unwrap()
                .to_string()
        };
        assert_eq!(text(TYPE_NULL, 0), "@null");
        assert_eq!(text(TYPE_NULL, DATA_NULL_EMPTY), "@empty");
        assert_eq!(text(TYPE_STRING, 0), "Demo");
        assert_eq!(text(TYPE_INT_DEC, -3i32 as u32), "-3");
        assert_eq!(text(TYPE_INT_HEX, 0xff), "0xff");
        assert_eq!(text(TYPE_INT_BOOLEAN, 1), "true");
        assert_eq!(text(TYPE_INT_COLOR_RGB8, 0x00ff_8800), "#ffff8800");
        assert_eq!(text(TYPE_INT_COLOR_ARGB8, 0x80ff_8800), "#80ff8800");
        assert_eq!(text(TYPE_REFERENCE, 0x7f01_0002), "@0x7f010002");
        assert_eq!(text(TYPE_ATTRIBUTE, 0x0101_0098), "?0x01010098");
    }

    #[test]
    fn string_index_is_checked() {
        let err = ResValue::new(TYPE_STRING, 1).decode(&pool()).unwrap_err();
        assert!(matches!(err.kind(), ResErrorKind::InvalidPoolIndex { .. }));
    }
}
