//! Base types and their raw field values.

use crate::decode::reader::{BinaryReader, Endian, ReadError};

/// A FIT base type, as declared in a definition field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaseType {
    /// `enum`
    Enum,
    /// `sint8`
    I8,
    /// `uint8`
    U8,
    /// `sint16`
    I16,
    /// `uint16`
    U16,
    /// `sint32`
    I32,
    /// `uint32`
    U32,
    /// `string`
    String,
    /// `float32`
    F32,
    /// `float64`
    F64,
    /// `uint8z`
    U8Z,
    /// `uint16z`
    U16Z,
    /// `uint32z`
    U32Z,
    /// `byte`
    Byte,
    /// `sint64`
    I64,
    /// `uint64`
    U64,
    /// `uint64z`
    U64Z,
}

impl BaseType {
    /// Identify a base type from its definition byte.
    ///
    /// The endian-ability bit (0x80) is ignored when matching on the base type
    /// number, since some encoders leave it clear for multi-byte types.
    pub fn from_byte(b: u8) -> Option<Self> {
        Some(match b & 0x1F {
            0x00 => Self::Enum,
            0x01 => Self::I8,
            0x02 => Self::U8,
            0x03 => Self::I16,
            0x04 => Self::U16,
            0x05 => Self::I32,
            0x06 => Self::U32,
            0x07 => Self::String,
            0x08 => Self::F32,
            0x09 => Self::F64,
            0x0A => Self::U8Z,
            0x0B => Self::U16Z,
            0x0C => Self::U32Z,
            0x0D => Self::Byte,
            0x0E => Self::I64,
            0x0F => Self::U64,
            0x10 => Self::U64Z,
            _ => None?,
        })
    }

    /// Width of a single element in bytes.
    pub fn width(self) -> usize {
        match self {
            Self::Enum | Self::I8 | Self::U8 | Self::String | Self::U8Z | Self::Byte => 1,
            Self::I16 | Self::U16 | Self::U16Z => 2,
            Self::I32 | Self::U32 | Self::F32 | Self::U32Z => 4,
            Self::F64 | Self::I64 | Self::U64 | Self::U64Z => 8,
        }
    }

    /// Decode one element. `r` must be exactly [`width`](Self::width) bytes.
    ///
    /// Returns `None` if the element holds its 'invalid' marker value.
    pub fn decode(self, r: &[u8], endian: Endian) -> Option<RawValue> {
        if r.len() != self.width() {
            return None;
        }

        let mut r = BinaryReader::new(r);
        let e = endian;

        match self {
            Self::Enum | Self::U8 | Self::Byte => unsigned(r.read_u8(e), u8::MAX),
            Self::U8Z | Self::String => unsigned(r.read_u8(e), u8::MIN),
            Self::U16 => unsigned(r.read_u16(e), u16::MAX),
            Self::U16Z => unsigned(r.read_u16(e), u16::MIN),
            Self::U32 => unsigned(r.read_u32(e), u32::MAX),
            Self::U32Z => unsigned(r.read_u32(e), u32::MIN),
            Self::U64 => unsigned(r.read_u64(e), u64::MAX),
            Self::U64Z => unsigned(r.read_u64(e), u64::MIN),

            Self::I8 => signed(r.read_i8(e), i8::MAX),
            Self::I16 => signed(r.read_i16(e), i16::MAX),
            Self::I32 => signed(r.read_i32(e), i32::MAX),
            Self::I64 => signed(r.read_i64(e), i64::MAX),

            // Floats are invalid when every bit is set.
            Self::F32 => {
                let x = r.read_f32(e).ok()?;
                (x.to_bits() != u32::MAX).then(|| RawValue::Float(x as f64))
            }
            Self::F64 => {
                let x = r.read_f64(e).ok()?;
                (x.to_bits() != u64::MAX).then_some(RawValue::Float(x))
            }
        }
    }
}

/// A single decoded element, before profile scaling.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RawValue {
    Unsigned(u64),
    Signed(i64),
    Float(f64),
}

impl RawValue {
    pub fn as_f64(self) -> f64 {
        match self {
            Self::Unsigned(v) => v as f64,
            Self::Signed(v) => v as f64,
            Self::Float(v) => v,
        }
    }
}

fn unsigned<T: Into<u64> + PartialEq>(x: Result<T, ReadError>, invalid: T) -> Option<RawValue> {
    let x = x.ok()?;
    (x != invalid).then(|| RawValue::Unsigned(x.into()))
}

fn signed<T: Into<i64> + PartialEq>(x: Result<T, ReadError>, invalid: T) -> Option<RawValue> {
    let x = x.ok()?;
    (x != invalid).then(|| RawValue::Signed(x.into()))
}
