//! Owned primitive value union.

use serde::{Deserialize, Serialize};

use crate::data_type::DataType;
use crate::datetime::{Date, DateTime, Time};
use crate::real::Real;

/// An owned, decoded primitive value.
///
/// Blank (zero-length on the wire) is deliberately not a variant here: the
/// codec surfaces blank as the absence of a value (`Option::None`) so that a
/// blank `Int` can never be confused with `Int(0)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PrimitiveValue {
    Int(i64),
    UInt(u64),
    Float(f32),
    Double(f64),
    Real(Real),
    Date(Date),
    Time(Time),
    DateTime(DateTime),
    Enum(u16),
    Buffer(Vec<u8>),
    Ascii(String),
    Utf8(String),
}

impl PrimitiveValue {
    /// The wire type tag this value encodes as.
    pub fn data_type(&self) -> DataType {
        match self {
            PrimitiveValue::Int(_) => DataType::Int,
            PrimitiveValue::UInt(_) => DataType::UInt,
            PrimitiveValue::Float(_) => DataType::Float,
            PrimitiveValue::Double(_) => DataType::Double,
            PrimitiveValue::Real(_) => DataType::Real,
            PrimitiveValue::Date(_) => DataType::Date,
            PrimitiveValue::Time(_) => DataType::Time,
            PrimitiveValue::DateTime(_) => DataType::DateTime,
            PrimitiveValue::Enum(_) => DataType::Enum,
            PrimitiveValue::Buffer(_) => DataType::Buffer,
            PrimitiveValue::Ascii(_) => DataType::AsciiString,
            PrimitiveValue::Utf8(_) => DataType::Utf8String,
        }
    }
}
