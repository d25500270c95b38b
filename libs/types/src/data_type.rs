//! RWF primitive type registry.
//!
//! Type tag numbering follows the original wire-format table; the values are
//! written to the wire as single bytes and must never be renumbered.

use num_enum::{IntoPrimitive, TryFromPrimitive};
use serde::{Deserialize, Serialize};

/// Primitive data type tag carried (or implied by a set definition) for every
/// container entry.
#[repr(u8)]
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    TryFromPrimitive,
    IntoPrimitive,
    Serialize,
    Deserialize,
)]
pub enum DataType {
    /// Variable-length signed integer, 1-8 bytes trimmed big-endian.
    Int = 3,
    /// Variable-length unsigned integer, 1-8 bytes trimmed big-endian.
    UInt = 4,
    /// IEEE-754 single precision, 4 bytes.
    Float = 5,
    /// IEEE-754 double precision, 8 bytes.
    Double = 6,
    /// Scaled decimal: hint byte followed by a trimmed signed integer.
    Real = 8,
    /// Calendar date: day, month, 2-byte year.
    Date = 9,
    /// Time of day: hour, minute, second, 2-byte millisecond.
    Time = 10,
    /// Date followed by time.
    DateTime = 11,
    /// Enumerated value, trimmed 2-byte unsigned.
    Enum = 14,
    /// Homogeneous primitive array (itself containing a typed item list).
    Array = 15,
    /// Opaque byte sequence.
    Buffer = 16,
    /// ASCII character sequence.
    AsciiString = 17,
    /// UTF-8 character sequence.
    Utf8String = 18,
}

impl DataType {
    /// Human-readable name, used in diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            DataType::Int => "Int",
            DataType::UInt => "UInt",
            DataType::Float => "Float",
            DataType::Double => "Double",
            DataType::Real => "Real",
            DataType::Date => "Date",
            DataType::Time => "Time",
            DataType::DateTime => "DateTime",
            DataType::Enum => "Enum",
            DataType::Array => "Array",
            DataType::Buffer => "Buffer",
            DataType::AsciiString => "AsciiString",
            DataType::Utf8String => "Utf8String",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_values_are_stable() {
        assert_eq!(DataType::Int as u8, 3);
        assert_eq!(DataType::Real as u8, 8);
        assert_eq!(DataType::Enum as u8, 14);
        assert_eq!(DataType::AsciiString as u8, 17);
    }

    #[test]
    fn try_from_round_trips() {
        for ty in [
            DataType::Int,
            DataType::UInt,
            DataType::Real,
            DataType::Date,
            DataType::Buffer,
        ] {
            assert_eq!(DataType::try_from(ty as u8).unwrap(), ty);
        }
        // Gaps in the table are rejected.
        assert!(DataType::try_from(7u8).is_err());
        assert!(DataType::try_from(0u8).is_err());
    }
}
