//! Primitive scalar codec.
//!
//! Fixed contract consumed by the container layer: encode a typed value onto
//! an iterator, decode a byte region back into a value, and report size
//! bounds for buffer-headroom checks. A zero-length region is the wire
//! representation of blank and decodes to `None`, never to a zero value.
//!
//! Integers are trimmed big-endian: leading bytes that carry no information
//! (all-zero for unsigned, redundant sign extension for signed) are dropped,
//! so an `i64` occupies between one and eight bytes.

use rwf_types::{DataType, Date, DateTime, PrimitiveValue, Real, RealHint, Time};

use crate::error::{CodecError, CodecResult};
use crate::iter::EncodeIterator;

/// Number of bytes the trimmed encoding of a signed integer occupies.
fn int_trimmed_len(v: i64) -> usize {
    for n in 1..8usize {
        let shift = 64 - 8 * n as u32;
        if (v << shift) >> shift == v {
            return n;
        }
    }
    8
}

/// Number of bytes the trimmed encoding of an unsigned integer occupies.
fn uint_trimmed_len(v: u64) -> usize {
    for n in 1..8usize {
        if v >> (8 * n) == 0 {
            return n;
        }
    }
    8
}

fn write_int_trimmed(iter: &mut EncodeIterator, v: i64) -> CodecResult<()> {
    let n = int_trimmed_len(v);
    iter.write_bytes(&v.to_be_bytes()[8 - n..])
}

fn write_uint_trimmed(iter: &mut EncodeIterator, v: u64) -> CodecResult<()> {
    let n = uint_trimmed_len(v);
    iter.write_bytes(&v.to_be_bytes()[8 - n..])
}

fn read_int_trimmed(data: &[u8]) -> CodecResult<i64> {
    if data.len() > 8 {
        return Err(CodecError::invalid_data(format!(
            "signed integer encoding of {} bytes exceeds 8",
            data.len()
        )));
    }
    let mut v: i64 = if data[0] & 0x80 != 0 { -1 } else { 0 };
    for &b in data {
        v = (v << 8) | b as i64;
    }
    Ok(v)
}

fn read_uint_trimmed(data: &[u8]) -> CodecResult<u64> {
    if data.len() > 8 {
        return Err(CodecError::invalid_data(format!(
            "unsigned integer encoding of {} bytes exceeds 8",
            data.len()
        )));
    }
    let mut v: u64 = 0;
    for &b in data {
        v = (v << 8) | b as u64;
    }
    Ok(v)
}

/// Worst-case encoded size for a primitive type, used for headroom checks
/// when the value is not yet known (multi-step entry encoding).
pub fn max_encoded_size(data_type: DataType) -> usize {
    match data_type {
        DataType::Int | DataType::UInt | DataType::Double => 8,
        DataType::Float => 4,
        DataType::Real => 9,
        DataType::Date => 4,
        DataType::Time => 5,
        DataType::DateTime => 9,
        DataType::Enum => 2,
        // Variable-length types are bounded only by the 16-bit value frame.
        DataType::Array | DataType::Buffer | DataType::AsciiString | DataType::Utf8String => {
            u16::MAX as usize
        }
    }
}

/// Exact encoded size of a value, cheap to compute before writing.
pub fn encoded_size(value: &PrimitiveValue) -> usize {
    match value {
        PrimitiveValue::Int(v) => int_trimmed_len(*v),
        PrimitiveValue::UInt(v) => uint_trimmed_len(*v),
        PrimitiveValue::Float(_) => 4,
        PrimitiveValue::Double(_) => 8,
        PrimitiveValue::Real(r) => 1 + int_trimmed_len(r.value),
        PrimitiveValue::Date(_) => 4,
        PrimitiveValue::Time(_) => 5,
        PrimitiveValue::DateTime(_) => 9,
        PrimitiveValue::Enum(v) => uint_trimmed_len(*v as u64),
        PrimitiveValue::Buffer(b) => b.len(),
        PrimitiveValue::Ascii(s) | PrimitiveValue::Utf8(s) => s.len(),
    }
}

/// Encode a primitive value. The declared type must match the value's own
/// type tag; a mismatch is a wire constraint violation, not a panic.
pub fn encode_primitive(
    iter: &mut EncodeIterator,
    data_type: DataType,
    value: &PrimitiveValue,
) -> CodecResult<()> {
    if value.data_type() != data_type {
        return Err(CodecError::invalid_data(format!(
            "value of type {} encoded as {}",
            value.data_type().name(),
            data_type.name()
        )));
    }
    match value {
        PrimitiveValue::Int(v) => write_int_trimmed(iter, *v),
        PrimitiveValue::UInt(v) => write_uint_trimmed(iter, *v),
        PrimitiveValue::Float(v) => iter.write_bytes(&v.to_be_bytes()),
        PrimitiveValue::Double(v) => iter.write_bytes(&v.to_be_bytes()),
        PrimitiveValue::Real(r) => {
            iter.write_u8(r.hint.into())?;
            write_int_trimmed(iter, r.value)
        }
        PrimitiveValue::Date(d) => {
            iter.write_u8(d.day)?;
            iter.write_u8(d.month)?;
            iter.write_u16(d.year)
        }
        PrimitiveValue::Time(t) => {
            iter.write_u8(t.hour)?;
            iter.write_u8(t.minute)?;
            iter.write_u8(t.second)?;
            iter.write_u16(t.millisecond)
        }
        PrimitiveValue::DateTime(dt) => {
            iter.write_u8(dt.date.day)?;
            iter.write_u8(dt.date.month)?;
            iter.write_u16(dt.date.year)?;
            iter.write_u8(dt.time.hour)?;
            iter.write_u8(dt.time.minute)?;
            iter.write_u8(dt.time.second)?;
            iter.write_u16(dt.time.millisecond)
        }
        PrimitiveValue::Enum(v) => write_uint_trimmed(iter, *v as u64),
        PrimitiveValue::Buffer(b) => iter.write_bytes(b),
        PrimitiveValue::Ascii(s) | PrimitiveValue::Utf8(s) => iter.write_bytes(s.as_bytes()),
    }
}

/// Decode a primitive value from its byte region. Zero-length input is
/// blank and decodes to `Ok(None)`.
pub fn decode_primitive(data: &[u8], data_type: DataType) -> CodecResult<Option<PrimitiveValue>> {
    if data.is_empty() {
        return Ok(None);
    }
    let value = match data_type {
        DataType::Int => PrimitiveValue::Int(read_int_trimmed(data)?),
        DataType::UInt => PrimitiveValue::UInt(read_uint_trimmed(data)?),
        DataType::Float => {
            let bytes: [u8; 4] = data
                .try_into()
                .map_err(|_| CodecError::invalid_data("Float encoding must be 4 bytes"))?;
            PrimitiveValue::Float(f32::from_be_bytes(bytes))
        }
        DataType::Double => {
            let bytes: [u8; 8] = data
                .try_into()
                .map_err(|_| CodecError::invalid_data("Double encoding must be 8 bytes"))?;
            PrimitiveValue::Double(f64::from_be_bytes(bytes))
        }
        DataType::Real => {
            let hint = RealHint::try_from(data[0]).map_err(|_| {
                CodecError::invalid_data(format!("unknown Real hint {:#04x}", data[0]))
            })?;
            let value = if data.len() > 1 {
                read_int_trimmed(&data[1..])?
            } else {
                0
            };
            PrimitiveValue::Real(Real::new(hint, value))
        }
        DataType::Date => {
            if data.len() != 4 {
                return Err(CodecError::invalid_data("Date encoding must be 4 bytes"));
            }
            PrimitiveValue::Date(Date::new(
                data[0],
                data[1],
                u16::from_be_bytes([data[2], data[3]]),
            ))
        }
        DataType::Time => {
            if data.len() != 5 {
                return Err(CodecError::invalid_data("Time encoding must be 5 bytes"));
            }
            PrimitiveValue::Time(Time::new(
                data[0],
                data[1],
                data[2],
                u16::from_be_bytes([data[3], data[4]]),
            ))
        }
        DataType::DateTime => {
            if data.len() != 9 {
                return Err(CodecError::invalid_data(
                    "DateTime encoding must be 9 bytes",
                ));
            }
            PrimitiveValue::DateTime(DateTime::new(
                Date::new(data[0], data[1], u16::from_be_bytes([data[2], data[3]])),
                Time::new(
                    data[4],
                    data[5],
                    data[6],
                    u16::from_be_bytes([data[7], data[8]]),
                ),
            ))
        }
        DataType::Enum => {
            if data.len() > 2 {
                return Err(CodecError::invalid_data("Enum encoding must be 1-2 bytes"));
            }
            PrimitiveValue::Enum(read_uint_trimmed(data)? as u16)
        }
        DataType::Buffer | DataType::Array => PrimitiveValue::Buffer(data.to_vec()),
        DataType::AsciiString => {
            if !data.is_ascii() {
                return Err(CodecError::invalid_data("non-ASCII byte in AsciiString"));
            }
            // Safe: just verified ASCII.
            PrimitiveValue::Ascii(String::from_utf8_lossy(data).into_owned())
        }
        DataType::Utf8String => PrimitiveValue::Utf8(
            String::from_utf8(data.to_vec())
                .map_err(|_| CodecError::invalid_data("invalid UTF-8 in Utf8String"))?,
        ),
    };
    Ok(Some(value))
}
