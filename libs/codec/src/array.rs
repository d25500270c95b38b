//! Primitive array codec.
//!
//! A uniform-type collection used chiefly to carry view specifications:
//! either a list of field IDs or a list of ASCII names. Wire layout is
//! `type(1) itemLength(1) count(2)` followed by the items. A non-zero item
//! length means fixed-width items with no per-item prefix; zero means
//! variable-width items, each carried as `u16ob length + bytes`.

use rwf_types::{DataType, FieldId};

use crate::error::{CodecError, CodecResult};
use crate::iter::{DecodeIterator, EncodeIterator};

/// A decoded primitive array.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Array {
    /// Fixed-width `Int` items, two bytes each: field IDs.
    FieldIds(Vec<FieldId>),
    /// Variable-width `AsciiString` items: element names.
    Ascii(Vec<Vec<u8>>),
}

impl Array {
    pub fn len(&self) -> usize {
        match self {
            Array::FieldIds(ids) => ids.len(),
            Array::Ascii(names) => names.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Encode a field-ID array: `Int` items at a fixed width of two bytes.
pub fn encode_field_id_array(iter: &mut EncodeIterator, ids: &[FieldId]) -> CodecResult<()> {
    let start = iter.position();
    let result = (|| {
        if ids.len() > u16::MAX as usize {
            return Err(CodecError::invalid_data(format!(
                "array of {} items exceeds the 16-bit count",
                ids.len()
            )));
        }
        iter.write_u8(DataType::Int.into())?;
        iter.write_u8(2)?;
        iter.write_u16(ids.len() as u16)?;
        for &id in ids {
            iter.write_i16(id)?;
        }
        Ok(())
    })();
    if result.is_err() {
        iter.rollback_to(start);
    }
    result
}

/// Encode an ASCII-name array: variable-width items, each length-prefixed.
pub fn encode_ascii_array(iter: &mut EncodeIterator, names: &[Vec<u8>]) -> CodecResult<()> {
    let start = iter.position();
    let result = (|| {
        if names.len() > u16::MAX as usize {
            return Err(CodecError::invalid_data(format!(
                "array of {} items exceeds the 16-bit count",
                names.len()
            )));
        }
        iter.write_u8(DataType::AsciiString.into())?;
        iter.write_u8(0)?;
        iter.write_u16(names.len() as u16)?;
        for name in names {
            iter.write_u16ob(name.len())?;
            iter.write_bytes(name)?;
        }
        Ok(())
    })();
    if result.is_err() {
        iter.rollback_to(start);
    }
    result
}

/// Decode an array. Only the two shapes this codec produces are accepted:
/// two-byte `Int` items or variable-width `AsciiString` items.
pub fn decode_array(iter: &mut DecodeIterator<'_>) -> CodecResult<Array> {
    let raw_type = iter.read_u8()?;
    let data_type = DataType::try_from(raw_type)
        .map_err(|_| CodecError::invalid_data(format!("unknown array item type {raw_type}")))?;
    let item_len = iter.read_u8()? as usize;
    let count = iter.read_u16()? as usize;

    match (data_type, item_len) {
        (DataType::Int, 2) => {
            let mut ids = Vec::with_capacity(count);
            for _ in 0..count {
                ids.push(iter.read_i16()?);
            }
            Ok(Array::FieldIds(ids))
        }
        (DataType::AsciiString, 0) => {
            let mut names = Vec::with_capacity(count);
            for _ in 0..count {
                names.push(iter.read_b16()?.to_vec());
            }
            Ok(Array::Ascii(names))
        }
        _ => Err(CodecError::invalid_data(format!(
            "unsupported array shape: type {} with item length {item_len}",
            data_type.name()
        ))),
    }
}
