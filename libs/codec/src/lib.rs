//! # RWF Container Codec - Binary Encode/Decode State Machine
//!
//! ## Purpose
//!
//! Encodes and decodes the two container kinds of the wire format - field
//! lists (numeric-ID entries) and element lists (name-keyed entries) - plus
//! the set-definition databases and primitive arrays they depend on. All
//! encoding is buffer-bounded with explicit rollback: a failed entry never
//! leaves partial bytes committed, and a failed container can be abandoned
//! without disturbing anything encoded before it.
//!
//! ## Architecture Role
//!
//! ```text
//! ┌────────────┐     ┌──────────────────────┐     ┌────────────────┐
//! │ rwf-types  │────▶│      rwf-codec       │────▶│ rwf-watchlist  │
//! │ DataType,  │     │ iterators, field and │     │ view arrays on │
//! │ Real, ...  │     │ element containers,  │     │ the wire       │
//! └────────────┘     │ set defs, arrays     │     └────────────────┘
//!                    └──────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use rwf_codec::{
//!     decode_field_entry, decode_field_list_init, encode_field_entry,
//!     encode_field_list_init, encode_field_list_complete, DecodeIterator,
//!     EncodeIterator, FieldEntry, FieldList,
//! };
//! use rwf_types::{DataType, PrimitiveValue, Real, RealHint};
//!
//! # fn main() -> Result<(), rwf_codec::CodecError> {
//! let mut enc = EncodeIterator::with_capacity(64);
//! let list = FieldList { has_standard_data: true, ..Default::default() };
//! encode_field_list_init(&mut enc, &list, None, None, 0)?;
//! let price = PrimitiveValue::Real(Real::new(RealHint::Exponent2, 3905));
//! encode_field_entry(&mut enc, &FieldEntry::new(22, DataType::Real), Some(&price))?;
//! encode_field_list_complete(&mut enc, true)?;
//!
//! let buf = enc.into_buffer();
//! let mut dec = DecodeIterator::new(&buf);
//! decode_field_list_init(&mut dec, None, None)?;
//! while let Some(entry) = decode_field_entry(&mut dec)? {
//!     assert_eq!(entry.field_id, 22);
//! }
//! # Ok(())
//! # }
//! ```

pub mod array;
pub mod element_list;
pub mod error;
pub mod field_list;
pub mod iter;
pub mod primitives;
pub mod set_def;

pub use array::{decode_array, encode_ascii_array, encode_field_id_array, Array};
pub use element_list::{
    decode_element_entry, decode_element_list_init, encode_element_entry,
    encode_element_entry_complete, encode_element_entry_init, encode_element_list_complete,
    encode_element_list_init, ElementEntry, ElementEntryRef, ElementList, ElementListInfo,
};
pub use error::{CodecError, CodecResult};
pub use field_list::{
    decode_field_entry, decode_field_list_init, encode_field_entry, encode_field_entry_complete,
    encode_field_entry_init, encode_field_list_complete, encode_field_list_init, FieldEntry,
    FieldEntryRef, FieldList, FieldListInfo,
};
pub use iter::{DecodeIterator, EncodeIterator, EncodeOutcome, MAX_ENCODING_LEVELS};
pub use primitives::{decode_primitive, encode_primitive, encoded_size, max_encoded_size};
pub use set_def::{
    decode_local_element_set_defs, decode_local_field_set_defs, encode_local_element_set_defs,
    encode_local_field_set_defs, ElementSetDef, ElementSetDefEntry, FieldSetDef, FieldSetDefEntry,
    GlobalElementSetDefDb, GlobalFieldSetDefDb, LocalElementSetDefDb, LocalFieldSetDefDb,
    MAX_LOCAL_SET_ID, MAX_SET_ENTRIES,
};
