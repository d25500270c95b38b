//! # RWF Type System - Primitive Wire Types
//!
//! ## Purpose
//!
//! Pure data structures for the RWF binary wire format: the primitive type
//! registry, scalar value representations (`Real`, `Date`, `Time`), and the
//! owned `PrimitiveValue` union that the codec layer encodes and decodes.
//! This crate deliberately contains no encoding rules - byte layout belongs
//! in `rwf-codec`.
//!
//! ## Architecture Role
//!
//! ```text
//! rwf-types  →  rwf-codec  →  rwf-watchlist
//!     ↑             ↓               ↓
//! Pure Data    Wire Rules      View Engine
//! DataType     Containers      Aggregation
//! Real/Date    Set Defs        Upstream Views
//! ```
//!
//! ## What This Crate Contains
//! - `DataType`: the RWF primitive type tag registry
//! - `Real`: scaled decimal with exponent/fraction hints
//! - `Date`, `Time`, `DateTime`: calendar primitives with blank encoding
//! - `PrimitiveValue`: owned tagged union over all primitive types
//! - `FieldId`: 16-bit signed field identifier
//!
//! ## What This Crate Does NOT Contain
//! - Byte-level encode/decode logic (belongs in rwf-codec)
//! - Container or message structures (belongs in rwf-codec)

pub mod data_type;
pub mod datetime;
pub mod real;
pub mod value;

pub use data_type::DataType;
pub use datetime::{Date, DateTime, Time};
pub use real::{Real, RealHint};
pub use value::PrimitiveValue;

/// Field identifier as carried on the wire: a 16-bit signed integer.
///
/// Zero is the sentinel "no field" value and is stripped by the watchlist
/// view engine; negative IDs address provider-defined dictionary ranges.
pub type FieldId = i16;
