//! # Encode/Decode Iterators - Cursor and Level-Stack Management
//!
//! ## Purpose
//!
//! The iterators own the byte cursor for one message's worth of encoding or
//! decoding, plus an explicit stack of per-container level frames for nested
//! containers. All saved positions are buffer-relative offsets, never
//! pointers, so rollback after a failed entry is a plain cursor restore.
//!
//! ## Invariants
//!
//! - The write cursor never exceeds the buffer end; every write performs an
//!   overrun check before mutating anything.
//! - The encode buffer's length is fixed for the duration of one message
//!   encode. `set_buffer` is the only way to change it, and it resets all
//!   level state.
//! - A level frame is pushed by a successful container-init call and popped
//!   by the matching container-complete call.
//!
//! ## Length encodings
//!
//! Two extensible length forms appear throughout the wire format:
//!
//! - `u15rb` (reserved-bit 15-bit): values below 0x80 take one byte; larger
//!   values take two bytes with the high bit set. Maximum 0x7FFF.
//! - `u16ob` (optimistic byte): values below 0xFE take one byte; larger
//!   values take three bytes - the 0xFE marker followed by a big-endian u16.
//!
//! Both support reserve-then-backfill "marks" for lengths that are unknown
//! until encoding of the enclosed region finishes.

use std::sync::Arc;

use crate::error::{CodecError, CodecResult};
use crate::set_def::{ElementSetDef, FieldSetDef};

/// Maximum supported container nesting depth per iterator.
pub const MAX_ENCODING_LEVELS: usize = 16;

/// u15rb maximum encodable value.
pub(crate) const U15_MAX: usize = 0x7FFF;
/// u16ob escape marker.
pub(crate) const U16OB_ESCAPE: u8 = 0xFE;

/// Outcome of a successful entry encode call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeOutcome {
    /// The entry was written; more entries may follow in the current phase.
    Encoded,
    /// The entry was written and it was the final positional entry of the
    /// set-data phase; the container has moved on to standard data (or is
    /// awaiting completion).
    SetComplete,
}

/// Container kind tracked on a level frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerType {
    FieldList,
    ElementList,
}

/// Per-level encoding state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeState {
    /// Level pushed, header not yet finished (transient inside init).
    None,
    /// Positional set-data phase: entries are driven by the set definition.
    SetData,
    /// Multi-step set-data entry in progress.
    SetEntryInit,
    /// Standard-data phase: entries carry their own identifier and type.
    Entries,
    /// Multi-step standard entry in progress.
    EntryInit,
    /// No further entries expected; only complete is valid.
    WaitComplete,
}

impl EncodeState {
    pub(crate) fn name(&self) -> &'static str {
        match self {
            EncodeState::None => "None",
            EncodeState::SetData => "SetData",
            EncodeState::SetEntryInit => "SetEntryInit",
            EncodeState::Entries => "Entries",
            EncodeState::EntryInit => "EntryInit",
            EncodeState::WaitComplete => "WaitComplete",
        }
    }
}

/// Set definition resolved for the active container, shared not copied.
#[derive(Debug, Clone)]
pub(crate) enum ActiveSetDef {
    Field(Arc<FieldSetDef>),
    Element(Arc<ElementSetDef>),
}

impl ActiveSetDef {
    pub(crate) fn entry_count(&self) -> usize {
        match self {
            ActiveSetDef::Field(def) => def.entries().len(),
            ActiveSetDef::Element(def) => def.entries().len(),
        }
    }
}

/// A reserved length-prefix slot awaiting backfill.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Mark {
    /// Offset of the first reserved byte.
    pub pos: usize,
    /// Reserved width: 1 or 2 for u15rb, 1 or 3 for u16ob.
    pub width: u8,
}

/// One nesting depth's worth of in-progress container-encode state.
#[derive(Debug, Clone)]
pub(crate) struct EncodingLevel {
    pub container: ContainerType,
    pub state: EncodeState,
    /// Rollback offset for the whole container.
    pub init_pos: usize,
    /// Rollback offset for the entry currently being encoded.
    pub entry_start: usize,
    /// Offset of the reserved 2-byte standard-entry count slot.
    pub count_pos: Option<usize>,
    /// Standard entries committed so far (set-phase entries are not counted).
    pub entry_count: u16,
    /// Whether the header advertised standard data.
    pub has_standard_data: bool,
    /// Resolved set definition driving the positional phase.
    pub set_def: Option<ActiveSetDef>,
    /// Next positional index into the set definition.
    pub set_pos: usize,
    /// Reserved set-data length mark (present when standard data follows).
    pub set_len_mark: Option<Mark>,
    /// Offset where set-data bytes begin, for mark backfill.
    pub set_data_start: usize,
    /// Reserved value-length mark of a multi-step entry.
    pub entry_len_mark: Option<Mark>,
}

impl EncodingLevel {
    pub(crate) fn new(container: ContainerType, init_pos: usize) -> Self {
        Self {
            container,
            state: EncodeState::None,
            init_pos,
            entry_start: init_pos,
            count_pos: None,
            entry_count: 0,
            has_standard_data: false,
            set_def: None,
            set_pos: 0,
            set_len_mark: None,
            set_data_start: init_pos,
            entry_len_mark: None,
        }
    }
}

/// Number of bytes a u15rb encoding of `v` occupies.
pub(crate) fn u15rb_len(v: usize) -> usize {
    if v < 0x80 {
        1
    } else {
        2
    }
}

/// Number of bytes a u16ob encoding of `v` occupies.
pub(crate) fn u16ob_len(v: usize) -> usize {
    if v < U16OB_ESCAPE as usize {
        1
    } else {
        3
    }
}

/// Write cursor over a fixed-capacity output buffer.
///
/// The iterator owns the buffer for the duration of one message encode.
/// `buffer()` exposes the committed prefix; `into_buffer()` consumes the
/// iterator and returns the trimmed output.
#[derive(Debug, Default)]
pub struct EncodeIterator {
    buf: Vec<u8>,
    cur: usize,
    levels: Vec<EncodingLevel>,
}

impl EncodeIterator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an iterator over a fresh zeroed buffer of `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> Self {
        let mut iter = Self::new();
        iter.set_buffer(vec![0u8; capacity]);
        iter
    }

    /// Attach an output buffer, resetting the cursor and all level state.
    /// The buffer's length is the fixed encode capacity.
    pub fn set_buffer(&mut self, buf: Vec<u8>) {
        self.buf = buf;
        self.cur = 0;
        self.levels.clear();
    }

    /// Current write offset.
    pub fn position(&self) -> usize {
        self.cur
    }

    /// Bytes of space left in the buffer.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.cur
    }

    /// Committed output so far.
    pub fn buffer(&self) -> &[u8] {
        &self.buf[..self.cur]
    }

    /// Consume the iterator, returning the encoded bytes.
    pub fn into_buffer(mut self) -> Vec<u8> {
        self.buf.truncate(self.cur);
        self.buf
    }

    /// Current nesting depth.
    pub fn depth(&self) -> usize {
        self.levels.len()
    }

    pub(crate) fn check_remaining(&self, needed: usize) -> CodecResult<()> {
        if needed > self.remaining() {
            return Err(CodecError::BufferTooSmall {
                needed,
                remaining: self.remaining(),
            });
        }
        Ok(())
    }

    pub(crate) fn rollback_to(&mut self, pos: usize) {
        debug_assert!(pos <= self.cur, "rollback must move the cursor backwards");
        self.cur = pos;
    }

    pub(crate) fn write_u8(&mut self, v: u8) -> CodecResult<()> {
        self.check_remaining(1)?;
        self.buf[self.cur] = v;
        self.cur += 1;
        Ok(())
    }

    pub(crate) fn write_u16(&mut self, v: u16) -> CodecResult<()> {
        self.check_remaining(2)?;
        self.buf[self.cur..self.cur + 2].copy_from_slice(&v.to_be_bytes());
        self.cur += 2;
        Ok(())
    }

    pub(crate) fn write_i16(&mut self, v: i16) -> CodecResult<()> {
        self.check_remaining(2)?;
        self.buf[self.cur..self.cur + 2].copy_from_slice(&v.to_be_bytes());
        self.cur += 2;
        Ok(())
    }

    pub(crate) fn write_bytes(&mut self, data: &[u8]) -> CodecResult<()> {
        self.check_remaining(data.len())?;
        self.buf[self.cur..self.cur + data.len()].copy_from_slice(data);
        self.cur += data.len();
        Ok(())
    }

    /// Write a reserved-bit 15-bit value. Values above 0x7FFF are a wire
    /// constraint violation.
    pub(crate) fn write_u15rb(&mut self, v: usize) -> CodecResult<()> {
        if v > U15_MAX {
            return Err(CodecError::invalid_data(format!(
                "value {v} exceeds the 15-bit length maximum"
            )));
        }
        if v < 0x80 {
            self.write_u8(v as u8)
        } else {
            self.write_u16(0x8000 | v as u16)
        }
    }

    /// Write an optimistic-byte 16-bit value.
    pub(crate) fn write_u16ob(&mut self, v: usize) -> CodecResult<()> {
        if v > u16::MAX as usize {
            return Err(CodecError::invalid_data(format!(
                "value {v} exceeds the 16-bit length maximum"
            )));
        }
        if v < U16OB_ESCAPE as usize {
            self.write_u8(v as u8)
        } else {
            self.check_remaining(3)?;
            self.buf[self.cur] = U16OB_ESCAPE;
            self.buf[self.cur + 1..self.cur + 3].copy_from_slice(&(v as u16).to_be_bytes());
            self.cur += 3;
            Ok(())
        }
    }

    /// Reserve a u15rb mark sized for `max_hint` (0 means unknown, reserving
    /// the wide form).
    pub(crate) fn reserve_u15rb(&mut self, max_hint: usize) -> CodecResult<Mark> {
        let width: u8 = if max_hint != 0 && max_hint < 0x80 { 1 } else { 2 };
        self.check_remaining(width as usize)?;
        let mark = Mark {
            pos: self.cur,
            width,
        };
        self.cur += width as usize;
        Ok(mark)
    }

    /// Reserve a u16ob mark sized for `max_hint` (0 means unknown, reserving
    /// the escaped form).
    pub(crate) fn reserve_u16ob(&mut self, max_hint: usize) -> CodecResult<Mark> {
        let width: u8 = if max_hint != 0 && max_hint < U16OB_ESCAPE as usize {
            1
        } else {
            3
        };
        self.check_remaining(width as usize)?;
        let mark = Mark {
            pos: self.cur,
            width,
        };
        self.cur += width as usize;
        Ok(mark)
    }

    /// Backfill a u15rb mark with the length of everything written after it.
    pub(crate) fn finish_u15rb(&mut self, mark: Mark) -> CodecResult<()> {
        let len = self.cur - mark.pos - mark.width as usize;
        match mark.width {
            1 => {
                if len >= 0x80 {
                    return Err(CodecError::invalid_data(format!(
                        "length {len} does not fit the reserved 1-byte prefix"
                    )));
                }
                self.buf[mark.pos] = len as u8;
            }
            2 => {
                if len > U15_MAX {
                    return Err(CodecError::invalid_data(format!(
                        "length {len} exceeds the 15-bit length maximum"
                    )));
                }
                self.buf[mark.pos..mark.pos + 2]
                    .copy_from_slice(&(0x8000u16 | len as u16).to_be_bytes());
            }
            _ => unreachable!("u15rb marks are 1 or 2 bytes"),
        }
        Ok(())
    }

    /// Backfill a u16ob mark with the length of everything written after it.
    pub(crate) fn finish_u16ob(&mut self, mark: Mark) -> CodecResult<()> {
        let len = self.cur - mark.pos - mark.width as usize;
        match mark.width {
            1 => {
                if len >= U16OB_ESCAPE as usize {
                    return Err(CodecError::invalid_data(format!(
                        "length {len} does not fit the reserved 1-byte prefix"
                    )));
                }
                self.buf[mark.pos] = len as u8;
            }
            3 => {
                if len > u16::MAX as usize {
                    return Err(CodecError::invalid_data(format!(
                        "length {len} exceeds the 16-bit length maximum"
                    )));
                }
                self.buf[mark.pos] = U16OB_ESCAPE;
                self.buf[mark.pos + 1..mark.pos + 3]
                    .copy_from_slice(&(len as u16).to_be_bytes());
            }
            _ => unreachable!("u16ob marks are 1 or 3 bytes"),
        }
        Ok(())
    }

    /// Backfill the reserved 2-byte entry count slot.
    pub(crate) fn patch_u16(&mut self, pos: usize, v: u16) {
        self.buf[pos..pos + 2].copy_from_slice(&v.to_be_bytes());
    }

    pub(crate) fn push_level(&mut self, level: EncodingLevel) -> CodecResult<()> {
        if self.levels.len() >= MAX_ENCODING_LEVELS {
            return Err(CodecError::IteratorOverrun {
                max_levels: MAX_ENCODING_LEVELS,
            });
        }
        self.levels.push(level);
        Ok(())
    }

    pub(crate) fn pop_level(&mut self) -> Option<EncodingLevel> {
        self.levels.pop()
    }

    pub(crate) fn level_mut(&mut self) -> Option<&mut EncodingLevel> {
        self.levels.last_mut()
    }

    pub(crate) fn level(&self) -> Option<&EncodingLevel> {
        self.levels.last()
    }
}

/// One nesting depth's worth of in-progress container-decode state.
#[derive(Debug, Clone)]
pub(crate) struct DecodingLevel {
    pub container: ContainerType,
    /// Exclusive end of this container's byte region.
    pub end: usize,
    /// Total entries: set-definition count plus standard count.
    pub item_count: u32,
    pub next_item: u32,
    /// Entries owed to the positional set-data phase.
    pub set_count: u32,
    pub set_pos: u32,
    pub set_def: Option<ActiveSetDef>,
    /// Offset where standard entries begin (after any set data).
    pub entries_start: usize,
    /// Exclusive end of the set-data region.
    pub set_data_end: usize,
}

/// Read cursor over an input byte slice with a decoding-level stack.
#[derive(Debug)]
pub struct DecodeIterator<'a> {
    data: &'a [u8],
    cur: usize,
    levels: Vec<DecodingLevel>,
}

impl<'a> DecodeIterator<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            cur: 0,
            levels: Vec::new(),
        }
    }

    pub fn position(&self) -> usize {
        self.cur
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.cur
    }

    pub(crate) fn set_position(&mut self, pos: usize) {
        debug_assert!(pos <= self.data.len());
        self.cur = pos;
    }

    fn incomplete(&self) -> CodecError {
        CodecError::IncompleteData { at: self.cur }
    }

    pub(crate) fn read_u8(&mut self) -> CodecResult<u8> {
        if self.remaining() < 1 {
            return Err(self.incomplete());
        }
        let v = self.data[self.cur];
        self.cur += 1;
        Ok(v)
    }

    pub(crate) fn read_u16(&mut self) -> CodecResult<u16> {
        if self.remaining() < 2 {
            return Err(self.incomplete());
        }
        let v = u16::from_be_bytes([self.data[self.cur], self.data[self.cur + 1]]);
        self.cur += 2;
        Ok(v)
    }

    pub(crate) fn read_i16(&mut self) -> CodecResult<i16> {
        Ok(self.read_u16()? as i16)
    }

    pub(crate) fn read_bytes(&mut self, len: usize) -> CodecResult<&'a [u8]> {
        if self.remaining() < len {
            return Err(self.incomplete());
        }
        let slice = &self.data[self.cur..self.cur + len];
        self.cur += len;
        Ok(slice)
    }

    /// Read a reserved-bit 15-bit value.
    pub(crate) fn read_u15rb(&mut self) -> CodecResult<u16> {
        let first = self.read_u8()?;
        if first < 0x80 {
            Ok(first as u16)
        } else {
            let second = self.read_u8()?;
            Ok((((first & 0x7F) as u16) << 8) | second as u16)
        }
    }

    /// Read an optimistic-byte 16-bit value.
    pub(crate) fn read_u16ob(&mut self) -> CodecResult<u16> {
        let first = self.read_u8()?;
        if first < U16OB_ESCAPE {
            Ok(first as u16)
        } else if first == U16OB_ESCAPE {
            self.read_u16()
        } else {
            Err(CodecError::invalid_data(format!(
                "invalid length marker {first:#04x}"
            )))
        }
    }

    /// Read a u16ob length prefix followed by that many bytes.
    pub(crate) fn read_b16(&mut self) -> CodecResult<&'a [u8]> {
        let len = self.read_u16ob()? as usize;
        self.read_bytes(len)
    }

    /// Read a u15rb length prefix followed by that many bytes.
    pub(crate) fn read_b15(&mut self) -> CodecResult<&'a [u8]> {
        let len = self.read_u15rb()? as usize;
        self.read_bytes(len)
    }

    pub(crate) fn push_level(&mut self, level: DecodingLevel) -> CodecResult<()> {
        if self.levels.len() >= MAX_ENCODING_LEVELS {
            return Err(CodecError::IteratorOverrun {
                max_levels: MAX_ENCODING_LEVELS,
            });
        }
        self.levels.push(level);
        Ok(())
    }

    pub(crate) fn pop_level(&mut self) -> Option<DecodingLevel> {
        self.levels.pop()
    }

    pub(crate) fn level_mut(&mut self) -> Option<&mut DecodingLevel> {
        self.levels.last_mut()
    }
}
