//! # Field List Container - Encode/Decode State Machine
//!
//! ## Purpose
//!
//! Encodes and decodes a sequence of (field ID, type, value) entries into a
//! length-framed binary container. Two entry strategies coexist in one
//! container: positional "set data" driven by a set definition, then explicit
//! "standard data" entries carrying their own identifier and type tag. The
//! per-level state machine enforces the init → entries → complete protocol
//! and guarantees rollback of any partially written entry.
//!
//! ## Wire layout
//!
//! ```text
//! flags(1) [info: len(1) dictId(u15rb) listNum(2)] [setId(u15rb)]
//! [setDataLen(u15rb)] [set entries: value(u16ob+bytes) ...]
//! [entryCount(2)] [std entries: fieldId(2) type(1) value(u16ob+bytes) ...]
//! ```
//!
//! The set-data length prefix appears only when standard data follows set
//! data, so a decoder can skip the positional region. A zero-length value is
//! the wire form of blank.

use rwf_types::{DataType, FieldId, PrimitiveValue};

use crate::error::{CodecError, CodecResult};
use crate::iter::{
    u16ob_len, ActiveSetDef, ContainerType, DecodeIterator, DecodingLevel, EncodeIterator,
    EncodeOutcome, EncodeState, EncodingLevel,
};
use crate::primitives::{decode_primitive, encode_primitive, encoded_size};
use crate::set_def::{FieldSetDef, GlobalFieldSetDefDb, LocalFieldSetDefDb, MAX_LOCAL_SET_ID};

use std::sync::Arc;

const HAS_INFO: u8 = 0x01;
const HAS_SET_DATA: u8 = 0x02;
const HAS_SET_ID: u8 = 0x04;
const HAS_STANDARD_DATA: u8 = 0x08;

/// Field list info block: dictionary reference metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldListInfo {
    pub dictionary_id: u16,
    pub field_list_num: u16,
}

/// Field list container header.
///
/// On encode, `set_data` may carry a pre-encoded positional blob; when it is
/// `None` and `has_set_data` is true, the set phase is encoded entry by
/// entry against the resolved set definition. Decode never populates
/// `set_data`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldList {
    pub info: Option<FieldListInfo>,
    pub set_id: u16,
    pub has_set_data: bool,
    pub set_data: Option<Vec<u8>>,
    pub has_standard_data: bool,
}

/// A single entry to encode: identifier plus declared primitive type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldEntry {
    pub field_id: FieldId,
    pub data_type: DataType,
}

impl FieldEntry {
    pub fn new(field_id: FieldId, data_type: DataType) -> Self {
        Self {
            field_id,
            data_type,
        }
    }
}

/// A decoded entry borrowing its value bytes from the input buffer.
/// Empty `data` is blank.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldEntryRef<'a> {
    pub field_id: FieldId,
    pub data_type: DataType,
    pub data: &'a [u8],
}

impl FieldEntryRef<'_> {
    /// Decode the entry's value; `None` is blank.
    pub fn value(&self) -> CodecResult<Option<PrimitiveValue>> {
        decode_primitive(self.data, self.data_type)
    }
}

fn resolve_field_set_def(
    set_id: u16,
    local_db: Option<&LocalFieldSetDefDb>,
    global_db: Option<&GlobalFieldSetDefDb>,
) -> Option<Arc<FieldSetDef>> {
    if set_id <= MAX_LOCAL_SET_ID {
        if let Some(def) = local_db.and_then(|db| db.get(set_id)) {
            return Some(Arc::clone(def));
        }
    }
    global_db.and_then(|db| db.get(set_id)).map(Arc::clone)
}

/// Begin encoding a field list. Pushes an encoding level and writes the
/// container header.
///
/// `set_max_size_hint` sizes the reserved set-data length prefix when the
/// positional phase is encoded entry by entry (0 reserves the wide form).
/// On `SetDefNotProvided` the level is left pushed in `WaitComplete` so the
/// caller can roll the container back with `encode_field_list_complete(iter,
/// false)`; every other failure restores the cursor and pushes nothing.
pub fn encode_field_list_init(
    iter: &mut EncodeIterator,
    list: &FieldList,
    local_db: Option<&LocalFieldSetDefDb>,
    global_db: Option<&GlobalFieldSetDefDb>,
    set_max_size_hint: usize,
) -> CodecResult<()> {
    let init_pos = iter.position();
    if iter.depth() >= crate::iter::MAX_ENCODING_LEVELS {
        return Err(CodecError::IteratorOverrun {
            max_levels: crate::iter::MAX_ENCODING_LEVELS,
        });
    }

    let mut level = EncodingLevel::new(ContainerType::FieldList, init_pos);
    level.has_standard_data = list.has_standard_data;

    let result = (|| {
        let mut flags = 0u8;
        if list.info.is_some() {
            flags |= HAS_INFO;
        }
        if list.has_set_data {
            flags |= HAS_SET_DATA;
            if list.set_id > 0 {
                flags |= HAS_SET_ID;
            }
        }
        if list.has_standard_data {
            flags |= HAS_STANDARD_DATA;
        }
        iter.write_u8(flags)?;

        if let Some(info) = &list.info {
            let info_len = crate::iter::u15rb_len(info.dictionary_id as usize) + 2;
            iter.write_u8(info_len as u8)?;
            iter.write_u15rb(info.dictionary_id as usize)?;
            iter.write_u16(info.field_list_num)?;
        }

        if list.has_set_data {
            if list.set_id > 0 {
                iter.write_u15rb(list.set_id as usize)?;
            }
            if let Some(blob) = &list.set_data {
                // Pre-encoded set data: write it through and skip the
                // positional phase entirely.
                if list.has_standard_data {
                    iter.write_u15rb(blob.len())?;
                    iter.write_bytes(blob)?;
                    level.count_pos = Some(iter.position());
                    iter.write_u16(0)?;
                    level.state = EncodeState::Entries;
                } else {
                    iter.write_bytes(blob)?;
                    level.state = EncodeState::WaitComplete;
                }
            } else {
                match resolve_field_set_def(list.set_id, local_db, global_db) {
                    None => {
                        tracing::debug!(
                            set_id = list.set_id,
                            "set definition unresolved; container left open for rollback"
                        );
                        level.state = EncodeState::WaitComplete;
                        return Err(CodecError::SetDefNotProvided {
                            set_id: list.set_id,
                        });
                    }
                    Some(def) if def.entries().is_empty() => {
                        // Zero-entry set: the positional phase is already
                        // complete. Framing still needs the empty length
                        // prefix when standard data follows.
                        if list.has_standard_data {
                            iter.write_u15rb(0)?;
                            level.count_pos = Some(iter.position());
                            iter.write_u16(0)?;
                            level.state = EncodeState::Entries;
                        } else {
                            level.state = EncodeState::WaitComplete;
                        }
                    }
                    Some(def) => {
                        if list.has_standard_data {
                            level.set_len_mark = Some(iter.reserve_u15rb(set_max_size_hint)?);
                        }
                        level.set_data_start = iter.position();
                        level.set_def = Some(ActiveSetDef::Field(def));
                        level.state = EncodeState::SetData;
                    }
                }
            }
        } else if list.has_standard_data {
            level.count_pos = Some(iter.position());
            iter.write_u16(0)?;
            level.state = EncodeState::Entries;
        } else {
            level.state = EncodeState::WaitComplete;
        }
        Ok(())
    })();

    match result {
        Ok(()) => iter.push_level(level),
        Err(err @ CodecError::SetDefNotProvided { .. }) => {
            iter.push_level(level)?;
            Err(err)
        }
        Err(err) => {
            iter.rollback_to(init_pos);
            Err(err)
        }
    }
}

/// Finish the positional phase: backfill the set-data length prefix and set
/// up the standard phase (entry count slot) or await completion.
fn finalize_set_phase(iter: &mut EncodeIterator) -> CodecResult<EncodeState> {
    let (mark, has_std) = {
        let level = iter.level().expect("level present");
        (level.set_len_mark, level.has_standard_data)
    };
    if let Some(mark) = mark {
        iter.finish_u15rb(mark)?;
    }
    if has_std {
        let count_pos = iter.position();
        iter.write_u16(0)?;
        let level = iter.level_mut().expect("level present");
        level.count_pos = Some(count_pos);
        level.set_len_mark = None;
        Ok(EncodeState::Entries)
    } else {
        let level = iter.level_mut().expect("level present");
        level.set_len_mark = None;
        Ok(EncodeState::WaitComplete)
    }
}

/// Encode one entry in a single call.
///
/// In the positional phase the identifier and declared type must match the
/// set definition's current slot; only the value is written, and consuming
/// the final slot returns [`EncodeOutcome::SetComplete`]. In the standard
/// phase the identifier, type tag, and value are all written. `None` encodes
/// blank. Failure never leaves partial entry bytes committed.
pub fn encode_field_entry(
    iter: &mut EncodeIterator,
    entry: &FieldEntry,
    value: Option<&PrimitiveValue>,
) -> CodecResult<EncodeOutcome> {
    let (state, set_def, set_pos) = match iter.level() {
        Some(level) if level.container == ContainerType::FieldList => {
            (level.state, level.set_def.clone(), level.set_pos)
        }
        _ => {
            return Err(CodecError::UnexpectedCall {
                state: "no field list in progress",
            })
        }
    };
    let entry_start = iter.position();

    match state {
        EncodeState::SetData => {
            let def = match &set_def {
                Some(ActiveSetDef::Field(def)) => def,
                _ => unreachable!("SetData state requires a field set definition"),
            };
            let def_entry = def.entries()[set_pos];
            if entry.field_id != def_entry.field_id {
                return Err(CodecError::invalid_data(format!(
                    "field {} encoded at set position {} which defines field {}",
                    entry.field_id, set_pos, def_entry.field_id
                )));
            }
            if entry.data_type != def_entry.data_type {
                return Err(CodecError::invalid_data(format!(
                    "type {} does not match set-defined type {} for field {}",
                    entry.data_type.name(),
                    def_entry.data_type.name(),
                    def_entry.field_id
                )));
            }
            let len = value.map(encoded_size).unwrap_or(0);
            iter.check_remaining(u16ob_len(len) + len)?;

            let result = (|| {
                iter.write_u16ob(len)?;
                if let Some(value) = value {
                    encode_primitive(iter, def_entry.data_type, value)?;
                }
                if set_pos + 1 == def.entries().len() {
                    let next = finalize_set_phase(iter)?;
                    let level = iter.level_mut().expect("level present");
                    level.set_pos = set_pos + 1;
                    level.state = next;
                    Ok(EncodeOutcome::SetComplete)
                } else {
                    iter.level_mut().expect("level present").set_pos = set_pos + 1;
                    Ok(EncodeOutcome::Encoded)
                }
            })();
            if result.is_err() {
                iter.rollback_to(entry_start);
            }
            result
        }
        EncodeState::Entries => {
            if let Some(value) = value {
                if value.data_type() != entry.data_type {
                    return Err(CodecError::invalid_data(format!(
                        "value of type {} in entry declared {}",
                        value.data_type().name(),
                        entry.data_type.name()
                    )));
                }
            }
            let len = value.map(encoded_size).unwrap_or(0);
            iter.check_remaining(2 + 1 + u16ob_len(len) + len)?;

            let result = (|| {
                iter.write_i16(entry.field_id)?;
                iter.write_u8(entry.data_type.into())?;
                iter.write_u16ob(len)?;
                if let Some(value) = value {
                    encode_primitive(iter, entry.data_type, value)?;
                }
                Ok(EncodeOutcome::Encoded)
            })();
            match result {
                Ok(outcome) => {
                    iter.level_mut().expect("level present").entry_count += 1;
                    Ok(outcome)
                }
                Err(err) => {
                    iter.rollback_to(entry_start);
                    Err(err)
                }
            }
        }
        other => Err(CodecError::UnexpectedCall {
            state: other.name(),
        }),
    }
}

/// Begin a multi-step entry whose value is encoded separately (typically a
/// nested container). Reserves a value-length mark sized by
/// `max_size_hint` (0 reserves the escaped 3-byte form).
pub fn encode_field_entry_init(
    iter: &mut EncodeIterator,
    entry: &FieldEntry,
    max_size_hint: usize,
) -> CodecResult<()> {
    let (state, set_def, set_pos) = match iter.level() {
        Some(level) if level.container == ContainerType::FieldList => {
            (level.state, level.set_def.clone(), level.set_pos)
        }
        _ => {
            return Err(CodecError::UnexpectedCall {
                state: "no field list in progress",
            })
        }
    };
    let entry_start = iter.position();

    let result = (|| match state {
        EncodeState::SetData => {
            let def = match &set_def {
                Some(ActiveSetDef::Field(def)) => def,
                _ => unreachable!("SetData state requires a field set definition"),
            };
            let def_entry = def.entries()[set_pos];
            if entry.field_id != def_entry.field_id || entry.data_type != def_entry.data_type {
                return Err(CodecError::invalid_data(format!(
                    "entry {}:{} does not match set position {} ({}:{})",
                    entry.field_id,
                    entry.data_type.name(),
                    set_pos,
                    def_entry.field_id,
                    def_entry.data_type.name()
                )));
            }
            let mark = iter.reserve_u16ob(max_size_hint)?;
            let level = iter.level_mut().expect("level present");
            level.entry_start = entry_start;
            level.entry_len_mark = Some(mark);
            level.state = EncodeState::SetEntryInit;
            Ok(())
        }
        EncodeState::Entries => {
            iter.check_remaining(2 + 1 + u16ob_len(max_size_hint))?;
            iter.write_i16(entry.field_id)?;
            iter.write_u8(entry.data_type.into())?;
            let mark = iter.reserve_u16ob(max_size_hint)?;
            let level = iter.level_mut().expect("level present");
            level.entry_start = entry_start;
            level.entry_len_mark = Some(mark);
            level.state = EncodeState::EntryInit;
            Ok(())
        }
        other => Err(CodecError::UnexpectedCall {
            state: other.name(),
        }),
    })();
    if result.is_err() {
        iter.rollback_to(entry_start);
    }
    result
}

/// Complete (or abandon) a multi-step entry. On `success` the reserved
/// length mark is backfilled with the nested encoding's size; otherwise the
/// cursor rolls back to the pre-init position without disturbing committed
/// siblings.
pub fn encode_field_entry_complete(
    iter: &mut EncodeIterator,
    success: bool,
) -> CodecResult<EncodeOutcome> {
    let (state, entry_start, mark, set_def, set_pos) = match iter.level() {
        Some(level) if level.container == ContainerType::FieldList => (
            level.state,
            level.entry_start,
            level.entry_len_mark,
            level.set_def.clone(),
            level.set_pos,
        ),
        _ => {
            return Err(CodecError::UnexpectedCall {
                state: "no field list in progress",
            })
        }
    };

    match state {
        EncodeState::EntryInit => {
            if success {
                let mark = mark.expect("entry mark reserved by init");
                if let Err(err) = iter.finish_u16ob(mark) {
                    iter.rollback_to(entry_start);
                    let level = iter.level_mut().expect("level present");
                    level.entry_len_mark = None;
                    level.state = EncodeState::Entries;
                    return Err(err);
                }
                let level = iter.level_mut().expect("level present");
                level.entry_count += 1;
                level.entry_len_mark = None;
                level.state = EncodeState::Entries;
            } else {
                iter.rollback_to(entry_start);
                let level = iter.level_mut().expect("level present");
                level.entry_len_mark = None;
                level.state = EncodeState::Entries;
            }
            Ok(EncodeOutcome::Encoded)
        }
        EncodeState::SetEntryInit => {
            if success {
                let mark = mark.expect("entry mark reserved by init");
                if let Err(err) = iter.finish_u16ob(mark) {
                    iter.rollback_to(entry_start);
                    let level = iter.level_mut().expect("level present");
                    level.entry_len_mark = None;
                    level.state = EncodeState::SetData;
                    return Err(err);
                }
                let def = match &set_def {
                    Some(ActiveSetDef::Field(def)) => def,
                    _ => unreachable!("SetEntryInit state requires a field set definition"),
                };
                if set_pos + 1 == def.entries().len() {
                    {
                        let level = iter.level_mut().expect("level present");
                        level.entry_len_mark = None;
                        level.state = EncodeState::SetData;
                    }
                    let next = match finalize_set_phase(iter) {
                        Ok(next) => next,
                        Err(err) => {
                            iter.rollback_to(entry_start);
                            return Err(err);
                        }
                    };
                    let level = iter.level_mut().expect("level present");
                    level.set_pos = set_pos + 1;
                    level.state = next;
                    Ok(EncodeOutcome::SetComplete)
                } else {
                    let level = iter.level_mut().expect("level present");
                    level.set_pos = set_pos + 1;
                    level.entry_len_mark = None;
                    level.state = EncodeState::SetData;
                    Ok(EncodeOutcome::Encoded)
                }
            } else {
                iter.rollback_to(entry_start);
                let level = iter.level_mut().expect("level present");
                level.entry_len_mark = None;
                level.state = EncodeState::SetData;
                Ok(EncodeOutcome::Encoded)
            }
        }
        other => Err(CodecError::UnexpectedCall {
            state: other.name(),
        }),
    }
}

/// Complete the container. Success backfills the reserved entry-count slot;
/// failure rolls the cursor back to the container's init position. The level
/// is popped on every path that returns `Ok` or performs a rollback.
pub fn encode_field_list_complete(iter: &mut EncodeIterator, success: bool) -> CodecResult<()> {
    let (state, init_pos, count_pos, entry_count) = match iter.level() {
        Some(level) if level.container == ContainerType::FieldList => (
            level.state,
            level.init_pos,
            level.count_pos,
            level.entry_count,
        ),
        _ => {
            return Err(CodecError::UnexpectedCall {
                state: "no field list in progress",
            })
        }
    };

    if !success {
        iter.rollback_to(init_pos);
        iter.pop_level();
        return Ok(());
    }

    match state {
        EncodeState::Entries | EncodeState::WaitComplete => {
            if let Some(pos) = count_pos {
                iter.patch_u16(pos, entry_count);
            }
            iter.pop_level();
            Ok(())
        }
        // Set entries still owed or a multi-step entry is open; the caller
        // can still abandon the container with success=false.
        other => Err(CodecError::UnexpectedCall {
            state: other.name(),
        }),
    }
}

/// Begin decoding a field list from the iterator's current position to the
/// end of its input. Resolves the set definition (local IDs 0-15 first, then
/// the global database) and positions the cursor at the first entry.
pub fn decode_field_list_init(
    iter: &mut DecodeIterator<'_>,
    local_db: Option<&LocalFieldSetDefDb>,
    global_db: Option<&GlobalFieldSetDefDb>,
) -> CodecResult<FieldList> {
    let end = iter.position() + iter.remaining();
    let mut level = DecodingLevel {
        container: ContainerType::FieldList,
        end,
        item_count: 0,
        next_item: 0,
        set_count: 0,
        set_pos: 0,
        set_def: None,
        entries_start: iter.position(),
        set_data_end: iter.position(),
    };
    let mut list = FieldList::default();

    if iter.remaining() == 0 {
        iter.push_level(level)?;
        return Ok(list);
    }

    let flags = iter.read_u8()?;

    if flags & HAS_INFO != 0 {
        let info_len = iter.read_u8()? as usize;
        let info_start = iter.position();
        let dictionary_id = iter.read_u15rb()?;
        let field_list_num = iter.read_u16()?;
        list.info = Some(FieldListInfo {
            dictionary_id,
            field_list_num,
        });
        if info_start + info_len > end {
            return Err(CodecError::IncompleteData { at: iter.position() });
        }
        // The length byte governs; skip any info bytes we do not understand.
        iter.set_position(info_start + info_len);
    }

    if flags & HAS_SET_DATA != 0 {
        list.has_set_data = true;
        if flags & HAS_SET_ID != 0 {
            list.set_id = iter.read_u15rb()?;
        }
        let def = resolve_field_set_def(list.set_id, local_db, global_db)
            .ok_or(CodecError::SetDefNotProvided {
                set_id: list.set_id,
            })?;

        let (set_start, set_end, entries_start) = if flags & HAS_STANDARD_DATA != 0 {
            list.has_standard_data = true;
            let set_len = iter.read_u15rb()? as usize;
            let set_start = iter.position();
            if set_start + set_len > end {
                return Err(CodecError::IncompleteData { at: set_start });
            }
            iter.set_position(set_start + set_len);
            level.item_count = iter.read_u16()? as u32;
            (set_start, set_start + set_len, iter.position())
        } else {
            (iter.position(), end, end)
        };

        level.set_count = def.entries().len() as u32;
        level.item_count += level.set_count;
        level.set_def = Some(ActiveSetDef::Field(def));
        level.set_data_end = set_end;
        level.entries_start = entries_start;
        iter.set_position(if level.set_count > 0 {
            set_start
        } else {
            entries_start
        });
    } else if flags & HAS_STANDARD_DATA != 0 {
        list.has_standard_data = true;
        level.item_count = iter.read_u16()? as u32;
        level.entries_start = iter.position();
    }

    tracing::trace!(
        set_entries = level.set_count,
        total_entries = level.item_count,
        "field list header decoded"
    );
    iter.push_level(level)?;
    Ok(list)
}

/// Decode the next entry. `Ok(None)` is the end-of-container sentinel; it
/// pops the decoding level and leaves the cursor at the container's end.
pub fn decode_field_entry<'a>(
    iter: &mut DecodeIterator<'a>,
) -> CodecResult<Option<FieldEntryRef<'a>>> {
    let (item_count, next_item, set_count, set_pos, set_def, entries_start, set_data_end, end) =
        match iter.level_mut() {
            Some(level) if level.container == ContainerType::FieldList => (
                level.item_count,
                level.next_item,
                level.set_count,
                level.set_pos,
                level.set_def.clone(),
                level.entries_start,
                level.set_data_end,
                level.end,
            ),
            _ => {
                return Err(CodecError::UnexpectedCall {
                    state: "no field list being decoded",
                })
            }
        };

    if next_item >= item_count {
        iter.pop_level();
        iter.set_position(end);
        return Ok(None);
    }

    if set_pos < set_count {
        let def = match &set_def {
            Some(ActiveSetDef::Field(def)) => def,
            _ => unreachable!("set entries owed without a field set definition"),
        };
        let def_entry = def.entries()[set_pos as usize];
        let data = iter.read_b16()?;
        if iter.position() > set_data_end {
            return Err(CodecError::IncompleteData { at: iter.position() });
        }
        let level = iter.level_mut().expect("level present");
        level.set_pos += 1;
        level.next_item += 1;
        if level.set_pos == level.set_count {
            iter.set_position(entries_start);
        }
        return Ok(Some(FieldEntryRef {
            field_id: def_entry.field_id,
            data_type: def_entry.data_type,
            data,
        }));
    }

    let field_id = iter.read_i16()?;
    let raw_type = iter.read_u8()?;
    let data_type = DataType::try_from(raw_type)
        .map_err(|_| CodecError::invalid_data(format!("unknown data type {raw_type}")))?;
    let data = iter.read_b16()?;
    if iter.position() > end {
        return Err(CodecError::IncompleteData { at: iter.position() });
    }
    iter.level_mut().expect("level present").next_item += 1;
    Ok(Some(FieldEntryRef {
        field_id,
        data_type,
        data,
    }))
}
