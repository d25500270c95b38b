//! Element list container codec.
//!
//! The name-keyed sibling of the field list: entries are identified by a
//! length-prefixed byte-string name instead of a numeric field ID, and the
//! standard entry layout is `name(u15rb+bytes) type(1) value(u16ob+bytes)`.
//! Flags, info block framing, set-data phasing, and the per-level state
//! machine are otherwise identical to [`crate::field_list`].

use std::borrow::Cow;
use std::sync::Arc;

use rwf_types::{DataType, PrimitiveValue};

use crate::error::{CodecError, CodecResult};
use crate::iter::{
    u15rb_len, u16ob_len, ActiveSetDef, ContainerType, DecodeIterator, DecodingLevel,
    EncodeIterator, EncodeOutcome, EncodeState, EncodingLevel,
};
use crate::primitives::{decode_primitive, encode_primitive, encoded_size};
use crate::set_def::{
    ElementSetDef, GlobalElementSetDefDb, LocalElementSetDefDb, MAX_LOCAL_SET_ID,
};

const HAS_INFO: u8 = 0x01;
const HAS_SET_DATA: u8 = 0x02;
const HAS_SET_ID: u8 = 0x04;
const HAS_STANDARD_DATA: u8 = 0x08;

/// Element list info block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElementListInfo {
    pub element_list_num: u16,
}

/// Element list container header; see [`crate::FieldList`] for the field
/// semantics shared between the two container kinds.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ElementList {
    pub info: Option<ElementListInfo>,
    pub set_id: u16,
    pub has_set_data: bool,
    pub set_data: Option<Vec<u8>>,
    pub has_standard_data: bool,
}

/// A single element entry to encode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementEntry {
    pub name: Vec<u8>,
    pub data_type: DataType,
}

impl ElementEntry {
    pub fn new(name: impl Into<Vec<u8>>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }
}

/// A decoded element entry. Standard entries borrow their name from the
/// input buffer; set-data entries borrow it from the set definition, hence
/// the owned variant of the `Cow`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementEntryRef<'a> {
    pub name: Cow<'a, [u8]>,
    pub data_type: DataType,
    pub data: &'a [u8],
}

impl ElementEntryRef<'_> {
    /// Decode the entry's value; `None` is blank.
    pub fn value(&self) -> CodecResult<Option<PrimitiveValue>> {
        decode_primitive(self.data, self.data_type)
    }
}

fn resolve_element_set_def(
    set_id: u16,
    local_db: Option<&LocalElementSetDefDb>,
    global_db: Option<&GlobalElementSetDefDb>,
) -> Option<Arc<ElementSetDef>> {
    if set_id <= MAX_LOCAL_SET_ID {
        if let Some(def) = local_db.and_then(|db| db.get(set_id)) {
            return Some(Arc::clone(def));
        }
    }
    global_db.and_then(|db| db.get(set_id)).map(Arc::clone)
}

/// Begin encoding an element list; the protocol and failure contract match
/// [`crate::encode_field_list_init`].
pub fn encode_element_list_init(
    iter: &mut EncodeIterator,
    list: &ElementList,
    local_db: Option<&LocalElementSetDefDb>,
    global_db: Option<&GlobalElementSetDefDb>,
    set_max_size_hint: usize,
) -> CodecResult<()> {
    let init_pos = iter.position();
    if iter.depth() >= crate::iter::MAX_ENCODING_LEVELS {
        return Err(CodecError::IteratorOverrun {
            max_levels: crate::iter::MAX_ENCODING_LEVELS,
        });
    }

    let mut level = EncodingLevel::new(ContainerType::ElementList, init_pos);
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
            iter.write_u8(2)?;
            iter.write_u16(info.element_list_num)?;
        }

        if list.has_set_data {
            if list.set_id > 0 {
                iter.write_u15rb(list.set_id as usize)?;
            }
            if let Some(blob) = &list.set_data {
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
                match resolve_element_set_def(list.set_id, local_db, global_db) {
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
                        level.set_def = Some(ActiveSetDef::Element(def));
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

/// Encode one element entry in a single call; the phasing contract matches
/// [`crate::encode_field_entry`].
pub fn encode_element_entry(
    iter: &mut EncodeIterator,
    entry: &ElementEntry,
    value: Option<&PrimitiveValue>,
) -> CodecResult<EncodeOutcome> {
    let (state, set_def, set_pos) = match iter.level() {
        Some(level) if level.container == ContainerType::ElementList => {
            (level.state, level.set_def.clone(), level.set_pos)
        }
        _ => {
            return Err(CodecError::UnexpectedCall {
                state: "no element list in progress",
            })
        }
    };
    let entry_start = iter.position();

    match state {
        EncodeState::SetData => {
            let def = match &set_def {
                Some(ActiveSetDef::Element(def)) => def,
                _ => unreachable!("SetData state requires an element set definition"),
            };
            let def_entry = &def.entries()[set_pos];
            if entry.name != def_entry.name {
                return Err(CodecError::invalid_data(format!(
                    "element {:?} encoded at set position {set_pos} which defines {:?}",
                    String::from_utf8_lossy(&entry.name),
                    String::from_utf8_lossy(&def_entry.name)
                )));
            }
            if entry.data_type != def_entry.data_type {
                return Err(CodecError::invalid_data(format!(
                    "type {} does not match set-defined type {} for element {:?}",
                    entry.data_type.name(),
                    def_entry.data_type.name(),
                    String::from_utf8_lossy(&def_entry.name)
                )));
            }
            let data_type = def_entry.data_type;
            let final_entry = set_pos + 1 == def.entries().len();
            let len = value.map(encoded_size).unwrap_or(0);
            iter.check_remaining(u16ob_len(len) + len)?;

            let result = (|| {
                iter.write_u16ob(len)?;
                if let Some(value) = value {
                    encode_primitive(iter, data_type, value)?;
                }
                if final_entry {
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
            let name_len = entry.name.len();
            iter.check_remaining(u15rb_len(name_len) + name_len + 1 + u16ob_len(len) + len)?;

            let result = (|| {
                iter.write_u15rb(name_len)?;
                iter.write_bytes(&entry.name)?;
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

/// Begin a multi-step element entry (nested container value).
pub fn encode_element_entry_init(
    iter: &mut EncodeIterator,
    entry: &ElementEntry,
    max_size_hint: usize,
) -> CodecResult<()> {
    let (state, set_def, set_pos) = match iter.level() {
        Some(level) if level.container == ContainerType::ElementList => {
            (level.state, level.set_def.clone(), level.set_pos)
        }
        _ => {
            return Err(CodecError::UnexpectedCall {
                state: "no element list in progress",
            })
        }
    };
    let entry_start = iter.position();

    let result = (|| match state {
        EncodeState::SetData => {
            let def = match &set_def {
                Some(ActiveSetDef::Element(def)) => def,
                _ => unreachable!("SetData state requires an element set definition"),
            };
            let def_entry = &def.entries()[set_pos];
            if entry.name != def_entry.name || entry.data_type != def_entry.data_type {
                return Err(CodecError::invalid_data(format!(
                    "entry {:?}:{} does not match set position {set_pos}",
                    String::from_utf8_lossy(&entry.name),
                    entry.data_type.name()
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
            iter.write_u15rb(entry.name.len())?;
            iter.write_bytes(&entry.name)?;
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

/// Complete (or abandon) a multi-step element entry.
pub fn encode_element_entry_complete(
    iter: &mut EncodeIterator,
    success: bool,
) -> CodecResult<EncodeOutcome> {
    let (state, entry_start, mark, set_def, set_pos) = match iter.level() {
        Some(level) if level.container == ContainerType::ElementList => (
            level.state,
            level.entry_start,
            level.entry_len_mark,
            level.set_def.clone(),
            level.set_pos,
        ),
        _ => {
            return Err(CodecError::UnexpectedCall {
                state: "no element list in progress",
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
                    Some(ActiveSetDef::Element(def)) => def,
                    _ => unreachable!("SetEntryInit state requires an element set definition"),
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

/// Complete the element list; see [`crate::encode_field_list_complete`].
pub fn encode_element_list_complete(iter: &mut EncodeIterator, success: bool) -> CodecResult<()> {
    let (state, init_pos, count_pos, entry_count) = match iter.level() {
        Some(level) if level.container == ContainerType::ElementList => (
            level.state,
            level.init_pos,
            level.count_pos,
            level.entry_count,
        ),
        _ => {
            return Err(CodecError::UnexpectedCall {
                state: "no element list in progress",
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
        other => Err(CodecError::UnexpectedCall {
            state: other.name(),
        }),
    }
}

/// Begin decoding an element list from the iterator's current position to
/// the end of its input.
pub fn decode_element_list_init(
    iter: &mut DecodeIterator<'_>,
    local_db: Option<&LocalElementSetDefDb>,
    global_db: Option<&GlobalElementSetDefDb>,
) -> CodecResult<ElementList> {
    let end = iter.position() + iter.remaining();
    let mut level = DecodingLevel {
        container: ContainerType::ElementList,
        end,
        item_count: 0,
        next_item: 0,
        set_count: 0,
        set_pos: 0,
        set_def: None,
        entries_start: iter.position(),
        set_data_end: iter.position(),
    };
    let mut list = ElementList::default();

    if iter.remaining() == 0 {
        iter.push_level(level)?;
        return Ok(list);
    }

    let flags = iter.read_u8()?;

    if flags & HAS_INFO != 0 {
        let info_len = iter.read_u8()? as usize;
        let info_start = iter.position();
        let element_list_num = iter.read_u16()?;
        list.info = Some(ElementListInfo { element_list_num });
        if info_start + info_len > end {
            return Err(CodecError::IncompleteData { at: iter.position() });
        }
        iter.set_position(info_start + info_len);
    }

    if flags & HAS_SET_DATA != 0 {
        list.has_set_data = true;
        if flags & HAS_SET_ID != 0 {
            list.set_id = iter.read_u15rb()?;
        }
        let def = resolve_element_set_def(list.set_id, local_db, global_db)
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
        level.set_def = Some(ActiveSetDef::Element(def));
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
        "element list header decoded"
    );
    iter.push_level(level)?;
    Ok(list)
}

/// Decode the next element entry; `Ok(None)` is the end-of-container
/// sentinel.
pub fn decode_element_entry<'a>(
    iter: &mut DecodeIterator<'a>,
) -> CodecResult<Option<ElementEntryRef<'a>>> {
    let (item_count, next_item, set_count, set_pos, set_def, entries_start, set_data_end, end) =
        match iter.level_mut() {
            Some(level) if level.container == ContainerType::ElementList => (
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
                    state: "no element list being decoded",
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
            Some(ActiveSetDef::Element(def)) => def,
            _ => unreachable!("set entries owed without an element set definition"),
        };
        let def_entry = &def.entries()[set_pos as usize];
        let name = def_entry.name.clone();
        let data_type = def_entry.data_type;
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
        return Ok(Some(ElementEntryRef {
            name: Cow::Owned(name),
            data_type,
            data,
        }));
    }

    let name = iter.read_b15()?;
    let raw_type = iter.read_u8()?;
    let data_type = DataType::try_from(raw_type)
        .map_err(|_| CodecError::invalid_data(format!("unknown data type {raw_type}")))?;
    let data = iter.read_b16()?;
    if iter.position() > end {
        return Err(CodecError::IncompleteData { at: iter.position() });
    }
    iter.level_mut().expect("level present").next_item += 1;
    Ok(Some(ElementEntryRef {
        name: Cow::Borrowed(name),
        data_type,
        data,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::set_def::ElementSetDefEntry;
    use rwf_types::{Real, RealHint};

    #[test]
    fn standard_entries_round_trip() {
        let list = ElementList {
            info: Some(ElementListInfo {
                element_list_num: 7,
            }),
            has_standard_data: true,
            ..Default::default()
        };
        let mut enc = EncodeIterator::with_capacity(128);
        encode_element_list_init(&mut enc, &list, None, None, 0).unwrap();
        encode_element_entry(
            &mut enc,
            &ElementEntry::new(&b"ItemCount"[..], DataType::UInt),
            Some(&PrimitiveValue::UInt(300)),
        )
        .unwrap();
        encode_element_entry(
            &mut enc,
            &ElementEntry::new(&b"Name"[..], DataType::AsciiString),
            Some(&PrimitiveValue::Ascii("TRI.N".into())),
        )
        .unwrap();
        // Blank entry.
        encode_element_entry(
            &mut enc,
            &ElementEntry::new(&b"Gap"[..], DataType::Int),
            None,
        )
        .unwrap();
        encode_element_list_complete(&mut enc, true).unwrap();
        let buf = enc.into_buffer();

        let mut dec = DecodeIterator::new(&buf);
        let decoded = decode_element_list_init(&mut dec, None, None).unwrap();
        assert_eq!(decoded.info, list.info);
        let first = decode_element_entry(&mut dec).unwrap().unwrap();
        assert_eq!(first.name.as_ref(), b"ItemCount");
        assert_eq!(first.value().unwrap(), Some(PrimitiveValue::UInt(300)));
        let second = decode_element_entry(&mut dec).unwrap().unwrap();
        assert_eq!(
            second.value().unwrap(),
            Some(PrimitiveValue::Ascii("TRI.N".into()))
        );
        let third = decode_element_entry(&mut dec).unwrap().unwrap();
        assert_eq!(third.name.as_ref(), b"Gap");
        assert_eq!(third.value().unwrap(), None);
        assert!(decode_element_entry(&mut dec).unwrap().is_none());
    }

    #[test]
    fn set_then_standard_round_trip() {
        let mut db = LocalElementSetDefDb::new();
        db.add(
            ElementSetDef::new(
                2,
                vec![
                    ElementSetDefEntry::new(&b"BID"[..], DataType::Real),
                    ElementSetDefEntry::new(&b"ASK"[..], DataType::Real),
                ],
            )
            .unwrap(),
        )
        .unwrap();

        let list = ElementList {
            set_id: 2,
            has_set_data: true,
            has_standard_data: true,
            ..Default::default()
        };
        let mut enc = EncodeIterator::with_capacity(128);
        encode_element_list_init(&mut enc, &list, Some(&db), None, 0).unwrap();
        let bid = PrimitiveValue::Real(Real::new(RealHint::ExponentNeg2, 10025));
        let ask = PrimitiveValue::Real(Real::new(RealHint::ExponentNeg2, 10050));
        assert_eq!(
            encode_element_entry(
                &mut enc,
                &ElementEntry::new(&b"BID"[..], DataType::Real),
                Some(&bid),
            )
            .unwrap(),
            EncodeOutcome::Encoded
        );
        assert_eq!(
            encode_element_entry(
                &mut enc,
                &ElementEntry::new(&b"ASK"[..], DataType::Real),
                Some(&ask),
            )
            .unwrap(),
            EncodeOutcome::SetComplete
        );
        encode_element_entry(
            &mut enc,
            &ElementEntry::new(&b"VOL"[..], DataType::UInt),
            Some(&PrimitiveValue::UInt(12_000)),
        )
        .unwrap();
        encode_element_list_complete(&mut enc, true).unwrap();
        let buf = enc.into_buffer();

        let mut dec = DecodeIterator::new(&buf);
        let decoded = decode_element_list_init(&mut dec, Some(&db), None).unwrap();
        assert_eq!(decoded.set_id, 2);
        let first = decode_element_entry(&mut dec).unwrap().unwrap();
        assert_eq!(first.name.as_ref(), b"BID");
        assert_eq!(first.value().unwrap(), Some(bid));
        let second = decode_element_entry(&mut dec).unwrap().unwrap();
        assert_eq!(second.name.as_ref(), b"ASK");
        assert_eq!(second.value().unwrap(), Some(ask));
        let third = decode_element_entry(&mut dec).unwrap().unwrap();
        assert_eq!(third.name.as_ref(), b"VOL");
        assert_eq!(third.value().unwrap(), Some(PrimitiveValue::UInt(12_000)));
        assert!(decode_element_entry(&mut dec).unwrap().is_none());
    }

    #[test]
    fn set_entry_name_mismatch_rejected() {
        let mut db = LocalElementSetDefDb::new();
        db.add(
            ElementSetDef::new(0, vec![ElementSetDefEntry::new(&b"BID"[..], DataType::Real)])
                .unwrap(),
        )
        .unwrap();
        let list = ElementList {
            has_set_data: true,
            ..Default::default()
        };
        let mut enc = EncodeIterator::with_capacity(64);
        encode_element_list_init(&mut enc, &list, Some(&db), None, 0).unwrap();
        let before = enc.position();
        let err = encode_element_entry(
            &mut enc,
            &ElementEntry::new(&b"ASK"[..], DataType::Real),
            None,
        )
        .unwrap_err();
        assert!(matches!(err, CodecError::InvalidData { .. }));
        assert_eq!(enc.position(), before);
    }

    #[test]
    fn decode_without_set_def_fails() {
        let mut db = LocalElementSetDefDb::new();
        db.add(
            ElementSetDef::new(0, vec![ElementSetDefEntry::new(&b"BID"[..], DataType::Real)])
                .unwrap(),
        )
        .unwrap();
        let list = ElementList {
            has_set_data: true,
            ..Default::default()
        };
        let mut enc = EncodeIterator::with_capacity(64);
        encode_element_list_init(&mut enc, &list, Some(&db), None, 0).unwrap();
        encode_element_entry(
            &mut enc,
            &ElementEntry::new(&b"BID"[..], DataType::Real),
            None,
        )
        .unwrap();
        encode_element_list_complete(&mut enc, true).unwrap();
        let buf = enc.into_buffer();

        let mut dec = DecodeIterator::new(&buf);
        let err = decode_element_list_init(&mut dec, None, None).unwrap_err();
        assert_eq!(err, CodecError::SetDefNotProvided { set_id: 0 });
    }
}
