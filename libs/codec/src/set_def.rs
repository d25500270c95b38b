//! # Set Definitions - Pre-Agreed Compact Entry Schemas
//!
//! ## Purpose
//!
//! A set definition maps a positional index to an (identifier, primitive
//! type) pair, letting container entries omit their identifier and type tag
//! on the wire. Local databases cover set IDs 0-15 and travel inside a
//! message; global databases are dictionary-scale (IDs up to 65535) and are
//! published out of band.
//!
//! ## Invariants
//!
//! - Entry order inside a definition is authoritative: positional decoding
//!   depends on it, and a definition is immutable once built.
//! - Definitions are shared by reference (`Arc`), never copied, so a frozen
//!   database may be read concurrently by many decode operations.

use std::collections::BTreeMap;
use std::sync::Arc;

use rwf_types::{DataType, FieldId};

use crate::error::{CodecError, CodecResult};
use crate::iter::{DecodeIterator, EncodeIterator};

/// Highest set ID a local database can hold.
pub const MAX_LOCAL_SET_ID: u16 = 15;
/// Maximum entries in one set definition.
pub const MAX_SET_ENTRIES: usize = 255;

/// One positional slot of a field set definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSetDefEntry {
    pub field_id: FieldId,
    pub data_type: DataType,
}

impl FieldSetDefEntry {
    pub fn new(field_id: FieldId, data_type: DataType) -> Self {
        Self {
            field_id,
            data_type,
        }
    }
}

/// One positional slot of an element set definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementSetDefEntry {
    pub name: Vec<u8>,
    pub data_type: DataType,
}

impl ElementSetDefEntry {
    pub fn new(name: impl Into<Vec<u8>>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }
}

/// An immutable, ordered field set definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSetDef {
    set_id: u16,
    entries: Vec<FieldSetDefEntry>,
}

impl FieldSetDef {
    pub fn new(set_id: u16, entries: Vec<FieldSetDefEntry>) -> CodecResult<Self> {
        if entries.len() > MAX_SET_ENTRIES {
            return Err(CodecError::invalid_data(format!(
                "set definition {set_id} has {} entries, maximum is {MAX_SET_ENTRIES}",
                entries.len()
            )));
        }
        Ok(Self { set_id, entries })
    }

    pub fn set_id(&self) -> u16 {
        self.set_id
    }

    pub fn entries(&self) -> &[FieldSetDefEntry] {
        &self.entries
    }
}

/// An immutable, ordered element set definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementSetDef {
    set_id: u16,
    entries: Vec<ElementSetDefEntry>,
}

impl ElementSetDef {
    pub fn new(set_id: u16, entries: Vec<ElementSetDefEntry>) -> CodecResult<Self> {
        if entries.len() > MAX_SET_ENTRIES {
            return Err(CodecError::invalid_data(format!(
                "set definition {set_id} has {} entries, maximum is {MAX_SET_ENTRIES}",
                entries.len()
            )));
        }
        Ok(Self { set_id, entries })
    }

    pub fn set_id(&self) -> u16 {
        self.set_id
    }

    pub fn entries(&self) -> &[ElementSetDefEntry] {
        &self.entries
    }
}

/// Local field set definition database: 16 slots addressed by set ID.
#[derive(Debug, Clone, Default)]
pub struct LocalFieldSetDefDb {
    slots: [Option<Arc<FieldSetDef>>; 16],
}

impl LocalFieldSetDefDb {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a definition. The set ID must be 0-15 and unoccupied.
    pub fn add(&mut self, def: FieldSetDef) -> CodecResult<()> {
        let id = def.set_id();
        if id > MAX_LOCAL_SET_ID {
            return Err(CodecError::invalid_data(format!(
                "set ID {id} exceeds the local maximum of {MAX_LOCAL_SET_ID}"
            )));
        }
        if self.slots[id as usize].is_some() {
            return Err(CodecError::invalid_data(format!(
                "duplicate local set definition {id}"
            )));
        }
        self.slots[id as usize] = Some(Arc::new(def));
        Ok(())
    }

    pub fn get(&self, set_id: u16) -> Option<&Arc<FieldSetDef>> {
        self.slots.get(set_id as usize)?.as_ref()
    }

    pub fn definitions(&self) -> impl Iterator<Item = &Arc<FieldSetDef>> {
        self.slots.iter().flatten()
    }

    pub fn len(&self) -> usize {
        self.slots.iter().flatten().count()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(|s| s.is_none())
    }
}

/// Local element set definition database: 16 slots addressed by set ID.
#[derive(Debug, Clone, Default)]
pub struct LocalElementSetDefDb {
    slots: [Option<Arc<ElementSetDef>>; 16],
}

impl LocalElementSetDefDb {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, def: ElementSetDef) -> CodecResult<()> {
        let id = def.set_id();
        if id > MAX_LOCAL_SET_ID {
            return Err(CodecError::invalid_data(format!(
                "set ID {id} exceeds the local maximum of {MAX_LOCAL_SET_ID}"
            )));
        }
        if self.slots[id as usize].is_some() {
            return Err(CodecError::invalid_data(format!(
                "duplicate local set definition {id}"
            )));
        }
        self.slots[id as usize] = Some(Arc::new(def));
        Ok(())
    }

    pub fn get(&self, set_id: u16) -> Option<&Arc<ElementSetDef>> {
        self.slots.get(set_id as usize)?.as_ref()
    }

    pub fn definitions(&self) -> impl Iterator<Item = &Arc<ElementSetDef>> {
        self.slots.iter().flatten()
    }

    pub fn len(&self) -> usize {
        self.slots.iter().flatten().count()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(|s| s.is_none())
    }
}

/// Global field set definition database, caller-constructed and caller-owned.
/// Resolves set IDs 16-65535 (and any ID a local database does not cover).
#[derive(Debug, Clone, Default)]
pub struct GlobalFieldSetDefDb {
    defs: BTreeMap<u16, Arc<FieldSetDef>>,
}

impl GlobalFieldSetDefDb {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, def: FieldSetDef) -> CodecResult<()> {
        let id = def.set_id();
        if self.defs.contains_key(&id) {
            return Err(CodecError::invalid_data(format!(
                "duplicate global set definition {id}"
            )));
        }
        self.defs.insert(id, Arc::new(def));
        Ok(())
    }

    pub fn get(&self, set_id: u16) -> Option<&Arc<FieldSetDef>> {
        self.defs.get(&set_id)
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }
}

/// Global element set definition database.
#[derive(Debug, Clone, Default)]
pub struct GlobalElementSetDefDb {
    defs: BTreeMap<u16, Arc<ElementSetDef>>,
}

impl GlobalElementSetDefDb {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, def: ElementSetDef) -> CodecResult<()> {
        let id = def.set_id();
        if self.defs.contains_key(&id) {
            return Err(CodecError::invalid_data(format!(
                "duplicate global set definition {id}"
            )));
        }
        self.defs.insert(id, Arc::new(def));
        Ok(())
    }

    pub fn get(&self, set_id: u16) -> Option<&Arc<ElementSetDef>> {
        self.defs.get(&set_id)
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }
}

/// Serialize a local field set definition database.
///
/// Layout: flags byte, definition count byte, then per definition the set ID
/// (u15rb), an entry count byte, and (field ID, type tag) pairs. Published
/// once per message so subsequent set-data entries can reference the schema.
pub fn encode_local_field_set_defs(
    iter: &mut EncodeIterator,
    db: &LocalFieldSetDefDb,
) -> CodecResult<()> {
    let start = iter.position();
    let result = (|| {
        iter.write_u8(0)?; // flags, none defined
        iter.write_u8(db.len() as u8)?;
        for def in db.definitions() {
            iter.write_u15rb(def.set_id() as usize)?;
            iter.write_u8(def.entries().len() as u8)?;
            for entry in def.entries() {
                iter.write_i16(entry.field_id)?;
                iter.write_u8(entry.data_type.into())?;
            }
        }
        Ok(())
    })();
    if result.is_err() {
        iter.rollback_to(start);
    }
    result
}

/// Decode the dual of [`encode_local_field_set_defs`].
pub fn decode_local_field_set_defs(iter: &mut DecodeIterator) -> CodecResult<LocalFieldSetDefDb> {
    let _flags = iter.read_u8()?;
    let set_count = iter.read_u8()?;
    if set_count == 0 {
        return Err(CodecError::invalid_data("set definition block is empty"));
    }
    let mut db = LocalFieldSetDefDb::new();
    for _ in 0..set_count {
        let set_id = iter.read_u15rb()?;
        let entry_count = iter.read_u8()?;
        let mut entries = Vec::with_capacity(entry_count as usize);
        for _ in 0..entry_count {
            let field_id = iter.read_i16()?;
            let raw_type = iter.read_u8()?;
            let data_type = DataType::try_from(raw_type).map_err(|_| {
                CodecError::invalid_data(format!("unknown data type {raw_type} in set definition"))
            })?;
            entries.push(FieldSetDefEntry::new(field_id, data_type));
        }
        // add() rejects IDs above 15 and duplicates.
        db.add(FieldSetDef::new(set_id, entries)?)?;
    }
    Ok(db)
}

/// Serialize a local element set definition database. Identifiers are
/// length-prefixed names instead of fixed-width field IDs.
pub fn encode_local_element_set_defs(
    iter: &mut EncodeIterator,
    db: &LocalElementSetDefDb,
) -> CodecResult<()> {
    let start = iter.position();
    let result = (|| {
        iter.write_u8(0)?;
        iter.write_u8(db.len() as u8)?;
        for def in db.definitions() {
            iter.write_u15rb(def.set_id() as usize)?;
            iter.write_u8(def.entries().len() as u8)?;
            for entry in def.entries() {
                iter.write_u15rb(entry.name.len())?;
                iter.write_bytes(&entry.name)?;
                iter.write_u8(entry.data_type.into())?;
            }
        }
        Ok(())
    })();
    if result.is_err() {
        iter.rollback_to(start);
    }
    result
}

/// Decode the dual of [`encode_local_element_set_defs`].
pub fn decode_local_element_set_defs(
    iter: &mut DecodeIterator,
) -> CodecResult<LocalElementSetDefDb> {
    let _flags = iter.read_u8()?;
    let set_count = iter.read_u8()?;
    if set_count == 0 {
        return Err(CodecError::invalid_data("set definition block is empty"));
    }
    let mut db = LocalElementSetDefDb::new();
    for _ in 0..set_count {
        let set_id = iter.read_u15rb()?;
        let entry_count = iter.read_u8()?;
        let mut entries = Vec::with_capacity(entry_count as usize);
        for _ in 0..entry_count {
            let name = iter.read_b15()?.to_vec();
            let raw_type = iter.read_u8()?;
            let data_type = DataType::try_from(raw_type).map_err(|_| {
                CodecError::invalid_data(format!("unknown data type {raw_type} in set definition"))
            })?;
            entries.push(ElementSetDefEntry::new(name, data_type));
        }
        db.add(ElementSetDef::new(set_id, entries)?)?;
    }
    Ok(db)
}
