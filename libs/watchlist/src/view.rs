//! Per-stream view: the normalized set of fields or elements one consumer
//! asked for.
//!
//! A view is immutable once built. Construction normalizes the request:
//! elements are sorted, duplicates collapse, and field ID zero (not a real
//! dictionary entry) is dropped. Normalization makes set operations in the
//! aggregate linear merges and makes two equal requests compare equal.

use rwf_codec::Array;
use rwf_types::FieldId;

/// Which element domain a view (or aggregate) addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewKind {
    /// Numeric field IDs resolved against a field dictionary.
    FieldIds,
    /// Element names matched byte for byte.
    ElementNames,
}

/// The normalized elements of a view, tagged by domain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewElements {
    FieldIds(Vec<FieldId>),
    ElementNames(Vec<Vec<u8>>),
}

impl ViewElements {
    pub fn kind(&self) -> ViewKind {
        match self {
            ViewElements::FieldIds(_) => ViewKind::FieldIds,
            ViewElements::ElementNames(_) => ViewKind::ElementNames,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ViewElements::FieldIds(ids) => ids.len(),
            ViewElements::ElementNames(names) => names.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One consumer's requested view, sorted and deduplicated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WlView {
    elements: ViewElements,
}

impl WlView {
    /// Build a view from either element domain, normalizing the request.
    pub fn new(elements: ViewElements) -> Self {
        match elements {
            ViewElements::FieldIds(ids) => Self::from_field_ids(ids),
            ViewElements::ElementNames(names) => Self::from_element_names(names),
        }
    }

    /// Build a field-ID view. IDs are sorted, duplicates collapse, and the
    /// invalid ID zero is dropped.
    pub fn from_field_ids(mut ids: Vec<FieldId>) -> Self {
        ids.sort_unstable();
        ids.dedup();
        ids.retain(|&id| id != 0);
        Self {
            elements: ViewElements::FieldIds(ids),
        }
    }

    /// Build an element-name view. Names are sorted and deduplicated.
    pub fn from_element_names(mut names: Vec<Vec<u8>>) -> Self {
        names.sort_unstable();
        names.dedup();
        Self {
            elements: ViewElements::ElementNames(names),
        }
    }

    pub fn kind(&self) -> ViewKind {
        self.elements.kind()
    }

    pub fn elements(&self) -> &ViewElements {
        &self.elements
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// The sorted field IDs, or `None` for a name-domain view.
    pub fn field_ids(&self) -> Option<&[FieldId]> {
        match &self.elements {
            ViewElements::FieldIds(ids) => Some(ids),
            ViewElements::ElementNames(_) => None,
        }
    }

    /// The sorted element names, or `None` for a field-domain view.
    pub fn element_names(&self) -> Option<&[Vec<u8>]> {
        match &self.elements {
            ViewElements::ElementNames(names) => Some(names),
            ViewElements::FieldIds(_) => None,
        }
    }
}

/// A decoded wire array maps directly onto a view: field-ID arrays become
/// field views, ASCII-name arrays become element-name views.
impl From<Array> for WlView {
    fn from(array: Array) -> Self {
        match array {
            Array::FieldIds(ids) => WlView::from_field_ids(ids),
            Array::Ascii(names) => WlView::from_element_names(names),
        }
    }
}
