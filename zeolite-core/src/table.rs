use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::FormatError;
use crate::scalar::Scalar;

/// Fixed literal identifying the table format and version.
///
/// Physical position 0 of every table holds this string; it is never
/// dereferenced as data.
pub const MARKER: &str = "zeolite/table/0.1.0";

/// Position of an element within a [`Table`].
///
/// Index 0 is [`SlotIndex::ABSENT`], the sentinel meaning "the value is
/// absent". It never addresses the table — the marker occupies the physical
/// position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SlotIndex(u32);

impl SlotIndex {
    /// The sentinel index meaning "absent".
    pub const ABSENT: SlotIndex = SlotIndex(0);

    /// The slot holding the root of the encoded value.
    pub(crate) const ROOT: SlotIndex = SlotIndex(1);

    pub(crate) fn new(position: usize) -> SlotIndex {
        debug_assert!(position <= u32::MAX as usize);
        SlotIndex(position as u32)
    }

    /// Builds a slot index from its raw position, for reassembling tables
    /// received through an external transport.
    pub fn from_raw(raw: u32) -> SlotIndex {
        SlotIndex(raw)
    }

    /// The raw position value.
    pub fn raw(self) -> u32 {
        self.0
    }

    /// True for the absent sentinel.
    pub fn is_absent(self) -> bool {
        self.0 == 0
    }

    fn index(self) -> usize {
        self.0 as usize
    }
}

/// Discriminates the composite container kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompositeKind {
    Record,
    Map,
    Set,
}

/// A table element representing a record, map, or set via indices into child
/// index sequences.
///
/// `keys` and `values` each point at an [`Element::Indices`] element;
/// [`SlotIndex::ABSENT`] means "no entries on that side". A record stores
/// parallel key/value sequences, a set stores its members under `keys` with
/// `values` absent. `Composite { Record, ABSENT, ABSENT }` is the canonical
/// empty record, allocated at most once per encode call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Composite {
    pub kind: CompositeKind,
    pub keys: SlotIndex,
    pub values: SlotIndex,
}

/// One slot of a table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Element {
    /// A directly-stored primitive.
    Scalar(Scalar),
    /// An ordered list of slot indices.
    Indices(Vec<SlotIndex>),
    /// A record, map, or set.
    Composite(Composite),
}

/// The flat, indexable artifact of one encode call.
///
/// Produced in full by [`encode`](crate::encode) and consumed in full by
/// [`decode`](crate::decode); it has no mutable state between the two.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Table {
    elements: Vec<Element>,
}

impl Table {
    /// Creates a table holding only the format marker.
    pub(crate) fn new() -> Table {
        Table {
            elements: vec![Element::Scalar(Scalar::Str(MARKER.to_string()))],
        }
    }

    /// Reassembles a table from an externally transported element list.
    ///
    /// Nothing is validated here; the marker is checked when decoding.
    pub fn from_elements(elements: Vec<Element>) -> Table {
        Table { elements }
    }

    /// All elements, marker slot included.
    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    /// Number of slots, marker slot included.
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// The element at `idx`, if that slot exists.
    pub fn get(&self, idx: SlotIndex) -> Option<&Element> {
        self.elements.get(idx.index())
    }

    /// The element at `idx`. Panics on an out-of-range index, which only a
    /// non-conforming encoder can produce.
    pub(crate) fn element(&self, idx: SlotIndex) -> &Element {
        match self.elements.get(idx.index()) {
            Some(element) => element,
            None => panic!(
                "table invariant violated: slot {} out of range (table has {} slots)",
                idx.raw(),
                self.elements.len()
            ),
        }
    }

    /// Verifies the marker slot.
    pub fn check_marker(&self) -> Result<(), FormatError> {
        match self.elements.first() {
            Some(Element::Scalar(Scalar::Str(marker))) if marker == MARKER => Ok(()),
            _ => Err(FormatError::UnrecognizedMarker),
        }
    }

    /// Appends an element, returning its slot index.
    pub(crate) fn push(&mut self, element: Element) -> SlotIndex {
        let idx = SlotIndex::new(self.elements.len());
        self.elements.push(element);
        idx
    }

    /// Overwrites a previously reserved slot with its final element.
    pub(crate) fn commit(&mut self, idx: SlotIndex, element: Element) {
        self.elements[idx.index()] = element;
    }

    /// Discards a speculatively reserved slot.
    ///
    /// Legal only while the slot is still the physical tail of the table;
    /// anything else means the depth-first discipline was broken.
    pub(crate) fn reclaim(&mut self, idx: SlotIndex) {
        if idx.index() + 1 != self.elements.len() {
            panic!(
                "table invariant violated: reclaimed slot {} is not the table tail ({} slots)",
                idx.raw(),
                self.elements.len()
            );
        }
        self.elements.truncate(idx.index());
    }

    /// Serializes the table to CBOR bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::new();
        ciborium::into_writer(self, &mut bytes).expect("serializing a table to memory cannot fail");
        bytes
    }

    /// Deserializes a table from CBOR bytes, rejecting unrecognized markers.
    pub fn from_bytes(bytes: &[u8]) -> Result<Table, FormatError> {
        let table: Table = ciborium::from_reader(bytes)?;
        table.check_marker()?;
        Ok(table)
    }

    /// Content key of the serialized table.
    ///
    /// Stable across calls for equal tables; lets callers cache or
    /// deduplicate encoded tables without comparing them slot by slot.
    pub fn content_key(&self) -> TableKey {
        TableKey(*blake3::hash(&self.to_bytes()).as_bytes())
    }
}

/// A 32-byte Blake3 digest identifying a serialized table.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct TableKey([u8; 32]);

impl TableKey {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Debug for TableKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TableKey({})", self)
    }
}

impl fmt::Display for TableKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}
