//! The dehydrating transform: value graph in, flat deduplicated table out.

use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use crate::scalar::Scalar;
use crate::table::{Composite, CompositeKind, Element, SlotIndex, Table};
use crate::value::{MapHandle, RecordHandle, SeqHandle, SetHandle, Value};

/// Recognized encoding options.
#[derive(Debug, Clone, Copy)]
pub struct EncodeOptions {
    /// Canonicalizes container entry order before encoding. Required for
    /// dedup to recognize containers whose entries were inserted in
    /// different orders; implied by `dedupe`.
    pub sort_keys: bool,
    /// Deduplicates equal composites across the whole value graph.
    pub dedupe: bool,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        EncodeOptions {
            sort_keys: false,
            dedupe: true,
        }
    }
}

impl EncodeOptions {
    fn canonical_order(self) -> bool {
        self.sort_keys || self.dedupe
    }
}

/// Flattens a value graph into a [`Table`].
///
/// Accepts any value, arbitrarily nested, including self- and mutually-
/// referential graphs; terminates in time proportional to the number of
/// distinct nodes. The input is never mutated. Scalars are interned by
/// value unconditionally; with `dedupe` enabled, composites whose encoded
/// children coincide collapse into one slot as well.
pub fn encode(value: &Value, options: EncodeOptions) -> Table {
    let mut encoder = Encoder {
        table: Table::new(),
        options,
        scalars: HashMap::new(),
        identities: HashMap::new(),
        buckets: HashMap::new(),
        composites: HashMap::new(),
        pinned: HashSet::new(),
        empty_record: None,
    };
    encoder.encode_value(value);
    encoder.table
}

/// Identity of a container handle: container kind plus allocation address.
///
/// The kind disambiguates handles of different container kinds built over
/// one shared allocation (a `Seq` and a `Set` wrapping the same cell).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct ObjectId(ObjectKind, usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum ObjectKind {
    Seq,
    Record,
    Map,
    Set,
}

fn object_id<T>(kind: ObjectKind, handle: &Rc<T>) -> ObjectId {
    ObjectId(kind, Rc::as_ptr(handle) as *const () as usize)
}

/// Cheap bucket digest over child indices: wrapping sum of squares.
fn indices_digest(children: &[SlotIndex]) -> u64 {
    children.iter().fold(0u64, |acc, idx| {
        let raw = u64::from(idx.raw());
        acc.wrapping_add(raw.wrapping_mul(raw))
    })
}

/// One encode call's worth of state, discarded when the call returns.
struct Encoder {
    table: Table,
    options: EncodeOptions,
    /// Scalar value -> slot, interned unconditionally.
    scalars: HashMap<Scalar, SlotIndex>,
    /// Container identity -> slot, recorded before recursing into children
    /// so a cycle resolves to the ancestor's slot instead of recursing.
    identities: HashMap<ObjectId, SlotIndex>,
    /// Digest -> candidate index-sequence slots.
    buckets: HashMap<u64, Vec<SlotIndex>>,
    /// Exact composite dedup. Children are deduplicated bottom-up, so equal
    /// composites carry identical `(kind, keys, values)` triples.
    composites: HashMap<(CompositeKind, SlotIndex, SlotIndex), SlotIndex>,
    /// Slots reached by something other than their own commit step. These
    /// may be referenced from committed children and must never be
    /// reclaimed, even when an equal-content slot exists.
    pinned: HashSet<SlotIndex>,
    /// The one slot shared by every empty record in this call.
    empty_record: Option<SlotIndex>,
}

impl Encoder {
    fn encode_value(&mut self, value: &Value) -> SlotIndex {
        match value {
            Value::Absent => SlotIndex::ABSENT,
            Value::Scalar(scalar) => self.intern_scalar(scalar),
            Value::Seq(handle) => self.encode_seq(handle),
            Value::Record(handle) => self.encode_record(handle),
            Value::Map(handle) => self.encode_map(handle),
            Value::Set(handle) => self.encode_set(handle),
        }
    }

    fn intern_scalar(&mut self, scalar: &Scalar) -> SlotIndex {
        if let Some(&idx) = self.scalars.get(scalar) {
            return idx;
        }
        let idx = self.table.push(Element::Scalar(scalar.clone()));
        self.scalars.insert(scalar.clone(), idx);
        idx
    }

    /// Looks a container up by identity. A hit means the slot is reachable
    /// through sharing or a cycle, which disqualifies it from reclamation.
    fn known_identity(&mut self, id: ObjectId) -> Option<SlotIndex> {
        let idx = *self.identities.get(&id)?;
        self.pinned.insert(idx);
        Some(idx)
    }

    fn encode_seq(&mut self, handle: &SeqHandle) -> SlotIndex {
        let id = object_id(ObjectKind::Seq, handle);
        if let Some(idx) = self.known_identity(id) {
            return idx;
        }
        // Reserve the slot and register it before descending: a child that
        // refers back here must resolve to this index instead of recursing.
        let this_idx = self.table.push(Element::Indices(Vec::new()));
        self.identities.insert(id, this_idx);
        let children: Vec<SlotIndex> = handle
            .borrow()
            .iter()
            .map(|child| self.encode_value(child))
            .collect();

        if !self.options.dedupe {
            self.table.commit(this_idx, Element::Indices(children));
            return this_idx;
        }
        let digest = indices_digest(&children);
        if !self.pinned.contains(&this_idx) {
            if let Some(found) = self.find_indices(digest, &children, this_idx) {
                // The reserved slot duplicates an older one. It is still the
                // physical tail, so truncating it away is safe; the identity
                // map is redirected at the surviving slot.
                self.table.reclaim(this_idx);
                self.identities.insert(id, found);
                return found;
            }
        }
        self.table.commit(this_idx, Element::Indices(children));
        self.buckets.entry(digest).or_default().push(this_idx);
        this_idx
    }

    /// Interns a synthetic index list (composite keys or values). The
    /// children are already encoded, so no slot is reserved up front and any
    /// committed equal list can be reused.
    fn intern_indices(&mut self, children: Vec<SlotIndex>) -> SlotIndex {
        if !self.options.dedupe {
            return self.table.push(Element::Indices(children));
        }
        let digest = indices_digest(&children);
        let next = SlotIndex::new(self.table.len());
        if let Some(found) = self.find_indices(digest, &children, next) {
            return found;
        }
        let idx = self.table.push(Element::Indices(children));
        self.buckets.entry(digest).or_default().push(idx);
        idx
    }

    /// Searches same-digest candidates for an element-wise equal index list.
    ///
    /// Only slots older than `before` qualify. A slot committed during the
    /// current node's own recursion can hold indices that did not exist when
    /// the node's slot was reserved (a cycle through that child), and
    /// matching one would call for truncating a slot that is no longer the
    /// tail.
    fn find_indices(
        &self,
        digest: u64,
        children: &[SlotIndex],
        before: SlotIndex,
    ) -> Option<SlotIndex> {
        let candidates = self.buckets.get(&digest)?;
        candidates.iter().copied().find(|&candidate| {
            candidate < before
                && matches!(
                    self.table.get(candidate),
                    Some(Element::Indices(existing)) if existing.as_slice() == children
                )
        })
    }

    fn encode_record(&mut self, handle: &RecordHandle) -> SlotIndex {
        let id = object_id(ObjectKind::Record, handle);
        if let Some(idx) = self.known_identity(id) {
            return idx;
        }
        // Entries are cloned out so no borrow is held across recursion;
        // cloning a Value clones handles, not contents.
        let mut entries: Vec<(String, Value)> = handle
            .borrow()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        if entries.is_empty() {
            // Every empty record resolves to one shared slot, dedup or not.
            let idx = self.empty_record_slot();
            self.identities.insert(id, idx);
            return idx;
        }

        let this_idx = self.reserve_composite(CompositeKind::Record);
        self.identities.insert(id, this_idx);
        if self.options.canonical_order() {
            entries.sort_by(|a, b| a.0.cmp(&b.0));
        }
        let key_idxs: Vec<SlotIndex> = entries
            .iter()
            .map(|(k, _)| self.intern_scalar(&Scalar::Str(k.clone())))
            .collect();
        let keys_idx = self.intern_indices(key_idxs);
        let value_idxs: Vec<SlotIndex> = entries
            .iter()
            .map(|(_, v)| self.encode_value(v))
            .collect();
        let values_idx = self.intern_indices(value_idxs);
        self.commit_composite(this_idx, id, CompositeKind::Record, keys_idx, values_idx)
    }

    fn encode_map(&mut self, handle: &MapHandle) -> SlotIndex {
        let id = object_id(ObjectKind::Map, handle);
        if let Some(idx) = self.known_identity(id) {
            return idx;
        }
        let this_idx = self.reserve_composite(CompositeKind::Map);
        self.identities.insert(id, this_idx);
        // Keys encode first; canonical order then sorts entries by the key's
        // slot index. Equal key sets are already deduplicated to equal
        // indices, so insertion order stops mattering.
        let mut keyed: Vec<(SlotIndex, Value)> = handle
            .borrow()
            .iter()
            .map(|(k, v)| (self.encode_value(k), v.clone()))
            .collect();
        if self.options.canonical_order() {
            keyed.sort_by_key(|(idx, _)| idx.raw());
        }
        let (keys_idx, values_idx) = if keyed.is_empty() {
            (SlotIndex::ABSENT, SlotIndex::ABSENT)
        } else {
            let key_idxs: Vec<SlotIndex> = keyed.iter().map(|(idx, _)| *idx).collect();
            let keys_idx = self.intern_indices(key_idxs);
            let value_idxs: Vec<SlotIndex> = keyed
                .iter()
                .map(|(_, v)| self.encode_value(v))
                .collect();
            (keys_idx, self.intern_indices(value_idxs))
        };
        self.commit_composite(this_idx, id, CompositeKind::Map, keys_idx, values_idx)
    }

    fn encode_set(&mut self, handle: &SetHandle) -> SlotIndex {
        let id = object_id(ObjectKind::Set, handle);
        if let Some(idx) = self.known_identity(id) {
            return idx;
        }
        let this_idx = self.reserve_composite(CompositeKind::Set);
        self.identities.insert(id, this_idx);
        let mut member_idxs: Vec<SlotIndex> = handle
            .borrow()
            .iter()
            .map(|member| self.encode_value(member))
            .collect();
        if self.options.canonical_order() {
            member_idxs.sort_by_key(|idx| idx.raw());
        }
        let keys_idx = if member_idxs.is_empty() {
            SlotIndex::ABSENT
        } else {
            self.intern_indices(member_idxs)
        };
        self.commit_composite(this_idx, id, CompositeKind::Set, keys_idx, SlotIndex::ABSENT)
    }

    fn reserve_composite(&mut self, kind: CompositeKind) -> SlotIndex {
        self.table.push(Element::Composite(Composite {
            kind,
            keys: SlotIndex::ABSENT,
            values: SlotIndex::ABSENT,
        }))
    }

    fn commit_composite(
        &mut self,
        this_idx: SlotIndex,
        id: ObjectId,
        kind: CompositeKind,
        keys: SlotIndex,
        values: SlotIndex,
    ) -> SlotIndex {
        let composite = Composite { kind, keys, values };
        if self.options.dedupe {
            if !self.pinned.contains(&this_idx) {
                // Same older-slots-only rule as for index sequences: a
                // composite committed inside this node's recursion may
                // reference this very slot.
                if let Some(&found) = self.composites.get(&(kind, keys, values)) {
                    if found < this_idx {
                        self.table.reclaim(this_idx);
                        self.identities.insert(id, found);
                        return found;
                    }
                }
            }
            self.table.commit(this_idx, Element::Composite(composite));
            self.composites.entry((kind, keys, values)).or_insert(this_idx);
        } else {
            self.table.commit(this_idx, Element::Composite(composite));
        }
        this_idx
    }

    fn empty_record_slot(&mut self) -> SlotIndex {
        if let Some(idx) = self.empty_record {
            return idx;
        }
        let idx = self.table.push(Element::Composite(Composite {
            kind: CompositeKind::Record,
            keys: SlotIndex::ABSENT,
            values: SlotIndex::ABSENT,
        }));
        self.empty_record = Some(idx);
        idx
    }
}
