//! The rehydrating transform: table in, reconstructed value graph out.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::error::FormatError;
use crate::scalar::Scalar;
use crate::table::{Composite, CompositeKind, Element, SlotIndex, Table};
use crate::value::{MapHandle, RecordHandle, SeqHandle, SetHandle, Value};

/// Reconstructs the value graph rooted at slot 1.
///
/// Shared slots decode to shared handles and cycles close back on the same
/// reconstructed container, so identity relationships survive the round
/// trip. A table holding only the marker decodes to [`Value::Absent`].
///
/// # Errors
///
/// [`FormatError::UnrecognizedMarker`] if position 0 does not hold the
/// expected marker. A table that passes the marker check but violates the
/// format invariants (dangling indices, mismatched element kinds) was not
/// produced by a conforming encoder and panics.
pub fn decode(table: &Table) -> Result<Value, FormatError> {
    table.check_marker()?;
    if table.len() <= 1 {
        return Ok(Value::Absent);
    }
    let mut decoder = Decoder {
        table,
        memo: HashMap::new(),
    };
    Ok(decoder.resolve(SlotIndex::ROOT))
}

/// One decode call's worth of state, discarded when the call returns.
struct Decoder<'a> {
    table: &'a Table,
    /// Slot -> already reconstructed value. Containers are memoized before
    /// their contents resolve, which is what makes cycles terminate.
    memo: HashMap<SlotIndex, Value>,
}

impl<'a> Decoder<'a> {
    fn resolve(&mut self, idx: SlotIndex) -> Value {
        if idx.is_absent() {
            return Value::Absent;
        }
        if let Some(value) = self.memo.get(&idx) {
            return value.clone();
        }
        match self.table.element(idx) {
            // Scalars are idempotent to rebuild; no memoization needed.
            Element::Scalar(scalar) => Value::Scalar(scalar.clone()),
            Element::Indices(children) => {
                let children = children.clone();
                let handle: SeqHandle = Rc::new(RefCell::new(Vec::new()));
                self.memo.insert(idx, Value::Seq(handle.clone()));
                // Children resolve into a temporary first; filling the
                // memoized handle afterwards keeps any cyclic reference
                // pointed at this same object.
                let items: Vec<Value> = children.iter().map(|&child| self.resolve(child)).collect();
                handle.borrow_mut().extend(items);
                Value::Seq(handle)
            }
            Element::Composite(composite) => {
                let composite = *composite;
                self.resolve_composite(idx, composite)
            }
        }
    }

    fn resolve_composite(&mut self, idx: SlotIndex, composite: Composite) -> Value {
        match composite.kind {
            CompositeKind::Record => {
                let handle: RecordHandle = Rc::new(RefCell::new(IndexMap::new()));
                self.memo.insert(idx, Value::Record(handle.clone()));
                let (keys, values) = self.entry_lists(idx, composite);
                for (key_idx, value_idx) in keys.into_iter().zip(values) {
                    let key = match self.resolve(key_idx) {
                        Value::Scalar(Scalar::Str(key)) => key,
                        _ => panic!(
                            "table invariant violated: record key slot {} is not a string",
                            key_idx.raw()
                        ),
                    };
                    let value = self.resolve(value_idx);
                    handle.borrow_mut().insert(key, value);
                }
                Value::Record(handle)
            }
            CompositeKind::Map => {
                let handle: MapHandle = Rc::new(RefCell::new(Vec::new()));
                self.memo.insert(idx, Value::Map(handle.clone()));
                let (keys, values) = self.entry_lists(idx, composite);
                for (key_idx, value_idx) in keys.into_iter().zip(values) {
                    let key = self.resolve(key_idx);
                    let value = self.resolve(value_idx);
                    handle.borrow_mut().push((key, value));
                }
                Value::Map(handle)
            }
            CompositeKind::Set => {
                if !composite.values.is_absent() {
                    panic!(
                        "table invariant violated: set slot {} carries a values sequence",
                        idx.raw()
                    );
                }
                let handle: SetHandle = Rc::new(RefCell::new(Vec::new()));
                self.memo.insert(idx, Value::Set(handle.clone()));
                for member_idx in self.index_list(composite.keys) {
                    let member = self.resolve(member_idx);
                    handle.borrow_mut().push(member);
                }
                Value::Set(handle)
            }
        }
    }

    /// Parallel key/value index lists of a record or map.
    fn entry_lists(&self, idx: SlotIndex, composite: Composite) -> (Vec<SlotIndex>, Vec<SlotIndex>) {
        let keys = self.index_list(composite.keys);
        let values = self.index_list(composite.values);
        if keys.len() != values.len() {
            panic!(
                "table invariant violated: slot {} has {} keys but {} values",
                idx.raw(),
                keys.len(),
                values.len()
            );
        }
        (keys, values)
    }

    /// The index list an absent-or-`Indices` reference points at.
    fn index_list(&self, idx: SlotIndex) -> Vec<SlotIndex> {
        if idx.is_absent() {
            return Vec::new();
        }
        match self.table.element(idx) {
            Element::Indices(children) => children.clone(),
            _ => panic!(
                "table invariant violated: slot {} is not an index sequence",
                idx.raw()
            ),
        }
    }
}
