use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::scalar::Scalar;

/// Shared handle to an ordered sequence.
pub type SeqHandle = Rc<RefCell<Vec<Value>>>;
/// Shared handle to a string-keyed record, in insertion order.
pub type RecordHandle = Rc<RefCell<IndexMap<String, Value>>>;
/// Shared handle to a map-container: entries with arbitrary keys, in
/// insertion order.
pub type MapHandle = Rc<RefCell<Vec<(Value, Value)>>>;
/// Shared handle to a set-container: members in insertion order.
pub type SetHandle = Rc<RefCell<Vec<Value>>>;

/// An in-memory value graph.
///
/// Containers are shared by handle: cloning a `Value` clones the handle, not
/// the contents, so one container can appear in several places and can refer
/// back to itself. Both transforms preserve that sharing.
///
/// `Value` deliberately implements no `PartialEq` — plain structural
/// recursion would not terminate on cyclic graphs. Use [`Value::deep_eq`].
#[derive(Debug, Clone)]
pub enum Value {
    /// The absent value; encodes to slot index 0 and back.
    Absent,
    Scalar(Scalar),
    Seq(SeqHandle),
    Record(RecordHandle),
    Map(MapHandle),
    Set(SetHandle),
}

impl Value {
    pub fn null() -> Value {
        Value::Scalar(Scalar::Null)
    }

    pub fn str(s: impl Into<String>) -> Value {
        Value::Scalar(Scalar::Str(s.into()))
    }

    /// Builds an ordered sequence from its elements.
    pub fn seq(items: impl IntoIterator<Item = Value>) -> Value {
        Value::Seq(Rc::new(RefCell::new(items.into_iter().collect())))
    }

    /// Builds a string-keyed record, keeping entry insertion order.
    pub fn record<K, I>(entries: I) -> Value
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        Value::Record(Rc::new(RefCell::new(
            entries.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        )))
    }

    /// Builds a map-container from key/value entries.
    pub fn map(entries: impl IntoIterator<Item = (Value, Value)>) -> Value {
        Value::Map(Rc::new(RefCell::new(entries.into_iter().collect())))
    }

    /// Builds a set-container from its members.
    pub fn set(members: impl IntoIterator<Item = Value>) -> Value {
        Value::Set(Rc::new(RefCell::new(members.into_iter().collect())))
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Value::Absent)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Scalar(Scalar::Null))
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Scalar(Scalar::Bool(b)) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Scalar(Scalar::Int(i)) => Some(*i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Scalar(Scalar::Float(f)) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Scalar(Scalar::Str(s)) => Some(s),
            _ => None,
        }
    }

    pub fn as_seq(&self) -> Option<&SeqHandle> {
        match self {
            Value::Seq(handle) => Some(handle),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&RecordHandle> {
        match self {
            Value::Record(handle) => Some(handle),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&MapHandle> {
        match self {
            Value::Map(handle) => Some(handle),
            _ => None,
        }
    }

    pub fn as_set(&self) -> Option<&SetHandle> {
        match self {
            Value::Set(handle) => Some(handle),
            _ => None,
        }
    }

    /// Structural graph equality.
    ///
    /// Sequences compare element-order-exact; records compare unordered by
    /// key; maps and sets compare by unordered membership (greedy matching).
    /// Cyclic graphs terminate: a pair of handles already under comparison
    /// is assumed equal.
    pub fn deep_eq(&self, other: &Value) -> bool {
        deep_eq(self, other, &mut HashSet::new())
    }
}

impl From<Scalar> for Value {
    fn from(scalar: Scalar) -> Value {
        Value::Scalar(scalar)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Value {
        Value::Scalar(Scalar::Bool(b))
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Value {
        Value::Scalar(Scalar::Int(i64::from(i)))
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Value {
        Value::Scalar(Scalar::Int(i))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Value {
        Value::Scalar(Scalar::Float(f))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Value {
        Value::str(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Value {
        Value::Scalar(Scalar::Str(s))
    }
}

/// Handle pairs currently assumed equal while the comparison is in flight.
type Visited = HashSet<(usize, usize)>;

fn handle_addr<T>(rc: &Rc<T>) -> usize {
    Rc::as_ptr(rc) as *const () as usize
}

fn deep_eq(a: &Value, b: &Value, visited: &mut Visited) -> bool {
    match (a, b) {
        (Value::Absent, Value::Absent) => true,
        (Value::Scalar(x), Value::Scalar(y)) => x == y,
        (Value::Seq(x), Value::Seq(y)) => {
            if Rc::ptr_eq(x, y) || !visited.insert((handle_addr(x), handle_addr(y))) {
                return true;
            }
            let (xs, ys) = (x.borrow(), y.borrow());
            xs.len() == ys.len() && xs.iter().zip(ys.iter()).all(|(u, v)| deep_eq(u, v, visited))
        }
        (Value::Record(x), Value::Record(y)) => {
            if Rc::ptr_eq(x, y) || !visited.insert((handle_addr(x), handle_addr(y))) {
                return true;
            }
            let (xs, ys) = (x.borrow(), y.borrow());
            xs.len() == ys.len()
                && xs
                    .iter()
                    .all(|(k, u)| ys.get(k).is_some_and(|v| deep_eq(u, v, visited)))
        }
        (Value::Map(x), Value::Map(y)) => {
            if Rc::ptr_eq(x, y) || !visited.insert((handle_addr(x), handle_addr(y))) {
                return true;
            }
            let (xs, ys) = (x.borrow(), y.borrow());
            match_unordered(xs.as_slice(), ys.as_slice(), visited, |u, v, visited| {
                deep_eq(&u.0, &v.0, visited) && deep_eq(&u.1, &v.1, visited)
            })
        }
        (Value::Set(x), Value::Set(y)) => {
            if Rc::ptr_eq(x, y) || !visited.insert((handle_addr(x), handle_addr(y))) {
                return true;
            }
            let (xs, ys) = (x.borrow(), y.borrow());
            match_unordered(xs.as_slice(), ys.as_slice(), visited, deep_eq)
        }
        _ => false,
    }
}

/// Greedy unordered matching. A failed trial must not leave its assumed
/// handle pairs behind, so each candidate runs against a copy of the set.
fn match_unordered<T>(
    left: &[T],
    right: &[T],
    visited: &mut Visited,
    eq: impl Fn(&T, &T, &mut Visited) -> bool,
) -> bool {
    if left.len() != right.len() {
        return false;
    }
    let mut used = vec![false; right.len()];
    for a in left {
        let mut matched = false;
        for (j, b) in right.iter().enumerate() {
            if used[j] {
                continue;
            }
            let mut trial = visited.clone();
            if eq(a, b, &mut trial) {
                *visited = trial;
                used[j] = true;
                matched = true;
                break;
            }
        }
        if !matched {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalars_compare_by_value() {
        assert!(Value::from(1).deep_eq(&Value::from(1)));
        assert!(!Value::from(1).deep_eq(&Value::from(2)));
        assert!(!Value::from(1).deep_eq(&Value::from(1.0)));
        assert!(Value::Absent.deep_eq(&Value::Absent));
        assert!(!Value::Absent.deep_eq(&Value::null()));
    }

    #[test]
    fn sequences_compare_in_order() {
        let a = Value::seq([Value::from(1), Value::from(2)]);
        let b = Value::seq([Value::from(1), Value::from(2)]);
        let c = Value::seq([Value::from(2), Value::from(1)]);
        assert!(a.deep_eq(&b));
        assert!(!a.deep_eq(&c));
    }

    #[test]
    fn records_compare_unordered_by_key() {
        let a = Value::record([("x", Value::from(1)), ("y", Value::from(2))]);
        let b = Value::record([("y", Value::from(2)), ("x", Value::from(1))]);
        assert!(a.deep_eq(&b));
    }

    #[test]
    fn sets_compare_by_membership() {
        let a = Value::set([Value::from(1), Value::str("s")]);
        let b = Value::set([Value::str("s"), Value::from(1)]);
        let c = Value::set([Value::str("s"), Value::from(2)]);
        assert!(a.deep_eq(&b));
        assert!(!a.deep_eq(&c));
    }

    #[test]
    fn maps_compare_by_entry_membership() {
        let a = Value::map([
            (Value::from(1), Value::str("one")),
            (Value::from(2), Value::str("two")),
        ]);
        let b = Value::map([
            (Value::from(2), Value::str("two")),
            (Value::from(1), Value::str("one")),
        ]);
        assert!(a.deep_eq(&b));
    }

    #[test]
    fn cloning_shares_the_handle() {
        let a = Value::seq([Value::from(1)]);
        let b = a.clone();
        a.as_seq().unwrap().borrow_mut().push(Value::from(2));
        assert_eq!(b.as_seq().unwrap().borrow().len(), 2);
    }

    #[test]
    fn cyclic_graphs_compare_without_diverging() {
        let build = || {
            let v = Value::seq([Value::from(1)]);
            if let Value::Seq(handle) = &v {
                handle.borrow_mut().push(v.clone());
            }
            v
        };
        let a = build();
        let b = build();
        assert!(a.deep_eq(&b));
        assert!(a.deep_eq(&a.clone()));
        let acyclic = Value::seq([Value::from(1)]);
        assert!(!a.deep_eq(&acyclic));
    }
}
