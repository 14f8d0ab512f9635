//! Zeolite is a structural deduplicating serialization codec.
//!
//! Core concepts:
//! - **Value**: an in-memory graph of scalars and shared-handle containers
//!   (sequences, records, maps, sets), possibly cyclic
//! - **Table**: the flat artifact of one encode call, addressed by slot
//!   index, with duplicate substructures stored once
//! - **encode**: flattens a value graph into a table, interning scalars by
//!   value and composites by slot-index equality of their encoded children
//! - **decode**: reconstructs an equal value graph, preserving shared
//!   identity and cycles through placeholder handles
//!
//! # Example
//!
//! ```
//! use zeolite_core::{decode, encode, EncodeOptions, Value};
//!
//! let shared = Value::record([("unit", Value::str("ms")), ("scale", Value::from(1000))]);
//! let value = Value::record([
//!     ("latency", shared.clone()),
//!     ("duration", shared),
//! ]);
//!
//! let table = encode(&value, EncodeOptions::default());
//! let back = decode(&table).unwrap();
//! assert!(back.deep_eq(&value));
//! ```
//!
//! Cyclic graphs round-trip with identity intact:
//!
//! ```
//! use std::rc::Rc;
//! use zeolite_core::{decode, encode, EncodeOptions, Value};
//!
//! let cyclic = Value::seq([]);
//! if let Value::Seq(handle) = &cyclic {
//!     handle.borrow_mut().push(cyclic.clone());
//! }
//!
//! let back = decode(&encode(&cyclic, EncodeOptions::default())).unwrap();
//! let Value::Seq(outer) = back else { unreachable!() };
//! let Value::Seq(inner) = outer.borrow()[0].clone() else { unreachable!() };
//! assert!(Rc::ptr_eq(&outer, &inner));
//! ```

mod decode;
mod encode;
mod error;
mod scalar;
mod table;
mod value;

pub use decode::decode;
pub use encode::{EncodeOptions, encode};
pub use error::FormatError;
pub use scalar::Scalar;
pub use table::{Composite, CompositeKind, Element, MARKER, SlotIndex, Table, TableKey};
pub use value::{MapHandle, RecordHandle, SeqHandle, SetHandle, Value};
