//! JSON bridge for the Zeolite codec.
//!
//! Converts between `serde_json::Value` and the codec's value model so
//! JSON-shaped payloads can be dehydrated into tables and rehydrated back.
//!
//! ```
//! use serde_json::json;
//! use zeolite_core::EncodeOptions;
//! use zeolite_json::{decode_json, encode_json};
//!
//! let doc = json!({"words": ["a", "a", "b"], "flags": {"caseSensitive": true}});
//! let table = encode_json(&doc, EncodeOptions::default());
//! assert_eq!(decode_json(&table).unwrap(), doc);
//! ```

mod error;

pub use error::JsonError;

use std::rc::Rc;

use serde_json::{Map as JsonMap, Number, Value as Json};
use zeolite_core::{EncodeOptions, Scalar, Table, Value, decode, encode};

/// Converts a JSON document into a codec value.
///
/// Total: arrays become sequences, objects become records (insertion order
/// kept), numbers become `Int` when exactly representable as `i64` and
/// `Float` otherwise.
pub fn from_json(json: &Json) -> Value {
    match json {
        Json::Null => Value::null(),
        Json::Bool(b) => Value::from(*b),
        Json::Number(n) => match n.as_i64() {
            Some(i) => Value::from(i),
            None => Value::from(n.as_f64().unwrap_or(f64::NAN)),
        },
        Json::String(s) => Value::str(s.clone()),
        Json::Array(items) => Value::seq(items.iter().map(from_json)),
        Json::Object(entries) => {
            Value::record(entries.iter().map(|(k, v)| (k.clone(), from_json(v))))
        }
    }
}

/// Converts a codec value back into a JSON document.
///
/// Partial: cycles, the absent value, map- and set-containers, and
/// non-finite numbers have no JSON form and are rejected. Shared acyclic
/// substructure is expanded into copies.
pub fn to_json(value: &Value) -> Result<Json, JsonError> {
    to_json_inner(value, &mut Vec::new())
}

/// Dehydrates a JSON document straight into a table.
pub fn encode_json(json: &Json, options: EncodeOptions) -> Table {
    encode(&from_json(json), options)
}

/// Rehydrates a table into a JSON document.
pub fn decode_json(table: &Table) -> Result<Json, JsonError> {
    to_json(&decode(table)?)
}

fn to_json_inner(value: &Value, path: &mut Vec<usize>) -> Result<Json, JsonError> {
    match value {
        Value::Absent => Err(JsonError::Unrepresentable("the absent value")),
        Value::Scalar(scalar) => scalar_to_json(scalar),
        Value::Seq(handle) => {
            let addr = Rc::as_ptr(handle) as *const () as usize;
            if path.contains(&addr) {
                return Err(JsonError::Cycle);
            }
            path.push(addr);
            let items: Result<Vec<Json>, JsonError> = handle
                .borrow()
                .iter()
                .map(|item| to_json_inner(item, path))
                .collect();
            path.pop();
            Ok(Json::Array(items?))
        }
        Value::Record(handle) => {
            let addr = Rc::as_ptr(handle) as *const () as usize;
            if path.contains(&addr) {
                return Err(JsonError::Cycle);
            }
            path.push(addr);
            let mut object = JsonMap::new();
            let filled: Result<(), JsonError> = handle.borrow().iter().try_for_each(|(k, v)| {
                object.insert(k.clone(), to_json_inner(v, path)?);
                Ok(())
            });
            path.pop();
            filled?;
            Ok(Json::Object(object))
        }
        Value::Map(_) => Err(JsonError::Unrepresentable("a map-container")),
        Value::Set(_) => Err(JsonError::Unrepresentable("a set-container")),
    }
}

fn scalar_to_json(scalar: &Scalar) -> Result<Json, JsonError> {
    Ok(match scalar {
        Scalar::Null => Json::Null,
        Scalar::Bool(b) => Json::Bool(*b),
        Scalar::Int(i) => Json::Number(Number::from(*i)),
        Scalar::Float(f) => {
            Json::Number(Number::from_f64(*f).ok_or(JsonError::NonFiniteNumber(*f))?)
        }
        Scalar::Str(s) => Json::String(s.clone()),
    })
}
