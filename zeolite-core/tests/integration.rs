//! End-to-end scenarios across both transforms.

use std::rc::Rc;

use zeolite_core::{
    Composite, CompositeKind, Element, EncodeOptions, FormatError, MARKER, Scalar, SlotIndex,
    Table, Value, decode, encode,
};

fn round_trip(value: &Value) -> Value {
    decode(&encode(value, EncodeOptions::default())).unwrap()
}

fn no_dedupe() -> EncodeOptions {
    EncodeOptions {
        sort_keys: false,
        dedupe: false,
    }
}

#[test]
fn scalar_round_trip() {
    let table = encode(&Value::from(42), EncodeOptions::default());
    assert_eq!(table.len(), 2);
    assert_eq!(table.elements()[1], Element::Scalar(Scalar::Int(42)));
    assert!(round_trip(&Value::from(42)).deep_eq(&Value::from(42)));
}

#[test]
fn repeated_scalar_interns_to_one_slot() {
    let value = Value::seq([Value::str("a"), Value::str("a")]);
    let table = encode(&value, EncodeOptions::default());
    assert_eq!(table.len(), 3);
    let Element::Indices(children) = &table.elements()[1] else {
        panic!("expected index sequence at the root slot");
    };
    assert_eq!(children[0], children[1]);
    assert!(round_trip(&value).deep_eq(&value));
}

#[test]
fn every_scalar_kind_round_trips() {
    let value = Value::seq([
        Value::null(),
        Value::from(true),
        Value::from(false),
        Value::from(-3),
        Value::from(2.5),
        Value::from(f64::NAN),
        Value::str(""),
        Value::str("text"),
        Value::Absent,
    ]);
    assert!(round_trip(&value).deep_eq(&value));
}

#[test]
fn equal_records_share_one_composite() {
    let value = Value::record([
        ("x", Value::record([("a", Value::from(1))])),
        ("y", Value::record([("a", Value::from(1))])),
    ]);
    let table = encode(&value, EncodeOptions::default());
    let composites = table
        .elements()
        .iter()
        .filter(|e| matches!(e, Element::Composite(_)))
        .count();
    // The outer record plus exactly one shared {a: 1}.
    assert_eq!(composites, 2);
    assert!(round_trip(&value).deep_eq(&value));
}

#[test]
fn records_dedup_across_insertion_orders() {
    let value = Value::seq([
        Value::record([("a", Value::from(1)), ("b", Value::from(2))]),
        Value::record([("b", Value::from(2)), ("a", Value::from(1))]),
    ]);
    let table = encode(&value, EncodeOptions::default());
    let composites = table
        .elements()
        .iter()
        .filter(|e| matches!(e, Element::Composite(_)))
        .count();
    assert_eq!(composites, 1);
    assert!(round_trip(&value).deep_eq(&value));
}

#[test]
fn equal_sets_share_one_slot() {
    let value = Value::seq([
        Value::set([Value::from(1), Value::from(2)]),
        Value::set([Value::from(2), Value::from(1)]),
    ]);
    let table = encode(&value, EncodeOptions::default());
    let Element::Indices(children) = &table.elements()[1] else {
        panic!("expected index sequence at the root slot");
    };
    assert_eq!(children[0], children[1]);
    assert!(round_trip(&value).deep_eq(&value));
}

#[test]
fn maps_dedup_across_insertion_orders() {
    let value = Value::seq([
        Value::map([
            (Value::str("k1"), Value::from(1)),
            (Value::str("k2"), Value::from(2)),
        ]),
        Value::map([
            (Value::str("k2"), Value::from(2)),
            (Value::str("k1"), Value::from(1)),
        ]),
    ]);
    let table = encode(&value, EncodeOptions::default());
    let Element::Indices(children) = &table.elements()[1] else {
        panic!("expected index sequence at the root slot");
    };
    assert_eq!(children[0], children[1]);
    assert!(round_trip(&value).deep_eq(&value));
}

#[test]
fn map_with_composite_keys_round_trips() {
    let value = Value::map([
        (Value::seq([Value::from(1)]), Value::str("one")),
        (Value::from(true), Value::str("yes")),
        (Value::record([("k", Value::null())]), Value::from(3)),
    ]);
    assert!(round_trip(&value).deep_eq(&value));
}

#[test]
fn dedup_never_expands_the_table() {
    let value = Value::seq([
        Value::record([("a", Value::from(1)), ("b", Value::from(2))]),
        Value::record([("b", Value::from(2)), ("a", Value::from(1))]),
        Value::seq([Value::str("x"), Value::str("y")]),
        Value::seq([Value::str("x"), Value::str("y")]),
        Value::set([Value::from(5)]),
    ]);
    let with = encode(&value, EncodeOptions::default());
    let without = encode(&value, no_dedupe());
    assert!(with.len() <= without.len());
    assert!(decode(&with).unwrap().deep_eq(&value));
    assert!(decode(&without).unwrap().deep_eq(&value));
}

#[test]
fn record_insertion_order_survives_without_canonical_order() {
    let value = Value::record([("zeta", Value::from(1)), ("alpha", Value::from(2))]);
    let back = decode(&encode(&value, no_dedupe())).unwrap();
    let record = back.as_record().unwrap().borrow();
    let keys: Vec<String> = record.keys().cloned().collect();
    assert_eq!(keys, ["zeta", "alpha"]);
}

#[test]
fn self_referential_sequence_round_trips_identity() {
    let value = Value::seq([]);
    if let Value::Seq(handle) = &value {
        handle.borrow_mut().push(value.clone());
    }
    let back = round_trip(&value);
    assert!(back.deep_eq(&value));
    let Value::Seq(outer) = back else {
        panic!("expected a sequence");
    };
    let first = outer.borrow()[0].clone();
    let Value::Seq(inner) = first else {
        panic!("expected a sequence");
    };
    assert!(Rc::ptr_eq(&outer, &inner));
}

#[test]
fn mutual_cycle_round_trips_identity() {
    let x = Value::seq([]);
    let y = Value::seq([x.clone()]);
    if let Value::Seq(handle) = &x {
        handle.borrow_mut().push(y.clone());
    }
    let back = round_trip(&x);
    assert!(back.deep_eq(&x));
    // x -> y -> x closes back on the same reconstructed handle.
    let Value::Seq(bx) = &back else {
        panic!("expected a sequence");
    };
    let Value::Seq(by) = bx.borrow()[0].clone() else {
        panic!("expected a sequence");
    };
    let Value::Seq(bx2) = by.borrow()[0].clone() else {
        panic!("expected a sequence");
    };
    assert!(Rc::ptr_eq(bx, &bx2));
}

#[test]
fn record_containing_itself_round_trips_identity() {
    let value = Value::record([("name", Value::str("root"))]);
    if let Value::Record(handle) = &value {
        let cycle = value.clone();
        handle.borrow_mut().insert("me".to_string(), cycle);
    }
    let back = round_trip(&value);
    assert!(back.deep_eq(&value));
    let Value::Record(outer) = &back else {
        panic!("expected a record");
    };
    let me = outer.borrow().get("me").cloned().unwrap();
    let Value::Record(inner) = me else {
        panic!("expected a record");
    };
    assert!(Rc::ptr_eq(outer, &inner));
}

#[test]
fn set_containing_itself_round_trips_identity() {
    let value = Value::set([Value::from(1)]);
    if let Value::Set(handle) = &value {
        let cycle = value.clone();
        handle.borrow_mut().push(cycle);
    }
    let back = round_trip(&value);
    assert!(back.deep_eq(&value));
    let Value::Set(outer) = &back else {
        panic!("expected a set");
    };
    let inner = outer
        .borrow()
        .iter()
        .find_map(|member| member.as_set().cloned())
        .unwrap();
    assert!(Rc::ptr_eq(outer, &inner));
}

#[test]
fn map_keyed_by_itself_round_trips_identity() {
    let value = Value::map([(Value::from(0), Value::str("self"))]);
    if let Value::Map(handle) = &value {
        let cycle = value.clone();
        handle.borrow_mut()[0].0 = cycle;
    }
    let back = round_trip(&value);
    assert!(back.deep_eq(&value));
    let Value::Map(outer) = &back else {
        panic!("expected a map");
    };
    let key = outer.borrow()[0].0.clone();
    let Value::Map(inner) = key else {
        panic!("expected a map");
    };
    assert!(Rc::ptr_eq(outer, &inner));
}

#[test]
fn shared_acyclic_structure_keeps_identity() {
    let shared = Value::seq([Value::from(1), Value::from(2)]);
    let value = Value::seq([shared.clone(), shared]);
    let back = round_trip(&value);
    let outer = back.as_seq().unwrap().borrow();
    let first = outer[0].as_seq().unwrap();
    let second = outer[1].as_seq().unwrap();
    assert!(Rc::ptr_eq(first, second));
}

#[test]
fn sentinel_round_trips_to_absent() {
    let table = Table::from_elements(vec![
        Element::Scalar(Scalar::Str(MARKER.to_string())),
        Element::Indices(vec![SlotIndex::ABSENT, SlotIndex::ABSENT]),
    ]);
    let back = decode(&table).unwrap();
    let Value::Seq(handle) = back else {
        panic!("expected a sequence");
    };
    assert!(handle.borrow().iter().all(Value::is_absent));
}

#[test]
fn absent_inside_a_sequence_round_trips() {
    let value = Value::seq([Value::Absent, Value::from(7)]);
    let table = encode(&value, EncodeOptions::default());
    let Element::Indices(children) = &table.elements()[1] else {
        panic!("expected index sequence at the root slot");
    };
    assert_eq!(children[0], SlotIndex::ABSENT);
    assert!(round_trip(&value).deep_eq(&value));
}

#[test]
fn empty_containers_round_trip() {
    let value = Value::seq([
        Value::record(Vec::<(&str, Value)>::new()),
        Value::map([]),
        Value::set([]),
        Value::seq([]),
    ]);
    for options in [EncodeOptions::default(), no_dedupe()] {
        let back = decode(&encode(&value, options)).unwrap();
        assert!(back.deep_eq(&value));
    }
}

#[test]
fn empty_records_share_one_slot_regardless_of_dedup() {
    let value = Value::seq([
        Value::record(Vec::<(&str, Value)>::new()),
        Value::record([("gone", Value::from(1))]),
        Value::record(Vec::<(&str, Value)>::new()),
    ]);
    if let Value::Record(handle) = &value.as_seq().unwrap().borrow()[1] {
        handle.borrow_mut().clear();
    }
    for options in [EncodeOptions::default(), no_dedupe()] {
        let table = encode(&value, options);
        let empties = table
            .elements()
            .iter()
            .filter(|e| {
                matches!(
                    e,
                    Element::Composite(c)
                        if c.kind == CompositeKind::Record && c.keys.is_absent()
                )
            })
            .count();
        assert_eq!(empties, 1);
    }
}

#[test]
fn unrecognized_marker_is_rejected() {
    let table = Table::from_elements(vec![Element::Scalar(Scalar::Str(
        "not-the-marker".to_string(),
    ))]);
    assert!(matches!(
        decode(&table),
        Err(FormatError::UnrecognizedMarker)
    ));
}

#[test]
fn encoding_is_deterministic() {
    let build = || {
        Value::record([
            ("alpha", Value::seq([Value::from(1), Value::from(2)])),
            ("beta", Value::set([Value::str("x"), Value::str("y")])),
            ("gamma", Value::map([(Value::from(1), Value::str("one"))])),
        ])
    };
    let first = encode(&build(), EncodeOptions::default());
    let second = encode(&build(), EncodeOptions::default());
    assert_eq!(first, second);
    assert_eq!(first.content_key(), second.content_key());
}

#[test]
fn table_bytes_round_trip() {
    let value = Value::record([(
        "k",
        Value::seq([Value::from(1), Value::null(), Value::set([Value::from(2)])]),
    )]);
    let table = encode(&value, EncodeOptions::default());
    let recovered = Table::from_bytes(&table.to_bytes()).unwrap();
    assert_eq!(table, recovered);
    assert!(decode(&recovered).unwrap().deep_eq(&value));
}

#[test]
#[should_panic(expected = "table invariant violated")]
fn dangling_index_fails_loudly() {
    let table = Table::from_elements(vec![
        Element::Scalar(Scalar::Str(MARKER.to_string())),
        Element::Indices(vec![SlotIndex::from_raw(9)]),
    ]);
    let _ = decode(&table);
}

#[test]
#[should_panic(expected = "table invariant violated")]
fn non_string_record_key_fails_loudly() {
    let table = Table::from_elements(vec![
        Element::Scalar(Scalar::Str(MARKER.to_string())),
        Element::Composite(Composite {
            kind: CompositeKind::Record,
            keys: SlotIndex::from_raw(2),
            values: SlotIndex::from_raw(3),
        }),
        Element::Indices(vec![SlotIndex::from_raw(4)]),
        Element::Indices(vec![SlotIndex::from_raw(4)]),
        Element::Scalar(Scalar::Int(7)),
    ]);
    let _ = decode(&table);
}

#[test]
fn deeply_nested_records_round_trip() {
    let mut value = Value::from(0);
    for depth in 0..64 {
        value = Value::record([("level", Value::from(depth)), ("inner", value)]);
    }
    assert!(round_trip(&value).deep_eq(&value));
}
