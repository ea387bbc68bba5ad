//! Document codec tests: round trips, wire layout, merge decoding and
//! malformed input.

#![allow(clippy::unwrap_used, clippy::indexing_slicing, clippy::panic)]

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use num_bigint::BigInt;
use orient_binary::SERIALIZATION_VERSION;
use orient_binary::prelude::*;
use orient_binary::stream::Reader;
use orient_binary::varint::write_varint;

fn roundtrip(doc: &Document) -> Document {
    let bytes = serialize_record(doc).unwrap();
    let mut decoded = Document::new();
    deserialize_record(&bytes, &mut decoded, &NoGlobalProperties).unwrap();
    decoded
}

fn winston() -> Document {
    let mut doc = Document::new();
    doc.set("name", "Winston").set("age", 7i32);
    doc
}

// =============================================================================
// Wire layout
// =============================================================================

#[test]
fn winston_document_layout() {
    let bytes = serialize_document(&winston(), 0).unwrap();

    let mut expected = vec![0x00];
    expected.extend_from_slice(&[0x08, b'n', b'a', b'm', b'e', 0, 0, 0, 21, 7]);
    expected.extend_from_slice(&[0x06, b'a', b'g', b'e', 0, 0, 0, 29, 1]);
    expected.push(0x00);
    expected.push(0x0e);
    expected.extend_from_slice(b"Winston");
    expected.push(0x0e);
    assert_eq!(bytes, expected);
}

#[test]
fn record_envelope_shifts_pointers_by_version_byte() {
    let doc = winston();
    let record = serialize_record(&doc).unwrap();
    let shifted = serialize_document(&doc, 1).unwrap();

    assert_eq!(record[0], SERIALIZATION_VERSION);
    assert_eq!(&record[1..], &shifted[..]);
    // name pointer
    assert_eq!(&record[7..11], &[0, 0, 0, 22]);
}

#[test]
fn winston_roundtrip() {
    let decoded = roundtrip(&winston());
    assert_eq!(decoded.len(), 2);

    let name = decoded.entry("name").unwrap();
    assert_eq!(name.otype, OType::String);
    assert_eq!(name.value, Some(Value::String("Winston".to_string())));

    let age = decoded.entry("age").unwrap();
    assert_eq!(age.otype, OType::Integer);
    assert_eq!(age.value, Some(Value::Integer(7)));
}

#[test]
fn classname_roundtrip() {
    let mut doc = Document::with_class("Cat");
    doc.set("lives", 9i16);
    let decoded = roundtrip(&doc);
    assert_eq!(decoded.classname(), Some("Cat"));
    assert_eq!(decoded.get("lives"), Some(&Value::Short(9)));
}

#[test]
fn nested_document_with_outer_offset() {
    let doc = winston();
    let bytes = serialize_document(&doc, 100).unwrap();
    // name pointer is absolute in the enclosing buffer
    assert_eq!(&bytes[6..10], &[0, 0, 0, 121]);

    let mut buffer = vec![0xee; 100];
    buffer.extend_from_slice(&bytes);
    let mut decoded = Document::new();
    let end = RecordSerializer::new(&NoGlobalProperties)
        .deserialize_document_at(&buffer, 100, &mut decoded)
        .unwrap();
    assert_eq!(end, buffer.len());
    assert_eq!(decoded.get("name").and_then(Value::as_str), Some("Winston"));
}

// =============================================================================
// Absent values
// =============================================================================

#[test]
fn absent_field_has_zero_pointer() {
    let mut doc = Document::new();
    doc.set_null("nick", OType::String);
    doc.set("age", 3i32);
    let bytes = serialize_document(&doc, 0).unwrap();

    assert_eq!(&bytes[1..6], &[0x08, b'n', b'i', b'c', b'k']);
    assert_eq!(&bytes[6..10], &[0, 0, 0, 0]);
    assert_eq!(bytes[10], OType::String.tag());

    let mut decoded = Document::new();
    deserialize_document(&bytes, &mut decoded, &NoGlobalProperties).unwrap();
    let nick = decoded.entry("nick").unwrap();
    assert_eq!(nick.otype, OType::String);
    assert_eq!(nick.value, None);
    assert_eq!(decoded.get("age"), Some(&Value::Integer(3)));
    // header + one varint byte of data
    assert_eq!(bytes.len(), 1 + 10 + 9 + 1 + 1);
}

#[test]
fn empty_string_and_binary_are_present() {
    let mut doc = Document::new();
    doc.set("s", "").set("b", Vec::<u8>::new());
    let decoded = roundtrip(&doc);
    assert_eq!(decoded.get("s"), Some(&Value::String(String::new())));
    assert_eq!(decoded.get("b"), Some(&Value::Binary(vec![])));
}

#[test]
fn null_link_decodes_as_absent() {
    let mut doc = Document::new();
    doc.set("friend", Rid::NULL_LINK);
    doc.set("owner", Rid::new(5, 2));
    let decoded = roundtrip(&doc);
    let friend = decoded.entry("friend").unwrap();
    assert_eq!(friend.otype, OType::Link);
    assert_eq!(friend.value, None);
    assert_eq!(decoded.get("owner").and_then(Value::as_rid), Some(Rid::new(5, 2)));
}

#[test]
fn transient_fields_carry_no_bytes() {
    let mut doc = Document::new();
    doc.set_typed("scratch", OType::Transient, Some(Value::Integer(1)));
    let bytes = serialize_document(&doc, 0).unwrap();
    // classname, header entry, terminator; no data section
    assert_eq!(bytes.len(), 1 + 1 + 7 + 4 + 1 + 1);

    let mut decoded = Document::new();
    deserialize_document(&bytes, &mut decoded, &NoGlobalProperties).unwrap();
    assert_eq!(decoded.entry("scratch").unwrap().value, None);
}

#[test]
fn any_typed_field_resolves_to_value_type() {
    let mut doc = Document::new();
    doc.set_typed("n", OType::Any, Some(Value::Long(5)));
    let decoded = roundtrip(&doc);
    let n = decoded.entry("n").unwrap();
    assert_eq!(n.otype, OType::Long);
    assert_eq!(n.value, Some(Value::Long(5)));
}

// =============================================================================
// Scalars
// =============================================================================

#[test]
fn scalar_types_roundtrip() {
    let when: DateTime<Utc> = DateTime::from_timestamp_millis(1_700_000_000_123).unwrap();
    let mut doc = Document::new();
    doc.set("flag", true)
        .set("byte", 0xfeu8)
        .set("short", i16::MIN)
        .set("int", i32::MAX)
        .set("long", i64::MIN)
        .set("float", 1.25f32)
        .set("double", -3.5e300f64)
        .set("when", when)
        .set("day", NaiveDate::from_ymd_opt(2024, 2, 29).unwrap())
        .set("blob", vec![0u8, 1, 2, 255])
        .set("price", Decimal::new(-12345, 2));

    let decoded = roundtrip(&doc);
    assert_eq!(decoded, doc);
}

#[test]
fn decimal_with_large_magnitude() {
    let unscaled: BigInt = "123456789012345678901234567890".parse().unwrap();
    let mut doc = Document::new();
    doc.set("d", Decimal::new(unscaled.clone(), 10));
    let decoded = roundtrip(&doc);
    assert_eq!(
        decoded.get("d"),
        Some(&Value::Decimal(Decimal::new(unscaled, 10)))
    );
}

#[test]
fn date_is_written_as_days_since_epoch() {
    let mut doc = Document::new();
    doc.set("day", NaiveDate::from_ymd_opt(1970, 1, 2).unwrap());
    let bytes = serialize_document(&doc, 0).unwrap();
    // classname, "day" entry (1 + 3 + 4 + 1), terminator
    let data = &bytes[1 + 1 + 3 + 4 + 1 + 1..];
    assert_eq!(data, &write_varint(1)[..]);

    let mut doc = Document::new();
    doc.set("day", NaiveDate::from_ymd_opt(2022, 1, 8).unwrap());
    let bytes = serialize_document(&doc, 0).unwrap();
    assert_eq!(&bytes[11..], &write_varint(19_000)[..]);
    assert_eq!(bytes.len() - 11, 3);
}

#[test]
fn date_decodes_day_count_from_server() {
    let mut bytes = vec![0x00, 0x00, 0x06, b'd', b'a', b'y'];
    bytes.extend_from_slice(&12i32.to_be_bytes());
    bytes.push(OType::Date.tag());
    bytes.push(0x00);
    bytes.extend_from_slice(&write_varint(19_000));

    let mut doc = Document::new();
    deserialize_record(&bytes, &mut doc, &NoGlobalProperties).unwrap();
    assert_eq!(
        doc.get("day"),
        Some(&Value::Date(NaiveDate::from_ymd_opt(2022, 1, 8).unwrap()))
    );

    let before_epoch = NaiveDate::from_ymd_opt(1969, 12, 31).unwrap();
    let mut doc = Document::new();
    doc.set("day", before_epoch);
    assert_eq!(roundtrip(&doc).get("day"), Some(&Value::Date(before_epoch)));
}

// =============================================================================
// Collections
// =============================================================================

#[test]
fn embedded_list_of_strings_keeps_order() {
    let mut doc = Document::new();
    doc.set_typed(
        "tags",
        OType::EmbeddedList,
        Some(Value::EmbeddedList(vec![
            Some(Value::from("one")),
            Some(Value::from("two")),
            Some(Value::from("three")),
        ])),
    );
    let decoded = roundtrip(&doc);
    let items = decoded.get("tags").and_then(Value::as_list).unwrap();
    let strings: Vec<_> = items
        .iter()
        .map(|item| match item {
            Some(Value::String(s)) => s.as_str(),
            other => panic!("expected STRING element, got {other:?}"),
        })
        .collect();
    assert_eq!(strings, vec!["one", "two", "three"]);
}

#[test]
fn embedded_list_layout_uses_any_element_type() {
    let mut doc = Document::new();
    doc.set_typed(
        "l",
        OType::EmbeddedList,
        Some(Value::EmbeddedList(vec![Some(Value::Integer(1)), None])),
    );
    let bytes = serialize_document(&doc, 0).unwrap();
    let data = &bytes[1 + 1 + 1 + 4 + 1 + 1..];
    assert_eq!(
        data,
        &[
            0x04,
            OType::Any.tag(),
            OType::Integer.tag(),
            0x02,
            OType::Any.tag()
        ]
    );
}

#[test]
fn heterogeneous_set_with_nulls_and_documents() {
    let mut inner = Document::with_class("Point");
    inner.set("x", 1i32).set("y", 2i32);
    let items = vec![
        Some(Value::from(inner)),
        None,
        Some(Value::Double(0.5)),
        Some(Value::Link(Rid::new(3, 3))),
        Some(Value::from("tail")),
    ];
    let mut doc = Document::new();
    doc.set_typed("mixed", OType::EmbeddedSet, Some(Value::EmbeddedSet(items.clone())));
    let decoded = roundtrip(&doc);
    assert_eq!(decoded.get("mixed"), Some(&Value::EmbeddedSet(items)));
}

#[test]
fn embedded_map_restores_cursor_for_siblings() {
    let mut map = BTreeMap::new();
    map.insert("a".to_string(), Some(Value::from("x")));
    map.insert("b".to_string(), Some(Value::Integer(5)));
    map.insert("gone".to_string(), None);

    let mut holder = Document::new();
    holder.set("m", Value::EmbeddedMap(map.clone()));
    holder.set("after", "inner-sibling");

    // the list element after the nested document is only reachable if the
    // nested decode leaves the cursor past the map's values
    let items = vec![Some(Value::from(holder.clone())), Some(Value::from("outer-sibling"))];
    let mut doc = Document::new();
    doc.set("list", Value::EmbeddedList(items.clone()));
    doc.set("map", Value::EmbeddedMap(map));
    doc.set("last", 42i64);

    let decoded = roundtrip(&doc);
    assert_eq!(decoded, doc);
    let nested = decoded.get("list").and_then(Value::as_list).unwrap();
    assert_eq!(nested[1], Some(Value::from("outer-sibling")));
}

#[test]
fn link_collections_roundtrip() {
    let mut link_map = BTreeMap::new();
    link_map.insert("bff".to_string(), Rid::new(10, 0));
    link_map.insert("30".to_string(), Rid::new(10, 1));

    let mut doc = Document::new();
    doc.set("friends", Value::LinkMap(link_map));
    doc.set("visited", Value::LinkList(vec![Rid::new(1, 1), Rid::new(1, 1), Rid::new(2, 0)]));
    doc.set("owns", Value::LinkSet(vec![Rid::new(7, 70)]));

    let decoded = roundtrip(&doc);
    match decoded.get("friends") {
        Some(Value::LinkMap(map)) => {
            assert_eq!(map.len(), 2);
            assert_eq!(map.get("bff"), Some(&Rid::new(10, 0)));
            assert_eq!(map.get("30"), Some(&Rid::new(10, 1)));
        }
        other => panic!("expected LINKMAP, got {other:?}"),
    }
    assert_eq!(decoded, doc);
}

#[test]
fn link_map_layout_is_contiguous() {
    let mut link_map = BTreeMap::new();
    link_map.insert("k".to_string(), Rid::new(1, 2));
    let mut doc = Document::new();
    doc.set("m", Value::LinkMap(link_map));
    let bytes = serialize_document(&doc, 0).unwrap();
    let data = &bytes[1 + 1 + 1 + 4 + 1 + 1..];
    assert_eq!(data, &[0x02, OType::String.tag(), 0x02, b'k', 0x02, 0x04]);
}

/// A bare document with one field `m` of `otype` whose value starts at 9.
fn single_field_document(otype: OType, data: &[u8]) -> Vec<u8> {
    let mut bytes = vec![0x00, 0x02, b'm'];
    bytes.extend_from_slice(&9i32.to_be_bytes());
    bytes.push(otype.tag());
    bytes.push(0x00);
    bytes.extend_from_slice(data);
    bytes
}

#[test]
fn repeated_map_keys_are_rejected() {
    let key = OType::String.tag();
    let links = single_field_document(
        OType::LinkMap,
        &[0x04, key, 0x02, b'k', 0x02, 0x04, key, 0x02, b'k', 0x02, 0x06],
    );
    let mut doc = Document::new();
    let err = deserialize_document(&links, &mut doc, &NoGlobalProperties).unwrap_err();
    assert!(err.root_cause().is_malformed(), "{err}");
    assert!(err.to_string().contains("duplicate map key 'k'"), "{err}");

    // header ends at 9 + 1 + 2 * 8, values follow
    let int = OType::Integer.tag();
    let mut data = vec![0x04];
    for pointer in [26i32, 27] {
        data.extend_from_slice(&[key, 0x02, b'k']);
        data.extend_from_slice(&pointer.to_be_bytes());
        data.push(int);
    }
    data.extend_from_slice(&[0x02, 0x04]);
    let embedded = single_field_document(OType::EmbeddedMap, &data);
    let mut doc = Document::new();
    let err = deserialize_document(&embedded, &mut doc, &NoGlobalProperties).unwrap_err();
    assert!(err.root_cause().is_malformed(), "{err}");

    // the same bytes with distinct keys decode
    let mut fixed = embedded;
    fixed[20] = b'j';
    let mut doc = Document::new();
    deserialize_document(&fixed, &mut doc, &NoGlobalProperties).unwrap();
    let Some(Value::EmbeddedMap(map)) = doc.get("m") else {
        panic!("expected EMBEDDEDMAP, got {:?}", doc.get("m"));
    };
    assert_eq!(map.get("k"), Some(&Some(Value::Integer(1))));
    assert_eq!(map.get("j"), Some(&Some(Value::Integer(2))));
}

#[test]
fn embedded_link_bag_roundtrip_sets_owner() {
    let mut doc = Document::new();
    doc.set("out", RidBag::embedded(vec![Rid::new(9, 0), Rid::new(9, 1)]));
    let bytes = serialize_record(&doc).unwrap();

    let mut decoded = Document::new();
    decoded.set_rid(Rid::new(4, 4));
    deserialize_record(&bytes, &mut decoded, &NoGlobalProperties).unwrap();
    let bag = decoded.get("out").and_then(Value::as_link_bag).unwrap();
    assert!(bag.is_embedded());
    assert_eq!(bag.links(), Some(&[Rid::new(9, 0), Rid::new(9, 1)][..]));
    assert_eq!(bag.owner(), Some(Rid::new(4, 4)));
}

// =============================================================================
// Merge decoding
// =============================================================================

#[test]
fn existing_fields_are_not_overwritten() {
    let bytes = serialize_record(&{
        let mut doc = winston();
        doc.set_classname("Cat");
        doc
    })
    .unwrap();

    let mut target = Document::with_class("Keep");
    target.set("name", "Existing");
    deserialize_record(&bytes, &mut target, &NoGlobalProperties).unwrap();

    assert_eq!(target.classname(), Some("Keep"));
    assert_eq!(target.get("name").and_then(Value::as_str), Some("Existing"));
    assert_eq!(target.get("age"), Some(&Value::Integer(7)));
}

#[test]
fn classname_assigned_when_target_has_none() {
    let mut doc = Document::with_class("Cat");
    doc.set("a", 1i32);
    let bytes = serialize_record(&doc).unwrap();
    let mut target = Document::new();
    deserialize_record(&bytes, &mut target, &NoGlobalProperties).unwrap();
    assert_eq!(target.classname(), Some("Cat"));
}

// =============================================================================
// Global properties
// =============================================================================

/// Record with `name` as global property 0 (STRING) and `age` as global
/// property 1 (ANY, explicit INTEGER tag).
fn global_property_record() -> Vec<u8> {
    let mut bytes = vec![0x00];
    bytes.push(0x01); // zigzag(-1) => id 0
    bytes.extend_from_slice(&13i32.to_be_bytes());
    bytes.push(0x03); // zigzag(-2) => id 1
    bytes.extend_from_slice(&17i32.to_be_bytes());
    bytes.push(OType::Integer.tag());
    bytes.push(0x00);
    bytes.extend_from_slice(&[0x06, b'A', b'd', b'a']);
    bytes.push(0x48); // zigzag(36)
    bytes
}

#[test]
fn global_properties_resolve_names_and_types() {
    let schema = GlobalProperties::new([
        GlobalProperty::new(0, "name", OType::String),
        GlobalProperty::new(1, "age", OType::Any),
    ]);
    let mut doc = Document::new();
    deserialize_document(&global_property_record(), &mut doc, &schema).unwrap();

    assert_eq!(doc.field_names().collect::<Vec<_>>(), vec!["name", "age"]);
    assert_eq!(doc.entry("name").unwrap().otype, OType::String);
    assert_eq!(doc.get("name").and_then(Value::as_str), Some("Ada"));
    assert_eq!(doc.entry("age").unwrap().otype, OType::Integer);
    assert_eq!(doc.get("age"), Some(&Value::Integer(36)));
}

#[test]
fn unknown_global_property_fails() {
    let mut doc = Document::new();
    let err = deserialize_document(&global_property_record(), &mut doc, &NoGlobalProperties)
        .unwrap_err();
    assert!(matches!(err, BinaryError::GlobalPropertyNotFound(0)));
}

#[test]
fn serializer_is_shared_across_threads() {
    let schema = GlobalProperties::new([
        GlobalProperty::new(0, "name", OType::String),
        GlobalProperty::new(1, "age", OType::Any),
    ]);
    let serializer = RecordSerializer::new(&schema);
    let bytes = global_property_record();
    std::thread::scope(|s| {
        for _ in 0..4 {
            s.spawn(|| {
                for _ in 0..100 {
                    let mut doc = Document::new();
                    serializer.deserialize_document(&bytes, &mut doc).unwrap();
                    assert_eq!(doc.get("age"), Some(&Value::Integer(36)));
                }
            });
        }
    });
}

// =============================================================================
// Errors
// =============================================================================

#[test]
fn type_mismatch_names_the_field() {
    let mut doc = Document::new();
    doc.set("ok", 1i32);
    doc.set_typed("age", OType::Integer, Some(Value::from("seven")));
    let err = serialize_record(&doc).unwrap_err();
    assert!(err.is_type_mismatch());
    assert_eq!(err.field_name(), Some("age"));
    assert_eq!(
        err.to_string(),
        "Field 'age': Type mismatch: expected INTEGER, got STRING"
    );
}

#[test]
fn type_mismatch_inside_map_names_the_key() {
    let mut map = BTreeMap::new();
    map.insert("inner".to_string(), Some(Value::Custom(vec![1])));
    let mut doc = Document::new();
    doc.set("m", Value::EmbeddedMap(map));
    let err = serialize_record(&doc).unwrap_err();
    assert!(err.is_unsupported_type());
    assert_eq!(err.field_name(), Some("inner"));
}

#[test]
fn custom_type_is_rejected_on_decode() {
    let bytes = [0x00, 0x02, b'x', 0, 0, 0, 9, OType::Custom.tag(), 0x00, 0xaa];
    let mut doc = Document::new();
    let err = deserialize_document(&bytes, &mut doc, &NoGlobalProperties).unwrap_err();
    assert!(err.is_unsupported_type());
    assert_eq!(err.field_name(), Some("x"));
}

#[test]
fn unknown_type_tag_is_unsupported() {
    let bytes = [0x00, 0x02, b'x', 0, 0, 0, 0, 99, 0x00];
    let mut doc = Document::new();
    let err = deserialize_document(&bytes, &mut doc, &NoGlobalProperties).unwrap_err();
    assert!(err.is_unsupported_type());
}

#[test]
fn pointer_outside_buffer_is_malformed() {
    for pointer in [99i32, 9, -4] {
        let mut bytes = vec![0x00, 0x02, b'x'];
        bytes.extend_from_slice(&pointer.to_be_bytes());
        bytes.extend_from_slice(&[OType::Integer.tag(), 0x00]);
        let mut doc = Document::new();
        let err = deserialize_document(&bytes, &mut doc, &NoGlobalProperties).unwrap_err();
        assert!(err.is_malformed(), "pointer {pointer}: {err}");
    }
}

#[test]
fn truncated_varint_is_end_of_stream() {
    let mut doc = Document::new();
    let err = deserialize_document(&[0x00, 0x80], &mut doc, &NoGlobalProperties).unwrap_err();
    assert!(err.is_end_of_stream());
}

#[test]
fn every_truncation_fails_cleanly() {
    let mut doc = winston();
    doc.set("tags", Value::EmbeddedList(vec![Some(Value::from("a"))]));
    let bytes = serialize_record(&doc).unwrap();
    for cut in 0..bytes.len() {
        let mut target = Document::new();
        let result = deserialize_record(&bytes[..cut], &mut target, &NoGlobalProperties);
        assert!(result.is_err(), "prefix of {cut} bytes decoded");
    }
}

#[test]
fn unsupported_version_byte() {
    let mut bytes = serialize_record(&winston()).unwrap();
    bytes[0] = 1;
    let mut doc = Document::new();
    let err = deserialize_record(&bytes, &mut doc, &NoGlobalProperties).unwrap_err();
    assert!(matches!(err, BinaryError::UnsupportedVersion(1)));
}

#[test]
fn depth_limit_applies_both_ways() {
    let mut doc = Document::new();
    doc.set("leaf", 1i32);
    for _ in 0..4 {
        let mut outer = Document::new();
        outer.set("child", doc);
        doc = outer;
    }
    let shallow = CodecConfig {
        max_depth: 2,
        ..CodecConfig::default()
    };
    let serializer = RecordSerializer::with_config(&NoGlobalProperties, shallow);

    let err = serializer.serialize_record(&doc).unwrap_err();
    assert!(matches!(err.root_cause(), BinaryError::DepthLimitExceeded(2)));

    let bytes = serialize_record(&doc).unwrap();
    let mut target = Document::new();
    let err = serializer.deserialize_record(&bytes, &mut target).unwrap_err();
    assert!(matches!(err.root_cause(), BinaryError::DepthLimitExceeded(2)));

    let mut target = Document::new();
    RecordSerializer::new(&NoGlobalProperties)
        .deserialize_record(&bytes, &mut target)
        .unwrap();
    assert_eq!(target, doc);
}

#[test]
fn header_reader_sees_link_bag_control_byte() {
    let mut doc = Document::new();
    doc.set("out", RidBag::embedded(vec![]));
    let bytes = serialize_record(&doc).unwrap();

    let mut r = Reader::new(&bytes);
    r.seek(1).unwrap();
    assert_eq!(r.read_string().unwrap(), "");
    assert_eq!(r.read_string().unwrap(), "out");
    let pointer = r.read_i32().unwrap();
    assert_eq!(r.read_byte().unwrap(), OType::LinkBag.tag());
    assert_eq!(bytes[pointer as usize], 0x01);
}
