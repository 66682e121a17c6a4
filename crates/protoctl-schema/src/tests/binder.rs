// crates/protoctl-schema/src/tests/binder.rs
// ============================================================================
// Module: Dynamic Value Binder Tests
// Description: Unit tests for flag parsing, touched tracking, and payloads.
// Purpose: Ensure unset fields are omitted and invalid input fails early.
// Dependencies: protoctl-schema binder, testing fixtures
// ============================================================================

//! ## Overview
//! Validates kind-aware parsing, repeated/map accumulation, and the
//! touched-only payload synthesis.

use serde_json::json;

use crate::binder::BindError;
use crate::binder::DynamicValue;
use crate::testing::example_model;
use crate::testing::kinds_model;
use crate::value::FieldValue;

/// Empty `kinds.Everything` value.
fn everything() -> DynamicValue {
    let model = kinds_model();
    DynamicValue::new(&model.record("kinds.Everything").unwrap())
}

#[test]
fn untouched_binder_emits_empty_object() {
    let model = example_model();
    let value = DynamicValue::new(&model.record("example.ExampleRequest").unwrap());
    assert!(value.is_untouched());
    assert_eq!(value.to_json(), json!({}));
    assert_eq!(value.payload(None).unwrap(), "{}");
    let slot = value.slot("message").unwrap();
    assert_eq!(slot.default_value(), &FieldValue::String("string".to_string()));
    assert!(!slot.is_touched());
}

#[test]
fn set_fields_are_emitted_with_their_values() {
    let model = example_model();
    let mut value = DynamicValue::new(&model.record("example.ExampleRequest").unwrap());
    value.set("message", "blah").unwrap();
    assert!(value.is_touched("message"));
    assert_eq!(value.to_json(), json!({ "message": "blah" }));
}

#[test]
fn only_touched_fields_are_emitted() {
    let mut value = everything();
    value.set("flag", "false").unwrap();
    value.set("label", "").unwrap();
    assert_eq!(value.to_json(), json!({ "flag": false, "label": "" }));
}

#[test]
fn integers_are_range_checked_per_width() {
    let mut value = everything();
    assert!(matches!(value.set("small", "3000000000"), Err(BindError::InvalidValue { .. })));
    value.set("big", "3000000000").unwrap();
    assert!(value.set("smallUnsigned", "-1").is_err());
    value.set("bigUnsigned", "18446744073709551615").unwrap();
    assert_eq!(value.to_json()["big"], json!(3_000_000_000_i64));
    assert_eq!(value.to_json()["bigUnsigned"], json!(u64::MAX));
}

#[test]
fn booleans_accept_common_spellings() {
    let mut value = everything();
    value.set("flag", "T").unwrap();
    assert_eq!(value.to_json()["flag"], json!(true));
    let err = value.set("flag", "maybe").unwrap_err();
    assert_eq!(
        err,
        BindError::InvalidValue {
            field: "flag".to_string(),
            reason: "expected a boolean, got 'maybe'".to_string(),
        }
    );
}

#[test]
fn floats_parse_for_both_widths() {
    let mut value = everything();
    value.set("precise", "2.5").unwrap();
    value.set("ratio", "0.5").unwrap();
    assert_eq!(value.to_json()["precise"], json!(2.5));
    assert_eq!(value.to_json()["ratio"], json!(0.5));
    assert!(value.set("precise", "abc").is_err());
}

#[test]
fn floats_out_of_range_are_rejected() {
    let mut value = everything();
    let err = value.set("ratio", "1e39").unwrap_err();
    assert_eq!(
        err,
        BindError::InvalidValue {
            field: "ratio".to_string(),
            reason: "'1e39' is out of range".to_string(),
        }
    );
    assert!(value.set("precise", "1e400").is_err());
    value.set("precise", "1e39").unwrap();
    value.set("ratio", "-inf").unwrap();
    assert_eq!(value.to_json()["ratio"], json!("-Infinity"));
}

#[test]
fn enums_accept_names_and_numbers() {
    let mut value = everything();
    value.set("color", "GREEN").unwrap();
    assert_eq!(value.to_json()["color"], json!("GREEN"));
    value.set("color", "1").unwrap();
    assert_eq!(value.to_json()["color"], json!("RED"));
    value.set("color", "7").unwrap();
    assert_eq!(value.to_json()["color"], json!(7));
    let err = value.set("color", "PURPLE").unwrap_err();
    assert!(err.to_string().contains("COLOR_UNSPECIFIED, RED, GREEN"));
}

#[test]
fn bytes_are_taken_verbatim_and_rendered_as_base64() {
    let mut value = everything();
    value.set("rawData", "hi").unwrap();
    assert_eq!(value.to_json()["rawData"], json!("aGk="));
}

#[test]
fn repeated_fields_append() {
    let mut value = everything();
    value.set("tags", "a").unwrap();
    value.set("tags", "b").unwrap();
    assert_eq!(value.to_json()["tags"], json!(["a", "b"]));
}

#[test]
fn map_fields_insert_key_value_entries() {
    let mut value = everything();
    value.set("counts", "a=1").unwrap();
    value.set("counts", "b=2").unwrap();
    assert_eq!(value.to_json()["counts"], json!({ "a": 1, "b": 2 }));
    assert!(value.set("counts", "missing-separator").is_err());
    assert!(value.set("counts", "a=not-a-number").is_err());
}

#[test]
fn message_fields_take_inline_json_objects() {
    let mut value = everything();
    value.set("node", r#"{"name":"root"}"#).unwrap();
    assert_eq!(value.to_json()["node"], json!({ "name": "root" }));
    assert!(value.set("node", "[1]").is_err());
    value.set("anything", "[1, 2]").unwrap();
    assert_eq!(value.to_json()["anything"], json!([1, 2]));
}

#[test]
fn unknown_fields_are_rejected() {
    let mut value = everything();
    assert_eq!(
        value.set("nope", "1").unwrap_err(),
        BindError::UnknownField("nope".to_string())
    );
}

#[test]
fn explicit_payload_wins_when_valid() {
    let mut value = everything();
    value.set("flag", "true").unwrap();
    let explicit = r#"{"label": "from-json"}"#;
    assert_eq!(value.payload(Some(explicit)).unwrap(), explicit);
    assert!(matches!(value.payload(Some("{not json")), Err(BindError::InvalidJson(_))));
}
