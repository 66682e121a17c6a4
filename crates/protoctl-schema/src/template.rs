// crates/protoctl-schema/src/template.rs
// ============================================================================
// Module: Template Generator
// Description: Representative default payloads for arbitrary record types.
// Purpose: Seed completion hints and binder defaults without user input.
// Dependencies: prost-reflect, serde_json
// ============================================================================

//! ## Overview
//! [`generate_template`] walks a record type and produces a JSON skeleton in
//! which every field carries a representative value: `true`, `1`, `1.1`,
//! `"string"`, the field's JSON name as bytes, or enum value `1`. Nested
//! records recurse, repeated fields hold one element and maps one entry.
//! Well-known wrapper and JSON types are rendered in their JSON form instead
//! of being expanded.
//!
//! ## Invariants
//! - The walk carries an explicit stack of record names; a record already on
//!   the stack renders as `{}` so generation terminates for every schema.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use prost_reflect::FieldDescriptor;
use prost_reflect::Kind;
use prost_reflect::MessageDescriptor;
use serde_json::Value;

use crate::model::FieldDefinition;
use crate::model::RecordType;
use crate::value::FieldValue;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Type URL used for `google.protobuf.Any` placeholders.
pub const ANY_PLACEHOLDER_TYPE_URL: &str = "type.googleapis.com/google.protobuf.Empty";

// ============================================================================
// SECTION: Types
// ============================================================================

/// Representative payload for one record type.
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    /// Root value; a record for everything except well-known JSON types.
    root: FieldValue,
}

/// Field map returned for templates whose root is not a record.
static NO_FIELDS: BTreeMap<String, FieldValue> = BTreeMap::new();

impl Template {
    /// Returns the per-field values keyed by JSON name.
    #[must_use]
    pub fn fields(&self) -> &BTreeMap<String, FieldValue> {
        match &self.root {
            FieldValue::Record(fields) => fields,
            _ => &NO_FIELDS,
        }
    }

    /// Returns the value of one field.
    #[must_use]
    pub fn field(&self, json_name: &str) -> Option<&FieldValue> {
        self.fields().get(json_name)
    }

    /// Returns the root value.
    #[must_use]
    pub const fn root(&self) -> &FieldValue {
        &self.root
    }

    /// Returns the template as a JSON value.
    #[must_use]
    pub fn json(&self) -> Value {
        self.root.to_json()
    }

    /// Returns the template as compact JSON text.
    #[must_use]
    pub fn to_json_string(&self) -> String {
        self.json().to_string()
    }

    /// Returns the template as indented JSON text.
    #[must_use]
    pub fn to_pretty_string(&self) -> String {
        let json = self.json();
        serde_json::to_string_pretty(&json).unwrap_or_else(|_| json.to_string())
    }
}

// ============================================================================
// SECTION: Generation
// ============================================================================

/// Generates the representative payload for `record`.
#[must_use]
pub fn generate_template(record: &RecordType) -> Template {
    let mut path = Vec::new();
    Template {
        root: record_value(record.descriptor(), &mut path),
    }
}

/// Returns the representative value of a single field of `parent`.
///
/// The parent record is placed on the path first, so a field referring back
/// to its own record renders as `{}` just as it does inside a full template.
#[must_use]
pub fn field_default(parent: &RecordType, field: &FieldDefinition) -> FieldValue {
    let mut path = vec![parent.full_name().to_string()];
    field_value(field.descriptor(), &mut path)
}

/// Builds the value of a record, breaking cycles through `path`.
fn record_value(descriptor: &MessageDescriptor, path: &mut Vec<String>) -> FieldValue {
    if let Some(value) = well_known_value(descriptor) {
        return value;
    }
    if path.iter().any(|seen| seen == descriptor.full_name()) {
        return FieldValue::Record(BTreeMap::new());
    }
    path.push(descriptor.full_name().to_string());
    let fields = descriptor
        .fields()
        .map(|field| (field.json_name().to_string(), field_value(&field, path)))
        .collect();
    path.pop();
    FieldValue::Record(fields)
}

/// Builds the value of one field according to its cardinality.
fn field_value(field: &FieldDescriptor, path: &mut Vec<String>) -> FieldValue {
    if field.is_map() {
        let Kind::Message(entry) = field.kind() else {
            return FieldValue::Map(BTreeMap::new());
        };
        let key_field = entry.map_entry_key_field();
        let value_field = entry.map_entry_value_field();
        let key = single_value(&key_field, path).to_map_key();
        let value = single_value(&value_field, path);
        return FieldValue::Map(BTreeMap::from([(key, value)]));
    }
    let value = single_value(field, path);
    if field.is_list() {
        return FieldValue::List(vec![value]);
    }
    value
}

/// Builds the representative value of one element of a field.
fn single_value(field: &FieldDescriptor, path: &mut Vec<String>) -> FieldValue {
    match field.kind() {
        Kind::Bool => FieldValue::Bool(true),
        Kind::Int32
        | Kind::Int64
        | Kind::Sint32
        | Kind::Sint64
        | Kind::Sfixed32
        | Kind::Sfixed64 => FieldValue::Signed(1),
        Kind::Uint32 | Kind::Uint64 | Kind::Fixed32 | Kind::Fixed64 => FieldValue::Unsigned(1),
        Kind::Float | Kind::Double => FieldValue::Float(1.1),
        Kind::String => FieldValue::String("string".to_string()),
        Kind::Bytes => FieldValue::Bytes(field.json_name().as_bytes().to_vec()),
        Kind::Enum(descriptor) => FieldValue::enum_value(&descriptor, 1),
        Kind::Message(descriptor) => record_value(&descriptor, path),
    }
}

/// Renders well-known types in their JSON form.
fn well_known_value(descriptor: &MessageDescriptor) -> Option<FieldValue> {
    let text = |value: &str| FieldValue::String(value.to_string());
    let value = match descriptor.full_name() {
        "google.protobuf.Any" => FieldValue::Record(BTreeMap::from([(
            "@type".to_string(),
            text(ANY_PLACEHOLDER_TYPE_URL),
        )])),
        "google.protobuf.Value" => FieldValue::Record(BTreeMap::from([(
            "google.protobuf.Value".to_string(),
            text("supports arbitrary JSON"),
        )])),
        "google.protobuf.ListValue" => FieldValue::List(vec![FieldValue::Record(BTreeMap::from([(
            "google.protobuf.ListValue".to_string(),
            text("is an array of arbitrary JSON values"),
        )]))]),
        "google.protobuf.Struct" => FieldValue::Record(BTreeMap::from([(
            "google.protobuf.Struct".to_string(),
            text("supports arbitrary JSON objects"),
        )])),
        "google.protobuf.Empty" => FieldValue::Record(BTreeMap::new()),
        "google.protobuf.Timestamp" => text("1970-01-01T00:00:01Z"),
        "google.protobuf.Duration" => text("1s"),
        "google.protobuf.FieldMask" => text("string"),
        "google.protobuf.BoolValue" => FieldValue::Bool(true),
        "google.protobuf.Int32Value" | "google.protobuf.Int64Value" => FieldValue::Signed(1),
        "google.protobuf.UInt32Value" | "google.protobuf.UInt64Value" => FieldValue::Unsigned(1),
        "google.protobuf.FloatValue" | "google.protobuf.DoubleValue" => FieldValue::Float(1.1),
        "google.protobuf.StringValue" => text("string"),
        "google.protobuf.BytesValue" => FieldValue::Bytes(b"bytes".to_vec()),
        _ => return None,
    };
    Some(value)
}
