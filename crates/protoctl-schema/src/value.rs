// crates/protoctl-schema/src/value.rs
// ============================================================================
// Module: Field Values
// Description: Tagged value tree for dynamically typed record fields.
// Purpose: Carry template defaults and bound flag values before JSON emission.
// Dependencies: base64, prost-reflect, serde_json
// ============================================================================

//! ## Overview
//! [`FieldValue`] is the runtime-typed value of one field. It renders to the
//! protobuf JSON mapping: bytes as standard base64, enums by value name when
//! the enum defines the number, and nested records as JSON objects.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use prost_reflect::EnumDescriptor;
use serde_json::Map;
use serde_json::Number;
use serde_json::Value;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Runtime-typed value of a field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// Boolean value.
    Bool(bool),
    /// Signed integer of any width.
    Signed(i64),
    /// Unsigned integer of any width.
    Unsigned(u64),
    /// Floating point value.
    Float(f64),
    /// UTF-8 string.
    String(String),
    /// Raw bytes.
    Bytes(Vec<u8>),
    /// Enum value number with its name when defined.
    Enum {
        /// Numeric value.
        number: i32,
        /// Value name, when the enum defines `number`.
        name: Option<String>,
    },
    /// Ordered list of values.
    List(Vec<Self>),
    /// Map keyed by the rendered map key.
    Map(BTreeMap<String, Self>),
    /// Nested record keyed by JSON field name.
    Record(BTreeMap<String, Self>),
    /// Arbitrary JSON supplied verbatim.
    Json(Value),
}

impl FieldValue {
    /// Builds an enum value, resolving its name from the descriptor.
    #[must_use]
    pub fn enum_value(descriptor: &EnumDescriptor, number: i32) -> Self {
        Self::Enum {
            number,
            name: descriptor.get_value(number).map(|value| value.name().to_string()),
        }
    }

    /// Renders the value using the protobuf JSON mapping.
    #[must_use]
    pub fn to_json(&self) -> Value {
        match self {
            Self::Bool(value) => Value::Bool(*value),
            Self::Signed(value) => Value::Number(Number::from(*value)),
            Self::Unsigned(value) => Value::Number(Number::from(*value)),
            Self::Float(value) => float_json(*value),
            Self::String(value) => Value::String(value.clone()),
            Self::Bytes(value) => Value::String(BASE64.encode(value)),
            Self::Enum {
                number,
                name,
            } => name.as_ref().map_or_else(
                || Value::Number(Number::from(*number)),
                |name| Value::String(name.clone()),
            ),
            Self::List(items) => Value::Array(items.iter().map(Self::to_json).collect()),
            Self::Map(entries) | Self::Record(entries) => Value::Object(
                entries
                    .iter()
                    .map(|(key, value)| (key.clone(), value.to_json()))
                    .collect::<Map<_, _>>(),
            ),
            Self::Json(value) => value.clone(),
        }
    }

    /// Renders a map key. Map keys are always JSON strings.
    #[must_use]
    pub fn to_map_key(&self) -> String {
        match self {
            Self::String(value) => value.clone(),
            other => match other.to_json() {
                Value::String(text) => text,
                rendered => rendered.to_string(),
            },
        }
    }
}

/// Renders a float, using the JSON string forms for non-finite values.
fn float_json(value: f64) -> Value {
    Number::from_f64(value).map_or_else(
        || {
            let label = if value.is_nan() {
                "NaN"
            } else if value.is_sign_positive() {
                "Infinity"
            } else {
                "-Infinity"
            };
            Value::String(label.to_string())
        },
        Value::Number,
    )
}
