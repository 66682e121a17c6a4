// crates/protoctl-schema/src/binder.rs
// ============================================================================
// Module: Dynamic Value Binder
// Description: Per-record slots bound to command-line flag values.
// Purpose: Turn typed flag input into a JSON payload without zero-filling.
// Dependencies: serde_json, thiserror
// ============================================================================

//! ## Overview
//! A [`DynamicValue`] holds one [`Slot`] per field of a record. Each slot keeps
//! the field's template default (used for completion hints) and, once a flag
//! sets it, the parsed value. Only touched slots reach the emitted payload.
//!
//! ## Invariants
//! - Untouched slots are omitted from [`DynamicValue::to_json`].
//! - Repeated fields append on every set; map fields insert on every set.
//! - Parsing is kind-aware: integers are range-checked for their width.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::num::ParseFloatError;
use std::str::FromStr;

use serde_json::Map;
use serde_json::Value;
use thiserror::Error;

use crate::model::Cardinality;
use crate::model::FieldDefinition;
use crate::model::FieldKind;
use crate::model::RecordType;
use crate::template::generate_template;
use crate::value::FieldValue;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Flag binding errors.
///
/// # Invariants
/// - Variants are stable for CLI error mapping and tests.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BindError {
    /// No field carries the requested JSON name.
    #[error("unknown field: {0}")]
    UnknownField(String),
    /// A flag value does not parse for the field kind.
    #[error("invalid value for --{field}: {reason}")]
    InvalidValue {
        /// JSON name of the field.
        field: String,
        /// Parser failure detail.
        reason: String,
    },
    /// An explicit JSON payload is malformed.
    #[error("invalid json payload: {0}")]
    InvalidJson(String),
}

// ============================================================================
// SECTION: Types
// ============================================================================

/// One field's binding state.
#[derive(Debug, Clone, PartialEq)]
pub struct Slot {
    /// Bound field.
    field: FieldDefinition,
    /// Template default used for hints.
    default: FieldValue,
    /// Value set from a flag; `None` while untouched.
    value: Option<FieldValue>,
}

impl Slot {
    /// Returns the bound field.
    #[must_use]
    pub const fn field(&self) -> &FieldDefinition {
        &self.field
    }

    /// Returns the template default.
    #[must_use]
    pub const fn default_value(&self) -> &FieldValue {
        &self.default
    }

    /// Returns the value set from a flag.
    #[must_use]
    pub const fn value(&self) -> Option<&FieldValue> {
        self.value.as_ref()
    }

    /// Returns true once any flag has set this slot.
    #[must_use]
    pub const fn is_touched(&self) -> bool {
        self.value.is_some()
    }
}

/// Runtime-typed container of one record's flag bindings.
#[derive(Debug, Clone, PartialEq)]
pub struct DynamicValue {
    /// Record the slots belong to.
    record: RecordType,
    /// Slots in field declaration order.
    slots: Vec<Slot>,
}

impl DynamicValue {
    /// Creates an untouched binder for `record`, seeded with template defaults.
    #[must_use]
    pub fn new(record: &RecordType) -> Self {
        let template = generate_template(record);
        let slots = record
            .fields()
            .into_iter()
            .map(|field| {
                let default = template
                    .field(field.json_name())
                    .cloned()
                    .unwrap_or_else(|| field.default_value());
                Slot {
                    field,
                    default,
                    value: None,
                }
            })
            .collect();
        Self {
            record: record.clone(),
            slots,
        }
    }

    /// Returns the bound record type.
    #[must_use]
    pub const fn record(&self) -> &RecordType {
        &self.record
    }

    /// Returns all slots in declaration order.
    #[must_use]
    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    /// Looks up a slot by JSON name.
    #[must_use]
    pub fn slot(&self, json_name: &str) -> Option<&Slot> {
        self.slots.iter().find(|slot| slot.field.json_name() == json_name)
    }

    /// Returns true when the named slot has been set.
    #[must_use]
    pub fn is_touched(&self, json_name: &str) -> bool {
        self.slot(json_name).is_some_and(Slot::is_touched)
    }

    /// Returns true when no slot has been set.
    #[must_use]
    pub fn is_untouched(&self) -> bool {
        !self.slots.iter().any(Slot::is_touched)
    }

    /// Parses `raw` for the named field and records it.
    ///
    /// # Errors
    ///
    /// Returns [`BindError::UnknownField`] for unknown names and
    /// [`BindError::InvalidValue`] when `raw` does not parse.
    pub fn set(&mut self, json_name: &str, raw: &str) -> Result<(), BindError> {
        let slot = self.slot_mut(json_name)?;
        match slot.field.cardinality() {
            Cardinality::Single => {
                slot.value = Some(parse_field_value(&slot.field, raw)?);
            }
            Cardinality::Repeated => {
                let item = parse_scalar(&slot.field.kind(), raw, slot.field.json_name())?;
                match &mut slot.value {
                    Some(FieldValue::List(items)) => items.push(item),
                    _ => slot.value = Some(FieldValue::List(vec![item])),
                }
            }
            Cardinality::Map => {
                let (key, value) = parse_map_entry(&slot.field, raw)?;
                match &mut slot.value {
                    Some(FieldValue::Map(entries)) => {
                        entries.insert(key, value);
                    }
                    _ => slot.value = Some(FieldValue::Map(BTreeMap::from([(key, value)]))),
                }
            }
        }
        Ok(())
    }

    /// Records an already-typed value for the named field.
    ///
    /// # Errors
    ///
    /// Returns [`BindError::UnknownField`] for unknown names.
    pub fn set_value(&mut self, json_name: &str, value: FieldValue) -> Result<(), BindError> {
        self.slot_mut(json_name)?.value = Some(value);
        Ok(())
    }

    /// Renders the touched slots as a JSON object.
    #[must_use]
    pub fn to_json(&self) -> Value {
        let object: Map<String, Value> = self
            .slots
            .iter()
            .filter_map(|slot| {
                let value = slot.value.as_ref()?;
                Some((slot.field.json_name().to_string(), value.to_json()))
            })
            .collect();
        Value::Object(object)
    }

    /// Returns the request payload text.
    ///
    /// An explicit payload wins and is passed through verbatim once it parses
    /// as JSON; otherwise the payload is synthesized from touched slots.
    ///
    /// # Errors
    ///
    /// Returns [`BindError::InvalidJson`] when `explicit` is not valid JSON.
    pub fn payload(&self, explicit: Option<&str>) -> Result<String, BindError> {
        if let Some(text) = explicit {
            serde_json::from_str::<Value>(text)
                .map_err(|err| BindError::InvalidJson(err.to_string()))?;
            return Ok(text.to_string());
        }
        Ok(self.to_json().to_string())
    }

    /// Finds a slot for mutation.
    fn slot_mut(&mut self, json_name: &str) -> Result<&mut Slot, BindError> {
        self.slots
            .iter_mut()
            .find(|slot| slot.field.json_name() == json_name)
            .ok_or_else(|| BindError::UnknownField(json_name.to_string()))
    }
}

// ============================================================================
// SECTION: Parsing
// ============================================================================

/// Parses one flag occurrence for `field`.
///
/// Repeated fields parse a single element; map fields parse one `key=value`
/// entry into a one-entry map.
///
/// # Errors
///
/// Returns [`BindError::InvalidValue`] when `raw` does not parse.
pub fn parse_field_value(field: &FieldDefinition, raw: &str) -> Result<FieldValue, BindError> {
    match field.cardinality() {
        Cardinality::Single | Cardinality::Repeated => {
            parse_scalar(&field.kind(), raw, field.json_name())
        }
        Cardinality::Map => {
            let (key, value) = parse_map_entry(field, raw)?;
            Ok(FieldValue::Map(BTreeMap::from([(key, value)])))
        }
    }
}

/// Parses a `key=value` map entry.
fn parse_map_entry(field: &FieldDefinition, raw: &str) -> Result<(String, FieldValue), BindError> {
    let invalid = |reason: String| BindError::InvalidValue {
        field: field.json_name().to_string(),
        reason,
    };
    let (key_field, value_field) =
        field.map_entry().ok_or_else(|| invalid("field is not a map".to_string()))?;
    let (key, value) =
        raw.split_once('=').ok_or_else(|| invalid(format!("expected key=value, got '{raw}'")))?;
    let key = parse_scalar(&key_field.kind(), key, field.json_name())?.to_map_key();
    let value = parse_scalar(&value_field.kind(), value, field.json_name())?;
    Ok((key, value))
}

/// Parses a float, rejecting finite input that overflows the width.
///
/// Explicit infinities (`inf`, `-Infinity`) and `NaN` are kept.
fn parse_float<T>(raw: &str) -> Result<T, String>
where
    T: FromStr<Err = ParseFloatError> + Into<f64> + Copy,
{
    let value = raw.parse::<T>().map_err(|err| err.to_string())?;
    let unsigned = raw.strip_prefix(['+', '-']).unwrap_or(raw);
    let spelled_infinite =
        unsigned.eq_ignore_ascii_case("inf") || unsigned.eq_ignore_ascii_case("infinity");
    if value.into().is_infinite() && !spelled_infinite {
        return Err(format!("'{raw}' is out of range"));
    }
    Ok(value)
}

/// Parses a single element of `kind`.
fn parse_scalar(kind: &FieldKind, raw: &str, field: &str) -> Result<FieldValue, BindError> {
    let invalid = |reason: String| BindError::InvalidValue {
        field: field.to_string(),
        reason,
    };
    let trimmed = raw.trim();
    let value = match kind {
        FieldKind::Bool => FieldValue::Bool(
            parse_bool(trimmed).ok_or_else(|| invalid(format!("expected a boolean, got '{raw}'")))?,
        ),
        FieldKind::Int32 | FieldKind::Sint32 | FieldKind::Sfixed32 => FieldValue::Signed(
            trimmed.parse::<i32>().map(i64::from).map_err(|err| invalid(err.to_string()))?,
        ),
        FieldKind::Int64 | FieldKind::Sint64 | FieldKind::Sfixed64 => {
            FieldValue::Signed(trimmed.parse::<i64>().map_err(|err| invalid(err.to_string()))?)
        }
        FieldKind::Uint32 | FieldKind::Fixed32 => FieldValue::Unsigned(
            trimmed.parse::<u32>().map(u64::from).map_err(|err| invalid(err.to_string()))?,
        ),
        FieldKind::Uint64 | FieldKind::Fixed64 => {
            FieldValue::Unsigned(trimmed.parse::<u64>().map_err(|err| invalid(err.to_string()))?)
        }
        FieldKind::Float => {
            FieldValue::Float(parse_float::<f32>(trimmed).map(f64::from).map_err(invalid)?)
        }
        FieldKind::Double => FieldValue::Float(parse_float::<f64>(trimmed).map_err(invalid)?),
        FieldKind::String => FieldValue::String(raw.to_string()),
        FieldKind::Bytes => FieldValue::Bytes(raw.as_bytes().to_vec()),
        FieldKind::Enum(descriptor) => {
            if let Some(named) = descriptor.get_value_by_name(trimmed) {
                FieldValue::Enum {
                    number: named.number(),
                    name: Some(named.name().to_string()),
                }
            } else if let Ok(number) = trimmed.parse::<i32>() {
                FieldValue::enum_value(descriptor, number)
            } else {
                let names: Vec<String> =
                    descriptor.values().map(|value| value.name().to_string()).collect();
                return Err(invalid(format!("expected one of {}", names.join(", "))));
            }
        }
        FieldKind::Message(record) => {
            let parsed: Value =
                serde_json::from_str(raw).map_err(|err| invalid(format!("invalid JSON: {err}")))?;
            if !parsed.is_object() && !record.full_name().starts_with("google.protobuf.") {
                return Err(invalid("expected a JSON object".to_string()));
            }
            FieldValue::Json(parsed)
        }
    };
    Ok(value)
}

/// Parses the boolean spellings accepted on the command line.
fn parse_bool(raw: &str) -> Option<bool> {
    match raw {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Some(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Some(false),
        _ => None,
    }
}
