// crates/protoctl-schema/src/lib.rs
// ============================================================================
// Module: protoctl Schema Library
// Description: Descriptor-backed schema model for dynamic RPC invocation.
// Purpose: Expose services, operations, record types, templates, and binders.
// Dependencies: prost, prost-reflect, prost-types, serde_json, thiserror.
// ============================================================================

//! ## Overview
//! `protoctl-schema` turns an encoded `FileDescriptorSet` into a navigable
//! [`SchemaModel`] without any compiled bindings. On top of the model it
//! provides the representative payload generator ([`generate_template`]) and
//! the per-record flag binder ([`DynamicValue`]) used by the command layer.
//!
//! ## Invariants
//! - Service command names are unique within one [`SchemaModel`].
//! - Record types may be recursive; every walk over them is cycle-safe.
//! - Unset binder slots never appear in emitted payloads.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod binder;
pub mod model;
pub mod template;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod value;


// ============================================================================
// SECTION: Re-exports
// ============================================================================

pub use binder::BindError;
pub use binder::DynamicValue;
pub use binder::Slot;
pub use binder::parse_field_value;
pub use model::Cardinality;
pub use model::FieldDefinition;
pub use model::FieldKind;
pub use model::OperationDefinition;
pub use model::REFLECTION_PACKAGE;
pub use model::RecordType;
pub use model::SchemaError;
pub use model::SchemaModel;
pub use model::ServiceDefinition;
pub use model::StreamingMode;
pub use template::Template;
pub use template::field_default;
pub use template::generate_template;
pub use value::FieldValue;
