// crates/protoctl-client/src/lib.rs
// ============================================================================
// Module: protoctl Client Library
// Description: Schema discovery and descriptor-driven RPC invocation.
// Purpose: Call any described RPC without generated bindings.
// Dependencies: prost-reflect, reqwest, tokio, tonic
// ============================================================================

//! ## Overview
//! - [`discovery`]: [`SchemaSource`] implementations that load a
//!   [`protoctl_schema::SchemaModel`] from static bytes or from server
//!   reflection (v1 with v1alpha fallback, cached, deadline-bounded).
//! - [`invoke`]: the [`Invoker`] performing unary and streaming calls over
//!   gRPC, Connect, or gRPC-Web, translating JSON payloads with a per-call
//!   [`CallRegistry`].
//! - [`envelope`]: the 5-byte message envelope shared by Connect streaming
//!   and gRPC-Web.

pub mod codec;
pub mod discovery;
pub mod envelope;
pub mod error;
pub mod headers;
pub mod invoke;
pub mod reflection;
pub mod registry;
pub mod target;
mod transport;


pub use codec::DynamicCodec;
pub use discovery::DEFAULT_DISCOVERY_DEADLINE;
pub use discovery::ReflectionSchemaSource;
pub use discovery::SchemaSource;
pub use discovery::StaticSchemaSource;
pub use error::DiscoveryError;
pub use error::HeaderError;
pub use error::InvokeError;
pub use error::code_name;
pub use headers::Headers;
pub use invoke::Invoker;
pub use invoke::STREAM_BUFFER;
pub use registry::CallRegistry;
pub use target::CallTarget;
pub use target::Protocol;
