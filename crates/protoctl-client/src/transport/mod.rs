// crates/protoctl-client/src/transport/mod.rs
// ============================================================================
// Module: Transports
// Description: Wire-protocol specific call implementations.
// Purpose: Give the invoker one shape for unary and streamed responses.
// Dependencies: prost-reflect, tokio-stream
// ============================================================================

//! ## Overview
//! - [`grpc`]: HTTP/2 gRPC through a tonic channel.
//! - [`http`]: Connect and gRPC-Web through reqwest.

pub mod grpc;
pub mod http;

use std::pin::Pin;

use prost_reflect::DynamicMessage;
use tokio_stream::Stream;

use crate::error::InvokeError;

/// Request messages of a streamed call. An `Err` item aborts the request
/// stream instead of ending it.
pub type RequestItem = Result<DynamicMessage, InvokeError>;

/// Response messages of a streamed call, ending after the final status.
pub type ResponseStream = Pin<Box<dyn Stream<Item = Result<DynamicMessage, InvokeError>> + Send>>;
