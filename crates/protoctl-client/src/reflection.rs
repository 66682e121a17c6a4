// crates/protoctl-client/src/reflection.rs
// ============================================================================
// Module: Reflection Client
// Description: gRPC server reflection session over a tonic channel.
// Purpose: Fetch the descriptor files of every service a server exposes.
// Dependencies: prost, prost-types, tokio, tokio-stream, tonic, tracing
// ============================================================================

//! ## Overview
//! A session opens one bidirectional `ServerReflectionInfo` stream, sends
//! `list_services`, then `file_containing_symbol` for each listed service,
//! decoding every returned file and skipping files already seen by name.
//!
//! The v1 and v1alpha services share one message layout, so the same
//! message types serve both; only the method path differs. v1 is tried
//! first and v1alpha once when v1 answers `Unimplemented`.
//!
//! ## Invariants
//! - An empty service list is a protocol error.
//! - Either every listed service resolves or the session fails.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashSet;

use prost::Message;
use prost_types::FileDescriptorProto;
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;
use tonic::Request;
use tonic::Streaming;
use tonic::codec::ProstCodec;
use tonic::codegen::http::uri::PathAndQuery;
use tonic::transport::Channel;
use tracing::debug;

use crate::error::DiscoveryError;
use crate::headers::Headers;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Method path of the v1 reflection service.
pub const REFLECTION_V1_PATH: &str = "/grpc.reflection.v1.ServerReflection/ServerReflectionInfo";
/// Method path of the v1alpha reflection service.
pub const REFLECTION_V1ALPHA_PATH: &str =
    "/grpc.reflection.v1alpha.ServerReflection/ServerReflectionInfo";
/// Outstanding requests buffered on the session stream.
const REQUEST_BUFFER: usize = 16;

// ============================================================================
// SECTION: Wire Messages
// ============================================================================

/// Reflection request.
#[derive(Clone, PartialEq, Message)]
pub struct ServerReflectionRequest {
    /// Virtual host; unused.
    #[prost(string, tag = "1")]
    pub host: String,
    /// Request body.
    #[prost(oneof = "ReflectionQuery", tags = "3, 4, 7")]
    pub message_request: Option<ReflectionQuery>,
}

/// Reflection request body.
#[derive(Clone, PartialEq, prost::Oneof)]
pub enum ReflectionQuery {
    /// File by path.
    #[prost(string, tag = "3")]
    FileByFilename(String),
    /// File defining a fully-qualified symbol.
    #[prost(string, tag = "4")]
    FileContainingSymbol(String),
    /// Service listing; the content is ignored.
    #[prost(string, tag = "7")]
    ListServices(String),
}

/// Reflection response.
#[derive(Clone, PartialEq, Message)]
pub struct ServerReflectionResponse {
    /// Host echoed by the server.
    #[prost(string, tag = "1")]
    pub valid_host: String,
    /// Request this response answers.
    #[prost(message, optional, tag = "2")]
    pub original_request: Option<ServerReflectionRequest>,
    /// Response body.
    #[prost(oneof = "ReflectionAnswer", tags = "4, 6, 7")]
    pub message_response: Option<ReflectionAnswer>,
}

/// Reflection response body.
#[derive(Clone, PartialEq, prost::Oneof)]
pub enum ReflectionAnswer {
    /// Encoded descriptor files.
    #[prost(message, tag = "4")]
    FileDescriptorResponse(FileDescriptorResponse),
    /// Listed services.
    #[prost(message, tag = "6")]
    ListServicesResponse(ListServiceResponse),
    /// Request failure.
    #[prost(message, tag = "7")]
    ErrorResponse(ErrorResponse),
}

/// Encoded `FileDescriptorProto` messages.
#[derive(Clone, PartialEq, Message)]
pub struct FileDescriptorResponse {
    /// Serialized files.
    #[prost(bytes = "vec", repeated, tag = "1")]
    pub file_descriptor_proto: Vec<Vec<u8>>,
}

/// Listed services.
#[derive(Clone, PartialEq, Message)]
pub struct ListServiceResponse {
    /// Services in server order.
    #[prost(message, repeated, tag = "1")]
    pub service: Vec<ServiceResponse>,
}

/// One listed service.
#[derive(Clone, PartialEq, Message)]
pub struct ServiceResponse {
    /// Fully-qualified service name.
    #[prost(string, tag = "1")]
    pub name: String,
}

/// Request failure reported in-band.
#[derive(Clone, PartialEq, Message)]
pub struct ErrorResponse {
    /// gRPC status code.
    #[prost(int32, tag = "1")]
    pub error_code: i32,
    /// Failure detail.
    #[prost(string, tag = "2")]
    pub error_message: String,
}

impl ServerReflectionRequest {
    /// Builds a request with `query` as its body.
    #[must_use]
    pub fn new(query: ReflectionQuery) -> Self {
        Self {
            host: String::new(),
            message_request: Some(query),
        }
    }
}

// ============================================================================
// SECTION: Session
// ============================================================================

/// Fetches every file needed by the services `channel` exposes.
///
/// # Errors
///
/// Returns [`DiscoveryError`] when reflection is unsupported, the stream
/// fails, or the server answers unexpectedly.
pub async fn fetch_files(
    channel: Channel,
    headers: &Headers,
) -> Result<Vec<FileDescriptorProto>, DiscoveryError> {
    match session(channel.clone(), REFLECTION_V1_PATH, headers).await {
        Err(DiscoveryError::Unimplemented) => {
            debug!("reflection v1 unimplemented, retrying with v1alpha");
            session(channel, REFLECTION_V1ALPHA_PATH, headers).await
        }
        other => other,
    }
}

/// Runs one reflection session against `path`.
async fn session(
    channel: Channel,
    path: &'static str,
    headers: &Headers,
) -> Result<Vec<FileDescriptorProto>, DiscoveryError> {
    let mut grpc = tonic::client::Grpc::new(channel);
    grpc.ready().await.map_err(|err| DiscoveryError::Transport(err.to_string()))?;

    let (sender, receiver) = mpsc::channel(REQUEST_BUFFER);
    let send = |query: ReflectionQuery| {
        let sender = sender.clone();
        async move {
            sender
                .send(ServerReflectionRequest::new(query))
                .await
                .map_err(|_| DiscoveryError::Transport("reflection stream closed".to_string()))
        }
    };
    send(ReflectionQuery::ListServices(String::new())).await?;

    let mut request = Request::new(ReceiverStream::new(receiver));
    *request.metadata_mut() =
        headers.to_metadata().map_err(|err| DiscoveryError::Protocol(err.to_string()))?;
    let codec = ProstCodec::<ServerReflectionRequest, ServerReflectionResponse>::default();
    let response = grpc
        .streaming(request, PathAndQuery::from_static(path), codec)
        .await
        .map_err(|status| DiscoveryError::from_status(&status))?;
    let mut inbound = response.into_inner();

    let services = match next_answer(&mut inbound).await? {
        ReflectionAnswer::ListServicesResponse(list) => list.service,
        ReflectionAnswer::ErrorResponse(error) => {
            return Err(DiscoveryError::Protocol(format!(
                "list services failed: {}",
                error.error_message
            )));
        }
        ReflectionAnswer::FileDescriptorResponse(_) => {
            return Err(DiscoveryError::Protocol("can't list services".to_string()));
        }
    };
    if services.is_empty() {
        return Err(DiscoveryError::Protocol("server lists no services".to_string()));
    }
    debug!(path, services = services.len(), "reflection listed services");

    let mut seen = HashSet::new();
    let mut files = Vec::new();
    for service in services {
        send(ReflectionQuery::FileContainingSymbol(service.name.clone())).await?;
        let encoded = match next_answer(&mut inbound).await? {
            ReflectionAnswer::FileDescriptorResponse(found) => found.file_descriptor_proto,
            ReflectionAnswer::ErrorResponse(error) => {
                return Err(DiscoveryError::Protocol(format!(
                    "error listing methods on '{}': {}",
                    service.name, error.error_message
                )));
            }
            ReflectionAnswer::ListServicesResponse(_) => {
                return Err(DiscoveryError::Protocol(format!(
                    "unexpected answer for '{}'",
                    service.name
                )));
            }
        };
        for bytes in encoded {
            let file = FileDescriptorProto::decode(bytes.as_slice())
                .map_err(|err| DiscoveryError::Protocol(format!("invalid descriptor: {err}")))?;
            if seen.insert(file.name().to_string()) {
                files.push(file);
            }
        }
    }
    drop(sender);
    Ok(files)
}

/// Receives the next answer body.
async fn next_answer(
    inbound: &mut Streaming<ServerReflectionResponse>,
) -> Result<ReflectionAnswer, DiscoveryError> {
    let response = inbound
        .next()
        .await
        .ok_or_else(|| DiscoveryError::Protocol("reflection stream ended early".to_string()))?
        .map_err(|status| DiscoveryError::from_status(&status))?;
    response
        .message_response
        .ok_or_else(|| DiscoveryError::Protocol("empty reflection response".to_string()))
}
