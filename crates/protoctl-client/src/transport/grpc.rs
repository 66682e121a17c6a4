// crates/protoctl-client/src/transport/grpc.rs
// ============================================================================
// Module: gRPC Transport
// Description: Unary and streaming calls over a tonic channel.
// Purpose: Invoke dynamic messages with tonic's generic client.
// Dependencies: prost-reflect, tokio, tokio-stream, tonic
// ============================================================================

//! ## Overview
//! Channels use TLS with the bundled web PKI roots unless the target is
//! plaintext. Every streaming mode goes through `Grpc::streaming`; the
//! invoker decides how many messages are sent and expected. A failed
//! request item resets the HTTP/2 stream, so the server never sees a
//! truncated stream end cleanly.

use prost_reflect::DynamicMessage;
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;
use tonic::Request;
use tonic::Status;
use tonic::codegen::http::uri::PathAndQuery;
use tonic::transport::Channel;
use tonic::transport::ClientTlsConfig;
use tonic::transport::Endpoint;

use crate::codec::DynamicCodec;
use crate::error::InvokeError;
use crate::error::describe;
use crate::headers::Headers;
use crate::registry::CallRegistry;
use crate::target::CallTarget;
use crate::transport::RequestItem;
use crate::transport::ResponseStream;

/// Opens a channel to `target`.
///
/// # Errors
///
/// Returns the connection failure detail.
pub async fn connect_channel(target: &CallTarget) -> Result<Channel, String> {
    let mut endpoint =
        Endpoint::from_shared(target.base_url()).map_err(|err| describe(&err))?;
    if !target.plaintext() {
        endpoint = endpoint
            .tls_config(ClientTlsConfig::new().with_webpki_roots())
            .map_err(|err| describe(&err))?;
    }
    endpoint.connect().await.map_err(|err| describe(&err))
}

/// Connects for an invocation.
async fn channel_for(target: &CallTarget) -> Result<Channel, InvokeError> {
    connect_channel(target).await.map_err(|reason| InvokeError::Connect {
        address: target.address().to_string(),
        reason,
    })
}

/// Parses an RPC path.
fn method_path(path: &str) -> Result<PathAndQuery, InvokeError> {
    PathAndQuery::try_from(path)
        .map_err(|err| InvokeError::Protocol(format!("invalid method path {path}: {err}")))
}

/// Performs a unary call.
///
/// # Errors
///
/// Returns [`InvokeError`] on connection, header, or status failures.
pub async fn unary(
    target: &CallTarget,
    headers: &Headers,
    path: &str,
    registry: &CallRegistry,
    message: DynamicMessage,
) -> Result<DynamicMessage, InvokeError> {
    let mut grpc = tonic::client::Grpc::new(channel_for(target).await?);
    grpc.ready().await.map_err(|err| InvokeError::Transport(describe(&err)))?;
    let mut request = Request::new(Ok(message));
    *request.metadata_mut() = headers.to_metadata()?;
    let response = grpc
        .unary(request, method_path(path)?, DynamicCodec::new(registry.output().clone()))
        .await
        .map_err(|status| InvokeError::from_status(&status))?;
    Ok(response.into_inner())
}

/// Opens a streaming call fed by `messages`.
///
/// # Errors
///
/// Returns [`InvokeError`] on connection, header, or status failures.
pub async fn stream(
    target: &CallTarget,
    headers: &Headers,
    path: &str,
    registry: &CallRegistry,
    messages: mpsc::Receiver<RequestItem>,
) -> Result<ResponseStream, InvokeError> {
    let mut grpc = tonic::client::Grpc::new(channel_for(target).await?);
    grpc.ready().await.map_err(|err| InvokeError::Transport(describe(&err)))?;
    let outgoing = ReceiverStream::new(messages)
        .map(|item| item.map_err(|err| Status::cancelled(err.to_string())));
    let mut request = Request::new(outgoing);
    *request.metadata_mut() = headers.to_metadata()?;
    let response = grpc
        .streaming(request, method_path(path)?, DynamicCodec::new(registry.output().clone()))
        .await
        .map_err(|status| InvokeError::from_status(&status))?;
    let inbound = response
        .into_inner()
        .map(|item| item.map_err(|status| InvokeError::from_status(&status)));
    Ok(Box::pin(inbound))
}
