// crates/protoctl-client/src/invoke.rs
// ============================================================================
// Module: Invoker
// Description: Unary and streaming invocation of discovered operations.
// Purpose: Turn JSON payloads into calls and responses back into JSON.
// Dependencies: prost-reflect, tokio, tokio-util, tracing
// ============================================================================

//! ## Overview
//! The [`Invoker`] binds a target, outgoing headers, and a cancellation
//! token. Each call builds a [`CallRegistry`] for the operation, translates
//! JSON payloads against it, and dispatches on the target's protocol.
//!
//! Streaming calls run a send loop and a receive loop concurrently:
//! - client streaming: every input is sent, then exactly one response is
//!   emitted;
//! - server streaming: exactly one input is sent, then every response is
//!   emitted;
//! - bidirectional: inputs and responses flow independently.
//!
//! ## Invariants
//! - The receive loop owns the output channel and closes it on return.
//! - Every await point races the cancellation token.
//! - A payload that fails to decode aborts the call and resets the request
//!   stream rather than half-closing it.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::future::Future;
use std::pin::pin;
use std::sync::Arc;

use protoctl_schema::OperationDefinition;
use protoctl_schema::StreamingMode;
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::InvokeError;
use crate::headers::Headers;
use crate::registry::CallRegistry;
use crate::target::CallTarget;
use crate::target::Protocol;
use crate::transport::RequestItem;
use crate::transport::ResponseStream;
use crate::transport::grpc;
use crate::transport::http;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Capacity of every streaming channel.
pub const STREAM_BUFFER: usize = 16;

// ============================================================================
// SECTION: Invoker
// ============================================================================

/// Performs calls against one target.
#[derive(Debug, Clone)]
pub struct Invoker {
    /// Call destination.
    target: CallTarget,
    /// Outgoing headers.
    headers: Headers,
    /// Aborts in-flight calls.
    cancel: CancellationToken,
}

impl Invoker {
    /// Creates an invoker.
    #[must_use]
    pub const fn new(target: CallTarget, headers: Headers, cancel: CancellationToken) -> Self {
        Self {
            target,
            headers,
            cancel,
        }
    }

    /// Returns the call destination.
    #[must_use]
    pub const fn target(&self) -> &CallTarget {
        &self.target
    }

    /// Performs a unary call and returns the response as indented JSON.
    ///
    /// # Errors
    ///
    /// Returns [`InvokeError`] when the payload is invalid, the call fails,
    /// or the token is cancelled.
    pub async fn unary(
        &self,
        operation: &OperationDefinition,
        payload: &str,
    ) -> Result<String, InvokeError> {
        let registry = Arc::new(CallRegistry::for_operation(operation)?);
        let request = registry.decode_request(payload)?;
        debug!(
            path = operation.path(),
            protocol = %self.target.protocol(),
            headers = %self.headers.names().join(","),
            "unary call"
        );
        let path = operation.path();
        let response = self
            .guard(async {
                match self.target.protocol() {
                    Protocol::Grpc => {
                        grpc::unary(&self.target, &self.headers, path, &registry, request).await
                    }
                    Protocol::Connect => {
                        http::connect_unary(&self.target, &self.headers, path, &registry, &request)
                            .await
                    }
                    Protocol::GrpcWeb => {
                        http::grpc_web_unary(
                            &self.target,
                            &self.headers,
                            path,
                            Arc::clone(&registry),
                            &request,
                            self.cancel.child_token(),
                        )
                        .await
                    }
                }
            })
            .await?;
        registry.render_response(&response)
    }

    /// Performs a streaming call.
    ///
    /// JSON payloads are read from `input` and each response is sent to
    /// `output` as indented JSON. `output` is dropped when the call ends.
    /// Closing `input` half-closes the request stream; an `Err` item or an
    /// undecodable payload aborts it instead, so the server never sees a
    /// truncated stream complete.
    ///
    /// # Errors
    ///
    /// Returns [`InvokeError`] when a payload is invalid or aborted, the
    /// call fails, or the token is cancelled. Responses already sent stay
    /// sent.
    pub async fn stream(
        &self,
        operation: &OperationDefinition,
        input: mpsc::Receiver<Result<String, InvokeError>>,
        output: mpsc::Sender<String>,
    ) -> Result<(), InvokeError> {
        let registry = Arc::new(CallRegistry::for_operation(operation)?);
        let mode = operation.mode();
        debug!(
            path = operation.path(),
            mode = %mode,
            protocol = %self.target.protocol(),
            headers = %self.headers.names().join(","),
            "streaming call"
        );
        let (messages, outgoing) = mpsc::channel(STREAM_BUFFER);
        let send = send_loop(mode, Arc::clone(&registry), input, messages);
        let receive = async {
            let responses = self.open_stream(operation, Arc::clone(&registry), outgoing).await?;
            receive_loop(mode, &registry, responses, output).await
        };
        self.guard(async move {
            let mut send = pin!(send);
            let mut receive = pin!(receive);
            tokio::select! {
                result = &mut receive => result,
                result = &mut send => {
                    result?;
                    receive.await
                }
            }
        })
        .await
    }

    /// Opens the protocol-specific response stream.
    async fn open_stream(
        &self,
        operation: &OperationDefinition,
        registry: Arc<CallRegistry>,
        messages: mpsc::Receiver<RequestItem>,
    ) -> Result<ResponseStream, InvokeError> {
        let path = operation.path();
        match self.target.protocol() {
            Protocol::Grpc => {
                grpc::stream(&self.target, &self.headers, path, &registry, messages).await
            }
            Protocol::Connect => {
                http::connect_stream(
                    &self.target,
                    &self.headers,
                    path,
                    registry,
                    messages,
                    self.cancel.child_token(),
                )
                .await
            }
            Protocol::GrpcWeb => {
                http::grpc_web_stream(
                    &self.target,
                    &self.headers,
                    path,
                    registry,
                    messages,
                    self.cancel.child_token(),
                )
                .await
            }
        }
    }

    /// Races `future` against cancellation.
    async fn guard<T>(
        &self,
        future: impl Future<Output = Result<T, InvokeError>>,
    ) -> Result<T, InvokeError> {
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(InvokeError::Cancelled),
            result = future => result,
        }
    }
}

// ============================================================================
// SECTION: Loops
// ============================================================================

/// Decodes input payloads and forwards them as request messages.
///
/// Server-streaming calls send exactly one message. Dropping `messages`
/// half-closes the request stream; a failed payload is forwarded as an
/// abort first.
async fn send_loop(
    mode: StreamingMode,
    registry: Arc<CallRegistry>,
    mut input: mpsc::Receiver<Result<String, InvokeError>>,
    messages: mpsc::Sender<RequestItem>,
) -> Result<(), InvokeError> {
    let mut sent = 0_usize;
    while let Some(item) = input.recv().await {
        let message = match item.and_then(|payload| registry.decode_request(&payload)) {
            Ok(message) => message,
            Err(err) => {
                debug!(sent, error = %err, "aborting request stream");
                let _ = messages.send(Err(InvokeError::Cancelled)).await;
                return Err(err);
            }
        };
        if messages.send(Ok(message)).await.is_err() {
            break;
        }
        sent += 1;
        if !mode.client_streams() {
            break;
        }
    }
    if sent == 0 && !mode.client_streams() {
        return Err(InvokeError::Payload("server-streaming call needs one request".to_string()));
    }
    debug!(sent, "request stream closed");
    Ok(())
}

/// Emits responses until the stream ends.
///
/// Client-streaming calls must produce exactly one response.
async fn receive_loop(
    mode: StreamingMode,
    registry: &CallRegistry,
    mut responses: ResponseStream,
    output: mpsc::Sender<String>,
) -> Result<(), InvokeError> {
    let mut received = 0_usize;
    while let Some(item) = responses.next().await {
        let message = item?;
        received += 1;
        if !mode.server_streams() && received > 1 {
            return Err(InvokeError::Protocol(
                "client-streaming call returned several responses".to_string(),
            ));
        }
        let rendered = registry.render_response(&message)?;
        if output.send(rendered).await.is_err() {
            return Ok(());
        }
    }
    if !mode.server_streams() && received == 0 {
        return Err(InvokeError::Protocol("client-streaming call returned no response".to_string()));
    }
    debug!(received, "response stream ended");
    Ok(())
}
