// crates/protoctl-client/src/transport/http.rs
// ============================================================================
// Module: HTTP Transports
// Description: Connect and gRPC-Web calls over reqwest.
// Purpose: Reach servers that speak HTTP-based RPC protocols.
// Dependencies: prost, reqwest, serde, tokio, tokio-stream, tokio-util, tonic
// ============================================================================

//! ## Overview
//! Connect unary calls POST an unframed `application/proto` body and report
//! errors as a JSON body. Connect streaming and every gRPC-Web call frame
//! messages in envelopes; the final frame carries the status:
//! - Connect: an end-of-stream frame (`0x02`) with an optional JSON error.
//! - gRPC-Web: a trailer frame (`0x80`) with `grpc-status` and
//!   `grpc-message` lines, or the same keys as response headers when the
//!   server sends no body.
//!
//! Streamed responses are pumped by a task into a channel so the invoker
//! reads every protocol through one stream type.
//!
//! ## Invariants
//! - A streamed response that ends without its status frame is an error.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::error::Error;
use std::sync::Arc;

use bytes::Bytes;
use prost::Message;
use prost_reflect::DynamicMessage;
use reqwest::Body;
use reqwest::Client;
use reqwest::Response;
use reqwest::header::CONTENT_TYPE;
use reqwest::header::HeaderMap;
use reqwest::header::HeaderValue;
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tonic::Code;

use crate::envelope::EnvelopeDecoder;
use crate::envelope::encode_frame;
use crate::error::InvokeError;
use crate::error::code_from_name;
use crate::error::describe;
use crate::headers::Headers;
use crate::registry::CallRegistry;
use crate::target::CallTarget;
use crate::transport::RequestItem;
use crate::transport::ResponseStream;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Connect unary content type.
const CONNECT_UNARY_CONTENT_TYPE: &str = "application/proto";
/// Connect streaming content type.
const CONNECT_STREAM_CONTENT_TYPE: &str = "application/connect+proto";
/// gRPC-Web content type.
const GRPC_WEB_CONTENT_TYPE: &str = "application/grpc-web+proto";
/// Connect protocol version header.
const CONNECT_VERSION_HEADER: &str = "connect-protocol-version";
/// gRPC-Web marker header.
const GRPC_WEB_HEADER: &str = "x-grpc-web";
/// Status header and trailer key.
const GRPC_STATUS: &str = "grpc-status";
/// Status message header and trailer key.
const GRPC_MESSAGE: &str = "grpc-message";
/// Response frames buffered ahead of the reader.
const RESPONSE_BUFFER: usize = 16;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Error type accepted by streaming request bodies.
type BoxError = Box<dyn Error + Send + Sync>;

/// Envelope dialect of a streamed response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Framing {
    /// Connect streaming.
    Connect,
    /// gRPC-Web.
    GrpcWeb,
}

/// Connect error body.
#[derive(Debug, Default, Deserialize)]
struct ConnectErrorBody {
    /// Error code name.
    #[serde(default)]
    code: String,
    /// Error message.
    #[serde(default)]
    message: String,
}

/// Connect end-of-stream payload.
#[derive(Debug, Default, Deserialize)]
struct ConnectEndStream {
    /// Error, when the call failed.
    #[serde(default)]
    error: Option<ConnectErrorBody>,
}

// ============================================================================
// SECTION: Connect
// ============================================================================

/// Performs a Connect unary call.
///
/// # Errors
///
/// Returns [`InvokeError`] on transport failures or error responses.
pub async fn connect_unary(
    target: &CallTarget,
    headers: &Headers,
    path: &str,
    registry: &CallRegistry,
    message: &DynamicMessage,
) -> Result<DynamicMessage, InvokeError> {
    let mut request_headers = headers.to_header_map()?;
    request_headers.insert(CONTENT_TYPE, HeaderValue::from_static(CONNECT_UNARY_CONTENT_TYPE));
    request_headers.insert(CONNECT_VERSION_HEADER, HeaderValue::from_static("1"));
    let response = client(false, target)?
        .post(target.method_url(path))
        .headers(request_headers)
        .body(message.encode_to_vec())
        .send()
        .await
        .map_err(|err| send_error(target, &err))?;
    let status = response.status();
    let body = response.bytes().await.map_err(|err| InvokeError::Transport(describe(&err)))?;
    if !status.is_success() {
        return Err(connect_error(status.as_u16(), &body));
    }
    registry.decode_response(&body)
}

/// Opens a Connect streaming call fed by `messages`.
///
/// # Errors
///
/// Returns [`InvokeError`] on transport failures or error responses.
pub async fn connect_stream(
    target: &CallTarget,
    headers: &Headers,
    path: &str,
    registry: Arc<CallRegistry>,
    messages: mpsc::Receiver<RequestItem>,
    cancel: CancellationToken,
) -> Result<ResponseStream, InvokeError> {
    let mut request_headers = headers.to_header_map()?;
    request_headers.insert(CONTENT_TYPE, HeaderValue::from_static(CONNECT_STREAM_CONTENT_TYPE));
    request_headers.insert(CONNECT_VERSION_HEADER, HeaderValue::from_static("1"));
    let response = client(target.plaintext(), target)?
        .post(target.method_url(path))
        .headers(request_headers)
        .body(framed_body(messages))
        .send()
        .await
        .map_err(|err| send_error(target, &err))?;
    let status = response.status();
    if !status.is_success() {
        let body = response.bytes().await.map_err(|err| InvokeError::Transport(describe(&err)))?;
        return Err(connect_error(status.as_u16(), &body));
    }
    Ok(spawn_pump(response, Framing::Connect, false, registry, cancel))
}

/// Maps a failed Connect response to a status error.
fn connect_error(http_status: u16, body: &[u8]) -> InvokeError {
    match serde_json::from_slice::<ConnectErrorBody>(body) {
        Ok(error) if !error.code.is_empty() => {
            InvokeError::status(code_from_name(&error.code), error.message)
        }
        _ => InvokeError::status(
            code_from_http(http_status),
            format!("HTTP status {http_status}"),
        ),
    }
}

/// Interprets a Connect end-of-stream frame.
fn connect_end_stream(data: &[u8]) -> Result<(), InvokeError> {
    let end: ConnectEndStream = if data.is_empty() {
        ConnectEndStream::default()
    } else {
        serde_json::from_slice(data)
            .map_err(|err| InvokeError::Protocol(format!("invalid end-of-stream frame: {err}")))?
    };
    match end.error {
        Some(error) => Err(InvokeError::status(code_from_name(&error.code), error.message)),
        None => Ok(()),
    }
}

/// Maps an HTTP status without a usable error body to a status code.
const fn code_from_http(status: u16) -> Code {
    match status {
        400 => Code::Internal,
        401 => Code::Unauthenticated,
        403 => Code::PermissionDenied,
        404 => Code::Unimplemented,
        429 | 502 | 503 | 504 => Code::Unavailable,
        _ => Code::Unknown,
    }
}

// ============================================================================
// SECTION: gRPC-Web
// ============================================================================

/// Performs a gRPC-Web unary call.
///
/// # Errors
///
/// Returns [`InvokeError`] on transport failures, non-OK status, or a
/// response without exactly one message.
pub async fn grpc_web_unary(
    target: &CallTarget,
    headers: &Headers,
    path: &str,
    registry: Arc<CallRegistry>,
    message: &DynamicMessage,
    cancel: CancellationToken,
) -> Result<DynamicMessage, InvokeError> {
    let frame = encode_frame(0, &message.encode_to_vec())
        .map_err(|err| InvokeError::Payload(err.to_string()))?;
    let (response, trailers_only) =
        grpc_web_send(target, headers, path, Body::from(frame)).await?;
    let mut responses = spawn_pump(response, Framing::GrpcWeb, trailers_only, registry, cancel);
    let mut single = None;
    while let Some(item) = responses.next().await {
        let message = item?;
        if single.replace(message).is_some() {
            return Err(InvokeError::Protocol("unary call returned several messages".to_string()));
        }
    }
    single.ok_or_else(|| InvokeError::Protocol("unary call returned no message".to_string()))
}

/// Opens a gRPC-Web streaming call fed by `messages`.
///
/// # Errors
///
/// Returns [`InvokeError`] on transport failures or a trailers-only error.
pub async fn grpc_web_stream(
    target: &CallTarget,
    headers: &Headers,
    path: &str,
    registry: Arc<CallRegistry>,
    messages: mpsc::Receiver<RequestItem>,
    cancel: CancellationToken,
) -> Result<ResponseStream, InvokeError> {
    let (response, trailers_only) =
        grpc_web_send(target, headers, path, framed_body(messages)).await?;
    Ok(spawn_pump(response, Framing::GrpcWeb, trailers_only, registry, cancel))
}

/// Sends a gRPC-Web request and checks headers-only status.
///
/// Returns the response and whether its headers already carried an OK status.
async fn grpc_web_send(
    target: &CallTarget,
    headers: &Headers,
    path: &str,
    body: Body,
) -> Result<(Response, bool), InvokeError> {
    let mut request_headers = headers.to_header_map()?;
    request_headers.insert(CONTENT_TYPE, HeaderValue::from_static(GRPC_WEB_CONTENT_TYPE));
    request_headers.insert(GRPC_WEB_HEADER, HeaderValue::from_static("1"));
    let response = client(false, target)?
        .post(target.method_url(path))
        .headers(request_headers)
        .body(body)
        .send()
        .await
        .map_err(|err| send_error(target, &err))?;
    let status = response.status();
    let trailers_only = match header_status(response.headers()) {
        Some(Err(error)) => return Err(error),
        Some(Ok(())) => true,
        None => false,
    };
    if !status.is_success() {
        return Err(InvokeError::status(
            code_from_http(status.as_u16()),
            format!("HTTP status {}", status.as_u16()),
        ));
    }
    Ok((response, trailers_only))
}

/// Returns the status carried by `grpc-status` response headers, if any.
fn header_status(headers: &HeaderMap) -> Option<Result<(), InvokeError>> {
    let pairs: Vec<(String, String)> = [GRPC_STATUS, GRPC_MESSAGE]
        .iter()
        .filter_map(|key| {
            headers
                .get(*key)
                .and_then(|value| value.to_str().ok())
                .map(|value| ((*key).to_string(), value.to_string()))
        })
        .collect();
    if pairs.iter().all(|(key, _)| key != GRPC_STATUS) {
        return None;
    }
    Some(trailer_status(&pairs))
}

/// Parses a trailer frame into lower-cased `(key, value)` pairs.
#[must_use]
pub fn parse_trailers(data: &[u8]) -> Vec<(String, String)> {
    String::from_utf8_lossy(data)
        .lines()
        .filter_map(|line| line.split_once(':'))
        .map(|(key, value)| (key.trim().to_ascii_lowercase(), value.trim().to_string()))
        .collect()
}

/// Converts trailers to the call result.
///
/// # Errors
///
/// Returns [`InvokeError::Status`] for a non-zero status and
/// [`InvokeError::Protocol`] when the status is missing or malformed.
pub fn trailer_status(trailers: &[(String, String)]) -> Result<(), InvokeError> {
    let lookup = |name: &str| {
        trailers.iter().find(|(key, _)| key == name).map(|(_, value)| value.as_str())
    };
    let raw = lookup(GRPC_STATUS)
        .ok_or_else(|| InvokeError::Protocol("trailers carry no grpc-status".to_string()))?;
    let number = raw
        .parse::<i32>()
        .map_err(|_| InvokeError::Protocol(format!("invalid grpc-status '{raw}'")))?;
    let code = Code::from_i32(number);
    if code == Code::Ok {
        return Ok(());
    }
    Err(InvokeError::status(code, percent_decode(lookup(GRPC_MESSAGE).unwrap_or_default())))
}

/// Decodes `%XX` escapes used by `grpc-message`.
fn percent_decode(value: &str) -> String {
    let bytes = value.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut index = 0;
    while index < bytes.len() {
        let escaped = (bytes[index] == b'%')
            .then(|| value.get(index + 1..index + 3))
            .flatten()
            .and_then(|hex| u8::from_str_radix(hex, 16).ok());
        if let Some(byte) = escaped {
            out.push(byte);
            index += 3;
        } else {
            out.push(bytes[index]);
            index += 1;
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

// ============================================================================
// SECTION: Shared Plumbing
// ============================================================================

/// Builds the HTTP client. Prior knowledge selects cleartext HTTP/2.
fn client(http2_prior_knowledge: bool, target: &CallTarget) -> Result<Client, InvokeError> {
    let mut builder = Client::builder();
    if http2_prior_knowledge {
        builder = builder.http2_prior_knowledge();
    }
    builder.build().map_err(|err| InvokeError::Connect {
        address: target.address().to_string(),
        reason: describe(&err),
    })
}

/// Maps a send failure, separating connection errors.
fn send_error(target: &CallTarget, err: &reqwest::Error) -> InvokeError {
    if err.is_connect() {
        InvokeError::Connect {
            address: target.address().to_string(),
            reason: describe(err),
        }
    } else {
        InvokeError::Transport(describe(err))
    }
}

/// Streams `messages` as enveloped frames; an `Err` item aborts the body.
fn framed_body(messages: mpsc::Receiver<RequestItem>) -> Body {
    let frames = ReceiverStream::new(messages).map(|item| -> Result<Bytes, BoxError> {
        let message = item?;
        Ok(encode_frame(0, &message.encode_to_vec())?)
    });
    Body::wrap_stream(frames)
}

/// Spawns a task decoding `response` frames into a message stream.
///
/// With `status_seen` the body may end without a status frame.
fn spawn_pump(
    response: Response,
    framing: Framing,
    status_seen: bool,
    registry: Arc<CallRegistry>,
    cancel: CancellationToken,
) -> ResponseStream {
    let (sender, receiver) = mpsc::channel(RESPONSE_BUFFER);
    tokio::spawn(async move {
        let outcome = tokio::select! {
            () = cancel.cancelled() => Err(InvokeError::Cancelled),
            outcome = pump(response, framing, status_seen, &registry, &sender) => outcome,
        };
        if let Err(err) = outcome {
            let _ = sender.send(Err(err)).await;
        }
    });
    Box::pin(ReceiverStream::new(receiver))
}

/// Forwards decoded messages until the status frame.
async fn pump(
    response: Response,
    framing: Framing,
    status_seen: bool,
    registry: &CallRegistry,
    sender: &mpsc::Sender<Result<DynamicMessage, InvokeError>>,
) -> Result<(), InvokeError> {
    let mut body = response.bytes_stream();
    let mut decoder = EnvelopeDecoder::new();
    loop {
        while let Some(frame) =
            decoder.next_frame().map_err(|err| InvokeError::Protocol(err.to_string()))?
        {
            match framing {
                Framing::Connect if frame.is_end_stream() => {
                    return connect_end_stream(&frame.data);
                }
                Framing::GrpcWeb if frame.is_trailer() => {
                    return trailer_status(&parse_trailers(&frame.data));
                }
                _ => {
                    let message = registry.decode_response(&frame.data)?;
                    if sender.send(Ok(message)).await.is_err() {
                        return Ok(());
                    }
                }
            }
        }
        match body.next().await {
            Some(chunk) => {
                let chunk = chunk.map_err(|err| InvokeError::Transport(describe(&err)))?;
                decoder.push(&chunk);
            }
            None => break,
        }
    }
    decoder.finish().map_err(|err| InvokeError::Protocol(err.to_string()))?;
    if status_seen {
        return Ok(());
    }
    Err(InvokeError::Protocol(match framing {
        Framing::Connect => "stream ended without an end-of-stream frame".to_string(),
        Framing::GrpcWeb => "stream ended without trailers".to_string(),
    }))
}
