// crates/protoctl-client/src/error.rs
// ============================================================================
// Module: Client Errors
// Description: Discovery, header, and invocation error taxonomies.
// Purpose: Separate retryable transport failures from fatal protocol errors.
// Dependencies: protoctl-schema, thiserror, tonic
// ============================================================================

//! ## Overview
//! Discovery failures split into transport-level problems the user may retry
//! (connect, transport, timeout) and fatal protocol or schema problems.
//! Invocation failures carry the remote status code by its canonical
//! lower-case name so every protocol reports errors the same way.

use std::time::Duration;

use protoctl_schema::SchemaError;
use thiserror::Error;
use tonic::Code;
use tonic::Status;

// ============================================================================
// SECTION: Discovery
// ============================================================================

/// Schema discovery errors.
///
/// # Invariants
/// - Variants are stable for CLI error mapping and tests.
/// - No variant carries a partial schema.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// The target could not be reached.
    #[error("failed to connect to {address}: {reason}")]
    Connect {
        /// Target address.
        address: String,
        /// Connection failure detail.
        reason: String,
    },
    /// The reflection stream failed mid-session.
    #[error("reflection transport error: {0}")]
    Transport(String),
    /// The discovery deadline elapsed.
    #[error("reflection timed out after {millis}ms")]
    Timeout {
        /// Deadline in milliseconds.
        millis: u64,
    },
    /// The server implements neither reflection version.
    #[error("server does not support the reflection API")]
    Unimplemented,
    /// The server answered with an unexpected or error response.
    #[error("reflection protocol error: {0}")]
    Protocol(String),
    /// The returned descriptors do not form a valid schema.
    #[error(transparent)]
    Schema(#[from] SchemaError),
}

impl DiscoveryError {
    /// Returns true for failures a user may retry unchanged.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Connect { .. } | Self::Transport(_) | Self::Timeout { .. })
    }

    /// Builds a timeout error for `deadline`.
    #[must_use]
    pub fn timeout(deadline: Duration) -> Self {
        Self::Timeout {
            millis: u64::try_from(deadline.as_millis()).unwrap_or(u64::MAX),
        }
    }

    /// Maps a reflection stream status.
    #[must_use]
    pub fn from_status(status: &Status) -> Self {
        match status.code() {
            Code::Unimplemented => Self::Unimplemented,
            Code::Unavailable | Code::DeadlineExceeded | Code::Cancelled | Code::Unknown => {
                Self::Transport(status_text(status))
            }
            _ => Self::Protocol(status_text(status)),
        }
    }
}

// ============================================================================
// SECTION: Headers
// ============================================================================

/// Outgoing header errors.
///
/// # Invariants
/// - Variants are stable for CLI error mapping and tests.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum HeaderError {
    /// The flag value is not of the form `key: value`.
    #[error("invalid header '{0}': expected 'key: value'")]
    Malformed(String),
    /// The key is not a valid header name.
    #[error("invalid header name '{0}'")]
    InvalidName(String),
    /// The value is not a valid header value.
    #[error("invalid value for header '{0}'")]
    InvalidValue(String),
}

// ============================================================================
// SECTION: Invocation
// ============================================================================

/// RPC invocation errors.
///
/// # Invariants
/// - Variants are stable for CLI error mapping and tests.
/// - Stream items emitted before an error are never retracted.
#[derive(Debug, Error)]
pub enum InvokeError {
    /// The target could not be reached.
    #[error("failed to connect to {address}: {reason}")]
    Connect {
        /// Target address.
        address: String,
        /// Connection failure detail.
        reason: String,
    },
    /// The call failed below the RPC layer.
    #[error("transport error: {0}")]
    Transport(String),
    /// The server answered with a non-OK status.
    #[error("rpc error: code = {code} desc = {message}")]
    Status {
        /// Canonical lower-case status code name.
        code: String,
        /// Status message.
        message: String,
    },
    /// A payload could not be translated to or from the wire.
    #[error("invalid payload: {0}")]
    Payload(String),
    /// The response violates the wire protocol.
    #[error("protocol error: {0}")]
    Protocol(String),
    /// Outgoing headers are invalid.
    #[error(transparent)]
    Header(#[from] HeaderError),
    /// The call was cancelled.
    #[error("call cancelled")]
    Cancelled,
}

impl InvokeError {
    /// Builds a status error from a gRPC status code and message.
    #[must_use]
    pub fn status(code: Code, message: impl Into<String>) -> Self {
        Self::Status {
            code: code_name(code).to_string(),
            message: message.into(),
        }
    }

    /// Maps a tonic status.
    #[must_use]
    pub fn from_status(status: &Status) -> Self {
        Self::status(status.code(), status.message())
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Returns the canonical lower-case name of a status code.
#[must_use]
pub const fn code_name(code: Code) -> &'static str {
    match code {
        Code::Ok => "ok",
        Code::Cancelled => "canceled",
        Code::Unknown => "unknown",
        Code::InvalidArgument => "invalid_argument",
        Code::DeadlineExceeded => "deadline_exceeded",
        Code::NotFound => "not_found",
        Code::AlreadyExists => "already_exists",
        Code::PermissionDenied => "permission_denied",
        Code::ResourceExhausted => "resource_exhausted",
        Code::FailedPrecondition => "failed_precondition",
        Code::Aborted => "aborted",
        Code::OutOfRange => "out_of_range",
        Code::Unimplemented => "unimplemented",
        Code::Internal => "internal",
        Code::Unavailable => "unavailable",
        Code::DataLoss => "data_loss",
        Code::Unauthenticated => "unauthenticated",
    }
}

/// Returns the status code for a Connect error code name.
#[must_use]
pub fn code_from_name(name: &str) -> Code {
    match name {
        "ok" => Code::Ok,
        "canceled" | "cancelled" => Code::Cancelled,
        "invalid_argument" => Code::InvalidArgument,
        "deadline_exceeded" => Code::DeadlineExceeded,
        "not_found" => Code::NotFound,
        "already_exists" => Code::AlreadyExists,
        "permission_denied" => Code::PermissionDenied,
        "resource_exhausted" => Code::ResourceExhausted,
        "failed_precondition" => Code::FailedPrecondition,
        "aborted" => Code::Aborted,
        "out_of_range" => Code::OutOfRange,
        "unimplemented" => Code::Unimplemented,
        "internal" => Code::Internal,
        "unavailable" => Code::Unavailable,
        "data_loss" => Code::DataLoss,
        "unauthenticated" => Code::Unauthenticated,
        _ => Code::Unknown,
    }
}

/// Renders a status as `code: message`.
fn status_text(status: &Status) -> String {
    format!("{}: {}", code_name(status.code()), status.message())
}

/// Renders an error with its source chain.
pub(crate) fn describe(err: &dyn std::error::Error) -> String {
    let mut text = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let detail = cause.to_string();
        if !text.contains(&detail) {
            text.push_str(": ");
            text.push_str(&detail);
        }
        source = cause.source();
    }
    text
}
