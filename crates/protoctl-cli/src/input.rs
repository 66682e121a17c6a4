// crates/protoctl-cli/src/input.rs
// ============================================================================
// Module: CLI Input
// Description: Descriptor set files and request payload sources.
// Purpose: Read bounded inputs and feed streaming calls.
// Dependencies: protoctl-client, protoctl-schema, serde_json, tokio
// ============================================================================

//! ## Overview
//! Descriptor sets are read with a hard size limit. Request payloads come
//! from `--json-data` values, the bound flags, or stdin; a `-` value reads
//! stdin, whole for unary calls and as newline-delimited JSON for streams.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::File;
use std::io::Read;
use std::path::Path;

use protoctl_client::InvokeError;
use protoctl_schema::BindError;
use protoctl_schema::DynamicValue;
use protoctl_schema::StreamingMode;
use serde_json::Value;
use tokio::io::AsyncBufRead;
use tokio::io::AsyncBufReadExt;
use tokio::io::AsyncRead;
use tokio::io::AsyncReadExt;
use tokio::sync::mpsc;

use crate::error::CliError;
use crate::error::CliResult;
use crate::t;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Largest descriptor set file accepted.
pub const MAX_DESCRIPTOR_SET_BYTES: usize = 64 * 1024 * 1024;
/// `--json-data` value that reads stdin.
pub const STDIN_MARKER: &str = "-";

// ============================================================================
// SECTION: Descriptor Sets
// ============================================================================

/// Errors from size-limited reads.
#[derive(Debug)]
enum ReadLimitError {
    /// The file could not be read.
    Io(std::io::Error),
    /// The file exceeds the limit.
    TooLarge {
        /// Observed size.
        size: u64,
        /// Configured limit.
        limit: usize,
    },
}

/// Reads an encoded `FileDescriptorSet` from `path`.
///
/// # Errors
///
/// Returns [`CliError::Input`] when the file is unreadable or too large.
pub fn load_descriptor_set(path: &Path) -> CliResult<Vec<u8>> {
    let kind = t!("input.kind.descriptor_set");
    read_bytes_with_limit(path, MAX_DESCRIPTOR_SET_BYTES).map_err(|err| match err {
        ReadLimitError::Io(err) => CliError::Input(t!(
            "input.read_failed",
            kind = kind,
            path = path.display(),
            error = err
        )),
        ReadLimitError::TooLarge {
            size,
            limit,
        } => CliError::Input(t!(
            "input.read_too_large",
            kind = kind,
            path = path.display(),
            size = size,
            limit = limit
        )),
    })
}

/// Reads at most `max_bytes` from `path`.
fn read_bytes_with_limit(path: &Path, max_bytes: usize) -> Result<Vec<u8>, ReadLimitError> {
    let file = File::open(path).map_err(ReadLimitError::Io)?;
    let size = file.metadata().map_err(ReadLimitError::Io)?.len();
    let limit = u64::try_from(max_bytes).map_err(|_| ReadLimitError::TooLarge {
        size,
        limit: max_bytes,
    })?;
    if size > limit {
        return Err(ReadLimitError::TooLarge {
            size,
            limit: max_bytes,
        });
    }
    let mut bytes = Vec::new();
    file.take(limit.saturating_add(1)).read_to_end(&mut bytes).map_err(ReadLimitError::Io)?;
    if bytes.len() > max_bytes {
        return Err(ReadLimitError::TooLarge {
            size: u64::try_from(bytes.len()).unwrap_or(u64::MAX),
            limit: max_bytes,
        });
    }
    Ok(bytes)
}

// ============================================================================
// SECTION: Unary Payloads
// ============================================================================

/// Produces the request body of a unary call.
///
/// An explicit `--json-data` wins; `-` reads all of `stdin`. Otherwise the
/// body is synthesized from the touched flags.
///
/// # Errors
///
/// Returns [`CliError::Input`] when stdin fails or the body is not JSON.
pub async fn unary_payload<R: AsyncRead + Unpin>(
    value: &DynamicValue,
    json_data: Option<&str>,
    stdin: R,
) -> CliResult<String> {
    let explicit = match json_data {
        Some(STDIN_MARKER) => Some(read_all(stdin).await?),
        Some(text) => Some(text.to_string()),
        None => None,
    };
    value
        .payload(explicit.as_deref())
        .map_err(|err| CliError::Input(t!("input.payload_invalid", error = err)))
}

/// Reads `reader` to the end as UTF-8.
async fn read_all<R: AsyncRead + Unpin>(mut reader: R) -> CliResult<String> {
    let mut text = String::new();
    reader
        .read_to_string(&mut text)
        .await
        .map_err(|err| CliError::Input(t!("input.stdin_failed", error = err)))?;
    Ok(text)
}

// ============================================================================
// SECTION: Streaming Payloads
// ============================================================================

/// One origin of streamed request bodies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayloadSource {
    /// A body given on the command line.
    Literal(String),
    /// Newline-delimited JSON read from stdin.
    Stdin,
}

/// Plans the request bodies of a streaming call.
///
/// `--json-data` values are used in order, with `-` standing for stdin.
/// Without them, touched flags form a single body; with nothing touched
/// client-streaming calls read stdin and server-streaming calls send one
/// body synthesized from the flags.
///
/// # Errors
///
/// Returns [`CliError::Input`] when a literal body is not JSON.
pub fn stream_sources(
    mode: StreamingMode,
    value: &DynamicValue,
    json_data: &[String],
) -> CliResult<Vec<PayloadSource>> {
    let invalid = |err: BindError| CliError::Input(t!("input.payload_invalid", error = err));
    if json_data.is_empty() {
        if mode.client_streams() && value.is_untouched() {
            return Ok(vec![PayloadSource::Stdin]);
        }
        return Ok(vec![PayloadSource::Literal(value.payload(None).map_err(invalid)?)]);
    }
    json_data
        .iter()
        .map(|data| {
            if data == STDIN_MARKER {
                Ok(PayloadSource::Stdin)
            } else {
                value.payload(Some(data)).map(PayloadSource::Literal).map_err(invalid)
            }
        })
        .collect()
}

/// Sends every planned body to `sender`.
///
/// Blank stdin lines are skipped. Dropping `sender` on return closes the
/// request stream. A failure is forwarded as an `Err` item first, so the
/// call aborts instead of completing with the bodies sent so far. Feeding
/// stops early once the receiver is gone, even while waiting on stdin.
///
/// # Errors
///
/// Returns [`CliError::Input`] when stdin fails or a line is not JSON.
pub async fn feed<R: AsyncBufRead + Unpin>(
    sources: Vec<PayloadSource>,
    mut stdin: R,
    sender: mpsc::Sender<Result<String, InvokeError>>,
) -> CliResult<()> {
    let fed = feed_sources(sources, &mut stdin, &sender).await;
    if let Err(err) = &fed {
        let _ = sender.send(Err(InvokeError::Payload(err.to_string()))).await;
    }
    fed
}

/// Forwards each source in order until one fails or the receiver is gone.
async fn feed_sources<R: AsyncBufRead + Unpin>(
    sources: Vec<PayloadSource>,
    stdin: &mut R,
    sender: &mpsc::Sender<Result<String, InvokeError>>,
) -> CliResult<()> {
    for source in sources {
        let delivered = match source {
            PayloadSource::Literal(body) => sender.send(Ok(body)).await.is_ok(),
            PayloadSource::Stdin => feed_lines(stdin, sender).await?,
        };
        if !delivered {
            break;
        }
    }
    Ok(())
}

/// Forwards newline-delimited JSON; returns false once the receiver is gone.
async fn feed_lines<R: AsyncBufRead + Unpin>(
    reader: &mut R,
    sender: &mpsc::Sender<Result<String, InvokeError>>,
) -> CliResult<bool> {
    let mut lines = reader.lines();
    let mut number = 0_usize;
    loop {
        let next = tokio::select! {
            () = sender.closed() => return Ok(false),
            next = lines.next_line() => next,
        };
        let Some(line) =
            next.map_err(|err| CliError::Input(t!("input.stdin_failed", error = err)))?
        else {
            return Ok(true);
        };
        number += 1;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        serde_json::from_str::<Value>(line).map_err(|err| {
            CliError::Input(t!("input.stdin_line_invalid", line = number, error = err))
        })?;
        if sender.send(Ok(line.to_string())).await.is_err() {
            return Ok(false);
        }
    }
}
