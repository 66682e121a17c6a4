// crates/protoctl-client/src/envelope.rs
// ============================================================================
// Module: Message Envelope
// Description: 5-byte length-prefixed framing for streamed HTTP bodies.
// Purpose: Frame messages for Connect streaming and gRPC-Web.
// Dependencies: bytes, thiserror
// ============================================================================

//! ## Overview
//! Each frame is one flags byte, a big-endian `u32` length, then the payload.
//! Flag `0x01` marks compression, `0x02` a Connect end-of-stream frame, and
//! `0x80` a gRPC-Web trailer frame.
//!
//! ## Invariants
//! - The decoder buffers partial input until a whole frame is available.
//! - Compressed frames and frames above [`MAX_FRAME_LEN`] are rejected.

use bytes::Buf;
use bytes::BufMut;
use bytes::Bytes;
use bytes::BytesMut;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Envelope header length.
pub const HEADER_LEN: usize = 5;
/// Compressed payload flag.
pub const FLAG_COMPRESSED: u8 = 0x01;
/// Connect end-of-stream flag.
pub const FLAG_END_STREAM: u8 = 0x02;
/// gRPC-Web trailer flag.
pub const FLAG_TRAILER: u8 = 0x80;
/// Largest accepted payload.
pub const MAX_FRAME_LEN: usize = 64 * 1024 * 1024;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Envelope framing errors.
///
/// # Invariants
/// - Variants are stable for tests.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EnvelopeError {
    /// A frame declares compression, which is never negotiated.
    #[error("compressed frames are not supported")]
    Compressed,
    /// A frame exceeds the size limit.
    #[error("frame of {len} bytes exceeds the {max} byte limit")]
    TooLarge {
        /// Declared payload length.
        len: usize,
        /// Accepted maximum.
        max: usize,
    },
    /// Input ended inside a frame.
    #[error("stream ended with {remaining} bytes of an incomplete frame")]
    Truncated {
        /// Buffered bytes left over.
        remaining: usize,
    },
}

// ============================================================================
// SECTION: Types
// ============================================================================

/// One decoded frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Flags byte.
    pub flags: u8,
    /// Payload.
    pub data: Bytes,
}

impl Frame {
    /// Returns true for a Connect end-of-stream frame.
    #[must_use]
    pub const fn is_end_stream(&self) -> bool {
        self.flags & FLAG_END_STREAM != 0
    }

    /// Returns true for a gRPC-Web trailer frame.
    #[must_use]
    pub const fn is_trailer(&self) -> bool {
        self.flags & FLAG_TRAILER != 0
    }
}

/// Encodes one frame.
///
/// # Errors
///
/// Returns [`EnvelopeError::TooLarge`] when the payload exceeds the limit.
pub fn encode_frame(flags: u8, payload: &[u8]) -> Result<Bytes, EnvelopeError> {
    let too_large = || EnvelopeError::TooLarge {
        len: payload.len(),
        max: MAX_FRAME_LEN,
    };
    if payload.len() > MAX_FRAME_LEN {
        return Err(too_large());
    }
    let len = u32::try_from(payload.len()).map_err(|_| too_large())?;
    let mut buf = BytesMut::with_capacity(HEADER_LEN + payload.len());
    buf.put_u8(flags);
    buf.put_u32(len);
    buf.put_slice(payload);
    Ok(buf.freeze())
}

/// Incremental frame decoder.
#[derive(Debug, Default)]
pub struct EnvelopeDecoder {
    /// Bytes received but not yet framed.
    buffer: BytesMut,
}

impl EnvelopeDecoder {
    /// Creates an empty decoder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends received bytes.
    pub fn push(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
    }

    /// Returns the next complete frame, or `None` when more input is needed.
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeError`] for compressed or oversized frames.
    pub fn next_frame(&mut self) -> Result<Option<Frame>, EnvelopeError> {
        if self.buffer.len() < HEADER_LEN {
            return Ok(None);
        }
        let flags = self.buffer[0];
        if flags & FLAG_COMPRESSED != 0 {
            return Err(EnvelopeError::Compressed);
        }
        let declared =
            u32::from_be_bytes([self.buffer[1], self.buffer[2], self.buffer[3], self.buffer[4]]);
        let len = usize::try_from(declared).unwrap_or(usize::MAX);
        if len > MAX_FRAME_LEN {
            return Err(EnvelopeError::TooLarge {
                len,
                max: MAX_FRAME_LEN,
            });
        }
        if self.buffer.len() < HEADER_LEN + len {
            return Ok(None);
        }
        self.buffer.advance(HEADER_LEN);
        let data = self.buffer.split_to(len).freeze();
        Ok(Some(Frame {
            flags,
            data,
        }))
    }

    /// Checks that input ended on a frame boundary.
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeError::Truncated`] when bytes remain buffered.
    pub fn finish(&self) -> Result<(), EnvelopeError> {
        if self.buffer.is_empty() {
            Ok(())
        } else {
            Err(EnvelopeError::Truncated {
                remaining: self.buffer.len(),
            })
        }
    }
}
