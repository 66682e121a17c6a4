// crates/protoctl-client/src/codec.rs
// ============================================================================
// Module: Dynamic Codec
// Description: tonic codec for runtime-typed protobuf messages.
// Purpose: Drive generic tonic clients and servers with dynamic messages.
// Dependencies: prost, prost-reflect, tonic
// ============================================================================

//! ## Overview
//! tonic's built-in codec needs `Default` message types. [`DynamicCodec`]
//! instead carries the descriptor of the message it decodes, and encodes any
//! [`DynamicMessage`]. Clients decode the output type; servers decode the
//! input type.
//!
//! Encoded items are results: an `Err` item fails encoding, which makes a
//! client reset its request stream rather than half-close it.

use prost::Message;
use prost_reflect::DynamicMessage;
use prost_reflect::MessageDescriptor;
use tonic::Status;
use tonic::codec::Codec;
use tonic::codec::DecodeBuf;
use tonic::codec::Decoder;
use tonic::codec::EncodeBuf;
use tonic::codec::Encoder;

/// Codec encoding any dynamic message and decoding one descriptor.
#[derive(Debug, Clone)]
pub struct DynamicCodec {
    /// Descriptor of decoded messages.
    decode: MessageDescriptor,
}

impl DynamicCodec {
    /// Creates a codec decoding messages of `decode`.
    #[must_use]
    pub const fn new(decode: MessageDescriptor) -> Self {
        Self {
            decode,
        }
    }
}

impl Codec for DynamicCodec {
    type Encode = Result<DynamicMessage, Status>;
    type Decode = DynamicMessage;
    type Encoder = DynamicEncoder;
    type Decoder = DynamicDecoder;

    fn encoder(&mut self) -> Self::Encoder {
        DynamicEncoder
    }

    fn decoder(&mut self) -> Self::Decoder {
        DynamicDecoder {
            descriptor: self.decode.clone(),
        }
    }
}

/// Encoder half of [`DynamicCodec`].
#[derive(Debug, Clone, Copy)]
pub struct DynamicEncoder;

impl Encoder for DynamicEncoder {
    type Item = Result<DynamicMessage, Status>;
    type Error = Status;

    fn encode(&mut self, item: Self::Item, dst: &mut EncodeBuf<'_>) -> Result<(), Self::Error> {
        item?.encode(dst).map_err(|err| Status::internal(format!("encode failed: {err}")))
    }
}

/// Decoder half of [`DynamicCodec`].
#[derive(Debug, Clone)]
pub struct DynamicDecoder {
    /// Descriptor of decoded messages.
    descriptor: MessageDescriptor,
}

impl Decoder for DynamicDecoder {
    type Item = DynamicMessage;
    type Error = Status;

    fn decode(&mut self, src: &mut DecodeBuf<'_>) -> Result<Option<Self::Item>, Self::Error> {
        let mut message = DynamicMessage::new(self.descriptor.clone());
        message.merge(src).map_err(|err| Status::internal(format!("decode failed: {err}")))?;
        Ok(Some(message))
    }
}
