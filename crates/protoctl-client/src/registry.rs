// crates/protoctl-client/src/registry.rs
// ============================================================================
// Module: Call Registry
// Description: Per-call descriptor pool for JSON and wire translation.
// Purpose: Resolve payload types without any process-global registration.
// Dependencies: prost-reflect, prost-types, serde, serde_json
// ============================================================================

//! ## Overview
//! A [`CallRegistry`] holds exactly the files that define an operation's
//! input and output types plus their transitive imports. JSON payloads are
//! decoded against its input type and responses are rendered against its
//! output type, so `Any` payloads resolve only types that call can see.

use std::collections::HashSet;

use prost::Message;
use prost_reflect::DescriptorPool;
use prost_reflect::DynamicMessage;
use prost_reflect::FileDescriptor;
use prost_reflect::MessageDescriptor;
use prost_types::FileDescriptorProto;
use protoctl_schema::OperationDefinition;
use serde::Serialize;
use serde_json::Deserializer;
use serde_json::Serializer;
use serde_json::ser::PrettyFormatter;

use crate::error::InvokeError;

/// Descriptor pool scoped to one operation.
#[derive(Debug, Clone)]
pub struct CallRegistry {
    /// Pool with the operation's files and their imports.
    pool: DescriptorPool,
    /// Request type within `pool`.
    input: MessageDescriptor,
    /// Response type within `pool`.
    output: MessageDescriptor,
}

impl CallRegistry {
    /// Builds the registry for `operation`.
    ///
    /// # Errors
    ///
    /// Returns [`InvokeError::Protocol`] when the files fail to link.
    pub fn for_operation(operation: &OperationDefinition) -> Result<Self, InvokeError> {
        let mut seen = HashSet::new();
        let mut files = Vec::new();
        collect_files(&operation.input().descriptor().parent_file(), &mut seen, &mut files);
        collect_files(&operation.output().descriptor().parent_file(), &mut seen, &mut files);
        let mut pool = DescriptorPool::new();
        pool.add_file_descriptor_protos(files)
            .map_err(|err| InvokeError::Protocol(format!("descriptor link failed: {err}")))?;
        let lookup = |name: &str| {
            pool.get_message_by_name(name)
                .ok_or_else(|| InvokeError::Protocol(format!("type {name} missing from registry")))
        };
        let input = lookup(operation.input().full_name())?;
        let output = lookup(operation.output().full_name())?;
        Ok(Self {
            pool,
            input,
            output,
        })
    }

    /// Returns the scoped pool.
    #[must_use]
    pub const fn pool(&self) -> &DescriptorPool {
        &self.pool
    }

    /// Returns the request type.
    #[must_use]
    pub const fn input(&self) -> &MessageDescriptor {
        &self.input
    }

    /// Returns the response type.
    #[must_use]
    pub const fn output(&self) -> &MessageDescriptor {
        &self.output
    }

    /// Decodes a JSON payload into a request message. Blank input is `{}`.
    ///
    /// # Errors
    ///
    /// Returns [`InvokeError::Payload`] when the JSON does not match the type.
    pub fn decode_request(&self, json: &str) -> Result<DynamicMessage, InvokeError> {
        let text = if json.trim().is_empty() { "{}" } else { json };
        let mut deserializer = Deserializer::from_str(text);
        let message = DynamicMessage::deserialize(self.input.clone(), &mut deserializer)
            .map_err(|err| InvokeError::Payload(err.to_string()))?;
        deserializer.end().map_err(|err| InvokeError::Payload(err.to_string()))?;
        Ok(message)
    }

    /// Decodes a JSON payload straight to request bytes.
    ///
    /// # Errors
    ///
    /// Returns [`InvokeError::Payload`] when the JSON does not match the type.
    pub fn encode_request(&self, json: &str) -> Result<Vec<u8>, InvokeError> {
        Ok(self.decode_request(json)?.encode_to_vec())
    }

    /// Decodes response bytes.
    ///
    /// # Errors
    ///
    /// Returns [`InvokeError::Payload`] when the bytes are not a valid message.
    pub fn decode_response(&self, bytes: &[u8]) -> Result<DynamicMessage, InvokeError> {
        DynamicMessage::decode(self.output.clone(), bytes)
            .map_err(|err| InvokeError::Payload(format!("response decode failed: {err}")))
    }

    /// Renders a response as indented JSON.
    ///
    /// # Errors
    ///
    /// Returns [`InvokeError::Payload`] when serialization fails.
    pub fn render_response(&self, message: &DynamicMessage) -> Result<String, InvokeError> {
        let mut out = Vec::new();
        let mut serializer = Serializer::with_formatter(&mut out, PrettyFormatter::new());
        message
            .serialize(&mut serializer)
            .map_err(|err| InvokeError::Payload(format!("response render failed: {err}")))?;
        String::from_utf8(out).map_err(|err| InvokeError::Payload(err.to_string()))
    }
}

/// Appends `file` after its imports, depth first, skipping seen files.
fn collect_files(
    file: &FileDescriptor,
    seen: &mut HashSet<String>,
    out: &mut Vec<FileDescriptorProto>,
) {
    if !seen.insert(file.name().to_string()) {
        return;
    }
    for dependency in file.dependencies() {
        collect_files(&dependency, seen, out);
    }
    out.push(file.file_descriptor_proto().clone());
}
