// crates/protoctl-schema/src/model.rs
// ============================================================================
// Module: Schema Model
// Description: Services, operations, record types, and fields from descriptors.
// Purpose: Provide a stable, typed view over a runtime descriptor pool.
// Dependencies: prost, prost-reflect, prost-types, thiserror
// ============================================================================

//! ## Overview
//! A [`SchemaModel`] is built from encoded descriptor files, either supplied
//! statically or fetched over server reflection. It owns the descriptor pool
//! and exposes [`ServiceDefinition`]s in file order, each holding its
//! [`OperationDefinition`]s. Record types are resolved lazily through the pool,
//! so self-referential messages are represented without expansion.
//!
//! ## Invariants
//! - Service command names (short names) are unique within one model.
//! - Server reflection services (`grpc.reflection.*`) never appear in a model.
//! - Operation definitions are immutable once the model is built.
//! - [`SchemaModel::encode`] round-trips every file held by the pool.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::fmt;

use prost::Message;
use prost_reflect::DescriptorPool;
use prost_reflect::EnumDescriptor;
use prost_reflect::FieldDescriptor;
use prost_reflect::Kind;
use prost_reflect::MessageDescriptor;
use prost_reflect::MethodDescriptor;
use prost_reflect::ServiceDescriptor;
use prost_types::FileDescriptorProto;
use prost_types::FileDescriptorSet;
use thiserror::Error;

use crate::value::FieldValue;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Package prefix of the server reflection services.
pub const REFLECTION_PACKAGE: &str = "grpc.reflection.";

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Schema construction and lookup errors.
///
/// # Invariants
/// - Variants are stable for CLI error mapping and tests.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// Descriptor bytes could not be decoded or linked.
    #[error("schema decode error: {0}")]
    Decode(String),
    /// Two services share the same command name.
    #[error("duplicate service name: {0}")]
    DuplicateService(String),
    /// A referenced type is missing from the descriptor pool.
    #[error("unknown type: {0}")]
    UnknownType(String),
    /// A service lookup failed.
    #[error("unknown service: {0}")]
    UnknownService(String),
    /// An operation lookup failed.
    #[error("unknown operation: {service}/{operation}")]
    UnknownOperation {
        /// Requested service name.
        service: String,
        /// Requested operation name.
        operation: String,
    },
}

// ============================================================================
// SECTION: Streaming Mode
// ============================================================================

/// Streaming shape of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamingMode {
    /// One request, one response.
    Unary,
    /// Many requests, one response.
    ClientStreaming,
    /// One request, many responses.
    ServerStreaming,
    /// Many requests and many responses on independent streams.
    Bidirectional,
}

impl StreamingMode {
    /// Derives the mode from the client and server streaming flags.
    #[must_use]
    pub const fn from_flags(client_streaming: bool, server_streaming: bool) -> Self {
        match (client_streaming, server_streaming) {
            (false, false) => Self::Unary,
            (true, false) => Self::ClientStreaming,
            (false, true) => Self::ServerStreaming,
            (true, true) => Self::Bidirectional,
        }
    }

    /// Returns true when any side of the call streams.
    #[must_use]
    pub const fn is_streaming(self) -> bool {
        !matches!(self, Self::Unary)
    }

    /// Returns true when the client sends more than one message.
    #[must_use]
    pub const fn client_streams(self) -> bool {
        matches!(self, Self::ClientStreaming | Self::Bidirectional)
    }

    /// Returns true when the server sends more than one message.
    #[must_use]
    pub const fn server_streams(self) -> bool {
        matches!(self, Self::ServerStreaming | Self::Bidirectional)
    }

    /// Returns the canonical label used in help output.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unary => "unary",
            Self::ClientStreaming => "client-streaming",
            Self::ServerStreaming => "server-streaming",
            Self::Bidirectional => "bidirectional",
        }
    }
}

impl fmt::Display for StreamingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SECTION: Schema Model
// ============================================================================

/// Ordered collection of services backed by one descriptor pool.
#[derive(Debug, Clone)]
pub struct SchemaModel {
    /// Pool holding every decoded file.
    pool: DescriptorPool,
    /// Services in file and declaration order.
    services: Vec<ServiceDefinition>,
}

impl SchemaModel {
    /// Decodes an encoded `FileDescriptorSet` into a model.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::Decode`] when the bytes cannot be decoded or the
    /// files do not link, and [`SchemaError::DuplicateService`] when two
    /// services share a command name.
    pub fn from_file_descriptor_set(bytes: &[u8]) -> Result<Self, SchemaError> {
        let set =
            FileDescriptorSet::decode(bytes).map_err(|err| SchemaError::Decode(err.to_string()))?;
        Self::from_file_descriptor_protos(set.file)
    }

    /// Builds a model from already-decoded descriptor files.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError`] when linking fails or service names collide.
    pub fn from_file_descriptor_protos(
        files: impl IntoIterator<Item = FileDescriptorProto>,
    ) -> Result<Self, SchemaError> {
        let mut pool = DescriptorPool::new();
        pool.add_file_descriptor_protos(files)
            .map_err(|err| SchemaError::Decode(err.to_string()))?;
        Self::from_pool(pool)
    }

    /// Builds a model over an existing descriptor pool.
    ///
    /// Reflection services are left out, so servers advertising both
    /// reflection versions still yield a model.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::DuplicateService`] when two services share a
    /// command name.
    pub fn from_pool(pool: DescriptorPool) -> Result<Self, SchemaError> {
        let mut seen = BTreeSet::new();
        let mut services = Vec::new();
        for descriptor in pool.services() {
            if descriptor.full_name().starts_with(REFLECTION_PACKAGE) {
                continue;
            }
            let service = ServiceDefinition::new(descriptor);
            if !seen.insert(service.name().to_string()) {
                return Err(SchemaError::DuplicateService(service.name().to_string()));
            }
            services.push(service);
        }
        Ok(Self {
            pool,
            services,
        })
    }

    /// Returns a model holding only the named service, sharing the same pool.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::UnknownService`] when the service is absent.
    pub fn restrict_to(&self, service: &str) -> Result<Self, SchemaError> {
        let kept = self
            .service(service)
            .cloned()
            .ok_or_else(|| SchemaError::UnknownService(service.to_string()))?;
        Ok(Self {
            pool: self.pool.clone(),
            services: vec![kept],
        })
    }

    /// Encodes every file in the pool as a `FileDescriptorSet`.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        FileDescriptorSet {
            file: self.pool.file_descriptor_protos().cloned().collect(),
        }
        .encode_to_vec()
    }

    /// Returns the services in discovery order.
    #[must_use]
    pub fn services(&self) -> &[ServiceDefinition] {
        &self.services
    }

    /// Looks up a service by command name.
    #[must_use]
    pub fn service(&self, name: &str) -> Option<&ServiceDefinition> {
        self.services.iter().find(|service| service.name() == name)
    }

    /// Looks up an operation by service and operation name.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::UnknownOperation`] when either lookup fails.
    pub fn operation(
        &self,
        service: &str,
        operation: &str,
    ) -> Result<&OperationDefinition, SchemaError> {
        self.service(service).and_then(|found| found.operation(operation)).ok_or_else(|| {
            SchemaError::UnknownOperation {
                service: service.to_string(),
                operation: operation.to_string(),
            }
        })
    }

    /// Looks up a record type by fully-qualified name.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::UnknownType`] when the pool lacks the type.
    pub fn record(&self, full_name: &str) -> Result<RecordType, SchemaError> {
        self.pool
            .get_message_by_name(full_name)
            .map(RecordType::new)
            .ok_or_else(|| SchemaError::UnknownType(full_name.to_string()))
    }

    /// Returns true when the model holds no services.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    /// Returns the underlying descriptor pool.
    #[must_use]
    pub const fn pool(&self) -> &DescriptorPool {
        &self.pool
    }
}

// ============================================================================
// SECTION: Service Definition
// ============================================================================

/// A named group of operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDefinition {
    /// Underlying service descriptor.
    descriptor: ServiceDescriptor,
    /// Path of the file defining the service.
    file: String,
    /// Operations in declaration order.
    operations: Vec<OperationDefinition>,
}

impl ServiceDefinition {
    /// Wraps a service descriptor and resolves its operations.
    #[must_use]
    pub fn new(descriptor: ServiceDescriptor) -> Self {
        let file = descriptor.parent_file().name().to_string();
        let operations = descriptor.methods().map(OperationDefinition::new).collect();
        Self {
            descriptor,
            file,
            operations,
        }
    }

    /// Returns the command name (unqualified service name).
    #[must_use]
    pub fn name(&self) -> &str {
        self.descriptor.name()
    }

    /// Returns the fully-qualified service name.
    #[must_use]
    pub fn full_name(&self) -> &str {
        self.descriptor.full_name()
    }

    /// Returns the path of the defining file.
    #[must_use]
    pub fn file_path(&self) -> &str {
        &self.file
    }

    /// Returns operations in declaration order.
    #[must_use]
    pub fn operations(&self) -> &[OperationDefinition] {
        &self.operations
    }

    /// Looks up an operation by name.
    #[must_use]
    pub fn operation(&self, name: &str) -> Option<&OperationDefinition> {
        self.operations.iter().find(|operation| operation.name() == name)
    }

    /// Returns the underlying descriptor.
    #[must_use]
    pub const fn descriptor(&self) -> &ServiceDescriptor {
        &self.descriptor
    }
}

// ============================================================================
// SECTION: Operation Definition
// ============================================================================

/// One callable operation on a service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationDefinition {
    /// Underlying method descriptor.
    descriptor: MethodDescriptor,
    /// Streaming shape.
    mode: StreamingMode,
    /// Wire path `/package.Service/Method`.
    path: String,
}

impl OperationDefinition {
    /// Wraps a method descriptor.
    #[must_use]
    pub fn new(descriptor: MethodDescriptor) -> Self {
        let mode = StreamingMode::from_flags(
            descriptor.is_client_streaming(),
            descriptor.is_server_streaming(),
        );
        let path = format!("/{}/{}", descriptor.parent_service().full_name(), descriptor.name());
        Self {
            descriptor,
            mode,
            path,
        }
    }

    /// Returns the operation name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.descriptor.name()
    }

    /// Returns the fully-qualified operation name.
    #[must_use]
    pub fn full_name(&self) -> &str {
        self.descriptor.full_name()
    }

    /// Returns the fully-qualified name of the owning service.
    #[must_use]
    pub fn service_full_name(&self) -> String {
        self.descriptor.parent_service().full_name().to_string()
    }

    /// Returns the input record type.
    #[must_use]
    pub fn input(&self) -> RecordType {
        RecordType::new(self.descriptor.input())
    }

    /// Returns the output record type.
    #[must_use]
    pub fn output(&self) -> RecordType {
        RecordType::new(self.descriptor.output())
    }

    /// Returns the streaming mode.
    #[must_use]
    pub const fn mode(&self) -> StreamingMode {
        self.mode
    }

    /// Returns the wire path.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns the path of the file defining the operation.
    #[must_use]
    pub fn file_path(&self) -> String {
        self.descriptor.parent_service().parent_file().name().to_string()
    }

    /// Returns the underlying descriptor.
    #[must_use]
    pub const fn descriptor(&self) -> &MethodDescriptor {
        &self.descriptor
    }
}

// ============================================================================
// SECTION: Record Type
// ============================================================================

/// A structured message type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordType {
    /// Underlying message descriptor.
    descriptor: MessageDescriptor,
}

impl RecordType {
    /// Wraps a message descriptor.
    #[must_use]
    pub const fn new(descriptor: MessageDescriptor) -> Self {
        Self {
            descriptor,
        }
    }

    /// Returns the fully-qualified type name.
    #[must_use]
    pub fn full_name(&self) -> &str {
        self.descriptor.full_name()
    }

    /// Returns the fields in declaration order.
    #[must_use]
    pub fn fields(&self) -> Vec<FieldDefinition> {
        self.descriptor.fields().map(FieldDefinition::new).collect()
    }

    /// Looks up a field by its JSON name.
    #[must_use]
    pub fn field_by_json_name(&self, json_name: &str) -> Option<FieldDefinition> {
        self.descriptor
            .fields()
            .find(|field| field.json_name() == json_name)
            .map(FieldDefinition::new)
    }

    /// Returns the underlying descriptor.
    #[must_use]
    pub const fn descriptor(&self) -> &MessageDescriptor {
        &self.descriptor
    }
}

// ============================================================================
// SECTION: Field Definition
// ============================================================================

/// Scalar or composite kind of a field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
    /// `bool`.
    Bool,
    /// `int32`.
    Int32,
    /// `int64`.
    Int64,
    /// `uint32`.
    Uint32,
    /// `uint64`.
    Uint64,
    /// `sint32`.
    Sint32,
    /// `sint64`.
    Sint64,
    /// `fixed32`.
    Fixed32,
    /// `fixed64`.
    Fixed64,
    /// `sfixed32`.
    Sfixed32,
    /// `sfixed64`.
    Sfixed64,
    /// `float`.
    Float,
    /// `double`.
    Double,
    /// `string`.
    String,
    /// `bytes`.
    Bytes,
    /// Enumeration.
    Enum(EnumDescriptor),
    /// Nested record.
    Message(RecordType),
}

impl FieldKind {
    /// Maps a descriptor kind onto the model kind.
    #[must_use]
    pub fn from_kind(kind: Kind) -> Self {
        match kind {
            Kind::Bool => Self::Bool,
            Kind::Int32 => Self::Int32,
            Kind::Int64 => Self::Int64,
            Kind::Uint32 => Self::Uint32,
            Kind::Uint64 => Self::Uint64,
            Kind::Sint32 => Self::Sint32,
            Kind::Sint64 => Self::Sint64,
            Kind::Fixed32 => Self::Fixed32,
            Kind::Fixed64 => Self::Fixed64,
            Kind::Sfixed32 => Self::Sfixed32,
            Kind::Sfixed64 => Self::Sfixed64,
            Kind::Float => Self::Float,
            Kind::Double => Self::Double,
            Kind::String => Self::String,
            Kind::Bytes => Self::Bytes,
            Kind::Enum(descriptor) => Self::Enum(descriptor),
            Kind::Message(descriptor) => Self::Message(RecordType::new(descriptor)),
        }
    }

    /// Returns the protobuf type label.
    #[must_use]
    pub fn label(&self) -> String {
        match self {
            Self::Bool => "bool".to_string(),
            Self::Int32 => "int32".to_string(),
            Self::Int64 => "int64".to_string(),
            Self::Uint32 => "uint32".to_string(),
            Self::Uint64 => "uint64".to_string(),
            Self::Sint32 => "sint32".to_string(),
            Self::Sint64 => "sint64".to_string(),
            Self::Fixed32 => "fixed32".to_string(),
            Self::Fixed64 => "fixed64".to_string(),
            Self::Sfixed32 => "sfixed32".to_string(),
            Self::Sfixed64 => "sfixed64".to_string(),
            Self::Float => "float".to_string(),
            Self::Double => "double".to_string(),
            Self::String => "string".to_string(),
            Self::Bytes => "bytes".to_string(),
            Self::Enum(descriptor) => descriptor.full_name().to_string(),
            Self::Message(record) => record.full_name().to_string(),
        }
    }

    /// Returns the zero value of the kind.
    #[must_use]
    pub fn zero_value(&self) -> FieldValue {
        match self {
            Self::Bool => FieldValue::Bool(false),
            Self::Int32
            | Self::Int64
            | Self::Sint32
            | Self::Sint64
            | Self::Sfixed32
            | Self::Sfixed64 => FieldValue::Signed(0),
            Self::Uint32 | Self::Uint64 | Self::Fixed32 | Self::Fixed64 => FieldValue::Unsigned(0),
            Self::Float | Self::Double => FieldValue::Float(0.0),
            Self::String => FieldValue::String(String::new()),
            Self::Bytes => FieldValue::Bytes(Vec::new()),
            Self::Enum(descriptor) => FieldValue::enum_value(descriptor, 0),
            Self::Message(_) => FieldValue::Record(std::collections::BTreeMap::new()),
        }
    }
}

/// How many values a field holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    /// Exactly one value.
    Single,
    /// An ordered list of values.
    Repeated,
    /// A key/value map.
    Map,
}

/// A named, typed slot of a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDefinition {
    /// Underlying field descriptor.
    descriptor: FieldDescriptor,
}

impl FieldDefinition {
    /// Wraps a field descriptor.
    #[must_use]
    pub const fn new(descriptor: FieldDescriptor) -> Self {
        Self {
            descriptor,
        }
    }

    /// Returns the proto field name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.descriptor.name()
    }

    /// Returns the JSON field name used for flags and payload keys.
    #[must_use]
    pub fn json_name(&self) -> &str {
        self.descriptor.json_name()
    }

    /// Returns the value kind. For map fields this is the map entry record.
    #[must_use]
    pub fn kind(&self) -> FieldKind {
        FieldKind::from_kind(self.descriptor.kind())
    }

    /// Returns the cardinality.
    #[must_use]
    pub fn cardinality(&self) -> Cardinality {
        if self.descriptor.is_map() {
            Cardinality::Map
        } else if self.descriptor.is_list() {
            Cardinality::Repeated
        } else {
            Cardinality::Single
        }
    }

    /// Returns the key and value fields of a map field.
    #[must_use]
    pub fn map_entry(&self) -> Option<(Self, Self)> {
        if !self.descriptor.is_map() {
            return None;
        }
        let Kind::Message(entry) = self.descriptor.kind() else {
            return None;
        };
        Some((Self::new(entry.map_entry_key_field()), Self::new(entry.map_entry_value_field())))
    }

    /// Returns the zero value of the field.
    #[must_use]
    pub fn default_value(&self) -> FieldValue {
        match self.cardinality() {
            Cardinality::Single => self.kind().zero_value(),
            Cardinality::Repeated => FieldValue::List(Vec::new()),
            Cardinality::Map => FieldValue::Map(std::collections::BTreeMap::new()),
        }
    }

    /// Returns a short type label including cardinality.
    #[must_use]
    pub fn type_label(&self) -> String {
        match (self.cardinality(), self.map_entry()) {
            (Cardinality::Map, Some((key, value))) => {
                format!("map<{}, {}>", key.kind().label(), value.kind().label())
            }
            (Cardinality::Repeated, _) => format!("repeated {}", self.kind().label()),
            _ => self.kind().label(),
        }
    }

    /// Returns the underlying descriptor.
    #[must_use]
    pub const fn descriptor(&self) -> &FieldDescriptor {
        &self.descriptor
    }
}
