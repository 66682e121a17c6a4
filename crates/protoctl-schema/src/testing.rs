// crates/protoctl-schema/src/testing.rs
// ============================================================================
// Module: Schema Test Fixtures
// Description: Programmatic descriptor files shared by unit and system tests.
// Purpose: Provide deterministic schemas without a protobuf compiler.
// Dependencies: prost-reflect, prost-types
// ============================================================================

//! ## Overview
//! Builds two fixture schemas:
//! - `api.proto` (package `example`): `FooAPI.Hello`, `BarAPI.ListBars`, and
//!   `StreamAPI` with client-, server-, and bidirectional-streaming methods.
//! - `kinds.proto` (package `kinds`): every scalar kind, an enum, a map,
//!   self- and mutually-recursive records, and well-known JSON types.
//!
//! Compiled only for tests or with the `testing` feature.

// ============================================================================
// SECTION: Imports
// ============================================================================

use prost_reflect::DescriptorPool;
use prost_types::DescriptorProto;
use prost_types::EnumDescriptorProto;
use prost_types::EnumValueDescriptorProto;
use prost_types::FieldDescriptorProto;
use prost_types::FileDescriptorProto;
use prost_types::FileDescriptorSet;
use prost_types::MessageOptions;
use prost_types::MethodDescriptorProto;
use prost_types::ServiceDescriptorProto;
use prost_types::field_descriptor_proto::Label;
use prost_types::field_descriptor_proto::Type;

use crate::model::SchemaModel;

// ============================================================================
// SECTION: Builders
// ============================================================================

/// Builds a singular scalar field.
#[must_use]
pub fn scalar_field(name: &str, number: i32, kind: Type) -> FieldDescriptorProto {
    FieldDescriptorProto {
        name: Some(name.to_string()),
        number: Some(number),
        label: Some(Label::Optional as i32),
        r#type: Some(kind as i32),
        json_name: Some(json_name(name)),
        ..FieldDescriptorProto::default()
    }
}

/// Builds a singular field referring to a named message or enum type.
#[must_use]
pub fn typed_field(name: &str, number: i32, kind: Type, type_name: &str) -> FieldDescriptorProto {
    FieldDescriptorProto {
        type_name: Some(type_name.to_string()),
        ..scalar_field(name, number, kind)
    }
}

/// Marks a field as repeated.
#[must_use]
pub fn repeated(field: FieldDescriptorProto) -> FieldDescriptorProto {
    FieldDescriptorProto {
        label: Some(Label::Repeated as i32),
        ..field
    }
}

/// Builds a message type.
#[must_use]
pub fn message(name: &str, fields: Vec<FieldDescriptorProto>) -> DescriptorProto {
    DescriptorProto {
        name: Some(name.to_string()),
        field: fields,
        ..DescriptorProto::default()
    }
}

/// Builds a method.
#[must_use]
pub fn method(
    name: &str,
    input: &str,
    output: &str,
    client_streaming: bool,
    server_streaming: bool,
) -> MethodDescriptorProto {
    MethodDescriptorProto {
        name: Some(name.to_string()),
        input_type: Some(input.to_string()),
        output_type: Some(output.to_string()),
        client_streaming: Some(client_streaming),
        server_streaming: Some(server_streaming),
        ..MethodDescriptorProto::default()
    }
}

/// Builds a service.
#[must_use]
pub fn service(name: &str, methods: Vec<MethodDescriptorProto>) -> ServiceDescriptorProto {
    ServiceDescriptorProto {
        name: Some(name.to_string()),
        method: methods,
        ..ServiceDescriptorProto::default()
    }
}

/// Builds a proto3 file.
#[must_use]
pub fn file(
    name: &str,
    package: &str,
    dependencies: &[&str],
    messages: Vec<DescriptorProto>,
    services: Vec<ServiceDescriptorProto>,
) -> FileDescriptorProto {
    FileDescriptorProto {
        name: Some(name.to_string()),
        package: Some(package.to_string()),
        dependency: dependencies.iter().map(ToString::to_string).collect(),
        message_type: messages,
        service: services,
        syntax: Some("proto3".to_string()),
        ..FileDescriptorProto::default()
    }
}

/// Computes the protobuf JSON name of a field.
fn json_name(name: &str) -> String {
    let mut result = String::with_capacity(name.len());
    let mut upper = false;
    for ch in name.chars() {
        if ch == '_' {
            upper = true;
        } else if upper {
            result.push(ch.to_ascii_uppercase());
            upper = false;
        } else {
            result.push(ch);
        }
    }
    result
}

// ============================================================================
// SECTION: Example API
// ============================================================================

/// Returns the `api.proto` file with the `FooAPI`, `BarAPI`, and `StreamAPI` services.
#[must_use]
pub fn example_file() -> FileDescriptorProto {
    const REQUEST: &str = ".example.ExampleRequest";
    const RESPONSE: &str = ".example.ExampleResponse";
    let text = |name: &str| message(name, vec![scalar_field("message", 1, Type::String)]);
    let list_bars =
        method("ListBars", ".example.BarRequest", ".example.BarResponse", false, false);
    file(
        "api.proto",
        "example",
        &[],
        vec![
            text("ExampleRequest"),
            text("ExampleResponse"),
            text("BarRequest"),
            text("BarResponse"),
        ],
        vec![
            service("FooAPI", vec![method("Hello", REQUEST, RESPONSE, false, false)]),
            service("BarAPI", vec![list_bars]),
            service(
                "StreamAPI",
                vec![
                    method("Chat", REQUEST, RESPONSE, true, true),
                    method("Collect", REQUEST, RESPONSE, true, false),
                    method("Ticks", REQUEST, RESPONSE, false, true),
                ],
            ),
        ],
    )
}

/// Returns the example API as a descriptor set.
#[must_use]
pub fn example_descriptor_set() -> FileDescriptorSet {
    FileDescriptorSet {
        file: vec![example_file()],
    }
}

/// Returns the example API as a schema model.
///
/// # Panics
///
/// Panics when the fixture fails to link, which indicates a fixture bug.
#[must_use]
#[allow(clippy::expect_used, reason = "Fixture linking failures are fixture bugs.")]
pub fn example_model() -> SchemaModel {
    SchemaModel::from_file_descriptor_protos(vec![example_file()]).expect("example fixture links")
}

// ============================================================================
// SECTION: Kinds Fixture
// ============================================================================

/// Names of the well-known files `kinds.proto` depends on.
const WELL_KNOWN_DEPENDENCIES: &[&str] = &[
    "google/protobuf/any.proto",
    "google/protobuf/struct.proto",
    "google/protobuf/timestamp.proto",
];

/// Returns `kinds.proto` plus the well-known files it imports.
#[must_use]
pub fn kinds_files() -> Vec<FileDescriptorProto> {
    let global = DescriptorPool::global();
    let mut files: Vec<FileDescriptorProto> = WELL_KNOWN_DEPENDENCIES
        .iter()
        .filter_map(|name| global.get_file_by_name(name))
        .map(|found| found.file_descriptor_proto().clone())
        .collect();
    files.push(kinds_file());
    files
}

/// Returns the kinds fixture as a schema model.
///
/// # Panics
///
/// Panics when the fixture fails to link, which indicates a fixture bug.
#[must_use]
#[allow(clippy::expect_used, reason = "Fixture linking failures are fixture bugs.")]
pub fn kinds_model() -> SchemaModel {
    SchemaModel::from_file_descriptor_protos(kinds_files()).expect("kinds fixture links")
}

/// Builds `kinds.proto`.
fn kinds_file() -> FileDescriptorProto {
    let counts_entry = DescriptorProto {
        options: Some(MessageOptions {
            map_entry: Some(true),
            ..MessageOptions::default()
        }),
        ..message(
            "CountsEntry",
            vec![scalar_field("key", 1, Type::String), scalar_field("value", 2, Type::Int32)],
        )
    };
    let everything = DescriptorProto {
        nested_type: vec![counts_entry],
        ..message(
            "Everything",
            vec![
                scalar_field("flag", 1, Type::Bool),
                scalar_field("small", 2, Type::Int32),
                scalar_field("big", 3, Type::Int64),
                scalar_field("small_unsigned", 4, Type::Uint32),
                scalar_field("big_unsigned", 5, Type::Uint64),
                scalar_field("zigzag", 6, Type::Sint32),
                scalar_field("zigzag_wide", 7, Type::Sint64),
                scalar_field("fixed", 8, Type::Fixed32),
                scalar_field("fixed_wide", 9, Type::Fixed64),
                scalar_field("signed_fixed", 10, Type::Sfixed32),
                scalar_field("signed_fixed_wide", 11, Type::Sfixed64),
                scalar_field("ratio", 12, Type::Float),
                scalar_field("precise", 13, Type::Double),
                scalar_field("label", 14, Type::String),
                scalar_field("raw_data", 15, Type::Bytes),
                typed_field("color", 16, Type::Enum, ".kinds.Color"),
                repeated(scalar_field("tags", 17, Type::String)),
                repeated(typed_field("counts", 18, Type::Message, ".kinds.Everything.CountsEntry")),
                typed_field("node", 19, Type::Message, ".kinds.Node"),
                typed_field("extra", 20, Type::Message, ".google.protobuf.Any"),
                typed_field("attributes", 21, Type::Message, ".google.protobuf.Struct"),
                typed_field("anything", 22, Type::Message, ".google.protobuf.Value"),
                typed_field("items", 23, Type::Message, ".google.protobuf.ListValue"),
                typed_field("created_at", 24, Type::Message, ".google.protobuf.Timestamp"),
            ],
        )
    };
    let node = message(
        "Node",
        vec![
            scalar_field("name", 1, Type::String),
            typed_field("child", 2, Type::Message, ".kinds.Node"),
            repeated(typed_field("children", 3, Type::Message, ".kinds.Node")),
        ],
    );
    let alpha = message("Alpha", vec![typed_field("beta", 1, Type::Message, ".kinds.Beta")]);
    let beta = message(
        "Beta",
        vec![
            typed_field("alpha", 1, Type::Message, ".kinds.Alpha"),
            scalar_field("depth", 2, Type::Int32),
        ],
    );
    let color = EnumDescriptorProto {
        name: Some("Color".to_string()),
        value: ["COLOR_UNSPECIFIED", "RED", "GREEN"]
            .iter()
            .zip(0..)
            .map(|(name, number)| EnumValueDescriptorProto {
                name: Some((*name).to_string()),
                number: Some(number),
                ..EnumValueDescriptorProto::default()
            })
            .collect(),
        ..EnumDescriptorProto::default()
    };
    FileDescriptorProto {
        enum_type: vec![color],
        ..file(
            "kinds.proto",
            "kinds",
            WELL_KNOWN_DEPENDENCIES,
            vec![everything, node, alpha, beta],
            vec![service(
                "KindsAPI",
                vec![
                    method("Describe", ".kinds.Everything", ".kinds.Everything", false, false),
                    method("Walk", ".kinds.Node", ".kinds.Node", false, false),
                ],
            )],
        )
    }
}
