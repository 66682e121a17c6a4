// crates/protoctl-cli/src/i18n.rs
// ============================================================================
// Module: CLI Message Catalog
// Description: Message catalog and translation utilities for the CLI.
// Purpose: Centralize user-facing strings behind stable keys.
// Dependencies: Standard library collections and formatting utilities.
// ============================================================================

//! ## Overview
//! The protoctl CLI stores user-facing strings in a small catalog keyed by
//! stable identifiers. All runtime output should be routed through the
//! [`t!`](crate::t) macro.
//!
//! ## Invariants
//! - The catalog is initialized once and read-only thereafter.
//! - Missing keys fall back to the key itself to avoid panics.
//! - Placeholder substitutions preserve deterministic order.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::sync::OnceLock;

// ============================================================================
// SECTION: Types
// ============================================================================

/// A formatted message argument captured by the [`macro@crate::t`] macro.
#[derive(Clone)]
pub struct MessageArg {
    /// The placeholder name used in message templates (e.g., `"path"`).
    pub key: &'static str,
    /// The formatted string value to substitute for this placeholder.
    pub value: String,
}

impl MessageArg {
    /// Constructs a new [`MessageArg`] from a key and displayable value.
    pub fn new(key: &'static str, value: impl Into<String>) -> Self {
        Self {
            key,
            value: value.into(),
        }
    }
}

// ============================================================================
// SECTION: Catalog
// ============================================================================

/// Static catalog entries.
pub(crate) const CATALOG_ITEMS: &[(&str, &str)] = &[
    ("main.about", "Call RPC services described by protobuf descriptors."),
    ("output.write_failed", "Failed to write output: {error}"),
    ("input.header_invalid", "Invalid header: {error}"),
    ("input.flags_invalid", "{error}"),
    ("input.payload_invalid", "Invalid request payload: {error}"),
    ("input.stdin_line_invalid", "Invalid JSON on stdin line {line}: {error}"),
    ("input.stdin_failed", "Failed to read stdin: {error}"),
    ("input.read_failed", "Failed to read {kind} at {path}: {error}"),
    (
        "input.read_too_large",
        "Refusing to read {kind} at {path} because it is {size} bytes (limit {limit}).",
    ),
    ("input.kind.descriptor_set", "descriptor set"),
    (
        "input.address_missing",
        "No address for {service}; pass --address or bookmark the service with an environment.",
    ),
    ("input.address_required", "--address is required to bookmark {service}."),
    ("discovery.failed", "Failed to discover services at {address}: {error}"),
    ("discovery.retry_hint", "Check the address and try again."),
    ("discovery.descriptor_invalid", "Invalid descriptor set at {path}: {error}"),
    ("discovery.service_missing", "Service {service} is not exposed by {address}: {error}"),
    ("build.failed", "Failed to build commands: {error}"),
    ("invoke.failed", "{error}"),
    ("invoke.feeder_failed", "Request input stopped unexpectedly: {error}"),
    ("context.detached", "Context hooks cannot run on a detached execution context."),
    ("context.operation_missing", "Operation hooks need a resolved operation."),
    ("config.failed", "Config error: {error}"),
    ("config.protocol_invalid", "Invalid protocol for {service}: {error}"),
    ("config.render_failed", "Failed to render {kind}: {error}"),
    ("config.context.selected", "Switched to context {name}."),
    ("config.added", "Added {kind} {name}."),
    ("config.deleted", "Deleted {kind} {name}."),
    ("config.service.bookmarked", "Bookmarked {name} at {address} ({methods} methods)."),
    ("config.kind.context", "context"),
    ("config.kind.user", "user"),
    ("config.kind.service", "service"),
    ("config.about", "Manage contexts, users, and bookmarked services."),
    ("tree.service.about", "{name} as defined in {file}"),
    ("tree.operation.about", "{name} as defined in {file}"),
    ("tree.json_data.help", "Request body as JSON; repeat for streaming calls, '-' reads stdin."),
    ("complete.builtin.config", "Manage contexts, users, and bookmarked services"),
    ("complete.builtin.help", "Help about any command"),
    ("complete.json_data", "Request body as JSON"),
];

// ============================================================================
// SECTION: Translation
// ============================================================================

/// Translates `key` using the catalog while substituting `args`.
#[must_use]
pub fn translate(key: &str, args: Vec<MessageArg>) -> String {
    let template = catalog().get(key).copied().unwrap_or(key);
    if args.is_empty() {
        return template.to_string();
    }

    let mut result = template.to_string();
    for arg in args {
        let placeholder = format!("{{{}}}", arg.key);
        result = result.replace(&placeholder, &arg.value);
    }
    result
}

/// Returns the static catalog used by the CLI.
fn catalog() -> &'static HashMap<&'static str, &'static str> {
    static CATALOG: OnceLock<HashMap<&'static str, &'static str>> = OnceLock::new();

    CATALOG.get_or_init(|| CATALOG_ITEMS.iter().copied().collect())
}

// ============================================================================
// SECTION: Macro
// ============================================================================

/// Formats a message from a key and named arguments.
///
/// # Arguments
///
/// - `$key` must match a catalog entry.
/// - Named arguments are substituted into `{placeholder}` positions.
///
/// # Returns
///
/// A [`String`] with placeholders substituted.
#[macro_export]
macro_rules! t {
    ($key:literal $(, $name:ident = $value:expr )* $(,)?) => {{
        let args = ::std::vec![
            $(
                $crate::i18n::MessageArg::new(stringify!($name), $value.to_string()),
            )*
        ];
        $crate::i18n::translate($key, args)
    }};
}
