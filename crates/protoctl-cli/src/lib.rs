// crates/protoctl-cli/src/lib.rs
// ============================================================================
// Module: protoctl CLI Library
// Description: Dynamic command-line client for RPC services.
// Purpose: Build commands from discovered schemas and run calls.
// Dependencies: clap, protoctl-client, protoctl-config, protoctl-schema, tokio
// ============================================================================

//! ## Overview
//! protoctl discovers a schema (embedded, from descriptor set files, by
//! server reflection, or from bookmarks), turns every service and operation
//! into a subcommand with one typed flag per request field, and performs
//! the selected call over gRPC, Connect, or gRPC-Web.
//!
//! Embedders build an [`App`] with [`App::builder`], optionally registering
//! schemas and hooks, and hand it the command line.

pub mod app;
pub mod args;
pub mod complete;
pub mod config_cmd;
pub mod context;
pub mod error;
pub mod i18n;
pub mod input;
pub mod logging;
pub mod output;
pub mod tree;

#[cfg(test)]
mod tests;

pub use app::App;
pub use app::AppBuilder;
pub use context::ExecutionContext;
pub use context::Scope;
pub use error::CliError;
pub use error::CliResult;
pub use tree::BuildError;
pub use tree::CommandTree;
pub use tree::SchemaBinding;
