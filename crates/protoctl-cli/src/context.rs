// crates/protoctl-cli/src/context.rs
// ============================================================================
// Module: Execution Context
// Description: Per-invocation state and caller-supplied hooks.
// Purpose: Pass headers, the selected operation, and cancellation explicitly.
// Dependencies: protoctl-client, protoctl-config, protoctl-schema, tokio-util
// ============================================================================

//! ## Overview
//! Every invocation owns one [`ExecutionContext`]. Embedders register hooks
//! on the application builder; hooks receive the context mutably once the
//! operation is resolved and may add headers or cancel the call.
//!
//! ## Invariants
//! - Hooks only run against a root context; a detached context is rejected.
//! - Operation hooks only run once an operation is resolved.
//! - Hooks never run while completing command lines.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use protoctl_client::Headers;
use protoctl_config::Config;
use protoctl_schema::OperationDefinition;
use tokio_util::sync::CancellationToken;

use crate::error::CliError;
use crate::error::CliResult;
use crate::t;

// ============================================================================
// SECTION: Context
// ============================================================================

/// Where an execution context came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Created by the application for one invocation.
    Root,
    /// Created outside an invocation; hooks refuse it.
    Detached,
}

/// State threaded through one invocation.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    /// Outgoing request headers.
    headers: Headers,
    /// Resolved operation, once known.
    operation: Option<OperationDefinition>,
    /// Aborts the invocation.
    cancel: CancellationToken,
    /// Origin of the context.
    scope: Scope,
}

impl ExecutionContext {
    /// Creates the root context of an invocation.
    #[must_use]
    pub const fn root(cancel: CancellationToken) -> Self {
        Self {
            headers: Headers::new(),
            operation: None,
            cancel,
            scope: Scope::Root,
        }
    }

    /// Creates a context that is not bound to an invocation.
    #[must_use]
    pub fn detached() -> Self {
        Self {
            headers: Headers::new(),
            operation: None,
            cancel: CancellationToken::new(),
            scope: Scope::Detached,
        }
    }

    /// Returns the outgoing headers.
    #[must_use]
    pub const fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Returns the outgoing headers for mutation.
    pub const fn headers_mut(&mut self) -> &mut Headers {
        &mut self.headers
    }

    /// Returns the resolved operation.
    #[must_use]
    pub const fn operation(&self) -> Option<&OperationDefinition> {
        self.operation.as_ref()
    }

    /// Records the resolved operation.
    pub fn set_operation(&mut self, operation: OperationDefinition) {
        self.operation = Some(operation);
    }

    /// Returns the cancellation token.
    #[must_use]
    pub const fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Returns the context origin.
    #[must_use]
    pub const fn scope(&self) -> Scope {
        self.scope
    }
}

// ============================================================================
// SECTION: Hooks
// ============================================================================

/// Hook run with the execution context.
pub type ContextFn = Arc<dyn Fn(&mut ExecutionContext) -> CliResult<()> + Send + Sync>;
/// Hook run with the execution context and the resolved operation.
pub type OperationContextFn =
    Arc<dyn Fn(&mut ExecutionContext, &OperationDefinition) -> CliResult<()> + Send + Sync>;

/// Registered hooks, run in registration order.
#[derive(Clone, Default)]
pub struct Hooks {
    /// Context hooks.
    context: Vec<ContextFn>,
    /// Operation hooks, run after every context hook.
    operation: Vec<OperationContextFn>,
}

impl std::fmt::Debug for Hooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hooks")
            .field("context", &self.context.len())
            .field("operation", &self.operation.len())
            .finish()
    }
}

impl Hooks {
    /// Registers a context hook.
    pub fn push_context(&mut self, hook: ContextFn) {
        self.context.push(hook);
    }

    /// Registers an operation hook.
    pub fn push_operation(&mut self, hook: OperationContextFn) {
        self.operation.push(hook);
    }

    /// Returns true when no hook is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.context.is_empty() && self.operation.is_empty()
    }

    /// Runs every hook against `ctx`.
    ///
    /// # Errors
    ///
    /// Returns [`CliError::Context`] for a detached context or a missing
    /// operation, and the first error a hook returns.
    pub fn run(&self, ctx: &mut ExecutionContext) -> CliResult<()> {
        if self.is_empty() {
            return Ok(());
        }
        if ctx.scope() == Scope::Detached {
            return Err(CliError::Context(t!("context.detached")));
        }
        for hook in &self.context {
            hook(ctx)?;
        }
        if self.operation.is_empty() {
            return Ok(());
        }
        let operation = ctx
            .operation()
            .cloned()
            .ok_or_else(|| CliError::Context(t!("context.operation_missing")))?;
        for hook in &self.operation {
            hook(ctx, &operation)?;
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Headers
// ============================================================================

/// Merges the current user's configured headers with `-H` values.
///
/// Configured headers come first; command-line values are appended.
///
/// # Errors
///
/// Returns [`CliError::Config`] for a dangling user reference and
/// [`CliError::Input`] for a malformed `-H` value.
pub fn assemble_headers(config: &Config, flags: &[String]) -> CliResult<Headers> {
    let mut headers = Headers::from_pairs(config.current_headers()?);
    for raw in flags {
        let (key, value) = Headers::parse(raw)
            .map_err(|err| CliError::Input(t!("input.header_invalid", error = err)))?;
        headers.push(key, value);
    }
    Ok(headers)
}
