// crates/protoctl-cli/src/error.rs
// ============================================================================
// Module: CLI Errors
// Description: Error taxonomy for every CLI phase.
// Purpose: Keep discovery, build, input, and call failures distinguishable.
// Dependencies: protoctl-client, protoctl-config, thiserror
// ============================================================================

//! ## Overview
//! Every fallible CLI phase reports a [`CliError`] whose variant names the
//! phase and whose message is already formatted through the catalog. Only
//! the binary maps errors to a process exit code.

// ============================================================================
// SECTION: Imports
// ============================================================================

use protoctl_client::DiscoveryError;
use protoctl_client::InvokeError;
use protoctl_config::ConfigError;
use thiserror::Error;

use crate::t;
use crate::tree::BuildError;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI failure, tagged by the phase that failed.
///
/// # Invariants
/// - Variants are stable for exit-code mapping and tests.
/// - Messages are user-facing and already localized.
#[derive(Debug, Error)]
pub enum CliError {
    /// Schema discovery or descriptor loading failed.
    #[error("{0}")]
    Discovery(String),
    /// The command tree could not be built.
    #[error("{0}")]
    Build(String),
    /// Command-line input was malformed.
    #[error("{0}")]
    Input(String),
    /// The call itself failed.
    #[error("{0}")]
    Invocation(String),
    /// Execution context hooks were misconfigured or failed.
    #[error("{0}")]
    Context(String),
    /// Persisted configuration could not be read, changed, or saved.
    #[error("{0}")]
    Config(String),
    /// Output could not be written.
    #[error("{0}")]
    Output(String),
}

impl CliError {
    /// Process exit status for the error. Usage errors exit with 2.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Input(_) => 2,
            _ => 1,
        }
    }

    /// Builds a discovery error for `address`.
    #[must_use]
    pub fn discovery(address: &str, error: &DiscoveryError) -> Self {
        let mut message = t!("discovery.failed", address = address, error = error);
        if error.is_retryable() {
            message.push(' ');
            message.push_str(&t!("discovery.retry_hint"));
        }
        Self::Discovery(message)
    }

    /// Builds an output error.
    #[must_use]
    pub fn output(error: &std::io::Error) -> Self {
        Self::Output(t!("output.write_failed", error = error))
    }
}

impl From<BuildError> for CliError {
    fn from(error: BuildError) -> Self {
        Self::Build(t!("build.failed", error = error))
    }
}

impl From<ConfigError> for CliError {
    fn from(error: ConfigError) -> Self {
        Self::Config(t!("config.failed", error = error))
    }
}

impl From<InvokeError> for CliError {
    fn from(error: InvokeError) -> Self {
        Self::Invocation(t!("invoke.failed", error = error))
    }
}

/// CLI result alias for fallible operations.
pub type CliResult<T> = Result<T, CliError>;
