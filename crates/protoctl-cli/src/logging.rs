// crates/protoctl-cli/src/logging.rs
// ============================================================================
// Module: Logging
// Description: Diagnostic subscriber setup for the protoctl binary.
// Purpose: Route tracing events to stderr so stdout stays machine-readable.
// Dependencies: tracing-subscriber
// ============================================================================

//! ## Overview
//! Diagnostics are filtered by the `PROTOCTL_LOG` directive (default
//! `warn`). An unparsable directive falls back to the default.

// ============================================================================
// SECTION: Imports
// ============================================================================

use tracing_subscriber::EnvFilter;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Environment variable holding the filter directive.
pub const LOG_ENV: &str = "PROTOCTL_LOG";
/// Directive used when none is configured.
pub const DEFAULT_DIRECTIVE: &str = "warn";

// ============================================================================
// SECTION: Setup
// ============================================================================

/// Builds the filter for an optional directive.
#[must_use]
pub fn filter_from(directive: Option<&str>) -> EnvFilter {
    directive
        .filter(|value| !value.trim().is_empty())
        .and_then(|value| EnvFilter::try_new(value).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_DIRECTIVE))
}

/// Installs the global subscriber. Later calls are no-ops.
pub fn init() {
    let directive = std::env::var(LOG_ENV).ok();
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter_from(directive.as_deref()))
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
