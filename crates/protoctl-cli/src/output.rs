// crates/protoctl-cli/src/output.rs
// ============================================================================
// Module: CLI Output
// Description: Line-oriented writers for command output.
// Purpose: Map write failures onto the CLI error taxonomy.
// Dependencies: Standard library I/O.
// ============================================================================

//! ## Overview
//! Line-oriented writers for command output that map write failures onto
//! the CLI error taxonomy.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write;

use crate::error::CliError;
use crate::error::CliResult;

// ============================================================================
// SECTION: Writers
// ============================================================================

/// Writes `text` plus a newline and flushes.
///
/// # Errors
///
/// Returns [`CliError::Output`] when writing fails.
pub fn write_line(out: &mut impl Write, text: &str) -> CliResult<()> {
    writeln!(out, "{text}").and_then(|()| out.flush()).map_err(|err| CliError::output(&err))
}

/// Writes `text` verbatim and flushes.
///
/// # Errors
///
/// Returns [`CliError::Output`] when writing fails.
pub fn write_raw(out: &mut impl Write, text: &str) -> CliResult<()> {
    out.write_all(text.as_bytes()).and_then(|()| out.flush()).map_err(|err| CliError::output(&err))
}
