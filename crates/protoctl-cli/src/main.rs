// crates/protoctl-cli/src/main.rs
// ============================================================================
// Module: protoctl Binary
// Description: Process entry point for the protoctl CLI.
// Purpose: Wire logging, Ctrl-C cancellation, and exit codes around the app.
// Dependencies: protoctl-cli, tokio, tokio-util
// ============================================================================

//! ## Overview
//! The binary installs the diagnostic subscriber, cancels in-flight calls
//! on Ctrl-C, runs the [`App`] against the process arguments, and maps the
//! outcome onto an exit code. Errors are printed on stderr.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write;
use std::process::ExitCode;

use protoctl_cli::App;
use protoctl_cli::CliError;
use protoctl_cli::logging;
use tokio_util::sync::CancellationToken;

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// Program name used in help and completion.
const PROGRAM_NAME: &str = "protoctl";

/// CLI entry point returning an exit code.
#[tokio::main(flavor = "multi_thread")]
async fn main() -> ExitCode {
    logging::init();
    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            interrupt.cancel();
        }
    });

    let app = App::builder(PROGRAM_NAME).with_cancellation(cancel).build();
    let args = std::env::args_os().map(|arg| arg.to_string_lossy().into_owned());
    let mut stdout = std::io::stdout().lock();
    match app.run(args, &mut stdout).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => emit_error(&err),
    }
}

/// Emits an error message to stderr and returns its exit code.
fn emit_error(error: &CliError) -> ExitCode {
    let mut stderr = std::io::stderr();
    let _ = writeln!(&mut stderr, "{error}");
    ExitCode::from(error.exit_code())
}
