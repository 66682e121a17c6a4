// crates/protoctl-cli/tests/cli_binary.rs
// ============================================================================
// Module: CLI Binary Tests
// Description: Integration tests running the protoctl binary.
// Purpose: Ensure exit codes, help, completion, and config commands behave.
// Dependencies: protoctl binary, protoctl-schema fixtures, tempfile
// ============================================================================
//! ## Overview
//! Runs the compiled binary against descriptor set files and throwaway
//! config files. No test needs a server: calls that would reach one are
//! expected to stop earlier with an input error.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::process::Command;
use std::process::Output;

use protoctl_schema::testing::example_model;
use tempfile::TempDir;

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Path of the built binary.
fn protoctl_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_protoctl"))
}

/// Temp home for one binary run.
struct Sandbox {
    /// Scratch root.
    root: TempDir,
}

impl Sandbox {
    /// Creates an empty sandbox.
    fn new() -> Self {
        Self {
            root: tempfile::tempdir().expect("create temp dir"),
        }
    }

    /// Path of `name` inside the sandbox.
    fn path(&self, name: &str) -> PathBuf {
        self.root.path().join(name)
    }

    /// Writes the example descriptor set and returns its path.
    fn descriptor_set(&self) -> PathBuf {
        let path = self.path("api.pb");
        fs::write(&path, example_model().encode()).expect("write descriptor set");
        path
    }

    /// Runs the binary with the sandbox as home.
    fn run(&self, args: &[&str]) -> Output {
        Command::new(protoctl_bin())
            .args(args)
            .env("HOME", self.root.path())
            .env("PROTOCTL_CONFIG", self.path("protoctl.yaml"))
            .env_remove("PROTOCTL_LOG")
            .output()
            .expect("run protoctl")
    }
}

/// Captured stdout.
fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

/// Captured stderr.
fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

/// Path as an argv word.
fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

// ============================================================================
// SECTION: Tests
// ============================================================================

/// Without any schema source the tree is empty and help is shown.
#[test]
fn no_schema_source_prints_help() {
    let sandbox = Sandbox::new();
    let output = sandbox.run(&[]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(stdout(&output).contains("Usage: protoctl"));
    assert!(sandbox.path("protoctl.yaml").exists());
}

/// Completion without words prints only the default directive.
#[test]
fn bare_completion_prints_default_directive() {
    let sandbox = Sandbox::new();
    let output = sandbox.run(&["__complete"]);
    assert!(output.status.success());
    assert_eq!(stdout(&output), ":0\n");
}

/// Completion lists services found in a descriptor set.
#[test]
fn completion_lists_descriptor_set_services() {
    let sandbox = Sandbox::new();
    let set = path_arg(&sandbox.descriptor_set());
    let output = sandbox.run(&["__complete", "--descriptor-set", &set, "BarAPI", ""]);
    assert!(output.status.success());
    assert_eq!(stdout(&output), "ListBars\tListBars as defined in api.proto\n:4\n");
}

/// Completion degrades to builtins when discovery fails.
#[test]
fn completion_survives_unreachable_servers() {
    let sandbox = Sandbox::new();
    let cache = path_arg(&sandbox.path("cache.yaml"));
    let output = sandbox.run(&["__complete", "--address", "127.0.0.1:9", "--cache", &cache, ""]);
    assert!(output.status.success());
    assert_eq!(
        stdout(&output),
        "config\tManage contexts, users, and bookmarked services\n\
         help\tHelp about any command\n\
         :4\n"
    );
}

/// A service command without an operation prints its help.
#[test]
fn service_without_operation_prints_help() {
    let sandbox = Sandbox::new();
    let set = path_arg(&sandbox.descriptor_set());
    let output = sandbox.run(&["--descriptor-set", &set, "FooAPI"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(stdout(&output).contains("Hello"));
}

/// Calls need an address when no bookmark supplies one.
#[test]
fn calls_without_address_are_input_errors() {
    let sandbox = Sandbox::new();
    let set = path_arg(&sandbox.descriptor_set());
    let output = sandbox.run(&["--descriptor-set", &set, "FooAPI", "Hello", "--message", "hi"]);
    assert_eq!(output.status.code(), Some(2));
    assert!(stderr(&output).contains("No address for FooAPI"));
    assert!(stdout(&output).is_empty());
}

/// Unknown flags are rejected by the parser.
#[test]
fn unknown_flags_are_input_errors() {
    let sandbox = Sandbox::new();
    let set = path_arg(&sandbox.descriptor_set());
    let output = sandbox.run(&["--descriptor-set", &set, "FooAPI", "Hello", "--bogus", "1"]);
    assert_eq!(output.status.code(), Some(2));
}

/// A corrupt descriptor set is a discovery failure.
#[test]
fn corrupt_descriptor_sets_fail_discovery() {
    let sandbox = Sandbox::new();
    let path = sandbox.path("broken.pb");
    fs::write(&path, b"\xff\xff\xff").unwrap();
    let output = sandbox.run(&["--descriptor-set", &path_arg(&path), "FooAPI", "Hello"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("Invalid descriptor set"));
}

/// Unreachable reflection targets fail with a retry hint.
#[test]
fn unreachable_reflection_reports_retry_hint() {
    let sandbox = Sandbox::new();
    let cache = path_arg(&sandbox.path("cache.yaml"));
    let output =
        sandbox.run(&["--address", "127.0.0.1:9", "--plaintext", "--cache", &cache, "FooAPI"]);
    assert_eq!(output.status.code(), Some(1));
    let message = stderr(&output);
    assert!(message.contains("Failed to discover services at 127.0.0.1:9"));
    assert!(message.contains("Check the address and try again."));
}

/// Config commands persist contexts across invocations.
#[test]
fn config_commands_persist() {
    let sandbox = Sandbox::new();
    let added = sandbox.run(&["config", "context", "add", "dev", "--env", "staging"]);
    assert!(added.status.success(), "stderr: {}", stderr(&added));
    assert_eq!(stdout(&added), "Added context dev.\n");

    let selected = sandbox.run(&["config", "set-context", "dev"]);
    assert!(selected.status.success());

    let view = sandbox.run(&["config", "view"]);
    assert!(view.status.success());
    let text = stdout(&view);
    assert!(text.contains("current-context: dev"));
    assert!(text.contains("env: staging"));

    let missing = sandbox.run(&["config", "set-context", "prod"]);
    assert_eq!(missing.status.code(), Some(1));
}
