// system-tests/tests/helpers/harness.rs
// ============================================================================
// Module: Scenario Harness
// Description: Sandboxed CLI runs against mock servers.
// Purpose: Provide deterministic scratch state and bounded runs for tests.
// Dependencies: protoctl-cli, system-tests, tempfile, tokio
// ============================================================================

//! ## Overview
//! Each [`Scenario`] owns a scratch directory for its config and cache and
//! runs the CLI in-process under a timeout. Three environment variables
//! tune runs:
//! - `PROTOCTL_SYSTEM_TEST_RUN_ROOT`: parent of the scratch directories.
//! - `PROTOCTL_SYSTEM_TEST_TIMEOUT_SEC`: per-run timeout, default 20.
//! - `PROTOCTL_SYSTEM_TEST_KEEP_ARTIFACTS`: `1` or `true` keeps scratch
//!   directories for inspection.

use std::env;
use std::env::VarError;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use protoctl_cli::App;
use protoctl_cli::CliResult;
use system_tests::mock::MockServer;
use system_tests::mock::Reflection;
use tempfile::TempDir;

/// Parent directory for scratch directories.
const RUN_ROOT_VAR: &str = "PROTOCTL_SYSTEM_TEST_RUN_ROOT";
/// Per-run timeout in seconds.
const TIMEOUT_VAR: &str = "PROTOCTL_SYSTEM_TEST_TIMEOUT_SEC";
/// Keeps scratch directories after the scenario ends.
const KEEP_ARTIFACTS_VAR: &str = "PROTOCTL_SYSTEM_TEST_KEEP_ARTIFACTS";
/// Run timeout when none is configured.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

/// Reads a trimmed setting; blank counts as unset.
fn setting(name: &str) -> Result<Option<String>, String> {
    match env::var(name) {
        Ok(value) if value.trim().is_empty() => Ok(None),
        Ok(value) => Ok(Some(value.trim().to_string())),
        Err(VarError::NotPresent) => Ok(None),
        Err(VarError::NotUnicode(_)) => Err(format!("{name} is not valid UTF-8")),
    }
}

/// Returns the configured run timeout.
fn run_timeout() -> Result<Duration, String> {
    parse_timeout(setting(TIMEOUT_VAR)?.as_deref())
}

/// Parses a timeout setting in whole seconds.
pub fn parse_timeout(raw: Option<&str>) -> Result<Duration, String> {
    let Some(raw) = raw else {
        return Ok(DEFAULT_TIMEOUT);
    };
    match raw.parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(Duration::from_secs(secs)),
        _ => Err(format!("{TIMEOUT_VAR} must be a positive number of seconds, got {raw:?}")),
    }
}

/// Returns whether scratch directories outlive their scenario.
fn keep_artifacts() -> Result<bool, String> {
    parse_keep_artifacts(setting(KEEP_ARTIFACTS_VAR)?.as_deref())
}

/// Parses a keep-artifacts setting.
pub fn parse_keep_artifacts(raw: Option<&str>) -> Result<bool, String> {
    match raw {
        None | Some("0" | "false") => Ok(false),
        Some("1" | "true") => Ok(true),
        Some(other) => {
            Err(format!("{KEEP_ARTIFACTS_VAR} must be 1, 0, true, or false, got {other:?}"))
        }
    }
}

/// Result of one CLI run.
pub struct RunOutcome {
    /// Value returned by [`App::run`].
    pub result: CliResult<()>,
    /// Everything written to the output sink.
    pub stdout: String,
}

impl RunOutcome {
    /// Returns stdout or the error message.
    pub fn success(self) -> Result<String, String> {
        self.result.map(|()| self.stdout).map_err(|err| err.to_string())
    }
}

/// Scratch directory holding the config and cache of one scenario.
pub struct Scenario {
    /// Scratch root.
    root: TempDir,
    /// Per-run timeout.
    timeout: Duration,
}

impl Scenario {
    /// Creates a scenario honoring the system-test environment.
    pub fn new() -> Result<Self, String> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("protoctl-system-");
        builder.disable_cleanup(keep_artifacts()?);
        let root = match setting(RUN_ROOT_VAR)? {
            Some(parent) => builder.tempdir_in(parent),
            None => builder.tempdir(),
        }
        .map_err(|err| format!("scratch dir failed: {err}"))?;
        Ok(Self {
            root,
            timeout: run_timeout()?,
        })
    }

    /// Returns the scratch directory.
    pub fn root(&self) -> &Path {
        self.root.path()
    }

    /// Returns the config file path.
    pub fn config_path(&self) -> PathBuf {
        self.root().join("protoctl.yaml")
    }

    /// Returns the schema cache path.
    pub fn cache_path(&self) -> PathBuf {
        self.root().join("cache.yaml")
    }

    /// Builds a full command line with the scenario's config and cache.
    pub fn args(&self, words: &[&str]) -> Vec<String> {
        let mut args = vec!["protoctl".to_string()];
        args.extend(self.sandbox_flags());
        args.extend(words.iter().map(ToString::to_string));
        args
    }

    /// Builds a completion request for `words`.
    pub fn completion_args(&self, words: &[&str]) -> Vec<String> {
        let mut args = vec!["protoctl".to_string(), "__complete".to_string()];
        args.extend(self.sandbox_flags());
        args.extend(words.iter().map(ToString::to_string));
        args
    }

    /// Runs the CLI, bounded by the scenario timeout.
    pub async fn run(&self, args: Vec<String>) -> Result<RunOutcome, String> {
        self.run_app(App::builder("protoctl").build(), args).await
    }

    /// Runs the CLI with `stdin` as its standard input.
    pub async fn run_with_stdin(
        &self,
        args: Vec<String>,
        stdin: &str,
    ) -> Result<RunOutcome, String> {
        self.run_app(App::builder("protoctl").with_stdin(stdin).build(), args).await
    }

    /// Runs `app` under the scenario timeout, capturing its output.
    async fn run_app(&self, app: App, args: Vec<String>) -> Result<RunOutcome, String> {
        let mut out = Vec::new();
        let result = tokio::time::timeout(self.timeout, app.run(args, &mut out))
            .await
            .map_err(|_| format!("run exceeded {:?}", self.timeout))?;
        let stdout = String::from_utf8(out).map_err(|err| err.to_string())?;
        Ok(RunOutcome {
            result,
            stdout,
        })
    }

    /// Flags pointing the app at this scenario's config and cache.
    fn sandbox_flags(&self) -> Vec<String> {
        vec![
            "--config".to_string(),
            self.config_path().display().to_string(),
            "--cache".to_string(),
            self.cache_path().display().to_string(),
        ]
    }
}

/// Starts a mock server with the given reflection flavour.
pub async fn start_server(reflection: Reflection) -> Result<MockServer, String> {
    MockServer::spawn(reflection).await.map_err(|err| err.to_string())
}
