// crates/protoctl-cli/src/tests/config_cmd.rs
// ============================================================================
// Module: Config Command Tests
// Description: Unit tests for the config command family.
// Purpose: Ensure edits persist and lookups report missing entries.
// Dependencies: protoctl-cli config_cmd module, protoctl-config, tempfile
// ============================================================================

use clap::FromArgMatches;
use protoctl_client::Headers;
use protoctl_config::ConfigStore;

use crate::args::GlobalArgs;
use crate::config_cmd::ConfigCommand;
use crate::config_cmd::ContextCommand;
use crate::config_cmd::ServiceCommand;
use crate::config_cmd::UserCommand;
use crate::config_cmd::command;
use crate::config_cmd::run;
use crate::error::CliError;

type TestResult = Result<(), String>;

/// Config store backed by a temp directory.
struct Fixture {
    /// Keeps the directory alive.
    _dir: tempfile::TempDir,
    /// Store under test.
    store: ConfigStore,
}

impl Fixture {
    /// Opens an empty store.
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::open(Some(&dir.path().join("protoctl.yaml"))).unwrap();
        Self {
            _dir: dir,
            store,
        }
    }

    /// Runs a config subcommand and returns its output.
    async fn run(
        &mut self,
        command: ConfigCommand,
        globals: &GlobalArgs,
    ) -> Result<String, CliError> {
        let mut out = Vec::new();
        run(command, &mut self.store, globals, &Headers::new(), &mut out).await?;
        Ok(String::from_utf8(out).unwrap())
    }

    /// Reloads the store from disk.
    fn reopened(&self) -> ConfigStore {
        ConfigStore::open(Some(self.store.path())).unwrap()
    }
}

/// Parses `config` subcommand arguments.
fn parse(args: &[&str]) -> ConfigCommand {
    let argv = std::iter::once("config").chain(args.iter().copied());
    let matches = command().try_get_matches_from(argv).unwrap();
    ConfigCommand::from_arg_matches(&matches).unwrap()
}

#[test]
fn subcommands_parse_from_the_command_line() {
    assert_eq!(parse(&["view"]), ConfigCommand::View);
    assert_eq!(
        parse(&["context", "add", "dev", "--user", "alice", "--env", "staging"]),
        ConfigCommand::Context(ContextCommand::Add {
            name: "dev".to_string(),
            user: Some("alice".to_string()),
            env: Some("staging".to_string()),
        })
    );
    assert_eq!(
        parse(&["service", "delete", "FooAPI"]),
        ConfigCommand::Service(ServiceCommand::Delete {
            name: "FooAPI".to_string(),
        })
    );
}

#[tokio::test]
async fn contexts_are_added_selected_and_deleted() -> TestResult {
    let mut fixture = Fixture::new();
    let globals = GlobalArgs::default();
    let added = fixture
        .run(
            ConfigCommand::Context(ContextCommand::Add {
                name: "dev".to_string(),
                user: None,
                env: Some("staging".to_string()),
            }),
            &globals,
        )
        .await
        .map_err(|err| err.to_string())?;
    assert_eq!(added, "Added context dev.\n");

    let selected = fixture
        .run(
            ConfigCommand::SetContext {
                name: "dev".to_string(),
            },
            &globals,
        )
        .await
        .map_err(|err| err.to_string())?;
    assert_eq!(selected, "Switched to context dev.\n");
    let reopened = fixture.reopened();
    assert_eq!(reopened.config().current_context().map(|ctx| ctx.name.as_str()), Some("dev"));

    let listed = fixture
        .run(ConfigCommand::Context(ContextCommand::List), &globals)
        .await
        .map_err(|err| err.to_string())?;
    assert_eq!(listed, "dev\n");

    let shown = fixture
        .run(
            ConfigCommand::Context(ContextCommand::Get {
                name: "dev".to_string(),
            }),
            &globals,
        )
        .await
        .map_err(|err| err.to_string())?;
    assert!(shown.contains("env: staging"));
    Ok(())
}

#[tokio::test]
async fn users_take_headers_from_header_flags() -> TestResult {
    let mut fixture = Fixture::new();
    let globals = GlobalArgs {
        headers: vec!["Authorization: Bearer token".to_string()],
        ..GlobalArgs::default()
    };
    fixture
        .run(
            ConfigCommand::User(UserCommand::Add {
                name: "alice".to_string(),
            }),
            &globals,
        )
        .await
        .map_err(|err| err.to_string())?;
    let reopened = fixture.reopened();
    let user = reopened.config().user("alice").map_err(|err| err.to_string())?;
    assert_eq!(user.headers.get("authorization").map(String::as_str), Some("Bearer token"));
    Ok(())
}

#[tokio::test]
async fn missing_entries_are_config_errors() {
    let mut fixture = Fixture::new();
    let err = fixture
        .run(
            ConfigCommand::User(UserCommand::Delete {
                name: "ghost".to_string(),
            }),
            &GlobalArgs::default(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, CliError::Config(_)));
    assert_eq!(err.exit_code(), 1);
}

#[tokio::test]
async fn bookmarking_requires_an_address() {
    let mut fixture = Fixture::new();
    let err = fixture
        .run(
            ConfigCommand::Service(ServiceCommand::Add {
                name: "FooAPI".to_string(),
            }),
            &GlobalArgs::default(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, CliError::Input(ref message) if message.contains("--address")));
}

#[tokio::test]
async fn view_prints_the_whole_configuration() -> TestResult {
    let mut fixture = Fixture::new();
    let out = fixture
        .run(ConfigCommand::View, &GlobalArgs::default())
        .await
        .map_err(|err| err.to_string())?;
    assert!(out.contains("contexts"));
    Ok(())
}
