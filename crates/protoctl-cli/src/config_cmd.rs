// crates/protoctl-cli/src/config_cmd.rs
// ============================================================================
// Module: Config Commands
// Description: The `config` command family.
// Purpose: Inspect and edit contexts, users, and bookmarked services.
// Dependencies: clap, protoctl-client, protoctl-config, serde_yaml
// ============================================================================

//! ## Overview
//! `config` commands edit the persisted configuration and save it after
//! every successful change. `config service add` reflects the server named
//! by `--address` and stores the service's descriptors as a bookmark, which
//! later becomes a command without any server round trip.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::io::Write;

use clap::Command;
use clap::Subcommand;
use protoctl_client::CallTarget;
use protoctl_client::Headers;
use protoctl_client::Protocol;
use protoctl_client::ReflectionSchemaSource;
use protoctl_client::SchemaSource;
use protoctl_config::ConfigStore;
use protoctl_config::ContextEntry;
use protoctl_config::ServiceEntry;
use protoctl_config::UserEntry;
use serde::Serialize;
use tracing::debug;

use crate::args::GlobalArgs;
use crate::error::CliError;
use crate::error::CliResult;
use crate::output::write_line;
use crate::t;

// ============================================================================
// SECTION: Commands
// ============================================================================

/// Name of the config command.
pub const CONFIG_COMMAND: &str = "config";

/// `config` subcommands.
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum ConfigCommand {
    /// Print the whole configuration.
    View,
    /// Select the current context.
    SetContext {
        /// Context name.
        name: String,
    },
    /// Manage contexts.
    #[command(subcommand)]
    Context(ContextCommand),
    /// Manage users and their default headers.
    #[command(subcommand)]
    User(UserCommand),
    /// Manage bookmarked services.
    #[command(subcommand)]
    Service(ServiceCommand),
}

/// `config context` subcommands.
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum ContextCommand {
    /// List context names.
    List,
    /// Print one context.
    Get {
        /// Context name.
        name: String,
    },
    /// Delete a context.
    Delete {
        /// Context name.
        name: String,
    },
    /// Add a context.
    Add {
        /// Context name.
        name: String,
        /// User whose headers apply.
        #[arg(long = "user")]
        user: Option<String>,
        /// Environment selected on bookmarked services.
        #[arg(long = "env")]
        env: Option<String>,
    },
}

/// `config user` subcommands.
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum UserCommand {
    /// List user names.
    List,
    /// Print one user.
    Get {
        /// User name.
        name: String,
    },
    /// Delete a user.
    Delete {
        /// User name.
        name: String,
    },
    /// Add a user whose headers are the `-H` values.
    Add {
        /// User name.
        name: String,
    },
}

/// `config service` subcommands.
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum ServiceCommand {
    /// List bookmarked service names.
    List,
    /// Print one bookmark.
    Get {
        /// Service name.
        name: String,
    },
    /// Delete a bookmark.
    Delete {
        /// Service name.
        name: String,
    },
    /// Bookmark a service exposed at `--address`.
    Add {
        /// Service name.
        name: String,
    },
}

/// Builds the `config` command.
#[must_use]
pub fn command() -> Command {
    ConfigCommand::augment_subcommands(
        Command::new(CONFIG_COMMAND)
            .about(t!("config.about"))
            .subcommand_required(true)
            .arg_required_else_help(true),
    )
}

// ============================================================================
// SECTION: Execution
// ============================================================================

/// Runs a config command against `store`, saving after changes.
///
/// # Errors
///
/// Returns [`CliError`] when a lookup or save fails, or a bookmark cannot
/// be reflected.
pub async fn run(
    command: ConfigCommand,
    store: &mut ConfigStore,
    globals: &GlobalArgs,
    headers: &Headers,
    out: &mut impl Write,
) -> CliResult<()> {
    match command {
        ConfigCommand::View => {
            let yaml = store.config().to_yaml()?;
            write_line(out, yaml.trim_end())
        }
        ConfigCommand::SetContext {
            name,
        } => {
            store.config_mut().set_current_context(&name)?;
            store.save()?;
            write_line(out, &t!("config.context.selected", name = name))
        }
        ConfigCommand::Context(command) => run_context(command, store, out),
        ConfigCommand::User(command) => run_user(command, store, globals, out),
        ConfigCommand::Service(command) => run_service(command, store, globals, headers, out).await,
    }
}

/// Runs a `config context` command.
fn run_context(
    command: ContextCommand,
    store: &mut ConfigStore,
    out: &mut impl Write,
) -> CliResult<()> {
    let kind = t!("config.kind.context");
    match command {
        ContextCommand::List => {
            let names: Vec<&str> =
                store.config().contexts.iter().map(|entry| entry.name.as_str()).collect();
            write_names(out, &names)
        }
        ContextCommand::Get {
            name,
        } => write_yaml(out, &kind, store.config().context(&name)?),
        ContextCommand::Delete {
            name,
        } => {
            store.config_mut().delete_context(&name)?;
            store.save()?;
            write_line(out, &t!("config.deleted", kind = kind, name = name))
        }
        ContextCommand::Add {
            name,
            user,
            env,
        } => {
            store.config_mut().add_context(ContextEntry {
                name: name.clone(),
                user,
                env,
            })?;
            store.save()?;
            write_line(out, &t!("config.added", kind = kind, name = name))
        }
    }
}

/// Runs a `config user` command.
fn run_user(
    command: UserCommand,
    store: &mut ConfigStore,
    globals: &GlobalArgs,
    out: &mut impl Write,
) -> CliResult<()> {
    let kind = t!("config.kind.user");
    match command {
        UserCommand::List => {
            let names: Vec<&str> =
                store.config().users.iter().map(|entry| entry.name.as_str()).collect();
            write_names(out, &names)
        }
        UserCommand::Get {
            name,
        } => write_yaml(out, &kind, store.config().user(&name)?),
        UserCommand::Delete {
            name,
        } => {
            store.config_mut().delete_user(&name)?;
            store.save()?;
            write_line(out, &t!("config.deleted", kind = kind, name = name))
        }
        UserCommand::Add {
            name,
        } => {
            let mut headers = BTreeMap::new();
            for raw in &globals.headers {
                let (key, value) = Headers::parse(raw)
                    .map_err(|err| CliError::Input(t!("input.header_invalid", error = err)))?;
                headers.insert(key, value);
            }
            store.config_mut().add_user(UserEntry {
                name: name.clone(),
                headers,
            })?;
            store.save()?;
            write_line(out, &t!("config.added", kind = kind, name = name))
        }
    }
}

/// Runs a `config service` command.
async fn run_service(
    command: ServiceCommand,
    store: &mut ConfigStore,
    globals: &GlobalArgs,
    headers: &Headers,
    out: &mut impl Write,
) -> CliResult<()> {
    let kind = t!("config.kind.service");
    match command {
        ServiceCommand::List => {
            let names: Vec<&str> =
                store.config().services.iter().map(|entry| entry.name.as_str()).collect();
            write_names(out, &names)
        }
        ServiceCommand::Get {
            name,
        } => write_yaml(out, &kind, store.config().service(&name)?),
        ServiceCommand::Delete {
            name,
        } => {
            store.config_mut().delete_service(&name)?;
            store.save()?;
            write_line(out, &t!("config.deleted", kind = kind, name = name))
        }
        ServiceCommand::Add {
            name,
        } => {
            let entry = bookmark(&name, globals, headers).await?;
            let methods = entry.methods.len();
            let address = globals.address.clone().unwrap_or_default();
            store.config_mut().upsert_service(entry)?;
            store.save()?;
            write_line(
                out,
                &t!("config.service.bookmarked", name = name, address = address, methods = methods),
            )
        }
    }
}

/// Reflects `--address` and builds a bookmark for `name`.
async fn bookmark(name: &str, globals: &GlobalArgs, headers: &Headers) -> CliResult<ServiceEntry> {
    let address = globals
        .address
        .as_deref()
        .ok_or_else(|| CliError::Input(t!("input.address_required", service = name)))?;
    let target = CallTarget::new(address, Protocol::Grpc, globals.plaintext);
    let model = ReflectionSchemaSource::new(target, headers.clone())
        .load()
        .await
        .map_err(|err| CliError::discovery(address, &err))?;
    let scoped = model.restrict_to(name).map_err(|err| {
        CliError::Discovery(t!(
            "discovery.service_missing",
            service = name,
            address = address,
            error = err
        ))
    })?;
    let methods: Vec<String> = scoped
        .services()
        .iter()
        .flat_map(|service| service.operations().iter().map(|op| op.name().to_string()))
        .collect();
    debug!(service = name, address, methods = methods.len(), "bookmarking service");
    let protocol = (globals.protocol != Protocol::Grpc).then(|| globals.protocol.to_string());
    Ok(ServiceEntry::bookmark(
        name,
        &scoped.encode(),
        methods,
        address,
        globals.plaintext,
        protocol,
    ))
}

// ============================================================================
// SECTION: Rendering
// ============================================================================

/// Writes one name per line.
fn write_names(out: &mut impl Write, names: &[&str]) -> CliResult<()> {
    names.iter().try_for_each(|name| write_line(out, name))
}

/// Writes `entry` as YAML.
fn write_yaml<T: Serialize>(out: &mut impl Write, kind: &str, entry: &T) -> CliResult<()> {
    let yaml = serde_yaml::to_string(entry)
        .map_err(|err| CliError::Output(t!("config.render_failed", kind = kind, error = err)))?;
    write_line(out, yaml.trim_end())
}
