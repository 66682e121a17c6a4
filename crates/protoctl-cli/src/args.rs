// crates/protoctl-cli/src/args.rs
// ============================================================================
// Module: Global Arguments
// Description: Global flags and the pre-parse scan that feeds discovery.
// Purpose: Read connection flags before the dynamic command tree exists.
// Dependencies: clap, protoctl-client
// ============================================================================

//! ## Overview
//! Connection flags decide which schema is discovered, and the schema decides
//! which commands exist, so global flags are read twice: once by [`prescan`]
//! before discovery, and once more by the full parser.
//!
//! [`prescan`] picks global flags (and their values) out of the argument
//! list by consulting the clap definitions of [`GlobalArgs`], parses just
//! those with clap, and returns every other token as a command word.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::PathBuf;

use clap::Arg;
use clap::ArgAction;
use clap::Args;
use clap::Command;
use clap::CommandFactory;
use clap::Parser;
use protoctl_client::Protocol;

use crate::error::CliError;
use crate::error::CliResult;
use crate::t;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Flags accepted anywhere on the command line.
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Server address (`host:port` or an `http(s)://` URL).
    #[arg(short = 'a', long = "address", value_name = "ADDR", global = true)]
    pub address: Option<String>,
    /// Wire protocol: grpc, connect, or grpcweb.
    #[arg(
        short = 'p',
        long = "protocol",
        value_name = "PROTOCOL",
        default_value = "grpc",
        global = true
    )]
    pub protocol: Protocol,
    /// Disable TLS.
    #[arg(
        long = "plaintext",
        action = ArgAction::Set,
        num_args = 0..=1,
        require_equals = true,
        default_value = "false",
        default_missing_value = "true",
        global = true
    )]
    pub plaintext: bool,
    /// Request header as `key: value`; repeatable.
    #[arg(short = 'H', long = "header", value_name = "KEY: VALUE", global = true)]
    pub headers: Vec<String>,
    /// Config file path.
    #[arg(long = "config", value_name = "PATH", hide = true, global = true)]
    pub config: Option<PathBuf>,
    /// Encoded `FileDescriptorSet` to load commands from; repeatable.
    #[arg(long = "descriptor-set", value_name = "PATH", global = true)]
    pub descriptor_sets: Vec<PathBuf>,
    /// Schema cache file path.
    #[arg(long = "cache", value_name = "PATH", hide = true, global = true)]
    pub cache: Option<PathBuf>,
}

/// Root command carrying only the global flags.
#[derive(Parser, Debug)]
#[command(name = "protoctl", disable_version_flag = true)]
pub struct RootArgs {
    /// Global flags.
    #[command(flatten)]
    pub globals: GlobalArgs,
}

/// Result of [`prescan`].
#[derive(Debug, Clone, Default)]
pub struct Prescan {
    /// Parsed global flags.
    pub globals: GlobalArgs,
    /// Remaining tokens, in order, program name excluded.
    pub words: Vec<String>,
}

impl Prescan {
    /// Returns the first command word, if any.
    #[must_use]
    pub fn command(&self) -> Option<&str> {
        self.words.iter().map(String::as_str).find(|word| !word.starts_with('-'))
    }
}

// ============================================================================
// SECTION: Root Command
// ============================================================================

/// Builds the root command named `name` with the global flags attached.
#[must_use]
pub fn root_command(name: &str) -> Command {
    RootArgs::command().name(name.to_string()).bin_name(name.to_string()).about(t!("main.about"))
}

// ============================================================================
// SECTION: Prescan
// ============================================================================

/// Splits `args` (program name first) into global flags and command words.
///
/// # Errors
///
/// Returns [`CliError::Input`] when a global flag value does not parse.
pub fn prescan(args: &[String]) -> CliResult<Prescan> {
    let command = RootArgs::command();
    let program = args.first().cloned().unwrap_or_default();
    let mut kept = vec![program];
    let mut words = Vec::new();
    let mut tokens = args.iter().skip(1);
    while let Some(token) = tokens.next() {
        if token == "--" {
            words.push(token.clone());
            words.extend(tokens.by_ref().cloned());
            break;
        }
        let Some(arg) = global_arg(&command, token) else {
            words.push(token.clone());
            continue;
        };
        kept.push(token.clone());
        if takes_separate_value(arg, token) {
            if let Some(value) = tokens.next() {
                kept.push(value.clone());
            }
        }
    }
    let root = RootArgs::try_parse_from(kept)
        .map_err(|err| CliError::Input(t!("input.flags_invalid", error = err.render())))?;
    Ok(Prescan {
        globals: root.globals,
        words,
    })
}

/// Finds the global flag `token` names.
fn global_arg<'a>(command: &'a Command, token: &str) -> Option<&'a Arg> {
    if let Some(long) = token.strip_prefix("--") {
        let name = long.split_once('=').map_or(long, |(name, _)| name);
        if name.is_empty() {
            return None;
        }
        return command.get_arguments().find(|arg| arg.get_long() == Some(name));
    }
    let short = token.strip_prefix('-')?.chars().next()?;
    command.get_arguments().find(|arg| arg.get_short() == Some(short))
}

/// Returns true when the flag's value is the next token.
fn takes_separate_value(arg: &Arg, token: &str) -> bool {
    if !arg.get_action().takes_values() || arg.is_require_equals_set() {
        return false;
    }
    if token.starts_with("--") { !token.contains('=') } else { token.chars().count() == 2 }
}
