// crates/protoctl-cli/src/complete.rs
// ============================================================================
// Module: Completion Responder
// Description: Candidates for the hidden `__complete` command.
// Purpose: Let shell completion scripts query the dynamic command tree.
// Dependencies: clap
// ============================================================================

//! ## Overview
//! `protoctl __complete <words..> <partial>` prints one candidate per line
//! as `name\tdescription`, then the directive line `:4` telling the shell
//! not to fall back to file names. Invoked without words it prints `:0`.
//!
//! Candidates cover service names, operation names, flag names, and the
//! completion hint of the flag whose value is being typed.
//!
//! ## Invariants
//! - Completion never fails; problems degrade to fewer candidates.
//! - Command candidates are sorted by byte order.

// ============================================================================
// SECTION: Imports
// ============================================================================

use clap::Command;

use crate::args::root_command;
use crate::config_cmd::CONFIG_COMMAND;
use crate::t;
use crate::tree::CommandTree;
use crate::tree::JSON_DATA_FLAG;
use crate::tree::OperationNode;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Hidden command answered by [`candidates`].
pub const COMPLETE_COMMAND: &str = "__complete";
/// Directive printed when no completion was requested.
pub const DIRECTIVE_DEFAULT: &str = ":0";
/// Directive disabling file-name completion.
pub const DIRECTIVE_NO_FILE: &str = ":4";
/// Built-in help command name.
const HELP_COMMAND: &str = "help";

// ============================================================================
// SECTION: Types
// ============================================================================

/// One completion candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// Inserted text.
    pub name: String,
    /// One-line description; may be empty.
    pub description: String,
}

impl Candidate {
    /// Creates a candidate.
    #[must_use]
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
        }
    }

    /// Renders the candidate line.
    #[must_use]
    pub fn render(&self) -> String {
        if self.description.is_empty() {
            self.name.clone()
        } else {
            format!("{}\t{}", self.name, self.description)
        }
    }
}

/// Position reached by walking the completed words.
enum Level<'a> {
    /// No command selected.
    Root,
    /// Inside the built-in help command.
    Help,
    /// Inside a service command.
    Service(&'a str),
    /// Inside an operation command.
    Operation(&'a OperationNode),
    /// Inside the config command family.
    Config(Command),
    /// Past anything completable.
    Unknown,
}

// ============================================================================
// SECTION: Candidates
// ============================================================================

/// Renders the full completion response for `candidates`.
#[must_use]
pub fn render(candidates: &[Candidate]) -> String {
    let mut text = String::new();
    for candidate in candidates {
        text.push_str(&candidate.render());
        text.push('\n');
    }
    text.push_str(DIRECTIVE_NO_FILE);
    text.push('\n');
    text
}

/// Computes candidates for `words`, whose last entry is the partial word.
#[must_use]
pub fn candidates(tree: &CommandTree, config: &Command, words: &[String]) -> Vec<Candidate> {
    let (partial, completed) = match words.split_last() {
        Some((partial, completed)) => (partial.as_str(), completed),
        None => ("", words),
    };
    let mut level = Level::Root;
    let mut pending_value: Option<&str> = None;
    let mut tokens = completed.iter();
    while let Some(token) = tokens.next() {
        if let Some(flag) = token.strip_prefix("--") {
            pending_value = None;
            if !flag.contains('=') && flag_takes_value(&level, flag) && tokens.next().is_none() {
                pending_value = Some(flag);
            }
            continue;
        }
        if let Some(short) = token.strip_prefix('-') {
            pending_value = None;
            if short_takes_value(short) {
                let _ = tokens.next();
            }
            continue;
        }
        level = descend(tree, config, level, token);
    }
    if let Some(flag) = pending_value {
        return value_hint(&level, flag);
    }
    let mut found = if partial.starts_with('-') {
        flag_candidates(&level)
    } else {
        command_candidates(tree, &level)
    };
    found.retain(|candidate| candidate.name.starts_with(partial));
    found
}

/// Moves one command word deeper.
fn descend<'a>(tree: &'a CommandTree, config: &Command, level: Level<'a>, word: &str) -> Level<'a> {
    match level {
        Level::Root => {
            if word == CONFIG_COMMAND {
                Level::Config(config.clone())
            } else if word == HELP_COMMAND {
                Level::Help
            } else if let Some(service) = tree.service(word) {
                Level::Service(service.name())
            } else {
                Level::Unknown
            }
        }
        Level::Service(name) => tree
            .service(name)
            .and_then(|service| service.operation(word))
            .map_or(Level::Unknown, Level::Operation),
        Level::Config(command) => command
            .find_subcommand(word)
            .cloned()
            .map_or(Level::Unknown, Level::Config),
        Level::Help | Level::Operation(_) | Level::Unknown => Level::Unknown,
    }
}

/// Lists the subcommands available at `level`.
fn command_candidates(tree: &CommandTree, level: &Level<'_>) -> Vec<Candidate> {
    let mut found = match level {
        Level::Root | Level::Help => {
            let mut found: Vec<Candidate> = tree
                .services()
                .iter()
                .map(|service| Candidate::new(service.name(), service.about()))
                .collect();
            found.push(Candidate::new(CONFIG_COMMAND, t!("complete.builtin.config")));
            if matches!(level, Level::Root) {
                found.push(Candidate::new(HELP_COMMAND, t!("complete.builtin.help")));
            }
            found
        }
        Level::Service(name) => tree
            .service(name)
            .map(|service| {
                service
                    .operations()
                    .iter()
                    .map(|operation| Candidate::new(operation.name(), operation.about()))
                    .collect()
            })
            .unwrap_or_default(),
        Level::Config(command) => command
            .get_subcommands()
            .filter(|sub| !sub.is_hide_set())
            .map(|sub| {
                let about = sub.get_about().map(ToString::to_string).unwrap_or_default();
                Candidate::new(sub.get_name(), about)
            })
            .collect(),
        Level::Operation(_) | Level::Unknown => Vec::new(),
    };
    found.sort_by(|left, right| left.name.cmp(&right.name));
    found
}

/// Lists the flags available at `level`.
fn flag_candidates(level: &Level<'_>) -> Vec<Candidate> {
    let mut found = Vec::new();
    if let Level::Operation(operation) = level {
        found.push(Candidate::new(format!("--{JSON_DATA_FLAG}"), t!("complete.json_data")));
        found.extend(
            operation
                .flags()
                .iter()
                .map(|flag| {
                    Candidate::new(format!("--{}", flag.name()), flag.field().type_label())
                }),
        );
    }
    let root = root_command(COMPLETE_COMMAND);
    found.extend(root.get_arguments().filter(|arg| !arg.is_hide_set()).filter_map(|arg| {
        let long = arg.get_long()?;
        let help = arg.get_help().map(ToString::to_string).unwrap_or_default();
        Some(Candidate::new(format!("--{long}"), help))
    }));
    found
}

/// Returns true when `--flag` expects a separate value at `level`.
fn flag_takes_value(level: &Level<'_>, flag: &str) -> bool {
    if let Level::Operation(operation) = level {
        if flag == JSON_DATA_FLAG {
            return true;
        }
        if let Some(spec) = operation.flag(flag) {
            return !spec.is_switch();
        }
    }
    root_command(COMPLETE_COMMAND)
        .get_arguments()
        .find(|arg| arg.get_long() == Some(flag))
        .is_some_and(|arg| arg.get_action().takes_values() && !arg.is_require_equals_set())
}

/// Returns true when the short flag cluster `-x` expects the next token.
fn short_takes_value(cluster: &str) -> bool {
    let mut chars = cluster.chars();
    let (Some(short), None) = (chars.next(), chars.next()) else {
        return false;
    };
    root_command(COMPLETE_COMMAND)
        .get_arguments()
        .find(|arg| arg.get_short() == Some(short))
        .is_some_and(|arg| arg.get_action().takes_values() && !arg.is_require_equals_set())
}

/// Returns the completion hint for the value of `--flag`.
fn value_hint(level: &Level<'_>, flag: &str) -> Vec<Candidate> {
    let Level::Operation(operation) = level else {
        return Vec::new();
    };
    if flag == JSON_DATA_FLAG {
        return vec![Candidate::new(operation.template().to_json_string(), "")];
    }
    operation
        .flag(flag)
        .map(|spec| vec![Candidate::new(spec.hint(), "")])
        .unwrap_or_default()
}
