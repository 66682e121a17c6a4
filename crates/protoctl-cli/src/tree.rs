// crates/protoctl-cli/src/tree.rs
// ============================================================================
// Module: Command Tree
// Description: Builds clap commands from discovered schemas.
// Purpose: Expose every discovered operation as a typed subcommand.
// Dependencies: clap, protoctl-config, protoctl-schema, thiserror, tracing
// ============================================================================

//! ## Overview
//! [`CommandTree::build`] turns schema bindings into one service command per
//! service and one operation command per operation. Each operation command
//! carries `--json-data` plus one typed flag per input field; flag values
//! are parsed by a value parser derived from the field kind, so malformed
//! values are rejected by clap before anything runs.
//!
//! ## Invariants
//! - Service command names are unique across every binding.
//! - A failed build yields no tree at all.
//! - Untouched flags never reach the request payload.
//! - Reflection services are not exposed as commands.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::HashSet;
use std::ffi::OsStr;

use clap::Arg;
use clap::ArgAction;
use clap::ArgMatches;
use clap::Command;
use clap::ValueHint;
use clap::builder::TypedValueParser;
use clap::error::ErrorKind;
use protoctl_config::ServiceTarget;
use protoctl_schema::BindError;
use protoctl_schema::Cardinality;
use protoctl_schema::DynamicValue;
use protoctl_schema::FieldDefinition;
use protoctl_schema::FieldKind;
use protoctl_schema::FieldValue;
use protoctl_schema::OperationDefinition;
use protoctl_schema::SchemaModel;
use protoctl_schema::ServiceDefinition;
use protoctl_schema::Template;
use protoctl_schema::generate_template;
use protoctl_schema::parse_field_value;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::t;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Name of the raw request body flag.
pub const JSON_DATA_FLAG: &str = "json-data";
/// Built-in command names services may not take.
pub const RESERVED_COMMANDS: &[&str] = &["config", "help", "__complete"];
/// Global flag names input fields may not shadow.
const RESERVED_FLAGS: &[&str] =
    &["address", "protocol", "plaintext", "header", "config", "descriptor-set", "cache", "help"];

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Command tree construction errors.
///
/// # Invariants
/// - Variants are stable for CLI error mapping and tests.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BuildError {
    /// Two bindings expose the same service command name.
    #[error("duplicate service command '{name}'")]
    DuplicateService {
        /// Conflicting command name.
        name: String,
    },
    /// A service is named like a built-in command.
    #[error("service '{name}' collides with the built-in '{name}' command")]
    ReservedName {
        /// Conflicting command name.
        name: String,
    },
}

// ============================================================================
// SECTION: Bindings
// ============================================================================

/// A schema plus the address its services are called at, when fixed.
#[derive(Debug, Clone)]
pub struct SchemaBinding {
    /// Services to expose.
    model: SchemaModel,
    /// Bookmarked call target; `None` means the global address.
    target: Option<ServiceTarget>,
}

impl SchemaBinding {
    /// Binds a model to the global address.
    #[must_use]
    pub const fn new(model: SchemaModel) -> Self {
        Self {
            model,
            target: None,
        }
    }

    /// Binds a bookmarked model to its configured target.
    #[must_use]
    pub const fn bookmarked(model: SchemaModel, target: ServiceTarget) -> Self {
        Self {
            model,
            target: Some(target),
        }
    }

    /// Returns the bound model.
    #[must_use]
    pub const fn model(&self) -> &SchemaModel {
        &self.model
    }

    /// Returns the bookmarked target.
    #[must_use]
    pub const fn target(&self) -> Option<&ServiceTarget> {
        self.target.as_ref()
    }
}

// ============================================================================
// SECTION: Tree Nodes
// ============================================================================

/// One input field flag.
#[derive(Debug, Clone)]
pub struct FlagSpec {
    /// Bound field.
    field: FieldDefinition,
    /// Template default rendered for completion.
    hint: String,
}

impl FlagSpec {
    /// Returns the flag name (the field's JSON name).
    #[must_use]
    pub fn name(&self) -> &str {
        self.field.json_name()
    }

    /// Returns the bound field.
    #[must_use]
    pub const fn field(&self) -> &FieldDefinition {
        &self.field
    }

    /// Returns the completion hint.
    #[must_use]
    pub fn hint(&self) -> &str {
        &self.hint
    }

    /// Returns true when the flag may appear without a value.
    #[must_use]
    pub fn is_switch(&self) -> bool {
        self.field.kind() == FieldKind::Bool && self.field.cardinality() != Cardinality::Map
    }

    /// Builds the clap argument.
    fn to_arg(&self) -> Arg {
        let name = self.name().to_string();
        let arg = Arg::new(name.clone())
            .long(name)
            .value_name(self.field.kind().label())
            .help(self.field.type_label())
            .value_hint(ValueHint::Other)
            .value_parser(FieldParser {
                field: self.field.clone(),
            });
        let arg = match self.field.cardinality() {
            Cardinality::Single => arg.action(ArgAction::Set),
            Cardinality::Repeated | Cardinality::Map => arg.action(ArgAction::Append),
        };
        if self.is_switch() {
            arg.num_args(0..=1).require_equals(true).default_missing_value("true")
        } else {
            arg
        }
    }
}

/// One operation command.
#[derive(Debug, Clone)]
pub struct OperationNode {
    /// Operation definition.
    definition: OperationDefinition,
    /// Input template.
    template: Template,
    /// Field flags in declaration order.
    flags: Vec<FlagSpec>,
}

impl OperationNode {
    /// Builds the node for `definition`.
    fn new(definition: &OperationDefinition) -> Self {
        let input = definition.input();
        let template = generate_template(&input);
        let flags = input
            .fields()
            .into_iter()
            .filter(|field| {
                let reserved = RESERVED_FLAGS.contains(&field.json_name());
                if reserved {
                    debug!(
                        operation = definition.full_name(),
                        field = field.json_name(),
                        "field shadows a global flag; settable through --json-data only"
                    );
                }
                !reserved
            })
            .map(|field| {
                let hint = template.field(field.json_name()).map(hint_text).unwrap_or_default();
                FlagSpec {
                    field,
                    hint,
                }
            })
            .collect();
        Self {
            definition: definition.clone(),
            template,
            flags,
        }
    }

    /// Returns the operation name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.definition.name()
    }

    /// Returns the operation definition.
    #[must_use]
    pub const fn definition(&self) -> &OperationDefinition {
        &self.definition
    }

    /// Returns the input template.
    #[must_use]
    pub const fn template(&self) -> &Template {
        &self.template
    }

    /// Returns the field flags.
    #[must_use]
    pub fn flags(&self) -> &[FlagSpec] {
        &self.flags
    }

    /// Looks up a field flag by name.
    #[must_use]
    pub fn flag(&self, name: &str) -> Option<&FlagSpec> {
        self.flags.iter().find(|flag| flag.name() == name)
    }

    /// Returns the one-line description.
    #[must_use]
    pub fn about(&self) -> String {
        t!("tree.operation.about", name = self.name(), file = self.definition.file_path())
    }

    /// Builds the clap command.
    fn to_clap(&self) -> Command {
        let action = if self.definition.mode().client_streams() {
            ArgAction::Append
        } else {
            ArgAction::Set
        };
        let json_data = Arg::new(JSON_DATA_FLAG)
            .long(JSON_DATA_FLAG)
            .value_name("JSON")
            .help(t!("tree.json_data.help"))
            .value_hint(ValueHint::Other)
            .action(action);
        self.flags.iter().fold(
            Command::new(self.name().to_string()).about(self.about()).arg(json_data),
            |command, flag| command.arg(flag.to_arg()),
        )
    }
}

/// One service command.
#[derive(Debug, Clone)]
pub struct ServiceNode {
    /// Service definition.
    definition: ServiceDefinition,
    /// Bookmarked call target.
    target: Option<ServiceTarget>,
    /// Operation commands in declaration order.
    operations: Vec<OperationNode>,
}

impl ServiceNode {
    /// Returns the command name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.definition.name()
    }

    /// Returns the service definition.
    #[must_use]
    pub const fn definition(&self) -> &ServiceDefinition {
        &self.definition
    }

    /// Returns the bookmarked target.
    #[must_use]
    pub const fn target(&self) -> Option<&ServiceTarget> {
        self.target.as_ref()
    }

    /// Returns the operation commands.
    #[must_use]
    pub fn operations(&self) -> &[OperationNode] {
        &self.operations
    }

    /// Looks up an operation command.
    #[must_use]
    pub fn operation(&self, name: &str) -> Option<&OperationNode> {
        self.operations.iter().find(|operation| operation.name() == name)
    }

    /// Returns the one-line description.
    #[must_use]
    pub fn about(&self) -> String {
        t!("tree.service.about", name = self.name(), file = self.definition.file_path())
    }

    /// Builds the clap command.
    fn to_clap(&self) -> Command {
        self.operations.iter().fold(
            Command::new(self.name().to_string())
                .about(self.about())
                .subcommand_required(true)
                .arg_required_else_help(true),
            |command, operation| command.subcommand(operation.to_clap()),
        )
    }
}

// ============================================================================
// SECTION: Command Tree
// ============================================================================

/// An operation selected on the command line.
#[derive(Debug, Clone)]
pub struct ResolvedCall {
    /// Service command name.
    pub service: String,
    /// Selected operation.
    pub operation: OperationDefinition,
    /// Flag bindings for the input record.
    pub value: DynamicValue,
    /// `--json-data` values in order.
    pub json_data: Vec<String>,
    /// Bookmarked call target.
    pub target: Option<ServiceTarget>,
}

/// Every service and operation command.
#[derive(Debug, Clone, Default)]
pub struct CommandTree {
    /// Service commands in binding order.
    services: Vec<ServiceNode>,
}

impl CommandTree {
    /// Builds the tree from `bindings`.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError`] when a service name is reserved or repeated.
    pub fn build(bindings: impl IntoIterator<Item = SchemaBinding>) -> Result<Self, BuildError> {
        let mut seen = HashSet::new();
        let mut services = Vec::new();
        for binding in bindings {
            for service in binding.model.services() {
                let name = service.name();
                if RESERVED_COMMANDS.contains(&name) {
                    return Err(BuildError::ReservedName {
                        name: name.to_string(),
                    });
                }
                if !seen.insert(name.to_string()) {
                    return Err(BuildError::DuplicateService {
                        name: name.to_string(),
                    });
                }
                services.push(ServiceNode {
                    definition: service.clone(),
                    target: binding.target.clone(),
                    operations: service.operations().iter().map(OperationNode::new).collect(),
                });
            }
        }
        Ok(Self {
            services,
        })
    }

    /// Returns true when no service was discovered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    /// Returns the service commands.
    #[must_use]
    pub fn services(&self) -> &[ServiceNode] {
        &self.services
    }

    /// Looks up a service command.
    #[must_use]
    pub fn service(&self, name: &str) -> Option<&ServiceNode> {
        self.services.iter().find(|service| service.name() == name)
    }

    /// Attaches every service command to `root`.
    #[must_use]
    pub fn to_clap(&self, root: Command) -> Command {
        self.services.iter().fold(root, |root, service| root.subcommand(service.to_clap()))
    }

    /// Maps parsed matches back to the selected operation.
    ///
    /// Returns `None` when the matches do not select an operation.
    ///
    /// # Errors
    ///
    /// Returns [`BindError`] when a parsed value cannot be bound.
    pub fn resolve(&self, matches: &ArgMatches) -> Result<Option<ResolvedCall>, BindError> {
        let Some((service_name, service_matches)) = matches.subcommand() else {
            return Ok(None);
        };
        let Some(service) = self.service(service_name) else {
            return Ok(None);
        };
        let Some((operation_name, operation_matches)) = service_matches.subcommand() else {
            return Ok(None);
        };
        let Some(operation) = service.operation(operation_name) else {
            return Ok(None);
        };
        let mut value = DynamicValue::new(&operation.definition.input());
        for flag in &operation.flags {
            bind_flag(&mut value, flag, operation_matches)?;
        }
        let json_data = operation_matches
            .get_many::<String>(JSON_DATA_FLAG)
            .map(|values| values.cloned().collect())
            .unwrap_or_default();
        Ok(Some(ResolvedCall {
            service: service.name().to_string(),
            operation: operation.definition.clone(),
            value,
            json_data,
            target: service.target.clone(),
        }))
    }
}

// ============================================================================
// SECTION: Flag Binding
// ============================================================================

/// Copies one flag's parsed values into `value`.
fn bind_flag(
    value: &mut DynamicValue,
    flag: &FlagSpec,
    matches: &ArgMatches,
) -> Result<(), BindError> {
    let Some(parsed) = matches.get_many::<FieldValue>(flag.name()) else {
        return Ok(());
    };
    let bound = match flag.field.cardinality() {
        Cardinality::Single => match parsed.last() {
            Some(last) => last.clone(),
            None => return Ok(()),
        },
        Cardinality::Repeated => FieldValue::List(parsed.cloned().collect()),
        Cardinality::Map => {
            let mut entries = BTreeMap::new();
            for item in parsed {
                if let FieldValue::Map(entry) = item {
                    entries.extend(entry.clone());
                }
            }
            FieldValue::Map(entries)
        }
    };
    value.set_value(flag.name(), bound)
}

/// Renders a template default as completion text.
fn hint_text(value: &FieldValue) -> String {
    match value.to_json() {
        Value::String(text) => text,
        other => other.to_string(),
    }
}

/// Clap value parser for one field.
#[derive(Debug, Clone)]
struct FieldParser {
    /// Field whose kind drives parsing.
    field: FieldDefinition,
}

impl TypedValueParser for FieldParser {
    type Value = FieldValue;

    fn parse_ref(
        &self,
        command: &Command,
        _arg: Option<&Arg>,
        value: &OsStr,
    ) -> Result<Self::Value, clap::Error> {
        let raw = value
            .to_str()
            .ok_or_else(|| clap::Error::new(ErrorKind::InvalidUtf8).with_cmd(command))?;
        parse_field_value(&self.field, raw).map_err(|err| {
            clap::Error::raw(ErrorKind::InvalidValue, format!("{err}\n")).with_cmd(command)
        })
    }
}
