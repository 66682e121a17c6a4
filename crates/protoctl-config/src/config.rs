// crates/protoctl-config/src/config.rs
// ============================================================================
// Module: protoctl Configuration
// Description: Contexts, users, and bookmarked services persisted as YAML.
// Purpose: Supply default headers and service targets across invocations.
// Dependencies: base64, dirs, serde, serde_yaml, thiserror
// ============================================================================

//! ## Overview
//! The configuration file records:
//! - `contexts`: a named pairing of a user and an environment name.
//! - `users`: default request headers sent with every call.
//! - `services`: bookmarked services with their encoded descriptor set, method
//!   names, and the environments (addresses) they can be reached at.
//!
//! `current-context` selects which context's user headers and environment
//! apply. A missing file is created empty on first use.
//!
//! ## Invariants
//! - Names are non-empty and unique within each list.
//! - Saving replaces the file atomically.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::Path;
use std::path::PathBuf;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::fs_util::write_atomic;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Environment variable used to override the config path.
pub const CONFIG_ENV_VAR: &str = "PROTOCTL_CONFIG";
/// Config filename inside the home directory.
const DEFAULT_CONFIG_NAME: &str = ".protoctl.yaml";
/// Environment name used for services bookmarked from a live address.
pub const DEFAULT_ENVIRONMENT: &str = "default";
/// Maximum configuration file size in bytes. Descriptors make entries large.
pub const MAX_CONFIG_FILE_SIZE: usize = 16 * 1024 * 1024;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration errors.
///
/// # Invariants
/// - Variants are stable for CLI error mapping and tests.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// I/O failure while reading or writing configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// YAML parsing or rendering error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
    /// A named entry does not exist.
    #[error("{kind} not found: {name}")]
    NotFound {
        /// Entry kind (`context`, `user`, `service`).
        kind: &'static str,
        /// Requested name.
        name: String,
    },
    /// A named entry already exists.
    #[error("{kind} already exists: {name}")]
    AlreadyExists {
        /// Entry kind (`context`, `user`, `service`).
        kind: &'static str,
        /// Conflicting name.
        name: String,
    },
}

// ============================================================================
// SECTION: Entries
// ============================================================================

/// Pairs a user with an environment name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextEntry {
    /// Context name.
    pub name: String,
    /// User whose headers apply.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    /// Environment selected on every bookmarked service.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub env: Option<String>,
}

/// Default request headers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserEntry {
    /// User name.
    pub name: String,
    /// Headers sent with every call made under this user.
    pub headers: BTreeMap<String, String>,
}

/// Bookmarked method name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MethodEntry {
    /// Method name.
    pub name: String,
}

/// Address a bookmarked service is reachable at.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvironmentEntry {
    /// Environment name.
    pub name: String,
    /// Target address.
    pub addr: String,
    /// Disables TLS.
    pub plaintext: bool,
    /// Wire protocol name (`grpc`, `connect`, `grpcweb`); `grpc` when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
}

/// Bookmarked service with its schema.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceEntry {
    /// Service command name.
    pub name: String,
    /// Base64 encoded `FileDescriptorSet` containing the service.
    pub descriptor: String,
    /// Method names at bookmark time.
    pub methods: Vec<MethodEntry>,
    /// Reachable environments; the first is the fallback.
    pub environments: Vec<EnvironmentEntry>,
}

impl ServiceEntry {
    /// Builds a bookmark with a single `default` environment.
    #[must_use]
    pub fn bookmark(
        name: &str,
        descriptor: &[u8],
        methods: impl IntoIterator<Item = String>,
        addr: &str,
        plaintext: bool,
        protocol: Option<String>,
    ) -> Self {
        Self {
            name: name.to_string(),
            descriptor: BASE64.encode(descriptor),
            methods: methods.into_iter().map(|name| MethodEntry { name }).collect(),
            environments: vec![EnvironmentEntry {
                name: DEFAULT_ENVIRONMENT.to_string(),
                addr: addr.to_string(),
                plaintext,
                protocol,
            }],
        }
    }

    /// Decodes the stored descriptor set.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the descriptor is not base64.
    pub fn descriptor_bytes(&self) -> Result<Vec<u8>, ConfigError> {
        BASE64.decode(self.descriptor.trim()).map_err(|err| {
            ConfigError::Invalid(format!("service {} descriptor: {err}", self.name))
        })
    }
}

/// Resolved address of a bookmarked service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceTarget {
    /// Target address.
    pub address: String,
    /// Disables TLS.
    pub plaintext: bool,
    /// Wire protocol name, when configured.
    pub protocol: Option<String>,
}

// ============================================================================
// SECTION: Named Lists
// ============================================================================

/// Entry addressable by name within a config list.
trait Named {
    /// Entry kind used in error messages.
    const KIND: &'static str;

    /// Returns the entry name.
    fn name(&self) -> &str;
}

impl Named for ContextEntry {
    const KIND: &'static str = "context";

    fn name(&self) -> &str {
        &self.name
    }
}

impl Named for UserEntry {
    const KIND: &'static str = "user";

    fn name(&self) -> &str {
        &self.name
    }
}

impl Named for ServiceEntry {
    const KIND: &'static str = "service";

    fn name(&self) -> &str {
        &self.name
    }
}

/// Finds an entry by name.
fn find<'a, T: Named>(items: &'a [T], name: &str) -> Result<&'a T, ConfigError> {
    items.iter().find(|item| item.name() == name).ok_or_else(|| ConfigError::NotFound {
        kind: T::KIND,
        name: name.to_string(),
    })
}

/// Appends a new entry, rejecting empty or duplicate names.
fn insert<T: Named>(items: &mut Vec<T>, item: T) -> Result<(), ConfigError> {
    if item.name().trim().is_empty() {
        return Err(ConfigError::Invalid(format!("{} name must be non-empty", T::KIND)));
    }
    if items.iter().any(|existing| existing.name() == item.name()) {
        return Err(ConfigError::AlreadyExists {
            kind: T::KIND,
            name: item.name().to_string(),
        });
    }
    items.push(item);
    Ok(())
}

/// Replaces an existing entry with the same name.
fn replace<T: Named>(items: &mut [T], item: T) -> Result<(), ConfigError> {
    let slot = items.iter_mut().find(|existing| existing.name() == item.name()).ok_or_else(
        || ConfigError::NotFound {
            kind: T::KIND,
            name: item.name().to_string(),
        },
    )?;
    *slot = item;
    Ok(())
}

/// Removes an entry by name.
fn remove<T: Named>(items: &mut Vec<T>, name: &str) -> Result<T, ConfigError> {
    let index = items.iter().position(|item| item.name() == name).ok_or_else(|| {
        ConfigError::NotFound {
            kind: T::KIND,
            name: name.to_string(),
        }
    })?;
    Ok(items.remove(index))
}

/// Rejects empty and duplicate names in a loaded list.
fn validate_names<T: Named>(items: &[T]) -> Result<(), ConfigError> {
    for (index, item) in items.iter().enumerate() {
        if item.name().trim().is_empty() {
            return Err(ConfigError::Invalid(format!("{} name must be non-empty", T::KIND)));
        }
        if items[..index].iter().any(|earlier| earlier.name() == item.name()) {
            return Err(ConfigError::Invalid(format!(
                "duplicate {} name: {}",
                T::KIND,
                item.name()
            )));
        }
    }
    Ok(())
}

// ============================================================================
// SECTION: Config
// ============================================================================

/// Persisted CLI configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Config {
    /// Name of the active context.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_context: Option<String>,
    /// Known contexts.
    pub contexts: Vec<ContextEntry>,
    /// Known users.
    pub users: Vec<UserEntry>,
    /// Bookmarked services.
    pub services: Vec<ServiceEntry>,
}

impl Config {
    /// Parses configuration YAML. Blank input yields an empty config.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed YAML and
    /// [`ConfigError::Invalid`] when names are empty or duplicated.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self =
            serde_yaml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Renders the configuration as YAML.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when serialization fails.
    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        serde_yaml::to_string(self).map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when names are empty or duplicated.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_names(&self.contexts)?;
        validate_names(&self.users)?;
        validate_names(&self.services)?;
        for service in &self.services {
            if service.environments.iter().any(|environment| environment.addr.trim().is_empty()) {
                return Err(ConfigError::Invalid(format!(
                    "service {} has an environment without an address",
                    service.name
                )));
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Current context
    // ------------------------------------------------------------------------

    /// Returns the active context, when one is selected and defined.
    #[must_use]
    pub fn current_context(&self) -> Option<&ContextEntry> {
        let name = self.current_context.as_deref()?;
        self.contexts.iter().find(|context| context.name == name)
    }

    /// Selects the active context.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NotFound`] when the context is not defined.
    pub fn set_current_context(&mut self, name: &str) -> Result<(), ConfigError> {
        find(&self.contexts, name)?;
        self.current_context = Some(name.to_string());
        Ok(())
    }

    /// Returns the active user's default headers.
    ///
    /// No active context, or a context without a user, yields no headers.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NotFound`] when the context names a missing user.
    pub fn current_headers(&self) -> Result<Vec<(String, String)>, ConfigError> {
        let Some(user) = self.current_context().and_then(|context| context.user.as_deref())
        else {
            return Ok(Vec::new());
        };
        let user = find(&self.users, user)?;
        Ok(user.headers.iter().map(|(key, value)| (key.clone(), value.clone())).collect())
    }

    /// Resolves where a bookmarked service should be called.
    ///
    /// The environment named by the active context wins; otherwise the
    /// service's first environment is used.
    #[must_use]
    pub fn service_target(&self, service: &str) -> Option<ServiceTarget> {
        let entry = self.services.iter().find(|entry| entry.name == service)?;
        let selected = self
            .current_context()
            .and_then(|context| context.env.as_deref())
            .and_then(|env| entry.environments.iter().find(|environment| environment.name == env));
        let environment = selected.or_else(|| entry.environments.first())?;
        Some(ServiceTarget {
            address: environment.addr.clone(),
            plaintext: environment.plaintext,
            protocol: environment.protocol.clone(),
        })
    }

    // ------------------------------------------------------------------------
    // Contexts
    // ------------------------------------------------------------------------

    /// Looks up a context.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NotFound`] when the context is not defined.
    pub fn context(&self, name: &str) -> Result<&ContextEntry, ConfigError> {
        find(&self.contexts, name)
    }

    /// Adds a context.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::AlreadyExists`] for a duplicate name.
    pub fn add_context(&mut self, entry: ContextEntry) -> Result<(), ConfigError> {
        insert(&mut self.contexts, entry)
    }

    /// Replaces a context.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NotFound`] when the context is not defined.
    pub fn update_context(&mut self, entry: ContextEntry) -> Result<(), ConfigError> {
        replace(&mut self.contexts, entry)
    }

    /// Deletes a context, clearing the selection when it was active.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NotFound`] when the context is not defined.
    pub fn delete_context(&mut self, name: &str) -> Result<ContextEntry, ConfigError> {
        let removed = remove(&mut self.contexts, name)?;
        if self.current_context.as_deref() == Some(name) {
            self.current_context = None;
        }
        Ok(removed)
    }

    // ------------------------------------------------------------------------
    // Users
    // ------------------------------------------------------------------------

    /// Looks up a user.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NotFound`] when the user is not defined.
    pub fn user(&self, name: &str) -> Result<&UserEntry, ConfigError> {
        find(&self.users, name)
    }

    /// Adds a user.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::AlreadyExists`] for a duplicate name.
    pub fn add_user(&mut self, entry: UserEntry) -> Result<(), ConfigError> {
        insert(&mut self.users, entry)
    }

    /// Replaces a user.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NotFound`] when the user is not defined.
    pub fn update_user(&mut self, entry: UserEntry) -> Result<(), ConfigError> {
        replace(&mut self.users, entry)
    }

    /// Deletes a user.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NotFound`] when the user is not defined.
    pub fn delete_user(&mut self, name: &str) -> Result<UserEntry, ConfigError> {
        remove(&mut self.users, name)
    }

    // ------------------------------------------------------------------------
    // Services
    // ------------------------------------------------------------------------

    /// Looks up a bookmarked service.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NotFound`] when the service is not bookmarked.
    pub fn service(&self, name: &str) -> Result<&ServiceEntry, ConfigError> {
        find(&self.services, name)
    }

    /// Bookmarks a service.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::AlreadyExists`] for a duplicate name.
    pub fn add_service(&mut self, entry: ServiceEntry) -> Result<(), ConfigError> {
        insert(&mut self.services, entry)
    }

    /// Adds or replaces a bookmarked service.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for an empty name.
    pub fn upsert_service(&mut self, entry: ServiceEntry) -> Result<(), ConfigError> {
        if self.services.iter().any(|existing| existing.name == entry.name) {
            replace(&mut self.services, entry)
        } else {
            insert(&mut self.services, entry)
        }
    }

    /// Deletes a bookmarked service.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NotFound`] when the service is not bookmarked.
    pub fn delete_service(&mut self, name: &str) -> Result<ServiceEntry, ConfigError> {
        remove(&mut self.services, name)
    }
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// Configuration bound to the file it was loaded from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigStore {
    /// Backing file.
    path: PathBuf,
    /// Loaded configuration.
    config: Config,
}

impl ConfigStore {
    /// Loads configuration, creating an empty file when none exists.
    ///
    /// Path resolution: explicit path, then `PROTOCTL_CONFIG`, then
    /// `$HOME/.protoctl.yaml`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the file cannot be created, read, or parsed.
    pub fn open(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = resolve_path(path)?;
        if !path.exists() {
            let store = Self {
                path,
                config: Config::default(),
            };
            store.save()?;
            return Ok(store);
        }
        let bytes = fs::read(&path).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        let config = Config::from_yaml(content)?;
        Ok(Self {
            path,
            config,
        })
    }

    /// Writes the configuration back to its file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when rendering or writing fails.
    pub fn save(&self) -> Result<(), ConfigError> {
        let yaml = self.config.to_yaml()?;
        write_atomic(&self.path, yaml.as_bytes()).map_err(|err| ConfigError::Io(err.to_string()))
    }

    /// Returns the backing file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the configuration for mutation. Call [`Self::save`] to persist.
    pub const fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves the config path from CLI, environment, or home defaults.
fn resolve_path(path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = path {
        return Ok(path.to_path_buf());
    }
    if let Some(env_path) = env::var_os(CONFIG_ENV_VAR).filter(|value| !value.is_empty()) {
        return Ok(PathBuf::from(env_path));
    }
    dirs::home_dir()
        .map(|home| home.join(DEFAULT_CONFIG_NAME))
        .ok_or_else(|| ConfigError::Invalid("no home directory for config file".to_string()))
}
