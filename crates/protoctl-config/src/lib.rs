// crates/protoctl-config/src/lib.rs
// ============================================================================
// Module: protoctl Config Library
// Description: Persisted CLI configuration and the reflection schema cache.
// Purpose: Load, mutate, and atomically save YAML state under the user's home.
// Dependencies: serde, serde_yaml, time
// ============================================================================

//! ## Overview
//! Two YAML documents live here:
//! - [`Config`]: contexts, users with default headers, and bookmarked services
//!   with their environments. Stored at `$HOME/.protoctl.yaml` by default.
//! - [`SchemaCache`]: encoded descriptor sets keyed by target address with an
//!   expiry. Stored at `$HOME/.protoctl/cache.yaml` by default.
//!
//! Both are written to a temporary sibling file and renamed into place.

pub mod cache;
pub mod config;
mod fs_util;

pub use cache::CACHE_TTL;
pub use cache::CacheEntry;
pub use cache::CacheError;
pub use cache::SchemaCache;
pub use config::CONFIG_ENV_VAR;
pub use config::Config;
pub use config::ConfigError;
pub use config::ConfigStore;
pub use config::DEFAULT_ENVIRONMENT;
pub use config::ContextEntry;
pub use config::EnvironmentEntry;
pub use config::MethodEntry;
pub use config::ServiceEntry;
pub use config::ServiceTarget;
pub use config::UserEntry;
