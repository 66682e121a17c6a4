// crates/protoctl-client/src/discovery.rs
// ============================================================================
// Module: Schema Discovery
// Description: Static and reflection-backed schema sources.
// Purpose: Produce a complete schema model for a target or fail cleanly.
// Dependencies: async-trait, protoctl-config, protoctl-schema, tokio, tracing
// ============================================================================

//! ## Overview
//! [`SchemaSource`] is the seam between the command tree and where a schema
//! comes from:
//! - [`StaticSchemaSource`] serves a schema supplied up front.
//! - [`ReflectionSchemaSource`] queries server reflection, consulting and
//!   refreshing the on-disk schema cache around the session.
//!
//! ## Invariants
//! - Reflection (connect plus every round trip) is bounded by one deadline.
//! - Cache failures are logged and never fail discovery.
//! - No partial schema is returned.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use protoctl_config::SchemaCache;
use protoctl_schema::SchemaModel;
use tracing::debug;
use tracing::warn;

use crate::error::DiscoveryError;
use crate::headers::Headers;
use crate::reflection::fetch_files;
use crate::target::CallTarget;
use crate::transport::grpc::connect_channel;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default bound on a reflection session.
pub const DEFAULT_DISCOVERY_DEADLINE: Duration = Duration::from_secs(3);

// ============================================================================
// SECTION: Trait
// ============================================================================

/// Source of a schema model.
#[async_trait]
pub trait SchemaSource: Send + Sync {
    /// Loads the schema.
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError`] when no complete schema can be produced.
    async fn load(&self) -> Result<SchemaModel, DiscoveryError>;
}

// ============================================================================
// SECTION: Static Source
// ============================================================================

/// Schema supplied up front.
#[derive(Debug, Clone)]
pub struct StaticSchemaSource {
    /// Served model.
    model: SchemaModel,
}

impl StaticSchemaSource {
    /// Wraps an existing model.
    #[must_use]
    pub const fn new(model: SchemaModel) -> Self {
        Self {
            model,
        }
    }

    /// Decodes an encoded `FileDescriptorSet`.
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError::Schema`] when the bytes do not form a schema.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DiscoveryError> {
        Ok(Self::new(SchemaModel::from_file_descriptor_set(bytes)?))
    }
}

#[async_trait]
impl SchemaSource for StaticSchemaSource {
    async fn load(&self) -> Result<SchemaModel, DiscoveryError> {
        Ok(self.model.clone())
    }
}

// ============================================================================
// SECTION: Reflection Source
// ============================================================================

/// Schema discovered through server reflection.
#[derive(Debug, Clone)]
pub struct ReflectionSchemaSource {
    /// Server to reflect.
    target: CallTarget,
    /// Headers sent on the reflection stream.
    headers: Headers,
    /// Bound on the whole session.
    deadline: Duration,
    /// Schema cache file, when caching is enabled.
    cache_path: Option<PathBuf>,
}

impl ReflectionSchemaSource {
    /// Creates an uncached source with the default deadline.
    #[must_use]
    pub const fn new(target: CallTarget, headers: Headers) -> Self {
        Self {
            target,
            headers,
            deadline: DEFAULT_DISCOVERY_DEADLINE,
            cache_path: None,
        }
    }

    /// Overrides the session deadline.
    #[must_use]
    pub const fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    /// Enables the schema cache at `path`.
    #[must_use]
    pub fn with_cache(mut self, path: impl Into<PathBuf>) -> Self {
        self.cache_path = Some(path.into());
        self
    }

    /// Returns the reflected target.
    #[must_use]
    pub const fn target(&self) -> &CallTarget {
        &self.target
    }

    /// Runs one reflection session without the deadline.
    async fn reflect(&self) -> Result<SchemaModel, DiscoveryError> {
        let channel =
            connect_channel(&self.target).await.map_err(|reason| DiscoveryError::Connect {
                address: self.target.address().to_string(),
                reason,
            })?;
        let files = fetch_files(channel, &self.headers).await?;
        Ok(SchemaModel::from_file_descriptor_protos(files)?)
    }

    /// Returns an unexpired cached schema, if any.
    fn cached(&self) -> Option<SchemaModel> {
        let path = self.cache_path.as_deref()?;
        let address = self.target.address();
        let cache = SchemaCache::load(path)
            .inspect_err(|err| warn!(error = %err, "schema cache unreadable"))
            .ok()?;
        let bytes = cache
            .get(address)
            .inspect_err(|err| warn!(error = %err, "schema cache entry unreadable"))
            .ok()??;
        let model = SchemaModel::from_file_descriptor_set(&bytes)
            .inspect_err(|err| warn!(error = %err, "cached schema is invalid"))
            .ok()?;
        debug!(address, "using cached schema");
        Some(model)
    }

    /// Stores a freshly reflected schema.
    fn store(&self, model: &SchemaModel) {
        let Some(path) = self.cache_path.as_deref() else {
            return;
        };
        let stored = SchemaCache::load(path)
            .and_then(|mut cache| cache.put(self.target.address(), &model.encode()));
        if let Err(err) = stored {
            warn!(error = %err, "schema cache not updated");
        }
    }
}

#[async_trait]
impl SchemaSource for ReflectionSchemaSource {
    async fn load(&self) -> Result<SchemaModel, DiscoveryError> {
        if let Some(model) = self.cached() {
            return Ok(model);
        }
        debug!(address = self.target.address(), "reflecting schema");
        let model = tokio::time::timeout(self.deadline, self.reflect())
            .await
            .map_err(|_| DiscoveryError::timeout(self.deadline))??;
        self.store(&model);
        Ok(model)
    }
}
