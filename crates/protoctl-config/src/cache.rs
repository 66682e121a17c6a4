// crates/protoctl-config/src/cache.rs
// ============================================================================
// Module: Schema Cache
// Description: Time-limited store of reflected descriptor sets by address.
// Purpose: Skip reflection round trips for recently discovered targets.
// Dependencies: base64, dirs, serde, serde_yaml, time, tracing
// ============================================================================

//! ## Overview
//! The cache file maps a target address to its encoded `FileDescriptorSet`
//! (base64) and an RFC 3339 expiry:
//!
//! ```yaml
//! entries:
//!   localhost:8080:
//!     descriptor: CgdhcGku...
//!     expires_at: 2026-01-01T00:15:00Z
//! ```
//!
//! ## Invariants
//! - Loading drops expired entries and rewrites the file without them.
//! - An entry is returned only while `now < expires_at`.
//! - Writes replace the file atomically.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::path::PathBuf;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;
use time::Duration;
use time::OffsetDateTime;
use tracing::debug;

use crate::fs_util::write_atomic;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Lifetime of a cache entry.
pub const CACHE_TTL: Duration = Duration::minutes(15);
/// Cache directory inside the home directory.
const CACHE_DIR_NAME: &str = ".protoctl";
/// Cache filename inside the cache directory.
const CACHE_FILE_NAME: &str = "cache.yaml";

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Schema cache errors.
///
/// # Invariants
/// - Variants are stable for logging and tests.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CacheError {
    /// I/O failure while reading or writing the cache file.
    #[error("cache io error: {0}")]
    Io(String),
    /// YAML parsing or rendering error.
    #[error("cache parse error: {0}")]
    Parse(String),
    /// Stored descriptor is not valid base64.
    #[error("cache entry for {address} is not valid base64: {reason}")]
    Encoding {
        /// Target address of the entry.
        address: String,
        /// Decoder failure detail.
        reason: String,
    },
}

// ============================================================================
// SECTION: Types
// ============================================================================

/// Cached schema for one target address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Base64 encoded `FileDescriptorSet`.
    pub descriptor: String,
    /// Instant after which the entry is ignored.
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
}

impl CacheEntry {
    /// Returns true once `now` reaches the expiry.
    #[must_use]
    pub fn is_expired(&self, now: OffsetDateTime) -> bool {
        now >= self.expires_at
    }
}

/// On-disk document shape.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct CacheDocument {
    /// Entries keyed by target address.
    entries: BTreeMap<String, CacheEntry>,
}

/// Schema cache bound to its backing file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaCache {
    /// Backing file.
    path: PathBuf,
    /// Unexpired entries as of the last load.
    entries: BTreeMap<String, CacheEntry>,
}

impl SchemaCache {
    /// Returns `$HOME/.protoctl/cache.yaml`, when a home directory exists.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(CACHE_DIR_NAME).join(CACHE_FILE_NAME))
    }

    /// Loads the cache at the current time.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] when the file cannot be read, parsed, or pruned.
    pub fn load(path: &Path) -> Result<Self, CacheError> {
        Self::load_at(path, OffsetDateTime::now_utc())
    }

    /// Loads the cache, pruning entries expired at `now`.
    ///
    /// A missing file yields an empty cache. When anything was pruned the
    /// file is rewritten without the expired entries.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] when the file cannot be read, parsed, or pruned.
    pub fn load_at(path: &Path, now: OffsetDateTime) -> Result<Self, CacheError> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) if err.kind() == ErrorKind::NotFound => String::new(),
            Err(err) => return Err(CacheError::Io(err.to_string())),
        };
        let document: CacheDocument = if content.trim().is_empty() {
            CacheDocument::default()
        } else {
            serde_yaml::from_str(&content).map_err(|err| CacheError::Parse(err.to_string()))?
        };
        let total = document.entries.len();
        let entries: BTreeMap<String, CacheEntry> =
            document.entries.into_iter().filter(|(_, entry)| !entry.is_expired(now)).collect();
        let cache = Self {
            path: path.to_path_buf(),
            entries,
        };
        let pruned = total - cache.entries.len();
        if pruned > 0 {
            debug!(pruned, path = %path.display(), "pruned expired schema cache entries");
            cache.save()?;
        }
        Ok(cache)
    }

    /// Returns the backing file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the loaded entries.
    #[must_use]
    pub const fn entries(&self) -> &BTreeMap<String, CacheEntry> {
        &self.entries
    }

    /// Returns the cached descriptor set for `address` at the current time.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Encoding`] when the entry is corrupt.
    pub fn get(&self, address: &str) -> Result<Option<Vec<u8>>, CacheError> {
        self.get_at(address, OffsetDateTime::now_utc())
    }

    /// Returns the cached descriptor set for `address` when unexpired at `now`.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Encoding`] when the entry is corrupt.
    pub fn get_at(
        &self,
        address: &str,
        now: OffsetDateTime,
    ) -> Result<Option<Vec<u8>>, CacheError> {
        let Some(entry) = self.entries.get(address).filter(|entry| !entry.is_expired(now)) else {
            return Ok(None);
        };
        BASE64.decode(entry.descriptor.trim()).map(Some).map_err(|err| CacheError::Encoding {
            address: address.to_string(),
            reason: err.to_string(),
        })
    }

    /// Stores `descriptor` for `address` starting now and saves the file.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] when the file cannot be written.
    pub fn put(&mut self, address: &str, descriptor: &[u8]) -> Result<(), CacheError> {
        self.put_at(address, descriptor, OffsetDateTime::now_utc())
    }

    /// Stores `descriptor` for `address`, expiring [`CACHE_TTL`] after `now`,
    /// and saves the file.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] when the file cannot be written.
    pub fn put_at(
        &mut self,
        address: &str,
        descriptor: &[u8],
        now: OffsetDateTime,
    ) -> Result<(), CacheError> {
        self.entries.insert(
            address.to_string(),
            CacheEntry {
                descriptor: BASE64.encode(descriptor),
                expires_at: now + CACHE_TTL,
            },
        );
        self.save()
    }

    /// Writes the entries back to the backing file.
    fn save(&self) -> Result<(), CacheError> {
        let document = CacheDocument {
            entries: self.entries.clone(),
        };
        let yaml =
            serde_yaml::to_string(&document).map_err(|err| CacheError::Parse(err.to_string()))?;
        write_atomic(&self.path, yaml.as_bytes()).map_err(|err| CacheError::Io(err.to_string()))
    }
}
