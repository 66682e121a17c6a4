// crates/protoctl-client/src/headers.rs
// ============================================================================
// Module: Outgoing Headers
// Description: Ordered request headers and their wire conversions.
// Purpose: Carry config and flag headers onto gRPC metadata or HTTP headers.
// Dependencies: base64, reqwest, tonic
// ============================================================================

//! ## Overview
//! [`Headers`] keeps `(key, value)` pairs in insertion order. Keys are
//! lower-cased; repeated keys are sent as repeated headers. Keys ending in
//! `-bin` travel as binary gRPC metadata, and as unpadded base64 values on
//! Connect and gRPC-Web requests.
//!
//! Header values are never logged.

use base64::Engine;
use base64::engine::general_purpose::STANDARD_NO_PAD as BASE64;
use reqwest::header::HeaderMap;
use reqwest::header::HeaderName;
use reqwest::header::HeaderValue;
use tonic::metadata::AsciiMetadataKey;
use tonic::metadata::AsciiMetadataValue;
use tonic::metadata::BinaryMetadataKey;
use tonic::metadata::BinaryMetadataValue;
use tonic::metadata::MetadataMap;

use crate::error::HeaderError;

/// Key suffix marking binary header values.
const BINARY_SUFFIX: &str = "-bin";

/// Ordered outgoing request headers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    /// Pairs in insertion order.
    entries: Vec<(String, String)>,
}

impl Headers {
    /// Creates an empty header list.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Builds headers from pairs.
    #[must_use]
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let mut headers = Self::new();
        for (key, value) in pairs {
            headers.push(key, value);
        }
        headers
    }

    /// Parses a `key: value` flag value.
    ///
    /// # Errors
    ///
    /// Returns [`HeaderError::Malformed`] when the colon or key is missing.
    pub fn parse(raw: &str) -> Result<(String, String), HeaderError> {
        let (key, value) =
            raw.split_once(':').ok_or_else(|| HeaderError::Malformed(raw.to_string()))?;
        let key = key.trim();
        if key.is_empty() {
            return Err(HeaderError::Malformed(raw.to_string()));
        }
        Ok((key.to_ascii_lowercase(), value.trim().to_string()))
    }

    /// Appends a header.
    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.push((key.into().to_ascii_lowercase(), value.into()));
    }

    /// Appends every pair from `other`.
    pub fn extend(&mut self, other: &Self) {
        self.entries.extend(other.entries.iter().cloned());
    }

    /// Returns all values sent for `key`.
    pub fn get_all<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.entries.iter().filter(move |(name, _)| name == key).map(|(_, value)| value.as_str())
    }

    /// Iterates over pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(key, value)| (key.as_str(), value.as_str()))
    }

    /// Returns the number of pairs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true when there are no headers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the header names, for logging.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|(key, _)| key.as_str()).collect()
    }

    /// Converts to gRPC metadata.
    ///
    /// # Errors
    ///
    /// Returns [`HeaderError`] when a key or value is not valid metadata.
    pub fn to_metadata(&self) -> Result<MetadataMap, HeaderError> {
        let mut metadata = MetadataMap::new();
        for (key, value) in &self.entries {
            if key.ends_with(BINARY_SUFFIX) {
                let name = BinaryMetadataKey::from_bytes(key.as_bytes())
                    .map_err(|_| HeaderError::InvalidName(key.clone()))?;
                metadata.append_bin(name, BinaryMetadataValue::from_bytes(value.as_bytes()));
            } else {
                let name = AsciiMetadataKey::from_bytes(key.as_bytes())
                    .map_err(|_| HeaderError::InvalidName(key.clone()))?;
                let value = AsciiMetadataValue::try_from(value.as_str())
                    .map_err(|_| HeaderError::InvalidValue(key.clone()))?;
                metadata.append(name, value);
            }
        }
        Ok(metadata)
    }

    /// Converts to an HTTP header map. Binary values are base64 encoded.
    ///
    /// # Errors
    ///
    /// Returns [`HeaderError`] when a key or value is not a valid header.
    pub fn to_header_map(&self) -> Result<HeaderMap, HeaderError> {
        let mut map = HeaderMap::new();
        for (key, value) in &self.entries {
            let name = HeaderName::from_bytes(key.as_bytes())
                .map_err(|_| HeaderError::InvalidName(key.clone()))?;
            let value = if key.ends_with(BINARY_SUFFIX) {
                HeaderValue::from_str(&BASE64.encode(value.as_bytes()))
            } else {
                HeaderValue::from_str(value)
            }
            .map_err(|_| HeaderError::InvalidValue(key.clone()))?;
            map.append(name, value);
        }
        Ok(map)
    }
}
