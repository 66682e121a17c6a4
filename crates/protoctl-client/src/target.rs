// crates/protoctl-client/src/target.rs
// ============================================================================
// Module: Call Target
// Description: Address, wire protocol, and transport security of a call.
// Purpose: Resolve one target description for discovery and invocation.
// Dependencies: std
// ============================================================================

//! ## Overview
//! Addresses may be bare (`localhost:8080`) or carry a scheme. An `http://`
//! scheme implies plaintext; bare addresses use TLS unless plaintext is set.

use std::fmt;
use std::str::FromStr;

/// Wire protocol used for invocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Protocol {
    /// gRPC over HTTP/2.
    #[default]
    Grpc,
    /// Connect protocol.
    Connect,
    /// gRPC-Web.
    GrpcWeb,
}

impl Protocol {
    /// Returns the command-line spelling.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Grpc => "grpc",
            Self::Connect => "connect",
            Self::GrpcWeb => "grpcweb",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Protocol {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "grpc" => Ok(Self::Grpc),
            "connect" => Ok(Self::Connect),
            "grpcweb" | "grpc-web" => Ok(Self::GrpcWeb),
            other => {
                Err(format!("unknown protocol '{other}' (expected grpc, connect, or grpcweb)"))
            }
        }
    }
}

/// Where and how a call is made.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallTarget {
    /// Address as supplied.
    address: String,
    /// Wire protocol.
    protocol: Protocol,
    /// Disables TLS.
    plaintext: bool,
}

impl CallTarget {
    /// Creates a target. An `http://` address forces plaintext.
    #[must_use]
    pub fn new(address: impl Into<String>, protocol: Protocol, plaintext: bool) -> Self {
        let address = address.into();
        let plaintext = plaintext || address.starts_with("http://");
        Self {
            address,
            protocol,
            plaintext,
        }
    }

    /// Returns the address as supplied; also the schema cache key.
    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Returns the wire protocol.
    #[must_use]
    pub const fn protocol(&self) -> Protocol {
        self.protocol
    }

    /// Returns true when TLS is disabled.
    #[must_use]
    pub const fn plaintext(&self) -> bool {
        self.plaintext
    }

    /// Returns the address as a URL with scheme and no trailing slash.
    #[must_use]
    pub fn base_url(&self) -> String {
        let trimmed = self.address.trim_end_matches('/');
        if trimmed.contains("://") {
            return trimmed.to_string();
        }
        let scheme = if self.plaintext { "http" } else { "https" };
        format!("{scheme}://{trimmed}")
    }

    /// Returns the URL of an RPC path such as `/pkg.Service/Method`.
    #[must_use]
    pub fn method_url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url())
    }
}
