//! Remote endpoint and Host header construction.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::net::IpAddr;

use url::Host;

use crate::error::{Error, Result};

// ============================================================================
// Endpoint
// ============================================================================

/// Host and port of the remote WebSocket service.
///
/// Validated on construction and immutable afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    /// DNS name or IP literal.
    host: String,
    /// TCP port.
    port: u16,
}

impl Endpoint {
    /// Creates an endpoint.
    ///
    /// IPv6 literals may be given with or without brackets.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the host is empty, contains
    /// whitespace or is not a valid domain name or IP literal, or the port
    /// is zero.
    pub fn new(host: impl Into<String>, port: u16) -> Result<Self> {
        let host = host.into();
        let host = host
            .strip_prefix('[')
            .and_then(|h| h.strip_suffix(']'))
            .map(str::to_owned)
            .unwrap_or(host);

        if host.is_empty() {
            return Err(Error::config("host must not be empty"));
        }
        if host.chars().any(char::is_whitespace) {
            return Err(Error::config(format!("host contains whitespace: {host:?}")));
        }
        if host.parse::<IpAddr>().is_err() {
            Host::parse(&host)
                .map_err(|e| Error::config(format!("invalid host {host:?}: {e}")))?;
        }
        if port == 0 {
            return Err(Error::config("port must be between 1 and 65535"));
        }

        Ok(Self { host, port })
    }

    /// Parses host and a textual port, as given on a command line.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the port is not a number in
    /// `1..=65535` or the host is invalid.
    pub fn parse(host: impl Into<String>, port: &str) -> Result<Self> {
        let port = port
            .trim()
            .parse::<u16>()
            .map_err(|_| Error::config(format!("invalid port {port:?}")))?;

        Self::new(host, port)
    }

    /// Returns the host without IPv6 brackets.
    #[inline]
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Returns the port.
    #[inline]
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// Returns `true` if the host is an IP literal rather than a name.
    #[inline]
    #[must_use]
    pub fn is_ip_literal(&self) -> bool {
        self.host.parse::<IpAddr>().is_ok()
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&build_host_header(&self.host, self.port))
    }
}

// ============================================================================
// Host Header
// ============================================================================

/// Builds the `Host` header value `host:port`.
///
/// The port is the one actually connected to, so virtual hosts behind
/// proxies route correctly (RFC 7230 section 5.4). IPv6 literals are
/// bracketed.
#[must_use]
pub fn build_host_header(host: &str, port: u16) -> String {
    if host.contains(':') && !host.starts_with('[') {
        format!("[{host}]:{port}")
    } else {
        format!("{host}:{port}")
    }
}

// ============================================================================
// Tests
// ============================================================================
