//! Builder pattern for driver configuration.
//!
//! Provides a fluent API for configuring and creating [`Driver`] instances.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use wss_probe::{Driver, SessionOptions};
//!
//! # fn example() -> wss_probe::Result<()> {
//! let driver = Driver::builder()
//!     .host("echo.websocket.org")
//!     .port(443)
//!     .text("Hello, world!")
//!     .options(SessionOptions::new().step_timeout(Duration::from_secs(10)))
//!     .build()?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use crate::console::Console;
use crate::error::{Error, Result};
use crate::session::{Endpoint, SessionOptions};
use crate::trust::TrustStore;

use super::core::Driver;

// ============================================================================
// DriverBuilder
// ============================================================================

/// Builder for configuring a [`Driver`] instance.
///
/// Use [`Driver::builder()`] to create a new builder.
#[derive(Default)]
pub struct DriverBuilder {
    /// Remote host.
    host: Option<String>,
    /// Remote port.
    port: Option<u16>,
    /// Text to send.
    text: String,
    /// Session options.
    options: SessionOptions,
    /// Roots; bundled web PKI roots when unset.
    trust_store: Option<TrustStore>,
    /// Output sink; stdout when unset.
    console: Option<Console>,
}

impl fmt::Debug for DriverBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DriverBuilder")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("text", &self.text)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// DriverBuilder Implementation
// ============================================================================

impl DriverBuilder {
    /// Creates a new driver builder with no configuration.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the remote host.
    #[inline]
    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Sets the remote port.
    #[inline]
    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Sets the text each session sends.
    #[inline]
    #[must_use]
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    /// Sets the session options.
    #[inline]
    #[must_use]
    pub fn options(mut self, options: SessionOptions) -> Self {
        self.options = options;
        self
    }

    /// Sets the trust store.
    #[inline]
    #[must_use]
    pub fn trust_store(mut self, trust_store: TrustStore) -> Self {
        self.trust_store = Some(trust_store);
        self
    }

    /// Sets the console sink.
    #[inline]
    #[must_use]
    pub fn console(mut self, console: Console) -> Self {
        self.console = Some(console);
        self
    }

    /// Builds the driver with validation.
    ///
    /// Loads the bundled roots if no trust store was set.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if host or port is missing or invalid, or the
    ///   options are inconsistent
    /// - [`Error::TrustStore`] if the default roots cannot be loaded
    pub fn build(self) -> Result<Driver> {
        let endpoint = self.validate_endpoint()?;
        self.options.validate()?;

        let trust_store = match self.trust_store {
            Some(store) => store,
            None => TrustStore::load()?,
        };
        let console = self.console.unwrap_or_else(Console::stdout);

        Ok(Driver::new(
            endpoint,
            self.text,
            self.options,
            Arc::new(trust_store),
            Arc::new(console),
        ))
    }
}

// ============================================================================
// Validation
// ============================================================================

impl DriverBuilder {
    /// Validates host and port.
    fn validate_endpoint(&self) -> Result<Endpoint> {
        let host = self.host.clone().ok_or_else(|| {
            Error::config(
                "Host is required. Use .host() to set it.\n\
                 Example: Driver::builder().host(\"echo.websocket.org\")",
            )
        })?;

        let port = self.port.ok_or_else(|| {
            Error::config(
                "Port is required. Use .port() to set it.\n\
                 Example: Driver::builder().port(443)",
            )
        })?;

        Endpoint::new(host, port)
    }
}

// ============================================================================
// Tests
// ============================================================================
