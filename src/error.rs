//! Error types for wss-probe.
//!
//! This module defines all error types used throughout the crate.
//! Every session step has its own variant, so a failed run can always be
//! traced back to the step that produced it.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use wss_probe::{Error, Result};
//!
//! async fn example(session: &mut Session<Suspendable>) -> Result<()> {
//!     let candidates = session.resolve().await?;
//!     session.connect(&candidates).await?;
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Process | [`Error::Config`], [`Error::TrustStore`], [`Error::Io`] |
//! | Lifecycle | [`Error::InvalidState`] |
//! | Transport | [`Error::Resolution`], [`Error::Connect`] |
//! | TLS | [`Error::TlsSetup`], [`Error::TlsHandshake`] |
//! | WebSocket | [`Error::Handshake`], [`Error::Write`], [`Error::Read`], [`Error::Close`] |

// ============================================================================
// Imports
// ============================================================================

use std::io::Error as IoError;
use std::result::Result as StdResult;
use std::time::Duration;

use thiserror::Error;
use tungstenite::http::StatusCode;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
///
/// Step variants carry a human readable message; the ones that can be
/// caused by a deadline also record whether they timed out.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Process Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned when a builder is given invalid settings.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    /// Trust store could not be loaded.
    ///
    /// Fatal to the process: no session is started without roots.
    #[error("Trust store error: {message}")]
    TrustStore {
        /// Description of the failure.
        message: String,
    },

    /// IO error outside of a session step.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    // ========================================================================
    // Lifecycle Errors
    // ========================================================================
    /// Step invoked out of order or after the session terminated.
    #[error("Cannot {operation} while session is {state}")]
    InvalidState {
        /// Step that was attempted.
        operation: &'static str,
        /// State the session was in.
        state: String,
    },

    // ========================================================================
    // Transport Errors
    // ========================================================================
    /// Host name could not be resolved.
    #[error("Failed to resolve {host}: {message}")]
    Resolution {
        /// Host that was looked up.
        host: String,
        /// Resolver message.
        message: String,
    },

    /// Every candidate address refused or failed the TCP connect.
    #[error("Failed to connect to {host}: {message}")]
    Connect {
        /// Host the candidates belong to.
        host: String,
        /// Error of the last attempted candidate.
        message: String,
    },

    // ========================================================================
    // TLS Errors
    // ========================================================================
    /// The TLS engine rejected the server name.
    #[error("Failed to set SNI hostname {host}: {message}")]
    TlsSetup {
        /// Rejected host name.
        host: String,
        /// Engine message.
        message: String,
    },

    /// TLS client handshake failed.
    #[error("TLS handshake failed: {message}")]
    TlsHandshake {
        /// Engine message (certificate, protocol, ...).
        message: String,
        /// `true` when the step deadline elapsed.
        timed_out: bool,
    },

    // ========================================================================
    // WebSocket Errors
    // ========================================================================
    /// WebSocket opening handshake failed.
    ///
    /// Carries the peer's HTTP status when a response was received.
    #[error("WebSocket handshake failed: {message}")]
    Handshake {
        /// Status of the peer response, if one arrived.
        status: Option<StatusCode>,
        /// Description of the failure.
        message: String,
        /// `true` when the step deadline elapsed.
        timed_out: bool,
    },

    /// Message could not be written.
    #[error("Write failed: {message}")]
    Write {
        /// Description of the failure.
        message: String,
    },

    /// Message could not be read.
    #[error("Read failed: {message}")]
    Read {
        /// Description of the failure.
        message: String,
    },

    /// Close handshake did not complete.
    ///
    /// The transport is released regardless.
    #[error("Close failed: {message}")]
    Close {
        /// Description of the failure.
        message: String,
        /// `true` when the peer did not acknowledge within the deadline.
        timed_out: bool,
    },
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a trust store error.
    #[inline]
    pub fn trust_store(message: impl Into<String>) -> Self {
        Self::TrustStore {
            message: message.into(),
        }
    }

    /// Creates an invalid state error.
    #[inline]
    pub fn invalid_state(operation: &'static str, state: impl ToString) -> Self {
        Self::InvalidState {
            operation,
            state: state.to_string(),
        }
    }

    /// Creates a resolution error.
    #[inline]
    pub fn resolution(host: impl Into<String>, message: impl ToString) -> Self {
        Self::Resolution {
            host: host.into(),
            message: message.to_string(),
        }
    }

    /// Creates a connect error.
    #[inline]
    pub fn connect(host: impl Into<String>, message: impl ToString) -> Self {
        Self::Connect {
            host: host.into(),
            message: message.to_string(),
        }
    }

    /// Creates a TLS setup error.
    #[inline]
    pub fn tls_setup(host: impl Into<String>, message: impl ToString) -> Self {
        Self::TlsSetup {
            host: host.into(),
            message: message.to_string(),
        }
    }

    /// Creates a TLS handshake error.
    #[inline]
    pub fn tls_handshake(message: impl ToString) -> Self {
        Self::TlsHandshake {
            message: message.to_string(),
            timed_out: false,
        }
    }

    /// Creates a WebSocket handshake error.
    #[inline]
    pub fn handshake(status: Option<StatusCode>, message: impl ToString) -> Self {
        Self::Handshake {
            status,
            message: message.to_string(),
            timed_out: false,
        }
    }

    /// Creates a write error.
    #[inline]
    pub fn write(message: impl ToString) -> Self {
        Self::Write {
            message: message.to_string(),
        }
    }

    /// Creates a read error.
    #[inline]
    pub fn read(message: impl ToString) -> Self {
        Self::Read {
            message: message.to_string(),
        }
    }

    /// Creates a close error.
    #[inline]
    pub fn close(message: impl ToString) -> Self {
        Self::Close {
            message: message.to_string(),
            timed_out: false,
        }
    }

    /// Creates a TLS handshake timeout.
    #[inline]
    pub fn tls_handshake_timeout(deadline: Duration) -> Self {
        Self::TlsHandshake {
            message: timeout_message(deadline),
            timed_out: true,
        }
    }

    /// Creates a WebSocket handshake timeout.
    #[inline]
    pub fn handshake_timeout(deadline: Duration) -> Self {
        Self::Handshake {
            status: None,
            message: timeout_message(deadline),
            timed_out: true,
        }
    }

    /// Creates a close timeout (peer never acknowledged).
    #[inline]
    pub fn close_timeout(deadline: Duration) -> Self {
        Self::Close {
            message: format!("peer did not acknowledge close: {}", timeout_message(deadline)),
            timed_out: true,
        }
    }
}

fn timeout_message(deadline: Duration) -> String {
    format!("timed out after {}ms", deadline.as_millis())
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if a step deadline elapsed.
    #[inline]
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Self::TlsHandshake {
                timed_out: true,
                ..
            } | Self::Handshake {
                timed_out: true,
                ..
            } | Self::Close {
                timed_out: true,
                ..
            }
        )
    }

    /// Returns `true` if this is a WebSocket opening handshake error.
    #[inline]
    #[must_use]
    pub fn is_handshake_error(&self) -> bool {
        matches!(self, Self::Handshake { .. })
    }

    /// Returns `true` if the error happened before the WebSocket was open.
    #[inline]
    #[must_use]
    pub fn is_transport_error(&self) -> bool {
        matches!(
            self,
            Self::Resolution { .. }
                | Self::Connect { .. }
                | Self::TlsSetup { .. }
                | Self::TlsHandshake { .. }
        )
    }

    /// Returns the peer's HTTP status for a rejected opening handshake.
    #[inline]
    #[must_use]
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Handshake { status, .. } => *status,
            _ => None,
        }
    }

    /// Short name of the error kind, used in log records.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Config { .. } => "ConfigError",
            Self::TrustStore { .. } => "TrustStoreError",
            Self::Io(_) => "IoError",
            Self::InvalidState { .. } => "InvalidStateError",
            Self::Resolution { .. } => "ResolutionError",
            Self::Connect { .. } => "ConnectError",
            Self::TlsSetup { .. } => "TlsSetupError",
            Self::TlsHandshake { .. } => "TlsHandshakeError",
            Self::Handshake { .. } => "HandshakeError",
            Self::Write { .. } => "WriteError",
            Self::Read { .. } => "ReadError",
            Self::Close { .. } => "CloseError",
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
