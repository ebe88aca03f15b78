//! Per-session options.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use wss_probe::SessionOptions;
//!
//! let options = SessionOptions::new()
//!     .path("/echo")
//!     .user_agent("probe/1.0")
//!     .step_timeout(Duration::from_secs(5));
//!
//! assert_eq!(options.target_path(), "/echo");
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tungstenite::http::uri::PathAndQuery;
use tungstenite::protocol::WebSocketConfig;
use tungstenite::protocol::frame::coding::CloseCode;

use crate::error::{Error, Result};

use super::decorator::{RequestDecorator, UserAgent};

// ============================================================================
// Constants
// ============================================================================

/// Default deadline for TLS handshake, WebSocket handshake and close.
pub const DEFAULT_STEP_TIMEOUT: Duration = Duration::from_secs(30);

/// Default limit on a reassembled message (16 MiB).
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 16 << 20;

// ============================================================================
// SessionOptions
// ============================================================================

/// Options shared by every step of a session.
#[derive(Clone)]
pub struct SessionOptions {
    /// Request target of the opening handshake.
    path: String,
    /// Request decorator.
    decorator: Arc<dyn RequestDecorator>,
    /// Deadline per bounded step, `None` waits forever.
    step_timeout: Option<Duration>,
    /// Largest accepted message in bytes.
    max_message_size: usize,
    /// Status code sent in the close frame.
    close_code: CloseCode,
}

impl fmt::Debug for SessionOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionOptions")
            .field("path", &self.path)
            .field("step_timeout", &self.step_timeout)
            .field("max_message_size", &self.max_message_size)
            .field("close_code", &self.close_code)
            .finish_non_exhaustive()
    }
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            path: "/".to_string(),
            decorator: Arc::new(UserAgent::default()),
            step_timeout: Some(DEFAULT_STEP_TIMEOUT),
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            close_code: CloseCode::Normal,
        }
    }
}

// ============================================================================
// Builder Methods
// ============================================================================

impl SessionOptions {
    /// Creates options with default settings.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the request target of the opening handshake.
    #[inline]
    #[must_use]
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Sets the `User-Agent` sent with the opening handshake.
    #[inline]
    #[must_use]
    pub fn user_agent(mut self, agent: &str) -> Self {
        self.decorator = Arc::new(UserAgent::new(agent));
        self
    }

    /// Replaces the request decorator.
    #[inline]
    #[must_use]
    pub fn decorator(mut self, decorator: impl RequestDecorator + 'static) -> Self {
        self.decorator = Arc::new(decorator);
        self
    }

    /// Sets the deadline for TLS handshake, WebSocket handshake and close.
    #[inline]
    #[must_use]
    pub fn step_timeout(mut self, timeout: Duration) -> Self {
        self.step_timeout = Some(timeout);
        self
    }

    /// Removes step deadlines; bounded steps may then wait forever.
    #[inline]
    #[must_use]
    pub fn without_step_timeout(mut self) -> Self {
        self.step_timeout = None;
        self
    }

    /// Sets the largest accepted message size.
    #[inline]
    #[must_use]
    pub fn max_message_size(mut self, bytes: usize) -> Self {
        self.max_message_size = bytes;
        self
    }

    /// Sets the status code sent when closing.
    #[inline]
    #[must_use]
    pub fn close_code(mut self, code: CloseCode) -> Self {
        self.close_code = code;
        self
    }

    /// Checks the options for consistency.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the path does not start with `/` or is
    /// not a valid request target, the deadline is zero, or the message
    /// limit is zero.
    pub fn validate(&self) -> Result<()> {
        if !self.path.starts_with('/') {
            return Err(Error::config(format!(
                "path must start with '/': {:?}",
                self.path
            )));
        }
        if let Err(e) = PathAndQuery::try_from(self.path.as_str()) {
            return Err(Error::config(format!(
                "path is not a valid request target: {:?} ({e})",
                self.path
            )));
        }
        if self.step_timeout.is_some_and(|t| t.is_zero()) {
            return Err(Error::config("step timeout must be greater than zero"));
        }
        if self.max_message_size == 0 {
            return Err(Error::config("max message size must be greater than zero"));
        }

        Ok(())
    }
}

// ============================================================================
// Accessors
// ============================================================================

impl SessionOptions {
    /// Returns the request target.
    #[inline]
    #[must_use]
    pub fn target_path(&self) -> &str {
        &self.path
    }

    /// Returns the request decorator.
    #[inline]
    #[must_use]
    pub fn request_decorator(&self) -> &dyn RequestDecorator {
        self.decorator.as_ref()
    }

    /// Returns the step deadline.
    #[inline]
    #[must_use]
    pub const fn deadline(&self) -> Option<Duration> {
        self.step_timeout
    }

    /// Returns the close status code.
    #[inline]
    #[must_use]
    pub const fn close_status(&self) -> CloseCode {
        self.close_code
    }

    /// Returns the framing configuration for the WebSocket layer.
    #[must_use]
    pub fn websocket_config(&self) -> WebSocketConfig {
        WebSocketConfig::default()
            .max_message_size(Some(self.max_message_size))
            .max_frame_size(Some(self.max_message_size))
    }
}

// ============================================================================
// Tests
// ============================================================================
