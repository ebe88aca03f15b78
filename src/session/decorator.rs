//! Opening handshake request decorators.
//!
//! A decorator is a pure `Request -> Request` transform applied right
//! before the upgrade request is sent. It must not block or fail.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use tungstenite::handshake::client::Request;
use tungstenite::http::HeaderValue;
use tungstenite::http::header::USER_AGENT;

// ============================================================================
// Constants
// ============================================================================

/// User agent sent when none is configured.
pub const DEFAULT_USER_AGENT: &str = concat!(
    env!("CARGO_PKG_NAME"),
    "/",
    env!("CARGO_PKG_VERSION"),
    " websocket-client-coro"
);

// ============================================================================
// RequestDecorator
// ============================================================================

/// Transform applied to the opening handshake request.
pub trait RequestDecorator: Send + Sync {
    /// Returns the decorated request.
    fn transform(&self, request: Request) -> Request;
}

// ============================================================================
// UserAgent
// ============================================================================

/// Sets the `User-Agent` header, replacing any previous value.
#[derive(Clone, PartialEq, Eq)]
pub struct UserAgent {
    value: HeaderValue,
}

impl UserAgent {
    /// Creates a decorator for `agent`.
    ///
    /// Characters not allowed in a header value are dropped.
    #[must_use]
    pub fn new(agent: &str) -> Self {
        let value = HeaderValue::from_str(agent).unwrap_or_else(|_| {
            let cleaned: String = agent
                .chars()
                .filter(|c| c.is_ascii() && (*c == '\t' || !c.is_ascii_control()))
                .collect();
            HeaderValue::from_str(&cleaned)
                .unwrap_or_else(|_| HeaderValue::from_static(DEFAULT_USER_AGENT))
        });

        Self { value }
    }

    /// Returns the header value.
    #[inline]
    #[must_use]
    pub fn value(&self) -> &HeaderValue {
        &self.value
    }
}

impl Default for UserAgent {
    fn default() -> Self {
        Self {
            value: HeaderValue::from_static(DEFAULT_USER_AGENT),
        }
    }
}

impl fmt::Debug for UserAgent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("UserAgent").field(&self.value).finish()
    }
}

impl RequestDecorator for UserAgent {
    fn transform(&self, mut request: Request) -> Request {
        request.headers_mut().insert(USER_AGENT, self.value.clone());
        request
    }
}

// ============================================================================
// Tests
// ============================================================================
