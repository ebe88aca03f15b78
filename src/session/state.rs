//! Session states and results.
//!
//! ```text
//! transport: Unresolved → Resolved → Connected → TlsHandshaking → TlsEstablished
//! ws:        Idle → Handshaking → Open → Closing → Closed
//!            (any step) → Failed
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use tungstenite::handshake::client::Response;
use tungstenite::http::{HeaderMap, StatusCode};

use crate::error::Error;

// ============================================================================
// TransportState
// ============================================================================

/// Progress of the layers below the WebSocket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TransportState {
    /// Nothing looked up yet.
    Unresolved,
    /// Candidate addresses known.
    Resolved,
    /// TCP connection established.
    Connected,
    /// TLS client handshake in progress.
    TlsHandshaking,
    /// TLS established; the WebSocket may now be opened.
    TlsEstablished,
}

impl fmt::Display for TransportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

// ============================================================================
// WsState
// ============================================================================

/// Progress of the WebSocket layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WsState {
    /// Opening handshake not started.
    Idle,
    /// Opening handshake in progress.
    Handshaking,
    /// Messages may be exchanged.
    Open,
    /// Close handshake in progress.
    Closing,
    /// Closed gracefully; terminal.
    Closed,
    /// A step failed; terminal.
    Failed,
}

impl WsState {
    /// Returns `true` for `Closed` and `Failed`.
    #[inline]
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Closed | Self::Failed)
    }
}

impl fmt::Display for WsState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

// ============================================================================
// HandshakeOutcome
// ============================================================================

/// Result of the opening handshake.
///
/// A failed handshake is reported here instead of returned as an error;
/// the caller decides whether to stop.
#[derive(Debug)]
pub struct HandshakeOutcome {
    /// Status of the peer response, if one arrived.
    pub status: Option<StatusCode>,
    /// Headers of the peer response.
    pub headers: HeaderMap,
    /// Failure, `None` when the connection was upgraded.
    pub error: Option<Error>,
}

impl HandshakeOutcome {
    /// Creates the outcome of a successful upgrade.
    #[must_use]
    pub(crate) fn accepted(response: &Response) -> Self {
        Self {
            status: Some(response.status()),
            headers: response.headers().clone(),
            error: None,
        }
    }

    /// Creates the outcome of a failed upgrade.
    #[must_use]
    pub(crate) fn rejected(headers: HeaderMap, error: Error) -> Self {
        Self {
            status: error.status(),
            headers,
            error: Some(error),
        }
    }

    /// Returns `true` if the connection was upgraded.
    #[inline]
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.error.is_none() && self.status == Some(StatusCode::SWITCHING_PROTOCOLS)
    }

    /// Returns the result message, like an error code's description.
    #[must_use]
    pub fn message(&self) -> String {
        match &self.error {
            None => "The operation completed successfully".to_string(),
            Some(e) => e.to_string(),
        }
    }

    /// Renders the response head received from the peer.
    #[must_use]
    pub fn response_head(&self) -> String {
        let mut head = match self.status {
            Some(status) => format!(
                "HTTP/1.1 {} {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or_default()
            ),
            None => "(no response)".to_string(),
        };

        for (name, value) in &self.headers {
            head.push('\n');
            head.push_str(name.as_str());
            head.push_str(": ");
            head.push_str(&String::from_utf8_lossy(value.as_bytes()));
        }

        head
    }
}

// ============================================================================
// Outcome
// ============================================================================

/// Final result of a full session run.
#[derive(Debug)]
pub enum Outcome {
    /// Message echoed and connection closed gracefully.
    Completed {
        /// Payload of the received message.
        reply: String,
    },
    /// Opening handshake rejected; nothing was sent.
    Rejected {
        /// Handshake report.
        handshake: HandshakeOutcome,
    },
    /// A step failed.
    Failed {
        /// The step error.
        error: Error,
    },
}

impl Outcome {
    /// Returns the reply of a completed run.
    #[inline]
    #[must_use]
    pub fn reply(&self) -> Option<&str> {
        match self {
            Self::Completed { reply } => Some(reply),
            _ => None,
        }
    }

    /// Returns the error of a rejected or failed run.
    #[must_use]
    pub fn error(&self) -> Option<&Error> {
        match self {
            Self::Completed { .. } => None,
            Self::Rejected { handshake } => handshake.error.as_ref(),
            Self::Failed { error } => Some(error),
        }
    }

    /// Returns `true` if the run completed.
    #[inline]
    #[must_use]
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }
}

// ============================================================================
// Tests
// ============================================================================
