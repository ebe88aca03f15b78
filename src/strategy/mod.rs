//! Execution strategies.
//!
//! A [`Strategy`] performs the I/O of each session step. The step sequence
//! itself lives once, in [`Session`](crate::Session); a strategy only
//! decides whether the calling thread is occupied while a step waits.
//!
//! | Strategy | Tag | Waiting |
//! |----------|-----|---------|
//! | [`Blocking`] | `[sync]` | Occupies the calling thread |
//! | [`Suspendable`] | `[async]` | Yields to the event loop |
//!
//! Both map failures onto the same error kinds, so the same network
//! conditions produce the same observable outcome under either strategy.

// ============================================================================
// Submodules
// ============================================================================

/// Blocking strategy (std sockets, rustls, tungstenite).
pub mod blocking;

/// Suspendable strategy (tokio, tokio-rustls, tokio-tungstenite).
pub mod suspendable;

// ============================================================================
// Imports
// ============================================================================

use std::future::Future;
use std::io::{self, ErrorKind};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use rustls::ClientConfig;
use rustls::pki_types::ServerName;
use tungstenite::Error as WsError;
use tungstenite::Message;
use tungstenite::handshake::client::{Request, Response};
use tungstenite::http::HeaderMap;
use tungstenite::protocol::{CloseFrame, WebSocketConfig};

use crate::console::StrategyTag;
use crate::error::{Error, Result};
use crate::session::HandshakeOutcome;

// ============================================================================
// Constants
// ============================================================================

/// Bound on transport shutdown when no step deadline is configured.
pub(crate) const TEARDOWN_TIMEOUT: Duration = Duration::from_secs(5);

// ============================================================================
// Re-exports
// ============================================================================

pub use blocking::Blocking;
pub use suspendable::Suspendable;

// ============================================================================
// Strategy
// ============================================================================

/// I/O capability behind the session steps.
///
/// Every method is a potential suspension point. Each layer consumes the
/// one below it, so a session can only hold the stream of its current
/// layer.
pub trait Strategy {
    /// Prefix of console lines produced under this strategy.
    const TAG: StrategyTag;

    /// Connected TCP stream.
    type Tcp;
    /// TLS stream over [`Strategy::Tcp`].
    type Tls;
    /// WebSocket over [`Strategy::Tls`].
    type Ws;

    /// Looks up candidate addresses for `host:port`.
    fn resolve(&self, host: &str, port: u16) -> impl Future<Output = io::Result<Vec<SocketAddr>>>;

    /// Opens a TCP connection to one candidate.
    fn connect(&self, addr: SocketAddr) -> impl Future<Output = io::Result<Self::Tcp>>;

    /// Performs the TLS client handshake, sending `server_name` as SNI.
    fn tls_handshake(
        &self,
        tcp: Self::Tcp,
        config: Arc<ClientConfig>,
        server_name: ServerName<'static>,
        deadline: Option<Duration>,
    ) -> impl Future<Output = Result<Self::Tls>>;

    /// Sends the upgrade request and waits for the response.
    ///
    /// A rejection is returned as the report to show to the user.
    fn ws_handshake(
        &self,
        tls: Self::Tls,
        request: Request,
        config: WebSocketConfig,
        deadline: Option<Duration>,
    ) -> impl Future<Output = std::result::Result<(Self::Ws, Response), HandshakeOutcome>>;

    /// Writes one complete message.
    fn send(&self, ws: &mut Self::Ws, message: Message) -> impl Future<Output = Result<()>>;

    /// Reads until one complete data message has been reassembled.
    fn receive(&self, ws: &mut Self::Ws) -> impl Future<Output = Result<Message>>;

    /// Sends `frame` and waits for the peer's close frame.
    fn close(
        &self,
        ws: &mut Self::Ws,
        frame: CloseFrame,
        deadline: Option<Duration>,
    ) -> impl Future<Output = Result<()>>;

    /// Shuts down the TLS and TCP layers. Never fails.
    fn teardown(&self, ws: Self::Ws, deadline: Option<Duration>) -> impl Future<Output = ()>;
}

// ============================================================================
// Error Mapping
// ============================================================================

/// Returns `true` if an I/O error means a socket timeout elapsed.
pub(crate) fn is_timeout(err: &io::Error) -> bool {
    matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut)
}

/// Converts a failed opening handshake into its report.
pub(crate) fn rejection(err: WsError, deadline: Option<Duration>) -> HandshakeOutcome {
    match err {
        WsError::Http(response) => {
            let status = response.status();
            let error = Error::handshake(
                Some(status),
                format!("server responded {status} instead of 101 Switching Protocols"),
            );
            HandshakeOutcome::rejected(response.headers().clone(), error)
        }

        WsError::Io(e) if is_timeout(&e) => {
            let error = match deadline {
                Some(deadline) => Error::handshake_timeout(deadline),
                None => Error::handshake(None, e),
            };
            HandshakeOutcome::rejected(HeaderMap::new(), error)
        }

        other => HandshakeOutcome::rejected(HeaderMap::new(), Error::handshake(None, other)),
    }
}

/// Converts a read failure, naming peer closes explicitly.
pub(crate) fn read_error(err: WsError) -> Error {
    match err {
        WsError::ConnectionClosed | WsError::AlreadyClosed => {
            Error::read("connection closed by peer")
        }
        WsError::Capacity(e) => Error::read(format!("message too large: {e}")),
        other => Error::read(other),
    }
}

/// Describes a close frame received while a data message was expected.
pub(crate) fn peer_closed(frame: Option<&CloseFrame>) -> Error {
    match frame {
        Some(frame) => Error::read(format!(
            "connection closed by peer ({}: {})",
            u16::from(frame.code),
            &*frame.reason
        )),
        None => Error::read("connection closed by peer"),
    }
}

/// Maps a close failure; timeouts become [`Error::close_timeout`].
pub(crate) fn close_error(err: WsError, deadline: Option<Duration>) -> Error {
    match (err, deadline) {
        (WsError::Io(e), Some(deadline)) if is_timeout(&e) => Error::close_timeout(deadline),
        (other, _) => Error::close(other),
    }
}

// ============================================================================
// Tests
// ============================================================================
