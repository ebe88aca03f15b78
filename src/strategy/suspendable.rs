//! Suspendable strategy.
//!
//! Every wait is an `.await` on tokio, so a single-threaded event loop can
//! run any number of sessions, each resuming when its own I/O completes.
//! Step deadlines use [`tokio::time::timeout`].

// ============================================================================
// Imports
// ============================================================================

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use rustls::ClientConfig;
use rustls::pki_types::ServerName;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpStream, lookup_host};
use tokio::time::timeout;
use tokio_rustls::TlsConnector;
use tokio_rustls::client::TlsStream;
use tokio_tungstenite::WebSocketStream;
use tracing::{debug, trace};
use tungstenite::handshake::client::{Request, Response};
use tungstenite::http::HeaderMap;
use tungstenite::protocol::{CloseFrame, WebSocketConfig};
use tungstenite::{Error as WsError, Message};

use crate::console::StrategyTag;
use crate::error::{Error, Result};
use crate::session::HandshakeOutcome;

use super::{Strategy, TEARDOWN_TIMEOUT, close_error, peer_closed, read_error, rejection};

// ============================================================================
// Types
// ============================================================================

/// TLS stream over a tokio socket.
pub type SuspendableTls = TlsStream<TcpStream>;

/// WebSocket over [`SuspendableTls`].
pub type SuspendableWs = WebSocketStream<SuspendableTls>;

// ============================================================================
// Suspendable
// ============================================================================

/// Strategy yielding to the event loop while waiting.
#[derive(Debug, Clone, Copy, Default)]
pub struct Suspendable;

impl Strategy for Suspendable {
    const TAG: StrategyTag = StrategyTag::Async;

    type Tcp = TcpStream;
    type Tls = SuspendableTls;
    type Ws = SuspendableWs;

    async fn resolve(&self, host: &str, port: u16) -> io::Result<Vec<SocketAddr>> {
        Ok(lookup_host((host, port)).await?.collect())
    }

    async fn connect(&self, addr: SocketAddr) -> io::Result<TcpStream> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        Ok(stream)
    }

    async fn tls_handshake(
        &self,
        tcp: TcpStream,
        config: Arc<ClientConfig>,
        server_name: ServerName<'static>,
        deadline: Option<Duration>,
    ) -> Result<SuspendableTls> {
        let connector = TlsConnector::from(config);

        let tls = within(deadline, connector.connect(server_name, tcp))
            .await
            .map_err(Error::tls_handshake_timeout)?
            .map_err(Error::tls_handshake)?;

        let (_, conn) = tls.get_ref();
        trace!(
            version = ?conn.protocol_version(),
            suite = ?conn.negotiated_cipher_suite().map(|s| s.suite()),
            "TLS established"
        );

        Ok(tls)
    }

    async fn ws_handshake(
        &self,
        tls: SuspendableTls,
        request: Request,
        config: WebSocketConfig,
        deadline: Option<Duration>,
    ) -> std::result::Result<(SuspendableWs, Response), HandshakeOutcome> {
        let handshake = tokio_tungstenite::client_async_with_config(request, tls, Some(config));

        match within(deadline, handshake).await {
            Ok(Ok((ws, response))) => Ok((ws, response)),
            Ok(Err(e)) => Err(rejection(e, deadline)),
            Err(elapsed) => Err(HandshakeOutcome::rejected(
                HeaderMap::new(),
                Error::handshake_timeout(elapsed),
            )),
        }
    }

    async fn send(&self, ws: &mut SuspendableWs, message: Message) -> Result<()> {
        ws.send(message).await.map_err(Error::write)
    }

    async fn receive(&self, ws: &mut SuspendableWs) -> Result<Message> {
        while let Some(message) = ws.next().await {
            match message.map_err(read_error)? {
                message @ (Message::Text(_) | Message::Binary(_)) => return Ok(message),
                Message::Close(frame) => return Err(peer_closed(frame.as_ref())),
                // Pings are answered by the framing layer.
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {}
            }
        }

        Err(read_error(WsError::ConnectionClosed))
    }

    async fn close(
        &self,
        ws: &mut SuspendableWs,
        frame: CloseFrame,
        deadline: Option<Duration>,
    ) -> Result<()> {
        let handshake = async {
            match ws.close(Some(frame)).await {
                Ok(()) | Err(WsError::ConnectionClosed) => {}
                Err(e) => return Err(e),
            }

            while let Some(message) = ws.next().await {
                match message {
                    Ok(Message::Close(_)) | Err(WsError::ConnectionClosed) => return Ok(()),
                    Ok(message) => trace!(len = message.len(), "Discarded message while closing"),
                    Err(e) => return Err(e),
                }
            }

            Ok::<(), WsError>(())
        };

        within(deadline, handshake)
            .await
            .map_err(Error::close_timeout)?
            .map_err(|e| close_error(e, deadline))
    }

    async fn teardown(&self, mut ws: SuspendableWs, deadline: Option<Duration>) {
        let tls = ws.get_mut();

        // Best effort: the peer may already be gone.
        match timeout(deadline.unwrap_or(TEARDOWN_TIMEOUT), tls.shutdown()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => debug!(error = %e, "TLS shutdown failed"),
            Err(_) => debug!("TLS shutdown timed out"),
        }
    }
}

/// Runs `future`, giving up after `deadline` if one is set.
///
/// On expiry the elapsed deadline is returned as the error.
async fn within<F: Future>(
    deadline: Option<Duration>,
    future: F,
) -> std::result::Result<F::Output, Duration> {
    match deadline {
        Some(deadline) => timeout(deadline, future).await.map_err(|_| deadline),
        None => Ok(future.await),
    }
}

// ============================================================================
// Tests
// ============================================================================
