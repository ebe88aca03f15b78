//! Blocking strategy.
//!
//! Every step runs to completion on the calling thread. The methods are
//! `async` only to satisfy [`Strategy`]; their futures are ready the
//! first time they are polled, so the session is driven with a plain
//! `block_on` on a dedicated thread.
//!
//! A step deadline is an absolute point in time. [`DeadlineSocket`] sets
//! the socket timeout to whatever is left of it before every read and
//! write, so a peer that keeps trickling bytes cannot stretch a step.

// ============================================================================
// Imports
// ============================================================================

use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::time::{Duration, Instant};

use rustls::pki_types::ServerName;
use rustls::{ClientConfig, ClientConnection, StreamOwned};
use tracing::{debug, trace};
use tungstenite::handshake::HandshakeError;
use tungstenite::handshake::client::{Request, Response};
use tungstenite::http::HeaderMap;
use tungstenite::protocol::{CloseFrame, WebSocketConfig};
use tungstenite::{Error as WsError, Message, WebSocket};

use crate::console::StrategyTag;
use crate::error::{Error, Result};
use crate::session::HandshakeOutcome;

use super::{
    Strategy, TEARDOWN_TIMEOUT, close_error, is_timeout, peer_closed, read_error, rejection,
};

// ============================================================================
// Types
// ============================================================================

/// TLS stream owning its socket.
pub type BlockingTls = StreamOwned<ClientConnection, DeadlineSocket>;

/// WebSocket over [`BlockingTls`].
pub type BlockingWs = WebSocket<BlockingTls>;

// ============================================================================
// DeadlineSocket
// ============================================================================

/// TCP stream whose reads and writes share one step deadline.
#[derive(Debug)]
pub struct DeadlineSocket {
    tcp: TcpStream,
    step: Option<StepDeadline>,
}

#[derive(Debug, Clone, Copy)]
struct StepDeadline {
    /// Configured length, reported on expiry.
    budget: Duration,
    /// Instant the step must be done by.
    until: Instant,
}

impl DeadlineSocket {
    /// Wraps `tcp` with no step in progress.
    #[must_use]
    pub fn new(tcp: TcpStream) -> Self {
        Self { tcp, step: None }
    }

    /// Returns the underlying socket.
    #[inline]
    #[must_use]
    pub fn get_ref(&self) -> &TcpStream {
        &self.tcp
    }

    /// Starts a step that must finish within `deadline`.
    ///
    /// `None` makes the following I/O unbounded.
    pub fn begin(&mut self, deadline: Option<Duration>) -> io::Result<()> {
        self.step = deadline.and_then(|budget| {
            Instant::now()
                .checked_add(budget)
                .map(|until| StepDeadline { budget, until })
        });

        if self.step.is_none() {
            set_deadline(&self.tcp, None)?;
        }
        Ok(())
    }

    /// Ends the current step; later I/O is unbounded.
    pub fn end(&mut self) -> io::Result<()> {
        self.begin(None)
    }

    /// Sets the socket timeout to the time left in the step.
    fn arm(&self) -> io::Result<()> {
        let Some(step) = self.step else {
            return Ok(());
        };

        match step.until.checked_duration_since(Instant::now()) {
            Some(left) if !left.is_zero() => set_deadline(&self.tcp, Some(left)),
            _ => Err(io::Error::new(
                io::ErrorKind::TimedOut,
                format!("step deadline of {}ms elapsed", step.budget.as_millis()),
            )),
        }
    }
}

impl Read for DeadlineSocket {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.arm()?;
        self.tcp.read(buf)
    }
}

impl Write for DeadlineSocket {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.arm()?;
        self.tcp.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.tcp.flush()
    }
}

// ============================================================================
// Blocking
// ============================================================================

/// Strategy occupying the calling thread while waiting.
#[derive(Debug, Clone, Copy, Default)]
pub struct Blocking;

impl Strategy for Blocking {
    const TAG: StrategyTag = StrategyTag::Sync;

    type Tcp = TcpStream;
    type Tls = BlockingTls;
    type Ws = BlockingWs;

    async fn resolve(&self, host: &str, port: u16) -> io::Result<Vec<SocketAddr>> {
        Ok((host, port).to_socket_addrs()?.collect())
    }

    async fn connect(&self, addr: SocketAddr) -> io::Result<TcpStream> {
        let stream = TcpStream::connect(addr)?;
        stream.set_nodelay(true)?;
        Ok(stream)
    }

    async fn tls_handshake(
        &self,
        tcp: TcpStream,
        config: Arc<ClientConfig>,
        server_name: ServerName<'static>,
        deadline: Option<Duration>,
    ) -> Result<BlockingTls> {
        let mut conn = ClientConnection::new(config, server_name).map_err(Error::tls_handshake)?;
        let mut sock = DeadlineSocket::new(tcp);
        sock.begin(deadline).map_err(Error::tls_handshake)?;

        while conn.is_handshaking() {
            if let Err(e) = conn.complete_io(&mut sock) {
                return Err(match deadline {
                    Some(deadline) if is_timeout(&e) => Error::tls_handshake_timeout(deadline),
                    _ => Error::tls_handshake(e),
                });
            }
        }

        sock.end().map_err(Error::tls_handshake)?;
        trace!(
            version = ?conn.protocol_version(),
            suite = ?conn.negotiated_cipher_suite().map(|s| s.suite()),
            "TLS established"
        );

        Ok(StreamOwned::new(conn, sock))
    }

    async fn ws_handshake(
        &self,
        mut tls: BlockingTls,
        request: Request,
        config: WebSocketConfig,
        deadline: Option<Duration>,
    ) -> std::result::Result<(BlockingWs, Response), HandshakeOutcome> {
        if let Err(e) = tls.sock.begin(deadline) {
            return Err(HandshakeOutcome::rejected(
                HeaderMap::new(),
                Error::handshake(None, e),
            ));
        }

        match tungstenite::client::client_with_config(request, tls, Some(config)) {
            Ok((mut ws, response)) => {
                if let Err(e) = ws.get_mut().sock.end() {
                    return Err(HandshakeOutcome::rejected(
                        response.headers().clone(),
                        Error::handshake(Some(response.status()), e),
                    ));
                }
                Ok((ws, response))
            }

            Err(HandshakeError::Failure(e)) => Err(rejection(e, deadline)),

            // A socket timeout surfaces as an interrupted handshake.
            Err(HandshakeError::Interrupted(_)) => Err(rejection(
                WsError::Io(io::Error::from(io::ErrorKind::WouldBlock)),
                deadline,
            )),
        }
    }

    async fn send(&self, ws: &mut BlockingWs, message: Message) -> Result<()> {
        ws.send(message).map_err(Error::write)
    }

    async fn receive(&self, ws: &mut BlockingWs) -> Result<Message> {
        loop {
            match ws.read().map_err(read_error)? {
                message @ (Message::Text(_) | Message::Binary(_)) => return Ok(message),
                Message::Close(frame) => return Err(peer_closed(frame.as_ref())),
                // Pings are answered by the framing layer.
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {}
            }
        }
    }

    async fn close(
        &self,
        ws: &mut BlockingWs,
        frame: CloseFrame,
        deadline: Option<Duration>,
    ) -> Result<()> {
        ws.get_mut().sock.begin(deadline).map_err(Error::close)?;

        match ws.close(Some(frame)) {
            Ok(()) | Err(WsError::ConnectionClosed) => {}
            Err(e) => return Err(close_error(e, deadline)),
        }

        loop {
            match ws.read() {
                Ok(Message::Close(_)) | Err(WsError::ConnectionClosed) => return Ok(()),
                Ok(message) => trace!(len = message.len(), "Discarded message while closing"),
                Err(e) => return Err(close_error(e, deadline)),
            }
        }
    }

    async fn teardown(&self, mut ws: BlockingWs, deadline: Option<Duration>) {
        let stream = ws.get_mut();

        // Best effort: the peer may already be gone.
        let _ = stream.sock.begin(Some(deadline.unwrap_or(TEARDOWN_TIMEOUT)));
        stream.conn.send_close_notify();
        if let Err(e) = stream.flush() {
            debug!(error = %e, "close_notify not delivered");
        }
        let _ = stream.sock.get_ref().shutdown(Shutdown::Both);
    }
}

/// Applies `deadline` to both directions of `tcp`.
fn set_deadline(tcp: &TcpStream, deadline: Option<Duration>) -> io::Result<()> {
    tcp.set_read_timeout(deadline)?;
    tcp.set_write_timeout(deadline)
}

// ============================================================================
// Tests
// ============================================================================
