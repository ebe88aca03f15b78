//! Session state machine.
//!
//! A [`Session`] exchanges exactly one message over a secured WebSocket.
//! Each step is a method; [`Session::run`] calls them in order and turns
//! any failure into console output, so a failed session never takes down
//! its host.
//!
//! # Step Order
//!
//! 1. [`resolve`](Session::resolve)
//! 2. [`connect`](Session::connect)
//! 3. [`configure_tls_identity`](Session::configure_tls_identity)
//! 4. [`tls_handshake`](Session::tls_handshake)
//! 5. [`host_header`](Session::host_header)
//! 6. [`ws_handshake`](Session::ws_handshake)
//! 7. [`send`](Session::send)
//! 8. [`receive`](Session::receive)
//! 9. [`close`](Session::close)
//!
//! A step called out of order fails with [`Error::InvalidState`] without
//! touching the connection. A step that fails moves the session to
//! [`WsState::Failed`] and releases the transport. Nothing is retried.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

use rustls::pki_types::ServerName;
use tracing::{Instrument, debug, info, info_span, warn};
use tungstenite::Message;
use tungstenite::client::IntoClientRequest;
use tungstenite::handshake::client::Request;
use tungstenite::http::HeaderValue;
use tungstenite::http::header::HOST;
use tungstenite::protocol::CloseFrame;
use tungstenite::protocol::frame::coding::CloseCode;

use crate::console::Console;
use crate::error::{Error, Result};
use crate::identifiers::SessionId;
use crate::strategy::Strategy;
use crate::trust::TrustStore;

use super::endpoint::{Endpoint, build_host_header};
use super::options::SessionOptions;
use super::state::{HandshakeOutcome, Outcome, TransportState, WsState};

// ============================================================================
// Link
// ============================================================================

/// Stream of the highest layer established so far.
enum Link<S: Strategy> {
    /// No transport held.
    Detached,
    /// TCP connected.
    Tcp(S::Tcp),
    /// TLS established.
    Tls(S::Tls),
    /// WebSocket open.
    Ws(S::Ws),
}

impl<S: Strategy> Link<S> {
    fn name(&self) -> &'static str {
        match self {
            Self::Detached => "detached",
            Self::Tcp(_) => "tcp",
            Self::Tls(_) => "tls",
            Self::Ws(_) => "ws",
        }
    }
}

// ============================================================================
// Session
// ============================================================================

/// One WebSocket-over-TLS exchange driven by strategy `S`.
///
/// The session owns its connection exclusively. Steps take `&mut self`,
/// so two steps of one session can never run at the same time.
pub struct Session<S: Strategy> {
    /// Log correlation ID.
    id: SessionId,
    /// I/O strategy.
    strategy: S,
    /// Remote service.
    endpoint: Endpoint,
    /// Shared roots.
    trust_store: Arc<TrustStore>,
    /// Shared output sink.
    console: Arc<Console>,
    /// Step options.
    options: SessionOptions,
    /// Payload sent by [`Session::run`].
    text: String,
    /// Lower layer progress.
    transport_state: TransportState,
    /// WebSocket progress.
    ws_state: WsState,
    /// Server name configured for SNI.
    server_name: Option<ServerName<'static>>,
    /// Address the TCP connection was made to.
    remote: Option<SocketAddr>,
    /// Current stream.
    link: Link<S>,
}

impl<S: Strategy> fmt::Debug for Session<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("strategy", &S::TAG)
            .field("endpoint", &self.endpoint)
            .field("transport_state", &self.transport_state)
            .field("ws_state", &self.ws_state)
            .field("remote", &self.remote)
            .field("link", &self.link.name())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Session - Construction
// ============================================================================

impl<S: Strategy> Session<S> {
    /// Creates an unresolved session with default options.
    #[must_use]
    pub fn new(
        strategy: S,
        endpoint: Endpoint,
        trust_store: Arc<TrustStore>,
        console: Arc<Console>,
    ) -> Self {
        Self {
            id: SessionId::generate(),
            strategy,
            endpoint,
            trust_store,
            console,
            options: SessionOptions::default(),
            text: String::new(),
            transport_state: TransportState::Unresolved,
            ws_state: WsState::Idle,
            server_name: None,
            remote: None,
            link: Link::Detached,
        }
    }

    /// Replaces the step options.
    #[inline]
    #[must_use]
    pub fn with_options(mut self, options: SessionOptions) -> Self {
        self.options = options;
        self
    }

    /// Sets the text sent by [`Session::run`].
    #[inline]
    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }
}

// ============================================================================
// Session - Accessors
// ============================================================================

impl<S: Strategy> Session<S> {
    /// Returns the session ID.
    #[inline]
    #[must_use]
    pub const fn id(&self) -> SessionId {
        self.id
    }

    /// Returns the remote endpoint.
    #[inline]
    #[must_use]
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Returns the transport state.
    #[inline]
    #[must_use]
    pub const fn transport_state(&self) -> TransportState {
        self.transport_state
    }

    /// Returns the WebSocket state.
    #[inline]
    #[must_use]
    pub const fn ws_state(&self) -> WsState {
        self.ws_state
    }

    /// Returns the address connected to, once connected.
    #[inline]
    #[must_use]
    pub const fn remote_addr(&self) -> Option<SocketAddr> {
        self.remote
    }

    /// Returns `true` while the session holds a transport.
    #[inline]
    #[must_use]
    pub fn holds_transport(&self) -> bool {
        !matches!(self.link, Link::Detached)
    }
}

// ============================================================================
// Session - Steps
// ============================================================================

impl<S: Strategy> Session<S> {
    /// Looks up candidate addresses for the endpoint.
    ///
    /// # Errors
    ///
    /// - [`Error::Resolution`] if the name does not resolve
    /// - [`Error::InvalidState`] if already resolved
    pub async fn resolve(&mut self) -> Result<Vec<SocketAddr>> {
        self.require("resolve", self.transport_state == TransportState::Unresolved)?;

        let host = self.endpoint.host().to_owned();
        match self.strategy.resolve(&host, self.endpoint.port()).await {
            Ok(candidates) if !candidates.is_empty() => {
                debug!(host = %host, count = candidates.len(), "Resolved");
                self.transport_state = TransportState::Resolved;
                Ok(candidates)
            }
            Ok(_) => Err(self.fail(Error::resolution(host, "no addresses found"))),
            Err(e) => Err(self.fail(Error::resolution(host, e))),
        }
    }

    /// Connects to the first candidate that accepts.
    ///
    /// Returns the port actually connected to.
    ///
    /// # Errors
    ///
    /// - [`Error::Connect`] if every candidate fails
    /// - [`Error::InvalidState`] if not resolved
    pub async fn connect(&mut self, candidates: &[SocketAddr]) -> Result<u16> {
        self.require("connect", self.transport_state == TransportState::Resolved)?;

        let mut last_error = String::from("no candidate addresses");
        for &addr in candidates {
            match self.strategy.connect(addr).await {
                Ok(tcp) => {
                    debug!(addr = %addr, "Connected");
                    self.link = Link::Tcp(tcp);
                    self.remote = Some(addr);
                    self.transport_state = TransportState::Connected;
                    return Ok(addr.port());
                }
                Err(e) => {
                    debug!(addr = %addr, error = %e, "Candidate failed");
                    last_error = format!("{addr}: {e}");
                }
            }
        }

        let host = self.endpoint.host().to_owned();
        Err(self.fail(Error::connect(host, last_error)))
    }

    /// Sets the server name sent as SNI to the endpoint host.
    ///
    /// # Errors
    ///
    /// - [`Error::TlsSetup`] if the TLS engine rejects the host name
    /// - [`Error::InvalidState`] if not connected
    pub fn configure_tls_identity(&mut self) -> Result<()> {
        self.require(
            "configure TLS identity",
            self.transport_state == TransportState::Connected,
        )?;

        let host = self.endpoint.host().to_owned();
        match ServerName::try_from(host.clone()) {
            Ok(name) => {
                debug!(host = %host, "SNI configured");
                self.server_name = Some(name);
                Ok(())
            }
            Err(e) => Err(self.fail(Error::tls_setup(host, e))),
        }
    }

    /// Performs the TLS client handshake against the trust store.
    ///
    /// # Errors
    ///
    /// - [`Error::TlsHandshake`] on certificate or protocol failure, or
    ///   when the step deadline elapses
    /// - [`Error::InvalidState`] if not connected or SNI is not configured
    pub async fn tls_handshake(&mut self) -> Result<()> {
        self.require(
            "perform TLS handshake",
            self.transport_state == TransportState::Connected && self.server_name.is_some(),
        )?;

        let (Link::Tcp(tcp), Some(name)) = (self.take_link(), self.server_name.clone()) else {
            return Err(self.fail(Error::invalid_state("perform TLS handshake", "without TCP stream")));
        };

        self.transport_state = TransportState::TlsHandshaking;
        let config = self.trust_store.client_config();
        let deadline = self.options.deadline();

        match self.strategy.tls_handshake(tcp, config, name, deadline).await {
            Ok(tls) => {
                debug!("TLS handshake completed");
                self.link = Link::Tls(tls);
                self.transport_state = TransportState::TlsEstablished;
                Ok(())
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Returns the `Host` header value for the opening handshake.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] before a connection was made.
    pub fn host_header(&self) -> Result<String> {
        self.remote
            .map(|addr| build_host_header(self.endpoint.host(), addr.port()))
            .ok_or_else(|| Error::invalid_state("build Host header", "not connected"))
    }

    /// Performs the WebSocket opening handshake.
    ///
    /// Never returns an error: a failure is reported in the outcome and
    /// the session moves to [`WsState::Failed`].
    pub async fn ws_handshake(&mut self) -> HandshakeOutcome {
        if let Err(e) = self.require(
            "perform WebSocket handshake",
            self.transport_state == TransportState::TlsEstablished && self.ws_state == WsState::Idle,
        ) {
            return HandshakeOutcome::rejected(Default::default(), e);
        }

        let request = match self.upgrade_request() {
            Ok(request) => request,
            Err(e) => {
                let e = self.fail(e);
                return HandshakeOutcome::rejected(Default::default(), e);
            }
        };

        let Link::Tls(tls) = self.take_link() else {
            let e = self.fail(Error::invalid_state("perform WebSocket handshake", "without TLS stream"));
            return HandshakeOutcome::rejected(Default::default(), e);
        };

        self.ws_state = WsState::Handshaking;
        let config = self.options.websocket_config();
        let deadline = self.options.deadline();

        match self.strategy.ws_handshake(tls, request, config, deadline).await {
            Ok((ws, response)) => {
                debug!(status = %response.status(), "WebSocket open");
                self.link = Link::Ws(ws);
                self.ws_state = WsState::Open;
                HandshakeOutcome::accepted(&response)
            }
            Err(outcome) => {
                warn!(
                    status = ?outcome.status,
                    error = %outcome.message(),
                    "WebSocket handshake failed"
                );
                self.ws_state = WsState::Failed;
                self.link = Link::Detached;
                outcome
            }
        }
    }

    /// Sends one complete message.
    ///
    /// # Errors
    ///
    /// - [`Error::Write`] on transport failure
    /// - [`Error::InvalidState`] unless the WebSocket is open
    pub async fn send(&mut self, message: Message) -> Result<()> {
        self.require("send", self.ws_state == WsState::Open)?;

        let Link::Ws(ws) = &mut self.link else {
            return Err(self.fail(Error::invalid_state("send", "without WebSocket")));
        };

        let len = message.len();
        match self.strategy.send(ws, message).await {
            Ok(()) => {
                debug!(len, "Message sent");
                Ok(())
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Waits for one complete data message.
    ///
    /// # Errors
    ///
    /// - [`Error::Read`] on transport failure, protocol violation,
    ///   oversized message or peer close
    /// - [`Error::InvalidState`] unless the WebSocket is open
    pub async fn receive(&mut self) -> Result<Message> {
        self.require("receive", self.ws_state == WsState::Open)?;

        let Link::Ws(ws) = &mut self.link else {
            return Err(self.fail(Error::invalid_state("receive", "without WebSocket")));
        };

        match self.strategy.receive(ws).await {
            Ok(message) => {
                debug!(len = message.len(), "Message received");
                Ok(message)
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Performs the close handshake with `code`, then tears down the
    /// transport.
    ///
    /// The transport is released whether or not the peer acknowledged.
    ///
    /// # Errors
    ///
    /// - [`Error::Close`] if the peer does not acknowledge in time or the
    ///   connection fails while closing
    /// - [`Error::InvalidState`] unless the WebSocket is open
    pub async fn close(&mut self, code: CloseCode) -> Result<()> {
        self.require("close", self.ws_state == WsState::Open)?;

        let Link::Ws(mut ws) = self.take_link() else {
            return Err(self.fail(Error::invalid_state("close", "without WebSocket")));
        };

        self.ws_state = WsState::Closing;
        let deadline = self.options.deadline();
        let frame = CloseFrame {
            code,
            reason: String::new().into(),
        };

        let result = self.strategy.close(&mut ws, frame, deadline).await;
        self.strategy.teardown(ws, deadline).await;

        match result {
            Ok(()) => {
                debug!(code = u16::from(code), "Closed");
                self.ws_state = WsState::Closed;
                Ok(())
            }
            Err(e) => Err(self.fail(e)),
        }
    }
}

// ============================================================================
// Session - Run
// ============================================================================

impl<S: Strategy> Session<S> {
    /// Runs every step in order and reports the result on the console.
    ///
    /// Errors never escape: they are printed as `Error: ...` and returned
    /// in the [`Outcome`]. A rejected opening handshake stops the run
    /// before anything is sent.
    pub async fn run(mut self) -> Outcome {
        let span = info_span!(
            "session",
            id = %self.id,
            strategy = S::TAG.as_str(),
            endpoint = %self.endpoint,
        );

        async move {
            let outcome = match self.exchange().await {
                Ok(outcome) => outcome,
                Err(error) => {
                    self.console.println(S::TAG, format!("Error: {error}"));
                    Outcome::Failed { error }
                }
            };

            match outcome.error() {
                None => info!(ws_state = %self.ws_state, "Session completed"),
                Some(e) => warn!(kind = e.kind(), error = %e, ws_state = %self.ws_state, "Session failed"),
            }

            outcome
        }
        .instrument(span)
        .await
    }

    async fn exchange(&mut self) -> Result<Outcome> {
        let candidates = self.resolve().await?;
        self.connect(&candidates).await?;
        self.configure_tls_identity()?;
        self.tls_handshake().await?;

        let handshake = self.ws_handshake().await;
        self.console.println(S::TAG, handshake.message());
        self.console.println(S::TAG, handshake.response_head());

        if !handshake.is_success() {
            return Ok(Outcome::Rejected { handshake });
        }

        self.send(Message::text(self.text.clone())).await?;
        let reply = self.receive().await?;
        self.close(self.options.close_status()).await?;

        let reply = printable(&reply);
        self.console.println(S::TAG, &reply);

        Ok(Outcome::Completed { reply })
    }
}

// ============================================================================
// Session - Internals
// ============================================================================

impl<S: Strategy> Session<S> {
    /// Rejects a step whose precondition does not hold.
    fn require(&self, operation: &'static str, precondition: bool) -> Result<()> {
        if self.ws_state.is_terminal() {
            return Err(Error::invalid_state(operation, self.ws_state));
        }
        if !precondition {
            return Err(Error::invalid_state(
                operation,
                format!("{}/{}", self.transport_state, self.ws_state),
            ));
        }
        Ok(())
    }

    /// Marks the session failed and releases the transport.
    fn fail(&mut self, error: Error) -> Error {
        debug!(
            kind = error.kind(),
            transport_state = %self.transport_state,
            link = self.link.name(),
            "Step failed, releasing transport"
        );
        self.ws_state = WsState::Failed;
        self.link = Link::Detached;
        error
    }

    fn take_link(&mut self) -> Link<S> {
        std::mem::replace(&mut self.link, Link::Detached)
    }

    /// Builds the decorated upgrade request.
    fn upgrade_request(&self) -> Result<Request> {
        let host_header = self.host_header()?;

        // The target goes on the wire exactly as configured.
        let uri = format!("wss://{host_header}{}", self.options.target_path());
        let mut request = uri
            .into_client_request()
            .map_err(|e| Error::handshake(None, format!("invalid request target: {e}")))?;

        let host = HeaderValue::from_str(&host_header)
            .map_err(|e| Error::handshake(None, format!("invalid Host header: {e}")))?;
        request.headers_mut().insert(HOST, host);

        Ok(self.options.request_decorator().transform(request))
    }
}

/// Renders a received message for display.
fn printable(message: &Message) -> String {
    match message {
        Message::Text(text) => text.as_str().to_owned(),
        Message::Binary(bytes) => String::from_utf8_lossy(bytes).into_owned(),
        other => other.to_string(),
    }
}

// ============================================================================
// Tests
// ============================================================================
