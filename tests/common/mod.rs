//! Shared utilities for integration tests.
//!
//! Provides a local WebSocket-over-TLS echo server signed by the test CA
//! in `tests/fixtures/`.

#![allow(dead_code)]

// ============================================================================
// Imports
// ============================================================================

use std::io::{BufReader, Cursor};
use std::net::SocketAddr;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use rustls::ServerConfig;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio_rustls::TlsAcceptor;
use tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tungstenite::Message;
use tungstenite::http::StatusCode;
use wss_probe::{Console, Endpoint, Session, SessionOptions, Strategy, TrustStore};

// ============================================================================
// Fixtures
// ============================================================================

pub const CA_PEM: &[u8] = include_bytes!("../fixtures/ca.pem");
pub const UNTRUSTED_CA_PEM: &[u8] = include_bytes!("../fixtures/untrusted-ca.pem");
const LEAF_PEM: &[u8] = include_bytes!("../fixtures/localhost.pem");
const LEAF_KEY: &[u8] = include_bytes!("../fixtures/localhost.key");

/// Request target the server rejects with 401.
pub const REJECTED_PATH: &str = "/401";

pub fn trust_store() -> Arc<TrustStore> {
    Arc::new(TrustStore::from_pem(CA_PEM).expect("fixture CA should load"))
}

pub fn untrusted_store() -> Arc<TrustStore> {
    Arc::new(TrustStore::from_pem(UNTRUSTED_CA_PEM).expect("fixture CA should load"))
}

/// Creates a session against `localhost:port` writing to a fresh console.
pub fn session<S: Strategy>(
    strategy: S,
    port: u16,
    store: Arc<TrustStore>,
    options: SessionOptions,
) -> (Session<S>, wss_probe::CapturedOutput) {
    let (console, captured) = Console::captured();
    let session = Session::new(
        strategy,
        Endpoint::new("localhost", port).expect("valid endpoint"),
        store,
        Arc::new(console),
    )
    .with_options(options)
    .with_text("Hello, world!");

    (session, captured)
}

fn server_config() -> Arc<ServerConfig> {
    let certs: Vec<CertificateDer<'static>> =
        rustls_pemfile::certs(&mut BufReader::new(Cursor::new(LEAF_PEM)))
            .map(|c| c.expect("valid certificate"))
            .collect();
    let key: PrivateKeyDer<'static> =
        rustls_pemfile::private_key(&mut BufReader::new(Cursor::new(LEAF_KEY)))
            .expect("readable key")
            .expect("key present");

    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let config = ServerConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .expect("protocol versions")
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .expect("valid server certificate");

    Arc::new(config)
}

// ============================================================================
// EchoServer
// ============================================================================

/// How the server treats an upgraded connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Echo every data message; answer close frames.
    Echo,
    /// Echo one message, then stop reading so a close is never answered.
    NoCloseAck,
    /// Echo one message, then send `tick` every 100 ms without ever reading.
    Chatty,
    /// Complete TLS, then never answer the upgrade request.
    SilentUpgrade,
}

/// Headers seen in an opening handshake.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub path: String,
    pub host: Option<String>,
    pub user_agent: Option<String>,
}

/// WebSocket-over-TLS server on its own thread and event loop.
pub struct EchoServer {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    shutdown: Option<oneshot::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl EchoServer {
    pub fn start(mode: Mode) -> Self {
        let std_listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
        std_listener.set_nonblocking(true).expect("nonblocking");
        let addr = std_listener.local_addr().expect("local addr");

        let requests = Arc::new(Mutex::new(Vec::new()));
        let (shutdown, mut shutdown_rx) = oneshot::channel();
        let acceptor = TlsAcceptor::from(server_config());

        let recorded = Arc::clone(&requests);
        let thread = thread::spawn(move || {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .expect("server runtime");

            runtime.block_on(async move {
                let listener = TcpListener::from_std(std_listener).expect("tokio listener");
                loop {
                    tokio::select! {
                        _ = &mut shutdown_rx => break,
                        accepted = listener.accept() => {
                            let Ok((tcp, _)) = accepted else { continue };
                            tokio::spawn(handle(
                                acceptor.clone(),
                                tcp,
                                mode,
                                Arc::clone(&recorded),
                            ));
                        }
                    }
                }
            });
        });

        Self {
            addr,
            requests,
            shutdown: Some(shutdown),
            thread: Some(thread),
        }
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().clone()
    }
}

impl Drop for EchoServer {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

async fn handle(
    acceptor: TlsAcceptor,
    tcp: TcpStream,
    mode: Mode,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
) {
    // Clients that distrust the certificate fail here.
    let Ok(tls) = acceptor.accept(tcp).await else {
        return;
    };

    if mode == Mode::SilentUpgrade {
        tokio::time::sleep(Duration::from_secs(10)).await;
        drop(tls);
        return;
    }

    let callback = move |request: &Request, response: Response| {
        let header = |name: &str| {
            request
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_owned)
        };
        requests.lock().push(RecordedRequest {
            path: request.uri().path().to_owned(),
            host: header("host"),
            user_agent: header("user-agent"),
        });

        if request.uri().path() == REJECTED_PATH {
            let mut rejection = ErrorResponse::new(Some("unauthorized".to_owned()));
            *rejection.status_mut() = StatusCode::UNAUTHORIZED;
            return Err(rejection);
        }
        Ok(response)
    };

    let Ok(mut ws) = tokio_tungstenite::accept_hdr_async(tls, callback).await else {
        return;
    };

    match mode {
        Mode::Echo => {
            while let Some(Ok(message)) = ws.next().await {
                if (message.is_text() || message.is_binary()) && ws.send(message).await.is_err() {
                    break;
                }
            }
        }
        Mode::NoCloseAck => {
            if let Some(Ok(message)) = ws.next().await {
                let _ = ws.send(message).await;
            }
            tokio::time::sleep(Duration::from_secs(10)).await;
        }
        Mode::Chatty => {
            if let Some(Ok(message)) = ws.next().await {
                let _ = ws.send(message).await;
            }
            let mut ticker = tokio::time::interval(Duration::from_millis(100));
            for _ in 0..100 {
                ticker.tick().await;
                if ws.send(Message::text("tick")).await.is_err() {
                    break;
                }
            }
        }
        Mode::SilentUpgrade => {}
    }
}
