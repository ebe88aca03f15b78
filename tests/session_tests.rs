//! Session integration tests against a local WebSocket-over-TLS server.

mod common;

use std::time::{Duration, Instant};

use common::{EchoServer, Mode, REJECTED_PATH};
use futures_executor::block_on;
use tungstenite::http::StatusCode;
use wss_probe::session::DEFAULT_USER_AGENT;
use wss_probe::{
    Blocking, CloseCode, Error, Message, Outcome, SessionOptions, StrategyTag, Suspendable,
    TransportState, WsState,
};

// ============================================================================
// Round Trip
// ============================================================================

#[tokio::test]
async fn test_suspendable_steps_round_trip() -> anyhow::Result<()> {
    let server = EchoServer::start(Mode::Echo);
    let (mut session, _) = common::session(
        Suspendable,
        server.port(),
        common::trust_store(),
        SessionOptions::new(),
    );

    let candidates = session.resolve().await?;
    assert!(!candidates.is_empty());

    let port = session.connect(&candidates).await?;
    assert_eq!(port, server.port());
    assert_eq!(session.transport_state(), TransportState::Connected);

    session.configure_tls_identity()?;
    session.tls_handshake().await?;
    assert_eq!(session.transport_state(), TransportState::TlsEstablished);

    let host_header = session.host_header()?;
    assert_eq!(host_header, format!("localhost:{}", server.port()));

    let handshake = session.ws_handshake().await;
    assert!(handshake.is_success(), "{}", handshake.message());
    assert_eq!(handshake.status, Some(StatusCode::SWITCHING_PROTOCOLS));
    assert_eq!(session.ws_state(), WsState::Open);

    session.send(Message::text("Hello, world!")).await?;
    let reply = session.receive().await?;
    assert_eq!(reply, Message::text("Hello, world!"));

    session.close(CloseCode::Normal).await?;
    assert_eq!(session.ws_state(), WsState::Closed);
    assert!(!session.holds_transport());

    let requests = server.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].path, "/");
    assert_eq!(requests[0].host.as_deref(), Some(host_header.as_str()));
    assert_eq!(requests[0].user_agent.as_deref(), Some(DEFAULT_USER_AGENT));

    Ok(())
}

#[test]
fn test_blocking_run_prints_reply() {
    let server = EchoServer::start(Mode::Echo);
    let (session, captured) = common::session(
        Blocking,
        server.port(),
        common::trust_store(),
        SessionOptions::new().user_agent("echo-test/1.0"),
    );

    let outcome = block_on(session.run());

    assert_eq!(outcome.reply(), Some("Hello, world!"));
    let lines = captured.lines_for(StrategyTag::Sync);
    assert_eq!(lines[0], "The operation completed successfully");
    assert_eq!(lines[1], "HTTP/1.1 101 Switching Protocols");
    assert_eq!(lines.last().map(String::as_str), Some("Hello, world!"));
    assert!(captured.lines_for(StrategyTag::Async).is_empty());

    assert_eq!(
        server.requests()[0].user_agent.as_deref(),
        Some("echo-test/1.0")
    );
}

#[test]
fn test_blocking_connects_to_ip_literal() {
    let server = EchoServer::start(Mode::Echo);
    let (console, _) = wss_probe::Console::captured();
    let session = wss_probe::Session::new(
        Blocking,
        wss_probe::Endpoint::new("127.0.0.1", server.port()).expect("endpoint"),
        common::trust_store(),
        std::sync::Arc::new(console),
    )
    .with_text("by address");

    let outcome = block_on(session.run());

    assert_eq!(outcome.reply(), Some("by address"));
    assert_eq!(
        server.requests()[0].host,
        Some(format!("127.0.0.1:{}", server.port()))
    );
}

#[tokio::test]
async fn test_suspendable_sends_request_target_verbatim() {
    let server = EchoServer::start(Mode::Echo);

    for path in ["//other/echo", "/a/../b"] {
        let (session, _) = common::session(
            Suspendable,
            server.port(),
            common::trust_store(),
            SessionOptions::new().path(path),
        );
        let outcome = session.run().await;
        assert_eq!(outcome.reply(), Some("Hello, world!"), "{path}");
    }

    let paths: Vec<String> = server.requests().into_iter().map(|r| r.path).collect();
    assert_eq!(paths, ["//other/echo", "/a/../b"]);
}

#[test]
fn test_blocking_sends_request_target_verbatim() {
    let server = EchoServer::start(Mode::Echo);
    let (session, _) = common::session(
        Blocking,
        server.port(),
        common::trust_store(),
        SessionOptions::new().path("//other/echo"),
    );

    let outcome = block_on(session.run());

    assert_eq!(outcome.reply(), Some("Hello, world!"));
    assert_eq!(server.requests()[0].path, "//other/echo");
}

// ============================================================================
// Handshake Rejection
// ============================================================================

#[tokio::test]
async fn test_suspendable_rejected_handshake_sends_nothing() {
    let server = EchoServer::start(Mode::Echo);
    let (session, captured) = common::session(
        Suspendable,
        server.port(),
        common::trust_store(),
        SessionOptions::new().path(REJECTED_PATH),
    );

    let outcome = session.run().await;

    let Outcome::Rejected { handshake } = outcome else {
        panic!("expected rejection, got {outcome:?}");
    };
    assert_eq!(handshake.status, Some(StatusCode::UNAUTHORIZED));
    assert!(handshake.error.as_ref().is_some_and(Error::is_handshake_error));

    let lines = captured.lines_for(StrategyTag::Async);
    assert!(lines[0].contains("401"));
    assert!(lines.iter().any(|l| l == "HTTP/1.1 401 Unauthorized"));
    assert!(!lines.iter().any(|l| l.contains("Hello, world!")));
}

#[test]
fn test_blocking_rejected_handshake_fails_session() {
    let server = EchoServer::start(Mode::Echo);
    let (mut session, _) = common::session(
        Blocking,
        server.port(),
        common::trust_store(),
        SessionOptions::new().path(REJECTED_PATH),
    );

    block_on(async {
        let candidates = session.resolve().await.expect("resolve");
        session.connect(&candidates).await.expect("connect");
        session.configure_tls_identity().expect("SNI");
        session.tls_handshake().await.expect("TLS handshake");

        let handshake = session.ws_handshake().await;
        assert!(!handshake.is_success());
        assert_eq!(handshake.status, Some(StatusCode::UNAUTHORIZED));
        assert_eq!(session.ws_state(), WsState::Failed);
        assert!(!session.holds_transport());

        let err = session.send(Message::text("late")).await.unwrap_err();
        assert!(matches!(err, Error::InvalidState { .. }));
    });

    assert_eq!(server.requests()[0].path, REJECTED_PATH);
}

// ============================================================================
// Failures
// ============================================================================

#[tokio::test]
async fn test_suspendable_untrusted_certificate() {
    let server = EchoServer::start(Mode::Echo);
    let (session, captured) = common::session(
        Suspendable,
        server.port(),
        common::untrusted_store(),
        SessionOptions::new(),
    );

    let outcome = session.run().await;

    let error = outcome.error().expect("TLS fails");
    assert_eq!(error.kind(), "TlsHandshakeError");
    assert!(!error.is_timeout());
    let lines = captured.lines_for(StrategyTag::Async);
    assert_eq!(lines.len(), 1);
    assert!(lines[0].starts_with("Error: "));
    assert!(server.requests().is_empty());
}

#[test]
fn test_blocking_untrusted_certificate() {
    let server = EchoServer::start(Mode::Echo);
    let (mut session, _) = common::session(
        Blocking,
        server.port(),
        common::untrusted_store(),
        SessionOptions::new(),
    );

    block_on(async {
        let candidates = session.resolve().await.expect("resolve");
        session.connect(&candidates).await.expect("connect");
        session.configure_tls_identity().expect("SNI");

        let err = session.tls_handshake().await.unwrap_err();
        assert!(matches!(err, Error::TlsHandshake { .. }));
        assert_eq!(session.ws_state(), WsState::Failed);
        assert!(!session.holds_transport());
    });
}

#[test]
fn test_unresolvable_host_for_both_strategies() {
    let (console, captured) = wss_probe::Console::captured();
    let console = std::sync::Arc::new(console);
    let endpoint = wss_probe::Endpoint::new("wss-probe.invalid", 443).expect("endpoint");

    let mut blocking = wss_probe::Session::new(
        Blocking,
        endpoint.clone(),
        common::trust_store(),
        std::sync::Arc::clone(&console),
    );
    let err = tokio_test::assert_err!(block_on(blocking.resolve()));
    assert_eq!(err.kind(), "ResolutionError");
    assert_eq!(blocking.transport_state(), TransportState::Unresolved);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("runtime");
    let suspendable =
        wss_probe::Session::new(Suspendable, endpoint, common::trust_store(), console);
    let outcome = runtime.block_on(suspendable.run());
    assert_eq!(outcome.error().map(Error::kind), Some("ResolutionError"));

    assert_eq!(captured.lines_for(StrategyTag::Async).len(), 1);
}

#[tokio::test]
async fn test_suspendable_close_times_out_without_ack() {
    let server = EchoServer::start(Mode::NoCloseAck);
    let (mut session, _) = common::session(
        Suspendable,
        server.port(),
        common::trust_store(),
        SessionOptions::new().step_timeout(Duration::from_millis(300)),
    );

    let candidates = session.resolve().await.expect("resolve");
    session.connect(&candidates).await.expect("connect");
    session.configure_tls_identity().expect("SNI");
    session.tls_handshake().await.expect("TLS handshake");
    assert!(session.ws_handshake().await.is_success());
    session.send(Message::text("once")).await.expect("send");
    session.receive().await.expect("receive");

    let err = tokio_test::assert_err!(session.close(CloseCode::Normal).await);
    assert!(matches!(err, Error::Close { .. }));
    assert!(err.is_timeout());
    assert_eq!(session.ws_state(), WsState::Failed);
    assert!(!session.holds_transport());
}

#[test]
fn test_blocking_close_times_out_without_ack() {
    let server = EchoServer::start(Mode::NoCloseAck);
    let (session, captured) = common::session(
        Blocking,
        server.port(),
        common::trust_store(),
        SessionOptions::new().step_timeout(Duration::from_millis(300)),
    );

    let outcome = block_on(session.run());

    let error = outcome.error().expect("close fails");
    assert_eq!(error.kind(), "CloseError");
    assert!(error.is_timeout());
    // The reply arrived but the run failed before printing it.
    let lines = captured.lines_for(StrategyTag::Sync);
    assert!(lines.last().is_some_and(|l| l.starts_with("Error: ")));
}

// ============================================================================
// Step Deadlines
// ============================================================================

/// Runs a session up to an open WebSocket with one echoed message.
async fn open_and_exchange<S: wss_probe::Strategy>(session: &mut wss_probe::Session<S>) {
    let candidates = session.resolve().await.expect("resolve");
    session.connect(&candidates).await.expect("connect");
    session.configure_tls_identity().expect("SNI");
    session.tls_handshake().await.expect("TLS handshake");
    assert!(session.ws_handshake().await.is_success());
    session.send(Message::text("once")).await.expect("send");
    session.receive().await.expect("receive");
}

#[tokio::test]
async fn test_suspendable_close_deadline_holds_against_chatty_peer() {
    let server = EchoServer::start(Mode::Chatty);
    let (mut session, _) = common::session(
        Suspendable,
        server.port(),
        common::trust_store(),
        SessionOptions::new().step_timeout(Duration::from_millis(300)),
    );
    open_and_exchange(&mut session).await;

    let started = Instant::now();
    let err = tokio_test::assert_err!(session.close(CloseCode::Normal).await);

    assert!(matches!(err, Error::Close { .. }));
    assert!(err.is_timeout());
    assert!(started.elapsed() < Duration::from_secs(2), "{:?}", started.elapsed());
    assert_eq!(session.ws_state(), WsState::Failed);
    assert!(!session.holds_transport());
}

#[test]
fn test_blocking_close_deadline_holds_against_chatty_peer() {
    let server = EchoServer::start(Mode::Chatty);
    let (mut session, _) = common::session(
        Blocking,
        server.port(),
        common::trust_store(),
        SessionOptions::new().step_timeout(Duration::from_millis(300)),
    );

    block_on(async {
        open_and_exchange(&mut session).await;

        // Ticks arrive every 100 ms, well inside the 300 ms deadline.
        let started = Instant::now();
        let err = tokio_test::assert_err!(session.close(CloseCode::Normal).await);

        assert!(matches!(err, Error::Close { .. }));
        assert!(err.is_timeout());
        assert!(started.elapsed() < Duration::from_secs(2), "{:?}", started.elapsed());
        assert_eq!(session.ws_state(), WsState::Failed);
        assert!(!session.holds_transport());
    });
}

#[tokio::test]
async fn test_suspendable_ws_handshake_times_out_on_silent_upgrade() {
    let server = EchoServer::start(Mode::SilentUpgrade);
    let (mut session, _) = common::session(
        Suspendable,
        server.port(),
        common::trust_store(),
        SessionOptions::new().step_timeout(Duration::from_millis(300)),
    );

    let candidates = session.resolve().await.expect("resolve");
    session.connect(&candidates).await.expect("connect");
    session.configure_tls_identity().expect("SNI");
    session.tls_handshake().await.expect("TLS handshake");

    let started = Instant::now();
    let handshake = session.ws_handshake().await;

    let error = handshake.error.as_ref().expect("handshake fails");
    assert!(matches!(error, Error::Handshake { .. }));
    assert!(error.is_timeout());
    assert_eq!(handshake.status, None);
    assert!(started.elapsed() < Duration::from_secs(2), "{:?}", started.elapsed());
    assert_eq!(session.ws_state(), WsState::Failed);
    assert!(!session.holds_transport());
    assert!(server.requests().is_empty());
}

#[test]
fn test_blocking_ws_handshake_times_out_on_silent_upgrade() {
    let server = EchoServer::start(Mode::SilentUpgrade);
    let (mut session, _) = common::session(
        Blocking,
        server.port(),
        common::trust_store(),
        SessionOptions::new().step_timeout(Duration::from_millis(300)),
    );

    block_on(async {
        let candidates = session.resolve().await.expect("resolve");
        session.connect(&candidates).await.expect("connect");
        session.configure_tls_identity().expect("SNI");
        session.tls_handshake().await.expect("TLS handshake");

        let started = Instant::now();
        let handshake = session.ws_handshake().await;

        let error = handshake.error.as_ref().expect("handshake fails");
        assert!(matches!(error, Error::Handshake { .. }));
        assert!(error.is_timeout());
        assert!(started.elapsed() < Duration::from_secs(2), "{:?}", started.elapsed());
        assert_eq!(session.ws_state(), WsState::Failed);
        assert!(!session.holds_transport());
    });
}

#[test]
fn test_blocking_run_reports_handshake_timeout() {
    let server = EchoServer::start(Mode::SilentUpgrade);
    let (session, captured) = common::session(
        Blocking,
        server.port(),
        common::trust_store(),
        SessionOptions::new().step_timeout(Duration::from_millis(300)),
    );

    let outcome = block_on(session.run());

    let Outcome::Rejected { handshake } = outcome else {
        panic!("expected rejection, got {outcome:?}");
    };
    assert!(handshake.error.as_ref().is_some_and(Error::is_timeout));
    let lines = captured.lines_for(StrategyTag::Sync);
    assert!(!lines.iter().any(|l| l.contains("Hello, world!")));
}
