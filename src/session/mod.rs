//! WebSocket-over-TLS session.
//!
//! # Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Session`] | Step-by-step state machine and full run |
//! | [`Endpoint`] | Validated host and port |
//! | [`SessionOptions`] | Path, decorator, deadlines, limits |
//! | [`RequestDecorator`] | Transform of the upgrade request |
//! | [`TransportState`] / [`WsState`] | Progress of each layer |
//! | [`HandshakeOutcome`] / [`Outcome`] | Reported results |
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use wss_probe::{Console, Endpoint, Session, Suspendable, TrustStore};
//!
//! # async fn example() -> wss_probe::Result<()> {
//! let session = Session::new(
//!     Suspendable,
//!     Endpoint::new("echo.websocket.org", 443)?,
//!     Arc::new(TrustStore::load()?),
//!     Arc::new(Console::stdout()),
//! )
//! .with_text("Hello, world!");
//!
//! let outcome = session.run().await;
//! assert_eq!(outcome.reply(), Some("Hello, world!"));
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Submodules
// ============================================================================

/// Session state machine.
pub mod core;

/// Opening handshake request decorators.
pub mod decorator;

/// Remote endpoint.
pub mod endpoint;

/// Per-session options.
pub mod options;

/// Session states and results.
pub mod state;

// ============================================================================
// Re-exports
// ============================================================================

pub use self::core::Session;
pub use decorator::{DEFAULT_USER_AGENT, RequestDecorator, UserAgent};
pub use endpoint::{Endpoint, build_host_header};
pub use options::{DEFAULT_MAX_MESSAGE_SIZE, DEFAULT_STEP_TIMEOUT, SessionOptions};
pub use state::{HandshakeOutcome, Outcome, TransportState, WsState};
