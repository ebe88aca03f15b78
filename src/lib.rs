//! wss-probe - WebSocket-over-TLS client sessions.
//!
//! This library opens a WebSocket over TLS, sends one text message, reads
//! one reply and closes the connection, running the same step sequence
//! under two execution strategies.
//!
//! # Architecture
//!
//! One step sequence, two ways of waiting:
//!
//! - **[`Session`]**: DNS → TCP → TLS → WebSocket handshake → send →
//!   receive → close, as a state machine with one method per step
//! - **[`Strategy`]**: the I/O behind each step, either [`Blocking`]
//!   (occupies the thread) or [`Suspendable`] (yields to a tokio event loop)
//! - **[`Driver`]**: runs a `[sync]` session on a worker thread and an
//!   `[async]` session on a current-thread event loop side by side
//!
//! Sessions share only the read-only [`TrustStore`] and the lock-guarded
//! [`Console`].
//!
//! # Quick Start
//!
//! ```no_run
//! use wss_probe::{Driver, Result};
//!
//! fn main() -> Result<()> {
//!     let driver = Driver::builder()
//!         .host("echo.websocket.org")
//!         .port(443)
//!         .text("Hello, world!")
//!         .build()?;
//!
//!     // Prints "[sync] ..." and "[async] ..." lines
//!     driver.run()
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`console`] | Serialized, tagged console output |
//! | [`driver`] | Process-level driver and builder |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`session`] | Session state machine, endpoint, options |
//! | [`strategy`] | Blocking and suspendable I/O |
//! | [`trust`] | Trusted root certificates |

// ============================================================================
// Modules
// ============================================================================

/// Serialized console output.
pub mod console;

/// Process-level driver.
///
/// Use [`Driver::builder()`] to create a configured driver instance.
pub mod driver;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe identifiers.
pub mod identifiers;

/// WebSocket-over-TLS session.
pub mod session;

/// Execution strategies.
pub mod strategy;

/// Trusted root certificates.
pub mod trust;

// ============================================================================
// Re-exports
// ============================================================================

// Console types
pub use console::{CapturedOutput, Console, StrategyTag};

// Driver types
pub use driver::{Driver, DriverBuilder};

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::SessionId;

// Session types
pub use session::{
    Endpoint, HandshakeOutcome, Outcome, RequestDecorator, Session, SessionOptions,
    TransportState, UserAgent, WsState, build_host_header,
};

// Strategy types
pub use strategy::{Blocking, Strategy, Suspendable};

// Trust types
pub use trust::TrustStore;

// Protocol types callers need to drive steps by hand
pub use tungstenite::Message;
pub use tungstenite::protocol::frame::coding::CloseCode;
