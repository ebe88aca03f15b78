//! Process-level driver.
//!
//! The [`Driver`] runs the same exchange twice at once: a `[sync]`
//! session on a dedicated worker thread and an `[async]` session on a
//! single-threaded event loop. The two share only the trust store and the
//! console.
//!
//! # Example
//!
//! ```no_run
//! use wss_probe::Driver;
//!
//! # fn example() -> wss_probe::Result<()> {
//! let driver = Driver::builder()
//!     .host("echo.websocket.org")
//!     .port(443)
//!     .text("Hello, world!")
//!     .build()?;
//!
//! driver.run()?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::thread;

use futures_executor::block_on;
use tokio::runtime::{Builder as RuntimeBuilder, Runtime};
use tokio::task::LocalSet;
use tracing::{debug, error, info};

use crate::console::Console;
use crate::error::Result;
use crate::session::{Endpoint, Outcome, Session, SessionOptions};
use crate::strategy::{Blocking, Strategy, Suspendable};
use crate::trust::TrustStore;

use super::builder::DriverBuilder;

// ============================================================================
// Constants
// ============================================================================

/// Name of the thread running the blocking session.
const WORKER_THREAD_NAME: &str = "wss-sync";

// ============================================================================
// Types
// ============================================================================

/// Shared state for the driver.
pub(crate) struct DriverInner {
    /// Remote service.
    pub endpoint: Endpoint,

    /// Text each session sends.
    pub text: String,

    /// Options applied to every session.
    pub options: SessionOptions,

    /// Roots shared read-only by all sessions.
    pub trust_store: Arc<TrustStore>,

    /// Serialized output sink.
    pub console: Arc<Console>,
}

// ============================================================================
// Driver
// ============================================================================

/// Runs sessions under both execution strategies.
///
/// The driver is responsible for:
/// - Creating sessions that share one trust store and console
/// - Running the blocking session on its own thread
/// - Running the suspendable session on a current-thread event loop
#[derive(Clone)]
pub struct Driver {
    /// Shared inner state.
    pub(crate) inner: Arc<DriverInner>,
}

// ============================================================================
// Driver - Display
// ============================================================================

impl fmt::Debug for Driver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Driver")
            .field("endpoint", &self.inner.endpoint)
            .field("options", &self.inner.options)
            .field("trust_store", &self.inner.trust_store)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Driver - Public API
// ============================================================================

impl Driver {
    /// Creates a configuration builder for the driver.
    #[inline]
    #[must_use]
    pub fn builder() -> DriverBuilder {
        DriverBuilder::new()
    }

    /// Returns the remote endpoint.
    #[inline]
    #[must_use]
    pub fn endpoint(&self) -> &Endpoint {
        &self.inner.endpoint
    }

    /// Creates a fresh session for `strategy`.
    ///
    /// Each call yields an independent session; retrying means calling
    /// this again.
    #[must_use]
    pub fn session<S: Strategy>(&self, strategy: S) -> Session<S> {
        Session::new(
            strategy,
            self.inner.endpoint.clone(),
            Arc::clone(&self.inner.trust_store),
            Arc::clone(&self.inner.console),
        )
        .with_options(self.inner.options.clone())
        .with_text(self.inner.text.clone())
    }

    /// Runs the `[sync]` and `[async]` sessions concurrently.
    ///
    /// The `[async]` session is detached: its result is only visible on
    /// the console and in the log. Returns once the event loop has run
    /// out of work and the worker thread has finished.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`](crate::Error::Io) if the worker thread or the
    /// event loop cannot be created. Session failures are not errors.
    pub fn run(&self) -> Result<()> {
        self.run_on(event_loop)
    }

    /// Runs one blocking session on the calling thread.
    #[must_use]
    pub fn run_blocking(&self) -> Outcome {
        block_on(self.session(Blocking).run())
    }

    /// Runs one suspendable session on a new event loop and returns its
    /// outcome.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`](crate::Error::Io) if the event loop cannot be
    /// created.
    pub fn run_suspendable(&self) -> Result<Outcome> {
        let runtime = event_loop()?;
        Ok(runtime.block_on(self.session(Suspendable).run()))
    }
}

// ============================================================================
// Driver - Internal API
// ============================================================================

impl Driver {
    /// Runs both sessions on the event loop returned by `make_loop`.
    ///
    /// No session starts unless the event loop exists.
    fn run_on(&self, make_loop: impl FnOnce() -> Result<Runtime>) -> Result<()> {
        let runtime = make_loop()?;

        let session = self.session(Blocking);
        let worker = thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_string())
            .spawn(move || block_on(session.run()))?;

        let local = LocalSet::new();

        // Fire and forget: the handle is dropped.
        drop(local.spawn_local(self.session(Suspendable).run()));
        runtime.block_on(local);
        debug!("Event loop drained");

        match worker.join() {
            Ok(outcome) => debug!(completed = outcome.is_completed(), "Worker finished"),
            Err(_) => error!(thread = WORKER_THREAD_NAME, "Worker panicked"),
        }

        info!(endpoint = %self.inner.endpoint, "Driver finished");
        Ok(())
    }

    /// Creates a driver from validated parts.
    pub(crate) fn new(
        endpoint: Endpoint,
        text: String,
        options: SessionOptions,
        trust_store: Arc<TrustStore>,
        console: Arc<Console>,
    ) -> Self {
        let inner = Arc::new(DriverInner {
            endpoint,
            text,
            options,
            trust_store,
            console,
        });

        debug!(
            endpoint = %inner.endpoint,
            roots = inner.trust_store.len(),
            "Driver initialized"
        );

        Self { inner }
    }
}

/// Builds the single-threaded scheduler for suspendable sessions.
fn event_loop() -> Result<Runtime> {
    Ok(RuntimeBuilder::new_current_thread().enable_all().build()?)
}

// ============================================================================
// Tests
// ============================================================================
