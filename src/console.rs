//! Serialized console output.
//!
//! Sessions running on different threads share one [`Console`]. The sink
//! is locked for exactly one `println` call, so lines from the `[sync]` and
//! `[async]` sessions never interleave.
//!
//! # Example
//!
//! ```
//! use wss_probe::{Console, StrategyTag};
//!
//! let (console, captured) = Console::captured();
//! console.println(StrategyTag::Sync, "The operation completed successfully");
//!
//! assert_eq!(captured.contents(), "[sync] The operation completed successfully\n");
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::io::{self, Write};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::warn;

// ============================================================================
// StrategyTag
// ============================================================================

/// Prefix identifying which execution strategy produced a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StrategyTag {
    /// Blocking strategy on a worker thread.
    Sync,
    /// Suspendable strategy on the event loop.
    Async,
}

impl StrategyTag {
    /// Returns the bare tag name.
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sync => "sync",
            Self::Async => "async",
        }
    }
}

impl fmt::Display for StrategyTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.as_str())
    }
}

// ============================================================================
// Console
// ============================================================================

/// Lock-guarded line sink.
pub struct Console {
    /// Underlying writer.
    sink: Mutex<Box<dyn Write + Send>>,
}

impl fmt::Debug for Console {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Console").finish_non_exhaustive()
    }
}

impl Console {
    /// Creates a console writing to `writer`.
    #[must_use]
    pub fn new(writer: impl Write + Send + 'static) -> Self {
        Self {
            sink: Mutex::new(Box::new(writer)),
        }
    }

    /// Creates a console writing to standard output.
    #[must_use]
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }

    /// Creates a console writing to memory, plus a handle to read it back.
    #[must_use]
    pub fn captured() -> (Self, CapturedOutput) {
        let captured = CapturedOutput::default();
        (Self::new(captured.clone()), captured)
    }

    /// Writes one tagged entry.
    ///
    /// Multi-line values get the tag on every line. The whole entry is
    /// written under a single lock acquisition.
    pub fn println(&self, tag: StrategyTag, value: impl fmt::Display) {
        let text = value.to_string();
        let mut entry = String::with_capacity(text.len() + 8);

        for line in text.lines() {
            entry.push_str(&format!("{tag} {line}\n"));
        }
        if entry.is_empty() {
            entry.push_str(&format!("{tag}\n"));
        }

        let mut sink = self.sink.lock();
        if let Err(e) = sink.write_all(entry.as_bytes()).and_then(|()| sink.flush()) {
            warn!(error = %e, "Console write failed");
        }
    }
}

// ============================================================================
// CapturedOutput
// ============================================================================

/// In-memory console sink.
#[derive(Debug, Clone, Default)]
pub struct CapturedOutput {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl CapturedOutput {
    /// Returns everything written so far.
    #[must_use]
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.buffer.lock()).into_owned()
    }

    /// Returns the captured lines carrying `tag`, with the tag stripped.
    #[must_use]
    pub fn lines_for(&self, tag: StrategyTag) -> Vec<String> {
        let prefix = format!("{tag} ");
        self.contents()
            .lines()
            .filter_map(|line| line.strip_prefix(&prefix).map(str::to_owned))
            .collect()
    }
}

impl Write for CapturedOutput {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
