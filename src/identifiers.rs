//! Type-safe identifiers.
//!
//! Newtype wrappers prevent mixing identifiers with arbitrary strings.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use uuid::Uuid;

// ============================================================================
// SessionId
// ============================================================================

/// Identifier of one session run.
///
/// Attached to every log record the session emits, so the records of
/// concurrently running sessions can be told apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Generates a new random session ID.
    #[inline]
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying UUID.
    #[inline]
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // First group is enough to correlate log lines.
        let simple = self.0.simple().to_string();
        f.write_str(&simple[..8])
    }
}

// ============================================================================
// Tests
// ============================================================================
