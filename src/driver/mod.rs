//! Process-level driver.
//!
//! # Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Driver`] | Runs the `[sync]` and `[async]` sessions |
//! | [`DriverBuilder`] | Fluent configuration builder |

// ============================================================================
// Submodules
// ============================================================================

/// Fluent builder pattern for driver configuration.
pub mod builder;

/// Core driver implementation.
pub mod core;

// ============================================================================
// Re-exports
// ============================================================================

pub use self::core::Driver;
pub use builder::DriverBuilder;
