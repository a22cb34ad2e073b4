//! # ace-hooks
//!
//! Context-engineering hook pipeline for AI coding assistants.
//!
//! ace-hooks instruments Claude Code with a closed learning loop: before each
//! task it retrieves learned patterns from an external store and injects them
//! into context, during the task it accumulates ground-truth tool-call data,
//! and at task end it submits an execution trace back to the store so the
//! store can reinforce the patterns that helped.
//!
//! ## Architecture
//!
//! ```text
//! user prompt → UserPromptHandler (search + pin + inject + log)
//!     every tool → PostToolUseHandler (append to accumulator)
//! end of task → StopHandler (trajectory → quality gates → learn → clear)
//!
//! pre-compact  → PreCompactHandler (re-recall, write handoff file)
//! new session  → SessionStartHandler (read handoff, inject, delete)
//! ```
//!
//! All inter-hook state lives on disk; each hook is a short-lived process.
//! Hooks never exit nonzero and never block the user.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]
#![allow(clippy::multiple_crate_versions)]

use thiserror::Error as ThisError;

// Module declarations
pub mod accumulator;
pub mod config;
pub mod git;
pub mod hooks;
pub mod insights;
pub mod models;
pub mod paths;
pub mod relevance;
pub mod session;
pub mod store;

// Re-exports for convenience
pub use accumulator::ToolAccumulator;
pub use config::{ProjectContext, Verbosity};
pub use hooks::{
    HookHandler, PermissionHandler, PostToolUseHandler, PreCompactHandler, SessionStartHandler,
    StopHandler, UserPromptHandler,
};
pub use models::{ExecutionTrace, Pattern, SearchResponse, TrajectoryStep};
pub use relevance::RelevanceLogger;
pub use store::StoreCli;

/// Error type for ace-hooks operations.
///
/// Uses `thiserror` for automatic `Display` and `Error` trait implementations.
/// Hook entry points catch every variant and degrade to an informational
/// system message; errors never propagate to the host.
#[derive(Debug, ThisError)]
pub enum Error {
    /// Invalid input was provided.
    ///
    /// Raised when:
    /// - A hook event is missing required fields
    /// - JSON deserialization fails on a payload we must understand
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// An operation failed.
    ///
    /// Raised when:
    /// - `SQLite` accumulator operations fail
    /// - Filesystem I/O errors occur on handoff files
    /// - Response serialization fails
    #[error("operation '{operation}' failed: {cause}")]
    OperationFailed {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },

    /// The external pattern-store CLI is not installed or not runnable.
    #[error("store CLI unavailable: {0}")]
    CliUnavailable(String),

    /// A subprocess exceeded its deadline and was killed.
    #[error("operation '{operation}' timed out after {secs}s")]
    Timeout {
        /// The operation that timed out.
        operation: String,
        /// The timeout that was exceeded, in seconds.
        secs: u64,
    },
}

/// Result type alias for ace-hooks operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::InvalidInput("missing session_id".to_string());
        assert_eq!(err.to_string(), "invalid input: missing session_id");

        let err = Error::OperationFailed {
            operation: "append_tool".to_string(),
            cause: "disk full".to_string(),
        };
        assert_eq!(err.to_string(), "operation 'append_tool' failed: disk full");

        let err = Error::Timeout {
            operation: "learn".to_string(),
            secs: 300,
        };
        assert_eq!(err.to_string(), "operation 'learn' timed out after 300s");
    }
}
