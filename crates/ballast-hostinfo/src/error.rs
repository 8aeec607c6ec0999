//! Error types for host sampling.

use thiserror::Error;

/// Result type alias for host sampling operations.
pub type Result<T> = std::result::Result<T, HostInfoError>;

/// Errors that can occur while sampling host counters.
#[derive(Debug, Error)]
pub enum HostInfoError {
    /// A kernel counter file or `df` output did not match the expected
    /// format.
    #[error("malformed host data: {0}")]
    Parse(String),

    /// `df` exited non-zero.
    #[error("`{command}` exited with status {status}: {stderr}")]
    Command {
        /// The command line that was run.
        command: String,
        /// Exit status, -1 if killed by a signal.
        status: i32,
        /// Captured standard error, trimmed.
        stderr: String,
    },

    /// Failed to read a counter file or spawn `df`.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
