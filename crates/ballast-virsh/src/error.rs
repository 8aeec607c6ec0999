//! Error types for the hypervisor adapter.

use thiserror::Error;

/// Result type alias for adapter operations.
pub type Result<T> = std::result::Result<T, VirshError>;

/// Errors that can occur while talking to the hypervisor CLI.
#[derive(Debug, Error)]
pub enum VirshError {
    /// Command output did not match the expected grammar.
    #[error("malformed virsh output: {0}")]
    Parse(String),

    /// Subprocess exited non-zero.
    #[error("`{command}` exited with status {status}: {stderr}")]
    Command {
        /// The command line that was run.
        command: String,
        /// Exit status, -1 if killed by a signal.
        status: i32,
        /// Captured standard error, trimmed.
        stderr: String,
    },

    /// Argument rejected before any command ran.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Failed to spawn or read from the subprocess.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
