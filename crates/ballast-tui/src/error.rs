//! Error types for the TUI runtime.

use thiserror::Error;

/// Result type alias for TUI operations.
pub type Result<T> = std::result::Result<T, TuiError>;

/// Errors that can occur in the event loop and terminal handling.
#[derive(Debug, Error)]
pub enum TuiError {
    /// `run_loop` was entered while another loop owns the queue.
    #[error("event loop is already running")]
    LoopBusy,

    /// A producer posted an error event; the loop terminated.
    #[error("event loop aborted: {0}")]
    Aborted(String),

    /// Terminal I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
