//! Error types for the sampling cache.

use thiserror::Error;

/// Result type alias for cache operations.
pub type Result<T> = std::result::Result<T, CacheError>;

/// Errors that can occur while refreshing or writing through the cache.
#[derive(Debug, Error)]
pub enum CacheError {
    /// A write operation was handed values outside the permitted range.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The hypervisor adapter failed.
    #[error(transparent)]
    Virsh(#[from] ballast_virsh::VirshError),

    /// Host sampling failed.
    #[error(transparent)]
    Host(#[from] ballast_hostinfo::HostInfoError),
}
