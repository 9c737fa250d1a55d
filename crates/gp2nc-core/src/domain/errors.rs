//! Domain error types
//!
//! Validation failures raised while constructing domain values. I/O and
//! remote failures live in the engine and adapter crates.

use thiserror::Error;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Invalid content hash (expected 32 lowercase hex digits)
    #[error("Invalid content hash: {0}")]
    InvalidHash(String),

    /// Invalid remote path format
    #[error("Invalid remote path: {0}")]
    InvalidRemotePath(String),

    /// A progress record could not be decoded in any known format
    #[error("Invalid progress record: {0}")]
    InvalidProgressRecord(String),

    /// Generic validation failure
    #[error("Validation failed: {0}")]
    ValidationFailed(String),
}
