// Keystorage — Top-level error types
//
// Aggregates errors from the store module and the command-line boundary
// into a single error enum.

use thiserror::Error;

/// Top-level error type for all Keystorage operations.
#[derive(Debug, Error)]
pub enum KeystorageError {
    #[error("Store error: {0}")]
    Store(#[from] crate::store::StoreError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, KeystorageError>;
