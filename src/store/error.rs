// Keystorage — Store error types
//
// The five kinds callers of the store ever see. `Auth` is a unit variant so
// a wrong token, a malformed stored hash and a locked session are
// indistinguishable from the outside.

use thiserror::Error;

use crate::crypto::CryptoError;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed keystore document: {0}")]
    Format(String),

    #[error("Cryptographic error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("Access token verification failed")]
    Auth,

    #[error("Key not found: {0}")]
    NotFound(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        if e.is_io() {
            StoreError::Io(e.into())
        } else {
            StoreError::Format(e.to_string())
        }
    }
}
