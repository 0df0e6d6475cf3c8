// Keystorage — Library root
//
// Re-exports the crypto, store, configuration and CLI modules.

pub mod cli;
pub mod config;
pub mod crypto;
pub mod error;
pub mod store;

pub use config::Config;
pub use error::{KeystorageError, Result};
pub use store::{FileKeyStore, KeyStore, StoreError, UpdateOutcome};
