// Keystorage — Store Module
//
// Account-keyed key records encrypted under a token-derived key, persisted
// as a single JSON document guarded by an exclusive file lock.

mod cache;
mod error;
mod file;
mod keystore;
mod lock;
mod models;

pub use error::StoreError;
pub use file::{read_document, write_document};
pub use keystore::{FileKeyStore, KeyStore, TOKEN_LEN};
pub use lock::lock_path;
pub use models::{
    Account, KeyEntry, KeyRecord, KeyStoreDocument, KeySummary, UpdateOutcome, DEFAULT_ACCOUNT,
};
