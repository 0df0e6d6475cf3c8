// Keystorage — Configuration
//
// Resolved once in `main` and passed down. The keystore path comes from
// `--keystore`, then `KEYSTORAGE_PATH`, then the platform data directory.
// The access token comes from `--token` or `KEYSTORAGE_TOKEN` and is held
// in a zeroizing buffer.

use std::fmt;
use std::path::PathBuf;

use zeroize::Zeroizing;

use crate::error::{KeystorageError, Result};

/// Environment variable overriding the keystore location.
pub const PATH_ENV: &str = "KEYSTORAGE_PATH";

/// Environment variable carrying the access token.
pub const TOKEN_ENV: &str = "KEYSTORAGE_TOKEN";

/// Default directory for Keystorage data files.
pub fn data_dir() -> PathBuf {
    let base = dirs_next::data_dir().unwrap_or_else(|| PathBuf::from("."));
    base.join("keystorage")
}

/// Default location of the keystore document.
pub fn default_keystore_path() -> PathBuf {
    data_dir().join("keystore.json")
}

#[derive(Clone)]
pub struct Config {
    pub keystore_path: PathBuf,
    token: Option<Zeroizing<String>>,
}

impl Config {
    /// Build the configuration from already-parsed arguments. A blank token
    /// counts as no token.
    pub fn resolve(keystore: Option<PathBuf>, token: Option<String>) -> Self {
        Self {
            keystore_path: keystore.unwrap_or_else(default_keystore_path),
            token: token
                .filter(|t| !t.trim().is_empty())
                .map(Zeroizing::new),
        }
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_ref().map(|t| t.as_str())
    }

    /// The access token, or a configuration error naming where to supply it.
    pub fn require_token(&self) -> Result<&str> {
        self.token().ok_or_else(|| {
            KeystorageError::Config(format!(
                "an access token is required: pass --token or set {}",
                TOKEN_ENV
            ))
        })
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("keystore_path", &self.keystore_path)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}
