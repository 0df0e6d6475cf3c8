// Keystorage — Key record data models
//
// SECURITY: the persisted types cannot hold plaintext. The `private` and
// `selected_private_key` fields exist on disk for format compatibility but
// are typed as `Blank`, which always serializes as "" and discards whatever
// it reads. Decrypted keys only ever live in `KeyEntry`, whose Debug output
// is redacted.

use std::fmt;

use serde::de::IgnoredAny;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use zeroize::Zeroizing;

/// Account label used when a key is stored without one.
pub const DEFAULT_ACCOUNT: &str = "autogenerated";

// ─── Account ─────────────────────────────────────────────────────────────────

/// An account label, resolved once at the API boundary.
///
/// A missing or blank label becomes [`DEFAULT_ACCOUNT`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Account(String);

impl Account {
    pub fn resolve(label: Option<&str>) -> Self {
        match label.map(str::trim) {
            Some(label) if !label.is_empty() => Self(label.to_string()),
            _ => Self(DEFAULT_ACCOUNT.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Account {
    fn default() -> Self {
        Self(DEFAULT_ACCOUNT.to_string())
    }
}

impl fmt::Display for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ─── Blank ───────────────────────────────────────────────────────────────────

/// A field that is always written as an empty string and never read back.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Blank;

impl Serialize for Blank {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str("")
    }
}

impl<'de> Deserialize<'de> for Blank {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        IgnoredAny::deserialize(deserializer)?;
        Ok(Blank)
    }
}

// ─── Persisted Records ───────────────────────────────────────────────────────

/// One managed key as it is stored on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyRecord {
    #[serde(default = "default_account", deserialize_with = "account_or_default")]
    pub account: String,
    /// base64url(IV || AES-256-CFB ciphertext) of the private key.
    pub cipher_private: String,
    #[serde(default)]
    private: Blank,
    #[serde(default)]
    pub registered: bool,
    #[serde(default)]
    pub block_number: i64,
    /// Keyed fingerprint of the plaintext; absent on records from older files.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,
}

impl KeyRecord {
    pub fn new(account: &Account, cipher_private: String, fingerprint: String) -> Self {
        Self {
            account: account.as_str().to_string(),
            cipher_private,
            private: Blank,
            registered: false,
            block_number: 0,
            fingerprint: Some(fingerprint),
        }
    }
}

/// The persisted root object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyStoreDocument {
    /// Older files stored the live token here. It is dropped on read and
    /// never written.
    #[serde(default, skip_serializing)]
    token: Blank,
    /// Argon2id PHC hash of the access token; empty until a token exists.
    #[serde(default)]
    pub hash: String,
    #[serde(default)]
    selected_private_key: Blank,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub keys: Vec<KeyRecord>,
}

fn default_account() -> String {
    DEFAULT_ACCOUNT.to_string()
}

fn account_or_default<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    let label = Option::<String>::deserialize(deserializer)?;
    Ok(Account::resolve(label.as_deref()).0)
}

fn null_as_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<KeyRecord>, D::Error> {
    Ok(Option::<Vec<KeyRecord>>::deserialize(deserializer)?.unwrap_or_default())
}

// ─── Decrypted Views ─────────────────────────────────────────────────────────

/// A key record together with its decrypted private key.
/// The `private` field is NEVER printed by Debug.
pub struct KeyEntry {
    /// Position in insertion order; stable for the life of the file.
    pub index: usize,
    pub account: String,
    pub private: Zeroizing<String>,
    pub registered: bool,
    pub block_number: i64,
}

impl fmt::Debug for KeyEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyEntry")
            .field("index", &self.index)
            .field("account", &self.account)
            .field("private", &"[REDACTED]")
            .field("registered", &self.registered)
            .field("block_number", &self.block_number)
            .finish()
    }
}

/// A lightweight view of a record, used for listing. Never holds key material.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeySummary {
    pub index: usize,
    pub account: String,
    pub registered: bool,
    pub block_number: i64,
}

impl fmt::Display for KeySummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} (registered: {}, block: {})",
            self.index, self.account, self.registered, self.block_number
        )
    }
}

/// Result of a mutation that locates its target by key value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The matching record was changed and persisted.
    Updated,
    /// No record holds the requested key; nothing was written.
    NoMatch,
}

// ─── Tests ───────────────────────────────────────────────────────────────────
