// Keystorage — Key Record Store
//
// Owns the keystore document for the life of the process and is the only
// way in to the keys. Every mutation is applied to the in-memory document,
// persisted atomically, and rolled back in memory if the save fails.
//
// Key design decisions:
//   - Nothing is encrypted or decrypted until `check_token()` (or
//     `generate_token()`) has established a live token for the session.
//   - Plaintext keys live in a `PlaintextCache` keyed by token epoch, never
//     in the persisted records.
//   - Lookups by key value use the per-record fingerprint. Records without
//     one fall back to decrypt-and-compare, which costs one decryption per
//     record and is only acceptable because a keystore holds a handful of
//     keys.

use std::path::Path;

use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use super::cache::PlaintextCache;
use super::file::KeystoreFile;
use super::models::{Account, KeyEntry, KeyRecord, KeyStoreDocument, KeySummary, UpdateOutcome};
use super::StoreError;
use crate::crypto::{self, add_hex_prefix, CryptoError, KeyGenerator, RandomKeyGenerator};

/// Length of generated access tokens.
pub const TOKEN_LEN: usize = 32;

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Operations the rest of a service may perform on managed keys.
pub trait KeyStore {
    /// Generate a new private key, store it encrypted, and return it.
    fn generate_new_key(&mut self, account: Option<&str>) -> Result<Zeroizing<String>, StoreError>;

    /// Store an existing private key. The key is normalized to a `0x` prefix.
    fn add_existing_key(&mut self, account: Option<&str>, private_key: &str)
        -> Result<(), StoreError>;

    /// The first stored key, decrypted.
    fn first(&mut self) -> Result<KeyEntry, StoreError>;

    /// The first key stored under `account`, decrypted.
    fn by_account(&mut self, account: &str) -> Result<KeyEntry, StoreError>;

    /// Whether any key is stored under `account`.
    fn exists(&self, account: &str) -> bool;

    /// Whether the keystore holds any key at all.
    fn has_keys(&self) -> bool;

    /// Mark the record holding `private_key` as registered.
    fn set_registered(&mut self, private_key: &str) -> Result<UpdateOutcome, StoreError>;

    /// Whether the record holding `private_key` is registered.
    /// `false` when no record holds it.
    fn is_registered(&mut self, private_key: &str) -> Result<bool, StoreError>;

    /// Record the block height for the selected key.
    fn set_block_number(&mut self, block_number: i64) -> Result<UpdateOutcome, StoreError>;

    /// Block height recorded for the selected key, if the selection matches a record.
    fn get_block_number(&mut self) -> Result<Option<i64>, StoreError>;

    /// Make `account`'s key the selected key, falling back to the first key
    /// when the account is missing, blank or unknown.
    fn select_private_key(&mut self, account: Option<&str>) -> Result<(), StoreError>;

    /// The selected key, if one has been selected this session.
    fn selected_private_key(&self) -> Option<&str>;

    /// Create a new access token, store its hash, and adopt it for the session.
    fn generate_token(&mut self) -> Result<Zeroizing<String>, StoreError>;

    /// Verify `token` against the stored hash and adopt it on success.
    fn check_token(&mut self, token: &str) -> Result<(), StoreError>;

    /// Non-secret summaries of every record, in insertion order.
    fn records(&self) -> Vec<KeySummary>;
}

// ─── File-backed Implementation ──────────────────────────────────────────────

pub struct FileKeyStore<G: KeyGenerator = RandomKeyGenerator> {
    file: KeystoreFile,
    document: KeyStoreDocument,
    token: Option<Zeroizing<String>>,
    selected: Option<Zeroizing<String>>,
    cache: PlaintextCache,
    generator: G,
}

impl FileKeyStore<RandomKeyGenerator> {
    /// Open (or create) the keystore at `path`.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        Self::open_with_generator(path, RandomKeyGenerator)
    }
}

impl<G: KeyGenerator> FileKeyStore<G> {
    /// Open (or create) the keystore at `path`, generating new keys with `generator`.
    pub fn open_with_generator(path: &Path, generator: G) -> Result<Self, StoreError> {
        let (file, document) = KeystoreFile::open(path)?;

        tracing::info!(
            path = %path.display(),
            keys = document.keys.len(),
            has_token = !document.hash.is_empty(),
            "Keystore opened"
        );

        Ok(Self {
            file,
            document,
            token: None,
            selected: None,
            cache: PlaintextCache::new(),
            generator,
        })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Whether an access token has ever been generated for this keystore.
    pub fn has_token(&self) -> bool {
        !self.document.hash.is_empty()
    }

    /// Whether this session holds a verified token.
    pub fn is_unlocked(&self) -> bool {
        self.token.is_some()
    }

    fn live_token(&self) -> Result<Zeroizing<String>, StoreError> {
        match &self.token {
            Some(token) => Ok(token.clone()),
            None => {
                tracing::warn!("Keystore is locked; the access token has not been checked");
                Err(StoreError::Auth)
            }
        }
    }

    /// Switch the session to `token`, dropping everything decrypted under
    /// the previous one.
    fn adopt_token(&mut self, token: Zeroizing<String>) {
        self.token = Some(token);
        self.selected = None;
        self.cache.advance_epoch();
        tracing::debug!(epoch = self.cache.epoch(), "Session token changed");
    }

    /// Apply `change` to the document and persist it. On a failed save the
    /// in-memory document is restored, so memory never runs ahead of disk.
    fn commit<F>(&mut self, change: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut KeyStoreDocument),
    {
        let snapshot = self.document.clone();
        change(&mut self.document);

        if let Err(e) = self.file.save(&self.document) {
            self.document = snapshot;
            return Err(e);
        }
        Ok(())
    }

    /// Replace a bcrypt token hash with Argon2id. The token has already been
    /// verified, so a failure here only leaves the old hash in place.
    fn upgrade_hash(&mut self, token: &str) {
        let upgraded = crypto::hash_token(token)
            .map_err(StoreError::from)
            .and_then(|hash| self.commit(|doc| doc.hash = hash));

        match upgraded {
            Ok(()) => tracing::info!("Legacy token hash upgraded to Argon2id"),
            Err(e) => tracing::warn!(error = %e, "Could not upgrade legacy token hash"),
        }
    }

    fn position(&self, account: &str) -> Option<usize> {
        self.document.keys.iter().position(|k| k.account == account)
    }

    /// Decrypt the record at `index`, consulting the session cache first.
    fn decrypt_at(&mut self, index: usize, token: &str) -> Result<Zeroizing<String>, StoreError> {
        if let Some(plaintext) = self.cache.get(index) {
            return Ok(plaintext.clone());
        }

        let record = self
            .document
            .keys
            .get(index)
            .ok_or_else(|| StoreError::NotFound(format!("record #{index}")))?;

        let bytes = crypto::decrypt(&record.cipher_private, token)?;

        if let Some(expected) = &record.fingerprint {
            let actual = crypto::fingerprint(&bytes, token)?;
            if !bool::from(actual.as_bytes().ct_eq(expected.as_bytes())) {
                return Err(CryptoError::Integrity.into());
            }
        }

        let plaintext = Zeroizing::new(
            std::str::from_utf8(&bytes)
                .map_err(|_| CryptoError::NotUtf8)?
                .to_string(),
        );

        self.cache.insert(index, plaintext.clone());
        Ok(plaintext)
    }

    fn entry_at(&mut self, index: usize) -> Result<KeyEntry, StoreError> {
        let token = self.live_token()?;
        let private = self.decrypt_at(index, &token)?;
        let record = &self.document.keys[index];

        Ok(KeyEntry {
            index,
            account: record.account.clone(),
            private,
            registered: record.registered,
            block_number: record.block_number,
        })
    }

    /// Index of the first record whose plaintext equals `private_key`.
    fn find_by_plaintext(
        &mut self,
        private_key: &str,
        token: &str,
    ) -> Result<Option<usize>, StoreError> {
        let wanted = crypto::fingerprint(private_key.as_bytes(), token)?;

        for index in 0..self.document.keys.len() {
            let stored = self.document.keys[index].fingerprint.clone();
            let matched = match stored {
                Some(fingerprint) => fingerprint.as_bytes().ct_eq(wanted.as_bytes()).into(),
                None => match self.decrypt_at(index, token) {
                    Ok(candidate) => candidate.as_bytes().ct_eq(private_key.as_bytes()).into(),
                    Err(e) => {
                        tracing::debug!(index, error = %e, "Skipping undecryptable record");
                        false
                    }
                },
            };

            if matched {
                return Ok(Some(index));
            }
        }

        Ok(None)
    }

    fn append_record(
        &mut self,
        account: Account,
        plaintext: Zeroizing<String>,
    ) -> Result<usize, StoreError> {
        let token = self.live_token()?;
        let cipher_private = crypto::encrypt(plaintext.as_bytes(), &token)?;
        let fingerprint = crypto::fingerprint(plaintext.as_bytes(), &token)?;
        let record = KeyRecord::new(&account, cipher_private, fingerprint);

        self.commit(|doc| doc.keys.push(record))?;

        let index = self.document.keys.len() - 1;
        self.cache.insert(index, plaintext);

        tracing::info!(account = %account, index, "Key stored");
        Ok(index)
    }
}

impl<G: KeyGenerator> KeyStore for FileKeyStore<G> {
    fn generate_new_key(&mut self, account: Option<&str>) -> Result<Zeroizing<String>, StoreError> {
        let account = Account::resolve(account);
        // Fail on a locked session before spending entropy on a key.
        self.live_token()?;

        let private_key = self.generator.generate()?;
        self.append_record(account, private_key.clone())?;
        Ok(private_key)
    }

    fn add_existing_key(
        &mut self,
        account: Option<&str>,
        private_key: &str,
    ) -> Result<(), StoreError> {
        let account = Account::resolve(account);
        let private_key = Zeroizing::new(add_hex_prefix(private_key));
        self.append_record(account, private_key)?;
        Ok(())
    }

    fn first(&mut self) -> Result<KeyEntry, StoreError> {
        if self.document.keys.is_empty() {
            return Err(StoreError::NotFound("keystore holds no keys".to_string()));
        }
        self.entry_at(0)
    }

    fn by_account(&mut self, account: &str) -> Result<KeyEntry, StoreError> {
        let index = self
            .position(account)
            .ok_or_else(|| StoreError::NotFound(format!("account '{account}'")))?;
        self.entry_at(index)
    }

    fn exists(&self, account: &str) -> bool {
        self.position(account).is_some()
    }

    fn has_keys(&self) -> bool {
        !self.document.keys.is_empty()
    }

    fn set_registered(&mut self, private_key: &str) -> Result<UpdateOutcome, StoreError> {
        let token = self.live_token()?;
        let private_key = Zeroizing::new(add_hex_prefix(private_key));

        let Some(index) = self.find_by_plaintext(&private_key, &token)? else {
            tracing::debug!("No stored key matches; registration unchanged");
            return Ok(UpdateOutcome::NoMatch);
        };

        if !self.document.keys[index].registered {
            self.commit(|doc| doc.keys[index].registered = true)?;
            tracing::info!(index, "Key marked registered");
        }
        Ok(UpdateOutcome::Updated)
    }

    fn is_registered(&mut self, private_key: &str) -> Result<bool, StoreError> {
        let token = self.live_token()?;
        let private_key = Zeroizing::new(add_hex_prefix(private_key));

        Ok(self
            .find_by_plaintext(&private_key, &token)?
            .is_some_and(|index| self.document.keys[index].registered))
    }

    fn set_block_number(&mut self, block_number: i64) -> Result<UpdateOutcome, StoreError> {
        let token = self.live_token()?;
        let Some(selected) = self.selected.clone() else {
            return Ok(UpdateOutcome::NoMatch);
        };

        let Some(index) = self.find_by_plaintext(&selected, &token)? else {
            return Ok(UpdateOutcome::NoMatch);
        };

        self.commit(|doc| doc.keys[index].block_number = block_number)?;
        tracing::debug!(index, block_number, "Block number recorded");
        Ok(UpdateOutcome::Updated)
    }

    fn get_block_number(&mut self) -> Result<Option<i64>, StoreError> {
        let token = self.live_token()?;
        let Some(selected) = self.selected.clone() else {
            return Ok(None);
        };

        Ok(self
            .find_by_plaintext(&selected, &token)?
            .map(|index| self.document.keys[index].block_number))
    }

    fn select_private_key(&mut self, account: Option<&str>) -> Result<(), StoreError> {
        let token = self.live_token()?;
        let requested = account.map(str::trim).filter(|a| !a.is_empty());

        let index = match requested.and_then(|a| self.position(a)) {
            Some(index) => index,
            None if self.document.keys.is_empty() => {
                return Err(StoreError::NotFound("keystore holds no keys".to_string()));
            }
            None => {
                if let Some(account) = requested {
                    tracing::debug!(account, "Account not found; selecting the first key");
                }
                0
            }
        };

        let private_key = self.decrypt_at(index, &token)?;
        self.selected = Some(private_key);

        tracing::info!(
            account = %self.document.keys[index].account,
            index,
            "Private key selected"
        );
        Ok(())
    }

    fn selected_private_key(&self) -> Option<&str> {
        self.selected.as_ref().map(|key| key.as_str())
    }

    fn generate_token(&mut self) -> Result<Zeroizing<String>, StoreError> {
        let new_token = crypto::random_token(TOKEN_LEN);
        let hash = crypto::hash_token(&new_token)?;

        // Existing keys are re-encrypted under the new token, which needs
        // the current one.
        let mut rotated = Vec::with_capacity(self.document.keys.len());
        if !self.document.keys.is_empty() {
            let old_token = self.live_token()?;
            for index in 0..self.document.keys.len() {
                let plaintext = self.decrypt_at(index, &old_token)?;
                let mut record = self.document.keys[index].clone();
                record.cipher_private = crypto::encrypt(plaintext.as_bytes(), &new_token)?;
                record.fingerprint = Some(crypto::fingerprint(plaintext.as_bytes(), &new_token)?);
                rotated.push(record);
            }
        }

        let rotated_count = rotated.len();
        self.commit(|doc| {
            doc.hash = hash;
            doc.keys = rotated;
        })?;
        self.adopt_token(new_token.clone());

        tracing::info!(rotated = rotated_count, "Access token generated");
        Ok(new_token)
    }

    fn check_token(&mut self, token: &str) -> Result<(), StoreError> {
        if !crypto::verify_token(token, &self.document.hash) {
            tracing::warn!("Access token rejected");
            return Err(StoreError::Auth);
        }

        let unchanged = self
            .token
            .as_ref()
            .is_some_and(|live| bool::from(live.as_bytes().ct_eq(token.as_bytes())));
        if !unchanged {
            self.adopt_token(Zeroizing::new(token.to_string()));
        }

        if crypto::is_legacy_hash(&self.document.hash) {
            self.upgrade_hash(token);
        }

        tracing::info!("Access token verified");
        Ok(())
    }

    fn records(&self) -> Vec<KeySummary> {
        self.document
            .keys
            .iter()
            .enumerate()
            .map(|(index, record)| KeySummary {
                index,
                account: record.account.clone(),
                registered: record.registered,
                block_number: record.block_number,
            })
            .collect()
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
