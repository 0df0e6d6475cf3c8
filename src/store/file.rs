// Keystorage — Persistence Backend
//
// Loads the keystore document from its JSON file, creating an empty one on
// first use, and rewrites it after every mutation. Rewrites never touch the
// live file in place: the new document goes to a sibling temp file which is
// fsynced and then renamed over the original, so a crash leaves either the
// old or the new document and never a truncated mix of both.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use super::lock::KeystoreLock;
use super::models::KeyStoreDocument;
use super::StoreError;

/// The keystore file, held open under an exclusive lock.
#[derive(Debug)]
pub struct KeystoreFile {
    path: PathBuf,
    _lock: KeystoreLock,
}

impl KeystoreFile {
    /// Lock the keystore at `path` and load its document.
    ///
    /// A missing file is created holding an empty document. An unreadable
    /// document is reported as `StoreError::Format`; it is left untouched on
    /// disk so the operator can decide what to do with it.
    pub fn open(path: &Path) -> Result<(Self, KeyStoreDocument), StoreError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let lock = KeystoreLock::acquire(path)?;
        tracing::debug!(lock = %lock.path().display(), "Keystore lock acquired");

        let document = if path.try_exists()? {
            tracing::debug!(path = %path.display(), "Reading keystore file");
            read_document(path).inspect_err(|e| {
                tracing::warn!(path = %path.display(), error = %e, "Keystore file is unreadable");
            })?
        } else {
            tracing::info!(path = %path.display(), "Creating new keystore file");
            let document = KeyStoreDocument::default();
            write_document(path, &document)?;
            document
        };

        Ok((
            Self {
                path: path.to_path_buf(),
                _lock: lock,
            },
            document,
        ))
    }

    /// Atomically replace the file's contents with `document`.
    pub fn save(&self, document: &KeyStoreDocument) -> Result<(), StoreError> {
        write_document(&self.path, document)?;
        tracing::debug!(
            path = %self.path.display(),
            keys = document.keys.len(),
            "Keystore saved"
        );
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Read and parse a keystore document.
pub fn read_document(path: &Path) -> Result<KeyStoreDocument, StoreError> {
    let data = fs::read(path)?;
    Ok(serde_json::from_slice(&data)?)
}

/// Write a keystore document via temp file, fsync and rename.
pub fn write_document(path: &Path, document: &KeyStoreDocument) -> Result<(), StoreError> {
    let data = serde_json::to_vec_pretty(document)?;
    let temp = temp_path(path);

    let written = write_synced(&temp, &data).and_then(|()| fs::rename(&temp, path));
    if let Err(e) = written {
        let _ = fs::remove_file(&temp);
        return Err(e.into());
    }

    sync_parent_dir(path);
    Ok(())
}

/// Sibling temp file in the same directory, so the rename stays on one
/// filesystem.
fn temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "keystore".to_string());
    path.with_file_name(format!(".{}.tmp", name))
}

fn write_synced(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);

    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(path)?;
    file.write_all(data)?;
    file.sync_all()
}

/// Make the rename itself durable. Failure here only weakens durability of
/// the latest save, so it is logged rather than returned.
fn sync_parent_dir(path: &Path) {
    #[cfg(unix)]
    {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            if let Err(e) = File::open(parent).and_then(|dir| dir.sync_all()) {
                tracing::debug!(error = %e, "Could not fsync keystore directory");
            }
        }
    }
    #[cfg(not(unix))]
    let _ = path;
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::models::{Account, KeyRecord};

    fn sample_document(n: usize) -> KeyStoreDocument {
        let mut doc = KeyStoreDocument::default();
        doc.hash = "$argon2id$v=19$m=19456,t=2,p=1$c2FsdA$ZGlnZXN0".to_string();
        for i in 0..n {
            let mut record = KeyRecord::new(
                &Account::resolve(Some(format!("account-{i}").as_str())),
                format!("cipher-{i}"),
                format!("{i:064x}"),
            );
            record.block_number = i as i64 * 100;
            record.registered = i % 2 == 0;
            doc.keys.push(record);
        }
        doc
    }

    #[test]
    fn test_open_creates_empty_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keystore.json");

        let (_file, doc) = KeystoreFile::open(&path).unwrap();
        assert!(path.exists(), "Keystore file must be created on first open");
        assert!(doc.keys.is_empty());
        assert!(doc.hash.is_empty());

        let on_disk: serde_json::Value =
            serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        assert_eq!(on_disk["keys"], serde_json::json!([]));
    }

    #[test]
    fn test_open_creates_missing_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/deeper/keystore.json");

        let (_file, _doc) = KeystoreFile::open(&path).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_save_then_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keystore.json");
        let doc = sample_document(3);

        {
            let (file, _) = KeystoreFile::open(&path).unwrap();
            file.save(&doc).unwrap();
        }

        let (_file, loaded) = KeystoreFile::open(&path).unwrap();
        assert_eq!(loaded, doc);
    }

    #[test]
    fn test_persistence_is_idempotent_and_ordered() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keystore.json");
        let doc = sample_document(5);

        write_document(&path, &doc).unwrap();
        let first_bytes = fs::read(&path).unwrap();
        let loaded = read_document(&path).unwrap();
        write_document(&path, &loaded).unwrap();
        let reloaded = read_document(&path).unwrap();

        assert_eq!(reloaded, doc);
        assert_eq!(fs::read(&path).unwrap(), first_bytes);
        let accounts: Vec<_> = reloaded.keys.iter().map(|k| k.account.as_str()).collect();
        assert_eq!(
            accounts,
            vec!["account-0", "account-1", "account-2", "account-3", "account-4"],
            "Insertion order must survive save/load"
        );
    }

    #[test]
    fn test_shorter_document_leaves_no_stale_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keystore.json");

        write_document(&path, &sample_document(10)).unwrap();
        write_document(&path, &sample_document(1)).unwrap();

        let loaded = read_document(&path).expect("Shrunk document must still parse");
        assert_eq!(loaded.keys.len(), 1);
    }

    #[test]
    fn test_no_temp_file_left_behind() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keystore.json");
        write_document(&path, &sample_document(2)).unwrap();

        assert!(!temp_path(&path).exists());
    }

    #[test]
    fn test_malformed_document_is_format_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keystore.json");
        fs::write(&path, b"{\"keys\": [ this is not json").unwrap();

        match KeystoreFile::open(&path) {
            Err(StoreError::Format(_)) => {}
            other => panic!("Expected Format error, got {other:?}"),
        }
        assert_eq!(
            fs::read(&path).unwrap(),
            b"{\"keys\": [ this is not json",
            "An unreadable keystore must not be overwritten"
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_keystore_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keystore.json");
        write_document(&path, &sample_document(1)).unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);
    }

    #[cfg(unix)]
    #[test]
    fn test_concurrent_open_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keystore.json");

        let _held = KeystoreFile::open(&path).unwrap();
        match KeystoreFile::open(&path) {
            Err(StoreError::Io(e)) => assert_eq!(e.kind(), std::io::ErrorKind::WouldBlock),
            other => panic!("Expected WouldBlock, got {other:?}"),
        }
    }
}
