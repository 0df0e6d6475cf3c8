// Keystorage — End-to-end keystore scenarios through the public API.

use keystorage::crypto::TOKEN_ALPHABET;
use keystorage::store::{read_document, lock_path, DEFAULT_ACCOUNT};
use keystorage::{FileKeyStore, KeyStore, StoreError, UpdateOutcome};

const OPERATOR_KEY: &str = "0x59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d";
const BACKUP_KEY: &str = "0x5de4111afa1a4b94908f83103eb1f1706367c2e68ca870fc3fb9a804cdab365a";

#[test]
fn test_fresh_keystore_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("keystore.json");

    let token = {
        let mut store = FileKeyStore::open(&path).unwrap();
        let token = store.generate_token().unwrap();

        assert_eq!(token.len(), 32);
        assert!(token.bytes().all(|c| TOKEN_ALPHABET.contains(&c)));

        store.add_existing_key(Some("op1"), OPERATOR_KEY).unwrap();
        token
    };

    let mut store = FileKeyStore::open(&path).unwrap();
    store.check_token(&token).unwrap();

    let entry = store.by_account("op1").unwrap();
    assert_eq!(entry.private.as_str(), OPERATOR_KEY);
    assert_eq!(entry.account, "op1");
}

#[test]
fn test_generated_key_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("keystore.json");

    let (token, key) = {
        let mut store = FileKeyStore::open(&path).unwrap();
        let token = store.generate_token().unwrap();
        let key = store.generate_new_key(None).unwrap();
        (token, key)
    };

    assert!(key.starts_with("0x"));
    assert_eq!(key.len(), 66);

    let mut store = FileKeyStore::open(&path).unwrap();
    store.check_token(&token).unwrap();
    let entry = store.first().unwrap();
    assert_eq!(entry.account, DEFAULT_ACCOUNT);
    assert_eq!(entry.private.as_str(), key.as_str());
}

#[test]
fn test_operator_session() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("keystore.json");

    let mut store = FileKeyStore::open(&path).unwrap();
    store.generate_token().unwrap();
    store.add_existing_key(Some("primary"), OPERATOR_KEY).unwrap();
    store.add_existing_key(Some("backup"), BACKUP_KEY).unwrap();

    // Unknown account falls back to the first key, like an absent one.
    store.select_private_key(Some("missing")).unwrap();
    assert_eq!(store.selected_private_key(), Some(OPERATOR_KEY));
    store.select_private_key(Some("backup")).unwrap();
    assert_eq!(store.selected_private_key(), Some(BACKUP_KEY));

    assert_eq!(store.set_registered(BACKUP_KEY).unwrap(), UpdateOutcome::Updated);
    assert_eq!(store.set_registered(BACKUP_KEY).unwrap(), UpdateOutcome::Updated);
    assert_eq!(store.set_block_number(19_000_000).unwrap(), UpdateOutcome::Updated);

    let records = store.records();
    assert_eq!(records.len(), 2);
    assert!(!records[0].registered);
    assert!(records[1].registered);
    assert_eq!(records[1].block_number, 19_000_000);

    let doc = read_document(&path).unwrap();
    assert_eq!(doc.keys.len(), 2);
    assert!(doc.keys[1].registered);
    assert_eq!(doc.keys[1].block_number, 19_000_000);
}

#[test]
fn test_second_open_is_refused_while_held() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("keystore.json");

    let store = FileKeyStore::open(&path).unwrap();
    assert!(lock_path(&path).exists());

    match FileKeyStore::open(&path) {
        Err(StoreError::Io(_)) => {}
        Err(other) => panic!("Expected an Io error, got {other}"),
        Ok(_) => panic!("Second open must not succeed while the lock is held"),
    }

    drop(store);
    assert!(FileKeyStore::open(&path).is_ok(), "Lock must be released on drop");
}

#[test]
fn test_malformed_file_is_format_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("keystore.json");
    std::fs::write(&path, b"{ not json").unwrap();

    match FileKeyStore::open(&path) {
        Err(StoreError::Format(_)) => {}
        Err(other) => panic!("Expected a Format error, got {other}"),
        Ok(_) => panic!("Malformed document must not open"),
    }
    assert_eq!(std::fs::read(&path).unwrap(), b"{ not json", "File must be left untouched");
}

#[test]
fn test_legacy_document_fields() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("keystore.json");
    std::fs::write(
        &path,
        r#"{"token":"old-live-token","hash":"","selected_private_key":"0xabc","keys":null}"#,
    )
    .unwrap();

    let mut store = FileKeyStore::open(&path).unwrap();
    assert!(!store.has_keys());
    assert!(!store.has_token());
    store.generate_token().unwrap();

    let on_disk = std::fs::read_to_string(&path).unwrap();
    assert!(!on_disk.contains("old-live-token"), "Legacy token must not be written back");
    assert!(!on_disk.contains("0xabc"), "Selected key must not be written back");
}
