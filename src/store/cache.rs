// Keystorage — Session plaintext cache
//
// Decrypted keys are cached per (record index, token epoch). The epoch
// advances whenever the live token changes, and advancing drops every
// cached plaintext, so nothing decrypted under one token is served under
// another. Records are append-only, which keeps an index a stable identity.

use std::collections::HashMap;

use zeroize::Zeroizing;

#[derive(Default)]
pub struct PlaintextCache {
    epoch: u64,
    entries: HashMap<(usize, u64), Zeroizing<String>>,
}

impl PlaintextCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current token epoch.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Start a new token epoch, zeroizing everything cached so far.
    pub fn advance_epoch(&mut self) {
        self.entries.clear();
        self.epoch += 1;
    }

    pub fn get(&self, index: usize) -> Option<&Zeroizing<String>> {
        self.entries.get(&(index, self.epoch))
    }

    pub fn insert(&mut self, index: usize, plaintext: Zeroizing<String>) {
        self.entries.insert((index, self.epoch), plaintext);
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_get_within_epoch() {
        let mut cache = PlaintextCache::new();
        cache.insert(0, Zeroizing::new("0xaa".to_string()));
        cache.insert(3, Zeroizing::new("0xbb".to_string()));

        assert_eq!(cache.get(0).map(|p| p.as_str()), Some("0xaa"));
        assert_eq!(cache.get(3).map(|p| p.as_str()), Some("0xbb"));
        assert!(cache.get(1).is_none());
    }

    #[test]
    fn test_advance_epoch_invalidates_everything() {
        let mut cache = PlaintextCache::new();
        cache.insert(0, Zeroizing::new("0xaa".to_string()));
        cache.insert(1, Zeroizing::new("0xbb".to_string()));
        let before = cache.epoch();

        cache.advance_epoch();

        assert_eq!(cache.epoch(), before + 1);
        assert!(cache.get(0).is_none(), "Stale plaintext must not survive a token change");
        assert!(cache.get(1).is_none());
    }
}
