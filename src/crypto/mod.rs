// Keystorage — Crypto Module
//
// Token-derived AES-256-CFB encryption of key material, Argon2id hashing of
// the access token, and generation of fresh private keys. Nothing in this
// module touches the filesystem.

mod cipher;
mod error;
mod gate;
mod keygen;

pub use cipher::{
    decrypt, derive_key, encrypt, fingerprint, random_token, BLOCK_SIZE, TOKEN_ALPHABET,
};
pub use error::CryptoError;
pub use gate::{hash_token, is_legacy_hash, verify_token};
pub use keygen::{add_hex_prefix, KeyGenerator, RandomKeyGenerator};

#[cfg(test)]
pub use keygen::mock;
