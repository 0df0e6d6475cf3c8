// Keystorage — Crypto error types
//
// Messages never carry key material, IVs, tokens or plaintext.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("ciphertext too short: decodes to {0} bytes, minimum is {1}")]
    CiphertextTooShort(usize, usize),

    #[error("cipher construction failed")]
    CipherInit,

    #[error("ciphertext is not valid base64url")]
    Encoding,

    #[error("secure random source failed: {0}")]
    Random(String),

    #[error("token hashing failed: {0}")]
    Hash(String),

    #[error("key material failed its integrity check")]
    Integrity,

    #[error("decrypted key material is not valid UTF-8")]
    NotUtf8,

    #[error("key generation failed: {0}")]
    KeyGeneration(String),
}
