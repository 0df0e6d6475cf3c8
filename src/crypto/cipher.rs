// Keystorage — Cipher Engine
//
// Key material is encrypted with AES-256 in CFB mode under a key that is the
// SHA-256 digest of the access token. Every ciphertext carries its own random
// IV in the first block and is stored as base64url text:
//
//   base64url( IV[16] || AES-256-CFB(key = SHA-256(token), iv = IV, plaintext) )
//
// CFB has no authentication tag, so decrypting with the wrong token returns
// garbage rather than an error. Records written by the store also carry a
// keyed fingerprint (see `fingerprint`) that catches this one layer up.

use base64::engine::general_purpose::URL_SAFE;
use base64::Engine;
use cfb_mode::cipher::{AsyncStreamCipher, KeyIvInit};
use hmac::{Hmac, Mac};
use rand::{Rng, TryRngCore};
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use super::CryptoError;

type Aes256CfbEnc = cfb_mode::Encryptor<aes::Aes256>;
type Aes256CfbDec = cfb_mode::Decryptor<aes::Aes256>;
type HmacSha256 = Hmac<Sha256>;

/// AES block size; also the IV length prefixed to every ciphertext.
pub const BLOCK_SIZE: usize = 16;

/// Characters an access token is drawn from.
pub const TOKEN_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Domain label mixed into the fingerprint key so it never equals the
/// encryption key.
const FINGERPRINT_CONTEXT: &[u8] = b"keystorage/fingerprint/v1";

/// Derive the 32-byte AES key for a token.
pub fn derive_key(token: &str) -> Zeroizing<[u8; 32]> {
    Zeroizing::new(Sha256::digest(token.as_bytes()).into())
}

/// Encrypt `plaintext` under `token` with a fresh random IV.
pub fn encrypt(plaintext: &[u8], token: &str) -> Result<String, CryptoError> {
    let key = derive_key(token);

    let mut output = Zeroizing::new(vec![0u8; BLOCK_SIZE + plaintext.len()]);
    let (iv, body) = output.split_at_mut(BLOCK_SIZE);

    rand::rngs::OsRng
        .try_fill_bytes(iv)
        .map_err(|e| CryptoError::Random(e.to_string()))?;

    body.copy_from_slice(plaintext);
    Aes256CfbEnc::new_from_slices(&key[..], iv)
        .map_err(|_| CryptoError::CipherInit)?
        .encrypt(body);

    Ok(URL_SAFE.encode(output.as_slice()))
}

/// Decrypt a value produced by [`encrypt`].
///
/// A wrong token is not detected here: the result is simply garbage bytes.
pub fn decrypt(ciphertext: &str, token: &str) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
    let mut data = Zeroizing::new(
        URL_SAFE
            .decode(ciphertext.as_bytes())
            .map_err(|_| CryptoError::Encoding)?,
    );

    if data.len() < BLOCK_SIZE {
        return Err(CryptoError::CiphertextTooShort(data.len(), BLOCK_SIZE));
    }

    let key = derive_key(token);
    let (iv, body) = data.split_at_mut(BLOCK_SIZE);
    Aes256CfbDec::new_from_slices(&key[..], iv)
        .map_err(|_| CryptoError::CipherInit)?
        .decrypt(body);

    Ok(Zeroizing::new(body.to_vec()))
}

/// Keyed, deterministic fingerprint of a plaintext key under `token`.
///
/// Hex-encoded HMAC-SHA256. Equal plaintexts under the same token always
/// produce the same fingerprint, which lets the store match a key without
/// decrypting every record.
pub fn fingerprint(plaintext: &[u8], token: &str) -> Result<String, CryptoError> {
    let key = derive_key(token);
    let mac_key: Zeroizing<[u8; 32]> = Zeroizing::new(
        Sha256::new()
            .chain_update(FINGERPRINT_CONTEXT)
            .chain_update(&key[..])
            .finalize()
            .into(),
    );

    let mut mac =
        <HmacSha256 as Mac>::new_from_slice(&mac_key[..]).map_err(|_| CryptoError::CipherInit)?;
    mac.update(plaintext);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Generate a random token of `len` characters from [`TOKEN_ALPHABET`].
///
/// Each character is sampled uniformly from the thread-local CSPRNG.
pub fn random_token(len: usize) -> Zeroizing<String> {
    let mut rng = rand::rng();
    let token: String = (0..len)
        .map(|_| TOKEN_ALPHABET[rng.random_range(0..TOKEN_ALPHABET.len())] as char)
        .collect();
    Zeroizing::new(token)
}

// ─── Tests ───────────────────────────────────────────────────────────────────
