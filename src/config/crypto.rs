//! Passphrase-based sealing of the credential record
//!
//! The key is the SHA-256 digest of the UTF-8 passphrase. Records are sealed
//! with AES-256-GCM under a fresh random nonce which is prepended to the
//! ciphertext, and the result is stored as standard Base64 text.
//!
//! ```text
//! base64( nonce[12] || ciphertext || tag[16] )
//! ```

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};
use thiserror::Error;

/// AES-GCM nonce length in bytes
pub const NONCE_SIZE: usize = 12;

/// Derived key length in bytes
pub const KEY_SIZE: usize = 32;

/// Errors raised while sealing or opening a credential record
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Stored text is not valid Base64
    #[error("invalid encoding: {0}")]
    Encoding(#[from] base64::DecodeError),

    /// Decoded payload cannot even hold a nonce
    #[error("ciphertext too short: {len} bytes")]
    TooShort {
        /// Decoded length
        len: usize,
    },

    /// Encryption failed
    #[error("encryption failed")]
    Seal,

    /// Authentication tag did not verify (wrong passphrase or tampered data)
    #[error("authentication failed")]
    Open,
}

/// Derive the 256-bit sealing key from a passphrase
pub fn derive_key(passphrase: &str) -> [u8; KEY_SIZE] {
    let d = Sha256::new().chain_update(passphrase.as_bytes()).finalize();
    let mut key = [0u8; KEY_SIZE];
    key.copy_from_slice(&d);
    key
}

/// Seal `data` under `passphrase` and return the Base64 text form
pub fn encrypt(data: &[u8], passphrase: &str) -> Result<String, CryptoError> {
    let key = derive_key(passphrase);
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key));

    let mut nonce = [0u8; NONCE_SIZE];
    OsRng.fill_bytes(&mut nonce);

    let sealed = cipher
        .encrypt(Nonce::from_slice(&nonce), data)
        .map_err(|_| CryptoError::Seal)?;

    let mut out = Vec::with_capacity(NONCE_SIZE + sealed.len());
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&sealed);
    Ok(BASE64.encode(out))
}

/// Open a record produced by [`encrypt`]
///
/// Fails on invalid Base64, on payloads shorter than one nonce and whenever
/// the authentication tag does not verify.
pub fn decrypt(encoded: &str, passphrase: &str) -> Result<Vec<u8>, CryptoError> {
    let data = BASE64.decode(encoded.trim())?;
    if data.len() < NONCE_SIZE {
        return Err(CryptoError::TooShort { len: data.len() });
    }

    let key = derive_key(passphrase);
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key));

    let (nonce, ciphertext) = data.split_at(NONCE_SIZE);
    cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| CryptoError::Open)
}
