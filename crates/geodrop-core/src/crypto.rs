//! Symmetric layer using ChaCha20-Poly1305 AEAD
//!
//! Every asymmetric operation in GeoDrop ends here: sealed boxes encrypt the
//! payload under an HKDF-derived key, and protected private keys are
//! encrypted under an Argon2id-derived key.

use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    ChaCha20Poly1305, Nonce,
};
use rand::RngCore;

use crate::error::GeoDropError;

/// Nonce size for ChaCha20-Poly1305 (12 bytes)
pub const NONCE_SIZE: usize = 12;

/// Poly1305 tag size
pub const TAG_SIZE: usize = 16;

/// ChaCha20-Poly1305 cipher bound to one 32-byte key.
///
/// # Wire Format
///
/// Encrypted data format: `[nonce (12 bytes)] + [ciphertext + auth_tag (16 bytes)]`
///
/// # Example
///
/// ```
/// use geodrop_core::crypto::PayloadCipher;
///
/// let key = PayloadCipher::generate_key();
/// let cipher = PayloadCipher::new(&key);
///
/// let ciphertext = cipher.encrypt(b"hello", b"context").unwrap();
/// let plaintext = cipher.decrypt(&ciphertext, b"context").unwrap();
///
/// assert_eq!(plaintext, b"hello");
/// ```
pub struct PayloadCipher {
    cipher: ChaCha20Poly1305,
}

impl PayloadCipher {
    /// Create a cipher with the given 32-byte key.
    pub fn new(key: &[u8; 32]) -> Self {
        Self {
            cipher: ChaCha20Poly1305::new(key.into()),
        }
    }

    /// Generate a new random 32-byte key.
    pub fn generate_key() -> [u8; 32] {
        let mut key = [0u8; 32];
        rand::rng().fill_bytes(&mut key);
        key
    }

    /// Encrypt `plaintext`, authenticating `aad` alongside it.
    ///
    /// A random nonce is generated per call and prepended to the output.
    pub fn encrypt(&self, plaintext: &[u8], aad: &[u8]) -> Result<Vec<u8>, GeoDropError> {
        let mut nonce_bytes = [0u8; NONCE_SIZE];
        rand::rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(
                nonce,
                Payload {
                    msg: plaintext,
                    aad,
                },
            )
            .map_err(|e| GeoDropError::Crypto(format!("Encryption failed: {}", e)))?;

        let mut result = nonce_bytes.to_vec();
        result.extend_from_slice(&ciphertext);
        Ok(result)
    }

    /// Decrypt data produced by [`encrypt`](Self::encrypt) with the same `aad`.
    ///
    /// Fails on wrong key, wrong `aad`, tampering, or truncated input.
    pub fn decrypt(&self, data: &[u8], aad: &[u8]) -> Result<Vec<u8>, GeoDropError> {
        if data.len() < NONCE_SIZE + TAG_SIZE {
            return Err(GeoDropError::DecryptionFailed(
                "Data too short to contain nonce and tag".to_string(),
            ));
        }

        let (nonce, encrypted) = data.split_at(NONCE_SIZE);
        self.cipher
            .decrypt(
                Nonce::from_slice(nonce),
                Payload {
                    msg: encrypted,
                    aad,
                },
            )
            .map_err(|e| GeoDropError::DecryptionFailed(format!("{}", e)))
    }
}

/// Fresh random token used to name stored objects: 128 bits, lowercase hex.
///
/// Tokens carry no ordering, timing or size information.
pub fn random_token() -> String {
    let mut bytes = [0u8; 16];
    rand::rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}
