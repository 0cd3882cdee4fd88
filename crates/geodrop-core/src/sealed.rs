//! Sealed boxes: anonymous public-key encryption to a single recipient.
//!
//! ## Security Model
//!
//! ```text
//! SEAL(recipient_pk, plaintext):
//! 1. (esk, epk)  = fresh X25519 keypair
//! 2. ss          = x25519(esk, recipient_pk)
//! 3. key         = HKDF-SHA256(ss, info = "geodrop-sealed-box-v1" || epk || recipient_pk)
//! 4. ciphertext  = ChaCha20-Poly1305(key, plaintext, aad = version || epk)
//! ```
//!
//! The ephemeral secret is dropped after sealing, so the sender (the source)
//! cannot open its own submissions afterwards.
//!
//! ## Wire Format
//!
//! `[version (1)] [ephemeral pk (32)] [nonce (12)] [ciphertext + tag (16)]`

use hkdf::Hkdf;
use sha2::Sha256;
use x25519_dalek::PublicKey as X25519PublicKey;
use zeroize::Zeroizing;

use crate::crypto::{PayloadCipher, NONCE_SIZE, TAG_SIZE};
use crate::error::{GeoDropError, GeoDropResult};
use crate::keys::{PublicKey, SecretKey};

/// Wire format version
pub const SEALED_BOX_VERSION: u8 = 1;

/// Domain separation string for HKDF
const HKDF_INFO: &[u8] = b"geodrop-sealed-box-v1";

const HEADER_LEN: usize = 1 + 32;

/// Seal `plaintext` so only the holder of `recipient`'s secret key can open it.
pub fn seal(recipient: &PublicKey, plaintext: &[u8]) -> GeoDropResult<Vec<u8>> {
    let ephemeral_secret = SecretKey::generate()?;
    let ephemeral_public = ephemeral_secret.public_key();

    let shared = ephemeral_secret.inner().diffie_hellman(recipient.inner());
    let key = derive_key(shared.as_bytes(), ephemeral_public.as_bytes(), recipient.as_bytes());

    let mut header = Vec::with_capacity(HEADER_LEN);
    header.push(SEALED_BOX_VERSION);
    header.extend_from_slice(ephemeral_public.as_bytes());

    let body = PayloadCipher::new(&key).encrypt(plaintext, &header)?;

    let mut sealed = header;
    sealed.extend_from_slice(&body);
    Ok(sealed)
}

/// Open a sealed box with the recipient's secret key.
///
/// Fails with `DecryptionFailed` when the box was sealed to another key or
/// has been tampered with.
pub fn open(recipient: &SecretKey, sealed: &[u8]) -> GeoDropResult<Vec<u8>> {
    if sealed.len() < HEADER_LEN + NONCE_SIZE + TAG_SIZE {
        return Err(GeoDropError::DecryptionFailed(
            "Sealed box too short".to_string(),
        ));
    }
    if sealed[0] != SEALED_BOX_VERSION {
        return Err(GeoDropError::DecryptionFailed(format!(
            "Sealed box version {} is not supported",
            sealed[0]
        )));
    }

    let (header, body) = sealed.split_at(HEADER_LEN);
    let mut epk = [0u8; 32];
    epk.copy_from_slice(&header[1..]);
    let ephemeral_public = X25519PublicKey::from(epk);

    let shared = recipient.inner().diffie_hellman(&ephemeral_public);
    let recipient_public = recipient.public_key();
    let key = derive_key(shared.as_bytes(), &epk, recipient_public.as_bytes());

    PayloadCipher::new(&key).decrypt(body, header)
}

/// Derive the 32-byte payload key from the shared secret, bound to both public keys.
fn derive_key(
    shared_secret: &[u8],
    ephemeral_pk: &[u8; 32],
    recipient_pk: &[u8; 32],
) -> Zeroizing<[u8; 32]> {
    let mut info = Vec::with_capacity(HKDF_INFO.len() + 64);
    info.extend_from_slice(HKDF_INFO);
    info.extend_from_slice(ephemeral_pk);
    info.extend_from_slice(recipient_pk);

    let hkdf = Hkdf::<Sha256>::new(None, shared_secret);
    let mut output = Zeroizing::new([0u8; 32]);
    hkdf.expand(&info, &mut output[..])
        .expect("HKDF expand should never fail with 32-byte output");
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::{RecipientKeyPair, SourceKeyPair};

    #[test]
    fn test_seal_open_roundtrip() {
        let recipient = RecipientKeyPair::generate().unwrap();
        let sealed = seal(&recipient.public_key(), b"meet at the old mill").unwrap();

        assert_eq!(sealed[0], SEALED_BOX_VERSION);
        let opened = open(recipient.secret_key(), &sealed).unwrap();
        assert_eq!(opened, b"meet at the old mill");
    }

    #[test]
    fn test_empty_payload() {
        let recipient = SourceKeyPair::generate().unwrap();
        let sealed = seal(&recipient.public_key(), b"").unwrap();
        assert!(open(recipient.secret_key(), &sealed).unwrap().is_empty());
    }

    #[test]
    fn test_wrong_recipient_fails() {
        let alice = RecipientKeyPair::generate().unwrap();
        let mallory = RecipientKeyPair::generate().unwrap();
        let sealed = seal(&alice.public_key(), b"for alice").unwrap();

        assert!(matches!(
            open(mallory.secret_key(), &sealed),
            Err(GeoDropError::DecryptionFailed(_))
        ));
    }

    #[test]
    fn test_tampered_header_fails() {
        let recipient = RecipientKeyPair::generate().unwrap();
        let mut sealed = seal(&recipient.public_key(), b"payload").unwrap();
        sealed[5] ^= 0x01;
        assert!(open(recipient.secret_key(), &sealed).is_err());
    }

    #[test]
    fn test_tampered_body_fails() {
        let recipient = RecipientKeyPair::generate().unwrap();
        let mut sealed = seal(&recipient.public_key(), b"payload").unwrap();
        let last = sealed.len() - 1;
        sealed[last] ^= 0x80;
        assert!(open(recipient.secret_key(), &sealed).is_err());
    }

    #[test]
    fn test_unknown_version_fails() {
        let recipient = RecipientKeyPair::generate().unwrap();
        let mut sealed = seal(&recipient.public_key(), b"payload").unwrap();
        sealed[0] = 9;
        assert!(open(recipient.secret_key(), &sealed).is_err());
    }

    #[test]
    fn test_each_seal_is_unique() {
        let recipient = RecipientKeyPair::generate().unwrap();
        let a = seal(&recipient.public_key(), b"same").unwrap();
        let b = seal(&recipient.public_key(), b"same").unwrap();
        assert_ne!(a, b);
    }
}
