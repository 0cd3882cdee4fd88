//! X25519 key material for sealing.
//!
//! | Key | Holder | Purpose |
//! |-----|--------|---------|
//! | [`RecipientKeyPair`] | journalist | opens every submission |
//! | [`SourceKeyPair`] | one per source, created lazily | opens replies |
//!
//! Public keys travel in an armored text form (see [`armor`]). Source secret
//! keys never leave the store unprotected: they are persisted as a
//! [`KeyRecord`] encrypted under a key derived from the codename.

pub mod armor;
pub mod record;
pub mod service;

use std::fmt;

use x25519_dalek::{PublicKey as X25519PublicKey, StaticSecret as X25519StaticSecret};
use zeroize::Zeroizing;

use crate::error::{GeoDropError, GeoDropResult};

pub use record::KeyRecord;
pub use service::KeyPairService;

const PUBLIC_KEY_LABEL: &str = "GEODROP PUBLIC KEY";
const SECRET_KEY_LABEL: &str = "GEODROP SECRET KEY";

/// Public half of an X25519 keypair.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct PublicKey(X25519PublicKey);

impl PublicKey {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(X25519PublicKey::from(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        self.0.as_bytes()
    }

    pub(crate) fn inner(&self) -> &X25519PublicKey {
        &self.0
    }

    /// Armored text form, suitable for a downloadable `.asc` attachment.
    pub fn to_armored(&self) -> String {
        armor::encode(PUBLIC_KEY_LABEL, self.as_bytes())
    }

    pub fn from_armored(text: &str) -> GeoDropResult<Self> {
        let bytes = armor::decode(PUBLIC_KEY_LABEL, text)?;
        Ok(Self::from_bytes(to_key_bytes(&bytes)?))
    }

    /// Short hex fingerprint for display.
    pub fn fingerprint(&self) -> String {
        hex::encode(&self.as_bytes()[..8])
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PublicKey").field(&self.fingerprint()).finish()
    }
}

/// Secret half of an X25519 keypair; zeroized on drop.
#[derive(Clone)]
pub struct SecretKey(X25519StaticSecret);

impl SecretKey {
    /// Generate from the OS RNG.
    pub fn generate() -> GeoDropResult<Self> {
        let mut seed = Zeroizing::new([0u8; 32]);
        getrandom::getrandom(&mut seed[..])
            .map_err(|e| GeoDropError::Crypto(format!("Failed to generate key: {}", e)))?;
        Ok(Self(X25519StaticSecret::from(*seed)))
    }

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(X25519StaticSecret::from(bytes))
    }

    pub fn to_bytes(&self) -> Zeroizing<[u8; 32]> {
        Zeroizing::new(self.0.to_bytes())
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey(X25519PublicKey::from(&self.0))
    }

    pub(crate) fn inner(&self) -> &X25519StaticSecret {
        &self.0
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SecretKey").field(&"<redacted>").finish()
    }
}

/// The journalist's keypair. Every submission is sealed to its public half.
#[derive(Debug, Clone)]
pub struct RecipientKeyPair {
    secret: SecretKey,
}

impl RecipientKeyPair {
    pub fn generate() -> GeoDropResult<Self> {
        Ok(Self {
            secret: SecretKey::generate()?,
        })
    }

    pub fn public_key(&self) -> PublicKey {
        self.secret.public_key()
    }

    pub fn secret_key(&self) -> &SecretKey {
        &self.secret
    }

    /// Armored secret key, for the journalist's offline workstation only.
    pub fn secret_to_armored(&self) -> Zeroizing<String> {
        Zeroizing::new(armor::encode(SECRET_KEY_LABEL, &self.secret.to_bytes()[..]))
    }

    pub fn from_armored_secret(text: &str) -> GeoDropResult<Self> {
        let bytes = Zeroizing::new(armor::decode(SECRET_KEY_LABEL, text)?);
        Ok(Self {
            secret: SecretKey::from_bytes(to_key_bytes(&bytes)?),
        })
    }
}

/// A source's keypair, available only while its codename is at hand.
#[derive(Debug, Clone)]
pub struct SourceKeyPair {
    secret: SecretKey,
}

impl SourceKeyPair {
    pub fn generate() -> GeoDropResult<Self> {
        Ok(Self {
            secret: SecretKey::generate()?,
        })
    }

    pub(crate) fn from_secret(secret: SecretKey) -> Self {
        Self { secret }
    }

    pub fn public_key(&self) -> PublicKey {
        self.secret.public_key()
    }

    pub fn secret_key(&self) -> &SecretKey {
        &self.secret
    }
}

fn to_key_bytes(bytes: &[u8]) -> GeoDropResult<[u8; 32]> {
    bytes
        .try_into()
        .map_err(|_| GeoDropError::InvalidKey(format!("expected 32 bytes, got {}", bytes.len())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_key_armor_roundtrip() {
        let pair = RecipientKeyPair::generate().unwrap();
        let armored = pair.public_key().to_armored();
        assert!(armored.starts_with("-----BEGIN GEODROP PUBLIC KEY-----"));

        let parsed = PublicKey::from_armored(&armored).unwrap();
        assert_eq!(parsed, pair.public_key());
    }

    #[test]
    fn test_secret_armor_roundtrip() {
        let pair = RecipientKeyPair::generate().unwrap();
        let armored = pair.secret_to_armored();
        let restored = RecipientKeyPair::from_armored_secret(&armored).unwrap();
        assert_eq!(restored.public_key(), pair.public_key());
    }

    #[test]
    fn test_public_armor_is_not_a_secret_armor() {
        let pair = RecipientKeyPair::generate().unwrap();
        let armored = pair.public_key().to_armored();
        assert!(RecipientKeyPair::from_armored_secret(&armored).is_err());
    }

    #[test]
    fn test_wrong_length_rejected() {
        let armored = armor::encode(PUBLIC_KEY_LABEL, &[1u8; 16]);
        assert!(matches!(
            PublicKey::from_armored(&armored),
            Err(GeoDropError::InvalidKey(_))
        ));
    }

    #[test]
    fn test_debug_hides_secret() {
        let pair = SourceKeyPair::generate().unwrap();
        let debug = format!("{:?}", pair);
        assert!(debug.contains("redacted"));
    }
}
