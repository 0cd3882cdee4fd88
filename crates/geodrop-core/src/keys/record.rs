//! Protected keypair record stored in a source namespace.
//!
//! The public key is kept in the clear so replies can be sealed without the
//! codename. The secret key is encrypted under
//! `Argon2id(codename, record salt)`, with the anonymous id bound in as AAD
//! so a record cannot be moved to another namespace.

use argon2::{Algorithm, Argon2, Params, Version};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use super::{PublicKey, SecretKey, SourceKeyPair};
use crate::config::KdfParams;
use crate::crypto::PayloadCipher;
use crate::error::{GeoDropError, GeoDropResult};
use crate::identity::{AnonymousId, Codename};

const RECORD_VERSION: u8 = 1;
const SALT_LEN: usize = 16;
const RECORD_AAD: &[u8] = b"geodrop:source-key:v1:";

/// Serialized form of a source keypair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyRecord {
    pub version: u8,
    /// Base64 X25519 public key
    pub public_key: String,
    /// Hex Argon2id salt for the protection key
    pub salt: String,
    /// Base64 `[nonce][encrypted secret key + tag]`
    pub protected_secret: String,
}

impl KeyRecord {
    /// Encrypt `pair` for storage under `id`.
    pub fn protect(
        pair: &SourceKeyPair,
        id: &AnonymousId,
        codename: &Codename,
        kdf: KdfParams,
    ) -> GeoDropResult<Self> {
        let mut salt = [0u8; SALT_LEN];
        rand::rng().fill_bytes(&mut salt);

        let key = protection_key(codename, &salt, kdf)?;
        let secret = pair.secret_key().to_bytes();
        let protected = PayloadCipher::new(&key).encrypt(&secret[..], &aad(id))?;

        Ok(Self {
            version: RECORD_VERSION,
            public_key: STANDARD.encode(pair.public_key().as_bytes()),
            salt: hex::encode(salt),
            protected_secret: STANDARD.encode(protected),
        })
    }

    /// Public key, readable without the codename.
    pub fn public_key(&self) -> GeoDropResult<PublicKey> {
        let bytes = STANDARD
            .decode(&self.public_key)
            .map_err(|e| GeoDropError::InvalidKey(format!("public key: {}", e)))?;
        let bytes: [u8; 32] = bytes
            .try_into()
            .map_err(|_| GeoDropError::InvalidKey("public key length".to_string()))?;
        Ok(PublicKey::from_bytes(bytes))
    }

    /// Recover the keypair. A wrong codename yields `DecryptionFailed`.
    pub fn unlock(
        &self,
        id: &AnonymousId,
        codename: &Codename,
        kdf: KdfParams,
    ) -> GeoDropResult<SourceKeyPair> {
        if self.version != RECORD_VERSION {
            return Err(GeoDropError::InvalidKey(format!(
                "unsupported record version {}",
                self.version
            )));
        }
        let salt = hex::decode(&self.salt)
            .map_err(|e| GeoDropError::InvalidKey(format!("salt: {}", e)))?;
        let protected = STANDARD
            .decode(&self.protected_secret)
            .map_err(|e| GeoDropError::InvalidKey(format!("protected secret: {}", e)))?;

        let key = protection_key(codename, &salt, kdf)?;
        let secret = Zeroizing::new(PayloadCipher::new(&key).decrypt(&protected, &aad(id))?);
        let secret: [u8; 32] = secret
            .as_slice()
            .try_into()
            .map_err(|_| GeoDropError::InvalidKey("secret key length".to_string()))?;

        let pair = SourceKeyPair::from_secret(SecretKey::from_bytes(secret));
        if pair.public_key() != self.public_key()? {
            return Err(GeoDropError::InvalidKey(
                "secret key does not match public key".to_string(),
            ));
        }
        Ok(pair)
    }

    pub fn to_json(&self) -> GeoDropResult<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    pub fn from_json(bytes: &[u8]) -> GeoDropResult<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

fn protection_key(
    codename: &Codename,
    salt: &[u8],
    kdf: KdfParams,
) -> GeoDropResult<Zeroizing<[u8; 32]>> {
    let params = Params::new(kdf.memory_kib, kdf.iterations, kdf.parallelism, Some(32))
        .map_err(|e| GeoDropError::Config(format!("argon2 params: {}", e)))?;
    let mut key = Zeroizing::new([0u8; 32]);
    Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
        .hash_password_into(codename.expose().as_bytes(), salt, &mut key[..])
        .map_err(|e| GeoDropError::Crypto(format!("argon2 failure: {}", e)))?;
    Ok(key)
}

fn aad(id: &AnonymousId) -> Vec<u8> {
    let mut aad = RECORD_AAD.to_vec();
    aad.extend_from_slice(id.as_str().as_bytes());
    aad
}
