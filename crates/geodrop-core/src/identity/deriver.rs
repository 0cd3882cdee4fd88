//! Codename -> anonymous id derivation (Argon2id).

use std::fmt;

use argon2::{Algorithm, Argon2, Params, Version};

use super::{AnonymousId, Codename};
use crate::config::{KdfParams, MIN_SALT_LEN};
use crate::error::{GeoDropError, GeoDropResult};

const ID_LEN: usize = 32;

/// Deterministic, deliberately slow, one-way mapping from codename to id.
///
/// The salt is deployment-wide and fixed: the same codename must always
/// land on the same namespace.
#[derive(Clone)]
pub struct IdentityDeriver {
    argon2: Argon2<'static>,
    salt: Vec<u8>,
}

impl IdentityDeriver {
    /// Build a deriver; parameters and salt are validated here so that
    /// [`derive`](Self::derive) cannot fail.
    pub fn new(params: KdfParams, salt: impl AsRef<[u8]>) -> GeoDropResult<Self> {
        let salt = salt.as_ref();
        if salt.len() < MIN_SALT_LEN {
            return Err(GeoDropError::Config(format!(
                "identity salt must be at least {} bytes",
                MIN_SALT_LEN
            )));
        }
        let params = Params::new(
            params.memory_kib,
            params.iterations,
            params.parallelism,
            Some(ID_LEN),
        )
        .map_err(|e| GeoDropError::Config(format!("argon2 params: {}", e)))?;

        Ok(Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
            salt: salt.to_vec(),
        })
    }

    /// Derive the anonymous id for a codename.
    pub fn derive(&self, codename: &Codename) -> AnonymousId {
        let mut digest = [0u8; ID_LEN];
        self.argon2
            .hash_password_into(codename.expose().as_bytes(), &self.salt, &mut digest)
            .expect("argon2 params and salt are validated in IdentityDeriver::new");
        AnonymousId::from_digest(&digest)
    }
}

impl fmt::Debug for IdentityDeriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityDeriver")
            .field("kdf", &"Argon2id(v0x13)")
            .field("salt", &"<redacted>")
            .finish()
    }
}
