//! Lazy per-identity keypair lifecycle.

use std::io::ErrorKind;

use tracing::{debug, info, warn};

use super::{KeyRecord, PublicKey, SourceKeyPair};
use crate::config::KdfParams;
use crate::error::{GeoDropError, GeoDropResult};
use crate::identity::{AnonymousId, Codename};
use crate::store::{Store, KEYPAIR_FILE};

/// Creates, finds and unlocks source keypairs.
///
/// A keypair is created at most once per identity and never regenerated.
#[derive(Debug, Clone)]
pub struct KeyPairService {
    store: Store,
    kdf: KdfParams,
}

impl KeyPairService {
    pub fn new(store: Store, kdf: KdfParams) -> Self {
        Self { store, kdf }
    }

    /// Whether a readable keypair record exists for `id`.
    pub fn has_keypair(&self, id: &AnonymousId) -> bool {
        self.record(id).is_ok()
    }

    /// Generate and persist a keypair unless one exists.
    ///
    /// Returns `true` when this call created the keypair. The record is
    /// written with create-new semantics, so a racing writer loses cleanly
    /// and the first record stays the only one. A record that no longer
    /// parses is discarded and replaced.
    pub fn ensure_keypair(&self, id: &AnonymousId, codename: &Codename) -> GeoDropResult<bool> {
        match self.record(id) {
            Ok(_) => {
                debug!("Keypair already present");
                return Ok(false);
            }
            Err(GeoDropError::KeypairMissing(_)) => {}
            Err(GeoDropError::Serialization(e)) => {
                warn!(error = %e, "Discarding unreadable keypair record");
                self.store.remove(id, KEYPAIR_FILE)?;
            }
            Err(e) => return Err(e),
        }
        if !self.store.exists(id) {
            return Err(GeoDropError::IdentityNotFound);
        }

        let pair = SourceKeyPair::generate()?;
        let record = KeyRecord::protect(&pair, id, codename, self.kdf)?;

        match self.store.write_new(id, KEYPAIR_FILE, &record.to_json()?) {
            Ok(_) => {
                info!(fingerprint = %pair.public_key().fingerprint(), "Generated source keypair");
                Ok(true)
            }
            Err(GeoDropError::Io(e)) if e.kind() == ErrorKind::AlreadyExists => {
                debug!("Lost keypair creation race, keeping existing record");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Load the stored record for `id`.
    pub fn record(&self, id: &AnonymousId) -> GeoDropResult<KeyRecord> {
        match self.store.read(id, KEYPAIR_FILE) {
            Ok(bytes) => KeyRecord::from_json(&bytes),
            Err(GeoDropError::Io(e)) if e.kind() == ErrorKind::NotFound => {
                Err(GeoDropError::KeypairMissing(id.clone()))
            }
            Err(e) => Err(e),
        }
    }

    /// Public key of `id`, used to seal replies.
    pub fn public_key(&self, id: &AnonymousId) -> GeoDropResult<PublicKey> {
        self.record(id)?.public_key()
    }

    /// Unlock the keypair of `id` with its codename.
    pub fn unlock(&self, id: &AnonymousId, codename: &Codename) -> GeoDropResult<SourceKeyPair> {
        self.record(id)?.unlock(id, codename, self.kdf)
    }
}
