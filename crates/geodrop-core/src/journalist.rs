//! Recipient-side operations.
//!
//! The journalist flags sources it wants to answer, seals replies to their
//! keys once those exist, and opens submissions with its own secret key.

use tracing::info;

use crate::error::{GeoDropError, GeoDropResult};
use crate::identity::AnonymousId;
use crate::keys::{KeyPairService, RecipientKeyPair};
use crate::sealed;
use crate::store::{BlobKind, Store, StoredObject};

/// A decrypted submission.
#[derive(Debug, Clone)]
pub struct OpenedSubmission {
    pub kind: BlobKind,
    /// Message text, point GeoJSON, or zip archive bytes.
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct JournalistDesk {
    store: Store,
    keys: KeyPairService,
}

impl JournalistDesk {
    pub fn new(store: Store, keys: KeyPairService) -> Self {
        Self { store, keys }
    }

    /// Every known source.
    pub fn sources(&self) -> GeoDropResult<Vec<AnonymousId>> {
        self.store.identities()
    }

    /// Sealed submissions of `id`, sorted by name.
    pub fn submissions(&self, id: &AnonymousId) -> GeoDropResult<Vec<StoredObject>> {
        if !self.store.exists(id) {
            return Err(GeoDropError::IdentityNotFound);
        }
        Ok(self
            .store
            .list(id)?
            .into_iter()
            .filter(|o| is_submission(&o.name))
            .collect())
    }

    /// Mark `id` for reply. Its keypair is generated at the source's next lookup.
    pub fn flag(&self, id: &AnonymousId) -> GeoDropResult<()> {
        self.store.set_flag(id)?;
        info!("Source flagged for reply");
        Ok(())
    }

    /// Seal `text` to the source's public key and store it as a reply.
    ///
    /// Fails with `KeypairMissing` until the source has looked up its
    /// replies after being flagged.
    pub fn reply(&self, id: &AnonymousId, text: &str) -> GeoDropResult<String> {
        if !self.store.exists(id) {
            return Err(GeoDropError::IdentityNotFound);
        }
        let public_key = self.keys.public_key(id)?;
        let blob = sealed::seal(&public_key, text.as_bytes())?;
        let name = self.store.put_sealed(id, BlobKind::Reply, &blob)?;
        info!("Reply stored");
        Ok(name)
    }

    /// Decrypt one submission of `id`.
    pub fn open(
        &self,
        id: &AnonymousId,
        name: &str,
        recipient: &RecipientKeyPair,
    ) -> GeoDropResult<OpenedSubmission> {
        let kind = BlobKind::of_name(name)
            .filter(|kind| *kind != BlobKind::Reply)
            .ok_or_else(|| GeoDropError::SubmissionNotFound(name.to_string()))?;
        let blob = self.store.read(id, name)?;
        Ok(OpenedSubmission {
            kind,
            bytes: sealed::open(recipient.secret_key(), &blob)?,
        })
    }
}

fn is_submission(name: &str) -> bool {
    matches!(
        BlobKind::of_name(name),
        Some(BlobKind::Message | BlobKind::Location | BlobKind::Document)
    )
}
