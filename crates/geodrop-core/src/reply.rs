//! Reading replies addressed to a source.

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::error::{GeoDropError, GeoDropResult};
use crate::identity::{AnonymousId, Codename};
use crate::keys::{KeyPairService, SourceKeyPair};
use crate::sealed;
use crate::store::{BlobKind, Store, REPLY_PREFIX};

/// A decrypted reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// Object name, used to delete the reply.
    pub id: String,
    pub received: DateTime<Utc>,
    pub text: String,
}

/// Decrypts replies with the source's codename-protected key.
#[derive(Debug, Clone)]
pub struct ReplyReader {
    store: Store,
    keys: KeyPairService,
}

impl ReplyReader {
    pub fn new(store: Store, keys: KeyPairService) -> Self {
        Self { store, keys }
    }

    /// Decrypt one reply ciphertext for `id`.
    ///
    /// Fails with `DecryptionFailed` when the ciphertext was sealed for
    /// another key or the codename does not unlock this identity's key.
    pub fn read_reply(
        &self,
        id: &AnonymousId,
        codename: &Codename,
        ciphertext: &[u8],
    ) -> GeoDropResult<Vec<u8>> {
        let pair = self.keys.unlock(id, codename)?;
        sealed::open(pair.secret_key(), ciphertext)
    }

    /// Names of the reply objects of `id`, with their modification times.
    pub fn reply_names(&self, id: &AnonymousId) -> GeoDropResult<Vec<(String, DateTime<Utc>)>> {
        Ok(self
            .store
            .list(id)?
            .into_iter()
            .filter(|o| BlobKind::of_name(&o.name) == Some(BlobKind::Reply))
            .map(|o| (o.name, DateTime::<Utc>::from(o.modified)))
            .collect())
    }

    /// Every reply of `id`, oldest first.
    ///
    /// Without a keypair there can be no replies, so the list is empty. A
    /// reply that does not open is skipped and logged.
    pub fn list_replies(&self, id: &AnonymousId, codename: &Codename) -> GeoDropResult<Vec<Reply>> {
        let names = self.reply_names(id)?;
        if names.is_empty() || !self.keys.has_keypair(id) {
            return Ok(Vec::new());
        }
        let pair = self.keys.unlock(id, codename)?;

        let mut replies = Vec::with_capacity(names.len());
        for (name, received) in names {
            match self.open_one(id, &pair, &name) {
                Ok(text) => replies.push(Reply {
                    id: name,
                    received,
                    text,
                }),
                Err(e) => warn!(error = %e, "Skipping unreadable reply"),
            }
        }
        replies.sort_by(|a, b| a.received.cmp(&b.received).then_with(|| a.id.cmp(&b.id)));
        Ok(replies)
    }

    /// Resolve a reply id sent by the source to a stored reply object.
    pub fn resolve(&self, id: &AnonymousId, reply_id: &str) -> GeoDropResult<std::path::PathBuf> {
        let not_found = || GeoDropError::ReplyNotFound(reply_id.to_string());
        if !reply_id.starts_with(REPLY_PREFIX) {
            return Err(not_found());
        }
        let path = self.store.path(id, reply_id)?;
        let listed = self
            .reply_names(id)?
            .iter()
            .any(|(name, _)| name == reply_id);
        if !listed {
            return Err(not_found());
        }
        Ok(path)
    }

    fn open_one(&self, id: &AnonymousId, pair: &SourceKeyPair, name: &str) -> GeoDropResult<String> {
        let blob = self.store.read(id, name)?;
        let plaintext = sealed::open(pair.secret_key(), &blob)?;
        Ok(String::from_utf8_lossy(&plaintext).into_owned())
    }
}
