//! Source-facing operations.
//!
//! [`SourceService`] wires the components together and exposes what a source
//! can do: create an identity, log in, look up replies and the map, submit,
//! delete replies, and fetch the journalist's key. It also serves published
//! stories, which are public.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::runtime::Handle;
use tracing::{debug, info, warn};

use crate::config::GeoDropConfig;
use crate::error::{GeoDropError, GeoDropResult};
use crate::geo::{
    classify, parse_lat_lng, read_collection, Feature, FeatureCollectionMerger, UploadKind,
};
use crate::identity::{generate_codename, Codename, IdentityDeriver};
use crate::journalist::JournalistDesk;
use crate::keygen::{KeyGenCoordinator, KeyGenTrigger};
use crate::keys::{KeyPairService, PublicKey};
use crate::map::{MapRenderer, MapView, NullRenderer};
use crate::reply::{Reply, ReplyReader};
use crate::session::SourceSession;
use crate::shred::SecureDeleter;
use crate::store::{validate_entry_name, NamespaceCreation, Store};
use crate::submission::{DocumentOutcome, SubmissionForm, SubmissionReceipt, SubmissionSealer};

/// MIME type of the exported journalist key.
pub const KEY_MIME_TYPE: &str = "application/x-geodrop-key";

const UNNAMED_FILE: &str = "[unnamed]";

/// Downloadable copy of the journalist's public key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyAttachment {
    pub filename: String,
    pub mime_type: String,
    pub body: String,
}

/// Everything a source sees after logging in.
#[derive(Debug, Clone)]
pub struct Lookup {
    pub replies: Vec<Reply>,
    /// The journalist wants to reply.
    pub flagged: bool,
    /// A keypair exists, so replies can be sealed to this source.
    pub has_key: bool,
    /// Set when this lookup dispatched (or found running) a key generation.
    pub keygen: Option<KeyGenTrigger>,
    pub map: Option<MapView>,
}

/// A published story.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Story {
    pub id: String,
    pub published: DateTime<Utc>,
}

pub struct SourceService {
    config: GeoDropConfig,
    deriver: IdentityDeriver,
    store: Store,
    keys: KeyPairService,
    keygen: KeyGenCoordinator,
    sealer: SubmissionSealer,
    replies: ReplyReader,
    merger: FeatureCollectionMerger,
    deleter: SecureDeleter,
    renderer: Arc<dyn MapRenderer>,
}

impl SourceService {
    /// Build the service; keygen tasks are spawned on `runtime`.
    pub fn new(
        config: GeoDropConfig,
        journalist_key: PublicKey,
        runtime: Handle,
    ) -> GeoDropResult<Self> {
        config.validate()?;
        config.ensure_dirs()?;

        let deriver = IdentityDeriver::new(config.kdf, config.id_salt.as_bytes())?;
        let store = Store::new(&config.store_dir)?;
        let keys = KeyPairService::new(store.clone(), config.kdf);
        let keygen = KeyGenCoordinator::new(keys.clone(), runtime);
        let sealer = SubmissionSealer::new(store.clone(), journalist_key);
        let replies = ReplyReader::new(store.clone(), keys.clone());
        let merger = FeatureCollectionMerger::new(&config.geodata_dir)?;
        let deleter = SecureDeleter::new(config.shred_passes);

        info!(
            store = %config.store_dir.display(),
            journalist = %journalist_key.fingerprint(),
            "Source service ready"
        );

        Ok(Self {
            config,
            deriver,
            store,
            keys,
            keygen,
            sealer,
            replies,
            merger,
            deleter,
            renderer: Arc::new(NullRenderer),
        })
    }

    /// Build the service on the current tokio runtime, reading the
    /// journalist's key from the configured path.
    pub fn open(config: GeoDropConfig) -> GeoDropResult<Self> {
        let journalist_key = load_public_key(&config.journalist_key)?;
        let runtime = Handle::try_current()
            .map_err(|e| GeoDropError::Config(format!("no tokio runtime: {}", e)))?;
        Self::new(config, journalist_key, runtime)
    }

    /// Use `renderer` for map pictures instead of [`NullRenderer`].
    pub fn with_renderer(mut self, renderer: Arc<dyn MapRenderer>) -> Self {
        self.renderer = renderer;
        self
    }

    pub fn config(&self) -> &GeoDropConfig {
        &self.config
    }

    pub fn keys(&self) -> &KeyPairService {
        &self.keys
    }

    /// Recipient-side operations over the same store.
    pub fn desk(&self) -> JournalistDesk {
        JournalistDesk::new(self.store.clone(), self.keys.clone())
    }

    /// Propose a fresh codename; `None` uses the configured default length.
    pub fn generate_codename(&self, words: Option<usize>) -> GeoDropResult<Codename> {
        let range = &self.config.codename_words;
        generate_codename(words.unwrap_or(range.default), range)
    }

    /// Register the identity of `codename` and open a session for it.
    ///
    /// An existing namespace means two codenames derived the same id; that
    /// is logged and the existing namespace is reused.
    pub fn create(&self, codename: Codename) -> GeoDropResult<SourceSession> {
        let id = self.deriver.derive(&codename);
        match self.store.create_namespace(&id)? {
            NamespaceCreation::Created => info!("Created source identity"),
            NamespaceCreation::AlreadyExisted => {
                let collision = GeoDropError::DuplicateIdentityCollision(id.clone());
                warn!("Namespace already existed at identity creation");
                debug!(error = %collision, "Identity collision");
            }
        }
        Ok(SourceSession::new(codename, id))
    }

    /// Open a session for a known codename.
    pub fn login(&self, codename: Codename) -> GeoDropResult<SourceSession> {
        let id = self.deriver.derive(&codename);
        if !self.store.exists(&id) {
            debug!("Login with unknown codename");
            return Err(GeoDropError::IdentityNotFound);
        }
        Ok(SourceSession::new(codename, id))
    }

    /// Replies, reply status and map of the session's identity.
    ///
    /// Dispatches key generation, without waiting for it, when the
    /// journalist flagged this identity and it has no keypair yet.
    pub fn lookup(&self, session: &SourceSession) -> GeoDropResult<Lookup> {
        let id = session.id();
        let replies = self.replies.list_replies(id, session.codename())?;
        let flagged = self.store.is_flagged(id);

        let keygen = if flagged && !self.keys.has_keypair(id) {
            Some(self.keygen.trigger(id, session.codename()))
        } else {
            None
        };

        Ok(Lookup {
            replies,
            flagged,
            has_key: self.keys.has_keypair(id),
            keygen,
            map: self.map_view(session)?,
        })
    }

    /// Map of the session's own points, if it has any.
    pub fn map_view(&self, session: &SourceSession) -> GeoDropResult<Option<MapView>> {
        self.render_file(&self.merger.path(session.id()))
    }

    /// Seal and store every part of a submission.
    ///
    /// Coordinates are validated before anything is written, so a bad
    /// coordinate leaves storage untouched.
    pub fn submit(
        &self,
        session: &SourceSession,
        form: &SubmissionForm,
    ) -> GeoDropResult<SubmissionReceipt> {
        let id = session.id();
        let location = form
            .coordinates()
            .map(|(lat, lng)| parse_lat_lng(lat, lng))
            .transpose()?;
        let msg = form.message();
        let mut receipt = SubmissionReceipt::default();

        if let Some(msg) = msg {
            self.sealer.seal_message(id, msg)?;
            receipt.message_stored = true;
        }

        if let Some((lat, lng)) = location {
            let feature = self.merger.add_point(id, Feature::point(lng, lat, msg))?;
            self.sealer.seal_location(id, &feature)?;
            receipt.point = feature.sort_id();
        }

        if let Some(file) = &form.file {
            let filename = if file.filename.is_empty() {
                UNNAMED_FILE.to_string()
            } else {
                file.filename.clone()
            };
            let outcome = match classify(&file.bytes) {
                UploadKind::ParsedGeometry(candidate) => {
                    let features = self.merger.merge_upload(id, candidate)?;
                    DocumentOutcome::Mapped { filename, features }
                }
                UploadKind::OpaqueDocument => DocumentOutcome::Stored { filename },
            };
            self.sealer.seal_document(id, file)?;
            receipt.document = Some(outcome);
        }

        debug!(
            message = receipt.message_stored,
            point = receipt.point.is_some(),
            document = receipt.document.is_some(),
            "Submission stored"
        );
        Ok(receipt)
    }

    /// Securely erase one of the session's replies.
    pub fn delete_reply(&self, session: &SourceSession, reply_id: &str) -> GeoDropResult<()> {
        let path = self.replies.resolve(session.id(), reply_id)?;
        self.deleter.erase(&path)?;
        info!("Reply deleted");
        Ok(())
    }

    /// The journalist's public key as a downloadable attachment.
    pub fn journalist_key_attachment(&self) -> KeyAttachment {
        KeyAttachment {
            filename: format!("{}.asc", self.config.journalist_key_name),
            mime_type: KEY_MIME_TYPE.to_string(),
            body: self.sealer.recipient().to_armored(),
        }
    }

    /// Published stories, newest first.
    pub fn list_stories(&self) -> GeoDropResult<Vec<Story>> {
        let mut stories = Vec::new();
        for entry in fs::read_dir(&self.config.story_dir)? {
            let entry = entry?;
            let metadata = entry.metadata()?;
            if !metadata.is_dir() {
                continue;
            }
            let Ok(id) = entry.file_name().into_string() else {
                continue;
            };
            stories.push(Story {
                id,
                published: DateTime::<Utc>::from(metadata.modified()?),
            });
        }
        stories.sort_by(|a, b| b.published.cmp(&a.published).then_with(|| a.id.cmp(&b.id)));
        Ok(stories)
    }

    /// Map of a published story, if it has geodata.
    pub fn story_map(&self, story_id: &str) -> GeoDropResult<Option<MapView>> {
        validate_entry_name(story_id)
            .map_err(|_| GeoDropError::InvalidIdentity(format!("story id {:?}", story_id)))?;
        let path = self
            .config
            .story_dir
            .join(story_id)
            .join(format!("{}.geojson", story_id));
        self.render_file(&path)
    }

    /// Wait for background key generation. For shutdown only.
    pub async fn drain(&self) {
        self.keygen.drain().await;
    }

    fn render_file(&self, path: &Path) -> GeoDropResult<Option<MapView>> {
        match read_collection(path)? {
            Some(collection) => Ok(Some(MapView::build(
                &collection,
                self.renderer.as_ref(),
                self.config.map,
            )?)),
            None => Ok(None),
        }
    }
}

impl std::fmt::Debug for SourceService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceService")
            .field("store", &self.store)
            .field("keygen", &self.keygen)
            .finish_non_exhaustive()
    }
}

/// Read an armored public key file.
pub fn load_public_key(path: &Path) -> GeoDropResult<PublicKey> {
    let armored = fs::read_to_string(path).map_err(|e| {
        GeoDropError::Config(format!("journalist key {}: {}", path.display(), e))
    })?;
    PublicKey::from_armored(&armored)
}
