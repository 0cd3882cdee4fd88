//! Per-identity namespaces on the filesystem.
//!
//! ```text
//! store/
//! └── <anonymous_id>/
//!     ├── 3f9c…_msg.sealed          # message for the recipient
//!     ├── a01b…_ll.sealed           # location feature for the recipient
//!     ├── 77d2…_doc.zip.sealed      # zipped upload for the recipient
//!     ├── reply-c4e8….sealed        # reply for the source
//!     ├── _FLAG                     # recipient wants to reply
//!     └── _KEYPAIR                  # protected source keypair
//! ```
//!
//! Object names are random tokens, never counters or timestamps, so a
//! directory listing says nothing about submission order.

use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tracing::debug;

use crate::crypto::random_token;
use crate::error::{GeoDropError, GeoDropResult};
use crate::identity::AnonymousId;

/// Marker written when the recipient flags a source for reply.
pub const FLAG_FILE: &str = "_FLAG";

/// Protected keypair record of a source.
pub const KEYPAIR_FILE: &str = "_KEYPAIR";

/// Prefix of reply objects.
pub const REPLY_PREFIX: &str = "reply-";

/// Suffix of every sealed object.
pub const SEALED_SUFFIX: &str = ".sealed";

/// Objects being written start with this and are never listed.
const STAGING_PREFIX: &str = ".";

/// Kind of sealed object, which decides its name pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlobKind {
    Message,
    Location,
    Document,
    Reply,
}

impl BlobKind {
    /// Fresh object name for this kind.
    pub fn fresh_name(self) -> String {
        let token = random_token();
        match self {
            BlobKind::Message => format!("{}_msg{}", token, SEALED_SUFFIX),
            BlobKind::Location => format!("{}_ll{}", token, SEALED_SUFFIX),
            BlobKind::Document => format!("{}_doc.zip{}", token, SEALED_SUFFIX),
            BlobKind::Reply => format!("{}{}{}", REPLY_PREFIX, token, SEALED_SUFFIX),
        }
    }

    /// Classify a stored object name; `None` for markers and records.
    pub fn of_name(name: &str) -> Option<Self> {
        let stem = name.strip_suffix(SEALED_SUFFIX)?;
        if stem.starts_with(REPLY_PREFIX) {
            Some(BlobKind::Reply)
        } else if stem.ends_with("_msg") {
            Some(BlobKind::Message)
        } else if stem.ends_with("_ll") {
            Some(BlobKind::Location)
        } else if stem.ends_with("_doc.zip") {
            Some(BlobKind::Document)
        } else {
            None
        }
    }
}

/// Outcome of creating a namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamespaceCreation {
    Created,
    AlreadyExisted,
}

/// One entry of a namespace listing.
#[derive(Debug, Clone)]
pub struct StoredObject {
    pub name: String,
    pub modified: SystemTime,
}

/// Filesystem-backed collection of identity namespaces.
#[derive(Debug, Clone)]
pub struct Store {
    root: PathBuf,
}

impl Store {
    /// Open the store rooted at `root`, creating the directory if needed.
    pub fn new(root: impl AsRef<Path>) -> GeoDropResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory of one identity.
    pub fn namespace(&self, id: &AnonymousId) -> PathBuf {
        self.root.join(id.as_str())
    }

    /// Path of a named object inside a namespace.
    pub fn path(&self, id: &AnonymousId, name: &str) -> GeoDropResult<PathBuf> {
        validate_entry_name(name)?;
        Ok(self.namespace(id).join(name))
    }

    /// Whether a namespace exists for `id`; this is what makes an identity "known".
    pub fn exists(&self, id: &AnonymousId) -> bool {
        self.namespace(id).is_dir()
    }

    /// Create the namespace for `id`.
    ///
    /// Uses a single `mkdir`, so of two racing creators exactly one sees
    /// [`NamespaceCreation::Created`].
    pub fn create_namespace(&self, id: &AnonymousId) -> GeoDropResult<NamespaceCreation> {
        match fs::create_dir(self.namespace(id)) {
            Ok(()) => Ok(NamespaceCreation::Created),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(NamespaceCreation::AlreadyExisted),
            Err(e) => Err(e.into()),
        }
    }

    /// List the objects of a namespace, sorted by name.
    pub fn list(&self, id: &AnonymousId) -> GeoDropResult<Vec<StoredObject>> {
        let mut objects = Vec::new();
        for entry in fs::read_dir(self.namespace(id))? {
            let entry = entry?;
            let metadata = entry.metadata()?;
            if !metadata.is_file() {
                continue;
            }
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            if name.starts_with(STAGING_PREFIX) {
                continue;
            }
            objects.push(StoredObject {
                name,
                modified: metadata.modified()?,
            });
        }
        objects.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(objects)
    }

    /// Write a new object; fails with `AlreadyExists` rather than overwrite.
    ///
    /// The bytes are staged in a hidden file and hard-linked into place, so
    /// the object appears complete or not at all.
    pub fn write_new(&self, id: &AnonymousId, name: &str, bytes: &[u8]) -> GeoDropResult<PathBuf> {
        let path = self.path(id, name)?;
        let staging = self
            .namespace(id)
            .join(format!("{}{}.{}.tmp", STAGING_PREFIX, name, random_token()));

        let published = stage(&staging, bytes).and_then(|()| Ok(fs::hard_link(&staging, &path)?));
        if let Err(e) = fs::remove_file(&staging) {
            if e.kind() != ErrorKind::NotFound {
                debug!(error = %e, "Staging file left behind");
            }
        }
        published?;
        Ok(path)
    }

    /// Remove an object; a missing object is not an error.
    pub fn remove(&self, id: &AnonymousId, name: &str) -> GeoDropResult<()> {
        match fs::remove_file(self.path(id, name)?) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Store a sealed blob under a fresh name and return that name.
    pub fn put_sealed(&self, id: &AnonymousId, kind: BlobKind, blob: &[u8]) -> GeoDropResult<String> {
        let name = kind.fresh_name();
        self.write_new(id, &name, blob)?;
        debug!(kind = ?kind, size = blob.len(), "Stored sealed object");
        Ok(name)
    }

    /// Read an object.
    pub fn read(&self, id: &AnonymousId, name: &str) -> GeoDropResult<Vec<u8>> {
        Ok(fs::read(self.path(id, name)?)?)
    }

    /// Whether the recipient flagged this identity for reply.
    pub fn is_flagged(&self, id: &AnonymousId) -> bool {
        self.namespace(id).join(FLAG_FILE).is_file()
    }

    /// Flag this identity for reply. Idempotent.
    pub fn set_flag(&self, id: &AnonymousId) -> GeoDropResult<()> {
        if !self.exists(id) {
            return Err(GeoDropError::IdentityNotFound);
        }
        File::create(self.namespace(id).join(FLAG_FILE))?;
        Ok(())
    }

    /// All identities with a namespace, sorted.
    pub fn identities(&self) -> GeoDropResult<Vec<AnonymousId>> {
        let mut ids = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            if let Some(id) = entry
                .file_name()
                .to_str()
                .and_then(|name| AnonymousId::parse(name).ok())
            {
                ids.push(id);
            }
        }
        ids.sort();
        Ok(ids)
    }
}

fn stage(path: &Path, bytes: &[u8]) -> GeoDropResult<()> {
    let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    Ok(())
}

/// Object names must be a single, plain path component.
pub fn validate_entry_name(name: &str) -> GeoDropResult<()> {
    let valid = !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\', '\0']);
    if valid {
        Ok(())
    } else {
        Err(GeoDropError::ReplyNotFound(name.to_string()))
    }
}
