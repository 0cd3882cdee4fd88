//! Sealing source submissions for the recipient.
//!
//! Every payload is sealed to the journalist's public key and stored under a
//! fresh random name. The source keeps no way to decrypt what it sent.

use std::io::{Cursor, Write};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::{GeoDropError, GeoDropResult};
use crate::geo::Feature;
use crate::identity::AnonymousId;
use crate::keys::PublicKey;
use crate::sealed;
use crate::store::{BlobKind, Store};

/// Name used inside the archive when the upload has no usable file name.
const UNNAMED_UPLOAD: &str = "upload";

/// A file attached to a submission.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// Raw submission fields. Any subset may be present.
#[derive(Debug, Clone, Default)]
pub struct SubmissionForm {
    pub msg: Option<String>,
    pub lat: Option<String>,
    pub lng: Option<String>,
    pub file: Option<UploadedFile>,
}

impl SubmissionForm {
    /// The message, if it has any content.
    pub fn message(&self) -> Option<&str> {
        self.msg.as_deref().filter(|m| !m.trim().is_empty())
    }

    /// Both coordinates, if both were filled in.
    pub fn coordinates(&self) -> Option<(&str, &str)> {
        let lat = self.lat.as_deref().map(str::trim).filter(|s| !s.is_empty())?;
        let lng = self.lng.as_deref().map(str::trim).filter(|s| !s.is_empty())?;
        Some((lat, lng))
    }
}

/// What happened to an uploaded file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentOutcome {
    /// Parsed as a feature collection and merged into the map.
    Mapped { filename: String, features: usize },
    /// Stored for review only.
    Stored { filename: String },
}

/// Result of one submission, for user-facing confirmations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubmissionReceipt {
    pub message_stored: bool,
    /// `sort_id` given to the dropped point.
    pub point: Option<u64>,
    pub document: Option<DocumentOutcome>,
}

impl SubmissionReceipt {
    /// Generic confirmations; nothing here reveals stored state.
    pub fn notices(&self) -> Vec<String> {
        let mut notices = Vec::new();
        if self.message_stored {
            notices.push("Thanks! We received your message.".to_string());
        }
        if self.point.is_some() {
            notices.push("Thanks! We mapped your point.".to_string());
        }
        match &self.document {
            Some(DocumentOutcome::Mapped { filename, .. }) => {
                notices.push(format!("Thanks! We mapped data from '{}'.", filename))
            }
            Some(DocumentOutcome::Stored { filename }) => notices.push(format!(
                "Thanks! We stored your document '{}' for review.",
                filename
            )),
            None => {}
        }
        notices
    }

    pub fn is_empty(&self) -> bool {
        !self.message_stored && self.point.is_none() && self.document.is_none()
    }
}

/// Seals payloads to the recipient and stores them.
#[derive(Debug, Clone)]
pub struct SubmissionSealer {
    store: Store,
    recipient: PublicKey,
}

impl SubmissionSealer {
    pub fn new(store: Store, recipient: PublicKey) -> Self {
        Self { store, recipient }
    }

    pub fn recipient(&self) -> &PublicKey {
        &self.recipient
    }

    /// Seal a text message. Returns the stored object name.
    pub fn seal_message(&self, id: &AnonymousId, msg: &str) -> GeoDropResult<String> {
        self.put(id, BlobKind::Message, msg.as_bytes())
    }

    /// Seal the GeoJSON of a dropped point.
    pub fn seal_location(&self, id: &AnonymousId, feature: &Feature) -> GeoDropResult<String> {
        self.put(id, BlobKind::Location, &serde_json::to_vec(feature)?)
    }

    /// Zip an uploaded file and seal the archive.
    pub fn seal_document(&self, id: &AnonymousId, file: &UploadedFile) -> GeoDropResult<String> {
        let archive = zip_document(&file.filename, &file.bytes)?;
        self.put(id, BlobKind::Document, &archive)
    }

    fn put(&self, id: &AnonymousId, kind: BlobKind, plaintext: &[u8]) -> GeoDropResult<String> {
        let blob = sealed::seal(&self.recipient, plaintext)?;
        self.store.put_sealed(id, kind, &blob)
    }
}

/// Single-entry zip archive holding `bytes` under the base name of `filename`.
pub fn zip_document(filename: &str, bytes: &[u8]) -> GeoDropResult<Vec<u8>> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    writer
        .start_file(archive_entry_name(filename), options)
        .map_err(zip_error)?;
    writer.write_all(bytes)?;
    let cursor = writer.finish().map_err(zip_error)?;
    Ok(cursor.into_inner())
}

/// Strip any directory part a client sent along with the file name.
pub fn archive_entry_name(filename: &str) -> String {
    let base = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();
    if base.is_empty() || base == "." || base == ".." {
        UNNAMED_UPLOAD.to_string()
    } else {
        base.to_string()
    }
}

fn zip_error(e: zip::result::ZipError) -> GeoDropError {
    GeoDropError::Io(std::io::Error::other(e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::RecipientKeyPair;
    use std::io::Read;
    use tempfile::TempDir;

    fn setup() -> (TempDir, Store, RecipientKeyPair, SubmissionSealer, AnonymousId) {
        let dir = TempDir::new().unwrap();
        let store = Store::new(dir.path()).unwrap();
        let journalist = RecipientKeyPair::generate().unwrap();
        let sealer = SubmissionSealer::new(store.clone(), journalist.public_key());
        let id = AnonymousId::from_digest(&[6u8; 32]);
        store.create_namespace(&id).unwrap();
        (dir, store, journalist, sealer, id)
    }

    #[test]
    fn test_message_sealed_for_recipient() {
        let (_dir, store, journalist, sealer, id) = setup();
        let name = sealer.seal_message(&id, "the ledger is in the basement").unwrap();
        assert!(name.ends_with("_msg.sealed"));

        let blob = store.read(&id, &name).unwrap();
        assert!(!blob.windows(6).any(|w| w == b"ledger"));
        let opened = sealed::open(journalist.secret_key(), &blob).unwrap();
        assert_eq!(opened, b"the ledger is in the basement");
    }

    #[test]
    fn test_distinct_names() {
        let (_dir, _store, _journalist, sealer, id) = setup();
        let a = sealer.seal_message(&id, "same").unwrap();
        let b = sealer.seal_message(&id, "same").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_document_is_zipped() {
        let (_dir, store, journalist, sealer, id) = setup();
        let file = UploadedFile {
            filename: "C:\\Users\\me\\memo.pdf".to_string(),
            bytes: b"%PDF-1.4 memo".to_vec(),
        };
        let name = sealer.seal_document(&id, &file).unwrap();
        assert!(name.ends_with("_doc.zip.sealed"));

        let archive = sealed::open(journalist.secret_key(), &store.read(&id, &name).unwrap()).unwrap();
        let mut zip = zip::ZipArchive::new(Cursor::new(archive)).unwrap();
        assert_eq!(zip.len(), 1);
        let mut entry = zip.by_index(0).unwrap();
        assert_eq!(entry.name(), "memo.pdf");
        let mut content = Vec::new();
        entry.read_to_end(&mut content).unwrap();
        assert_eq!(content, b"%PDF-1.4 memo");
    }

    #[test]
    fn test_archive_entry_name() {
        assert_eq!(archive_entry_name("../../etc/passwd"), "passwd");
        assert_eq!(archive_entry_name("dir/"), "upload");
        assert_eq!(archive_entry_name(""), "upload");
        assert_eq!(archive_entry_name("map.geojson"), "map.geojson");
    }

    #[test]
    fn test_form_helpers() {
        let form = SubmissionForm {
            msg: Some("   ".to_string()),
            lat: Some("40.7N".to_string()),
            lng: Some("".to_string()),
            file: None,
        };
        assert!(form.message().is_none());
        assert!(form.coordinates().is_none());
    }

    #[test]
    fn test_receipt_notices() {
        let receipt = SubmissionReceipt {
            message_stored: true,
            point: Some(1),
            document: Some(DocumentOutcome::Stored {
                filename: "memo.pdf".to_string(),
            }),
        };
        assert_eq!(
            receipt.notices(),
            vec![
                "Thanks! We received your message.".to_string(),
                "Thanks! We mapped your point.".to_string(),
                "Thanks! We stored your document 'memo.pdf' for review.".to_string(),
            ]
        );
        assert!(SubmissionReceipt::default().is_empty());
    }
}
