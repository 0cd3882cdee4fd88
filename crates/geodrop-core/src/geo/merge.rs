//! Per-identity feature collections on disk.
//!
//! Every read-modify-write of one identity's collection runs under that
//! identity's lock, and persisting goes through a temporary file renamed over
//! the target, so concurrent submissions never lose a feature and readers
//! never see a half-written file.

use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use super::feature::{Feature, FeatureCollection};
use crate::crypto::random_token;
use crate::error::GeoDropResult;
use crate::identity::AnonymousId;

const GEOJSON_EXT: &str = "geojson";

/// What an uploaded file turned out to be.
#[derive(Debug, Clone, PartialEq)]
pub enum UploadKind {
    /// A feature collection to merge into the map.
    ParsedGeometry(FeatureCollection),
    /// Anything else; stored for the recipient only.
    OpaqueDocument,
}

/// Decide whether `bytes` is a GeoJSON feature collection.
pub fn classify(bytes: &[u8]) -> UploadKind {
    match FeatureCollection::from_slice(bytes) {
        Ok(collection) => UploadKind::ParsedGeometry(collection),
        Err(e) => {
            debug!(reason = %e, "Upload is not a feature collection");
            UploadKind::OpaqueDocument
        }
    }
}

/// Read a collection file; `None` when there is no file.
pub fn read_collection(path: &Path) -> GeoDropResult<Option<FeatureCollection>> {
    match fs::read(path) {
        Ok(bytes) => FeatureCollection::from_slice(&bytes).map(Some),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Appends submissions to each identity's collection.
#[derive(Debug)]
pub struct FeatureCollectionMerger {
    dir: PathBuf,
    locks: Mutex<HashMap<AnonymousId, Arc<Mutex<()>>>>,
}

impl FeatureCollectionMerger {
    pub fn new(dir: impl AsRef<Path>) -> GeoDropResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            locks: Mutex::new(HashMap::new()),
        })
    }

    /// Location of the collection of `id`.
    pub fn path(&self, id: &AnonymousId) -> PathBuf {
        self.dir.join(format!("{}.{}", id, GEOJSON_EXT))
    }

    pub fn exists(&self, id: &AnonymousId) -> bool {
        self.path(id).is_file()
    }

    pub fn load(&self, id: &AnonymousId) -> GeoDropResult<Option<FeatureCollection>> {
        read_collection(&self.path(id))
    }

    /// Append one feature, numbering it after the existing ones.
    ///
    /// Returns the feature as stored, `sort_id` included.
    pub fn add_point(&self, id: &AnonymousId, mut feature: Feature) -> GeoDropResult<Feature> {
        self.update(id, |collection| {
            feature.set_sort_id(collection.len() as u64 + 1);
            collection.features.push(feature.clone());
        })?;
        Ok(feature)
    }

    /// Append every feature of an uploaded collection.
    ///
    /// Uploaded features keep their order and are numbered after the
    /// existing ones, whatever `sort_id` they arrived with. Returns how many
    /// features were added.
    pub fn merge_upload(
        &self,
        id: &AnonymousId,
        candidate: FeatureCollection,
    ) -> GeoDropResult<usize> {
        let added = candidate.features.len();
        self.update(id, move |collection| {
            let mut next = collection.len() as u64 + 1;
            for mut feature in candidate.features {
                feature.set_sort_id(next);
                next += 1;
                collection.features.push(feature);
            }
        })?;
        Ok(added)
    }

    fn lock_for(&self, id: &AnonymousId) -> Arc<Mutex<()>> {
        Arc::clone(self.locks.lock().entry(id.clone()).or_default())
    }

    fn update<F>(&self, id: &AnonymousId, apply: F) -> GeoDropResult<()>
    where
        F: FnOnce(&mut FeatureCollection),
    {
        let lock = self.lock_for(id);
        let result = {
            let _held = lock.lock();
            self.load(id).and_then(|existing| {
                let mut collection = existing.unwrap_or_default();
                apply(&mut collection);
                self.persist(id, &collection)?;
                debug!(features = collection.len(), "Persisted feature collection");
                Ok(())
            })
        };
        self.release(id, lock);
        result
    }

    /// Drop the map entry of `id` once no other caller holds its lock.
    ///
    /// Clones are only handed out under the map lock, so a count of two
    /// (the map and `lock`) means nobody else is waiting on it.
    fn release(&self, id: &AnonymousId, lock: Arc<Mutex<()>>) {
        let mut locks = self.locks.lock();
        if Arc::strong_count(&lock) == 2 {
            locks.remove(id);
        }
    }

    fn persist(&self, id: &AnonymousId, collection: &FeatureCollection) -> GeoDropResult<()> {
        let target = self.path(id);
        let tmp = self.dir.join(format!(".{}.{}.tmp", id, random_token()));

        let write = || -> GeoDropResult<()> {
            let mut file = OpenOptions::new().write(true).create_new(true).open(&tmp)?;
            file.write_all(&collection.to_vec()?)?;
            file.sync_all()?;
            fs::rename(&tmp, &target)?;
            Ok(())
        };
        let result = write();
        if result.is_err() {
            let _ = fs::remove_file(&tmp);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::thread;
    use tempfile::TempDir;

    fn id(byte: u8) -> AnonymousId {
        AnonymousId::from_digest(&[byte; 32])
    }

    fn sort_ids(collection: &FeatureCollection) -> Vec<u64> {
        collection.features.iter().filter_map(Feature::sort_id).collect()
    }

    #[test]
    fn test_sequential_points_numbered_from_one() {
        let dir = TempDir::new().unwrap();
        let merger = FeatureCollectionMerger::new(dir.path()).unwrap();
        let source = id(1);

        for i in 0..5 {
            let stored = merger
                .add_point(&source, Feature::point(i as f64, 0.0, Some("pin")))
                .unwrap();
            assert_eq!(stored.sort_id(), Some(i + 1));
        }

        let collection = merger.load(&source).unwrap().unwrap();
        assert_eq!(sort_ids(&collection), vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_merge_upload_continues_numbering() {
        let dir = TempDir::new().unwrap();
        let merger = FeatureCollectionMerger::new(dir.path()).unwrap();
        let source = id(2);
        merger
            .add_point(&source, Feature::point(0.0, 0.0, None))
            .unwrap();

        let upload = json!({
            "type": "FeatureCollection",
            "name": "field notes",
            "features": [
                {"type": "Feature", "geometry": {"type": "Point", "coordinates": [1, 1]},
                 "properties": {"sort_id": 99, "msg": "a"}},
                {"type": "Feature", "geometry": {"type": "LineString", "coordinates": [[1, 1], [2, 2]]},
                 "properties": {}}
            ]
        });
        let UploadKind::ParsedGeometry(candidate) = classify(upload.to_string().as_bytes()) else {
            panic!("expected a feature collection");
        };
        assert_eq!(merger.merge_upload(&source, candidate).unwrap(), 2);

        let collection = merger.load(&source).unwrap().unwrap();
        assert_eq!(sort_ids(&collection), vec![1, 2, 3]);
        assert_eq!(collection.features[1].msg(), Some("a"));

        let raw: serde_json::Value =
            serde_json::from_slice(&fs::read(merger.path(&source)).unwrap()).unwrap();
        assert!(raw.get("name").is_none());
        assert_eq!(raw.as_object().unwrap().len(), 2);
    }

    #[test]
    fn test_classify_opaque() {
        assert_eq!(classify(b"\x89PNG\r\n"), UploadKind::OpaqueDocument);
        assert_eq!(classify(b"{\"type\": \"Point\"}"), UploadKind::OpaqueDocument);
        assert_eq!(
            classify(b"{\"type\": \"FeatureCollection\", \"features\": [{\"geometry\": {}}]}"),
            UploadKind::OpaqueDocument
        );
    }

    #[test]
    fn test_concurrent_points_lose_nothing() {
        let dir = TempDir::new().unwrap();
        let merger = Arc::new(FeatureCollectionMerger::new(dir.path()).unwrap());
        let source = id(3);

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let merger = Arc::clone(&merger);
                let source = source.clone();
                thread::spawn(move || {
                    merger
                        .add_point(&source, Feature::point(i as f64, 1.0, None))
                        .unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let collection = merger.load(&source).unwrap().unwrap();
        let mut ids = sort_ids(&collection);
        ids.sort_unstable();
        assert_eq!(ids, (1..=16).collect::<Vec<_>>());
    }

    #[test]
    fn test_locks_released_after_update() {
        let dir = TempDir::new().unwrap();
        let merger = Arc::new(FeatureCollectionMerger::new(dir.path()).unwrap());

        for byte in 10..40 {
            merger
                .add_point(&id(byte), Feature::point(0.0, 0.0, None))
                .unwrap();
        }
        assert!(merger.locks.lock().is_empty());

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let merger = Arc::clone(&merger);
                thread::spawn(move || {
                    merger
                        .add_point(&id(50 + i % 2), Feature::point(i as f64, 0.0, None))
                        .unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert!(merger.locks.lock().is_empty());
        assert_eq!(merger.load(&id(50)).unwrap().unwrap().len(), 4);
    }

    #[test]
    fn test_no_temp_files_left() {
        let dir = TempDir::new().unwrap();
        let merger = FeatureCollectionMerger::new(dir.path()).unwrap();
        merger
            .add_point(&id(4), Feature::point(1.0, 2.0, None))
            .unwrap();

        let names: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names, vec![format!("{}.geojson", id(4))]);
    }
}
