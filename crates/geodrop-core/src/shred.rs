//! Secure deletion of stored objects.
//!
//! ```text
//! erase(path):
//!   preflight  -> regular file? open for writing?      (fails: object untouched)
//!   overwrite  -> N passes of random bytes, fsync each (committed from here on)
//!   truncate   -> length 0, fsync
//!   unlink     -> remove directory entry, fsync parent
//! ```
//!
//! Once the first pass starts the object is already unreadable, so any later
//! fault is reported and the unlink is still attempted: the caller never
//! sees a half-wiped object left listed under its old name.

use std::fs::{self, File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use rand::RngCore;
use tracing::{debug, warn};

use crate::error::{GeoDropError, GeoDropResult};

const CHUNK_SIZE: usize = 64 * 1024;

/// Overwrites then removes files.
#[derive(Debug, Clone, Copy)]
pub struct SecureDeleter {
    passes: u32,
}

impl Default for SecureDeleter {
    fn default() -> Self {
        Self { passes: 3 }
    }
}

impl SecureDeleter {
    /// `passes` is clamped to at least one.
    pub fn new(passes: u32) -> Self {
        Self {
            passes: passes.max(1),
        }
    }

    pub fn passes(&self) -> u32 {
        self.passes
    }

    /// Irreversibly erase the file at `path`.
    pub fn erase(&self, path: &Path) -> GeoDropResult<()> {
        let fail = |reason: String| GeoDropError::SecureDeleteFailed {
            path: path.to_path_buf(),
            reason,
        };

        // Preflight: nothing below this block has touched the data yet.
        let metadata = fs::symlink_metadata(path).map_err(|e| fail(format!("stat: {}", e)))?;
        if !metadata.is_file() {
            return Err(fail("not a regular file".to_string()));
        }
        let mut file = OpenOptions::new()
            .write(true)
            .open(path)
            .map_err(|e| fail(format!("open: {}", e)))?;
        let len = metadata.len();

        let wiped = self.overwrite(&mut file, len);
        drop(file);
        let removed = fs::remove_file(path);

        match (wiped, removed) {
            (Ok(()), Ok(())) => {
                sync_parent(path);
                debug!(passes = self.passes, bytes = len, "Erased object");
                Ok(())
            }
            (Err(e), Ok(())) => {
                warn!(error = %e, "Overwrite incomplete, object unlinked");
                Err(fail(format!("overwrite: {}", e)))
            }
            (_, Err(e)) => {
                warn!(error = %e, "Unlink failed after overwrite");
                Err(fail(format!("unlink: {}", e)))
            }
        }
    }

    fn overwrite(&self, file: &mut File, len: u64) -> std::io::Result<()> {
        let mut rng = rand::rng();
        let mut buf = vec![0u8; CHUNK_SIZE];

        for _ in 0..self.passes {
            file.seek(SeekFrom::Start(0))?;
            let mut remaining = len;
            while remaining > 0 {
                let n = remaining.min(CHUNK_SIZE as u64) as usize;
                rng.fill_bytes(&mut buf[..n]);
                file.write_all(&buf[..n])?;
                remaining -= n as u64;
            }
            file.sync_all()?;
        }

        file.set_len(0)?;
        file.sync_all()
    }
}

/// Persist the directory entry removal; failure here is not fatal.
fn sync_parent(path: &Path) {
    let parent: PathBuf = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    if let Ok(dir) = File::open(&parent) {
        let _ = dir.sync_all();
    }
}
