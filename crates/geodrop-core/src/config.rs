//! Deployment configuration.
//!
//! Every value has a default rooted at a data directory; a JSON file can
//! override any subset of them.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{GeoDropError, GeoDropResult};

/// Minimum salt length accepted by Argon2.
pub(crate) const MIN_SALT_LEN: usize = 8;

/// Upper bound on overwrite passes for the secure deleter.
const MAX_SHRED_PASSES: u32 = 35;

/// Argon2id cost parameters.
///
/// Used both for identity derivation and for protecting source private keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    /// Memory cost in KiB
    pub memory_kib: u32,
    /// Number of passes
    pub iterations: u32,
    /// Degree of parallelism
    pub parallelism: u32,
}

impl KdfParams {
    pub fn new(memory_kib: u32, iterations: u32, parallelism: u32) -> Self {
        Self {
            memory_kib,
            iterations,
            parallelism,
        }
    }
}

impl Default for KdfParams {
    fn default() -> Self {
        // 64 MiB, 3 passes, 1 lane
        Self::new(64 * 1024, 3, 1)
    }
}

/// Accepted codename lengths, in words.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodenameWords {
    pub min: usize,
    pub max: usize,
    pub default: usize,
}

impl Default for CodenameWords {
    fn default() -> Self {
        Self {
            min: 7,
            max: 10,
            default: 8,
        }
    }
}

/// Pixel size handed to the map renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapSize {
    pub width: u32,
    pub height: u32,
}

impl Default for MapSize {
    fn default() -> Self {
        Self {
            width: 400,
            height: 400,
        }
    }
}

/// Configuration for a GeoDrop deployment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeoDropConfig {
    /// Root of the per-identity namespaces
    pub store_dir: PathBuf,
    /// Per-identity feature collections
    pub geodata_dir: PathBuf,
    /// Published stories, one directory each
    pub story_dir: PathBuf,
    /// Armored public key of the recipient
    pub journalist_key: PathBuf,
    /// Base name of the exported key attachment
    pub journalist_key_name: String,
    /// Deployment-wide salt for the identity deriver
    pub id_salt: String,
    pub kdf: KdfParams,
    pub shred_passes: u32,
    pub codename_words: CodenameWords,
    pub map: MapSize,
}

impl Default for GeoDropConfig {
    fn default() -> Self {
        Self::for_data_dir(".")
    }
}

impl GeoDropConfig {
    /// Default layout rooted at `data_dir`.
    pub fn for_data_dir(data_dir: impl AsRef<Path>) -> Self {
        let data_dir = data_dir.as_ref();
        Self {
            store_dir: data_dir.join("store"),
            geodata_dir: data_dir.join("geodata"),
            story_dir: data_dir.join("stories"),
            journalist_key: data_dir.join("journalist.pub.asc"),
            journalist_key_name: "journalist".to_string(),
            id_salt: "geodrop-identity-v1".to_string(),
            kdf: KdfParams::default(),
            shred_passes: 3,
            codename_words: CodenameWords::default(),
            map: MapSize::default(),
        }
    }

    /// Load a JSON config file; absent keys keep their defaults.
    ///
    /// Relative directories in the file are used as given.
    pub fn load(path: impl AsRef<Path>) -> GeoDropResult<Self> {
        Self::load_over(path, Self::default())
    }

    /// Load a JSON config file on top of `base`: top-level keys present in
    /// the file replace those of `base`, the rest are kept.
    pub fn load_over(path: impl AsRef<Path>, base: Self) -> GeoDropResult<Self> {
        let path = path.as_ref();
        let bad_file = |e: serde_json::Error| GeoDropError::Config(format!("{}: {}", path.display(), e));

        let raw = std::fs::read(path)?;
        let overrides: Map<String, Value> = serde_json::from_slice(&raw).map_err(bad_file)?;
        let Value::Object(mut merged) = serde_json::to_value(base)? else {
            return Err(GeoDropError::Config("config is not an object".to_string()));
        };
        merged.extend(overrides);

        let config: Self = serde_json::from_value(Value::Object(merged)).map_err(bad_file)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the core cannot work with.
    pub fn validate(&self) -> GeoDropResult<()> {
        if self.id_salt.len() < MIN_SALT_LEN {
            return Err(GeoDropError::Config(format!(
                "id_salt must be at least {} bytes",
                MIN_SALT_LEN
            )));
        }
        if self.shred_passes == 0 || self.shred_passes > MAX_SHRED_PASSES {
            return Err(GeoDropError::Config(format!(
                "shred_passes must be within 1..={}",
                MAX_SHRED_PASSES
            )));
        }
        let words = &self.codename_words;
        if words.min == 0 || words.min > words.max || !(words.min..=words.max).contains(&words.default)
        {
            return Err(GeoDropError::Config(
                "codename_words must satisfy 0 < min <= default <= max".to_string(),
            ));
        }
        if self.map.width == 0 || self.map.height == 0 {
            return Err(GeoDropError::Config("map size must be non-zero".to_string()));
        }
        argon2::Params::new(
            self.kdf.memory_kib,
            self.kdf.iterations,
            self.kdf.parallelism,
            None,
        )
        .map_err(|e| GeoDropError::Config(format!("kdf: {}", e)))?;
        Ok(())
    }

    /// Create the storage directories if they do not exist yet.
    pub fn ensure_dirs(&self) -> GeoDropResult<()> {
        std::fs::create_dir_all(&self.store_dir)?;
        std::fs::create_dir_all(&self.geodata_dir)?;
        std::fs::create_dir_all(&self.story_dir)?;
        Ok(())
    }
}
