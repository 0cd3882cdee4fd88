//! GeoDrop Core Library
//!
//! Anonymous drop box for messages, map points and documents, sealed for a
//! single journalist.
//!
//! ## Overview
//!
//! A source is known only by a codename it keeps to itself. The codename is
//! stretched into an anonymous id that names a storage namespace; nothing
//! else about the source is ever stored. Everything the source submits is
//! sealed to the journalist's public key under a random object name. Map
//! points are also merged into a per-source GeoJSON collection so the source
//! can see, and the journalist can frame, where things happened.
//!
//! ## Core Principles
//!
//! - **One-way identity**: the id cannot be turned back into the codename
//! - **Write-only submissions**: a source cannot decrypt what it sent
//! - **Replies on request**: a source gets a keypair only once flagged
//! - **Erasure**: read replies are overwritten before they are unlinked
//!
//! ## Quick Start
//!
//! ```ignore
//! use geodrop_core::{GeoDropConfig, SourceService, SubmissionForm};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let service = SourceService::open(GeoDropConfig::for_data_dir("~/.geodrop/data"))?;
//!
//!     let codename = service.generate_codename(None)?;
//!     let session = service.create(codename)?;
//!
//!     let form = SubmissionForm {
//!         msg: Some("crates moved at night".into()),
//!         lat: Some("40.7N".into()),
//!         lng: Some("74.0W".into()),
//!         file: None,
//!     };
//!     for notice in service.submit(&session, &form)?.notices() {
//!         println!("{}", notice);
//!     }
//!
//!     service.drain().await;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod crypto;
pub mod error;
pub mod geo;
pub mod identity;
pub mod journalist;
pub mod keygen;
pub mod keys;
pub mod map;
pub mod reply;
pub mod sealed;
pub mod service;
pub mod session;
pub mod shred;
pub mod store;
pub mod submission;

// Re-exports
pub use config::{CodenameWords, GeoDropConfig, KdfParams, MapSize};
pub use error::{GeoDropError, GeoDropResult};
pub use geo::{Feature, FeatureCollection, FeatureCollectionMerger, Geometry, UploadKind};
pub use identity::{AnonymousId, Codename, IdentityDeriver};
pub use journalist::{JournalistDesk, OpenedSubmission};
pub use keygen::{KeyGenCoordinator, KeyGenTrigger};
pub use keys::{KeyPairService, PublicKey, RecipientKeyPair, SecretKey, SourceKeyPair};
pub use map::{MapLabel, MapRenderer, MapView, NullRenderer};
pub use reply::{Reply, ReplyReader};
pub use service::{load_public_key, KeyAttachment, Lookup, SourceService, Story, KEY_MIME_TYPE};
pub use session::SourceSession;
pub use shred::SecureDeleter;
pub use store::{BlobKind, Store};
pub use submission::{
    DocumentOutcome, SubmissionForm, SubmissionReceipt, SubmissionSealer, UploadedFile,
};
