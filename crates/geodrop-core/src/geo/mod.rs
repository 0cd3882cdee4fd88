//! Geotagged submissions: parsing, merging and framing.

pub mod bounds;
pub mod coords;
pub mod feature;
pub mod geometry;
pub mod merge;

pub use bounds::{bounds, collection_bounds, map_extent, pad, Bounds, WORLD_SEED};
pub use coords::parse_lat_lng;
pub use feature::{Feature, FeatureCollection};
pub use geometry::{Geometry, Position};
pub use merge::{classify, read_collection, FeatureCollectionMerger, UploadKind};
