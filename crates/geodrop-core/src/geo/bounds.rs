//! Bounding boxes over nested coordinates.
//!
//! Boxes are `[min_lng, min_lat, max_lng, max_lat]`.

use super::feature::FeatureCollection;
use super::geometry::Geometry;

pub type Bounds = [f64; 4];

/// Seed that any real position shrinks into.
pub const WORLD_SEED: Bounds = [180.0, 90.0, -180.0, -90.0];

/// Padding applied to an axis with zero span, in degrees.
const DEGENERATE_PAD: f64 = 10.0;
/// Padding applied to an axis with a span, as a fraction of it.
const SPAN_PAD: f64 = 0.05;

/// Fold every position of `geometry` into `seed`.
pub fn bounds(geometry: &Geometry, seed: Bounds) -> Bounds {
    match geometry {
        Geometry::Coordinate(p) => [
            seed[0].min(p.lng),
            seed[1].min(p.lat),
            seed[2].max(p.lng),
            seed[3].max(p.lat),
        ],
        Geometry::Nested(children) => children.iter().fold(seed, |acc, child| bounds(child, acc)),
    }
}

/// Extent of a whole collection, or `None` when it has no positions.
pub fn collection_bounds(collection: &FeatureCollection) -> Option<Bounds> {
    let positions: usize = collection
        .features
        .iter()
        .map(|f| f.geometry.coordinates.position_count())
        .sum();
    if positions == 0 {
        return None;
    }
    Some(
        collection
            .features
            .iter()
            .fold(WORLD_SEED, |acc, f| bounds(&f.geometry.coordinates, acc)),
    )
}

/// Widen a box so every position sits inside the frame with some margin.
pub fn pad(b: Bounds) -> Bounds {
    let (min_lng, max_lng) = pad_axis(b[0], b[2]);
    let (min_lat, max_lat) = pad_axis(b[1], b[3]);
    [min_lng, min_lat, max_lng, max_lat]
}

fn pad_axis(min: f64, max: f64) -> (f64, f64) {
    if min == max {
        (min - DEGENERATE_PAD, max + DEGENERATE_PAD)
    } else {
        let margin = (max - min) * SPAN_PAD;
        (min - margin, max + margin)
    }
}

/// Padded extent used to frame a map of `collection`.
pub fn map_extent(collection: &FeatureCollection) -> Option<Bounds> {
    collection_bounds(collection).map(pad)
}
