//! Map view of a feature collection.
//!
//! Rendering itself is delegated to a [`MapRenderer`]; this module frames the
//! collection, hands it over and packages the picture with its labels.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Serialize;

use crate::config::MapSize;
use crate::error::{GeoDropError, GeoDropResult};
use crate::geo::{map_extent, Bounds, FeatureCollection};

const PNG_SIGNATURE: &[u8] = b"\x89PNG\r\n\x1a\n";
const PNG_DATA_URI_PREFIX: &str = "data:image/png;base64,";

/// Draws a collection inside an extent.
pub trait MapRenderer: Send + Sync {
    /// PNG bytes, or `None` when this renderer produces no picture.
    fn render(
        &self,
        collection: &FeatureCollection,
        extent: Bounds,
        size: MapSize,
    ) -> GeoDropResult<Option<Vec<u8>>>;
}

/// Renderer for deployments without a cartographic engine.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullRenderer;

impl MapRenderer for NullRenderer {
    fn render(&self, _: &FeatureCollection, _: Bounds, _: MapSize) -> GeoDropResult<Option<Vec<u8>>> {
        Ok(None)
    }
}

/// A numbered note shown next to the map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MapLabel {
    pub sort_id: u64,
    pub msg: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapView {
    /// `data:image/png;base64,...`
    pub image: Option<String>,
    pub labels: Vec<MapLabel>,
    /// Padded `[min_lng, min_lat, max_lng, max_lat]`
    pub extent: Option<Bounds>,
}

impl MapView {
    pub fn build(
        collection: &FeatureCollection,
        renderer: &dyn MapRenderer,
        size: MapSize,
    ) -> GeoDropResult<Self> {
        let labels = collection
            .labels()
            .into_iter()
            .map(|(sort_id, msg)| MapLabel { sort_id, msg })
            .collect();
        let extent = map_extent(collection);

        let image = match extent {
            Some(extent) => renderer
                .render(collection, extent, size)?
                .map(|png| png_data_uri(&png))
                .transpose()?,
            None => None,
        };

        Ok(Self {
            image,
            labels,
            extent,
        })
    }
}

fn png_data_uri(png: &[u8]) -> GeoDropResult<String> {
    if !png.starts_with(PNG_SIGNATURE) {
        return Err(GeoDropError::Render("renderer output is not a PNG".to_string()));
    }
    Ok(format!("{}{}", PNG_DATA_URI_PREFIX, STANDARD.encode(png)))
}
