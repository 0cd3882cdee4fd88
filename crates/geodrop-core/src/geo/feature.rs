//! GeoJSON features and feature collections.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use super::geometry::Geometry;
use crate::error::{GeoDropError, GeoDropResult};

pub const FEATURE_COLLECTION: &str = "FeatureCollection";
const FEATURE: &str = "Feature";

/// Property holding the source's note for a feature.
pub const MSG_PROPERTY: &str = "msg";
/// Property holding the map label number.
pub const SORT_ID_PROPERTY: &str = "sort_id";

/// `geometry` member of a feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureGeometry {
    #[serde(rename = "type")]
    pub kind: String,
    pub coordinates: Geometry,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One annotated geometry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    #[serde(rename = "type", default = "feature_type")]
    pub kind: String,
    pub geometry: FeatureGeometry,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub properties: Map<String, Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Feature {
    /// A point dropped by a source, with an optional note.
    pub fn point(lng: f64, lat: f64, msg: Option<&str>) -> Self {
        let mut properties = Map::new();
        if let Some(msg) = msg.filter(|m| !m.is_empty()) {
            properties.insert(MSG_PROPERTY.to_string(), Value::from(msg));
        }
        Self {
            kind: FEATURE.to_string(),
            geometry: FeatureGeometry {
                kind: "Point".to_string(),
                coordinates: Geometry::point(lng, lat),
                extra: Map::new(),
            },
            properties,
            extra: Map::new(),
        }
    }

    pub fn sort_id(&self) -> Option<u64> {
        self.properties.get(SORT_ID_PROPERTY).and_then(Value::as_u64)
    }

    pub fn set_sort_id(&mut self, sort_id: u64) {
        self.properties
            .insert(SORT_ID_PROPERTY.to_string(), Value::from(sort_id));
    }

    /// The note, when it is a string.
    pub fn msg(&self) -> Option<&str> {
        self.properties.get(MSG_PROPERTY).and_then(Value::as_str)
    }
}

/// Ordered features of one identity or story.
///
/// Deserializing drops every top-level member other than `type` and
/// `features`, which is exactly the sanitization applied before persisting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureCollection {
    #[serde(rename = "type")]
    pub kind: String,
    pub features: Vec<Feature>,
}

impl Default for FeatureCollection {
    fn default() -> Self {
        Self {
            kind: FEATURE_COLLECTION.to_string(),
            features: Vec::new(),
        }
    }
}

impl FeatureCollection {
    /// Parse a stored or uploaded collection, insisting on the collection type.
    pub fn from_slice(bytes: &[u8]) -> GeoDropResult<Self> {
        let collection: Self = serde_json::from_slice(bytes)
            .map_err(|e| GeoDropError::GeometryParse(e.to_string()))?;
        if collection.kind != FEATURE_COLLECTION {
            return Err(GeoDropError::GeometryParse(format!(
                "expected a {}, found {}",
                FEATURE_COLLECTION, collection.kind
            )));
        }
        Ok(collection)
    }

    pub fn to_vec(&self) -> GeoDropResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// `(sort_id, msg)` for every feature carrying a note, in collection order.
    pub fn labels(&self) -> Vec<(u64, String)> {
        self.features
            .iter()
            .filter_map(|f| Some((f.sort_id()?, f.msg()?.to_string())))
            .collect()
    }
}

fn feature_type() -> String {
    FEATURE.to_string()
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Map<String, Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Map<String, Value>>::deserialize(deserializer)?.unwrap_or_default())
}
