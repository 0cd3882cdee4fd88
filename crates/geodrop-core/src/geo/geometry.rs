//! Coordinate data of arbitrary nesting depth.
//!
//! GeoJSON nests positions differently per geometry type (a point is one
//! position, a polygon is rings of positions, a multipolygon adds another
//! level). [`Geometry`] models all of them as one recursive tree.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::GeoDropError;

/// A single `[lng, lat, ...]` position.
#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub lng: f64,
    pub lat: f64,
    /// Altitude and any further ordinates, kept as given.
    pub extra: Vec<f64>,
}

impl Position {
    pub fn new(lng: f64, lat: f64) -> Self {
        Self {
            lng,
            lat,
            extra: Vec::new(),
        }
    }
}

/// Coordinates of a geometry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub enum Geometry {
    Coordinate(Position),
    Nested(Vec<Geometry>),
}

impl Geometry {
    pub fn point(lng: f64, lat: f64) -> Self {
        Geometry::Coordinate(Position::new(lng, lat))
    }

    /// Number of positions in the tree.
    pub fn position_count(&self) -> usize {
        match self {
            Geometry::Coordinate(_) => 1,
            Geometry::Nested(children) => children.iter().map(Geometry::position_count).sum(),
        }
    }
}

impl TryFrom<Value> for Geometry {
    type Error = GeoDropError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        let Value::Array(items) = value else {
            return Err(GeoDropError::GeometryParse(
                "coordinates must be an array".to_string(),
            ));
        };

        match items.first() {
            Some(Value::Number(_)) => {
                let ordinates = items
                    .iter()
                    .map(|v| {
                        v.as_f64().ok_or_else(|| {
                            GeoDropError::GeometryParse(
                                "position mixes numbers and other values".to_string(),
                            )
                        })
                    })
                    .collect::<Result<Vec<f64>, _>>()?;
                if ordinates.len() < 2 {
                    return Err(GeoDropError::GeometryParse(
                        "position needs at least two ordinates".to_string(),
                    ));
                }
                Ok(Geometry::Coordinate(Position {
                    lng: ordinates[0],
                    lat: ordinates[1],
                    extra: ordinates[2..].to_vec(),
                }))
            }
            _ => items
                .into_iter()
                .map(Geometry::try_from)
                .collect::<Result<Vec<_>, _>>()
                .map(Geometry::Nested),
        }
    }
}

impl From<Geometry> for Value {
    fn from(geometry: Geometry) -> Self {
        match geometry {
            Geometry::Coordinate(p) => {
                let mut ordinates = vec![Value::from(p.lng), Value::from(p.lat)];
                ordinates.extend(p.extra.into_iter().map(Value::from));
                Value::Array(ordinates)
            }
            Geometry::Nested(children) => {
                Value::Array(children.into_iter().map(Value::from).collect())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_point() {
        let g: Geometry = serde_json::from_value(json!([2, 3.5])).unwrap();
        assert_eq!(g, Geometry::point(2.0, 3.5));
    }

    #[test]
    fn test_parse_nested_polygon() {
        let g: Geometry =
            serde_json::from_value(json!([[[0, 0], [1, 0], [1, 1], [0, 0]]])).unwrap();
        assert_eq!(g.position_count(), 4);
        assert!(matches!(g, Geometry::Nested(ref rings) if rings.len() == 1));
    }

    #[test]
    fn test_altitude_is_kept() {
        let g: Geometry = serde_json::from_value(json!([1, 2, 300])).unwrap();
        assert_eq!(serde_json::to_value(&g).unwrap(), json!([1.0, 2.0, 300.0]));
    }

    #[test]
    fn test_rejects_malformed() {
        for bad in [json!(5), json!([1]), json!([1, "x"]), json!({"a": 1}), json!([[1, 2], 3])] {
            assert!(serde_json::from_value::<Geometry>(bad).is_err());
        }
    }

    #[test]
    fn test_empty_array_is_empty_nesting() {
        let g: Geometry = serde_json::from_value(json!([])).unwrap();
        assert_eq!(g, Geometry::Nested(vec![]));
        assert_eq!(g.position_count(), 0);
    }
}
