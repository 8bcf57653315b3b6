//! GeoJSON feature model.
//!
//! Only the subset the overlay needs is typed: feature collections of
//! features with an optional geometry and a free-form property map. The
//! `type` tags are enforced on decode, so anything that is not a
//! `FeatureCollection` of `Feature`s fails structurally.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Property key holding the ring index of a feature.
pub const KRING_PROPERTY: &str = "kring";
/// Property key holding the geometric detail level of a feature.
pub const PRECISION_PROPERTY: &str = "precision";

/// `[lon, lat]` or `[lon, lat, alt]`.
pub type Position = Vec<f64>;

/// Free-form feature properties.
pub type Properties = Map<String, Value>;

#[derive(Error, Debug)]
pub enum GeoJsonError {
    #[error("Invalid GeoJSON: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
enum CollectionTag {
    #[default]
    FeatureCollection,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
enum FeatureTag {
    #[default]
    Feature,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Geometry {
    Point { coordinates: Position },
    MultiPoint { coordinates: Vec<Position> },
    LineString { coordinates: Vec<Position> },
    MultiLineString { coordinates: Vec<Vec<Position>> },
    Polygon { coordinates: Vec<Vec<Position>> },
    MultiPolygon { coordinates: Vec<Vec<Vec<Position>>> },
    GeometryCollection { geometries: Vec<Geometry> },
}

impl Geometry {
    /// Whether this geometry has an area a fill layer can draw.
    pub fn is_areal(&self) -> bool {
        match self {
            Geometry::Polygon { .. } | Geometry::MultiPolygon { .. } => true,
            Geometry::GeometryCollection { geometries } => geometries.iter().any(Geometry::is_areal),
            _ => false,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    #[serde(rename = "type")]
    kind: FeatureTag,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    pub geometry: Option<Geometry>,
    #[serde(default)]
    pub properties: Option<Properties>,
}

impl Feature {
    pub fn new(geometry: Option<Geometry>) -> Self {
        Self {
            kind: FeatureTag::Feature,
            id: None,
            geometry,
            properties: None,
        }
    }

    /// A single-ring polygon feature.
    pub fn polygon(exterior: Vec<Position>) -> Self {
        Self::new(Some(Geometry::Polygon {
            coordinates: vec![exterior],
        }))
    }

    pub fn with_id(mut self, id: impl Into<Value>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties
            .get_or_insert_with(Map::new)
            .insert(key.into(), value.into());
        self
    }

    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties.as_ref().and_then(|p| p.get(key))
    }

    /// Ring index, if the feature carries an integral `kring` (`2` or `2.0`).
    pub fn kring(&self) -> Option<i64> {
        self.property(KRING_PROPERTY).and_then(integral)
    }

    /// Detail level, if the feature carries an integral `precision`.
    pub fn precision(&self) -> Option<i64> {
        self.property(PRECISION_PROPERTY).and_then(integral)
    }
}

/// Integer value of a JSON number with no fractional part. The style
/// compares numbers as floats, so `2.0` is the same ring as `2`.
fn integral(value: &Value) -> Option<i64> {
    value.as_i64().or_else(|| {
        value
            .as_f64()
            .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
            .map(|f| f as i64)
    })
}

/// An immutable-by-convention set of features.
///
/// Updates replace the whole collection; nothing in the workspace mutates a
/// collection after it has been handed to the store.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureCollection {
    #[serde(rename = "type")]
    kind: CollectionTag,
    pub features: Vec<Feature>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bbox: Option<Vec<f64>>,
}

impl FeatureCollection {
    /// `{"type": "FeatureCollection", "features": []}`
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn new(features: Vec<Feature>) -> Self {
        Self {
            kind: CollectionTag::FeatureCollection,
            features,
            bbox: None,
        }
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Distinct ring indices present, ascending.
    pub fn rings(&self) -> Vec<i64> {
        let mut rings: Vec<i64> = self.features.iter().filter_map(Feature::kring).collect();
        rings.sort_unstable();
        rings.dedup();
        rings
    }

    /// Features without an integer `kring` property.
    pub fn unringed(&self) -> usize {
        self.features.iter().filter(|f| f.kring().is_none()).count()
    }

    pub fn from_json(json: &str) -> Result<Self, GeoJsonError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, GeoJsonError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    pub fn to_vec(&self) -> Result<Vec<u8>, GeoJsonError> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn to_json_pretty(&self) -> Result<String, GeoJsonError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl FromIterator<Feature> for FeatureCollection {
    fn from_iter<I: IntoIterator<Item = Feature>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
