//! Declarative overlay style.
//!
//! The style is data, not code: one GeoJSON source plus an ordered list of
//! layer descriptors, each optionally placed below a basemap reference layer.
//! The bundled payload ([`RINGS_STYLE_JSON`]) colors features by their
//! `kring` ring index and fades a low-resolution variant (`precision == 3`)
//! out as the map zooms in.
//!
//! ```text
//!  basemap layers ...
//!  fc            ─┐
//!  fc-low-res     │ inserted in order, each just below
//!  water-fade     │ "settlement-subdivision-label"
//!  outlines      ─┘
//!  settlement-subdivision-label
//!  ...
//!  over-labels      appended on top
//! ```

pub mod color;
pub mod expr;

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::geojson::Feature;
pub use color::Color;
pub use expr::{EvalContext, Expression, ExpressionError, StyleValue};

/// Name of the data source the overlay layers draw from.
pub const FEATURES_SOURCE: &str = "features";

/// Basemap layer the overlay is slotted beneath, keeping it under labels.
pub const LABEL_REFERENCE_LAYER: &str = "settlement-subdivision-label";

/// Bundled ring overlay style.
pub const RINGS_STYLE_JSON: &str = include_str!("rings.json");

#[derive(Error, Debug)]
pub enum StyleError {
    #[error("Failed to parse style: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Duplicate layer id: {0}")]
    DuplicateLayer(String),
    #[error("Layer {layer}: {source}")]
    Expression {
        layer: String,
        #[source]
        source: ExpressionError,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayerKind {
    Fill,
    Line,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Geojson,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SourceSpec {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: SourceKind,
}

/// One layer descriptor, in the map style's own vocabulary.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LayerSpec {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: LayerKind,
    pub source: String,
    #[serde(rename = "source-layer", default, skip_serializing_if = "Option::is_none")]
    pub source_layer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layout: Option<Map<String, Value>>,
    #[serde(default)]
    pub paint: Map<String, Value>,
}

impl LayerSpec {
    /// Compile filter and paint expressions.
    pub fn compile(&self) -> Result<CompiledLayer, StyleError> {
        let wrap = |source| StyleError::Expression {
            layer: self.id.clone(),
            source,
        };
        let filter = self
            .filter
            .as_ref()
            .map(Expression::parse)
            .transpose()
            .map_err(wrap)?;
        let paint = self
            .paint
            .iter()
            .map(|(name, value)| Expression::parse(value).map(|e| (name.clone(), e)).map_err(wrap))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(CompiledLayer {
            spec: self.clone(),
            filter,
            paint,
        })
    }
}

/// A layer with its expressions ready for evaluation.
#[derive(Clone, Debug)]
pub struct CompiledLayer {
    pub spec: LayerSpec,
    filter: Option<Expression>,
    paint: Vec<(String, Expression)>,
}

impl CompiledLayer {
    pub fn id(&self) -> &str {
        &self.spec.id
    }

    /// Whether the layer's filter admits `feature` at `zoom`.
    pub fn admits(&self, feature: &Feature, zoom: f64) -> Result<bool, ExpressionError> {
        match &self.filter {
            Some(filter) => filter.test(&EvalContext::for_feature(zoom, feature)),
            None => Ok(true),
        }
    }

    /// Resolved paint properties for `feature` at `zoom`.
    pub fn paint(
        &self,
        feature: &Feature,
        zoom: f64,
    ) -> Result<BTreeMap<String, StyleValue>, ExpressionError> {
        let ctx = EvalContext::for_feature(zoom, feature);
        self.paint
            .iter()
            .map(|(name, expr)| expr.evaluate(&ctx).map(|v| (name.clone(), v)))
            .collect()
    }
}

/// A layer together with where it goes in the basemap's stack.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StyleEntry {
    /// Insert below this existing layer; `None` appends on top.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before: Option<String>,
    pub layer: LayerSpec,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StyleSpec {
    pub source: SourceSpec,
    pub layers: Vec<StyleEntry>,
}

impl StyleSpec {
    /// Parse and validate a style payload.
    pub fn from_json(json: &str) -> Result<Self, StyleError> {
        let spec: StyleSpec = serde_json::from_str(json)?;
        spec.validate()?;
        Ok(spec)
    }

    /// The bundled ring overlay style.
    pub fn rings() -> Result<Self, StyleError> {
        Self::from_json(RINGS_STYLE_JSON)
    }

    /// Unique layer ids and compilable expressions.
    pub fn validate(&self) -> Result<(), StyleError> {
        let mut seen = HashSet::new();
        for entry in &self.layers {
            if !seen.insert(entry.layer.id.as_str()) {
                return Err(StyleError::DuplicateLayer(entry.layer.id.clone()));
            }
            entry.layer.compile()?;
        }
        Ok(())
    }

    pub fn layer(&self, id: &str) -> Option<&LayerSpec> {
        self.layers.iter().map(|e| &e.layer).find(|l| l.id == id)
    }

    pub fn layer_ids(&self) -> Vec<&str> {
        self.layers.iter().map(|e| e.layer.id.as_str()).collect()
    }

    /// Layers that draw from the style's own source.
    pub fn overlay_layers(&self) -> impl Iterator<Item = &LayerSpec> {
        self.layers
            .iter()
            .map(|e| &e.layer)
            .filter(move |l| l.source == self.source.id)
    }

    pub fn to_json_pretty(&self) -> Result<String, StyleError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
