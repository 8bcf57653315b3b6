//! # ringmap-core
//!
//! Data model and state for the ring overlay.
//!
//! ## Modules
//!
//! - [`geojson`]: typed GeoJSON feature collections with `kring`/`precision` accessors
//! - [`store`]: `FeatureStore`, the shared map handle + feature collection container
//! - [`style`]: the declarative overlay style and its expression evaluator
//!
//! Nothing here talks to a render surface or to disk; see `ringmap-render`
//! and `ringmap-sync` for those.

pub mod geojson;
pub mod store;
pub mod style;

pub use geojson::{
    Feature, FeatureCollection, GeoJsonError, Geometry, Position, Properties, KRING_PROPERTY,
    PRECISION_PROPERTY,
};
pub use store::{FeatureStore, StoreError, StoreSubscription};
pub use style::{
    Color, CompiledLayer, EvalContext, Expression, ExpressionError, LayerKind, LayerSpec,
    SourceSpec, StyleEntry, StyleError, StyleSpec, StyleValue, FEATURES_SOURCE,
    LABEL_REFERENCE_LAYER, RINGS_STYLE_JSON,
};
