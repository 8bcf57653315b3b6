//! Render surface contract.
//!
//! A surface is the single map widget of the process. It is created once,
//! reports `Initializing` until its load event fires, and then stays `Ready`
//! (or `Failed`) for the rest of the session:
//!
//! ```text
//!  initialize(config) ──► Initializing ──load──► Ready
//!                                    └──error──► Failed
//! ```
//!
//! Sources and layers may only be touched once the surface is `Ready`.

use std::sync::Arc;

use futures_util::future::BoxFuture;
use ringmap_core::{FeatureCollection, LayerSpec};
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SurfaceError {
    #[error("An access token is required to initialize the map surface")]
    MissingAccessToken,
    #[error("The access token is not a valid map access token")]
    InvalidAccessToken,
    #[error("Map surface failed to initialize: {0}")]
    InitializationFailed(String),
    #[error("Map surface is not ready")]
    NotReady,
    #[error("Map surface load event already fired")]
    AlreadyLoaded,
    #[error("Source already exists: {0}")]
    DuplicateSource(String),
    #[error("Layer already exists: {0}")]
    DuplicateLayer(String),
    #[error("Source not found: {0}")]
    SourceNotFound(String),
    #[error("Source does not accept GeoJSON data: {0}")]
    NotGeoJsonSource(String),
    #[error("Reference layer not found: {0}")]
    ReferenceLayerNotFound(String),
    #[error("Invalid layer: {0}")]
    InvalidLayer(String),
    #[error("Failed to evaluate layer {layer}: {message}")]
    Evaluation { layer: String, message: String },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SurfaceState {
    Initializing,
    Ready,
    Failed,
}

/// Map options the surface is created with.
#[derive(Debug, Clone)]
pub struct SurfaceConfig {
    /// Map access token (required).
    pub access_token: String,
    /// Id of the container element the map mounts into.
    pub container: String,
    pub style_url: String,
    /// `[lon, lat]`
    pub center: [f64; 2],
    pub zoom: f64,
    pub logo_position: String,
    pub attribution_control: bool,
    pub preserve_drawing_buffer: bool,
}

impl Default for SurfaceConfig {
    fn default() -> Self {
        Self {
            access_token: String::new(),
            container: "map".to_string(),
            style_url: "mapbox://styles/mapbox/outdoors-v11".to_string(),
            center: [2.0, 48.0],
            zoom: 2.0,
            logo_position: "bottom-right".to_string(),
            attribution_control: false,
            preserve_drawing_buffer: true,
        }
    }
}

impl SurfaceConfig {
    pub fn with_access_token(token: impl Into<String>) -> Self {
        Self {
            access_token: token.into(),
            ..Self::default()
        }
    }

    /// Default options with a well-formed placeholder token.
    pub fn for_testing() -> Self {
        Self::with_access_token("pk.ringmap.testing")
    }
}

/// Check the shape of a map access token: `pk|sk|tk.<payload>.<signature>`.
pub fn validate_access_token(token: &str) -> Result<(), SurfaceError> {
    let token = token.trim();
    if token.is_empty() {
        return Err(SurfaceError::MissingAccessToken);
    }
    let parts: Vec<&str> = token.split('.').collect();
    match parts.as_slice() {
        ["pk" | "sk" | "tk", rest @ ..] if rest.len() >= 2 && rest.iter().all(|p| !p.is_empty()) => {
            Ok(())
        }
        _ => Err(SurfaceError::InvalidAccessToken),
    }
}

/// Shared handle to the process's map surface.
pub type SurfaceHandle = Arc<dyn RenderSurface>;

/// The map widget, seen from the overlay.
pub trait RenderSurface: Send + Sync {
    /// Stable identity, for logs.
    fn id(&self) -> Uuid;

    fn state(&self) -> SurfaceState;

    fn is_ready(&self) -> bool {
        self.state() == SurfaceState::Ready
    }

    /// Resolves once the load event has fired. Errors if loading failed.
    fn ready(&self) -> BoxFuture<'_, Result<(), SurfaceError>>;

    /// Create a GeoJSON source.
    fn add_source(&self, id: &str, data: Arc<FeatureCollection>) -> Result<(), SurfaceError>;

    fn has_source(&self, id: &str) -> bool;

    /// Replace a GeoJSON source's data wholesale. Layers are untouched.
    fn set_source_data(&self, id: &str, data: Arc<FeatureCollection>) -> Result<(), SurfaceError>;

    /// Add a layer, below `before` if given, otherwise on top.
    fn add_layer(&self, layer: &LayerSpec, before: Option<&str>) -> Result<(), SurfaceError>;

    fn has_layer(&self, id: &str) -> bool;
}
