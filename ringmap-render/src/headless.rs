//! In-process render surface.
//!
//! `HeadlessSurface` keeps the full layer stack, the named sources and the
//! most recent data pushes in memory, and resolves paint with the style
//! expression evaluator instead of rasterizing. It backs the viewer's
//! `run` command and every test that needs a surface.

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures_util::future::BoxFuture;
use log::{debug, error, info};
use ringmap_core::{CompiledLayer, FeatureCollection, LayerSpec, StyleValue};
use rustc_hash::FxHashMap;
use tokio::sync::watch;
use uuid::Uuid;

use crate::surface::{
    validate_access_token, RenderSurface, SurfaceConfig, SurfaceError, SurfaceState,
};

/// How many pushes [`HeadlessSurface::data_history`] remembers.
pub const HISTORY_LIMIT: usize = 64;

/// The basemap's own sources and layers, present once the surface loads.
#[derive(Debug, Clone, PartialEq)]
pub struct BasemapSpec {
    pub sources: Vec<String>,
    /// Bottom to top.
    pub layers: Vec<String>,
}

impl BasemapSpec {
    /// The subset of the outdoors style the overlay interacts with.
    pub fn outdoors() -> Self {
        Self {
            sources: vec!["composite".to_string()],
            layers: [
                "land",
                "water",
                "road-primary",
                "settlement-subdivision-label",
                "settlement-label",
                "poi-label",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
        }
    }
}

impl Default for BasemapSpec {
    fn default() -> Self {
        Self::outdoors()
    }
}

/// Call counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SurfaceStats {
    pub sources_added: usize,
    pub layers_added: usize,
    pub data_updates: usize,
}

/// One feature as drawn by one layer.
#[derive(Clone, Debug, PartialEq)]
pub struct RenderedFeature {
    pub layer: String,
    /// Index into the source's feature list.
    pub feature: usize,
    pub kring: Option<i64>,
    pub paint: BTreeMap<String, StyleValue>,
}

enum Source {
    Basemap,
    GeoJson(Arc<FeatureCollection>),
}

enum StackLayer {
    Basemap(String),
    Overlay(Box<CompiledLayer>),
}

impl StackLayer {
    fn id(&self) -> &str {
        match self {
            StackLayer::Basemap(id) => id,
            StackLayer::Overlay(layer) => layer.id(),
        }
    }
}

#[derive(Default)]
struct SurfaceInner {
    load_fired: bool,
    failure: Option<String>,
    sources: FxHashMap<String, Source>,
    layers: Vec<StackLayer>,
    history: VecDeque<(String, Arc<FeatureCollection>)>,
    stats: SurfaceStats,
}

pub struct HeadlessSurface {
    id: Uuid,
    config: SurfaceConfig,
    basemap: BasemapSpec,
    lifecycle: watch::Sender<SurfaceState>,
    inner: Mutex<SurfaceInner>,
}

impl HeadlessSurface {
    /// Create a surface in the `Initializing` state. The load event is not
    /// fired; call [`fire_load`](Self::fire_load) or use
    /// [`initialize`](Self::initialize).
    pub fn new(config: SurfaceConfig) -> Result<Self, SurfaceError> {
        Self::with_basemap(config, BasemapSpec::default())
    }

    pub fn with_basemap(config: SurfaceConfig, basemap: BasemapSpec) -> Result<Self, SurfaceError> {
        if config.access_token.trim().is_empty() {
            return Err(SurfaceError::MissingAccessToken);
        }
        let (lifecycle, _) = watch::channel(SurfaceState::Initializing);
        let surface = Self {
            id: Uuid::new_v4(),
            config,
            basemap,
            lifecycle,
            inner: Mutex::new(SurfaceInner::default()),
        };
        info!(
            "Surface {} initializing: style={} center={:?} zoom={}",
            surface.id, surface.config.style_url, surface.config.center, surface.config.zoom
        );
        Ok(surface)
    }

    /// Create the surface and schedule its load event on the current Tokio
    /// runtime. Returns immediately, before the surface is ready.
    pub fn initialize(config: SurfaceConfig) -> Result<Arc<Self>, SurfaceError> {
        let surface = Arc::new(Self::new(config)?);
        let loading = Arc::clone(&surface);
        tokio::spawn(async move {
            tokio::task::yield_now().await;
            if let Err(e) = loading.fire_load() {
                error!("Surface {} is unavailable: {e}", loading.id);
            }
        });
        Ok(surface)
    }

    /// Fire the one-time load event: install the basemap and become `Ready`,
    /// or become `Failed` if the access token is rejected.
    pub fn fire_load(&self) -> Result<(), SurfaceError> {
        {
            let mut inner = self.inner();
            if inner.load_fired {
                return Err(SurfaceError::AlreadyLoaded);
            }
            inner.load_fired = true;

            if let Err(e) = validate_access_token(&self.config.access_token) {
                inner.failure = Some(e.to_string());
                drop(inner);
                self.lifecycle.send_replace(SurfaceState::Failed);
                return Err(e);
            }

            for source in &self.basemap.sources {
                inner.sources.insert(source.clone(), Source::Basemap);
            }
            inner.layers = self
                .basemap
                .layers
                .iter()
                .cloned()
                .map(StackLayer::Basemap)
                .collect();
        }

        self.lifecycle.send_replace(SurfaceState::Ready);
        info!("Surface {} ready", self.id);
        Ok(())
    }

    pub fn config(&self) -> &SurfaceConfig {
        &self.config
    }

    pub fn failure(&self) -> Option<String> {
        self.inner().failure.clone()
    }

    /// Layer ids, bottom to top.
    pub fn layer_ids(&self) -> Vec<String> {
        self.inner().layers.iter().map(|l| l.id().to_string()).collect()
    }

    /// Current data of a GeoJSON source.
    pub fn source_data(&self, id: &str) -> Option<Arc<FeatureCollection>> {
        match self.inner().sources.get(id) {
            Some(Source::GeoJson(data)) => Some(Arc::clone(data)),
            _ => None,
        }
    }

    /// The last collections pushed into `id` via `set_source_data`, oldest
    /// first. Only the newest [`HISTORY_LIMIT`] pushes across all sources
    /// are kept.
    pub fn data_history(&self, id: &str) -> Vec<Arc<FeatureCollection>> {
        self.inner()
            .history
            .iter()
            .filter(|(source, _)| source == id)
            .map(|(_, data)| Arc::clone(data))
            .collect()
    }

    pub fn stats(&self) -> SurfaceStats {
        self.inner().stats
    }

    /// Resolve every overlay layer against its source's features at `zoom`,
    /// in stack order. Layers on basemap sources have no features here and
    /// are skipped.
    pub fn render(&self, zoom: f64) -> Result<Vec<RenderedFeature>, SurfaceError> {
        if !self.is_ready() {
            return Err(SurfaceError::NotReady);
        }
        let inner = self.inner();
        let mut drawn = Vec::new();

        for layer in inner.layers.iter().filter_map(|l| match l {
            StackLayer::Overlay(layer) => Some(layer),
            StackLayer::Basemap(_) => None,
        }) {
            let Some(Source::GeoJson(data)) = inner.sources.get(&layer.spec.source) else {
                continue;
            };
            let eval_err = |e: ringmap_core::ExpressionError| SurfaceError::Evaluation {
                layer: layer.id().to_string(),
                message: e.to_string(),
            };
            for (index, feature) in data.features.iter().enumerate() {
                if !layer.admits(feature, zoom).map_err(eval_err)? {
                    continue;
                }
                drawn.push(RenderedFeature {
                    layer: layer.id().to_string(),
                    feature: index,
                    kring: feature.kring(),
                    paint: layer.paint(feature, zoom).map_err(eval_err)?,
                });
            }
        }
        Ok(drawn)
    }

    fn inner(&self) -> MutexGuard<'_, SurfaceInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn ensure_ready(&self) -> Result<(), SurfaceError> {
        if self.is_ready() {
            Ok(())
        } else {
            Err(SurfaceError::NotReady)
        }
    }
}

impl RenderSurface for HeadlessSurface {
    fn id(&self) -> Uuid {
        self.id
    }

    fn state(&self) -> SurfaceState {
        *self.lifecycle.borrow()
    }

    fn ready(&self) -> BoxFuture<'_, Result<(), SurfaceError>> {
        let mut lifecycle = self.lifecycle.subscribe();
        Box::pin(async move {
            let state = match lifecycle.wait_for(|s| *s != SurfaceState::Initializing).await {
                Ok(state) => *state,
                Err(_) => {
                    return Err(SurfaceError::InitializationFailed(
                        "surface dropped before loading".to_string(),
                    ))
                }
            };
            match state {
                SurfaceState::Ready => Ok(()),
                _ => Err(SurfaceError::InitializationFailed(
                    self.failure().unwrap_or_else(|| "unknown error".to_string()),
                )),
            }
        })
    }

    fn add_source(&self, id: &str, data: Arc<FeatureCollection>) -> Result<(), SurfaceError> {
        self.ensure_ready()?;
        let mut inner = self.inner();
        if inner.sources.contains_key(id) {
            return Err(SurfaceError::DuplicateSource(id.to_string()));
        }
        inner.sources.insert(id.to_string(), Source::GeoJson(data));
        inner.stats.sources_added += 1;
        debug!("Surface {}: added source {id}", self.id);
        Ok(())
    }

    fn has_source(&self, id: &str) -> bool {
        self.inner().sources.contains_key(id)
    }

    fn set_source_data(&self, id: &str, data: Arc<FeatureCollection>) -> Result<(), SurfaceError> {
        let mut inner = self.inner();
        match inner.sources.get_mut(id) {
            Some(Source::GeoJson(current)) => *current = Arc::clone(&data),
            Some(Source::Basemap) => return Err(SurfaceError::NotGeoJsonSource(id.to_string())),
            None => return Err(SurfaceError::SourceNotFound(id.to_string())),
        }
        inner.stats.data_updates += 1;
        debug!(
            "Surface {}: source {id} now holds {} features",
            self.id,
            data.len()
        );
        if inner.history.len() == HISTORY_LIMIT {
            inner.history.pop_front();
        }
        inner.history.push_back((id.to_string(), data));
        Ok(())
    }

    fn add_layer(&self, layer: &LayerSpec, before: Option<&str>) -> Result<(), SurfaceError> {
        self.ensure_ready()?;
        let compiled = layer
            .compile()
            .map_err(|e| SurfaceError::InvalidLayer(e.to_string()))?;

        let mut inner = self.inner();
        if inner.layers.iter().any(|l| l.id() == layer.id) {
            return Err(SurfaceError::DuplicateLayer(layer.id.clone()));
        }
        if !inner.sources.contains_key(&layer.source) {
            return Err(SurfaceError::SourceNotFound(layer.source.clone()));
        }

        let index = match before {
            Some(reference) => inner
                .layers
                .iter()
                .position(|l| l.id() == reference)
                .ok_or_else(|| SurfaceError::ReferenceLayerNotFound(reference.to_string()))?,
            None => inner.layers.len(),
        };
        inner
            .layers
            .insert(index, StackLayer::Overlay(Box::new(compiled)));
        inner.stats.layers_added += 1;
        debug!("Surface {}: added layer {} at {index}", self.id, layer.id);
        Ok(())
    }

    fn has_layer(&self, id: &str) -> bool {
        self.inner().layers.iter().any(|l| l.id() == id)
    }
}
