//! Subcommand implementations.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use log::info;
use ringmap_core::{FeatureCollection, FeatureStore, StyleSpec};
use ringmap_render::{HeadlessSurface, RenderSurface, StyleConfigurator, SurfaceHandle};
use ringmap_sync::{FeatureCache, PersistentCache, RocksCache, SyncController, SyncError};
use tokio::task::JoinHandle;

use crate::config::ViewerConfig;
use crate::error::CliError;

/// How long `run` waits for the surface and the first push.
const SYNC_TIMEOUT: Duration = Duration::from_secs(10);

/// Summary of a headless session.
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub layers: Vec<String>,
    pub features: usize,
    pub rings: Vec<i64>,
    /// `(layer, features drawn)` for overlay layers, bottom to top.
    pub drawn: Vec<(String, usize)>,
}

/// Read a GeoJSON file and store it as the cached collection.
pub async fn import(config: &ViewerConfig, file: &Path) -> Result<FeatureCollection, CliError> {
    let text = tokio::fs::read_to_string(file)
        .await
        .map_err(|source| CliError::Input {
            path: file.to_path_buf(),
            source,
        })?;
    let collection = FeatureCollection::from_json(&text).map_err(|source| CliError::GeoJson {
        path: file.to_path_buf(),
        source,
    })?;

    let cache = FeatureCache::new(RocksCache::open(config.cache_config())?);
    cache.store(&collection).await?;
    info!(
        "Imported {} features from {} into {}",
        collection.len(),
        file.display(),
        config.cache_dir.display()
    );
    Ok(collection)
}

/// Boot a headless surface, run setup and wait until the store's collection
/// is on the surface.
pub async fn run(config: &ViewerConfig, zoom: f64) -> Result<RunReport, CliError> {
    let surface_config = config.surface_config()?;
    let cache = FeatureCache::new(RocksCache::open(config.cache_config())?);

    let store = Arc::new(FeatureStore::<SurfaceHandle>::new());
    let controller = Arc::new(SyncController::new(
        Arc::clone(&store),
        cache,
        StyleConfigurator::rings()?,
    ));
    let surface = HeadlessSurface::initialize(surface_config)?;
    let tasks = controller.start(surface.clone());

    tasks
        .setup
        .await
        .map_err(|e| CliError::Task(e.to_string()))??;
    let mut sync = tasks.sync;
    wait_synced(&controller, &mut sync, SYNC_TIMEOUT).await?;

    let source = controller.configurator().source_id();
    let data = surface
        .source_data(source)
        .unwrap_or_else(|| Arc::new(FeatureCollection::empty()));
    let rendered = surface.render(zoom)?;
    let drawn = controller
        .configurator()
        .style()
        .layer_ids()
        .into_iter()
        .filter(|id| surface.has_layer(id))
        .map(|id| {
            let count = rendered.iter().filter(|r| r.layer == id).count();
            (id.to_string(), count)
        })
        .collect();

    Ok(RunReport {
        layers: surface.layer_ids(),
        features: data.len(),
        rings: data.rings(),
        drawn,
    })
}

/// Wait for the store's collection to reach the surface, failing early if
/// the sync task ends first.
async fn wait_synced<C: PersistentCache + 'static>(
    controller: &SyncController<C>,
    sync: &mut JoinHandle<Result<(), SyncError>>,
    timeout: Duration,
) -> Result<(), CliError> {
    tokio::select! {
        synced = tokio::time::timeout(timeout, controller.synced()) => {
            synced.map_err(|_| CliError::Timeout("the feature source to sync"))
        }
        ended = &mut *sync => match ended.map_err(|e| CliError::Task(e.to_string()))? {
            Ok(()) => Err(CliError::Task("sync loop exited before the source synced".into())),
            Err(e) => Err(e.into()),
        },
    }
}

pub fn style() -> Result<String, CliError> {
    Ok(StyleSpec::rings()?.to_json_pretty()?)
}
