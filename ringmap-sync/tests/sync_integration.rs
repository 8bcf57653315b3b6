//! Synchronization protocol integration tests.
//!
//! Every test runs on a current-thread runtime, so tasks interleave only at
//! await points, the same way they would on a UI event loop.

use std::sync::Arc;
use std::time::Duration;

use ringmap_core::{Feature, FeatureCollection, FeatureStore, KRING_PROPERTY};
use ringmap_render::{
    HeadlessSurface, RenderSurface, StyleConfigurator, SurfaceConfig, SurfaceError, SurfaceHandle,
    SurfaceState,
};
use ringmap_sync::{
    CacheError, FeatureCache, MemoryCache, PersistentCache, SyncController, SyncError,
    FEATURE_COLLECTION_KEY,
};

// ─── Helpers ─────────────────────────────────────────────────────────────────

struct FailingCache;

impl PersistentCache for FailingCache {
    async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        Err(CacheError::Unavailable("storage disabled".into()))
    }

    async fn set(&self, _key: &str, _value: &[u8]) -> Result<(), CacheError> {
        Err(CacheError::Unavailable("storage disabled".into()))
    }
}

fn rings(values: &[i64]) -> FeatureCollection {
    values
        .iter()
        .map(|k| {
            Feature::polygon(vec![vec![2.0, 48.0], vec![3.0, 48.0], vec![2.0, 49.0], vec![2.0, 48.0]])
                .with_property(KRING_PROPERTY, *k)
        })
        .collect()
}

fn controller<C: PersistentCache + 'static>(
    store: &Arc<FeatureStore<SurfaceHandle>>,
    cache: C,
) -> Arc<SyncController<C>> {
    Arc::new(SyncController::new(
        Arc::clone(store),
        FeatureCache::new(cache),
        StyleConfigurator::rings().unwrap(),
    ))
}

/// Poll `condition` between scheduler turns until it holds.
async fn wait_until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .expect("condition not reached within 5s");
}

/// Let every runnable task make progress.
async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}

// ─── Scenarios ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_empty_cache_leaves_empty_source() {
    let store = Arc::new(FeatureStore::new());
    let controller = controller(&store, MemoryCache::new());
    let surface = HeadlessSurface::initialize(SurfaceConfig::for_testing()).unwrap();

    let tasks = controller.start(surface.clone());
    tasks.setup.await.unwrap().unwrap();
    controller.synced().await;

    let data = surface.source_data("features").unwrap();
    assert_eq!(*data, FeatureCollection::empty());
    assert_eq!(
        serde_json::to_value(&*data).unwrap(),
        serde_json::json!({"type": "FeatureCollection", "features": []})
    );
}

#[tokio::test]
async fn test_cached_rings_hydrate_source() {
    let cached = rings(&[0, 1, 2]);
    let cache = MemoryCache::with_entry(FEATURE_COLLECTION_KEY, cached.to_vec().unwrap());
    let store = Arc::new(FeatureStore::new());
    let controller = controller(&store, cache);
    let surface = HeadlessSurface::initialize(SurfaceConfig::for_testing()).unwrap();

    let tasks = controller.start(surface.clone());
    tasks.setup.await.unwrap().unwrap();
    controller.synced().await;

    let data = surface.source_data("features").unwrap();
    assert_eq!(data.len(), 3);
    assert_eq!(*data, cached);
    assert_eq!(data.rings(), vec![0, 1, 2]);

    // Empty source first, then the hydrated value
    let history = surface.data_history("features");
    assert_eq!(history.last().map(|c| c.len()), Some(3));
    assert!(history.iter().all(|c| c.is_empty() || **c == cached));
}

#[tokio::test]
async fn test_rapid_writes_push_only_last() {
    let store = Arc::new(FeatureStore::new());
    let controller = controller(&store, MemoryCache::new());
    let surface = HeadlessSurface::initialize(SurfaceConfig::for_testing()).unwrap();

    let tasks = controller.start(surface.clone());
    tasks.setup.await.unwrap().unwrap();
    controller.synced().await;
    let pushes_before = surface.stats().data_updates;

    // No await between the two writes
    store.set_feature_collection(rings(&[0]));
    store.set_feature_collection(rings(&[1, 2]));
    controller.synced().await;
    settle().await;

    let history = surface.data_history("features");
    let after: Vec<_> = history[pushes_before..].to_vec();
    assert_eq!(after.len(), 1);
    assert_eq!(after[0].rings(), vec![1, 2]);
    assert!(history.iter().all(|c| c.rings() != vec![0]));
}

#[tokio::test]
async fn test_failing_cache_keeps_default_collection() {
    let store = Arc::new(FeatureStore::new());
    let controller = controller(&store, FailingCache);
    let surface = HeadlessSurface::initialize(SurfaceConfig::for_testing()).unwrap();

    let tasks = controller.start(surface.clone());
    assert_eq!(tasks.setup.await.unwrap(), Ok(()));
    controller.synced().await;

    assert!(store.feature_collection().is_empty());
    assert_eq!(*surface.source_data("features").unwrap(), FeatureCollection::empty());
    assert!(!tasks.sync.is_finished());
}

// ─── Properties ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_write_before_ready_is_applied_after_ready() {
    let store = Arc::new(FeatureStore::new());
    let controller = controller(&store, MemoryCache::new());
    let surface = Arc::new(HeadlessSurface::new(SurfaceConfig::for_testing()).unwrap());

    let tasks = controller.start(surface.clone());
    settle().await;

    // Surface still initializing: nothing touched, nothing lost
    store.set_feature_collection(rings(&[2, 1]));
    settle().await;
    assert_eq!(surface.state(), SurfaceState::Initializing);
    assert!(!store.has_map());
    assert_eq!(surface.stats().data_updates, 0);

    surface.fire_load().unwrap();
    tasks.setup.await.unwrap().unwrap();
    wait_until(|| surface.source_data("features").is_some_and(|d| d.len() == 2)).await;

    assert_eq!(surface.source_data("features").unwrap().rings(), vec![1, 2]);
}

#[tokio::test]
async fn test_every_later_write_reaches_source() {
    let store = Arc::new(FeatureStore::new());
    let controller = controller(&store, MemoryCache::new());
    let surface = HeadlessSurface::initialize(SurfaceConfig::for_testing()).unwrap();

    let tasks = controller.start(surface.clone());
    tasks.setup.await.unwrap().unwrap();

    for n in 1..=5 {
        let collection = rings(&vec![0; n]);
        store.set_feature_collection(collection.clone());
        controller.synced().await;
        assert_eq!(*surface.source_data("features").unwrap(), collection);
    }

    store.update_feature_collection(|current| {
        current.features.iter().cloned().take(2).collect()
    });
    controller.synced().await;
    assert_eq!(surface.source_data("features").unwrap().len(), 2);
}

#[tokio::test]
async fn test_style_applied_exactly_once() {
    let store = Arc::new(FeatureStore::new());
    let controller = controller(&store, MemoryCache::new());
    let surface = HeadlessSurface::initialize(SurfaceConfig::for_testing()).unwrap();

    let tasks = controller.start(surface.clone());
    tasks.setup.await.unwrap().unwrap();
    for k in 0..3 {
        store.set_feature_collection(rings(&[k]));
        controller.synced().await;
    }

    assert_eq!(controller.configurator().applications(), 1);
    assert_eq!(surface.stats().sources_added, 1);
    assert_eq!(surface.stats().layers_added, 5);
    assert!(surface.has_layer("over-labels"));
}

#[tokio::test]
async fn test_invalid_token_reports_initialization_failure() {
    let store = Arc::new(FeatureStore::new());
    let controller = controller(&store, MemoryCache::new());
    let surface =
        HeadlessSurface::initialize(SurfaceConfig::with_access_token("not-a-token")).unwrap();

    let tasks = controller.start(surface.clone());
    let result = tasks.setup.await.unwrap();

    assert!(matches!(
        result,
        Err(SyncError::Initialization(SurfaceError::InitializationFailed(_)))
    ));
    assert_eq!(surface.state(), SurfaceState::Failed);
    assert!(!store.has_map());
    assert_eq!(controller.configurator().applications(), 0);

    // Writes after a failed start are still accepted by the store
    store.set_feature_collection(rings(&[0]));
    settle().await;
    assert_eq!(store.feature_collection().len(), 1);
    assert!(surface.source_data("features").is_none());
}
