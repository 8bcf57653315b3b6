//! Persistence integration tests.
//!
//! Verifies:
//! - A collection written by the import path hydrates a later session
//! - Stored values survive closing and reopening the database
//! - Corrupt or foreign values never reach the store
//! - The on-disk envelope is compressed and carries metadata

use std::sync::Arc;
use std::time::Duration;

use ringmap_core::{Feature, FeatureCollection, FeatureStore, KRING_PROPERTY, PRECISION_PROPERTY};
use ringmap_render::{HeadlessSurface, StyleConfigurator, SurfaceConfig, SurfaceHandle};
use ringmap_sync::{CacheConfig, FeatureCache, RocksCache, SyncController, FEATURE_COLLECTION_KEY};
use tempfile::tempdir;

// ─── Helpers ─────────────────────────────────────────────────────────────────

fn ring_collection(rings: &[i64]) -> FeatureCollection {
    rings
        .iter()
        .enumerate()
        .map(|(i, k)| {
            let x = i as f64;
            Feature::polygon(vec![
                vec![x, 48.0],
                vec![x + 1.0, 48.0],
                vec![x + 1.0, 49.0],
                vec![x, 48.0],
            ])
            .with_id(i as u64)
            .with_property(KRING_PROPERTY, *k)
            .with_property(PRECISION_PROPERTY, 5)
        })
        .collect()
}

fn open(path: &std::path::Path) -> RocksCache {
    RocksCache::open(CacheConfig::for_testing(path)).unwrap()
}

// ─── Save/Load Roundtrip ─────────────────────────────────────────────────────

#[tokio::test]
async fn test_collection_survives_reopen() {
    let dir = tempdir().unwrap();
    let expected = ring_collection(&[0, 1, 2]);

    {
        let cache = FeatureCache::new(open(dir.path()));
        cache.store(&expected).await.unwrap();
    }

    let cache = FeatureCache::new(open(dir.path()));
    assert_eq!(cache.load().await, Some(expected));
}

#[tokio::test]
async fn test_latest_store_wins() {
    let dir = tempdir().unwrap();
    let cache = FeatureCache::new(open(dir.path()));

    cache.store(&ring_collection(&[0])).await.unwrap();
    cache.store(&ring_collection(&[0, 1, 2, 2])).await.unwrap();

    let loaded = cache.load().await.unwrap();
    assert_eq!(loaded.len(), 4);
    assert_eq!(loaded.rings(), vec![0, 1, 2]);
}

#[tokio::test]
async fn test_fresh_database_is_absent() {
    let dir = tempdir().unwrap();
    let cache = FeatureCache::new(open(&dir.path().join("new")));
    assert_eq!(cache.load().await, None);
}

// ─── Corrupt Entries ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_foreign_value_is_absent() {
    let dir = tempdir().unwrap();
    let rocks = open(dir.path());
    rocks
        .put(FEATURE_COLLECTION_KEY, br#"{"type":"Point","coordinates":[0,0]}"#)
        .unwrap();

    let cache = FeatureCache::new(rocks);
    assert_eq!(cache.load().await, None);
}

#[tokio::test]
async fn test_binary_garbage_is_absent() {
    let dir = tempdir().unwrap();
    let rocks = open(dir.path());
    rocks.put(FEATURE_COLLECTION_KEY, &[0xff, 0x00, 0x13, 0x37]).unwrap();

    let cache = FeatureCache::new(rocks);
    assert_eq!(cache.load().await, None);
}

// ─── Envelope ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_envelope_metadata() {
    let dir = tempdir().unwrap();
    let cache = FeatureCache::new(open(dir.path()));
    let collection = ring_collection(&[0, 1, 2, 0, 1, 2, 0, 1, 2, 0, 1, 2]);
    cache.store(&collection).await.unwrap();

    let meta = cache.inner().metadata(FEATURE_COLLECTION_KEY).unwrap().unwrap();
    assert_eq!(meta.key, FEATURE_COLLECTION_KEY);
    assert_eq!(meta.size, collection.to_vec().unwrap().len() as u64);
    assert!(meta.compressed_size < meta.size);
    assert!(meta.updated_at > 0);
}

// ─── Hydration Across Sessions ───────────────────────────────────────────────

#[tokio::test]
async fn test_second_session_hydrates_from_disk() {
    let dir = tempdir().unwrap();
    let expected = ring_collection(&[0, 1, 2]);

    // Session 1: the import path writes the cache
    FeatureCache::new(open(dir.path()))
        .store(&expected)
        .await
        .unwrap();

    // Session 2: boot a surface and let the controller hydrate it
    let store = Arc::new(FeatureStore::<SurfaceHandle>::new());
    let controller = Arc::new(SyncController::new(
        Arc::clone(&store),
        FeatureCache::new(open(dir.path())),
        StyleConfigurator::rings().unwrap(),
    ));
    let surface = HeadlessSurface::initialize(SurfaceConfig::for_testing()).unwrap();
    let tasks = controller.start(surface.clone());

    tasks.setup.await.unwrap().unwrap();
    tokio::time::timeout(Duration::from_secs(5), controller.synced())
        .await
        .unwrap();

    let on_surface = surface.source_data("features").unwrap();
    assert_eq!(*on_surface, expected);
    assert_eq!(*store.feature_collection(), expected);
}
