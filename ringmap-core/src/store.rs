//! Application state container for the overlay.
//!
//! `FeatureStore` holds exactly two fields: the render surface handle (`map`)
//! and the current feature collection. Both live in `tokio::sync::watch`
//! cells, so observers always see the latest value and never a replay of
//! intermediate ones:
//!
//! ```text
//!  writer ──set_feature_collection──► watch<Arc<FeatureCollection>> ──┐
//!                                                                      ├─► StoreSubscription
//!  SyncController ──register_map────► watch<Option<M>> ────────────────┘
//! ```
//!
//! The store is generic over the handle type so this crate does not depend
//! on any rendering backend.

use std::sync::Arc;

use log::debug;
use thiserror::Error;
use tokio::sync::watch;

use crate::geojson::FeatureCollection;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("A map surface is already registered in the store")]
    MapAlreadyRegistered,
}

/// Shared state: surface handle plus current feature collection.
pub struct FeatureStore<M> {
    map: watch::Sender<Option<M>>,
    feature_collection: watch::Sender<Arc<FeatureCollection>>,
}

impl<M: Clone> FeatureStore<M> {
    /// No map, empty collection.
    pub fn new() -> Self {
        Self::with_feature_collection(FeatureCollection::empty())
    }

    pub fn with_feature_collection(initial: FeatureCollection) -> Self {
        let (map, _) = watch::channel(None);
        let (feature_collection, _) = watch::channel(Arc::new(initial));
        Self {
            map,
            feature_collection,
        }
    }

    /// The registered surface handle, `None` until the surface is ready.
    pub fn map(&self) -> Option<M> {
        self.map.borrow().clone()
    }

    pub fn has_map(&self) -> bool {
        self.map.borrow().is_some()
    }

    /// Register the surface handle. Succeeds once per store.
    pub fn register_map(&self, map: M) -> Result<(), StoreError> {
        let mut slot = Some(map);
        let registered = self.map.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            *current = slot.take();
            true
        });
        if registered {
            debug!("Map surface registered in feature store");
            Ok(())
        } else {
            Err(StoreError::MapAlreadyRegistered)
        }
    }

    /// Current collection. Cheap: clones the `Arc`, not the features.
    pub fn feature_collection(&self) -> Arc<FeatureCollection> {
        self.feature_collection.borrow().clone()
    }

    /// Replace the collection wholesale.
    pub fn set_feature_collection(&self, collection: impl Into<Arc<FeatureCollection>>) {
        let collection = collection.into();
        debug!(
            "Feature collection replaced ({} features)",
            collection.len()
        );
        self.feature_collection.send_replace(collection);
    }

    /// Derive a new collection from the current one and store it.
    pub fn update_feature_collection<F>(&self, update: F)
    where
        F: FnOnce(&FeatureCollection) -> FeatureCollection,
    {
        let next = update(&self.feature_collection());
        self.set_feature_collection(next);
    }

    /// Observe both fields. The subscription starts out "seen": only writes
    /// after this call wake [`StoreSubscription::changed`].
    pub fn subscribe(&self) -> StoreSubscription<M> {
        StoreSubscription {
            map: self.map.subscribe(),
            feature_collection: self.feature_collection.subscribe(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.feature_collection.receiver_count()
    }
}

impl<M: Clone> Default for FeatureStore<M> {
    fn default() -> Self {
        Self::new()
    }
}

/// Change feed over a [`FeatureStore`].
pub struct StoreSubscription<M> {
    map: watch::Receiver<Option<M>>,
    feature_collection: watch::Receiver<Arc<FeatureCollection>>,
}

impl<M: Clone> StoreSubscription<M> {
    /// Resolves once either field has been written since the last
    /// [`snapshot`](Self::snapshot). Returns `None` once the store is gone.
    pub async fn changed(&mut self) -> Option<()> {
        tokio::select! {
            res = self.map.changed() => res.ok(),
            res = self.feature_collection.changed() => res.ok(),
        }
    }

    /// Latest values of both fields, marking them seen.
    pub fn snapshot(&mut self) -> (Option<M>, Arc<FeatureCollection>) {
        let map = self.map.borrow_and_update().clone();
        let collection = self.feature_collection.borrow_and_update().clone();
        (map, collection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geojson::{Feature, KRING_PROPERTY};

    fn ring_collection(rings: &[i64]) -> FeatureCollection {
        rings
            .iter()
            .map(|k| {
                Feature::polygon(vec![vec![0.0, 0.0], vec![1.0, 0.0], vec![0.0, 0.0]])
                    .with_property(KRING_PROPERTY, *k)
            })
            .collect()
    }

    #[test]
    fn test_defaults() {
        let store: FeatureStore<u32> = FeatureStore::new();
        assert!(store.map().is_none());
        assert!(!store.has_map());
        assert!(store.feature_collection().is_empty());
    }

    #[test]
    fn test_register_map_once() {
        let store: FeatureStore<u32> = FeatureStore::new();
        assert_eq!(store.register_map(7), Ok(()));
        assert_eq!(store.register_map(8), Err(StoreError::MapAlreadyRegistered));
        assert_eq!(store.map(), Some(7));
    }

    #[test]
    fn test_set_replaces_reference() {
        let store: FeatureStore<u32> = FeatureStore::new();
        let before = store.feature_collection();
        store.set_feature_collection(ring_collection(&[0, 1]));
        let after = store.feature_collection();
        assert!(!Arc::ptr_eq(&before, &after));
        assert!(before.is_empty());
        assert_eq!(after.len(), 2);
    }

    #[test]
    fn test_update_derives_from_current() {
        let store: FeatureStore<u32> = FeatureStore::new();
        store.set_feature_collection(ring_collection(&[0]));
        store.update_feature_collection(|fc| {
            let mut features = fc.features.clone();
            features.extend(ring_collection(&[1, 2]).features);
            FeatureCollection::new(features)
        });
        assert_eq!(store.feature_collection().rings(), vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn test_subscription_sees_only_latest() {
        let store: FeatureStore<u32> = FeatureStore::new();
        let mut sub = store.subscribe();

        store.set_feature_collection(ring_collection(&[0]));
        store.set_feature_collection(ring_collection(&[0, 1, 2]));

        assert_eq!(sub.changed().await, Some(()));
        let (map, fc) = sub.snapshot();
        assert!(map.is_none());
        assert_eq!(fc.len(), 3);
    }

    #[tokio::test]
    async fn test_subscription_wakes_on_map_registration() {
        let store: FeatureStore<u32> = FeatureStore::new();
        let mut sub = store.subscribe();
        store.register_map(1).unwrap();

        assert_eq!(sub.changed().await, Some(()));
        assert_eq!(sub.snapshot().0, Some(1));
    }

    #[tokio::test]
    async fn test_subscription_ends_with_store() {
        let store: FeatureStore<u32> = FeatureStore::new();
        let mut sub = store.subscribe();
        assert_eq!(store.subscriber_count(), 1);
        drop(store);
        assert_eq!(sub.changed().await, None);
    }
}
