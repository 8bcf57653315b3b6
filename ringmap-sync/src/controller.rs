//! Keeps the surface's named source in step with the feature store.
//!
//! ```text
//!  surface.ready() ──► apply style ──► register map ──► hydrate from cache
//!                                            │                 │
//!                                            ▼                 ▼
//!                       ┌──────────── FeatureStore (map, feature_collection)
//!                       │ changed()
//!                       ▼
//!             map registered && ready && source exists?
//!                       │ yes
//!                       ▼
//!             surface.set_source_data(latest collection)
//! ```
//!
//! The sync loop only ever reads the latest snapshot, so writes that land
//! between two wake-ups are collapsed into one push of the newest value.

use std::sync::Arc;

use log::{debug, error, info};
use ringmap_core::{FeatureCollection, FeatureStore, StoreError, StoreSubscription};
use ringmap_render::{StyleConfigurator, SurfaceError, SurfaceHandle};
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::storage::{FeatureCache, PersistentCache};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    #[error("Map surface is unavailable: {0}")]
    Initialization(SurfaceError),
    #[error(transparent)]
    Surface(#[from] SurfaceError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Handles to the two tasks spawned by [`SyncController::start`].
pub struct SyncTasks {
    /// Ready → style → register → hydrate. Finishes once.
    pub setup: JoinHandle<Result<(), SyncError>>,
    /// Runs until the store is dropped, or a push fails.
    pub sync: JoinHandle<Result<(), SyncError>>,
}

pub struct SyncController<C> {
    store: Arc<FeatureStore<SurfaceHandle>>,
    cache: FeatureCache<C>,
    configurator: StyleConfigurator,
    pushed: watch::Sender<Option<Arc<FeatureCollection>>>,
}

impl<C: PersistentCache + 'static> SyncController<C> {
    pub fn new(
        store: Arc<FeatureStore<SurfaceHandle>>,
        cache: FeatureCache<C>,
        configurator: StyleConfigurator,
    ) -> Self {
        let (pushed, _) = watch::channel(None);
        Self {
            store,
            cache,
            configurator,
            pushed,
        }
    }

    pub fn store(&self) -> &Arc<FeatureStore<SurfaceHandle>> {
        &self.store
    }

    pub fn cache(&self) -> &FeatureCache<C> {
        &self.cache
    }

    pub fn configurator(&self) -> &StyleConfigurator {
        &self.configurator
    }

    /// Subscribe to the store, then spawn setup and sync on the current
    /// runtime. Must be called once per surface.
    pub fn start(self: &Arc<Self>, surface: SurfaceHandle) -> SyncTasks {
        let subscription = self.store.subscribe();

        let sync = tokio::spawn(Arc::clone(self).run_sync(subscription));
        let controller = Arc::clone(self);
        let setup = tokio::spawn(async move {
            let result = controller.on_ready(surface).await;
            if let Err(e) = &result {
                error!("Overlay setup failed: {e}");
            }
            result
        });

        SyncTasks { setup, sync }
    }

    /// Wait for the ready signal, then apply the style, register the
    /// surface and hydrate the store from the cache, in that order.
    ///
    /// Cache failures leave the store untouched. Everything else is
    /// returned to the caller.
    pub async fn on_ready(&self, surface: SurfaceHandle) -> Result<(), SyncError> {
        surface.ready().await.map_err(SyncError::Initialization)?;
        info!("Surface {} ready, configuring overlay", surface.id());

        self.configurator.apply(surface.as_ref())?;
        self.store.register_map(surface)?;

        if let Some(collection) = self.cache.load().await {
            info!("Hydrating store with {} cached features", collection.len());
            self.store.set_feature_collection(collection);
        }
        Ok(())
    }

    /// Push the latest collection on every store change. The first
    /// evaluation runs immediately.
    pub async fn run_sync(
        self: Arc<Self>,
        mut subscription: StoreSubscription<SurfaceHandle>,
    ) -> Result<(), SyncError> {
        loop {
            let (map, collection) = subscription.snapshot();
            if let Some(surface) = map {
                self.push(&surface, collection)?;
            }
            if subscription.changed().await.is_none() {
                debug!("Feature store dropped, sync loop exiting");
                return Ok(());
            }
        }
    }

    /// Replace the named source's data if the surface can take it.
    /// Returns whether a push happened.
    pub fn push(
        &self,
        surface: &SurfaceHandle,
        collection: Arc<FeatureCollection>,
    ) -> Result<bool, SurfaceError> {
        let source = self.configurator.source_id();
        if !surface.is_ready() || !surface.has_source(source) {
            debug!("Surface {} cannot take data yet, deferring", surface.id());
            return Ok(false);
        }

        surface.set_source_data(source, Arc::clone(&collection))?;
        debug!(
            "Pushed {} features into source {source} on surface {}",
            collection.len(),
            surface.id()
        );
        self.pushed.send_replace(Some(collection));
        Ok(true)
    }

    /// The collection most recently pushed to the surface.
    pub fn last_pushed(&self) -> Option<Arc<FeatureCollection>> {
        self.pushed.borrow().clone()
    }

    /// Resolve once the store's current collection is the one on the
    /// surface. Never resolves if the surface never becomes ready.
    pub async fn synced(&self) {
        let mut pushed = self.pushed.subscribe();
        loop {
            let current = self.store.feature_collection();
            let done = pushed
                .borrow_and_update()
                .as_ref()
                .is_some_and(|p| Arc::ptr_eq(p, &current));
            if done || pushed.changed().await.is_err() {
                return;
            }
        }
    }
}
