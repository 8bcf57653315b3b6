//! Typed access to the cached feature collection.
//!
//! Reads never fail: a missing, unreadable or undecodable entry is logged
//! and reported as absent, so a bad cache can only cost the hydration step.

use log::{debug, info, warn};
use ringmap_core::FeatureCollection;

use super::{CacheError, PersistentCache, FEATURE_COLLECTION_KEY};

pub struct FeatureCache<C> {
    cache: C,
    key: String,
}

impl<C: PersistentCache> FeatureCache<C> {
    pub fn new(cache: C) -> Self {
        Self::with_key(cache, FEATURE_COLLECTION_KEY)
    }

    pub fn with_key(cache: C, key: impl Into<String>) -> Self {
        Self {
            cache,
            key: key.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn inner(&self) -> &C {
        &self.cache
    }

    /// Last stored collection, if one can be read.
    pub async fn load(&self) -> Option<FeatureCollection> {
        let bytes = match self.cache.get(&self.key).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                debug!("No cached value under {}", self.key);
                return None;
            }
            Err(e) => {
                warn!("Cache read for {} failed: {e}", self.key);
                return None;
            }
        };

        let collection = match FeatureCollection::from_slice(&bytes) {
            Ok(collection) => collection,
            Err(e) => {
                warn!("Cached value under {} is not a feature collection: {e}", self.key);
                return None;
            }
        };

        let unringed = collection.unringed();
        if unringed > 0 {
            warn!(
                "{unringed} of {} cached features have no integer kring",
                collection.len()
            );
        }
        info!(
            "Loaded {} cached features (rings {:?})",
            collection.len(),
            collection.rings()
        );
        Some(collection)
    }

    /// Replace the stored collection.
    pub async fn store(&self, collection: &FeatureCollection) -> Result<(), CacheError> {
        let bytes = collection
            .to_vec()
            .map_err(|e| CacheError::Serialization(e.to_string()))?;
        self.cache.set(&self.key, &bytes).await?;
        info!("Stored {} features under {}", collection.len(), self.key);
        Ok(())
    }
}
