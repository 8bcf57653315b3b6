//! In-process cache, used by tests and when no cache directory is usable.

use std::sync::{Mutex, PoisonError};

use rustc_hash::FxHashMap;

use super::{CacheError, PersistentCache};

#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<FxHashMap<String, Vec<u8>>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cache pre-populated with one entry.
    pub fn with_entry(key: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        let cache = Self::new();
        cache.insert(key, value);
        cache
    }

    pub fn insert(&self, key: impl Into<String>, value: impl Into<Vec<u8>>) {
        self.lock().insert(key.into(), value.into());
    }

    pub fn entry(&self, key: &str) -> Option<Vec<u8>> {
        self.lock().get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FxHashMap<String, Vec<u8>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl PersistentCache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        Ok(self.entry(key))
    }

    async fn set(&self, key: &str, value: &[u8]) -> Result<(), CacheError> {
        self.insert(key, value);
        Ok(())
    }
}
