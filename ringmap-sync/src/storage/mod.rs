//! Persistent storage for the feature overlay.
//!
//! ```text
//! ┌──────────────┐  JSON text  ┌──────────────────┐
//! │ FeatureCache │ ──────────► │ PersistentCache  │
//! │ (typed)      │ ◄────────── │ (bytes by key)   │
//! └──────────────┘             └────────┬─────────┘
//!                                       │
//!                         ┌─────────────┴─────────────┐
//!                         ▼                           ▼
//!                  ┌─────────────┐             ┌─────────────┐
//!                  │ RocksCache  │             │ MemoryCache │
//!                  │ (on disk)   │             │ (tests)     │
//!                  └─────────────┘             └─────────────┘
//! ```
//!
//! Only one key is used by the overlay: [`FEATURE_COLLECTION_KEY`].

use std::future::Future;

use thiserror::Error;

pub mod features;
pub mod memory;
pub mod rocks;

pub use features::FeatureCache;
pub use memory::MemoryCache;
pub use rocks::{CacheConfig, EntryMetadata, RocksCache};

/// Key the feature collection is stored under.
pub const FEATURE_COLLECTION_KEY: &str = "featureCollection";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    #[error("Database error: {0}")]
    Database(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("Deserialization error: {0}")]
    Deserialization(String),
    #[error("Compression error: {0}")]
    Compression(String),
    #[error("Cache unavailable: {0}")]
    Unavailable(String),
}

impl From<rocksdb::Error> for CacheError {
    fn from(e: rocksdb::Error) -> Self {
        CacheError::Database(e.to_string())
    }
}

/// Asynchronous key-value store for opaque bytes.
///
/// Reads of a key that was never written resolve to `Ok(None)`.
pub trait PersistentCache: Send + Sync {
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<Vec<u8>>, CacheError>> + Send;

    fn set(&self, key: &str, value: &[u8]) -> impl Future<Output = Result<(), CacheError>> + Send;
}
