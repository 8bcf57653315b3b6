//! # ringmap-sync: Cache hydration and source synchronization
//!
//! Wires the three long-lived pieces of the overlay together:
//!
//! ```text
//! ┌───────────────┐  load once   ┌────────────────┐
//! │ FeatureCache  │ ───────────► │ FeatureStore   │ ◄── external writers
//! │ (RocksDB)     │              │ (watch fields) │
//! └───────────────┘              └───────┬────────┘
//!                                        │ subscribe
//!                                        ▼
//!                                ┌────────────────┐  set_source_data
//!                                │ SyncController │ ─────────────────► RenderSurface
//!                                └────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`storage`]: `PersistentCache` trait, RocksDB and in-memory caches,
//!   typed `FeatureCache`
//! - [`controller`]: ready/style/register/hydrate sequence and the sync loop

pub mod controller;
pub mod storage;

pub use controller::{SyncController, SyncError, SyncTasks};
pub use storage::{
    CacheConfig, CacheError, EntryMetadata, FeatureCache, MemoryCache, PersistentCache, RocksCache,
    FEATURE_COLLECTION_KEY,
};
