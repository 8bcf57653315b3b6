//! RocksDB-backed persistent cache.
//!
//! Column families:
//! - `entries`: cached values (LZ4 compressed, keyed by UTF-8 key)
//! - `metadata`: per-entry metadata (bincode: sizes, last write time)
//!
//! Values and their metadata are written in one atomic batch, and writes
//! are fsynced by default so the last stored collection survives a crash
//! or restart.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use log::debug;
use rocksdb::{
    BlockBasedOptions, Cache, ColumnFamily, ColumnFamilyDescriptor, DBCompressionType,
    DBWithThreadMode, IteratorMode, Options, SingleThreaded, WriteBatch, WriteOptions,
};
use serde::{Deserialize, Serialize};

use super::{CacheError, PersistentCache};

/// Column family names.
const CF_ENTRIES: &str = "entries";
const CF_METADATA: &str = "metadata";

/// All column family names for initialization.
const COLUMN_FAMILIES: &[&str] = &[CF_ENTRIES, CF_METADATA];

/// Cache configuration.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Database directory path
    pub path: PathBuf,
    /// Block cache size in bytes (default: 32MB)
    pub block_cache_size: usize,
    /// Bloom filter bits per key (default: 10)
    pub bloom_filter_bits: i32,
    /// Fsync on every write (default: true)
    pub sync_writes: bool,
    /// Max open files for RocksDB (default: 64)
    pub max_open_files: i32,
    /// Write buffer size per column family (default: 8MB)
    pub write_buffer_size: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("ringmap_data"),
            block_cache_size: 32 * 1024 * 1024, // 32MB
            bloom_filter_bits: 10,
            sync_writes: true,
            max_open_files: 64,
            write_buffer_size: 8 * 1024 * 1024, // 8MB
        }
    }
}

impl CacheConfig {
    /// Create config for testing (small caches, no fsync).
    pub fn for_testing(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            block_cache_size: 1024 * 1024, // 1MB
            bloom_filter_bits: 10,
            sync_writes: false,
            max_open_files: 16,
            write_buffer_size: 1024 * 1024, // 1MB
        }
    }

    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }
}

/// Metadata stored alongside each entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryMetadata {
    pub key: String,
    /// Uncompressed value size in bytes
    pub size: u64,
    /// Compressed value size in bytes
    pub compressed_size: u64,
    /// Last write timestamp (seconds since epoch)
    pub updated_at: u64,
}

impl EntryMetadata {
    fn encode(&self) -> Result<Vec<u8>, CacheError> {
        bincode::serde::encode_to_vec(self, bincode::config::standard())
            .map_err(|e| CacheError::Serialization(e.to_string()))
    }

    fn decode(bytes: &[u8]) -> Result<Self, CacheError> {
        let (meta, _) = bincode::serde::decode_from_slice(bytes, bincode::config::standard())
            .map_err(|e| CacheError::Deserialization(e.to_string()))?;
        Ok(meta)
    }
}

/// RocksDB-backed key-value cache.
///
/// Cloning is cheap and shares the open database. The inherent methods
/// block; the [`PersistentCache`] methods run them on the blocking pool.
#[derive(Clone)]
pub struct RocksCache {
    /// RocksDB instance (single-threaded mode, one cache per process)
    db: Arc<DBWithThreadMode<SingleThreaded>>,
    config: Arc<CacheConfig>,
}

impl RocksCache {
    /// Open the cache at the configured path, creating it if missing.
    pub fn open(config: CacheConfig) -> Result<Self, CacheError> {
        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);
        db_opts.set_max_open_files(config.max_open_files);
        db_opts.set_keep_log_file_num(2);

        let cf_descriptors: Vec<ColumnFamilyDescriptor> = COLUMN_FAMILIES
            .iter()
            .map(|name| ColumnFamilyDescriptor::new(*name, Self::cf_options(name, &config)))
            .collect();

        let db = DBWithThreadMode::<SingleThreaded>::open_cf_descriptors(
            &db_opts,
            &config.path,
            cf_descriptors,
        )?;
        debug!("Opened cache at {}", config.path.display());

        Ok(Self {
            db: Arc::new(db),
            config: Arc::new(config),
        })
    }

    /// Build column-family-specific options.
    fn cf_options(name: &str, config: &CacheConfig) -> Options {
        let mut opts = Options::default();

        let mut block_opts = BlockBasedOptions::default();
        let cache = Cache::new_lru_cache(config.block_cache_size);
        block_opts.set_block_cache(&cache);
        block_opts.set_bloom_filter(config.bloom_filter_bits as f64, false);
        opts.set_block_based_table_factory(&block_opts);
        opts.set_write_buffer_size(config.write_buffer_size);

        match name {
            // Values are LZ4 compressed before they reach RocksDB
            CF_ENTRIES => opts.set_compression_type(DBCompressionType::None),
            CF_METADATA => {
                opts.set_compression_type(DBCompressionType::Lz4);
                opts.optimize_for_point_lookup(config.block_cache_size as u64);
            }
            _ => {}
        }

        opts
    }

    /// Store `value` under `key`, replacing any previous value.
    pub fn put(&self, key: &str, value: &[u8]) -> Result<EntryMetadata, CacheError> {
        let cf_entries = self.cf(CF_ENTRIES)?;
        let cf_meta = self.cf(CF_METADATA)?;

        let compressed = lz4_flex::compress_prepend_size(value);
        let meta = EntryMetadata {
            key: key.to_string(),
            size: value.len() as u64,
            compressed_size: compressed.len() as u64,
            updated_at: SystemTime::now()
                .duration_since(SystemTime::UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs(),
        };

        // Atomic batch write: value + metadata
        let mut batch = WriteBatch::default();
        batch.put_cf(cf_entries, key.as_bytes(), &compressed);
        batch.put_cf(cf_meta, key.as_bytes(), meta.encode()?);

        let mut write_opts = WriteOptions::default();
        write_opts.set_sync(self.config.sync_writes);
        self.db.write_opt(batch, &write_opts)?;

        debug!(
            "Cached {key}: {} bytes ({} compressed)",
            meta.size, meta.compressed_size
        );
        Ok(meta)
    }

    /// Load the value under `key`, if any.
    pub fn fetch(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let cf = self.cf(CF_ENTRIES)?;
        match self.db.get_cf(cf, key.as_bytes())? {
            Some(compressed) => lz4_flex::decompress_size_prepended(&compressed)
                .map(Some)
                .map_err(|e| CacheError::Compression(e.to_string())),
            None => Ok(None),
        }
    }

    pub fn metadata(&self, key: &str) -> Result<Option<EntryMetadata>, CacheError> {
        let cf = self.cf(CF_METADATA)?;
        self.db
            .get_cf(cf, key.as_bytes())?
            .map(|bytes| EntryMetadata::decode(&bytes))
            .transpose()
    }

    pub fn contains(&self, key: &str) -> Result<bool, CacheError> {
        let cf = self.cf(CF_ENTRIES)?;
        Ok(self.db.get_cf(cf, key.as_bytes())?.is_some())
    }

    /// Delete an entry and its metadata.
    pub fn remove(&self, key: &str) -> Result<(), CacheError> {
        let mut batch = WriteBatch::default();
        batch.delete_cf(self.cf(CF_ENTRIES)?, key.as_bytes());
        batch.delete_cf(self.cf(CF_METADATA)?, key.as_bytes());

        let mut write_opts = WriteOptions::default();
        write_opts.set_sync(self.config.sync_writes);
        self.db.write_opt(batch, &write_opts)?;
        Ok(())
    }

    /// All keys, in byte order.
    pub fn keys(&self) -> Result<Vec<String>, CacheError> {
        let cf = self.cf(CF_ENTRIES)?;
        self.db
            .iterator_cf(cf, IteratorMode::Start)
            .map(|item| {
                let (key, _) = item?;
                String::from_utf8(key.into_vec())
                    .map_err(|e| CacheError::Deserialization(e.to_string()))
            })
            .collect()
    }

    /// Force-flush memtables to disk.
    pub fn flush(&self) -> Result<(), CacheError> {
        for name in COLUMN_FAMILIES {
            self.db.flush_cf(self.cf(name)?)?;
        }
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.config.path
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily, CacheError> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| CacheError::Database(format!("Column family '{name}' not found")))
    }
}

impl RocksCache {
    /// Run `op` against this cache on Tokio's blocking pool.
    async fn run_blocking<T, F>(&self, op: F) -> Result<T, CacheError>
    where
        T: Send + 'static,
        F: FnOnce(&RocksCache) -> Result<T, CacheError> + Send + 'static,
    {
        let cache = self.clone();
        tokio::task::spawn_blocking(move || op(&cache))
            .await
            .map_err(|e| CacheError::Unavailable(format!("cache task failed: {e}")))?
    }
}

impl PersistentCache for RocksCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let key = key.to_string();
        self.run_blocking(move |cache| cache.fetch(&key)).await
    }

    async fn set(&self, key: &str, value: &[u8]) -> Result<(), CacheError> {
        let key = key.to_string();
        let value = value.to_vec();
        self.run_blocking(move |cache| cache.put(&key, &value).map(|_| ()))
            .await
    }
}
