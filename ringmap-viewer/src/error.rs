//! CLI errors and exit handling.

use std::path::PathBuf;
use std::process;

use ringmap_core::{GeoJsonError, StyleError};
use ringmap_render::SurfaceError;
use ringmap_sync::{CacheError, SyncError};
use thiserror::Error;

use crate::config::ConfigError;

#[derive(Error, Debug)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("Failed to read {}: {source}", path.display())]
    Input {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("{} is not a GeoJSON feature collection: {source}", path.display())]
    GeoJson { path: PathBuf, source: GeoJsonError },
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),
    #[error("Style error: {0}")]
    Style(#[from] StyleError),
    #[error("Surface error: {0}")]
    Surface(#[from] SurfaceError),
    #[error("Sync error: {0}")]
    Sync(#[from] SyncError),
    #[error("Background task failed: {0}")]
    Task(String),
    #[error("Timed out waiting for {0}")]
    Timeout(&'static str),
}

impl CliError {
    /// Exit the process with an appropriate error message and code.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {self}");

        match self {
            CliError::Config(ConfigError::MissingAccessToken)
            | CliError::Sync(SyncError::Initialization(_)) => {
                eprintln!();
                eprintln!("The map surface needs a public access token (pk.<payload>.<signature>).");
            }
            CliError::Cache(CacheError::Database(_)) => {
                eprintln!();
                eprintln!("Is another viewer holding the cache directory open?");
            }
            _ => {}
        }

        process::exit(1)
    }
}
