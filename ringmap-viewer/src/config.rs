//! Viewer configuration: access token and cache location.

use std::path::PathBuf;

use ringmap_render::{validate_access_token, SurfaceConfig, SurfaceError};
use ringmap_sync::CacheConfig;
use thiserror::Error;

/// Environment variables checked for the access token, in order.
pub const TOKEN_ENV_VARS: &[&str] = &["RINGMAP_ACCESS_TOKEN", "MAPBOX_TOKEN"];

pub const DEFAULT_CACHE_DIR: &str = "ringmap_data";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("No access token: pass --access-token or set {}", TOKEN_ENV_VARS.join(" or "))]
    MissingAccessToken,
    #[error("Access token is malformed: {0}")]
    InvalidAccessToken(SurfaceError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ViewerConfig {
    pub access_token: Option<String>,
    pub cache_dir: PathBuf,
}

impl ViewerConfig {
    /// Resolve from command-line values, falling back to the process
    /// environment for the token.
    pub fn resolve(access_token: Option<String>, cache_dir: PathBuf) -> Self {
        Self::resolve_with(access_token, cache_dir, |name| std::env::var(name).ok())
    }

    pub fn resolve_with(
        access_token: Option<String>,
        cache_dir: PathBuf,
        env: impl Fn(&str) -> Option<String>,
    ) -> Self {
        let access_token = access_token
            .or_else(|| TOKEN_ENV_VARS.iter().find_map(|name| env(name)))
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());
        Self {
            access_token,
            cache_dir,
        }
    }

    /// Map options for the surface. Fails if no usable token was found.
    pub fn surface_config(&self) -> Result<SurfaceConfig, ConfigError> {
        let token = self
            .access_token
            .as_deref()
            .ok_or(ConfigError::MissingAccessToken)?;
        validate_access_token(token).map_err(ConfigError::InvalidAccessToken)?;
        Ok(SurfaceConfig::with_access_token(token))
    }

    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig::with_path(&self.cache_dir)
    }
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            access_token: None,
            cache_dir: PathBuf::from(DEFAULT_CACHE_DIR),
        }
    }
}
