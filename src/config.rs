use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;
use thiserror::Error;

use crate::resolver::error::ResolverError;
use crate::resolver::traits::PackageResolver;
use crate::resolvers::metadata::DEFAULT_METADATA_FILE_NAME;
use crate::resolvers::{DirectoryResolver, HttpReleaseResolver};

/// Timeout for a single release download in seconds
pub const DOWNLOAD_TIMEOUT_SECS: u64 = 300;

/// Timeout for metadata and size requests in milliseconds
pub const FETCH_TIMEOUT_MS: u64 = 30_000;

const APP_DIR_NAME: &str = "release-resolver";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config file {path:?}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Failed to create source: {0}")]
    Source(#[from] ResolverError),
}

/// Resolver configuration structure
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct ResolverConfig {
    pub metadata_file_name: String,
    pub allow_prereleases: bool,
    /// Sources in priority order; earlier sources win version ties
    pub sources: Vec<SourceConfig>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            metadata_file_name: DEFAULT_METADATA_FILE_NAME.to_string(),
            allow_prereleases: false,
            sources: Vec::new(),
        }
    }
}

/// Individual source configuration
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SourceConfig {
    Http { url: String },
    Directory { path: PathBuf },
}

impl ResolverConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let bytes = std::fs::read(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        serde_json::from_slice(&bytes).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Build one resolver per configured source, preserving order
    pub fn build_resolvers(&self) -> Result<Vec<Arc<dyn PackageResolver>>, ConfigError> {
        self.sources
            .iter()
            .map(|source| {
                let resolver: Arc<dyn PackageResolver> = match source {
                    SourceConfig::Http { url } => Arc::new(
                        HttpReleaseResolver::new(url)?
                            .with_metadata_file_name(&self.metadata_file_name)
                            .with_prereleases(self.allow_prereleases),
                    ),
                    SourceConfig::Directory { path } => Arc::new(
                        DirectoryResolver::new(path)
                            .with_metadata_file_name(&self.metadata_file_name)
                            .with_prereleases(self.allow_prereleases),
                    ),
                };
                Ok::<_, ConfigError>(resolver)
            })
            .collect()
    }
}

/// Returns the path to the default config file.
/// Uses $XDG_CONFIG_HOME/release-resolver/config.json if XDG_CONFIG_HOME is set,
/// otherwise falls back to ~/.config/release-resolver/config.json,
/// or ./release-resolver/config.json if neither is available.
pub fn config_path() -> PathBuf {
    config_dir_with_env(std::env::var("XDG_CONFIG_HOME").ok(), dirs::home_dir()).join("config.json")
}

/// Returns the path to the data directory for release-resolver.
pub fn data_dir() -> PathBuf {
    data_dir_with_env(std::env::var("XDG_DATA_HOME").ok(), dirs::home_dir())
}

/// Returns the path to the log file.
pub fn log_path() -> PathBuf {
    data_dir().join("release-resolver.log")
}

fn config_dir_with_env(xdg_config_home: Option<String>, home_dir: Option<PathBuf>) -> PathBuf {
    xdg_config_home
        .map(PathBuf::from)
        .or_else(|| home_dir.map(|home| home.join(".config")))
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR_NAME)
}

fn data_dir_with_env(xdg_data_home: Option<String>, home_dir: Option<PathBuf>) -> PathBuf {
    xdg_data_home
        .map(PathBuf::from)
        .or_else(|| home_dir.map(|home| home.join(".local/share")))
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR_NAME)
}
