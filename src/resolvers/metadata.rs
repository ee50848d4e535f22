//! Release metadata published alongside a package's releases

use std::path::{Component, Path};
use std::sync::Arc;

use semver::Version;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::warn;

use crate::resolver::error::ResolverError;

/// Default name of the metadata file next to the release files
pub const DEFAULT_METADATA_FILE_NAME: &str = "release-metadata.json";

/// Document listing every release of a package
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ReleaseMetadata {
    pub releases: Vec<ReleaseItem>,
}

/// A single downloadable release
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseItem {
    pub version: String,
    /// File name relative to the source's base location
    pub file_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    /// Content hash in `blake3:<hex>` form
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
}

impl ReleaseMetadata {
    pub fn from_slice(bytes: &[u8]) -> Result<Self, ResolverError> {
        serde_json::from_slice(bytes).map_err(|e| ResolverError::InvalidMetadata(e.to_string()))
    }

    /// Parsed versions of every release
    ///
    /// Entries whose version does not parse are skipped. Pre-releases are
    /// dropped unless `allow_prereleases` is set.
    pub fn versions(&self, allow_prereleases: bool) -> Vec<Version> {
        self.releases
            .iter()
            .filter_map(|release| match Version::parse(&release.version) {
                Ok(version) => Some(version),
                Err(e) => {
                    warn!("Skipping release with invalid version {}: {}", release.version, e);
                    None
                }
            })
            .filter(|version| allow_prereleases || version.pre.is_empty())
            .collect()
    }

    /// Find the release for `version`
    pub fn release(&self, version: &Version) -> Option<&ReleaseItem> {
        self.releases
            .iter()
            .find(|release| Version::parse(&release.version).is_ok_and(|v| &v == version))
    }
}

impl ReleaseItem {
    /// The release file name, rejected unless it names a single entry directly
    /// under the source's base location
    pub fn checked_file_name(&self) -> Result<&str, ResolverError> {
        let mut components = Path::new(&self.file_name).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) if !self.file_name.contains('\\') => {
                Ok(&self.file_name)
            }
            _ => {
                warn!("Rejecting release file name {:?}", self.file_name);
                Err(ResolverError::InvalidMetadata(format!(
                    "Release file name must be a plain file name: {:?}",
                    self.file_name
                )))
            }
        }
    }
}

/// Metadata owned by one resolver instance, populated by `initialize`
#[derive(Default)]
pub(crate) struct LoadedMetadata {
    inner: RwLock<Option<Arc<ReleaseMetadata>>>,
}

impl LoadedMetadata {
    pub(crate) async fn store(&self, metadata: ReleaseMetadata) {
        *self.inner.write().await = Some(Arc::new(metadata));
    }

    pub(crate) async fn get(&self) -> Result<Arc<ReleaseMetadata>, ResolverError> {
        self.inner
            .read()
            .await
            .clone()
            .ok_or(ResolverError::NotInitialized)
    }
}
