//! Capability contract for package sources

use std::path::Path;

use semver::Version;
use tokio_util::sync::CancellationToken;

use crate::resolver::error::ResolverError;
use crate::resolver::types::{ProgressSink, VerificationInfo};

/// A source capable of listing and delivering versions of one package
#[async_trait::async_trait]
pub trait PackageResolver: Send + Sync {
    /// Prepares the resolver for subsequent queries
    ///
    /// Fails if the source is unreachable or its metadata is malformed.
    async fn initialize(&self) -> Result<(), ResolverError>;

    /// Lists every version this source can deliver, in no particular order
    async fn list_versions(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Vec<Version>, ResolverError>;

    /// Downloads `version` into `destination`
    ///
    /// On success the destination contains exactly the bytes of that version's package.
    async fn download(
        &self,
        version: &Version,
        destination: &Path,
        verification: &VerificationInfo,
        progress: Option<&dyn ProgressSink>,
        cancel: &CancellationToken,
    ) -> Result<(), ResolverError>;

    /// Optional download size capability
    ///
    /// Sources that can estimate a download size return themselves here.
    fn download_size_provider(&self) -> Option<&dyn DownloadSizeProvider> {
        None
    }
}

/// Extension capability for sources that can report a download size up front
#[async_trait::async_trait]
pub trait DownloadSizeProvider: Send + Sync {
    /// Returns the size in bytes, or `None` if it cannot be estimated
    async fn download_size(
        &self,
        version: &Version,
        verification: &VerificationInfo,
        cancel: &CancellationToken,
    ) -> Result<Option<u64>, ResolverError>;
}
