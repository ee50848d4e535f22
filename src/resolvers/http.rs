//! Release source served over HTTP
//!
//! Expects the release metadata file and every release file to live directly
//! under one base URL.

use std::path::Path;
use std::time::Duration;

use reqwest::header::CONTENT_LENGTH;
use semver::Version;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{DOWNLOAD_TIMEOUT_SECS, FETCH_TIMEOUT_MS};
use crate::resolver::error::ResolverError;
use crate::resolver::traits::{DownloadSizeProvider, PackageResolver};
use crate::resolver::types::{ProgressSink, VerificationInfo};
use crate::resolvers::metadata::{DEFAULT_METADATA_FILE_NAME, LoadedMetadata, ReleaseMetadata};
use crate::resolvers::transfer::Transfer;

/// Resolver implementation for releases hosted under a base URL
pub struct HttpReleaseResolver {
    client: reqwest::Client,
    base_url: String,
    metadata_file_name: String,
    allow_prereleases: bool,
    fetch_timeout: Duration,
    metadata: LoadedMetadata,
}

impl HttpReleaseResolver {
    /// Creates a new HttpReleaseResolver for the given base URL
    pub fn new(base_url: &str) -> Result<Self, ResolverError> {
        let client = reqwest::Client::builder()
            .user_agent("release-resolver")
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            metadata_file_name: DEFAULT_METADATA_FILE_NAME.to_string(),
            allow_prereleases: false,
            fetch_timeout: Duration::from_millis(FETCH_TIMEOUT_MS),
            metadata: LoadedMetadata::default(),
        })
    }

    pub fn with_metadata_file_name(mut self, file_name: &str) -> Self {
        self.metadata_file_name = file_name.to_string();
        self
    }

    pub fn with_prereleases(mut self, allow: bool) -> Self {
        self.allow_prereleases = allow;
        self
    }

    /// Timeout applied to the metadata request and size lookups
    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    fn url_for(&self, file_name: &str) -> String {
        format!("{}/{}", self.base_url, file_name)
    }

    async fn fetch_to_file(
        &self,
        url: &str,
        destination: &Path,
        expected_hash: Option<&str>,
        progress: Option<&dyn ProgressSink>,
        cancel: &CancellationToken,
    ) -> Result<u64, ResolverError> {
        let request = self
            .client
            .get(url)
            .timeout(Duration::from_secs(DOWNLOAD_TIMEOUT_SECS))
            .send();

        let mut response = tokio::select! {
            _ = cancel.cancelled() => return Err(ResolverError::Cancelled),
            response = request => response?,
        };

        let status = response.status();
        if !status.is_success() {
            warn!("Release download returned status {}: {}", status, url);
            return Err(ResolverError::InvalidResponse(format!(
                "Unexpected status: {}",
                status
            )));
        }

        let mut transfer =
            Transfer::create(destination, response.content_length(), progress).await?;
        let copied = stream_chunks(&mut response, &mut transfer, cancel).await;
        match copied {
            Ok(()) => transfer.finish(expected_hash).await,
            Err(e) => {
                transfer.abandon().await;
                Err(e)
            }
        }
    }
}

async fn stream_chunks(
    response: &mut reqwest::Response,
    transfer: &mut Transfer<'_>,
    cancel: &CancellationToken,
) -> Result<(), ResolverError> {
    loop {
        let chunk = tokio::select! {
            _ = cancel.cancelled() => return Err(ResolverError::Cancelled),
            chunk = response.chunk() => chunk?,
        };
        match chunk {
            Some(bytes) => transfer.write_chunk(&bytes).await?,
            None => return Ok(()),
        }
    }
}

#[async_trait::async_trait]
impl PackageResolver for HttpReleaseResolver {
    async fn initialize(&self) -> Result<(), ResolverError> {
        let url = self.url_for(&self.metadata_file_name);

        let response = self
            .client
            .get(&url)
            .timeout(self.fetch_timeout)
            .send()
            .await?;
        let status = response.status();

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(ResolverError::InvalidMetadata(format!(
                "Metadata file not found: {}",
                url
            )));
        }

        if !status.is_success() {
            warn!("Release source returned status {}: {}", status, url);
            return Err(ResolverError::InvalidResponse(format!(
                "Unexpected status: {}",
                status
            )));
        }

        let bytes = response.bytes().await?;
        let metadata = ReleaseMetadata::from_slice(&bytes).inspect_err(|e| {
            warn!("Failed to parse release metadata from {}: {}", url, e);
        })?;

        info!(
            "Loaded {} releases from {}",
            metadata.releases.len(),
            self.base_url
        );
        self.metadata.store(metadata).await;
        Ok(())
    }

    async fn list_versions(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Vec<Version>, ResolverError> {
        if cancel.is_cancelled() {
            return Err(ResolverError::Cancelled);
        }

        let metadata = self.metadata.get().await?;
        Ok(metadata.versions(self.allow_prereleases))
    }

    async fn download(
        &self,
        version: &Version,
        destination: &Path,
        verification: &VerificationInfo,
        progress: Option<&dyn ProgressSink>,
        cancel: &CancellationToken,
    ) -> Result<(), ResolverError> {
        let metadata = self.metadata.get().await?;
        let release = metadata
            .release(version)
            .ok_or_else(|| ResolverError::VersionNotFound(version.clone()))?;

        let url = self.url_for(release.checked_file_name()?);
        let expected_hash = verification
            .expected_hash
            .as_deref()
            .or(release.hash.as_deref());

        debug!("Downloading {} to {:?}", url, destination);
        let written = self
            .fetch_to_file(&url, destination, expected_hash, progress, cancel)
            .await?;
        info!("Downloaded {} ({} bytes)", url, written);
        Ok(())
    }

    fn download_size_provider(&self) -> Option<&dyn DownloadSizeProvider> {
        Some(self)
    }
}

#[async_trait::async_trait]
impl DownloadSizeProvider for HttpReleaseResolver {
    async fn download_size(
        &self,
        version: &Version,
        _verification: &VerificationInfo,
        cancel: &CancellationToken,
    ) -> Result<Option<u64>, ResolverError> {
        let metadata = self.metadata.get().await?;
        let release = metadata
            .release(version)
            .ok_or_else(|| ResolverError::VersionNotFound(version.clone()))?;

        if let Some(size) = release.size {
            return Ok(Some(size));
        }

        let url = self.url_for(release.checked_file_name()?);
        let request = self.client.head(&url).timeout(self.fetch_timeout).send();
        let response = tokio::select! {
            _ = cancel.cancelled() => return Err(ResolverError::Cancelled),
            response = request => response?,
        };

        if !response.status().is_success() {
            debug!("HEAD {} returned status {}", url, response.status());
            return Ok(None);
        }

        Ok(response
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok()))
    }
}
