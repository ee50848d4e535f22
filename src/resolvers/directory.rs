//! Release source backed by a local directory
//!
//! The directory holds the release metadata file next to the release files.
//! This source cannot report download sizes up front.

use std::io;
use std::path::{Path, PathBuf};

use semver::Version;
use tokio::io::AsyncReadExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::resolver::error::ResolverError;
use crate::resolver::traits::PackageResolver;
use crate::resolver::types::{ProgressSink, VerificationInfo};
use crate::resolvers::metadata::{DEFAULT_METADATA_FILE_NAME, LoadedMetadata, ReleaseMetadata};
use crate::resolvers::transfer::Transfer;

const COPY_BUFFER_SIZE: usize = 256 * 1024;

pub struct DirectoryResolver {
    root: PathBuf,
    metadata_file_name: String,
    allow_prereleases: bool,
    metadata: LoadedMetadata,
}

impl DirectoryResolver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            metadata_file_name: DEFAULT_METADATA_FILE_NAME.to_string(),
            allow_prereleases: false,
            metadata: LoadedMetadata::default(),
        }
    }

    pub fn with_metadata_file_name(mut self, file_name: &str) -> Self {
        self.metadata_file_name = file_name.to_string();
        self
    }

    pub fn with_prereleases(mut self, allow: bool) -> Self {
        self.allow_prereleases = allow;
        self
    }

    async fn copy_to_file(
        &self,
        source: &Path,
        destination: &Path,
        expected_hash: Option<&str>,
        progress: Option<&dyn ProgressSink>,
        cancel: &CancellationToken,
    ) -> Result<u64, ResolverError> {
        let mut file = tokio::fs::File::open(source).await?;
        let total = file.metadata().await?.len();

        if is_same_file(source, destination).await? {
            return Err(ResolverError::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("destination {:?} is the release file itself", destination),
            )));
        }

        let mut transfer = Transfer::create(destination, Some(total), progress).await?;
        let copied = copy_chunks(&mut file, &mut transfer, cancel).await;
        match copied {
            Ok(()) => transfer.finish(expected_hash).await,
            Err(e) => {
                transfer.abandon().await;
                Err(e)
            }
        }
    }
}

async fn copy_chunks(
    file: &mut tokio::fs::File,
    transfer: &mut Transfer<'_>,
    cancel: &CancellationToken,
) -> Result<(), ResolverError> {
    let mut buffer = vec![0u8; COPY_BUFFER_SIZE];

    loop {
        if cancel.is_cancelled() {
            return Err(ResolverError::Cancelled);
        }
        let read = file.read(&mut buffer).await?;
        if read == 0 {
            return Ok(());
        }
        transfer.write_chunk(&buffer[..read]).await?;
    }
}

/// Whether `destination` already exists and resolves to `source`
async fn is_same_file(source: &Path, destination: &Path) -> Result<bool, ResolverError> {
    let destination = match tokio::fs::canonicalize(destination).await {
        Ok(path) => path,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e.into()),
    };
    Ok(tokio::fs::canonicalize(source).await? == destination)
}

#[async_trait::async_trait]
impl PackageResolver for DirectoryResolver {
    async fn initialize(&self) -> Result<(), ResolverError> {
        let path = self.root.join(&self.metadata_file_name);
        let bytes = tokio::fs::read(&path).await?;
        let metadata = ReleaseMetadata::from_slice(&bytes)?;

        info!(
            "Loaded {} releases from {:?}",
            metadata.releases.len(),
            self.root
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

        let source = self.root.join(release.checked_file_name()?);
        let expected_hash = verification
            .expected_hash
            .as_deref()
            .or(release.hash.as_deref());

        debug!("Copying {:?} to {:?}", source, destination);
        let written = self
            .copy_to_file(&source, destination, expected_hash, progress, cancel)
            .await?;
        info!("Copied {:?} ({} bytes)", source, written);
        Ok(())
    }
}
