//! Aggregate resolver combining multiple package sources
//!
//! Initialization and version listing fan out to every source concurrently and
//! tolerate partial failure: a failing source simply contributes no versions.
//! Version lists are acquired once, on first use, and cached for the lifetime
//! of the aggregate.

use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;
use std::sync::{Arc, OnceLock};

use semver::Version;
use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::resolver::error::ResolverError;
use crate::resolver::fan_out::settle_all;
use crate::resolver::traits::{DownloadSizeProvider, PackageResolver};
use crate::resolver::types::{ProgressSink, VerificationInfo};

/// The source selected to deliver a specific version
#[derive(Clone)]
pub struct ResolvedOwner {
    /// Resolver that will serve the download
    pub resolver: Arc<dyn PackageResolver>,
    /// Position of the resolver in the list supplied at construction
    pub index: usize,
}

impl fmt::Debug for ResolvedOwner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedOwner")
            .field("index", &self.index)
            .finish_non_exhaustive()
    }
}

/// One source paired with the versions it reported
struct ResolverSlot {
    resolver: Arc<dyn PackageResolver>,
    // Written once during acquisition, read-only afterwards
    versions: OnceLock<Vec<Version>>,
}

impl ResolverSlot {
    fn cached_versions(&self) -> &[Version] {
        self.versions.get().map(Vec::as_slice).unwrap_or_default()
    }
}

/// A package resolver that delivers packages from multiple sources
///
/// Slot order is fixed at construction and decides which source owns a
/// version offered by more than one of them: the earliest one wins.
pub struct AggregateResolver {
    slots: Vec<ResolverSlot>,
    initialized: OnceCell<()>,
    acquired: OnceCell<()>,
}

impl AggregateResolver {
    pub fn new(resolvers: Vec<Arc<dyn PackageResolver>>) -> Self {
        let slots = resolvers
            .into_iter()
            .map(|resolver| ResolverSlot {
                resolver,
                versions: OnceLock::new(),
            })
            .collect();

        Self {
            slots,
            initialized: OnceCell::new(),
            acquired: OnceCell::new(),
        }
    }

    /// Number of sources in this aggregate
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Find the source that will deliver `version`
    ///
    /// Scans sources in construction order and returns the first one whose
    /// version list contains `version`. Fails with
    /// [`ResolverError::VersionNotFound`] if no source offers it.
    pub async fn resolve_owner(
        &self,
        version: &Version,
        cancel: &CancellationToken,
    ) -> Result<ResolvedOwner, ResolverError> {
        self.acquire_versions(cancel).await?;

        self.slots
            .iter()
            .enumerate()
            .find(|(_, slot)| slot.cached_versions().contains(version))
            .map(|(index, slot)| ResolvedOwner {
                resolver: Arc::clone(&slot.resolver),
                index,
            })
            .ok_or_else(|| ResolverError::VersionNotFound(version.clone()))
    }

    /// Fetch every source's version list once
    ///
    /// Concurrent first callers wait on the same acquisition. If every source
    /// fails nothing is cached, so a later call tries again.
    async fn acquire_versions(&self, cancel: &CancellationToken) -> Result<(), ResolverError> {
        self.acquired
            .get_or_try_init(|| async move {
                let operations = self
                    .slots
                    .iter()
                    .map(|slot| slot.resolver.list_versions(cancel));
                let outcomes = settle_all("list versions", operations).await?;

                for (index, (slot, outcome)) in self.slots.iter().zip(outcomes).enumerate() {
                    let versions = outcome.unwrap_or_else(|e| {
                        warn!("Source {} failed to list versions: {}", index, e);
                        Vec::new()
                    });
                    debug!("Source {} reported {} versions", index, versions.len());
                    let _ = slot.versions.set(versions);
                }

                info!("Acquired versions from {} sources", self.slots.len());
                Ok::<_, ResolverError>(())
            })
            .await?;

        Ok(())
    }
}

#[async_trait::async_trait]
impl PackageResolver for AggregateResolver {
    /// Initialize every source concurrently
    ///
    /// Succeeds if at least one source initialized. Only the first call does
    /// any work; later calls return `Ok(())` whatever the first outcome was.
    async fn initialize(&self) -> Result<(), ResolverError> {
        let mut first_error = None;
        let error_slot = &mut first_error;

        self.initialized
            .get_or_init(|| async move {
                let operations = self.slots.iter().map(|slot| slot.resolver.initialize());
                match settle_all("initialize", operations).await {
                    Ok(outcomes) => {
                        for (index, outcome) in outcomes.into_iter().enumerate() {
                            if let Err(e) = outcome {
                                warn!("Source {} failed to initialize: {}", index, e);
                            }
                        }
                    }
                    Err(e) => *error_slot = Some(e),
                }
            })
            .await;

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Deduplicated union of every source's versions, ascending
    async fn list_versions(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Vec<Version>, ResolverError> {
        self.acquire_versions(cancel).await?;

        let merged: BTreeSet<&Version> = self
            .slots
            .iter()
            .flat_map(|slot| slot.cached_versions())
            .collect();

        Ok(merged.into_iter().cloned().collect())
    }

    async fn download(
        &self,
        version: &Version,
        destination: &Path,
        verification: &VerificationInfo,
        progress: Option<&dyn ProgressSink>,
        cancel: &CancellationToken,
    ) -> Result<(), ResolverError> {
        let owner = self.resolve_owner(version, cancel).await?;
        debug!("Downloading {} from source {}", version, owner.index);

        owner
            .resolver
            .download(version, destination, verification, progress, cancel)
            .await
    }

    fn download_size_provider(&self) -> Option<&dyn DownloadSizeProvider> {
        Some(self)
    }
}

#[async_trait::async_trait]
impl DownloadSizeProvider for AggregateResolver {
    /// Returns `Ok(None)` when the owning source cannot report sizes
    async fn download_size(
        &self,
        version: &Version,
        verification: &VerificationInfo,
        cancel: &CancellationToken,
    ) -> Result<Option<u64>, ResolverError> {
        let owner = self.resolve_owner(version, cancel).await?;

        match owner.resolver.download_size_provider() {
            Some(provider) => provider.download_size(version, verification, cancel).await,
            None => {
                debug!("Source {} cannot report download sizes", owner.index);
                Ok(None)
            }
        }
    }
}
