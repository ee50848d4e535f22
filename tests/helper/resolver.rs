//! Resolver test utilities

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use semver::Version;
use tokio_util::sync::CancellationToken;

use release_resolver::resolver::{
    DownloadSizeProvider, PackageResolver, ProgressSink, ResolverError, VerificationInfo,
};

/// Arguments received by the last `download` call
pub struct RecordedDownload {
    pub version: Version,
    pub destination: PathBuf,
    pub verification: VerificationInfo,
    pub cancel: CancellationToken,
}

/// Scripted resolver that records how it was called
pub struct FakeResolver {
    versions: Vec<Version>,
    list_delay: Duration,
    fail_initialize: bool,
    fail_listing: AtomicBool,
    size: Option<u64>,
    pub initialize_calls: AtomicUsize,
    pub list_calls: AtomicUsize,
    pub download_calls: AtomicUsize,
    pub last_download: Mutex<Option<RecordedDownload>>,
}

impl FakeResolver {
    pub fn new() -> Self {
        Self {
            versions: Vec::new(),
            list_delay: Duration::ZERO,
            fail_initialize: false,
            fail_listing: AtomicBool::new(false),
            size: None,
            initialize_calls: AtomicUsize::new(0),
            list_calls: AtomicUsize::new(0),
            download_calls: AtomicUsize::new(0),
            last_download: Mutex::new(None),
        }
    }

    pub fn with_versions(mut self, versions: &[&str]) -> Self {
        self.versions = versions.iter().map(|v| Version::parse(v).unwrap()).collect();
        self
    }

    pub fn with_list_delay(mut self, millis: u64) -> Self {
        self.list_delay = Duration::from_millis(millis);
        self
    }

    pub fn failing_initialize(mut self) -> Self {
        self.fail_initialize = true;
        self
    }

    pub fn failing_listing(self) -> Self {
        self.fail_listing.store(true, Ordering::SeqCst);
        self
    }

    pub fn with_download_size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }

    /// Make subsequent `list_versions` calls fail
    pub fn start_failing(&self) {
        self.fail_listing.store(true, Ordering::SeqCst);
    }

    pub fn list_call_count(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn download_call_count(&self) -> usize {
        self.download_calls.load(Ordering::SeqCst)
    }

    pub fn into_arc(self) -> Arc<Self> {
        Arc::new(self)
    }
}

#[async_trait]
impl PackageResolver for FakeResolver {
    async fn initialize(&self) -> Result<(), ResolverError> {
        self.initialize_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_initialize {
            return Err(ResolverError::InvalidResponse(
                "Unexpected status: 503".to_string(),
            ));
        }
        Ok(())
    }

    async fn list_versions(
        &self,
        _cancel: &CancellationToken,
    ) -> Result<Vec<Version>, ResolverError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.list_delay).await;
        if self.fail_listing.load(Ordering::SeqCst) {
            return Err(ResolverError::InvalidResponse(
                "Unexpected status: 500".to_string(),
            ));
        }
        Ok(self.versions.clone())
    }

    async fn download(
        &self,
        version: &Version,
        destination: &Path,
        verification: &VerificationInfo,
        progress: Option<&dyn ProgressSink>,
        cancel: &CancellationToken,
    ) -> Result<(), ResolverError> {
        self.download_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(progress) = progress {
            progress.report(0.5);
        }
        *self.last_download.lock().unwrap() = Some(RecordedDownload {
            version: version.clone(),
            destination: destination.to_path_buf(),
            verification: verification.clone(),
            cancel: cancel.clone(),
        });
        Ok(())
    }

    fn download_size_provider(&self) -> Option<&dyn DownloadSizeProvider> {
        if self.size.is_some() { Some(self) } else { None }
    }
}

#[async_trait]
impl DownloadSizeProvider for FakeResolver {
    async fn download_size(
        &self,
        _version: &Version,
        _verification: &VerificationInfo,
        _cancel: &CancellationToken,
    ) -> Result<Option<u64>, ResolverError> {
        Ok(self.size)
    }
}

/// Progress sink that remembers every reported fraction
#[derive(Default)]
pub struct RecordingProgress {
    pub reports: Mutex<Vec<f64>>,
}

impl ProgressSink for RecordingProgress {
    fn report(&self, fraction: f64) {
        self.reports.lock().unwrap().push(fraction);
    }
}

/// Convert concrete fakes into the trait objects the aggregate expects
pub fn as_resolvers(fakes: &[Arc<FakeResolver>]) -> Vec<Arc<dyn PackageResolver>> {
    fakes
        .iter()
        .map(|fake| Arc::clone(fake) as Arc<dyn PackageResolver>)
        .collect()
}

pub fn versions(values: &[&str]) -> Vec<Version> {
    values.iter().map(|v| Version::parse(v).unwrap()).collect()
}
