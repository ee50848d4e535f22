//! Writes downloaded chunks to disk while hashing and reporting progress
//!
//! Chunks go to a `.part` sibling of the destination. The destination is only
//! replaced once every chunk is written and the hash is verified, so a failed
//! transfer never touches a file that was already there.

use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};

use blake3::Hasher;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::resolver::error::ResolverError;
use crate::resolver::types::ProgressSink;

/// Hash prefix for BLAKE3 hashes
pub const HASH_PREFIX: &str = "blake3:";

/// Suffix appended to the destination file name while a transfer is in flight
pub const PART_SUFFIX: &str = ".part";

/// Format a finished hasher as `blake3:<hex>`
pub fn format_hash(hasher: &Hasher) -> String {
    format!("{}{}", HASH_PREFIX, hasher.finalize().to_hex())
}

/// Compare an expected hash against the computed one, case-insensitively
pub fn verify_hash(expected: &str, actual: &str) -> Result<(), ResolverError> {
    if expected.eq_ignore_ascii_case(actual) {
        Ok(())
    } else {
        Err(ResolverError::VerificationFailed {
            expected: expected.to_string(),
            actual: actual.to_string(),
        })
    }
}

/// Path of the in-flight file for `destination`
pub fn part_path(destination: &Path) -> Result<PathBuf, ResolverError> {
    let file_name = destination.file_name().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("destination {:?} has no file name", destination),
        )
    })?;

    let mut part_name = OsString::from(file_name);
    part_name.push(PART_SUFFIX);
    Ok(destination.with_file_name(part_name))
}

pub(crate) struct Transfer<'a> {
    file: File,
    part: PathBuf,
    destination: PathBuf,
    hasher: Hasher,
    written: u64,
    total: Option<u64>,
    progress: Option<&'a dyn ProgressSink>,
    last_reported: f64,
}

impl<'a> Transfer<'a> {
    pub(crate) async fn create(
        destination: &Path,
        total: Option<u64>,
        progress: Option<&'a dyn ProgressSink>,
    ) -> Result<Self, ResolverError> {
        let part = part_path(destination)?;
        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        Ok(Self {
            file: File::create(&part).await?,
            part,
            destination: destination.to_path_buf(),
            hasher: Hasher::new(),
            written: 0,
            total: total.filter(|total| *total > 0),
            progress,
            last_reported: 0.0,
        })
    }

    pub(crate) async fn write_chunk(&mut self, chunk: &[u8]) -> Result<(), ResolverError> {
        self.file.write_all(chunk).await?;
        self.hasher.update(chunk);
        self.written += chunk.len() as u64;

        if let Some(total) = self.total {
            self.report((self.written as f64 / total as f64).min(1.0));
        }
        Ok(())
    }

    /// Verify the written bytes against `expected_hash`, if any, and move them
    /// into place. The in-flight file is removed when anything fails.
    pub(crate) async fn finish(mut self, expected_hash: Option<&str>) -> Result<u64, ResolverError> {
        let completed = self.complete(expected_hash).await;
        match completed {
            Ok(written) => Ok(written),
            Err(e) => {
                self.abandon().await;
                Err(e)
            }
        }
    }

    /// Drop the transfer and remove the in-flight file
    pub(crate) async fn abandon(self) {
        let Self { file, part, .. } = self;
        drop(file);
        discard(&part).await;
    }

    async fn complete(&mut self, expected_hash: Option<&str>) -> Result<u64, ResolverError> {
        self.file.flush().await?;
        self.file.sync_all().await?;

        if self.last_reported < 1.0 {
            self.report(1.0);
        }

        let actual = format_hash(&self.hasher);
        if let Some(expected) = expected_hash {
            verify_hash(expected, &actual)?;
            debug!("Verified {} bytes ({})", self.written, actual);
        }

        tokio::fs::rename(&self.part, &self.destination).await?;
        Ok(self.written)
    }

    fn report(&mut self, fraction: f64) {
        if let Some(progress) = self.progress {
            progress.report(fraction);
        }
        self.last_reported = fraction;
    }
}

/// Remove a partially written file, ignoring a missing one
pub(crate) async fn discard(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != io::ErrorKind::NotFound {
            debug!("Failed to remove partial download {:?}: {}", path, e);
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::types::MockProgressSink;
    use tempfile::TempDir;

    #[test]
    fn verify_hash_ignores_case() {
        assert!(verify_hash("blake3:ABCDEF", "blake3:abcdef").is_ok());
    }

    #[test]
    fn verify_hash_reports_both_hashes_on_mismatch() {
        let result = verify_hash("blake3:00", "blake3:11");

        match result {
            Err(ResolverError::VerificationFailed { expected, actual }) => {
                assert_eq!(expected, "blake3:00");
                assert_eq!(actual, "blake3:11");
            }
            other => panic!("expected verification failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn transfer_writes_chunks_and_reports_progress() {
        let temp_dir = TempDir::new().unwrap();
        let destination = temp_dir.path().join("nested/pkg.bin");

        let mut progress = MockProgressSink::new();
        progress
            .expect_report()
            .withf(|fraction| (*fraction - 0.5).abs() < f64::EPSILON)
            .times(1)
            .return_const(());
        progress
            .expect_report()
            .withf(|fraction| (*fraction - 1.0).abs() < f64::EPSILON)
            .times(1)
            .return_const(());

        let mut transfer = Transfer::create(&destination, Some(8), Some(&progress))
            .await
            .unwrap();
        transfer.write_chunk(b"abcd").await.unwrap();
        transfer.write_chunk(b"efgh").await.unwrap();
        let expected = format!("{}{}", HASH_PREFIX, blake3::hash(b"abcdefgh").to_hex());
        let written = transfer.finish(Some(&expected)).await.unwrap();

        assert_eq!(written, 8);
        assert_eq!(std::fs::read(&destination).unwrap(), b"abcdefgh");
    }

    #[tokio::test]
    async fn transfer_reports_completion_when_total_is_unknown() {
        let temp_dir = TempDir::new().unwrap();
        let destination = temp_dir.path().join("pkg.bin");

        let mut progress = MockProgressSink::new();
        progress
            .expect_report()
            .withf(|fraction| (*fraction - 1.0).abs() < f64::EPSILON)
            .times(1)
            .return_const(());

        let mut transfer = Transfer::create(&destination, None, Some(&progress))
            .await
            .unwrap();
        transfer.write_chunk(b"data").await.unwrap();

        transfer.finish(None).await.unwrap();
    }

    #[tokio::test]
    async fn transfer_fails_on_hash_mismatch() {
        let temp_dir = TempDir::new().unwrap();
        let destination = temp_dir.path().join("pkg.bin");

        let mut transfer = Transfer::create(&destination, None, None).await.unwrap();
        transfer.write_chunk(b"data").await.unwrap();

        let result = transfer.finish(Some("blake3:deadbeef")).await;

        assert!(matches!(result, Err(ResolverError::VerificationFailed { .. })));
        assert!(!destination.exists());
        assert!(!part_path(&destination).unwrap().exists());
    }

    #[tokio::test]
    async fn hash_mismatch_keeps_existing_destination() {
        let temp_dir = TempDir::new().unwrap();
        let destination = temp_dir.path().join("pkg.bin");
        std::fs::write(&destination, b"user data").unwrap();

        let mut transfer = Transfer::create(&destination, None, None).await.unwrap();
        transfer.write_chunk(b"data").await.unwrap();
        assert_eq!(std::fs::read(&destination).unwrap(), b"user data");

        let result = transfer.finish(Some("blake3:deadbeef")).await;

        assert!(result.is_err());
        assert_eq!(std::fs::read(&destination).unwrap(), b"user data");
        assert!(!part_path(&destination).unwrap().exists());
    }

    #[tokio::test]
    async fn abandon_removes_only_the_in_flight_file() {
        let temp_dir = TempDir::new().unwrap();
        let destination = temp_dir.path().join("pkg.bin");
        std::fs::write(&destination, b"user data").unwrap();

        let mut transfer = Transfer::create(&destination, None, None).await.unwrap();
        transfer.write_chunk(b"partial").await.unwrap();
        transfer.abandon().await;

        assert_eq!(std::fs::read(&destination).unwrap(), b"user data");
        assert!(!part_path(&destination).unwrap().exists());
    }

    #[tokio::test]
    async fn finish_replaces_existing_destination() {
        let temp_dir = TempDir::new().unwrap();
        let destination = temp_dir.path().join("pkg.bin");
        std::fs::write(&destination, b"old contents").unwrap();

        let mut transfer = Transfer::create(&destination, None, None).await.unwrap();
        transfer.write_chunk(b"new").await.unwrap();
        transfer.finish(None).await.unwrap();

        assert_eq!(std::fs::read(&destination).unwrap(), b"new");
        assert!(!part_path(&destination).unwrap().exists());
    }

    #[test]
    fn part_path_appends_suffix_to_file_name() {
        assert_eq!(
            part_path(Path::new("/tmp/out/pkg.bin")).unwrap(),
            PathBuf::from("/tmp/out/pkg.bin.part")
        );
        assert!(part_path(Path::new("/")).is_err());
    }

    #[tokio::test]
    async fn discard_ignores_missing_file() {
        let temp_dir = TempDir::new().unwrap();

        discard(&temp_dir.path().join("missing.bin")).await;
    }
}
