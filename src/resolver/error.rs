use std::fmt;

use semver::Version;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ResolverError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid release metadata: {0}")]
    InvalidMetadata(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Resolver has not been initialized")]
    NotInitialized,

    #[error("Version not found in any source: {0}")]
    VersionNotFound(Version),

    #[error("Verification failed: expected {expected}, got {actual}")]
    VerificationFailed { expected: String, actual: String },

    #[error("Operation cancelled")]
    Cancelled,

    #[error(transparent)]
    Aggregate(#[from] AggregateError),
}

impl ResolverError {
    /// Returns true for the expected "no source offers this version" outcome
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::VersionNotFound(_))
    }
}

/// Raised when every source failed the same operation.
///
/// Keeps each per-source error, in slot order, so callers can diagnose every source.
#[derive(Debug)]
pub struct AggregateError {
    operation: &'static str,
    errors: Vec<ResolverError>,
}

impl AggregateError {
    pub fn new(operation: &'static str, errors: Vec<ResolverError>) -> Self {
        Self { operation, errors }
    }

    /// Name of the operation that failed on every source
    pub fn operation(&self) -> &'static str {
        self.operation
    }

    /// Per-source errors in slot order
    pub fn errors(&self) -> &[ResolverError] {
        &self.errors
    }

    pub fn into_errors(self) -> Vec<ResolverError> {
        self.errors
    }
}

impl fmt::Display for AggregateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "All {} sources failed to {}",
            self.errors.len(),
            self.operation
        )?;
        for (index, error) in self.errors.iter().enumerate() {
            write!(f, "\n  [{}] {}", index, error)?;
        }
        Ok(())
    }
}

impl std::error::Error for AggregateError {}
