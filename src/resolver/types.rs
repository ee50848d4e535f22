//! Download parameters forwarded untouched from the caller to the owning source

#[cfg(test)]
use mockall::automock;

/// Receives download progress as a fraction in `[0.0, 1.0]`
#[cfg_attr(test, automock)]
pub trait ProgressSink: Send + Sync {
    fn report(&self, fraction: f64);
}

/// Source-specific data used to verify a downloaded package
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerificationInfo {
    /// Expected content hash in `blake3:<hex>` form.
    /// Takes precedence over any hash published in the release metadata.
    pub expected_hash: Option<String>,
}

impl VerificationInfo {
    pub fn with_hash(hash: impl Into<String>) -> Self {
        Self {
            expected_hash: Some(hash.into()),
        }
    }
}
