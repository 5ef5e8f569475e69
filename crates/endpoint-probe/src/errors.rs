//! Error types for endpoint probing

use thiserror::Error;

/// Transport-level probe failure
///
/// A non-2xx status is a response, not an error.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProbeError {
    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    /// DNS, connect or TLS failure
    #[error("Unreachable: {0}")]
    Unreachable(String),

    #[error("Probe timed out after {0}ms")]
    Timeout(u64),
}

impl ProbeError {
    /// Whether a later attempt may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, ProbeError::Unreachable(_) | ProbeError::Timeout(_))
    }
}

/// Reasons an asset-links descriptor does not vouch for the app
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AssetLinksError {
    #[error("Descriptor returned HTTP {0}")]
    Status(u16),

    #[error("Malformed descriptor: {0}")]
    Malformed(String),

    #[error("Descriptor lists no statements")]
    Empty,

    #[error("Package mismatch: expected {expected}, found {found}")]
    PackageMismatch { expected: String, found: String },

    #[error("No certificate fingerprint for {package}")]
    MissingFingerprint { package: String },
}

impl AssetLinksError {
    /// Status and emptiness can change once hosting catches up
    pub fn is_retryable(&self) -> bool {
        matches!(self, AssetLinksError::Status(_) | AssetLinksError::Empty)
    }
}
