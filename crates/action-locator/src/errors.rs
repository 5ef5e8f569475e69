//! Error types for locator system

use cdp_adapter::{AdapterError, AdapterErrorKind};
use thiserror::Error;

/// Locator error enumeration
///
/// Absence of an element is never an error; see [`crate::Resolution`].
#[derive(Debug, Error, Clone)]
pub enum LocatorError {
    /// Label pattern is not a valid regular expression
    #[error("Invalid pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// Descriptor carries no role
    #[error("Invalid descriptor: {0}")]
    InvalidDescriptor(String),

    /// CDP communication error
    #[error("CDP error: {0}")]
    Cdp(#[from] AdapterError),
}

impl LocatorError {
    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            LocatorError::Cdp(err) => {
                err.retriable
                    || matches!(
                        err.kind,
                        AdapterErrorKind::NavTimeout
                            | AdapterErrorKind::TargetNotFound
                            | AdapterErrorKind::Internal
                    )
            }
            _ => false,
        }
    }

    /// Get error severity (0=low, 1=medium, 2=high, 3=critical)
    pub fn severity(&self) -> u8 {
        match self {
            LocatorError::Cdp(err) if err.kind == AdapterErrorKind::NotAttached => 3,
            LocatorError::Cdp(_) => 2,
            LocatorError::InvalidPattern { .. } | LocatorError::InvalidDescriptor(_) => 1,
        }
    }
}
