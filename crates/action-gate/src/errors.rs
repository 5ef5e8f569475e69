//! Error types for outcome verification

use action_locator::LocatorError;
use action_primitives::ActionError;
use cdp_adapter::{AdapterError, AdapterErrorKind};
use thiserror::Error;

/// Gate error enumeration
///
/// A verdict of failure or pending is not an error; these cover the cases
/// where no verdict can be produced at all.
#[derive(Debug, Error, Clone)]
pub enum GateError {
    /// Spec names no signal at all
    #[error("Invalid outcome spec: {0}")]
    InvalidSpec(String),

    /// Signal pattern did not compile
    #[error("Locator error: {0}")]
    Locator(#[from] LocatorError),

    /// Page session lost while polling
    #[error("CDP error: {0}")]
    Cdp(AdapterError),

    /// Polling was cancelled
    #[error("Verification interrupted: {0}")]
    Interrupted(String),
}

impl GateError {
    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(self, GateError::Cdp(err) if err.retriable)
    }

    /// Get error severity (0=low, 1=medium, 2=high, 3=critical)
    pub fn severity(&self) -> u8 {
        match self {
            GateError::InvalidSpec(_) | GateError::Locator(_) => 3,
            GateError::Cdp(_) => 2,
            GateError::Interrupted(_) => 1,
        }
    }
}

impl From<AdapterError> for GateError {
    fn from(err: AdapterError) -> Self {
        GateError::Cdp(err)
    }
}

impl From<GateError> for ActionError {
    fn from(err: GateError) -> Self {
        match err {
            GateError::Cdp(inner) => match inner.kind {
                AdapterErrorKind::CdpIo | AdapterErrorKind::NotAttached => {
                    ActionError::CdpIo(inner.to_string())
                }
                _ => ActionError::Internal(inner.to_string()),
            },
            GateError::Interrupted(reason) => ActionError::Interrupted(reason),
            other => ActionError::Internal(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lost_session_maps_to_cdp_io() {
        let err = GateError::from(AdapterError::new(AdapterErrorKind::NotAttached));
        assert_eq!(err.severity(), 2);
        assert!(matches!(ActionError::from(err), ActionError::CdpIo(_)));
    }

    #[test]
    fn bad_spec_is_internal() {
        let err = GateError::InvalidSpec("no signals".into());
        assert!(!err.is_retryable());
        assert!(matches!(ActionError::from(err), ActionError::Internal(_)));
    }
}
