//! Error types for action primitives

use action_locator::LocatorError;
use cdp_adapter::{AdapterError, AdapterErrorKind};
use thiserror::Error;

/// Failure taxonomy shared by primitives and the workflow engine
///
/// Primitives fold `NotFound` and `Timeout` into a skipped outcome; only the
/// engine decides whether a sequence of outcomes is an overall failure.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ActionError {
    /// Optional element absent
    #[error("Not found: {0}")]
    NotFound(String),

    /// Bounded wait exceeded
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Required local resource absent (e.g. the build artifact)
    #[error("Precondition missing: {0}")]
    PreconditionMissing(String),

    /// Explicit failure signal from the remote UI or API
    #[error("Rejected by remote: {0}")]
    RemoteRejected(String),

    /// Remote process not yet complete after bounded polling
    #[error("Still pending: {0}")]
    Pending(String),

    /// Operation was cancelled or interrupted
    #[error("Operation interrupted: {0}")]
    Interrupted(String),

    /// CDP communication or protocol error
    #[error("CDP I/O error: {0}")]
    CdpIo(String),

    /// Internal error (should not happen in normal operation)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ActionError {
    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ActionError::Timeout(_) | ActionError::Pending(_) | ActionError::CdpIo(_)
        )
    }

    /// Errors a primitive reports as a skip instead of a failure
    pub fn is_skippable(&self) -> bool {
        matches!(self, ActionError::NotFound(_) | ActionError::Timeout(_))
    }

    /// Get error severity level (0=low, 1=medium, 2=high, 3=critical)
    pub fn severity(&self) -> u8 {
        match self {
            ActionError::Internal(_) => 3,
            ActionError::CdpIo(_)
            | ActionError::PreconditionMissing(_)
            | ActionError::RemoteRejected(_) => 2,
            ActionError::Timeout(_) | ActionError::Interrupted(_) | ActionError::Pending(_) => 1,
            ActionError::NotFound(_) => 0,
        }
    }
}

impl From<AdapterError> for ActionError {
    fn from(err: AdapterError) -> Self {
        let message = err.to_string();
        match err.kind {
            AdapterErrorKind::TargetNotFound => ActionError::NotFound(message),
            AdapterErrorKind::NavTimeout => ActionError::Timeout(message),
            AdapterErrorKind::CdpIo | AdapterErrorKind::NotAttached => ActionError::CdpIo(message),
            AdapterErrorKind::Internal => ActionError::Internal(message),
        }
    }
}

impl From<LocatorError> for ActionError {
    fn from(err: LocatorError) -> Self {
        match err {
            LocatorError::Cdp(inner) => inner.into(),
            other => ActionError::Internal(other.to_string()),
        }
    }
}
