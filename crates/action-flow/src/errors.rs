//! Workflow engine error types
//!
//! Step outcomes, even failed ones, are reported through
//! [`crate::WorkflowResult`]. These errors mean the run itself could not
//! proceed.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FlowError {
    /// Workflow definition rejected before running
    #[error("Workflow validation failed: {0}")]
    ValidationFailed(String),

    /// State machine misuse
    #[error("Invalid workflow transition from {from} to {to}")]
    InvalidTransition { from: String, to: &'static str },

    /// Page session lost mid-run
    #[error("Page lost at step {step}: {reason}")]
    PageLost { step: String, reason: String },

    /// Manual checkpoint could not be served
    #[error("Manual checkpoint failed: {0}")]
    Checkpoint(String),
}

impl FlowError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, FlowError::PageLost { .. })
    }
}
