//! Per-run workflow state machine

use serde::{Deserialize, Serialize};

use crate::{errors::FlowError, types::WorkflowResult};

/// `NotStarted -> Running -> {Succeeded, Failed, PartiallyCompleted, RequiresManual}`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum WorkflowState {
    #[default]
    NotStarted,
    Running { step: usize },
    Succeeded,
    Failed { step: usize, reason: String },
    PartiallyCompleted { skipped: Vec<String> },
    RequiresManual { step: usize, reason: String },
}

impl WorkflowState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, WorkflowState::NotStarted | WorkflowState::Running { .. })
    }

    pub fn current_step(&self) -> Option<usize> {
        match self {
            WorkflowState::Running { step }
            | WorkflowState::Failed { step, .. }
            | WorkflowState::RequiresManual { step, .. } => Some(*step),
            _ => None,
        }
    }

    pub fn start(&mut self) -> Result<(), FlowError> {
        match self {
            WorkflowState::NotStarted => {
                *self = WorkflowState::Running { step: 0 };
                Ok(())
            }
            _ => Err(self.invalid("running")),
        }
    }

    pub fn advance(&mut self) -> Result<usize, FlowError> {
        match self {
            WorkflowState::Running { step } => {
                *step += 1;
                Ok(*step)
            }
            _ => Err(self.invalid("next step")),
        }
    }

    /// Succeeded when nothing was skipped, PartiallyCompleted otherwise.
    pub fn finish(&mut self, skipped: Vec<String>) -> Result<(), FlowError> {
        match self {
            WorkflowState::Running { .. } => {
                *self = if skipped.is_empty() {
                    WorkflowState::Succeeded
                } else {
                    WorkflowState::PartiallyCompleted { skipped }
                };
                Ok(())
            }
            _ => Err(self.invalid("finished")),
        }
    }

    pub fn fail(&mut self, reason: impl Into<String>) -> Result<(), FlowError> {
        match self {
            WorkflowState::Running { step } => {
                *self = WorkflowState::Failed {
                    step: *step,
                    reason: reason.into(),
                };
                Ok(())
            }
            _ => Err(self.invalid("failed")),
        }
    }

    pub fn require_manual(&mut self, reason: impl Into<String>) -> Result<(), FlowError> {
        match self {
            WorkflowState::Running { step } => {
                *self = WorkflowState::RequiresManual {
                    step: *step,
                    reason: reason.into(),
                };
                Ok(())
            }
            _ => Err(self.invalid("requires_manual")),
        }
    }

    /// Result of a terminal state.
    pub fn result(&self) -> Option<WorkflowResult> {
        Some(match self {
            WorkflowState::Succeeded => WorkflowResult::Succeeded,
            WorkflowState::PartiallyCompleted { skipped } => WorkflowResult::PartiallyCompleted {
                skipped: skipped.clone(),
            },
            WorkflowState::Failed { step, reason } => WorkflowResult::Failed {
                step: *step,
                reason: reason.clone(),
            },
            WorkflowState::RequiresManual { step, reason } => {
                WorkflowResult::RequiresManualCompletion {
                    step: *step,
                    reason: reason.clone(),
                }
            }
            WorkflowState::NotStarted | WorkflowState::Running { .. } => return None,
        })
    }

    fn name(&self) -> &'static str {
        match self {
            WorkflowState::NotStarted => "not_started",
            WorkflowState::Running { .. } => "running",
            WorkflowState::Succeeded => "succeeded",
            WorkflowState::Failed { .. } => "failed",
            WorkflowState::PartiallyCompleted { .. } => "partially_completed",
            WorkflowState::RequiresManual { .. } => "requires_manual",
        }
    }

    fn invalid(&self, to: &'static str) -> FlowError {
        FlowError::InvalidTransition {
            from: self.name().to_string(),
            to,
        }
    }
}
