//! Outcome policy - how a step's outcome affects the run

use action_primitives::{ActionError, StepOutcome};

use crate::types::{DecisionKind, StepPolicy};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepDecision {
    Continue,
    /// Carry on, but the run can at best be partially completed
    ContinueSkipped,
    Halt(String),
    RequireManual(String),
}

impl StepDecision {
    pub fn kind(&self) -> DecisionKind {
        match self {
            StepDecision::Continue => DecisionKind::Continue,
            StepDecision::ContinueSkipped => DecisionKind::Skipped,
            StepDecision::Halt(_) => DecisionKind::Halt,
            StepDecision::RequireManual(_) => DecisionKind::Manual,
        }
    }
}

/// Maps a step's policy and outcome to what the run does next.
///
/// The engine is the only layer that turns outcomes into run failure.
pub trait OutcomePolicy: Send + Sync {
    fn decide(&self, policy: StepPolicy, outcome: &Result<StepOutcome, ActionError>)
        -> StepDecision;
}

/// Default policy
///
/// - performed and already-satisfied steps continue
/// - skips and failures halt mandatory steps and are recorded for optional ones
/// - missing preconditions and remote rejections halt regardless of policy
/// - a pending remote process asks for manual completion
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultOutcomePolicy;

impl OutcomePolicy for DefaultOutcomePolicy {
    fn decide(
        &self,
        policy: StepPolicy,
        outcome: &Result<StepOutcome, ActionError>,
    ) -> StepDecision {
        let reason = match outcome {
            Ok(StepOutcome::Performed) | Ok(StepOutcome::SkippedAlreadySatisfied) => {
                return StepDecision::Continue
            }
            Ok(StepOutcome::SkippedNotFound) => "required control not found".to_string(),
            Ok(StepOutcome::Failed(reason)) => reason.clone(),
            Err(err @ ActionError::PreconditionMissing(_))
            | Err(err @ ActionError::RemoteRejected(_)) => {
                return StepDecision::Halt(err.to_string())
            }
            Err(ActionError::Pending(reason)) => {
                return StepDecision::RequireManual(reason.clone())
            }
            Err(err) => err.to_string(),
        };
        match policy {
            StepPolicy::Mandatory => StepDecision::Halt(reason),
            StepPolicy::Optional => StepDecision::ContinueSkipped,
        }
    }
}
