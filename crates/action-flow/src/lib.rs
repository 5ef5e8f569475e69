//! Workflow engine
//!
//! Runs a [`Workflow`] strictly in order against one page. Skipped optional
//! steps never halt a run; a mandatory step that finds nothing to act on, a
//! missing precondition or an explicit remote rejection does. Asynchronous
//! remote state is awaited through bounded poll loops, and an exhausted loop
//! asks for manual completion instead of failing.

pub mod checkpoint;
pub mod errors;
pub mod executor;
pub mod state;
pub mod strategies;
pub mod types;

pub use checkpoint::{CheckpointOutcome, ManualCheckpoint, PromptResume, SkipManual, TimedPause};
pub use errors::FlowError;
pub use executor::{DefaultWorkflowRunner, WorkflowRunner};
pub use state::WorkflowState;
pub use strategies::{DefaultOutcomePolicy, OutcomePolicy, StepDecision};
pub use types::{
    RunReport, Step, StepAction, StepPolicy, StepRecord, Workflow, WorkflowResult,
};
