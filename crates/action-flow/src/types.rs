//! Core types for workflows

use std::path::PathBuf;
use std::time::Duration;

use action_gate::{OutcomeSpec, PollLoop};
use action_locator::TargetDescriptor;
use action_primitives::StepOutcome;
use chrono::{DateTime, Utc};
use pilot_core_types::{StepId, WorkflowId};
use serde::{Deserialize, Serialize};

/// Ordered task definition, e.g. "create closed-test release".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    pub id: WorkflowId,
    pub name: String,
    pub steps: Vec<Step>,
    /// Bound for the whole run
    pub timeout: Duration,
    /// Best-effort screenshot taken when the run fails
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_screenshot: Option<PathBuf>,
}

impl Workflow {
    pub fn new(id: impl Into<WorkflowId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            steps: Vec::new(),
            timeout: Duration::from_secs(240),
            failure_screenshot: None,
        }
    }

    pub fn step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    pub fn steps(mut self, steps: impl IntoIterator<Item = Step>) -> Self {
        self.steps.extend(steps);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_failure_screenshot(mut self, path: impl Into<PathBuf>) -> Self {
        self.failure_screenshot = Some(path.into());
        self
    }

    /// Step ids must be unique so records can be told apart.
    pub fn validate(&self) -> Result<(), crate::FlowError> {
        if self.steps.is_empty() {
            return Err(crate::FlowError::ValidationFailed(format!(
                "workflow {} has no steps",
                self.id
            )));
        }
        let mut seen = std::collections::HashSet::new();
        for step in &self.steps {
            if !seen.insert(step.id.as_str()) {
                return Err(crate::FlowError::ValidationFailed(format!(
                    "duplicate step id {}",
                    step.id
                )));
            }
        }
        Ok(())
    }
}

/// Whether a step that did nothing halts the run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepPolicy {
    Mandatory,
    #[default]
    Optional,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    pub id: StepId,
    pub label: String,
    pub action: StepAction,
    #[serde(default)]
    pub policy: StepPolicy,
    /// Falls back to the runner's default, or the poll budget for polling steps
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<Duration>,
}

impl Step {
    pub fn new(id: impl Into<StepId>, label: impl Into<String>, action: StepAction) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            action,
            policy: StepPolicy::Optional,
            timeout: None,
        }
    }

    pub fn mandatory(mut self) -> Self {
        self.policy = StepPolicy::Mandatory;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn is_mandatory(&self) -> bool {
        self.policy == StepPolicy::Mandatory
    }

    /// Explicit timeout, else enough for every attempt of a poll loop.
    pub fn effective_timeout(&self, default: Duration) -> Duration {
        self.timeout.unwrap_or_else(|| self.action.budget(default))
    }
}

/// What a step does.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum StepAction {
    Navigate { url: String },
    Reload,
    GoBack,
    Click { target: TargetDescriptor },
    Fill { target: TargetDescriptor, value: String },
    Check { target: TargetDescriptor },
    Select { target: TargetDescriptor, option: String },
    WaitForText { target: TargetDescriptor },
    PressKey { key: String },
    Upload { target: TargetDescriptor, path: PathBuf },
    /// Local resource that must exist; fatal when absent
    RequireFile { path: PathBuf },
    /// Ordered alternatives; the first one that is not skipped wins
    FirstOf { alternatives: Vec<StepAction> },
    /// Poll the page for a terminal signal
    Verify { spec: OutcomeSpec, poll: PollLoop },
    /// Poll an asset-links descriptor over plain HTTP
    PollHttp {
        url: String,
        expected_package: String,
        poll: PollLoop,
    },
    /// Hand over to a human for one sub-step
    ManualPause { instructions: String },
    Screenshot { path: PathBuf },
    /// Operator instruction; logged and recorded, never acted on
    Notice { message: String },
}

impl StepAction {
    pub fn kind(&self) -> &'static str {
        match self {
            StepAction::Navigate { .. } => "navigate",
            StepAction::Reload => "reload",
            StepAction::GoBack => "go_back",
            StepAction::Click { .. } => "click",
            StepAction::Fill { .. } => "fill",
            StepAction::Check { .. } => "check",
            StepAction::Select { .. } => "select",
            StepAction::WaitForText { .. } => "wait_for_text",
            StepAction::PressKey { .. } => "press_key",
            StepAction::Upload { .. } => "upload",
            StepAction::RequireFile { .. } => "require_file",
            StepAction::FirstOf { .. } => "first_of",
            StepAction::Verify { .. } => "verify",
            StepAction::PollHttp { .. } => "poll_http",
            StepAction::ManualPause { .. } => "manual_pause",
            StepAction::Screenshot { .. } => "screenshot",
            StepAction::Notice { .. } => "notice",
        }
    }

    fn budget(&self, default: Duration) -> Duration {
        match self {
            StepAction::Verify { poll, .. } | StepAction::PollHttp { poll, .. } => {
                poll.total_wait() + default * poll.max_attempts()
            }
            StepAction::FirstOf { alternatives } => alternatives
                .iter()
                .map(|alt| alt.budget(default))
                .sum::<Duration>()
                .max(default),
            // Pauses are bounded by their checkpoint.
            StepAction::ManualPause { .. } => Duration::MAX,
            _ => default,
        }
    }
}

/// Terminal result of one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum WorkflowResult {
    Succeeded,
    /// Ids of optional steps that were skipped or failed
    PartiallyCompleted { skipped: Vec<String> },
    Failed { step: usize, reason: String },
    /// Remote process still pending or a human has to finish
    RequiresManualCompletion { step: usize, reason: String },
}

impl WorkflowResult {
    /// 0 for everything but `Failed`
    pub fn exit_code(&self) -> i32 {
        match self {
            WorkflowResult::Failed { .. } => 1,
            _ => 0,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            WorkflowResult::Succeeded => "succeeded",
            WorkflowResult::PartiallyCompleted { .. } => "partially_completed",
            WorkflowResult::Failed { .. } => "failed",
            WorkflowResult::RequiresManualCompletion { .. } => "requires_manual_completion",
        }
    }
}

/// How the engine treated a step's outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionKind {
    Continue,
    Skipped,
    Halt,
    Manual,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    pub index: usize,
    pub id: String,
    pub label: String,
    pub action: String,
    pub outcome: StepOutcome,
    pub decision: DecisionKind,
    pub latency_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Everything the operator gets back from one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub workflow_id: String,
    pub workflow: String,
    pub result: WorkflowResult,
    pub steps: Vec<StepRecord>,
    /// Instructions the operator still has to act on
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notices: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub latency_ms: u64,
}

impl RunReport {
    pub fn exit_code(&self) -> i32 {
        self.result.exit_code()
    }

    pub fn record(&self, id: &str) -> Option<&StepRecord> {
        self.steps.iter().find(|r| r.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use action_gate::Signal;
    use action_locator::Role;

    #[test]
    fn exit_codes_only_fail_on_failed() {
        assert_eq!(WorkflowResult::Succeeded.exit_code(), 0);
        assert_eq!(
            WorkflowResult::PartiallyCompleted { skipped: vec!["create".into()] }.exit_code(),
            0
        );
        assert_eq!(
            WorkflowResult::RequiresManualCompletion { step: 3, reason: "pending".into() }
                .exit_code(),
            0
        );
        assert_eq!(
            WorkflowResult::Failed { step: 1, reason: "app not found".into() }.exit_code(),
            1
        );
    }

    #[test]
    fn polling_steps_get_their_whole_budget() {
        let verify = Step::new(
            "verify",
            "Domain verification",
            StepAction::Verify {
                spec: OutcomeSpec::new().success(Signal::text("verified")),
                poll: PollLoop::new(12, Duration::from_secs(5)),
            },
        );
        assert_eq!(
            verify.effective_timeout(Duration::from_secs(15)),
            Duration::from_secs(55 + 180)
        );
        let click = Step::new(
            "save",
            "Save",
            StepAction::Click { target: TargetDescriptor::new(Role::Button, ["Save"]) },
        )
        .with_timeout(Duration::from_secs(3));
        assert_eq!(click.effective_timeout(Duration::from_secs(15)), Duration::from_secs(3));
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let workflow = Workflow::new("wf", "dup")
            .step(Step::new("a", "A", StepAction::Reload))
            .step(Step::new("a", "A again", StepAction::Reload));
        assert!(workflow.validate().is_err());
        assert!(Workflow::new("wf", "empty").validate().is_err());
    }

    #[test]
    fn actions_serialize_with_tag() {
        let action = StepAction::Fill {
            target: TargetDescriptor::new(Role::Textbox, ["Release name|Nome release"]),
            value: "Closed Test Build".into(),
        };
        let json = serde_json::to_value(&action).unwrap();
        assert_eq!(json["action"], "fill");
        assert_eq!(json["value"], "Closed Test Build");
    }
}
