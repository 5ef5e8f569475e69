//! Workflow runner implementation

use std::sync::Arc;
use std::time::{Duration, Instant};

use action_gate::{OutcomeSpec, OutcomeVerifier, PollLoop, Verdict};
use action_primitives::{ActionError, ActionPrimitives, ActionReport, ExecCtx, StepOutcome};
use async_recursion::async_recursion;
use async_trait::async_trait;
use chrono::Utc;
use endpoint_probe::{assert_asset_links, EndpointProber, ProbeError};
use tracing::{debug, info, warn};

use crate::checkpoint::{CheckpointOutcome, ManualCheckpoint, SkipManual};
use crate::errors::FlowError;
use crate::state::WorkflowState;
use crate::strategies::{DefaultOutcomePolicy, OutcomePolicy, StepDecision};
use crate::types::*;

/// Default per-step bound when a step names none.
pub const DEFAULT_STEP_TIMEOUT: Duration = Duration::from_secs(30);

/// Time kept back from a probe attempt so a hung endpoint ends the attempt
/// before the step deadline does.
const PROBE_MARGIN: Duration = Duration::from_secs(1);

/// Workflow runner trait
#[async_trait]
pub trait WorkflowRunner: Send + Sync {
    /// Runs every step in order under `ctx`.
    ///
    /// Step failures end up in the report; `Err` means the page was lost or
    /// the workflow was malformed.
    async fn run(&self, workflow: &Workflow, ctx: &ExecCtx) -> Result<RunReport, FlowError>;
}

/// What one step produced, before the policy sees it.
struct StepExecution {
    outcome: StepOutcome,
    detail: Option<String>,
}

impl StepExecution {
    fn new(outcome: StepOutcome) -> Self {
        Self {
            outcome,
            detail: None,
        }
    }

    fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

impl From<ActionReport> for StepExecution {
    fn from(report: ActionReport) -> Self {
        Self {
            outcome: report.outcome,
            detail: report.detail,
        }
    }
}

/// Default workflow runner implementation
pub struct DefaultWorkflowRunner {
    primitives: Arc<dyn ActionPrimitives>,
    verifier: Arc<dyn OutcomeVerifier>,
    prober: Arc<dyn EndpointProber>,
    checkpoint: Arc<dyn ManualCheckpoint>,
    policy: Arc<dyn OutcomePolicy>,
    step_timeout: Duration,
}

impl DefaultWorkflowRunner {
    pub fn new(
        primitives: Arc<dyn ActionPrimitives>,
        verifier: Arc<dyn OutcomeVerifier>,
        prober: Arc<dyn EndpointProber>,
    ) -> Self {
        Self {
            primitives,
            verifier,
            prober,
            checkpoint: Arc::new(SkipManual),
            policy: Arc::new(DefaultOutcomePolicy),
            step_timeout: DEFAULT_STEP_TIMEOUT,
        }
    }

    pub fn with_checkpoint(mut self, checkpoint: Arc<dyn ManualCheckpoint>) -> Self {
        self.checkpoint = checkpoint;
        self
    }

    pub fn with_policy(mut self, policy: Arc<dyn OutcomePolicy>) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_step_timeout(mut self, timeout: Duration) -> Self {
        self.step_timeout = timeout;
        self
    }

    /// Executes one action under its step context.
    #[async_recursion]
    async fn execute_action(
        &self,
        ctx: &ExecCtx,
        label: &str,
        action: &StepAction,
    ) -> Result<StepExecution, ActionError> {
        let p = &self.primitives;
        let execution: StepExecution = match action {
            StepAction::Navigate { url } => p.navigate(ctx, url).await?.into(),
            StepAction::Reload => p.reload(ctx).await?.into(),
            StepAction::GoBack => p.go_back(ctx).await?.into(),
            StepAction::Click { target } => p.click(ctx, target).await?.into(),
            StepAction::Fill { target, value } => p.fill(ctx, target, value).await?.into(),
            StepAction::Check { target } => p.check(ctx, target).await?.into(),
            StepAction::Select { target, option } => {
                p.select_option(ctx, target, option).await?.into()
            }
            StepAction::WaitForText { target } => p.wait_for_text(ctx, target).await?.into(),
            StepAction::PressKey { key } => p.press_key(ctx, key).await?.into(),
            StepAction::Upload { target, path } => p.upload(ctx, target, path).await?.into(),
            StepAction::Screenshot { path } => p.screenshot(ctx, path).await?.into(),
            StepAction::RequireFile { path } => {
                if !path.is_file() {
                    return Err(ActionError::PreconditionMissing(format!(
                        "required file not found: {}",
                        path.display()
                    )));
                }
                StepExecution::new(StepOutcome::Performed).with_detail(path.display().to_string())
            }
            StepAction::FirstOf { alternatives } => {
                let mut last = StepExecution::new(StepOutcome::SkippedNotFound)
                    .with_detail("no alternative present");
                for (index, alternative) in alternatives.iter().enumerate() {
                    let execution = self.execute_action(ctx, label, alternative).await?;
                    if execution.outcome != StepOutcome::SkippedNotFound {
                        debug!(step = label, alternative = index, "alternative taken");
                        return Ok(execution);
                    }
                    last = execution;
                }
                last
            }
            StepAction::Verify { spec, poll } => self.verify(ctx, spec, poll).await?,
            StepAction::PollHttp {
                url,
                expected_package,
                poll,
            } => self.poll_http(ctx, url, expected_package, poll).await?,
            StepAction::ManualPause { instructions } => {
                match self.checkpoint.pause(label, instructions).await {
                    Ok(CheckpointOutcome::Resumed) => StepExecution::new(StepOutcome::Performed),
                    Ok(CheckpointOutcome::TimedOut) => {
                        StepExecution::new(StepOutcome::SkippedNotFound)
                            .with_detail("operator did not confirm before the timeout")
                    }
                    Ok(CheckpointOutcome::Skipped) => {
                        StepExecution::new(StepOutcome::SkippedNotFound)
                            .with_detail(format!("manual step left to the operator: {instructions}"))
                    }
                    Err(err) => StepExecution::new(StepOutcome::Failed(err.to_string())),
                }
            }
            StepAction::Notice { message } => {
                warn!(step = label, "{message}");
                StepExecution::new(StepOutcome::Performed).with_detail(message.clone())
            }
        };
        Ok(execution)
    }

    async fn verify(
        &self,
        ctx: &ExecCtx,
        spec: &OutcomeSpec,
        poll: &PollLoop,
    ) -> Result<StepExecution, ActionError> {
        match self.verifier.await_outcome(ctx, spec, poll.fresh()).await? {
            Verdict::Success { attempt, evidence } => Ok(StepExecution::new(StepOutcome::Performed)
                .with_detail(format!("{evidence} (attempt {attempt})"))),
            Verdict::Failure { detail, .. } => Err(ActionError::RemoteRejected(detail)),
            Verdict::Pending { attempts } => Err(ActionError::Pending(format!(
                "no terminal signal after {attempts} attempts; check back later"
            ))),
        }
    }

    async fn poll_http(
        &self,
        ctx: &ExecCtx,
        url: &str,
        expected_package: &str,
        poll: &PollLoop,
    ) -> Result<StepExecution, ActionError> {
        let mut poll = poll.fresh();
        let mut last_problem = String::new();
        while let Some(attempt) = poll.begin_attempt() {
            if ctx.is_cancelled() {
                return Err(ActionError::Interrupted("cancelled while probing".to_string()));
            }
            let attempt_budget = ctx.remaining_time().saturating_sub(PROBE_MARGIN);
            let probed = match tokio::time::timeout(attempt_budget, self.prober.probe(url)).await {
                Ok(probed) => probed,
                Err(_) => Err(ProbeError::Timeout(attempt_budget.as_millis() as u64)),
            };
            match probed {
                Ok(response) => match assert_asset_links(&response, expected_package) {
                    Ok(report) => {
                        info!(url, attempt, package = %report.package, "asset links verified");
                        return Ok(StepExecution::new(StepOutcome::Performed).with_detail(format!(
                            "{} with {} fingerprint(s)",
                            report.package,
                            report.fingerprints.len()
                        )));
                    }
                    Err(err) if err.is_retryable() => last_problem = err.to_string(),
                    Err(err) => return Err(ActionError::RemoteRejected(err.to_string())),
                },
                Err(err) if err.is_retryable() => last_problem = err.to_string(),
                Err(err) => return Err(ActionError::Internal(err.to_string())),
            }
            debug!(url, attempt, problem = %last_problem, "asset links not ready");

            if poll.is_exhausted() || ctx.remaining_time() <= poll.interval() + PROBE_MARGIN {
                break;
            }
            tokio::select! {
                _ = ctx.cancel_token.cancelled() => {
                    return Err(ActionError::Interrupted("cancelled while probing".to_string()));
                }
                _ = tokio::time::sleep(poll.interval()) => {}
            }
        }
        Err(ActionError::Pending(format!(
            "{url} not serving a valid descriptor after {} attempt(s): {last_problem}",
            poll.attempts_made()
        )))
    }

    async fn capture_failure(&self, workflow: &Workflow, ctx: &ExecCtx) {
        let Some(path) = &workflow.failure_screenshot else {
            return;
        };
        let shot_ctx = ctx.scoped(Duration::from_secs(10));
        match self.primitives.screenshot(&shot_ctx, path).await {
            Ok(report) if report.outcome == StepOutcome::Performed => {
                info!(path = %path.display(), "failure screenshot saved");
            }
            Ok(report) => warn!(outcome = %report.outcome, "failure screenshot not taken"),
            Err(err) => warn!(error = %err, "failure screenshot not taken"),
        }
    }
}

#[async_trait]
impl WorkflowRunner for DefaultWorkflowRunner {
    async fn run(&self, workflow: &Workflow, ctx: &ExecCtx) -> Result<RunReport, FlowError> {
        workflow.validate()?;
        let started_at = Utc::now();
        let run_started = Instant::now();
        let run_ctx = ctx.scoped(workflow.timeout);
        info!(
            workflow = %workflow.name,
            steps = workflow.steps.len(),
            timeout_secs = workflow.timeout.as_secs(),
            "workflow started"
        );

        let mut state = WorkflowState::default();
        let mut records = Vec::with_capacity(workflow.steps.len());
        let mut skipped = Vec::new();
        let mut notices = Vec::new();
        state.start()?;

        for (index, step) in workflow.steps.iter().enumerate() {
            if index > 0 {
                state.advance()?;
            }
            if run_ctx.is_cancelled() {
                state.fail(format!("{}: interrupted", step.label))?;
                break;
            }
            if run_ctx.is_timeout() {
                state.fail(format!(
                    "{}: workflow timed out after {}s",
                    step.label,
                    workflow.timeout.as_secs()
                ))?;
                break;
            }

            let step_timeout = step
                .effective_timeout(self.step_timeout)
                .min(run_ctx.remaining_time());
            let step_ctx = run_ctx.scoped(step_timeout);
            let step_started = Instant::now();
            debug!(step = %step.id, index, action = step.action.kind(), "step started");

            let result = match tokio::time::timeout(
                step_timeout,
                self.execute_action(&step_ctx, &step.label, &step.action),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(ActionError::Timeout(format!(
                    "step exceeded {}ms",
                    step_timeout.as_millis()
                ))),
            };

            if let Err(ActionError::CdpIo(reason)) = &result {
                warn!(step = %step.id, reason = %reason, "page lost");
                return Err(FlowError::PageLost {
                    step: step.id.to_string(),
                    reason: reason.clone(),
                });
            }

            let (outcome, detail) = match &result {
                Ok(execution) => (Ok(execution.outcome.clone()), execution.detail.clone()),
                Err(err) => (Err(err.clone()), Some(err.to_string())),
            };
            let decision = self.policy.decide(step.policy, &outcome);
            let recorded = match outcome {
                Ok(outcome) => outcome,
                Err(ActionError::Pending(_)) => StepOutcome::SkippedNotFound,
                Err(err) if err.is_skippable() => StepOutcome::SkippedNotFound,
                Err(err) => StepOutcome::Failed(err.to_string()),
            };

            if let (StepAction::Notice { message }, StepOutcome::Performed) = (&step.action, &recorded)
            {
                notices.push(message.clone());
            }
            if matches!(step.action, StepAction::ManualPause { .. })
                && recorded == StepOutcome::SkippedNotFound
            {
                if let Some(detail) = &detail {
                    notices.push(detail.clone());
                }
            }

            let latency_ms = step_started.elapsed().as_millis() as u64;
            info!(
                step = %step.id,
                index,
                outcome = %recorded,
                decision = ?decision.kind(),
                latency_ms,
                "step finished"
            );
            records.push(StepRecord {
                index,
                id: step.id.to_string(),
                label: step.label.clone(),
                action: step.action.kind().to_string(),
                outcome: recorded,
                decision: decision.kind(),
                latency_ms,
                detail,
            });

            match decision {
                StepDecision::Continue => {}
                StepDecision::ContinueSkipped => skipped.push(step.id.to_string()),
                StepDecision::Halt(reason) => {
                    state.fail(format!("{}: {}", step.label, reason))?;
                    break;
                }
                StepDecision::RequireManual(reason) => {
                    warn!(step = %step.id, "{reason}");
                    state.require_manual(format!("{}: {}", step.label, reason))?;
                    break;
                }
            }
        }

        if !state.is_terminal() {
            state.finish(skipped)?;
        }
        let result = state.result().ok_or_else(|| FlowError::InvalidTransition {
            from: "running".to_string(),
            to: "report",
        })?;

        if let WorkflowResult::Failed { step, reason } = &result {
            warn!(workflow = %workflow.name, step, reason = %reason, "workflow failed");
            self.capture_failure(workflow, ctx).await;
        } else {
            info!(workflow = %workflow.name, result = result.label(), "workflow finished");
        }

        Ok(RunReport {
            workflow_id: workflow.id.to_string(),
            workflow: workflow.name.clone(),
            result,
            steps: records,
            notices,
            started_at,
            finished_at: Utc::now(),
            latency_ms: run_started.elapsed().as_millis() as u64,
        })
    }
}
