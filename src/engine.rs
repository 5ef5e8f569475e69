//! Wires the automation layers over one page.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use action_flow::{
    DefaultWorkflowRunner, FlowError, ManualCheckpoint, RunReport, SkipManual, TimedPause,
    Workflow, WorkflowRunner,
};
use action_gate::DefaultOutcomeVerifier;
use action_primitives::{ActionPrimitives, DefaultActionPrimitives, ExecCtx};
use async_trait::async_trait;
use cdp_adapter::{
    AdapterError, AdapterErrorKind, Cdp, Cookie, DomSnapshot, NodeRef, OriginStorage,
};
use endpoint_probe::{EndpointProber, HttpProber};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::Settings;
use crate::errors::PilotError;

/// Extra time past the workflow timeout for the failure screenshot.
const REPORT_GRACE: Duration = Duration::from_secs(15);

/// Primitives, verifier, prober and runner bound to one page.
pub struct Engine {
    primitives: Arc<dyn ActionPrimitives>,
    runner: DefaultWorkflowRunner,
    cancel: CancellationToken,
}

impl Engine {
    /// Production wiring: settled primitives with the configured visibility
    /// timeout and an HTTP prober.
    pub fn new(
        cdp: Arc<dyn Cdp>,
        settings: &Settings,
        checkpoint: Arc<dyn ManualCheckpoint>,
    ) -> Result<Self, PilotError> {
        let primitives =
            DefaultActionPrimitives::new(Arc::clone(&cdp)).with_visibility_timeout(settings.step_timeout());
        Ok(Self::with_parts(
            cdp,
            primitives,
            Arc::new(HttpProber::new()?),
            checkpoint,
        ))
    }

    pub fn with_parts(
        cdp: Arc<dyn Cdp>,
        primitives: DefaultActionPrimitives,
        prober: Arc<dyn EndpointProber>,
        checkpoint: Arc<dyn ManualCheckpoint>,
    ) -> Self {
        let primitives: Arc<dyn ActionPrimitives> = Arc::new(primitives);
        let runner = DefaultWorkflowRunner::new(
            Arc::clone(&primitives),
            Arc::new(DefaultOutcomeVerifier::new(cdp)),
            prober,
        )
        .with_checkpoint(checkpoint);
        Self {
            primitives,
            runner,
            cancel: CancellationToken::new(),
        }
    }

    /// Runs stop at the next step boundary once `cancel` fires.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn primitives(&self) -> &Arc<dyn ActionPrimitives> {
        &self.primitives
    }

    /// Context for a one-off primitive call outside a workflow.
    pub fn context(&self, timeout: Duration) -> ExecCtx {
        ExecCtx::new(Instant::now() + timeout, self.cancel.child_token())
    }

    pub async fn run(&self, workflow: &Workflow) -> Result<RunReport, FlowError> {
        let ctx = self.context(workflow.timeout + REPORT_GRACE);
        let report = self.runner.run(workflow, &ctx).await?;
        info!(
            workflow = %report.workflow,
            result = report.result.label(),
            steps = report.steps.len(),
            latency_ms = report.latency_ms,
            "run finished"
        );
        Ok(report)
    }
}

/// Checkpoint for manual steps: wait a fixed time in `WAIT_MANUAL` mode,
/// skip otherwise.
pub fn default_checkpoint(settings: &Settings) -> Arc<dyn ManualCheckpoint> {
    if settings.wait_manual {
        Arc::new(TimedPause::default())
    } else {
        Arc::new(SkipManual)
    }
}

/// Page stand-in for runs that only talk HTTP; every page call fails with
/// `NotAttached`.
pub struct Detached;

fn detached<T>() -> Result<T, AdapterError> {
    Err(AdapterError::new(AdapterErrorKind::NotAttached).with_hint("no browser in this run"))
}

#[async_trait]
impl Cdp for Detached {
    async fn navigate(&self, _url: &str, _deadline: Duration) -> Result<(), AdapterError> {
        detached()
    }
    async fn reload(&self, _deadline: Duration) -> Result<(), AdapterError> {
        detached()
    }
    async fn go_back(&self, _deadline: Duration) -> Result<(), AdapterError> {
        detached()
    }
    async fn current_url(&self) -> Result<String, AdapterError> {
        detached()
    }
    async fn ready_state(&self) -> Result<String, AdapterError> {
        detached()
    }
    async fn snapshot(&self) -> Result<DomSnapshot, AdapterError> {
        detached()
    }
    async fn click(&self, _node: &NodeRef) -> Result<(), AdapterError> {
        detached()
    }
    async fn fill(&self, _node: &NodeRef, _text: &str) -> Result<(), AdapterError> {
        detached()
    }
    async fn set_checked(&self, _node: &NodeRef, _checked: bool) -> Result<(), AdapterError> {
        detached()
    }
    async fn select_native(&self, _node: &NodeRef, _label: &str) -> Result<bool, AdapterError> {
        detached()
    }
    async fn press_key(&self, _key: &str) -> Result<(), AdapterError> {
        detached()
    }
    async fn set_input_files(
        &self,
        _node: &NodeRef,
        _files: &[PathBuf],
    ) -> Result<(), AdapterError> {
        detached()
    }
    async fn screenshot(&self) -> Result<Vec<u8>, AdapterError> {
        detached()
    }
    async fn cookies(&self) -> Result<Vec<Cookie>, AdapterError> {
        detached()
    }
    async fn set_cookies(&self, _cookies: &[Cookie]) -> Result<(), AdapterError> {
        detached()
    }
    async fn local_storage(&self) -> Result<Option<OriginStorage>, AdapterError> {
        detached()
    }
    async fn set_local_storage(&self, _storage: &OriginStorage) -> Result<(), AdapterError> {
        detached()
    }
}
