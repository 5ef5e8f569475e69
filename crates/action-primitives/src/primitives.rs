//! Action primitives implementation
//!
//! Every targeted primitive resolves its target within the visibility timeout
//! first. Absence and timeouts become skipped outcomes; only a lost page session
//! escapes as an error.

mod capture;
mod check;
mod click;
mod fill;
mod keyboard;
mod navigate;
mod select;
mod upload;
mod wait;

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use action_locator::{DefaultElementResolver, ElementHandle, ElementResolver, TargetDescriptor};
use async_trait::async_trait;
use cdp_adapter::Cdp;
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::{
    errors::ActionError,
    types::{ActionReport, ExecCtx, StepOutcome, WaitTier},
    waiting::{DefaultWaitStrategy, WaitStrategy},
};

/// Default bounded wait for a target to become visible.
pub const DEFAULT_VISIBILITY_TIMEOUT: Duration = Duration::from_secs(15);

/// Action primitives trait
#[async_trait]
pub trait ActionPrimitives: Send + Sync {
    async fn navigate(&self, ctx: &ExecCtx, url: &str) -> Result<ActionReport, ActionError>;

    async fn reload(&self, ctx: &ExecCtx) -> Result<ActionReport, ActionError>;

    async fn go_back(&self, ctx: &ExecCtx) -> Result<ActionReport, ActionError>;

    async fn click(
        &self,
        ctx: &ExecCtx,
        target: &TargetDescriptor,
    ) -> Result<ActionReport, ActionError>;

    /// Clear-then-write; a field already holding `value` is left alone.
    async fn fill(
        &self,
        ctx: &ExecCtx,
        target: &TargetDescriptor,
        value: &str,
    ) -> Result<ActionReport, ActionError>;

    async fn check(
        &self,
        ctx: &ExecCtx,
        target: &TargetDescriptor,
    ) -> Result<ActionReport, ActionError>;

    async fn select_option(
        &self,
        ctx: &ExecCtx,
        target: &TargetDescriptor,
        option_pattern: &str,
    ) -> Result<ActionReport, ActionError>;

    /// Waits up to the context deadline, not the visibility timeout.
    async fn wait_for_text(
        &self,
        ctx: &ExecCtx,
        target: &TargetDescriptor,
    ) -> Result<ActionReport, ActionError>;

    async fn press_key(&self, ctx: &ExecCtx, key: &str) -> Result<ActionReport, ActionError>;

    async fn upload(
        &self,
        ctx: &ExecCtx,
        target: &TargetDescriptor,
        path: &Path,
    ) -> Result<ActionReport, ActionError>;

    async fn screenshot(&self, ctx: &ExecCtx, path: &Path) -> Result<ActionReport, ActionError>;

    /// Current value of the target, or its label when it holds none.
    async fn read_value(
        &self,
        ctx: &ExecCtx,
        target: &TargetDescriptor,
    ) -> Result<Option<String>, ActionError>;
}

/// Default implementation of action primitives
pub struct DefaultActionPrimitives {
    cdp: Arc<dyn Cdp>,
    resolver: Arc<dyn ElementResolver>,
    wait_strategy: Arc<dyn WaitStrategy>,
    visibility_timeout: Duration,
}

impl DefaultActionPrimitives {
    pub fn new(cdp: Arc<dyn Cdp>) -> Self {
        Self {
            resolver: Arc::new(DefaultElementResolver::new(cdp.clone())),
            cdp,
            wait_strategy: Arc::new(DefaultWaitStrategy::default()),
            visibility_timeout: DEFAULT_VISIBILITY_TIMEOUT,
        }
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn ElementResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn with_wait_strategy(mut self, wait_strategy: Arc<dyn WaitStrategy>) -> Self {
        self.wait_strategy = wait_strategy;
        self
    }

    pub fn with_visibility_timeout(mut self, timeout: Duration) -> Self {
        self.visibility_timeout = timeout;
        self
    }

    pub fn cdp(&self) -> &Arc<dyn Cdp> {
        &self.cdp
    }

    pub fn resolver(&self) -> &Arc<dyn ElementResolver> {
        &self.resolver
    }

    pub fn visibility_timeout(&self) -> Duration {
        self.visibility_timeout
    }

    pub(crate) fn ensure_live(ctx: &ExecCtx) -> Result<(), ActionError> {
        if ctx.is_cancelled() {
            return Err(ActionError::Interrupted("context cancelled".to_string()));
        }
        if ctx.is_timeout() {
            return Err(ActionError::Timeout("context deadline exceeded".to_string()));
        }
        Ok(())
    }

    /// Resolves `target` within `timeout`, bounded by the context deadline.
    pub(crate) async fn locate_within(
        &self,
        ctx: &ExecCtx,
        target: &TargetDescriptor,
        timeout: Duration,
    ) -> Result<ElementHandle, ActionError> {
        Self::ensure_live(ctx)?;
        let timeout = timeout.min(ctx.remaining_time());
        let resolution = tokio::select! {
            _ = ctx.cancel_token.cancelled() => {
                return Err(ActionError::Interrupted("context cancelled".to_string()));
            }
            resolution = self.resolver.resolve_within(target, timeout) => resolution?,
        };
        resolution.found().ok_or_else(|| {
            ActionError::NotFound(format!(
                "{} not visible within {}ms",
                target,
                timeout.as_millis()
            ))
        })
    }

    pub(crate) async fn locate(
        &self,
        ctx: &ExecCtx,
        target: &TargetDescriptor,
    ) -> Result<ElementHandle, ActionError> {
        self.locate_within(ctx, target, self.visibility_timeout).await
    }

    pub(crate) async fn settle(&self, tier: WaitTier) -> Result<(), ActionError> {
        self.wait_strategy.wait(self.cdp.as_ref(), tier).await
    }

    /// Folds a primitive body's result into a report.
    pub(crate) fn finish(
        ctx: &ExecCtx,
        primitive: &'static str,
        target: Option<&TargetDescriptor>,
        started_at: DateTime<Utc>,
        start_instant: Instant,
        result: Result<StepOutcome, ActionError>,
    ) -> Result<ActionReport, ActionError> {
        let latency_ms = start_instant.elapsed().as_millis() as u64;
        let (outcome, detail) = match result {
            Ok(outcome) => (outcome, None),
            Err(err) if err.is_skippable() => (StepOutcome::SkippedNotFound, Some(err.to_string())),
            Err(ActionError::Interrupted(reason)) => {
                (StepOutcome::Failed("interrupted".to_string()), Some(reason))
            }
            Err(err @ ActionError::CdpIo(_)) => {
                warn!(action_id = %ctx.action_id, primitive, error = %err, "primitive lost the page");
                return Err(err);
            }
            Err(err) => (StepOutcome::Failed(err.to_string()), None),
        };

        let target_label = target.map(ToString::to_string).unwrap_or_default();
        match &outcome {
            StepOutcome::Performed => info!(
                action_id = %ctx.action_id,
                primitive,
                descriptor = %target_label,
                latency_ms,
                "primitive performed"
            ),
            StepOutcome::Failed(reason) => warn!(
                action_id = %ctx.action_id,
                primitive,
                descriptor = %target_label,
                reason = %reason,
                "primitive failed"
            ),
            skipped => debug!(
                action_id = %ctx.action_id,
                primitive,
                descriptor = %target_label,
                outcome = %skipped,
                "primitive skipped"
            ),
        }

        let mut report = ActionReport::new(outcome, started_at, latency_ms);
        if let Some(target) = target {
            report = report.with_target(target);
        }
        if let Some(detail) = detail {
            report = report.with_detail(detail);
        }
        Ok(report)
    }
}

#[async_trait]
impl ActionPrimitives for DefaultActionPrimitives {
    async fn navigate(&self, ctx: &ExecCtx, url: &str) -> Result<ActionReport, ActionError> {
        navigate::execute_navigate(self, ctx, url).await
    }

    async fn reload(&self, ctx: &ExecCtx) -> Result<ActionReport, ActionError> {
        navigate::execute_reload(self, ctx).await
    }

    async fn go_back(&self, ctx: &ExecCtx) -> Result<ActionReport, ActionError> {
        navigate::execute_go_back(self, ctx).await
    }

    async fn click(
        &self,
        ctx: &ExecCtx,
        target: &TargetDescriptor,
    ) -> Result<ActionReport, ActionError> {
        click::execute_click(self, ctx, target).await
    }

    async fn fill(
        &self,
        ctx: &ExecCtx,
        target: &TargetDescriptor,
        value: &str,
    ) -> Result<ActionReport, ActionError> {
        fill::execute_fill(self, ctx, target, value).await
    }

    async fn check(
        &self,
        ctx: &ExecCtx,
        target: &TargetDescriptor,
    ) -> Result<ActionReport, ActionError> {
        check::execute_check(self, ctx, target).await
    }

    async fn select_option(
        &self,
        ctx: &ExecCtx,
        target: &TargetDescriptor,
        option_pattern: &str,
    ) -> Result<ActionReport, ActionError> {
        select::execute_select_option(self, ctx, target, option_pattern).await
    }

    async fn wait_for_text(
        &self,
        ctx: &ExecCtx,
        target: &TargetDescriptor,
    ) -> Result<ActionReport, ActionError> {
        wait::execute_wait_for_text(self, ctx, target).await
    }

    async fn press_key(&self, ctx: &ExecCtx, key: &str) -> Result<ActionReport, ActionError> {
        keyboard::execute_press_key(self, ctx, key).await
    }

    async fn upload(
        &self,
        ctx: &ExecCtx,
        target: &TargetDescriptor,
        path: &Path,
    ) -> Result<ActionReport, ActionError> {
        upload::execute_upload(self, ctx, target, path).await
    }

    async fn screenshot(&self, ctx: &ExecCtx, path: &Path) -> Result<ActionReport, ActionError> {
        capture::execute_screenshot(self, ctx, path).await
    }

    async fn read_value(
        &self,
        ctx: &ExecCtx,
        target: &TargetDescriptor,
    ) -> Result<Option<String>, ActionError> {
        capture::execute_read_value(self, ctx, target).await
    }
}
