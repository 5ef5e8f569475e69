//! Navigate, reload and back primitives

use crate::{
    errors::ActionError,
    primitives::DefaultActionPrimitives,
    types::{ActionReport, ExecCtx, StepOutcome, WaitTier},
};
use cdp_adapter::{AdapterError, AdapterErrorKind};
use chrono::Utc;
use std::time::Instant;
use tracing::info;

/// Navigation failures are step failures unless the page itself is gone.
fn navigation_outcome(result: Result<(), AdapterError>) -> Result<StepOutcome, ActionError> {
    match result {
        Ok(()) => Ok(StepOutcome::Performed),
        Err(err) if err.kind == AdapterErrorKind::NotAttached => Err(err.into()),
        Err(err) => Ok(StepOutcome::Failed(err.to_string())),
    }
}

async fn perform_navigate(
    primitives: &DefaultActionPrimitives,
    ctx: &ExecCtx,
    url: &str,
) -> Result<StepOutcome, ActionError> {
    if url.is_empty() {
        return Err(ActionError::Internal("URL cannot be empty".to_string()));
    }
    DefaultActionPrimitives::ensure_live(ctx)?;
    let outcome = navigation_outcome(primitives.cdp().navigate(url, ctx.remaining_time()).await)?;
    if outcome == StepOutcome::Performed {
        primitives.settle(WaitTier::Idle).await?;
    }
    Ok(outcome)
}

async fn perform_history(
    primitives: &DefaultActionPrimitives,
    ctx: &ExecCtx,
    back: bool,
) -> Result<StepOutcome, ActionError> {
    DefaultActionPrimitives::ensure_live(ctx)?;
    let cdp = primitives.cdp();
    let result = if back {
        cdp.go_back(ctx.remaining_time()).await
    } else {
        cdp.reload(ctx.remaining_time()).await
    };
    let outcome = navigation_outcome(result)?;
    if outcome == StepOutcome::Performed {
        primitives.settle(WaitTier::Idle).await?;
    }
    Ok(outcome)
}

/// Execute navigate primitive
///
/// Waits for the new document, then applies the Idle settle tier.
pub async fn execute_navigate(
    primitives: &DefaultActionPrimitives,
    ctx: &ExecCtx,
    url: &str,
) -> Result<ActionReport, ActionError> {
    let started_at = Utc::now();
    let start_instant = Instant::now();
    info!(action_id = %ctx.action_id, url = %url, "Executing navigate primitive");

    let result = perform_navigate(primitives, ctx, url)
        .await
        .map_err(|err| match err {
            // A navigation that cannot start in time is a failure, not an absence.
            ActionError::Timeout(reason) => ActionError::Internal(reason),
            other => other,
        });

    let report =
        DefaultActionPrimitives::finish(ctx, "navigate", None, started_at, start_instant, result)?;
    Ok(report.with_target(url))
}

pub async fn execute_reload(
    primitives: &DefaultActionPrimitives,
    ctx: &ExecCtx,
) -> Result<ActionReport, ActionError> {
    let started_at = Utc::now();
    let start_instant = Instant::now();

    let result = perform_history(primitives, ctx, false).await;

    DefaultActionPrimitives::finish(ctx, "reload", None, started_at, start_instant, result)
}

pub async fn execute_go_back(
    primitives: &DefaultActionPrimitives,
    ctx: &ExecCtx,
) -> Result<ActionReport, ActionError> {
    let started_at = Utc::now();
    let start_instant = Instant::now();

    let result = perform_history(primitives, ctx, true).await;

    DefaultActionPrimitives::finish(ctx, "go_back", None, started_at, start_instant, result)
}
