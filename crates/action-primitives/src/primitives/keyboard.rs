//! Key press primitive

use crate::{
    errors::ActionError,
    primitives::DefaultActionPrimitives,
    types::{ActionReport, ExecCtx, StepOutcome, WaitTier},
};
use chrono::Utc;
use std::time::Instant;

async fn perform(
    primitives: &DefaultActionPrimitives,
    ctx: &ExecCtx,
    key: &str,
) -> Result<StepOutcome, ActionError> {
    DefaultActionPrimitives::ensure_live(ctx)?;
    primitives.cdp().press_key(key).await?;
    primitives.settle(WaitTier::DomReady).await?;
    Ok(StepOutcome::Performed)
}

pub async fn execute_press_key(
    primitives: &DefaultActionPrimitives,
    ctx: &ExecCtx,
    key: &str,
) -> Result<ActionReport, ActionError> {
    let started_at = Utc::now();
    let start_instant = Instant::now();
    let result = perform(primitives, ctx, key).await;
    let report =
        DefaultActionPrimitives::finish(ctx, "press_key", None, started_at, start_instant, result)?;
    Ok(report.with_target(key))
}
