//! Wait-for-text primitive

use crate::{
    errors::ActionError,
    primitives::DefaultActionPrimitives,
    types::{ActionReport, ExecCtx, StepOutcome},
};
use action_locator::TargetDescriptor;
use chrono::Utc;
use std::time::Instant;

/// Execute wait-for-text primitive
///
/// Bounded by the context deadline; expiry is a skip, not a failure.
pub async fn execute_wait_for_text(
    primitives: &DefaultActionPrimitives,
    ctx: &ExecCtx,
    target: &TargetDescriptor,
) -> Result<ActionReport, ActionError> {
    let started_at = Utc::now();
    let start_instant = Instant::now();

    let result = primitives
        .locate_within(ctx, target, ctx.remaining_time())
        .await
        .map(|_| StepOutcome::Performed);

    DefaultActionPrimitives::finish(
        ctx,
        "wait_for_text",
        Some(target),
        started_at,
        start_instant,
        result,
    )
}

#[cfg(test)]
mod tests {
    use crate::primitives::test_support::primitives;
    use crate::{ActionPrimitives, ExecCtx, StepOutcome};
    use action_locator::TargetDescriptor;
    use cdp_adapter::fake::{FakeDom, FakeElement};
    use std::time::{Duration, Instant};

    #[tokio::test]
    async fn waits_past_visibility_timeout_up_to_deadline() {
        let (page, primitives) = primitives(FakeDom::new("https://play.google.com/console"));
        let late = page.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(400)).await;
            late.mutate(|dom| {
                dom.push(FakeElement::text("Ready to roll out"));
            })
            .await;
        });
        let ctx = ExecCtx::with_timeout(Duration::from_secs(3));
        let report = primitives
            .wait_for_text(&ctx, &TargetDescriptor::text(["ready to roll out", "pronta"]))
            .await
            .unwrap();
        assert_eq!(report.outcome, StepOutcome::Performed);
    }

    #[tokio::test]
    async fn expiry_is_skipped() {
        let (_page, primitives) = primitives(FakeDom::new("https://play.google.com/console"));
        let ctx = ExecCtx::with_timeout(Duration::from_millis(300));
        let started = Instant::now();
        let report = primitives
            .wait_for_text(&ctx, &TargetDescriptor::text(["processing complete"]))
            .await
            .unwrap();
        assert_eq!(report.outcome, StepOutcome::SkippedNotFound);
        assert!(started.elapsed() < Duration::from_secs(2));
    }
}
