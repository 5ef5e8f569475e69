//! Click primitive

use crate::{
    errors::ActionError,
    primitives::DefaultActionPrimitives,
    types::{ActionReport, ExecCtx, StepOutcome, WaitTier},
};
use action_locator::{ElementHandle, TargetDescriptor};
use chrono::Utc;
use std::time::{Duration, Instant};
use tracing::debug;

/// Resolves `target` and waits, within the visibility timeout, for it to be enabled.
pub(crate) async fn locate_enabled(
    primitives: &DefaultActionPrimitives,
    ctx: &ExecCtx,
    target: &TargetDescriptor,
) -> Result<ElementHandle, ActionError> {
    let enable_deadline = Instant::now() + primitives.visibility_timeout();
    let mut handle = primitives.locate(ctx, target).await?;
    while handle.disabled {
        if Instant::now() >= enable_deadline || ctx.is_timeout() {
            return Err(ActionError::Timeout(format!("{target} stayed disabled")));
        }
        debug!(action_id = %ctx.action_id, descriptor = %target, "target disabled, waiting");
        tokio::time::sleep(Duration::from_millis(100)).await;
        handle = primitives.locate(ctx, target).await?;
    }
    Ok(handle)
}

/// Clicks the resolved node, re-resolving once if it went stale in between.
pub(crate) async fn click_handle(
    primitives: &DefaultActionPrimitives,
    ctx: &ExecCtx,
    target: &TargetDescriptor,
    handle: ElementHandle,
) -> Result<(), ActionError> {
    match primitives.cdp().click(&handle.node).await {
        Ok(()) => Ok(()),
        Err(err) if err.is_not_found() => {
            debug!(action_id = %ctx.action_id, descriptor = %target, "stale node, resolving again");
            let fresh = locate_enabled(primitives, ctx, target).await?;
            primitives.cdp().click(&fresh.node).await.map_err(Into::into)
        }
        Err(err) => Err(err.into()),
    }
}

async fn perform(
    primitives: &DefaultActionPrimitives,
    ctx: &ExecCtx,
    target: &TargetDescriptor,
) -> Result<StepOutcome, ActionError> {
    let handle = locate_enabled(primitives, ctx, target).await?;
    click_handle(primitives, ctx, target, handle).await?;
    primitives.settle(WaitTier::DomReady).await?;
    Ok(StepOutcome::Performed)
}

/// Execute click primitive
///
/// Resolve, wait for enablement, click at the element centre, settle.
pub async fn execute_click(
    primitives: &DefaultActionPrimitives,
    ctx: &ExecCtx,
    target: &TargetDescriptor,
) -> Result<ActionReport, ActionError> {
    let started_at = Utc::now();
    let start_instant = Instant::now();

    let result = perform(primitives, ctx, target).await;

    DefaultActionPrimitives::finish(ctx, "click", Some(target), started_at, start_instant, result)
}

#[cfg(test)]
mod tests {
    use crate::primitives::test_support::{ctx, primitives};
    use crate::{ActionPrimitives, StepOutcome};
    use action_locator::{Role, TargetDescriptor};
    use cdp_adapter::fake::{FakeDom, FakeElement};

    #[tokio::test]
    async fn absent_target_is_skipped_not_found() {
        let (page, primitives) = primitives(FakeDom::new("https://play.google.com/console"));
        let report = primitives
            .click(&ctx(), &TargetDescriptor::new(Role::Button, ["Create new release"]))
            .await
            .unwrap();
        assert_eq!(report.outcome, StepOutcome::SkippedNotFound);
        assert!(report.detail.unwrap().contains("not visible"));
        assert!(page.events().await.is_empty());
    }

    #[tokio::test]
    async fn click_uses_first_locale_match() {
        let mut dom = FakeDom::new("https://play.google.com/console");
        dom.push(FakeElement::button("Crea nuova release"));
        let (page, primitives) = primitives(dom);
        let report = primitives
            .click(
                &ctx(),
                &TargetDescriptor::new(Role::Button, ["Create new release", "Crea nuova release"]),
            )
            .await
            .unwrap();
        assert_eq!(report.outcome, StepOutcome::Performed);
        assert!(page.clicked("Crea nuova release").await);
    }

    #[tokio::test]
    async fn permanently_disabled_target_is_skipped() {
        let mut dom = FakeDom::new("https://play.google.com/console");
        dom.push(FakeElement::button("Save").disabled());
        let (page, primitives) = primitives(dom);
        let report = primitives
            .click(&ctx(), &TargetDescriptor::new(Role::Button, ["Save"]))
            .await
            .unwrap();
        assert_eq!(report.outcome, StepOutcome::SkippedNotFound);
        assert!(!page.clicked("Save").await);
    }

    #[tokio::test]
    async fn cancelled_context_fails_as_interrupted() {
        let mut dom = FakeDom::new("https://play.google.com/console");
        dom.push(FakeElement::button("Save"));
        let (_page, primitives) = primitives(dom);
        let ctx = ctx();
        ctx.cancel_token.cancel();
        let report = primitives
            .click(&ctx, &TargetDescriptor::new(Role::Button, ["Save"]))
            .await
            .unwrap();
        assert_eq!(report.outcome, StepOutcome::Failed("interrupted".into()));
    }
}
