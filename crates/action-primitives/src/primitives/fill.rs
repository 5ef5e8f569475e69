//! Fill primitive - clear-then-write, idempotent

use crate::{
    errors::ActionError,
    primitives::DefaultActionPrimitives,
    types::{ActionReport, ExecCtx, StepOutcome, WaitTier},
};
use action_locator::TargetDescriptor;
use chrono::Utc;
use std::time::Instant;

async fn perform(
    primitives: &DefaultActionPrimitives,
    ctx: &ExecCtx,
    target: &TargetDescriptor,
    value: &str,
) -> Result<StepOutcome, ActionError> {
    let handle = primitives.locate(ctx, target).await?;
    if handle.value.as_deref() == Some(value) {
        return Ok(StepOutcome::SkippedAlreadySatisfied);
    }
    primitives.cdp().fill(&handle.node, value).await?;
    primitives.settle(WaitTier::None).await?;
    Ok(StepOutcome::Performed)
}

pub async fn execute_fill(
    primitives: &DefaultActionPrimitives,
    ctx: &ExecCtx,
    target: &TargetDescriptor,
    value: &str,
) -> Result<ActionReport, ActionError> {
    let started_at = Utc::now();
    let start_instant = Instant::now();

    let result = perform(primitives, ctx, target, value).await;

    DefaultActionPrimitives::finish(ctx, "fill", Some(target), started_at, start_instant, result)
}

#[cfg(test)]
mod tests {
    use crate::primitives::test_support::{ctx, primitives};
    use crate::{ActionPrimitives, StepOutcome};
    use action_locator::{Role, TargetDescriptor};
    use cdp_adapter::fake::{FakeDom, FakeElement};

    #[tokio::test]
    async fn filling_twice_converges_on_the_value() {
        let mut dom = FakeDom::new("https://play.google.com/console");
        dom.push(FakeElement::textbox("Release name").with_value("Old build"));
        let (page, primitives) = primitives(dom);
        let target = TargetDescriptor::new(Role::Textbox, ["Release name", "Nome release"]);

        let first = primitives.fill(&ctx(), &target, "Closed Test Build").await.unwrap();
        assert_eq!(first.outcome, StepOutcome::Performed);
        let second = primitives.fill(&ctx(), &target, "Closed Test Build").await.unwrap();
        assert_eq!(second.outcome, StepOutcome::SkippedAlreadySatisfied);
        assert_eq!(
            page.value_of("Release name").await.as_deref(),
            Some("Closed Test Build")
        );
    }

    #[tokio::test]
    async fn non_editable_target_fails() {
        let mut dom = FakeDom::new("https://play.google.com/console");
        dom.push(FakeElement::select("Category", &["News & Magazines"]));
        let (_page, primitives) = primitives(dom);
        let report = primitives
            .fill(
                &ctx(),
                &TargetDescriptor::new(Role::Combobox, ["Category"]),
                "News",
            )
            .await
            .unwrap();
        assert!(report.outcome.is_failure());
    }

    #[tokio::test]
    async fn absent_field_is_skipped() {
        let mut dom = FakeDom::new("https://play.google.com/console");
        dom.push(FakeElement::textbox("Short description"));
        let (page, primitives) = primitives(dom);
        let report = primitives
            .fill(
                &ctx(),
                &TargetDescriptor::new(Role::Textbox, ["Release name"]),
                "Closed Test Build",
            )
            .await
            .unwrap();
        assert_eq!(report.outcome, StepOutcome::SkippedNotFound);
        assert_eq!(page.value_of("Short description").await.as_deref(), Some(""));
    }
}
