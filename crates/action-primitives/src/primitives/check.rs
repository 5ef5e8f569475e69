//! Check primitive - idempotent for checkboxes, switches and radios

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
) -> Result<StepOutcome, ActionError> {
    let handle = primitives.locate(ctx, target).await?;
    if handle.checked == Some(true) {
        return Ok(StepOutcome::SkippedAlreadySatisfied);
    }
    if handle.disabled {
        return Err(ActionError::Timeout(format!("{target} is disabled")));
    }
    primitives.cdp().set_checked(&handle.node, true).await?;
    primitives.settle(WaitTier::DomReady).await?;
    Ok(StepOutcome::Performed)
}

pub async fn execute_check(
    primitives: &DefaultActionPrimitives,
    ctx: &ExecCtx,
    target: &TargetDescriptor,
) -> Result<ActionReport, ActionError> {
    let started_at = Utc::now();
    let start_instant = Instant::now();

    let result = perform(primitives, ctx, target).await;

    DefaultActionPrimitives::finish(ctx, "check", Some(target), started_at, start_instant, result)
}

#[cfg(test)]
mod tests {
    use crate::primitives::test_support::{ctx, primitives};
    use crate::{ActionPrimitives, StepOutcome};
    use action_locator::{Role, TargetDescriptor};
    use cdp_adapter::fake::{FakeDom, FakeElement, FakeEvent};

    #[tokio::test]
    async fn checked_control_is_left_alone() {
        let mut dom = FakeDom::new("https://play.google.com/console");
        dom.push(FakeElement::checkbox("Italy").checked(true));
        let (page, primitives) = primitives(dom);
        let report = primitives
            .check(&ctx(), &TargetDescriptor::new(Role::Checkbox, ["Italy|Italia"]))
            .await
            .unwrap();
        assert_eq!(report.outcome, StepOutcome::SkippedAlreadySatisfied);
        assert_eq!(page.checked_state("Italy").await, Some(true));
        assert!(page.events().await.is_empty());
    }

    #[tokio::test]
    async fn unchecked_radio_gets_selected() {
        let mut dom = FakeDom::new("https://play.google.com/console");
        dom.push(FakeElement::radio("Free"));
        let (page, primitives) = primitives(dom);
        let report = primitives
            .check(
                &ctx(),
                &TargetDescriptor::new(Role::Radio, ["^Free$", "Gratuita"]),
            )
            .await
            .unwrap();
        assert_eq!(report.outcome, StepOutcome::Performed);
        assert_eq!(
            page.events().await,
            vec![FakeEvent::Checked {
                field: "Free".into(),
                checked: true
            }]
        );
    }

    #[tokio::test]
    async fn absent_control_is_skipped() {
        let mut dom = FakeDom::new("https://play.google.com/console");
        dom.push(FakeElement::checkbox("France"));
        let (page, primitives) = primitives(dom);
        let report = primitives
            .check(&ctx(), &TargetDescriptor::new(Role::Checkbox, ["Italy|Italia"]))
            .await
            .unwrap();
        assert_eq!(report.outcome, StepOutcome::SkippedNotFound);
        assert_eq!(page.checked_state("France").await, Some(false));
        assert!(page.events().await.is_empty());
    }
}
