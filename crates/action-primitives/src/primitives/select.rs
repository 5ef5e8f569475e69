//! Select-option primitive for native selects and custom comboboxes

use crate::{
    errors::ActionError,
    primitives::{click::click_handle, DefaultActionPrimitives},
    types::{ActionReport, ExecCtx, StepOutcome, WaitTier},
};
use action_locator::{LabelMatcher, Role, TargetDescriptor};
use chrono::Utc;
use std::time::Instant;
use tracing::debug;

async fn perform(
    primitives: &DefaultActionPrimitives,
    ctx: &ExecCtx,
    target: &TargetDescriptor,
    option_pattern: &str,
) -> Result<StepOutcome, ActionError> {
    let matcher = LabelMatcher::compile(&[option_pattern.to_string()])?;
    let handle = primitives.locate(ctx, target).await?;

    let current = handle.value.as_deref().unwrap_or_default();
    if !current.is_empty() && matcher.is_match(current) {
        return Ok(StepOutcome::SkippedAlreadySatisfied);
    }

    if handle.is_native_select() {
        let selected = primitives
            .cdp()
            .select_native(&handle.node, option_pattern)
            .await?;
        if !selected {
            return Err(ActionError::NotFound(format!(
                "no option matching /{option_pattern}/ in {target}"
            )));
        }
        primitives.settle(WaitTier::DomReady).await?;
        return Ok(StepOutcome::Performed);
    }

    click_handle(primitives, ctx, target, handle).await?;
    primitives.settle(WaitTier::DomReady).await?;

    let option = TargetDescriptor::new(Role::Option, [option_pattern]);
    match primitives.locate(ctx, &option).await {
        Ok(choice) => {
            click_handle(primitives, ctx, &option, choice).await?;
            primitives.settle(WaitTier::DomReady).await?;
            Ok(StepOutcome::Performed)
        }
        Err(err) if err.is_skippable() => {
            debug!(action_id = %ctx.action_id, pattern = option_pattern, "option absent, closing list");
            primitives.cdp().press_key("Escape").await?;
            Err(err)
        }
        Err(err) => Err(err),
    }
}

/// Execute select-option primitive
///
/// Already-selected values are reported as satisfied without opening the list.
pub async fn execute_select_option(
    primitives: &DefaultActionPrimitives,
    ctx: &ExecCtx,
    target: &TargetDescriptor,
    option_pattern: &str,
) -> Result<ActionReport, ActionError> {
    let started_at = Utc::now();
    let start_instant = Instant::now();
    let result = perform(primitives, ctx, target, option_pattern).await;
    let report = DefaultActionPrimitives::finish(
        ctx,
        "select_option",
        Some(target),
        started_at,
        start_instant,
        result,
    )?;
    Ok(match report.detail {
        Some(_) => report,
        None => report.with_detail(format!("option /{option_pattern}/")),
    })
}

#[cfg(test)]
mod tests {
    use crate::primitives::test_support::{ctx, primitives};
    use crate::{ActionPrimitives, StepOutcome};
    use action_locator::{Role, TargetDescriptor};
    use cdp_adapter::fake::{FakeDom, FakeElement, FakeEvent};

    fn category() -> TargetDescriptor {
        TargetDescriptor::new(Role::Combobox, ["App category", "Categoria"])
    }

    #[tokio::test]
    async fn native_select_picks_matching_label() {
        let mut dom = FakeDom::new("https://play.google.com/console");
        dom.push(FakeElement::select("App category", &["Books", "News & Magazines"]));
        let (page, primitives) = primitives(dom);
        let report = primitives
            .select_option(&ctx(), &category(), "news")
            .await
            .unwrap();
        assert_eq!(report.outcome, StepOutcome::Performed);
        assert_eq!(
            page.value_of("App category").await.as_deref(),
            Some("News & Magazines")
        );
    }

    #[tokio::test]
    async fn custom_combobox_opens_and_clicks_option() {
        let mut dom = FakeDom::new("https://play.google.com/console");
        let combo = dom.push(FakeElement::combobox("Categoria"));
        dom.on_click(combo, move |dom| {
            let list = dom.push(FakeElement::new("div"));
            if let Some(el) = dom.get_mut(list) {
                el.role = Some("listbox".into());
            }
            let option = dom.push(FakeElement::option("Notizie e riviste").child_of(list));
            dom.on_click(option, move |dom| {
                if let Some(el) = dom.get_mut(combo) {
                    el.value = Some("Notizie e riviste".into());
                }
                dom.remove(list);
            });
        });
        let (page, primitives) = primitives(dom);

        let report = primitives
            .select_option(&ctx(), &category(), "News|Notizie")
            .await
            .unwrap();
        assert_eq!(report.outcome, StepOutcome::Performed);
        assert!(page.clicked("Notizie e riviste").await);

        let again = primitives
            .select_option(&ctx(), &category(), "News|Notizie")
            .await
            .unwrap();
        assert_eq!(again.outcome, StepOutcome::SkippedAlreadySatisfied);
    }

    #[tokio::test]
    async fn missing_option_closes_list_and_skips() {
        let mut dom = FakeDom::new("https://play.google.com/console");
        dom.push(FakeElement::combobox("Categoria"));
        let (page, primitives) = primitives(dom);
        let report = primitives
            .select_option(&ctx(), &category(), "Weather")
            .await
            .unwrap();
        assert_eq!(report.outcome, StepOutcome::SkippedNotFound);
        assert!(page.events().await.contains(&FakeEvent::Key("Escape".into())));
    }

    #[tokio::test]
    async fn absent_combobox_is_skipped() {
        let mut dom = FakeDom::new("https://play.google.com/console");
        dom.push(FakeElement::button("Save"));
        let (page, primitives) = primitives(dom);
        let report = primitives
            .select_option(&ctx(), &category(), "news")
            .await
            .unwrap();
        assert_eq!(report.outcome, StepOutcome::SkippedNotFound);
        assert!(page.events().await.is_empty());
    }
}
