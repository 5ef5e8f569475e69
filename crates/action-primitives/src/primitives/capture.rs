//! Screenshot and read-value primitives

use crate::{
    errors::ActionError,
    primitives::DefaultActionPrimitives,
    types::{ActionReport, ExecCtx, StepOutcome},
};
use action_locator::TargetDescriptor;
use chrono::Utc;
use std::path::Path;
use std::time::Instant;
use tracing::info;

async fn perform_screenshot(
    primitives: &DefaultActionPrimitives,
    ctx: &ExecCtx,
    path: &Path,
) -> Result<StepOutcome, ActionError> {
    DefaultActionPrimitives::ensure_live(ctx)?;
    let png = primitives.cdp().screenshot().await?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|err| ActionError::Internal(format!("{}: {err}", parent.display())))?;
    }
    tokio::fs::write(path, &png)
        .await
        .map_err(|err| ActionError::Internal(format!("{}: {err}", path.display())))?;
    info!(action_id = %ctx.action_id, path = %path.display(), bytes = png.len(), "screenshot saved");
    Ok(StepOutcome::Performed)
}

pub async fn execute_screenshot(
    primitives: &DefaultActionPrimitives,
    ctx: &ExecCtx,
    path: &Path,
) -> Result<ActionReport, ActionError> {
    let started_at = Utc::now();
    let start_instant = Instant::now();
    let result = perform_screenshot(primitives, ctx, path).await;
    let report =
        DefaultActionPrimitives::finish(ctx, "screenshot", None, started_at, start_instant, result)?;
    Ok(report.with_detail(path.display().to_string()))
}

/// Reads a value without acting; absence is `None`.
pub async fn execute_read_value(
    primitives: &DefaultActionPrimitives,
    ctx: &ExecCtx,
    target: &TargetDescriptor,
) -> Result<Option<String>, ActionError> {
    match primitives.locate(ctx, target).await {
        Ok(handle) => Ok(Some(
            handle
                .value
                .clone()
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| handle.label().to_string()),
        )),
        Err(err) if err.is_skippable() => Ok(None),
        Err(err) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use crate::primitives::test_support::{ctx, primitives};
    use crate::{ActionPrimitives, StepOutcome};
    use action_locator::{Role, TargetDescriptor};
    use cdp_adapter::fake::{FakeDom, FakeElement};

    #[tokio::test]
    async fn screenshot_creates_artifact_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results").join("app-links-final.png");
        let (_page, primitives) = primitives(FakeDom::new("https://play.google.com/console"));
        let report = primitives.screenshot(&ctx(), &path).await.unwrap();
        assert_eq!(report.outcome, StepOutcome::Performed);
        assert!(std::fs::read(&path).unwrap().starts_with(&[0x89, b'P']));
    }

    #[tokio::test]
    async fn read_value_falls_back_to_label() {
        let mut dom = FakeDom::new("https://play.google.com/console");
        dom.push(FakeElement::row("androidnews.app Verified"));
        let (_page, primitives) = primitives(dom);
        let row = TargetDescriptor::new(Role::Row, ["androidnews\\.app"]);
        assert_eq!(
            primitives.read_value(&ctx(), &row).await.unwrap().as_deref(),
            Some("androidnews.app Verified")
        );
        let missing = TargetDescriptor::new(Role::Row, ["other\\.app"]);
        assert_eq!(primitives.read_value(&ctx(), &missing).await.unwrap(), None);
    }
}
