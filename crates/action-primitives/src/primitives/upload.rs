//! Upload primitive - hands local files to a file input

use crate::{
    errors::ActionError,
    primitives::DefaultActionPrimitives,
    types::{ActionReport, ExecCtx, StepOutcome, WaitTier},
};
use action_locator::TargetDescriptor;
use chrono::Utc;
use std::path::Path;
use std::time::Instant;

async fn perform(
    primitives: &DefaultActionPrimitives,
    ctx: &ExecCtx,
    target: &TargetDescriptor,
    path: &Path,
) -> Result<StepOutcome, ActionError> {
    if !path.is_file() {
        return Err(ActionError::PreconditionMissing(format!(
            "file not found: {}",
            path.display()
        )));
    }
    let handle = primitives.locate(ctx, target).await?;
    primitives
        .cdp()
        .set_input_files(&handle.node, &[path.to_path_buf()])
        .await?;
    primitives.settle(WaitTier::Idle).await?;
    Ok(StepOutcome::Performed)
}

pub async fn execute_upload(
    primitives: &DefaultActionPrimitives,
    ctx: &ExecCtx,
    target: &TargetDescriptor,
    path: &Path,
) -> Result<ActionReport, ActionError> {
    let started_at = Utc::now();
    let start_instant = Instant::now();
    let result = perform(primitives, ctx, target, path).await;
    DefaultActionPrimitives::finish(ctx, "upload", Some(target), started_at, start_instant, result)
}

#[cfg(test)]
mod tests {
    use crate::primitives::test_support::{ctx, primitives};
    use crate::{ActionPrimitives, StepOutcome};
    use action_locator::{Role, TargetDescriptor};
    use cdp_adapter::fake::{FakeDom, FakeElement, FakeEvent};

    fn file_input() -> TargetDescriptor {
        TargetDescriptor::new(Role::FileInput, Vec::<String>::new())
    }

    #[tokio::test]
    async fn missing_local_file_fails() {
        let mut dom = FakeDom::new("https://play.google.com/console");
        dom.push(FakeElement::file_input("Upload"));
        let (_page, primitives) = primitives(dom);
        let report = primitives
            .upload(&ctx(), &file_input(), std::path::Path::new("/no/such/app.aab"))
            .await
            .unwrap();
        assert!(matches!(report.outcome, StepOutcome::Failed(ref r) if r.contains("Precondition")));
    }

    #[tokio::test]
    async fn hidden_file_input_receives_the_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let aab = dir.path().join("app-release.aab");
        std::fs::write(&aab, b"PK").unwrap();
        let mut dom = FakeDom::new("https://play.google.com/console");
        dom.push(FakeElement::file_input("Upload"));
        let (page, primitives) = primitives(dom);
        let report = primitives.upload(&ctx(), &file_input(), &aab).await.unwrap();
        assert_eq!(report.outcome, StepOutcome::Performed);
        assert!(matches!(
            &page.events().await[0],
            FakeEvent::Uploaded { files, .. } if files == &vec![aab.clone()]
        ));
    }

    #[tokio::test]
    async fn absent_upload_widget_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let aab = dir.path().join("app-release.aab");
        std::fs::write(&aab, b"PK").unwrap();
        let mut dom = FakeDom::new("https://play.google.com/console");
        dom.push(FakeElement::button("Review release"));
        let (page, primitives) = primitives(dom);
        let report = primitives.upload(&ctx(), &file_input(), &aab).await.unwrap();
        assert_eq!(report.outcome, StepOutcome::SkippedNotFound);
        assert!(page.events().await.is_empty());
    }
}
