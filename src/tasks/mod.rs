//! Console tasks
//!
//! Each task turns [`Settings`] into a [`Workflow`]. Running one goes through
//! [`run_task`], which also records metrics and reads back anything the task
//! reports beyond the run itself.

pub mod app_links;
pub mod common;
pub mod content;
pub mod listing;
pub mod pages;
pub mod pricing;
pub mod probe;
pub mod release;

use std::time::Duration;

use action_flow::{RunReport, Workflow, WorkflowResult};
use serde::Serialize;
use tracing::{info, warn};

use crate::config::Settings;
use crate::engine::Engine;
use crate::errors::PilotError;
use crate::metrics;

pub use app_links::DomainStatus;
pub use probe::ProbeOptions;

/// Which stored session a task runs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionTarget {
    PlayConsole,
    GitHub,
    /// Plain HTTP, no browser
    None,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Task {
    ClosedRelease,
    StoreListing,
    Listing,
    Pricing,
    AppContent,
    PagesDomain,
    VerifyAppLinks,
    AppLinksStatus,
    ProbeAssetLinks(ProbeOptions),
}

impl Task {
    pub fn name(&self) -> &'static str {
        match self {
            Task::ClosedRelease => "closed-release",
            Task::StoreListing => "store-listing",
            Task::Listing => "listing",
            Task::Pricing => "pricing",
            Task::AppContent => "app-content",
            Task::PagesDomain => "pages-domain",
            Task::VerifyAppLinks => "verify-app-links",
            Task::AppLinksStatus => "app-links-status",
            Task::ProbeAssetLinks(_) => "probe-assetlinks",
        }
    }

    pub fn session(&self) -> SessionTarget {
        match self {
            Task::PagesDomain => SessionTarget::GitHub,
            Task::ProbeAssetLinks(_) => SessionTarget::None,
            _ => SessionTarget::PlayConsole,
        }
    }

    pub fn workflow(&self, settings: &Settings) -> Result<Workflow, PilotError> {
        Ok(match self {
            Task::ClosedRelease => release::workflow(settings),
            Task::StoreListing => listing::store_listing(settings),
            Task::Listing => listing::listing(settings),
            Task::Pricing => pricing::workflow(settings),
            Task::AppContent => content::workflow(settings),
            Task::PagesDomain => pages::workflow(settings)?,
            Task::VerifyAppLinks => app_links::verify_workflow(settings),
            Task::AppLinksStatus => app_links::status_workflow(settings),
            Task::ProbeAssetLinks(options) => probe::workflow(options),
        })
    }
}

/// What a finished task reports.
#[derive(Debug, Clone, Serialize)]
pub struct TaskOutcome {
    pub task: String,
    pub report: RunReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain_status: Option<DomainStatus>,
}

impl TaskOutcome {
    pub fn exit_code(&self) -> i32 {
        self.report.exit_code()
    }
}

pub async fn run_task(
    engine: &Engine,
    task: &Task,
    settings: &Settings,
) -> Result<TaskOutcome, PilotError> {
    let workflow = task.workflow(settings)?;
    workflow.validate()?;
    info!(task = task.name(), steps = workflow.steps.len(), "task started");

    let report = engine.run(&workflow).await?;
    metrics::record_run(task.name(), &report);

    let domain_status = match task {
        Task::AppLinksStatus if !matches!(report.result, WorkflowResult::Failed { .. }) => {
            Some(read_domain_status(engine, settings).await)
        }
        _ => None,
    };

    Ok(TaskOutcome {
        task: task.name().to_string(),
        report,
        domain_status,
    })
}

async fn read_domain_status(engine: &Engine, settings: &Settings) -> DomainStatus {
    let ctx = engine.context(settings.step_timeout().max(Duration::from_secs(1)));
    match engine
        .primitives()
        .read_value(&ctx, &app_links::status_target(settings))
        .await
    {
        Ok(Some(text)) => {
            let status = DomainStatus::classify(&text);
            info!(domain = %settings.custom_domain, status = %status, "domain status read");
            status
        }
        Ok(None) => DomainStatus::Unknown,
        Err(err) => {
            warn!(domain = %settings.custom_domain, error = %err, "domain status not readable");
            DomainStatus::Unknown
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_task_builds_a_valid_workflow() {
        let settings = Settings {
            pages_repo_owner: Some("me".into()),
            pages_repo_name: Some("site".into()),
            testers_emails: vec!["qa@example.com".into()],
            ..Settings::default()
        };
        let tasks = [
            Task::ClosedRelease,
            Task::StoreListing,
            Task::Listing,
            Task::Pricing,
            Task::AppContent,
            Task::PagesDomain,
            Task::VerifyAppLinks,
            Task::AppLinksStatus,
            Task::ProbeAssetLinks(ProbeOptions::from_settings(&settings)),
        ];
        for task in &tasks {
            let wf = task.workflow(&settings).unwrap();
            wf.validate().unwrap();
            assert_eq!(wf.name, task.name());
        }
    }

    #[test]
    fn sessions_by_task() {
        assert_eq!(Task::PagesDomain.session(), SessionTarget::GitHub);
        assert_eq!(Task::Pricing.session(), SessionTarget::PlayConsole);
        let probe = Task::ProbeAssetLinks(ProbeOptions::from_settings(&Settings::default()));
        assert_eq!(probe.session(), SessionTarget::None);
    }
}
