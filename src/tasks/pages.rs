//! GitHub Pages custom domain and HTTPS

use std::time::Duration;

use action_flow::{Step, StepAction, Workflow};
use action_gate::{OutcomeSpec, PollLoop, Refresh, Signal};
use action_locator::{Role, TargetDescriptor};

use super::common::{button, click, fill, textbox, SAVE};
use crate::config::Settings;
use crate::errors::PilotError;

/// GitHub Pages apex records the domain has to point at.
pub const PAGES_A_RECORDS: [&str; 4] = [
    "185.199.108.153",
    "185.199.109.153",
    "185.199.110.153",
    "185.199.111.153",
];

fn enforce_https() -> TargetDescriptor {
    TargetDescriptor::new(Role::Checkbox, ["Enforce HTTPS"])
}

pub fn workflow(settings: &Settings) -> Result<Workflow, PilotError> {
    let owner = settings
        .pages_repo_owner
        .as_deref()
        .ok_or(PilotError::MissingSetting("PAGES_REPO_OWNER"))?;
    let repo = settings
        .pages_repo_name
        .as_deref()
        .ok_or(PilotError::MissingSetting("PAGES_REPO_NAME"))?;

    let steps = vec![
        Step::new(
            "open-pages-settings",
            "Pages settings",
            StepAction::Navigate {
                url: format!("https://github.com/{owner}/{repo}/settings/pages"),
            },
        )
        .mandatory(),
        fill(
            "custom-domain",
            "Custom domain",
            textbox("Custom domain"),
            &settings.custom_domain,
        ),
        click("save-domain", "Save custom domain", button(SAVE)),
        Step::new(
            "dns-check",
            format!("DNS check (A records {})", PAGES_A_RECORDS.join(", ")),
            StepAction::Verify {
                spec: OutcomeSpec::new()
                    .success(Signal::text("successfully|DNS check (is )?(successful|passed)"))
                    .failure(Signal::text("not properly configured|DNS check (unsuccessful|failed)")),
                poll: PollLoop::new(6, Duration::from_secs(10)).with_refresh(Refresh::Reload),
            },
        ),
        Step::new(
            "https-available",
            "Enforce HTTPS available",
            StepAction::Verify {
                spec: OutcomeSpec::new().success(Signal::Enabled(enforce_https())),
                poll: PollLoop::new(20, Duration::from_secs(30)).with_refresh(Refresh::Reload),
            },
        ),
        Step::new(
            "enforce-https",
            "Enforce HTTPS",
            StepAction::Check {
                target: enforce_https(),
            },
        ),
        click("save-https", "Save HTTPS", button(SAVE)),
        Step::new(
            "asset-links",
            "Digital Asset Links",
            StepAction::PollHttp {
                url: settings.asset_links_url(),
                expected_package: settings.package_name.clone(),
                poll: PollLoop::new(3, Duration::from_secs(5)),
            },
        ),
    ];

    Ok(Workflow::new("pages-domain", "pages-domain")
        .steps(steps)
        .with_timeout(pages_timeout(settings))
        .with_failure_screenshot(settings.failure_screenshot("pages-domain")))
}

/// Certificate issuance can take the full HTTPS poll, so the workflow gets at
/// least that long.
fn pages_timeout(settings: &Settings) -> Duration {
    settings.workflow_timeout().max(Duration::from_secs(20 * 30 + 120))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn configured() -> Settings {
        Settings {
            pages_repo_owner: Some("mucciologianfranco".into()),
            pages_repo_name: Some("androidnews.app".into()),
            ..Settings::default()
        }
    }

    #[test]
    fn missing_repository_is_a_configuration_error() {
        let err = workflow(&Settings::default()).unwrap_err();
        assert!(matches!(err, PilotError::MissingSetting("PAGES_REPO_OWNER")));

        let settings = Settings {
            pages_repo_owner: Some("me".into()),
            ..Settings::default()
        };
        let err = workflow(&settings).unwrap_err();
        assert!(matches!(err, PilotError::MissingSetting("PAGES_REPO_NAME")));
    }

    #[test]
    fn settings_page_and_descriptor_come_from_settings() {
        let wf = workflow(&configured()).unwrap();
        wf.validate().unwrap();
        match &wf.steps[0].action {
            StepAction::Navigate { url } => assert_eq!(
                url,
                "https://github.com/mucciologianfranco/androidnews.app/settings/pages"
            ),
            other => panic!("unexpected action {other:?}"),
        }
        match &wf.steps.last().unwrap().action {
            StepAction::PollHttp {
                url,
                expected_package,
                ..
            } => {
                assert_eq!(url, "https://androidnews.app/.well-known/assetlinks.json");
                assert_eq!(expected_package, "com.mucciologianfranco.android_news");
            }
            other => panic!("unexpected action {other:?}"),
        }
        assert!(wf.steps[3].label.contains("185.199.111.153"));
        assert!(wf.timeout >= Duration::from_secs(600));
    }
}
