//! App links domain verification in the app integrity section

use std::fmt;
use std::time::Duration;

use action_flow::{Step, StepAction, Workflow};
use action_gate::{OutcomeSpec, PollLoop, Refresh, Signal};
use action_locator::{Role, TargetDescriptor};
use serde::Serialize;

use super::common::{button, literal, nav, select_app};
use crate::config::Settings;

const VERIFIED_BADGE: &str = r"^\s*(Verified|Verificat[oa])\s*$";
const STATUS_TEXT: &str = r"^\s*(Verified|Verificat[oa]|Not verified|Non verificat[oa]|Pending|In corso|In attesa|Failed|Non riuscit[oa])\s*$";

/// Verification state shown next to the domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DomainStatus {
    Verified,
    Pending,
    NotVerified,
    Unknown,
}

impl DomainStatus {
    /// Negative wording is checked first: "Not verified" contains "verified".
    pub fn classify(text: &str) -> Self {
        let text = text.to_lowercase();
        if text.contains("not verified")
            || text.contains("non verificat")
            || text.contains("failed")
            || text.contains("non riuscit")
        {
            DomainStatus::NotVerified
        } else if text.contains("pending") || text.contains("in corso") || text.contains("in attesa")
        {
            DomainStatus::Pending
        } else if text.contains("verified") || text.contains("verificat") {
            DomainStatus::Verified
        } else {
            DomainStatus::Unknown
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            DomainStatus::Verified => "verified",
            DomainStatus::Pending => "pending",
            DomainStatus::NotVerified => "not_verified",
            DomainStatus::Unknown => "unknown",
        }
    }
}

impl fmt::Display for DomainStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

fn domain_row(settings: &Settings) -> TargetDescriptor {
    TargetDescriptor::new(Role::Row, [literal(&settings.custom_domain)])
}

/// Status cell inside the configured domain's row.
pub fn status_target(settings: &Settings) -> TargetDescriptor {
    TargetDescriptor::text([STATUS_TEXT]).within(domain_row(settings))
}

fn open_app_links(settings: &Settings) -> Vec<Step> {
    let mut steps = select_app(settings);
    steps.push(Step::new(
        "app-integrity",
        "App integrity",
        StepAction::Click {
            target: nav("App integrity|Integrità (dell')?app").or_role(Role::Text),
        },
    ));
    steps.push(
        Step::new(
            "app-links",
            "App links",
            StepAction::Click {
                target: TargetDescriptor::new(Role::Tab, ["App links|Collegamenti app"])
                    .or_role(Role::Link)
                    .or_role(Role::Text),
            },
        )
        .mandatory(),
    );
    steps.push(
        Step::new(
            "domain-row",
            format!("Domain {}", settings.custom_domain),
            StepAction::WaitForText {
                target: domain_row(settings),
            },
        )
        .mandatory()
        .with_timeout(Duration::from_secs(10)),
    );
    steps
}

/// Rechecks the domain and waits for the console's verdict.
///
/// A domain that already carries the verified badge has no recheck control;
/// the badge counts as success on the first observation.
pub fn verify_workflow(settings: &Settings) -> Workflow {
    let row = domain_row(settings);
    let badge = TargetDescriptor::text([VERIFIED_BADGE]).within(row.clone());

    let mut steps = open_app_links(settings);
    steps.push(Step::new(
        "recheck",
        "Recheck verification",
        StepAction::FirstOf {
            alternatives: vec![
                StepAction::Click {
                    target: button("Recheck|Ricontrolla|Verifica di nuovo|Verify again")
                        .within(row),
                },
                StepAction::WaitForText {
                    target: badge.clone(),
                },
            ],
        },
    ));
    steps.push(Step::new(
        "domain-verified",
        "Domain verification",
        StepAction::Verify {
            spec: OutcomeSpec::new()
                .success(Signal::text("successfully verified|verificato con successo"))
                .success(Signal::Element(badge))
                .failure(Signal::text(
                    "verification failed|verifica non riuscita|could not verify",
                ))
                .with_failure_detail(TargetDescriptor::text([r"^(error|errore)\b"])),
            poll: PollLoop::new(12, Duration::from_secs(5)).with_refresh(Refresh::Reload),
        },
    ));
    steps.push(Step::new(
        "final-screenshot",
        "Final screenshot",
        StepAction::Screenshot {
            path: settings.artifact_dir.join("app-links-final.png"),
        },
    ));

    Workflow::new("verify-app-links", "verify-app-links")
        .steps(steps)
        .with_timeout(settings.workflow_timeout())
        .with_failure_screenshot(settings.failure_screenshot("verify-app-links"))
}

/// Navigates to the domain row; the status is read once the run finishes.
pub fn status_workflow(settings: &Settings) -> Workflow {
    Workflow::new("app-links-status", "app-links-status")
        .steps(open_app_links(settings))
        .with_timeout(settings.workflow_timeout())
        .with_failure_screenshot(settings.failure_screenshot("app-links-status"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_wording_wins() {
        assert_eq!(DomainStatus::classify("Not verified"), DomainStatus::NotVerified);
        assert_eq!(DomainStatus::classify("Non verificato"), DomainStatus::NotVerified);
        assert_eq!(DomainStatus::classify(" Verificato "), DomainStatus::Verified);
        assert_eq!(DomainStatus::classify("In corso"), DomainStatus::Pending);
        assert_eq!(DomainStatus::classify("androidnews.app"), DomainStatus::Unknown);
    }

    #[test]
    fn status_patterns_accept_the_badge_only() {
        let badge = regex::RegexBuilder::new(VERIFIED_BADGE)
            .case_insensitive(true)
            .build()
            .unwrap();
        assert!(badge.is_match("Verified"));
        assert!(!badge.is_match("Not verified"));
        assert!(!badge.is_match("successfully verified"));
    }

    #[test]
    fn verify_flow_ends_with_the_screenshot() {
        let wf = verify_workflow(&Settings::default());
        wf.validate().unwrap();
        let last = wf.steps.last().unwrap();
        match &last.action {
            StepAction::Screenshot { path } => {
                assert_eq!(path, &std::path::PathBuf::from("playwright-results/app-links-final.png"))
            }
            other => panic!("unexpected action {other:?}"),
        }
        let row = wf.steps.iter().find(|s| s.id.as_str() == "domain-row").unwrap();
        assert!(row.is_mandatory());
        assert_eq!(row.timeout, Some(Duration::from_secs(10)));
    }

    #[test]
    fn status_flow_stops_at_the_row() {
        let wf = status_workflow(&Settings::default());
        assert_eq!(wf.steps.last().unwrap().id.as_str(), "domain-row");
        let target = status_target(&Settings::default());
        assert_eq!(target.scope.unwrap().patterns, vec![r"androidnews\.app"]);
    }
}
