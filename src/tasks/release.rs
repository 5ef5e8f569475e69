//! Closed-testing release

use std::time::Duration;

use action_flow::{Step, StepAction, Workflow};
use action_gate::{OutcomeSpec, PollLoop, Signal};
use action_locator::{Role, TargetDescriptor};

use super::common::{button, click, fill, nav, select_app, textbox, SAVE};
use crate::config::Settings;

pub const RELEASE_SUBMITTED: &str = "Release created|Release submitted|Release pending review|Release inviat[ao]|In review|In revisione";

/// Creates a release on the closed (or internal) testing track.
///
/// A track that already has a draft release shows no create control; the
/// steps that need it are skipped and the rest still applies.
pub fn workflow(settings: &Settings) -> Workflow {
    let mut steps = select_app(settings);

    steps.push(click(
        "release-menu",
        "Testing / Release",
        TargetDescriptor::new(Role::Link, ["Testing|Release|Rilascio|Test"]),
    ));
    steps.push(Step::new(
        "closed-testing",
        "Closed testing",
        StepAction::FirstOf {
            alternatives: vec![
                StepAction::Click {
                    target: nav("Closed testing|Test chiuso"),
                },
                StepAction::Click {
                    target: nav("Internal testing|Test interno"),
                },
            ],
        },
    ));
    steps.push(click(
        "create-release",
        "Create release",
        nav("Create new release|Crea nuova release|New release|Nuova release"),
    ));
    steps.push(fill(
        "release-name",
        "Release name",
        textbox("Release name|Nome release"),
        &settings.release_name,
    ));

    if settings.wait_manual {
        steps.push(Step::new(
            "upload-aab",
            "Upload AAB",
            StepAction::ManualPause {
                instructions: format!(
                    "upload {} in the release page",
                    settings.aab_path.display()
                ),
            },
        ));
    } else {
        steps.push(Step::new(
            "aab-present",
            "Build artifact",
            StepAction::RequireFile {
                path: settings.aab_path.clone(),
            },
        ));
        steps.push(Step::new(
            "upload-aab",
            "Upload AAB",
            StepAction::Upload {
                target: TargetDescriptor::new(Role::FileInput, Vec::<String>::new()),
                path: settings.aab_path.clone(),
            },
        ));
        steps.push(
            Step::new(
                "aab-processed",
                "Bundle processing",
                StepAction::WaitForText {
                    target: TargetDescriptor::text(["processing|elaborazione|uploaded|caricato"]),
                },
            )
            .with_timeout(Duration::from_secs(30)),
        );
    }

    steps.push(fill(
        "release-notes",
        "Release notes",
        textbox("Release notes|Note di rilascio|Note sulla release"),
        &settings.release_notes,
    ));

    if !settings.testers_emails.is_empty() {
        steps.push(click(
            "testers",
            "Testers",
            TargetDescriptor::new(Role::Tab, ["Testers|Tester"]).or_role(Role::Text),
        ));
        for (index, email) in settings.testers_emails.iter().enumerate() {
            steps.push(fill(
                &format!("tester-{index}"),
                &format!("Add tester {email}"),
                textbox("e-?mail|Add testers|Aggiungi tester"),
                email,
            ));
            steps.push(Step::new(
                format!("tester-{index}-enter"),
                format!("Confirm tester {email}"),
                StepAction::PressKey {
                    key: "Enter".to_string(),
                },
            ));
        }
    }

    steps.push(Step::new(
        "review",
        "Review release",
        StepAction::FirstOf {
            alternatives: vec![
                StepAction::Click {
                    target: button("Review and submit|Rivedi e invia|Review|Rivedi"),
                },
                StepAction::Click {
                    target: button(SAVE),
                },
            ],
        },
    ));
    steps.push(click(
        "submit",
        "Submit release",
        button("Submit|Invia|Publish|Pubblica|Start rollout|Avvia"),
    ));
    steps.push(Step::new(
        "release-submitted",
        "Release submitted",
        StepAction::Verify {
            spec: OutcomeSpec::new().success(Signal::text(RELEASE_SUBMITTED)),
            poll: PollLoop::new(12, Duration::from_secs(5)),
        },
    ));

    Workflow::new("closed-release", "closed-release")
        .steps(steps)
        .with_timeout(settings.workflow_timeout())
        .with_failure_screenshot(settings.failure_screenshot("closed-release"))
}
