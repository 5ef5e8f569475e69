//! App content declarations
//!
//! App access, ads and target audience are answered here. Content rating and
//! data safety need judgment and are left to the operator as notices.

use action_flow::{Step, StepAction, Workflow};
use action_locator::{Role, TargetDescriptor};

use super::common::{click, go_back, nav, save, select_app};
use crate::config::Settings;

fn choose(id: &str, label: &str, pattern: &str) -> Step {
    Step::new(
        id,
        label,
        StepAction::Check {
            target: TargetDescriptor::new(Role::Radio, [pattern]).or_role(Role::Checkbox),
        },
    )
}

/// One declaration page: open it, answer, save, return to the list.
fn declaration(steps: &mut Vec<Step>, key: &str, section: &str, answer: &str) {
    steps.push(click(key, section, nav(section)));
    steps.push(choose(&format!("{key}-answer"), section, answer));
    steps.push(save(&format!("{key}-save")));
    steps.push(go_back(&format!("{key}-back")));
}

pub fn workflow(settings: &Settings) -> Workflow {
    let mut steps = select_app(settings);
    steps.push(Step::new(
        "policy",
        "Policy",
        StepAction::FirstOf {
            alternatives: vec![
                StepAction::Click {
                    target: nav("App content|Contenuti dell'app"),
                },
                StepAction::Click {
                    target: nav("^Policy$|Norme"),
                },
            ],
        },
    ));
    steps.push(click(
        "app-content",
        "App content",
        nav("App content|Contenuti dell'app"),
    ));

    declaration(
        &mut steps,
        "app-access",
        "App access|Accesso all'app",
        "All functionality is available|Tutte le funzionalità sono disponibili",
    );
    declaration(
        &mut steps,
        "ads",
        r"\bAds\b|Pubblicità|Annunci",
        "Does not contain ads|No, .*non contiene annunci|Non contiene annunci",
    );
    declaration(
        &mut steps,
        "target-audience",
        "Target audience|Pubblico di destinazione",
        r"13\+|13 years or older|13 anni o più",
    );

    steps.push(Step::new(
        "content-rating",
        "Content rating",
        StepAction::Notice {
            message: "complete the content rating questionnaire by hand".to_string(),
        },
    ));
    steps.push(Step::new(
        "data-safety",
        "Data safety",
        StepAction::Notice {
            message: "complete the data safety form by hand".to_string(),
        },
    ));

    Workflow::new("app-content", "app-content")
        .steps(steps)
        .with_timeout(settings.workflow_timeout())
        .with_failure_screenshot(settings.failure_screenshot("app-content"))
}
