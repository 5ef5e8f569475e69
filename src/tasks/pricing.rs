//! Pricing and distribution

use action_flow::{Step, StepAction, Workflow};
use action_locator::{Role, TargetDescriptor};

use super::common::{button, click, literal, nav, save, select_app};
use crate::config::Settings;

pub fn workflow(settings: &Settings) -> Workflow {
    let mut steps = select_app(settings);
    steps.push(click(
        "pricing-distribution",
        "Pricing & distribution",
        nav("Pricing (&|and) distribution|Prezzi e distribuzione"),
    ));
    steps.push(click("setup", "Setup", nav("^Setup$|Configurazione")));

    if settings.pricing_free {
        steps.push(Step::new(
            "free",
            "Free app",
            StepAction::Check {
                target: TargetDescriptor::new(Role::Radio, ["^Free$|Gratuita"])
                    .or_role(Role::Checkbox),
            },
        ));
    }

    if !settings.countries.is_empty() {
        steps.push(click(
            "manage-countries",
            "Manage countries",
            button("Manage countries|Gestisci paesi|Aggiungi paesi"),
        ));
        for (index, country) in settings.countries.iter().enumerate() {
            steps.push(Step::new(
                format!("country-{index}"),
                format!("Country {country}"),
                StepAction::Check {
                    target: TargetDescriptor::new(Role::Checkbox, [literal(country)]),
                },
            ));
        }
        steps.push(click(
            "apply-countries",
            "Apply countries",
            button("Apply|Applica|Fatto|Done"),
        ));
    }

    steps.push(save("save"));

    Workflow::new("pricing", "pricing")
        .steps(steps)
        .with_timeout(settings.workflow_timeout())
        .with_failure_screenshot(settings.failure_screenshot("pricing"))
}
