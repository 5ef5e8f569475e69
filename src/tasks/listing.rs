//! Store listing workflows

use std::time::Duration;

use action_flow::{Step, StepAction, Workflow};
use action_gate::{OutcomeSpec, PollLoop, Signal};
use action_locator::{Role, TargetDescriptor};

use super::common::{button, click, fill_if_set, link, nav, save, select, select_app, textbox};
use crate::config::Settings;

const STORE_PRESENCE: &str = "Store presence|Presenza sullo store";
const MAIN_LISTING: &str =
    "Main store listing|Scheda dello Store principale|Scheda store principale";
pub const LISTING_SAVED: &str =
    "Saved|Salvato|Changes saved|Modifiche salvate|Draft saved|Bozza salvata";

fn detail_fields(settings: &Settings) -> Vec<Step> {
    [
        fill_if_set(
            "app-name",
            "App name",
            textbox("App name|Nome app"),
            Some(settings.app_name.as_str()),
        ),
        fill_if_set(
            "short-description",
            "Short description",
            textbox("Short description|Breve descrizione"),
            Some(settings.short_description.as_str()),
        ),
        fill_if_set(
            "full-description",
            "Full description",
            textbox("Full description|Descrizione completa"),
            settings.full_description.as_deref(),
        ),
    ]
    .into_iter()
    .flatten()
    .collect()
}

fn contact_fields(settings: &Settings) -> Vec<Step> {
    [
        fill_if_set(
            "email",
            "Contact email",
            textbox("E-?mail"),
            Some(settings.email_contact.as_str()),
        ),
        fill_if_set(
            "website",
            "Website",
            textbox("Website|Sito web"),
            settings.website.as_deref(),
        ),
        fill_if_set(
            "privacy-policy",
            "Privacy policy",
            textbox("Privacy policy|Informativa sulla privacy"),
            settings.privacy_url.as_deref(),
        ),
    ]
    .into_iter()
    .flatten()
    .collect()
}

/// Completes the main store listing and checks the save confirmation.
pub fn store_listing(settings: &Settings) -> Workflow {
    let mut steps = select_app(settings);
    steps.push(click("store-presence", "Store presence", link(STORE_PRESENCE)));
    steps.push(click("main-listing", "Main store listing", link(MAIN_LISTING)));
    steps.extend(detail_fields(settings));
    steps.extend(contact_fields(settings));
    steps.push(select(
        "category",
        "Category",
        "Category|Categoria",
        &settings.category,
    ));
    steps.push(Step::new(
        "save",
        "Save",
        StepAction::FirstOf {
            alternatives: vec![
                StepAction::Click {
                    target: button("Save draft|Salva bozza"),
                },
                StepAction::Click {
                    target: button("Save|Salva"),
                },
            ],
        },
    ));
    steps.push(Step::new(
        "saved",
        "Changes saved",
        StepAction::Verify {
            spec: OutcomeSpec::new()
                .success(Signal::text(LISTING_SAVED))
                .failure(Signal::Element(TargetDescriptor::new(
                    Role::Dialog,
                    ["error|errore|could not save|impossibile salvare"],
                ))),
            poll: PollLoop::new(5, Duration::from_secs(2)),
        },
    ));

    Workflow::new("store-listing", "store-listing")
        .steps(steps)
        .with_timeout(settings.workflow_timeout())
        .with_failure_screenshot(settings.failure_screenshot("store-listing"))
}

/// Main store listing including the default language; no save check.
pub fn listing(settings: &Settings) -> Workflow {
    let mut steps = select_app(settings);
    steps.push(click(
        "navigation-menu",
        "Navigation menu",
        button("^(main )?menu$|navigation"),
    ));
    steps.push(Step::new(
        "store-presence",
        "Store listing section",
        StepAction::FirstOf {
            alternatives: vec![
                StepAction::Click {
                    target: nav(MAIN_LISTING),
                },
                StepAction::Click {
                    target: nav(STORE_PRESENCE),
                },
            ],
        },
    ));
    steps.push(click("main-listing", "Main store listing", link(MAIN_LISTING)));
    steps.push(select(
        "default-language",
        "Default language",
        "Default language|Lingua predefinita",
        &settings.default_locale,
    ));
    steps.extend(detail_fields(settings));
    steps.push(select(
        "category",
        "Category",
        "Category|Categoria",
        &settings.category,
    ));
    steps.extend(contact_fields(settings));
    steps.push(save("save"));

    Workflow::new("listing", "listing")
        .steps(steps)
        .with_timeout(settings.workflow_timeout())
        .with_failure_screenshot(settings.failure_screenshot("listing"))
}
