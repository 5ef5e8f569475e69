//! Building blocks shared by the console workflows.

use action_flow::{Step, StepAction};
use action_locator::{Role, TargetDescriptor};

use crate::config::{SelectBy, Settings};

pub(crate) const SAVE: &str = "Save|Salva";
pub(crate) const SUBMIT: &str = "Submit|Invia";

pub(crate) fn button(pattern: &str) -> TargetDescriptor {
    TargetDescriptor::new(Role::Button, [pattern])
}

pub(crate) fn link(pattern: &str) -> TargetDescriptor {
    TargetDescriptor::new(Role::Link, [pattern])
}

/// Navigation entries render as links in one console layout and as buttons
/// in another.
pub(crate) fn nav(pattern: &str) -> TargetDescriptor {
    link(pattern).or_role(Role::Button)
}

pub(crate) fn textbox(pattern: &str) -> TargetDescriptor {
    TargetDescriptor::new(Role::Textbox, [pattern])
}

/// Case-insensitive literal match of a configured value.
pub(crate) fn literal(value: &str) -> String {
    regex::escape(value)
}

pub(crate) fn click(id: &str, label: &str, target: TargetDescriptor) -> Step {
    Step::new(id, label, StepAction::Click { target })
}

pub(crate) fn fill(id: &str, label: &str, target: TargetDescriptor, value: &str) -> Step {
    Step::new(
        id,
        label,
        StepAction::Fill {
            target,
            value: value.to_string(),
        },
    )
}

/// Fill that is only emitted when a value is configured.
pub(crate) fn fill_if_set(
    id: &str,
    label: &str,
    target: TargetDescriptor,
    value: Option<&str>,
) -> Option<Step> {
    value.map(|value| fill(id, label, target, value))
}

pub(crate) fn select(id: &str, label: &str, combobox: &str, option: &str) -> Step {
    Step::new(
        id,
        label,
        StepAction::Select {
            target: TargetDescriptor::new(Role::Combobox, [combobox]),
            option: literal(option),
        },
    )
}

/// Save with the submit button as fallback.
pub(crate) fn save(id: &str) -> Step {
    Step::new(
        id,
        "Save",
        StepAction::FirstOf {
            alternatives: vec![
                StepAction::Click {
                    target: button(SAVE),
                },
                StepAction::Click {
                    target: button(SUBMIT),
                },
            ],
        },
    )
}

pub(crate) fn go_back(id: &str) -> Step {
    Step::new(id, "Back", StepAction::GoBack)
}

/// Opens the console and picks the configured app.
///
/// Only the final click on the app is mandatory: every workflow after it
/// acts on the wrong app otherwise.
pub fn select_app(settings: &Settings) -> Vec<Step> {
    let mut steps = vec![
        Step::new(
            "open-console",
            "Open Play Console",
            StepAction::Navigate {
                url: settings.console_url.clone(),
            },
        )
        .mandatory(),
        click(
            "all-apps",
            "All apps",
            nav("All apps|Tutte le app|Tutte le applicazioni"),
        ),
    ];

    let app_pattern = match settings.select_by {
        SelectBy::Package if !settings.package_name.is_empty() => {
            steps.push(fill(
                "search-app",
                "Search apps",
                textbox("Search apps|Cerca app"),
                &settings.package_name,
            ));
            steps.push(Step::new(
                "search-app-submit",
                "Search apps",
                StepAction::PressKey {
                    key: "Enter".to_string(),
                },
            ));
            literal(&settings.package_name)
        }
        _ => literal(&settings.app_name),
    };

    steps.push(
        click(
            "select-app",
            "Select app",
            TargetDescriptor::text([app_pattern.as_str()]).or_role(Role::Link),
        )
        .mandatory(),
    );
    steps
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn select_by_title_clicks_the_app_name() {
        let steps = select_app(&Settings::default());
        let last = steps.last().unwrap();
        assert!(last.is_mandatory());
        match &last.action {
            StepAction::Click { target } => assert_eq!(target.patterns, vec!["Android News"]),
            other => panic!("unexpected action {other:?}"),
        }
        assert!(!steps.iter().any(|s| s.id.as_str() == "search-app"));
    }

    #[test]
    fn select_by_package_searches_first() {
        let settings = Settings {
            select_by: SelectBy::Package,
            ..Settings::default()
        };
        let steps = select_app(&settings);
        let ids: Vec<_> = steps.iter().map(|s| s.id.as_str().to_string()).collect();
        assert_eq!(
            ids,
            vec!["open-console", "all-apps", "search-app", "search-app-submit", "select-app"]
        );
        match &steps[4].action {
            StepAction::Click { target } => {
                assert_eq!(target.patterns, vec![r"com\.mucciologianfranco\.android_news"])
            }
            other => panic!("unexpected action {other:?}"),
        }
    }
}
