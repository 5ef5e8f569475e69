//! Terminal signals and single-snapshot observation

use std::fmt;

use action_locator::{match_descriptor, TargetDescriptor};
use cdp_adapter::DomSnapshot;
use serde::{Deserialize, Serialize};

use crate::{errors::GateError, evidence::Evidence, types::OutcomeSpec};

/// Something on the page that ends a poll loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    /// A specific element, e.g. an enabled checkbox or a status row
    Element(TargetDescriptor),
    /// Any visible text matching the pattern
    Text(String),
    /// A specific element that is present and not disabled
    Enabled(TargetDescriptor),
}

impl Signal {
    pub fn text(pattern: impl Into<String>) -> Self {
        Signal::Text(pattern.into())
    }

    pub fn descriptor(&self) -> TargetDescriptor {
        match self {
            Signal::Element(target) | Signal::Enabled(target) => target.clone(),
            Signal::Text(pattern) => TargetDescriptor::text([pattern.as_str()]),
        }
    }

    /// Label of the first matching element, if any.
    pub fn find(&self, snapshot: &DomSnapshot) -> Result<Option<String>, GateError> {
        let handle = match_descriptor(snapshot, &self.descriptor())?.found();
        let handle = match self {
            Signal::Enabled(_) => handle.filter(|h| !h.disabled),
            _ => handle,
        };
        Ok(handle.map(|h| h.label().trim().to_string()))
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Signal::Element(target) => write!(f, "{}", target),
            Signal::Text(pattern) => write!(f, "text[/{}/]", pattern),
            Signal::Enabled(target) => write!(f, "enabled {}", target),
        }
    }
}

/// Result of checking one snapshot.
#[derive(Debug, Clone, PartialEq)]
pub enum Observation {
    Success(Evidence),
    Failure(String),
    Neither,
}

/// Checks success signals, then failure signals, against one snapshot.
///
/// When both would match, success wins.
pub fn observe(snapshot: &DomSnapshot, spec: &OutcomeSpec) -> Result<Observation, GateError> {
    for signal in &spec.success {
        if let Some(text) = signal.find(snapshot)? {
            return Ok(Observation::Success(Evidence::new(signal, text, &snapshot.url)));
        }
    }

    for signal in &spec.failure {
        if let Some(text) = signal.find(snapshot)? {
            let mut detail = text;
            if let Some(extra) = &spec.failure_detail {
                if let Some(handle) = match_descriptor(snapshot, extra)?.found() {
                    let extra = handle.label().trim();
                    if !extra.is_empty() && extra != detail {
                        detail = format!("{detail}: {extra}");
                    }
                }
            }
            return Ok(Observation::Failure(detail));
        }
    }

    Ok(Observation::Neither)
}

#[cfg(test)]
mod tests {
    use super::*;
    use action_locator::Role;
    use cdp_adapter::DomNode;

    fn node(index: u32, role: Option<&str>, text: &str) -> DomNode {
        DomNode {
            index,
            tag: "div".into(),
            role: role.map(str::to_string),
            text: text.into(),
            visible: true,
            ..Default::default()
        }
    }

    fn snapshot(nodes: Vec<DomNode>) -> DomSnapshot {
        DomSnapshot {
            epoch: 1,
            url: "https://play.google.com/console/app-links".into(),
            nodes,
        }
    }

    fn domain_spec() -> OutcomeSpec {
        OutcomeSpec::new()
            .success(Signal::text("successfully verified|verificato con successo"))
            .failure(Signal::text("verification failed|could not verify"))
    }

    #[test]
    fn success_wins_when_both_signals_present() {
        let snap = snapshot(vec![
            node(0, None, "Verification failed yesterday"),
            node(1, None, "Domain successfully verified"),
        ]);
        match observe(&snap, &domain_spec()).unwrap() {
            Observation::Success(evidence) => {
                assert_eq!(evidence.text, "Domain successfully verified");
                assert!(evidence.url.ends_with("app-links"));
            }
            other => panic!("expected success, got {other:?}"),
        }
    }

    #[test]
    fn failure_detail_appends_error_element() {
        let snap = snapshot(vec![
            node(0, None, "Could not verify"),
            node(1, Some("alert"), "DNS record missing for androidnews.app"),
        ]);
        let alert = TargetDescriptor::text(["dns record"]);
        let spec = domain_spec().with_failure_detail(alert);
        assert_eq!(
            observe(&snap, &spec).unwrap(),
            Observation::Failure("Could not verify: DNS record missing for androidnews.app".into())
        );
    }

    #[test]
    fn element_signals_respect_roles() {
        let mut checkbox = node(0, Some("checkbox"), "");
        checkbox.name = "Enforce HTTPS".into();
        checkbox.disabled = true;
        let snap = snapshot(vec![checkbox]);
        let spec = OutcomeSpec::new().success(Signal::Element(TargetDescriptor::new(
            Role::Button,
            ["Enforce HTTPS"],
        )));
        assert_eq!(observe(&snap, &spec).unwrap(), Observation::Neither);
    }

    #[test]
    fn enabled_signal_waits_for_the_control_to_unlock() {
        let mut checkbox = node(0, Some("checkbox"), "");
        checkbox.name = "Enforce HTTPS".into();
        checkbox.disabled = true;
        let target = TargetDescriptor::new(Role::Checkbox, ["Enforce HTTPS"]);
        let spec = OutcomeSpec::new().success(Signal::Enabled(target));

        assert_eq!(observe(&snapshot(vec![checkbox.clone()]), &spec).unwrap(), Observation::Neither);
        checkbox.disabled = false;
        assert!(matches!(
            observe(&snapshot(vec![checkbox]), &spec).unwrap(),
            Observation::Success(_)
        ));
    }

    #[test]
    fn invalid_pattern_is_an_error() {
        let spec = OutcomeSpec::new().success(Signal::text("(unclosed"));
        assert!(matches!(
            observe(&snapshot(vec![]), &spec),
            Err(GateError::Locator(_))
        ));
    }
}
