//! Pure matching of target descriptors against DOM snapshots.

use cdp_adapter::{DomNode, DomSnapshot};
use regex::{Regex, RegexBuilder};

use crate::errors::LocatorError;
use crate::types::{ElementHandle, Resolution, Role, TargetDescriptor};

/// Compiled label patterns of one descriptor level.
#[derive(Debug, Clone)]
pub struct LabelMatcher {
    patterns: Vec<Regex>,
}

impl LabelMatcher {
    pub fn compile(patterns: &[String]) -> Result<Self, LocatorError> {
        let patterns = patterns
            .iter()
            .map(|pattern| {
                RegexBuilder::new(pattern)
                    .case_insensitive(true)
                    .build()
                    .map_err(|err| LocatorError::InvalidPattern {
                        pattern: pattern.clone(),
                        reason: err.to_string(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    /// An empty pattern list matches every label.
    pub fn is_match(&self, label: &str) -> bool {
        self.patterns.is_empty() || self.patterns.iter().any(|re| re.is_match(label))
    }
}

struct CompiledLevel<'a> {
    descriptor: &'a TargetDescriptor,
    labels: LabelMatcher,
}

fn compile_chain(descriptor: &TargetDescriptor) -> Result<Vec<CompiledLevel<'_>>, LocatorError> {
    let mut chain = Vec::new();
    let mut cursor = Some(descriptor);
    while let Some(level) = cursor {
        if level.roles.is_empty() {
            return Err(LocatorError::InvalidDescriptor(format!(
                "no role in {}",
                level
            )));
        }
        chain.push(CompiledLevel {
            descriptor: level,
            labels: LabelMatcher::compile(&level.patterns)?,
        });
        cursor = level.scope.as_deref();
    }
    // Outermost scope first.
    chain.reverse();
    Ok(chain)
}

fn node_matches(node: &DomNode, level: &CompiledLevel<'_>) -> bool {
    level.descriptor.roles.iter().any(|role| {
        if role.requires_visibility() && !node.visible {
            return false;
        }
        if !role.accepts(node) {
            return false;
        }
        let label = match role {
            Role::Text => node.text.as_str(),
            _ if node.name.is_empty() => node.text.as_str(),
            _ => node.name.as_str(),
        };
        level.labels.is_match(label)
    })
}

/// Finds the first node in document order matching `descriptor`.
///
/// Scopes resolve outermost first; each level only searches descendants of the
/// previous level's match, and a missing scope makes the whole lookup absent.
pub fn match_descriptor(
    snapshot: &DomSnapshot,
    descriptor: &TargetDescriptor,
) -> Result<Resolution, LocatorError> {
    let chain = compile_chain(descriptor)?;
    let mut scope: Option<u32> = None;
    for level in &chain {
        let found = snapshot.nodes.iter().find(|node| {
            scope.map_or(true, |ancestor| snapshot.is_descendant(node.index, ancestor))
                && node_matches(node, level)
        });
        match found {
            Some(node) => scope = Some(node.index),
            None => return Ok(Resolution::NotFound),
        }
    }
    Ok(scope
        .and_then(|index| snapshot.node(index))
        .map(|node| Resolution::Found(ElementHandle::from_node(snapshot.epoch, node)))
        .unwrap_or(Resolution::NotFound))
}

/// Every node matching `descriptor`, in document order.
pub fn match_all(
    snapshot: &DomSnapshot,
    descriptor: &TargetDescriptor,
) -> Result<Vec<ElementHandle>, LocatorError> {
    let chain = compile_chain(descriptor)?;
    let Some((last, scopes)) = chain.split_last() else {
        return Ok(Vec::new());
    };
    let mut scope: Option<u32> = None;
    for level in scopes {
        match snapshot.nodes.iter().find(|node| {
            scope.map_or(true, |ancestor| snapshot.is_descendant(node.index, ancestor))
                && node_matches(node, level)
        }) {
            Some(node) => scope = Some(node.index),
            None => return Ok(Vec::new()),
        }
    }
    Ok(snapshot
        .nodes
        .iter()
        .filter(|node| {
            scope.map_or(true, |ancestor| snapshot.is_descendant(node.index, ancestor))
                && node_matches(node, last)
        })
        .map(|node| ElementHandle::from_node(snapshot.epoch, node))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn domains_page() -> DomSnapshot {
        serde_json::from_value(json!({
            "epoch": 7,
            "url": "https://play.google.com/console/app-links",
            "nodes": [
                { "index": 0, "tag": "h2", "role": "heading", "name": "Collegamenti app", "text": "Collegamenti app", "visible": true },
                { "index": 1, "tag": "tr", "role": "row", "name": "example.org Verified", "visible": true },
                { "index": 2, "parent": 1, "tag": "button", "role": "button", "name": "Recheck", "visible": true },
                { "index": 3, "tag": "tr", "role": "row", "name": "androidnews.app Pending", "visible": true },
                { "index": 4, "parent": 3, "tag": "button", "role": "button", "name": "Ricontrolla", "visible": true },
                { "index": 5, "tag": "button", "role": "button", "name": "Save", "visible": false },
                { "index": 6, "tag": "input", "role": "file", "name": "Upload", "visible": false },
                { "index": 7, "tag": "div", "name": "Verification failed", "text": "Verification failed", "visible": true },
                { "index": 8, "tag": "input", "role": "switch", "name": "Enforce HTTPS", "checked": true, "visible": true }
            ]
        }))
        .unwrap()
    }

    fn found_index(resolution: Resolution) -> Option<u32> {
        resolution.found().map(|h| h.node.index)
    }

    #[test]
    fn locale_alternatives_are_case_insensitive_alternatives() {
        let target = TargetDescriptor::new(Role::Heading, ["App links", "collegamenti APP"]);
        assert_eq!(found_index(match_descriptor(&domains_page(), &target).unwrap()), Some(0));
    }

    #[test]
    fn scope_restricts_to_descendants_of_the_container() {
        let target = TargetDescriptor::new(Role::Button, ["Recheck", "Ricontrolla"])
            .within(TargetDescriptor::new(Role::Row, ["androidnews\\.app"]));
        assert_eq!(found_index(match_descriptor(&domains_page(), &target).unwrap()), Some(4));

        let unscoped = TargetDescriptor::new(Role::Button, ["Recheck", "Ricontrolla"]);
        assert_eq!(found_index(match_descriptor(&domains_page(), &unscoped).unwrap()), Some(2));
    }

    #[test]
    fn missing_scope_means_not_found() {
        let target = TargetDescriptor::new(Role::Button, ["Recheck"])
            .within(TargetDescriptor::new(Role::Row, ["other\\.app"]));
        assert_eq!(match_descriptor(&domains_page(), &target).unwrap(), Resolution::NotFound);
    }

    #[test]
    fn hidden_elements_do_not_match_except_file_inputs() {
        let save = TargetDescriptor::new(Role::Button, ["Save"]);
        assert_eq!(match_descriptor(&domains_page(), &save).unwrap(), Resolution::NotFound);
        let upload = TargetDescriptor::new(Role::FileInput, Vec::<String>::new());
        assert_eq!(found_index(match_descriptor(&domains_page(), &upload).unwrap()), Some(6));
    }

    #[test]
    fn text_role_matches_own_text() {
        let failure = TargetDescriptor::text(["verification failed", "verifica non riuscita"]);
        let handle = match_descriptor(&domains_page(), &failure).unwrap().found().unwrap();
        assert_eq!(handle.node.index, 7);
        assert_eq!(handle.node.epoch, 7);
        assert_eq!(handle.label(), "Verification failed");
    }

    #[test]
    fn switches_count_as_checkboxes() {
        let target = TargetDescriptor::new(Role::Checkbox, ["Enforce HTTPS"]);
        let handle = match_descriptor(&domains_page(), &target).unwrap().found().unwrap();
        assert_eq!(handle.checked, Some(true));
    }

    #[test]
    fn invalid_pattern_is_reported() {
        let target = TargetDescriptor::new(Role::Button, ["Save ("]);
        let err = match_descriptor(&domains_page(), &target).unwrap_err();
        assert!(matches!(err, LocatorError::InvalidPattern { ref pattern, .. } if pattern == "Save ("));
    }

    #[test]
    fn match_all_lists_every_row() {
        let rows = match_all(&domains_page(), &TargetDescriptor::new(Role::Row, [".*"])).unwrap();
        assert_eq!(rows.len(), 2);
    }
}
