//! Core types for the locator system

use std::fmt;

use cdp_adapter::{DomNode, NodeRef, Rect};
use serde::{Deserialize, Serialize};

/// Semantic role a target may take.
///
/// Roles are broader than ARIA roles: `Checkbox` also accepts switches and
/// `Text` accepts any element whose own text matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Button,
    Link,
    Textbox,
    Checkbox,
    Radio,
    Combobox,
    Option,
    Tab,
    Row,
    Heading,
    Dialog,
    FileInput,
    Text,
}

impl Role {
    pub fn name(&self) -> &'static str {
        match self {
            Role::Button => "button",
            Role::Link => "link",
            Role::Textbox => "textbox",
            Role::Checkbox => "checkbox",
            Role::Radio => "radio",
            Role::Combobox => "combobox",
            Role::Option => "option",
            Role::Tab => "tab",
            Role::Row => "row",
            Role::Heading => "heading",
            Role::Dialog => "dialog",
            Role::FileInput => "file_input",
            Role::Text => "text",
        }
    }

    /// Maps a collected DOM role onto the semantic role it satisfies.
    pub fn from_dom_role(role: &str) -> Option<Role> {
        Some(match role {
            "button" => Role::Button,
            "link" => Role::Link,
            "textbox" | "searchbox" => Role::Textbox,
            "checkbox" | "switch" => Role::Checkbox,
            "radio" => Role::Radio,
            "combobox" => Role::Combobox,
            "option" | "menuitem" | "menuitemradio" => Role::Option,
            "tab" => Role::Tab,
            "row" => Role::Row,
            "heading" => Role::Heading,
            "dialog" | "alertdialog" => Role::Dialog,
            "file" => Role::FileInput,
            _ => return None,
        })
    }

    /// Whether visibility is required for a node to count as a match.
    pub fn requires_visibility(&self) -> bool {
        !matches!(self, Role::FileInput)
    }

    pub(crate) fn accepts(&self, node: &DomNode) -> bool {
        match self {
            Role::Text => !node.text.is_empty(),
            role => node
                .role
                .as_deref()
                .and_then(Role::from_dom_role)
                .is_some_and(|r| r == *role),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Semantic, locale-tolerant description of a UI element.
///
/// A node matches when its role is one of `roles` and its label matches any
/// of `patterns` (case-insensitive regular expressions, OR-ed). With a
/// `scope`, only descendants of the scope's first match are considered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetDescriptor {
    pub roles: Vec<Role>,
    pub patterns: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<Box<TargetDescriptor>>,
}

impl TargetDescriptor {
    pub fn new<I, S>(role: Role, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            roles: vec![role],
            patterns: patterns.into_iter().map(Into::into).collect(),
            scope: None,
        }
    }

    /// Any visible element whose own text matches.
    pub fn text<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(Role::Text, patterns)
    }

    pub fn or_role(mut self, role: Role) -> Self {
        if !self.roles.contains(&role) {
            self.roles.push(role);
        }
        self
    }

    pub fn within(mut self, scope: TargetDescriptor) -> Self {
        self.scope = Some(Box::new(scope));
        self
    }
}

impl fmt::Display for TargetDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let roles: Vec<_> = self.roles.iter().map(Role::name).collect();
        write!(f, "{}[/{}/]", roles.join("|"), self.patterns.join("|"))?;
        if let Some(scope) = &self.scope {
            write!(f, " within {}", scope)?;
        }
        Ok(())
    }
}

/// Located element, valid until the next snapshot of the same page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementHandle {
    pub node: NodeRef,
    pub tag: String,
    pub role: Option<String>,
    pub name: String,
    pub text: String,
    pub value: Option<String>,
    pub checked: Option<bool>,
    pub disabled: bool,
    pub rect: Option<Rect>,
}

impl ElementHandle {
    pub(crate) fn from_node(epoch: u64, node: &DomNode) -> Self {
        Self {
            node: NodeRef {
                epoch,
                index: node.index,
            },
            tag: node.tag.clone(),
            role: node.role.clone(),
            name: node.name.clone(),
            text: node.text.clone(),
            value: node.value.clone(),
            checked: node.checked,
            disabled: node.disabled,
            rect: node.rect,
        }
    }

    /// Accessible name, or own text when the element has none.
    pub fn label(&self) -> &str {
        if self.name.is_empty() {
            &self.text
        } else {
            &self.name
        }
    }

    pub fn is_native_select(&self) -> bool {
        self.tag == "select"
    }
}

/// Outcome of a lookup: absence is a value, not an error.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Found(ElementHandle),
    NotFound,
}

impl Resolution {
    pub fn is_found(&self) -> bool {
        matches!(self, Resolution::Found(_))
    }

    pub fn found(self) -> Option<ElementHandle> {
        match self {
            Resolution::Found(handle) => Some(handle),
            Resolution::NotFound => None,
        }
    }
}
