//! Flattened DOM snapshots used for semantic element lookup.
//!
//! One `Runtime.evaluate` walks the document in order and records every element that
//! carries a role, an accessible name or its own text. Each recorded element is tagged
//! with `data-pilot-node="<epoch>:<index>"` so later commands can address it again
//! without re-running the lookup. A node reference from an older snapshot is stale once
//! its element has been re-tagged.

use serde::{Deserialize, Serialize};

pub const NODE_ATTRIBUTE: &str = "data-pilot-node";

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn center(&self) -> (f64, f64) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }
}

/// Address of an element captured by a snapshot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeRef {
    pub epoch: u64,
    pub index: u32,
}

impl NodeRef {
    pub fn attribute_value(&self) -> String {
        format!("{}:{}", self.epoch, self.index)
    }

    pub fn css_selector(&self) -> String {
        format!("[{}=\"{}\"]", NODE_ATTRIBUTE, self.attribute_value())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DomNode {
    pub index: u32,
    /// Nearest recorded ancestor.
    #[serde(default)]
    pub parent: Option<u32>,
    pub tag: String,
    /// Explicit ARIA role or the implicit role of the tag (`file` for file inputs).
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub checked: Option<bool>,
    #[serde(default)]
    pub disabled: bool,
    #[serde(default)]
    pub visible: bool,
    #[serde(default)]
    pub rect: Option<Rect>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DomSnapshot {
    pub epoch: u64,
    #[serde(default)]
    pub url: String,
    pub nodes: Vec<DomNode>,
}

impl DomSnapshot {
    pub fn node(&self, index: u32) -> Option<&DomNode> {
        self.nodes.get(index as usize).filter(|n| n.index == index)
    }

    pub fn node_ref(&self, index: u32) -> NodeRef {
        NodeRef {
            epoch: self.epoch,
            index,
        }
    }

    /// True when `index` sits below `ancestor` in the recorded hierarchy.
    pub fn is_descendant(&self, index: u32, ancestor: u32) -> bool {
        let mut cursor = self.node(index).and_then(|n| n.parent);
        while let Some(current) = cursor {
            if current == ancestor {
                return true;
            }
            cursor = self.node(current).and_then(|n| n.parent);
        }
        false
    }
}

/// Builds the collector expression for one snapshot epoch.
pub fn snapshot_expression(epoch: u64) -> String {
    format!(
        r#"(() => {{
  const EPOCH = {epoch};
  const ATTR = '{attr}';
  const SKIP = new Set(['SCRIPT', 'STYLE', 'NOSCRIPT', 'TEMPLATE', 'HEAD', 'META', 'LINK']);
  const INLINE = new Set(['B', 'I', 'EM', 'STRONG', 'SPAN', 'A', 'CODE', 'SMALL', 'MARK', 'U', 'BR']);
  const TEXTBOX_TYPES = new Set(['', 'text', 'email', 'url', 'search', 'tel', 'password', 'number']);
  const squash = (s) => (s || '').replace(/\s+/g, ' ').trim().slice(0, 400);
  const implicitRole = (el) => {{
    const tag = el.tagName;
    const type = (el.getAttribute('type') || '').toLowerCase();
    if (tag === 'A' && el.hasAttribute('href')) return 'link';
    if (tag === 'BUTTON' || tag === 'SUMMARY') return 'button';
    if (tag === 'INPUT') {{
      if (['button', 'submit', 'reset', 'image'].includes(type)) return 'button';
      if (type === 'checkbox') return 'checkbox';
      if (type === 'radio') return 'radio';
      if (type === 'file') return 'file';
      if (TEXTBOX_TYPES.has(type)) return 'textbox';
      return null;
    }}
    if (tag === 'TEXTAREA') return 'textbox';
    if (tag === 'SELECT') return 'combobox';
    if (tag === 'OPTION') return 'option';
    if (tag === 'TR') return 'row';
    if (tag === 'DIALOG') return 'dialog';
    if (/^H[1-6]$/.test(tag)) return 'heading';
    if (el.isContentEditable && el.getAttribute('contenteditable') !== null) return 'textbox';
    return null;
  }};
  const ownText = (el) => {{
    let direct = '';
    let inlineOnly = true;
    for (const child of el.childNodes) {{
      if (child.nodeType === Node.TEXT_NODE) direct += ' ' + child.textContent;
      else if (child.nodeType === Node.ELEMENT_NODE && !INLINE.has(child.tagName)) inlineOnly = false;
    }}
    if (inlineOnly && el.children.length > 0) return squash(el.textContent);
    return squash(direct);
  }};
  const labelText = (el) => {{
    const ids = (el.getAttribute('aria-labelledby') || '').split(/\s+/).filter(Boolean);
    if (ids.length) {{
      const text = ids.map((id) => document.getElementById(id)).filter(Boolean).map((n) => n.textContent).join(' ');
      if (squash(text)) return squash(text);
    }}
    const aria = el.getAttribute('aria-label');
    if (aria && squash(aria)) return squash(aria);
    if (['INPUT', 'TEXTAREA', 'SELECT'].includes(el.tagName)) {{
      const parts = [];
      if (el.id) {{
        for (const label of document.querySelectorAll('label[for="' + CSS.escape(el.id) + '"]')) parts.push(label.textContent);
      }}
      const wrapping = el.closest('label');
      if (wrapping) parts.push(wrapping.textContent);
      const field = el.closest('mat-form-field, .mat-mdc-form-field');
      if (!parts.length && field) {{
        const floating = field.querySelector('label, mat-label');
        if (floating) parts.push(floating.textContent);
      }}
      if (squash(parts.join(' '))) return squash(parts.join(' '));
      return squash(el.getAttribute('placeholder') || el.getAttribute('title') || el.getAttribute('name') || '');
    }}
    return '';
  }};
  const visible = (el) => {{
    const rect = el.getBoundingClientRect();
    if (rect.width <= 0 || rect.height <= 0) return false;
    if (typeof el.checkVisibility === 'function') return el.checkVisibility({{ visibilityProperty: true }});
    const style = getComputedStyle(el);
    return style.visibility !== 'hidden' && style.display !== 'none';
  }};
  const nodes = [];
  const walk = (el, parent) => {{
    if (SKIP.has(el.tagName)) return;
    const explicit = (el.getAttribute('role') || '').split(/\s+/)[0] || null;
    const role = explicit || implicitRole(el);
    const text = ownText(el);
    const label = labelText(el);
    let current = parent;
    if (role || text || label) {{
      const index = nodes.length;
      el.setAttribute(ATTR, EPOCH + ':' + index);
      const rect = el.getBoundingClientRect();
      let checked = null;
      if (el.tagName === 'INPUT' && ['checkbox', 'radio'].includes(el.type)) checked = !!el.checked;
      else if (el.hasAttribute('aria-checked')) checked = el.getAttribute('aria-checked') === 'true';
      let value = null;
      if (el.tagName === 'SELECT') value = el.selectedOptions.length ? squash(el.selectedOptions[0].label) : '';
      else if ('value' in el && ['INPUT', 'TEXTAREA'].includes(el.tagName)) value = el.value;
      else if (el.isContentEditable) value = el.textContent;
      else if (role === 'combobox') value = squash(el.getAttribute('aria-valuetext') || el.textContent);
      let name = label;
      if (!name && !['INPUT', 'TEXTAREA', 'SELECT'].includes(el.tagName)) {{
        name = squash(el.innerText || el.textContent || el.getAttribute('title') || el.getAttribute('alt') || '');
      }}
      nodes.push({{
        index,
        parent,
        tag: el.tagName.toLowerCase(),
        role,
        name,
        text,
        value,
        checked,
        disabled: !!el.disabled || el.getAttribute('aria-disabled') === 'true',
        visible: visible(el),
        rect: {{ x: rect.x, y: rect.y, width: rect.width, height: rect.height }},
      }});
      current = index;
    }}
    for (const child of el.children) walk(child, current);
  }};
  if (document.body) walk(document.body, null);
  return {{ epoch: EPOCH, url: location.href, nodes }};
}})()"#,
        epoch = epoch,
        attr = NODE_ATTRIBUTE,
    )
}

/// Expression evaluating to the element behind `node`, or `null` when it is gone.
pub fn lookup_expression(node: &NodeRef) -> String {
    format!(
        "document.querySelector('{}')",
        node.css_selector().replace('\'', "\\'")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn snapshot() -> DomSnapshot {
        serde_json::from_value(json!({
            "epoch": 3,
            "url": "https://example.test/apps",
            "nodes": [
                { "index": 0, "parent": null, "tag": "table", "name": "" },
                { "index": 1, "parent": 0, "tag": "tr", "role": "row", "name": "androidnews.app Pending" },
                { "index": 2, "parent": 1, "tag": "button", "role": "button", "name": "Recheck", "visible": true },
                { "index": 3, "parent": null, "tag": "button", "role": "button", "name": "Recheck", "visible": true }
            ]
        }))
        .unwrap()
    }

    #[test]
    fn parses_collector_payload_with_defaults() {
        let snap = snapshot();
        assert_eq!(snap.nodes.len(), 4);
        let row = snap.node(1).unwrap();
        assert_eq!(row.role.as_deref(), Some("row"));
        assert!(!row.visible);
        assert_eq!(row.checked, None);
    }

    #[test]
    fn descendant_walk_follows_recorded_parents() {
        let snap = snapshot();
        assert!(snap.is_descendant(2, 1));
        assert!(snap.is_descendant(2, 0));
        assert!(!snap.is_descendant(3, 1));
        assert!(!snap.is_descendant(1, 1));
    }

    #[test]
    fn node_refs_render_epoch_scoped_selectors() {
        let node = snapshot().node_ref(2);
        assert_eq!(node.css_selector(), "[data-pilot-node=\"3:2\"]");
        assert!(lookup_expression(&node).contains("3:2"));
        assert!(snapshot_expression(9).contains("const EPOCH = 9;"));
    }
}
