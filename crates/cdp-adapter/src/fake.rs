//! Scriptable in-memory page implementing [`Cdp`].
//!
//! Elements live in a flat list with parent links; snapshots follow the same epoch
//! rules as the browser collector, so a [`NodeRef`] from an older snapshot is stale.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use regex::RegexBuilder;
use tokio::sync::Mutex;
use url::Url;

use crate::adapter::Cdp;
use crate::dom::{DomNode, DomSnapshot, NodeRef, Rect};
use crate::error::{AdapterError, AdapterErrorKind};
use crate::storage::{Cookie, OriginStorage};

/// Stable identity of a fake element across snapshots.
pub type ElementId = u64;

type Reaction = Box<dyn FnMut(&mut FakeDom) + Send>;
type Builder = Arc<dyn Fn(&mut FakeDom) + Send + Sync>;

/// PNG signature followed by an empty IHDR-less body; enough for artifact writers.
const FAKE_PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];

#[derive(Clone, Debug, Default)]
pub struct FakeElement {
    pub tag: String,
    pub role: Option<String>,
    pub name: String,
    pub text: String,
    pub value: Option<String>,
    pub checked: Option<bool>,
    pub disabled: bool,
    pub visible: bool,
    pub parent: Option<ElementId>,
    pub options: Vec<String>,
}

impl FakeElement {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_string(),
            visible: true,
            ..Default::default()
        }
    }

    fn with_role(tag: &str, role: &str, name: &str) -> Self {
        let mut el = Self::new(tag);
        el.role = Some(role.to_string());
        el.name = name.to_string();
        el
    }

    pub fn button(name: &str) -> Self {
        let mut el = Self::with_role("button", "button", name);
        el.text = name.to_string();
        el
    }

    pub fn link(name: &str) -> Self {
        let mut el = Self::with_role("a", "link", name);
        el.text = name.to_string();
        el
    }

    pub fn tab(name: &str) -> Self {
        let mut el = Self::with_role("div", "tab", name);
        el.text = name.to_string();
        el
    }

    pub fn textbox(label: &str) -> Self {
        let mut el = Self::with_role("input", "textbox", label);
        el.value = Some(String::new());
        el
    }

    pub fn textarea(label: &str) -> Self {
        let mut el = Self::with_role("textarea", "textbox", label);
        el.value = Some(String::new());
        el
    }

    pub fn checkbox(label: &str) -> Self {
        let mut el = Self::with_role("input", "checkbox", label);
        el.checked = Some(false);
        el
    }

    pub fn radio(label: &str) -> Self {
        let mut el = Self::with_role("input", "radio", label);
        el.checked = Some(false);
        el
    }

    /// Custom dropdown trigger; options appear through an `on_click` reaction.
    pub fn combobox(label: &str) -> Self {
        let mut el = Self::with_role("div", "combobox", label);
        el.value = Some(String::new());
        el
    }

    /// Native `<select>` with the given option labels.
    pub fn select(label: &str, options: &[&str]) -> Self {
        let mut el = Self::with_role("select", "combobox", label);
        el.value = Some(String::new());
        el.options = options.iter().map(|o| o.to_string()).collect();
        el
    }

    pub fn option(label: &str) -> Self {
        let mut el = Self::with_role("div", "option", label);
        el.text = label.to_string();
        el
    }

    pub fn file_input(label: &str) -> Self {
        let mut el = Self::with_role("input", "file", label);
        el.visible = false;
        el
    }

    pub fn heading(text: &str) -> Self {
        let mut el = Self::with_role("h2", "heading", text);
        el.text = text.to_string();
        el
    }

    pub fn dialog(name: &str) -> Self {
        Self::with_role("div", "dialog", name)
    }

    /// Table row; `name` carries the full row text the way `innerText` would.
    pub fn row(text: &str) -> Self {
        let mut el = Self::with_role("tr", "row", text);
        el.text = text.to_string();
        el
    }

    pub fn text(text: &str) -> Self {
        let mut el = Self::new("div");
        el.name = text.to_string();
        el.text = text.to_string();
        el
    }

    pub fn child_of(mut self, parent: ElementId) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.disabled = true;
        self
    }

    pub fn checked(mut self, checked: bool) -> Self {
        self.checked = Some(checked);
        self
    }

    pub fn with_value(mut self, value: &str) -> Self {
        self.value = Some(value.to_string());
        self
    }

    fn label(&self) -> &str {
        if self.name.is_empty() {
            &self.text
        } else {
            &self.name
        }
    }

    fn is_editable(&self) -> bool {
        match self.role.as_deref() {
            Some("textbox") | Some("combobox") => self.tag != "select",
            None => matches!(self.tag.as_str(), "input" | "textarea"),
            _ => false,
        }
    }
}

/// Interaction recorded by [`FakePage`].
#[derive(Clone, Debug, PartialEq)]
pub enum FakeEvent {
    Navigated(String),
    Reloaded,
    WentBack(String),
    Clicked(String),
    Filled { field: String, text: String },
    Checked { field: String, checked: bool },
    Selected { field: String, option: String },
    Key(String),
    Uploaded { field: String, files: Vec<PathBuf> },
    Screenshot,
}

/// Mutable document model handed to routes and reactions.
#[derive(Default)]
pub struct FakeDom {
    url: String,
    elements: Vec<(ElementId, FakeElement)>,
    next_id: ElementId,
    reactions: HashMap<ElementId, Reaction>,
    routes: Vec<(String, Builder)>,
    reload_scripts: Vec<(u32, Builder)>,
    unreachable: Vec<String>,
}

impl FakeDom {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            ..Default::default()
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn push(&mut self, element: FakeElement) -> ElementId {
        self.next_id += 1;
        let id = self.next_id;
        self.elements.push((id, element));
        id
    }

    pub fn get(&self, id: ElementId) -> Option<&FakeElement> {
        self.elements.iter().find(|(eid, _)| *eid == id).map(|(_, el)| el)
    }

    pub fn get_mut(&mut self, id: ElementId) -> Option<&mut FakeElement> {
        self.elements
            .iter_mut()
            .find(|(eid, _)| *eid == id)
            .map(|(_, el)| el)
    }

    /// First element whose name or text equals `label`.
    pub fn find(&self, label: &str) -> Option<ElementId> {
        self.elements
            .iter()
            .find(|(_, el)| el.name == label || el.text == label)
            .map(|(id, _)| *id)
    }

    /// Removes the element together with its descendants.
    pub fn remove(&mut self, id: ElementId) {
        let mut doomed = vec![id];
        let mut cursor = 0;
        while cursor < doomed.len() {
            let parent = doomed[cursor];
            doomed.extend(
                self.elements
                    .iter()
                    .filter(|(_, el)| el.parent == Some(parent))
                    .map(|(eid, _)| *eid),
            );
            cursor += 1;
        }
        self.elements.retain(|(eid, _)| !doomed.contains(eid));
        for gone in doomed {
            self.reactions.remove(&gone);
        }
    }

    pub fn remove_role(&mut self, role: &str) {
        let ids: Vec<_> = self
            .elements
            .iter()
            .filter(|(_, el)| el.role.as_deref() == Some(role))
            .map(|(id, _)| *id)
            .collect();
        for id in ids {
            self.remove(id);
        }
    }

    pub fn clear(&mut self) {
        self.elements.clear();
        self.reactions.clear();
    }

    pub fn on_click(&mut self, id: ElementId, reaction: impl FnMut(&mut FakeDom) + Send + 'static) {
        self.reactions.insert(id, Box::new(reaction));
    }

    /// Rebuilds the document whenever a URL starting with `prefix` loads.
    pub fn route(&mut self, prefix: &str, build: impl Fn(&mut FakeDom) + Send + Sync + 'static) {
        self.routes.push((prefix.to_string(), Arc::new(build)));
    }

    /// Applies `change` on every reload from the `count`-th on.
    pub fn after_reloads(
        &mut self,
        count: u32,
        change: impl Fn(&mut FakeDom) + Send + Sync + 'static,
    ) {
        self.reload_scripts.push((count, Arc::new(change)));
    }

    /// Navigations to URLs starting with `prefix` fail with a network error.
    pub fn unreachable(&mut self, prefix: &str) {
        self.unreachable.push(prefix.to_string());
    }

    fn load(&mut self, url: &str) {
        self.url = url.to_string();
        let route = self
            .routes
            .iter()
            .filter(|(prefix, _)| url.starts_with(prefix.as_str()))
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(_, build)| Arc::clone(build));
        if let Some(build) = route {
            self.clear();
            build(self);
        }
    }

    fn run_reaction(&mut self, id: ElementId) {
        if let Some(mut reaction) = self.reactions.remove(&id) {
            reaction(self);
            self.reactions.entry(id).or_insert(reaction);
        }
    }

    fn effective_visibility(&self, element: &FakeElement) -> bool {
        let mut visible = element.visible;
        let mut parent = element.parent;
        while let (true, Some(id)) = (visible, parent) {
            match self.get(id) {
                Some(p) => {
                    visible = p.visible;
                    parent = p.parent;
                }
                None => break,
            }
        }
        visible
    }
}

struct FakeState {
    dom: FakeDom,
    epoch: u64,
    handles: Vec<ElementId>,
    reloads: u32,
    history: Vec<String>,
    events: Vec<FakeEvent>,
    cookies: Vec<Cookie>,
    storage: HashMap<String, Vec<(String, String)>>,
}

pub struct FakePage {
    state: Mutex<FakeState>,
}

impl FakePage {
    pub fn new(dom: FakeDom) -> Self {
        let history = vec![dom.url.clone()];
        Self {
            state: Mutex::new(FakeState {
                dom,
                epoch: 0,
                handles: Vec::new(),
                reloads: 0,
                history,
                events: Vec::new(),
                cookies: Vec::new(),
                storage: HashMap::new(),
            }),
        }
    }

    pub async fn events(&self) -> Vec<FakeEvent> {
        self.state.lock().await.events.clone()
    }

    pub async fn clicked(&self, label: &str) -> bool {
        self.state
            .lock()
            .await
            .events
            .iter()
            .any(|e| matches!(e, FakeEvent::Clicked(l) if l == label))
    }

    pub async fn reload_count(&self) -> u32 {
        self.state.lock().await.reloads
    }

    pub async fn value_of(&self, label: &str) -> Option<String> {
        let state = self.state.lock().await;
        let id = state.dom.find(label)?;
        state.dom.get(id).and_then(|el| el.value.clone())
    }

    pub async fn checked_state(&self, label: &str) -> Option<bool> {
        let state = self.state.lock().await;
        let id = state.dom.find(label)?;
        state.dom.get(id).and_then(|el| el.checked)
    }

    pub async fn mutate<R>(&self, change: impl FnOnce(&mut FakeDom) -> R) -> R {
        change(&mut self.state.lock().await.dom)
    }

    pub async fn stored_cookies(&self) -> Vec<Cookie> {
        self.state.lock().await.cookies.clone()
    }
}

fn stale(node: &NodeRef) -> AdapterError {
    AdapterError::new(AdapterErrorKind::TargetNotFound)
        .with_hint(format!("node {} is no longer attached", node.attribute_value()))
}

fn origin_of(url: &str) -> Option<String> {
    let origin = Url::parse(url).ok()?.origin();
    origin.is_tuple().then(|| origin.ascii_serialization())
}

impl FakeState {
    fn resolve(&self, node: &NodeRef) -> Result<ElementId, AdapterError> {
        if node.epoch != self.epoch {
            return Err(stale(node));
        }
        let id = *self.handles.get(node.index as usize).ok_or_else(|| stale(node))?;
        self.dom.get(id).map(|_| id).ok_or_else(|| stale(node))
    }

    fn element(&mut self, id: ElementId) -> Result<&mut FakeElement, AdapterError> {
        self.dom.get_mut(id).ok_or_else(|| {
            AdapterError::new(AdapterErrorKind::TargetNotFound).with_hint("element removed")
        })
    }

    fn navigate_to(&mut self, url: &str) -> Result<(), AdapterError> {
        if self.dom.unreachable.iter().any(|p| url.starts_with(p.as_str())) {
            return Err(AdapterError::new(AdapterErrorKind::CdpIo)
                .with_hint(format!("navigation to {url} failed: net::ERR_CONNECTION_REFUSED"))
                .retriable(true));
        }
        self.dom.load(url);
        Ok(())
    }
}

#[async_trait]
impl Cdp for FakePage {
    async fn navigate(&self, url: &str, _deadline: Duration) -> Result<(), AdapterError> {
        let mut state = self.state.lock().await;
        state.navigate_to(url)?;
        state.history.push(url.to_string());
        state.events.push(FakeEvent::Navigated(url.to_string()));
        Ok(())
    }

    async fn reload(&self, _deadline: Duration) -> Result<(), AdapterError> {
        let mut state = self.state.lock().await;
        state.reloads += 1;
        let url = state.dom.url.clone();
        state.navigate_to(&url)?;
        let count = state.reloads;
        let scripts: Vec<_> = state
            .dom
            .reload_scripts
            .iter()
            .filter(|(from, _)| *from <= count)
            .map(|(_, change)| Arc::clone(change))
            .collect();
        for change in scripts {
            change(&mut state.dom);
        }
        state.events.push(FakeEvent::Reloaded);
        Ok(())
    }

    async fn go_back(&self, _deadline: Duration) -> Result<(), AdapterError> {
        let mut state = self.state.lock().await;
        if state.history.len() < 2 {
            return Ok(());
        }
        state.history.pop();
        let previous = state.history.last().cloned().unwrap_or_default();
        state.navigate_to(&previous)?;
        state.events.push(FakeEvent::WentBack(previous));
        Ok(())
    }

    async fn current_url(&self) -> Result<String, AdapterError> {
        Ok(self.state.lock().await.dom.url.clone())
    }

    async fn ready_state(&self) -> Result<String, AdapterError> {
        Ok("complete".to_string())
    }

    async fn snapshot(&self) -> Result<DomSnapshot, AdapterError> {
        let mut state = self.state.lock().await;
        state.epoch += 1;
        let handles: Vec<ElementId> = state.dom.elements.iter().map(|(id, _)| *id).collect();
        let index_of: HashMap<ElementId, u32> = handles
            .iter()
            .enumerate()
            .map(|(i, id)| (*id, i as u32))
            .collect();
        let nodes = state
            .dom
            .elements
            .iter()
            .enumerate()
            .map(|(i, (_, el))| {
                let visible = state.dom.effective_visibility(el);
                DomNode {
                    index: i as u32,
                    parent: el.parent.and_then(|p| index_of.get(&p).copied()),
                    tag: el.tag.clone(),
                    role: el.role.clone(),
                    name: el.name.clone(),
                    text: el.text.clone(),
                    value: el.value.clone(),
                    checked: el.checked,
                    disabled: el.disabled,
                    visible,
                    rect: visible.then(|| Rect {
                        x: 0.0,
                        y: 24.0 * i as f64,
                        width: 200.0,
                        height: 20.0,
                    }),
                }
            })
            .collect();
        state.handles = handles;
        Ok(DomSnapshot {
            epoch: state.epoch,
            url: state.dom.url.clone(),
            nodes,
        })
    }

    async fn click(&self, node: &NodeRef) -> Result<(), AdapterError> {
        let mut state = self.state.lock().await;
        let id = state.resolve(node)?;
        let element = state.element(id)?;
        let label = element.label().to_string();
        if !element.disabled {
            match element.role.as_deref() {
                Some("checkbox") | Some("switch") => {
                    element.checked = Some(!element.checked.unwrap_or(false));
                }
                Some("radio") => element.checked = Some(true),
                _ => {}
            }
        }
        let disabled = element.disabled;
        state.events.push(FakeEvent::Clicked(label));
        if !disabled {
            state.dom.run_reaction(id);
        }
        Ok(())
    }

    async fn fill(&self, node: &NodeRef, text: &str) -> Result<(), AdapterError> {
        let mut state = self.state.lock().await;
        let id = state.resolve(node)?;
        let element = state.element(id)?;
        if !element.is_editable() {
            return Err(AdapterError::new(AdapterErrorKind::Internal)
                .with_hint(format!("{} is not editable", element.label())));
        }
        element.value = Some(text.to_string());
        let field = element.label().to_string();
        state.events.push(FakeEvent::Filled {
            field,
            text: text.to_string(),
        });
        Ok(())
    }

    async fn set_checked(&self, node: &NodeRef, checked: bool) -> Result<(), AdapterError> {
        let mut state = self.state.lock().await;
        let id = state.resolve(node)?;
        let element = state.element(id)?;
        if element.checked == Some(checked) {
            return Ok(());
        }
        element.checked = Some(checked);
        let field = element.label().to_string();
        state.events.push(FakeEvent::Checked { field, checked });
        state.dom.run_reaction(id);
        Ok(())
    }

    async fn select_native(
        &self,
        node: &NodeRef,
        label_pattern: &str,
    ) -> Result<bool, AdapterError> {
        let mut state = self.state.lock().await;
        let id = state.resolve(node)?;
        let pattern = RegexBuilder::new(label_pattern)
            .case_insensitive(true)
            .build()
            .map_err(|err| AdapterError::new(AdapterErrorKind::Internal).with_hint(err.to_string()))?;
        let element = state.element(id)?;
        let Some(option) = element.options.iter().find(|o| pattern.is_match(o)).cloned() else {
            return Ok(false);
        };
        element.value = Some(option.clone());
        let field = element.label().to_string();
        state.events.push(FakeEvent::Selected { field, option });
        Ok(true)
    }

    async fn press_key(&self, key: &str) -> Result<(), AdapterError> {
        let mut state = self.state.lock().await;
        if key == "Escape" {
            state.dom.remove_role("listbox");
        }
        state.events.push(FakeEvent::Key(key.to_string()));
        Ok(())
    }

    async fn set_input_files(
        &self,
        node: &NodeRef,
        files: &[PathBuf],
    ) -> Result<(), AdapterError> {
        let mut state = self.state.lock().await;
        let id = state.resolve(node)?;
        let element = state.element(id)?;
        if element.role.as_deref() != Some("file") {
            return Err(AdapterError::new(AdapterErrorKind::Internal)
                .with_hint(format!("{} is not a file input", element.label())));
        }
        element.value = files
            .first()
            .and_then(|f| f.file_name())
            .map(|n| n.to_string_lossy().into_owned());
        let field = element.label().to_string();
        state.events.push(FakeEvent::Uploaded {
            field,
            files: files.to_vec(),
        });
        state.dom.run_reaction(id);
        Ok(())
    }

    async fn screenshot(&self) -> Result<Vec<u8>, AdapterError> {
        self.state.lock().await.events.push(FakeEvent::Screenshot);
        Ok(FAKE_PNG.to_vec())
    }

    async fn cookies(&self) -> Result<Vec<Cookie>, AdapterError> {
        Ok(self.state.lock().await.cookies.clone())
    }

    async fn set_cookies(&self, cookies: &[Cookie]) -> Result<(), AdapterError> {
        let mut state = self.state.lock().await;
        for cookie in cookies {
            state
                .cookies
                .retain(|c| !(c.name == cookie.name && c.domain == cookie.domain));
            state.cookies.push(cookie.clone());
        }
        Ok(())
    }

    async fn local_storage(&self) -> Result<Option<OriginStorage>, AdapterError> {
        let state = self.state.lock().await;
        Ok(origin_of(&state.dom.url).map(|origin| OriginStorage {
            entries: state.storage.get(&origin).cloned().unwrap_or_default(),
            origin,
        }))
    }

    async fn set_local_storage(&self, storage: &OriginStorage) -> Result<(), AdapterError> {
        let mut state = self.state.lock().await;
        if origin_of(&state.dom.url).as_deref() != Some(storage.origin.as_str()) {
            return Err(AdapterError::new(AdapterErrorKind::Internal)
                .with_hint(format!("page is not on origin {}", storage.origin)));
        }
        let entries = state.storage.entry(storage.origin.clone()).or_default();
        for (key, value) in &storage.entries {
            entries.retain(|(k, _)| k != key);
            entries.push((key.clone(), value.clone()));
        }
        Ok(())
    }
}
