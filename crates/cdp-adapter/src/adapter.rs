use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use pilot_core_types::PageId;
use serde_json::{json, Value};
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::CdpConfig;
use crate::dom::{lookup_expression, snapshot_expression, DomSnapshot, NodeRef};
use crate::error::{AdapterError, AdapterErrorKind};
use crate::storage::{Cookie, OriginStorage};
use crate::transport::{CdpTransport, ChromiumTransport, CommandTarget, TransportEvent};

const READY_POLL: Duration = Duration::from_millis(100);

/// Page-level capability surface the automation layers drive.
///
/// Every element-addressed call takes a [`NodeRef`] produced by [`Cdp::snapshot`]; a
/// reference whose element was detached or re-tagged fails with
/// [`AdapterErrorKind::TargetNotFound`].
#[async_trait]
pub trait Cdp: Send + Sync {
    async fn navigate(&self, url: &str, deadline: Duration) -> Result<(), AdapterError>;
    async fn reload(&self, deadline: Duration) -> Result<(), AdapterError>;
    async fn go_back(&self, deadline: Duration) -> Result<(), AdapterError>;
    async fn current_url(&self) -> Result<String, AdapterError>;
    /// `document.readyState` of the current document.
    async fn ready_state(&self) -> Result<String, AdapterError>;
    async fn snapshot(&self) -> Result<DomSnapshot, AdapterError>;
    async fn click(&self, node: &NodeRef) -> Result<(), AdapterError>;
    /// Clears the field, then types `text` as a single insertion.
    async fn fill(&self, node: &NodeRef, text: &str) -> Result<(), AdapterError>;
    async fn set_checked(&self, node: &NodeRef, checked: bool) -> Result<(), AdapterError>;
    /// Picks the first `<option>` whose label matches `label_pattern`; `false` when none does.
    async fn select_native(&self, node: &NodeRef, label_pattern: &str)
        -> Result<bool, AdapterError>;
    async fn press_key(&self, key: &str) -> Result<(), AdapterError>;
    async fn set_input_files(&self, node: &NodeRef, files: &[PathBuf])
        -> Result<(), AdapterError>;
    async fn screenshot(&self) -> Result<Vec<u8>, AdapterError>;
    async fn cookies(&self) -> Result<Vec<Cookie>, AdapterError>;
    async fn set_cookies(&self, cookies: &[Cookie]) -> Result<(), AdapterError>;
    /// Storage of the page's current origin; `None` on opaque origins such as `about:blank`.
    async fn local_storage(&self) -> Result<Option<OriginStorage>, AdapterError>;
    async fn set_local_storage(&self, storage: &OriginStorage) -> Result<(), AdapterError>;
}

#[derive(Clone, Debug)]
struct PageSession {
    target_id: String,
    session_id: String,
}

/// Single-page adapter with pluggable transport.
pub struct CdpAdapter {
    page_id: PageId,
    cfg: CdpConfig,
    transport: Arc<dyn CdpTransport>,
    session: RwLock<Option<PageSession>>,
    epoch: AtomicU64,
    nav_seq: AtomicU64,
    shutdown: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl CdpAdapter {
    pub fn new(cfg: CdpConfig) -> Result<Self, AdapterError> {
        if cfg.websocket_url.is_none() && cfg.resolved_executable().is_none() {
            return Err(AdapterError::new(AdapterErrorKind::CdpIo).with_hint(
                "chrome executable not found; set CONSOLE_PILOT_CHROME or pass --ws-url",
            ));
        }
        let transport: Arc<dyn CdpTransport> = Arc::new(ChromiumTransport::new(cfg.clone()));
        Ok(Self::with_transport(cfg, transport))
    }

    pub fn with_transport(cfg: CdpConfig, transport: Arc<dyn CdpTransport>) -> Self {
        Self {
            page_id: PageId::new(),
            cfg,
            transport,
            session: RwLock::new(None),
            epoch: AtomicU64::new(0),
            nav_seq: AtomicU64::new(0),
            shutdown: CancellationToken::new(),
            tasks: Mutex::new(Vec::new()),
        }
    }

    pub fn page_id(&self) -> &PageId {
        &self.page_id
    }

    pub fn config(&self) -> &CdpConfig {
        &self.cfg
    }

    /// Connects the transport and attaches to a fresh page target. Idempotent.
    pub async fn start(self: &Arc<Self>) -> Result<(), AdapterError> {
        if self.session.read().await.is_some() {
            return Ok(());
        }

        self.transport.start().await?;
        {
            let mut tasks = self.tasks.lock().await;
            if tasks.is_empty() {
                tasks.push(tokio::spawn(Arc::clone(self).event_pump()));
            }
        }

        let created = self
            .send_browser("Target.createTarget", json!({ "url": "about:blank" }))
            .await?;
        let target_id = required_str(&created, "targetId")?;
        let attached = self
            .send_browser(
                "Target.attachToTarget",
                json!({ "targetId": target_id, "flatten": true }),
            )
            .await?;
        let session_id = required_str(&attached, "sessionId")?;
        *self.session.write().await = Some(PageSession {
            target_id: target_id.clone(),
            session_id: session_id.clone(),
        });

        self.send_page("Page.enable", json!({})).await?;
        self.send_page(
            "Emulation.setDeviceMetricsOverride",
            json!({
                "width": self.cfg.viewport.width,
                "height": self.cfg.viewport.height,
                "deviceScaleFactor": 1,
                "mobile": false,
            }),
        )
        .await?;

        info!(
            target: "cdp-adapter",
            page = %self.page_id,
            target_id = %target_id,
            session = %session_id,
            headless = self.cfg.headless,
            "page session attached"
        );
        Ok(())
    }

    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        let session = self.session.write().await.take();
        if let Some(session) = session {
            if let Err(err) = self
                .send_browser(
                    "Target.closeTarget",
                    json!({ "targetId": session.target_id }),
                )
                .await
            {
                debug!(target: "cdp-adapter", ?err, "closeTarget failed during shutdown");
            }
        }
        let mut handles = self.tasks.lock().await;
        while let Some(handle) = handles.pop() {
            let _ = handle.await;
        }
    }

    async fn event_pump(self: Arc<Self>) {
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                event = self.transport.next_event() => match event {
                    Some(event) => self.observe_event(event).await,
                    None => sleep(Duration::from_millis(200)).await,
                },
            }
        }
    }

    async fn observe_event(&self, event: TransportEvent) {
        let ours = {
            let guard = self.session.read().await;
            match (&*guard, &event.session_id) {
                (Some(session), Some(id)) => &session.session_id == id,
                (_, None) => true,
                _ => false,
            }
        };
        if !ours {
            return;
        }

        match event.method.as_str() {
            "Page.javascriptDialogOpening" => {
                let message = event
                    .params
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                warn!(target: "cdp-adapter", %message, "accepting javascript dialog");
                if let Err(err) = self
                    .send_page("Page.handleJavaScriptDialog", json!({ "accept": true }))
                    .await
                {
                    warn!(target: "cdp-adapter", ?err, "failed to dismiss dialog");
                }
            }
            "Inspector.targetCrashed" | "Target.targetCrashed" => {
                warn!(target: "cdp-adapter", page = %self.page_id, "page target crashed");
            }
            "Target.detachedFromTarget" => {
                let detached = event.params.get("sessionId").and_then(Value::as_str);
                let mut guard = self.session.write().await;
                if guard.as_ref().map(|s| Some(s.session_id.as_str())) == Some(detached) {
                    warn!(target: "cdp-adapter", page = %self.page_id, "page session detached");
                    *guard = None;
                }
            }
            other => debug!(target: "cdp-adapter", method = other, "cdp event"),
        }
    }

    async fn send_browser(&self, method: &str, params: Value) -> Result<Value, AdapterError> {
        self.transport
            .send_command(CommandTarget::Browser, method, params)
            .await
    }

    async fn send_page(&self, method: &str, params: Value) -> Result<Value, AdapterError> {
        let session = self
            .session
            .read()
            .await
            .as_ref()
            .map(|s| s.session_id.clone())
            .ok_or_else(|| {
                AdapterError::new(AdapterErrorKind::NotAttached)
                    .with_hint(format!("no page session for {method}"))
            })?;
        self.transport
            .send_command(CommandTarget::Session(session), method, params)
            .await
    }

    async fn evaluate(&self, expression: &str) -> Result<Value, AdapterError> {
        let response = self
            .send_page(
                "Runtime.evaluate",
                json!({
                    "expression": expression,
                    "returnByValue": true,
                    "awaitPromise": true,
                }),
            )
            .await?;
        if let Some(details) = response.get("exceptionDetails") {
            let text = details
                .pointer("/exception/description")
                .or_else(|| details.get("text"))
                .and_then(Value::as_str)
                .unwrap_or("script exception");
            return Err(AdapterError::new(AdapterErrorKind::Internal)
                .with_hint(text.to_string())
                .with_data(details.clone()));
        }
        Ok(response
            .pointer("/result/value")
            .cloned()
            .unwrap_or(Value::Null))
    }

    async fn mark_document(&self) -> String {
        let marker = format!("nav-{}", self.nav_seq.fetch_add(1, Ordering::Relaxed) + 1);
        let expression = format!("window.__pilotNavMarker = '{marker}'");
        if let Err(err) = self.evaluate(&expression).await {
            debug!(target: "cdp-adapter", ?err, "could not mark document before navigation");
        }
        marker
    }

    /// Polls `document.readyState`, ignoring the document tagged with `stale_marker`.
    async fn wait_for_document(
        &self,
        stale_marker: Option<&str>,
        deadline: Duration,
    ) -> Result<(), AdapterError> {
        let deadline_at = Instant::now() + deadline;
        let expression = match stale_marker {
            Some(marker) => format!(
                "window.__pilotNavMarker === '{marker}' ? 'stale' : document.readyState"
            ),
            None => "document.readyState".to_string(),
        };
        loop {
            match self.evaluate(&expression).await {
                Ok(Value::String(state)) if state == "interactive" || state == "complete" => {
                    return Ok(())
                }
                Ok(_) => {}
                Err(err) if err.kind == AdapterErrorKind::NotAttached => return Err(err),
                Err(err) => debug!(target: "cdp-adapter", ?err, "readyState probe failed"),
            }
            if Instant::now() >= deadline_at {
                return Err(AdapterError::new(AdapterErrorKind::NavTimeout)
                    .with_hint("document did not become ready before deadline")
                    .retriable(true));
            }
            sleep(READY_POLL).await;
        }
    }

    async fn element_call(&self, node: &NodeRef, body: &str) -> Result<Value, AdapterError> {
        let expression = format!(
            "(() => {{ const el = {lookup}; if (!el || !el.isConnected) return {{ status: 'not-found' }}; {body} }})()",
            lookup = lookup_expression(node),
            body = body,
        );
        let value = self.evaluate(&expression).await?;
        if value.get("status").and_then(Value::as_str) == Some("not-found") {
            return Err(AdapterError::new(AdapterErrorKind::TargetNotFound)
                .with_hint(format!("node {} is no longer attached", node.attribute_value())));
        }
        Ok(value)
    }

    async fn read_checked(&self, node: &NodeRef) -> Result<bool, AdapterError> {
        let value = self
            .element_call(
                node,
                "const checked = (el.tagName === 'INPUT' && 'checked' in el) ? el.checked : el.getAttribute('aria-checked') === 'true'; return { status: 'ok', checked };",
            )
            .await?;
        Ok(value.get("checked").and_then(Value::as_bool).unwrap_or(false))
    }

    async fn dispatch_click(&self, x: f64, y: f64) -> Result<(), AdapterError> {
        for kind in ["mouseMoved", "mousePressed", "mouseReleased"] {
            let mut payload = json!({
                "type": kind,
                "x": x,
                "y": y,
                "pointerType": "mouse",
            });
            if kind != "mouseMoved" {
                payload["button"] = json!("left");
                payload["buttons"] = json!(1);
                payload["clickCount"] = json!(1);
            }
            self.send_page("Input.dispatchMouseEvent", payload).await?;
        }
        Ok(())
    }
}

fn required_str(value: &Value, field: &str) -> Result<String, AdapterError> {
    value
        .get(field)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| {
            AdapterError::new(AdapterErrorKind::Internal)
                .with_hint(format!("cdp response missing {field}"))
        })
}

fn key_definition(key: &str) -> (String, String, i64, Option<String>) {
    match key {
        "Enter" => ("Enter".into(), "Enter".into(), 13, Some("\r".into())),
        "Escape" => ("Escape".into(), "Escape".into(), 27, None),
        "Tab" => ("Tab".into(), "Tab".into(), 9, None),
        other => {
            let code = other
                .chars()
                .next()
                .map(|c| c.to_ascii_uppercase() as i64)
                .unwrap_or(0);
            (other.into(), other.into(), code, Some(other.into()))
        }
    }
}

#[async_trait]
impl Cdp for CdpAdapter {
    async fn navigate(&self, url: &str, deadline: Duration) -> Result<(), AdapterError> {
        let marker = self.mark_document().await;
        let response = self.send_page("Page.navigate", json!({ "url": url })).await?;
        if let Some(error) = response
            .get("errorText")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
        {
            return Err(AdapterError::new(AdapterErrorKind::CdpIo)
                .with_hint(format!("navigation to {url} failed: {error}"))
                .retriable(true));
        }
        // Same-document navigations carry no loaderId and keep the marker.
        let stale = response.get("loaderId").map(|_| marker.as_str());
        self.wait_for_document(stale, deadline).await
    }

    async fn reload(&self, deadline: Duration) -> Result<(), AdapterError> {
        let marker = self.mark_document().await;
        self.send_page("Page.reload", json!({ "ignoreCache": false }))
            .await?;
        self.wait_for_document(Some(&marker), deadline).await
    }

    async fn go_back(&self, deadline: Duration) -> Result<(), AdapterError> {
        let history = self
            .send_page("Page.getNavigationHistory", json!({}))
            .await?;
        let current = history
            .get("currentIndex")
            .and_then(Value::as_i64)
            .unwrap_or(0);
        if current <= 0 {
            debug!(target: "cdp-adapter", "no history entry to go back to");
            return Ok(());
        }
        let entry_id = history
            .pointer(&format!("/entries/{}/id", current - 1))
            .and_then(Value::as_i64)
            .ok_or_else(|| {
                AdapterError::new(AdapterErrorKind::Internal)
                    .with_hint("navigation history entry missing id")
            })?;
        self.send_page(
            "Page.navigateToHistoryEntry",
            json!({ "entryId": entry_id }),
        )
        .await?;
        sleep(Duration::from_millis(300)).await;
        self.wait_for_document(None, deadline).await
    }

    async fn current_url(&self) -> Result<String, AdapterError> {
        Ok(self
            .evaluate("location.href")
            .await?
            .as_str()
            .unwrap_or_default()
            .to_string())
    }

    async fn ready_state(&self) -> Result<String, AdapterError> {
        Ok(self
            .evaluate("document.readyState")
            .await?
            .as_str()
            .unwrap_or("loading")
            .to_string())
    }

    async fn snapshot(&self) -> Result<DomSnapshot, AdapterError> {
        let epoch = self.epoch.fetch_add(1, Ordering::Relaxed) + 1;
        let value = self.evaluate(&snapshot_expression(epoch)).await?;
        serde_json::from_value(value).map_err(|err| {
            AdapterError::new(AdapterErrorKind::Internal)
                .with_hint(format!("malformed dom snapshot: {err}"))
        })
    }

    async fn click(&self, node: &NodeRef) -> Result<(), AdapterError> {
        let value = self
            .element_call(
                node,
                "el.scrollIntoView({ block: 'center', inline: 'center' }); const r = el.getBoundingClientRect(); if (r.width <= 0 || r.height <= 0) { el.click(); return { status: 'script' }; } return { status: 'ok', x: r.x + r.width / 2, y: r.y + r.height / 2 };",
            )
            .await?;
        if value.get("status").and_then(Value::as_str) == Some("script") {
            debug!(target: "cdp-adapter", node = %node.attribute_value(), "zero-size element clicked via script");
            return Ok(());
        }
        let x = value.get("x").and_then(Value::as_f64).unwrap_or_default();
        let y = value.get("y").and_then(Value::as_f64).unwrap_or_default();
        self.dispatch_click(x, y).await
    }

    async fn fill(&self, node: &NodeRef, text: &str) -> Result<(), AdapterError> {
        self.element_call(
            node,
            "el.scrollIntoView({ block: 'center' }); el.focus(); if (el.isContentEditable) { el.textContent = ''; } else { const proto = el.tagName === 'TEXTAREA' ? HTMLTextAreaElement.prototype : HTMLInputElement.prototype; Object.getOwnPropertyDescriptor(proto, 'value').set.call(el, ''); } el.dispatchEvent(new Event('input', { bubbles: true })); return { status: 'ok' };",
        )
        .await?;
        if !text.is_empty() {
            self.send_page("Input.insertText", json!({ "text": text }))
                .await?;
        }
        self.element_call(
            node,
            "el.dispatchEvent(new Event('change', { bubbles: true })); return { status: 'ok' };",
        )
        .await?;
        Ok(())
    }

    async fn set_checked(&self, node: &NodeRef, checked: bool) -> Result<(), AdapterError> {
        if self.read_checked(node).await? == checked {
            return Ok(());
        }
        self.click(node).await?;
        if self.read_checked(node).await? == checked {
            return Ok(());
        }
        self.element_call(node, "el.click(); return { status: 'ok' };")
            .await?;
        if self.read_checked(node).await? == checked {
            return Ok(());
        }
        Err(AdapterError::new(AdapterErrorKind::Internal).with_hint(format!(
            "control {} did not switch to checked={checked}",
            node.attribute_value()
        )))
    }

    async fn select_native(
        &self,
        node: &NodeRef,
        label_pattern: &str,
    ) -> Result<bool, AdapterError> {
        let pattern = serde_json::to_string(label_pattern).map_err(|err| {
            AdapterError::new(AdapterErrorKind::Internal).with_hint(err.to_string())
        })?;
        let body = format!(
            "const raw = {pattern}; let test; try {{ const re = new RegExp(raw, 'i'); test = (s) => re.test(s); }} catch (_) {{ test = (s) => s.toLowerCase().includes(raw.toLowerCase()); }} const option = Array.from(el.options || []).find((o) => test(o.label || o.text)); if (!option) return {{ status: 'missing' }}; el.value = option.value; el.dispatchEvent(new Event('input', {{ bubbles: true }})); el.dispatchEvent(new Event('change', {{ bubbles: true }})); return {{ status: 'ok' }};"
        );
        let value = self.element_call(node, &body).await?;
        Ok(value.get("status").and_then(Value::as_str) == Some("ok"))
    }

    async fn press_key(&self, key: &str) -> Result<(), AdapterError> {
        let (key, code, vk, text) = key_definition(key);
        let mut down = json!({
            "type": "keyDown",
            "key": key,
            "code": code,
            "windowsVirtualKeyCode": vk,
        });
        if let Some(text) = text {
            down["text"] = json!(text);
        }
        self.send_page("Input.dispatchKeyEvent", down).await?;
        self.send_page(
            "Input.dispatchKeyEvent",
            json!({
                "type": "keyUp",
                "key": key,
                "code": code,
                "windowsVirtualKeyCode": vk,
            }),
        )
        .await?;
        Ok(())
    }

    async fn set_input_files(
        &self,
        node: &NodeRef,
        files: &[PathBuf],
    ) -> Result<(), AdapterError> {
        let response = self
            .send_page(
                "Runtime.evaluate",
                json!({ "expression": lookup_expression(node), "returnByValue": false }),
            )
            .await?;
        let object_id = response
            .pointer("/result/objectId")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                AdapterError::new(AdapterErrorKind::TargetNotFound)
                    .with_hint(format!("file input {} not attached", node.attribute_value()))
            })?
            .to_string();
        let mut paths = Vec::with_capacity(files.len());
        for file in files {
            let absolute = std::fs::canonicalize(file).map_err(|err| {
                AdapterError::new(AdapterErrorKind::Internal)
                    .with_hint(format!("cannot resolve {}: {err}", file.display()))
            })?;
            paths.push(absolute.to_string_lossy().into_owned());
        }
        self.send_page(
            "DOM.setFileInputFiles",
            json!({ "files": paths, "objectId": object_id }),
        )
        .await?;
        Ok(())
    }

    async fn screenshot(&self) -> Result<Vec<u8>, AdapterError> {
        let response = self
            .send_page("Page.captureScreenshot", json!({ "format": "png" }))
            .await?;
        let data = response
            .get("data")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                AdapterError::new(AdapterErrorKind::Internal).with_hint("missing screenshot data")
            })?;
        STANDARD
            .decode(data)
            .map_err(|err| AdapterError::new(AdapterErrorKind::Internal).with_hint(err.to_string()))
    }

    async fn cookies(&self) -> Result<Vec<Cookie>, AdapterError> {
        let response = self.send_browser("Storage.getCookies", json!({})).await?;
        let cookies = response.get("cookies").cloned().unwrap_or(Value::Array(vec![]));
        serde_json::from_value(cookies).map_err(|err| {
            AdapterError::new(AdapterErrorKind::Internal)
                .with_hint(format!("malformed cookie payload: {err}"))
        })
    }

    async fn set_cookies(&self, cookies: &[Cookie]) -> Result<(), AdapterError> {
        if cookies.is_empty() {
            return Ok(());
        }
        self.send_browser("Storage.setCookies", json!({ "cookies": cookies }))
            .await?;
        Ok(())
    }

    async fn local_storage(&self) -> Result<Option<OriginStorage>, AdapterError> {
        let value = self
            .evaluate(
                "(() => { try { if (!location.origin || location.origin === 'null') return null; const entries = []; for (let i = 0; i < localStorage.length; i++) { const key = localStorage.key(i); entries.push([key, localStorage.getItem(key)]); } return { origin: location.origin, entries }; } catch (_) { return null; } })()",
            )
            .await?;
        if value.is_null() {
            return Ok(None);
        }
        serde_json::from_value(value).map(Some).map_err(|err| {
            AdapterError::new(AdapterErrorKind::Internal)
                .with_hint(format!("malformed local storage payload: {err}"))
        })
    }

    async fn set_local_storage(&self, storage: &OriginStorage) -> Result<(), AdapterError> {
        let payload = serde_json::to_string(storage).map_err(|err| {
            AdapterError::new(AdapterErrorKind::Internal).with_hint(err.to_string())
        })?;
        let expression = format!(
            "(() => {{ const s = {payload}; if (location.origin !== s.origin) return false; for (const [k, v] of s.entries) localStorage.setItem(k, v); return true; }})()"
        );
        match self.evaluate(&expression).await? {
            Value::Bool(true) => Ok(()),
            _ => Err(AdapterError::new(AdapterErrorKind::Internal).with_hint(format!(
                "page is not on origin {}",
                storage.origin
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{HashMap, VecDeque};

    #[derive(Default)]
    struct MockTransport {
        commands: Mutex<Vec<(Option<String>, String, Value)>>,
        responses: Mutex<HashMap<String, VecDeque<Value>>>,
    }

    impl MockTransport {
        async fn respond(&self, method: &str, value: Value) {
            self.responses
                .lock()
                .await
                .entry(method.to_string())
                .or_default()
                .push_back(value);
        }

        async fn methods(&self) -> Vec<String> {
            self.commands
                .lock()
                .await
                .iter()
                .map(|(_, method, _)| method.clone())
                .collect()
        }

        async fn sent(&self, method: &str) -> Vec<(Option<String>, Value)> {
            self.commands
                .lock()
                .await
                .iter()
                .filter(|(_, m, _)| m == method)
                .map(|(session, _, params)| (session.clone(), params.clone()))
                .collect()
        }
    }

    #[async_trait]
    impl CdpTransport for MockTransport {
        async fn start(&self) -> Result<(), AdapterError> {
            Ok(())
        }

        async fn next_event(&self) -> Option<TransportEvent> {
            None
        }

        async fn send_command(
            &self,
            target: CommandTarget,
            method: &str,
            params: Value,
        ) -> Result<Value, AdapterError> {
            let session = match target {
                CommandTarget::Browser => None,
                CommandTarget::Session(id) => Some(id),
            };
            self.commands
                .lock()
                .await
                .push((session, method.to_string(), params));
            Ok(self
                .responses
                .lock()
                .await
                .get_mut(method)
                .and_then(|queue| queue.pop_front())
                .unwrap_or_else(|| json!({})))
        }
    }

    async fn started_adapter() -> (Arc<CdpAdapter>, Arc<MockTransport>) {
        let transport = Arc::new(MockTransport::default());
        transport
            .respond("Target.createTarget", json!({ "targetId": "T1" }))
            .await;
        transport
            .respond("Target.attachToTarget", json!({ "sessionId": "S1" }))
            .await;
        let adapter = Arc::new(CdpAdapter::with_transport(
            CdpConfig::default(),
            transport.clone() as Arc<dyn CdpTransport>,
        ));
        adapter.start().await.expect("start adapter");
        (adapter, transport)
    }

    fn evaluated(value: Value) -> Value {
        json!({ "result": { "type": "object", "value": value } })
    }

    #[tokio::test]
    async fn start_attaches_page_session_with_viewport() {
        let (adapter, transport) = started_adapter().await;
        let methods = transport.methods().await;
        assert_eq!(methods[0], "Target.createTarget");
        assert_eq!(methods[1], "Target.attachToTarget");
        let metrics = transport.sent("Emulation.setDeviceMetricsOverride").await;
        assert_eq!(metrics[0].0.as_deref(), Some("S1"));
        assert_eq!(metrics[0].1["width"], 1440);

        adapter.start().await.unwrap();
        assert_eq!(transport.sent("Target.createTarget").await.len(), 1);
        adapter.shutdown().await;
        assert_eq!(transport.sent("Target.closeTarget").await.len(), 1);
    }

    #[tokio::test]
    async fn page_commands_require_attachment() {
        let adapter = CdpAdapter::with_transport(
            CdpConfig::default(),
            Arc::new(MockTransport::default()) as Arc<dyn CdpTransport>,
        );
        let err = adapter.current_url().await.unwrap_err();
        assert_eq!(err.kind, AdapterErrorKind::NotAttached);
    }

    #[tokio::test]
    async fn click_dispatches_mouse_events_at_element_center() {
        let (adapter, transport) = started_adapter().await;
        transport
            .respond(
                "Runtime.evaluate",
                evaluated(json!({ "status": "ok", "x": 40.0, "y": 12.5 })),
            )
            .await;
        let node = NodeRef { epoch: 1, index: 4 };
        adapter.click(&node).await.expect("click");

        let events = transport.sent("Input.dispatchMouseEvent").await;
        let kinds: Vec<_> = events
            .iter()
            .map(|(_, p)| p["type"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(kinds, vec!["mouseMoved", "mousePressed", "mouseReleased"]);
        assert_eq!(events[1].1["x"], 40.0);
        assert_eq!(events[1].1["y"], 12.5);
        let (_, eval) = &transport.sent("Runtime.evaluate").await[0];
        assert!(eval["expression"].as_str().unwrap().contains("1:4"));
    }

    #[tokio::test]
    async fn detached_node_reports_target_not_found() {
        let (adapter, transport) = started_adapter().await;
        transport
            .respond("Runtime.evaluate", evaluated(json!({ "status": "not-found" })))
            .await;
        let err = adapter
            .click(&NodeRef { epoch: 2, index: 0 })
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        assert!(transport.sent("Input.dispatchMouseEvent").await.is_empty());
    }

    #[tokio::test]
    async fn fill_clears_then_inserts_text() {
        let (adapter, transport) = started_adapter().await;
        transport
            .respond("Runtime.evaluate", evaluated(json!({ "status": "ok" })))
            .await;
        transport
            .respond("Runtime.evaluate", evaluated(json!({ "status": "ok" })))
            .await;
        adapter
            .fill(&NodeRef { epoch: 1, index: 2 }, "Closed Test Build")
            .await
            .expect("fill");
        let methods = transport.methods().await;
        let insert_at = methods.iter().position(|m| m == "Input.insertText").unwrap();
        let first_eval = methods.iter().position(|m| m == "Runtime.evaluate").unwrap();
        assert!(first_eval < insert_at);
        assert_eq!(
            transport.sent("Input.insertText").await[0].1["text"],
            "Closed Test Build"
        );
    }

    #[tokio::test]
    async fn snapshots_advance_the_epoch() {
        let (adapter, transport) = started_adapter().await;
        transport
            .respond(
                "Runtime.evaluate",
                evaluated(json!({ "epoch": 1, "url": "about:blank", "nodes": [] })),
            )
            .await;
        transport
            .respond(
                "Runtime.evaluate",
                evaluated(json!({ "epoch": 2, "url": "about:blank", "nodes": [] })),
            )
            .await;
        let first = adapter.snapshot().await.unwrap();
        let second = adapter.snapshot().await.unwrap();
        assert_eq!((first.epoch, second.epoch), (1, 2));
        let evals = transport.sent("Runtime.evaluate").await;
        assert!(evals[1].1["expression"]
            .as_str()
            .unwrap()
            .contains("const EPOCH = 2;"));
    }

    #[tokio::test]
    async fn navigation_error_text_is_surfaced() {
        let (adapter, transport) = started_adapter().await;
        transport
            .respond(
                "Page.navigate",
                json!({ "frameId": "F", "errorText": "net::ERR_NAME_NOT_RESOLVED" }),
            )
            .await;
        let err = adapter
            .navigate("https://nowhere.invalid", Duration::from_secs(1))
            .await
            .unwrap_err();
        assert_eq!(err.kind, AdapterErrorKind::CdpIo);
        assert!(err.to_string().contains("ERR_NAME_NOT_RESOLVED"));
    }

    #[tokio::test]
    async fn navigation_waits_for_fresh_document() {
        let (adapter, transport) = started_adapter().await;
        transport
            .respond("Page.navigate", json!({ "frameId": "F", "loaderId": "L1" }))
            .await;
        // marker assignment, stale document, then the new document.
        transport.respond("Runtime.evaluate", evaluated(json!("nav-1"))).await;
        transport.respond("Runtime.evaluate", evaluated(json!("stale"))).await;
        transport.respond("Runtime.evaluate", evaluated(json!("complete"))).await;
        adapter
            .navigate("https://play.google.com/console", Duration::from_secs(2))
            .await
            .expect("navigate");
        assert_eq!(transport.sent("Runtime.evaluate").await.len(), 3);
    }

    #[tokio::test]
    async fn cookies_are_read_from_browser_storage() {
        let (adapter, transport) = started_adapter().await;
        transport
            .respond(
                "Storage.getCookies",
                json!({ "cookies": [{ "name": "SID", "value": "x", "domain": ".google.com" }] }),
            )
            .await;
        let cookies = adapter.cookies().await.unwrap();
        assert_eq!(cookies.len(), 1);
        assert_eq!(cookies[0].domain.as_deref(), Some(".google.com"));
        let sent = transport.sent("Storage.getCookies").await;
        assert_eq!(sent[0].0, None);
    }
}
