//! Raw DevTools transport
//!
//! One websocket to Chromium carries both browser-level and flattened page
//! session commands. [`ChromiumTransport`] owns that socket through a [`Link`]:
//! a pump task that submits commands, routes replies by call id and forwards
//! events. A link that has closed is replaced on the next command.

use std::collections::HashMap;
use std::convert::TryInto;
use std::fs;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::async_process::Child;
use chromiumoxide::browser::BrowserConfig;
use chromiumoxide::cdp::browser_protocol::target::SessionId as CdpSessionId;
use chromiumoxide::cdp::events::CdpEventMessage;
use chromiumoxide::conn::Connection;
use chromiumoxide::error::CdpError;
use chromiumoxide_types::{CallId, CdpJsonEventMessage, Message, Response};
use futures::io::{AsyncBufReadExt, BufReader};
use futures::StreamExt;
use serde_json::{json, Value};
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::CdpConfig;
use crate::error::{AdapterError, AdapterErrorKind};
use crate::metrics;

/// Flags for an unattended automation profile.
const CHROME_FLAGS: &[&str] = &[
    "--disable-background-networking",
    "--disable-breakpad",
    "--disable-component-update",
    "--disable-default-apps",
    "--disable-dev-shm-usage",
    "--disable-extensions",
    "--disable-sync",
    "--no-first-run",
    "--no-default-browser-check",
    "--password-store=basic",
    "--use-mock-keychain",
    "--remote-allow-origins=*",
];

const HEADLESS_FLAGS: &[&str] = &["--headless=new", "--hide-scrollbars", "--mute-audio"];

const DEVTOOLS_ANNOUNCE_TIMEOUT: Duration = Duration::from_secs(20);

#[derive(Clone, Debug)]
pub struct TransportEvent {
    pub method: String,
    pub params: Value,
    pub session_id: Option<String>,
}

#[derive(Clone, Debug)]
pub enum CommandTarget {
    Browser,
    Session(String),
}

#[async_trait]
pub trait CdpTransport: Send + Sync {
    async fn start(&self) -> Result<(), AdapterError>;
    async fn next_event(&self) -> Option<TransportEvent>;
    async fn send_command(
        &self,
        target: CommandTarget,
        method: &str,
        params: Value,
    ) -> Result<Value, AdapterError>;
}

/// Transport that launches Chromium, or attaches to `websocket_url`.
pub struct ChromiumTransport {
    cfg: CdpConfig,
    link: Mutex<Option<Arc<Link>>>,
}

impl ChromiumTransport {
    pub fn new(cfg: CdpConfig) -> Self {
        Self {
            cfg,
            link: Mutex::new(None),
        }
    }

    /// Open link, reconnecting when the previous one has closed.
    async fn link(&self) -> Result<Arc<Link>, AdapterError> {
        let mut slot = self.link.lock().await;
        match slot.as_ref() {
            Some(link) if link.is_open() => return Ok(link.clone()),
            Some(_) => warn!(target: "cdp-transport", "devtools link closed, reconnecting"),
            None => {}
        }
        let link = Arc::new(Link::open(&self.cfg).await?);
        *slot = Some(link.clone());
        Ok(link)
    }

    fn deadline(&self) -> Duration {
        Duration::from_millis(self.cfg.default_deadline_ms)
    }
}

#[async_trait]
impl CdpTransport for ChromiumTransport {
    async fn start(&self) -> Result<(), AdapterError> {
        self.link()
            .await?
            .call(
                CommandTarget::Browser,
                "Target.setDiscoverTargets",
                json!({ "discover": true }),
                self.deadline(),
            )
            .await
            .map(|_| ())
    }

    async fn next_event(&self) -> Option<TransportEvent> {
        // Never connects; the event pump waits for a command to open the link.
        let link = self.link.lock().await.clone()?;
        link.next_event().await
    }

    async fn send_command(
        &self,
        target: CommandTarget,
        method: &str,
        params: Value,
    ) -> Result<Value, AdapterError> {
        let link = self.link().await?;
        let started = std::time::Instant::now();
        metrics::record_command(method);
        let result = link.call(target, method, params, self.deadline()).await;
        match &result {
            Ok(_) => metrics::record_command_success(method, started.elapsed()),
            Err(err) => {
                debug!(target: "cdp-transport", method, error = %err, "command failed");
                metrics::record_command_failure(method);
            }
        }
        result
    }
}

type Reply = oneshot::Sender<Result<Value, AdapterError>>;

struct Outgoing {
    target: CommandTarget,
    method: String,
    params: Value,
    reply: Reply,
}

/// One websocket plus the task pumping it.
struct Link {
    commands: mpsc::Sender<Outgoing>,
    events: Mutex<mpsc::Receiver<TransportEvent>>,
    open: Arc<AtomicBool>,
    pump: JoinHandle<()>,
    browser: std::sync::Mutex<Option<Child>>,
}

impl Link {
    async fn open(cfg: &CdpConfig) -> Result<Self, AdapterError> {
        let (browser, ws_url) = match &cfg.websocket_url {
            Some(url) => (None, url.clone()),
            None => {
                let mut child = launch_config(cfg)?.launch().map_err(|err| {
                    AdapterError::new(AdapterErrorKind::CdpIo)
                        .with_hint(format!("failed to launch chromium: {err}"))
                })?;
                let url = wait_for_devtools(&mut child).await?;
                (Some(child), url)
            }
        };

        let conn = Connection::<CdpEventMessage>::connect(&ws_url)
            .await
            .map_err(|err| {
                AdapterError::new(AdapterErrorKind::CdpIo)
                    .with_hint(format!("cannot connect to {ws_url}: {err}"))
            })?;

        let (commands, outgoing) = mpsc::channel(64);
        let (events_tx, events) = mpsc::channel(256);
        let open = Arc::new(AtomicBool::new(true));
        let heartbeat = Duration::from_millis(cfg.heartbeat_interval_ms);
        let pump = tokio::spawn(run_link(conn, outgoing, events_tx, heartbeat, open.clone()));

        info!(
            target: "cdp-transport",
            url = %ws_url,
            launched = browser.is_some(),
            "devtools link open"
        );
        Ok(Self {
            commands,
            events: Mutex::new(events),
            open,
            pump,
            browser: std::sync::Mutex::new(browser),
        })
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::Relaxed)
    }

    async fn call(
        &self,
        target: CommandTarget,
        method: &str,
        params: Value,
        deadline: Duration,
    ) -> Result<Value, AdapterError> {
        let (reply, response) = oneshot::channel();
        let outgoing = Outgoing {
            target,
            method: method.to_string(),
            params,
            reply,
        };
        if self.commands.send(outgoing).await.is_err() {
            return Err(link_closed("devtools link closed"));
        }
        match tokio::time::timeout(deadline, response).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(link_closed("devtools link dropped the reply")),
            Err(_) => Err(AdapterError::new(AdapterErrorKind::NavTimeout)
                .with_hint(format!("{method} got no reply within {}ms", deadline.as_millis()))
                .retriable(true)),
        }
    }

    async fn next_event(&self) -> Option<TransportEvent> {
        self.events.lock().await.recv().await
    }
}

impl Drop for Link {
    fn drop(&mut self) {
        self.open.store(false, Ordering::Relaxed);
        self.pump.abort();
        let child = self.browser.get_mut().ok().and_then(Option::take);
        if let Some(mut child) = child {
            match tokio::runtime::Handle::try_current() {
                Ok(runtime) => {
                    runtime.spawn(async move {
                        if let Err(err) = child.kill().await {
                            warn!(target: "cdp-transport", ?err, "chromium did not stop");
                        }
                    });
                }
                Err(_) => warn!(target: "cdp-transport", "no runtime left to stop chromium"),
            }
        }
    }
}

/// Drives the socket until it closes, then fails every outstanding call.
async fn run_link(
    mut conn: Connection<CdpEventMessage>,
    mut outgoing: mpsc::Receiver<Outgoing>,
    events: mpsc::Sender<TransportEvent>,
    heartbeat: Duration,
    open: Arc<AtomicBool>,
) {
    let mut awaiting: HashMap<CallId, Reply> = HashMap::new();
    let beat_every = if heartbeat.is_zero() {
        Duration::from_secs(3600)
    } else {
        heartbeat
    };
    let mut beat = interval_at(Instant::now() + beat_every, beat_every);
    beat.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let reason = loop {
        tokio::select! {
            command = outgoing.recv() => {
                let Some(command) = command else {
                    break "transport dropped".to_string();
                };
                let session = match command.target {
                    CommandTarget::Browser => None,
                    CommandTarget::Session(id) => Some(CdpSessionId::from(id)),
                };
                match conn.submit_command(command.method.into(), session, command.params) {
                    Ok(call) => {
                        awaiting.insert(call, command.reply);
                    }
                    Err(err) => {
                        let _ = command.reply.send(Err(AdapterError::new(AdapterErrorKind::Internal)
                            .with_hint(format!("unencodable command: {err}"))));
                    }
                }
            }
            _ = beat.tick(), if !heartbeat.is_zero() => {
                // The reply carries an unknown call id and is dropped below.
                if let Err(err) = conn.submit_command("Browser.getVersion".into(), None, json!({})) {
                    break format!("heartbeat not sent: {err}");
                }
            }
            message = conn.next() => match message {
                Some(Ok(Message::Response(response))) => {
                    if let Some(reply) = awaiting.remove(&response.id) {
                        let _ = reply.send(reply_payload(response));
                    }
                }
                Some(Ok(Message::Event(event))) => forward_event(event, &events),
                Some(Err(err)) => break cdp_failure(err).to_string(),
                None => break "websocket closed".to_string(),
            },
        }
    };

    open.store(false, Ordering::Relaxed);
    warn!(target: "cdp-transport", %reason, in_flight = awaiting.len(), "devtools link closed");
    for (_, reply) in awaiting.drain() {
        let _ = reply.send(Err(link_closed(&reason)));
    }
}

fn forward_event(event: CdpEventMessage, events: &mpsc::Sender<TransportEvent>) {
    let raw: CdpJsonEventMessage = match event.try_into() {
        Ok(raw) => raw,
        Err(err) => {
            debug!(target: "cdp-transport", ?err, "undecodable event skipped");
            return;
        }
    };
    metrics::record_event();
    let event = TransportEvent {
        method: raw.method.into_owned(),
        params: raw.params,
        session_id: raw.session_id,
    };
    if let Err(err) = events.try_send(event) {
        debug!(target: "cdp-transport", %err, "event dropped");
    }
}

fn link_closed(reason: &str) -> AdapterError {
    AdapterError::new(AdapterErrorKind::CdpIo)
        .with_hint(reason.to_string())
        .retriable(true)
}

/// Result of a command reply; protocol errors of 500 and above are transient.
fn reply_payload(response: Response) -> Result<Value, AdapterError> {
    match (response.result, response.error) {
        (Some(result), _) => Ok(result),
        (None, Some(error)) => Err(AdapterError::new(AdapterErrorKind::CdpIo)
            .with_hint(format!("{} (code {})", error.message, error.code))
            .retriable(error.code >= 500)),
        (None, None) => {
            Err(AdapterError::new(AdapterErrorKind::Internal).with_hint("reply without result"))
        }
    }
}

fn cdp_failure(err: CdpError) -> AdapterError {
    let hint = err.to_string();
    match err {
        CdpError::Timeout => AdapterError::new(AdapterErrorKind::NavTimeout)
            .with_hint(hint)
            .retriable(true),
        CdpError::Serde(_) | CdpError::JavascriptException(_) | CdpError::FrameNotFound(_) => {
            AdapterError::new(AdapterErrorKind::Internal).with_hint(hint)
        }
        _ => AdapterError::new(AdapterErrorKind::CdpIo)
            .with_hint(hint)
            .retriable(true),
    }
}

fn launch_config(cfg: &CdpConfig) -> Result<BrowserConfig, AdapterError> {
    let executable = cfg.resolved_executable().ok_or_else(|| {
        AdapterError::new(AdapterErrorKind::CdpIo)
            .with_hint("chrome executable not found; set CONSOLE_PILOT_CHROME")
            .with_data(json!({ "configured": cfg.executable }))
    })?;

    let mut args: Vec<&str> = CHROME_FLAGS.to_vec();
    if cfg.headless {
        args.extend_from_slice(HEADLESS_FLAGS);
    }
    let mut builder = BrowserConfig::builder()
        .chrome_executable(executable)
        .window_size(cfg.viewport.width, cfg.viewport.height)
        .request_timeout(Duration::from_millis(cfg.default_deadline_ms))
        .launch_timeout(DEVTOOLS_ANNOUNCE_TIMEOUT)
        .args(args);
    if !cfg.headless {
        builder = builder.with_head();
    }
    if sandbox_disabled() {
        builder = builder.no_sandbox();
    }
    if let Some(dir) = &cfg.user_data_dir {
        let dir = if dir.is_absolute() {
            dir.clone()
        } else {
            std::env::current_dir()
                .map_err(|err| {
                    AdapterError::new(AdapterErrorKind::Internal)
                        .with_hint(format!("cannot resolve profile dir {}: {err}", dir.display()))
                })?
                .join(dir)
        };
        fs::create_dir_all(&dir).map_err(|err| {
            AdapterError::new(AdapterErrorKind::Internal)
                .with_hint(format!("cannot create profile dir {}: {err}", dir.display()))
        })?;
        builder = builder.user_data_dir(dir);
    }
    builder
        .build()
        .map_err(|err| AdapterError::new(AdapterErrorKind::Internal).with_hint(err))
}

fn sandbox_disabled() -> bool {
    std::env::var("CONSOLE_PILOT_DISABLE_SANDBOX")
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

/// Websocket URL from Chromium's "DevTools listening on ws://..." line.
fn devtools_url(line: &str) -> Option<&str> {
    let (_, url) = line.split_once("DevTools listening on ")?;
    let url = url.trim();
    (url.starts_with("ws://") || url.starts_with("wss://")).then_some(url)
}

async fn wait_for_devtools(child: &mut Child) -> Result<String, AdapterError> {
    let stderr = child.stderr.take().ok_or_else(|| {
        AdapterError::new(AdapterErrorKind::CdpIo).with_hint("chromium stderr not captured")
    })?;
    let mut lines = BufReader::new(stderr).lines();
    let mut last_line = String::new();

    let scan = async {
        while let Some(line) = lines.next().await {
            let line = line.map_err(|err| {
                AdapterError::new(AdapterErrorKind::CdpIo).with_hint(err.to_string())
            })?;
            if let Some(url) = devtools_url(&line) {
                return Ok(url.to_string());
            }
            last_line = line;
        }
        Err(AdapterError::new(AdapterErrorKind::CdpIo)
            .with_hint(format!("chromium exited before announcing devtools: {last_line}")))
    };
    tokio::time::timeout(DEVTOOLS_ANNOUNCE_TIMEOUT, scan)
        .await
        .map_err(|_| {
            AdapterError::new(AdapterErrorKind::CdpIo)
                .with_hint("chromium did not announce devtools in time")
        })?
}
