use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use action_flow::{ManualCheckpoint, PromptResume, SkipManual, TimedPause};
use anyhow::{Context, Result};
use cdp_adapter::{CdpAdapter, CdpConfig};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::env::ManualMode;
use crate::config::Settings;
use crate::engine::default_checkpoint;

/// How long a prompt waits for the operator before the step is skipped.
const PROMPT_TIMEOUT: Duration = Duration::from_secs(600);

pub struct CliContext {
    settings: Arc<Settings>,
    config_path: Option<PathBuf>,
    ws_url: Option<String>,
    headful: bool,
    manual: Option<ManualMode>,
    cancel: CancellationToken,
}

impl CliContext {
    pub fn new(settings: Settings, config_path: Option<PathBuf>) -> Self {
        Self {
            settings: Arc::new(settings),
            config_path,
            ws_url: None,
            headful: false,
            manual: None,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_browser(mut self, ws_url: Option<String>, headful: bool) -> Self {
        self.ws_url = ws_url;
        self.headful = headful;
        self
    }

    pub fn with_manual(mut self, manual: Option<ManualMode>) -> Self {
        self.manual = manual;
        self
    }

    pub fn settings(&self) -> &Settings {
        self.settings.as_ref()
    }

    pub fn config_path(&self) -> Option<&PathBuf> {
        self.config_path.as_ref()
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Cancels the run on Ctrl-C; the current step finishes first.
    pub fn install_interrupt_handler(&self) {
        let cancel = self.cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupt received, stopping after the current step");
                cancel.cancel();
            }
        });
    }

    pub fn checkpoint(&self) -> Arc<dyn ManualCheckpoint> {
        match self.manual {
            Some(ManualMode::Skip) => Arc::new(SkipManual),
            Some(ManualMode::Wait) => Arc::new(TimedPause::default()),
            Some(ManualMode::Prompt) => Arc::new(PromptResume::stdin(PROMPT_TIMEOUT)),
            None => default_checkpoint(&self.settings),
        }
    }

    /// Launches (or attaches to) Chrome with one page ready.
    ///
    /// `force_headful` is set by the login commands, which always need a
    /// visible window.
    pub async fn launch_browser(&self, force_headful: bool) -> Result<Arc<CdpAdapter>> {
        let headless = self.settings.headless && !self.headful && !force_headful;
        let mut cfg = CdpConfig::default().with_headless(headless);
        if let Some(ws_url) = &self.ws_url {
            cfg = cfg.with_websocket_url(ws_url.clone());
        }
        let adapter = Arc::new(CdpAdapter::new(cfg).context("Failed to configure browser")?);
        adapter.start().await.context("Failed to start browser")?;
        info!(headless, attached = self.ws_url.is_some(), "browser ready");
        Ok(adapter)
    }
}
