//! Manual checkpoints - pause for a human, then resume

use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::errors::FlowError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckpointOutcome {
    Resumed,
    /// Nobody confirmed before the timeout
    TimedOut,
    Skipped,
}

#[async_trait]
pub trait ManualCheckpoint: Send + Sync {
    async fn pause(&self, step: &str, instructions: &str) -> Result<CheckpointOutcome, FlowError>;
}

/// Fixed wait for the human, then resume.
#[derive(Debug, Clone)]
pub struct TimedPause {
    duration: Duration,
}

impl TimedPause {
    pub fn new(duration: Duration) -> Self {
        Self { duration }
    }
}

impl Default for TimedPause {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

#[async_trait]
impl ManualCheckpoint for TimedPause {
    async fn pause(&self, step: &str, instructions: &str) -> Result<CheckpointOutcome, FlowError> {
        warn!(
            step,
            wait_secs = self.duration.as_secs(),
            "manual step: {instructions}"
        );
        tokio::time::sleep(self.duration).await;
        info!(step, "resuming after manual pause");
        Ok(CheckpointOutcome::Resumed)
    }
}

/// Blocks until the operator presses Enter, bounded by a timeout.
pub struct PromptResume {
    input: Mutex<Box<dyn AsyncBufRead + Send + Unpin>>,
    timeout: Duration,
}

impl PromptResume {
    pub fn stdin(timeout: Duration) -> Self {
        Self::with_reader(BufReader::new(tokio::io::stdin()), timeout)
    }

    pub fn with_reader(reader: impl AsyncBufRead + Send + Unpin + 'static, timeout: Duration) -> Self {
        Self {
            input: Mutex::new(Box::new(reader)),
            timeout,
        }
    }
}

#[async_trait]
impl ManualCheckpoint for PromptResume {
    async fn pause(&self, step: &str, instructions: &str) -> Result<CheckpointOutcome, FlowError> {
        warn!(step, "manual step: {instructions}");
        eprintln!("Press Enter once done ({}s max)...", self.timeout.as_secs());
        let mut input = self.input.lock().await;
        let mut line = String::new();
        match tokio::time::timeout(self.timeout, input.read_line(&mut line)).await {
            Ok(Ok(0)) => Err(FlowError::Checkpoint("input closed before resume".to_string())),
            Ok(Ok(_)) => {
                info!(step, "operator resumed");
                Ok(CheckpointOutcome::Resumed)
            }
            Ok(Err(err)) => Err(FlowError::Checkpoint(err.to_string())),
            Err(_) => {
                warn!(step, "no confirmation before timeout, continuing");
                Ok(CheckpointOutcome::TimedOut)
            }
        }
    }
}

/// Never pauses; the step is recorded as skipped.
#[derive(Debug, Clone, Copy, Default)]
pub struct SkipManual;

#[async_trait]
impl ManualCheckpoint for SkipManual {
    async fn pause(&self, step: &str, instructions: &str) -> Result<CheckpointOutcome, FlowError> {
        info!(step, "manual step skipped: {instructions}");
        Ok(CheckpointOutcome::Skipped)
    }
}
