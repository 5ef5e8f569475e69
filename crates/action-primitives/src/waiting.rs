//! Built-in waiting mechanisms for action primitives

use crate::{errors::ActionError, types::WaitTier};
use async_trait::async_trait;
use cdp_adapter::Cdp;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Waiting strategy trait
#[async_trait]
pub trait WaitStrategy: Send + Sync {
    /// Let the page settle after an action
    async fn wait(&self, cdp: &dyn Cdp, tier: WaitTier) -> Result<(), ActionError>;
}

/// Default waiting strategy implementation
#[derive(Debug, Clone)]
pub struct DefaultWaitStrategy {
    /// Timeout for the readyState poll (milliseconds)
    pub domready_timeout_ms: u64,

    /// Delay after DomReady actions (milliseconds)
    pub settle_ms: u64,

    /// Quiet period for the Idle tier (milliseconds)
    pub idle_quiet_ms: u64,
}

impl Default for DefaultWaitStrategy {
    fn default() -> Self {
        Self {
            domready_timeout_ms: 5000,
            settle_ms: 250,
            idle_quiet_ms: 800,
        }
    }
}

impl DefaultWaitStrategy {
    /// readyState poll only, no fixed delays.
    pub fn without_delays() -> Self {
        Self {
            settle_ms: 0,
            idle_quiet_ms: 0,
            ..Self::default()
        }
    }

    async fn wait_domready(&self, cdp: &dyn Cdp) -> Result<(), ActionError> {
        let deadline = Instant::now() + Duration::from_millis(self.domready_timeout_ms);
        loop {
            match cdp.ready_state().await {
                Ok(state) if state == "interactive" || state == "complete" => return Ok(()),
                Ok(state) => debug!(state = %state, "document not ready yet"),
                Err(err) => {
                    let err = ActionError::from(err);
                    if matches!(err, ActionError::CdpIo(_)) {
                        return Err(err);
                    }
                    debug!(error = %err, "readyState probe failed");
                }
            }
            if Instant::now() >= deadline {
                // Settling is best-effort; the next lookup has its own timeout.
                warn!(
                    timeout_ms = self.domready_timeout_ms,
                    "document did not report ready"
                );
                return Ok(());
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }
}

#[async_trait]
impl WaitStrategy for DefaultWaitStrategy {
    async fn wait(&self, cdp: &dyn Cdp, tier: WaitTier) -> Result<(), ActionError> {
        let quiet_ms = match tier {
            WaitTier::None => return Ok(()),
            WaitTier::DomReady => self.settle_ms,
            WaitTier::Idle => self.idle_quiet_ms,
        };
        self.wait_domready(cdp).await?;
        if quiet_ms > 0 {
            tokio::time::sleep(Duration::from_millis(quiet_ms)).await;
        }
        Ok(())
    }
}
