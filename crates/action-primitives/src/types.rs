//! Core data types for action primitives

use chrono::{DateTime, Utc};
use pilot_core_types::ActionId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Execution context for action primitives
///
/// Carries the deadline for timeout enforcement, the cancellation token for
/// cooperative cancellation and a unique action id for log correlation.
#[derive(Clone, Debug)]
pub struct ExecCtx {
    /// Unique identifier for this action
    pub action_id: ActionId,

    /// Deadline for this operation
    pub deadline: Instant,

    /// Cancellation token for cooperative cancellation
    pub cancel_token: CancellationToken,
}

impl ExecCtx {
    /// Create a new execution context
    pub fn new(deadline: Instant, cancel_token: CancellationToken) -> Self {
        Self {
            action_id: ActionId::new(),
            deadline,
            cancel_token,
        }
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self::new(Instant::now() + timeout, CancellationToken::new())
    }

    /// Child context bounded by both `timeout` and this context's deadline
    pub fn scoped(&self, timeout: Duration) -> Self {
        Self {
            action_id: ActionId::new(),
            deadline: self.deadline.min(Instant::now() + timeout),
            cancel_token: self.cancel_token.child_token(),
        }
    }

    /// Check if this context has been cancelled
    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    /// Check if this context has exceeded its deadline
    pub fn is_timeout(&self) -> bool {
        Instant::now() >= self.deadline
    }

    /// Get remaining time until deadline
    pub fn remaining_time(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }
}

/// Built-in settling after an action
///
/// - None: no waiting
/// - DomReady: readyState poll plus a short settle delay (element actions)
/// - Idle: readyState poll plus a longer quiet period (navigation)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum WaitTier {
    None,
    #[default]
    DomReady,
    Idle,
}

/// Result of executing one step primitive
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "reason", rename_all = "snake_case")]
pub enum StepOutcome {
    Performed,
    SkippedNotFound,
    SkippedAlreadySatisfied,
    Failed(String),
}

impl StepOutcome {
    pub fn is_skip(&self) -> bool {
        matches!(
            self,
            StepOutcome::SkippedNotFound | StepOutcome::SkippedAlreadySatisfied
        )
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, StepOutcome::Failed(_))
    }

    pub fn label(&self) -> &'static str {
        match self {
            StepOutcome::Performed => "performed",
            StepOutcome::SkippedNotFound => "skipped-not-found",
            StepOutcome::SkippedAlreadySatisfied => "skipped-already-satisfied",
            StepOutcome::Failed(_) => "failed",
        }
    }
}

impl fmt::Display for StepOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepOutcome::Failed(reason) => write!(f, "failed({reason})"),
            other => f.write_str(other.label()),
        }
    }
}

/// Action execution report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionReport {
    pub outcome: StepOutcome,

    /// Target the primitive acted on, rendered for operators
    pub target: Option<String>,

    /// When the action started
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub started_at: DateTime<Utc>,

    /// When the action finished
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub finished_at: DateTime<Utc>,

    /// Total latency in milliseconds
    pub latency_ms: u64,

    pub detail: Option<String>,
}

impl ActionReport {
    pub fn new(outcome: StepOutcome, started_at: DateTime<Utc>, latency_ms: u64) -> Self {
        Self {
            outcome,
            target: None,
            started_at,
            finished_at: Utc::now(),
            latency_ms,
            detail: None,
        }
    }

    pub fn with_target(mut self, target: impl fmt::Display) -> Self {
        self.target = Some(target.to_string());
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scoped_context_never_outlives_parent() {
        let parent = ExecCtx::with_timeout(Duration::from_millis(50));
        let child = parent.scoped(Duration::from_secs(60));
        assert!(child.deadline <= parent.deadline);
        assert_ne!(child.action_id, parent.action_id);

        parent.cancel_token.cancel();
        assert!(child.is_cancelled());
    }

    #[test]
    fn outcomes_serialize_with_reason() {
        let json = serde_json::to_value(StepOutcome::Failed("app not found".into())).unwrap();
        assert_eq!(json["kind"], "failed");
        assert_eq!(json["reason"], "app not found");
        assert!(StepOutcome::SkippedAlreadySatisfied.is_skip());
        assert_eq!(StepOutcome::Performed.to_string(), "performed");
    }
}
