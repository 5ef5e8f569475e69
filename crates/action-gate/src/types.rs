//! Core types for outcome verification

use std::time::Duration;

use action_locator::TargetDescriptor;
use serde::{Deserialize, Serialize};

use crate::{conditions::Signal, errors::GateError, evidence::Evidence};

/// Success and failure signals of one asynchronous remote process.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeSpec {
    /// Any one of these means done
    pub success: Vec<Signal>,

    /// Any one of these means the remote side rejected the change
    pub failure: Vec<Signal>,

    /// Element whose text explains a failure (e.g. an error banner)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_detail: Option<TargetDescriptor>,
}

impl OutcomeSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn success(mut self, signal: Signal) -> Self {
        self.success.push(signal);
        self
    }

    pub fn failure(mut self, signal: Signal) -> Self {
        self.failure.push(signal);
        self
    }

    pub fn with_failure_detail(mut self, target: TargetDescriptor) -> Self {
        self.failure_detail = Some(target);
        self
    }

    pub fn validate(&self) -> Result<(), GateError> {
        if self.success.is_empty() && self.failure.is_empty() {
            return Err(GateError::InvalidSpec(
                "at least one success or failure signal is required".to_string(),
            ));
        }
        Ok(())
    }
}

/// How the page is brought up to date between attempts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Refresh {
    /// Observe the live page as it is
    #[default]
    None,
    Reload,
    Navigate(String),
}

/// Bounded retry state for asynchronous remote state.
///
/// `attempts_made` never exceeds `max_attempts`; a zero budget is clamped to
/// a single attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollLoop {
    attempts_made: u32,
    max_attempts: u32,
    interval: Duration,
    #[serde(default)]
    refresh: Refresh,
}

impl PollLoop {
    pub fn new(max_attempts: u32, interval: Duration) -> Self {
        Self {
            attempts_made: 0,
            max_attempts: max_attempts.max(1),
            interval,
            refresh: Refresh::None,
        }
    }

    /// One observation, no waiting.
    pub fn once() -> Self {
        Self::new(1, Duration::ZERO)
    }

    pub fn with_refresh(mut self, refresh: Refresh) -> Self {
        self.refresh = refresh;
        self
    }

    /// Starts the next attempt and returns its 1-based number, or `None`
    /// once the budget is spent.
    pub fn begin_attempt(&mut self) -> Option<u32> {
        if self.attempts_made >= self.max_attempts {
            return None;
        }
        self.attempts_made += 1;
        Some(self.attempts_made)
    }

    pub fn attempts_made(&self) -> u32 {
        self.attempts_made
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn refresh(&self) -> &Refresh {
        &self.refresh
    }

    pub fn is_exhausted(&self) -> bool {
        self.attempts_made >= self.max_attempts
    }

    /// Same budget with the counter reset.
    pub fn fresh(&self) -> Self {
        Self {
            attempts_made: 0,
            ..self.clone()
        }
    }

    /// Wall-clock time spent sleeping if every attempt is used.
    pub fn total_wait(&self) -> Duration {
        self.interval * self.max_attempts.saturating_sub(1)
    }
}

/// Decidable result of a poll loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum Verdict {
    Success { attempt: u32, evidence: Evidence },
    Failure { attempt: u32, detail: String },
    /// Neither signal appeared; the remote process may need more time
    Pending { attempts: u32 },
}

impl Verdict {
    pub fn is_success(&self) -> bool {
        matches!(self, Verdict::Success { .. })
    }

    pub fn attempts(&self) -> u32 {
        match self {
            Verdict::Success { attempt, .. } | Verdict::Failure { attempt, .. } => *attempt,
            Verdict::Pending { attempts } => *attempts,
        }
    }
}
