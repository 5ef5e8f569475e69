//! Error handling module
//!
//! Task-level failures that stop a run before it produces a report. Step
//! failures never show up here; they live in the run report.

use action_flow::FlowError;
use cdp_adapter::AdapterError;
use endpoint_probe::ProbeError;
use session_auth::SessionError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PilotError {
    /// A task needs a setting that is not configured
    #[error("Missing configuration: {0}")]
    MissingSetting(&'static str),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Workflow error: {0}")]
    Flow(#[from] FlowError),

    #[error("Browser error: {0}")]
    Browser(#[from] AdapterError),

    #[error("HTTP client error: {0}")]
    Probe(#[from] ProbeError),
}

impl PilotError {
    /// Hint printed next to the error for the operator.
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            PilotError::Session(err) if err.needs_login() => {
                Some("run `console-pilot login` (or `github-login`) first")
            }
            PilotError::Browser(_) => {
                Some("set CONSOLE_PILOT_CHROME or pass --ws-url to reach a browser")
            }
            PilotError::MissingSetting(_) => Some("set it in the environment or config file"),
            _ => None,
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            PilotError::Flow(err) => err.is_retryable(),
            PilotError::Browser(err) => err.retriable,
            PilotError::Probe(err) => err.is_retryable(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn missing_session_points_at_login() {
        let err = PilotError::from(SessionError::SessionMissing(PathBuf::from("auth/state.json")));
        assert!(err.hint().unwrap().contains("login"));
        assert!(!err.is_retryable());
    }

    #[test]
    fn missing_setting_names_the_key() {
        let err = PilotError::MissingSetting("PAGES_REPO_OWNER");
        assert_eq!(err.to_string(), "Missing configuration: PAGES_REPO_OWNER");
    }
}
