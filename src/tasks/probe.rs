//! Standalone asset links probe

use std::time::Duration;

use action_flow::{Step, StepAction, Workflow};
use action_gate::PollLoop;

use crate::config::Settings;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeOptions {
    pub url: String,
    pub package: String,
    pub attempts: u32,
    pub interval: Duration,
}

impl ProbeOptions {
    /// Single attempt against the configured domain and package.
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            url: settings.asset_links_url(),
            package: settings.package_name.clone(),
            attempts: 1,
            interval: Duration::from_secs(5),
        }
    }
}

pub fn workflow(options: &ProbeOptions) -> Workflow {
    let poll = PollLoop::new(options.attempts, options.interval);
    // Room for every attempt plus the per-request timeouts.
    let timeout = poll.total_wait() + Duration::from_secs(30) * poll.max_attempts();
    Workflow::new("probe-assetlinks", "probe-assetlinks")
        .step(
            Step::new(
                "asset-links",
                "Digital Asset Links",
                StepAction::PollHttp {
                    url: options.url.clone(),
                    expected_package: options.package.clone(),
                    poll,
                },
            )
            .mandatory(),
        )
        .with_timeout(timeout)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_follow_settings() {
        let options = ProbeOptions::from_settings(&Settings::default());
        assert_eq!(options.url, "https://androidnews.app/.well-known/assetlinks.json");
        assert_eq!(options.attempts, 1);
        let wf = workflow(&options);
        assert_eq!(wf.steps.len(), 1);
        assert_eq!(wf.timeout, Duration::from_secs(30));
        assert!(wf.failure_screenshot.is_none());
    }
}
