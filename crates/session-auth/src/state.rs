//! Persisted session state

use cdp_adapter::{Cookie, OriginStorage};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Authenticated browsing state of one target system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    /// Key of the target system, e.g. `play-console`
    pub target: String,
    pub saved_at: DateTime<Utc>,
    #[serde(default)]
    pub cookies: Vec<Cookie>,
    #[serde(default)]
    pub origins: Vec<OriginStorage>,
    /// Whether the post-login landmark was visible when the state was saved
    #[serde(default)]
    pub landmark_seen: bool,
}

impl SessionState {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            saved_at: Utc::now(),
            cookies: Vec::new(),
            origins: Vec::new(),
            landmark_seen: false,
        }
    }

    /// Cookies still valid at `now`.
    pub fn live_cookies(&self, now: DateTime<Utc>) -> Vec<Cookie> {
        let now = now.timestamp() as f64;
        self.cookies
            .iter()
            .filter(|cookie| !cookie.is_expired_at(now))
            .cloned()
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty() && self.origins.iter().all(|o| o.entries.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn expired_cookies_are_dropped() {
        let mut state = SessionState::new("play-console");
        let mut old = Cookie::new("OLD", "1");
        old.expires = Some(1_600_000_000.0);
        let mut session = Cookie::new("SID", "2");
        session.expires = Some(-1.0);
        state.cookies = vec![old, session];

        let now = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let live = state.live_cookies(now);
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].name, "SID");
    }

    #[test]
    fn empty_until_something_is_captured() {
        let mut state = SessionState::new("github");
        assert!(state.is_empty());
        state.origins.push(OriginStorage {
            origin: "https://github.com".into(),
            entries: vec![("theme".into(), "dark".into())],
        });
        assert!(!state.is_empty());
    }
}
