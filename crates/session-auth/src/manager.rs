//! Interactive login and session restore

use std::sync::Arc;
use std::time::Duration;

use action_locator::{DefaultElementResolver, ElementResolver, Role, TargetDescriptor};
use cdp_adapter::{AdapterErrorKind, Cdp};
use chrono::Utc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::{errors::SessionError, state::SessionState, store::SessionStore};

const NAVIGATION_TIMEOUT: Duration = Duration::from_secs(60);

/// Where a human signs in and what proves they did.
#[derive(Debug, Clone)]
pub struct LoginProfile {
    /// Key stored with the session, e.g. `play-console`
    pub target: String,
    pub entry_url: String,
    /// Element only visible once authenticated
    pub landmark: TargetDescriptor,
    pub timeout: Duration,
    pub poll_interval: Duration,
}

impl LoginProfile {
    pub fn play_console(entry_url: impl Into<String>) -> Self {
        Self {
            target: "play-console".to_string(),
            entry_url: entry_url.into(),
            landmark: TargetDescriptor::text(["All apps|Tutte le app|Tutte le applicazioni"]),
            timeout: Duration::from_secs(120),
            poll_interval: Duration::from_secs(2),
        }
    }

    pub fn github() -> Self {
        Self {
            target: "github".to_string(),
            entry_url: "https://github.com/login".to_string(),
            landmark: TargetDescriptor::new(Role::Link, ["Sign out"]).or_role(Role::Button),
            timeout: Duration::from_secs(120),
            poll_interval: Duration::from_secs(2),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

pub struct SessionManager {
    store: SessionStore,
    cdp: Arc<dyn Cdp>,
    resolver: DefaultElementResolver,
    profile: LoginProfile,
}

impl SessionManager {
    pub fn new(store: SessionStore, cdp: Arc<dyn Cdp>, profile: LoginProfile) -> Self {
        Self {
            resolver: DefaultElementResolver::new(cdp.clone()),
            store,
            cdp,
            profile,
        }
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub fn profile(&self) -> &LoginProfile {
        &self.profile
    }

    /// Waits for a human to sign in, then persists whatever state the
    /// browser holds, even when the landmark never showed up.
    pub async fn login(&self) -> Result<SessionState, SessionError> {
        info!(
            target_system = %self.profile.target,
            url = %self.profile.entry_url,
            timeout_secs = self.profile.timeout.as_secs(),
            "sign in manually in the opened browser, second factor included"
        );
        if let Err(err) = self.cdp.navigate(&self.profile.entry_url, NAVIGATION_TIMEOUT).await {
            if err.kind == AdapterErrorKind::NotAttached {
                return Err(err.into());
            }
            warn!(error = %err, "entry page did not finish loading");
        }

        let landmark_seen = self.wait_for_landmark().await?;
        if !landmark_seen {
            warn!(
                target_system = %self.profile.target,
                "landmark not seen before timeout, saving state anyway"
            );
        }

        let mut state = SessionState::new(&self.profile.target);
        state.cookies = self.cdp.cookies().await?;
        if let Some(storage) = self.cdp.local_storage().await? {
            state.origins.push(storage);
        }
        state.landmark_seen = landmark_seen;
        self.store.save(&state)?;
        info!(
            path = %self.store.path().display(),
            cookies = state.cookies.len(),
            landmark_seen,
            "session saved"
        );
        Ok(state)
    }

    /// Replays persisted cookies and local storage into the page.
    pub async fn restore(&self) -> Result<SessionState, SessionError> {
        let state = self.store.load_for(&self.profile.target)?;
        let live = state.live_cookies(Utc::now());
        if live.len() < state.cookies.len() {
            warn!(
                expired = state.cookies.len() - live.len(),
                "some saved cookies expired; run login again if the console asks to sign in"
            );
        }
        self.cdp.set_cookies(&live).await?;

        for origin in state.origins.iter().filter(|o| !o.entries.is_empty()) {
            match self.cdp.navigate(&origin.origin, NAVIGATION_TIMEOUT).await {
                Ok(()) => self.cdp.set_local_storage(origin).await?,
                Err(err) if err.kind == AdapterErrorKind::NotAttached => return Err(err.into()),
                Err(err) => {
                    warn!(origin = %origin.origin, error = %err, "local storage not restored");
                }
            }
        }

        if !state.landmark_seen {
            warn!(
                saved_at = %state.saved_at,
                "session was saved before sign-in was confirmed; it may be incomplete"
            );
        }
        debug!(cookies = live.len(), origins = state.origins.len(), "session restored");
        Ok(state)
    }

    /// Whether the landmark shows up on the current page within `timeout`.
    pub async fn verify_signed_in(&self, timeout: Duration) -> Result<bool, SessionError> {
        match self.resolver.resolve_within(&self.profile.landmark, timeout).await {
            Ok(resolution) => Ok(resolution.is_found()),
            Err(action_locator::LocatorError::Cdp(err)) => Err(err.into()),
            Err(err) => {
                warn!(error = %err, "landmark lookup failed");
                Ok(false)
            }
        }
    }

    async fn wait_for_landmark(&self) -> Result<bool, SessionError> {
        let deadline = Instant::now() + self.profile.timeout;
        loop {
            match self.resolver.resolve(&self.profile.landmark).await {
                Ok(resolution) if resolution.is_found() => return Ok(true),
                Ok(_) => {}
                Err(action_locator::LocatorError::Cdp(err))
                    if err.kind == AdapterErrorKind::NotAttached =>
                {
                    return Err(err.into());
                }
                Err(err) => debug!(error = %err, "landmark probe failed"),
            }
            if Instant::now() + self.profile.poll_interval > deadline {
                return Ok(false);
            }
            tokio::time::sleep(self.profile.poll_interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cdp_adapter::fake::{FakeDom, FakeElement, FakePage};
    use cdp_adapter::{Cookie, OriginStorage};

    const CONSOLE: &str = "https://play.google.com/console/u/0/developers";

    fn manager(page: Arc<FakePage>, dir: &tempfile::TempDir) -> SessionManager {
        SessionManager::new(
            SessionStore::new(dir.path().join("auth/state.json")),
            page,
            LoginProfile::play_console(CONSOLE),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn login_saves_cookies_once_landmark_appears() {
        let mut dom = FakeDom::new("about:blank");
        dom.route(CONSOLE, |dom| {
            dom.push(FakeElement::link("Tutte le app"));
        });
        let page = Arc::new(FakePage::new(dom));
        page.set_cookies(&[Cookie::new("SID", "abc").with_domain(".google.com")])
            .await
            .unwrap();
        let dir = tempfile::tempdir().unwrap();

        let state = manager(page, &dir).login().await.unwrap();
        assert!(state.landmark_seen);
        assert_eq!(state.cookies.len(), 1);
        assert_eq!(state.origins[0].origin, "https://play.google.com");
    }

    #[tokio::test(start_paused = true)]
    async fn login_without_human_still_writes_state() {
        let page = Arc::new(FakePage::new(FakeDom::new("about:blank")));
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(page, &dir);

        let started = Instant::now();
        let state = manager.login().await.unwrap();
        assert!(!state.landmark_seen);
        assert!(started.elapsed() <= Duration::from_secs(121));
        assert!(manager.store().exists());

        // A later run tolerates the incomplete state.
        let restored = manager.restore().await.unwrap();
        assert!(!restored.landmark_seen);
        assert!(!manager.verify_signed_in(Duration::from_secs(1)).await.unwrap());
    }

    #[tokio::test]
    async fn restore_without_login_is_session_missing() {
        let page = Arc::new(FakePage::new(FakeDom::new("about:blank")));
        let dir = tempfile::tempdir().unwrap();
        let err = manager(page, &dir).restore().await.unwrap_err();
        assert!(matches!(err, SessionError::SessionMissing(_)));
    }

    #[tokio::test]
    async fn restore_replays_cookies_and_storage() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path().join("auth/state.json"));
        let mut saved = SessionState::new("play-console");
        saved.cookies.push(Cookie::new("SID", "abc").with_domain(".google.com"));
        saved.origins.push(OriginStorage {
            origin: "https://play.google.com".into(),
            entries: vec![("pc.lang".into(), "it".into())],
        });
        saved.landmark_seen = true;
        store.save(&saved).unwrap();

        let page = Arc::new(FakePage::new(FakeDom::new("about:blank")));
        let restored = manager(page.clone(), &dir).restore().await.unwrap();
        assert_eq!(restored, saved);
        assert_eq!(page.stored_cookies().await.len(), 1);
        assert_eq!(
            page.local_storage().await.unwrap().unwrap().entries,
            vec![("pc.lang".to_string(), "it".to_string())]
        );
    }
}
