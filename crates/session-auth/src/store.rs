//! File-backed session store

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::debug;

use crate::{errors::SessionError, state::SessionState};

/// JSON file holding one [`SessionState`].
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    pub fn load(&self) -> Result<SessionState, SessionError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(SessionError::SessionMissing(self.path.clone()))
            }
            Err(err) => return Err(err.into()),
        };
        serde_json::from_str(&raw).map_err(|err| SessionError::Corrupt {
            path: self.path.clone(),
            reason: err.to_string(),
        })
    }

    /// Loads and checks the state belongs to `target`.
    pub fn load_for(&self, target: &str) -> Result<SessionState, SessionError> {
        let state = self.load()?;
        if state.target != target {
            return Err(SessionError::Corrupt {
                path: self.path.clone(),
                reason: format!("saved for {}, not {}", state.target, target),
            });
        }
        Ok(state)
    }

    /// Replaces the file atomically; readers see the old or the new state.
    pub fn save(&self, state: &SessionState) -> Result<(), SessionError> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)?;
        let json = serde_json::to_vec_pretty(state).map_err(|err| SessionError::Corrupt {
            path: self.path.clone(),
            reason: err.to_string(),
        })?;
        let mut tmp = NamedTempFile::new_in(&dir)?;
        tmp.write_all(&json)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|err| err.error)?;
        debug!(path = %self.path.display(), bytes = json.len(), "session saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cdp_adapter::Cookie;

    #[test]
    fn missing_file_is_session_missing() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path().join("auth/state.json"));
        let err = store.load().unwrap_err();
        assert!(matches!(err, SessionError::SessionMissing(_)));
        assert!(err.needs_login());
    }

    #[test]
    fn save_creates_parent_and_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path().join("auth/state.json"));
        let mut state = SessionState::new("play-console");
        state.cookies.push(Cookie::new("SID", "abc").with_domain(".google.com"));
        state.landmark_seen = true;
        store.save(&state).unwrap();

        assert!(store.exists());
        assert_eq!(store.load().unwrap(), state);
        assert!(store.load_for("github").is_err());
    }

    #[test]
    fn garbage_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(
            SessionStore::new(&path).load(),
            Err(SessionError::Corrupt { .. })
        ));
    }
}
