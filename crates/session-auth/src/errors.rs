use std::path::PathBuf;

use cdp_adapter::AdapterError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    /// No persisted state yet; run the login command first
    #[error("No session at {}; run login first", .0.display())]
    SessionMissing(PathBuf),

    #[error("Session file {} is unusable: {reason}", .path.display())]
    Corrupt { path: PathBuf, reason: String },

    #[error("Session I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Browser error: {0}")]
    Adapter(#[from] AdapterError),
}

impl SessionError {
    /// Missing and corrupt sessions are fixed by logging in again
    pub fn needs_login(&self) -> bool {
        matches!(
            self,
            SessionError::SessionMissing(_) | SessionError::Corrupt { .. }
        )
    }
}
