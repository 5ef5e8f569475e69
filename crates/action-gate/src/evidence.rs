//! Evidence recorded when a success signal matches

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::conditions::Signal;

/// What was seen, where and when.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    /// Display form of the signal that matched
    pub signal: String,
    /// Label or text of the matching element
    pub text: String,
    pub url: String,
    pub observed_at: DateTime<Utc>,
}

impl Evidence {
    pub fn new(signal: &Signal, text: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            signal: signal.to_string(),
            text: text.into(),
            url: url.into(),
            observed_at: Utc::now(),
        }
    }
}

impl std::fmt::Display for Evidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "'{}' matched {} at {}", self.text, self.signal, self.url)
    }
}
