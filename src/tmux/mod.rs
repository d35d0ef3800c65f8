mod client;
mod launcher;

pub use client::{AttachMode, TmuxClient};
pub use launcher::{LaunchConfig, LaunchReport, LaunchState, SessionLauncher};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::fmt;

use crate::error::{AutomationError, Result};

/// tmux rewrites `.` and `:` in session names, treats a leading `-` as a
/// flag and a leading `=` as an exact-match marker
static RE_SESSION_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s:.=\-][^\s:.]*$").unwrap());

/// Validated tmux session name
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct SessionName(String);

impl SessionName {
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if !RE_SESSION_NAME.is_match(&name) {
            return Err(AutomationError::InvalidName {
                kind: "session",
                name,
            });
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Target spec that matches this session exactly instead of by prefix
    pub fn exact_target(&self) -> String {
        format!("={}", self.0)
    }
}

impl fmt::Display for SessionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
