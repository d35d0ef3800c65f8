use std::path::Path;

use super::SessionName;
use crate::runner::Invocation;

/// How the caller is handed over to a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachMode {
    /// `attach-session` from a plain terminal
    Attach,
    /// `switch-client` when already running inside tmux
    SwitchClient,
    /// Leave the session detached
    Detached,
}

impl AttachMode {
    /// Pick the hand-off based on the caller's `TMUX` variable
    pub fn detect(tmux_env: Option<&str>) -> Self {
        match tmux_env {
            Some(value) if !value.is_empty() => AttachMode::SwitchClient,
            _ => AttachMode::Attach,
        }
    }
}

/// Builds tmux invocations
#[derive(Debug, Clone)]
pub struct TmuxClient {
    /// Path to tmux binary
    tmux_path: String,
}

impl TmuxClient {
    pub fn new() -> Self {
        Self::with_path("tmux")
    }

    pub fn with_path(path: impl Into<String>) -> Self {
        Self {
            tmux_path: path.into(),
        }
    }

    pub fn program(&self) -> &str {
        &self.tmux_path
    }

    /// Existence probe; exits 0 when the session exists
    pub fn has_session(&self, name: &SessionName) -> Invocation {
        Invocation::probe(&self.tmux_path).args([
            "has-session",
            "-t",
            name.exact_target().as_str(),
        ])
    }

    /// Create a detached session; tmux refuses duplicate names
    pub fn new_session(&self, name: &SessionName, start_dir: Option<&Path>) -> Invocation {
        let inv =
            Invocation::mutate(&self.tmux_path).args(["new-session", "-d", "-s", name.as_str()]);
        match start_dir {
            Some(dir) => inv.arg("-c").arg(dir.to_string_lossy()),
            None => inv,
        }
    }

    /// Interactive hand-off, or `None` when the session stays detached
    pub fn attach(&self, name: &SessionName, mode: AttachMode) -> Option<Invocation> {
        let subcommand = match mode {
            AttachMode::Attach => "attach-session",
            AttachMode::SwitchClient => "switch-client",
            AttachMode::Detached => return None,
        };
        Some(
            Invocation::mutate(&self.tmux_path)
                .args([subcommand, "-t", name.exact_target().as_str()])
                .inherit_stdio(),
        )
    }
}

impl Default for TmuxClient {
    fn default() -> Self {
        Self::new()
    }
}
