use serde::Serialize;
use std::path::PathBuf;
use tracing::{debug, info, warn};

use super::{AttachMode, SessionName};
use crate::error::Result;
use crate::host::Host;
use crate::runner::CommandRunner;

/// Where the launcher is in its hand-off
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LaunchState {
    /// Existence not yet known
    Unknown,
    /// Session is absent and must be created
    Create,
    /// Session exists; hand over to it
    Attach,
}

#[derive(Debug, Clone)]
pub struct LaunchConfig {
    pub session: SessionName,
    /// Working directory for a newly created session
    pub start_dir: Option<PathBuf>,
    pub attach: AttachMode,
}

/// What a launch did
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LaunchReport {
    pub session: SessionName,
    pub created: bool,
    pub attached: bool,
    /// States visited, in order
    pub states: Vec<LaunchState>,
}

/// Guarantees a named session exists, then attaches to it
pub struct SessionLauncher<'h, R> {
    host: &'h Host<R>,
    config: LaunchConfig,
}

impl<'h, R: CommandRunner> SessionLauncher<'h, R> {
    pub fn new(host: &'h Host<R>, config: LaunchConfig) -> Self {
        Self { host, config }
    }

    pub fn preflight(&self) -> Result<()> {
        self.host.require([self.host.tools().tmux.program()])
    }

    pub async fn launch(&self) -> Result<LaunchReport> {
        let name = &self.config.session;
        let mut report = LaunchReport {
            session: name.clone(),
            created: false,
            attached: false,
            states: Vec::new(),
        };
        let mut state = LaunchState::Unknown;

        loop {
            report.states.push(state);
            debug!(session = %name, ?state, "launcher state");

            state = match state {
                LaunchState::Unknown => {
                    if self.host.session_exists(name).await? {
                        LaunchState::Attach
                    } else {
                        LaunchState::Create
                    }
                }
                LaunchState::Create => {
                    match self
                        .host
                        .new_session(name, self.config.start_dir.as_deref())
                        .await
                    {
                        Ok(()) => {
                            info!(session = %name, "created session");
                            report.created = true;
                        }
                        // tmux refuses duplicate names: if the session is
                        // there now, a concurrent launcher created it first.
                        Err(err) => {
                            if !self.host.session_exists(name).await? {
                                return Err(err);
                            }
                            warn!(session = %name, error = %err, "session appeared concurrently; reusing it");
                        }
                    }
                    LaunchState::Attach
                }
                LaunchState::Attach => {
                    if self.config.attach != AttachMode::Detached {
                        info!(session = %name, mode = ?self.config.attach, "attaching");
                        self.host.attach_session(name, self.config.attach).await?;
                        report.attached = true;
                    }
                    return Ok(report);
                }
            };
        }
    }
}
