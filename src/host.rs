//! System facade.
//!
//! Every question the automation asks about the machine, and every change it
//! makes, goes through [`Host`]. Nothing else spawns processes, so swapping
//! the [`CommandRunner`] swaps the whole machine.

use std::path::Path;
use tracing::debug;

use crate::bootstrap::brew::{self, Homebrew, ServiceState};
use crate::bootstrap::macos;
use crate::bootstrap::tailscale::{self, Tailscale, VpnConfig};
use crate::error::{AutomationError, Result};
use crate::runner::{CommandOutput, CommandRunner, Invocation};
use crate::tmux::{AttachMode, SessionName, TmuxClient};

/// Paths of the external tools the automation drives
#[derive(Debug, Clone)]
pub struct Toolset {
    pub tmux: TmuxClient,
    /// Preferred tailscale CLI; PATH and the brew prefix are tried after it
    pub tailscale: Tailscale,
    /// Explicit brew path; otherwise PATH and the well-known prefixes are tried
    pub brew: Option<String>,
}

impl Default for Toolset {
    fn default() -> Self {
        Self {
            tmux: TmuxClient::new(),
            tailscale: Tailscale::new(),
            brew: None,
        }
    }
}

pub struct Host<R> {
    runner: R,
    /// Wrapper for privileged commands, e.g. `sudo`
    escalation: Option<String>,
    tools: Toolset,
}

impl<R: CommandRunner> Host<R> {
    pub fn new(runner: R) -> Self {
        Self {
            runner,
            escalation: Some("sudo".to_string()),
            tools: Toolset::default(),
        }
    }

    pub fn with_escalation(mut self, wrapper: Option<String>) -> Self {
        self.escalation = wrapper;
        self
    }

    pub fn with_tools(mut self, tools: Toolset) -> Self {
        self.tools = tools;
        self
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    pub fn tools(&self) -> &Toolset {
        &self.tools
    }

    pub fn escalation(&self) -> Option<&str> {
        self.escalation.as_deref()
    }

    pub fn is_available(&self, program: &str) -> bool {
        self.runner.locate(program)
    }

    /// Fail up front, naming every missing program at once
    pub fn require<'a>(&self, programs: impl IntoIterator<Item = &'a str>) -> Result<()> {
        let mut missing: Vec<String> = Vec::new();
        for program in programs {
            if !self.runner.locate(program) && !missing.iter().any(|m| m == program) {
                missing.push(program.to_string());
            }
        }
        if missing.is_empty() {
            Ok(())
        } else {
            Err(AutomationError::MissingCommands(missing))
        }
    }

    fn prepare(&self, invocation: Invocation) -> Invocation {
        match (&self.escalation, invocation.privileged) {
            (Some(wrapper), true) => invocation.escalate(wrapper),
            _ => invocation,
        }
    }

    /// Run a query; a non-zero exit is an answer, not an error
    pub async fn probe_output(&self, invocation: Invocation) -> Result<CommandOutput> {
        let invocation = self.prepare(invocation);
        self.runner.run(&invocation).await
    }

    pub async fn probe(&self, invocation: Invocation) -> Result<bool> {
        Ok(self.probe_output(invocation).await?.success)
    }

    /// Run a mutation; a non-zero exit aborts with the command's output
    pub async fn apply(&self, invocation: Invocation) -> Result<CommandOutput> {
        let invocation = self.prepare(invocation);
        let output = self.runner.run(&invocation).await?;
        if !output.success {
            return Err(AutomationError::CommandFailed {
                command: invocation.to_string(),
                code: output.code,
                stdout: output.stdout,
                stderr: output.stderr,
            });
        }
        Ok(output)
    }

    // ---- Toolchain and power ----

    pub async fn tool_present(&self) -> Result<bool> {
        self.probe(macos::toolchain_probe()).await
    }

    pub async fn install_toolchain(&self) -> Result<()> {
        self.apply(macos::toolchain_install()).await.map(drop)
    }

    pub async fn apply_power_settings(&self, settings: &[(String, String)]) -> Result<()> {
        self.apply(macos::apply_power_settings(settings))
            .await
            .map(drop)
    }

    // ---- Homebrew ----

    /// First brew binary that resolves, if any
    pub fn brew(&self) -> Option<Homebrew> {
        brew::candidates(self.tools.brew.as_deref())
            .into_iter()
            .find(|path| self.runner.locate(path))
            .map(Homebrew::at)
    }

    fn require_brew(&self) -> Result<Homebrew> {
        self.brew()
            .ok_or_else(|| AutomationError::MissingCommands(vec!["brew".to_string()]))
    }

    pub fn package_manager_present(&self) -> bool {
        self.brew().is_some()
    }

    pub async fn install_package_manager(&self) -> Result<()> {
        self.apply(brew::installer()).await.map(drop)
    }

    /// Returns whether brew reported any change
    pub async fn update_package_manager(&self) -> Result<bool> {
        let output = self.apply(self.require_brew()?.update()).await?;
        Ok(!output.stdout.contains("Already up-to-date"))
    }

    pub async fn package_installed(&self, formula: &str) -> Result<bool> {
        self.probe(self.require_brew()?.is_installed(formula)).await
    }

    pub async fn install_package(&self, formula: &str) -> Result<()> {
        self.apply(self.require_brew()?.install(formula))
            .await
            .map(drop)
    }

    pub async fn service_state(&self, service: &str) -> Result<ServiceState> {
        let query = self.require_brew()?.service_info(service);
        let command = query.to_string();
        let output = self.probe_output(query).await?;
        if !output.success {
            debug!(service, "service query failed; treating as unregistered");
            return Ok(ServiceState::Unregistered);
        }
        brew::parse_service_info(service, &output.stdout)
            .map_err(|reason| AutomationError::UnexpectedOutput { command, reason })
    }

    pub async fn service_running(&self, service: &str) -> Result<bool> {
        Ok(self.service_state(service).await? == ServiceState::Running)
    }

    pub async fn start_service(&self, service: &str) -> Result<()> {
        self.apply(self.require_brew()?.start_service(service))
            .await
            .map(drop)
    }

    pub async fn restart_service(&self, service: &str) -> Result<()> {
        self.apply(self.require_brew()?.restart_service(service))
            .await
            .map(drop)
    }

    // ---- Mesh VPN ----

    /// First tailscale CLI that resolves, falling back to the configured one
    ///
    /// Resolved on every call: the CLI may only appear once the package step
    /// has installed it under a brew prefix that is not on PATH.
    pub fn tailscale(&self) -> Tailscale {
        let configured = &self.tools.tailscale;
        let mut candidates = vec![configured.program().to_string()];
        if configured.program() != tailscale::PROGRAM {
            candidates.push(tailscale::PROGRAM.to_string());
        }
        if let Some(path) = self.brew().and_then(|brew| brew.sibling(tailscale::PROGRAM)) {
            candidates.push(path);
        }
        candidates
            .into_iter()
            .find(|path| self.runner.locate(path))
            .map(Tailscale::with_path)
            .unwrap_or_else(|| configured.clone())
    }

    pub async fn vpn_connected(&self) -> Result<bool> {
        self.probe(self.tailscale().status()).await
    }

    pub async fn vpn_up(&self, config: &VpnConfig) -> Result<()> {
        self.apply(self.tailscale().up(config)).await.map(drop)
    }

    // ---- tmux ----

    pub async fn session_exists(&self, name: &SessionName) -> Result<bool> {
        self.probe(self.tools.tmux.has_session(name)).await
    }

    pub async fn new_session(&self, name: &SessionName, start_dir: Option<&Path>) -> Result<()> {
        self.apply(self.tools.tmux.new_session(name, start_dir))
            .await
            .map(drop)
    }

    /// Blocks until the user detaches
    pub async fn attach_session(&self, name: &SessionName, mode: AttachMode) -> Result<()> {
        match self.tools.tmux.attach(name, mode) {
            Some(invocation) => self.apply(invocation).await.map(drop),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::RecordingRunner;
    use std::collections::HashMap;

    /// Answers by rendered command line; anything unknown exits 1
    struct Scripted {
        replies: HashMap<String, CommandOutput>,
        on_path: Vec<&'static str>,
    }

    impl CommandRunner for Scripted {
        async fn run(&self, invocation: &Invocation) -> Result<CommandOutput> {
            Ok(self
                .replies
                .get(&invocation.to_string())
                .cloned()
                .unwrap_or_else(|| CommandOutput::failed(1, "unexpected")))
        }

        fn locate(&self, program: &str) -> bool {
            self.on_path.iter().any(|p| *p == program)
        }
    }

    fn host(
        replies: &[(&str, CommandOutput)],
        on_path: Vec<&'static str>,
    ) -> Host<RecordingRunner<Scripted>> {
        let replies = replies
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        Host::new(RecordingRunner::new(Scripted { replies, on_path }))
    }

    #[tokio::test]
    async fn test_privileged_commands_get_wrapper() {
        let host = host(
            &[("sudo brew services start tailscale", CommandOutput::ok(""))],
            vec!["brew"],
        );
        let log = host.runner().log();
        host.start_service("tailscale").await.unwrap();
        assert_eq!(log.commands(), vec!["sudo brew services start tailscale"]);
    }

    #[tokio::test]
    async fn test_no_wrapper_when_escalation_disabled() {
        let host = host(
            &[("brew services start tailscale", CommandOutput::ok(""))],
            vec!["brew"],
        )
        .with_escalation(None);
        host.start_service("tailscale").await.unwrap();
    }

    #[tokio::test]
    async fn test_probe_failure_is_false_but_apply_failure_is_error() {
        let host = host(&[], vec![]);
        assert!(!host.tool_present().await.unwrap());

        let err = host.install_toolchain().await.unwrap_err();
        match err {
            AutomationError::CommandFailed { command, code, stderr, .. } => {
                assert_eq!(command, "xcode-select --install");
                assert_eq!(code, Some(1));
                assert_eq!(stderr, "unexpected");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_failed_service_query_means_unregistered() {
        let host = host(&[], vec!["brew"]);
        assert_eq!(
            host.service_state("tailscale").await.unwrap(),
            ServiceState::Unregistered
        );
    }

    #[tokio::test]
    async fn test_service_running() {
        let running = r#"[{"name":"tailscale","running":true,"loaded":true,"status":"started"}]"#;
        let host = host(
            &[("brew services info tailscale --json", CommandOutput::ok(running))],
            vec!["brew"],
        );
        assert!(host.service_running("tailscale").await.unwrap());
        assert!(!host.service_running("postgresql@16").await.unwrap());
    }

    #[tokio::test]
    async fn test_unparseable_service_query() {
        let host = host(
            &[("brew services info tailscale --json", CommandOutput::ok("not json"))],
            vec!["brew"],
        );
        let err = host.service_state("tailscale").await.unwrap_err();
        assert!(matches!(err, AutomationError::UnexpectedOutput { .. }));
    }

    #[tokio::test]
    async fn test_brew_resolves_well_known_prefix() {
        let host = host(&[], vec!["/opt/homebrew/bin/brew"]);
        assert!(host.package_manager_present());
        assert_eq!(
            host.brew().unwrap().update().to_string(),
            "/opt/homebrew/bin/brew update"
        );
    }

    #[test]
    fn test_tailscale_resolves_next_to_brew() {
        let beside = host(&[], vec!["/opt/homebrew/bin/brew", "/opt/homebrew/bin/tailscale"]);
        assert_eq!(beside.tailscale().program(), "/opt/homebrew/bin/tailscale");

        let on_path = host(&[], vec!["/opt/homebrew/bin/brew", "tailscale"]);
        assert_eq!(on_path.tailscale().program(), "tailscale");

        let configured = host(&[], vec!["tailscale", "/usr/local/bin/tailscale"])
            .with_tools(Toolset {
                tailscale: Tailscale::with_path("/usr/local/bin/tailscale"),
                ..Toolset::default()
            });
        assert_eq!(configured.tailscale().program(), "/usr/local/bin/tailscale");

        let nowhere = host(&[], vec![]);
        assert_eq!(nowhere.tailscale().program(), "tailscale");
    }

    #[tokio::test]
    async fn test_brew_missing_is_reported() {
        let host = host(&[], vec![]);
        let err = host.package_installed("tmux").await.unwrap_err();
        assert!(matches!(err, AutomationError::MissingCommands(ref m) if m == &["brew"]));
    }

    #[test]
    fn test_require_collects_all_missing() {
        let host = host(&[], vec!["tmux"]);
        assert!(host.require(["tmux"]).is_ok());
        let err = host.require(["tmux", "pmset", "sudo", "pmset"]).unwrap_err();
        assert!(matches!(err, AutomationError::MissingCommands(ref m) if m == &["pmset", "sudo"]));
    }
}
