//! Stateful stand-in for a macOS host.
//!
//! Understands the handful of commands the automation issues and mutates its
//! own state the way the real tools would, so repeated runs observe the
//! effects of earlier ones.

#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};

use devhost::host::Host;
use devhost::runner::{CommandOutput, CommandRunner, Invocation, InvocationLog, RecordingRunner};
use devhost::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Service {
    Stopped,
    Running,
}

#[derive(Debug, Default)]
pub struct FakeState {
    pub toolchain: bool,
    pub brew: bool,
    pub packages: BTreeSet<String>,
    pub services: BTreeMap<String, Service>,
    pub vpn_connected: bool,
    pub sessions: BTreeSet<String>,
    /// Rendered command lines (after escalation) that exit 1
    pub failing: BTreeSet<String>,
    /// Programs that do not resolve even though they normally would
    pub missing: BTreeSet<String>,
    /// Fail the first `new-session` for this name after creating it anyway
    pub racing_session: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct FakeHost {
    pub state: Arc<Mutex<FakeState>>,
}

const BASE_PROGRAMS: [&str; 6] = ["xcode-select", "pmset", "sudo", "bash", "curl", "tmux"];

impl FakeHost {
    pub fn new(state: FakeState) -> Self {
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// A machine with nothing set up yet
    pub fn fresh() -> Self {
        Self::new(FakeState::default())
    }

    /// A machine every default step already agrees with
    pub fn provisioned() -> Self {
        Self::new(FakeState {
            toolchain: true,
            brew: true,
            packages: ["tmux", "tailscale"].iter().map(|s| s.to_string()).collect(),
            services: [("tailscale".to_string(), Service::Running)].into(),
            vpn_connected: true,
            ..FakeState::default()
        })
    }

    pub fn with<F: FnOnce(&mut FakeState)>(self, f: F) -> Self {
        f(&mut self.state.lock().unwrap());
        self
    }

    /// Host wrapping this fake, plus a handle on its invocation log
    pub fn host(&self) -> (Host<RecordingRunner<FakeHost>>, InvocationLog) {
        let runner = RecordingRunner::new(self.clone());
        let log = runner.log();
        (Host::new(runner), log)
    }

    fn dispatch(&self, argv: &[&str]) -> CommandOutput {
        let mut state = self.state.lock().unwrap();

        // Escalation is transparent to the fake
        let argv = match argv {
            ["sudo", rest @ ..] => rest,
            other => other,
        };
        // Tools answer the same whether run by name or by full path
        let argv: Vec<&str> = argv
            .iter()
            .enumerate()
            .map(|(i, arg)| if i == 0 { program_name(arg) } else { *arg })
            .collect();

        match argv.as_slice() {
            ["xcode-select", "-p"] if state.toolchain => {
                CommandOutput::ok("/Library/Developer/CommandLineTools\n")
            }
            ["xcode-select", "-p"] => {
                CommandOutput::failed(2, "xcode-select: error: no developer tools were found")
            }
            ["xcode-select", "--install"] => {
                state.toolchain = true;
                CommandOutput::ok("")
            }
            ["pmset", "-a", ..] => CommandOutput::ok(""),
            ["bash", "-c", _] => {
                state.brew = true;
                CommandOutput::ok("")
            }
            [_brew, "update"] if state.brew => CommandOutput::ok("Already up-to-date.\n"),
            [_brew, "list", "--versions", pkg] => {
                if state.packages.contains(*pkg) {
                    CommandOutput::ok(format!("{pkg} 1.0\n"))
                } else {
                    CommandOutput::failed(1, "")
                }
            }
            [_brew, "install", pkg] => {
                state.packages.insert(pkg.to_string());
                CommandOutput::ok("")
            }
            [_brew, "services", "info", svc, "--json"] => match state.services.get(*svc) {
                Some(status) => {
                    let running = *status == Service::Running;
                    let label = if running { "started" } else { "error" };
                    CommandOutput::ok(format!(
                        r#"[{{"name":"{svc}","running":{running},"loaded":true,"status":"{label}"}}]"#
                    ))
                }
                None => CommandOutput::failed(1, format!("Error: No such service `{svc}`")),
            },
            [_brew, "services", "start", svc] | [_brew, "services", "restart", svc] => {
                state.services.insert(svc.to_string(), Service::Running);
                CommandOutput::ok(format!("==> Successfully started `{svc}`\n"))
            }
            ["tailscale", "status"] if state.vpn_connected => {
                CommandOutput::ok("100.64.0.1 studio\n")
            }
            ["tailscale", "status"] => CommandOutput::failed(1, "Logged out."),
            ["tailscale", "up", ..] => {
                state.vpn_connected = true;
                CommandOutput::ok("")
            }
            ["tmux", "has-session", "-t", target] => {
                let name = target.trim_start_matches('=');
                if state.sessions.contains(name) {
                    CommandOutput::ok("")
                } else {
                    CommandOutput::failed(1, format!("can't find session: {name}"))
                }
            }
            ["tmux", "new-session", "-d", "-s", name, ..] => {
                if state.racing_session.as_deref() == Some(*name) {
                    state.racing_session = None;
                    state.sessions.insert(name.to_string());
                    return CommandOutput::failed(1, format!("duplicate session: {name}"));
                }
                if state.sessions.contains(*name) {
                    CommandOutput::failed(1, format!("duplicate session: {name}"))
                } else {
                    state.sessions.insert(name.to_string());
                    CommandOutput::ok("")
                }
            }
            ["tmux", "attach-session" | "switch-client", "-t", target] => {
                if state.sessions.contains(target.trim_start_matches('=')) {
                    CommandOutput::ok("")
                } else {
                    CommandOutput::failed(1, "can't find session")
                }
            }
            other => CommandOutput::failed(127, format!("fake host: unknown command {other:?}")),
        }
    }
}

/// `/opt/homebrew/bin/brew` -> `brew`
fn program_name(program: &str) -> &str {
    program.rsplit('/').next().unwrap_or(program)
}

impl CommandRunner for FakeHost {
    async fn run(&self, invocation: &Invocation) -> Result<CommandOutput> {
        if self.state.lock().unwrap().failing.contains(&invocation.to_string()) {
            return Ok(CommandOutput::failed(1, "stub failure"));
        }
        Ok(self.dispatch(&invocation.argv()))
    }

    fn locate(&self, program: &str) -> bool {
        let state = self.state.lock().unwrap();
        if state.missing.contains(program) {
            return false;
        }
        match program {
            "brew" => state.brew,
            "tailscale" => state.packages.contains("tailscale"),
            p => BASE_PROGRAMS.iter().any(|base| *base == p),
        }
    }
}
