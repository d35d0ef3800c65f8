use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{AutomationError, Result};
use crate::runner::Invocation;

pub const INSTALL_SCRIPT_URL: &str =
    "https://raw.githubusercontent.com/Homebrew/install/HEAD/install.sh";

/// Where brew lands on Apple Silicon and Intel when it is not yet on PATH
const WELL_KNOWN_PATHS: [&str; 2] = ["/opt/homebrew/bin/brew", "/usr/local/bin/brew"];

/// Formula names, optionally tap-qualified; never starts like a flag
static RE_FORMULA: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9@+._/\-]*$").unwrap());

/// Reject package or service names that brew could read as options
pub fn validate_formula(kind: &'static str, name: &str) -> Result<()> {
    if RE_FORMULA.is_match(name) {
        Ok(())
    } else {
        Err(AutomationError::InvalidName {
            kind,
            name: name.to_string(),
        })
    }
}

/// Candidate brew locations, most specific first
pub fn candidates(configured: Option<&str>) -> Vec<String> {
    match configured {
        Some(path) => vec![path.to_string()],
        None => std::iter::once("brew")
            .chain(WELL_KNOWN_PATHS)
            .map(str::to_string)
            .collect(),
    }
}

/// Upstream installer, run without prompts
pub fn installer() -> Invocation {
    Invocation::mutate("bash")
        .arg("-c")
        .arg(format!(
            "/bin/bash -c \"$(curl -fsSL {})\"",
            INSTALL_SCRIPT_URL
        ))
        .env("NONINTERACTIVE", "1")
        .inherit_stdio()
}

/// Registration state of a `brew services` entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceState {
    Running,
    /// Known to launchd but not running
    Stopped,
    Unregistered,
}

#[derive(Debug, Deserialize)]
struct ServiceInfo {
    name: String,
    #[serde(default)]
    running: bool,
    #[serde(default)]
    loaded: bool,
    #[serde(default)]
    status: Option<String>,
}

/// Classify the JSON printed by `brew services info <name> --json`
pub fn parse_service_info(name: &str, json: &str) -> std::result::Result<ServiceState, String> {
    let entries: Vec<ServiceInfo> = serde_json::from_str(json).map_err(|e| e.to_string())?;
    let Some(info) = entries.into_iter().find(|info| info.name == name) else {
        return Ok(ServiceState::Unregistered);
    };

    let status = info.status.as_deref().unwrap_or("none");
    let state = if info.running || status == "started" {
        ServiceState::Running
    } else if !info.loaded && status == "none" {
        ServiceState::Unregistered
    } else {
        ServiceState::Stopped
    };
    Ok(state)
}

/// Builds brew invocations against one resolved binary
#[derive(Debug, Clone)]
pub struct Homebrew {
    brew_path: String,
}

impl Homebrew {
    pub fn at(path: impl Into<String>) -> Self {
        Self {
            brew_path: path.into(),
        }
    }

    /// Path of another program installed next to this brew, e.g.
    /// `/opt/homebrew/bin/tailscale`; `None` when brew came from PATH
    pub fn sibling(&self, program: &str) -> Option<String> {
        let dir = Path::new(&self.brew_path).parent()?;
        if dir.as_os_str().is_empty() {
            return None;
        }
        Some(dir.join(program).to_string_lossy().into_owned())
    }

    pub fn update(&self) -> Invocation {
        Invocation::mutate(&self.brew_path).arg("update")
    }

    /// Exits non-zero when the formula is not installed
    pub fn is_installed(&self, formula: &str) -> Invocation {
        Invocation::probe(&self.brew_path).args(["list", "--versions", formula])
    }

    pub fn install(&self, formula: &str) -> Invocation {
        Invocation::mutate(&self.brew_path).args(["install", formula])
    }

    /// Service query; a failing exit means brew does not know the service
    pub fn service_info(&self, service: &str) -> Invocation {
        Invocation::probe(&self.brew_path).args(["services", "info", service, "--json"])
    }

    pub fn start_service(&self, service: &str) -> Invocation {
        Invocation::mutate(&self.brew_path)
            .args(["services", "start", service])
            .privileged()
    }

    pub fn restart_service(&self, service: &str) -> Invocation {
        Invocation::mutate(&self.brew_path)
            .args(["services", "restart", service])
            .privileged()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_formula_names() {
        for ok in ["tmux", "tailscale", "node@20", "homebrew/core/git", "gtk+3"] {
            assert!(validate_formula("package", ok).is_ok(), "{ok}");
        }
        for bad in ["", "--force", "-v", "two words"] {
            assert!(validate_formula("package", bad).is_err(), "{bad:?}");
        }
    }

    #[test]
    fn test_candidates() {
        assert_eq!(
            candidates(None),
            vec!["brew", "/opt/homebrew/bin/brew", "/usr/local/bin/brew"]
        );
        assert_eq!(candidates(Some("/custom/brew")), vec!["/custom/brew"]);
    }

    #[test]
    fn test_sibling_follows_brew_prefix() {
        assert_eq!(
            Homebrew::at("/opt/homebrew/bin/brew").sibling("tailscale").as_deref(),
            Some("/opt/homebrew/bin/tailscale")
        );
        assert_eq!(Homebrew::at("brew").sibling("tailscale"), None);
    }

    #[test]
    fn test_parse_running_service() {
        let json = r#"[{"name":"tailscale","service_name":"homebrew.mxcl.tailscale","running":true,"loaded":true,"schedulable":false,"pid":512,"exit_code":0,"user":"root","status":"started","file":"/Library/LaunchDaemons/homebrew.mxcl.tailscale.plist"}]"#;
        assert_eq!(parse_service_info("tailscale", json), Ok(ServiceState::Running));
    }

    #[test]
    fn test_parse_stopped_service() {
        let json = r#"[{"name":"tailscale","running":false,"loaded":true,"status":"error","exit_code":1}]"#;
        assert_eq!(parse_service_info("tailscale", json), Ok(ServiceState::Stopped));
    }

    #[test]
    fn test_parse_never_started_service() {
        let json = r#"[{"name":"tailscale","running":false,"loaded":false,"status":"none"}]"#;
        assert_eq!(parse_service_info("tailscale", json), Ok(ServiceState::Unregistered));
        assert_eq!(parse_service_info("tailscale", "[]"), Ok(ServiceState::Unregistered));
    }

    #[test]
    fn test_parse_garbage() {
        assert!(parse_service_info("tailscale", "Error: not json").is_err());
    }

    #[test]
    fn test_service_mutations_are_privileged() {
        let brew = Homebrew::at("brew");
        assert!(brew.start_service("tailscale").privileged);
        assert!(brew.restart_service("tailscale").privileged);
        assert!(!brew.service_info("tailscale").privileged);
        assert_eq!(
            brew.service_info("tailscale").to_string(),
            "brew services info tailscale --json"
        );
    }

    #[test]
    fn test_installer_is_non_interactive() {
        let inv = installer();
        assert_eq!(inv.program, "bash");
        assert!(inv.env.contains(&("NONINTERACTIVE".to_string(), "1".to_string())));
        assert!(inv.args[1].contains(INSTALL_SCRIPT_URL));
    }
}
