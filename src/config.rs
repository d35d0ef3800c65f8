//! Command-line and environment configuration.
//!
//! Every option has an environment variable, so both binaries run with no
//! flags at all. Switches read from the environment accept the usual shell
//! spellings (`1`/`0`, `yes`/`no`, `on`/`off`, `true`/`false`). The clap structs convert into the plain domain configs used
//! by the library.

use clap::builder::BoolishValueParser;
use clap::{Args, Parser};
use std::path::PathBuf;

use crate::bootstrap::macos;
use crate::bootstrap::tailscale::{Tailscale, VpnConfig};
use crate::bootstrap::BootstrapConfig;
use crate::error::Result;
use crate::host::Toolset;
use crate::tmux::{AttachMode, LaunchConfig, SessionName, TmuxClient};

pub const DEFAULT_SESSION: &str = "dev";

/// Options shared by both binaries
#[derive(Debug, Clone, Args)]
pub struct CommonArgs {
    /// Run queries but only print the commands that would change the host
    #[arg(long, env = "DEVHOST_DRY_RUN", value_parser = BoolishValueParser::new())]
    pub dry_run: bool,

    /// Print the run report as JSON on stdout
    #[arg(long)]
    pub json: bool,

    /// More log output (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,
}

#[derive(Debug, Clone, Parser)]
#[command(
    name = "devhost-bootstrap",
    about = "Bring this Mac into a known-good state for remote development",
    version
)]
pub struct BootstrapArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Formulae to install
    #[arg(
        long = "package",
        env = "DEVHOST_PACKAGES",
        value_delimiter = ',',
        default_values_t = ["tmux".to_string(), "tailscale".to_string()]
    )]
    pub packages: Vec<String>,

    /// brew services that must be running
    #[arg(
        long = "service",
        env = "DEVHOST_SERVICES",
        value_delimiter = ',',
        default_values_t = ["tailscale".to_string()]
    )]
    pub services: Vec<String>,

    /// Leave power management untouched
    #[arg(long, env = "DEVHOST_SKIP_POWER", value_parser = BoolishValueParser::new())]
    pub skip_power: bool,

    /// Do not log in to the tailnet
    #[arg(long, env = "DEVHOST_SKIP_VPN", value_parser = BoolishValueParser::new())]
    pub skip_vpn: bool,

    /// Pre-authorized key for unattended `tailscale up`
    #[arg(long, env = "DEVHOST_TAILSCALE_AUTHKEY", hide_env_values = true)]
    pub auth_key: Option<String>,

    /// Enable Tailscale SSH on this host
    #[arg(long, env = "DEVHOST_TAILSCALE_SSH", value_parser = BoolishValueParser::new())]
    pub tailscale_ssh: bool,

    /// Hostname to register on the tailnet
    #[arg(long, env = "DEVHOST_HOSTNAME")]
    pub hostname: Option<String>,

    /// Path to brew when it is not on PATH
    #[arg(long, env = "DEVHOST_BREW")]
    pub brew: Option<String>,

    /// Path to the tailscale CLI
    #[arg(long, env = "DEVHOST_TAILSCALE", default_value = "tailscale")]
    pub tailscale: String,

    /// Run privileged commands without sudo (e.g. when already root)
    #[arg(long, env = "DEVHOST_NO_SUDO", value_parser = BoolishValueParser::new())]
    pub no_sudo: bool,
}

impl BootstrapArgs {
    pub fn to_config(&self) -> BootstrapConfig {
        let non_empty = |items: &[String]| -> Vec<String> {
            items
                .iter()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        };

        BootstrapConfig {
            packages: non_empty(&self.packages),
            services: non_empty(&self.services),
            power: (!self.skip_power).then(macos::default_power_settings),
            vpn: (!self.skip_vpn).then(|| VpnConfig {
                auth_key: self.auth_key.clone(),
                ssh: self.tailscale_ssh,
                hostname: self.hostname.clone(),
            }),
        }
    }

    pub fn toolset(&self) -> Toolset {
        Toolset {
            tailscale: Tailscale::with_path(&self.tailscale),
            brew: self.brew.clone(),
            ..Toolset::default()
        }
    }

    pub fn escalation(&self) -> Option<String> {
        (!self.no_sudo).then(|| "sudo".to_string())
    }
}

#[derive(Debug, Clone, Parser)]
#[command(
    name = "devhost-session",
    about = "Attach to the persistent tmux session, creating it if needed",
    version
)]
pub struct SessionArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Session to attach to
    #[arg(short, long, env = "DEVHOST_SESSION", default_value = DEFAULT_SESSION)]
    pub session: String,

    /// Working directory for a new session (default: home directory)
    #[arg(short = 'c', long, env = "DEVHOST_SESSION_DIR")]
    pub directory: Option<PathBuf>,

    /// Path to tmux
    #[arg(long, env = "DEVHOST_TMUX", default_value = "tmux")]
    pub tmux: String,

    /// Make sure the session exists but do not attach
    #[arg(long)]
    pub no_attach: bool,
}

impl SessionArgs {
    /// `tmux_env` is the caller's `TMUX` variable
    pub fn to_config(&self, tmux_env: Option<&str>) -> Result<LaunchConfig> {
        let attach = if self.no_attach {
            AttachMode::Detached
        } else {
            AttachMode::detect(tmux_env)
        };
        Ok(LaunchConfig {
            session: SessionName::new(self.session.trim())?,
            start_dir: self.directory.clone().or_else(dirs::home_dir),
            attach,
        })
    }

    pub fn toolset(&self) -> Toolset {
        Toolset {
            tmux: TmuxClient::with_path(&self.tmux),
            ..Toolset::default()
        }
    }
}
