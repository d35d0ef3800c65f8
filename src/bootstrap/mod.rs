//! Host Bootstrapper.
//!
//! Brings a macOS machine to the state a remote development session needs:
//! Command Line Tools, no sleep, Homebrew with the required formulae, their
//! services running, and the mesh VPN logged in. Each [`Step`] re-derives
//! current state by querying the host and only acts on a gap, so running the
//! bootstrapper again is always safe.

pub mod brew;
pub mod macos;
pub mod tailscale;

use tracing::info;

use crate::converge::{converge, ConvergeFailure, Reconcile, RunReport, StepOutcome};
use crate::error::Result;
use crate::host::Host;
use crate::runner::CommandRunner;
use brew::ServiceState;
use tailscale::VpnConfig;

/// Desired end state of the host
#[derive(Debug, Clone)]
pub struct BootstrapConfig {
    /// Formulae that must be installed
    pub packages: Vec<String>,
    /// `brew services` entries that must be running
    pub services: Vec<String>,
    /// `pmset` key/value pairs; `None` leaves power management alone
    pub power: Option<Vec<(String, String)>>,
    /// `None` skips the VPN step
    pub vpn: Option<VpnConfig>,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            packages: vec!["tmux".to_string(), "tailscale".to_string()],
            services: vec!["tailscale".to_string()],
            power: Some(macos::default_power_settings()),
            vpn: Some(VpnConfig::default()),
        }
    }
}

impl BootstrapConfig {
    pub fn validate(&self) -> Result<()> {
        for package in &self.packages {
            brew::validate_formula("package", package)?;
        }
        for service in &self.services {
            brew::validate_formula("service", service)?;
        }
        Ok(())
    }
}

/// Reconciliation steps, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Toolchain,
    PowerManagement,
    PackageManager,
    Packages,
    Services,
    MeshVpn,
}

impl Step {
    pub const ALL: [Step; 6] = [
        Step::Toolchain,
        Step::PowerManagement,
        Step::PackageManager,
        Step::Packages,
        Step::Services,
        Step::MeshVpn,
    ];

    /// Runs through the escalation wrapper
    fn is_privileged(self) -> bool {
        matches!(self, Step::PowerManagement | Step::Services | Step::MeshVpn)
    }
}

/// Borrowed view handed to every step
pub struct Bootstrapper<'h, R> {
    host: &'h Host<R>,
    config: BootstrapConfig,
}

impl<'h, R: CommandRunner> Bootstrapper<'h, R> {
    pub fn new(host: &'h Host<R>, config: BootstrapConfig) -> Self {
        Self { host, config }
    }

    pub fn config(&self) -> &BootstrapConfig {
        &self.config
    }

    /// Steps enabled by the configuration
    pub fn plan(&self) -> Vec<Step> {
        Step::ALL
            .into_iter()
            .filter(|step| match step {
                Step::PowerManagement => self.config.power.is_some(),
                Step::Packages => !self.config.packages.is_empty(),
                Step::Services => !self.config.services.is_empty(),
                Step::MeshVpn => self.config.vpn.is_some(),
                Step::Toolchain | Step::PackageManager => true,
            })
            .collect()
    }

    /// Check every program the plan needs before anything is changed
    ///
    /// Tools that an earlier step installs (brew, tailscale) are only
    /// required when nothing in the plan will provide them.
    pub fn preflight(&self) -> Result<()> {
        self.config.validate()?;

        let plan = self.plan();
        let vpn_cli = self.host.tailscale();
        let mut required: Vec<&str> = vec!["xcode-select"];

        if plan.contains(&Step::PowerManagement) {
            required.push("pmset");
        }
        if let Some(wrapper) = self.host.escalation() {
            if plan.iter().any(|s| s.is_privileged()) {
                required.push(wrapper);
            }
        }
        if !self.host.package_manager_present() {
            required.extend(["bash", "curl"]);
        }
        let installs_tailscale = self
            .config
            .packages
            .iter()
            .any(|p| p == tailscale::PROGRAM);
        if plan.contains(&Step::MeshVpn)
            && !installs_tailscale
            && !self.host.is_available(vpn_cli.program())
        {
            required.push(vpn_cli.program());
        }

        self.host.require(required)
    }

    /// Preflight, then converge every planned step
    pub async fn run(&self) -> std::result::Result<RunReport, BootstrapError> {
        self.preflight().map_err(BootstrapError::Preflight)?;
        let plan = self.plan();
        info!(steps = plan.len(), "bootstrapping host");
        converge(self, &plan).await.map_err(BootstrapError::Step)
    }

    async fn ensure_toolchain(&self) -> Result<StepOutcome> {
        if self.host.tool_present().await? {
            return Ok(StepOutcome::Satisfied);
        }
        self.host.install_toolchain().await?;
        Ok(StepOutcome::Changed(
            "requested Command Line Tools install".to_string(),
        ))
    }

    async fn ensure_power(&self) -> Result<StepOutcome> {
        let Some(settings) = &self.config.power else {
            return Ok(StepOutcome::Satisfied);
        };
        // Unconditional set: pmset accepts the same values repeatedly
        self.host.apply_power_settings(settings).await?;
        let applied: Vec<String> = settings.iter().map(|(k, v)| format!("{k}={v}")).collect();
        Ok(StepOutcome::Changed(format!("applied {}", applied.join(" "))))
    }

    async fn ensure_package_manager(&self) -> Result<StepOutcome> {
        let installed = if self.host.package_manager_present() {
            false
        } else {
            self.host.install_package_manager().await?;
            true
        };
        let updated = self.host.update_package_manager().await?;

        Ok(match (installed, updated) {
            (true, _) => StepOutcome::Changed("installed Homebrew".to_string()),
            (false, true) => StepOutcome::Changed("updated Homebrew".to_string()),
            (false, false) => StepOutcome::Satisfied,
        })
    }

    async fn ensure_packages(&self) -> Result<StepOutcome> {
        let mut installed = Vec::new();
        for package in &self.config.packages {
            if self.host.package_installed(package).await? {
                continue;
            }
            self.host.install_package(package).await?;
            installed.push(package.as_str());
        }
        if installed.is_empty() {
            Ok(StepOutcome::Satisfied)
        } else {
            Ok(StepOutcome::Changed(format!("installed {}", installed.join(", "))))
        }
    }

    async fn ensure_services(&self) -> Result<StepOutcome> {
        let mut actions = Vec::new();
        for service in &self.config.services {
            match self.host.service_state(service).await? {
                ServiceState::Running => continue,
                ServiceState::Stopped => {
                    self.host.restart_service(service).await?;
                    actions.push(format!("restarted {service}"));
                }
                ServiceState::Unregistered => {
                    self.host.start_service(service).await?;
                    actions.push(format!("started {service}"));
                }
            }
        }
        if actions.is_empty() {
            Ok(StepOutcome::Satisfied)
        } else {
            Ok(StepOutcome::Changed(actions.join(", ")))
        }
    }

    async fn ensure_vpn(&self) -> Result<StepOutcome> {
        let Some(vpn) = &self.config.vpn else {
            return Ok(StepOutcome::Satisfied);
        };
        if self.host.vpn_connected().await? {
            return Ok(StepOutcome::Satisfied);
        }
        self.host.vpn_up(vpn).await?;
        Ok(StepOutcome::Changed("logged in to tailnet".to_string()))
    }
}

impl<'h, R: CommandRunner> Reconcile<Bootstrapper<'h, R>> for Step {
    fn name(&self) -> &'static str {
        match self {
            Step::Toolchain => "toolchain",
            Step::PowerManagement => "power-management",
            Step::PackageManager => "package-manager",
            Step::Packages => "packages",
            Step::Services => "services",
            Step::MeshVpn => "mesh-vpn",
        }
    }

    async fn reconcile(&self, cx: &Bootstrapper<'h, R>) -> Result<StepOutcome> {
        match self {
            Step::Toolchain => cx.ensure_toolchain().await,
            Step::PowerManagement => cx.ensure_power().await,
            Step::PackageManager => cx.ensure_package_manager().await,
            Step::Packages => cx.ensure_packages().await,
            Step::Services => cx.ensure_services().await,
            Step::MeshVpn => cx.ensure_vpn().await,
        }
    }
}

/// Bootstrap failure, split by whether anything could have changed yet
#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    /// Nothing was run
    #[error("preflight failed: {0}")]
    Preflight(#[source] crate::error::AutomationError),
    #[error(transparent)]
    Step(#[from] ConvergeFailure),
}

impl BootstrapError {
    pub fn exit_code(&self) -> u8 {
        match self {
            BootstrapError::Preflight(err) => err.exit_code(),
            BootstrapError::Step(failure) => failure.source.exit_code(),
        }
    }

    /// Partial report, when at least one step ran
    pub fn report(&self) -> Option<&RunReport> {
        match self {
            BootstrapError::Preflight(_) => None,
            BootstrapError::Step(failure) => Some(&failure.report),
        }
    }
}
