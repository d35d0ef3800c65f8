use crate::runner::Invocation;

/// Options passed to `tailscale up`
#[derive(Debug, Clone, Default)]
pub struct VpnConfig {
    pub auth_key: Option<String>,
    /// Enable Tailscale SSH on this node
    pub ssh: bool,
    pub hostname: Option<String>,
}

/// CLI name when it is on PATH
pub const PROGRAM: &str = "tailscale";

#[derive(Debug, Clone)]
pub struct Tailscale {
    path: String,
}

impl Tailscale {
    pub fn new() -> Self {
        Self::with_path(PROGRAM)
    }

    pub fn with_path(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }

    pub fn program(&self) -> &str {
        &self.path
    }

    /// Exits non-zero when logged out or the daemon is stopped
    pub fn status(&self) -> Invocation {
        Invocation::probe(&self.path).arg("status")
    }

    /// Interactive: prints a login URL unless an auth key is given
    pub fn up(&self, config: &VpnConfig) -> Invocation {
        let mut inv = Invocation::mutate(&self.path).arg("up");
        if let Some(key) = &config.auth_key {
            inv = inv.secret_arg(format!("--auth-key={}", key));
        }
        if config.ssh {
            inv = inv.arg("--ssh");
        }
        if let Some(hostname) = &config.hostname {
            inv = inv.arg(format!("--hostname={}", hostname));
        }
        inv.privileged().inherit_stdio()
    }
}

impl Default for Tailscale {
    fn default() -> Self {
        Self::new()
    }
}
