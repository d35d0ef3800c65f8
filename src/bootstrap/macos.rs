use crate::runner::Invocation;

/// Keep the machine awake and reachable; restart it after a power loss
pub fn default_power_settings() -> Vec<(String, String)> {
    [("sleep", "0"), ("disksleep", "0"), ("womp", "1"), ("autorestart", "1")]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Exits 0 when the Command Line Tools are installed
pub fn toolchain_probe() -> Invocation {
    Invocation::probe("xcode-select").arg("-p")
}

/// Opens the system installer for the Command Line Tools
pub fn toolchain_install() -> Invocation {
    Invocation::mutate("xcode-select").arg("--install")
}

/// `pmset -a key value ...` applied to every power source
pub fn apply_power_settings(settings: &[(String, String)]) -> Invocation {
    settings
        .iter()
        .fold(Invocation::mutate("pmset").arg("-a"), |inv, (key, value)| {
            inv.arg(key).arg(value)
        })
        .privileged()
}
