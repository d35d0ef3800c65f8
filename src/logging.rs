use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Default level from `-v`/`-q`; `RUST_LOG` directives still apply on top
pub fn level(verbose: u8, quiet: bool) -> Level {
    match (quiet, verbose) {
        (true, _) => Level::WARN,
        (false, 0) => Level::INFO,
        (false, 1) => Level::DEBUG,
        (false, _) => Level::TRACE,
    }
}

/// Initialize logging to stderr, keeping stdout for reports
pub fn init(verbose: u8, quiet: bool) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(level(verbose, quiet).into()),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
