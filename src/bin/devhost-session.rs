use anyhow::{Context, Result};
use clap::Parser;
use std::process::ExitCode;
use tracing::error;

use devhost::config::SessionArgs;
use devhost::host::Host;
use devhost::logging;
use devhost::runner::{CommandRunner, DryRunRunner, SystemRunner};
use devhost::tmux::{LaunchReport, SessionLauncher};

#[tokio::main]
async fn main() -> ExitCode {
    let args = SessionArgs::parse();
    logging::init(args.common.verbose, args.common.quiet);

    if args.common.dry_run {
        run(Host::new(DryRunRunner::new(SystemRunner::new())), &args).await
    } else {
        run(Host::new(SystemRunner::new()), &args).await
    }
}

async fn run<R: CommandRunner>(host: Host<R>, args: &SessionArgs) -> ExitCode {
    let host = host.with_tools(args.toolset());
    let tmux_env = std::env::var("TMUX").ok();

    let config = match args.to_config(tmux_env.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            error!("{}", err);
            return ExitCode::from(err.exit_code());
        }
    };
    let launcher = SessionLauncher::new(&host, config);

    let result = match launcher.preflight() {
        Ok(()) => launcher.launch().await,
        Err(err) => Err(err),
    };

    match result {
        Ok(report) => match print_report(&report, args.common.json) {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                error!("{:#}", e);
                ExitCode::FAILURE
            }
        },
        Err(err) => {
            error!("{}", err);
            ExitCode::from(err.exit_code())
        }
    }
}

fn print_report(report: &LaunchReport, json: bool) -> Result<()> {
    if json {
        let out = serde_json::to_string(report).context("Failed to serialize report")?;
        println!("{}", out);
    }
    Ok(())
}
