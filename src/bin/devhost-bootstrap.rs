use anyhow::{Context, Result};
use clap::Parser;
use std::process::ExitCode;
use tracing::error;

use devhost::bootstrap::Bootstrapper;
use devhost::config::BootstrapArgs;
use devhost::converge::RunReport;
use devhost::host::Host;
use devhost::logging;
use devhost::runner::{CommandRunner, DryRunRunner, SystemRunner};

#[tokio::main]
async fn main() -> ExitCode {
    let args = BootstrapArgs::parse();
    logging::init(args.common.verbose, args.common.quiet);

    if args.common.dry_run {
        run(Host::new(DryRunRunner::new(SystemRunner::new())), &args).await
    } else {
        run(Host::new(SystemRunner::new()), &args).await
    }
}

async fn run<R: CommandRunner>(host: Host<R>, args: &BootstrapArgs) -> ExitCode {
    let host = host
        .with_escalation(args.escalation())
        .with_tools(args.toolset());
    let bootstrapper = Bootstrapper::new(&host, args.to_config());

    match bootstrapper.run().await {
        Ok(report) => match print_report(&report, args.common.json) {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                error!("{:#}", e);
                ExitCode::FAILURE
            }
        },
        Err(err) => {
            if let Some(report) = err.report() {
                let _ = print_report(report, args.common.json);
            }
            let code = err.exit_code();
            error!("{:#}", anyhow::Error::new(err));
            ExitCode::from(code)
        }
    }
}

fn print_report(report: &RunReport, json: bool) -> Result<()> {
    if json {
        let out = serde_json::to_string_pretty(report).context("Failed to serialize report")?;
        println!("{}", out);
    } else {
        for line in report.summary_lines() {
            println!("{}", line);
        }
    }
    Ok(())
}
