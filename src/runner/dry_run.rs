use tracing::info;

use super::{CommandOutput, CommandRunner, Effect, Invocation};
use crate::error::Result;

/// Executes probes for real but only reports mutations
///
/// Probes issued after a skipped mutation still observe the unchanged host,
/// so a dry run shows the first pass of the plan rather than a full
/// simulation.
#[derive(Debug, Clone)]
pub struct DryRunRunner<R> {
    inner: R,
}

impl<R> DryRunRunner<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }
}

impl<R: CommandRunner> CommandRunner for DryRunRunner<R> {
    async fn run(&self, invocation: &Invocation) -> Result<CommandOutput> {
        match invocation.effect {
            Effect::Probe => self.inner.run(invocation).await,
            Effect::Mutate => {
                info!(command = %invocation, "dry run: would run");
                Ok(CommandOutput::ok(""))
            }
        }
    }

    fn locate(&self, program: &str) -> bool {
        self.inner.locate(program)
    }
}
