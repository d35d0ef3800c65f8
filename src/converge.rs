use serde::Serialize;
use std::future::Future;
use thiserror::Error;
use tracing::{error, info};

use crate::error::{AutomationError, Result};

/// What a successful step did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// Observed state already matched; nothing was run
    Satisfied,
    /// The step had to act
    Changed(String),
}

/// An idempotent reconciliation step over a context `C`
pub trait Reconcile<C> {
    fn name(&self) -> &'static str;

    fn reconcile(&self, cx: &C) -> impl Future<Output = Result<StepOutcome>>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StepStatus {
    Satisfied,
    Changed { detail: String },
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepRecord {
    pub step: &'static str,
    #[serde(flatten)]
    pub status: StepStatus,
}

/// Per-step results of one convergence run, in execution order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub steps: Vec<StepRecord>,
}

impl RunReport {
    pub fn changed(&self) -> impl Iterator<Item = &StepRecord> {
        self.steps
            .iter()
            .filter(|r| matches!(r.status, StepStatus::Changed { .. }))
    }

    pub fn is_converged(&self) -> bool {
        !self
            .steps
            .iter()
            .any(|r| matches!(r.status, StepStatus::Failed { .. }))
    }

    /// One human-readable line per step
    pub fn summary_lines(&self) -> Vec<String> {
        self.steps
            .iter()
            .map(|r| match &r.status {
                StepStatus::Satisfied => format!("ok       {}", r.step),
                StepStatus::Changed { detail } => format!("changed  {}: {}", r.step, detail),
                StepStatus::Failed { error } => format!("failed   {}: {}", r.step, error),
            })
            .collect()
    }
}

/// A step failed; the report holds everything up to and including it
#[derive(Debug, Error)]
#[error("step `{step}` failed: {source}")]
pub struct ConvergeFailure {
    pub step: &'static str,
    pub report: RunReport,
    #[source]
    pub source: AutomationError,
}

/// Run `steps` in order, stopping at the first failure
pub async fn converge<C, S>(cx: &C, steps: &[S]) -> std::result::Result<RunReport, ConvergeFailure>
where
    S: Reconcile<C>,
{
    let mut report = RunReport::default();

    for step in steps {
        let name = step.name();
        match step.reconcile(cx).await {
            Ok(StepOutcome::Satisfied) => {
                info!(step = name, "already satisfied");
                report.steps.push(StepRecord {
                    step: name,
                    status: StepStatus::Satisfied,
                });
            }
            Ok(StepOutcome::Changed(detail)) => {
                info!(step = name, %detail, "changed");
                report.steps.push(StepRecord {
                    step: name,
                    status: StepStatus::Changed { detail },
                });
            }
            Err(source) => {
                error!(step = name, error = %source, "step failed; stopping");
                report.steps.push(StepRecord {
                    step: name,
                    status: StepStatus::Failed {
                        error: source.to_string(),
                    },
                });
                return Err(ConvergeFailure {
                    step: name,
                    report,
                    source,
                });
            }
        }
    }

    let changed = report.changed().count();
    info!(steps = report.steps.len(), changed, "converged");
    Ok(report)
}
