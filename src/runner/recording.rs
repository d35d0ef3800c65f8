use std::sync::{Arc, Mutex, PoisonError};

use super::{CommandOutput, CommandRunner, Invocation};
use crate::error::Result;

/// Append-only, ordered record of every invocation seen during a run
///
/// Cloning shares the underlying log, so a handle can be kept while the
/// runner itself is moved into a [`crate::host::Host`].
#[derive(Debug, Clone, Default)]
pub struct InvocationLog {
    entries: Arc<Mutex<Vec<Invocation>>>,
}

impl InvocationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, invocation: &Invocation) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(invocation.clone());
    }

    pub fn entries(&self) -> Vec<Invocation> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Rendered command lines, secrets redacted
    pub fn commands(&self) -> Vec<String> {
        self.entries().iter().map(ToString::to_string).collect()
    }

    /// Number of recorded invocations whose argv starts with `prefix`
    pub fn count_matching(&self, prefix: &[&str]) -> usize {
        self.entries()
            .iter()
            .filter(|inv| inv.argv().starts_with(prefix))
            .count()
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Wraps another runner and records each invocation before delegating
#[derive(Debug, Clone)]
pub struct RecordingRunner<R> {
    inner: R,
    log: InvocationLog,
}

impl<R> RecordingRunner<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            log: InvocationLog::new(),
        }
    }

    pub fn log(&self) -> InvocationLog {
        self.log.clone()
    }
}

impl<R: CommandRunner> CommandRunner for RecordingRunner<R> {
    async fn run(&self, invocation: &Invocation) -> Result<CommandOutput> {
        self.log.record(invocation);
        self.inner.run(invocation).await
    }

    fn locate(&self, program: &str) -> bool {
        self.inner.locate(program)
    }
}
