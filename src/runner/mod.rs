mod dry_run;
mod recording;
mod system;

pub use dry_run::DryRunRunner;
pub use recording::{InvocationLog, RecordingRunner};
pub use system::SystemRunner;

use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use std::future::Future;

use crate::error::Result;

/// Whether a command only observes host state or changes it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Effect {
    /// Non-zero exit is a branch signal, not an error
    Probe,
    /// Non-zero exit aborts the run
    Mutate,
}

/// How the child's standard streams are wired
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Io {
    /// stdin is null, stdout/stderr are collected
    Captured,
    /// The child shares the caller's terminal
    Inherited,
}

/// A single external command, described but not yet executed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    pub effect: Effect,
    pub io: Io,
    /// Needs the escalation wrapper when the host has one
    pub privileged: bool,
    /// Positions in `args` that must never be rendered
    secrets: BTreeSet<usize>,
}

impl Invocation {
    fn new(program: impl Into<String>, effect: Effect) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
            effect,
            io: Io::Captured,
            privileged: false,
            secrets: BTreeSet::new(),
        }
    }

    pub fn probe(program: impl Into<String>) -> Self {
        Self::new(program, Effect::Probe)
    }

    pub fn mutate(program: impl Into<String>) -> Self {
        Self::new(program, Effect::Mutate)
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Append an argument that is redacted whenever the command is displayed
    pub fn secret_arg(mut self, arg: impl Into<String>) -> Self {
        self.secrets.insert(self.args.len());
        self.args.push(arg.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn privileged(mut self) -> Self {
        self.privileged = true;
        self
    }

    pub fn inherit_stdio(mut self) -> Self {
        self.io = Io::Inherited;
        self
    }

    /// Prefix the command with a privilege-escalation wrapper such as `sudo`
    pub fn escalate(self, wrapper: &str) -> Self {
        let mut args = Vec::with_capacity(self.args.len() + 1);
        args.push(self.program);
        args.extend(self.args);
        Self {
            program: wrapper.to_string(),
            args,
            env: self.env,
            effect: self.effect,
            io: self.io,
            privileged: false,
            secrets: self.secrets.into_iter().map(|i| i + 1).collect(),
        }
    }

    /// Program followed by arguments, secrets included
    pub fn argv(&self) -> Vec<&str> {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect()
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&shell_quote(&self.program))?;
        for (i, arg) in self.args.iter().enumerate() {
            if self.secrets.contains(&i) {
                f.write_str(" ***")?;
            } else {
                write!(f, " {}", shell_quote(arg))?;
            }
        }
        Ok(())
    }
}

fn shell_quote(word: &str) -> String {
    let plain = !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_=./:@,+%".contains(c));
    if plain {
        word.to_string()
    } else {
        format!("'{}'", word.replace('\'', r"'\''"))
    }
}

/// Result of a finished command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code; `None` when killed by a signal
    pub code: Option<i32>,
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            code: Some(0),
            success: true,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    pub fn failed(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            success: false,
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }
}

/// Backend that executes invocations against some host
///
/// The real backend spawns processes; tests substitute a deterministic fake.
pub trait CommandRunner {
    fn run(&self, invocation: &Invocation) -> impl Future<Output = Result<CommandOutput>>;

    /// Whether `program` can be resolved (on PATH or as a path)
    fn locate(&self, program: &str) -> bool;
}
