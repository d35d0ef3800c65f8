use thiserror::Error;

/// Errors raised while driving external commands
#[derive(Debug, Error)]
pub enum AutomationError {
    /// Required programs are not on PATH; detected before any mutation runs
    #[error("required command(s) not found on PATH: {}", .0.join(", "))]
    MissingCommands(Vec<String>),

    /// The program could not be started at all
    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// A mutating command exited non-zero
    #[error("`{command}` failed ({}){}", describe_code(.code), diagnostics(.stdout, .stderr))]
    CommandFailed {
        command: String,
        code: Option<i32>,
        stdout: String,
        stderr: String,
    },

    #[error("invalid {kind} name `{name}`")]
    InvalidName { kind: &'static str, name: String },

    #[error("unexpected output from `{command}`: {reason}")]
    UnexpectedOutput { command: String, reason: String },
}

impl AutomationError {
    /// Process exit code the binaries report for this error
    pub fn exit_code(&self) -> u8 {
        match self {
            AutomationError::MissingCommands(_) => 127,
            _ => 1,
        }
    }
}

pub type Result<T> = std::result::Result<T, AutomationError>;

fn describe_code(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit status {}", code),
        None => "terminated by signal".to_string(),
    }
}

fn diagnostics(stdout: &str, stderr: &str) -> String {
    let mut out = String::new();
    for stream in [stderr, stdout] {
        let trimmed = stream.trim_end();
        if !trimmed.is_empty() {
            out.push('\n');
            out.push_str(trimmed);
        }
    }
    out
}
