//! Error types for the runner module.

use thiserror::Error;

/// Result type alias for runner operations.
pub type RunnerResult<T> = Result<T, RunnerError>;

/// Errors that can occur while running external commands.
#[derive(Error, Debug)]
pub enum RunnerError {
    #[error("Program not available: {0}")]
    ProgramNotFound(String),

    #[error("Failed to spawn `{command}`: {source}")]
    SpawnFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Command `{command}` exited with code {exit_code}: {}", summarize(.stdout, .stderr))]
    CommandFailed {
        command: String,
        exit_code: i32,
        stdout: String,
        stderr: String,
    },

    #[error("Command `{command}` timed out after {seconds} seconds")]
    Timeout { command: String, seconds: u64 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RunnerError {
    /// Captured stdout and stderr of a failed command, if any.
    pub fn captured_output(&self) -> Option<(&str, &str)> {
        match self {
            Self::CommandFailed { stdout, stderr, .. } => Some((stdout, stderr)),
            _ => None,
        }
    }
}

fn summarize(stdout: &str, stderr: &str) -> String {
    let line = stderr
        .lines()
        .rev()
        .find(|l| !l.trim().is_empty())
        .or_else(|| stdout.lines().rev().find(|l| !l.trim().is_empty()));
    line.map(|l| l.trim().to_string())
        .unwrap_or_else(|| "no output".to_string())
}
