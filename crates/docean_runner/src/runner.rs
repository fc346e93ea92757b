//! Command runner trait and types.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{RunnerError, RunnerResult};

/// Result of an external command execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandOutput {
    /// Rendered command line, for diagnostics
    pub command: String,
    /// Exit code (-1 when the process was terminated by a signal)
    pub exit_code: i32,
    /// Captured stdout
    pub stdout: String,
    /// Captured stderr
    pub stderr: String,
    /// Execution start time
    pub started_at: DateTime<Utc>,
    /// Duration in milliseconds
    pub duration_ms: u64,
}

impl CommandOutput {
    /// Check if execution was successful (exit code 0).
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Stdout with surrounding whitespace removed.
    pub fn trimmed_stdout(&self) -> &str {
        self.stdout.trim()
    }

    /// Convert a non-zero exit into [`RunnerError::CommandFailed`].
    pub fn into_checked(self) -> RunnerResult<Self> {
        if self.success() {
            Ok(self)
        } else {
            Err(RunnerError::CommandFailed {
                command: self.command,
                exit_code: self.exit_code,
                stdout: self.stdout,
                stderr: self.stderr,
            })
        }
    }
}

/// Executes external programs.
///
/// Implementations return the captured output for any exit code; only a
/// failure to run the program at all is an `Err`. Use [`run_checked`]
/// when a non-zero exit should abort the caller.
///
/// [`run_checked`]: CommandRunner::run_checked
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Check whether `program` can be executed.
    async fn is_available(&self, program: &str) -> bool;

    /// Run `program` with `args` and capture its output.
    async fn run(&self, program: &str, args: &[&str]) -> RunnerResult<CommandOutput>;

    /// Run `program` and fail on a non-zero exit code.
    async fn run_checked(&self, program: &str, args: &[&str]) -> RunnerResult<CommandOutput> {
        self.run(program, args).await?.into_checked()
    }
}

/// Render a command line for logging, quoting arguments that need it.
pub fn format_command(program: &str, args: &[&str]) -> String {
    let mut cmd = program.to_string();
    for arg in args {
        if arg.is_empty() || arg.contains(' ') || arg.contains('=') {
            cmd.push_str(&format!(" '{}'", arg));
        } else {
            cmd.push_str(&format!(" {}", arg));
        }
    }
    cmd
}
