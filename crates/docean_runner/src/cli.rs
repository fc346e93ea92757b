//! Process-backed command runner.
//!
//! Spawns the external tool through `tokio::process`, captures stdout and
//! stderr in full, and enforces an optional per-command timeout.

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::{RunnerError, RunnerResult};
use crate::runner::{format_command, CommandOutput, CommandRunner};

/// CLI runner options.
#[derive(Debug, Clone)]
pub struct CliRunnerOptions {
    /// Timeout per command in seconds (0 = no timeout)
    pub timeout_seconds: u64,
    /// Extra environment variables for every command
    pub env: HashMap<String, String>,
    /// Working directory for every command
    pub working_dir: Option<PathBuf>,
}

impl Default for CliRunnerOptions {
    fn default() -> Self {
        Self {
            timeout_seconds: 300, // 5 minutes
            env: HashMap::new(),
            working_dir: None,
        }
    }
}

impl CliRunnerOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn timeout(mut self, seconds: u64) -> Self {
        self.timeout_seconds = seconds;
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }
}

/// Runs commands as child processes.
#[derive(Debug, Clone, Default)]
pub struct CliRunner {
    options: CliRunnerOptions,
}

impl CliRunner {
    pub fn new(options: CliRunnerOptions) -> Self {
        Self { options }
    }

    fn build_command(&self, program: &str, args: &[&str]) -> Command {
        let mut cmd = Command::new(program);
        cmd.args(args);
        cmd.envs(&self.options.env);
        if let Some(dir) = &self.options.working_dir {
            cmd.current_dir(dir);
        }
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl CommandRunner for CliRunner {
    async fn is_available(&self, program: &str) -> bool {
        let status = Command::new(program)
            .arg("version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;

        matches!(status, Ok(s) if s.success())
    }

    async fn run(&self, program: &str, args: &[&str]) -> RunnerResult<CommandOutput> {
        let command = format_command(program, args);
        debug!("Executing: {}", command);

        let started_at = Utc::now();
        let start = Instant::now();

        let child = self.build_command(program, args).spawn().map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                RunnerError::ProgramNotFound(program.to_string())
            } else {
                RunnerError::SpawnFailed {
                    command: command.clone(),
                    source,
                }
            }
        })?;

        let output = if self.options.timeout_seconds > 0 {
            let limit = Duration::from_secs(self.options.timeout_seconds);
            match tokio::time::timeout(limit, child.wait_with_output()).await {
                Ok(result) => result?,
                Err(_) => {
                    // Dropping the future drops the child, which kills it.
                    warn!("Command timed out: {}", command);
                    return Err(RunnerError::Timeout {
                        command,
                        seconds: self.options.timeout_seconds,
                    });
                }
            }
        } else {
            child.wait_with_output().await?
        };

        let duration_ms = start.elapsed().as_millis() as u64;
        let exit_code = output.status.code().unwrap_or(-1);

        if exit_code == 0 {
            debug!("Command completed in {}ms", duration_ms);
        } else {
            debug!(
                "Command exited with code {} after {}ms",
                exit_code, duration_ms
            );
        }

        Ok(CommandOutput {
            command,
            exit_code,
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            started_at,
            duration_ms,
        })
    }
}
