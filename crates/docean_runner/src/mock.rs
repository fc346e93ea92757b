//! Mock command runner for testing.
//!
//! Provides a scripted implementation of the [`CommandRunner`] trait so that
//! provider adapters can be tested without the real CLI installed.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;

use crate::error::{RunnerError, RunnerResult};
use crate::runner::{format_command, CommandOutput, CommandRunner};

/// Predefined mock response for a command execution.
#[derive(Debug, Clone)]
pub struct MockResponse {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl MockResponse {
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            exit_code: 0,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    pub fn failure(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            exit_code,
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }
}

/// Captured call information for verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedCall {
    pub program: String,
    pub args: Vec<String>,
}

impl CapturedCall {
    /// Command line as it would have been executed.
    pub fn command_line(&self) -> String {
        let args: Vec<&str> = self.args.iter().map(String::as_str).collect();
        format_command(&self.program, &args)
    }

    /// Check whether the arguments start with `prefix`.
    pub fn starts_with(&self, prefix: &[&str]) -> bool {
        self.args.len() >= prefix.len() && self.args.iter().zip(prefix).all(|(a, p)| a == p)
    }
}

/// Mock command runner for testing.
///
/// Responses are consumed in the order they were added. Once the queue is
/// exhausted every further call succeeds with empty output.
#[derive(Clone, Default)]
pub struct MockRunner {
    responses: Arc<RwLock<VecDeque<MockResponse>>>,
    captured_calls: Arc<RwLock<Vec<CapturedCall>>>,
    unavailable: Arc<RwLock<Vec<String>>>,
    simulate_failure: Arc<RwLock<Option<String>>>,
}

impl MockRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a mock response for the next `run` call.
    pub fn add_response(self, response: MockResponse) -> Self {
        self.responses.write().push_back(response);
        self
    }

    /// Replace the queued responses.
    pub fn with_responses(self, responses: Vec<MockResponse>) -> Self {
        *self.responses.write() = responses.into();
        self
    }

    /// Report `program` as not installed.
    pub fn set_unavailable(self, program: impl Into<String>) -> Self {
        self.unavailable.write().push(program.into());
        self
    }

    /// Make every `run` call fail to spawn.
    pub fn simulate_failure(self, message: impl Into<String>) -> Self {
        *self.simulate_failure.write() = Some(message.into());
        self
    }

    /// Get all captured calls.
    pub fn get_calls(&self) -> Vec<CapturedCall> {
        self.captured_calls.read().clone()
    }

    /// Get the number of calls made.
    pub fn call_count(&self) -> usize {
        self.captured_calls.read().len()
    }

    /// Calls whose arguments start with `prefix`.
    pub fn calls_matching(&self, prefix: &[&str]) -> Vec<CapturedCall> {
        self.captured_calls
            .read()
            .iter()
            .filter(|c| c.starts_with(prefix))
            .cloned()
            .collect()
    }

    /// Number of responses not yet consumed.
    pub fn remaining_responses(&self) -> usize {
        self.responses.read().len()
    }

    fn next_response(&self) -> MockResponse {
        self.responses
            .write()
            .pop_front()
            .unwrap_or_else(|| MockResponse::success(""))
    }
}

#[async_trait]
impl CommandRunner for MockRunner {
    async fn is_available(&self, program: &str) -> bool {
        !self.unavailable.read().iter().any(|p| p == program)
    }

    async fn run(&self, program: &str, args: &[&str]) -> RunnerResult<CommandOutput> {
        let call = CapturedCall {
            program: program.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
        };
        let command = call.command_line();
        self.captured_calls.write().push(call);

        if self.unavailable.read().iter().any(|p| p == program) {
            return Err(RunnerError::ProgramNotFound(program.to_string()));
        }

        if let Some(msg) = self.simulate_failure.read().clone() {
            return Err(RunnerError::SpawnFailed {
                command,
                source: std::io::Error::new(std::io::ErrorKind::Other, msg),
            });
        }

        let response = self.next_response();
        Ok(CommandOutput {
            command,
            exit_code: response.exit_code,
            stdout: response.stdout,
            stderr: response.stderr,
            started_at: Utc::now(),
            duration_ms: 0,
        })
    }
}
