//! # docean_runner
//!
//! External command execution wrapper for docean.
//!
//! Every interaction with the cloud provider goes through a command-line
//! tool. This crate isolates process spawning behind the [`CommandRunner`]
//! trait so that callers can be exercised against a scripted
//! [`MockRunner`] instead of the real binary.
//!
//! # Features
//!
//! - **CLI Runner**: `tokio::process` execution with timeouts and captured output
//! - **Checked Execution**: non-zero exits become errors carrying stdout/stderr
//! - **Mock Runner**: scripted responses and call capture for tests
//!
//! # Example
//!
//! ```rust,no_run
//! use docean_runner::{CliRunner, CliRunnerOptions, CommandRunner};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let runner = CliRunner::new(CliRunnerOptions::default().timeout(60));
//!
//!     let output = runner.run_checked("doctl", &["account", "get"]).await?;
//!     println!("{}", output.stdout);
//!
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod error;
pub mod mock;
pub mod runner;

pub use cli::{CliRunner, CliRunnerOptions};
pub use error::{RunnerError, RunnerResult};
pub use mock::{CapturedCall, MockResponse, MockRunner};
pub use runner::{format_command, CommandOutput, CommandRunner};
