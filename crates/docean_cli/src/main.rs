//! docean CLI - Main entry point.
//!
//! Exit codes:
//! - 0: Success
//! - 1: Deployment failure, timeout, interrupt or unexpected error
//! - 2: Invalid arguments or configuration

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use docean_deploy::DeployError;
use docean_runner::RunnerError;

mod commands;

use commands::{Cli, CliError, Commands, LogFormat};

/// Process exit codes
pub struct ExitCodes;

impl ExitCodes {
    pub const SUCCESS: u8 = 0;
    pub const FAILURE: u8 = 1;
    pub const INVALID_ARGS: u8 = 2;
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::from(ExitCodes::INVALID_ARGS)
            } else {
                ExitCode::from(ExitCodes::SUCCESS)
            };
        }
    };

    init_logging(&cli);

    let run = async {
        match cli.command {
            Commands::Deploy(args) => commands::deploy::execute(args).await,
            Commands::Status(args) => commands::status::execute(args).await,
            Commands::RenderSpec(args) => commands::render_spec::execute(args).await,
        }
    };

    let result = tokio::select! {
        result = run => result,
        _ = tokio::signal::ctrl_c() => Err(CliError::Interrupted.into()),
    };

    match result {
        Ok(()) => ExitCode::from(ExitCodes::SUCCESS),
        Err(e) => {
            eprintln!("{}", render_error(&e));
            ExitCode::from(categorize_error(&e))
        }
    }
}

/// Log to stderr; `RUST_LOG` wins over the verbosity flags.
fn init_logging(cli: &Cli) {
    let default_directives = if cli.verbose {
        "docean=debug,warn"
    } else if cli.quiet {
        "warn"
    } else {
        "docean=info,warn"
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives));

    let registry = tracing_subscriber::registry().with(filter);
    let log_result = match cli.log_format {
        LogFormat::Text => registry
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .try_init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init(),
    };

    if log_result.is_err() {
        // Logging already initialized, continue
    }
}

/// The error chain on one line, followed by the captured output of the
/// first failed command found in the chain.
fn render_error(e: &anyhow::Error) -> String {
    let mut rendered = format!("❌ Error: {:#}", e);

    let captured = e
        .chain()
        .find_map(|cause| cause.downcast_ref::<RunnerError>()?.captured_output());
    if let Some((stdout, stderr)) = captured {
        for (label, text) in [("STDOUT", stdout), ("STDERR", stderr)] {
            let text = text.trim_end();
            if !text.is_empty() {
                rendered.push_str(&format!("\n{}:\n{}", label, text));
            }
        }
    }

    rendered
}

/// Map an error to its exit code
fn categorize_error(e: &anyhow::Error) -> u8 {
    if let Some(cli_error) = e.downcast_ref::<CliError>() {
        return match cli_error {
            CliError::InvalidConfig { .. } => ExitCodes::INVALID_ARGS,
            CliError::Interrupted => ExitCodes::FAILURE,
        };
    }

    match e.downcast_ref::<DeployError>() {
        Some(DeployError::Config(_)) => ExitCodes::INVALID_ARGS,
        _ => ExitCodes::FAILURE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_categorize_error() {
        let config: anyhow::Error = DeployError::Config("admin password is not set".to_string()).into();
        assert_eq!(categorize_error(&config), ExitCodes::INVALID_ARGS);

        let wrapped = Err::<(), _>(DeployError::Config("bad region".to_string()))
            .context("Deployment failed")
            .unwrap_err();
        assert_eq!(categorize_error(&wrapped), ExitCodes::INVALID_ARGS);

        let timeout: anyhow::Error = DeployError::ReadinessTimeout {
            name: "erpnext-postgres".to_string(),
            waited_secs: 600,
            last_status: "creating".to_string(),
        }
        .into();
        assert_eq!(categorize_error(&timeout), ExitCodes::FAILURE);

        let interrupted: anyhow::Error = CliError::Interrupted.into();
        assert_eq!(categorize_error(&interrupted), ExitCodes::FAILURE);

        assert_eq!(
            categorize_error(&anyhow::anyhow!("something else")),
            ExitCodes::FAILURE
        );

        let missing: anyhow::Error = DeployError::CliNotInstalled {
            program: "doctl".to_string(),
        }
        .into();
        assert_eq!(categorize_error(&missing), ExitCodes::FAILURE);
    }

    #[test]
    fn test_render_error_includes_captured_output() {
        let failed = RunnerError::CommandFailed {
            command: "doctl apps update app-1 --spec app_spec.json".to_string(),
            exit_code: 1,
            stdout: "Notice: validating spec\n".to_string(),
            stderr: "Error: validation failed\nservices[0].envs[3]: invalid value\nError: request failed\n"
                .to_string(),
        };
        let err = Err::<(), _>(DeployError::from(failed))
            .context("Deployment failed")
            .unwrap_err();

        let rendered = render_error(&err);

        assert!(rendered.starts_with("❌ Error: Deployment failed: "));
        assert!(rendered.contains("\nSTDOUT:\nNotice: validating spec"));
        assert!(rendered.contains(
            "\nSTDERR:\nError: validation failed\nservices[0].envs[3]: invalid value\nError: request failed"
        ));
    }

    #[test]
    fn test_render_error_through_resource_creation() {
        let failed = RunnerError::CommandFailed {
            command: "doctl databases create erpnext-redis".to_string(),
            exit_code: 1,
            stdout: String::new(),
            stderr: "Error: 422 invalid size\n".to_string(),
        };
        let err: anyhow::Error = DeployError::ResourceCreation {
            kind: "cache".to_string(),
            name: "erpnext-redis".to_string(),
            source: Box::new(failed.into()),
        }
        .into();

        let rendered = render_error(&err);

        assert!(rendered.contains("\nSTDERR:\nError: 422 invalid size"));
        assert!(!rendered.contains("STDOUT:"));
    }

    #[test]
    fn test_render_error_without_command_output() {
        let err: anyhow::Error = CliError::Interrupted.into();
        assert_eq!(render_error(&err), "❌ Error: Interrupted");
    }
}
