//! CLI command definitions.
//!
//! `deploy` runs the full provisioning and deployment sequence, `status`
//! reports on the deployed app and `render-spec` writes the app descriptor
//! without touching the provider.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Args, Parser, Subcommand, ValueEnum};
use thiserror::Error;

use docean_deploy::{DeployConfig, DeployError, Doctl, DOCTL};
use docean_runner::{CliRunner, CliRunnerOptions};

pub mod deploy;
pub mod render_spec;
pub mod status;

/// docean - ERPNext deployment on DigitalOcean
#[derive(Parser)]
#[command(name = "docean")]
#[command(version, about = "docean - ERPNext deployment on DigitalOcean")]
#[command(long_about = r#"
docean provisions a managed PostgreSQL database and a managed Redis cache,
then creates or updates an App Platform application running ERPNext. All
provider calls go through the doctl CLI, which must be installed and
authenticated (doctl auth init).

COMMANDS:
  deploy       → Provision resources and deploy the app
  status       → Show the app's deployment phase and URL
  render-spec  → Write the app spec from saved connection details

EXIT CODES:
  0 - Success
  1 - Deployment failure, timeout or interrupt
  2 - Invalid arguments or configuration
"#)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Log line format on stderr
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Provision the database and cache, then deploy the app
    Deploy(deploy::DeployArgs),

    /// Show the deployment phase and live URL of the app
    Status(status::StatusArgs),

    /// Write the app spec from saved connection JSON
    #[command(name = "render-spec")]
    RenderSpec(render_spec::RenderSpecArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

/// Errors raised by the CLI itself rather than the deployment.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("Invalid configuration in {}: {source}", path.display())]
    InvalidConfig {
        path: PathBuf,
        #[source]
        source: DeployError,
    },

    #[error("Interrupted")]
    Interrupted,
}

/// Configuration file and the overrides layered on top of it.
#[derive(Args, Default)]
pub struct ConfigArgs {
    /// YAML or TOML configuration file
    #[arg(short, long, env = "DOCEAN_CONFIG")]
    pub config: Option<PathBuf>,

    /// Region slug for all resources
    #[arg(long, env = "DOCEAN_REGION")]
    pub region: Option<String>,

    /// App Platform application name
    #[arg(long, env = "DOCEAN_APP_NAME")]
    pub app_name: Option<String>,

    /// Where to write the app spec
    #[arg(long)]
    pub spec_file: Option<PathBuf>,

    /// ERPNext administrator password
    #[arg(long, env = "DOCEAN_ADMIN_PASSWORD", hide_env_values = true)]
    pub admin_password: Option<String>,
}

impl ConfigArgs {
    /// Load the configuration file, if any, and apply the overrides.
    pub fn resolve(&self) -> Result<DeployConfig, CliError> {
        let mut config = match &self.config {
            Some(path) => load(path)?,
            None => DeployConfig::default(),
        };

        if let Some(region) = &self.region {
            config = config.with_region(region);
        }
        if let Some(name) = &self.app_name {
            config = config.with_app_name(name);
        }
        if let Some(path) = &self.spec_file {
            config = config.with_spec_file(path);
        }
        if let Some(password) = &self.admin_password {
            config = config.with_admin_password(password);
        }

        Ok(config)
    }
}

fn load(path: &Path) -> Result<DeployConfig, CliError> {
    DeployConfig::load(path).map_err(|source| CliError::InvalidConfig {
        path: path.to_path_buf(),
        source,
    })
}

/// How to invoke doctl.
#[derive(Args, Debug)]
pub struct DoctlArgs {
    /// doctl binary to run
    #[arg(long, env = "DOCEAN_DOCTL", default_value = DOCTL)]
    pub doctl: String,

    /// Timeout for a single doctl command, in seconds
    #[arg(long, default_value_t = 300)]
    pub command_timeout: u64,
}

impl DoctlArgs {
    pub fn platform(&self) -> Doctl {
        let runner = CliRunner::new(CliRunnerOptions::default().timeout(self.command_timeout));
        Doctl::new(Arc::new(runner)).with_program(&self.doctl)
    }
}

/// Fail early when the doctl binary cannot be executed.
pub async fn ensure_installed(platform: &Doctl) -> Result<(), DeployError> {
    if platform.is_installed().await {
        Ok(())
    } else {
        Err(DeployError::CliNotInstalled {
            program: platform.program().to_string(),
        })
    }
}
