//! Error types for deployment operations.

use thiserror::Error;

/// Result type alias for deployment operations.
pub type DeployResult<T> = Result<T, DeployError>;

/// Command to run when the provider CLI is not authenticated.
pub const AUTH_HINT: &str = "doctl auth init";

/// Errors that can occur while provisioning or deploying.
#[derive(Error, Debug)]
pub enum DeployError {
    #[error("DigitalOcean CLI `{program}` is not installed or not on PATH")]
    CliNotInstalled { program: String },

    #[error("DigitalOcean CLI is not authenticated: {detail}. Please run: {}", AUTH_HINT)]
    NotAuthenticated { detail: String },

    #[error("Failed to create {kind} {name}: {source}")]
    ResourceCreation {
        kind: String,
        name: String,
        #[source]
        source: Box<DeployError>,
    },

    #[error("Timeout waiting for {name} to be ready after {waited_secs}s (last status: {last_status})")]
    ReadinessTimeout {
        name: String,
        waited_secs: u64,
        last_status: String,
    },

    #[error("Deployment of app {app_id} failed (phase: {phase})")]
    DeploymentFailed { app_id: String, phase: String },

    #[error("Timeout waiting for app {app_id} to deploy after {waited_secs}s (last phase: {last_phase})")]
    DeploymentTimeout {
        app_id: String,
        waited_secs: u64,
        last_phase: String,
    },

    #[error("Unexpected output from `{command}`: {detail}")]
    UnexpectedOutput { command: String, detail: String },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Command error: {0}")]
    Runner(#[from] docean_runner::RunnerError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl DeployError {
    /// Whether the error came from the provider rejecting our credentials.
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, Self::NotAuthenticated { .. })
    }
}
