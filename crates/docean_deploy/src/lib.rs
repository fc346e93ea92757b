//! # docean_deploy
//!
//! Provisioning and App Platform deployment for an ERPNext stack on
//! DigitalOcean.
//!
//! The [`Deployer`] talks to the provider only through the [`CloudPlatform`]
//! trait. [`Doctl`] implements it over the `doctl` CLI and [`MockPlatform`]
//! in memory.
//!
//! # Features
//!
//! - **Idempotent provisioning**: managed PostgreSQL and Redis are reused when present
//! - **App descriptor**: JSON spec with connection details injected as env vars
//! - **Create or update**: the app is matched by name
//! - **Polling**: fixed-interval waits with timeouts on a tokio clock
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use docean_deploy::{DeployConfig, Deployer, Doctl};
//! use docean_runner::CliRunner;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = DeployConfig::default().with_admin_password("change-me");
//!     let platform = Doctl::new(Arc::new(CliRunner::default()));
//!
//!     let report = Deployer::new(&platform, &config).deploy().await?;
//!     println!("{:?}", report.url);
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod deployer;
pub mod descriptor;
pub mod doctl;
pub mod error;
pub mod mock;
pub mod models;
pub mod poll;
pub mod provider;

pub use config::{AppConfig, DeployConfig, ManagedDatabaseSpec, PollingConfig};
pub use deployer::{AppAction, AppDeployment, AppStatus, Deployer, DeploymentReport};
pub use descriptor::{AppSpec, EnvVar, GithubSource, HealthCheck, Route, ServiceSpec, ENV_KEYS};
pub use doctl::{Doctl, DOCTL};
pub use error::{DeployError, DeployResult, AUTH_HINT};
pub use mock::{MockPlatform, PlatformCall};
pub use models::{ConnectionInfo, DatabaseStatus, DeploymentPhase, ResourceSummary};
pub use poll::{poll_until, PollError, PollPolicy, PollStatus};
pub use provider::CloudPlatform;
