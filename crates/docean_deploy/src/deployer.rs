//! Deployment orchestrator.
//!
//! [`Deployer`] runs the fixed sequence against a [`CloudPlatform`]:
//! authenticate, ensure the database, ensure the cache, write the app
//! descriptor, create or update the app, wait for it to go live and report
//! its URL. Each stage returns a [`DeployResult`] and the first failure ends
//! the run. Nothing is rolled back.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use docean_runner::RunnerError;

use crate::config::{DeployConfig, ManagedDatabaseSpec};
use crate::descriptor::{check_connection, AppSpec};
use crate::error::{DeployError, DeployResult};
use crate::models::{ConnectionInfo, DeploymentPhase};
use crate::poll::{poll_until, PollError, PollStatus};
use crate::provider::CloudPlatform;

/// Whether the app was created by this run or already existed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppAction {
    Created,
    Updated,
}

impl fmt::Display for AppAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Updated => write!(f, "updated"),
        }
    }
}

/// App identity after create-or-update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppDeployment {
    pub id: String,
    pub action: AppAction,
}

/// Summary of a successful deployment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentReport {
    pub run_id: Uuid,
    pub app_name: String,
    pub app_id: String,
    pub action: AppAction,
    /// Live URL; `None` if the provider did not report one in time
    pub url: Option<String>,
    pub spec_path: PathBuf,
    pub admin_user: String,
    pub guide_url: Option<String>,
    pub started_at: DateTime<Utc>,
    #[serde(with = "duration_secs")]
    pub elapsed: Duration,
}

/// Current state of a deployed app.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppStatus {
    pub id: String,
    pub phase: DeploymentPhase,
    pub url: Option<String>,
}

/// Runs deployments against a platform with a fixed configuration.
pub struct Deployer<'a, P: CloudPlatform + ?Sized> {
    platform: &'a P,
    config: &'a DeployConfig,
}

impl<'a, P: CloudPlatform + ?Sized> Deployer<'a, P> {
    pub fn new(platform: &'a P, config: &'a DeployConfig) -> Self {
        Self { platform, config }
    }

    /// Run the whole sequence.
    pub async fn deploy(&self) -> DeployResult<DeploymentReport> {
        let run_id = Uuid::new_v4();
        let span = info_span!("deploy", run_id = %run_id, app = %self.config.app.name);
        self.run(run_id).instrument(span).await
    }

    async fn run(&self, run_id: Uuid) -> DeployResult<DeploymentReport> {
        let started_at = Utc::now();
        let start = Instant::now();

        self.config.validate()?;
        info!(
            "Deploying {} to {}",
            self.config.app.name, self.config.region
        );

        self.check_auth().await?;
        let database = self.ensure_database().await?;
        let cache = self.ensure_cache().await?;
        let spec_path = self.write_app_spec(&database, &cache)?;
        let app = self.create_or_update_app(&spec_path).await?;
        self.wait_for_deployment(&app.id).await?;
        let url = self.app_url(&app.id).await;

        let elapsed = start.elapsed();
        info!("Deployment finished in {}s", elapsed.as_secs());

        Ok(DeploymentReport {
            run_id,
            app_name: self.config.app.name.clone(),
            app_id: app.id,
            action: app.action,
            url,
            spec_path,
            admin_user: self.config.app.admin_user.clone(),
            guide_url: self.config.app.guide_url.clone(),
            started_at,
            elapsed,
        })
    }

    /// Fail unless the provider CLI is installed and authenticated.
    pub async fn check_auth(&self) -> DeployResult<String> {
        info!("Checking DigitalOcean authentication...");
        let account = self.platform.account_info().await.map_err(|e| match e {
            DeployError::Runner(RunnerError::ProgramNotFound(program)) => {
                DeployError::CliNotInstalled { program }
            }
            e @ (DeployError::NotAuthenticated { .. } | DeployError::CliNotInstalled { .. }) => e,
            e => DeployError::NotAuthenticated {
                detail: e.to_string(),
            },
        })?;
        info!("Authenticated as {}", account);
        Ok(account)
    }

    pub async fn ensure_database(&self) -> DeployResult<ConnectionInfo> {
        self.ensure_managed(&self.config.database).await
    }

    pub async fn ensure_cache(&self) -> DeployResult<ConnectionInfo> {
        self.ensure_managed(&self.config.cache).await
    }

    /// Reuse the cluster named in `spec` or create it, then return its
    /// connection details.
    pub async fn ensure_managed(&self, spec: &ManagedDatabaseSpec) -> DeployResult<ConnectionInfo> {
        let kind = spec.kind();
        let existing = self.platform.list_databases().await?;

        let id = match existing.into_iter().find(|r| r.name == spec.name) {
            Some(found) => {
                info!("{} {} already exists", kind, spec.name);
                found.id
            }
            None => {
                info!("Creating {} {}...", kind, spec.name);
                let id = self
                    .platform
                    .create_database(spec, &self.config.region)
                    .await
                    .map_err(|e| DeployError::ResourceCreation {
                        kind: kind.to_string(),
                        name: spec.name.clone(),
                        source: Box::new(e),
                    })?;
                self.wait_for_resource(&spec.name, &id).await?;
                id
            }
        };

        let connection = self.platform.database_connection(&id).await?;
        check_connection(kind, &connection)?;
        debug!("{} {} at {}", kind, spec.name, connection.address());
        Ok(connection)
    }

    /// Poll a managed cluster until it reports `online`.
    pub async fn wait_for_resource(&self, name: &str, id: &str) -> DeployResult<()> {
        info!("Waiting for {} to be ready...", name);
        let platform = self.platform;
        let policy = self.config.polling.readiness();

        let result = poll_until(&policy, name, move || async move {
            let status = platform.database_status(id).await?;
            if status.is_online() {
                Ok::<_, DeployError>(PollStatus::Ready(()))
            } else {
                Ok(PollStatus::Pending(status.to_string()))
            }
        })
        .await;

        match result {
            Ok(()) => {
                info!("{} is ready", name);
                Ok(())
            }
            Err(PollError::TimedOut {
                elapsed_secs,
                last_status,
                ..
            }) => Err(DeployError::ReadinessTimeout {
                name: name.to_string(),
                waited_secs: elapsed_secs,
                last_status,
            }),
            Err(PollError::Failed { reason, .. }) => Err(DeployError::UnexpectedOutput {
                command: format!("databases get {}", id),
                detail: reason,
            }),
        }
    }

    /// Build the descriptor and write it to the configured file.
    pub fn write_app_spec(
        &self,
        database: &ConnectionInfo,
        cache: &ConnectionInfo,
    ) -> DeployResult<PathBuf> {
        let spec = AppSpec::build(self.config, database, cache)?;
        spec.write_to(&self.config.spec_file)?;
        Ok(self.config.spec_file.clone())
    }

    /// Update the app if one with the configured name exists, else create it.
    pub async fn create_or_update_app(&self, spec_path: &Path) -> DeployResult<AppDeployment> {
        let name = &self.config.app.name;
        let apps = self.platform.list_apps().await?;

        if let Some(app) = apps.into_iter().find(|a| &a.name == name) {
            info!("Updating existing app {} ({})", name, app.id);
            self.platform.update_app(&app.id, spec_path).await?;
            return Ok(AppDeployment {
                id: app.id,
                action: AppAction::Updated,
            });
        }

        info!("Creating new app {}...", name);
        let id = self
            .platform
            .create_app(spec_path)
            .await
            .map_err(|e| DeployError::ResourceCreation {
                kind: "app".to_string(),
                name: name.clone(),
                source: Box::new(e),
            })?;
        info!("Created app {} ({})", name, id);

        Ok(AppDeployment {
            id,
            action: AppAction::Created,
        })
    }

    /// Poll the app until its deployment is active or has failed.
    pub async fn wait_for_deployment(&self, app_id: &str) -> DeployResult<()> {
        info!("Waiting for deployment to complete...");
        let platform = self.platform;
        let policy = self.config.polling.deployment();

        let result = poll_until(&policy, "deployment", move || async move {
            let phase = platform.app_phase(app_id).await?;
            let status = if phase.is_active() {
                PollStatus::Ready(())
            } else if phase.is_failure() {
                PollStatus::Failed(phase.to_string())
            } else {
                PollStatus::Pending(phase.to_string())
            };
            Ok::<_, DeployError>(status)
        })
        .await;

        match result {
            Ok(()) => {
                info!("Deployment is active");
                Ok(())
            }
            Err(PollError::Failed { reason, .. }) => Err(DeployError::DeploymentFailed {
                app_id: app_id.to_string(),
                phase: reason,
            }),
            Err(PollError::TimedOut {
                elapsed_secs,
                last_status,
                ..
            }) => Err(DeployError::DeploymentTimeout {
                app_id: app_id.to_string(),
                waited_secs: elapsed_secs,
                last_phase: last_status,
            }),
        }
    }

    /// Live URL of the app. A failed lookup is logged, not fatal.
    pub async fn app_url(&self, app_id: &str) -> Option<String> {
        match self.platform.app_url(app_id).await {
            Ok(Some(url)) => Some(url),
            Ok(None) => {
                warn!("App {} has no live URL yet", app_id);
                None
            }
            Err(e) => {
                warn!("Could not fetch URL for app {}: {}", app_id, e);
                None
            }
        }
    }

    /// Phase and URL of the configured app, or `None` if it does not exist.
    pub async fn status(&self) -> DeployResult<Option<AppStatus>> {
        self.check_auth().await?;
        let name = &self.config.app.name;

        let Some(app) = self
            .platform
            .list_apps()
            .await?
            .into_iter()
            .find(|a| &a.name == name)
        else {
            return Ok(None);
        };

        let phase = self.platform.app_phase(&app.id).await?;
        let url = self.platform.app_url(&app.id).await?;
        Ok(Some(AppStatus {
            id: app.id,
            phase,
            url,
        }))
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_secs)
    }
}
