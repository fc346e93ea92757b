//! App Platform application descriptor.
//!
//! The descriptor is the JSON document handed to `doctl apps create/update
//! --spec`. It is assembled once per deployment from the static application
//! settings and the connection details of the managed database and cache.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::{AppConfig, DeployConfig};
use crate::error::{DeployError, DeployResult};
use crate::models::ConnectionInfo;

/// Environment keys the service receives, in descriptor order.
pub const ENV_KEYS: [&str; 11] = [
    "FRAPPE_SITE_NAME_HEADER",
    "ADMIN_PASSWORD",
    "DB_HOST",
    "DB_PORT",
    "DB_NAME",
    "DB_USER",
    "DB_PASSWORD",
    "REDIS_CACHE",
    "REDIS_QUEUE",
    "REDIS_SOCKETIO",
    "REDIS_PASSWORD",
];

/// Platform placeholder resolved to the app's domain at deploy time.
pub const APP_DOMAIN_PLACEHOLDER: &str = "${APP_DOMAIN}";

/// Top-level application descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppSpec {
    pub name: String,
    pub region: String,
    pub services: Vec<ServiceSpec>,
}

/// One service component of the application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceSpec {
    pub name: String,
    pub source_dir: String,
    pub dockerfile_path: String,
    pub github: GithubSource,
    pub build_command: String,
    pub run_command: String,
    pub instance_count: u32,
    pub instance_size_slug: String,
    pub http_port: u16,
    pub routes: Vec<Route>,
    pub health_check: HealthCheck,
    pub envs: Vec<EnvVar>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GithubSource {
    pub repo: String,
    pub branch: String,
    pub deploy_on_push: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub path: String,
}

/// HTTP health-check policy for a service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthCheck {
    pub http_path: String,
    pub initial_delay_seconds: u32,
    pub period_seconds: u32,
    pub timeout_seconds: u32,
    pub success_threshold: u32,
    pub failure_threshold: u32,
}

impl Default for HealthCheck {
    fn default() -> Self {
        Self {
            http_path: "/api/method/ping".to_string(),
            initial_delay_seconds: 60,
            period_seconds: 30,
            timeout_seconds: 10,
            success_threshold: 1,
            failure_threshold: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvVar {
    pub key: String,
    pub value: String,
}

impl EnvVar {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

impl AppSpec {
    /// Assemble the descriptor from configuration and connection details.
    pub fn build(
        config: &DeployConfig,
        database: &ConnectionInfo,
        cache: &ConnectionInfo,
    ) -> DeployResult<Self> {
        let admin_password = config.admin_password()?;
        let service = ServiceSpec::build(&config.app, admin_password, database, cache);

        Ok(Self {
            name: config.app.name.clone(),
            region: config.region.clone(),
            services: vec![service],
        })
    }

    /// Serialize as pretty JSON to `path`, replacing any previous file.
    pub fn write_to(&self, path: &Path) -> DeployResult<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        info!("App specification written: {}", path.display());
        Ok(())
    }

    /// Read a descriptor previously written with [`write_to`](Self::write_to).
    pub fn read_from(path: &Path) -> DeployResult<Self> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Look up an environment value on the first service.
    pub fn env(&self, key: &str) -> Option<&str> {
        self.services
            .first()?
            .envs
            .iter()
            .find(|e| e.key == key)
            .map(|e| e.value.as_str())
    }
}

impl ServiceSpec {
    fn build(
        app: &AppConfig,
        admin_password: &str,
        database: &ConnectionInfo,
        cache: &ConnectionInfo,
    ) -> Self {
        let redis_address = cache.address();

        let envs = vec![
            EnvVar::new("FRAPPE_SITE_NAME_HEADER", APP_DOMAIN_PLACEHOLDER),
            EnvVar::new("ADMIN_PASSWORD", admin_password),
            EnvVar::new("DB_HOST", &database.host),
            EnvVar::new("DB_PORT", database.port.to_string()),
            EnvVar::new("DB_NAME", &database.database),
            EnvVar::new("DB_USER", &database.user),
            EnvVar::new("DB_PASSWORD", &database.password),
            EnvVar::new("REDIS_CACHE", &redis_address),
            EnvVar::new("REDIS_QUEUE", &redis_address),
            EnvVar::new("REDIS_SOCKETIO", &redis_address),
            EnvVar::new("REDIS_PASSWORD", &cache.password),
        ];

        Self {
            name: app.service_name.clone(),
            source_dir: app.source_dir.clone(),
            dockerfile_path: app.dockerfile_path.clone(),
            github: GithubSource {
                repo: app.repo.clone(),
                branch: app.branch.clone(),
                deploy_on_push: app.deploy_on_push,
            },
            build_command: app.build_command.clone(),
            run_command: app.run_command.clone(),
            instance_count: app.instance_count,
            instance_size_slug: app.instance_size_slug.clone(),
            http_port: app.http_port,
            routes: vec![Route {
                path: app.route_path.clone(),
            }],
            health_check: app.health_check.clone(),
            envs,
        }
    }
}

/// Refuse to build a descriptor from connection details that are obviously empty.
pub fn check_connection(kind: &str, info: &ConnectionInfo) -> DeployResult<()> {
    if info.host.trim().is_empty() {
        return Err(DeployError::UnexpectedOutput {
            command: format!("{} connection", kind),
            detail: "connection details have no host".to_string(),
        });
    }
    Ok(())
}
