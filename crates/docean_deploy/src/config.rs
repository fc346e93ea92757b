//! Deployment configuration.
//!
//! A single immutable [`DeployConfig`] describes everything a run needs. The
//! defaults reproduce the ERPNext production deployment; a YAML or TOML file
//! can override any field, and the CLI layers flags on top.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::descriptor::HealthCheck;
use crate::error::{DeployError, DeployResult};
use crate::poll::PollPolicy;

/// App Platform and managed database names: lowercase, digits and dashes.
const RESOURCE_NAME_PATTERN: &str = r"^[a-z][a-z0-9-]{1,30}[a-z0-9]$";

fn resource_name_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(RESOURCE_NAME_PATTERN).expect("valid resource name pattern"))
}

/// Top-level deployment configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeployConfig {
    /// Region slug for every resource
    pub region: String,
    /// Managed PostgreSQL cluster
    pub database: ManagedDatabaseSpec,
    /// Managed Redis cluster
    pub cache: ManagedDatabaseSpec,
    /// App Platform application
    pub app: AppConfig,
    /// Where the generated descriptor is written
    pub spec_file: PathBuf,
    /// Poll intervals and timeouts
    pub polling: PollingConfig,
    /// Administrator password injected into the app; never serialized back out
    #[serde(skip_serializing)]
    pub admin_password: Option<String>,
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            region: "nyc3".to_string(),
            database: ManagedDatabaseSpec::postgres("erpnext-postgres"),
            cache: ManagedDatabaseSpec::redis("erpnext-redis"),
            app: AppConfig::default(),
            spec_file: PathBuf::from("app_spec.json"),
            polling: PollingConfig::default(),
            admin_password: None,
        }
    }
}

impl DeployConfig {
    /// Load a configuration file; the format follows the extension.
    pub fn load(path: &Path) -> DeployResult<Self> {
        let content = fs::read_to_string(path)?;
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());

        let config: DeployConfig = match extension.as_deref() {
            Some("yaml") | Some("yml") => serde_yaml::from_str(&content)?,
            Some("toml") => toml::from_str(&content)?,
            _ => {
                return Err(DeployError::Config(format!(
                    "unsupported config format: {} (expected .yaml, .yml or .toml)",
                    path.display()
                )))
            }
        };

        debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    pub fn with_app_name(mut self, name: impl Into<String>) -> Self {
        self.app.name = name.into();
        self
    }

    pub fn with_spec_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.spec_file = path.into();
        self
    }

    pub fn with_admin_password(mut self, password: impl Into<String>) -> Self {
        self.admin_password = Some(password.into());
        self
    }

    pub fn with_polling(mut self, polling: PollingConfig) -> Self {
        self.polling = polling;
        self
    }

    /// The configured admin password, or an error if none was supplied.
    pub fn admin_password(&self) -> DeployResult<&str> {
        match self.admin_password.as_deref() {
            Some(p) if !p.is_empty() => Ok(p),
            _ => Err(DeployError::Config(
                "admin password is not set (use --admin-password or DOCEAN_ADMIN_PASSWORD)"
                    .to_string(),
            )),
        }
    }

    /// Check everything a deploy run depends on before touching the provider.
    pub fn validate(&self) -> DeployResult<()> {
        if self.region.trim().is_empty() {
            return Err(DeployError::Config("region must not be empty".to_string()));
        }

        for name in [&self.database.name, &self.cache.name, &self.app.name] {
            if !resource_name_regex().is_match(name) {
                return Err(DeployError::Config(format!(
                    "invalid resource name '{}': use 3-32 lowercase letters, digits or dashes",
                    name
                )));
            }
        }

        if self.database.name == self.cache.name {
            return Err(DeployError::Config(
                "database and cache must have different names".to_string(),
            ));
        }

        for spec in [&self.database, &self.cache] {
            if spec.num_nodes == 0 {
                return Err(DeployError::Config(format!(
                    "{} needs at least one node",
                    spec.name
                )));
            }
        }

        if self.app.instance_count == 0 {
            return Err(DeployError::Config(
                "app needs at least one instance".to_string(),
            ));
        }

        self.polling.validate()?;
        self.admin_password()?;
        Ok(())
    }
}

/// Parameters for a managed database cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagedDatabaseSpec {
    pub name: String,
    pub engine: String,
    pub version: String,
    pub size: String,
    pub num_nodes: u32,
}

impl ManagedDatabaseSpec {
    pub fn postgres(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            engine: "pg".to_string(),
            version: "15".to_string(),
            size: "db-s-2vcpu-4gb".to_string(),
            num_nodes: 1,
        }
    }

    pub fn redis(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            engine: "redis".to_string(),
            version: "7".to_string(),
            size: "db-s-1vcpu-1gb".to_string(),
            num_nodes: 1,
        }
    }

    /// Human-readable kind used in progress messages.
    pub fn kind(&self) -> &'static str {
        match self.engine.as_str() {
            "pg" | "postgres" | "postgresql" => "PostgreSQL database",
            "redis" | "valkey" => "Redis cache",
            "mysql" => "MySQL database",
            _ => "database cluster",
        }
    }
}

/// Static settings of the App Platform application.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub name: String,
    pub service_name: String,
    pub repo: String,
    pub branch: String,
    pub deploy_on_push: bool,
    pub source_dir: String,
    pub dockerfile_path: String,
    pub build_command: String,
    pub run_command: String,
    pub instance_count: u32,
    pub instance_size_slug: String,
    pub http_port: u16,
    pub route_path: String,
    pub health_check: HealthCheck,
    /// Login shown in the final report
    pub admin_user: String,
    /// Setup guide shown in the final report
    pub guide_url: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            name: "erpnext-production".to_string(),
            service_name: "erpnext-web".to_string(),
            repo: "Mr-Taha-1/erpnext-production".to_string(),
            branch: "main".to_string(),
            deploy_on_push: true,
            source_dir: "/".to_string(),
            dockerfile_path: "Dockerfile".to_string(),
            build_command: "echo 'Building ERPNext application...' && chmod +x startup.sh"
                .to_string(),
            run_command: "./startup.sh".to_string(),
            instance_count: 1,
            instance_size_slug: "professional-xs".to_string(),
            http_port: 8000,
            route_path: "/".to_string(),
            health_check: HealthCheck::default(),
            admin_user: "Administrator".to_string(),
            guide_url: Some(
                "https://github.com/Mr-Taha-1/erpnext-production/blob/main/MANUAL_DEPLOYMENT_GUIDE.md"
                    .to_string(),
            ),
        }
    }
}

/// Poll intervals and timeouts, in seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    pub interval_secs: u64,
    pub readiness_timeout_secs: u64,
    pub deployment_timeout_secs: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_secs: 30,
            readiness_timeout_secs: 600,
            deployment_timeout_secs: 1200,
        }
    }
}

impl PollingConfig {
    /// Policy for managed database readiness.
    pub fn readiness(&self) -> PollPolicy {
        PollPolicy::new(
            Duration::from_secs(self.interval_secs),
            Duration::from_secs(self.readiness_timeout_secs),
        )
    }

    /// Policy for App Platform deployments.
    pub fn deployment(&self) -> PollPolicy {
        PollPolicy::new(
            Duration::from_secs(self.interval_secs),
            Duration::from_secs(self.deployment_timeout_secs),
        )
    }

    fn validate(&self) -> DeployResult<()> {
        if self.interval_secs == 0 {
            return Err(DeployError::Config(
                "poll interval must be at least one second".to_string(),
            ));
        }
        if self.readiness_timeout_secs < self.interval_secs
            || self.deployment_timeout_secs < self.interval_secs
        {
            return Err(DeployError::Config(
                "poll timeouts must be at least one interval long".to_string(),
            ));
        }
        Ok(())
    }
}
