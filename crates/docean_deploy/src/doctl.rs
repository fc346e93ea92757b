//! `doctl` implementation of [`CloudPlatform`].
//!
//! Every operation is one `doctl` invocation. Text output is requested with
//! `--format <columns> --no-header` where a single column is enough; app
//! records are read as JSON.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info};

use docean_runner::{CommandOutput, CommandRunner};

use crate::config::ManagedDatabaseSpec;
use crate::error::{DeployError, DeployResult};
use crate::models::{ConnectionInfo, DatabaseStatus, DeploymentPhase, ResourceSummary};
use crate::provider::CloudPlatform;

/// Default name of the DigitalOcean CLI binary.
pub const DOCTL: &str = "doctl";

/// DigitalOcean platform driven through the `doctl` CLI.
pub struct Doctl {
    runner: Arc<dyn CommandRunner>,
    program: String,
}

impl Doctl {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            runner,
            program: DOCTL.to_string(),
        }
    }

    /// Use a different binary, e.g. a pinned path.
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Check that the binary can be executed at all.
    pub async fn is_installed(&self) -> bool {
        self.runner.is_available(&self.program).await
    }

    async fn run(&self, args: &[&str]) -> DeployResult<CommandOutput> {
        Ok(self.runner.run_checked(&self.program, args).await?)
    }

    /// Fetch the JSON record of one app.
    async fn app_record(&self, id: &str) -> DeployResult<AppRecord> {
        let output = self.run(&["apps", "get", id, "--output", "json"]).await?;
        let mut records = parse_app_records(&output.stdout)?;
        if records.is_empty() {
            return Err(DeployError::UnexpectedOutput {
                command: output.command,
                detail: format!("no app record returned for {}", id),
            });
        }
        Ok(records.swap_remove(0))
    }
}

#[async_trait]
impl CloudPlatform for Doctl {
    async fn account_info(&self) -> DeployResult<String> {
        let output = self
            .runner
            .run(&self.program, &["account", "get", "--format", "Email", "--no-header"])
            .await?;

        if !output.success() {
            let detail = output
                .stderr
                .lines()
                .rev()
                .find(|l| !l.trim().is_empty())
                .map(|l| l.trim().to_string())
                .unwrap_or_else(|| format!("`{}` exited with code {}", output.command, output.exit_code));
            return Err(DeployError::NotAuthenticated { detail });
        }

        Ok(output.trimmed_stdout().to_string())
    }

    async fn list_databases(&self) -> DeployResult<Vec<ResourceSummary>> {
        let output = self
            .run(&["databases", "list", "--format", "ID,Name", "--no-header"])
            .await?;
        Ok(parse_id_name_rows(&output.stdout))
    }

    async fn create_database(
        &self,
        spec: &ManagedDatabaseSpec,
        region: &str,
    ) -> DeployResult<String> {
        let num_nodes = spec.num_nodes.to_string();
        let args = [
            "databases",
            "create",
            spec.name.as_str(),
            "--engine",
            spec.engine.as_str(),
            "--version",
            spec.version.as_str(),
            "--size",
            spec.size.as_str(),
            "--region",
            region,
            "--num-nodes",
            num_nodes.as_str(),
            "--format",
            "ID",
            "--no-header",
        ];

        let output = self.run(&args).await?;
        let id = first_token(&output)?;
        info!("Requested {} {} ({})", spec.kind(), spec.name, id);
        Ok(id)
    }

    async fn database_status(&self, id: &str) -> DeployResult<DatabaseStatus> {
        let output = self
            .run(&["databases", "get", id, "--format", "Status", "--no-header"])
            .await?;
        Ok(DatabaseStatus::new(output.trimmed_stdout()))
    }

    async fn database_connection(&self, id: &str) -> DeployResult<ConnectionInfo> {
        let output = self
            .run(&["databases", "connection", id, "--output", "json"])
            .await?;
        parse_connection(&output)
    }

    async fn list_apps(&self) -> DeployResult<Vec<ResourceSummary>> {
        let output = self.run(&["apps", "list", "--output", "json"]).await?;
        let apps = parse_app_records(&output.stdout)?
            .into_iter()
            .filter_map(|r| {
                let name = r.spec?.name;
                Some(ResourceSummary::new(r.id, name))
            })
            .collect();
        Ok(apps)
    }

    async fn create_app(&self, spec_path: &Path) -> DeployResult<String> {
        let spec = spec_path.to_string_lossy();
        let output = self
            .run(&["apps", "create", "--spec", &*spec, "--format", "ID", "--no-header"])
            .await?;
        first_token(&output)
    }

    async fn update_app(&self, id: &str, spec_path: &Path) -> DeployResult<()> {
        let spec = spec_path.to_string_lossy();
        self.run(&["apps", "update", id, "--spec", &*spec]).await?;
        Ok(())
    }

    async fn app_phase(&self, id: &str) -> DeployResult<DeploymentPhase> {
        let record = self.app_record(id).await?;
        let phase = record.current_phase();
        debug!("App {} phase: {}", id, phase);
        Ok(phase)
    }

    async fn app_url(&self, id: &str) -> DeployResult<Option<String>> {
        let record = self.app_record(id).await?;
        Ok(record.live_url.filter(|u| !u.trim().is_empty()))
    }
}

/// App record as printed by `doctl apps list/get --output json`.
#[derive(Debug, Deserialize)]
struct AppRecord {
    id: String,
    #[serde(default)]
    spec: Option<AppRecordSpec>,
    #[serde(default)]
    live_url: Option<String>,
    #[serde(default)]
    active_deployment: Option<DeploymentRecord>,
    #[serde(default)]
    in_progress_deployment: Option<DeploymentRecord>,
    #[serde(default)]
    pending_deployment: Option<DeploymentRecord>,
}

#[derive(Debug, Deserialize)]
struct AppRecordSpec {
    name: String,
}

#[derive(Debug, Deserialize)]
struct DeploymentRecord {
    #[serde(default)]
    phase: Option<String>,
}

impl AppRecord {
    /// Phase of the newest deployment: in progress, then pending, then active.
    fn current_phase(&self) -> DeploymentPhase {
        [
            &self.in_progress_deployment,
            &self.pending_deployment,
            &self.active_deployment,
        ]
        .into_iter()
        .flatten()
        .find_map(|d| d.phase.as_deref())
        .map(DeploymentPhase::parse)
        .unwrap_or_else(|| DeploymentPhase::Unknown(String::new()))
    }
}

fn parse_app_records(stdout: &str) -> DeployResult<Vec<AppRecord>> {
    let trimmed = stdout.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return Ok(Vec::new());
    }
    let records: Option<Vec<AppRecord>> = serde_json::from_str(trimmed)?;
    Ok(records.unwrap_or_default())
}

/// Parse `ID Name` rows; the name is everything after the first column.
fn parse_id_name_rows(stdout: &str) -> Vec<ResourceSummary> {
    stdout
        .lines()
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            let id = parts.next()?;
            let name = parts.collect::<Vec<_>>().join(" ");
            if name.is_empty() {
                return None;
            }
            Some(ResourceSummary::new(id, name))
        })
        .collect()
}

fn parse_connection(output: &CommandOutput) -> DeployResult<ConnectionInfo> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(ConnectionInfo),
        Many(Vec<ConnectionInfo>),
    }

    match serde_json::from_str::<OneOrMany>(output.trimmed_stdout())? {
        OneOrMany::One(info) => Ok(info),
        OneOrMany::Many(list) => list.into_iter().next().ok_or_else(|| {
            DeployError::UnexpectedOutput {
                command: output.command.clone(),
                detail: "empty connection list".to_string(),
            }
        }),
    }
}

/// First whitespace-separated token of stdout, used for `--format ID` output.
fn first_token(output: &CommandOutput) -> DeployResult<String> {
    output
        .stdout
        .split_whitespace()
        .next()
        .map(str::to_string)
        .ok_or_else(|| DeployError::UnexpectedOutput {
            command: output.command.clone(),
            detail: "expected an id but the output was empty".to_string(),
        })
}
