//! In-memory platform for testing.
//!
//! [`MockPlatform`] keeps a small model of the provider: managed clusters,
//! their connection details, apps and their URLs. Status and phase queries
//! follow scripts so poll loops can be driven step by step. Every call is
//! recorded as a [`PlatformCall`].

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use docean_runner::RunnerError;

use crate::config::ManagedDatabaseSpec;
use crate::descriptor::AppSpec;
use crate::error::{DeployError, DeployResult};
use crate::models::{ConnectionInfo, DatabaseStatus, DeploymentPhase, ResourceSummary};
use crate::provider::CloudPlatform;

/// A recorded platform call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformCall {
    AccountInfo,
    ListDatabases,
    CreateDatabase { name: String, region: String },
    DatabaseStatus { id: String },
    DatabaseConnection { id: String },
    ListApps,
    CreateApp { spec_path: PathBuf },
    UpdateApp { id: String, spec_path: PathBuf },
    AppPhase { id: String },
    AppUrl { id: String },
}

#[derive(Debug)]
struct MockState {
    authenticated: bool,
    databases: Vec<ResourceSummary>,
    connections: HashMap<String, ConnectionInfo>,
    statuses: HashMap<String, VecDeque<Result<String, String>>>,
    status_fallback: String,
    phases: VecDeque<Result<String, String>>,
    phase_fallback: String,
    apps: Vec<ResourceSummary>,
    urls: HashMap<String, String>,
    create_failure: Option<String>,
    calls: Vec<PlatformCall>,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            authenticated: true,
            databases: Vec::new(),
            connections: HashMap::new(),
            statuses: HashMap::new(),
            status_fallback: "online".to_string(),
            phases: VecDeque::new(),
            phase_fallback: "ACTIVE".to_string(),
            apps: Vec::new(),
            urls: HashMap::new(),
            create_failure: None,
            calls: Vec::new(),
        }
    }
}

/// Scripted [`CloudPlatform`].
///
/// Created clusters get the id `<name>-id` and created apps `<app name>-id`.
/// Connection details and status scripts are keyed by cluster name so they
/// can be set up before the cluster exists. Once a script runs out, status
/// queries return `online` and phase queries `ACTIVE` unless a different
/// fallback is set.
#[derive(Clone, Default)]
pub struct MockPlatform {
    state: Arc<RwLock<MockState>>,
}

impl MockPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `account_info` fail as an unauthenticated CLI would.
    pub fn unauthenticated(self) -> Self {
        self.state.write().authenticated = false;
        self
    }

    /// Register an existing cluster.
    pub fn with_database(
        self,
        id: impl Into<String>,
        name: impl Into<String>,
        connection: ConnectionInfo,
    ) -> Self {
        let name = name.into();
        {
            let mut state = self.state.write();
            state.databases.push(ResourceSummary::new(id, name.clone()));
            state.connections.insert(name, connection);
        }
        self
    }

    /// Connection details served for a cluster once it has been created.
    pub fn with_connection(self, name: impl Into<String>, connection: ConnectionInfo) -> Self {
        self.state.write().connections.insert(name.into(), connection);
        self
    }

    /// Statuses returned, in order, for the named cluster.
    pub fn with_statuses(self, name: &str, statuses: &[&str]) -> Self {
        {
            let mut state = self.state.write();
            let script = state.statuses.entry(name.to_string()).or_default();
            script.extend(statuses.iter().map(|s| Ok(s.to_string())));
        }
        self
    }

    /// Queue a failing status query for the named cluster.
    pub fn with_status_error(self, name: &str, message: impl Into<String>) -> Self {
        self.state
            .write()
            .statuses
            .entry(name.to_string())
            .or_default()
            .push_back(Err(message.into()));
        self
    }

    /// Status returned once a cluster's script is exhausted.
    pub fn with_status_fallback(self, status: impl Into<String>) -> Self {
        self.state.write().status_fallback = status.into();
        self
    }

    /// Register an existing app.
    pub fn with_app(self, id: impl Into<String>, name: impl Into<String>) -> Self {
        self.state.write().apps.push(ResourceSummary::new(id, name));
        self
    }

    pub fn with_url(self, app_id: impl Into<String>, url: impl Into<String>) -> Self {
        self.state.write().urls.insert(app_id.into(), url.into());
        self
    }

    /// Deployment phases returned, in order.
    pub fn with_phases(self, phases: &[&str]) -> Self {
        self.state
            .write()
            .phases
            .extend(phases.iter().map(|p| Ok(p.to_string())));
        self
    }

    /// Queue a failing phase query.
    pub fn with_phase_error(self, message: impl Into<String>) -> Self {
        self.state.write().phases.push_back(Err(message.into()));
        self
    }

    /// Phase returned once the phase script is exhausted.
    pub fn with_phase_fallback(self, phase: impl Into<String>) -> Self {
        self.state.write().phase_fallback = phase.into();
        self
    }

    /// Make every create call fail with `message`.
    pub fn fail_creates(self, message: impl Into<String>) -> Self {
        self.state.write().create_failure = Some(message.into());
        self
    }

    pub fn calls(&self) -> Vec<PlatformCall> {
        self.state.read().calls.clone()
    }

    /// Number of recorded calls matching `predicate`.
    pub fn count(&self, predicate: impl Fn(&PlatformCall) -> bool) -> usize {
        self.state.read().calls.iter().filter(|c| predicate(c)).count()
    }

    pub fn create_database_calls(&self) -> usize {
        self.count(|c| matches!(c, PlatformCall::CreateDatabase { .. }))
    }

    pub fn status_queries(&self) -> usize {
        self.count(|c| matches!(c, PlatformCall::DatabaseStatus { .. }))
    }

    pub fn phase_queries(&self) -> usize {
        self.count(|c| matches!(c, PlatformCall::AppPhase { .. }))
    }

    fn record(&self, call: PlatformCall) {
        self.state.write().calls.push(call);
    }

    fn database_name(state: &MockState, id: &str) -> Option<String> {
        state
            .databases
            .iter()
            .find(|d| d.id == id)
            .map(|d| d.name.clone())
    }

    fn query_failed(command: &str, message: String) -> DeployError {
        DeployError::Runner(RunnerError::CommandFailed {
            command: format!("doctl {}", command),
            exit_code: 1,
            stdout: String::new(),
            stderr: message,
        })
    }

    fn not_found(command: &str, id: &str) -> DeployError {
        Self::query_failed(command, format!("Error: {} not found", id))
    }
}

#[async_trait]
impl CloudPlatform for MockPlatform {
    async fn account_info(&self) -> DeployResult<String> {
        self.record(PlatformCall::AccountInfo);
        if self.state.read().authenticated {
            Ok("ops@example.com".to_string())
        } else {
            Err(DeployError::NotAuthenticated {
                detail: "Error: Unable to authenticate you".to_string(),
            })
        }
    }

    async fn list_databases(&self) -> DeployResult<Vec<ResourceSummary>> {
        self.record(PlatformCall::ListDatabases);
        Ok(self.state.read().databases.clone())
    }

    async fn create_database(
        &self,
        spec: &ManagedDatabaseSpec,
        region: &str,
    ) -> DeployResult<String> {
        self.record(PlatformCall::CreateDatabase {
            name: spec.name.clone(),
            region: region.to_string(),
        });

        let mut state = self.state.write();
        if let Some(message) = state.create_failure.clone() {
            return Err(Self::query_failed("databases create", message));
        }

        let id = format!("{}-id", spec.name);
        state
            .databases
            .push(ResourceSummary::new(id.clone(), spec.name.clone()));
        Ok(id)
    }

    async fn database_status(&self, id: &str) -> DeployResult<DatabaseStatus> {
        self.record(PlatformCall::DatabaseStatus { id: id.to_string() });

        let mut state = self.state.write();
        let name = Self::database_name(&state, id)
            .ok_or_else(|| Self::not_found("databases get", id))?;
        let fallback = state.status_fallback.clone();
        let next = state
            .statuses
            .get_mut(&name)
            .and_then(|script| script.pop_front())
            .unwrap_or(Ok(fallback));

        next.map(DatabaseStatus::new)
            .map_err(|message| Self::query_failed("databases get", message))
    }

    async fn database_connection(&self, id: &str) -> DeployResult<ConnectionInfo> {
        self.record(PlatformCall::DatabaseConnection { id: id.to_string() });

        let state = self.state.read();
        Self::database_name(&state, id)
            .and_then(|name| state.connections.get(&name).cloned())
            .ok_or_else(|| Self::not_found("databases connection", id))
    }

    async fn list_apps(&self) -> DeployResult<Vec<ResourceSummary>> {
        self.record(PlatformCall::ListApps);
        Ok(self.state.read().apps.clone())
    }

    async fn create_app(&self, spec_path: &Path) -> DeployResult<String> {
        self.record(PlatformCall::CreateApp {
            spec_path: spec_path.to_path_buf(),
        });

        if let Some(message) = self.state.read().create_failure.clone() {
            return Err(Self::query_failed("apps create", message));
        }

        let spec = AppSpec::read_from(spec_path)?;
        let id = format!("{}-id", spec.name);
        self.state
            .write()
            .apps
            .push(ResourceSummary::new(id.clone(), spec.name));
        Ok(id)
    }

    async fn update_app(&self, id: &str, spec_path: &Path) -> DeployResult<()> {
        self.record(PlatformCall::UpdateApp {
            id: id.to_string(),
            spec_path: spec_path.to_path_buf(),
        });

        if !self.state.read().apps.iter().any(|a| a.id == id) {
            return Err(Self::not_found("apps update", id));
        }
        AppSpec::read_from(spec_path)?;
        Ok(())
    }

    async fn app_phase(&self, id: &str) -> DeployResult<DeploymentPhase> {
        self.record(PlatformCall::AppPhase { id: id.to_string() });

        let mut state = self.state.write();
        let fallback = state.phase_fallback.clone();
        let next = state.phases.pop_front().unwrap_or(Ok(fallback));

        next.map(|p| DeploymentPhase::parse(&p))
            .map_err(|message| Self::query_failed("apps get", message))
    }

    async fn app_url(&self, id: &str) -> DeployResult<Option<String>> {
        self.record(PlatformCall::AppUrl { id: id.to_string() });
        Ok(self.state.read().urls.get(id).cloned())
    }
}
