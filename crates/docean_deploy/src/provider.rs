//! Cloud platform adapter trait.

use std::path::Path;

use async_trait::async_trait;

use crate::config::ManagedDatabaseSpec;
use crate::error::DeployResult;
use crate::models::{ConnectionInfo, DatabaseStatus, DeploymentPhase, ResourceSummary};

/// Typed operations the deployer needs from the cloud provider.
///
/// [`Doctl`](crate::doctl::Doctl) implements this over the `doctl` CLI;
/// [`MockPlatform`](crate::mock::MockPlatform) implements it in memory.
#[async_trait]
pub trait CloudPlatform: Send + Sync {
    /// Account the CLI is authenticated as. Fails with
    /// [`DeployError::NotAuthenticated`](crate::DeployError::NotAuthenticated)
    /// when credentials are missing or rejected.
    async fn account_info(&self) -> DeployResult<String>;

    /// All managed database clusters (databases and caches alike).
    async fn list_databases(&self) -> DeployResult<Vec<ResourceSummary>>;

    /// Create a managed database cluster and return its id.
    async fn create_database(&self, spec: &ManagedDatabaseSpec, region: &str)
        -> DeployResult<String>;

    async fn database_status(&self, id: &str) -> DeployResult<DatabaseStatus>;

    async fn database_connection(&self, id: &str) -> DeployResult<ConnectionInfo>;

    async fn list_apps(&self) -> DeployResult<Vec<ResourceSummary>>;

    /// Create an app from a descriptor file and return its id.
    async fn create_app(&self, spec_path: &Path) -> DeployResult<String>;

    async fn update_app(&self, id: &str, spec_path: &Path) -> DeployResult<()>;

    async fn app_phase(&self, id: &str) -> DeployResult<DeploymentPhase>;

    /// Public URL of the app, once one has been assigned.
    async fn app_url(&self, id: &str) -> DeployResult<Option<String>>;
}
