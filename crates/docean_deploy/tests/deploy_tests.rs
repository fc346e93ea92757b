//! Orchestrator tests against the in-memory platform.
//!
//! Poll timing runs on tokio's paused clock, so the 30s intervals and the
//! 600s/1200s timeouts elapse instantly while still being measured.

use std::time::Duration;

use tempfile::{tempdir, TempDir};
use tokio::time::Instant;

use docean_deploy::{
    AppAction, AppSpec, ConnectionInfo, DeployConfig, DeployError, Deployer, DeploymentPhase,
    MockPlatform, PlatformCall, ENV_KEYS,
};

fn config(dir: &TempDir) -> DeployConfig {
    DeployConfig::default()
        .with_admin_password("s3cret")
        .with_spec_file(dir.path().join("app_spec.json"))
}

fn db_connection() -> ConnectionInfo {
    ConnectionInfo::new("db.example.com", 5432, "erp", "u", "p")
}

fn cache_connection() -> ConnectionInfo {
    ConnectionInfo::new("cache.example.com", 25061, "", "default", "rp")
}

/// Both clusters already exist; no app yet.
fn provisioned() -> MockPlatform {
    MockPlatform::new()
        .with_database("db-1", "erpnext-postgres", db_connection())
        .with_database("cache-1", "erpnext-redis", cache_connection())
}

#[tokio::test]
async fn test_existing_database_is_reused() {
    let dir = tempdir().unwrap();
    let config = config(&dir);
    let platform = provisioned();

    let connection = Deployer::new(&platform, &config)
        .ensure_database()
        .await
        .unwrap();

    assert_eq!(connection, db_connection());
    assert_eq!(platform.create_database_calls(), 0);
    assert_eq!(platform.status_queries(), 0);
    assert_eq!(
        platform.calls(),
        vec![
            PlatformCall::ListDatabases,
            PlatformCall::DatabaseConnection {
                id: "db-1".to_string()
            },
        ]
    );
}

#[tokio::test]
async fn test_similar_name_does_not_count_as_existing() {
    let dir = tempdir().unwrap();
    let config = config(&dir);
    let platform = MockPlatform::new()
        .with_database("old-1", "erpnext-postgres-old", db_connection())
        .with_connection("erpnext-postgres", db_connection());

    Deployer::new(&platform, &config)
        .ensure_database()
        .await
        .unwrap();

    assert_eq!(platform.create_database_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_missing_cache_is_created_once_and_polled_until_online() {
    let dir = tempdir().unwrap();
    let config = config(&dir);
    let platform = MockPlatform::new()
        .with_connection("erpnext-redis", cache_connection())
        .with_statuses("erpnext-redis", &["creating", "creating", "online", "creating"]);

    let start = Instant::now();
    let connection = Deployer::new(&platform, &config)
        .ensure_cache()
        .await
        .unwrap();

    assert_eq!(connection, cache_connection());
    assert_eq!(platform.create_database_calls(), 1);
    assert_eq!(platform.status_queries(), 3);
    assert_eq!(start.elapsed(), Duration::from_secs(60));
    assert!(platform.calls().contains(&PlatformCall::CreateDatabase {
        name: "erpnext-redis".to_string(),
        region: "nyc3".to_string(),
    }));
}

#[tokio::test(start_paused = true)]
async fn test_readiness_timeout_after_one_query_per_interval() {
    let dir = tempdir().unwrap();
    let config = config(&dir);
    let platform = MockPlatform::new()
        .with_connection("erpnext-postgres", db_connection())
        .with_status_fallback("creating");

    let start = Instant::now();
    let err = Deployer::new(&platform, &config)
        .ensure_database()
        .await
        .unwrap_err();

    match err {
        DeployError::ReadinessTimeout {
            name,
            waited_secs,
            last_status,
        } => {
            assert_eq!(name, "erpnext-postgres");
            assert_eq!(waited_secs, 600);
            assert_eq!(last_status, "creating");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(
        platform.count(|c| matches!(c, PlatformCall::DatabaseConnection { .. })),
        0
    );
    assert_eq!(platform.create_database_calls(), 1);
    assert_eq!(platform.status_queries(), 20);
    assert_eq!(start.elapsed(), Duration::from_secs(600));
}

#[tokio::test(start_paused = true)]
async fn test_status_query_errors_are_retried() {
    let dir = tempdir().unwrap();
    let config = config(&dir);
    let platform = MockPlatform::new()
        .with_connection("erpnext-postgres", db_connection())
        .with_status_error("erpnext-postgres", "Error: 503 Service Unavailable")
        .with_statuses("erpnext-postgres", &["online"]);

    Deployer::new(&platform, &config)
        .ensure_database()
        .await
        .unwrap();

    assert_eq!(platform.status_queries(), 2);
}

#[tokio::test]
async fn test_create_failure_is_reported_as_resource_creation() {
    let dir = tempdir().unwrap();
    let config = config(&dir);
    let platform = MockPlatform::new().fail_creates("Error: 422 size is not available");

    let err = Deployer::new(&platform, &config)
        .ensure_database()
        .await
        .unwrap_err();

    assert!(matches!(
        &err,
        DeployError::ResourceCreation { name, .. } if name == "erpnext-postgres"
    ));
    assert!(err.to_string().contains("size is not available"));
    assert_eq!(platform.status_queries(), 0);
}

#[tokio::test]
async fn test_descriptor_env_uses_connection_values_verbatim() {
    let dir = tempdir().unwrap();
    let config = config(&dir);
    let platform = provisioned();

    let path = Deployer::new(&platform, &config)
        .write_app_spec(&db_connection(), &cache_connection())
        .unwrap();
    let spec = AppSpec::read_from(&path).unwrap();

    let keys: Vec<&str> = spec.services[0].envs.iter().map(|e| e.key.as_str()).collect();
    assert_eq!(keys, ENV_KEYS.to_vec());
    assert_eq!(spec.env("DB_HOST"), Some("db.example.com"));
    assert_eq!(spec.env("DB_PORT"), Some("5432"));
    assert_eq!(spec.env("DB_NAME"), Some("erp"));
    assert_eq!(spec.env("DB_USER"), Some("u"));
    assert_eq!(spec.env("DB_PASSWORD"), Some("p"));
    assert_eq!(spec.env("REDIS_CACHE"), Some("cache.example.com:25061"));
    assert_eq!(spec.env("REDIS_PASSWORD"), Some("rp"));
    assert_eq!(spec.env("ADMIN_PASSWORD"), Some("s3cret"));
}

#[tokio::test]
async fn test_existing_app_is_updated_with_written_descriptor() {
    let dir = tempdir().unwrap();
    let config = config(&dir);
    let platform = provisioned().with_app("app-9", "erpnext-production");
    let deployer = Deployer::new(&platform, &config);

    let path = deployer
        .write_app_spec(&db_connection(), &cache_connection())
        .unwrap();
    let app = deployer.create_or_update_app(&path).await.unwrap();

    assert_eq!(app.id, "app-9");
    assert_eq!(app.action, AppAction::Updated);
    assert!(platform.calls().contains(&PlatformCall::UpdateApp {
        id: "app-9".to_string(),
        spec_path: config.spec_file.clone(),
    }));
    assert_eq!(
        platform.count(|c| matches!(c, PlatformCall::CreateApp { .. })),
        0
    );
}

#[tokio::test]
async fn test_missing_app_is_created_with_written_descriptor() {
    let dir = tempdir().unwrap();
    let config = config(&dir);
    let platform = provisioned().with_app("app-1", "some-other-app");
    let deployer = Deployer::new(&platform, &config);

    let path = deployer
        .write_app_spec(&db_connection(), &cache_connection())
        .unwrap();
    let app = deployer.create_or_update_app(&path).await.unwrap();

    assert_eq!(app.id, "erpnext-production-id");
    assert_eq!(app.action, AppAction::Created);
    assert!(platform.calls().contains(&PlatformCall::CreateApp {
        spec_path: config.spec_file.clone(),
    }));
    assert_eq!(
        platform.count(|c| matches!(c, PlatformCall::UpdateApp { .. })),
        0
    );
}

#[tokio::test(start_paused = true)]
async fn test_deployment_active_after_three_queries() {
    let dir = tempdir().unwrap();
    let config = config(&dir);
    let platform = MockPlatform::new().with_phases(&["PENDING", "PENDING", "ACTIVE"]);

    let start = Instant::now();
    Deployer::new(&platform, &config)
        .wait_for_deployment("app-1")
        .await
        .unwrap();

    assert_eq!(platform.phase_queries(), 3);
    assert_eq!(start.elapsed(), Duration::from_secs(60));
}

#[tokio::test(start_paused = true)]
async fn test_deployment_error_fails_without_waiting_for_timeout() {
    let dir = tempdir().unwrap();
    let config = config(&dir);
    let platform = MockPlatform::new().with_phases(&["PENDING", "ERROR"]);

    let start = Instant::now();
    let err = Deployer::new(&platform, &config)
        .wait_for_deployment("app-1")
        .await
        .unwrap_err();

    assert!(matches!(
        &err,
        DeployError::DeploymentFailed { app_id, phase } if app_id == "app-1" && phase == "ERROR"
    ));
    assert_eq!(platform.phase_queries(), 2);
    assert_eq!(start.elapsed(), Duration::from_secs(30));
}

#[tokio::test(start_paused = true)]
async fn test_superseded_deployment_stops_polling() {
    let dir = tempdir().unwrap();
    let config = config(&dir);
    let platform = MockPlatform::new()
        .with_phases(&["BUILDING", "SUPERSEDED"])
        .with_phase_fallback("SUPERSEDED");

    let start = Instant::now();
    let err = Deployer::new(&platform, &config)
        .wait_for_deployment("app-1")
        .await
        .unwrap_err();

    assert!(matches!(
        &err,
        DeployError::DeploymentFailed { phase, .. } if phase == "SUPERSEDED"
    ));
    assert_eq!(platform.phase_queries(), 2);
    assert_eq!(start.elapsed(), Duration::from_secs(30));
}

#[tokio::test(start_paused = true)]
async fn test_deployment_timeout() {
    let dir = tempdir().unwrap();
    let config = config(&dir);
    let platform = MockPlatform::new()
        .with_phase_error("Error: context deadline exceeded")
        .with_phase_fallback("BUILDING");

    let err = Deployer::new(&platform, &config)
        .wait_for_deployment("app-1")
        .await
        .unwrap_err();

    assert!(matches!(
        &err,
        DeployError::DeploymentTimeout { waited_secs: 1200, last_phase, .. } if last_phase == "BUILDING"
    ));
    assert_eq!(platform.phase_queries(), 40);
}

#[tokio::test(start_paused = true)]
async fn test_full_deploy_from_scratch() {
    let dir = tempdir().unwrap();
    let config = config(&dir);
    let platform = MockPlatform::new()
        .with_connection("erpnext-postgres", db_connection())
        .with_connection("erpnext-redis", cache_connection())
        .with_statuses("erpnext-postgres", &["creating", "online"])
        .with_phases(&["PENDING_BUILD", "BUILDING", "DEPLOYING", "ACTIVE"])
        .with_url(
            "erpnext-production-id",
            "https://erpnext-production-x7k2p.ondigitalocean.app",
        );

    let report = Deployer::new(&platform, &config).deploy().await.unwrap();

    assert_eq!(report.app_id, "erpnext-production-id");
    assert_eq!(report.action, AppAction::Created);
    assert_eq!(
        report.url.as_deref(),
        Some("https://erpnext-production-x7k2p.ondigitalocean.app")
    );
    assert_eq!(report.spec_path, config.spec_file);
    assert_eq!(report.admin_user, "Administrator");
    assert_eq!(report.elapsed, Duration::from_secs(120));
    assert_eq!(platform.create_database_calls(), 2);
    assert!(config.spec_file.exists());

    let calls = platform.calls();
    assert_eq!(calls.first(), Some(&PlatformCall::AccountInfo));
    assert_eq!(
        calls.last(),
        Some(&PlatformCall::AppUrl {
            id: "erpnext-production-id".to_string()
        })
    );
}

#[tokio::test]
async fn test_missing_url_does_not_fail_deploy() {
    let dir = tempdir().unwrap();
    let config = config(&dir);
    let platform = provisioned().with_app("app-9", "erpnext-production");

    let report = Deployer::new(&platform, &config).deploy().await.unwrap();

    assert_eq!(report.action, AppAction::Updated);
    assert!(report.url.is_none());
}

#[tokio::test]
async fn test_unauthenticated_stops_before_provisioning() {
    let dir = tempdir().unwrap();
    let config = config(&dir);
    let platform = provisioned().unauthenticated();

    let err = Deployer::new(&platform, &config).deploy().await.unwrap_err();

    assert!(err.is_auth_failure());
    assert!(err.to_string().contains("doctl auth init"));
    assert_eq!(platform.calls(), vec![PlatformCall::AccountInfo]);
    assert!(!config.spec_file.exists());
}

#[tokio::test]
async fn test_invalid_config_stops_before_any_call() {
    let dir = tempdir().unwrap();
    let config = DeployConfig::default().with_spec_file(dir.path().join("app_spec.json"));
    let platform = provisioned();

    let err = Deployer::new(&platform, &config).deploy().await.unwrap_err();

    assert!(matches!(err, DeployError::Config(_)));
    assert!(platform.calls().is_empty());
}

#[tokio::test]
async fn test_status_of_existing_and_missing_app() {
    let dir = tempdir().unwrap();
    let config = config(&dir);

    let platform = MockPlatform::new()
        .with_app("app-9", "erpnext-production")
        .with_url("app-9", "https://erp.example.com")
        .with_phases(&["DEPLOYING"]);
    let status = Deployer::new(&platform, &config)
        .status()
        .await
        .unwrap()
        .unwrap();
    assert_eq!(status.id, "app-9");
    assert_eq!(status.phase, DeploymentPhase::Deploying);
    assert_eq!(status.url.as_deref(), Some("https://erp.example.com"));

    let empty = MockPlatform::new();
    assert!(Deployer::new(&empty, &config).status().await.unwrap().is_none());
}
