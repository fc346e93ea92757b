//! Render-spec command - Write the app spec without calling the provider.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use tracing::debug;

use docean_deploy::{AppSpec, ConnectionInfo};

use super::ConfigArgs;

#[derive(Args)]
pub struct RenderSpecArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Database connection JSON, as printed by `doctl databases connection --output json`
    #[arg(long)]
    pub database_json: PathBuf,

    /// Cache connection JSON, as printed by `doctl databases connection --output json`
    #[arg(long)]
    pub cache_json: PathBuf,
}

pub async fn execute(args: RenderSpecArgs) -> Result<()> {
    let config = args.config.resolve()?;

    let database = read_connection(&args.database_json)?;
    let cache = read_connection(&args.cache_json)?;

    let spec = AppSpec::build(&config, &database, &cache)?;
    spec.write_to(&config.spec_file)
        .with_context(|| format!("Failed to write {}", config.spec_file.display()))?;

    println!("✅ App spec written to {}", config.spec_file.display());
    Ok(())
}

fn read_connection(path: &Path) -> Result<ConnectionInfo> {
    debug!("Reading connection details from {}", path.display());
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Invalid connection JSON in {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_render_spec_writes_descriptor() {
        let dir = tempdir().unwrap();
        let db = dir.path().join("db.json");
        let cache = dir.path().join("cache.json");
        let out = dir.path().join("out").join("app_spec.json");
        fs::write(
            &db,
            r#"{"host":"db.example.com","port":5432,"database":"erp","user":"u","password":"p"}"#,
        )
        .unwrap();
        fs::write(&cache, r#"{"host":"cache.example.com","port":"25061","password":"rp"}"#)
            .unwrap();

        let args = RenderSpecArgs {
            config: ConfigArgs {
                spec_file: Some(out.clone()),
                admin_password: Some("pw".to_string()),
                ..Default::default()
            },
            database_json: db,
            cache_json: cache,
        };
        execute(args).await.unwrap();

        let spec = AppSpec::read_from(&out).unwrap();
        assert_eq!(spec.env("DB_HOST"), Some("db.example.com"));
        assert_eq!(spec.env("DB_PORT"), Some("5432"));
        assert_eq!(spec.env("REDIS_QUEUE"), Some("cache.example.com:25061"));
        assert_eq!(spec.env("ADMIN_PASSWORD"), Some("pw"));
    }

    #[tokio::test]
    async fn test_render_spec_rejects_bad_connection_json() {
        let dir = tempdir().unwrap();
        let db = dir.path().join("db.json");
        fs::write(&db, "{\"port\": 5432}").unwrap();

        let args = RenderSpecArgs {
            config: ConfigArgs {
                spec_file: Some(dir.path().join("app_spec.json")),
                admin_password: Some("pw".to_string()),
                ..Default::default()
            },
            database_json: db.clone(),
            cache_json: db,
        };
        let err = execute(args).await.unwrap_err();

        assert!(format!("{:#}", err).contains("Invalid connection JSON"));
    }
}
