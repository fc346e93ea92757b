//! Deploy command - Provision resources and deploy the app.

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;

use docean_deploy::{Deployer, DeploymentReport};

use super::{ensure_installed, ConfigArgs, DoctlArgs};

#[derive(Args)]
pub struct DeployArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    #[command(flatten)]
    pub doctl: DoctlArgs,
}

pub async fn execute(args: DeployArgs) -> Result<()> {
    let config = args.config.resolve()?;
    let platform = args.doctl.platform();

    info!("Using {}", platform.program());
    ensure_installed(&platform).await?;
    println!(
        "🚀 Deploying {} to DigitalOcean ({})...",
        config.app.name, config.region
    );

    let report = Deployer::new(&platform, &config)
        .deploy()
        .await
        .context("Deployment failed")?;

    print_report(&report);
    Ok(())
}

fn print_report(report: &DeploymentReport) {
    println!();
    println!("🎉 ERPNext deployment completed!");
    println!();
    println!("   App:      {} ({}, {})", report.app_name, report.app_id, report.action);
    match &report.url {
        Some(url) => println!("   URL:      {}", url),
        None => println!("   URL:      not available yet, run `docean status` in a few minutes"),
    }
    println!("   Login:    {}", report.admin_user);
    println!("   Spec:     {}", report.spec_path.display());
    println!(
        "   Started:  {}",
        report.started_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    println!("   Elapsed:  {}s", report.elapsed.as_secs());
    println!("   Run ID:   {}", report.run_id);

    if let Some(guide) = &report.guide_url {
        println!();
        println!("Next steps:");
        println!("  Complete the ERPNext setup wizard, see {}", guide);
    }
}
