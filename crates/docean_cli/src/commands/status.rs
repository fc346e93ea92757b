//! Status command - Show the deployed app's phase and URL.

use anyhow::{Context, Result};
use clap::Args;

use docean_deploy::Deployer;

use super::{ensure_installed, ConfigArgs, DoctlArgs};

#[derive(Args)]
pub struct StatusArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    #[command(flatten)]
    pub doctl: DoctlArgs,
}

pub async fn execute(args: StatusArgs) -> Result<()> {
    let config = args.config.resolve()?;
    let platform = args.doctl.platform();
    ensure_installed(&platform).await?;

    let status = Deployer::new(&platform, &config)
        .status()
        .await
        .context("Failed to query app status")?;

    let Some(status) = status else {
        anyhow::bail!("App not found: {}", config.app.name);
    };

    let icon = if status.phase.is_active() {
        "✅"
    } else if status.phase.is_failure() {
        "❌"
    } else {
        "⏳"
    };

    println!("{} {} ({})", icon, config.app.name, status.id);
    println!("   Phase:  {}", status.phase);
    println!(
        "   URL:    {}",
        status.url.as_deref().unwrap_or("not assigned yet")
    );

    Ok(())
}
