//! crowdfund is a CLI tool to deploy a Crowdfunding contract and create its campaign.

mod cli;

use anyhow::Result;
use clap::Parser;
use crowdfund_deploy::DeploymentOutcome;

use cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize the logger.
    tracing_subscriber::fmt()
        .with_max_level(cli.verbosity)
        .init();

    let deployer = cli.deployer()?;

    tracing::info!(
        rpc_url = %deployer.rpc_url,
        parameters = %deployer.parameters.display(),
        artifact = %deployer.artifact.display(),
        outdata = %deployer.outdata.display(),
        reset = cli.reset,
        "Loaded deployment configuration"
    );

    // Save the configuration to Crowdfund.toml before deploying, so the run can be replayed.
    if cli.config.is_none() {
        deployer.save_config()?;
    }

    let outcome = deployer.deploy(cli.reset).await?;

    if let DeploymentOutcome::AlreadyDeployed(record) = &outcome {
        tracing::info!(
            deployed_at = record.deployed_at,
            "Reusing recorded deployment (pass --reset to deploy again)"
        );
    }

    println!("{}", outcome.address());

    Ok(())
}
