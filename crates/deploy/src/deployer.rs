use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use alloy_core::primitives::Address;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::{
    ContractArtifact, ContractHandle, CrowdfundingModule, DeployError, JsonRpcRuntime,
    ModuleParameters, ModuleResult,
    crowdfunding::{CONTRACT_NAME, MODULE_ID, contract_future_id},
    json_rpc::DEFAULT_RECEIPT_TIMEOUT,
    params::resolve_and_validate_parameters,
    record::{DeploymentRecord, RecordStatus, load_uninitialized},
};

/// The default name for the configuration file.
pub const CONFIG_FILENAME: &str = "Crowdfund.toml";

/// Default local node endpoint (anvil / hardhat node).
pub const DEFAULT_RPC_URL: &str = "http://127.0.0.1:8545";

/// Everything needed to run the `CrowdfundingModule` against a node.
///
/// Serializable to/from TOML so a run can be replayed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deployer {
    /// JSON-RPC endpoint of the node.
    pub rpc_url: Url,
    /// Sender account. Defaults to the node's first unlocked account.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<Address>,
    /// Path to the compiled `Crowdfunding` artifact.
    pub artifact: PathBuf,
    /// Path to the parameters JSON file.
    pub parameters: PathBuf,
    /// Directory receiving the deployment record.
    pub outdata: PathBuf,
    /// Seconds to wait for each transaction to be mined.
    #[serde(default = "default_receipt_timeout_secs")]
    pub receipt_timeout_secs: u64,
}

fn default_receipt_timeout_secs() -> u64 {
    DEFAULT_RECEIPT_TIMEOUT.as_secs()
}

/// What a [`Deployer::deploy`] call ended with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeploymentOutcome {
    /// The module ran and the campaign was created.
    Deployed(ModuleResult),
    /// A matching initialized deployment was already recorded; nothing was sent.
    AlreadyDeployed(DeploymentRecord),
}

impl DeploymentOutcome {
    pub fn address(&self) -> Address {
        match self {
            Self::Deployed(result) => result.crowdfunding.address,
            Self::AlreadyDeployed(record) => record.address,
        }
    }
}

impl Deployer {
    /// Save the configuration to a TOML file.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let content =
            toml::to_string_pretty(self).context("Failed to serialize deployer config to TOML")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config to {}", path.display()))?;
        tracing::info!(path = %path.display(), "Configuration saved");
        Ok(())
    }

    /// Load the configuration from a TOML file, or from `Crowdfund.toml` inside a directory.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            anyhow::bail!(
                "Configuration file or directory not found: {}",
                path.display()
            );
        }

        let config_path = if path.is_dir() {
            path.join(CONFIG_FILENAME)
        } else {
            path.to_path_buf()
        };

        let content = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config from {}", config_path.display()))?;
        let config: Self =
            toml::from_str(&content).context("Failed to parse config file as TOML")?;
        tracing::info!(path = %config_path.display(), "Configuration loaded");
        Ok(config)
    }

    /// Save the configuration to the default location (`Crowdfund.toml` in outdata).
    pub fn save_config(&self) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.outdata).with_context(|| {
            format!(
                "Failed to create output data directory {}",
                self.outdata.display()
            )
        })?;
        let config_path = self.outdata.join(CONFIG_FILENAME);
        self.save_to_file(&config_path)?;
        Ok(config_path)
    }

    /// Run the module against the configured node and record the outcome.
    ///
    /// Unless `reset` is set, a recorded initialized deployment with the same chain
    /// and parameters short-circuits the run.
    pub async fn deploy(&self, reset: bool) -> Result<DeploymentOutcome> {
        tracing::info!(
            module = MODULE_ID,
            rpc_url = %self.rpc_url,
            parameters = %self.parameters.display(),
            artifact = %self.artifact.display(),
            "Starting deployment process..."
        );

        let source = ModuleParameters::load_from_file(&self.parameters, MODULE_ID)?;
        // Validation runs before any network access.
        let params = resolve_and_validate_parameters(&source)?;

        let artifact = ContractArtifact::load_from_file(&self.artifact)?;
        if artifact.contract_name != CONTRACT_NAME {
            tracing::warn!(
                expected = CONTRACT_NAME,
                found = %artifact.contract_name,
                "Artifact contract name differs, deploying it as {CONTRACT_NAME}"
            );
        }
        let artifact = ContractArtifact {
            contract_name: CONTRACT_NAME.to_string(),
            ..artifact
        };

        let mut runtime = JsonRpcRuntime::connect(self.rpc_url.clone(), self.from)
            .await?
            .with_artifact(artifact)
            .with_receipt_timeout(Duration::from_secs(self.receipt_timeout_secs));
        let chain_id = runtime.chain_id();

        match DeploymentRecord::load(&self.outdata)? {
            Some(record) if !reset && record.covers(chain_id, &params) => {
                tracing::info!(
                    address = %record.address,
                    chain_id,
                    "Campaign already deployed with these parameters, skipping deployment"
                );
                return Ok(DeploymentOutcome::AlreadyDeployed(record));
            }
            _ => {}
        }

        for orphan in load_uninitialized(&self.outdata)? {
            tracing::warn!(
                address = %orphan.address,
                chain_id = orphan.chain_id,
                "A previous run left an uninitialized contract"
            );
        }

        match CrowdfundingModule::run(&source, &mut runtime).await {
            Ok(result) => {
                DeploymentRecord::initialized(MODULE_ID, chain_id, &params, &result.crowdfunding)
                    .save(&self.outdata)?;
                log_summary(&result.crowdfunding, chain_id);
                Ok(DeploymentOutcome::Deployed(result))
            }
            Err(err) => {
                if let DeployError::Initialization {
                    address, deploy_tx, ..
                } = &err
                {
                    let record = DeploymentRecord::new(
                        MODULE_ID,
                        chain_id,
                        &params,
                        &contract_future_id(),
                        *address,
                        *deploy_tx,
                        RecordStatus::Uninitialized,
                    );
                    if let Err(save_err) = record.save(&self.outdata) {
                        tracing::error!(
                            error = %format!("{save_err:#}"),
                            %address,
                            "Failed to record uninitialized deployment"
                        );
                    }
                }
                Err(err.into())
            }
        }
    }
}

fn log_summary(handle: &ContractHandle, chain_id: u64) {
    tracing::info!("✓ Deployment complete!");
    tracing::info!("");
    tracing::info!("=== {} ===", MODULE_ID);
    tracing::info!("Chain ID:             {}", chain_id);
    tracing::info!("{}: {}", handle.future_id, handle.address);
    if let Some(tx) = handle.deploy_tx {
        tracing::info!("Deployment tx:        {}", tx);
    }
    tracing::info!("");
}
