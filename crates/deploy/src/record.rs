//! Deployment records stored alongside a run's output data.
//!
//! Initialized deployments write two files to the output directory:
//! - `deployed_addresses.json`: future id -> contract address, Ignition style.
//! - `deployment.json`: the [`DeploymentRecord`] used to detect re-runs.
//!
//! Contracts left uninitialized by a failed run are appended to
//! `uninitialized.json` instead, so they never replace a completed deployment.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use alloy_core::primitives::{Address, B256};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{ContractHandle, DeploymentParameters};

/// File name of the address map.
pub const DEPLOYED_ADDRESSES_FILENAME: &str = "deployed_addresses.json";
/// File name of the deployment record.
pub const DEPLOYMENT_RECORD_FILENAME: &str = "deployment.json";
/// File name of the list of contracts awaiting manual initialization.
pub const UNINITIALIZED_FILENAME: &str = "uninitialized.json";

/// Compute a SHA-256 hash of the resolved parameters.
///
/// The same parameters always produce the same hash, so a re-run with unchanged
/// parameters can be detected.
pub fn parameters_hash(params: &DeploymentParameters) -> String {
    let json = serde_json::to_string(params)
        .expect("DeploymentParameters serialization should never fail");

    let mut hasher = Sha256::new();
    hasher.update(json.as_bytes());
    hex::encode(hasher.finalize())
}

/// Whether the recorded contract got its campaign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum RecordStatus {
    Initialized,
    /// Deployed, but `createCampaign` failed. Needs manual follow-up.
    Uninitialized,
}

/// Outcome of a module run, persisted as `deployment.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentRecord {
    pub module_id: String,
    pub chain_id: u64,
    pub parameters_hash: String,
    pub future_id: String,
    pub address: Address,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deploy_tx: Option<B256>,
    pub status: RecordStatus,
    /// Unix timestamp of the run.
    pub deployed_at: i64,
    /// Version of the tool that wrote the record.
    pub tool_version: String,
}

impl DeploymentRecord {
    pub fn new(
        module_id: &str,
        chain_id: u64,
        params: &DeploymentParameters,
        future_id: &str,
        address: Address,
        deploy_tx: Option<B256>,
        status: RecordStatus,
    ) -> Self {
        Self {
            module_id: module_id.to_string(),
            chain_id,
            parameters_hash: parameters_hash(params),
            future_id: future_id.to_string(),
            address,
            deploy_tx,
            status,
            deployed_at: chrono::Utc::now().timestamp(),
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// Record for a fully initialized contract.
    pub fn initialized(
        module_id: &str,
        chain_id: u64,
        params: &DeploymentParameters,
        handle: &ContractHandle,
    ) -> Self {
        Self::new(
            module_id,
            chain_id,
            params,
            &handle.future_id,
            handle.address,
            handle.deploy_tx,
            RecordStatus::Initialized,
        )
    }

    /// Whether this record already covers a run on `chain_id` with `params`.
    pub fn covers(&self, chain_id: u64, params: &DeploymentParameters) -> bool {
        self.status == RecordStatus::Initialized
            && self.chain_id == chain_id
            && self.parameters_hash == parameters_hash(params)
    }

    /// Persist the record into `dir`.
    ///
    /// Initialized records replace `deployment.json` and update the address map.
    /// Uninitialized records are appended to `uninitialized.json` and leave both
    /// untouched.
    pub fn save(&self, dir: &Path) -> Result<()> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create output directory {}", dir.display()))?;

        let path = match self.status {
            RecordStatus::Initialized => self.save_initialized(dir)?,
            RecordStatus::Uninitialized => self.append_uninitialized(dir)?,
        };

        tracing::info!(
            path = %path.display(),
            status = %self.status,
            address = %self.address,
            "Deployment record saved"
        );
        Ok(())
    }

    fn save_initialized(&self, dir: &Path) -> Result<PathBuf> {
        let record_path = dir.join(DEPLOYMENT_RECORD_FILENAME);
        let json =
            serde_json::to_string_pretty(self).context("Failed to serialize deployment record")?;
        std::fs::write(&record_path, json).with_context(|| {
            format!("Failed to write deployment record to {}", record_path.display())
        })?;

        let addresses_path = dir.join(DEPLOYED_ADDRESSES_FILENAME);
        let mut addresses = load_deployed_addresses(dir)?;
        addresses.insert(self.future_id.clone(), self.address);
        let json = serde_json::to_string_pretty(&addresses)
            .context("Failed to serialize deployed addresses")?;
        std::fs::write(&addresses_path, json).with_context(|| {
            format!("Failed to write deployed addresses to {}", addresses_path.display())
        })?;

        Ok(record_path)
    }

    fn append_uninitialized(&self, dir: &Path) -> Result<PathBuf> {
        let path = dir.join(UNINITIALIZED_FILENAME);
        let mut pending = load_uninitialized(dir)?;
        pending.push(self.clone());
        let json = serde_json::to_string_pretty(&pending)
            .context("Failed to serialize uninitialized deployments")?;
        std::fs::write(&path, json)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(path)
    }

    /// Load the record from `dir`, if one exists.
    pub fn load(dir: &Path) -> Result<Option<Self>> {
        let path = dir.join(DEPLOYMENT_RECORD_FILENAME);
        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read deployment record from {}", path.display()))?;
        let record =
            serde_json::from_str(&content).context("Failed to parse deployment record JSON")?;
        Ok(Some(record))
    }
}

/// Read `deployed_addresses.json` from `dir`; empty if absent.
pub fn load_deployed_addresses(dir: &Path) -> Result<BTreeMap<String, Address>> {
    let path = dir.join(DEPLOYED_ADDRESSES_FILENAME);
    if !path.exists() {
        return Ok(BTreeMap::new());
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
}

/// Read the contracts left uninitialized by earlier runs; empty if none.
pub fn load_uninitialized(dir: &Path) -> Result<Vec<DeploymentRecord>> {
    let path = dir.join(UNINITIALIZED_FILENAME);
    if !path.exists() {
        return Ok(Vec::new());
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
}
