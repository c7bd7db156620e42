//! crowdfund-deploy - Deployment module for the `Crowdfunding` contract.
//!
//! This crate deploys a single `Crowdfunding` contract and creates its campaign
//! with five named parameters (title, description, benefactor, goal, duration).
//! The orchestration is written against the [`ContractRuntime`] and
//! [`ParameterSource`] traits; [`JsonRpcRuntime`] and [`ModuleParameters`] are the
//! implementations used to run against a real node.

mod artifact;
pub use artifact::ContractArtifact;

pub mod crowdfunding;
pub use crowdfunding::{
    CONTRACT_NAME, CrowdfundingModule, INIT_METHOD, MODULE_ID, ModuleResult, deploy_contract,
    initialize_campaign,
};

mod deployer;
pub use deployer::{CONFIG_FILENAME, DEFAULT_RPC_URL, Deployer, DeploymentOutcome};

mod error;
pub use error::{DeployError, DeployResult, MISSING_PARAMETERS_MESSAGE};

mod json_rpc;
pub use json_rpc::{DEFAULT_RECEIPT_TIMEOUT, JsonRpcRuntime};

pub mod params;
pub use params::{
    DeploymentParameters, ModuleParameters, ParameterSource, resolve_and_validate_parameters,
};

pub mod record;
pub use record::{DeploymentRecord, RecordStatus};

pub mod rpc;

mod runtime;
pub use runtime::{CallArg, ContractHandle, ContractRuntime, DeployOptions};

pub mod stages;
pub use stages::DeploymentState;

#[cfg(test)]
mod testing;
