//! Error taxonomy for a module run.

use alloy_core::primitives::{Address, B256};

use crate::DeploymentState;

/// Message reported when any of the five campaign parameters is missing or falsy.
pub const MISSING_PARAMETERS_MESSAGE: &str =
    "All parameters (title, description, benefactor, goal, duration) must be provided.";

/// Errors surfaced by [`crate::CrowdfundingModule`].
///
/// Nothing is recovered or retried locally; every variant aborts the run.
#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    /// A required parameter is missing, falsy or malformed. No external call was made.
    #[error("{message}")]
    Configuration { message: String },

    /// The execution environment could not deploy the contract.
    #[error("Failed to deploy contract {contract}")]
    Deployment {
        contract: String,
        #[source]
        source: anyhow::Error,
    },

    /// The post-deployment call was rejected. The contract stays deployed but uninitialized.
    #[error("Failed to call {method} on {contract} at {address}; the contract is deployed but uninitialized")]
    Initialization {
        contract: String,
        method: String,
        address: Address,
        /// Hash of the deployment transaction, when the runtime exposed one.
        deploy_tx: Option<B256>,
        #[source]
        source: anyhow::Error,
    },
}

impl DeployError {
    pub(crate) fn missing_parameters() -> Self {
        Self::Configuration {
            message: MISSING_PARAMETERS_MESSAGE.to_string(),
        }
    }

    pub(crate) fn invalid_parameter(name: &str, reason: impl std::fmt::Display) -> Self {
        Self::Configuration {
            message: format!("Invalid parameter `{name}`: {reason}"),
        }
    }

    /// The state the run was in when it aborted.
    pub fn aborted_from(&self) -> DeploymentState {
        match self {
            Self::Configuration { .. } => DeploymentState::Start,
            Self::Deployment { .. } => DeploymentState::ParametersResolved,
            Self::Initialization { .. } => DeploymentState::Deployed,
        }
    }

    /// Address of a contract left deployed by a failed run, if any.
    pub fn uninitialized_address(&self) -> Option<Address> {
        match self {
            Self::Initialization { address, .. } => Some(*address),
            _ => None,
        }
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration { .. })
    }
}

pub type DeployResult<T> = std::result::Result<T, DeployError>;
