//! Execution-environment seam used by the module.

use std::{fmt, future::Future};

use alloy_core::primitives::{Address, B256, U256};
use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Positional argument of a contract call.
///
/// Values are passed through as provided; encoding against the contract ABI is the
/// runtime's job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallArg {
    Str(String),
    Uint(U256),
}

impl fmt::Display for CallArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(s) => write!(f, "{s:?}"),
            Self::Uint(v) => write!(f, "{v}"),
        }
    }
}

/// Options attached to a contract deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeployOptions {
    /// Value transferred to the contract at construction time.
    pub value: U256,
}

/// Reference to a deployed contract instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractHandle {
    /// Ignition-style future id: `<ModuleId>#<ContractName>`.
    pub future_id: String,
    pub contract_name: String,
    pub address: Address,
    /// Hash of the deployment transaction, when the runtime exposes one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deploy_tx: Option<B256>,
}

impl fmt::Display for ContractHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.future_id, self.address)
    }
}

/// The execution environment a module deploys into.
///
/// Each method resolves only once the submitted operation is committed, which is
/// what orders the initialization call after the deployment.
pub trait ContractRuntime {
    /// Deploy `contract` with the given constructor arguments.
    ///
    /// `future_id` identifies the deployment within its module and is echoed back in
    /// the returned handle.
    fn deploy_contract(
        &mut self,
        future_id: &str,
        contract: &str,
        constructor_args: Vec<CallArg>,
        options: DeployOptions,
    ) -> impl Future<Output = Result<ContractHandle>> + Send;

    /// Call a state-changing `method` on a deployed contract.
    fn call(
        &mut self,
        handle: &ContractHandle,
        method: &str,
        args: Vec<CallArg>,
    ) -> impl Future<Output = Result<()>> + Send;
}
