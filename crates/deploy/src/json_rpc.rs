//! [`ContractRuntime`] backed by an Ethereum node over JSON-RPC.
//!
//! Transactions are sent with `eth_sendTransaction`, so the node must hold the
//! sender's key (anvil, hardhat node, geth --dev).

use std::{collections::HashMap, time::Duration};

use alloy_core::primitives::{Address, Bytes, U256};
use anyhow::Context;
use url::Url;

use crate::{
    CallArg, ContractArtifact, ContractHandle, ContractRuntime, DeployOptions,
    rpc::{RpcClient, TransactionReceipt, TransactionRequest},
};

/// Default time to wait for a transaction to be mined.
pub const DEFAULT_RECEIPT_TIMEOUT: Duration = Duration::from_secs(120);

/// Runtime deploying artifacts through a JSON-RPC endpoint.
#[derive(Debug, Clone)]
pub struct JsonRpcRuntime {
    rpc: RpcClient,
    chain_id: u64,
    from: Address,
    artifacts: HashMap<String, ContractArtifact>,
    receipt_timeout: Duration,
}

impl JsonRpcRuntime {
    /// Connect to `url` and pick the sender.
    ///
    /// Without an explicit `from`, the node's first unlocked account is used.
    pub async fn connect(url: Url, from: Option<Address>) -> anyhow::Result<Self> {
        Self::with_client(RpcClient::new(url)?, from).await
    }

    /// Same as [`Self::connect`] with a preconfigured client.
    pub async fn with_client(rpc: RpcClient, from: Option<Address>) -> anyhow::Result<Self> {
        let chain_id = rpc
            .chain_id()
            .await
            .with_context(|| format!("Failed to reach node at {}", rpc.url()))?;

        let accounts = rpc.accounts().await.context("Failed to list node accounts")?;
        let from = match from {
            Some(from) => {
                if !accounts.contains(&from) {
                    tracing::warn!(
                        %from,
                        "Sender is not an unlocked account of the node, transactions may be rejected"
                    );
                }
                from
            }
            None => *accounts
                .first()
                .context("Node exposes no unlocked account; pass an explicit sender")?,
        };

        tracing::info!(url = %rpc.url(), chain_id, %from, "Connected to node");

        Ok(Self {
            rpc,
            chain_id,
            from,
            artifacts: HashMap::new(),
            receipt_timeout: DEFAULT_RECEIPT_TIMEOUT,
        })
    }

    /// Register an artifact, keyed by its contract name.
    pub fn with_artifact(mut self, artifact: ContractArtifact) -> Self {
        self.artifacts
            .insert(artifact.contract_name.clone(), artifact);
        self
    }

    pub fn with_receipt_timeout(mut self, timeout: Duration) -> Self {
        self.receipt_timeout = timeout;
        self
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub fn sender(&self) -> Address {
        self.from
    }

    fn artifact(&self, contract: &str) -> anyhow::Result<&ContractArtifact> {
        self.artifacts
            .get(contract)
            .with_context(|| format!("No artifact registered for contract {contract}"))
    }

    /// Submit a transaction and wait until it is mined successfully.
    async fn send_and_confirm(
        &self,
        to: Option<Address>,
        value: U256,
        input: Bytes,
    ) -> anyhow::Result<TransactionReceipt> {
        let tx = TransactionRequest {
            from: self.from,
            to,
            value,
            input,
        };

        let hash = self.rpc.send_transaction(&tx).await?;
        tracing::debug!(%hash, ?to, "Transaction submitted");

        let receipt = self.rpc.wait_for_receipt(hash, self.receipt_timeout).await?;
        if !receipt.succeeded() {
            anyhow::bail!("Transaction {hash} reverted");
        }

        tracing::debug!(
            %hash,
            block = ?receipt.block_number,
            gas_used = ?receipt.gas_used,
            "Transaction mined"
        );
        Ok(receipt)
    }
}

impl ContractRuntime for JsonRpcRuntime {
    async fn deploy_contract(
        &mut self,
        future_id: &str,
        contract: &str,
        constructor_args: Vec<CallArg>,
        options: DeployOptions,
    ) -> anyhow::Result<ContractHandle> {
        let code = self.artifact(contract)?.deploy_code(&constructor_args)?;
        let receipt = self.send_and_confirm(None, options.value, code).await?;

        let address = receipt.contract_address.with_context(|| {
            format!(
                "Receipt of {} carries no contract address",
                receipt.transaction_hash
            )
        })?;

        Ok(ContractHandle {
            future_id: future_id.to_string(),
            contract_name: contract.to_string(),
            address,
            deploy_tx: Some(receipt.transaction_hash),
        })
    }

    async fn call(
        &mut self,
        handle: &ContractHandle,
        method: &str,
        args: Vec<CallArg>,
    ) -> anyhow::Result<()> {
        let calldata = self
            .artifact(&handle.contract_name)?
            .encode_call(method, &args)?;
        self.send_and_confirm(Some(handle.address), U256::ZERO, calldata)
            .await?;
        Ok(())
    }
}
