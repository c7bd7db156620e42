//! Ethereum JSON-RPC client used by [`crate::JsonRpcRuntime`].

use std::time::Duration;

use alloy_core::primitives::{Address, B256, Bytes, U64, U256};
use anyhow::Context;
use backon::{ConstantBuilder, Retryable};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;
use url::Url;

/// Default timeout for a single RPC request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Default interval between receipt polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Transaction fields sent with `eth_sendTransaction`.
///
/// The node signs with one of its unlocked accounts and fills in gas and nonce.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRequest {
    pub from: Address,
    /// `None` for contract creation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<Address>,
    pub value: U256,
    #[serde(rename = "data")]
    pub input: Bytes,
}

/// Subset of `eth_getTransactionReceipt` the runtime relies on.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionReceipt {
    pub transaction_hash: B256,
    #[serde(default)]
    pub block_number: Option<U64>,
    #[serde(default)]
    pub contract_address: Option<Address>,
    /// `0x1` on success, `0x0` on revert. Absent on pre-Byzantium nodes.
    #[serde(default)]
    pub status: Option<U64>,
    #[serde(default)]
    pub gas_used: Option<U256>,
}

impl TransactionReceipt {
    pub fn succeeded(&self) -> bool {
        self.status.is_none_or(|status| !status.is_zero())
    }
}

/// The receipt of a submitted transaction is not available yet.
#[derive(Debug, thiserror::Error)]
#[error("Receipt for transaction {0} is not available yet")]
struct ReceiptPending(B256);

/// JSON-RPC client bound to a single endpoint.
#[derive(Debug, Clone)]
pub struct RpcClient {
    client: reqwest::Client,
    url: Url,
    poll_interval: Duration,
}

impl RpcClient {
    /// Create a client for `url` with the default request timeout.
    pub fn new(url: Url) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_REQUEST_TIMEOUT)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            url,
            poll_interval: DEFAULT_POLL_INTERVAL,
        })
    }

    /// Override the interval between receipt polls.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Make a JSON-RPC call and deserialize the result.
    ///
    /// Fails if the request cannot be sent, if the node answers with an error object,
    /// or if the result does not match `T`.
    pub async fn request<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Vec<Value>,
    ) -> anyhow::Result<T> {
        tracing::trace!(method, url = %self.url, "JSON-RPC request");

        let response: Value = self
            .client
            .post(self.url.clone())
            .json(&serde_json::json!({
                "jsonrpc": "2.0",
                "method": method,
                "params": params,
                "id": 1
            }))
            .send()
            .await
            .with_context(|| format!("Failed to send {method} request to {}", self.url))?
            .error_for_status()
            .with_context(|| format!("{method} request rejected by {}", self.url))?
            .json()
            .await
            .with_context(|| format!("Failed to parse {method} response"))?;

        if let Some(error) = response.get("error") {
            let message = error
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("unknown");
            match error.get("data").filter(|d| !d.is_null()) {
                Some(data) => anyhow::bail!("RPC error from {method}: {message} (data: {data})"),
                None => anyhow::bail!("RPC error from {method}: {message}"),
            }
        }

        let result = response
            .get("result")
            .with_context(|| format!("No result in {method} response"))?
            .clone();

        serde_json::from_value(result)
            .with_context(|| format!("Failed to deserialize {method} result"))
    }

    pub async fn chain_id(&self) -> anyhow::Result<u64> {
        let id: U64 = self.request("eth_chainId", vec![]).await?;
        Ok(id.to::<u64>())
    }

    /// Accounts the node can sign for.
    pub async fn accounts(&self) -> anyhow::Result<Vec<Address>> {
        self.request("eth_accounts", vec![]).await
    }

    pub async fn send_transaction(&self, tx: &TransactionRequest) -> anyhow::Result<B256> {
        let tx = serde_json::to_value(tx).context("Failed to serialize transaction")?;
        self.request("eth_sendTransaction", vec![tx]).await
    }

    pub async fn transaction_receipt(
        &self,
        hash: B256,
    ) -> anyhow::Result<Option<TransactionReceipt>> {
        self.request("eth_getTransactionReceipt", vec![serde_json::json!(hash)])
            .await
    }

    /// Poll until `hash` is mined, giving up after `timeout`.
    ///
    /// Only a missing receipt is retried; transport and RPC errors are returned as is.
    pub async fn wait_for_receipt(
        &self,
        hash: B256,
        timeout: Duration,
    ) -> anyhow::Result<TransactionReceipt> {
        let max_polls = (timeout.as_millis() / self.poll_interval.as_millis().max(1)).max(1);
        let policy = ConstantBuilder::default()
            .with_delay(self.poll_interval)
            .with_max_times(max_polls as usize);

        let poll = || async {
            self.transaction_receipt(hash)
                .await?
                .ok_or_else(|| anyhow::Error::new(ReceiptPending(hash)))
        };

        poll.retry(policy)
            .when(|err: &anyhow::Error| err.is::<ReceiptPending>())
            .notify(|err: &anyhow::Error, delay: Duration| {
                tracing::trace!(error = %err, ?delay, "Receipt not ready, retrying...");
            })
            .await
            .map_err(|err| {
                if err.is::<ReceiptPending>() {
                    err.context(format!(
                        "Timeout waiting for transaction {hash} after {}s",
                        timeout.as_secs()
                    ))
                } else {
                    err
                }
            })
    }
}
