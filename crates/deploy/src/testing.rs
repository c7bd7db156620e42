//! Recording runtime for unit tests.

use alloy_core::primitives::Address;

use crate::{CallArg, ContractHandle, ContractRuntime, DeployOptions};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum RecordedOp {
    Deploy {
        future_id: String,
        contract: String,
        constructor_args: Vec<CallArg>,
        options: DeployOptions,
        address: Address,
    },
    Call {
        address: Address,
        method: String,
        args: Vec<CallArg>,
    },
}

/// Records every committed operation in order; can be told to fail either step.
#[derive(Debug, Default)]
pub(crate) struct RecordingRuntime {
    pub ops: Vec<RecordedOp>,
    pub fail_deploy: bool,
    pub fail_call: bool,
    pub call_attempts: usize,
}

impl ContractRuntime for RecordingRuntime {
    async fn deploy_contract(
        &mut self,
        future_id: &str,
        contract: &str,
        constructor_args: Vec<CallArg>,
        options: DeployOptions,
    ) -> anyhow::Result<ContractHandle> {
        if self.fail_deploy {
            anyhow::bail!("deployment reverted");
        }

        let address = Address::with_last_byte(self.ops.len() as u8 + 1);
        self.ops.push(RecordedOp::Deploy {
            future_id: future_id.to_string(),
            contract: contract.to_string(),
            constructor_args,
            options,
            address,
        });

        Ok(ContractHandle {
            future_id: future_id.to_string(),
            contract_name: contract.to_string(),
            address,
            deploy_tx: None,
        })
    }

    async fn call(
        &mut self,
        handle: &ContractHandle,
        method: &str,
        args: Vec<CallArg>,
    ) -> anyhow::Result<()> {
        self.call_attempts += 1;
        if self.fail_call {
            anyhow::bail!("execution reverted: invalid benefactor");
        }

        self.ops.push(RecordedOp::Call {
            address: handle.address,
            method: method.to_string(),
            args,
        });
        Ok(())
    }
}
