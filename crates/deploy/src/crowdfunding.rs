//! The `CrowdfundingModule`: deploy one `Crowdfunding` contract and create its campaign.
//!
//! # Example
//!
//! ```no_run
//! use crowdfund_deploy::{ContractRuntime, CrowdfundingModule, ParameterSource};
//!
//! # async fn example(params: &impl ParameterSource, runtime: &mut impl ContractRuntime) -> anyhow::Result<()> {
//! let result = CrowdfundingModule::run(params, runtime).await?;
//! println!("Crowdfunding deployed at {}", result.crowdfunding.address);
//! # Ok(())
//! # }
//! ```

use alloy_core::primitives::U256;
use serde::{Deserialize, Serialize};

use crate::{
    ContractHandle, ContractRuntime, DeployOptions, DeploymentParameters, ParameterSource,
    error::{DeployError, DeployResult},
    params::resolve_and_validate_parameters,
    stages::{
        self, Deployed, DeploymentStage, DeploymentState, Initialized, ParametersResolved, Start,
    },
};

/// Module identifier, used as the parameters-file key and future id prefix.
pub const MODULE_ID: &str = "CrowdfundingModule";
/// Name of the deployed contract artifact.
pub const CONTRACT_NAME: &str = "Crowdfunding";
/// Method called once after deployment.
pub const INIT_METHOD: &str = "createCampaign";

/// Future id of the deployed contract: `CrowdfundingModule#Crowdfunding`.
pub fn contract_future_id() -> String {
    format!("{MODULE_ID}#{CONTRACT_NAME}")
}

/// Value returned to the caller once the module completed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleResult {
    pub crowdfunding: ContractHandle,
}

/// Deploy the `Crowdfunding` contract with no constructor arguments and zero value.
pub async fn deploy_contract<R>(runtime: &mut R) -> DeployResult<ContractHandle>
where
    R: ContractRuntime + ?Sized,
{
    let future_id = contract_future_id();
    let options = DeployOptions { value: U256::ZERO };

    tracing::info!(future_id, contract = CONTRACT_NAME, "Deploying contract...");

    let handle = runtime
        .deploy_contract(&future_id, CONTRACT_NAME, Vec::new(), options)
        .await
        .map_err(|source| DeployError::Deployment {
            contract: CONTRACT_NAME.to_string(),
            source,
        })?;

    tracing::info!(
        future_id,
        address = %handle.address,
        tx = ?handle.deploy_tx,
        "Contract deployed"
    );

    Ok(handle)
}

/// Call `createCampaign(title, description, benefactor, goal, duration)` on `handle`.
///
/// No retry and no rollback: on failure the contract stays deployed and its address
/// is carried by the returned [`DeployError::Initialization`].
pub async fn initialize_campaign<R>(
    runtime: &mut R,
    handle: &ContractHandle,
    params: &DeploymentParameters,
) -> DeployResult<()>
where
    R: ContractRuntime + ?Sized,
{
    tracing::info!(
        address = %handle.address,
        method = INIT_METHOD,
        title = %params.title,
        benefactor = %params.benefactor,
        goal = %params.goal,
        duration = %params.duration,
        "Creating campaign..."
    );

    runtime
        .call(handle, INIT_METHOD, params.campaign_args())
        .await
        .map_err(|source| DeployError::Initialization {
            contract: handle.contract_name.clone(),
            method: INIT_METHOD.to_string(),
            address: handle.address,
            deploy_tx: handle.deploy_tx,
            source,
        })?;

    tracing::info!(address = %handle.address, "Campaign created");

    Ok(())
}

/// A module run, typed by the stage it reached.
#[derive(Debug, Clone)]
pub struct CrowdfundingModule<S: DeploymentStage = Start> {
    stage: S,
}

impl Default for CrowdfundingModule<Start> {
    fn default() -> Self {
        Self::new()
    }
}

impl CrowdfundingModule<Start> {
    pub fn new() -> Self {
        Self { stage: Start }
    }

    /// Run the whole module: resolve parameters, deploy, then initialize.
    pub async fn run<P, R>(source: &P, runtime: &mut R) -> DeployResult<ModuleResult>
    where
        P: ParameterSource + ?Sized,
        R: ContractRuntime + ?Sized,
    {
        let outcome = async {
            Self::new()
                .resolve_parameters(source)?
                .deploy(runtime)
                .await?
                .initialize(runtime)
                .await
        }
        .await;

        match outcome {
            Ok(initialized) => Ok(initialized.into_result()),
            Err(err) => {
                tracing::error!(
                    module = MODULE_ID,
                    state = %DeploymentState::Aborted,
                    aborted_from = %err.aborted_from(),
                    uninitialized_address = ?err.uninitialized_address(),
                    error = %err,
                    "Module run aborted"
                );
                Err(err)
            }
        }
    }

    /// Resolve and validate the campaign parameters.
    pub fn resolve_parameters<P>(
        self,
        source: &P,
    ) -> DeployResult<CrowdfundingModule<ParametersResolved>>
    where
        P: ParameterSource + ?Sized,
    {
        let params = resolve_and_validate_parameters(source)?;
        Ok(CrowdfundingModule {
            stage: stages::advance(self.stage, ParametersResolved { params }),
        })
    }
}

impl CrowdfundingModule<ParametersResolved> {
    pub fn parameters(&self) -> &DeploymentParameters {
        &self.stage.params
    }

    pub async fn deploy<R>(self, runtime: &mut R) -> DeployResult<CrowdfundingModule<Deployed>>
    where
        R: ContractRuntime + ?Sized,
    {
        let handle = deploy_contract(runtime).await?;
        let params = self.stage.params.clone();
        Ok(CrowdfundingModule {
            stage: stages::advance(self.stage, Deployed { params, handle }),
        })
    }
}

impl CrowdfundingModule<Deployed> {
    pub fn handle(&self) -> &ContractHandle {
        &self.stage.handle
    }

    pub async fn initialize<R>(
        self,
        runtime: &mut R,
    ) -> DeployResult<CrowdfundingModule<Initialized>>
    where
        R: ContractRuntime + ?Sized,
    {
        initialize_campaign(runtime, &self.stage.handle, &self.stage.params).await?;
        let handle = self.stage.handle.clone();
        Ok(CrowdfundingModule {
            stage: stages::advance(self.stage, Initialized { handle }),
        })
    }
}

impl CrowdfundingModule<Initialized> {
    pub fn into_result(self) -> ModuleResult {
        ModuleResult {
            crowdfunding: self.stage.handle,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{RecordedOp, RecordingRuntime};
    use serde_json::json;
    use std::{
        collections::HashMap,
        sync::{Arc, Mutex},
    };

    fn params() -> HashMap<String, serde_json::Value> {
        HashMap::from([
            ("title".to_string(), json!("Help")),
            ("description".to_string(), json!("desc")),
            ("benefactor".to_string(), json!("0xABC")),
            ("goal".to_string(), json!(100)),
            ("duration".to_string(), json!(30)),
        ])
    }

    #[test]
    fn test_future_id() {
        assert_eq!(contract_future_id(), "CrowdfundingModule#Crowdfunding");
    }

    #[tokio::test]
    async fn test_deploy_requests_zero_value_regardless_of_goal() {
        let mut source = params();
        source.insert("goal".to_string(), json!("1000000000000000000000"));
        let mut runtime = RecordingRuntime::default();

        CrowdfundingModule::run(&source, &mut runtime).await.unwrap();

        match &runtime.ops[0] {
            RecordedOp::Deploy {
                future_id,
                contract,
                constructor_args,
                options,
                ..
            } => {
                assert_eq!(future_id, "CrowdfundingModule#Crowdfunding");
                assert_eq!(contract, CONTRACT_NAME);
                assert!(constructor_args.is_empty());
                assert_eq!(options.value, U256::ZERO);
            }
            other => panic!("expected deploy first, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_stepwise_pipeline_exposes_intermediate_state() {
        let mut runtime = RecordingRuntime::default();

        let resolved = CrowdfundingModule::new().resolve_parameters(&params()).unwrap();
        assert_eq!(resolved.parameters().title, "Help");
        assert!(runtime.ops.is_empty());

        let deployed = resolved.deploy(&mut runtime).await.unwrap();
        assert_eq!(runtime.ops.len(), 1);
        let address = deployed.handle().address;

        let result = deployed.initialize(&mut runtime).await.unwrap().into_result();
        assert_eq!(result.crowdfunding.address, address);
        assert_eq!(
            runtime.ops[1],
            RecordedOp::Call {
                address,
                method: INIT_METHOD.to_string(),
                args: resolve_and_validate_parameters(&params()).unwrap().campaign_args(),
            }
        );
    }

    #[tokio::test]
    async fn test_initialization_failure_keeps_deployed_address() {
        let mut runtime = RecordingRuntime {
            fail_call: true,
            ..Default::default()
        };

        let err = CrowdfundingModule::run(&params(), &mut runtime).await.unwrap_err();

        let deployed_address = match &runtime.ops[0] {
            RecordedOp::Deploy { address, .. } => *address,
            other => panic!("expected deploy, got {other:?}"),
        };
        assert!(matches!(err, DeployError::Initialization { .. }));
        assert_eq!(err.uninitialized_address(), Some(deployed_address));
        assert_eq!(err.aborted_from(), crate::DeploymentState::Deployed);
    }

    #[derive(Clone, Default)]
    struct LogBuffer(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_abort_is_logged_with_aborted_state() {
        let logs = LogBuffer::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let mut source = params();
        source.remove("title");
        let mut runtime = RecordingRuntime::default();
        CrowdfundingModule::run(&source, &mut runtime).await.unwrap_err();

        let output = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains("Module run aborted"), "{output}");
        assert!(output.contains("state=aborted"), "{output}");
        assert!(output.contains("aborted_from=start"), "{output}");
    }

    #[tokio::test]
    async fn test_deployment_failure_skips_initialization() {
        let mut runtime = RecordingRuntime {
            fail_deploy: true,
            ..Default::default()
        };

        let err = CrowdfundingModule::run(&params(), &mut runtime).await.unwrap_err();

        assert!(matches!(err, DeployError::Deployment { .. }));
        assert!(runtime.ops.is_empty());
        assert_eq!(runtime.call_attempts, 0);
    }
}
