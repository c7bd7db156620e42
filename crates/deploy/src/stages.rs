//! Deployment stage markers for the type-state pipeline.
//!
//! The order is fixed: Start -> ParametersResolved -> Deployed -> Initialized.
//! Each stage carries what the following stage needs, so the initialization call
//! cannot be expressed without a handle produced by a completed deployment.

use serde::{Deserialize, Serialize};

use crate::{ContractHandle, DeploymentParameters};

/// Nothing resolved yet.
#[derive(Debug, Clone, Copy, Default)]
pub struct Start;

/// Parameters passed validation.
#[derive(Debug, Clone)]
pub struct ParametersResolved {
    pub params: DeploymentParameters,
}

/// The contract exists but holds no campaign yet.
#[derive(Debug, Clone)]
pub struct Deployed {
    pub params: DeploymentParameters,
    pub handle: ContractHandle,
}

/// Terminal: the campaign has been created.
#[derive(Debug, Clone)]
pub struct Initialized {
    pub handle: ContractHandle,
}

/// Observable state of a run, used in logs and deployment records.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum DeploymentState {
    Start,
    ParametersResolved,
    Deployed,
    Initialized,
    Aborted,
}

mod sealed {
    pub trait Sealed {}
    impl Sealed for super::Start {}
    impl Sealed for super::ParametersResolved {}
    impl Sealed for super::Deployed {}
    impl Sealed for super::Initialized {}
}

/// Marker trait for valid deployment stages.
pub trait DeploymentStage: sealed::Sealed + Send + 'static {
    const STATE: DeploymentState;
}

impl DeploymentStage for Start {
    const STATE: DeploymentState = DeploymentState::Start;
}

impl DeploymentStage for ParametersResolved {
    const STATE: DeploymentState = DeploymentState::ParametersResolved;
}

impl DeploymentStage for Deployed {
    const STATE: DeploymentState = DeploymentState::Deployed;
}

impl DeploymentStage for Initialized {
    const STATE: DeploymentState = DeploymentState::Initialized;
}

/// Trait encoding valid stage transitions.
///
/// Implemented only for:
/// - Start -> ParametersResolved
/// - ParametersResolved -> Deployed
/// - Deployed -> Initialized
pub trait NextStage: DeploymentStage {
    type Next: DeploymentStage;
}

impl NextStage for Start {
    type Next = ParametersResolved;
}

impl NextStage for ParametersResolved {
    type Next = Deployed;
}

impl NextStage for Deployed {
    type Next = Initialized;
}

// Initialized has no NextStage impl - it's terminal

/// Move from `S` to its successor stage.
pub(crate) fn advance<S: NextStage>(_from: S, next: S::Next) -> S::Next {
    tracing::debug!(from = %S::STATE, to = %<S::Next as DeploymentStage>::STATE, "Stage transition");
    next
}
