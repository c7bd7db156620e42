//! Compiled contract artifacts.
//!
//! Supports the Hardhat layout (`{ contractName, abi, bytecode: "0x.." }`) and the
//! Foundry layout (`{ abi, bytecode: { object: "0x.." } }`).

use std::path::Path;

use alloy_core::{
    dyn_abi::{DynSolType, DynSolValue, JsonAbiExt, Specifier},
    json_abi::{Function, JsonAbi, Param},
    primitives::Bytes,
};
use anyhow::Context;
use serde_json::Value;

use crate::CallArg;

/// ABI and creation bytecode of a single contract.
#[derive(Debug, Clone, PartialEq)]
pub struct ContractArtifact {
    pub contract_name: String,
    pub abi: JsonAbi,
    pub bytecode: Bytes,
}

impl ContractArtifact {
    /// Parse an artifact from JSON text.
    ///
    /// `fallback_name` is used when the artifact does not carry a `contractName`
    /// (Foundry output).
    pub fn from_json_str(content: &str, fallback_name: &str) -> anyhow::Result<Self> {
        let json: Value =
            serde_json::from_str(content).context("Failed to parse artifact as JSON")?;

        let contract_name = json
            .get("contractName")
            .and_then(Value::as_str)
            .unwrap_or(fallback_name)
            .to_string();

        let abi = json
            .get("abi")
            .cloned()
            .with_context(|| format!("Artifact for {contract_name} has no abi"))?;
        let abi: JsonAbi = serde_json::from_value(abi)
            .with_context(|| format!("Failed to parse abi of {contract_name}"))?;

        let bytecode = match json.get("bytecode") {
            Some(Value::String(code)) => code.as_str(),
            Some(Value::Object(obj)) => obj
                .get("object")
                .and_then(Value::as_str)
                .with_context(|| format!("Artifact for {contract_name} has no bytecode.object"))?,
            _ => anyhow::bail!("Artifact for {contract_name} has no bytecode"),
        };

        Ok(Self {
            bytecode: decode_bytecode(&contract_name, bytecode)?,
            contract_name,
            abi,
        })
    }

    /// Load an artifact from a file. The file stem is used as fallback contract name.
    pub fn load_from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read artifact from {}", path.display()))?;
        let fallback_name = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or_default();

        let artifact = Self::from_json_str(&content, fallback_name)?;
        tracing::debug!(
            path = %path.display(),
            contract = %artifact.contract_name,
            bytecode_len = artifact.bytecode.len(),
            "Artifact loaded"
        );
        Ok(artifact)
    }

    /// Creation code followed by the ABI-encoded constructor arguments.
    pub fn deploy_code(&self, constructor_args: &[CallArg]) -> anyhow::Result<Bytes> {
        let Some(constructor) = self.abi.constructor() else {
            if !constructor_args.is_empty() {
                anyhow::bail!(
                    "{} has no constructor but {} arguments were given",
                    self.contract_name,
                    constructor_args.len()
                );
            }
            return Ok(self.bytecode.clone());
        };

        let values = coerce_args(&constructor.inputs, constructor_args)
            .with_context(|| format!("Invalid constructor arguments for {}", self.contract_name))?;
        let encoded = constructor
            .abi_encode_input(&values)
            .with_context(|| format!("Failed to encode constructor of {}", self.contract_name))?;

        let mut code = self.bytecode.to_vec();
        code.extend_from_slice(&encoded);
        Ok(code.into())
    }

    /// Find `method` with a matching arity.
    pub fn function(&self, method: &str, arity: usize) -> anyhow::Result<&Function> {
        let overloads = self
            .abi
            .function(method)
            .with_context(|| format!("{} has no function {method}", self.contract_name))?;

        overloads
            .iter()
            .find(|f| f.inputs.len() == arity)
            .with_context(|| {
                format!(
                    "{} has no overload of {method} taking {arity} arguments",
                    self.contract_name
                )
            })
    }

    /// ABI-encode a call to `method` (selector followed by arguments).
    pub fn encode_call(&self, method: &str, args: &[CallArg]) -> anyhow::Result<Bytes> {
        let function = self.function(method, args.len())?;
        let values = coerce_args(&function.inputs, args)
            .with_context(|| format!("Invalid arguments for {}", function.signature()))?;
        let calldata = function
            .abi_encode_input(&values)
            .with_context(|| format!("Failed to encode {}", function.signature()))?;
        Ok(calldata.into())
    }
}

/// Convert call arguments to ABI values according to the declared parameter types.
fn coerce_args(params: &[Param], args: &[CallArg]) -> anyhow::Result<Vec<DynSolValue>> {
    if params.len() != args.len() {
        anyhow::bail!("expected {} arguments, got {}", params.len(), args.len());
    }

    params
        .iter()
        .zip(args)
        .map(|(param, arg)| {
            let ty: DynSolType = param
                .resolve()
                .with_context(|| format!("Unsupported parameter type {}", param.ty))?;
            match (&ty, arg) {
                (DynSolType::String, CallArg::Str(s)) => Ok(DynSolValue::String(s.clone())),
                (DynSolType::Uint(bits), CallArg::Uint(v)) if *bits == 256 => {
                    Ok(DynSolValue::Uint(*v, 256))
                }
                (_, arg) => {
                    let text = match arg {
                        CallArg::Str(s) => s.clone(),
                        CallArg::Uint(v) => v.to_string(),
                    };
                    ty.coerce_str(&text).with_context(|| {
                        format!("`{}` is not a valid {} for {}", text, param.ty, param.name)
                    })
                }
            }
        })
        .collect()
}

fn decode_bytecode(contract_name: &str, code: &str) -> anyhow::Result<Bytes> {
    let code = code.trim().trim_start_matches("0x");
    if code.is_empty() {
        anyhow::bail!("{contract_name} has empty bytecode (abstract contract or interface?)");
    }
    if code.contains("__") {
        anyhow::bail!("{contract_name} bytecode contains unlinked library placeholders");
    }
    let bytes = hex::decode(code)
        .with_context(|| format!("Failed to decode bytecode of {contract_name}"))?;
    Ok(bytes.into())
}
