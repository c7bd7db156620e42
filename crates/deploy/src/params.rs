//! Campaign parameter resolution.
//!
//! Parameters arrive as dynamic JSON values, either from an in-memory map or from
//! an Ignition-style `parameters.json` file. Resolution applies a truthiness gate
//! (missing, `null`, `""`, `0` and `false` are all rejected) before converting the
//! values into a typed [`DeploymentParameters`].

use std::{
    collections::{BTreeMap, HashMap},
    path::Path,
};

use alloy_core::primitives::U256;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    error::{DeployError, DeployResult},
    runtime::CallArg,
};

pub const TITLE: &str = "title";
pub const DESCRIPTION: &str = "description";
pub const BENEFACTOR: &str = "benefactor";
pub const GOAL: &str = "goal";
pub const DURATION: &str = "duration";

/// The five required parameter names, in initialization-call order.
pub const PARAMETER_NAMES: [&str; 5] = [TITLE, DESCRIPTION, BENEFACTOR, GOAL, DURATION];

/// Key-value lookup supplying raw parameter values.
pub trait ParameterSource {
    /// Return the raw value for `name`, or `None` if it is not set.
    fn get_parameter(&self, name: &str) -> Option<Value>;
}

impl ParameterSource for HashMap<String, Value> {
    fn get_parameter(&self, name: &str) -> Option<Value> {
        self.get(name).cloned()
    }
}

impl ParameterSource for BTreeMap<String, Value> {
    fn get_parameter(&self, name: &str) -> Option<Value> {
        self.get(name).cloned()
    }
}

impl ParameterSource for serde_json::Map<String, Value> {
    fn get_parameter(&self, name: &str) -> Option<Value> {
        self.get(name).cloned()
    }
}

impl<T: ParameterSource + ?Sized> ParameterSource for &T {
    fn get_parameter(&self, name: &str) -> Option<Value> {
        (**self).get_parameter(name)
    }
}

/// Validated campaign parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentParameters {
    pub title: String,
    pub description: String,
    /// Recipient of the campaign funds. Address validity is checked by the contract side.
    pub benefactor: String,
    pub goal: U256,
    /// Campaign duration, in the contract's time units.
    pub duration: U256,
}

impl DeploymentParameters {
    /// Arguments of the `createCampaign` call, in declaration order.
    pub fn campaign_args(&self) -> Vec<CallArg> {
        vec![
            CallArg::Str(self.title.clone()),
            CallArg::Str(self.description.clone()),
            CallArg::Str(self.benefactor.clone()),
            CallArg::Uint(self.goal),
            CallArg::Uint(self.duration),
        ]
    }
}

/// JavaScript-style truthiness of a raw parameter value.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Read the five campaign parameters from `source` and validate them.
///
/// Any missing or falsy value fails with [`DeployError::Configuration`] before
/// anything else happens. A zero `goal` is rejected as well, whichever way it is
/// encoded.
pub fn resolve_and_validate_parameters<P>(source: &P) -> DeployResult<DeploymentParameters>
where
    P: ParameterSource + ?Sized,
{
    let mut values = PARAMETER_NAMES.map(|name| source.get_parameter(name));

    if values
        .iter()
        .any(|value| !value.as_ref().is_some_and(is_truthy))
    {
        tracing::debug!(
            provided = ?PARAMETER_NAMES
                .iter()
                .zip(values.iter())
                .filter(|(_, v)| v.as_ref().is_some_and(is_truthy))
                .map(|(name, _)| *name)
                .collect::<Vec<_>>(),
            "Campaign parameters incomplete"
        );
        return Err(DeployError::missing_parameters());
    }

    let mut take = |index: usize| values[index].take().unwrap_or(Value::Null);

    let params = DeploymentParameters {
        title: parse_text(TITLE, take(0))?,
        description: parse_text(DESCRIPTION, take(1))?,
        benefactor: parse_text(BENEFACTOR, take(2))?,
        goal: parse_amount(GOAL, take(3))?,
        duration: parse_amount(DURATION, take(4))?,
    };

    Ok(params)
}

fn parse_text(name: &str, value: Value) -> DeployResult<String> {
    match value {
        Value::String(s) => Ok(s),
        other => Err(DeployError::invalid_parameter(
            name,
            format!("expected a string, got {other}"),
        )),
    }
}

/// Parse a positive integer amount.
///
/// Accepts JSON integers (including whole floats), decimal strings, `0x`-prefixed
/// hex strings and Ignition's bigint encoding (`"1000n"`).
pub fn parse_amount(name: &str, value: Value) -> DeployResult<U256> {
    let amount = match &value {
        Value::Number(n) => match (n.as_u64(), n.as_f64()) {
            (Some(v), _) => U256::from(v),
            // Whole floats such as `100.0` or `1e21`.
            (None, Some(f)) if f >= 0.0 && f.fract() == 0.0 && f < 2f64.powi(128) => {
                U256::from(f as u128)
            }
            _ => {
                return Err(DeployError::invalid_parameter(
                    name,
                    format!("expected a non-negative integer, got {n}"),
                ));
            }
        },
        Value::String(s) => {
            let digits = s.trim();
            let digits = digits.strip_suffix('n').unwrap_or(digits);
            digits.parse::<U256>().map_err(|e| {
                DeployError::invalid_parameter(name, format!("`{s}` is not an integer ({e})"))
            })?
        }
        other => {
            return Err(DeployError::invalid_parameter(
                name,
                format!("expected an integer, got {other}"),
            ));
        }
    };

    if amount.is_zero() {
        return Err(DeployError::missing_parameters());
    }

    Ok(amount)
}

/// Parameters loaded from an Ignition-style `parameters.json` file.
///
/// The file is either keyed by module id (`{ "CrowdfundingModule": { ... } }`) or a
/// flat object holding the parameters directly.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModuleParameters {
    values: serde_json::Map<String, Value>,
}

impl ModuleParameters {
    /// Parse parameters for `module_id` from JSON text.
    pub fn from_json_str(content: &str, module_id: &str) -> anyhow::Result<Self> {
        let root: Value =
            serde_json::from_str(content).context("Failed to parse parameters file as JSON")?;

        let Value::Object(mut root) = root else {
            anyhow::bail!("Parameters file must contain a JSON object");
        };

        let values = match root.remove(module_id) {
            Some(Value::Object(scoped)) => scoped,
            Some(other) => {
                anyhow::bail!("Parameters for module {module_id} must be an object, got {other}")
            }
            None => root,
        };

        Ok(Self { values })
    }

    /// Load parameters for `module_id` from a file.
    pub fn load_from_file(path: &Path, module_id: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read parameters from {}", path.display()))?;
        let params = Self::from_json_str(&content, module_id)?;
        tracing::info!(path = %path.display(), module_id, "Parameters loaded");
        Ok(params)
    }

    /// Override a single value.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(name.into(), value.into());
    }
}

impl ParameterSource for ModuleParameters {
    fn get_parameter(&self, name: &str) -> Option<Value> {
        self.values.get(name).cloned()
    }
}

impl From<serde_json::Map<String, Value>> for ModuleParameters {
    fn from(values: serde_json::Map<String, Value>) -> Self {
        Self { values }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MISSING_PARAMETERS_MESSAGE;
    use serde_json::json;

    fn valid() -> HashMap<String, Value> {
        HashMap::from([
            (TITLE.to_string(), json!("Help")),
            (DESCRIPTION.to_string(), json!("desc")),
            (BENEFACTOR.to_string(), json!("0xABC")),
            (GOAL.to_string(), json!(100)),
            (DURATION.to_string(), json!(30)),
        ])
    }

    fn assert_missing(result: DeployResult<DeploymentParameters>) {
        match result {
            Err(DeployError::Configuration { message }) => {
                assert_eq!(message, MISSING_PARAMETERS_MESSAGE)
            }
            other => panic!("expected configuration error, got {other:?}"),
        }
    }

    #[test]
    fn test_resolve_valid_parameters() {
        let params = resolve_and_validate_parameters(&valid()).unwrap();
        assert_eq!(params.title, "Help");
        assert_eq!(params.description, "desc");
        assert_eq!(params.benefactor, "0xABC");
        assert_eq!(params.goal, U256::from(100));
        assert_eq!(params.duration, U256::from(30));
    }

    #[test]
    fn test_each_missing_parameter_is_rejected() {
        for name in PARAMETER_NAMES {
            let mut source = valid();
            source.remove(name);
            assert_missing(resolve_and_validate_parameters(&source));
        }
    }

    #[test]
    fn test_each_falsy_parameter_is_rejected() {
        let falsy = [json!(null), json!(""), json!(0), json!(false), json!(0.0)];
        for name in PARAMETER_NAMES {
            for value in &falsy {
                let mut source = valid();
                source.insert(name.to_string(), value.clone());
                assert_missing(resolve_and_validate_parameters(&source));
            }
        }
    }

    #[test]
    fn test_zero_goal_is_rejected_in_any_encoding() {
        for zero in [json!(0), json!("0"), json!("0x0"), json!("0n")] {
            let mut source = valid();
            source.insert(GOAL.to_string(), zero);
            assert_missing(resolve_and_validate_parameters(&source));
        }
    }

    #[test]
    fn test_amount_encodings() {
        assert_eq!(parse_amount(GOAL, json!(42)).unwrap(), U256::from(42));
        assert_eq!(parse_amount(GOAL, json!("42")).unwrap(), U256::from(42));
        assert_eq!(parse_amount(GOAL, json!("0x2a")).unwrap(), U256::from(42));
        assert_eq!(parse_amount(GOAL, json!("42n")).unwrap(), U256::from(42));
        assert_eq!(parse_amount(GOAL, json!(100.0)).unwrap(), U256::from(100));
        assert_eq!(
            parse_amount(GOAL, json!(1e21)).unwrap(),
            U256::from(10).pow(U256::from(21))
        );
        assert_eq!(
            parse_amount(GOAL, json!("1000000000000000000000")).unwrap(),
            U256::from(10).pow(U256::from(21))
        );
    }

    #[test]
    fn test_malformed_amounts_name_the_parameter() {
        for bad in [json!("abc"), json!(-5), json!(1.5), json!([1])] {
            let err = parse_amount(DURATION, bad).unwrap_err();
            assert!(err.is_configuration());
            assert!(err.to_string().contains("`duration`"), "{err}");
        }
    }

    #[test]
    fn test_non_string_title_is_rejected() {
        let mut source = valid();
        source.insert(TITLE.to_string(), json!(7));
        let err = resolve_and_validate_parameters(&source).unwrap_err();
        assert!(err.to_string().contains("`title`"));
    }

    #[test]
    fn test_campaign_args_order() {
        let params = resolve_and_validate_parameters(&valid()).unwrap();
        assert_eq!(
            params.campaign_args(),
            vec![
                CallArg::Str("Help".to_string()),
                CallArg::Str("desc".to_string()),
                CallArg::Str("0xABC".to_string()),
                CallArg::Uint(U256::from(100)),
                CallArg::Uint(U256::from(30)),
            ]
        );
    }

    #[test]
    fn test_module_parameters_scoped_by_module_id() {
        let content = r#"{
            "CrowdfundingModule": {
                "title": "Help", "description": "desc", "benefactor": "0xABC",
                "goal": "100n", "duration": 30
            },
            "OtherModule": { "title": "ignored" }
        }"#;
        let params = ModuleParameters::from_json_str(content, "CrowdfundingModule").unwrap();
        let resolved = resolve_and_validate_parameters(&params).unwrap();
        assert_eq!(resolved.goal, U256::from(100));
        assert_eq!(resolved.title, "Help");
    }

    #[test]
    fn test_module_parameters_flat_file() {
        let content = r#"{ "title": "Flat", "goal": 1 }"#;
        let params = ModuleParameters::from_json_str(content, "CrowdfundingModule").unwrap();
        assert_eq!(params.get_parameter(TITLE), Some(json!("Flat")));
        assert_eq!(params.get_parameter(DURATION), None);
    }

    #[test]
    fn test_module_parameters_rejects_non_object() {
        assert!(ModuleParameters::from_json_str("[1, 2]", "CrowdfundingModule").is_err());
        assert!(
            ModuleParameters::from_json_str(r#"{"CrowdfundingModule": 3}"#, "CrowdfundingModule")
                .is_err()
        );
    }
}
