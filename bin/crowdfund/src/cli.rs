use std::path::PathBuf;

use alloy_core::primitives::Address;
use anyhow::Context;
use clap::Parser;
use crowdfund_deploy::{CONFIG_FILENAME, DEFAULT_RECEIPT_TIMEOUT, DEFAULT_RPC_URL, Deployer};
use figment::{
    Figment,
    providers::{Format, Serialized, Toml},
};
use serde::Serialize;
use tracing::level_filters::LevelFilter;
use url::Url;

/// Default location of the compiled contract (Hardhat layout).
const DEFAULT_ARTIFACT: &str = "artifacts/contracts/Crowdfunding.sol/Crowdfunding.json";
/// Default location of the module parameters (Ignition layout).
const DEFAULT_PARAMETERS: &str = "ignition/parameters.json";
/// Default output data directory.
const DEFAULT_OUTDATA: &str = "deployments";

#[derive(Debug, Clone, PartialEq, Eq, Hash, strum::Display, strum::EnumString)]
#[strum(serialize_all = "kebab-case")]
pub enum RpcProvider {
    Localhost,
    Hardhat,
    #[strum(default)]
    Custom(String),
}

impl RpcProvider {
    pub fn to_rpc_url(&self) -> anyhow::Result<Url> {
        match self {
            RpcProvider::Localhost | RpcProvider::Hardhat => {
                Url::parse(DEFAULT_RPC_URL).context("Invalid default RPC URL")
            }
            RpcProvider::Custom(url) => {
                Url::parse(url).with_context(|| format!("Invalid RPC URL: {url}"))
            }
        }
    }
}

#[derive(Parser)]
#[command(name = "crowdfund")]
#[command(
    author,
    version,
    about = "Deploy a Crowdfunding contract and create its campaign"
)]
pub struct Cli {
    /// The verbosity level.
    #[arg(short, long, env = "CROWDFUND_VERBOSITY", default_value_t = LevelFilter::INFO)]
    pub verbosity: LevelFilter,

    /// The node to deploy to: `localhost`, `hardhat`, or a JSON-RPC URL.
    ///
    /// The node must have the sender's account unlocked (anvil, hardhat node).
    #[arg(long, alias = "network", env = "CROWDFUND_RPC_URL")]
    pub rpc_url: Option<RpcProvider>,

    /// The sender address. Defaults to the node's first unlocked account.
    #[arg(long, env = "CROWDFUND_FROM")]
    pub from: Option<Address>,

    /// Path to the module parameters JSON file.
    ///
    /// Either keyed by module id (`{ "CrowdfundingModule": { ... } }`) or flat.
    #[arg(short, long, env = "CROWDFUND_PARAMETERS")]
    pub parameters: Option<PathBuf>,

    /// Path to the compiled Crowdfunding artifact (Hardhat or Foundry JSON).
    #[arg(long, env = "CROWDFUND_ARTIFACT")]
    pub artifact: Option<PathBuf>,

    /// The path to the output data directory.
    ///
    /// If not provided, the deployment record is stored at: ./deployments
    #[arg(long, env = "CROWDFUND_OUTDATA")]
    pub outdata: Option<PathBuf>,

    /// Seconds to wait for each transaction to be mined.
    #[arg(long, env = "CROWDFUND_RECEIPT_TIMEOUT")]
    pub receipt_timeout: Option<u64>,

    /// Deploy again even if an identical deployment is recorded.
    #[arg(long, env = "CROWDFUND_RESET", default_value_t = false)]
    pub reset: bool,

    /// Path to an existing Crowdfund.toml configuration file (or its directory).
    ///
    /// Values from the file are used unless overridden by flags or environment.
    #[arg(long, alias = "conf", env = "CROWDFUND_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Layer of values explicitly set on the command line or in the environment.
#[derive(Debug, Default, Serialize)]
struct Overrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    rpc_url: Option<Url>,
    #[serde(skip_serializing_if = "Option::is_none")]
    from: Option<Address>,
    #[serde(skip_serializing_if = "Option::is_none")]
    artifact: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    parameters: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    outdata: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    receipt_timeout_secs: Option<u64>,
}

impl Cli {
    /// Build the deployer configuration: defaults, then the config file, then flags.
    pub fn deployer(&self) -> anyhow::Result<Deployer> {
        let defaults = Deployer {
            rpc_url: Url::parse(DEFAULT_RPC_URL).context("Invalid default RPC URL")?,
            from: None,
            artifact: PathBuf::from(DEFAULT_ARTIFACT),
            parameters: PathBuf::from(DEFAULT_PARAMETERS),
            outdata: PathBuf::from(DEFAULT_OUTDATA),
            receipt_timeout_secs: DEFAULT_RECEIPT_TIMEOUT.as_secs(),
        };

        let mut figment = Figment::from(Serialized::defaults(defaults));

        if let Some(path) = &self.config {
            let path = if path.is_dir() {
                path.join(CONFIG_FILENAME)
            } else {
                path.clone()
            };
            if !path.exists() {
                anyhow::bail!("Configuration file not found: {}", path.display());
            }
            figment = figment.merge(Toml::file(path));
        }

        let overrides = Overrides {
            rpc_url: self
                .rpc_url
                .as_ref()
                .map(RpcProvider::to_rpc_url)
                .transpose()?,
            from: self.from,
            artifact: self.artifact.clone(),
            parameters: self.parameters.clone(),
            outdata: self.outdata.clone(),
            receipt_timeout_secs: self.receipt_timeout,
        };

        figment
            .merge(Serialized::defaults(overrides))
            .extract()
            .context("Failed to build deployer configuration")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempdir::TempDir;

    #[test]
    fn test_rpc_provider_parsing() {
        assert_eq!("localhost".parse::<RpcProvider>().unwrap(), RpcProvider::Localhost);
        assert_eq!("hardhat".parse::<RpcProvider>().unwrap(), RpcProvider::Hardhat);
        assert_eq!(
            "http://10.0.0.2:8545".parse::<RpcProvider>().unwrap(),
            RpcProvider::Custom("http://10.0.0.2:8545".to_string())
        );
        assert!(RpcProvider::Custom("not a url".to_string()).to_rpc_url().is_err());
    }

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["crowdfund"]).unwrap();
        let deployer = cli.deployer().unwrap();

        assert_eq!(deployer.rpc_url.as_str(), "http://127.0.0.1:8545/");
        assert_eq!(deployer.artifact, PathBuf::from(DEFAULT_ARTIFACT));
        assert_eq!(deployer.parameters, PathBuf::from(DEFAULT_PARAMETERS));
        assert_eq!(deployer.receipt_timeout_secs, 120);
        assert!(!cli.reset);
    }

    #[test]
    fn test_flags_override_config_file() {
        let temp_dir = TempDir::new("crowdfund-cli").expect("Failed to create temp dir");
        let config = Deployer {
            rpc_url: Url::parse("http://node.internal:8545").unwrap(),
            from: None,
            artifact: PathBuf::from("from-file.json"),
            parameters: PathBuf::from("params-from-file.json"),
            outdata: temp_dir.path().to_path_buf(),
            receipt_timeout_secs: 10,
        };
        config.save_config().unwrap();

        let cli = Cli::try_parse_from([
            "crowdfund",
            "--config",
            temp_dir.path().to_str().unwrap(),
            "--artifact",
            "from-flag.json",
            "--from",
            "0x70997970C51812dc3A010C7d01b50e0d17dc79C8",
        ])
        .unwrap();
        let deployer = cli.deployer().unwrap();

        assert_eq!(deployer.rpc_url.as_str(), "http://node.internal:8545/");
        assert_eq!(deployer.parameters, PathBuf::from("params-from-file.json"));
        assert_eq!(deployer.receipt_timeout_secs, 10);
        assert_eq!(deployer.artifact, PathBuf::from("from-flag.json"));
        assert_eq!(
            deployer.from,
            Some("0x70997970C51812dc3A010C7d01b50e0d17dc79C8".parse().unwrap())
        );
    }

    #[test]
    fn test_missing_config_file() {
        let cli = Cli::try_parse_from(["crowdfund", "--config", "/nonexistent/Crowdfund.toml"])
            .unwrap();
        assert!(cli.deployer().is_err());
    }
}
