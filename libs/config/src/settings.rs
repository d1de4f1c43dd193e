//! Engine Configuration Module
//!
//! Loads [`SpotConfig`] from built-in defaults, an optional TOML file and
//! `SPOT__`-prefixed environment variables, in that order of precedence.

use anyhow::{bail, Context, Result};
use config_crate::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info};

const ENV_PREFIX: &str = "SPOT";
const ENV_SEPARATOR: &str = "__";

/// Top-level configuration
#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct SpotConfig {
    pub logging: LoggingConfig,
    pub pool_creation: PoolCreationSettings,
}

/// Log output settings
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive, e.g. `info` or `spot_amm=debug`
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

/// Governance-style parameters consulted when a pool is created
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct PoolCreationSettings {
    pub whitelisted_assets: Vec<String>,
    pub creation_fee: Vec<FeeCoin>,
    /// Account credited with the creation fee
    pub fee_collector: String,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct FeeCoin {
    pub denom: String,
    pub amount: u64,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl Default for PoolCreationSettings {
    fn default() -> Self {
        Self {
            whitelisted_assets: Vec::new(),
            creation_fee: Vec::new(),
            fee_collector: "fee_collector".to_string(),
        }
    }
}

impl SpotConfig {
    /// Load configuration; `path`, when given, must point at a TOML file
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with_env(path, Self::environment())
    }

    fn environment() -> Environment {
        Environment::with_prefix(ENV_PREFIX)
            .prefix_separator(ENV_SEPARATOR)
            .separator(ENV_SEPARATOR)
            .list_separator(",")
            .with_list_parse_key("pool_creation.whitelisted_assets")
            .try_parsing(true)
    }

    fn load_with_env(path: Option<&Path>, environment: Environment) -> Result<Self> {
        let defaults = Config::try_from(&SpotConfig::default())
            .context("Failed to serialize default configuration")?;

        let mut builder = Config::builder().add_source(defaults);

        if let Some(path) = path {
            info!("Loading configuration file: {:?}", path);
            builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(true));
        } else {
            debug!("No configuration file given, using defaults and environment");
        }

        let config: SpotConfig = builder
            .add_source(environment)
            .build()
            .context("Failed to build configuration")?
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        config.validate()?;
        Ok(config)
    }

    /// Reject settings the engine cannot act on
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for denom in &self.pool_creation.whitelisted_assets {
            if denom.trim().is_empty() {
                bail!("whitelisted asset denoms must not be empty");
            }
            if !seen.insert(denom) {
                bail!("duplicate whitelisted asset: {denom}");
            }
        }

        let mut fee_denoms = HashSet::new();
        for fee in &self.pool_creation.creation_fee {
            if fee.amount == 0 {
                bail!("pool creation fee for {} must be positive", fee.denom);
            }
            if !fee_denoms.insert(&fee.denom) {
                bail!("duplicate pool creation fee denom: {}", fee.denom);
            }
        }

        if !self.pool_creation.creation_fee.is_empty() && self.pool_creation.fee_collector.is_empty() {
            bail!("a fee collector is required when a pool creation fee is set");
        }

        Ok(())
    }
}
