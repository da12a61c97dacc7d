//! Engine Configuration Module
//!
//! Loads the engine's deployment settings from a TOML file with `ARB__`
//! environment overrides layered on top.

use anyhow::{bail, Context, Result};
use config_crate::{Config, Environment, File};
use ethers_core::types::Address;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info};

use crate::defaults;

/// Main engine configuration structure
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct EngineConfig {
    /// Deployed engine identity
    pub engine: EngineSettings,

    /// Profit settlement and relay payment
    #[serde(default)]
    pub settlement: SettlementSettings,

    /// Flash lenders in funding-index order (index 1 is the first entry)
    #[serde(default)]
    pub lenders: Vec<LenderSettings>,

    /// DEX registry source
    #[serde(default)]
    pub registry: RegistrySettings,

    #[serde(default)]
    pub logging: LoggingSettings,
}

/// Engine identity
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct EngineSettings {
    /// Account holding intermediate balances during execution
    pub address: Address,
    /// Only account allowed to trigger executions
    pub owner: Address,
    #[serde(default)]
    pub chain_id: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SettlementSettings {
    /// Relay paid in native currency, if any
    pub relay: Option<Address>,
    #[serde(default = "default_relay_share_bps")]
    pub relay_share_bps: u32,
    /// Wrapped native token; required for profit-share relay payments
    pub wrapped_native: Option<Address>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LenderSettings {
    pub name: String,
    pub address: Address,
    #[serde(default = "default_lender_fee_bps")]
    pub fee_bps: u32,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct RegistrySettings {
    /// JSON registry file; the built-in table is used when absent
    pub path: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingSettings {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

fn default_relay_share_bps() -> u32 {
    defaults::settlement::RELAY_SHARE_BPS
}

fn default_lender_fee_bps() -> u32 {
    defaults::lenders::DEFAULT_FEE_BPS
}

fn default_log_level() -> String {
    defaults::logging::LEVEL.to_string()
}

impl Default for SettlementSettings {
    fn default() -> Self {
        Self {
            relay: None,
            relay_share_bps: default_relay_share_bps(),
            wrapped_native: None,
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl EngineConfig {
    /// Load configuration from a file with environment overrides
    pub fn load(path: &Path) -> Result<Self> {
        info!("Loading engine config: {:?}", path);

        let config = Config::builder()
            .add_source(File::from(path).required(true))
            .add_source(
                Environment::with_prefix(defaults::env::PREFIX)
                    .prefix_separator(defaults::env::SEPARATOR)
                    .separator(defaults::env::SEPARATOR)
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        let mut engine_config: Self = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;
        engine_config.expand_env_vars()?;
        engine_config.validate()?;

        debug!(
            lenders = engine_config.lenders.len(),
            relay = ?engine_config.settlement.relay,
            "Engine config loaded"
        );
        Ok(engine_config)
    }

    /// Parse a TOML document without environment overrides
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let mut engine_config: Self =
            toml::from_str(content).context("Failed to parse engine config")?;
        engine_config.expand_env_vars()?;
        engine_config.validate()?;
        Ok(engine_config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config to {:?}", path))?;
        Ok(())
    }

    /// Expand environment variables in path values
    pub fn expand_env_vars(&mut self) -> Result<()> {
        if let Some(path) = &self.registry.path {
            let expanded = shellexpand::env(path).context("Failed to expand registry path")?;
            self.registry.path = Some(expanded.to_string());
        }
        Ok(())
    }

    /// Lender for a funding index (`0` is the flash swap, `k >= 1` is lender `k - 1`)
    pub fn lender_for_index(&self, funding_index: u8) -> Option<&LenderSettings> {
        let index = usize::from(funding_index).checked_sub(1)?;
        self.lenders.get(index)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.engine.address.is_zero() {
            bail!("engine.address must be set");
        }
        if self.engine.owner.is_zero() {
            bail!("engine.owner must be set");
        }
        if self.settlement.relay_share_bps > defaults::settlement::MAX_BPS {
            bail!(
                "settlement.relay_share_bps {} exceeds {}",
                self.settlement.relay_share_bps,
                defaults::settlement::MAX_BPS
            );
        }
        if self.settlement.relay_share_bps > 0 {
            if self.settlement.relay.is_none() {
                bail!("settlement.relay_share_bps requires settlement.relay");
            }
            if self.settlement.wrapped_native.is_none() {
                bail!("settlement.relay_share_bps requires settlement.wrapped_native");
            }
        }
        if self.lenders.len() >= usize::from(u8::MAX) {
            bail!("At most {} lenders are addressable", u8::MAX - 1);
        }

        let mut seen = HashSet::new();
        for lender in &self.lenders {
            if lender.address.is_zero() {
                bail!("Lender {} has no address", lender.name);
            }
            if lender.fee_bps > defaults::settlement::MAX_BPS {
                bail!("Lender {} fee {} bps is out of range", lender.name, lender.fee_bps);
            }
            if !seen.insert(lender.address) {
                bail!("Lender {:?} is listed twice", lender.address);
            }
        }
        Ok(())
    }
}

/// Convenience function to load configuration from a path with `~`/`$VAR` expansion
pub fn load_config(path: &str) -> Result<EngineConfig> {
    let expanded = shellexpand::full(path).context("Failed to expand config path")?;
    EngineConfig::load(Path::new(expanded.as_ref()))
}
