//! Engine construction from [`EngineConfig`]
//!
//! The configuration crate owns parsing and validation; this module turns a
//! validated config into the registry and the engine that borrows it.

use crate::orchestrator::ArbitrageEngine;
use crate::registry::DexRegistry;
use anyhow::{Context, Result};
use arb_config::EngineConfig;
use std::path::Path;
use tracing::info;

/// Registry from `registry.path`, or the built-in table when unset
pub fn load_registry(config: &EngineConfig) -> Result<DexRegistry> {
    let registry = match &config.registry.path {
        Some(path) => DexRegistry::from_path(Path::new(path))
            .with_context(|| format!("Failed to load DEX registry from {}", path))?,
        None => DexRegistry::builtin().context("Built-in DEX registry is invalid")?,
    };
    info!(protocols = registry.len(), "DEX registry ready");
    Ok(registry)
}

/// Engine wired with the configured owner, lenders and settlement accounts
pub fn build_engine<'r>(config: &EngineConfig, registry: &'r DexRegistry) -> ArbitrageEngine<'r> {
    let mut engine = ArbitrageEngine::new(registry, config.engine.address, config.engine.owner)
        .with_lenders(config.lenders.iter().map(|l| l.address).collect());

    if let Some(relay) = config.settlement.relay {
        engine = engine.with_relay(relay, config.settlement.relay_share_bps);
    }
    if let Some(token) = config.settlement.wrapped_native {
        engine = engine.with_wrapped_native(token);
    }
    engine
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    const CONFIG: &str = r#"
[engine]
address = "0x00000000000000000000000000000000000000e0"
owner = "0x00000000000000000000000000000000000000a0"
chain_id = 56

[settlement]
relay = "0x00000000000000000000000000000000000000b0"
relay_share_bps = 500
wrapped_native = "0x00000000000000000000000000000000000000c0"

[[lenders]]
name = "primary"
address = "0x00000000000000000000000000000000000000d0"
fee_bps = 9
"#;

    #[test]
    fn test_engine_from_config() {
        let config = EngineConfig::from_toml_str(CONFIG).unwrap();
        let registry = load_registry(&config).unwrap();
        let engine = build_engine(&config, &registry);

        assert_eq!(engine.owner(), config.engine.owner);
        assert_eq!(engine.lenders(), &[config.lenders[0].address]);
        assert_eq!(engine.relay(), config.settlement.relay);
        assert_eq!(engine.settlement().relay_share_bps, 500);
        assert_eq!(engine.settlement().wrapped_native, config.settlement.wrapped_native);
        assert_eq!(registry.len(), 28);
    }

    #[test]
    fn test_shipped_config_is_valid() {
        let content = include_str!("../config/engine.toml");
        let config = EngineConfig::from_toml_str(content).unwrap();
        let registry = load_registry(&config).unwrap();
        let engine = build_engine(&config, &registry);

        assert_eq!(config.engine.chain_id, 56);
        assert_eq!(engine.lenders().len(), 2);
        assert_eq!(config.lender_for_index(2).unwrap().fee_bps, 0);
    }

    #[test]
    fn test_registry_path_override() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("dex2id.json");
        fs::write(
            &path,
            r#"{ "PANCAKESWAP_V2": { "id": 1, "name": "PancakeSwap V2",
                 "protocol": { "family": "constant_product", "fee_bps": 25 } } }"#,
        )
        .unwrap();

        let mut config = EngineConfig::from_toml_str(CONFIG).unwrap();
        config.registry.path = Some(path.to_string_lossy().into_owned());
        let registry = load_registry(&config).unwrap();
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.id_of("PANCAKESWAP_V2").unwrap(), 1);

        config.registry.path = Some(dir.path().join("missing.json").to_string_lossy().into_owned());
        assert!(load_registry(&config).is_err());
    }
}
