//! # Arbitrage Engine Configuration
//!
//! Layered configuration for the flash arbitrage engine: a TOML file with
//! `ARB__SECTION__KEY` environment overrides on top.
//!
//! ## Features
//!
//! - **Engine identity**: engine account, owner, chain id
//! - **Settlement**: relay account, relay profit share, wrapped native token
//! - **Lenders**: flash lenders addressed by funding index
//! - **Registry**: optional JSON DEX registry path (env vars expanded)
//!
//! ## Usage
//!
//! ```no_run
//! use arb_config::load_config;
//!
//! let config = load_config("config/engine.toml")?;
//! println!("owner: {:?}", config.engine.owner);
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod defaults;
pub mod engine_config;

// Re-export commonly used types
pub use engine_config::{
    load_config, EngineConfig, EngineSettings, LenderSettings, LoggingSettings,
    RegistrySettings, SettlementSettings,
};
