//! In-memory demonstration market for the `demo` subcommand
//!
//! Deploys one constant-product pair and one concentrated pool quoting the same
//! WETH/USD price, moves the pair's price with a whale trade, then runs the
//! optimized V2→V3 round trip funded by a flash swap from the pair.

use crate::adapters::{PoolAdapter, SwapRequest};
use crate::config::build_engine;
use crate::orchestrator::{ExecutionReport, TwoPoolRoute};
use crate::registry::DexRegistry;
use crate::{log_execution, log_pool};
use anyhow::{Context, Result};
use arb_config::EngineConfig;
use arb_types::{Address, ConcentratedFlavor, Host, ProtocolVariant, TokenHandle, U256};
use chain_sim::{ConcentratedPool, ConstantProductPair, FeeRelay, InMemoryChain, WrappedNative};

const USD: u64 = 0x05d0;
const PAIR: u64 = 0x0a01;
const POOL: u64 = 0x0a02;
const WHALE: u64 = 0x0b01;

/// WETH reserves on each venue, whole tokens
const WETH_DEPTH: u64 = 1_000;
/// USD per WETH before the whale trade
const PRICE: u64 = 2_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DemoOutcome {
    pub amount_in: U256,
    pub report: ExecutionReport,
    /// WETH the owner holds afterwards
    pub owner_balance: U256,
}

/// Settlement token when the config names none
fn default_weth() -> Address {
    Address::from_low_u64_be(0x0e7e)
}

/// Build the market, push the pair's WETH price up by roughly `gap_bps` and run
/// the optimized V2→V3 arbitrage
pub fn run(config: &EngineConfig, registry: &DexRegistry, gap_bps: u32) -> Result<DemoOutcome> {
    let weth = TokenHandle::new(config.settlement.wrapped_native.unwrap_or_else(default_weth), 18);
    let usd = TokenHandle::new(Address::from_low_u64_be(USD), 18);
    let (pair, pool, whale) = (
        Address::from_low_u64_be(PAIR),
        Address::from_low_u64_be(POOL),
        Address::from_low_u64_be(WHALE),
    );

    let v2 = registry.entry("UNISWAP_V2")?.protocol;
    let ProtocolVariant::ConstantProduct { fee_bps, .. } = v2 else {
        anyhow::bail!("UNISWAP_V2 is registered as {}", v2);
    };

    let mut chain = InMemoryChain::new();
    chain.deploy(weth.address, WrappedNative::new());
    chain.set_native(weth.address, weth.amount(WETH_DEPTH));
    if let Some(relay) = config.settlement.relay {
        chain.deploy(relay, FeeRelay::new());
    }
    chain.deploy(
        pair,
        ConstantProductPair::new(
            weth.address,
            usd.address,
            weth.amount(WETH_DEPTH),
            usd.amount(WETH_DEPTH * PRICE),
            fee_bps,
        ),
    );
    chain.deploy(
        pool,
        ConcentratedPool::with_reserves(
            ConcentratedFlavor::UniswapV3,
            weth.address,
            usd.address,
            weth.amount(WETH_DEPTH),
            usd.amount(WETH_DEPTH * PRICE),
            3_000,
        )
        .context("Failed to price the concentrated pool")?,
    );
    log_pool!("Market deployed: pair {:?}, pool {:?}", pair, pool);

    // Buying WETH with dy moves the pair's price by about 2·dy/y
    let push = usd.amount(WETH_DEPTH * PRICE) * U256::from(gap_bps) / U256::from(20_000u64);
    if !push.is_zero() {
        chain.mint(usd.address, whale, push);
        PoolAdapter::for_protocol(v2)
            .swap(
                &mut chain,
                &SwapRequest::internal(pair, whale, usd.address, weth.address, push),
            )
            .context("Whale trade failed")?;
        log_pool!("Whale bought WETH with {} USD units on the pair", push);
    }

    let engine = build_engine(config, registry);
    let amount_in = weth.sample_amount();
    log_execution!("Running optimized V2→V3 with {} wei", amount_in);
    let report = engine
        .optimized_v2_v3(
            &mut chain,
            engine.owner(),
            TwoPoolRoute {
                amount_in,
                pool_a: pair,
                pool_b: pool,
                token_in: weth.address,
                token_out: usd.address,
            },
        )
        .context("Arbitrage reverted")?;

    Ok(DemoOutcome {
        amount_in,
        owner_balance: chain.balance_of(weth.address, engine.owner()),
        report,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use crate::orchestrator::Phase;

    fn config() -> EngineConfig {
        EngineConfig::from_toml_str(
            r#"
[engine]
address = "0x00000000000000000000000000000000000000e0"
owner = "0x00000000000000000000000000000000000000a0"
chain_id = 56
"#,
        )
        .unwrap()
    }

    #[test]
    fn test_demo_is_profitable_after_perturbation() {
        let registry = DexRegistry::builtin().unwrap();
        let outcome = run(&config(), &registry, 150).unwrap();

        assert_eq!(outcome.report.phase(), Phase::Done);
        assert!(outcome.report.is_well_formed());
        let profit = outcome.report.profit.unwrap();
        assert!(profit.is_profitable());
        assert_eq!(outcome.owner_balance, profit.net_amount());
    }

    #[test]
    fn test_demo_without_gap_reverts() {
        let registry = DexRegistry::builtin().unwrap();
        let err = run(&config(), &registry, 0).unwrap_err();
        let engine_err = err.downcast_ref::<EngineError>().unwrap();
        assert!(matches!(
            engine_err.root_cause(),
            EngineError::RepaymentShortfall { .. } | EngineError::Unprofitable { .. }
        ));
    }
}
