//! # Arbitrage Orchestrator - Atomic Hop-Chain Execution
//!
//! ## Purpose
//!
//! Runs one arbitrage attempt from validated input to disbursed profit, or to no
//! effect at all. Every entry point takes a host checkpoint first and reverts to
//! it on any error, so a failed attempt leaves balances, pools and the event log
//! exactly as they were.
//!
//! ## State Machine
//!
//! ```text
//! Init ──▶ Funding ──▶ Hopping(0) ──▶ … ──▶ Hopping(n-1) ──▶ Closing ──▶ Settling ──▶ Done
//!   │         │            │                     │              │           │
//!   └─────────┴────────────┴──────── Reverted ◀──┴──────────────┴───────────┘
//! ```
//!
//! - **Init**: argument shapes, registry lookups, hop continuity, closed chain
//! - **Funding**: flash swap against hop 0's pool, flash loan from a configured
//!   lender, or the engine's own balance
//! - **Hopping(i)**: `amount_in(i) = amount_out(i-1)`; failures become `HopFailed(i)`
//! - **Closing**: repay `principal + fee` to the lender inside its callback
//! - **Settling**: `net = gross_out - (principal + fee)`; `net <= 0` is `Unprofitable`
//!
//! ## Funding Index
//!
//! `0` borrows from the first hop's pool (constant-product or concentrated
//! pools only); `k >= 1` borrows from the k-th configured lender.

use crate::adapters::{ConcentratedAdapter, Observation, PoolAdapter, SwapRequest};
use crate::callback::FlashBorrowCallback;
use crate::error::EngineError;
use crate::registry::DexRegistry;
use crate::settlement::{ProfitSettlement, SettlementReceipt};
use crate::{log_error, log_execution, log_profit, log_success, log_warning};
use arb_types::{
    Address, BorrowTicket, ChainError, ContractCall, CurveStableKind, EventSignature,
    FundingSource, Hop, HopChain, Host, PoolReference, ProfitResult, ProtocolVariant, U256,
};
use std::fmt;
use tracing::{debug, info_span, trace};

/// Registry key used by the optimized two-hop entry points for V2 pools
pub const OPTIMIZED_V2_KEY: &str = "UNISWAP_V2";
/// Registry key used by the optimized two-hop entry points for V3 pools
pub const OPTIMIZED_V3_KEY: &str = "UNISWAP_V3";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Init,
    Funding,
    Hopping(usize),
    Closing,
    Settling,
    Done,
    Reverted,
}

impl Phase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Reverted)
    }

    pub fn can_advance_to(&self, next: Phase) -> bool {
        match (*self, next) {
            (from, Self::Reverted) => !from.is_terminal(),
            (Self::Init, Self::Funding) => true,
            (Self::Funding, Self::Hopping(0)) => true,
            (Self::Hopping(i), Self::Hopping(j)) => j == i + 1,
            (Self::Hopping(_), Self::Closing) => true,
            (Self::Closing, Self::Settling) => true,
            (Self::Settling, Self::Done) => true,
            _ => false,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hopping(i) => write!(f, "Hopping({})", i),
            other => write!(f, "{:?}", other),
        }
    }
}

/// One executed hop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HopRecord {
    pub index: usize,
    pub pool: Address,
    pub token_in: Address,
    pub token_out: Address,
    pub amount_in: U256,
    pub amount_out: U256,
}

/// What one execution went through
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionReport {
    pub phases: Vec<Phase>,
    pub hops: Vec<HopRecord>,
    pub ticket: Option<BorrowTicket>,
    pub profit: Option<ProfitResult>,
    pub settlement: Option<SettlementReceipt>,
}

impl ExecutionReport {
    pub fn new() -> Self {
        Self {
            phases: vec![Phase::Init],
            ..Self::default()
        }
    }

    pub fn phase(&self) -> Phase {
        self.phases.last().copied().unwrap_or(Phase::Init)
    }

    pub(crate) fn advance(&mut self, next: Phase) {
        trace!(from = %self.phase(), to = %next, "Phase transition");
        self.phases.push(next);
    }

    /// Every recorded transition is one the state machine allows
    pub fn is_well_formed(&self) -> bool {
        self.phases.first() == Some(&Phase::Init)
            && self.phases.windows(2).all(|w| w[0].can_advance_to(w[1]))
    }
}

/// Run `hops[first..]`, feeding each hop's realized output into the next
pub(crate) fn run_hops(
    host: &mut dyn Host,
    executor: Address,
    hops: &[Hop],
    first: usize,
    amount_in: U256,
    report: &mut ExecutionReport,
) -> Result<U256, EngineError> {
    let mut amount = amount_in;
    for (index, hop) in hops.iter().enumerate().skip(first) {
        report.advance(Phase::Hopping(index));
        let adapter = PoolAdapter::for_protocol(hop.pool.protocol);
        let request = SwapRequest::internal(
            hop.pool.address,
            executor,
            hop.token_in,
            hop.token_out,
            amount,
        );
        let outcome = adapter
            .swap(host, &request)
            .map_err(|e| EngineError::hop_failed(index, e))?;

        debug!(
            index,
            pool = ?hop.pool.address,
            protocol = %hop.pool.protocol,
            amount_in = %amount,
            amount_out = %outcome.amount_out,
            "Hop complete"
        );
        report.hops.push(HopRecord {
            index,
            pool: hop.pool.address,
            token_in: hop.token_in,
            token_out: hop.token_out,
            amount_in: amount,
            amount_out: outcome.amount_out,
        });
        amount = outcome.amount_out;
    }
    Ok(amount)
}

/// Single-pool swap issued through the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirectSwap {
    pub pool: Address,
    /// Holder of `token_in`; must have approved the engine unless it is the engine
    pub sender: Address,
    pub recipient: Address,
    pub token_in: Address,
    pub token_out: Address,
    pub amount_in: U256,
}

/// Two-pool round trip for the optimized entry points
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TwoPoolRoute {
    pub amount_in: U256,
    /// Funds the attempt with a flash swap and performs hop 0
    pub pool_a: Address,
    pub pool_b: Address,
    pub token_in: Address,
    pub token_out: Address,
}

/// The arbitrage contract: owner, lenders, relay and the registry it routes with
#[derive(Debug, Clone)]
pub struct ArbitrageEngine<'r> {
    registry: &'r DexRegistry,
    address: Address,
    owner: Address,
    lenders: Vec<Address>,
    relay: Option<Address>,
    settlement: ProfitSettlement,
}

impl<'r> ArbitrageEngine<'r> {
    pub fn new(registry: &'r DexRegistry, address: Address, owner: Address) -> Self {
        Self {
            registry,
            address,
            owner,
            lenders: Vec::new(),
            relay: None,
            settlement: ProfitSettlement::default(),
        }
    }

    /// Lender `k` is selected by funding index `k + 1`
    pub fn with_lenders(mut self, lenders: Vec<Address>) -> Self {
        self.lenders = lenders;
        self
    }

    pub fn with_relay(mut self, relay: Address, relay_share_bps: u32) -> Self {
        self.relay = Some(relay);
        self.settlement.relay_share_bps = relay_share_bps;
        self
    }

    pub fn with_wrapped_native(mut self, token: Address) -> Self {
        self.settlement.wrapped_native = Some(token);
        self
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn owner(&self) -> Address {
        self.owner
    }

    pub fn relay(&self) -> Option<Address> {
        self.relay
    }

    pub fn lenders(&self) -> &[Address] {
        &self.lenders
    }

    pub fn registry(&self) -> &DexRegistry {
        self.registry
    }

    pub fn settlement(&self) -> &ProfitSettlement {
        &self.settlement
    }

    fn authorize(&self, caller: Address) -> Result<(), EngineError> {
        if caller != self.owner {
            return Err(EngineError::Unauthorized(caller));
        }
        Ok(())
    }

    /// Validate the parallel argument arrays and resolve each protocol id
    pub fn build_chain(
        &self,
        ids: &[u8],
        pools: &[Address],
        tokens: &[Address],
    ) -> Result<HopChain, EngineError> {
        if pools.len() != ids.len() {
            return Err(ChainError::Shape(format!(
                "{} protocol ids but {} pools",
                ids.len(),
                pools.len()
            ))
            .into());
        }
        if tokens.len() != ids.len() + 1 {
            return Err(ChainError::Shape(format!(
                "{} hops need {} tokens, got {}",
                ids.len(),
                ids.len() + 1,
                tokens.len()
            ))
            .into());
        }

        let references = ids
            .iter()
            .zip(pools)
            .map(|(id, pool)| Ok(PoolReference::new(*pool, self.registry.protocol_of(*id)?)))
            .collect::<Result<Vec<_>, EngineError>>()?;
        let chain = HopChain::from_parts(&references, tokens)?;
        chain.ensure_closed()?;
        Ok(chain)
    }

    /// Map a funding index onto a source for `chain`
    pub fn funding_source(
        &self,
        funding_index: u8,
        chain: &HopChain,
    ) -> Result<FundingSource, EngineError> {
        if funding_index == 0 {
            let first = chain.first();
            if !first.pool.protocol.supports_flash_swap() {
                return Err(EngineError::unsupported(
                    first.pool.address,
                    format!("{} pools cannot fund a flash swap", first.pool.protocol),
                ));
            }
            return Ok(FundingSource::FlashSwap {
                pool: first.pool.address,
            });
        }
        self.lenders
            .get(usize::from(funding_index) - 1)
            .map(|&lender| FundingSource::FlashLoan { lender })
            .ok_or(EngineError::UnknownFundingSource(funding_index))
    }

    /// Flash-funded arbitrage over `tokens[0] → … → tokens[n]` through `pools`
    #[allow(clippy::too_many_arguments)]
    pub fn multi_hop_arbitrage(
        &self,
        host: &mut dyn Host,
        caller: Address,
        funding_index: u8,
        amount_in: U256,
        ids: &[u8],
        pools: &[Address],
        tokens: &[Address],
        attached_value: U256,
    ) -> Result<ExecutionReport, EngineError> {
        self.authorize(caller)?;
        let chain = self.build_chain(ids, pools, tokens)?;
        let source = self.funding_source(funding_index, &chain)?;
        self.execute_chain(host, caller, &chain, source, amount_in, attached_value)
    }

    /// Same route, paid for out of the engine's own balance
    #[allow(clippy::too_many_arguments)]
    pub fn multi_hop_arbitrage_prefunded(
        &self,
        host: &mut dyn Host,
        caller: Address,
        amount_in: U256,
        ids: &[u8],
        pools: &[Address],
        tokens: &[Address],
        attached_value: U256,
    ) -> Result<ExecutionReport, EngineError> {
        self.authorize(caller)?;
        let chain = self.build_chain(ids, pools, tokens)?;
        self.execute_chain(
            host,
            caller,
            &chain,
            FundingSource::Prefunded,
            amount_in,
            attached_value,
        )
    }

    pub fn optimized_v2_v2(
        &self,
        host: &mut dyn Host,
        caller: Address,
        route: TwoPoolRoute,
    ) -> Result<ExecutionReport, EngineError> {
        self.optimized(host, caller, route, OPTIMIZED_V2_KEY, OPTIMIZED_V2_KEY)
    }

    pub fn optimized_v2_v3(
        &self,
        host: &mut dyn Host,
        caller: Address,
        route: TwoPoolRoute,
    ) -> Result<ExecutionReport, EngineError> {
        self.optimized(host, caller, route, OPTIMIZED_V2_KEY, OPTIMIZED_V3_KEY)
    }

    pub fn optimized_v3_v2(
        &self,
        host: &mut dyn Host,
        caller: Address,
        route: TwoPoolRoute,
    ) -> Result<ExecutionReport, EngineError> {
        self.optimized(host, caller, route, OPTIMIZED_V3_KEY, OPTIMIZED_V2_KEY)
    }

    pub fn optimized_v3_v3(
        &self,
        host: &mut dyn Host,
        caller: Address,
        route: TwoPoolRoute,
    ) -> Result<ExecutionReport, EngineError> {
        self.optimized(host, caller, route, OPTIMIZED_V3_KEY, OPTIMIZED_V3_KEY)
    }

    fn optimized(
        &self,
        host: &mut dyn Host,
        caller: Address,
        route: TwoPoolRoute,
        key_a: &str,
        key_b: &str,
    ) -> Result<ExecutionReport, EngineError> {
        self.authorize(caller)?;
        let protocol_a = self.registry.entry(key_a)?.protocol;
        let protocol_b = self.registry.entry(key_b)?.protocol;
        let chain = HopChain::new(vec![
            Hop::new(
                PoolReference::new(route.pool_a, protocol_a),
                route.token_in,
                route.token_out,
            ),
            Hop::new(
                PoolReference::new(route.pool_b, protocol_b),
                route.token_out,
                route.token_in,
            ),
        ])?;
        let source = self.funding_source(0, &chain)?;
        self.execute_chain(host, caller, &chain, source, route.amount_in, U256::zero())
    }

    /// Execute a validated chain; the caller has already been authorized
    pub fn execute_chain(
        &self,
        host: &mut dyn Host,
        caller: Address,
        chain: &HopChain,
        source: FundingSource,
        amount_in: U256,
        attached_value: U256,
    ) -> Result<ExecutionReport, EngineError> {
        chain.ensure_closed()?;
        let span = info_span!(
            "arbitrage",
            engine = ?self.address,
            hops = chain.len(),
            source = ?source,
        );
        let _guard = span.enter();
        log_execution!(
            "Executing {}-hop chain, {} of {:?}",
            chain.len(),
            amount_in,
            chain.start_token()
        );

        let mut report = ExecutionReport::new();
        let result = self.atomically(host, |host| {
            self.run_chain(host, caller, chain, source, amount_in, attached_value, &mut report)
        });

        match result {
            Ok(()) => {
                log_success!(
                    "Arbitrage settled: net {}",
                    report.profit.map(|p| p.net.to_string()).unwrap_or_default()
                );
                Ok(report)
            }
            Err(err) => {
                report.advance(Phase::Reverted);
                log_warning!("Execution reverted after {:?}", report.phases);
                Err(err)
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn run_chain(
        &self,
        host: &mut dyn Host,
        caller: Address,
        chain: &HopChain,
        source: FundingSource,
        amount_in: U256,
        attached_value: U256,
        report: &mut ExecutionReport,
    ) -> Result<(), EngineError> {
        if !attached_value.is_zero() {
            host.send_native(caller, self.address, attached_value)?;
        }
        report.advance(Phase::Funding);
        let token = chain.start_token();

        let (ticket, gross_out) = match source {
            FundingSource::Prefunded => {
                let gross_out = run_hops(host, self.address, chain.hops(), 0, amount_in, report)?;
                report.advance(Phase::Closing);
                let ticket = BorrowTicket::new(source, token, amount_in, U256::zero());
                (ticket, gross_out)
            }
            FundingSource::FlashSwap { pool } => {
                self.borrow_by_flash_swap(host, chain, pool, amount_in, report)?
            }
            FundingSource::FlashLoan { lender } => {
                self.borrow_by_flash_loan(host, chain, lender, amount_in, report)?
            }
        };
        report.ticket = Some(ticket);

        report.advance(Phase::Settling);
        let owed = ticket.repayment().ok_or(EngineError::RepaymentShortfall {
            owed: U256::MAX,
            available: gross_out,
        })?;
        let profit = ProfitResult::compute(gross_out, owed);
        report.profit = Some(profit);
        log_profit!("Gross {} against {} owed, net {}", gross_out, owed, profit.net);

        let receipt = self.settlement.settle(
            host,
            self.address,
            token,
            &profit,
            self.relay,
            self.owner,
            self.settlement.share_for(attached_value),
        )?;
        report.settlement = Some(receipt);
        report.advance(Phase::Done);
        Ok(())
    }

    /// Borrow hop 0's output from its own pool; the rest of the chain runs in
    /// the pool's callback
    fn borrow_by_flash_swap(
        &self,
        host: &mut dyn Host,
        chain: &HopChain,
        pool: Address,
        amount_in: U256,
        report: &mut ExecutionReport,
    ) -> Result<(BorrowTicket, U256), EngineError> {
        let first = chain.first();
        let data = borrow_context(chain);
        let zero_quote = || {
            EngineError::hop_failed(0, EngineError::insufficient_output(pool, "zero quoted output"))
        };
        let call = match PoolAdapter::for_protocol(first.pool.protocol) {
            PoolAdapter::ConstantProduct(adapter) => {
                let quote = adapter
                    .quote(host, self.address, pool, first.token_in, first.token_out, amount_in)
                    .map_err(|e| EngineError::hop_failed(0, e))?;
                if quote.amount_out.is_zero() {
                    return Err(zero_quote());
                }
                adapter.swap_call(&quote, self.address, data)
            }
            PoolAdapter::Concentrated(adapter) => {
                let quote = adapter
                    .quote(host, self.address, pool, first.token_in, first.token_out, amount_in)
                    .map_err(|e| EngineError::hop_failed(0, e))?;
                if quote.amount_out.is_zero() {
                    return Err(zero_quote());
                }
                ConcentratedAdapter::swap_call(&quote, self.address, amount_in, data)
            }
            other => {
                return Err(EngineError::unsupported(
                    pool,
                    format!("{} pools cannot fund a flash swap", other.protocol()),
                ))
            }
        };

        let log_mark = host.logs().len();
        let observation =
            Observation::start(host, pool, first.token_out, self.address, EventSignature::Swap);
        let mut callback = FlashBorrowCallback::new(
            self.address,
            FundingSource::FlashSwap { pool },
            first.token_in,
            amount_in,
            chain.hops(),
            report,
        )
        .with_borrow_observation(observation);
        let result = host.call(self.address, pool, call, &mut callback);
        let closed = callback.conclude(result)?;

        let settled = host
            .logs()
            .get(log_mark..)
            .unwrap_or_default()
            .iter()
            .any(|log| log.emitter == pool && log.signature() == EventSignature::Swap);
        if !settled {
            return Err(EngineError::hop_failed(
                0,
                EngineError::insufficient_output(pool, "no Swap event"),
            ));
        }
        Ok((closed.ticket, closed.gross_out))
    }

    fn borrow_by_flash_loan(
        &self,
        host: &mut dyn Host,
        chain: &HopChain,
        lender: Address,
        amount_in: U256,
        report: &mut ExecutionReport,
    ) -> Result<(BorrowTicket, U256), EngineError> {
        let token = chain.start_token();
        let call = ContractCall::FlashLoan {
            receiver: self.address,
            token,
            amount: amount_in,
            data: borrow_context(chain),
        };
        let mut callback = FlashBorrowCallback::new(
            self.address,
            FundingSource::FlashLoan { lender },
            token,
            amount_in,
            chain.hops(),
            report,
        );
        let result = host.call(self.address, lender, call, &mut callback);
        let closed = callback.conclude(result)?;
        Ok((closed.ticket, closed.gross_out))
    }

    /// Swap through one pool of the given protocol, atomically
    pub fn swap_via(
        &self,
        host: &mut dyn Host,
        caller: Address,
        protocol: ProtocolVariant,
        swap: DirectSwap,
    ) -> Result<U256, EngineError> {
        self.authorize(caller)?;
        if swap.token_in == swap.token_out {
            return Err(ChainError::SelfSwap {
                index: 0,
                token: swap.token_in,
            }
            .into());
        }
        let adapter = PoolAdapter::for_protocol(protocol);
        let request = SwapRequest {
            pool: swap.pool,
            executor: self.address,
            payer: swap.sender,
            recipient: swap.recipient,
            token_in: swap.token_in,
            token_out: swap.token_out,
            amount_in: swap.amount_in,
        };
        self.atomically(host, |host| {
            adapter
                .swap(host, &request)
                .map(|outcome| outcome.amount_out)
        })
    }

    pub fn uniswap_v2_swap(
        &self,
        host: &mut dyn Host,
        caller: Address,
        swap: DirectSwap,
    ) -> Result<U256, EngineError> {
        let protocol = self.registry.entry("UNISWAP_V2")?.protocol;
        self.swap_via(host, caller, protocol, swap)
    }

    pub fn bakery_swap(
        &self,
        host: &mut dyn Host,
        caller: Address,
        swap: DirectSwap,
    ) -> Result<U256, EngineError> {
        let protocol = self.registry.entry("BAKERYSWAP")?.protocol;
        self.swap_via(host, caller, protocol, swap)
    }

    pub fn uniswap_v3_swap(
        &self,
        host: &mut dyn Host,
        caller: Address,
        swap: DirectSwap,
    ) -> Result<U256, EngineError> {
        let protocol = self.registry.entry("UNISWAP_V3")?.protocol;
        self.swap_via(host, caller, protocol, swap)
    }

    pub fn curve_stable_swap(
        &self,
        host: &mut dyn Host,
        caller: Address,
        kind: CurveStableKind,
        swap: DirectSwap,
    ) -> Result<U256, EngineError> {
        self.swap_via(host, caller, ProtocolVariant::CurveStable { kind }, swap)
    }

    pub fn curve_crypto_swap(
        &self,
        host: &mut dyn Host,
        caller: Address,
        swap: DirectSwap,
    ) -> Result<U256, EngineError> {
        self.swap_via(host, caller, ProtocolVariant::CurveCrypto, swap)
    }

    /// Pay the relay `value` (attached by the caller), reimburse the caller from
    /// wrapped-native profit and sweep the rest to the owner
    pub fn withdraw_profit_with_relay(
        &self,
        host: &mut dyn Host,
        caller: Address,
        value: U256,
    ) -> Result<SettlementReceipt, EngineError> {
        self.authorize(caller)?;
        let relay = self.relay.ok_or_else(|| EngineError::SettlementTransferFailed {
            recipient: Address::zero(),
            reason: "no relay configured".into(),
        })?;
        self.atomically(host, |host| {
            if !value.is_zero() {
                host.send_native(caller, self.address, value)?;
            }
            self.settlement
                .withdraw_profit_with_relay(host, self.address, caller, self.owner, relay, value)
        })
    }

    /// Run `f` inside a host checkpoint; keep its effects only if it succeeds
    fn atomically<T>(
        &self,
        host: &mut dyn Host,
        f: impl FnOnce(&mut dyn Host) -> Result<T, EngineError>,
    ) -> Result<T, EngineError> {
        let checkpoint = host.checkpoint();
        match f(host) {
            Ok(value) => {
                host.commit(checkpoint)?;
                Ok(value)
            }
            Err(err) => {
                log_error!("Reverting: {}", err);
                host.revert_to(checkpoint)?;
                Err(err)
            }
        }
    }
}

/// Opaque borrow data: hop count followed by the token path
fn borrow_context(chain: &HopChain) -> Vec<u8> {
    let path = chain.token_path();
    let mut data = Vec::with_capacity(1 + path.len() * 20);
    data.push(chain.len().min(u8::MAX as usize) as u8);
    for token in path {
        data.extend_from_slice(token.as_bytes());
    }
    trace!(data = %hex::encode(&data), "Borrow context");
    data
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(n: u64) -> Address {
        Address::from_low_u64_be(n)
    }

    #[test]
    fn test_phase_transitions() {
        assert!(Phase::Init.can_advance_to(Phase::Funding));
        assert!(Phase::Funding.can_advance_to(Phase::Hopping(0)));
        assert!(Phase::Hopping(0).can_advance_to(Phase::Hopping(1)));
        assert!(!Phase::Hopping(0).can_advance_to(Phase::Hopping(2)));
        assert!(Phase::Hopping(3).can_advance_to(Phase::Closing));
        assert!(!Phase::Funding.can_advance_to(Phase::Settling));
        assert!(!Phase::Init.can_advance_to(Phase::Done));

        for phase in [
            Phase::Init,
            Phase::Funding,
            Phase::Hopping(4),
            Phase::Closing,
            Phase::Settling,
        ] {
            assert!(phase.can_advance_to(Phase::Reverted));
        }
        assert!(!Phase::Done.can_advance_to(Phase::Reverted));
        assert!(!Phase::Reverted.can_advance_to(Phase::Reverted));
    }

    #[test]
    fn test_report_well_formed() {
        let mut report = ExecutionReport::new();
        for phase in [
            Phase::Funding,
            Phase::Hopping(0),
            Phase::Hopping(1),
            Phase::Closing,
            Phase::Settling,
            Phase::Done,
        ] {
            report.advance(phase);
        }
        assert!(report.is_well_formed());

        report.advance(Phase::Funding);
        assert!(!report.is_well_formed());
    }

    #[test]
    fn test_build_chain_shape_checks() {
        let registry = DexRegistry::builtin().unwrap();
        let engine = ArbitrageEngine::new(&registry, addr(100), addr(101));
        let v2 = registry.id_of("UNISWAP_V2").unwrap();
        let v3 = registry.id_of("UNISWAP_V3").unwrap();

        let err = engine
            .build_chain(&[v2, v3], &[addr(1)], &[addr(10), addr(11), addr(10)])
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidChain(ChainError::Shape(_))));

        let err = engine
            .build_chain(&[v2, v3], &[addr(1), addr(2)], &[addr(10), addr(11)])
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidChain(ChainError::Shape(_))));

        let err = engine
            .build_chain(&[v2, v3], &[addr(1), addr(2)], &[addr(10), addr(11), addr(12)])
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidChain(ChainError::NotClosed { .. })));

        let err = engine
            .build_chain(&[v2, 200], &[addr(1), addr(2)], &[addr(10), addr(11), addr(10)])
            .unwrap_err();
        assert!(matches!(err, EngineError::UnknownProtocol(_)));

        let chain = engine
            .build_chain(&[v2, v3], &[addr(1), addr(2)], &[addr(10), addr(11), addr(10)])
            .unwrap();
        assert_eq!(chain.token_path(), vec![addr(10), addr(11), addr(10)]);
    }

    #[test]
    fn test_funding_source_selection() {
        let registry = DexRegistry::builtin().unwrap();
        let engine = ArbitrageEngine::new(&registry, addr(100), addr(101))
            .with_lenders(vec![addr(50), addr(51)]);
        let v2 = registry.id_of("UNISWAP_V2").unwrap();
        let curve = registry.id_of("CURVE_STABLE_SWAP_NG_PLAIN").unwrap();
        let chain = engine
            .build_chain(&[v2, v2], &[addr(1), addr(2)], &[addr(10), addr(11), addr(10)])
            .unwrap();

        assert_eq!(
            engine.funding_source(0, &chain).unwrap(),
            FundingSource::FlashSwap { pool: addr(1) }
        );
        assert_eq!(
            engine.funding_source(2, &chain).unwrap(),
            FundingSource::FlashLoan { lender: addr(51) }
        );
        assert_eq!(
            engine.funding_source(3, &chain).unwrap_err(),
            EngineError::UnknownFundingSource(3)
        );

        let curve_first = engine
            .build_chain(&[curve, v2], &[addr(1), addr(2)], &[addr(10), addr(11), addr(10)])
            .unwrap();
        assert!(matches!(
            engine.funding_source(0, &curve_first),
            Err(EngineError::UnsupportedProtocol { .. })
        ));
    }

    #[test]
    fn test_borrow_context_encodes_path() {
        let registry = DexRegistry::builtin().unwrap();
        let engine = ArbitrageEngine::new(&registry, addr(100), addr(101));
        let v2 = registry.id_of("UNISWAP_V2").unwrap();
        let chain = engine
            .build_chain(&[v2, v2], &[addr(1), addr(2)], &[addr(10), addr(11), addr(10)])
            .unwrap();
        let data = borrow_context(&chain);
        assert_eq!(data.len(), 1 + 3 * 20);
        assert_eq!(data[0], 2);
    }
}
