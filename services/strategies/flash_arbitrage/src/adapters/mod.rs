//! # Pool Adapters - One Dispatch Point for Every Supported Pool Family
//!
//! ## Purpose
//!
//! Translate a generic swap intent (pool, token in, token out, amount, payer,
//! recipient) into the call shape the pool's protocol variant requires, and
//! report what actually arrived.
//!
//! ## Dispatch
//!
//! ```text
//! ProtocolVariant ──▶ PoolAdapter
//!   ConstantProduct{fee, shape}  ──▶ transfer in, swap(out0, out1, to[, data])
//!   Concentrated{flavor}         ──▶ fee()/globalState(), swap(..) + callback
//!   CurveStable{kind}            ──▶ index lookup, exchange / exchange_underlying
//!   CurveCrypto                  ──▶ coins(uint256), exchange(uint256, ..)
//! ```
//!
//! ## Outcome Rules
//!
//! - Realized output is the recipient's balance delta, never the quote
//! - Zero output or a missing settlement event is `InsufficientOutput`
//! - A call shape the pool does not implement is `UnsupportedProtocol`

mod concentrated;
mod constant_product;
mod curve_crypto;
mod curve_stable;

pub use concentrated::ConcentratedAdapter;
pub use constant_product::ConstantProductAdapter;
pub use curve_crypto::CurveCryptoAdapter;
pub use curve_stable::CurveStableAdapter;

use crate::error::EngineError;
use arb_types::{
    Address, CoinIndex, ContractCall, EventSignature, Host, ProtocolVariant, SwapOutcome, U256,
};
use rust_decimal::Decimal;
use tracing::trace;

/// Upper bound on coins queried when resolving Curve indices
pub(crate) const MAX_CURVE_COINS: usize = 8;

/// One swap through one pool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapRequest {
    pub pool: Address,
    /// Account issuing pool calls (the engine)
    pub executor: Address,
    /// Holder of `token_in`; the executor pulls from it when they differ
    pub payer: Address,
    pub recipient: Address,
    pub token_in: Address,
    pub token_out: Address,
    pub amount_in: U256,
}

impl SwapRequest {
    /// Executor pays and receives
    pub fn internal(
        pool: Address,
        executor: Address,
        token_in: Address,
        token_out: Address,
        amount_in: U256,
    ) -> Self {
        Self {
            pool,
            executor,
            payer: executor,
            recipient: executor,
            token_in,
            token_out,
            amount_in,
        }
    }
}

/// Expected output read from pool state; diagnostics only
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuoteHint {
    pub amount_out: U256,
    /// `token_out` per `token_in`, raw units
    pub spot_price: Option<Decimal>,
}

/// Closed set of adapters, one per protocol family
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolAdapter {
    ConstantProduct(ConstantProductAdapter),
    Concentrated(ConcentratedAdapter),
    CurveStable(CurveStableAdapter),
    CurveCrypto(CurveCryptoAdapter),
}

impl PoolAdapter {
    pub fn for_protocol(protocol: ProtocolVariant) -> Self {
        match protocol {
            ProtocolVariant::ConstantProduct { fee_bps, shape } => {
                Self::ConstantProduct(ConstantProductAdapter::new(fee_bps, shape))
            }
            ProtocolVariant::Concentrated { flavor } => {
                Self::Concentrated(ConcentratedAdapter::new(flavor))
            }
            ProtocolVariant::CurveStable { kind } => Self::CurveStable(CurveStableAdapter::new(kind)),
            ProtocolVariant::CurveCrypto => Self::CurveCrypto(CurveCryptoAdapter),
        }
    }

    pub fn protocol(&self) -> ProtocolVariant {
        match self {
            Self::ConstantProduct(a) => a.protocol(),
            Self::Concentrated(a) => a.protocol(),
            Self::CurveStable(a) => a.protocol(),
            Self::CurveCrypto(_) => ProtocolVariant::CurveCrypto,
        }
    }

    pub fn quote_hint(
        &self,
        host: &mut dyn Host,
        request: &SwapRequest,
    ) -> Result<QuoteHint, EngineError> {
        match self {
            Self::ConstantProduct(a) => a.quote_hint(host, request),
            Self::Concentrated(a) => a.quote_hint(host, request),
            Self::CurveStable(a) => a.quote_hint(host, request),
            Self::CurveCrypto(a) => a.quote_hint(host, request),
        }
    }

    pub fn swap(
        &self,
        host: &mut dyn Host,
        request: &SwapRequest,
    ) -> Result<SwapOutcome, EngineError> {
        trace!(pool = ?request.pool, protocol = %self.protocol(), amount_in = %request.amount_in, "Dispatching swap");
        match self {
            Self::ConstantProduct(a) => a.swap(host, request),
            Self::Concentrated(a) => a.swap(host, request),
            Self::CurveStable(a) => a.swap(host, request),
            Self::CurveCrypto(a) => a.swap(host, request),
        }
    }
}

/// Balance and log position captured before a swap
#[derive(Debug, Clone, Copy)]
pub(crate) struct Observation {
    pool: Address,
    token: Address,
    holder: Address,
    balance_before: U256,
    log_mark: usize,
    expected: EventSignature,
}

impl Observation {
    pub(crate) fn start(
        host: &dyn Host,
        pool: Address,
        token: Address,
        holder: Address,
        expected: EventSignature,
    ) -> Self {
        Self {
            pool,
            token,
            holder,
            balance_before: host.balance_of(token, holder),
            log_mark: host.logs().len(),
            expected,
        }
    }

    /// Holder's delta so far; zero is an error. Used where the pool emits its
    /// event only after control returns to it.
    pub(crate) fn finish_amount(&self, host: &dyn Host) -> Result<U256, EngineError> {
        let amount_out = host
            .balance_of(self.token, self.holder)
            .saturating_sub(self.balance_before);
        if amount_out.is_zero() {
            return Err(EngineError::insufficient_output(self.pool, "zero output"));
        }
        Ok(amount_out)
    }

    /// Measure the holder's delta and look for the pool's settlement event
    pub(crate) fn finish(&self, host: &dyn Host) -> Result<SwapOutcome, EngineError> {
        let balance_after = host.balance_of(self.token, self.holder);
        let amount_out = balance_after.saturating_sub(self.balance_before);
        let event_observed = host
            .logs()
            .get(self.log_mark..)
            .unwrap_or_default()
            .iter()
            .any(|log| log.emitter == self.pool && log.signature() == self.expected);

        if amount_out.is_zero() {
            return Err(EngineError::insufficient_output(self.pool, "zero output"));
        }
        if !event_observed {
            return Err(EngineError::insufficient_output(
                self.pool,
                format!("no {} event", self.expected),
            ));
        }
        Ok(SwapOutcome {
            amount_out,
            event_observed,
        })
    }
}

/// Move `amount_in` from the payer to `to`
pub(crate) fn move_input(
    host: &mut dyn Host,
    request: &SwapRequest,
    to: Address,
) -> Result<(), EngineError> {
    if request.payer == request.executor {
        host.transfer(request.token_in, request.executor, to, request.amount_in)?;
    } else {
        host.transfer_from(
            request.token_in,
            request.executor,
            request.payer,
            to,
            request.amount_in,
        )?;
    }
    Ok(())
}

/// View call whose failure is classified against the pool
pub(crate) fn pool_view(
    host: &mut dyn Host,
    executor: Address,
    pool: Address,
    call: ContractCall,
) -> Result<arb_types::CallReturn, EngineError> {
    host.view(executor, pool, call)
        .map_err(|e| EngineError::from_pool_call(pool, e))
}

/// Read `coins(k)` (or `underlying_coins(k)`) until the pool runs out
///
/// The first lookup must succeed; later failures mark the end of the list.
pub(crate) fn list_coins(
    host: &mut dyn Host,
    executor: Address,
    pool: Address,
    lookup: impl Fn(CoinIndex) -> ContractCall,
    wide: bool,
) -> Result<Vec<Address>, EngineError> {
    let mut coins = Vec::new();
    for k in 0..MAX_CURVE_COINS {
        let index = if wide {
            CoinIndex::Uint256(U256::from(k))
        } else {
            CoinIndex::Int128(k as i128)
        };
        match host.view(executor, pool, lookup(index)) {
            Ok(ret) => coins.push(ret.into_address(pool)?),
            Err(e) if k == 0 => return Err(EngineError::from_pool_call(pool, e)),
            Err(_) => break,
        }
    }
    Ok(coins)
}

/// Positions of `token_in` and `token_out` in a coin list
pub(crate) fn pair_indices(
    coins: &[Address],
    pool: Address,
    token_in: Address,
    token_out: Address,
) -> Result<(usize, usize), EngineError> {
    let find = |token: Address| {
        coins
            .iter()
            .position(|c| *c == token)
            .ok_or_else(|| EngineError::unsupported(pool, format!("pool does not list {:?}", token)))
    };
    Ok((find(token_in)?, find(token_out)?))
}

/// Forward tokens the executor received to the recipient
pub(crate) fn forward_output(
    host: &mut dyn Host,
    request: &SwapRequest,
    amount: U256,
) -> Result<(), EngineError> {
    if request.recipient != request.executor {
        host.transfer(request.token_out, request.executor, request.recipient, amount)?;
    }
    Ok(())
}

/// `out / in` as a decimal, `None` when either side does not fit
pub(crate) fn ratio(amount_out: U256, amount_in: U256) -> Option<Decimal> {
    if amount_in.is_zero() {
        return None;
    }
    let out = arb_amm::to_decimal(amount_out).ok()?;
    let inp = arb_amm::to_decimal(amount_in).ok()?;
    out.checked_div(inp)
}
