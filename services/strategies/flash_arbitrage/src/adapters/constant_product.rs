//! Constant-product pairs (Uniswap V2 and forks)
//!
//! The input is transferred into the pair first, then the pair is asked for the
//! output computed from its reserves. The fee comes from `swapFee()` when the
//! pair implements it, otherwise from the registry's configured value.

use super::{move_input, pool_view, Observation, QuoteHint, SwapRequest};
use crate::error::EngineError;
use arb_amm::V2Math;
use arb_types::{
    Address, ContractCall, EventSignature, Host, NoCallbacks, PairCallShape, ProtocolVariant,
    SwapOutcome, U256,
};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConstantProductAdapter {
    pub configured_fee_bps: u32,
    pub shape: PairCallShape,
}

/// Pair state needed to size a swap
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PairQuote {
    pub zero_for_one: bool,
    pub reserve_in: U256,
    pub reserve_out: U256,
    pub fee_bps: u32,
    pub amount_out: U256,
}

impl PairQuote {
    /// `(amount0Out, amount1Out)` for the pair's `swap`
    pub fn outputs(&self) -> (U256, U256) {
        if self.zero_for_one {
            (U256::zero(), self.amount_out)
        } else {
            (self.amount_out, U256::zero())
        }
    }
}

impl ConstantProductAdapter {
    pub fn new(configured_fee_bps: u32, shape: PairCallShape) -> Self {
        Self {
            configured_fee_bps,
            shape,
        }
    }

    pub fn protocol(&self) -> ProtocolVariant {
        ProtocolVariant::ConstantProduct {
            fee_bps: self.configured_fee_bps,
            shape: self.shape,
        }
    }

    /// Pool-reported fee, falling back to the configured one
    fn fee_bps(&self, host: &mut dyn Host, executor: Address, pool: Address) -> Result<u32, EngineError> {
        match host.view(executor, pool, ContractCall::SwapFee) {
            Ok(ret) => Ok(ret.into_fee(pool)?),
            Err(e) if e.is_interface_mismatch() => Ok(self.configured_fee_bps),
            Err(e) => Err(EngineError::Host(e)),
        }
    }

    pub(crate) fn quote(
        &self,
        host: &mut dyn Host,
        executor: Address,
        pool: Address,
        token_in: Address,
        token_out: Address,
        amount_in: U256,
    ) -> Result<PairQuote, EngineError> {
        let token0 = pool_view(host, executor, pool, ContractCall::Token0)?.into_address(pool)?;
        let token1 = pool_view(host, executor, pool, ContractCall::Token1)?.into_address(pool)?;
        let zero_for_one = if token_in == token0 && token_out == token1 {
            true
        } else if token_in == token1 && token_out == token0 {
            false
        } else {
            return Err(EngineError::unsupported(pool, "pair does not trade these tokens"));
        };

        let (reserve0, reserve1) =
            pool_view(host, executor, pool, ContractCall::GetReserves)?.into_reserves(pool)?;
        let (reserve_in, reserve_out) = if zero_for_one {
            (reserve0, reserve1)
        } else {
            (reserve1, reserve0)
        };
        let fee_bps = self.fee_bps(host, executor, pool)?;
        let amount_out = V2Math::get_amount_out(amount_in, reserve_in, reserve_out, fee_bps)
            .map_err(|e| EngineError::insufficient_output(pool, e.to_string()))?;

        Ok(PairQuote {
            zero_for_one,
            reserve_in,
            reserve_out,
            fee_bps,
            amount_out,
        })
    }

    pub fn quote_hint(
        &self,
        host: &mut dyn Host,
        request: &SwapRequest,
    ) -> Result<QuoteHint, EngineError> {
        let quote = self.quote(
            host,
            request.executor,
            request.pool,
            request.token_in,
            request.token_out,
            request.amount_in,
        )?;
        Ok(QuoteHint {
            amount_out: quote.amount_out,
            spot_price: V2Math::spot_price(quote.reserve_in, quote.reserve_out).ok(),
        })
    }

    /// The swap call for this pair's shape; `data` is ignored by legacy pairs
    pub(crate) fn swap_call(&self, quote: &PairQuote, to: Address, data: Vec<u8>) -> ContractCall {
        let (amount0_out, amount1_out) = quote.outputs();
        match self.shape {
            PairCallShape::Standard => ContractCall::PairSwap {
                amount0_out,
                amount1_out,
                to,
                data,
            },
            PairCallShape::Legacy => ContractCall::PairSwapLegacy {
                amount0_out,
                amount1_out,
                to,
            },
        }
    }

    pub fn swap(&self, host: &mut dyn Host, request: &SwapRequest) -> Result<SwapOutcome, EngineError> {
        let pool = request.pool;
        let quote = self.quote(
            host,
            request.executor,
            pool,
            request.token_in,
            request.token_out,
            request.amount_in,
        )?;
        if quote.amount_out.is_zero() {
            return Err(EngineError::insufficient_output(pool, "quoted output is zero"));
        }
        debug!(?pool, fee_bps = quote.fee_bps, amount_out = %quote.amount_out, "Constant-product swap");

        let observation = Observation::start(
            host,
            pool,
            request.token_out,
            request.recipient,
            EventSignature::Swap,
        );
        move_input(host, request, pool)?;
        let call = self.swap_call(&quote, request.recipient, Vec::new());
        host.call(request.executor, pool, call, &mut NoCallbacks)
            .map_err(|e| EngineError::from_pool_call(pool, e))?;
        observation.finish(host)
    }
}
