//! Concentrated-liquidity pools (Uniswap V3, SushiSwap V3, PancakeSwap V3, Algebra)
//!
//! The active fee is read before the swap: `fee()` on Uniswap-style pools,
//! `globalState()` on Algebra. The input is paid from inside the fork's swap
//! callback, so the callback name doubles as a check that the pool really is
//! the declared fork.

use super::{move_input, pool_view, Observation, QuoteHint, SwapRequest};
use crate::error::EngineError;
use arb_amm::v3_math::{MAX_SQRT_RATIO, MIN_SQRT_RATIO};
use arb_amm::{V3Math, V3PoolState};
use arb_types::{
    Address, Callback, CallbackHandler, ConcentratedFlavor, ContractCall, EventSignature, Host,
    HostError, ProtocolVariant, SwapOutcome, I256, U256,
};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConcentratedAdapter {
    pub flavor: ConcentratedFlavor,
}

/// Pool state read ahead of a swap
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PoolQuote {
    pub zero_for_one: bool,
    pub fee_pips: u32,
    pub state: V3PoolState,
    pub amount_out: U256,
}

impl PoolQuote {
    /// Furthest price the swap may reach
    pub fn price_limit(&self) -> U256 {
        if self.zero_for_one {
            MIN_SQRT_RATIO + U256::one()
        } else {
            MAX_SQRT_RATIO - U256::one()
        }
    }
}

impl ConcentratedAdapter {
    pub fn new(flavor: ConcentratedFlavor) -> Self {
        Self { flavor }
    }

    pub fn protocol(&self) -> ProtocolVariant {
        ProtocolVariant::Concentrated {
            flavor: self.flavor,
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
    ) -> Result<PoolQuote, EngineError> {
        let (sqrt_price_x96, fee_pips) = if self.flavor.fee_in_global_state() {
            let ret = pool_view(host, executor, pool, ContractCall::GlobalState)?;
            (ret.clone().into_sqrt_price(pool)?, ret.into_fee(pool)?)
        } else {
            let fee = pool_view(host, executor, pool, ContractCall::Fee)?.into_fee(pool)?;
            let price = pool_view(host, executor, pool, ContractCall::Slot0)?.into_sqrt_price(pool)?;
            (price, fee)
        };

        let token0 = pool_view(host, executor, pool, ContractCall::Token0)?.into_address(pool)?;
        let token1 = pool_view(host, executor, pool, ContractCall::Token1)?.into_address(pool)?;
        let zero_for_one = if token_in == token0 && token_out == token1 {
            true
        } else if token_in == token1 && token_out == token0 {
            false
        } else {
            return Err(EngineError::unsupported(pool, "pool does not trade these tokens"));
        };

        let liquidity = pool_view(host, executor, pool, ContractCall::Liquidity)?.into_amount(pool)?;
        let state = V3PoolState {
            sqrt_price_x96,
            liquidity: u128::try_from(liquidity)
                .map_err(|_| EngineError::insufficient_output(pool, "liquidity exceeds u128"))?,
            fee_pips,
        };
        let amount_out = V3Math::swap_exact_input(&state, amount_in, zero_for_one)
            .map_err(|e| EngineError::insufficient_output(pool, e.to_string()))?
            .amount_out;

        Ok(PoolQuote {
            zero_for_one,
            fee_pips,
            state,
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
        let spot = V3Math::spot_price(quote.state.sqrt_price_x96).ok();
        let spot_price = match (spot, quote.zero_for_one) {
            (Some(p), true) => Some(p),
            (Some(p), false) if !p.is_zero() => rust_decimal::Decimal::ONE.checked_div(p),
            _ => None,
        };
        Ok(QuoteHint {
            amount_out: quote.amount_out,
            spot_price,
        })
    }

    pub(crate) fn swap_call(
        quote: &PoolQuote,
        recipient: Address,
        amount_in: U256,
        data: Vec<u8>,
    ) -> ContractCall {
        ContractCall::PoolSwap {
            recipient,
            zero_for_one: quote.zero_for_one,
            amount_specified: I256::from_raw(amount_in),
            sqrt_price_limit_x96: quote.price_limit(),
            data,
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
        debug!(?pool, flavor = ?self.flavor, fee_pips = quote.fee_pips, "Concentrated swap");

        let observation = Observation::start(
            host,
            pool,
            request.token_out,
            request.recipient,
            EventSignature::Swap,
        );
        let mut payer = SwapCallbackPayer::new(self.flavor, pool, *request);
        let call = Self::swap_call(&quote, request.recipient, request.amount_in, vec![1]);
        let result = host.call(request.executor, pool, call, &mut payer);

        if let Some(err) = payer.failure.take() {
            return Err(err);
        }
        result.map_err(|e| EngineError::from_pool_call(pool, e))?;
        observation.finish(host)
    }
}

/// Pays the positive delta requested by the pool's swap callback
struct SwapCallbackPayer {
    flavor: ConcentratedFlavor,
    pool: Address,
    request: SwapRequest,
    failure: Option<EngineError>,
}

impl SwapCallbackPayer {
    fn new(flavor: ConcentratedFlavor, pool: Address, request: SwapRequest) -> Self {
        Self {
            flavor,
            pool,
            request,
            failure: None,
        }
    }

    fn reject(&mut self, err: EngineError) -> HostError {
        let rejection = HostError::CallbackRejected(err.to_string());
        self.failure = Some(err);
        rejection
    }
}

impl CallbackHandler for SwapCallbackPayer {
    fn on_callback(
        &mut self,
        host: &mut dyn Host,
        caller: Address,
        callback: Callback,
    ) -> Result<(), HostError> {
        if caller != self.pool {
            return Err(self.reject(EngineError::UnexpectedCallback {
                caller,
                reason: "swap callback from a different pool".into(),
            }));
        }
        let Callback::PoolSwap {
            flavor,
            amount0_delta,
            amount1_delta,
            ..
        } = callback
        else {
            return Err(self.reject(EngineError::unsupported(
                self.pool,
                format!("pool raised {} instead of a swap callback", callback.name()),
            )));
        };
        if flavor != self.flavor {
            return Err(self.reject(EngineError::unsupported(
                self.pool,
                format!(
                    "pool raised {} but {} was declared",
                    flavor.callback_name(),
                    self.flavor.callback_name()
                ),
            )));
        }

        let owed = if amount0_delta > I256::zero() {
            amount0_delta.into_raw()
        } else {
            amount1_delta.into_raw()
        };
        if owed != self.request.amount_in {
            return Err(self.reject(EngineError::UnexpectedCallback {
                caller,
                reason: format!("pool asked for {}, swap was for {}", owed, self.request.amount_in),
            }));
        }
        move_input(host, &self.request, self.pool).map_err(|e| self.reject(e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arb_amm::v3_math::Q96;
    use arb_types::CallReturn;
    use chain_sim::{CallEnv, Contract, InMemoryChain};

    /// Pool whose reported liquidity does not fit in `uint128`
    #[derive(Debug, Clone)]
    struct OverfullPool {
        token0: Address,
        token1: Address,
    }

    impl Contract for OverfullPool {
        fn kind(&self) -> &'static str {
            "overfull_pool"
        }

        fn execute(&mut self, env: &mut CallEnv<'_>, call: ContractCall) -> Result<CallReturn, HostError> {
            match call {
                ContractCall::Fee => Ok(CallReturn::Fee(3000)),
                ContractCall::Slot0 => Ok(CallReturn::Slot0 { sqrt_price_x96: Q96 }),
                ContractCall::Token0 => Ok(CallReturn::Address(self.token0)),
                ContractCall::Token1 => Ok(CallReturn::Address(self.token1)),
                ContractCall::Liquidity => Ok(CallReturn::Amount(U256::MAX)),
                other => Err(env.unsupported(&other)),
            }
        }

        fn box_clone(&self) -> Box<dyn Contract> {
            Box::new(self.clone())
        }
    }

    #[test]
    fn test_liquidity_beyond_u128_is_rejected() {
        let (token0, token1) = (Address::from_low_u64_be(1), Address::from_low_u64_be(2));
        let pool = Address::from_low_u64_be(100);
        let mut chain = InMemoryChain::new();
        chain.deploy(pool, OverfullPool { token0, token1 });

        let adapter = ConcentratedAdapter::new(ConcentratedFlavor::UniswapV3);
        let err = adapter
            .quote(&mut chain, Address::from_low_u64_be(500), pool, token0, token1, U256::exp10(18))
            .unwrap_err();
        assert!(matches!(err, EngineError::InsufficientOutput { pool: p, .. } if p == pool));
    }
}
