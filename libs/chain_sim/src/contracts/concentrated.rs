//! Concentrated-liquidity pool settled through a swap callback
//!
//! Exact-input swaps inside one liquidity range. The pool pays the output
//! first, asks the caller for the input through the flavor's callback and then
//! checks its own balance.

use super::{math_revert, Contract};
use crate::chain::CallEnv;
use arb_amm::v3_math::{MAX_SQRT_RATIO, MIN_SQRT_RATIO};
use arb_amm::{V3Math, V3PoolState};
use arb_types::{
    CallReturn, Callback, ConcentratedFlavor, ContractCall, EventKind, HostError, I256,
};
use ethers_core::types::{Address, U256};

#[derive(Debug, Clone)]
pub struct ConcentratedPool {
    pub flavor: ConcentratedFlavor,
    pub token0: Address,
    pub token1: Address,
    pub state: V3PoolState,
    holdings: (U256, U256),
}

impl ConcentratedPool {
    /// Pool holding `amount_a`/`amount_b`, priced so both sides are worth the same
    pub fn with_reserves(
        flavor: ConcentratedFlavor,
        token_a: Address,
        token_b: Address,
        amount_a: U256,
        amount_b: U256,
        fee_pips: u32,
    ) -> anyhow::Result<Self> {
        let (token0, token1, amount0, amount1) = if token_a < token_b {
            (token_a, token_b, amount_a, amount_b)
        } else {
            (token_b, token_a, amount_b, amount_a)
        };
        let state = V3PoolState {
            sqrt_price_x96: V3Math::sqrt_price_from_amounts(amount0, amount1)?,
            liquidity: V3Math::liquidity_from_amounts(amount0, amount1)?,
            fee_pips,
        };
        Ok(Self {
            flavor,
            token0,
            token1,
            state,
            holdings: (amount0, amount1),
        })
    }

    pub fn quote(&self, token_in: Address, amount_in: U256) -> anyhow::Result<U256> {
        let zero_for_one = token_in == self.token0;
        Ok(V3Math::swap_exact_input(&self.state, amount_in, zero_for_one)?.amount_out)
    }

    fn swap(
        &mut self,
        env: &mut CallEnv<'_>,
        recipient: Address,
        zero_for_one: bool,
        amount_specified: I256,
        sqrt_price_limit_x96: U256,
        data: Vec<u8>,
    ) -> Result<CallReturn, HostError> {
        if amount_specified <= I256::zero() {
            return Err(env.revert("exact output swaps are not supported"));
        }
        let price = self.state.sqrt_price_x96;
        let limit_ok = if zero_for_one {
            sqrt_price_limit_x96 < price && sqrt_price_limit_x96 > MIN_SQRT_RATIO
        } else {
            sqrt_price_limit_x96 > price && sqrt_price_limit_x96 < MAX_SQRT_RATIO
        };
        if !limit_ok {
            return Err(env.revert("SPL"));
        }

        let amount_in = amount_specified.into_raw();
        let result = V3Math::swap_exact_input(&self.state, amount_in, zero_for_one)
            .map_err(math_revert(env.this))?;
        let crosses_limit = if zero_for_one {
            result.sqrt_price_after < sqrt_price_limit_x96
        } else {
            result.sqrt_price_after > sqrt_price_limit_x96
        };
        if crosses_limit {
            return Err(env.revert("price limit reached"));
        }

        let (token_in, token_out) = if zero_for_one {
            (self.token0, self.token1)
        } else {
            (self.token1, self.token0)
        };
        let amount_out = result.amount_out;
        let paid = I256::from_raw(amount_in);
        let released = -I256::from_raw(amount_out);
        let (amount0, amount1) = if zero_for_one {
            (paid, released)
        } else {
            (released, paid)
        };

        env.pay(token_out, recipient, amount_out)?;

        let before = env.balance(token_in);
        env.callback(Callback::PoolSwap {
            flavor: self.flavor,
            amount0_delta: amount0,
            amount1_delta: amount1,
            data,
        })?;
        if env.balance(token_in) < before + amount_in {
            return Err(env.revert("IIA"));
        }

        self.state.sqrt_price_x96 = result.sqrt_price_after;
        let sender = env.caller;
        env.emit(EventKind::PoolSwap {
            sender,
            recipient,
            amount0,
            amount1,
            sqrt_price_x96: result.sqrt_price_after,
        });
        Ok(CallReturn::Deltas { amount0, amount1 })
    }
}

impl Contract for ConcentratedPool {
    fn kind(&self) -> &'static str {
        "concentrated_pool"
    }

    fn initial_holdings(&self) -> Vec<(Address, U256)> {
        vec![(self.token0, self.holdings.0), (self.token1, self.holdings.1)]
    }

    fn execute(&mut self, env: &mut CallEnv<'_>, call: ContractCall) -> Result<CallReturn, HostError> {
        let algebra = self.flavor.fee_in_global_state();
        match call {
            ContractCall::Token0 => Ok(CallReturn::Address(self.token0)),
            ContractCall::Token1 => Ok(CallReturn::Address(self.token1)),
            ContractCall::Liquidity => Ok(CallReturn::Amount(U256::from(self.state.liquidity))),
            ContractCall::Fee if !algebra => Ok(CallReturn::Fee(self.state.fee_pips)),
            ContractCall::Slot0 if !algebra => Ok(CallReturn::Slot0 {
                sqrt_price_x96: self.state.sqrt_price_x96,
            }),
            ContractCall::GlobalState if algebra => Ok(CallReturn::GlobalState {
                sqrt_price_x96: self.state.sqrt_price_x96,
                fee: self.state.fee_pips,
            }),
            ContractCall::PoolSwap {
                recipient,
                zero_for_one,
                amount_specified,
                sqrt_price_limit_x96,
                data,
            } => self.swap(
                env,
                recipient,
                zero_for_one,
                amount_specified,
                sqrt_price_limit_x96,
                data,
            ),
            other => Err(env.unsupported(&other)),
        }
    }

    fn box_clone(&self) -> Box<dyn Contract> {
        Box::new(self.clone())
    }
}
