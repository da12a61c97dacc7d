//! Uniswap V2 style pair with optimistic transfers and flash swaps

use super::Contract;
use crate::chain::CallEnv;
use arb_amm::V2Math;
use arb_types::{CallReturn, Callback, ContractCall, EventKind, HostError, PairCallShape};
use ethers_core::types::{Address, U256};

/// Where the swap fee ends up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeeMode {
    /// Fee stays in the reserves (Uniswap V2 and most forks)
    Retained,
    /// Fee is moved out of the pair to a vault during the swap (Solidly / THENA)
    Forwarded { vault: Address },
}

#[derive(Debug, Clone)]
pub struct ConstantProductPair {
    pub token0: Address,
    pub token1: Address,
    pub reserve0: U256,
    pub reserve1: U256,
    pub fee_bps: u32,
    /// Whether `swapFee()` is implemented
    pub reports_fee: bool,
    pub shape: PairCallShape,
    pub fee_mode: FeeMode,
}

impl ConstantProductPair {
    /// Standard pair; `token0` must sort below `token1`
    pub fn new(token_a: Address, token_b: Address, reserve_a: U256, reserve_b: U256, fee_bps: u32) -> Self {
        let (token0, token1, reserve0, reserve1) = if token_a < token_b {
            (token_a, token_b, reserve_a, reserve_b)
        } else {
            (token_b, token_a, reserve_b, reserve_a)
        };
        Self {
            token0,
            token1,
            reserve0,
            reserve1,
            fee_bps,
            reports_fee: false,
            shape: PairCallShape::Standard,
            fee_mode: FeeMode::Retained,
        }
    }

    pub fn reporting_fee(mut self) -> Self {
        self.reports_fee = true;
        self
    }

    pub fn with_shape(mut self, shape: PairCallShape) -> Self {
        self.shape = shape;
        self
    }

    pub fn with_fee_mode(mut self, fee_mode: FeeMode) -> Self {
        self.fee_mode = fee_mode;
        self
    }

    fn swap(
        &mut self,
        env: &mut CallEnv<'_>,
        amount0_out: U256,
        amount1_out: U256,
        to: Address,
        data: Vec<u8>,
    ) -> Result<CallReturn, HostError> {
        if amount0_out.is_zero() && amount1_out.is_zero() {
            return Err(env.revert("INSUFFICIENT_OUTPUT_AMOUNT"));
        }
        if amount0_out >= self.reserve0 || amount1_out >= self.reserve1 {
            return Err(env.revert("INSUFFICIENT_LIQUIDITY"));
        }
        if to == self.token0 || to == self.token1 {
            return Err(env.revert("INVALID_TO"));
        }
        let sender = env.caller;

        env.pay(self.token0, to, amount0_out)?;
        env.pay(self.token1, to, amount1_out)?;

        if !data.is_empty() {
            env.callback(Callback::PairFlashSwap {
                sender,
                amount0: amount0_out,
                amount1: amount1_out,
                data,
            })?;
        }

        let mut balance0 = env.balance(self.token0);
        let mut balance1 = env.balance(self.token1);
        let amount0_in = balance0.saturating_sub(self.reserve0 - amount0_out);
        let amount1_in = balance1.saturating_sub(self.reserve1 - amount1_out);
        if amount0_in.is_zero() && amount1_in.is_zero() {
            return Err(env.revert("INSUFFICIENT_INPUT_AMOUNT"));
        }

        let invariant_fee = match self.fee_mode {
            FeeMode::Retained => self.fee_bps,
            FeeMode::Forwarded { vault } => {
                let fee0 = amount0_in * U256::from(self.fee_bps) / U256::from(10_000u64);
                let fee1 = amount1_in * U256::from(self.fee_bps) / U256::from(10_000u64);
                env.pay(self.token0, vault, fee0)?;
                env.pay(self.token1, vault, fee1)?;
                balance0 -= fee0;
                balance1 -= fee1;
                0
            }
        };

        let amounts_in = match self.fee_mode {
            FeeMode::Retained => (amount0_in, amount1_in),
            FeeMode::Forwarded { .. } => (U256::zero(), U256::zero()),
        };
        if !V2Math::invariant_holds(
            (balance0, balance1),
            amounts_in,
            (self.reserve0, self.reserve1),
            invariant_fee,
        ) {
            return Err(env.revert("K"));
        }

        self.reserve0 = balance0;
        self.reserve1 = balance1;
        env.emit(EventKind::PairSwap {
            sender,
            to,
            amount0_in,
            amount1_in,
            amount0_out,
            amount1_out,
        });
        Ok(CallReturn::None)
    }

    /// Output the pair would give for `amount_in` of `token_in`
    pub fn quote(&self, token_in: Address, amount_in: U256) -> anyhow::Result<U256> {
        let (reserve_in, reserve_out) = if token_in == self.token0 {
            (self.reserve0, self.reserve1)
        } else {
            (self.reserve1, self.reserve0)
        };
        V2Math::get_amount_out(amount_in, reserve_in, reserve_out, self.fee_bps)
    }
}

impl Contract for ConstantProductPair {
    fn kind(&self) -> &'static str {
        "constant_product_pair"
    }

    fn initial_holdings(&self) -> Vec<(Address, U256)> {
        vec![(self.token0, self.reserve0), (self.token1, self.reserve1)]
    }

    fn execute(&mut self, env: &mut CallEnv<'_>, call: ContractCall) -> Result<CallReturn, HostError> {
        match call {
            ContractCall::Token0 => Ok(CallReturn::Address(self.token0)),
            ContractCall::Token1 => Ok(CallReturn::Address(self.token1)),
            ContractCall::GetReserves => Ok(CallReturn::Reserves {
                reserve0: self.reserve0,
                reserve1: self.reserve1,
            }),
            ContractCall::SwapFee if self.reports_fee => Ok(CallReturn::Fee(self.fee_bps)),
            ContractCall::PairSwap {
                amount0_out,
                amount1_out,
                to,
                data,
            } if self.shape == PairCallShape::Standard => {
                self.swap(env, amount0_out, amount1_out, to, data)
            }
            ContractCall::PairSwapLegacy {
                amount0_out,
                amount1_out,
                to,
            } if self.shape == PairCallShape::Legacy => {
                self.swap(env, amount0_out, amount1_out, to, Vec::new())
            }
            other => Err(env.unsupported(&other)),
        }
    }

    fn box_clone(&self) -> Box<dyn Contract> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::InMemoryChain;
    use arb_types::{Host, NoCallbacks};

    fn addr(n: u64) -> Address {
        Address::from_low_u64_be(n)
    }

    fn e18(n: u64) -> U256 {
        U256::from(n) * U256::exp10(18)
    }

    #[test]
    fn test_optimistic_swap_and_k_check() {
        let mut chain = InMemoryChain::new();
        let (t0, t1, pair, trader) = (addr(1), addr(2), addr(100), addr(500));
        let contract = ConstantProductPair::new(t0, t1, e18(1_000), e18(1_000), 30);
        let quoted = contract.quote(t0, e18(10)).unwrap();
        chain.deploy(pair, contract);
        chain.mint(t0, trader, e18(10));

        chain.transfer(t0, trader, pair, e18(10)).unwrap();
        let greedy = ContractCall::PairSwap {
            amount0_out: U256::zero(),
            amount1_out: quoted + U256::one(),
            to: trader,
            data: Vec::new(),
        };
        let err = chain.call(trader, pair, greedy, &mut NoCallbacks).unwrap_err();
        assert_eq!(err, HostError::reverted(pair, "K"));

        let fair = ContractCall::PairSwap {
            amount0_out: U256::zero(),
            amount1_out: quoted,
            to: trader,
            data: Vec::new(),
        };
        chain.call(trader, pair, fair, &mut NoCallbacks).unwrap();
        assert_eq!(chain.balance_of(t1, trader), quoted);
        assert_eq!(chain.logs().len(), 1);
    }

    #[test]
    fn test_flash_swap_requires_handler() {
        let mut chain = InMemoryChain::new();
        let pair = addr(100);
        chain.deploy(pair, ConstantProductPair::new(addr(1), addr(2), e18(10), e18(10), 30));

        let call = ContractCall::PairSwap {
            amount0_out: e18(1),
            amount1_out: U256::zero(),
            to: addr(500),
            data: vec![1],
        };
        let err = chain.call(addr(500), pair, call, &mut NoCallbacks).unwrap_err();
        assert!(matches!(err, HostError::CallbackRejected(_)));
        assert_eq!(chain.balance_of(addr(1), addr(500)), U256::zero());
    }

    #[test]
    fn test_legacy_pair_rejects_standard_swap() {
        let mut chain = InMemoryChain::new();
        let pair = addr(100);
        chain.deploy(
            pair,
            ConstantProductPair::new(addr(1), addr(2), e18(10), e18(10), 30)
                .with_shape(PairCallShape::Legacy),
        );

        let call = ContractCall::PairSwap {
            amount0_out: U256::one(),
            amount1_out: U256::zero(),
            to: addr(500),
            data: Vec::new(),
        };
        let err = chain.call(addr(500), pair, call, &mut NoCallbacks).unwrap_err();
        assert!(err.is_interface_mismatch());
    }

    #[test]
    fn test_forwarded_fee_leaves_pair() {
        let mut chain = InMemoryChain::new();
        let (t0, t1, pair, vault, trader) = (addr(1), addr(2), addr(100), addr(900), addr(500));
        let contract = ConstantProductPair::new(t0, t1, e18(1_000), e18(1_000), 20)
            .with_fee_mode(FeeMode::Forwarded { vault });
        let quoted = contract.quote(t0, e18(1)).unwrap();
        chain.deploy(pair, contract);
        chain.mint(t0, trader, e18(1));

        chain.transfer(t0, trader, pair, e18(1)).unwrap();
        let swap = ContractCall::PairSwap {
            amount0_out: U256::zero(),
            amount1_out: quoted,
            to: trader,
            data: Vec::new(),
        };
        chain.call(trader, pair, swap, &mut NoCallbacks).unwrap();

        assert_eq!(chain.balance_of(t0, vault), U256::exp10(15) * 2u64);
        assert_eq!(chain.balance_of(t0, pair), e18(1_000) + V2Math::amount_after_fee(e18(1), 20));
    }
}
