//! Curve CryptoSwap pool (two-coin, TwoCrypto-NG and TriCrypto)
//!
//! Every index argument is `uint256`; an `int128` call is an unknown selector.

use super::{coin_index, math_revert, Contract};
use crate::chain::CallEnv;
use arb_amm::CryptoPoolState;
use arb_types::{CallReturn, ContractCall, EventKind, HostError};
use ethers_core::types::{Address, U256};

#[derive(Debug, Clone)]
pub struct CryptoPool {
    pub coins: Vec<Address>,
    pub state: CryptoPoolState,
}

impl CryptoPool {
    pub fn new(coins: Vec<Address>, state: CryptoPoolState) -> Self {
        Self { coins, state }
    }

    fn indices(
        &self,
        env: &CallEnv<'_>,
        call: &ContractCall,
        i: &arb_types::CoinIndex,
        j: &arb_types::CoinIndex,
    ) -> Result<(usize, usize), HostError> {
        let i = coin_index(env, call, i, true)?;
        let j = coin_index(env, call, j, true)?;
        if i == j || i >= self.coins.len() || j >= self.coins.len() {
            return Err(env.revert("invalid coin index"));
        }
        Ok((i, j))
    }
}

impl Contract for CryptoPool {
    fn kind(&self) -> &'static str {
        "curve_crypto_pool"
    }

    fn initial_holdings(&self) -> Vec<(Address, U256)> {
        self.coins
            .iter()
            .copied()
            .zip(self.state.balances.iter().copied())
            .collect()
    }

    fn execute(&mut self, env: &mut CallEnv<'_>, call: ContractCall) -> Result<CallReturn, HostError> {
        match &call {
            ContractCall::Coins(index) => {
                let index = coin_index(env, &call, index, true)?;
                self.coins
                    .get(index)
                    .map(|coin| CallReturn::Address(*coin))
                    .ok_or_else(|| env.revert("coin index out of range"))
            }
            ContractCall::GetDy { i, j, dx } => {
                let (i, j) = self.indices(env, &call, i, j)?;
                let dy = self
                    .state
                    .get_dy(i, j, *dx)
                    .map_err(math_revert(env.this))?;
                Ok(CallReturn::Amount(dy))
            }
            ContractCall::Exchange { i, j, dx, min_dy } => {
                let (i, j) = self.indices(env, &call, i, j)?;
                let buyer = env.caller;
                env.pull(self.coins[i], buyer, *dx)?;
                let dy = self
                    .state
                    .exchange(i, j, *dx)
                    .map_err(math_revert(env.this))?;
                if dy < *min_dy {
                    return Err(env.revert("Slippage"));
                }
                env.pay(self.coins[j], buyer, dy)?;
                env.emit(EventKind::TokenExchange {
                    buyer,
                    sold_id: i as u32,
                    tokens_sold: *dx,
                    bought_id: j as u32,
                    tokens_bought: dy,
                });
                Ok(CallReturn::Amount(dy))
            }
            _ => Err(env.unsupported(&call)),
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
    use arb_types::{CoinIndex, Host};

    fn addr(n: u64) -> Address {
        Address::from_low_u64_be(n)
    }

    fn e18(n: u64) -> U256 {
        U256::from(n) * U256::exp10(18)
    }

    fn pool() -> CryptoPool {
        let state = CryptoPoolState::new(
            vec![e18(1_000_000), e18(1_000_000)],
            vec![U256::one(), U256::one()],
            vec![e18(1)],
            U256::from(400_000u64),
            U256::from(145_000_000_000_000u64),
            (
                U256::from(26_000_000u64),
                U256::from(45_000_000u64),
                U256::from(230_000_000_000_000u64),
            ),
        )
        .unwrap();
        CryptoPool::new(vec![addr(1), addr(2)], state)
    }

    #[test]
    fn test_exchange_uses_uint256_indices() {
        let mut chain = InMemoryChain::new();
        let (target, trader) = (addr(700), addr(500));
        chain.deploy(target, pool());
        chain.mint(addr(1), trader, e18(1));
        chain.approve(addr(1), trader, target, U256::MAX);

        let narrow = ContractCall::Exchange {
            i: CoinIndex::Int128(0),
            j: CoinIndex::Int128(1),
            dx: e18(1),
            min_dy: U256::zero(),
        };
        assert!(chain.view(trader, target, narrow).unwrap_err().is_interface_mismatch());

        let wide = ContractCall::Exchange {
            i: CoinIndex::Uint256(U256::zero()),
            j: CoinIndex::Uint256(U256::one()),
            dx: e18(1),
            min_dy: U256::zero(),
        };
        let dy = chain.view(trader, target, wide).unwrap().into_amount(target).unwrap();
        assert_eq!(chain.balance_of(addr(2), trader), dy);
        assert!(dy > U256::from(996u64) * U256::exp10(15));
        assert!(matches!(
            chain.logs().last().map(|l| &l.kind),
            Some(EventKind::TokenExchange { .. })
        ));
    }

    #[test]
    fn test_slippage_guard_reverts() {
        let mut chain = InMemoryChain::new();
        let (target, trader) = (addr(700), addr(500));
        chain.deploy(target, pool());
        chain.mint(addr(1), trader, e18(1));
        chain.approve(addr(1), trader, target, U256::MAX);

        let call = ContractCall::Exchange {
            i: CoinIndex::Uint256(U256::zero()),
            j: CoinIndex::Uint256(U256::one()),
            dx: e18(1),
            min_dy: e18(1),
        };
        let err = chain.view(trader, target, call).unwrap_err();
        assert_eq!(err, HostError::reverted(target, "Slippage"));
        assert_eq!(chain.balance_of(addr(1), trader), e18(1));
    }
}
