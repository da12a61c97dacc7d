//! Curve StableSwap pool covering the nine interface/layout combinations
//!
//! Coin lookups use `int128` indices on interface 1 pools and `uint256`
//! indices on interface 2 and NG pools; `exchange` always takes `int128`.
//! Lending pools settle their underlying leg one-to-one against the same
//! invariant. Metapools route underlying swaps through their base pool with
//! nested calls.

use super::{coin_index, math_revert, Contract};
use crate::chain::CallEnv;
use arb_amm::StablePoolState;
use arb_types::{
    CallReturn, CoinIndex, ContractCall, CurveInterface, CurveStableKind, EventKind, HostError,
    StableLayout,
};
use ethers_core::types::{Address, U256};

#[derive(Debug, Clone)]
pub struct StablePool {
    pub kind: CurveStableKind,
    pub coins: Vec<Address>,
    /// Lending layout: underlying token per coin
    pub underlying: Vec<Address>,
    /// Meta layout: base pool and its coins
    pub base_pool: Option<Address>,
    pub base_coins: Vec<Address>,
    pub lp_token: Address,
    pub state: StablePoolState,
}

impl StablePool {
    pub fn new(
        kind: CurveStableKind,
        coins: Vec<Address>,
        lp_token: Address,
        state: StablePoolState,
    ) -> Self {
        Self {
            kind,
            coins,
            underlying: Vec::new(),
            base_pool: None,
            base_coins: Vec::new(),
            lp_token,
            state,
        }
    }

    pub fn with_underlying(mut self, underlying: Vec<Address>) -> Self {
        self.underlying = underlying;
        self
    }

    pub fn with_base_pool(mut self, base_pool: Address, base_coins: Vec<Address>) -> Self {
        self.base_pool = Some(base_pool);
        self.base_coins = base_coins;
        self
    }

    fn wide_lookup(&self) -> bool {
        self.kind.interface() != CurveInterface::V1
    }

    fn layout(&self) -> StableLayout {
        self.kind.layout()
    }

    fn base(&self, env: &CallEnv<'_>) -> Result<Address, HostError> {
        self.base_pool
            .ok_or_else(|| env.revert("metapool has no base pool"))
    }

    /// Metapools price their LP coin at the base pool's virtual price
    fn sync_base_rate(&mut self, env: &mut CallEnv<'_>) -> Result<(), HostError> {
        if self.layout() != StableLayout::Meta {
            return Ok(());
        }
        let base = self.base(env)?;
        let virtual_price = env
            .call(base, ContractCall::GetVirtualPrice)?
            .into_amount(base)?;
        if let Some(rate) = self.state.rates.get_mut(1) {
            *rate = virtual_price;
        }
        Ok(())
    }

    fn pair(
        &self,
        env: &CallEnv<'_>,
        call: &ContractCall,
        i: &CoinIndex,
        j: &CoinIndex,
        count: usize,
    ) -> Result<(usize, usize), HostError> {
        let i = coin_index(env, call, i, false)?;
        let j = coin_index(env, call, j, false)?;
        if i == j || i >= count || j >= count {
            return Err(env.revert("invalid coin index"));
        }
        Ok((i, j))
    }

    fn underlying_count(&self) -> usize {
        match self.layout() {
            StableLayout::Lending => self.underlying.len(),
            StableLayout::Meta => 1 + self.base_coins.len(),
            StableLayout::Plain => 0,
        }
    }

    fn exchange(
        &mut self,
        env: &mut CallEnv<'_>,
        i: usize,
        j: usize,
        dx: U256,
        min_dy: U256,
    ) -> Result<CallReturn, HostError> {
        let buyer = env.caller;
        env.pull(self.coins[i], buyer, dx)?;
        let dy = self
            .state
            .exchange(i, j, dx)
            .map_err(math_revert(env.this))?;
        if dy < min_dy {
            return Err(env.revert("Exchange resulted in fewer coins than expected"));
        }
        env.pay(self.coins[j], buyer, dy)?;
        env.emit(EventKind::TokenExchange {
            buyer,
            sold_id: i as u32,
            tokens_sold: dx,
            bought_id: j as u32,
            tokens_bought: dy,
        });
        Ok(CallReturn::Amount(dy))
    }

    fn exchange_underlying(
        &mut self,
        env: &mut CallEnv<'_>,
        i: usize,
        j: usize,
        dx: U256,
        min_dy: U256,
    ) -> Result<CallReturn, HostError> {
        let buyer = env.caller;
        let dy = match self.layout() {
            StableLayout::Lending => {
                env.pull(self.underlying[i], buyer, dx)?;
                let dy = self
                    .state
                    .exchange(i, j, dx)
                    .map_err(math_revert(env.this))?;
                env.pay(self.underlying[j], buyer, dy)?;
                dy
            }
            StableLayout::Meta => {
                let base = self.base(env)?;
                let token_in = self.underlying_token(i);
                let token_out = self.underlying_token(j);
                env.pull(token_in, buyer, dx)?;

                let dy = if i == 0 {
                    let lp = self
                        .state
                        .exchange(0, 1, dx)
                        .map_err(math_revert(env.this))?;
                    env.call(
                        base,
                        ContractCall::RemoveLiquidityOneCoin {
                            amount: lp,
                            i: CoinIndex::Int128((j - 1) as i128),
                            min_amount: U256::zero(),
                        },
                    )?
                    .into_amount(base)?
                } else if j == 0 {
                    let mut amounts = vec![U256::zero(); self.base_coins.len()];
                    amounts[i - 1] = dx;
                    env.approve(token_in, base, dx);
                    let minted = env
                        .call(
                            base,
                            ContractCall::AddLiquidity {
                                amounts,
                                min_mint: U256::zero(),
                            },
                        )?
                        .into_amount(base)?;
                    self.state
                        .exchange(1, 0, minted)
                        .map_err(math_revert(env.this))?
                } else {
                    env.approve(token_in, base, dx);
                    env.call(
                        base,
                        ContractCall::Exchange {
                            i: CoinIndex::Int128((i - 1) as i128),
                            j: CoinIndex::Int128((j - 1) as i128),
                            dx,
                            min_dy: U256::zero(),
                        },
                    )?
                    .into_amount(base)?
                };
                env.pay(token_out, buyer, dy)?;
                dy
            }
            StableLayout::Plain => return Err(env.revert("no underlying coins")),
        };

        if dy < min_dy {
            return Err(env.revert("Exchange resulted in fewer coins than expected"));
        }
        env.emit(EventKind::TokenExchangeUnderlying {
            buyer,
            sold_id: i as u32,
            tokens_sold: dx,
            bought_id: j as u32,
            tokens_bought: dy,
        });
        Ok(CallReturn::Amount(dy))
    }

    fn get_dy_underlying(
        &mut self,
        env: &mut CallEnv<'_>,
        i: usize,
        j: usize,
        dx: U256,
    ) -> Result<U256, HostError> {
        let revert = math_revert(env.this);
        match self.layout() {
            StableLayout::Lending => self.state.get_dy(i, j, dx).map_err(revert),
            StableLayout::Meta => {
                let base = self.base(env)?;
                if i == 0 {
                    let lp = self.state.get_dy(0, 1, dx).map_err(revert)?;
                    env.call(
                        base,
                        ContractCall::CalcWithdrawOneCoin {
                            amount: lp,
                            i: CoinIndex::Int128((j - 1) as i128),
                        },
                    )?
                    .into_amount(base)
                } else if j == 0 {
                    let mut amounts = vec![U256::zero(); self.base_coins.len()];
                    amounts[i - 1] = dx;
                    let lp = env
                        .call(
                            base,
                            ContractCall::CalcTokenAmount {
                                amounts,
                                is_deposit: true,
                            },
                        )?
                        .into_amount(base)?;
                    self.state.get_dy(1, 0, lp).map_err(revert)
                } else {
                    env.call(
                        base,
                        ContractCall::GetDy {
                            i: CoinIndex::Int128((i - 1) as i128),
                            j: CoinIndex::Int128((j - 1) as i128),
                            dx,
                        },
                    )?
                    .into_amount(base)
                }
            }
            StableLayout::Plain => Err(env.revert("no underlying coins")),
        }
    }

    fn underlying_token(&self, index: usize) -> Address {
        match self.layout() {
            StableLayout::Meta if index == 0 => self.coins[0],
            StableLayout::Meta => self.base_coins[index - 1],
            _ => self.underlying[index],
        }
    }
}

impl Contract for StablePool {
    fn kind(&self) -> &'static str {
        "curve_stable_pool"
    }

    fn initial_holdings(&self) -> Vec<(Address, U256)> {
        let mut holdings: Vec<(Address, U256)> = self
            .coins
            .iter()
            .copied()
            .zip(self.state.balances.iter().copied())
            .collect();
        holdings.extend(
            self.underlying
                .iter()
                .copied()
                .zip(self.state.balances.iter().copied()),
        );
        holdings.push((self.lp_token, self.state.lp_supply));
        holdings
    }

    fn execute(&mut self, env: &mut CallEnv<'_>, call: ContractCall) -> Result<CallReturn, HostError> {
        let wide = self.wide_lookup();
        let layout = self.layout();
        match &call {
            ContractCall::Coins(index) => {
                let index = coin_index(env, &call, index, wide)?;
                self.coins
                    .get(index)
                    .map(|coin| CallReturn::Address(*coin))
                    .ok_or_else(|| env.revert("coin index out of range"))
            }
            ContractCall::UnderlyingCoins(index) if layout == StableLayout::Lending => {
                let index = coin_index(env, &call, index, wide)?;
                self.underlying
                    .get(index)
                    .map(|coin| CallReturn::Address(*coin))
                    .ok_or_else(|| env.revert("coin index out of range"))
            }
            ContractCall::BasePool if layout == StableLayout::Meta => {
                Ok(CallReturn::Address(self.base(env)?))
            }
            ContractCall::LpToken => Ok(CallReturn::Address(self.lp_token)),
            ContractCall::GetVirtualPrice => {
                self.sync_base_rate(env)?;
                let price = self
                    .state
                    .virtual_price()
                    .map_err(math_revert(env.this))?;
                Ok(CallReturn::Amount(price))
            }
            ContractCall::GetDy { i, j, dx } => {
                let (i, j) = self.pair(env, &call, i, j, self.coins.len())?;
                self.sync_base_rate(env)?;
                let dy = self
                    .state
                    .get_dy(i, j, *dx)
                    .map_err(math_revert(env.this))?;
                Ok(CallReturn::Amount(dy))
            }
            ContractCall::GetDyUnderlying { i, j, dx } if layout != StableLayout::Plain => {
                let (i, j) = self.pair(env, &call, i, j, self.underlying_count())?;
                self.sync_base_rate(env)?;
                Ok(CallReturn::Amount(self.get_dy_underlying(env, i, j, *dx)?))
            }
            ContractCall::Exchange { i, j, dx, min_dy } => {
                let (i, j) = self.pair(env, &call, i, j, self.coins.len())?;
                self.sync_base_rate(env)?;
                self.exchange(env, i, j, *dx, *min_dy)
            }
            ContractCall::ExchangeUnderlying { i, j, dx, min_dy } if layout != StableLayout::Plain => {
                let (i, j) = self.pair(env, &call, i, j, self.underlying_count())?;
                self.sync_base_rate(env)?;
                self.exchange_underlying(env, i, j, *dx, *min_dy)
            }
            ContractCall::AddLiquidity { amounts, min_mint } => {
                self.sync_base_rate(env)?;
                let provider = env.caller;
                for (coin, amount) in self.coins.clone().into_iter().zip(amounts) {
                    env.pull(coin, provider, *amount)?;
                }
                let minted = self
                    .state
                    .add_liquidity(amounts)
                    .map_err(math_revert(env.this))?;
                if minted < *min_mint {
                    return Err(env.revert("Slippage screwed you"));
                }
                env.mint(self.lp_token, provider, minted);
                Ok(CallReturn::Amount(minted))
            }
            ContractCall::RemoveLiquidityOneCoin {
                amount,
                i,
                min_amount,
            } => {
                let i = coin_index(env, &call, i, false)?;
                if i >= self.coins.len() {
                    return Err(env.revert("coin index out of range"));
                }
                self.sync_base_rate(env)?;
                let provider = env.caller;
                env.burn(self.lp_token, provider, *amount)?;
                let out = self
                    .state
                    .remove_liquidity_one_coin(*amount, i)
                    .map_err(math_revert(env.this))?;
                if out < *min_amount {
                    return Err(env.revert("Not enough coins removed"));
                }
                env.pay(self.coins[i], provider, out)?;
                Ok(CallReturn::Amount(out))
            }
            ContractCall::CalcTokenAmount {
                amounts,
                is_deposit: true,
            } => {
                self.sync_base_rate(env)?;
                let minted = self
                    .state
                    .calc_token_amount_deposit(amounts)
                    .map_err(math_revert(env.this))?;
                Ok(CallReturn::Amount(minted))
            }
            ContractCall::CalcWithdrawOneCoin { amount, i } => {
                let i = coin_index(env, &call, i, false)?;
                self.sync_base_rate(env)?;
                let quote = self
                    .state
                    .calc_withdraw_one_coin(*amount, i)
                    .map_err(math_revert(env.this))?;
                Ok(CallReturn::Amount(quote.amount))
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
    use arb_amm::stable_math::PRECISION;
    use arb_types::Host;

    fn addr(n: u64) -> Address {
        Address::from_low_u64_be(n)
    }

    fn e18(n: u64) -> U256 {
        U256::from(n) * U256::exp10(18)
    }

    const TRADER: u64 = 500;

    /// 3pool-like base at `0x3000` plus an NG metapool at `0x4000`
    fn deploy_meta(chain: &mut InMemoryChain) -> (Address, Address) {
        let (dai, usdc, usdt, base_lp, mim, meta_lp) =
            (addr(11), addr(12), addr(13), addr(14), addr(15), addr(16));
        let base = addr(0x3000);
        let meta = addr(0x4000);

        let base_state = StablePoolState::legacy(
            vec![e18(1_000_000), U256::from(1_000_000_000_000u64), U256::from(1_000_000_000_000u64)],
            2_000,
            U256::from(1_000_000u64),
        )
        .with_rates(vec![PRECISION, U256::exp10(30), U256::exp10(30)])
        .with_lp_supply(e18(3_000_000));
        chain.deploy(
            base,
            StablePool::new(CurveStableKind::Interface2Plain, vec![dai, usdc, usdt], base_lp, base_state),
        );

        let meta_state = StablePoolState::ng(
            vec![e18(500_000), e18(500_000)],
            200,
            U256::from(4_000_000u64),
            U256::from(20_000_000_000u64),
        )
        .with_lp_supply(e18(1_000_000));
        chain.deploy(
            meta,
            StablePool::new(CurveStableKind::NgMetaPoolUnderlying, vec![mim, base_lp], meta_lp, meta_state)
                .with_base_pool(base, vec![dai, usdc, usdt]),
        );
        (base, meta)
    }

    #[test]
    fn test_lookup_width_by_interface() {
        let mut chain = InMemoryChain::new();
        let (base, _) = deploy_meta(&mut chain);

        let narrow = chain.view(addr(TRADER), base, ContractCall::Coins(CoinIndex::Int128(0)));
        assert!(narrow.unwrap_err().is_interface_mismatch());

        let wide = chain
            .view(addr(TRADER), base, ContractCall::Coins(CoinIndex::Uint256(U256::one())))
            .unwrap();
        assert_eq!(wide, CallReturn::Address(addr(12)));
    }

    #[test]
    fn test_plain_exchange_emits_token_exchange() {
        let mut chain = InMemoryChain::new();
        let (base, _) = deploy_meta(&mut chain);
        let trader = addr(TRADER);
        chain.mint(addr(12), trader, U256::from(1_000_000_000u64));
        chain.approve(addr(12), trader, base, U256::MAX);

        let call = ContractCall::Exchange {
            i: CoinIndex::Int128(1),
            j: CoinIndex::Int128(0),
            dx: U256::from(1_000_000_000u64),
            min_dy: U256::zero(),
        };
        let dy = chain.view(trader, base, call).unwrap().into_amount(base).unwrap();
        assert_eq!(chain.balance_of(addr(11), trader), dy);
        assert!(dy > e18(999));
        assert!(matches!(
            chain.logs().last().map(|l| &l.kind),
            Some(EventKind::TokenExchange { .. })
        ));
    }

    #[test]
    fn test_meta_underlying_routes_through_base() {
        let mut chain = InMemoryChain::new();
        let (_, meta) = deploy_meta(&mut chain);
        let trader = addr(TRADER);
        let usdt = addr(13);
        chain.mint(usdt, trader, U256::from(1_000_000_000u64));
        chain.approve(usdt, trader, meta, U256::MAX);

        let quote = chain
            .view(
                trader,
                meta,
                ContractCall::GetDyUnderlying {
                    i: CoinIndex::Int128(3),
                    j: CoinIndex::Int128(0),
                    dx: U256::from(1_000_000_000u64),
                },
            )
            .unwrap()
            .into_amount(meta)
            .unwrap();

        let call = ContractCall::ExchangeUnderlying {
            i: CoinIndex::Int128(3),
            j: CoinIndex::Int128(0),
            dx: U256::from(1_000_000_000u64),
            min_dy: U256::zero(),
        };
        let dy = chain.view(trader, meta, call).unwrap().into_amount(meta).unwrap();

        assert_eq!(dy, quote);
        assert_eq!(chain.balance_of(addr(15), trader), dy);
        assert!(dy > e18(990) && dy < e18(1_000));
        assert!(matches!(
            chain.logs().last().map(|l| &l.kind),
            Some(EventKind::TokenExchangeUnderlying { .. })
        ));
    }

    #[test]
    fn test_plain_pool_has_no_underlying_exchange() {
        let mut chain = InMemoryChain::new();
        let (base, _) = deploy_meta(&mut chain);
        let call = ContractCall::ExchangeUnderlying {
            i: CoinIndex::Int128(0),
            j: CoinIndex::Int128(1),
            dx: U256::one(),
            min_dy: U256::zero(),
        };
        let err = chain.view(addr(TRADER), base, call).unwrap_err();
        assert!(err.is_interface_mismatch());
    }
}
