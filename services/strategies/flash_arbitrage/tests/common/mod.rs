//! Shared in-memory market for engine integration tests
//!
//! Every token uses 18 decimals, BSC style. Stablecoins sit at parity and
//! WETH trades around 2000 stable units on every venue unless a test moves it.

#![allow(dead_code)]

use arb_amm::{CryptoPoolState, StablePoolState};
use arb_types::{
    Address, ConcentratedFlavor, CurveStableKind, Host, PairCallShape, ProtocolVariant,
    TokenHandle, U256,
};
use chain_sim::{
    ConcentratedPool, ConstantProductPair, CryptoPool, FeeRelay, FlashLender, InMemoryChain,
    StablePool, WrappedNative,
};
use flash_arbitrage::{ArbitrageEngine, DexRegistry, PoolAdapter, SwapRequest};
use std::sync::OnceLock;

pub const OWNER: u64 = 0xa0;
pub const ENGINE: u64 = 0xe0;
pub const RELAY: u64 = 0xb0;
pub const LENDER: u64 = 0xd0;
pub const TRADER: u64 = 0x7a;
pub const WHALE: u64 = 0x7b;

/// WETH on each WETH venue, whole tokens
pub const WETH_DEPTH: u64 = 1_000;
/// Stable units per WETH
pub const PRICE: u64 = 2_000;
/// Flash lender premium
pub const LENDER_FEE_BPS: u32 = 9;

/// Built-in registry, shared so engines do not borrow the market
pub fn registry() -> &'static DexRegistry {
    static REGISTRY: OnceLock<DexRegistry> = OnceLock::new();
    REGISTRY.get_or_init(|| DexRegistry::builtin().unwrap())
}

pub fn addr(n: u64) -> Address {
    Address::from_low_u64_be(n)
}

pub fn e18(n: u64) -> U256 {
    U256::from(n) * U256::exp10(18)
}

#[derive(Debug, Clone, Copy)]
pub struct Tokens {
    pub weth: TokenHandle,
    pub usdc: TokenHandle,
    pub usdt: TokenHandle,
    pub dai: TokenHandle,
    pub mim: TokenHandle,
    /// LP token of the three-coin base pool
    pub base_lp: TokenHandle,
    pub meta_lp: TokenHandle,
}

impl Tokens {
    fn new() -> Self {
        let token = |n| TokenHandle::new(addr(n), 18);
        Self {
            weth: token(0x0e7e),
            usdc: token(0x05c1),
            usdt: token(0x05c2),
            dai: token(0x05c3),
            mim: token(0x05c4),
            base_lp: token(0x05c5),
            meta_lp: token(0x05c6),
        }
    }
}

/// Pools of the five-family route plus a second WETH/USDC venue for round trips
pub struct Market {
    pub chain: InMemoryChain,
    pub registry: &'static DexRegistry,
    pub tokens: Tokens,
    /// Constant product WETH/USDC, `UNISWAP_V2`
    pub weth_usdc_v2: Address,
    /// Concentrated USDC/USDT, 0.05%
    pub usdc_usdt_v3: Address,
    /// Interface 2 plain DAI/USDC/USDT
    pub three_pool: Address,
    /// NG metapool MIM against the three pool's LP token
    pub mim_meta: Address,
    /// Constant product MIM/WETH, `SUSHISWAP_V2`
    pub mim_weth_v2: Address,
    /// Concentrated WETH/USDC, 0.3%
    pub weth_usdc_v3: Address,
    pub lender: Address,
    pub relay: Address,
}

impl Market {
    /// Every venue quotes WETH at [`PRICE`]
    pub fn balanced() -> Self {
        Self::with_mim_price(PRICE)
    }

    /// The MIM/WETH pair quotes `mim_per_weth`; below [`PRICE`] the five-hop
    /// route through it returns more WETH than it started with
    pub fn with_mim_price(mim_per_weth: u64) -> Self {
        let tokens = Tokens::new();
        let mut chain = InMemoryChain::new();
        let registry = registry();

        chain.deploy(tokens.weth.address, WrappedNative::new());
        chain.set_native(tokens.weth.address, e18(10_000));
        let relay = addr(RELAY);
        chain.deploy(relay, FeeRelay::new());
        let lender = addr(LENDER);
        chain.deploy(
            lender,
            FlashLender::new(LENDER_FEE_BPS).with_liquidity(tokens.weth.address, e18(10_000)),
        );

        let weth_usdc_v2 = addr(0x1001);
        chain.deploy(
            weth_usdc_v2,
            ConstantProductPair::new(
                tokens.weth.address,
                tokens.usdc.address,
                e18(WETH_DEPTH),
                e18(WETH_DEPTH * PRICE),
                30,
            ),
        );

        let usdc_usdt_v3 = addr(0x1002);
        chain.deploy(
            usdc_usdt_v3,
            ConcentratedPool::with_reserves(
                ConcentratedFlavor::UniswapV3,
                tokens.usdc.address,
                tokens.usdt.address,
                e18(1_000_000),
                e18(1_000_000),
                500,
            )
            .unwrap(),
        );

        let three_pool = addr(0x1003);
        chain.deploy(three_pool, three_pool_contract(&tokens));

        let mim_meta = addr(0x1004);
        chain.deploy(
            mim_meta,
            meta_pool_contract(&tokens, CurveStableKind::NgMetaPoolUnderlying, three_pool),
        );

        let mim_weth_v2 = addr(0x1005);
        chain.deploy(
            mim_weth_v2,
            ConstantProductPair::new(
                tokens.mim.address,
                tokens.weth.address,
                e18(WETH_DEPTH * mim_per_weth),
                e18(WETH_DEPTH),
                30,
            ),
        );

        let weth_usdc_v3 = addr(0x1006);
        chain.deploy(
            weth_usdc_v3,
            ConcentratedPool::with_reserves(
                ConcentratedFlavor::UniswapV3,
                tokens.weth.address,
                tokens.usdc.address,
                e18(WETH_DEPTH),
                e18(WETH_DEPTH * PRICE),
                3_000,
            )
            .unwrap(),
        );

        Self {
            chain,
            registry,
            tokens,
            weth_usdc_v2,
            usdc_usdt_v3,
            three_pool,
            mim_meta,
            mim_weth_v2,
            weth_usdc_v3,
            lender,
            relay,
        }
    }

    /// Protocol ids, pools and token path of the five-family route
    /// WETH → USDC → USDT → DAI → MIM → WETH
    pub fn five_family_route(&self) -> (Vec<u8>, Vec<Address>, Vec<Address>) {
        let id = |key: &str| self.registry.id_of(key).unwrap();
        let t = &self.tokens;
        (
            vec![
                id("UNISWAP_V2"),
                id("UNISWAP_V3"),
                id("CURVE_STABLE_SWAP_INTERFACE2_PLAIN"),
                id("CURVE_STABLE_SWAP_NG_META_POOL_UNDERLYING"),
                id("SUSHISWAP_V2"),
            ],
            vec![
                self.weth_usdc_v2,
                self.usdc_usdt_v3,
                self.three_pool,
                self.mim_meta,
                self.mim_weth_v2,
            ],
            vec![
                t.weth.address,
                t.usdc.address,
                t.usdt.address,
                t.dai.address,
                t.mim.address,
                t.weth.address,
            ],
        )
    }

    /// A third party trades `amount_in` through `pool` outside the engine
    pub fn whale_swap(
        &mut self,
        protocol: ProtocolVariant,
        pool: Address,
        token_in: Address,
        token_out: Address,
        amount_in: U256,
    ) -> U256 {
        let whale = addr(WHALE);
        self.chain.mint(token_in, whale, amount_in);
        PoolAdapter::for_protocol(protocol)
            .swap(
                &mut self.chain,
                &SwapRequest::internal(pool, whale, token_in, token_out, amount_in),
            )
            .unwrap()
            .amount_out
    }

    /// `holder`'s balance of every token the market lists
    pub fn snapshot(&self, holder: Address) -> Vec<U256> {
        let t = &self.tokens;
        [t.weth, t.usdc, t.usdt, t.dai, t.mim, t.base_lp, t.meta_lp]
            .iter()
            .map(|token| self.chain.balance_of(token.address, holder))
            .collect()
    }

    /// Balances of every participant, native included
    pub fn world_snapshot(&self) -> Vec<U256> {
        let accounts = [
            addr(OWNER),
            addr(ENGINE),
            self.relay,
            self.lender,
            self.weth_usdc_v2,
            self.usdc_usdt_v3,
            self.three_pool,
            self.mim_meta,
            self.mim_weth_v2,
            self.weth_usdc_v3,
        ];
        accounts
            .iter()
            .flat_map(|account| {
                let mut balances = self.snapshot(*account);
                balances.push(self.chain.native_balance(*account));
                balances
            })
            .collect()
    }
}

/// Engine owned by [`OWNER`] with the market's lender, relay and WETH
pub fn engine(market: &Market) -> ArbitrageEngine<'static> {
    engine_with_share(market, 0)
}

/// Same engine, paying the relay `share_bps` of every profit
pub fn engine_with_share(market: &Market, share_bps: u32) -> ArbitrageEngine<'static> {
    ArbitrageEngine::new(market.registry, addr(ENGINE), addr(OWNER))
        .with_lenders(vec![market.lender])
        .with_relay(market.relay, share_bps)
        .with_wrapped_native(market.tokens.weth.address)
}

/// DAI/USDC/USDT, one million of each
pub fn three_pool_contract(tokens: &Tokens) -> StablePool {
    let state = StablePoolState::legacy(vec![e18(1_000_000); 3], 2_000, U256::from(1_000_000u64))
        .with_lp_supply(e18(3_000_000));
    StablePool::new(
        CurveStableKind::Interface2Plain,
        vec![tokens.dai.address, tokens.usdc.address, tokens.usdt.address],
        tokens.base_lp.address,
        state,
    )
}

/// MIM against the base pool's LP token, half a million each
pub fn meta_pool_contract(tokens: &Tokens, kind: CurveStableKind, base_pool: Address) -> StablePool {
    let balances = vec![e18(500_000), e18(500_000)];
    let state = match kind.interface() {
        arb_types::CurveInterface::Ng => StablePoolState::ng(
            balances,
            200,
            U256::from(4_000_000u64),
            U256::from(20_000_000_000u64),
        ),
        _ => StablePoolState::legacy(balances, 200, U256::from(4_000_000u64)),
    }
    .with_lp_supply(e18(1_000_000));
    StablePool::new(
        kind,
        vec![tokens.mim.address, tokens.base_lp.address],
        tokens.meta_lp.address,
        state,
    )
    .with_base_pool(
        base_pool,
        vec![tokens.dai.address, tokens.usdc.address, tokens.usdt.address],
    )
}

/// Two-coin pool for a plain or lending Curve kind; lending pools list
/// `wrapped` as coins and `dai`/`usdc` as their underlying
pub fn two_coin_pool_contract(
    tokens: &Tokens,
    kind: CurveStableKind,
    wrapped: (Address, Address),
    lp: Address,
) -> StablePool {
    let balances = vec![e18(1_000_000); 2];
    let state = match kind.interface() {
        arb_types::CurveInterface::Ng => StablePoolState::ng(
            balances,
            1_000,
            U256::from(1_000_000u64),
            U256::from(20_000_000_000u64),
        ),
        _ => StablePoolState::legacy(balances, 1_000, U256::from(1_000_000u64)),
    }
    .with_lp_supply(e18(2_000_000));

    if kind.uses_underlying() {
        StablePool::new(kind, vec![wrapped.0, wrapped.1], lp, state)
            .with_underlying(vec![tokens.dai.address, tokens.usdc.address])
    } else {
        StablePool::new(kind, vec![tokens.dai.address, tokens.usdc.address], lp, state)
    }
}

/// Two-coin CryptoSwap pool at a 1:1 price scale
pub fn crypto_pool_contract(coins: (Address, Address)) -> CryptoPool {
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
    CryptoPool::new(vec![coins.0, coins.1], state)
}

/// Pair using the three-argument `swap`
pub fn legacy_pair_contract(token_a: Address, token_b: Address) -> ConstantProductPair {
    ConstantProductPair::new(token_a, token_b, e18(1_000_000), e18(1_000_000), 30)
        .with_shape(PairCallShape::Legacy)
}

/// Give `holder` `amount` of `token` and let the engine pull it
pub fn fund_trader(chain: &mut InMemoryChain, token: Address, holder: Address, amount: U256) {
    chain.mint(token, holder, amount);
    chain.approve(token, holder, addr(ENGINE), amount);
}
