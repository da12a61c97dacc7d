//! # Host Interface - The Environment an Execution Runs Inside
//!
//! ## Purpose
//!
//! The engine never owns balances or pools. Everything it does (moving tokens,
//! calling pools, receiving flash-borrow callbacks, reverting a failed attempt)
//! goes through [`Host`]. An on-chain deployment maps these operations onto EVM
//! calls; the `chain-sim` crate implements them in memory.
//!
//! ## Call Model
//!
//! ```text
//! engine ──call(target, ContractCall, handler)──▶ pool
//!                                                  │ transfers, state updates
//!   handler.on_callback(host, pool, Callback) ◀────┘ (optional, synchronous)
//!                                                  │
//! engine ◀───────────── CallReturn ────────────────┘
//! ```
//!
//! A call either completes or fails with a [`HostError`]; a failed call leaves no
//! trace of its own effects. Whole executions are made atomic with
//! [`Host::checkpoint`] / [`Host::revert_to`] / [`Host::commit`].

use crate::common::errors::HostError;
use crate::protocol::events::LogEvent;
use crate::protocol::variant::ConcentratedFlavor;
use ethers_core::types::{Address, I256, U256};

/// Opaque snapshot handle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checkpoint(pub usize);

/// Curve coin index in the width the pool's ABI declares
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoinIndex {
    Int128(i128),
    Uint256(U256),
}

impl CoinIndex {
    pub fn as_usize(&self) -> Option<usize> {
        match self {
            Self::Int128(i) => usize::try_from(*i).ok(),
            Self::Uint256(u) => {
                if *u > U256::from(u32::MAX) {
                    None
                } else {
                    Some(u.low_u64() as usize)
                }
            }
        }
    }

    pub fn is_int128(&self) -> bool {
        matches!(self, Self::Int128(_))
    }
}

/// Entry points the engine (or a contract) can invoke on another contract
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContractCall {
    // Constant-product pair
    Token0,
    Token1,
    GetReserves,
    /// Pool-reported fee in basis points; not every pair implements it
    SwapFee,
    PairSwap {
        amount0_out: U256,
        amount1_out: U256,
        to: Address,
        data: Vec<u8>,
    },
    PairSwapLegacy {
        amount0_out: U256,
        amount1_out: U256,
        to: Address,
    },

    // Concentrated liquidity
    Fee,
    GlobalState,
    Slot0,
    Liquidity,
    PoolSwap {
        recipient: Address,
        zero_for_one: bool,
        amount_specified: I256,
        sqrt_price_limit_x96: U256,
        data: Vec<u8>,
    },

    // Curve
    Coins(CoinIndex),
    UnderlyingCoins(CoinIndex),
    BasePool,
    LpToken,
    GetVirtualPrice,
    GetDy {
        i: CoinIndex,
        j: CoinIndex,
        dx: U256,
    },
    GetDyUnderlying {
        i: CoinIndex,
        j: CoinIndex,
        dx: U256,
    },
    Exchange {
        i: CoinIndex,
        j: CoinIndex,
        dx: U256,
        min_dy: U256,
    },
    ExchangeUnderlying {
        i: CoinIndex,
        j: CoinIndex,
        dx: U256,
        min_dy: U256,
    },
    AddLiquidity {
        amounts: Vec<U256>,
        min_mint: U256,
    },
    RemoveLiquidityOneCoin {
        amount: U256,
        i: CoinIndex,
        min_amount: U256,
    },
    CalcTokenAmount {
        amounts: Vec<U256>,
        is_deposit: bool,
    },
    CalcWithdrawOneCoin {
        amount: U256,
        i: CoinIndex,
    },

    // Flash lender
    FlashLoan {
        receiver: Address,
        token: Address,
        amount: U256,
        data: Vec<u8>,
    },
    FlashFee {
        token: Address,
        amount: U256,
    },

    // Wrapped native token
    Withdraw {
        amount: U256,
    },

    // Fee relay; pulls `amount` of native asset from the caller
    PayRelay {
        amount: U256,
    },
}

impl ContractCall {
    /// ABI-style name, used in errors and logs
    pub fn selector(&self) -> &'static str {
        match self {
            Self::Token0 => "token0()",
            Self::Token1 => "token1()",
            Self::GetReserves => "getReserves()",
            Self::SwapFee => "swapFee()",
            Self::PairSwap { .. } => "swap(uint256,uint256,address,bytes)",
            Self::PairSwapLegacy { .. } => "swap(uint256,uint256,address)",
            Self::Fee => "fee()",
            Self::GlobalState => "globalState()",
            Self::Slot0 => "slot0()",
            Self::Liquidity => "liquidity()",
            Self::PoolSwap { .. } => "swap(address,bool,int256,uint160,bytes)",
            Self::Coins(CoinIndex::Int128(_)) => "coins(int128)",
            Self::Coins(CoinIndex::Uint256(_)) => "coins(uint256)",
            Self::UnderlyingCoins(CoinIndex::Int128(_)) => "underlying_coins(int128)",
            Self::UnderlyingCoins(CoinIndex::Uint256(_)) => "underlying_coins(uint256)",
            Self::BasePool => "base_pool()",
            Self::LpToken => "lp_token()",
            Self::GetVirtualPrice => "get_virtual_price()",
            Self::GetDy { i, .. } if i.is_int128() => "get_dy(int128,int128,uint256)",
            Self::GetDy { .. } => "get_dy(uint256,uint256,uint256)",
            Self::GetDyUnderlying { .. } => "get_dy_underlying(int128,int128,uint256)",
            Self::Exchange { i, .. } if i.is_int128() => "exchange(int128,int128,uint256,uint256)",
            Self::Exchange { .. } => "exchange(uint256,uint256,uint256,uint256)",
            Self::ExchangeUnderlying { .. } => {
                "exchange_underlying(int128,int128,uint256,uint256)"
            }
            Self::AddLiquidity { .. } => "add_liquidity(uint256[],uint256)",
            Self::RemoveLiquidityOneCoin { .. } => {
                "remove_liquidity_one_coin(uint256,int128,uint256)"
            }
            Self::CalcTokenAmount { .. } => "calc_token_amount(uint256[],bool)",
            Self::CalcWithdrawOneCoin { .. } => "calc_withdraw_one_coin(uint256,int128)",
            Self::FlashLoan { .. } => "flashLoan(address,address,uint256,bytes)",
            Self::FlashFee { .. } => "flashFee(address,uint256)",
            Self::Withdraw { .. } => "withdraw(uint256)",
            Self::PayRelay { .. } => "payRelay()",
        }
    }
}

/// Decoded return data
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallReturn {
    None,
    Address(Address),
    Amount(U256),
    Reserves { reserve0: U256, reserve1: U256 },
    /// Fee in the pool's native unit (bps for pairs, pips for V3)
    Fee(u32),
    GlobalState { sqrt_price_x96: U256, fee: u32 },
    Slot0 { sqrt_price_x96: U256 },
    Deltas { amount0: I256, amount1: I256 },
}

impl CallReturn {
    pub fn into_address(self, target: Address) -> Result<Address, HostError> {
        match self {
            Self::Address(a) => Ok(a),
            _ => Err(HostError::BadReturn {
                target,
                expected: "address",
            }),
        }
    }

    pub fn into_amount(self, target: Address) -> Result<U256, HostError> {
        match self {
            Self::Amount(a) => Ok(a),
            _ => Err(HostError::BadReturn {
                target,
                expected: "uint256",
            }),
        }
    }

    pub fn into_fee(self, target: Address) -> Result<u32, HostError> {
        match self {
            Self::Fee(f) => Ok(f),
            Self::GlobalState { fee, .. } => Ok(fee),
            _ => Err(HostError::BadReturn {
                target,
                expected: "fee",
            }),
        }
    }

    pub fn into_reserves(self, target: Address) -> Result<(U256, U256), HostError> {
        match self {
            Self::Reserves { reserve0, reserve1 } => Ok((reserve0, reserve1)),
            _ => Err(HostError::BadReturn {
                target,
                expected: "reserves",
            }),
        }
    }

    pub fn into_sqrt_price(self, target: Address) -> Result<U256, HostError> {
        match self {
            Self::Slot0 { sqrt_price_x96 } | Self::GlobalState { sqrt_price_x96, .. } => {
                Ok(sqrt_price_x96)
            }
            _ => Err(HostError::BadReturn {
                target,
                expected: "sqrtPriceX96",
            }),
        }
    }
}

/// Reentry into the caller while a call is still executing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Callback {
    /// `uniswapV2Call`: the pair has already sent `amount0`/`amount1`
    PairFlashSwap {
        sender: Address,
        amount0: U256,
        amount1: U256,
        data: Vec<u8>,
    },
    /// V3-family swap callback; positive delta is owed to the pool
    PoolSwap {
        flavor: ConcentratedFlavor,
        amount0_delta: I256,
        amount1_delta: I256,
        data: Vec<u8>,
    },
    /// ERC-3156 style `onFlashLoan`; lender pulls `amount + fee` afterwards
    FlashLoan {
        initiator: Address,
        token: Address,
        amount: U256,
        fee: U256,
        data: Vec<u8>,
    },
}

impl Callback {
    pub fn name(&self) -> &'static str {
        match self {
            Self::PairFlashSwap { .. } => "uniswapV2Call",
            Self::PoolSwap { flavor, .. } => flavor.callback_name(),
            Self::FlashLoan { .. } => "onFlashLoan",
        }
    }
}

/// Receiver of callbacks raised during a call
pub trait CallbackHandler {
    /// `caller` is the contract raising the callback (the callback's msg.sender)
    fn on_callback(
        &mut self,
        host: &mut dyn Host,
        caller: Address,
        callback: Callback,
    ) -> Result<(), HostError>;
}

/// Handler for calls that must not call back
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCallbacks;

impl CallbackHandler for NoCallbacks {
    fn on_callback(
        &mut self,
        _host: &mut dyn Host,
        caller: Address,
        callback: Callback,
    ) -> Result<(), HostError> {
        Err(HostError::CallbackRejected(format!(
            "unexpected {} from {:?}",
            callback.name(),
            caller
        )))
    }
}

/// Execution environment: ledger, contracts, event log and snapshots
pub trait Host {
    fn balance_of(&self, token: Address, owner: Address) -> U256;

    fn transfer(
        &mut self,
        token: Address,
        from: Address,
        to: Address,
        amount: U256,
    ) -> Result<(), HostError>;

    fn approve(&mut self, token: Address, owner: Address, spender: Address, amount: U256);

    fn allowance(&self, token: Address, owner: Address, spender: Address) -> U256;

    fn transfer_from(
        &mut self,
        token: Address,
        spender: Address,
        from: Address,
        to: Address,
        amount: U256,
    ) -> Result<(), HostError>;

    fn native_balance(&self, account: Address) -> U256;

    fn send_native(&mut self, from: Address, to: Address, amount: U256) -> Result<(), HostError>;

    /// Invoke `call` on `target` as `caller`; callbacks are delivered to `handler`
    fn call(
        &mut self,
        caller: Address,
        target: Address,
        call: ContractCall,
        handler: &mut dyn CallbackHandler,
    ) -> Result<CallReturn, HostError>;

    /// Read-only call that must not raise callbacks
    fn view(
        &mut self,
        caller: Address,
        target: Address,
        call: ContractCall,
    ) -> Result<CallReturn, HostError> {
        self.call(caller, target, call, &mut NoCallbacks)
    }

    fn logs(&self) -> &[LogEvent];

    fn checkpoint(&mut self) -> Checkpoint;

    /// Restore the state captured by `checkpoint` and discard it
    fn revert_to(&mut self, checkpoint: Checkpoint) -> Result<(), HostError>;

    /// Keep current state and discard `checkpoint`
    fn commit(&mut self, checkpoint: Checkpoint) -> Result<(), HostError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coin_index_width() {
        assert_eq!(CoinIndex::Int128(2).as_usize(), Some(2));
        assert_eq!(CoinIndex::Int128(-1).as_usize(), None);
        assert_eq!(CoinIndex::Uint256(U256::from(3u64)).as_usize(), Some(3));
        assert_eq!(CoinIndex::Uint256(U256::MAX).as_usize(), None);
    }

    #[test]
    fn test_selector_reflects_index_width() {
        let narrow = ContractCall::Coins(CoinIndex::Int128(0));
        let wide = ContractCall::Coins(CoinIndex::Uint256(U256::zero()));
        assert_eq!(narrow.selector(), "coins(int128)");
        assert_eq!(wide.selector(), "coins(uint256)");
    }

    #[test]
    fn test_return_decoding_mismatch() {
        let target = Address::from_low_u64_be(7);
        let err = CallReturn::Amount(U256::one())
            .into_address(target)
            .unwrap_err();
        assert!(err.is_interface_mismatch());
    }
}
