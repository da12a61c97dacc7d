//! # Chain Simulator
//!
//! ## Purpose
//!
//! In-memory execution environment implementing [`arb_types::Host`]. It holds a
//! token ledger, native balances, an event log and a set of deployed contracts
//! that behave like their on-chain counterparts: constant-product pairs,
//! concentrated-liquidity pools, Curve StableSwap and CryptoSwap pools, an
//! ERC-3156 style flash lender, a wrapped native token and a fee relay.
//!
//! ## Integration Points
//!
//! - **Input**: `ContractCall`s from the arbitrage engine or from tests
//! - **Output**: balances, `LogEvent`s and callbacks into the caller's handler
//! - **Math**: pool pricing comes from `arb-amm`, so simulated pools and
//!   off-chain quotes agree to the wei
//!
//! ## Execution Model
//!
//! - Calls are synchronous and run to completion
//! - A failed call restores the world as it was before the call started
//! - Checkpoints stack; `revert_to` and `commit` pop them
//! - A contract cannot be reentered while it is executing
//!
//! ```rust
//! use chain_sim::{ConstantProductPair, InMemoryChain};
//! use arb_types::{Address, ContractCall, Host, U256};
//!
//! let mut chain = InMemoryChain::new();
//! let pair = Address::from_low_u64_be(100);
//! let (a, b) = (Address::from_low_u64_be(1), Address::from_low_u64_be(2));
//! chain.deploy(pair, ConstantProductPair::new(a, b, U256::exp10(21), U256::exp10(21), 30));
//!
//! let reserves = chain.view(Address::zero(), pair, ContractCall::GetReserves).unwrap();
//! assert_eq!(reserves.into_reserves(pair).unwrap(), (U256::exp10(21), U256::exp10(21)));
//! ```

pub mod chain;
pub mod contracts;
pub mod ledger;

pub use chain::{CallEnv, InMemoryChain};
pub use contracts::{
    ConcentratedPool, ConstantProductPair, Contract, CryptoPool, FeeMode, FeeRelay, FlashLender,
    StablePool, WrappedNative,
};
pub use ledger::Ledger;
