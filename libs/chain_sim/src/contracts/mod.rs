//! Contracts that can be deployed into an [`InMemoryChain`](crate::InMemoryChain)
//!
//! Each contract answers only the call shapes its on-chain counterpart
//! implements; anything else fails with `UnrecognizedSelector`, which is how
//! the engine learns that a pool does not speak the protocol it was told.

use crate::chain::CallEnv;
use arb_types::{CallReturn, CoinIndex, ContractCall, HostError};
use ethers_core::types::{Address, U256};
use std::fmt::Debug;

mod concentrated;
mod crypto;
mod lender;
mod native;
mod pair;
mod stable;

pub use concentrated::ConcentratedPool;
pub use crypto::CryptoPool;
pub use lender::{FeeRelay, FlashLender};
pub use native::WrappedNative;
pub use pair::{ConstantProductPair, FeeMode};
pub use stable::StablePool;

/// Executable contract
pub trait Contract: Debug + Send {
    fn kind(&self) -> &'static str;

    /// Balances minted to the contract's address at deployment
    fn initial_holdings(&self) -> Vec<(Address, U256)> {
        Vec::new()
    }

    fn execute(&mut self, env: &mut CallEnv<'_>, call: ContractCall) -> Result<CallReturn, HostError>;

    fn box_clone(&self) -> Box<dyn Contract>;
}

impl Clone for Box<dyn Contract> {
    fn clone(&self) -> Self {
        self.box_clone()
    }
}

/// Convert AMM math failures into a revert of the executing contract
pub(crate) fn math_revert(target: Address) -> impl Fn(anyhow::Error) -> HostError {
    move |e| HostError::reverted(target, e.to_string())
}

/// Coin index as usize, enforcing the index width the pool declares
pub(crate) fn coin_index(
    env: &CallEnv<'_>,
    call: &ContractCall,
    index: &CoinIndex,
    wide: bool,
) -> Result<usize, HostError> {
    if index.is_int128() == wide {
        return Err(env.unsupported(call));
    }
    index
        .as_usize()
        .ok_or_else(|| env.revert("coin index out of range"))
}
