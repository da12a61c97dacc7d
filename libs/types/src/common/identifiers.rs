//! Token and pool identifiers
//!
//! Addresses are the identity of both assets and pools. A `TokenHandle` adds the
//! token's decimals for quote scaling; accounting never consults it.

use crate::protocol::variant::ProtocolVariant;
use ethers_core::types::{Address, U256};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Fungible asset plus its decimals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TokenHandle {
    pub address: Address,
    pub decimals: u8,
}

impl TokenHandle {
    pub fn new(address: Address, decimals: u8) -> Self {
        Self { address, decimals }
    }

    /// One whole token in raw units (`10^decimals`)
    pub fn unit(&self) -> U256 {
        U256::exp10(self.decimals as usize)
    }

    /// `whole` tokens in raw units
    pub fn amount(&self, whole: u64) -> U256 {
        self.unit() * U256::from(whole)
    }

    /// `10^(decimals/2)`, the sample size used for low-impact scenario runs
    pub fn sample_amount(&self) -> U256 {
        U256::exp10((self.decimals / 2) as usize)
    }
}

impl fmt::Display for TokenHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}({}dp)", self.address, self.decimals)
    }
}

/// A deployed pool and the protocol variant it must be dispatched through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PoolReference {
    pub address: Address,
    pub protocol: ProtocolVariant,
}

impl PoolReference {
    pub fn new(address: Address, protocol: ProtocolVariant) -> Self {
        Self { address, protocol }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_scaling() {
        let usdc = TokenHandle::new(Address::from_low_u64_be(2), 6);
        assert_eq!(usdc.unit(), U256::from(1_000_000u64));
        assert_eq!(usdc.amount(5), U256::from(5_000_000u64));
        assert_eq!(usdc.sample_amount(), U256::from(1_000u64));

        let weth = TokenHandle::new(Address::from_low_u64_be(1), 18);
        assert_eq!(weth.sample_amount(), U256::from(1_000_000_000u64));
    }
}
