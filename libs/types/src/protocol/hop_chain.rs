//! Hops and validated hop chains
//!
//! A [`HopChain`] is built once from caller input and then only traversed. The
//! constructor enforces the two structural invariants (at least one hop, and each
//! hop consuming exactly what the previous one produced), so downstream code can
//! rely on them without re-checking.

use crate::common::errors::ChainError;
use crate::common::identifiers::PoolReference;
use ethers_core::types::Address;
use serde::{Deserialize, Serialize};

/// One swap through one pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hop {
    pub pool: PoolReference,
    pub token_in: Address,
    pub token_out: Address,
}

impl Hop {
    pub fn new(pool: PoolReference, token_in: Address, token_out: Address) -> Self {
        Self {
            pool,
            token_in,
            token_out,
        }
    }
}

/// Ordered, non-empty, token-continuous sequence of hops
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HopChain {
    hops: Vec<Hop>,
}

impl HopChain {
    pub fn new(hops: Vec<Hop>) -> Result<Self, ChainError> {
        if hops.is_empty() {
            return Err(ChainError::Empty);
        }

        for (index, hop) in hops.iter().enumerate() {
            if hop.token_in == hop.token_out {
                return Err(ChainError::SelfSwap {
                    index,
                    token: hop.token_in,
                });
            }
        }

        for (index, pair) in hops.windows(2).enumerate() {
            if pair[0].token_out != pair[1].token_in {
                return Err(ChainError::Discontinuous {
                    index: index + 1,
                    expected: pair[1].token_in,
                    found: pair[0].token_out,
                });
            }
        }

        Ok(Self { hops })
    }

    /// Build from parallel arrays: `tokens[i] -> tokens[i+1]` through `pools[i]`
    pub fn from_parts(pools: &[PoolReference], tokens: &[Address]) -> Result<Self, ChainError> {
        if tokens.len() != pools.len() + 1 {
            return Err(ChainError::Shape(format!(
                "{} pools need {} tokens, got {}",
                pools.len(),
                pools.len() + 1,
                tokens.len()
            )));
        }

        let hops = pools
            .iter()
            .zip(tokens.windows(2))
            .map(|(pool, pair)| Hop::new(*pool, pair[0], pair[1]))
            .collect();

        Self::new(hops)
    }

    pub fn hops(&self) -> &[Hop] {
        &self.hops
    }

    pub fn len(&self) -> usize {
        self.hops.len()
    }

    /// Always false; kept for API symmetry with `len`
    pub fn is_empty(&self) -> bool {
        self.hops.is_empty()
    }

    pub fn first(&self) -> &Hop {
        &self.hops[0]
    }

    pub fn last(&self) -> &Hop {
        &self.hops[self.hops.len() - 1]
    }

    pub fn start_token(&self) -> Address {
        self.first().token_in
    }

    pub fn end_token(&self) -> Address {
        self.last().token_out
    }

    /// Ends in the token it starts with
    pub fn is_closed(&self) -> bool {
        self.start_token() == self.end_token()
    }

    pub fn ensure_closed(&self) -> Result<(), ChainError> {
        if self.is_closed() {
            Ok(())
        } else {
            Err(ChainError::NotClosed {
                start: self.start_token(),
                end: self.end_token(),
            })
        }
    }

    /// Tokens visited in order, including the starting token
    pub fn token_path(&self) -> Vec<Address> {
        std::iter::once(self.start_token())
            .chain(self.hops.iter().map(|h| h.token_out))
            .collect()
    }
}
