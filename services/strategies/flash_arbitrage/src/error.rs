//! Engine error taxonomy
//!
//! Every variant aborts the execution; the orchestrator reverts the host to the
//! checkpoint taken before funding, so callers see either full success or no
//! change at all.

use arb_types::{Address, ChainError, HostError, U256};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// Structural hop-chain problem, detected before any pool is touched
    #[error("invalid hop chain: {0}")]
    InvalidChain(#[from] ChainError),

    /// Registry has no entry for the key or id
    #[error("unknown protocol: {0}")]
    UnknownProtocol(String),

    /// The pool rejected the call shape its declared protocol implies
    #[error("pool {pool:?} does not support the declared protocol: {reason}")]
    UnsupportedProtocol { pool: Address, reason: String },

    /// Zero realized output or the pool's settlement event did not fire
    #[error("insufficient output from {pool:?}: {reason}")]
    InsufficientOutput { pool: Address, reason: String },

    #[error("hop {index} failed: {source}")]
    HopFailed {
        index: usize,
        #[source]
        source: Box<EngineError>,
    },

    /// The engine cannot cover principal plus fee when closing the borrow
    #[error("repayment shortfall: owe {owed}, hold {available}")]
    RepaymentShortfall { owed: U256, available: U256 },

    #[error("unprofitable: gross {gross_out}, owed {owed}")]
    Unprofitable { gross_out: U256, owed: U256 },

    #[error("settlement transfer to {recipient:?} failed: {reason}")]
    SettlementTransferFailed { recipient: Address, reason: String },

    /// Funding index does not name a flash swap or a configured lender
    #[error("unknown funding source index {0}")]
    UnknownFundingSource(u8),

    #[error("unexpected callback from {caller:?}: {reason}")]
    UnexpectedCallback { caller: Address, reason: String },

    /// The borrow continuation was invoked more than once
    #[error("flash-borrow callback invoked again by {0:?}")]
    ReentrantCallback(Address),

    #[error("caller {0:?} is not the owner")]
    Unauthorized(Address),

    /// Host failure outside a hop
    #[error("host error: {0}")]
    Host(#[from] HostError),
}

impl EngineError {
    pub fn hop_failed(index: usize, source: EngineError) -> Self {
        Self::HopFailed {
            index,
            source: Box::new(source),
        }
    }

    pub fn unsupported(pool: Address, reason: impl Into<String>) -> Self {
        Self::UnsupportedProtocol {
            pool,
            reason: reason.into(),
        }
    }

    pub fn insufficient_output(pool: Address, reason: impl Into<String>) -> Self {
        Self::InsufficientOutput {
            pool,
            reason: reason.into(),
        }
    }

    /// Classify a failed pool call: a call shape the pool does not speak means the
    /// declared protocol is wrong, anything else is a plain host failure
    pub fn from_pool_call(pool: Address, err: HostError) -> Self {
        if err.is_interface_mismatch() {
            Self::unsupported(pool, err.to_string())
        } else {
            Self::Host(err)
        }
    }

    /// Innermost error, looking through `HopFailed` wrappers
    pub fn root_cause(&self) -> &EngineError {
        match self {
            Self::HopFailed { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_call_classification() {
        let pool = Address::from_low_u64_be(5);
        let mismatch = HostError::UnrecognizedSelector {
            target: pool,
            selector: "fee()",
        };
        assert!(matches!(
            EngineError::from_pool_call(pool, mismatch),
            EngineError::UnsupportedProtocol { .. }
        ));

        let revert = HostError::reverted(pool, "K");
        assert_eq!(
            EngineError::from_pool_call(pool, revert.clone()),
            EngineError::Host(revert)
        );
    }

    #[test]
    fn test_root_cause_unwraps_hops() {
        let inner = EngineError::insufficient_output(Address::zero(), "no event");
        let wrapped = EngineError::hop_failed(2, EngineError::hop_failed(1, inner.clone()));
        assert_eq!(wrapped.root_cause(), &inner);
        assert!(wrapped.to_string().starts_with("hop 2 failed"));
    }
}
