//! Error types for hop-chain validation and host-environment failures
//!
//! `ChainError` covers structural problems detected before any pool is touched.
//! `HostError` is what the execution environment reports when a transfer, call or
//! checkpoint operation fails; callers decide how to classify it.

use ethers_core::types::{Address, U256};
use thiserror::Error;

/// Structural hop-chain violations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChainError {
    /// A chain must contain at least one hop
    #[error("hop chain is empty")]
    Empty,

    /// hop[i].token_out must equal hop[i+1].token_in
    #[error("hop {index} consumes {expected:?} but the previous hop produced {found:?}")]
    Discontinuous {
        index: usize,
        expected: Address,
        found: Address,
    },

    /// A hop may not swap a token into itself
    #[error("hop {index} swaps {token:?} into itself")]
    SelfSwap { index: usize, token: Address },

    /// Funded chains must end in the token they borrowed
    #[error("chain starts in {start:?} but ends in {end:?}")]
    NotClosed { start: Address, end: Address },

    /// Parallel argument arrays do not line up
    #[error("argument shape mismatch: {0}")]
    Shape(String),
}

/// Failures reported by the execution environment
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HostError {
    #[error("insufficient {token:?} balance for {owner:?}: have {available}, need {required}")]
    InsufficientBalance {
        token: Address,
        owner: Address,
        available: U256,
        required: U256,
    },

    #[error("insufficient {token:?} allowance from {owner:?} to {spender:?}: have {available}, need {required}")]
    InsufficientAllowance {
        token: Address,
        owner: Address,
        spender: Address,
        available: U256,
        required: U256,
    },

    #[error("insufficient native balance for {owner:?}: have {available}, need {required}")]
    InsufficientNative {
        owner: Address,
        available: U256,
        required: U256,
    },

    /// The receiving account refused the transfer
    #[error("transfer to {recipient:?} rejected")]
    TransferRejected { recipient: Address },

    #[error("no contract deployed at {0:?}")]
    NoContract(Address),

    /// The target is already executing further up the call stack
    #[error("contract {0:?} is locked")]
    Locked(Address),

    /// The target does not implement the requested entry point
    #[error("contract {target:?} does not implement {selector}")]
    UnrecognizedSelector {
        target: Address,
        selector: &'static str,
    },

    #[error("call to {target:?} reverted: {reason}")]
    Reverted { target: Address, reason: String },

    /// A callback handler refused to continue
    #[error("callback rejected: {0}")]
    CallbackRejected(String),

    #[error("unexpected return data from {target:?}: expected {expected}")]
    BadReturn {
        target: Address,
        expected: &'static str,
    },

    #[error("unknown checkpoint {0}")]
    UnknownCheckpoint(usize),
}

impl HostError {
    pub fn reverted(target: Address, reason: impl Into<String>) -> Self {
        Self::Reverted {
            target,
            reason: reason.into(),
        }
    }

    /// True when the failure means the target does not speak the requested call shape
    pub fn is_interface_mismatch(&self) -> bool {
        matches!(
            self,
            Self::UnrecognizedSelector { .. } | Self::NoContract(_) | Self::BadReturn { .. }
        )
    }
}
