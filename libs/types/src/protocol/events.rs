//! Event log entries emitted by contracts in the host environment

use ethers_core::types::{Address, I256, U256};
use std::fmt;

/// Event name as a pool ABI would declare it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventSignature {
    Swap,
    TokenExchange,
    TokenExchangeUnderlying,
    FlashLoan,
    RelayPayment,
}

impl fmt::Display for EventSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Swap => "Swap",
            Self::TokenExchange => "TokenExchange",
            Self::TokenExchangeUnderlying => "TokenExchangeUnderlying",
            Self::FlashLoan => "FlashLoan",
            Self::RelayPayment => "RelayPayment",
        };
        f.write_str(name)
    }
}

/// Decoded event payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    /// Constant-product pair swap
    PairSwap {
        sender: Address,
        to: Address,
        amount0_in: U256,
        amount1_in: U256,
        amount0_out: U256,
        amount1_out: U256,
    },
    /// Concentrated-liquidity swap with signed pool-side deltas
    PoolSwap {
        sender: Address,
        recipient: Address,
        amount0: I256,
        amount1: I256,
        sqrt_price_x96: U256,
    },
    TokenExchange {
        buyer: Address,
        sold_id: u32,
        tokens_sold: U256,
        bought_id: u32,
        tokens_bought: U256,
    },
    TokenExchangeUnderlying {
        buyer: Address,
        sold_id: u32,
        tokens_sold: U256,
        bought_id: u32,
        tokens_bought: U256,
    },
    FlashLoan {
        receiver: Address,
        token: Address,
        amount: U256,
        fee: U256,
    },
    RelayPayment { payer: Address, amount: U256 },
}

impl EventKind {
    pub fn signature(&self) -> EventSignature {
        match self {
            Self::PairSwap { .. } | Self::PoolSwap { .. } => EventSignature::Swap,
            Self::TokenExchange { .. } => EventSignature::TokenExchange,
            Self::TokenExchangeUnderlying { .. } => EventSignature::TokenExchangeUnderlying,
            Self::FlashLoan { .. } => EventSignature::FlashLoan,
            Self::RelayPayment { .. } => EventSignature::RelayPayment,
        }
    }
}

/// One log entry: who emitted it and what it says
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEvent {
    pub emitter: Address,
    pub kind: EventKind,
}

impl LogEvent {
    pub fn new(emitter: Address, kind: EventKind) -> Self {
        Self { emitter, kind }
    }

    pub fn signature(&self) -> EventSignature {
        self.kind.signature()
    }
}
