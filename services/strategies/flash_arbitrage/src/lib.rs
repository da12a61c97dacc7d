//! # Flash Arbitrage Engine - Atomic Multi-Protocol Execution
//!
//! ## Purpose
//!
//! Executes an ordered chain of pool hops across structurally different AMM
//! families as one atomic unit: borrow the input with a flash swap or flash
//! loan, run every hop on the previous hop's realized output, repay the lender
//! inside its callback, then split the profit between the block-builder relay
//! and the owner. If any step fails, or there is no profit, the host is reverted
//! to where it was before the attempt.
//!
//! ## Architecture Role
//!
//! ```text
//! (ids, pools, tokens) ──▶ DexRegistry ──▶ HopChain
//!                                             │
//!                    ArbitrageEngine ◀────────┘
//!                      │ checkpoint
//!                      ├─▶ Funding: flash swap │ flash loan │ prefunded
//!                      │      └─▶ FlashBorrowCallback ──▶ PoolAdapter × n ──▶ repay
//!                      ├─▶ ProfitResult (net <= 0 ⇒ Unprofitable)
//!                      └─▶ ProfitSettlement ──▶ relay (native) + owner (token)
//! ```
//!
//! ## Supported Pool Families
//!
//! - **Constant product**: Uniswap V2 and its forks, including the legacy
//!   three-argument `swap` of BakerySwap
//! - **Concentrated liquidity**: Uniswap V3, SushiSwap V3, PancakeSwap V3, Algebra
//! - **Curve StableSwap**: Interface1/Interface2/NG, plain, lending and metapools
//! - **Curve CryptoSwap**: two-coin and TriCrypto pools
//!
//! ## Execution Environment
//!
//! The engine is written against [`arb_types::Host`]. `chain-sim` provides an
//! in-memory host with every pool family, used by the tests and the `demo`
//! subcommand.

pub mod adapters;
pub mod callback;
pub mod config;
pub mod demo;
pub mod error;
pub mod logging;
pub mod orchestrator;
pub mod registry;
pub mod settlement;

pub use adapters::{PoolAdapter, QuoteHint, SwapRequest};
pub use callback::{ClosedBorrow, FlashBorrowCallback};
pub use error::EngineError;
pub use orchestrator::{
    ArbitrageEngine, DirectSwap, ExecutionReport, HopRecord, Phase, TwoPoolRoute,
};
pub use registry::{DexEntry, DexRegistry, RegistryError};
pub use settlement::{ProfitSettlement, RelayShare, SettlementReceipt};
