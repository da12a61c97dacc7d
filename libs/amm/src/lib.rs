//! # Arbitrage AMM Library - Exact Pool Mathematics
//!
//! ## Purpose
//!
//! Integer implementations of the swap formulas used by every pool family the
//! engine routes through. The same functions drive the in-memory pool contracts
//! in `chain-sim` and the quote hints the adapters compute before dispatching, so
//! a quote and a simulated fill agree to the last unit.
//!
//! ## Integration Points
//!
//! - **Input Sources**: pool state read through host view calls (reserves,
//!   sqrtPriceX96, Curve balances/rates/amplification)
//! - **Output Destinations**: adapter quote hints, flash-swap sizing, simulated
//!   pool fills
//! - **Protocol Support**: Uniswap V2 and forks, Uniswap V3 / Pancake V3 / Algebra
//!   single-range swaps, Curve StableSwap (legacy, lending, meta, NG), Curve
//!   CryptoSwap (2 and N coins)
//! - **Precision**: on-chain quantities are `U256`; `Decimal` only for diagnostic
//!   prices
//!
//! ## Architecture Role
//!
//! ```text
//! Pool state ──▶ [V2Math | V3Math | StableSwapMath | CryptoSwapMath] ──▶ amount out
//!                         │
//!                         └──▶ to_decimal ──▶ spot price (diagnostics)
//! ```
//!
//! ## Numerical Model
//!
//! - Curve invariants use the same Newton iterations and rounding as the Vyper
//!   contracts, capped at 255 iterations
//! - V3 swaps are exact-input within the active liquidity range; a swap that
//!   would leave the valid sqrt-price range is rejected

pub mod crypto_math;
pub mod decimal;
pub mod stable_math;
pub mod v2_math;
pub mod v3_math;

pub use crypto_math::{CryptoPoolState, CryptoSwapMath};
pub use decimal::to_decimal;
pub use stable_math::{StablePoolState, StableSwapMath};
pub use v2_math::V2Math;
pub use v3_math::{V3Math, V3PoolState, V3SwapResult};

/// Common types for AMM calculations
pub use ethers_core::types::U256;
pub use rust_decimal::Decimal;
