//! # Arbitrage Types Library
//!
//! Shared value types for the atomic flash arbitrage engine and the interface of
//! the execution environment it runs inside.
//!
//! ## Design Philosophy
//!
//! - **Raw Integer Accounting**: every on-chain quantity is a `U256` in the token's
//!   smallest unit; decimals exist only for scaling quotes and fixtures
//! - **Closed Protocol Set**: [`ProtocolVariant`] enumerates every supported pool
//!   family so dispatch is an exhaustive `match`
//! - **Validated Chains**: a [`HopChain`] can only be built through a constructor that
//!   checks non-emptiness and token continuity, and has no mutators
//! - **Environment Boundary**: the [`Host`] trait is the only way the engine touches
//!   balances, pools and lenders; atomicity comes from its checkpoint API
//!
//! ## Quick Start
//!
//! ```rust
//! use arb_types::{Address, Hop, HopChain, PoolReference, ProtocolVariant, ConcentratedFlavor};
//!
//! let weth = Address::from_low_u64_be(1);
//! let usdc = Address::from_low_u64_be(2);
//! let v2 = PoolReference::new(Address::from_low_u64_be(10), ProtocolVariant::constant_product(30));
//! let v3 = PoolReference::new(
//!     Address::from_low_u64_be(11),
//!     ProtocolVariant::Concentrated { flavor: ConcentratedFlavor::UniswapV3 },
//! );
//!
//! let chain = HopChain::new(vec![Hop::new(v2, weth, usdc), Hop::new(v3, usdc, weth)]).unwrap();
//! assert!(chain.is_closed());
//! ```
//!
//! ## Integration Points
//!
//! - **arb-amm**: pool math operates on the same `U256` quantities
//! - **chain-sim**: in-memory [`Host`] implementation used by tests and the demo CLI
//! - **flash-arbitrage**: adapters, orchestrator and settlement are written against
//!   these types only

pub mod common;
pub mod protocol;

pub use common::errors::{ChainError, HostError};
pub use common::identifiers::{PoolReference, TokenHandle};
pub use protocol::events::{EventKind, EventSignature, LogEvent};
pub use protocol::hop_chain::{Hop, HopChain};
pub use protocol::host::{
    CallReturn, Callback, CallbackHandler, Checkpoint, CoinIndex, ContractCall, Host, NoCallbacks,
};
pub use protocol::outcome::{BorrowTicket, FundingSource, ProfitResult, SwapOutcome};
pub use protocol::variant::{
    ConcentratedFlavor, CurveInterface, CurveStableKind, PairCallShape, ProtocolFamily,
    ProtocolVariant, StableLayout,
};

pub use ethers_core::types::{Address, I256, U256};

/// Basis-point denominator shared by fees and settlement shares
pub const BPS_DENOMINATOR: u32 = 10_000;
