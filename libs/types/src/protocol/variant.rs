//! # Protocol Variants - Closed Set of Pool Call Conventions
//!
//! Every pool the engine can route through belongs to exactly one
//! [`ProtocolVariant`]. The variant carries the sub-tag that selects a call shape
//! (legacy pair `swap`, V3 fork callback, Curve interface generation) so adapters
//! never have to guess by probing.
//!
//! Registry data files serialize the variant as an internally tagged object:
//!
//! ```json
//! { "family": "constant_product", "fee_bps": 20 }
//! { "family": "concentrated", "flavor": "algebra" }
//! { "family": "curve_stable", "kind": "ng_meta_pool_underlying" }
//! { "family": "curve_crypto" }
//! ```

use crate::protocol::events::EventSignature;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Pool family plus the sub-tag that fixes its call shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "family", rename_all = "snake_case")]
pub enum ProtocolVariant {
    /// x*y=k pair; `fee_bps` is the configured fee used when the pair does not report one
    ConstantProduct {
        fee_bps: u32,
        #[serde(default)]
        shape: PairCallShape,
    },
    /// Concentrated liquidity pool settled through a swap callback
    Concentrated { flavor: ConcentratedFlavor },
    /// Curve StableSwap pool
    CurveStable { kind: CurveStableKind },
    /// Curve CryptoSwap pool (two-coin, TwoCrypto-NG and TriCrypto share one shape)
    CurveCrypto,
}

impl ProtocolVariant {
    /// Standard constant-product pair with a configured fee
    pub fn constant_product(fee_bps: u32) -> Self {
        Self::ConstantProduct {
            fee_bps,
            shape: PairCallShape::Standard,
        }
    }

    pub fn family(&self) -> ProtocolFamily {
        match self {
            Self::ConstantProduct { .. } => ProtocolFamily::ConstantProduct,
            Self::Concentrated { .. } => ProtocolFamily::Concentrated,
            Self::CurveStable { .. } => ProtocolFamily::CurveStable,
            Self::CurveCrypto => ProtocolFamily::CurveCrypto,
        }
    }

    /// Event the pool must emit for a swap through this variant to count as settled
    pub fn expected_event(&self) -> EventSignature {
        match self {
            Self::ConstantProduct { .. } | Self::Concentrated { .. } => EventSignature::Swap,
            Self::CurveStable { kind } => kind.expected_event(),
            Self::CurveCrypto => EventSignature::TokenExchange,
        }
    }

    /// Whether the pool can lend its output before being paid (flash swap)
    pub fn supports_flash_swap(&self) -> bool {
        match self {
            Self::ConstantProduct { shape, .. } => *shape == PairCallShape::Standard,
            Self::Concentrated { .. } => true,
            Self::CurveStable { .. } | Self::CurveCrypto => false,
        }
    }
}

impl fmt::Display for ProtocolVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConstantProduct { fee_bps, shape } => {
                write!(f, "constant_product({}bps, {:?})", fee_bps, shape)
            }
            Self::Concentrated { flavor } => write!(f, "concentrated({:?})", flavor),
            Self::CurveStable { kind } => write!(f, "curve_stable({:?})", kind),
            Self::CurveCrypto => write!(f, "curve_crypto"),
        }
    }
}

/// Coarse family, used for logging and funding decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProtocolFamily {
    ConstantProduct,
    Concentrated,
    CurveStable,
    CurveCrypto,
}

/// Pair `swap` entry point generation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PairCallShape {
    /// `swap(amount0Out, amount1Out, to, data)`
    #[default]
    Standard,
    /// `swap(amount0Out, amount1Out, to)` with no flash-swap data (BakerySwap)
    Legacy,
}

/// V3 fork, selects fee query and callback name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConcentratedFlavor {
    UniswapV3,
    SushiswapV3,
    PancakeV3,
    /// Algebra-based pools (THENA FUSION): dynamic fee in `globalState()`
    Algebra,
}

impl ConcentratedFlavor {
    pub fn callback_name(&self) -> &'static str {
        match self {
            Self::UniswapV3 | Self::SushiswapV3 => "uniswapV3SwapCallback",
            Self::PancakeV3 => "pancakeV3SwapCallback",
            Self::Algebra => "algebraSwapCallback",
        }
    }

    /// Algebra pools expose their fee through `globalState()` rather than `fee()`
    pub fn fee_in_global_state(&self) -> bool {
        matches!(self, Self::Algebra)
    }
}

/// Curve StableSwap interface generation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CurveInterface {
    /// Oldest pools: `coins(int128)`, `underlying_coins(int128)`
    V1,
    /// `coins(uint256)`
    V2,
    /// StableSwap-NG: `coins(uint256)` plus off-peg dynamic fee
    Ng,
}

/// Curve StableSwap pool layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StableLayout {
    Plain,
    /// Wrapped lending tokens with an underlying leg
    Lending,
    /// Coin 0 paired against a base pool's LP token
    Meta,
}

/// The nine Curve StableSwap call shapes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CurveStableKind {
    Interface1Plain,
    Interface1Underlying,
    Interface2Plain,
    Interface2Underlying,
    Interface2MetaPoolPlain,
    Interface2MetaPoolUnderlying,
    NgPlain,
    NgMetaPoolPlain,
    NgMetaPoolUnderlying,
}

impl CurveStableKind {
    pub const ALL: [CurveStableKind; 9] = [
        Self::Interface1Plain,
        Self::Interface1Underlying,
        Self::Interface2Plain,
        Self::Interface2Underlying,
        Self::Interface2MetaPoolPlain,
        Self::Interface2MetaPoolUnderlying,
        Self::NgPlain,
        Self::NgMetaPoolPlain,
        Self::NgMetaPoolUnderlying,
    ];

    pub fn interface(&self) -> CurveInterface {
        match self {
            Self::Interface1Plain | Self::Interface1Underlying => CurveInterface::V1,
            Self::Interface2Plain
            | Self::Interface2Underlying
            | Self::Interface2MetaPoolPlain
            | Self::Interface2MetaPoolUnderlying => CurveInterface::V2,
            Self::NgPlain | Self::NgMetaPoolPlain | Self::NgMetaPoolUnderlying => {
                CurveInterface::Ng
            }
        }
    }

    pub fn layout(&self) -> StableLayout {
        match self {
            Self::Interface1Plain | Self::Interface2Plain | Self::NgPlain => StableLayout::Plain,
            Self::Interface1Underlying | Self::Interface2Underlying => StableLayout::Lending,
            Self::Interface2MetaPoolPlain
            | Self::Interface2MetaPoolUnderlying
            | Self::NgMetaPoolPlain
            | Self::NgMetaPoolUnderlying => StableLayout::Meta,
        }
    }

    /// Routes through `exchange_underlying` instead of `exchange`
    pub fn uses_underlying(&self) -> bool {
        matches!(
            self,
            Self::Interface1Underlying
                | Self::Interface2Underlying
                | Self::Interface2MetaPoolUnderlying
                | Self::NgMetaPoolUnderlying
        )
    }

    pub fn expected_event(&self) -> EventSignature {
        if self.uses_underlying() {
            EventSignature::TokenExchangeUnderlying
        } else {
            EventSignature::TokenExchange
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variant_serialization_shape() {
        let v: ProtocolVariant =
            serde_json::from_str(r#"{"family":"constant_product","fee_bps":20}"#).unwrap();
        assert_eq!(v, ProtocolVariant::constant_product(20));

        let v: ProtocolVariant =
            serde_json::from_str(r#"{"family":"concentrated","flavor":"pancake_v3"}"#).unwrap();
        assert_eq!(
            v,
            ProtocolVariant::Concentrated {
                flavor: ConcentratedFlavor::PancakeV3
            }
        );

        let v: ProtocolVariant =
            serde_json::from_str(r#"{"family":"curve_stable","kind":"ng_meta_pool_underlying"}"#)
                .unwrap();
        assert_eq!(v.expected_event(), EventSignature::TokenExchangeUnderlying);

        let v: ProtocolVariant = serde_json::from_str(r#"{"family":"curve_crypto"}"#).unwrap();
        assert_eq!(v.family(), ProtocolFamily::CurveCrypto);
    }

    #[test]
    fn test_curve_kind_classification() {
        let underlying = CurveStableKind::ALL
            .iter()
            .filter(|k| k.uses_underlying())
            .count();
        assert_eq!(underlying, 4);

        assert_eq!(CurveStableKind::Interface1Plain.interface(), CurveInterface::V1);
        assert_eq!(CurveStableKind::NgMetaPoolPlain.layout(), StableLayout::Meta);
        assert_eq!(
            CurveStableKind::Interface2Underlying.layout(),
            StableLayout::Lending
        );
        assert_eq!(
            CurveStableKind::NgPlain.expected_event(),
            EventSignature::TokenExchange
        );
    }

    #[test]
    fn test_flash_swap_capability() {
        assert!(ProtocolVariant::constant_product(30).supports_flash_swap());
        assert!(!ProtocolVariant::ConstantProduct {
            fee_bps: 30,
            shape: PairCallShape::Legacy
        }
        .supports_flash_swap());
        assert!(ProtocolVariant::Concentrated {
            flavor: ConcentratedFlavor::Algebra
        }
        .supports_flash_swap());
        assert!(!ProtocolVariant::CurveCrypto.supports_flash_swap());
    }
}
