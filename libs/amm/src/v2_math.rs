//! Uniswap V2 AMM math with exact integer calculations
//!
//! Matches the pair contract's rounding: outputs round down, so a quote from
//! here always satisfies the pair's K check.

use anyhow::{bail, Context, Result};
use ethers_core::types::U256;
use rust_decimal::Decimal;

const BPS: u64 = 10_000;

/// V2 AMM math functions
pub struct V2Math;

impl V2Math {
    /// Exact output amount for Uniswap V2 using the x*y=k formula
    ///
    /// # Arguments
    /// * `amount_in` - Input token amount (raw units)
    /// * `reserve_in` - Input token reserve (raw units)
    /// * `reserve_out` - Output token reserve (raw units)
    /// * `fee_bps` - Fee in basis points (30 = 0.3%)
    pub fn get_amount_out(
        amount_in: U256,
        reserve_in: U256,
        reserve_out: U256,
        fee_bps: u32,
    ) -> Result<U256> {
        if amount_in.is_zero() {
            bail!("Input amount must be positive");
        }
        if reserve_in.is_zero() || reserve_out.is_zero() {
            bail!("Reserves must be positive");
        }
        if fee_bps as u64 >= BPS {
            bail!("Fee of {} bps leaves nothing to swap", fee_bps);
        }

        let amount_in_with_fee = amount_in
            .checked_mul(U256::from(BPS - fee_bps as u64))
            .context("Overflow applying fee")?;
        let numerator = amount_in_with_fee
            .checked_mul(reserve_out)
            .context("Overflow in output numerator")?;
        let denominator = reserve_in
            .checked_mul(U256::from(BPS))
            .and_then(|r| r.checked_add(amount_in_with_fee))
            .context("Overflow in output denominator")?;

        Ok(numerator / denominator)
    }

    /// Portion of an input that stays in the pool when the fee is forwarded elsewhere
    pub fn amount_after_fee(amount_in: U256, fee_bps: u32) -> U256 {
        let kept = BPS.saturating_sub(fee_bps as u64);
        amount_in.saturating_mul(U256::from(kept)) / U256::from(BPS)
    }

    /// Fee-adjusted invariant check the pair performs after a swap
    ///
    /// `(b0*10000 - in0*fee) * (b1*10000 - in1*fee) >= r0 * r1 * 10000^2`
    pub fn invariant_holds(
        balances: (U256, U256),
        amounts_in: (U256, U256),
        reserves: (U256, U256),
        fee_bps: u32,
    ) -> bool {
        let fee = U256::from(fee_bps);
        let scale = U256::from(BPS);

        let adjusted = |balance: U256, amount_in: U256| {
            balance
                .checked_mul(scale)
                .and_then(|b| b.checked_sub(amount_in.saturating_mul(fee)))
        };

        let (Some(adj0), Some(adj1)) = (
            adjusted(balances.0, amounts_in.0),
            adjusted(balances.1, amounts_in.1),
        ) else {
            return false;
        };

        let lhs = adj0.full_mul(adj1);
        let rhs = reserves.0.full_mul(reserves.1) * ethers_core::types::U512::from(BPS * BPS);
        lhs >= rhs
    }

    /// Spot price of the input token in output units (reserve_out / reserve_in)
    pub fn spot_price(reserve_in: U256, reserve_out: U256) -> Result<Decimal> {
        if reserve_in.is_zero() {
            bail!("Reserve must be positive for spot price");
        }
        let reserve_in = crate::to_decimal(reserve_in)?;
        let reserve_out = crate::to_decimal(reserve_out)?;
        Ok(reserve_out / reserve_in)
    }

}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn e18(n: u64) -> U256 {
        U256::from(n) * U256::exp10(18)
    }

    #[test]
    fn test_v2_output_calculation() {
        // 1000 / 1000 pool, 10 in at 0.3%
        let out = V2Math::get_amount_out(e18(10), e18(1000), e18(1000), 30).unwrap();

        // Uniswap reference: 9.871580343970612988
        assert_eq!(out, U256::from_dec_str("9871580343970612988").unwrap());
    }

    #[test]
    fn test_invalid_inputs_rejected() {
        assert!(V2Math::get_amount_out(U256::zero(), e18(1), e18(1), 30).is_err());
        assert!(V2Math::get_amount_out(e18(1), U256::zero(), e18(1), 30).is_err());
    }

    #[test]
    fn test_forwarded_fee_portion() {
        let half = U256::from(500_000_000u64);
        assert_eq!(
            V2Math::amount_after_fee(half, 20),
            U256::from(499_000_000u64)
        );
    }

    proptest! {
        #[test]
        fn prop_quoted_output_passes_invariant(
            r0 in 1_000_000u64..u64::MAX / 4,
            r1 in 1_000_000u64..u64::MAX / 4,
            amount in 1_000u64..1_000_000_000u64,
            fee in 0u32..100,
        ) {
            let (r0, r1, amount) = (U256::from(r0), U256::from(r1), U256::from(amount));
            let out = V2Math::get_amount_out(amount, r0, r1, fee).unwrap();
            prop_assume!(!out.is_zero());

            let balances = (r0 + amount, r1 - out);
            prop_assert!(V2Math::invariant_holds(balances, (amount, U256::zero()), (r0, r1), fee));

            let greedy = (r0 + amount, r1 - out - 1);
            prop_assert!(!V2Math::invariant_holds(greedy, (amount, U256::zero()), (r0, r1), fee));
        }
    }
}
