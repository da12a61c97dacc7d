//! Uniswap V3 sqrt-price mathematics for exact calculations
//!
//! Swaps are computed inside the active liquidity range only. Every
//! concentrated-liquidity flavor the engine supports (Uniswap V3, Sushi V3,
//! Pancake V3, Algebra) shares these formulas; they differ in where the fee
//! is read from, not in how it is applied.

use anyhow::{bail, Context, Result};
use ethers_core::types::{U256, U512};
use rust_decimal::Decimal;

/// Lowest sqrt ratio a pool accepts (tick -887272)
pub const MIN_SQRT_RATIO: U256 = U256([4295128739, 0, 0, 0]);

/// Highest sqrt ratio a pool accepts (tick 887272)
pub const MAX_SQRT_RATIO: U256 = U256([
    0x5d951d5263988d26,
    0xefd1fc6a50648849,
    0x0000_0000_fffd_8963,
    0,
]);

/// 2^96
pub const Q96: U256 = U256([0, 1 << 32, 0, 0]);

const PIPS: u64 = 1_000_000;

/// V3 pool state within its active range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct V3PoolState {
    pub sqrt_price_x96: U256,
    pub liquidity: u128,
    pub fee_pips: u32, // Fee in pips (3000 = 0.3%)
}

/// Exact-input swap result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct V3SwapResult {
    /// Input consumed, fee included
    pub amount_in: U256,
    pub amount_out: U256,
    pub sqrt_price_after: U256,
    pub fee_amount: U256,
}

/// V3 AMM math with sqrt-price calculations
pub struct V3Math;

impl V3Math {
    /// Exact-input swap against a single liquidity range
    pub fn swap_exact_input(
        pool: &V3PoolState,
        amount_in: U256,
        zero_for_one: bool, // true = token0 -> token1
    ) -> Result<V3SwapResult> {
        if amount_in.is_zero() {
            bail!("Input amount must be positive");
        }
        if pool.liquidity == 0 {
            bail!("Pool has no active liquidity");
        }
        if pool.fee_pips as u64 >= PIPS {
            bail!("Fee of {} pips leaves nothing to swap", pool.fee_pips);
        }

        let less_fee = Self::mul_div(
            amount_in,
            U256::from(PIPS - pool.fee_pips as u64),
            U256::from(PIPS),
        )?;
        let fee_amount = amount_in - less_fee;

        let sqrt_price_after = Self::next_sqrt_price_from_input(
            pool.sqrt_price_x96,
            pool.liquidity,
            less_fee,
            zero_for_one,
        )?;

        if sqrt_price_after <= MIN_SQRT_RATIO || sqrt_price_after >= MAX_SQRT_RATIO {
            bail!("Swap moves price outside the valid sqrt range");
        }

        let amount_out = if zero_for_one {
            Self::amount1_delta(sqrt_price_after, pool.sqrt_price_x96, pool.liquidity)?
        } else {
            Self::amount0_delta(pool.sqrt_price_x96, sqrt_price_after, pool.liquidity)?
        };

        Ok(V3SwapResult {
            amount_in,
            amount_out,
            sqrt_price_after,
            fee_amount,
        })
    }

    /// New sqrt price after adding `amount` of the input token
    pub fn next_sqrt_price_from_input(
        sqrt_price_x96: U256,
        liquidity: u128,
        amount: U256,
        zero_for_one: bool,
    ) -> Result<U256> {
        if sqrt_price_x96.is_zero() || liquidity == 0 {
            bail!("Sqrt price and liquidity must be positive");
        }
        if amount.is_zero() {
            return Ok(sqrt_price_x96);
        }

        let liquidity = U256::from(liquidity);
        if zero_for_one {
            // ceil(L * 2^96 * sqrtP / (L * 2^96 + amount * sqrtP))
            let numerator1 = U512::from(liquidity) << 96;
            let numerator = numerator1 * U512::from(sqrt_price_x96);
            let denominator = numerator1 + amount.full_mul(sqrt_price_x96);
            Self::narrow(Self::div_rounding_up(numerator, denominator))
        } else {
            let step = Self::mul_div(amount, Q96, liquidity)?;
            sqrt_price_x96
                .checked_add(step)
                .context("Sqrt price overflow")
        }
    }

    /// Token0 released between two prices, rounded down
    pub fn amount0_delta(sqrt_lower: U256, sqrt_upper: U256, liquidity: u128) -> Result<U256> {
        let (lower, upper) = Self::ordered(sqrt_lower, sqrt_upper);
        if lower.is_zero() {
            bail!("Sqrt price must be positive");
        }
        let numerator1 = U512::from(U256::from(liquidity)) << 96;
        let scaled = numerator1 * U512::from(upper - lower) / U512::from(upper);
        Self::narrow(scaled / U512::from(lower))
    }

    /// Token1 released between two prices, rounded down
    pub fn amount1_delta(sqrt_lower: U256, sqrt_upper: U256, liquidity: u128) -> Result<U256> {
        let (lower, upper) = Self::ordered(sqrt_lower, sqrt_upper);
        Self::mul_div(U256::from(liquidity), upper - lower, Q96)
    }

    /// sqrtPriceX96 for a pool holding `amount0` and `amount1` at the same value
    pub fn sqrt_price_from_amounts(amount0: U256, amount1: U256) -> Result<U256> {
        if amount0.is_zero() || amount1.is_zero() {
            bail!("Amounts must be positive");
        }
        let ratio_x192 = (U512::from(amount1) << 192) / U512::from(amount0);
        Self::narrow(ratio_x192.integer_sqrt())
    }

    /// Liquidity equivalent to virtual reserves `amount0` / `amount1`
    pub fn liquidity_from_amounts(amount0: U256, amount1: U256) -> Result<u128> {
        let root = amount0.full_mul(amount1).integer_sqrt();
        let root = Self::narrow(root)?;
        if root > U256::from(u128::MAX) {
            bail!("Liquidity exceeds u128");
        }
        Ok(root.as_u128())
    }

    /// Token1 per token0, ignoring decimals
    pub fn spot_price(sqrt_price_x96: U256) -> Result<Decimal> {
        let scale = U256::exp10(18);
        let squared = sqrt_price_x96.full_mul(sqrt_price_x96);
        let scaled = Self::narrow((squared * U512::from(scale)) >> 192)?;
        Ok(crate::to_decimal(scaled)? / crate::to_decimal(scale)?)
    }

    /// floor(a * b / denominator) with a 512-bit intermediate
    pub fn mul_div(a: U256, b: U256, denominator: U256) -> Result<U256> {
        if denominator.is_zero() {
            bail!("Division by zero");
        }
        Self::narrow(a.full_mul(b) / U512::from(denominator))
    }

    /// ceil(a * b / denominator) with a 512-bit intermediate
    pub fn mul_div_rounding_up(a: U256, b: U256, denominator: U256) -> Result<U256> {
        if denominator.is_zero() {
            bail!("Division by zero");
        }
        Self::narrow(Self::div_rounding_up(
            a.full_mul(b),
            U512::from(denominator),
        ))
    }

    fn div_rounding_up(numerator: U512, denominator: U512) -> U512 {
        let (quotient, remainder) = numerator.div_mod(denominator);
        if remainder.is_zero() {
            quotient
        } else {
            quotient + U512::one()
        }
    }

    fn narrow(value: U512) -> Result<U256> {
        U256::try_from(value).map_err(|_| anyhow::anyhow!("Result exceeds 256 bits"))
    }

    fn ordered(a: U256, b: U256) -> (U256, U256) {
        if a <= b {
            (a, b)
        } else {
            (b, a)
        }
    }
}
