//! Curve StableSwap invariant math
//!
//! One implementation covers the legacy (`A_PRECISION = 1`) and NG
//! (`A_PRECISION = 100`) pools: the amplification is always carried already
//! multiplied by its precision. Normalized balances (`xp`) are
//! `balance * rate / 1e18`, where a coin with `d` decimals has rate
//! `10^(36 - d)` and a metapool's LP coin uses the base pool's virtual price.

use anyhow::{bail, Context, Result};
use ethers_core::types::U256;
use tracing::trace;

/// 1e18
pub const PRECISION: U256 = U256([1_000_000_000_000_000_000, 0, 0, 0]);

/// Curve fees are expressed in 1e10 units
pub const FEE_DENOMINATOR: U256 = U256([10_000_000_000, 0, 0, 0]);

/// Amplification precision of NG pools
pub const NG_A_PRECISION: u64 = 100;

const MAX_ITERATIONS: usize = 255;

/// Normalized balances wider than this are rejected before iterating
const MAX_XP_BITS: usize = 200;

/// StableSwap pool state as the pool contract stores it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StablePoolState {
    pub balances: Vec<U256>,
    /// Per-coin rate multipliers (1e18 = 18-decimal coin at par)
    pub rates: Vec<U256>,
    /// `A * a_precision`
    pub amp: U256,
    pub a_precision: U256,
    /// Base fee in 1e10 units (4_000_000 = 0.04%)
    pub fee: U256,
    /// NG off-peg multiplier; values at or below 1e10 disable the dynamic fee
    pub offpeg_fee_multiplier: U256,
    pub lp_supply: U256,
}

/// Result of a single-coin withdrawal quote
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WithdrawOneQuote {
    pub amount: U256,
    pub fee: U256,
}

/// StableSwap math functions
pub struct StableSwapMath;

impl StableSwapMath {
    /// Normalized balances
    pub fn xp(balances: &[U256], rates: &[U256]) -> Vec<U256> {
        balances
            .iter()
            .zip(rates)
            .map(|(balance, rate)| *rate * *balance / PRECISION)
            .collect()
    }

    /// Invariant D by Newton iteration
    pub fn get_d(xp: &[U256], amp: U256, a_precision: U256) -> Result<U256> {
        let n = U256::from(xp.len());
        let s = xp.iter().fold(U256::zero(), |acc, x| acc + *x);
        if s.is_zero() {
            return Ok(U256::zero());
        }
        if xp.iter().any(|x| x.is_zero()) {
            bail!("StableSwap balance is zero");
        }

        let ann = amp * n;
        let mut d = s;
        for iteration in 0..MAX_ITERATIONS {
            let mut d_p = d;
            for x in xp {
                d_p = d_p * d / (*x * n);
            }
            let d_prev = d;
            let numerator = (ann * s / a_precision + d_p * n) * d;
            let denominator = (ann - a_precision) * d / a_precision + (n + U256::one()) * d_p;
            d = numerator / denominator;

            if abs_diff(d, d_prev) <= U256::one() {
                trace!(iteration, "StableSwap D converged");
                return Ok(d);
            }
        }
        bail!("StableSwap D did not converge")
    }

    /// Balance of coin `j` after coin `i` is set to `x`
    pub fn get_y(
        i: usize,
        j: usize,
        x: U256,
        xp: &[U256],
        amp: U256,
        a_precision: U256,
    ) -> Result<U256> {
        let n_coins = xp.len();
        if i == j || i >= n_coins || j >= n_coins {
            bail!("Invalid coin pair ({}, {})", i, j);
        }

        let d = Self::get_d(xp, amp, a_precision)?;
        let n = U256::from(n_coins);
        let ann = amp * n;

        let mut c = d;
        let mut s = U256::zero();
        for (k, balance) in xp.iter().enumerate() {
            let value = if k == i {
                x
            } else if k != j {
                *balance
            } else {
                continue;
            };
            s += value;
            c = c * d / (value * n);
        }
        c = c * d * a_precision / (ann * n);
        let b = s + d * a_precision / ann;

        Self::solve_y(c, b, d)
    }

    /// Balance of coin `i` that yields invariant `d` with the others unchanged
    pub fn get_y_d(i: usize, xp: &[U256], d: U256, amp: U256, a_precision: U256) -> Result<U256> {
        if i >= xp.len() {
            bail!("Coin index {} out of range", i);
        }
        let n = U256::from(xp.len());
        let ann = amp * n;

        let mut c = d;
        let mut s = U256::zero();
        for (k, balance) in xp.iter().enumerate() {
            if k == i {
                continue;
            }
            s += *balance;
            c = c * d / (*balance * n);
        }
        c = c * d * a_precision / (ann * n);
        let b = s + d * a_precision / ann;

        Self::solve_y(c, b, d)
    }

    /// Fee scaled up when the pool is off-peg
    pub fn dynamic_fee(xpi: U256, xpj: U256, fee: U256, multiplier: U256) -> U256 {
        if multiplier <= FEE_DENOMINATOR {
            return fee;
        }
        let sum = xpi + xpj;
        let xps2 = sum * sum;
        if xps2.is_zero() {
            return fee;
        }
        multiplier * fee
            / ((multiplier - FEE_DENOMINATOR) * 4u64 * xpi * xpj / xps2 + FEE_DENOMINATOR)
    }

    fn solve_y(c: U256, b: U256, d: U256) -> Result<U256> {
        let mut y = d;
        for _ in 0..MAX_ITERATIONS {
            let y_prev = y;
            let denominator = (y * 2u64 + b)
                .checked_sub(d)
                .filter(|den| !den.is_zero())
                .context("StableSwap y diverged")?;
            y = (y * y + c) / denominator;
            if abs_diff(y, y_prev) <= U256::one() {
                return Ok(y);
            }
        }
        bail!("StableSwap y did not converge")
    }
}

impl StablePoolState {
    /// Legacy pool with equal-decimal coins and `A_PRECISION = 1`
    pub fn legacy(balances: Vec<U256>, a: u64, fee: U256) -> Self {
        let rates = vec![PRECISION; balances.len()];
        Self {
            balances,
            rates,
            amp: U256::from(a),
            a_precision: U256::one(),
            fee,
            offpeg_fee_multiplier: FEE_DENOMINATOR,
            lp_supply: U256::zero(),
        }
    }

    /// NG pool with `A_PRECISION = 100`
    pub fn ng(balances: Vec<U256>, a: u64, fee: U256, offpeg_fee_multiplier: U256) -> Self {
        let rates = vec![PRECISION; balances.len()];
        Self {
            balances,
            rates,
            amp: U256::from(a) * NG_A_PRECISION,
            a_precision: U256::from(NG_A_PRECISION),
            fee,
            offpeg_fee_multiplier,
            lp_supply: U256::zero(),
        }
    }

    pub fn with_rates(mut self, rates: Vec<U256>) -> Self {
        self.rates = rates;
        self
    }

    pub fn with_lp_supply(mut self, lp_supply: U256) -> Self {
        self.lp_supply = lp_supply;
        self
    }

    pub fn n_coins(&self) -> usize {
        self.balances.len()
    }

    pub fn xp(&self) -> Vec<U256> {
        StableSwapMath::xp(&self.balances, &self.rates)
    }

    pub fn d(&self) -> Result<U256> {
        self.validate()?;
        StableSwapMath::get_d(&self.xp(), self.amp, self.a_precision)
    }

    /// Output of coin `j` for `dx` of coin `i`, fee deducted
    pub fn get_dy(&self, i: usize, j: usize, dx: U256) -> Result<U256> {
        self.validate()?;
        if i == j || i >= self.n_coins() || j >= self.n_coins() {
            bail!("Invalid coin pair ({}, {})", i, j);
        }

        let xp = self.xp();
        let x = xp[i] + dx * self.rates[i] / PRECISION;
        let y = StableSwapMath::get_y(i, j, x, &xp, self.amp, self.a_precision)?;
        let dy = xp[j]
            .checked_sub(y)
            .and_then(|v| v.checked_sub(U256::one()))
            .context("Swap exhausts output balance")?;

        let fee_rate = StableSwapMath::dynamic_fee(
            (xp[i] + x) / 2u64,
            (xp[j] + y) / 2u64,
            self.fee,
            self.offpeg_fee_multiplier,
        );
        let fee = fee_rate * dy / FEE_DENOMINATOR;

        Ok((dy - fee) * PRECISION / self.rates[j])
    }

    /// Apply an exchange quoted with `get_dy`; fees stay in the pool
    pub fn exchange(&mut self, i: usize, j: usize, dx: U256) -> Result<U256> {
        let dy = self.get_dy(i, j, dx)?;
        if dy >= self.balances[j] {
            bail!("Swap exhausts output balance");
        }
        self.balances[i] += dx;
        self.balances[j] -= dy;
        Ok(dy)
    }

    /// LP tokens minted for a deposit, imbalance fee included
    pub fn calc_token_amount_deposit(&self, amounts: &[U256]) -> Result<U256> {
        self.validate()?;
        if amounts.len() != self.n_coins() {
            bail!("Expected {} amounts, got {}", self.n_coins(), amounts.len());
        }

        let old = self.balances.clone();
        let new: Vec<U256> = old.iter().zip(amounts).map(|(b, a)| *b + *a).collect();

        let d0 = self.d_of(&old)?;
        let d1 = self.d_of(&new)?;
        if d1 <= d0 {
            bail!("Deposit does not increase the invariant");
        }
        if self.lp_supply.is_zero() {
            return Ok(d1);
        }

        let fee = self.imbalance_fee();
        let adjusted: Vec<U256> = old
            .iter()
            .zip(&new)
            .map(|(old_balance, new_balance)| {
                let ideal = d1 * *old_balance / d0;
                let difference = abs_diff(ideal, *new_balance);
                *new_balance - fee * difference / FEE_DENOMINATOR
            })
            .collect();
        let d2 = self.d_of(&adjusted)?;

        Ok(self.lp_supply * (d2 - d0) / d0)
    }

    /// Apply a deposit; returns LP minted
    pub fn add_liquidity(&mut self, amounts: &[U256]) -> Result<U256> {
        let minted = self.calc_token_amount_deposit(amounts)?;
        for (balance, amount) in self.balances.iter_mut().zip(amounts) {
            *balance += *amount;
        }
        self.lp_supply += minted;
        Ok(minted)
    }

    /// Coin `i` released for burning `token_amount` LP
    pub fn calc_withdraw_one_coin(&self, token_amount: U256, i: usize) -> Result<WithdrawOneQuote> {
        self.validate()?;
        if i >= self.n_coins() {
            bail!("Coin index {} out of range", i);
        }
        if self.lp_supply.is_zero() || token_amount > self.lp_supply {
            bail!("Withdrawal exceeds LP supply");
        }

        let xp = self.xp();
        let d0 = StableSwapMath::get_d(&xp, self.amp, self.a_precision)?;
        let d1 = d0 - token_amount * d0 / self.lp_supply;
        let new_y = StableSwapMath::get_y_d(i, &xp, d1, self.amp, self.a_precision)?;

        let fee = self.imbalance_fee();
        let mut reduced = xp.clone();
        for (k, balance) in xp.iter().enumerate() {
            let expected = if k == i {
                (*balance * d1 / d0).saturating_sub(new_y)
            } else {
                *balance - *balance * d1 / d0
            };
            reduced[k] -= fee * expected / FEE_DENOMINATOR;
        }

        let y_reduced = StableSwapMath::get_y_d(i, &reduced, d1, self.amp, self.a_precision)?;
        let dy = reduced[i]
            .checked_sub(y_reduced)
            .and_then(|v| v.checked_sub(U256::one()))
            .context("Withdrawal exhausts coin balance")?;
        let amount = dy * PRECISION / self.rates[i];
        let without_fee = (xp[i] - new_y) * PRECISION / self.rates[i];

        Ok(WithdrawOneQuote {
            amount,
            fee: without_fee.saturating_sub(amount),
        })
    }

    /// Apply a single-coin withdrawal; returns the coin amount
    pub fn remove_liquidity_one_coin(&mut self, token_amount: U256, i: usize) -> Result<U256> {
        let quote = self.calc_withdraw_one_coin(token_amount, i)?;
        self.balances[i] -= quote.amount;
        self.lp_supply -= token_amount;
        Ok(quote.amount)
    }

    /// `D * 1e18 / lp_supply`
    pub fn virtual_price(&self) -> Result<U256> {
        if self.lp_supply.is_zero() {
            bail!("Pool has no LP supply");
        }
        Ok(self.d()? * PRECISION / self.lp_supply)
    }

    fn d_of(&self, balances: &[U256]) -> Result<U256> {
        let xp = StableSwapMath::xp(balances, &self.rates);
        StableSwapMath::get_d(&xp, self.amp, self.a_precision)
    }

    fn imbalance_fee(&self) -> U256 {
        let n = U256::from(self.n_coins());
        self.fee * n / (U256::from(4u64) * (n - U256::one()))
    }

    fn validate(&self) -> Result<()> {
        let n = self.n_coins();
        if n < 2 {
            bail!("StableSwap pool needs at least two coins");
        }
        if self.rates.len() != n {
            bail!("Expected {} rates, got {}", n, self.rates.len());
        }
        if self.amp.is_zero() || self.a_precision.is_zero() || self.amp < self.a_precision {
            bail!("Invalid amplification");
        }
        if self.rates.iter().any(|r| r.is_zero()) {
            bail!("Rate multiplier is zero");
        }
        if self.xp().iter().any(|x| x.bits() > MAX_XP_BITS) {
            bail!("Balance outside supported range");
        }
        Ok(())
    }
}

fn abs_diff(a: U256, b: U256) -> U256 {
    if a > b {
        a - b
    } else {
        b - a
    }
}
