//! Curve CryptoSwap (twocrypto / tricrypto) invariant math
//!
//! Balances are converted into the pool's internal units (`xp`) with the
//! per-coin precision multiplier and the stored price scale, then solved
//! against the stored invariant `D`. `ann` is the raw pool parameter
//! `A * N^N * A_MULTIPLIER`.

use anyhow::{bail, Context, Result};
use ethers_core::types::U256;
use tracing::trace;

/// 1e18
const WAD: U256 = U256([1_000_000_000_000_000_000, 0, 0, 0]);

pub const A_MULTIPLIER: u64 = 10_000;

/// CryptoSwap fees are expressed in 1e10 units
pub const FEE_DENOMINATOR: U256 = U256([10_000_000_000, 0, 0, 0]);

const MAX_ITERATIONS: usize = 255;

/// CryptoSwap pool state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CryptoPoolState {
    pub balances: Vec<U256>,
    /// `10^(18 - decimals)` per coin
    pub precisions: Vec<U256>,
    /// Price of coins 1..N in coin 0, 1e18 scaled
    pub price_scale: Vec<U256>,
    pub ann: U256,
    pub gamma: U256,
    pub d: U256,
    pub mid_fee: U256,
    pub out_fee: U256,
    pub fee_gamma: U256,
}

/// CryptoSwap math functions
pub struct CryptoSwapMath;

impl CryptoSwapMath {
    /// Geometric mean by Newton iteration
    pub fn geometric_mean(x: &[U256], sort: bool) -> Result<U256> {
        let x = if sort { sorted_desc(x) } else { x.to_vec() };
        let n = U256::from(x.len());
        let mut d = x[0];
        if d.is_zero() {
            bail!("CryptoSwap balance is zero");
        }

        for _ in 0..MAX_ITERATIONS {
            let d_prev = d;
            let mut tmp = WAD;
            for value in &x {
                tmp = tmp * *value / d;
            }
            d = d * ((n - U256::one()) * WAD + tmp) / (n * WAD);
            let diff = abs_diff(d, d_prev);
            if diff <= U256::one() || diff * WAD < d {
                return Ok(d);
            }
        }
        bail!("Geometric mean did not converge")
    }

    /// Invariant D for balances `x` in internal units
    pub fn newton_d(ann: U256, gamma: U256, x: &[U256]) -> Result<U256> {
        if x.len() < 2 || x.iter().any(|v| v.is_zero()) {
            bail!("CryptoSwap needs at least two positive balances");
        }
        if ann.is_zero() || gamma.is_zero() {
            bail!("Invalid CryptoSwap parameters");
        }

        let x = sorted_desc(x);
        let n = U256::from(x.len());
        let mut d = n * Self::geometric_mean(&x, false)?;
        let s = x.iter().fold(U256::zero(), |acc, v| acc + *v);

        for iteration in 0..MAX_ITERATIONS {
            let d_prev = d;

            let mut k0 = WAD;
            for value in &x {
                k0 = k0 * *value * n / d;
            }
            if k0.is_zero() {
                bail!("CryptoSwap D collapsed");
            }

            let g1k0 = abs_diff(gamma + WAD, k0) + U256::one();
            let mul1 = WAD * d / gamma * g1k0 / gamma * g1k0 * A_MULTIPLIER / ann;
            let mul2 = WAD * 2u64 * n * k0 / g1k0;

            let neg_fprime = (s + s * mul2 / WAD + mul1 * n / k0)
                .checked_sub(mul2 * d / WAD)
                .filter(|v| !v.is_zero())
                .context("CryptoSwap D derivative vanished")?;

            let d_plus = d * (neg_fprime + s) / neg_fprime;
            let mut d_minus = d * d / neg_fprime;
            if WAD > k0 {
                d_minus += d * (mul1 / neg_fprime) / WAD * (WAD - k0) / k0;
            } else {
                d_minus -= d * (mul1 / neg_fprime) / WAD * (k0 - WAD) / k0;
            }

            d = if d_plus > d_minus {
                d_plus - d_minus
            } else {
                (d_minus - d_plus) / 2u64
            };

            let diff = abs_diff(d, d_prev);
            if diff * U256::exp10(14) < U256::exp10(16).max(d) {
                trace!(iteration, "CryptoSwap D converged");
                return Ok(d);
            }
        }
        bail!("CryptoSwap D did not converge")
    }

    /// Balance of coin `i` that keeps invariant `d`
    pub fn newton_y(ann: U256, gamma: U256, x: &[U256], d: U256, i: usize) -> Result<U256> {
        let n_coins = x.len();
        if i >= n_coins || d.is_zero() {
            bail!("Invalid CryptoSwap solve for coin {}", i);
        }
        let n = U256::from(n_coins);

        let mut y = d / n;
        let mut k0_i = WAD;
        let mut s_i = U256::zero();

        let mut x_sorted = x.to_vec();
        x_sorted[i] = U256::zero();
        let x_sorted = sorted_desc(&x_sorted);

        let convergence_limit = (x_sorted[0] / U256::exp10(14))
            .max(d / U256::exp10(14))
            .max(U256::from(100u64));

        for value in x_sorted.iter().take(n_coins - 1).rev() {
            if value.is_zero() {
                bail!("CryptoSwap balance is zero");
            }
            y = y * d / (*value * n);
            s_i += *value;
        }
        for value in x_sorted.iter().take(n_coins - 1) {
            k0_i = k0_i * *value * n / d;
        }

        for _ in 0..MAX_ITERATIONS {
            let y_prev = y;

            let k0 = k0_i * y * n / d;
            let s = s_i + y;
            if k0.is_zero() {
                y = y_prev / 2u64;
                continue;
            }

            let g1k0 = abs_diff(gamma + WAD, k0) + U256::one();
            let mul1 = WAD * d / gamma * g1k0 / gamma * g1k0 * A_MULTIPLIER / ann;
            let mul2 = WAD + WAD * 2u64 * k0 / g1k0;

            let yfprime = WAD * y + s * mul2 + mul1;
            let dyfprime = d * mul2;
            if yfprime < dyfprime {
                y = y_prev / 2u64;
                continue;
            }
            let yfprime = yfprime - dyfprime;
            let fprime = yfprime / y;
            if fprime.is_zero() {
                bail!("CryptoSwap y derivative vanished");
            }

            let mut y_minus = mul1 / fprime;
            let y_plus = (yfprime + WAD * d) / fprime + y_minus * WAD / k0;
            y_minus += WAD * s / fprime;

            y = if y_plus < y_minus {
                y_prev / 2u64
            } else {
                y_plus - y_minus
            };

            if abs_diff(y, y_prev) < convergence_limit.max(y / U256::exp10(14)) {
                return Ok(y);
            }
        }
        bail!("CryptoSwap y did not converge")
    }

    /// Fee interpolation weight: 1e18 at balance, towards 0 when imbalanced
    pub fn reduction_coefficient(x: &[U256], fee_gamma: U256) -> U256 {
        let n = U256::from(x.len());
        let s = x.iter().fold(U256::zero(), |acc, v| acc + *v);
        if s.is_zero() {
            return U256::zero();
        }

        let mut k = WAD;
        for value in x {
            k = k * n * *value / s;
        }
        if fee_gamma.is_zero() {
            return k;
        }
        fee_gamma * WAD / (fee_gamma + WAD - k.min(WAD))
    }
}

impl CryptoPoolState {
    /// Pool with stored `D` computed from the given balances
    pub fn new(
        balances: Vec<U256>,
        precisions: Vec<U256>,
        price_scale: Vec<U256>,
        ann: U256,
        gamma: U256,
        fees: (U256, U256, U256),
    ) -> Result<Self> {
        let (mid_fee, out_fee, fee_gamma) = fees;
        let mut pool = Self {
            balances,
            precisions,
            price_scale,
            ann,
            gamma,
            d: U256::zero(),
            mid_fee,
            out_fee,
            fee_gamma,
        };
        pool.validate()?;
        pool.d = CryptoSwapMath::newton_d(ann, gamma, &pool.xp(&pool.balances)?)?;
        Ok(pool)
    }

    pub fn n_coins(&self) -> usize {
        self.balances.len()
    }

    /// Current fee in 1e10 units for internal balances `xp`
    pub fn fee(&self, xp: &[U256]) -> U256 {
        let f = CryptoSwapMath::reduction_coefficient(xp, self.fee_gamma);
        (self.mid_fee * f + self.out_fee * (WAD - f.min(WAD))) / WAD
    }

    /// Output of coin `j` for `dx` of coin `i`, fee deducted
    pub fn get_dy(&self, i: usize, j: usize, dx: U256) -> Result<U256> {
        self.validate()?;
        if i == j || i >= self.n_coins() || j >= self.n_coins() {
            bail!("Invalid coin pair ({}, {})", i, j);
        }

        let mut balances = self.balances.clone();
        balances[i] += dx;
        let mut xp = self.xp(&balances)?;
        let y_before = xp[j];

        let y = CryptoSwapMath::newton_y(self.ann, self.gamma, &xp, self.d, j)?;
        let mut dy = y_before
            .checked_sub(y)
            .and_then(|v| v.checked_sub(U256::one()))
            .context("Swap exhausts output balance")?;
        xp[j] = y;

        if j > 0 {
            dy = dy * WAD / self.price_scale[j - 1];
        }
        dy /= self.precisions[j];
        dy -= self.fee(&xp) * dy / FEE_DENOMINATOR;

        Ok(dy)
    }

    /// Apply an exchange; the invariant is recomputed with fees retained
    pub fn exchange(&mut self, i: usize, j: usize, dx: U256) -> Result<U256> {
        let dy = self.get_dy(i, j, dx)?;
        if dy >= self.balances[j] {
            bail!("Swap exhausts output balance");
        }
        self.balances[i] += dx;
        self.balances[j] -= dy;
        self.d = CryptoSwapMath::newton_d(self.ann, self.gamma, &self.xp(&self.balances)?)?;
        Ok(dy)
    }

    fn xp(&self, balances: &[U256]) -> Result<Vec<U256>> {
        balances
            .iter()
            .enumerate()
            .map(|(k, balance)| {
                let scaled = *balance * self.precisions[k];
                if k == 0 {
                    Ok(scaled)
                } else {
                    scaled
                        .checked_mul(self.price_scale[k - 1])
                        .map(|v| v / WAD)
                        .context("CryptoSwap balance overflow")
                }
            })
            .collect()
    }

    fn validate(&self) -> Result<()> {
        let n = self.n_coins();
        if n < 2 {
            bail!("CryptoSwap pool needs at least two coins");
        }
        if self.precisions.len() != n || self.price_scale.len() != n - 1 {
            bail!("CryptoSwap parameter lengths do not match {} coins", n);
        }
        if self.price_scale.iter().any(|p| p.is_zero()) || self.precisions.iter().any(|p| p.is_zero()) {
            bail!("CryptoSwap scale is zero");
        }
        if self.balances.iter().any(|b| b.bits() > 160) {
            bail!("Balance outside supported range");
        }
        Ok(())
    }
}

fn sorted_desc(x: &[U256]) -> Vec<U256> {
    let mut sorted = x.to_vec();
    sorted.sort_by(|a, b| b.cmp(a));
    sorted
}

fn abs_diff(a: U256, b: U256) -> U256 {
    if a > b {
        a - b
    } else {
        b - a
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn e18(n: u64) -> U256 {
        U256::from(n) * U256::exp10(18)
    }

    fn fees() -> (U256, U256, U256) {
        (
            U256::from(26_000_000u64),
            U256::from(45_000_000u64),
            U256::from(230_000_000_000_000u64),
        )
    }

    fn two_coin_pool() -> CryptoPoolState {
        CryptoPoolState::new(
            vec![e18(1_000_000), e18(1_000_000)],
            vec![U256::one(), U256::one()],
            vec![WAD],
            U256::from(400_000u64),
            U256::from(145_000_000_000_000u64),
            fees(),
        )
        .unwrap()
    }

    #[test]
    fn test_geometric_mean() {
        let mean = CryptoSwapMath::geometric_mean(&[e18(4), e18(9)], true).unwrap();
        assert!(abs_diff(mean, e18(6)) <= U256::from(1_000u64));
    }

    #[test]
    fn test_balanced_d_is_sum() {
        let pool = two_coin_pool();
        assert!(abs_diff(pool.d, e18(2_000_000)) <= U256::exp10(6));
    }

    #[test]
    fn test_balanced_fee_is_mid_fee() {
        let pool = two_coin_pool();
        let xp = pool.xp(&pool.balances).unwrap();
        assert_eq!(pool.fee(&xp), pool.mid_fee);
    }

    #[test]
    fn test_get_dy_small_swap() {
        let pool = two_coin_pool();
        let dy = pool.get_dy(0, 1, e18(1)).unwrap();
        // ~0.26% fee near balance
        assert!(dy > U256::from(996u64) * U256::exp10(15), "dy {}", dy);
        assert!(dy < e18(1));
    }

    #[test]
    fn test_price_scale_and_precision() {
        // coin 0: 6 decimals, coin 1: 18 decimals worth 2000 of coin 0
        let pool = CryptoPoolState::new(
            vec![U256::from(2_000_000_000_000u64), e18(1_000)],
            vec![U256::exp10(12), U256::one()],
            vec![e18(2_000)],
            U256::from(400_000u64),
            U256::from(145_000_000_000_000u64),
            fees(),
        )
        .unwrap();

        let dy = pool.get_dy(1, 0, U256::exp10(17)).unwrap();
        // 0.1 of coin 1 is ~200 units of coin 0
        assert!(dy > U256::from(199_000_000u64), "dy {}", dy);
        assert!(dy < U256::from(200_000_000u64));
    }

    #[test]
    fn test_three_coin_exchange_moves_balances() {
        let mut pool = CryptoPoolState::new(
            vec![e18(1_000_000), e18(1_000_000), e18(1_000_000)],
            vec![U256::one(); 3],
            vec![WAD, WAD],
            U256::from(1_707_629u64),
            U256::from(11_809_167_828_997u64),
            fees(),
        )
        .unwrap();

        let before = pool.balances.clone();
        let dy = pool.exchange(0, 2, e18(10)).unwrap();
        assert!(dy > e18(9) && dy < e18(10));
        assert_eq!(pool.balances[0], before[0] + e18(10));
        assert_eq!(pool.balances[2], before[2] - dy);
    }

    #[test]
    fn test_invalid_pair_rejected() {
        let pool = two_coin_pool();
        assert!(pool.get_dy(0, 0, e18(1)).is_err());
        assert!(pool.get_dy(0, 2, e18(1)).is_err());
    }
}
