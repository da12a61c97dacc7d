//! Execution-scoped results: per-hop outcomes, borrow tickets and profit

use ethers_core::types::{Address, I256, U256};

/// Result of one adapter swap
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapOutcome {
    /// Realized output, measured as the recipient's balance delta
    pub amount_out: U256,
    pub event_observed: bool,
}

/// Where the first hop's input comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FundingSource {
    /// Borrow the first hop's output from its own pool and pay the input back
    FlashSwap { pool: Address },
    /// Third-party lender that charges a fee
    FlashLoan { lender: Address },
    /// Engine's own balance
    Prefunded,
}

/// Open repayment obligation; lives only inside one execution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BorrowTicket {
    pub source: FundingSource,
    pub token: Address,
    pub principal: U256,
    pub fee_owed: U256,
}

impl BorrowTicket {
    pub fn new(source: FundingSource, token: Address, principal: U256, fee_owed: U256) -> Self {
        Self {
            source,
            token,
            principal,
            fee_owed,
        }
    }

    /// `principal + fee_owed`, `None` on overflow
    pub fn repayment(&self) -> Option<U256> {
        self.principal.checked_add(self.fee_owed)
    }

    /// Account that must receive the repayment, if any
    pub fn lender(&self) -> Option<Address> {
        match self.source {
            FundingSource::FlashSwap { pool } => Some(pool),
            FundingSource::FlashLoan { lender } => Some(lender),
            FundingSource::Prefunded => None,
        }
    }
}

/// Gross output against what the execution owes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProfitResult {
    pub gross_out: U256,
    pub principal_plus_fee: U256,
    pub net: I256,
}

impl ProfitResult {
    pub fn compute(gross_out: U256, principal_plus_fee: U256) -> Self {
        let net = if gross_out >= principal_plus_fee {
            I256::try_from(gross_out - principal_plus_fee).unwrap_or(I256::MAX)
        } else {
            -I256::try_from(principal_plus_fee - gross_out).unwrap_or(I256::MAX)
        };

        Self {
            gross_out,
            principal_plus_fee,
            net,
        }
    }

    pub fn is_profitable(&self) -> bool {
        self.net > I256::zero()
    }

    /// Positive net as an unsigned amount, zero otherwise
    pub fn net_amount(&self) -> U256 {
        if self.is_profitable() {
            self.net.into_raw()
        } else {
            U256::zero()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profit_sign() {
        let win = ProfitResult::compute(U256::from(1_050u64), U256::from(1_000u64));
        assert!(win.is_profitable());
        assert_eq!(win.net, I256::from(50));
        assert_eq!(win.net_amount(), U256::from(50u64));

        let even = ProfitResult::compute(U256::from(1_000u64), U256::from(1_000u64));
        assert!(!even.is_profitable());
        assert_eq!(even.net_amount(), U256::zero());

        let loss = ProfitResult::compute(U256::from(990u64), U256::from(1_000u64));
        assert_eq!(loss.net, I256::from(-10));
    }

    #[test]
    fn test_ticket_repayment() {
        let lender = Address::from_low_u64_be(9);
        let ticket = BorrowTicket::new(
            FundingSource::FlashLoan { lender },
            Address::from_low_u64_be(1),
            U256::from(10_000u64),
            U256::from(9u64),
        );
        assert_eq!(ticket.repayment(), Some(U256::from(10_009u64)));
        assert_eq!(ticket.lender(), Some(lender));

        let overflow = BorrowTicket::new(
            FundingSource::Prefunded,
            Address::zero(),
            U256::MAX,
            U256::one(),
        );
        assert_eq!(overflow.repayment(), None);
        assert_eq!(overflow.lender(), None);
    }
}
