//! Token, allowance and native balances plus the event log

use arb_types::{HostError, LogEvent};
use ethers_core::types::{Address, U256};
use std::collections::HashMap;

/// Account state that snapshots copy wholesale
#[derive(Debug, Clone, Default)]
pub struct Ledger {
    balances: HashMap<(Address, Address), U256>,
    allowances: HashMap<(Address, Address, Address), U256>,
    native: HashMap<Address, U256>,
    supply: HashMap<Address, U256>,
    pub(crate) logs: Vec<LogEvent>,
}

impl Ledger {
    pub fn balance_of(&self, token: Address, owner: Address) -> U256 {
        self.balances
            .get(&(token, owner))
            .copied()
            .unwrap_or_default()
    }

    pub fn total_supply(&self, token: Address) -> U256 {
        self.supply.get(&token).copied().unwrap_or_default()
    }

    pub fn mint(&mut self, token: Address, to: Address, amount: U256) {
        *self.balances.entry((token, to)).or_default() += amount;
        *self.supply.entry(token).or_default() += amount;
    }

    pub fn burn(&mut self, token: Address, from: Address, amount: U256) -> Result<(), HostError> {
        self.debit(token, from, amount)?;
        let supply = self.supply.entry(token).or_default();
        *supply = supply.saturating_sub(amount);
        Ok(())
    }

    pub fn transfer(
        &mut self,
        token: Address,
        from: Address,
        to: Address,
        amount: U256,
    ) -> Result<(), HostError> {
        if amount.is_zero() || from == to {
            return Ok(());
        }
        self.debit(token, from, amount)?;
        *self.balances.entry((token, to)).or_default() += amount;
        Ok(())
    }

    pub fn allowance(&self, token: Address, owner: Address, spender: Address) -> U256 {
        self.allowances
            .get(&(token, owner, spender))
            .copied()
            .unwrap_or_default()
    }

    pub fn approve(&mut self, token: Address, owner: Address, spender: Address, amount: U256) {
        self.allowances.insert((token, owner, spender), amount);
    }

    /// Consume allowance; `U256::MAX` is treated as unlimited
    pub fn spend_allowance(
        &mut self,
        token: Address,
        owner: Address,
        spender: Address,
        amount: U256,
    ) -> Result<(), HostError> {
        if owner == spender || amount.is_zero() {
            return Ok(());
        }
        let available = self.allowance(token, owner, spender);
        if available < amount {
            return Err(HostError::InsufficientAllowance {
                token,
                owner,
                spender,
                available,
                required: amount,
            });
        }
        if available != U256::MAX {
            self.allowances
                .insert((token, owner, spender), available - amount);
        }
        Ok(())
    }

    pub fn native_balance(&self, account: Address) -> U256 {
        self.native.get(&account).copied().unwrap_or_default()
    }

    pub fn set_native(&mut self, account: Address, amount: U256) {
        self.native.insert(account, amount);
    }

    pub fn send_native(&mut self, from: Address, to: Address, amount: U256) -> Result<(), HostError> {
        if amount.is_zero() || from == to {
            return Ok(());
        }
        let available = self.native_balance(from);
        if available < amount {
            return Err(HostError::InsufficientNative {
                owner: from,
                available,
                required: amount,
            });
        }
        self.native.insert(from, available - amount);
        *self.native.entry(to).or_default() += amount;
        Ok(())
    }

    fn debit(&mut self, token: Address, owner: Address, amount: U256) -> Result<(), HostError> {
        let available = self.balance_of(token, owner);
        if available < amount {
            return Err(HostError::InsufficientBalance {
                token,
                owner,
                available,
                required: amount,
            });
        }
        self.balances.insert((token, owner), available - amount);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn addr(n: u64) -> Address {
        Address::from_low_u64_be(n)
    }

    #[test]
    fn test_transfer_moves_balance() {
        let mut ledger = Ledger::default();
        ledger.mint(addr(1), addr(10), U256::from(100u64));

        ledger
            .transfer(addr(1), addr(10), addr(11), U256::from(40u64))
            .unwrap();
        assert_eq!(ledger.balance_of(addr(1), addr(10)), U256::from(60u64));
        assert_eq!(ledger.balance_of(addr(1), addr(11)), U256::from(40u64));
        assert_eq!(ledger.total_supply(addr(1)), U256::from(100u64));

        let err = ledger
            .transfer(addr(1), addr(10), addr(11), U256::from(61u64))
            .unwrap_err();
        assert!(matches!(err, HostError::InsufficientBalance { .. }));
    }

    #[test]
    fn test_allowance_is_consumed() {
        let mut ledger = Ledger::default();
        ledger.approve(addr(1), addr(10), addr(20), U256::from(50u64));

        ledger
            .spend_allowance(addr(1), addr(10), addr(20), U256::from(30u64))
            .unwrap();
        assert_eq!(ledger.allowance(addr(1), addr(10), addr(20)), U256::from(20u64));
        assert!(ledger
            .spend_allowance(addr(1), addr(10), addr(20), U256::from(21u64))
            .is_err());

        ledger.approve(addr(1), addr(10), addr(20), U256::MAX);
        ledger
            .spend_allowance(addr(1), addr(10), addr(20), U256::from(1_000u64))
            .unwrap();
        assert_eq!(ledger.allowance(addr(1), addr(10), addr(20)), U256::MAX);
    }

    #[test]
    fn test_native_transfers() {
        let mut ledger = Ledger::default();
        ledger.set_native(addr(1), U256::from(5u64));
        assert!(ledger.send_native(addr(1), addr(2), U256::from(6u64)).is_err());
        ledger.send_native(addr(1), addr(2), U256::from(5u64)).unwrap();
        assert_eq!(ledger.native_balance(addr(2)), U256::from(5u64));
    }

    proptest! {
        #[test]
        fn prop_transfers_conserve_supply(
            moves in proptest::collection::vec((0u64..4, 0u64..4, 0u64..200), 1..32)
        ) {
            let token = addr(1);
            let mut ledger = Ledger::default();
            for holder in 0..4 {
                ledger.mint(token, addr(10 + holder), U256::from(100u64));
            }

            for (from, to, amount) in moves {
                let _ = ledger.transfer(token, addr(10 + from), addr(10 + to), U256::from(amount));
            }

            let held = (0..4).fold(U256::zero(), |acc, holder| {
                acc + ledger.balance_of(token, addr(10 + holder))
            });
            prop_assert_eq!(held, U256::from(400u64));
            prop_assert_eq!(ledger.total_supply(token), U256::from(400u64));
        }
    }
}
