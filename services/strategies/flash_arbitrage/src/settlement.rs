//! # Profit Settlement
//!
//! Splits a positive [`ProfitResult`] between the block-builder relay and the
//! owner. The relay is always paid in native currency through its payment entry
//! point; the owner receives the remainder in the settlement token.
//!
//! ```text
//! attached value ─────────────────────────────▶ relay.payRelay()
//! net × share_bps ── unwrap(wrapped native) ──▶ relay.payRelay()
//! net − share ─────────────── transfer ───────▶ owner
//! ```

use crate::error::EngineError;
use arb_types::{
    Address, ContractCall, Host, HostError, NoCallbacks, ProfitResult, BPS_DENOMINATOR, U256,
};
use tracing::{debug, info};

/// Per-execution relay payment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RelayShare {
    /// Native value the caller attached; forwarded to the relay untouched
    pub attached_value: U256,
    /// Share of net profit paid to the relay, in basis points
    pub profit_share_bps: u32,
}

impl RelayShare {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn is_zero(&self) -> bool {
        self.attached_value.is_zero() && self.profit_share_bps == 0
    }

    /// Profit share of `net`, rounded down
    pub fn share_of(&self, net: U256) -> U256 {
        net.saturating_mul(U256::from(self.profit_share_bps.min(BPS_DENOMINATOR)))
            / U256::from(BPS_DENOMINATOR)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SettlementReceipt {
    /// Native currency paid to the relay
    pub relay_native: U256,
    /// Settlement-token amount sent to the owner
    pub owner_amount: U256,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProfitSettlement {
    /// Token unwrapped to pay the relay its profit share
    pub wrapped_native: Option<Address>,
    /// Default profit share for executions that do not override it
    pub relay_share_bps: u32,
}

impl ProfitSettlement {
    pub fn new(wrapped_native: Option<Address>, relay_share_bps: u32) -> Self {
        Self {
            wrapped_native,
            relay_share_bps,
        }
    }

    /// Share for an execution that attached `attached_value`
    pub fn share_for(&self, attached_value: U256) -> RelayShare {
        RelayShare {
            attached_value,
            profit_share_bps: self.relay_share_bps,
        }
    }

    /// Disburse `profit`, held by `engine` in `token`
    #[allow(clippy::too_many_arguments)]
    pub fn settle(
        &self,
        host: &mut dyn Host,
        engine: Address,
        token: Address,
        profit: &ProfitResult,
        relay: Option<Address>,
        owner: Address,
        share: RelayShare,
    ) -> Result<SettlementReceipt, EngineError> {
        if !profit.is_profitable() {
            return Err(EngineError::Unprofitable {
                gross_out: profit.gross_out,
                owed: profit.principal_plus_fee,
            });
        }
        let net = profit.net_amount();
        let mut receipt = SettlementReceipt::default();

        if !share.attached_value.is_zero() {
            let relay = relay.ok_or_else(|| missing_relay("attached value"))?;
            pay_relay(host, engine, relay, share.attached_value)?;
            receipt.relay_native += share.attached_value;
        }

        let relay_cut = share.share_of(net);
        if !relay_cut.is_zero() {
            let relay = relay.ok_or_else(|| missing_relay("profit share"))?;
            if self.wrapped_native != Some(token) {
                return Err(EngineError::SettlementTransferFailed {
                    recipient: relay,
                    reason: "profit share needs a wrapped-native settlement token".into(),
                });
            }
            unwrap_native(host, engine, token, relay_cut, relay)?;
            pay_relay(host, engine, relay, relay_cut)?;
            receipt.relay_native += relay_cut;
        }

        let owner_amount = net - relay_cut;
        if !owner_amount.is_zero() {
            host.transfer(token, engine, owner, owner_amount)
                .map_err(|e| transfer_failed(owner, e))?;
        }
        receipt.owner_amount = owner_amount;

        info!(%net, relay = %receipt.relay_native, owner = %owner_amount, "Profit settled");
        Ok(receipt)
    }

    /// Pay the relay `value` on the caller's behalf out of accrued wrapped-native
    /// profit, then sweep the rest of that profit to the owner
    ///
    /// `value` must already sit with the engine as native currency.
    pub fn withdraw_profit_with_relay(
        &self,
        host: &mut dyn Host,
        engine: Address,
        caller: Address,
        owner: Address,
        relay: Address,
        value: U256,
    ) -> Result<SettlementReceipt, EngineError> {
        let wrapped = self
            .wrapped_native
            .ok_or_else(|| EngineError::SettlementTransferFailed {
                recipient: caller,
                reason: "no wrapped-native token configured".into(),
            })?;

        if !value.is_zero() {
            pay_relay(host, engine, relay, value)?;
            unwrap_native(host, engine, wrapped, value, caller)?;
            host.send_native(engine, caller, value)
                .map_err(|e| transfer_failed(caller, e))?;
        }

        let remainder = host.balance_of(wrapped, engine);
        if !remainder.is_zero() {
            host.transfer(wrapped, engine, owner, remainder)
                .map_err(|e| transfer_failed(owner, e))?;
        }
        debug!(%value, %remainder, "Withdrew profit through relay");

        Ok(SettlementReceipt {
            relay_native: value,
            owner_amount: remainder,
        })
    }
}

fn pay_relay(host: &mut dyn Host, engine: Address, relay: Address, amount: U256) -> Result<(), EngineError> {
    host.call(engine, relay, ContractCall::PayRelay { amount }, &mut NoCallbacks)
        .map(|_| ())
        .map_err(|e| transfer_failed(relay, e))
}

fn unwrap_native(
    host: &mut dyn Host,
    engine: Address,
    wrapped: Address,
    amount: U256,
    beneficiary: Address,
) -> Result<(), EngineError> {
    host.call(engine, wrapped, ContractCall::Withdraw { amount }, &mut NoCallbacks)
        .map(|_| ())
        .map_err(|e| transfer_failed(beneficiary, e))
}

fn transfer_failed(recipient: Address, err: HostError) -> EngineError {
    EngineError::SettlementTransferFailed {
        recipient,
        reason: err.to_string(),
    }
}

fn missing_relay(what: &str) -> EngineError {
    EngineError::SettlementTransferFailed {
        recipient: Address::zero(),
        reason: format!("{} requires a relay address", what),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chain_sim::{FeeRelay, InMemoryChain, WrappedNative};

    fn addr(n: u64) -> Address {
        Address::from_low_u64_be(n)
    }

    struct Fixture {
        chain: InMemoryChain,
        engine: Address,
        owner: Address,
        relay: Address,
        weth: Address,
    }

    fn fixture(held: u64) -> Fixture {
        let (engine, owner, relay, weth) = (addr(1), addr(2), addr(3), addr(4));
        let mut chain = InMemoryChain::new();
        chain.deploy(relay, FeeRelay::new());
        chain.deploy(weth, WrappedNative::new());
        chain.mint(weth, engine, U256::from(held));
        chain.set_native(weth, U256::from(held));
        Fixture {
            chain,
            engine,
            owner,
            relay,
            weth,
        }
    }

    #[test]
    fn test_zero_share_leaves_relay_untouched() {
        let mut f = fixture(1_000);
        let settlement = ProfitSettlement::new(Some(f.weth), 0);
        let profit = ProfitResult::compute(U256::from(1_100u64), U256::from(1_000u64));

        let receipt = settlement
            .settle(&mut f.chain, f.engine, f.weth, &profit, Some(f.relay), f.owner, RelayShare::none())
            .unwrap();
        assert_eq!(receipt.relay_native, U256::zero());
        assert_eq!(receipt.owner_amount, U256::from(100u64));
        assert_eq!(f.chain.balance_of(f.weth, f.owner), U256::from(100u64));
        assert_eq!(f.chain.native_balance(f.relay), U256::zero());
        assert!(f.chain.logs().is_empty());
    }

    #[test]
    fn test_profit_share_is_unwrapped_for_relay() {
        let mut f = fixture(1_000);
        let settlement = ProfitSettlement::new(Some(f.weth), 2_500);
        let profit = ProfitResult::compute(U256::from(1_400u64), U256::from(1_000u64));

        let receipt = settlement
            .settle(
                &mut f.chain,
                f.engine,
                f.weth,
                &profit,
                Some(f.relay),
                f.owner,
                settlement.share_for(U256::zero()),
            )
            .unwrap();
        assert_eq!(receipt.relay_native, U256::from(100u64));
        assert_eq!(receipt.owner_amount, U256::from(300u64));
        assert_eq!(f.chain.native_balance(f.relay), U256::from(100u64));
        assert_eq!(f.chain.balance_of(f.weth, f.owner), U256::from(300u64));
    }

    #[test]
    fn test_rejected_owner_transfer() {
        let mut f = fixture(1_000);
        f.chain.reject_transfers_to(f.owner);
        let settlement = ProfitSettlement::new(None, 0);
        let profit = ProfitResult::compute(U256::from(1_010u64), U256::from(1_000u64));

        let err = settlement
            .settle(&mut f.chain, f.engine, f.weth, &profit, None, f.owner, RelayShare::none())
            .unwrap_err();
        assert!(matches!(err, EngineError::SettlementTransferFailed { recipient, .. } if recipient == f.owner));
    }

    #[test]
    fn test_share_requires_wrapped_native_token() {
        let mut f = fixture(1_000);
        let usdc = addr(5);
        f.chain.mint(usdc, f.engine, U256::from(1_000u64));
        let settlement = ProfitSettlement::new(Some(f.weth), 1_000);
        let profit = ProfitResult::compute(U256::from(1_100u64), U256::from(1_000u64));

        let err = settlement
            .settle(
                &mut f.chain,
                f.engine,
                usdc,
                &profit,
                Some(f.relay),
                f.owner,
                settlement.share_for(U256::zero()),
            )
            .unwrap_err();
        assert!(matches!(err, EngineError::SettlementTransferFailed { .. }));
    }

    #[test]
    fn test_unprofitable_is_rejected() {
        let mut f = fixture(1_000);
        let settlement = ProfitSettlement::default();
        let profit = ProfitResult::compute(U256::from(1_000u64), U256::from(1_000u64));
        let err = settlement
            .settle(&mut f.chain, f.engine, f.weth, &profit, None, f.owner, RelayShare::none())
            .unwrap_err();
        assert_eq!(
            err,
            EngineError::Unprofitable {
                gross_out: U256::from(1_000u64),
                owed: U256::from(1_000u64),
            }
        );
    }

    #[test]
    fn test_withdraw_with_relay_reimburses_caller() {
        let mut f = fixture(1_000);
        f.chain.set_native(f.engine, U256::from(100u64));
        let settlement = ProfitSettlement::new(Some(f.weth), 0);

        let receipt = settlement
            .withdraw_profit_with_relay(&mut f.chain, f.engine, f.owner, f.owner, f.relay, U256::from(100u64))
            .unwrap();
        assert_eq!(receipt.owner_amount, U256::from(900u64));
        assert_eq!(f.chain.native_balance(f.relay), U256::from(100u64));
        assert_eq!(f.chain.native_balance(f.owner), U256::from(100u64));
        assert_eq!(f.chain.balance_of(f.weth, f.owner), U256::from(900u64));
        assert_eq!(f.chain.balance_of(f.weth, f.engine), U256::zero());
    }

    mod share_props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn prop_share_never_exceeds_net(net in any::<u128>(), bps in 0u32..20_000) {
                let share = RelayShare { attached_value: U256::zero(), profit_share_bps: bps };
                let net = U256::from(net);
                let cut = share.share_of(net);
                prop_assert!(cut <= net);
                if bps >= BPS_DENOMINATOR {
                    prop_assert_eq!(cut, net);
                }
            }
        }
    }
}
