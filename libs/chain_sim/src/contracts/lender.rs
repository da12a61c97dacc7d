//! Flash lender and native-currency fee relay

use super::Contract;
use crate::chain::CallEnv;
use arb_types::{CallReturn, Callback, ContractCall, EventKind, HostError, BPS_DENOMINATOR};
use ethers_core::types::{Address, U256};

/// ERC-3156 style lender: sends funds, calls `onFlashLoan`, then pulls `amount + fee`
#[derive(Debug, Clone)]
pub struct FlashLender {
    pub fee_bps: u32,
    liquidity: Vec<(Address, U256)>,
}

impl FlashLender {
    pub fn new(fee_bps: u32) -> Self {
        Self {
            fee_bps,
            liquidity: Vec::new(),
        }
    }

    /// Tokens the lender holds at deployment
    pub fn with_liquidity(mut self, token: Address, amount: U256) -> Self {
        self.liquidity.push((token, amount));
        self
    }

    /// `None` when the fee does not fit in a `U256`
    pub fn flash_fee(&self, amount: U256) -> Option<U256> {
        amount
            .checked_mul(U256::from(self.fee_bps))
            .map(|scaled| scaled / U256::from(BPS_DENOMINATOR))
    }
}

impl Contract for FlashLender {
    fn kind(&self) -> &'static str {
        "flash_lender"
    }

    fn initial_holdings(&self) -> Vec<(Address, U256)> {
        self.liquidity.clone()
    }

    fn execute(&mut self, env: &mut CallEnv<'_>, call: ContractCall) -> Result<CallReturn, HostError> {
        match call {
            ContractCall::FlashFee { amount, .. } => self
                .flash_fee(amount)
                .map(CallReturn::Amount)
                .ok_or_else(|| env.revert("flash fee overflow")),
            ContractCall::FlashLoan {
                receiver,
                token,
                amount,
                data,
            } => {
                if amount.is_zero() {
                    return Err(env.revert("zero flash loan"));
                }
                let Some(fee) = self.flash_fee(amount) else {
                    return Err(env.revert("flash fee overflow"));
                };
                let before = env.balance(token);
                if before < amount {
                    return Err(env.revert("insufficient lender liquidity"));
                }
                let (Some(owed), Some(expected)) = (amount.checked_add(fee), before.checked_add(fee))
                else {
                    return Err(env.revert("flash fee overflow"));
                };

                let initiator = env.caller;
                env.pay(token, receiver, amount)?;
                env.callback(Callback::FlashLoan {
                    initiator,
                    token,
                    amount,
                    fee,
                    data,
                })?;
                env.pull(token, receiver, owed)?;

                if env.balance(token) < expected {
                    return Err(env.revert("flash loan not repaid"));
                }
                env.emit(EventKind::FlashLoan {
                    receiver,
                    token,
                    amount,
                    fee,
                });
                Ok(CallReturn::None)
            }
            other => Err(env.unsupported(&other)),
        }
    }

    fn box_clone(&self) -> Box<dyn Contract> {
        Box::new(self.clone())
    }
}

/// Block-builder relay that accepts native-currency payments
#[derive(Debug, Clone, Default)]
pub struct FeeRelay {
    pub received: U256,
}

impl FeeRelay {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Contract for FeeRelay {
    fn kind(&self) -> &'static str {
        "fee_relay"
    }

    fn execute(&mut self, env: &mut CallEnv<'_>, call: ContractCall) -> Result<CallReturn, HostError> {
        match call {
            ContractCall::PayRelay { amount } => {
                let payer = env.caller;
                env.pull_native(payer, amount)?;
                self.received += amount;
                env.emit(EventKind::RelayPayment { payer, amount });
                Ok(CallReturn::None)
            }
            other => Err(env.unsupported(&other)),
        }
    }

    fn box_clone(&self) -> Box<dyn Contract> {
        Box::new(self.clone())
    }
}
