//! Wrapped native token (WETH / WBNB style); the token address is the contract address

use super::Contract;
use crate::chain::CallEnv;
use arb_types::{CallReturn, ContractCall, HostError};

#[derive(Debug, Clone, Default)]
pub struct WrappedNative;

impl WrappedNative {
    pub fn new() -> Self {
        Self
    }
}

impl Contract for WrappedNative {
    fn kind(&self) -> &'static str {
        "wrapped_native"
    }

    fn execute(&mut self, env: &mut CallEnv<'_>, call: ContractCall) -> Result<CallReturn, HostError> {
        match call {
            ContractCall::Withdraw { amount } => {
                let (token, caller) = (env.this, env.caller);
                env.burn(token, caller, amount)?;
                env.send_native(caller, amount)?;
                Ok(CallReturn::None)
            }
            other => Err(env.unsupported(&other)),
        }
    }

    fn box_clone(&self) -> Box<dyn Contract> {
        Box::new(self.clone())
    }
}
