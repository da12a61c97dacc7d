//! In-memory [`Host`] implementation
//!
//! Every call runs against a snapshot of the whole world (ledger, contracts
//! and log). A failing call restores the snapshot, so a reverted call never
//! leaves partial effects behind. A contract is taken out of the world while it
//! executes; calling it again from inside the same call stack reports
//! [`HostError::Locked`].

use crate::contracts::Contract;
use crate::ledger::Ledger;
use arb_types::{
    CallReturn, Callback, CallbackHandler, Checkpoint, ContractCall, EventKind, Host, HostError,
    LogEvent, NoCallbacks,
};
use ethers_core::types::{Address, U256};
use std::collections::{HashMap, HashSet};
use tracing::{debug, trace};

#[derive(Debug, Clone, Default)]
struct World {
    ledger: Ledger,
    contracts: HashMap<Address, Box<dyn Contract>>,
}

/// In-memory chain with snapshot/revert semantics
#[derive(Debug, Default)]
pub struct InMemoryChain {
    world: World,
    checkpoints: Vec<World>,
    executing: Vec<Address>,
    rejecting: HashSet<Address>,
}

impl InMemoryChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a contract and mint the balances it starts with
    pub fn deploy(&mut self, address: Address, contract: impl Contract + 'static) {
        for (token, amount) in contract.initial_holdings() {
            self.world.ledger.mint(token, address, amount);
        }
        debug!(?address, kind = contract.kind(), "Contract deployed");
        self.world.contracts.insert(address, Box::new(contract));
    }

    pub fn is_contract(&self, address: Address) -> bool {
        self.world.contracts.contains_key(&address) || self.executing.contains(&address)
    }

    pub fn mint(&mut self, token: Address, to: Address, amount: U256) {
        self.world.ledger.mint(token, to, amount);
    }

    pub fn burn(&mut self, token: Address, from: Address, amount: U256) -> Result<(), HostError> {
        self.world.ledger.burn(token, from, amount)
    }

    pub fn total_supply(&self, token: Address) -> U256 {
        self.world.ledger.total_supply(token)
    }

    pub fn set_native(&mut self, account: Address, amount: U256) {
        self.world.ledger.set_native(account, amount);
    }

    /// Make every token or native transfer to `account` fail
    pub fn reject_transfers_to(&mut self, account: Address) {
        self.rejecting.insert(account);
    }

    pub fn accept_transfers_to(&mut self, account: Address) {
        self.rejecting.remove(&account);
    }

    pub fn emit(&mut self, emitter: Address, kind: EventKind) {
        trace!(?emitter, event = %kind.signature(), "Event emitted");
        self.world.ledger.logs.push(LogEvent::new(emitter, kind));
    }

    /// Events logged at or after `index`
    pub fn logs_since(&self, index: usize) -> &[LogEvent] {
        self.world.ledger.logs.get(index..).unwrap_or_default()
    }

    /// Open snapshots
    pub fn checkpoint_depth(&self) -> usize {
        self.checkpoints.len()
    }

    fn ensure_accepts(&self, recipient: Address) -> Result<(), HostError> {
        if self.rejecting.contains(&recipient) {
            return Err(HostError::TransferRejected { recipient });
        }
        Ok(())
    }
}

impl Host for InMemoryChain {
    fn balance_of(&self, token: Address, owner: Address) -> U256 {
        self.world.ledger.balance_of(token, owner)
    }

    fn transfer(
        &mut self,
        token: Address,
        from: Address,
        to: Address,
        amount: U256,
    ) -> Result<(), HostError> {
        self.ensure_accepts(to)?;
        self.world.ledger.transfer(token, from, to, amount)
    }

    fn approve(&mut self, token: Address, owner: Address, spender: Address, amount: U256) {
        self.world.ledger.approve(token, owner, spender, amount);
    }

    fn allowance(&self, token: Address, owner: Address, spender: Address) -> U256 {
        self.world.ledger.allowance(token, owner, spender)
    }

    fn transfer_from(
        &mut self,
        token: Address,
        spender: Address,
        from: Address,
        to: Address,
        amount: U256,
    ) -> Result<(), HostError> {
        self.ensure_accepts(to)?;
        let available = self.world.ledger.balance_of(token, from);
        if available < amount {
            return Err(HostError::InsufficientBalance {
                token,
                owner: from,
                available,
                required: amount,
            });
        }
        self.world
            .ledger
            .spend_allowance(token, from, spender, amount)?;
        self.world.ledger.transfer(token, from, to, amount)
    }

    fn native_balance(&self, account: Address) -> U256 {
        self.world.ledger.native_balance(account)
    }

    fn send_native(&mut self, from: Address, to: Address, amount: U256) -> Result<(), HostError> {
        self.ensure_accepts(to)?;
        self.world.ledger.send_native(from, to, amount)
    }

    fn call(
        &mut self,
        caller: Address,
        target: Address,
        call: ContractCall,
        handler: &mut dyn CallbackHandler,
    ) -> Result<CallReturn, HostError> {
        if self.executing.contains(&target) {
            return Err(HostError::Locked(target));
        }

        let snapshot = self.world.clone();
        let mut contract = self
            .world
            .contracts
            .remove(&target)
            .ok_or(HostError::NoContract(target))?;

        let selector = call.selector();
        trace!(?caller, ?target, selector, "Call");

        self.executing.push(target);
        let result = {
            let mut env = CallEnv {
                chain: self,
                handler,
                this: target,
                caller,
            };
            contract.execute(&mut env, call)
        };
        self.executing.pop();

        match result {
            Ok(value) => {
                self.world.contracts.insert(target, contract);
                Ok(value)
            }
            Err(e) => {
                debug!(?target, selector, error = %e, "Call reverted");
                self.world = snapshot;
                Err(e)
            }
        }
    }

    fn logs(&self) -> &[LogEvent] {
        &self.world.ledger.logs
    }

    fn checkpoint(&mut self) -> Checkpoint {
        self.checkpoints.push(self.world.clone());
        Checkpoint(self.checkpoints.len() - 1)
    }

    fn revert_to(&mut self, checkpoint: Checkpoint) -> Result<(), HostError> {
        if checkpoint.0 >= self.checkpoints.len() {
            return Err(HostError::UnknownCheckpoint(checkpoint.0));
        }
        self.checkpoints.truncate(checkpoint.0 + 1);
        if let Some(world) = self.checkpoints.pop() {
            self.world = world;
        }
        Ok(())
    }

    fn commit(&mut self, checkpoint: Checkpoint) -> Result<(), HostError> {
        if checkpoint.0 >= self.checkpoints.len() {
            return Err(HostError::UnknownCheckpoint(checkpoint.0));
        }
        self.checkpoints.truncate(checkpoint.0);
        Ok(())
    }
}

/// What a contract sees while it executes
pub struct CallEnv<'a> {
    chain: &'a mut InMemoryChain,
    handler: &'a mut dyn CallbackHandler,
    /// Executing contract
    pub this: Address,
    /// `msg.sender`
    pub caller: Address,
}

impl CallEnv<'_> {
    /// This contract's balance of `token`
    pub fn balance(&self, token: Address) -> U256 {
        self.chain.balance_of(token, self.this)
    }

    /// Send tokens held by this contract
    pub fn pay(&mut self, token: Address, to: Address, amount: U256) -> Result<(), HostError> {
        self.chain.transfer(token, self.this, to, amount)
    }

    /// Pull tokens from `from` using this contract's allowance
    pub fn pull(&mut self, token: Address, from: Address, amount: U256) -> Result<(), HostError> {
        let this = self.this;
        self.chain.transfer_from(token, this, from, this, amount)
    }

    pub fn approve(&mut self, token: Address, spender: Address, amount: U256) {
        let this = self.this;
        self.chain.approve(token, this, spender, amount);
    }

    pub fn mint(&mut self, token: Address, to: Address, amount: U256) {
        self.chain.mint(token, to, amount);
    }

    pub fn burn(&mut self, token: Address, from: Address, amount: U256) -> Result<(), HostError> {
        self.chain.burn(token, from, amount)
    }

    pub fn send_native(&mut self, to: Address, amount: U256) -> Result<(), HostError> {
        let this = self.this;
        self.chain.send_native(this, to, amount)
    }

    pub fn pull_native(&mut self, from: Address, amount: U256) -> Result<(), HostError> {
        let this = self.this;
        self.chain.send_native(from, this, amount)
    }

    pub fn emit(&mut self, kind: EventKind) {
        let this = self.this;
        self.chain.emit(this, kind);
    }

    /// Call another contract as this contract; nested calls cannot call back
    pub fn call(&mut self, target: Address, call: ContractCall) -> Result<CallReturn, HostError> {
        let this = self.this;
        self.chain.call(this, target, call, &mut NoCallbacks)
    }

    /// Reenter the original caller through its callback handler
    pub fn callback(&mut self, callback: Callback) -> Result<(), HostError> {
        let this = self.this;
        self.handler.on_callback(&mut *self.chain, this, callback)
    }

    pub fn revert(&self, reason: impl Into<String>) -> HostError {
        HostError::reverted(self.this, reason)
    }

    pub fn unsupported(&self, call: &ContractCall) -> HostError {
        HostError::UnrecognizedSelector {
            target: self.this,
            selector: call.selector(),
        }
    }
}
