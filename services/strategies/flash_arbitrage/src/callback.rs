//! # Flash-Borrow Continuation
//!
//! ## Purpose
//!
//! Carries everything the engine needs after the lender hands control back:
//! the hops still to run, the funding token and principal, and the account the
//! callback must come from. The lender invokes it exactly once, from inside the
//! borrow call, and it closes the loan before returning.
//!
//! ## Callback Shapes
//!
//! ```text
//! uniswapV2Call      pair sent hop 0's output   → run hops[1..] → transfer principal to pair
//! V3 swap callback   pool sent hop 0's output   → run hops[1..] → transfer positive delta to pool
//! onFlashLoan        lender sent principal      → run hops[0..] → approve principal + fee
//! ```
//!
//! The continuation never holds the engine itself, so settlement cannot be
//! reached from inside the borrow. Failures are stored on the continuation and
//! surfaced by [`FlashBorrowCallback::conclude`]; the host only sees a rejected
//! callback, which unwinds the lender's call.

use crate::adapters::Observation;
use crate::error::EngineError;
use crate::log_borrow;
use crate::orchestrator::{run_hops, ExecutionReport, HopRecord, Phase};
use arb_types::{
    Address, BorrowTicket, CallReturn, Callback, CallbackHandler, FundingSource, Hop, Host,
    HostError, ProtocolVariant, I256, U256,
};
use tracing::warn;

/// Loan closed inside the callback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClosedBorrow {
    pub ticket: BorrowTicket,
    /// Final hop's output, in the funding token
    pub gross_out: U256,
}

pub struct FlashBorrowCallback<'a> {
    engine: Address,
    source: FundingSource,
    token: Address,
    principal: U256,
    chain: &'a [Hop],
    report: &'a mut ExecutionReport,
    /// Engine's hop-0 output balance before a flash swap
    borrow_observation: Option<Observation>,
    invoked: bool,
    closed: Option<ClosedBorrow>,
    failure: Option<EngineError>,
}

impl<'a> FlashBorrowCallback<'a> {
    /// `chain` is the whole hop chain; flash swaps skip hop 0, which the
    /// borrow itself performs
    pub fn new(
        engine: Address,
        source: FundingSource,
        token: Address,
        principal: U256,
        chain: &'a [Hop],
        report: &'a mut ExecutionReport,
    ) -> Self {
        Self {
            engine,
            source,
            token,
            principal,
            chain,
            report,
            borrow_observation: None,
            invoked: false,
            closed: None,
            failure: None,
        }
    }

    /// Measure hop 0's output as the engine's balance change at callback time
    pub(crate) fn with_borrow_observation(mut self, observation: Observation) -> Self {
        self.borrow_observation = Some(observation);
        self
    }

    /// Account allowed to call back
    pub fn expected_lender(&self) -> Option<Address> {
        match self.source {
            FundingSource::FlashSwap { pool } => Some(pool),
            FundingSource::FlashLoan { lender } => Some(lender),
            FundingSource::Prefunded => None,
        }
    }

    pub fn was_invoked(&self) -> bool {
        self.invoked
    }

    /// Combine the borrow call's result with what happened inside the callback
    ///
    /// A failure recorded by the callback wins over the host error it caused.
    pub fn conclude(
        self,
        call_result: Result<CallReturn, HostError>,
    ) -> Result<ClosedBorrow, EngineError> {
        let lender = self.expected_lender().unwrap_or_default();
        if let Some(err) = self.failure {
            return Err(err);
        }
        if let Err(e) = call_result {
            return Err(match self.source {
                FundingSource::FlashSwap { pool } => {
                    EngineError::hop_failed(0, EngineError::from_pool_call(pool, e))
                }
                _ => EngineError::Host(e),
            });
        }
        self.closed.ok_or_else(|| EngineError::UnexpectedCallback {
            caller: lender,
            reason: "borrow completed without calling back".into(),
        })
    }

    fn reject(&mut self, err: EngineError) -> HostError {
        warn!(error = %err, "Flash-borrow callback rejected");
        let rejection = HostError::CallbackRejected(err.to_string());
        self.failure = Some(err);
        rejection
    }

    /// Check the callback shape and return `(first hop to run, amount it gets, fee owed)`
    fn accept(&mut self, caller: Address, callback: &Callback) -> Result<(usize, U256, U256), EngineError> {
        match (self.source, callback) {
            (
                FundingSource::FlashSwap { .. },
                Callback::PairFlashSwap {
                    sender,
                    amount0,
                    amount1,
                    ..
                },
            ) => {
                if *sender != self.engine {
                    return Err(EngineError::UnexpectedCallback {
                        caller,
                        reason: format!("flash swap initiated by {:?}", sender),
                    });
                }
                Ok((1, amount0.saturating_add(*amount1), U256::zero()))
            }
            (
                FundingSource::FlashSwap { .. },
                Callback::PoolSwap {
                    flavor,
                    amount0_delta,
                    amount1_delta,
                    ..
                },
            ) => {
                if let Some(hop) = self.chain.first() {
                    let raised = ProtocolVariant::Concentrated { flavor: *flavor };
                    if hop.pool.protocol != raised {
                        return Err(EngineError::hop_failed(
                            0,
                            EngineError::unsupported(
                                hop.pool.address,
                                format!(
                                    "pool raised {} but {} was declared",
                                    flavor.callback_name(),
                                    hop.pool.protocol
                                ),
                            ),
                        ));
                    }
                }
                let (owed, received) = if *amount0_delta > I256::zero() {
                    (*amount0_delta, *amount1_delta)
                } else {
                    (*amount1_delta, *amount0_delta)
                };
                if owed.into_raw() != self.principal || received >= I256::zero() {
                    return Err(EngineError::UnexpectedCallback {
                        caller,
                        reason: format!("pool deltas ({}, {}) do not match the borrow", amount0_delta, amount1_delta),
                    });
                }
                Ok((1, received.unsigned_abs(), U256::zero()))
            }
            (
                FundingSource::FlashLoan { .. },
                Callback::FlashLoan {
                    initiator,
                    token,
                    amount,
                    fee,
                    ..
                },
            ) => {
                if *initiator != self.engine || *token != self.token || *amount != self.principal {
                    return Err(EngineError::UnexpectedCallback {
                        caller,
                        reason: "flash loan terms differ from the request".into(),
                    });
                }
                Ok((0, *amount, *fee))
            }
            (_, other) => Err(EngineError::UnexpectedCallback {
                caller,
                reason: format!("{} does not close this borrow", other.name()),
            }),
        }
    }

    /// The borrow performed hop 0 when funding is a flash swap
    fn record_borrow_hop(&mut self, borrowed: U256) {
        if let Some(hop) = self.chain.first() {
            self.report.advance(Phase::Hopping(0));
            self.report.hops.push(HopRecord {
                index: 0,
                pool: hop.pool.address,
                token_in: hop.token_in,
                token_out: hop.token_out,
                amount_in: self.principal,
                amount_out: borrowed,
            });
        }
    }

    fn run(
        &mut self,
        host: &mut dyn Host,
        caller: Address,
        callback: Callback,
    ) -> Result<ClosedBorrow, EngineError> {
        if self.invoked {
            return Err(EngineError::ReentrantCallback(caller));
        }
        if Some(caller) != self.expected_lender() {
            return Err(EngineError::UnexpectedCallback {
                caller,
                reason: format!("expected {:?}", self.expected_lender()),
            });
        }
        self.invoked = true;
        log_borrow!("{} from {:?}", callback.name(), caller);

        let (first, amount, fee_owed) = self.accept(caller, &callback)?;
        let amount = match (first, self.borrow_observation) {
            (1, Some(observation)) => observation
                .finish_amount(host)
                .map_err(|e| EngineError::hop_failed(0, e))?,
            _ => amount,
        };
        if first == 1 {
            self.record_borrow_hop(amount);
        }
        let gross_out = run_hops(host, self.engine, self.chain, first, amount, self.report)?;

        self.report.advance(Phase::Closing);
        let ticket = BorrowTicket::new(self.source, self.token, self.principal, fee_owed);
        let available = host.balance_of(self.token, self.engine);
        let owed = match ticket.repayment() {
            Some(owed) if available >= owed => owed,
            owed => {
                return Err(EngineError::RepaymentShortfall {
                    owed: owed.unwrap_or(U256::MAX),
                    available,
                })
            }
        };

        match self.source {
            FundingSource::FlashSwap { pool } => host.transfer(self.token, self.engine, pool, owed)?,
            FundingSource::FlashLoan { lender } => host.approve(self.token, self.engine, lender, owed),
            FundingSource::Prefunded => {}
        }
        log_borrow!("Repaid {} of {:?}, gross out {}", owed, self.token, gross_out);
        Ok(ClosedBorrow { ticket, gross_out })
    }
}

impl CallbackHandler for FlashBorrowCallback<'_> {
    fn on_callback(
        &mut self,
        host: &mut dyn Host,
        caller: Address,
        callback: Callback,
    ) -> Result<(), HostError> {
        match self.run(host, caller, callback) {
            Ok(closed) => {
                self.closed = Some(closed);
                Ok(())
            }
            Err(err) => Err(self.reject(err)),
        }
    }
}
