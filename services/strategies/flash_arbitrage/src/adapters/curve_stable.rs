//! Curve StableSwap pools, all nine call shapes
//!
//! | kind                     | index lookup                    | entry point           |
//! |--------------------------|---------------------------------|-----------------------|
//! | Interface1 plain         | `coins(int128)`                 | `exchange`            |
//! | Interface1 underlying    | `underlying_coins(int128)`      | `exchange_underlying` |
//! | Interface2 / NG plain    | `coins(uint256)`                | `exchange`            |
//! | Interface2 underlying    | `underlying_coins(uint256)`     | `exchange_underlying` |
//! | metapool plain           | `coins(uint256)`                | `exchange`            |
//! | metapool underlying      | `[coins(0)] ++ base_pool.coins` | `exchange_underlying` |
//!
//! Exchange indices are always `int128`. The pool pays the caller, so the
//! engine forwards the output when the recipient is someone else.

use super::{
    forward_output, list_coins, move_input, pair_indices, pool_view, ratio, Observation,
    QuoteHint, SwapRequest,
};
use crate::error::EngineError;
use arb_types::{
    Address, CoinIndex, ContractCall, CurveInterface, CurveStableKind, Host, NoCallbacks,
    ProtocolVariant, StableLayout, SwapOutcome, U256,
};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurveStableAdapter {
    pub kind: CurveStableKind,
}

impl CurveStableAdapter {
    pub fn new(kind: CurveStableKind) -> Self {
        Self { kind }
    }

    pub fn protocol(&self) -> ProtocolVariant {
        ProtocolVariant::CurveStable { kind: self.kind }
    }

    fn wide_lookup(&self) -> bool {
        self.kind.interface() != CurveInterface::V1
    }

    /// Coin list the exchange entry point indexes into
    pub(crate) fn coin_list(
        &self,
        host: &mut dyn Host,
        executor: Address,
        pool: Address,
    ) -> Result<Vec<Address>, EngineError> {
        let wide = self.wide_lookup();
        if !self.kind.uses_underlying() {
            return list_coins(host, executor, pool, ContractCall::Coins, wide);
        }

        match self.kind.layout() {
            StableLayout::Meta => {
                let index = if wide {
                    CoinIndex::Uint256(U256::zero())
                } else {
                    CoinIndex::Int128(0)
                };
                let coin0 =
                    pool_view(host, executor, pool, ContractCall::Coins(index))?.into_address(pool)?;
                let base =
                    pool_view(host, executor, pool, ContractCall::BasePool)?.into_address(pool)?;
                let base_coins = match list_coins(host, executor, base, ContractCall::Coins, true) {
                    Ok(coins) => coins,
                    Err(EngineError::UnsupportedProtocol { .. }) => {
                        list_coins(host, executor, base, ContractCall::Coins, false)?
                    }
                    Err(e) => return Err(e),
                };
                Ok(std::iter::once(coin0).chain(base_coins).collect())
            }
            StableLayout::Lending | StableLayout::Plain => {
                list_coins(host, executor, pool, ContractCall::UnderlyingCoins, wide)
            }
        }
    }

    fn indices(
        &self,
        host: &mut dyn Host,
        request: &SwapRequest,
    ) -> Result<(CoinIndex, CoinIndex), EngineError> {
        let coins = self.coin_list(host, request.executor, request.pool)?;
        let (i, j) = pair_indices(&coins, request.pool, request.token_in, request.token_out)?;
        debug!(pool = ?request.pool, kind = ?self.kind, i, j, "Resolved Curve indices");
        Ok((CoinIndex::Int128(i as i128), CoinIndex::Int128(j as i128)))
    }

    pub fn quote_hint(
        &self,
        host: &mut dyn Host,
        request: &SwapRequest,
    ) -> Result<QuoteHint, EngineError> {
        let (i, j) = self.indices(host, request)?;
        let dx = request.amount_in;
        let call = if self.kind.uses_underlying() {
            ContractCall::GetDyUnderlying { i, j, dx }
        } else {
            ContractCall::GetDy { i, j, dx }
        };
        let amount_out = pool_view(host, request.executor, request.pool, call)?
            .into_amount(request.pool)?;
        Ok(QuoteHint {
            amount_out,
            spot_price: ratio(amount_out, dx),
        })
    }

    pub fn swap(&self, host: &mut dyn Host, request: &SwapRequest) -> Result<SwapOutcome, EngineError> {
        let pool = request.pool;
        let (i, j) = self.indices(host, request)?;

        let observation = Observation::start(
            host,
            pool,
            request.token_out,
            request.executor,
            self.kind.expected_event(),
        );
        if request.payer != request.executor {
            move_input(host, request, request.executor)?;
        }
        host.approve(request.token_in, request.executor, pool, request.amount_in);

        let dx = request.amount_in;
        let min_dy = U256::zero();
        let call = if self.kind.uses_underlying() {
            ContractCall::ExchangeUnderlying { i, j, dx, min_dy }
        } else {
            ContractCall::Exchange { i, j, dx, min_dy }
        };
        host.call(request.executor, pool, call, &mut NoCallbacks)
            .map_err(|e| EngineError::from_pool_call(pool, e))?;

        let outcome = observation.finish(host)?;
        forward_output(host, request, outcome.amount_out)?;
        Ok(outcome)
    }
}
