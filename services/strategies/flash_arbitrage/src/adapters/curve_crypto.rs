//! Curve CryptoSwap pools (two-coin, TwoCrypto-NG, TriCrypto)
//!
//! One shape for every pool size: `coins(uint256)` and
//! `exchange(uint256 i, uint256 j, dx, min_dy)`, settled with `TokenExchange`.

use super::{
    forward_output, list_coins, move_input, pair_indices, pool_view, ratio, Observation,
    QuoteHint, SwapRequest,
};
use crate::error::EngineError;
use arb_types::{CoinIndex, ContractCall, EventSignature, Host, NoCallbacks, SwapOutcome, U256};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CurveCryptoAdapter;

impl CurveCryptoAdapter {
    fn indices(
        &self,
        host: &mut dyn Host,
        request: &SwapRequest,
    ) -> Result<(CoinIndex, CoinIndex), EngineError> {
        let coins = list_coins(host, request.executor, request.pool, ContractCall::Coins, true)?;
        let (i, j) = pair_indices(&coins, request.pool, request.token_in, request.token_out)?;
        Ok((
            CoinIndex::Uint256(U256::from(i)),
            CoinIndex::Uint256(U256::from(j)),
        ))
    }

    pub fn quote_hint(
        &self,
        host: &mut dyn Host,
        request: &SwapRequest,
    ) -> Result<QuoteHint, EngineError> {
        let (i, j) = self.indices(host, request)?;
        let dx = request.amount_in;
        let amount_out = pool_view(host, request.executor, request.pool, ContractCall::GetDy { i, j, dx })?
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
            EventSignature::TokenExchange,
        );
        if request.payer != request.executor {
            move_input(host, request, request.executor)?;
        }
        host.approve(request.token_in, request.executor, pool, request.amount_in);

        let call = ContractCall::Exchange {
            i,
            j,
            dx: request.amount_in,
            min_dy: U256::zero(),
        };
        host.call(request.executor, pool, call, &mut NoCallbacks)
            .map_err(|e| EngineError::from_pool_call(pool, e))?;

        let outcome = observation.finish(host)?;
        forward_output(host, request, outcome.amount_out)?;
        Ok(outcome)
    }
}
