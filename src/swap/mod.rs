//! Swap module for the Raydium constant-product AMM
//!
//! One request flows `PoolResolver -> compute_quote -> TransactionBuilder ->
//! Submitter`. Reserves are read fresh for every request; nothing is cached
//! between quotes.

use solana_sdk::{pubkey::Pubkey, signer::Signer};
use tracing::info;

pub mod api;
pub mod layout;
pub mod quote;
pub mod raydium;
pub mod resolver;
pub mod state;
pub mod submit;

#[cfg(test)]
mod proptest_properties;

pub use api::{PoolIndex, RaydiumApi};
pub use quote::{compute_quote, swap_direction, Quote};
pub use raydium::{FixedSide, TransactionBuilder, UnsignedSwapTransaction};
pub use resolver::PoolResolver;
pub use state::{
    FeeRate, MintInfo, Pool, PoolKind, ReserveState, ResolvedPool, RoutingKeys, Slippage,
    SwapIntent,
};
pub use submit::{SubmitMode, Submission, Submitter};

use crate::{utils::solana::Session, Result};

/// A swap of `amount_in` of `input_mint` against one pool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapRequest {
    pub pool_id: Pubkey,
    pub input_mint: Pubkey,
    pub amount_in: u64,
    pub slippage: Slippage,
    pub mode: SubmitMode,
}

impl SwapRequest {
    pub fn intent(&self) -> SwapIntent {
        SwapIntent {
            input_mint: self.input_mint,
            amount_in: self.amount_in,
            slippage: self.slippage,
        }
    }
}

/// The quote a swap was built from and what became of it
#[derive(Debug, Clone, PartialEq)]
pub struct SwapOutcome {
    pub quote: Quote,
    pub submission: Submission,
}

/// Core swap engine
pub struct SwapEngine<'a> {
    session: &'a Session,
    builder: TransactionBuilder,
}

impl<'a> SwapEngine<'a> {
    /// Create a new swap engine over a session
    pub fn new(session: &'a Session) -> Self {
        Self {
            session,
            builder: TransactionBuilder::from_config(session.config()),
        }
    }

    #[must_use]
    pub fn with_builder(mut self, builder: TransactionBuilder) -> Self {
        self.builder = builder;
        self
    }

    /// Quote against freshly read reserves without building anything.
    pub async fn quote(&self, pool_id: &Pubkey, intent: &SwapIntent) -> Result<Quote> {
        let resolved = PoolResolver::new(self.session).resolve(pool_id).await?;
        quote_resolved(&resolved, intent)
    }

    /// Quote, build, and submit according to `request.mode`.
    pub async fn swap<S: Signer>(&self, request: &SwapRequest, signer: &S) -> Result<SwapOutcome> {
        let resolved = PoolResolver::new(self.session).resolve(&request.pool_id).await?;
        self.execute(&resolved, &request.intent(), request.mode, signer).await
    }

    /// Quote against an already resolved pool, then build and submit.
    pub async fn execute<S: Signer>(
        &self,
        resolved: &ResolvedPool,
        intent: &SwapIntent,
        mode: SubmitMode,
        signer: &S,
    ) -> Result<SwapOutcome> {
        let quote = quote_resolved(resolved, intent)?;

        let unsigned = self
            .builder
            .build(&resolved.pool, &resolved.keys, &quote, &signer.pubkey())?;
        let submission = Submitter::new(self.session)
            .submit(&unsigned, signer, mode)
            .await?;

        Ok(SwapOutcome { quote, submission })
    }
}

fn quote_resolved(resolved: &ResolvedPool, intent: &SwapIntent) -> Result<Quote> {
    let quote = compute_quote(&resolved.pool, &resolved.reserves, intent)?;

    info!(
        pool = %resolved.pool.id,
        mint_in = %quote.mint_in.address,
        mint_out = %quote.mint_out.address,
        amount_in = quote.amount_in,
        amount_out = quote.amount_out,
        min_amount_out = quote.min_amount_out,
        price_impact_bps = quote.price_impact_bps,
        "quote computed"
    );
    Ok(quote)
}
