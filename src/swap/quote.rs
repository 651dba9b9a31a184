//! Constant-product quote computation
//!
//! Mirrors the integer arithmetic of the AMM v4 program exactly: the fee is
//! taken from the input, every division floors, and intermediates are `u128`
//! with checked operations. A quote that differs from the program's own
//! computation by even one unit would break the minimum-output guarantee.

use crate::{
    swap::state::{MintInfo, Pool, ReserveState, Slippage, SwapIntent, BPS_DENOMINATOR},
    Result, SwapError,
};
use solana_sdk::pubkey::Pubkey;
use tracing::debug;

/// Result of quoting an exact-input swap
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Quote {
    /// Mint sold
    pub mint_in: MintInfo,
    /// Mint bought
    pub mint_out: MintInfo,
    /// Whether the base mint is sold
    pub base_in: bool,
    /// Input amount
    pub amount_in: u64,
    /// Input left after the trade fee
    pub amount_in_after_fee: u64,
    /// Trade fee taken from the input
    pub fee_amount: u64,
    /// Expected output amount
    pub amount_out: u64,
    /// Minimum output amount (with slippage), enforced on-chain
    pub min_amount_out: u64,
    /// Price impact (in basis points)
    pub price_impact_bps: u32,
}

/// Checks pool kind, pool status and input mint, in that order, and returns
/// whether `input_mint` is the base mint.
pub fn swap_direction(pool: &Pool, reserves: &ReserveState, input_mint: &Pubkey) -> Result<bool> {
    pool.kind()?;

    if !reserves.is_tradable() {
        return Err(SwapError::PoolDisabled {
            status: reserves.status,
        });
    }

    pool.is_base_mint(input_mint).ok_or(SwapError::MintMismatch { mint: *input_mint })
}

/// Quotes an exact-input swap of `intent` against `pool` at `reserves`.
///
/// Checks run in a fixed order and the first failure is returned: pool kind,
/// pool status, input mint, amount, reserves.
pub fn compute_quote(pool: &Pool, reserves: &ReserveState, intent: &SwapIntent) -> Result<Quote> {
    let base_in = swap_direction(pool, reserves, &intent.input_mint)?;

    if intent.amount_in == 0 {
        return Err(SwapError::InvalidAmount);
    }

    let (reserve_in, reserve_out) = reserves.oriented(base_in);
    if reserve_in == 0 || reserve_out == 0 {
        return Err(SwapError::EmptyReserves);
    }

    // The vault balance after the trade must still be a valid token amount.
    reserve_in
        .checked_add(intent.amount_in)
        .ok_or(SwapError::Overflow)?;

    let amount_in_after_fee = deduct_fee(
        intent.amount_in,
        reserves.fee.numerator,
        reserves.fee.denominator,
    )?;
    let amount_out = amount_out(reserve_in, reserve_out, amount_in_after_fee)?;
    let min_amount_out = min_amount_out(amount_out, intent.slippage)?;
    let price_impact_bps =
        price_impact_bps(reserve_in, reserve_out, amount_in_after_fee, amount_out)?;

    let (mint_in, mint_out) = if base_in {
        (pool.mint_a.clone(), pool.mint_b.clone())
    } else {
        (pool.mint_b.clone(), pool.mint_a.clone())
    };

    debug!(
        pool = %pool.id,
        base_in,
        reserve_in,
        reserve_out,
        amount_in_after_fee,
        amount_out,
        "constant-product output"
    );

    Ok(Quote {
        mint_in,
        mint_out,
        base_in,
        amount_in: intent.amount_in,
        amount_in_after_fee,
        fee_amount: intent.amount_in - amount_in_after_fee,
        amount_out,
        min_amount_out,
        price_impact_bps,
    })
}

/// `floor(amount * (denominator - numerator) / denominator)`
pub fn deduct_fee(amount: u64, numerator: u64, denominator: u64) -> Result<u64> {
    if denominator == 0 || numerator > denominator {
        return Err(SwapError::InvalidFee {
            numerator,
            denominator,
        });
    }
    let kept = (amount as u128)
        .checked_mul((denominator - numerator) as u128)
        .ok_or(SwapError::Overflow)?
        / denominator as u128;
    to_u64(kept)
}

/// `floor(reserve_out * amount_in / (reserve_in + amount_in))`
pub fn amount_out(reserve_in: u64, reserve_out: u64, amount_in: u64) -> Result<u64> {
    if reserve_in == 0 || reserve_out == 0 {
        return Err(SwapError::EmptyReserves);
    }
    let numerator = (reserve_out as u128)
        .checked_mul(amount_in as u128)
        .ok_or(SwapError::Overflow)?;
    let denominator = (reserve_in as u128)
        .checked_add(amount_in as u128)
        .ok_or(SwapError::Overflow)?;
    to_u64(numerator / denominator)
}

/// `floor(amount_out * (10000 - slippage_bps) / 10000)`
pub fn min_amount_out(amount_out: u64, slippage: Slippage) -> Result<u64> {
    let kept = BPS_DENOMINATOR
        .checked_sub(slippage.bps())
        .ok_or(SwapError::InvalidSlippage {
            bps: slippage.bps(),
        })?;
    let min = (amount_out as u128)
        .checked_mul(kept as u128)
        .ok_or(SwapError::Overflow)?
        / BPS_DENOMINATOR as u128;
    to_u64(min)
}

fn price_impact_bps(
    reserve_in: u64,
    reserve_out: u64,
    amount_in: u64,
    amount_out: u64,
) -> Result<u32> {
    let ideal_out = (amount_in as u128)
        .checked_mul(reserve_out as u128)
        .ok_or(SwapError::Overflow)?
        / reserve_in as u128;
    if ideal_out == 0 {
        return Ok(0);
    }
    let shortfall = ideal_out.saturating_sub(amount_out as u128);
    let bps = shortfall
        .checked_mul(BPS_DENOMINATOR as u128)
        .ok_or(SwapError::Overflow)?
        / ideal_out;
    u32::try_from(bps).map_err(|_| SwapError::Overflow)
}

fn to_u64(value: u128) -> Result<u64> {
    u64::try_from(value).map_err(|_| SwapError::Overflow)
}
