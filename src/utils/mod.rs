//! Utility functions and helpers

pub mod solana;

pub use solana::{setup_client, setup_wallet, wallet_from_base58};

use rust_decimal::{prelude::ToPrimitive, Decimal};

use crate::{Result, SwapError};

/// Parse a UI amount such as `"1.5"` into smallest units.
///
/// Rejects more significant fractional digits than `decimals` rather than
/// rounding.
pub fn parse_amount(amount: &str, decimals: u8) -> Result<u64> {
    let amount = amount.trim();
    let invalid = || SwapError::Config(format!("invalid amount: {amount}"));

    if !amount.bytes().any(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    let value = Decimal::from_str_exact(amount)
        .map_err(|_| invalid())?
        .normalize();
    if value.is_sign_negative() || value.scale() > u32::from(decimals) {
        return Err(invalid());
    }

    let multiplier = 10u64
        .checked_pow(u32::from(decimals))
        .map(Decimal::from)
        .ok_or(SwapError::Overflow)?;
    value
        .checked_mul(multiplier)
        .and_then(|raw| raw.to_u64())
        .ok_or(SwapError::Overflow)
}

/// Format smallest units as a UI amount, trimming trailing zeros.
pub fn format_amount(amount: u64, decimals: u8) -> Result<String> {
    let value = Decimal::try_from_i128_with_scale(i128::from(amount), u32::from(decimals))
        .map_err(|_| SwapError::Overflow)?;
    Ok(value.normalize().to_string())
}
