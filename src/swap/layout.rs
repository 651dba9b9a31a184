//! Raw account layouts for AMM v4 pools and their OpenBook markets
//!
//! Both layouts are fixed-size little-endian records, decoded with
//! `bytemuck` from an unaligned copy of the account data.

use bytemuck::{Pod, Zeroable};
use solana_sdk::{program_pack::Pack, pubkey::Pubkey};

use crate::{
    swap::state::{FeeRate, STATUS_TRADABLE},
    Result, SwapError,
};

/// AMM v4 status values that still accept swaps.
const SWAP_ENABLED_STATUSES: [u64; 3] = [
    1, // Initialized
    6, // SwapOnly
    7, // WaitingTrade
];

/// Reserve flag reported for an uninitialized pool, whose raw status is 0.
pub const STATUS_UNINITIALIZED: u64 = u64::MAX;

/// AMM v4 fee schedule
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct AmmFees {
    pub min_separate_numerator: u64,
    pub min_separate_denominator: u64,
    pub trade_fee_numerator: u64,
    pub trade_fee_denominator: u64,
    pub pnl_numerator: u64,
    pub pnl_denominator: u64,
    pub swap_fee_numerator: u64,
    pub swap_fee_denominator: u64,
}

/// AMM v4 running totals. `u128` fields are kept as raw bytes so the struct
/// has no padding.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct AmmOutput {
    pub need_take_pnl_coin: u64,
    pub need_take_pnl_pc: u64,
    pub total_pnl_pc: u64,
    pub total_pnl_coin: u64,
    pub pool_open_time: u64,
    pub punish_pc_amount: u64,
    pub punish_coin_amount: u64,
    pub orderbook_to_init_time: u64,
    pub swap_coin_in_amount: [u8; 16],
    pub swap_pc_out_amount: [u8; 16],
    pub swap_acc_pc_fee: u64,
    pub swap_pc_in_amount: [u8; 16],
    pub swap_coin_out_amount: [u8; 16],
    pub swap_acc_coin_fee: u64,
}

/// AMM v4 pool account (752 bytes)
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct AmmInfo {
    pub status: u64,
    pub nonce: u64,
    pub order_num: u64,
    pub depth: u64,
    pub coin_decimals: u64,
    pub pc_decimals: u64,
    pub state: u64,
    pub reset_flag: u64,
    pub min_size: u64,
    pub vol_max_cut_ratio: u64,
    pub amount_wave: u64,
    pub coin_lot_size: u64,
    pub pc_lot_size: u64,
    pub min_price_multiplier: u64,
    pub max_price_multiplier: u64,
    pub sys_decimal_value: u64,
    pub fees: AmmFees,
    pub out_put: AmmOutput,
    pub coin_vault: Pubkey,
    pub pc_vault: Pubkey,
    pub coin_vault_mint: Pubkey,
    pub pc_vault_mint: Pubkey,
    pub lp_mint: Pubkey,
    pub open_orders: Pubkey,
    pub market: Pubkey,
    pub market_program: Pubkey,
    pub target_orders: Pubkey,
    pub padding1: [u64; 8],
    pub amm_owner: Pubkey,
    pub lp_amount: u64,
    pub client_order_id: u64,
    pub recent_epoch: u64,
    pub padding2: u64,
}

impl AmmInfo {
    pub const LEN: usize = 752;

    pub fn decode(account: &Pubkey, data: &[u8]) -> Result<Self> {
        decode_exact(account, data.get(..Self::LEN).unwrap_or(data), Self::LEN)
    }

    /// Status mapped onto the reserve flag: `0` when swaps are allowed,
    /// otherwise the raw program status.
    pub fn swap_status(&self) -> u64 {
        match self.status {
            s if SWAP_ENABLED_STATUSES.contains(&s) => STATUS_TRADABLE,
            0 => STATUS_UNINITIALIZED,
            s => s,
        }
    }

    pub fn swap_fee(&self) -> Result<FeeRate> {
        FeeRate::new(self.fees.swap_fee_numerator, self.fees.swap_fee_denominator)
    }

    pub fn decimals(&self, account: &Pubkey) -> Result<(u8, u8)> {
        let narrow = |value: u64| {
            u8::try_from(value).map_err(|_| SwapError::AccountDecode {
                account: *account,
                reason: format!("decimals {value} out of range"),
            })
        };
        Ok((narrow(self.coin_decimals)?, narrow(self.pc_decimals)?))
    }

    /// Tradable reserves: vault balances minus PnL the pool still owes.
    pub fn reserves(
        &self,
        account: &Pubkey,
        coin_vault_amount: u64,
        pc_vault_amount: u64,
    ) -> Result<(u64, u64)> {
        let owed = |amount: u64, pnl: u64| {
            amount.checked_sub(pnl).ok_or_else(|| SwapError::AccountDecode {
                account: *account,
                reason: format!("vault balance {amount} below pending pnl {pnl}"),
            })
        };
        Ok((
            owed(coin_vault_amount, self.out_put.need_take_pnl_coin)?,
            owed(pc_vault_amount, self.out_put.need_take_pnl_pc)?,
        ))
    }
}

/// OpenBook (Serum v3) market state, without the 5-byte head and 7-byte tail
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct MarketState {
    pub account_flags: u64,
    pub own_address: Pubkey,
    pub vault_signer_nonce: u64,
    pub base_mint: Pubkey,
    pub quote_mint: Pubkey,
    pub base_vault: Pubkey,
    pub base_deposits_total: u64,
    pub base_fees_accrued: u64,
    pub quote_vault: Pubkey,
    pub quote_deposits_total: u64,
    pub quote_fees_accrued: u64,
    pub quote_dust_threshold: u64,
    pub request_queue: Pubkey,
    pub event_queue: Pubkey,
    pub bids: Pubkey,
    pub asks: Pubkey,
    pub base_lot_size: u64,
    pub quote_lot_size: u64,
    pub fee_rate_bps: u64,
    pub referrer_rebates_accrued: u64,
}

impl MarketState {
    const HEAD: usize = 5;
    pub const LEN: usize = 376;

    pub fn decode(account: &Pubkey, data: &[u8]) -> Result<Self> {
        let body = data
            .get(Self::HEAD..Self::HEAD + Self::LEN)
            .ok_or_else(|| SwapError::AccountDecode {
                account: *account,
                reason: format!("market account is {} bytes", data.len()),
            })?;
        decode_exact(account, body, Self::LEN)
    }

    /// Signer PDA the market uses for its vaults.
    pub fn vault_signer(&self, market: &Pubkey, market_program: &Pubkey) -> Result<Pubkey> {
        Pubkey::create_program_address(
            &[market.as_ref(), &self.vault_signer_nonce.to_le_bytes()],
            market_program,
        )
        .map_err(|e| SwapError::AccountDecode {
            account: *market,
            reason: format!("market vault signer: {e}"),
        })
    }
}

/// Token amount held by an SPL token account.
pub fn token_amount(account: &Pubkey, data: &[u8]) -> Result<u64> {
    spl_token::state::Account::unpack(data.get(..spl_token::state::Account::LEN).unwrap_or(data))
        .map(|a| a.amount)
        .map_err(|e| SwapError::AccountDecode {
            account: *account,
            reason: format!("token account: {e}"),
        })
}

fn decode_exact<T: Pod>(account: &Pubkey, data: &[u8], len: usize) -> Result<T> {
    if data.len() != len {
        return Err(SwapError::AccountDecode {
            account: *account,
            reason: format!("expected {len} bytes, found {}", data.len()),
        });
    }
    bytemuck::try_pod_read_unaligned(data).map_err(|e| SwapError::AccountDecode {
        account: *account,
        reason: e.to_string(),
    })
}
