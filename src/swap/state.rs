//! Pool, reserve and intent snapshots
//!
//! Everything here is a read-only value owned by one quote flow. Reserves are
//! read fresh from chain for every quote and never shared between requests.

use crate::{swap::raydium, Result, SwapError};
use solana_sdk::pubkey::Pubkey;

/// Basis-point denominator shared by slippage and price impact.
pub const BPS_DENOMINATOR: u32 = 10_000;

/// Reserve status flag meaning the pool accepts swaps.
pub const STATUS_TRADABLE: u64 = 0;

/// Token mint as seen by the pool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MintInfo {
    /// Mint address
    pub address: Pubkey,
    /// Decimal places, fixed per mint
    pub decimals: u8,
    /// Human readable symbol, if the index knows one
    pub symbol: Option<String>,
}

impl MintInfo {
    pub fn new(address: Pubkey, decimals: u8) -> Self {
        Self {
            address,
            decimals,
            symbol: None,
        }
    }

    /// Symbol when known, otherwise the mint address.
    pub fn label(&self) -> String {
        self.symbol
            .clone()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| self.address.to_string())
    }
}

/// Pool models this crate can quote against.
///
/// Only the constant-product AMM exists today; other models are added as
/// new variants rather than inferred from account shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolKind {
    /// Raydium AMM v4, `x * y = k`
    ConstantProduct,
}

impl PoolKind {
    /// Resolves the pool model from its owning program, checked against the
    /// allow-list of known AMM programs.
    pub fn from_program(program_id: &Pubkey, version: u8) -> Result<Self> {
        if version == raydium::AMM_V4_VERSION && raydium::is_amm_v4_program(program_id) {
            Ok(PoolKind::ConstantProduct)
        } else {
            Err(SwapError::InvalidPoolKind {
                program_id: *program_id,
                version,
            })
        }
    }
}

/// One AMM instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pool {
    /// Pool (AMM account) address
    pub id: Pubkey,
    /// Base mint
    pub mint_a: MintInfo,
    /// Quote mint
    pub mint_b: MintInfo,
    /// Program owning the pool
    pub program_id: Pubkey,
    /// AMM model version
    pub version: u8,
}

impl Pool {
    pub fn kind(&self) -> Result<PoolKind> {
        PoolKind::from_program(&self.program_id, self.version)
    }

    /// Returns `Some(true)` when `mint` is the base mint, `Some(false)` when it
    /// is the quote mint, `None` otherwise.
    pub fn is_base_mint(&self, mint: &Pubkey) -> Option<bool> {
        if *mint == self.mint_a.address {
            Some(true)
        } else if *mint == self.mint_b.address {
            Some(false)
        } else {
            None
        }
    }
}

/// Trade fee as a rational `numerator / denominator`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeRate {
    pub numerator: u64,
    pub denominator: u64,
}

impl FeeRate {
    /// Raydium AMM v4 swap fee, 0.25%.
    pub const AMM_V4: FeeRate = FeeRate {
        numerator: 25,
        denominator: 10_000,
    };

    pub fn new(numerator: u64, denominator: u64) -> Result<Self> {
        if denominator == 0 || numerator > denominator {
            return Err(SwapError::InvalidFee {
                numerator,
                denominator,
            });
        }
        Ok(Self {
            numerator,
            denominator,
        })
    }
}

impl Default for FeeRate {
    fn default() -> Self {
        Self::AMM_V4
    }
}

/// Reserve snapshot read from chain immediately before quoting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReserveState {
    /// Base (mint A) reserve, smallest units
    pub base_reserve: u64,
    /// Quote (mint B) reserve, smallest units
    pub quote_reserve: u64,
    /// Trade fee charged on the input leg
    pub fee: FeeRate,
    /// 0 when the pool accepts swaps
    pub status: u64,
    /// Slot of the read, if known
    pub slot: Option<u64>,
}

impl ReserveState {
    pub fn new(base_reserve: u64, quote_reserve: u64) -> Self {
        Self {
            base_reserve,
            quote_reserve,
            fee: FeeRate::default(),
            status: STATUS_TRADABLE,
            slot: None,
        }
    }

    pub fn is_tradable(&self) -> bool {
        self.status == STATUS_TRADABLE
    }

    /// `(reserve_in, reserve_out)` for the given direction.
    pub fn oriented(&self, base_in: bool) -> (u64, u64) {
        if base_in {
            (self.base_reserve, self.quote_reserve)
        } else {
            (self.quote_reserve, self.base_reserve)
        }
    }
}

/// Slippage tolerance in basis points, `0..=10000`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Slippage(u32);

impl Slippage {
    pub const ZERO: Slippage = Slippage(0);

    pub fn from_bps(bps: u32) -> Result<Self> {
        if bps > BPS_DENOMINATOR {
            return Err(SwapError::InvalidSlippage { bps });
        }
        Ok(Self(bps))
    }

    /// From a fraction such as `0.01` for 1%. Partial basis points are
    /// dropped so the tolerance never exceeds the one asked for.
    pub fn from_fraction(fraction: f64) -> Result<Self> {
        if !fraction.is_finite() || fraction < 0.0 {
            return Err(SwapError::InvalidSlippage { bps: u32::MAX });
        }
        let bps = (fraction * BPS_DENOMINATOR as f64).floor();
        if bps > u32::MAX as f64 {
            return Err(SwapError::InvalidSlippage { bps: u32::MAX });
        }
        Self::from_bps(bps as u32)
    }

    pub fn bps(&self) -> u32 {
        self.0
    }
}

/// A user trade request against one pool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapIntent {
    /// Mint being sold; must be one of the pool's mints
    pub input_mint: Pubkey,
    /// Amount sold, smallest units
    pub amount_in: u64,
    /// Tolerated output degradation
    pub slippage: Slippage,
}

/// Accounts the AMM and its OpenBook market need in a swap instruction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingKeys {
    pub authority: Pubkey,
    pub open_orders: Pubkey,
    pub target_orders: Pubkey,
    pub base_vault: Pubkey,
    pub quote_vault: Pubkey,
    pub market_program: Pubkey,
    pub market: Pubkey,
    pub market_authority: Pubkey,
    pub market_bids: Pubkey,
    pub market_asks: Pubkey,
    pub market_event_queue: Pubkey,
    pub market_base_vault: Pubkey,
    pub market_quote_vault: Pubkey,
}

/// Everything the resolver returns for one pool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPool {
    pub pool: Pool,
    pub reserves: ReserveState,
    pub keys: RoutingKeys,
}
