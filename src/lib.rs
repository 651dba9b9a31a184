//! Raydium AMM swap: quote and execute constant-product swaps on Solana
//!
//! This library resolves a Raydium AMM v4 pool from fresh on-chain state,
//! computes an exact integer quote with a slippage floor, and assembles,
//! signs and submits a transaction that enforces that floor on-chain.

pub mod swap;
pub mod utils;

use solana_sdk::{commitment_config::CommitmentConfig, pubkey::Pubkey, signature::Signature};
use std::{env, str::FromStr, time::Duration};
use thiserror::Error;

pub use swap::{
    FixedSide, MintInfo, Pool, PoolKind, Quote, ReserveState, ResolvedPool, RoutingKeys,
    Slippage, SubmitMode, Submission, SwapEngine, SwapIntent, SwapOutcome, SwapRequest,
};
pub use utils::solana::{ChainRpc, Session};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Error types for swap operations
#[derive(Error, Debug)]
pub enum SwapError {
    #[error("Pool program {program_id} (version {version}) is not a constant-product AMM")]
    InvalidPoolKind { program_id: Pubkey, version: u8 },

    #[error("Pool is not tradable (status {status})")]
    PoolDisabled { status: u64 },

    #[error("Input mint {mint} does not match pool")]
    MintMismatch { mint: Pubkey },

    #[error("Swap amount must be positive")]
    InvalidAmount,

    #[error("Pool reserves are empty")]
    EmptyReserves,

    #[error("Slippage of {bps}bps is outside 0..=10000")]
    InvalidSlippage { bps: u32 },

    #[error("Invalid fee rate {numerator}/{denominator}")]
    InvalidFee { numerator: u64, denominator: u64 },

    #[error("Arithmetic overflow while quoting")]
    Overflow,

    #[error("Transaction is {size} bytes, exceeding the {limit} byte packet limit")]
    TransactionTooLarge { size: usize, limit: usize },

    #[error("Pool not found: {0}")]
    PoolNotFound(String),

    #[error("Failed to decode account {account}: {reason}")]
    AccountDecode { account: Pubkey, reason: String },

    #[error("Pool API error: {0}")]
    Api(String),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Rpc(#[from] solana_client::client_error::ClientError),

    #[error("Transaction error: {0}")]
    Transaction(String),

    #[error("Transaction {signature} rejected: {reason}")]
    Rejected { signature: Signature, reason: String },

    #[error(
        "Transaction {signature} not finalized after {waited:?}; \
         check chain state before resubmitting"
    )]
    Unconfirmed { signature: Signature, waited: Duration },

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Broad classification of a [`SwapError`], used by callers to decide
/// whether a fresh quote is worth attempting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Rejected before any network mutation.
    Validation,
    /// The trade is unsafe for the current reserves.
    Computation,
    /// A read or broadcast failed; retry with a fresh quote.
    Network,
    /// The program rejected the transaction. Terminal, re-quote.
    Rejected,
    /// Outcome unknown. Query the chain before resubmitting.
    Ambiguous,
}

impl SwapError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidPoolKind { .. }
            | Self::PoolDisabled { .. }
            | Self::MintMismatch { .. }
            | Self::InvalidAmount
            | Self::EmptyReserves
            | Self::InvalidSlippage { .. }
            | Self::InvalidFee { .. }
            | Self::Config(_) => ErrorKind::Validation,
            Self::Overflow | Self::TransactionTooLarge { .. } | Self::Transaction(_) => {
                ErrorKind::Computation
            }
            Self::PoolNotFound(_)
            | Self::AccountDecode { .. }
            | Self::Api(_)
            | Self::Http(_)
            | Self::Rpc(_) => ErrorKind::Network,
            Self::Rejected { .. } => ErrorKind::Rejected,
            Self::Unconfirmed { .. } => ErrorKind::Ambiguous,
        }
    }
}

/// Result type for swap operations
pub type Result<T> = std::result::Result<T, SwapError>;

/// Solana cluster the session talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cluster {
    Mainnet,
    Devnet,
}

impl Cluster {
    /// The Raydium pool index only serves mainnet pools.
    pub fn has_pool_index(&self) -> bool {
        matches!(self, Cluster::Mainnet)
    }
}

impl FromStr for Cluster {
    type Err = SwapError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "mainnet" | "mainnet-beta" => Ok(Cluster::Mainnet),
            "devnet" => Ok(Cluster::Devnet),
            other => Err(SwapError::Config(format!("unknown cluster: {other}"))),
        }
    }
}

/// Transaction message format to compile swaps into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxVersion {
    Legacy,
    V0,
}

/// Configuration for swap operations
#[derive(Debug, Clone)]
pub struct Config {
    /// RPC endpoint URL
    pub rpc_url: String,
    /// Cluster, selects the pool resolution path
    pub cluster: Cluster,
    /// Commitment level for reads and blockhashes
    pub commitment: CommitmentConfig,
    /// Raydium pool index base URL
    pub api_base_url: String,
    /// Transaction message format
    pub tx_version: TxVersion,
    /// Default slippage tolerance (in basis points)
    pub slippage_bps: u32,
    /// Deadline for finalization polling
    pub confirm_timeout: Duration,
    /// Interval between signature status polls
    pub poll_interval: Duration,
    /// Skip the RPC node's preflight simulation
    pub skip_preflight: bool,
    /// Optional compute unit limit instruction
    pub compute_unit_limit: Option<u32>,
    /// Optional priority fee (micro-lamports per compute unit)
    pub compute_unit_price: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rpc_url: "https://api.mainnet-beta.solana.com".to_string(),
            cluster: Cluster::Mainnet,
            commitment: CommitmentConfig::finalized(),
            api_base_url: "https://api-v3.raydium.io".to_string(),
            tx_version: TxVersion::V0,
            slippage_bps: 100, // 1%
            confirm_timeout: Duration::from_secs(60),
            poll_interval: Duration::from_millis(500),
            skip_preflight: false,
            compute_unit_limit: None,
            compute_unit_price: None,
        }
    }
}

impl Config {
    /// Builds a config from the process environment (after loading `.env`),
    /// falling back to defaults for unset variables.
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        let mut config = Self::default();

        if let Ok(url) = env::var("RPC_URL") {
            config.rpc_url = url;
        }
        if let Ok(cluster) = env::var("CLUSTER") {
            config.cluster = cluster.parse()?;
        }
        if let Ok(url) = env::var("RAYDIUM_API_URL") {
            config.api_base_url = url;
        }
        if let Some(bps) = parse_var::<u32>("SLIPPAGE_BPS")? {
            config.slippage_bps = bps;
        }
        if let Some(secs) = parse_var::<u64>("CONFIRM_TIMEOUT_SECS")? {
            config.confirm_timeout = Duration::from_secs(secs);
        }
        config.compute_unit_limit = parse_var("COMPUTE_UNIT_LIMIT")?;
        config.compute_unit_price = parse_var("COMPUTE_UNIT_PRICE")?;

        Ok(config)
    }

    /// Default slippage as a validated [`Slippage`].
    pub fn slippage(&self) -> Result<Slippage> {
        Slippage::from_bps(self.slippage_bps)
    }
}

fn parse_var<T: FromStr>(name: &str) -> Result<Option<T>> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| SwapError::Config(format!("invalid {name}: {raw}"))),
        Err(_) => Ok(None),
    }
}
