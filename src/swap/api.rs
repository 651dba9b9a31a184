//! Raydium pool index (API v3) client
//!
//! Serves pool metadata and routing keys by pool id. Only mainnet pools are
//! indexed; other clusters resolve pools from chain state instead.

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize};
use solana_sdk::pubkey::Pubkey;
use std::time::Duration;
use tracing::debug;

use crate::{
    swap::{
        raydium::AMM_V4_VERSION,
        state::{MintInfo, Pool, RoutingKeys},
    },
    Result, SwapError,
};

/// Source of pool metadata and routing keys
#[async_trait]
pub trait PoolIndex: Send + Sync {
    /// Pool metadata (mints, owning program, model version).
    async fn fetch_pool_info(&self, pool_id: &Pubkey) -> Result<Pool>;

    /// Accounts needed to address the pool in a swap instruction.
    async fn fetch_pool_keys(&self, pool_id: &Pubkey) -> Result<RoutingKeys>;
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    success: bool,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default = "Vec::new")]
    data: Vec<Option<T>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiMint {
    address: String,
    decimals: u8,
    #[serde(default)]
    symbol: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiPoolInfo {
    #[serde(rename = "type")]
    pool_type: String,
    program_id: String,
    id: String,
    mint_a: ApiMint,
    mint_b: ApiMint,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiVaults {
    #[serde(rename = "A")]
    a: String,
    #[serde(rename = "B")]
    b: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiPoolKeys {
    authority: String,
    open_orders: String,
    target_orders: String,
    vault: ApiVaults,
    market_program_id: String,
    market_id: String,
    market_authority: String,
    market_base_vault: String,
    market_quote_vault: String,
    market_bids: String,
    market_asks: String,
    market_event_queue: String,
}

fn parse_key(field: &str, value: &str) -> Result<Pubkey> {
    value
        .parse()
        .map_err(|_| SwapError::Api(format!("invalid {field}: {value}")))
}

impl ApiMint {
    fn into_mint(self) -> Result<MintInfo> {
        Ok(MintInfo {
            address: parse_key("mint address", &self.address)?,
            decimals: self.decimals,
            symbol: self.symbol,
        })
    }
}

impl ApiPoolInfo {
    fn into_pool(self) -> Result<Pool> {
        // The index reports constant-product AMM pools as "Standard".
        let version = if self.pool_type == "Standard" {
            AMM_V4_VERSION
        } else {
            0
        };
        Ok(Pool {
            id: parse_key("id", &self.id)?,
            mint_a: self.mint_a.into_mint()?,
            mint_b: self.mint_b.into_mint()?,
            program_id: parse_key("programId", &self.program_id)?,
            version,
        })
    }
}

impl ApiPoolKeys {
    fn into_keys(self) -> Result<RoutingKeys> {
        Ok(RoutingKeys {
            authority: parse_key("authority", &self.authority)?,
            open_orders: parse_key("openOrders", &self.open_orders)?,
            target_orders: parse_key("targetOrders", &self.target_orders)?,
            base_vault: parse_key("vault.A", &self.vault.a)?,
            quote_vault: parse_key("vault.B", &self.vault.b)?,
            market_program: parse_key("marketProgramId", &self.market_program_id)?,
            market: parse_key("marketId", &self.market_id)?,
            market_authority: parse_key("marketAuthority", &self.market_authority)?,
            market_bids: parse_key("marketBids", &self.market_bids)?,
            market_asks: parse_key("marketAsks", &self.market_asks)?,
            market_event_queue: parse_key("marketEventQueue", &self.market_event_queue)?,
            market_base_vault: parse_key("marketBaseVault", &self.market_base_vault)?,
            market_quote_vault: parse_key("marketQuoteVault", &self.market_quote_vault)?,
        })
    }
}

/// Raydium API v3 client
#[derive(Debug, Clone)]
pub struct RaydiumApi {
    http: reqwest::Client,
    base_url: String,
}

impl RaydiumApi {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    async fn fetch_one<T: DeserializeOwned>(&self, path: &str, pool_id: &Pubkey) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        debug!(url = %url, pool = %pool_id, "querying pool index");

        let response: ApiResponse<T> = self
            .http
            .get(&url)
            .query(&[("ids", pool_id.to_string())])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        first_entry(response, pool_id)
    }
}

fn first_entry<T>(response: ApiResponse<T>, pool_id: &Pubkey) -> Result<T> {
    if !response.success {
        return Err(SwapError::Api(
            response.msg.unwrap_or_else(|| "request failed".to_string()),
        ));
    }
    response
        .data
        .into_iter()
        .next()
        .flatten()
        .ok_or_else(|| SwapError::PoolNotFound(pool_id.to_string()))
}

#[async_trait]
impl PoolIndex for RaydiumApi {
    async fn fetch_pool_info(&self, pool_id: &Pubkey) -> Result<Pool> {
        self.fetch_one::<ApiPoolInfo>("/pools/info/ids", pool_id)
            .await?
            .into_pool()
    }

    async fn fetch_pool_keys(&self, pool_id: &Pubkey) -> Result<RoutingKeys> {
        self.fetch_one::<ApiPoolKeys>("/pools/key/ids", pool_id)
            .await?
            .into_keys()
    }
}
