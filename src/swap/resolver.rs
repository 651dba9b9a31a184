//! Pool resolution from the pool index and chain state
//!
//! Reserves always come from a fresh chain read. Metadata and routing keys
//! come from the pool index when the session has one, otherwise they are
//! decoded from the AMM and market accounts directly.

use solana_sdk::{account::Account, pubkey::Pubkey};
use tracing::{debug, info};

use crate::{
    swap::{
        api::PoolIndex,
        layout::{token_amount, AmmInfo, MarketState},
        raydium::{amm_authority, is_amm_v4_program, AMM_V4_VERSION},
        state::{MintInfo, Pool, ReserveState, ResolvedPool, RoutingKeys},
    },
    utils::solana::{AccountBatch, ChainRpc, Session},
    Result, SwapError,
};

/// Resolves pool metadata, routing keys and reserves for a pool id
pub struct PoolResolver<'a> {
    session: &'a Session,
}

impl<'a> PoolResolver<'a> {
    pub fn new(session: &'a Session) -> Self {
        Self { session }
    }

    pub async fn resolve(&self, pool_id: &Pubkey) -> Result<ResolvedPool> {
        let resolved = match self.session.index() {
            Some(index) => self.resolve_indexed(index, pool_id).await?,
            None => self.resolve_direct(pool_id).await?,
        };

        info!(
            pool = %pool_id,
            base_mint = %resolved.pool.mint_a.address,
            quote_mint = %resolved.pool.mint_b.address,
            base_reserve = resolved.reserves.base_reserve,
            quote_reserve = resolved.reserves.quote_reserve,
            status = resolved.reserves.status,
            slot = ?resolved.reserves.slot,
            indexed = self.session.index().is_some(),
            "pool resolved"
        );
        Ok(resolved)
    }

    /// Current reserve state of an AMM v4 pool.
    pub async fn fetch_reserves(&self, pool_id: &Pubkey) -> Result<ReserveState> {
        let rpc = self.session.rpc();
        let amm = fetch_amm(rpc, pool_id).await?;
        let info = AmmInfo::decode(pool_id, &amm.data)?;

        let vaults = [info.coin_vault, info.pc_vault];
        let batch = rpc.get_multiple_accounts(&vaults).await?;
        let [coin_vault, pc_vault] = required_accounts(&vaults, batch.accounts)?;

        reserve_state(pool_id, &info, &coin_vault, &pc_vault, batch.slot)
    }

    async fn resolve_indexed(
        &self,
        index: &dyn PoolIndex,
        pool_id: &Pubkey,
    ) -> Result<ResolvedPool> {
        debug!(pool = %pool_id, "resolving through pool index");
        let (pool, keys, reserves) = futures::try_join!(
            index.fetch_pool_info(pool_id),
            index.fetch_pool_keys(pool_id),
            self.fetch_reserves(pool_id),
        )?;
        Ok(ResolvedPool {
            pool,
            reserves,
            keys,
        })
    }

    async fn resolve_direct(&self, pool_id: &Pubkey) -> Result<ResolvedPool> {
        debug!(pool = %pool_id, "resolving from chain state");
        let rpc = self.session.rpc();
        let amm = fetch_amm(rpc, pool_id).await?;
        let info = AmmInfo::decode(pool_id, &amm.data)?;

        let wanted = [info.coin_vault, info.pc_vault, info.market];
        let AccountBatch { slot, accounts } = rpc.get_multiple_accounts(&wanted).await?;
        let [coin_vault, pc_vault, market] = required_accounts(&wanted, accounts)?;
        let market_state = MarketState::decode(&info.market, &market.data)?;

        let (coin_decimals, pc_decimals) = info.decimals(pool_id)?;
        let pool = Pool {
            id: *pool_id,
            mint_a: MintInfo::new(info.coin_vault_mint, coin_decimals),
            mint_b: MintInfo::new(info.pc_vault_mint, pc_decimals),
            program_id: amm.owner,
            version: AMM_V4_VERSION,
        };

        let keys = RoutingKeys {
            authority: amm_authority(&amm.owner),
            open_orders: info.open_orders,
            target_orders: info.target_orders,
            base_vault: info.coin_vault,
            quote_vault: info.pc_vault,
            market_program: info.market_program,
            market: info.market,
            market_authority: market_state.vault_signer(&info.market, &info.market_program)?,
            market_bids: market_state.bids,
            market_asks: market_state.asks,
            market_event_queue: market_state.event_queue,
            market_base_vault: market_state.base_vault,
            market_quote_vault: market_state.quote_vault,
        };

        let reserves = reserve_state(pool_id, &info, &coin_vault, &pc_vault, slot)?;
        Ok(ResolvedPool {
            pool,
            reserves,
            keys,
        })
    }
}

/// Reads the pool account and checks it belongs to a constant-product AMM
/// program before anything decodes it.
async fn fetch_amm(rpc: &dyn ChainRpc, pool_id: &Pubkey) -> Result<Account> {
    let amm = rpc
        .get_multiple_accounts(&[*pool_id])
        .await?
        .accounts
        .into_iter()
        .next()
        .flatten()
        .ok_or_else(|| SwapError::PoolNotFound(pool_id.to_string()))?;

    if !is_amm_v4_program(&amm.owner) {
        // Foreign programs carry no AMM model version.
        return Err(SwapError::InvalidPoolKind {
            program_id: amm.owner,
            version: 0,
        });
    }
    Ok(amm)
}

fn required_accounts<const N: usize>(
    keys: &[Pubkey; N],
    accounts: Vec<Option<Account>>,
) -> Result<[Account; N]> {
    if accounts.len() != N {
        return Err(SwapError::Api(format!(
            "requested {N} accounts, node returned {}",
            accounts.len()
        )));
    }
    let found = keys
        .iter()
        .zip(accounts)
        .map(|(key, account)| {
            account.ok_or_else(|| SwapError::AccountDecode {
                account: *key,
                reason: "account not found".to_string(),
            })
        })
        .collect::<Result<Vec<_>>>()?;
    found
        .try_into()
        .map_err(|_| SwapError::Api("account batch length changed".to_string()))
}

fn reserve_state(
    pool_id: &Pubkey,
    info: &AmmInfo,
    coin_vault: &Account,
    pc_vault: &Account,
    slot: u64,
) -> Result<ReserveState> {
    let coin_amount = token_amount(&info.coin_vault, &coin_vault.data)?;
    let pc_amount = token_amount(&info.pc_vault, &pc_vault.data)?;
    let (base_reserve, quote_reserve) = info.reserves(pool_id, coin_amount, pc_amount)?;

    Ok(ReserveState {
        base_reserve,
        quote_reserve,
        fee: info.swap_fee()?,
        status: info.swap_status(),
        slot: Some(slot),
    })
}
