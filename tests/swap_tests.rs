use amm_swap::{
    swap::{
        api::PoolIndex,
        layout::{AmmInfo, MarketState},
        raydium::{amm_authority, AMM_V4_PROGRAM_ID},
        MintInfo, Pool, PoolResolver, ResolvedPool, RoutingKeys, Slippage, SubmitMode,
        Submission, SwapEngine, SwapIntent, SwapRequest,
    },
    utils::solana::{AccountBatch, ChainRpc, SignatureState},
    Cluster, Config, ErrorKind, Result, Session, SwapError,
};

use async_trait::async_trait;
use bytemuck::Zeroable;
use pretty_assertions::assert_eq;
use solana_sdk::{
    account::Account,
    hash::Hash,
    program_pack::Pack,
    pubkey::Pubkey,
    signature::{Keypair, Signature},
    signer::Signer,
    transaction::VersionedTransaction,
};
use std::{
    collections::{HashMap, VecDeque},
    sync::{Arc, Mutex},
    time::Duration,
};

const BASE_RESERVE: u64 = 1_000_000_000;
const QUOTE_RESERVE: u64 = 2_000_000_000;

/// In-memory chain: fixed accounts, scripted signature states.
#[derive(Default)]
struct MockChain {
    accounts: HashMap<Pubkey, Account>,
    slot: u64,
    statuses: Mutex<VecDeque<SignatureState>>,
    sent: Mutex<Vec<VersionedTransaction>>,
    blockhash_requests: Mutex<usize>,
}

impl MockChain {
    fn with_statuses(mut self, statuses: Vec<SignatureState>) -> Self {
        self.statuses = Mutex::new(statuses.into());
        self
    }

    fn sent(&self) -> Vec<VersionedTransaction> {
        self.sent.lock().unwrap().clone()
    }

    fn blockhash_requests(&self) -> usize {
        *self.blockhash_requests.lock().unwrap()
    }
}

#[async_trait]
impl ChainRpc for MockChain {
    async fn get_multiple_accounts(&self, keys: &[Pubkey]) -> Result<AccountBatch> {
        Ok(AccountBatch {
            slot: self.slot,
            accounts: keys.iter().map(|k| self.accounts.get(k).cloned()).collect(),
        })
    }

    async fn get_latest_blockhash(&self) -> Result<Hash> {
        *self.blockhash_requests.lock().unwrap() += 1;
        Ok(Hash::new_unique())
    }

    async fn send_transaction(
        &self,
        transaction: &VersionedTransaction,
        _skip_preflight: bool,
    ) -> Result<Signature> {
        self.sent.lock().unwrap().push(transaction.clone());
        Ok(transaction.signatures[0])
    }

    async fn signature_state(&self, _signature: &Signature) -> Result<SignatureState> {
        Ok(self
            .statuses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(SignatureState::Pending))
    }
}

/// Pool index serving one pool, optionally failing the keys lookup.
struct MockIndex {
    pool: Pool,
    keys: RoutingKeys,
    fail_keys: bool,
}

#[async_trait]
impl PoolIndex for MockIndex {
    async fn fetch_pool_info(&self, pool_id: &Pubkey) -> Result<Pool> {
        if *pool_id != self.pool.id {
            return Err(SwapError::PoolNotFound(pool_id.to_string()));
        }
        Ok(self.pool.clone())
    }

    async fn fetch_pool_keys(&self, pool_id: &Pubkey) -> Result<RoutingKeys> {
        if self.fail_keys {
            return Err(SwapError::Api("keys unavailable".to_string()));
        }
        if *pool_id != self.pool.id {
            return Err(SwapError::PoolNotFound(pool_id.to_string()));
        }
        Ok(self.keys.clone())
    }
}

/// A SOL-like/USDC-like AMM v4 pool laid out as real account data.
struct Fixture {
    pool_id: Pubkey,
    base_mint: Pubkey,
    quote_mint: Pubkey,
    accounts: HashMap<Pubkey, Account>,
    expected_keys: RoutingKeys,
}

fn account(owner: Pubkey, data: Vec<u8>) -> Account {
    Account {
        lamports: 1_000_000,
        data,
        owner,
        executable: false,
        rent_epoch: 0,
    }
}

fn token_account(mint: Pubkey, owner: Pubkey, amount: u64) -> Account {
    let mut data = vec![0u8; spl_token::state::Account::LEN];
    let state = spl_token::state::Account {
        mint,
        owner,
        amount,
        state: spl_token::state::AccountState::Initialized,
        ..Default::default()
    };
    spl_token::state::Account::pack(state, &mut data).unwrap();
    account(spl_token::id(), data)
}

fn fixture(status: u64) -> Fixture {
    let pool_id = Pubkey::new_unique();
    let base_mint = Pubkey::new_unique();
    let quote_mint = Pubkey::new_unique();
    let market_id = Pubkey::new_unique();
    let market_program = Pubkey::new_unique();
    let authority = amm_authority(&AMM_V4_PROGRAM_ID);

    let mut info = AmmInfo::zeroed();
    info.status = status;
    info.coin_decimals = 9;
    info.pc_decimals = 6;
    info.fees.swap_fee_numerator = 25;
    info.fees.swap_fee_denominator = 10_000;
    info.out_put.need_take_pnl_coin = 1_000;
    info.out_put.need_take_pnl_pc = 2_000;
    info.coin_vault = Pubkey::new_unique();
    info.pc_vault = Pubkey::new_unique();
    info.coin_vault_mint = base_mint;
    info.pc_vault_mint = quote_mint;
    info.open_orders = Pubkey::new_unique();
    info.target_orders = Pubkey::new_unique();
    info.market = market_id;
    info.market_program = market_program;

    let mut market = MarketState::zeroed();
    market.own_address = market_id;
    market.base_vault = Pubkey::new_unique();
    market.quote_vault = Pubkey::new_unique();
    market.bids = Pubkey::new_unique();
    market.asks = Pubkey::new_unique();
    market.event_queue = Pubkey::new_unique();
    let (nonce, vault_signer) = (0u64..)
        .find_map(|nonce| {
            let seeds = [market_id.as_ref(), &nonce.to_le_bytes()];
            Pubkey::create_program_address(&seeds, &market_program)
                .ok()
                .map(|signer| (nonce, signer))
        })
        .unwrap();
    market.vault_signer_nonce = nonce;

    let mut market_data = b"serum".to_vec();
    market_data.extend_from_slice(bytemuck::bytes_of(&market));
    market_data.extend_from_slice(b"padding");

    let mut accounts = HashMap::new();
    accounts.insert(
        pool_id,
        account(AMM_V4_PROGRAM_ID, bytemuck::bytes_of(&info).to_vec()),
    );
    accounts.insert(
        info.coin_vault,
        token_account(base_mint, authority, BASE_RESERVE + 1_000),
    );
    accounts.insert(
        info.pc_vault,
        token_account(quote_mint, authority, QUOTE_RESERVE + 2_000),
    );
    accounts.insert(market_id, account(market_program, market_data));

    let expected_keys = RoutingKeys {
        authority,
        open_orders: info.open_orders,
        target_orders: info.target_orders,
        base_vault: info.coin_vault,
        quote_vault: info.pc_vault,
        market_program,
        market: market_id,
        market_authority: vault_signer,
        market_bids: market.bids,
        market_asks: market.asks,
        market_event_queue: market.event_queue,
        market_base_vault: market.base_vault,
        market_quote_vault: market.quote_vault,
    };

    Fixture {
        pool_id,
        base_mint,
        quote_mint,
        accounts,
        expected_keys,
    }
}

fn test_config(cluster: Cluster) -> Config {
    Config {
        cluster,
        poll_interval: Duration::from_millis(1),
        confirm_timeout: Duration::from_secs(5),
        ..Config::default()
    }
}

fn direct_session(fx: &Fixture, chain: MockChain) -> (Session, Arc<MockChain>) {
    let chain = Arc::new(MockChain {
        accounts: fx.accounts.clone(),
        slot: 1_234,
        ..chain
    });
    let rpc: Arc<dyn ChainRpc> = chain.clone();
    (Session::with_clients(test_config(Cluster::Devnet), rpc, None), chain)
}

fn indexed_session(fx: &Fixture, fail_keys: bool) -> Session {
    let chain: Arc<dyn ChainRpc> = Arc::new(MockChain {
        accounts: fx.accounts.clone(),
        slot: 1_234,
        ..MockChain::default()
    });
    let mut base = MintInfo::new(fx.base_mint, 9);
    base.symbol = Some("WSOL".to_string());
    let index: Arc<dyn PoolIndex> = Arc::new(MockIndex {
        pool: Pool {
            id: fx.pool_id,
            mint_a: base,
            mint_b: MintInfo::new(fx.quote_mint, 6),
            program_id: AMM_V4_PROGRAM_ID,
            version: 4,
        },
        keys: fx.expected_keys.clone(),
        fail_keys,
    });
    Session::with_clients(test_config(Cluster::Mainnet), chain, Some(index))
}

fn request(fx: &Fixture, mode: SubmitMode) -> SwapRequest {
    SwapRequest {
        pool_id: fx.pool_id,
        input_mint: fx.base_mint,
        amount_in: 100_000,
        slippage: Slippage::from_bps(100).unwrap(),
        mode,
    }
}

#[test]
fn test_direct_resolution() {
    let fx = fixture(6);
    let (session, _) = direct_session(&fx, MockChain::default());

    let resolved: ResolvedPool =
        tokio_test::block_on(PoolResolver::new(&session).resolve(&fx.pool_id)).unwrap();

    assert_eq!(resolved.pool.id, fx.pool_id);
    assert_eq!(resolved.pool.program_id, AMM_V4_PROGRAM_ID);
    assert_eq!(resolved.pool.mint_a, MintInfo::new(fx.base_mint, 9));
    assert_eq!(resolved.pool.mint_b, MintInfo::new(fx.quote_mint, 6));
    assert_eq!(resolved.keys, fx.expected_keys);
    assert_eq!(resolved.reserves.base_reserve, BASE_RESERVE);
    assert_eq!(resolved.reserves.quote_reserve, QUOTE_RESERVE);
    assert_eq!(resolved.reserves.status, 0);
    assert_eq!(resolved.reserves.slot, Some(1_234));
}

#[tokio::test]
async fn test_indexed_resolution() {
    let fx = fixture(1);
    let session = indexed_session(&fx, false);

    let resolved = PoolResolver::new(&session).resolve(&fx.pool_id).await.unwrap();
    assert_eq!(resolved.pool.mint_a.symbol.as_deref(), Some("WSOL"));
    assert_eq!(resolved.keys, fx.expected_keys);
    assert_eq!(resolved.reserves.base_reserve, BASE_RESERVE);
    assert_eq!(resolved.reserves.quote_reserve, QUOTE_RESERVE);
}

#[tokio::test]
async fn test_partial_failure_aborts_resolution() {
    let fx = fixture(1);
    let session = indexed_session(&fx, true);

    let result = SwapEngine::new(&session)
        .quote(
            &fx.pool_id,
            &SwapIntent {
                input_mint: fx.base_mint,
                amount_in: 100_000,
                slippage: Slippage::ZERO,
            },
        )
        .await;
    assert!(matches!(result, Err(SwapError::Api(msg)) if msg == "keys unavailable"));
}

/// Hands the pool account to a program outside the AMM v4 allow-list.
fn reassign_pool(fx: &mut Fixture, owner: Pubkey) {
    let account = fx.accounts.get_mut(&fx.pool_id).unwrap();
    account.owner = owner;
    account.data.resize(1_544, 0);
}

#[tokio::test]
async fn test_foreign_program_rejected_on_direct_path() {
    let mut fx = fixture(6);
    let clmm = Pubkey::new_unique();
    reassign_pool(&mut fx, clmm);
    let (session, chain) = direct_session(&fx, MockChain::default());

    let err = PoolResolver::new(&session)
        .resolve(&fx.pool_id)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(matches!(err, SwapError::InvalidPoolKind { program_id, .. } if program_id == clmm));

    let result = SwapEngine::new(&session)
        .swap(&request(&fx, SubmitMode::Broadcast), &Keypair::new())
        .await;
    assert!(matches!(result, Err(SwapError::InvalidPoolKind { .. })));
    assert!(chain.sent().is_empty());
}

#[tokio::test]
async fn test_foreign_program_rejected_on_indexed_path() {
    let mut fx = fixture(6);
    let clmm = Pubkey::new_unique();
    reassign_pool(&mut fx, clmm);
    let session = indexed_session(&fx, false);

    let err = PoolResolver::new(&session)
        .resolve(&fx.pool_id)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(matches!(err, SwapError::InvalidPoolKind { program_id, .. } if program_id == clmm));
}

#[tokio::test]
async fn test_engine_checks_pool_before_mint() {
    let fx = fixture(2);
    let (session, chain) = direct_session(&fx, MockChain::default());
    let resolved = PoolResolver::new(&session).resolve(&fx.pool_id).await.unwrap();
    let intent = SwapIntent {
        input_mint: Pubkey::new_unique(),
        amount_in: 100_000,
        slippage: Slippage::ZERO,
    };

    let result = SwapEngine::new(&session)
        .execute(&resolved, &intent, SubmitMode::Broadcast, &Keypair::new())
        .await;
    assert!(matches!(result, Err(SwapError::PoolDisabled { status: 2 })));
    assert!(chain.sent().is_empty());
}

#[tokio::test]
async fn test_execute_reuses_resolved_pool() {
    let fx = fixture(6);
    let (session, chain) = direct_session(&fx, MockChain::default());
    let resolved = PoolResolver::new(&session).resolve(&fx.pool_id).await.unwrap();
    let wallet = Keypair::new();

    let outcome = SwapEngine::new(&session)
        .execute(
            &resolved,
            &request(&fx, SubmitMode::Broadcast).intent(),
            SubmitMode::Broadcast,
            &wallet,
        )
        .await
        .unwrap();
    assert_eq!(outcome.quote.min_amount_out, 197_485);
    assert_eq!(chain.sent().len(), 1);
}

#[tokio::test]
async fn test_unknown_pool() {
    let fx = fixture(1);
    let (session, _) = direct_session(&fx, MockChain::default());

    let result = PoolResolver::new(&session).resolve(&Pubkey::new_unique()).await;
    assert!(matches!(result, Err(SwapError::PoolNotFound(_))));
}

#[tokio::test]
async fn test_quote_from_chain_state() {
    let fx = fixture(6);
    let (session, _) = direct_session(&fx, MockChain::default());

    let quote = SwapEngine::new(&session)
        .quote(&fx.pool_id, &request(&fx, SubmitMode::DryRun).intent())
        .await
        .unwrap();

    assert_eq!(quote.amount_in_after_fee, 99_750);
    assert_eq!(quote.fee_amount, 250);
    assert_eq!(quote.amount_out, 199_480);
    assert_eq!(quote.min_amount_out, 197_485);
    assert_eq!(quote.mint_out.address, fx.quote_mint);
}

#[tokio::test]
async fn test_disabled_pool_rejected() {
    let fx = fixture(2);
    let (session, chain) = direct_session(&fx, MockChain::default());
    let wallet = Keypair::new();

    let result = SwapEngine::new(&session)
        .swap(&request(&fx, SubmitMode::Confirm), &wallet)
        .await;
    assert!(matches!(result, Err(SwapError::PoolDisabled { status: 2 })));
    assert!(chain.sent().is_empty());
}

#[tokio::test]
async fn test_mint_mismatch_sends_nothing() {
    let fx = fixture(6);
    let (session, chain) = direct_session(&fx, MockChain::default());
    let wallet = Keypair::new();
    let foreign = Pubkey::new_unique();

    let result = SwapEngine::new(&session)
        .swap(
            &SwapRequest {
                input_mint: foreign,
                ..request(&fx, SubmitMode::Broadcast)
            },
            &wallet,
        )
        .await;

    let Err(err) = result else {
        panic!("foreign mint must not quote");
    };
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(matches!(err, SwapError::MintMismatch { mint } if mint == foreign));
    assert!(chain.sent().is_empty());
    assert_eq!(chain.blockhash_requests(), 0);
}

#[tokio::test]
async fn test_dry_run_does_not_send() {
    let fx = fixture(6);
    let (session, chain) = direct_session(&fx, MockChain::default());
    let wallet = Keypair::new();

    let outcome = SwapEngine::new(&session)
        .swap(&request(&fx, SubmitMode::DryRun), &wallet)
        .await
        .unwrap();

    let Submission::DryRun { message } = &outcome.submission else {
        panic!("expected a dry run");
    };
    assert_eq!(message.static_account_keys()[0], wallet.pubkey());
    assert_eq!(outcome.quote.min_amount_out, 197_485);
    assert!(chain.sent().is_empty());
    assert_eq!(chain.blockhash_requests(), 0);
}

#[tokio::test]
async fn test_broadcast_enforces_minimum_on_chain() {
    let fx = fixture(6);
    let (session, chain) = direct_session(&fx, MockChain::default());
    let wallet = Keypair::new();

    let outcome = SwapEngine::new(&session)
        .swap(&request(&fx, SubmitMode::Broadcast), &wallet)
        .await
        .unwrap();

    let sent = chain.sent();
    assert_eq!(sent.len(), 1);
    let tx = &sent[0];
    assert_eq!(
        outcome.submission,
        Submission::Broadcast {
            signature: tx.signatures[0]
        }
    );
    assert!(tx.verify_with_results().into_iter().all(|ok| ok));

    let keys = tx.message.static_account_keys();
    let swap_ix = tx
        .message
        .instructions()
        .iter()
        .find(|ix| *ix.program_id(keys) == AMM_V4_PROGRAM_ID)
        .expect("swap instruction");
    assert_eq!(swap_ix.data[0], 9);
    assert_eq!(u64::from_le_bytes(swap_ix.data[1..9].try_into().unwrap()), 100_000);
    assert_eq!(u64::from_le_bytes(swap_ix.data[9..17].try_into().unwrap()), 197_485);
}

#[tokio::test]
async fn test_confirm_waits_for_finalization() {
    let fx = fixture(6);
    let chain = MockChain::default().with_statuses(vec![
        SignatureState::Pending,
        SignatureState::Processed { slot: 1_240 },
        SignatureState::Finalized { slot: 1_240 },
    ]);
    let (session, chain) = direct_session(&fx, chain);
    let wallet = Keypair::new();

    let outcome = SwapEngine::new(&session)
        .swap(&request(&fx, SubmitMode::Confirm), &wallet)
        .await
        .unwrap();

    let signature = chain.sent()[0].signatures[0];
    assert_eq!(
        outcome.submission,
        Submission::Confirmed {
            signature,
            slot: 1_240
        }
    );
}

#[tokio::test]
async fn test_program_rejection_is_terminal() {
    let fx = fixture(6);
    let chain = MockChain::default().with_statuses(vec![SignatureState::Failed {
        slot: 1_240,
        reason: "custom program error: 0x1e".to_string(),
    }]);
    let (session, chain) = direct_session(&fx, chain);
    let wallet = Keypair::new();

    let result = SwapEngine::new(&session)
        .swap(&request(&fx, SubmitMode::Confirm), &wallet)
        .await;

    let Err(err) = result else {
        panic!("rejection must surface");
    };
    assert_eq!(err.kind(), ErrorKind::Rejected);
    assert!(matches!(&err, SwapError::Rejected { reason, .. } if reason.contains("0x1e")));
    // Never rebroadcast.
    assert_eq!(chain.sent().len(), 1);
}

#[tokio::test]
async fn test_deadline_reports_unconfirmed() {
    let fx = fixture(6);
    let chain = Arc::new(MockChain {
        accounts: fx.accounts.clone(),
        ..MockChain::default()
    });
    let rpc: Arc<dyn ChainRpc> = chain.clone();
    let config = Config {
        confirm_timeout: Duration::from_millis(20),
        poll_interval: Duration::from_millis(5),
        ..test_config(Cluster::Devnet)
    };
    let session = Session::with_clients(config, rpc, None);
    let wallet = Keypair::new();

    let result = SwapEngine::new(&session)
        .swap(&request(&fx, SubmitMode::Confirm), &wallet)
        .await;

    let Err(err) = result else {
        panic!("pending signature must time out");
    };
    assert_eq!(err.kind(), ErrorKind::Ambiguous);
    let SwapError::Unconfirmed { signature, waited } = err else {
        panic!("expected unconfirmed");
    };
    assert_eq!(signature, chain.sent()[0].signatures[0]);
    assert!(waited >= Duration::from_millis(20));
    assert_eq!(chain.sent().len(), 1);
}
