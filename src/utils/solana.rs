//! Solana-specific utilities and client setup
//!
//! The [`Session`] owns every network handle a swap flow needs. It is built
//! once by the caller and passed by reference; nothing here is global.

use async_trait::async_trait;
use solana_client::{nonblocking::rpc_client::RpcClient, rpc_config::RpcSendTransactionConfig};
use solana_sdk::{
    account::Account,
    commitment_config::CommitmentConfig,
    hash::Hash,
    pubkey::Pubkey,
    signature::{read_keypair_file, Keypair, Signature},
    transaction::VersionedTransaction,
};
use std::{path::Path, sync::Arc};
use tracing::{info, warn};

use crate::{
    swap::api::{PoolIndex, RaydiumApi},
    Config, Result, SwapError,
};

const PUBLIC_MAINNET_RPC: &str = "https://api.mainnet-beta.solana.com";

/// Accounts read together at one slot
#[derive(Debug, Clone, Default)]
pub struct AccountBatch {
    pub slot: u64,
    pub accounts: Vec<Option<Account>>,
}

/// Where a broadcast signature stands
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignatureState {
    /// Not seen by the node yet
    Pending,
    /// Landed but not finalized
    Processed { slot: u64 },
    /// Finalized without error
    Finalized { slot: u64 },
    /// Executed and failed; the program error text
    Failed { slot: u64, reason: String },
}

/// Chain reads and transaction broadcast
#[async_trait]
pub trait ChainRpc: Send + Sync {
    async fn get_multiple_accounts(&self, keys: &[Pubkey]) -> Result<AccountBatch>;

    async fn get_latest_blockhash(&self) -> Result<Hash>;

    async fn send_transaction(
        &self,
        transaction: &VersionedTransaction,
        skip_preflight: bool,
    ) -> Result<Signature>;

    async fn signature_state(&self, signature: &Signature) -> Result<SignatureState>;
}

#[async_trait]
impl ChainRpc for RpcClient {
    async fn get_multiple_accounts(&self, keys: &[Pubkey]) -> Result<AccountBatch> {
        let response = self
            .get_multiple_accounts_with_commitment(keys, self.commitment())
            .await?;
        Ok(AccountBatch {
            slot: response.context.slot,
            accounts: response.value,
        })
    }

    async fn get_latest_blockhash(&self) -> Result<Hash> {
        Ok(RpcClient::get_latest_blockhash(self).await?)
    }

    async fn send_transaction(
        &self,
        transaction: &VersionedTransaction,
        skip_preflight: bool,
    ) -> Result<Signature> {
        let config = RpcSendTransactionConfig {
            skip_preflight,
            preflight_commitment: Some(self.commitment().commitment),
            ..RpcSendTransactionConfig::default()
        };
        Ok(self.send_transaction_with_config(transaction, config).await?)
    }

    async fn signature_state(&self, signature: &Signature) -> Result<SignatureState> {
        let status = self
            .get_signature_statuses(&[*signature])
            .await?
            .value
            .into_iter()
            .next()
            .flatten();

        Ok(match status {
            None => SignatureState::Pending,
            Some(status) => match &status.err {
                Some(err) => SignatureState::Failed {
                    slot: status.slot,
                    reason: err.to_string(),
                },
                None if status.satisfies_commitment(CommitmentConfig::finalized()) => {
                    SignatureState::Finalized { slot: status.slot }
                }
                None => SignatureState::Processed { slot: status.slot },
            },
        })
    }
}

/// Network handles for one process
pub struct Session {
    config: Config,
    rpc: Arc<dyn ChainRpc>,
    index: Option<Arc<dyn PoolIndex>>,
}

impl Session {
    /// Connects to the configured RPC node, and to the pool index when the
    /// cluster has one.
    pub fn connect(config: Config) -> Result<Self> {
        if config.rpc_url == PUBLIC_MAINNET_RPC {
            warn!("using the public mainnet RPC node; expect rate limits");
        }
        info!(rpc = %config.rpc_url, cluster = ?config.cluster, "connecting");

        let rpc = setup_client(&config.rpc_url, config.commitment);
        let index: Option<Arc<dyn PoolIndex>> = if config.cluster.has_pool_index() {
            Some(Arc::new(RaydiumApi::new(config.api_base_url.clone())?))
        } else {
            None
        };

        Ok(Self { config, rpc, index })
    }

    /// Builds a session around caller-supplied clients.
    pub fn with_clients(
        config: Config,
        rpc: Arc<dyn ChainRpc>,
        index: Option<Arc<dyn PoolIndex>>,
    ) -> Self {
        Self { config, rpc, index }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn rpc(&self) -> &dyn ChainRpc {
        self.rpc.as_ref()
    }

    pub fn index(&self) -> Option<&dyn PoolIndex> {
        self.index.as_deref()
    }
}

/// Setup Solana RPC client
pub fn setup_client(url: &str, commitment: CommitmentConfig) -> Arc<dyn ChainRpc> {
    Arc::new(RpcClient::new_with_commitment(url.to_string(), commitment))
}

/// Load wallet from a keypair file, or generate a throwaway one
pub fn setup_wallet<P: AsRef<Path>>(path: Option<P>) -> Result<Keypair> {
    match path {
        Some(path) => read_keypair_file(path.as_ref()).map_err(|e| {
            SwapError::Config(format!(
                "failed to read keypair {}: {e}",
                path.as_ref().display()
            ))
        }),
        None => Ok(Keypair::new()),
    }
}

/// Load wallet from a base58-encoded 64-byte secret key
pub fn wallet_from_base58(secret: &str) -> Result<Keypair> {
    let bytes = bs58::decode(secret.trim())
        .into_vec()
        .map_err(|e| SwapError::Config(format!("wallet key is not base58: {e}")))?;
    Keypair::from_bytes(&bytes).map_err(|e| SwapError::Config(format!("invalid wallet key: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use solana_sdk::signer::Signer;

    #[test]
    fn test_wallet_setup() {
        let wallet = setup_wallet::<String>(None).unwrap();
        assert!(wallet.pubkey() != Pubkey::default());
    }

    #[test]
    fn test_wallet_from_base58() {
        let wallet = Keypair::new();
        let encoded = bs58::encode(wallet.to_bytes()).into_string();
        let restored = wallet_from_base58(&encoded).unwrap();
        assert_eq!(restored.pubkey(), wallet.pubkey());

        assert!(wallet_from_base58("0OIl").is_err());
        assert!(wallet_from_base58("abc").is_err());
    }

    #[test]
    fn test_missing_keypair_file() {
        let result = setup_wallet(Some("/nonexistent/id.json"));
        assert!(matches!(result, Err(SwapError::Config(_))));
    }

    #[test]
    fn test_devnet_session_has_no_index() {
        let config = Config {
            cluster: crate::Cluster::Devnet,
            rpc_url: "http://127.0.0.1:8899".to_string(),
            ..Config::default()
        };
        let session = Session::connect(config).unwrap();
        assert!(session.index().is_none());
    }
}
