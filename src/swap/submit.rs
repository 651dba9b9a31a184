//! Signing, broadcast and confirmation of swap transactions
//!
//! A transaction moves `Built -> Signed -> Broadcast` and then ends
//! `Confirmed`, `Rejected` or `Unconfirmed`. A broadcast is never repeated;
//! the caller re-quotes instead.

use solana_sdk::{
    hash::Hash,
    message::VersionedMessage,
    signature::Signature,
    signer::Signer,
    transaction::VersionedTransaction,
};
use std::str::FromStr;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use crate::{
    swap::raydium::UnsignedSwapTransaction,
    utils::solana::{Session, SignatureState},
    Result, SwapError,
};

/// How far a swap is taken once it is built
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SubmitMode {
    /// Quote and build only; nothing is signed or sent
    #[default]
    DryRun,
    /// Return once the node accepts the transaction
    Broadcast,
    /// Wait for finalization
    Confirm,
}

impl FromStr for SubmitMode {
    type Err = SwapError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "dry-run" | "dryrun" | "quote" => Ok(SubmitMode::DryRun),
            "broadcast" | "send" => Ok(SubmitMode::Broadcast),
            "confirm" => Ok(SubmitMode::Confirm),
            other => Err(SwapError::Config(format!("unknown submit mode: {other}"))),
        }
    }
}

/// Where a submitted swap ended up
#[derive(Debug, Clone, PartialEq)]
pub enum Submission {
    /// Compiled message, placeholder blockhash, unsigned
    DryRun { message: VersionedMessage },
    /// Accepted by the node, outcome not awaited
    Broadcast { signature: Signature },
    /// Finalized without error
    Confirmed { signature: Signature, slot: u64 },
}

impl Submission {
    pub fn signature(&self) -> Option<&Signature> {
        match self {
            Submission::DryRun { .. } => None,
            Submission::Broadcast { signature } | Submission::Confirmed { signature, .. } => {
                Some(signature)
            }
        }
    }
}

/// Signs and sends swap transactions through a session
pub struct Submitter<'a> {
    session: &'a Session,
}

impl<'a> Submitter<'a> {
    pub fn new(session: &'a Session) -> Self {
        Self { session }
    }

    pub async fn submit<S: Signer>(
        &self,
        unsigned: &UnsignedSwapTransaction,
        signer: &S,
        mode: SubmitMode,
    ) -> Result<Submission> {
        if signer.pubkey() != unsigned.payer {
            return Err(SwapError::Transaction(format!(
                "signer {} is not the fee payer {}",
                signer.pubkey(),
                unsigned.payer
            )));
        }

        if mode == SubmitMode::DryRun {
            let message = unsigned.compile(Hash::default())?;
            info!(payer = %unsigned.payer, "dry run, transaction not sent");
            return Ok(Submission::DryRun { message });
        }

        let rpc = self.session.rpc();
        let blockhash = rpc.get_latest_blockhash().await?;
        let message = unsigned.compile(blockhash)?;
        let transaction = VersionedTransaction::try_new(message, &[signer])
            .map_err(|e| SwapError::Transaction(e.to_string()))?;
        let signature = transaction.signatures[0];
        info!(signature = %signature, blockhash = %blockhash, "transaction signed");

        let sent = rpc
            .send_transaction(&transaction, self.session.config().skip_preflight)
            .await?;
        info!(signature = %sent, "transaction broadcast");

        match mode {
            SubmitMode::Confirm => self.await_finalized(sent).await,
            _ => Ok(Submission::Broadcast { signature: sent }),
        }
    }

    /// Polls until the signature finalizes, fails, or the deadline passes.
    async fn await_finalized(&self, signature: Signature) -> Result<Submission> {
        let config = self.session.config();
        let started = Instant::now();
        let deadline = started + config.confirm_timeout;

        loop {
            match self.session.rpc().signature_state(&signature).await {
                Ok(SignatureState::Finalized { slot }) => {
                    info!(signature = %signature, slot, "transaction confirmed");
                    return Ok(Submission::Confirmed { signature, slot });
                }
                Ok(SignatureState::Failed { slot, reason }) => {
                    warn!(signature = %signature, slot, reason = %reason, "transaction rejected");
                    return Err(SwapError::Rejected { signature, reason });
                }
                Ok(state) => {
                    debug!(signature = %signature, state = ?state, "awaiting finalization")
                }
                // The transaction may still land; keep polling until the deadline.
                Err(e) => warn!(signature = %signature, error = %e, "status poll failed"),
            }

            if Instant::now() >= deadline {
                let waited = started.elapsed();
                warn!(signature = %signature, waited = ?waited, "transaction unconfirmed");
                return Err(SwapError::Unconfirmed { signature, waited });
            }
            sleep(config.poll_interval).await;
        }
    }
}
