use amm_swap::{
    swap::{swap_direction, PoolResolver, Slippage, SubmitMode, Submission, SwapEngine, SwapIntent},
    utils::{format_amount, parse_amount, setup_wallet, wallet_from_base58},
    Cluster, Config, Session,
};

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use solana_sdk::{pubkey::Pubkey, signature::Keypair, signer::Signer};
use std::{env, path::PathBuf};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "amm-swap")]
#[command(about = "Quote and execute swaps on Raydium AMM v4 pools", long_about = None)]
struct Cli {
    /// AMM pool id
    #[arg(long)]
    pool: Pubkey,

    /// Mint being sold
    #[arg(long)]
    input_mint: Pubkey,

    /// Amount to sell, in UI units (e.g. 1.5)
    #[arg(long)]
    amount: String,

    /// Slippage tolerance in basis points; defaults to SLIPPAGE_BPS or 100
    #[arg(long)]
    slippage_bps: Option<u32>,

    /// dry-run, broadcast or confirm
    #[arg(long, default_value = "dry-run")]
    mode: SubmitMode,

    /// Keypair file; WALLET_PRIVATE_KEY (base58) takes precedence
    #[arg(long)]
    keypair: Option<PathBuf>,

    /// Overrides RPC_URL
    #[arg(long)]
    rpc_url: Option<String>,

    /// Overrides CLUSTER (mainnet or devnet)
    #[arg(long)]
    cluster: Option<Cluster>,
}

fn load_wallet(cli: &Cli) -> Result<Keypair> {
    if let Ok(secret) = env::var("WALLET_PRIVATE_KEY") {
        return Ok(wallet_from_base58(&secret)?);
    }
    match (&cli.keypair, cli.mode) {
        (Some(path), _) => Ok(setup_wallet(Some(path))?),
        (None, SubmitMode::DryRun) => {
            warn!("no wallet configured, using a throwaway keypair for the dry run");
            Ok(setup_wallet::<PathBuf>(None)?)
        }
        (None, _) => Err(anyhow!(
            "a wallet is required to send: set WALLET_PRIVATE_KEY or pass --keypair"
        )),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = Config::from_env()?;
    if let Some(url) = &cli.rpc_url {
        config.rpc_url = url.clone();
    }
    if let Some(cluster) = cli.cluster {
        config.cluster = cluster;
    }
    let slippage = match cli.slippage_bps {
        Some(bps) => Slippage::from_bps(bps)?,
        None => config.slippage()?,
    };

    let wallet = load_wallet(&cli)?;
    info!(wallet = %wallet.pubkey(), "wallet loaded");

    let session = Session::connect(config)?;

    // One resolve serves both the UI amount's decimals and the quote.
    let resolved = PoolResolver::new(&session)
        .resolve(&cli.pool)
        .await
        .context("failed to resolve pool")?;
    let base_in = swap_direction(&resolved.pool, &resolved.reserves, &cli.input_mint)?;
    let mint_in = if base_in {
        &resolved.pool.mint_a
    } else {
        &resolved.pool.mint_b
    };
    let intent = SwapIntent {
        input_mint: cli.input_mint,
        amount_in: parse_amount(&cli.amount, mint_in.decimals)?,
        slippage,
    };

    let engine = SwapEngine::new(&session);
    let outcome = match engine.execute(&resolved, &intent, cli.mode, &wallet).await {
        Ok(outcome) => outcome,
        Err(e) => {
            error!(kind = ?e.kind(), "swap failed: {e}");
            return Err(e.into());
        }
    };

    let quote = &outcome.quote;
    let sell = format_amount(quote.amount_in, quote.mint_in.decimals)?;
    let fee = format_amount(quote.fee_amount, quote.mint_in.decimals)?;
    let expected = format_amount(quote.amount_out, quote.mint_out.decimals)?;
    let minimum = format_amount(quote.min_amount_out, quote.mint_out.decimals)?;
    println!("Sell:         {sell} {}", quote.mint_in.label());
    println!("Fee:          {fee} {}", quote.mint_in.label());
    println!("Expected:     {expected} {}", quote.mint_out.label());
    println!(
        "Minimum:      {minimum} {} ({} bps slippage)",
        quote.mint_out.label(),
        slippage.bps()
    );
    println!("Price impact: {:.2}%", f64::from(quote.price_impact_bps) / 100.0);

    match &outcome.submission {
        Submission::DryRun { .. } => println!("Dry run: transaction built, not sent"),
        Submission::Broadcast { signature } => println!("Broadcast: {signature}"),
        Submission::Confirmed { signature, slot } => {
            println!("Confirmed: {signature} (slot {slot})")
        }
    }

    Ok(())
}
