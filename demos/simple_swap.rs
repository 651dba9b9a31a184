use amm_swap::{
    swap::{Slippage, SubmitMode, Submission, SwapEngine, SwapIntent, SwapRequest},
    utils::{format_amount, parse_amount, setup_wallet},
    Config, Result, Session, SwapError,
};

use solana_sdk::{pubkey::Pubkey, signer::Signer};
use std::str::FromStr;
use std::time::Instant;

// SOL/USDC AMM v4 pool (mainnet)
const SOL_USDC_POOL: &str = "58oQChx4yWmvKdwLLZzBi4ChoCc2fqCUWBkwMihLYQo2";
const SOL: &str = "So11111111111111111111111111111111111111112";

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt::init();
    println!("Starting simple swap example...");

    let config = Config {
        slippage_bps: 50, // 0.5%
        ..Config::from_env()?
    };
    let session = Session::connect(config)?;
    let engine = SwapEngine::new(&session);

    // Throwaway wallet; the dry run never signs or sends.
    let wallet = setup_wallet::<&str>(None)?;
    println!("Using wallet: {}", wallet.pubkey());

    let pool = Pubkey::from_str(SOL_USDC_POOL).map_err(|e| SwapError::Config(e.to_string()))?;
    let sol = Pubkey::from_str(SOL).map_err(|e| SwapError::Config(e.to_string()))?;
    let amount = parse_amount("1", 9)?; // 1 SOL
    let slippage = Slippage::from_bps(50)?;

    println!("\nGetting quote...");
    let start = Instant::now();
    let quote = engine
        .quote(
            &pool,
            &SwapIntent {
                input_mint: sol,
                amount_in: amount,
                slippage,
            },
        )
        .await?;
    println!("Quote received in {:?}", start.elapsed());
    println!(
        "Expected output: {} {}",
        format_amount(quote.amount_out, quote.mint_out.decimals)?,
        quote.mint_out.label()
    );
    println!(
        "Minimum output: {} {}",
        format_amount(quote.min_amount_out, quote.mint_out.decimals)?,
        quote.mint_out.label()
    );
    println!("Price impact: {}%", f64::from(quote.price_impact_bps) / 100.0);

    println!("\nBuilding swap (dry run)...");
    let request = SwapRequest {
        pool_id: pool,
        input_mint: sol,
        amount_in: amount,
        slippage,
        mode: SubmitMode::DryRun,
    };
    let outcome = engine.swap(&request, &wallet).await?;
    if let Submission::DryRun { message } = &outcome.submission {
        println!(
            "Transaction built with {} instructions over {} accounts",
            message.instructions().len(),
            message.static_account_keys().len()
        );
    }

    // A mint that is not in the pool is rejected before anything is built.
    let result = engine
        .quote(
            &pool,
            &SwapIntent {
                input_mint: Pubkey::new_unique(),
                amount_in: amount,
                slippage,
            },
        )
        .await;
    match result {
        Ok(_) => println!("Unexpected success with foreign mint"),
        Err(e) => println!("Expected error received: {}", e),
    }

    println!("\nExample completed!");
    Ok(())
}
