//! Property-based tests for the quote engine.
//!
//! 1. **Bounded output**: a finite input never drains the output reserve.
//! 2. **Monotonicity**: more input never yields less output.
//! 3. **Slippage floor**: `min_amount_out <= amount_out`, equal at zero slippage.
//! 4. **Purity**: identical inputs give identical quotes.
//! 5. **Direction symmetry**: mirroring the pool mirrors the quote.

use proptest::prelude::*;
use solana_sdk::pubkey::Pubkey;

use crate::swap::{
    quote::compute_quote,
    raydium::AMM_V4_PROGRAM_ID,
    state::{FeeRate, MintInfo, Pool, ReserveState, Slippage, SwapIntent},
};

fn mint_a() -> MintInfo {
    MintInfo::new(Pubkey::new_from_array([1u8; 32]), 9)
}

fn mint_b() -> MintInfo {
    MintInfo::new(Pubkey::new_from_array([2u8; 32]), 6)
}

fn make_pool(base: MintInfo, quote: MintInfo) -> Pool {
    Pool {
        id: Pubkey::new_from_array([7u8; 32]),
        mint_a: base,
        mint_b: quote,
        program_id: AMM_V4_PROGRAM_ID,
        version: 4,
    }
}

fn make_reserves(base: u64, quote: u64, fee_num: u64) -> ReserveState {
    let Ok(fee) = FeeRate::new(fee_num, 10_000) else {
        panic!("valid fee");
    };
    ReserveState {
        fee,
        ..ReserveState::new(base, quote)
    }
}

fn make_intent(mint: Pubkey, amount_in: u64, bps: u32) -> SwapIntent {
    let Ok(slippage) = Slippage::from_bps(bps) else {
        panic!("valid slippage");
    };
    SwapIntent {
        input_mint: mint,
        amount_in,
        slippage,
    }
}

fn reserve() -> impl Strategy<Value = u64> {
    1u64..=1_000_000_000_000_000
}

fn amount() -> impl Strategy<Value = u64> {
    1u64..=1_000_000_000_000
}

proptest! {
    #[test]
    fn output_never_drains_reserve(
        r_in in reserve(),
        r_out in reserve(),
        amount_in in amount(),
        fee in 0u64..=100,
    ) {
        let pool = make_pool(mint_a(), mint_b());
        let reserves = make_reserves(r_in, r_out, fee);
        let intent = make_intent(pool.mint_a.address, amount_in, 100);
        let quote = compute_quote(&pool, &reserves, &intent);
        let Ok(quote) = quote else {
            panic!("valid quote");
        };
        prop_assert!(quote.amount_out < r_out);
    }

    #[test]
    fn output_is_monotonic_in_input(
        r_in in reserve(),
        r_out in reserve(),
        amount_in in amount(),
        extra in 1u64..=1_000_000,
    ) {
        let pool = make_pool(mint_a(), mint_b());
        let reserves = make_reserves(r_in, r_out, 25);
        let small = make_intent(pool.mint_a.address, amount_in, 0);
        let large = make_intent(pool.mint_a.address, amount_in + extra, 0);
        let Ok(smaller) = compute_quote(&pool, &reserves, &small) else {
            panic!("valid quote");
        };
        let Ok(larger) = compute_quote(&pool, &reserves, &large) else {
            panic!("valid quote");
        };
        prop_assert!(larger.amount_out >= smaller.amount_out);
    }

    #[test]
    fn slippage_floor_never_exceeds_output(
        r_in in reserve(),
        r_out in reserve(),
        amount_in in amount(),
        bps in 0u32..=10_000,
    ) {
        let pool = make_pool(mint_a(), mint_b());
        let reserves = make_reserves(r_in, r_out, 25);
        let intent = make_intent(pool.mint_b.address, amount_in, bps);
        let Ok(quote) = compute_quote(&pool, &reserves, &intent) else {
            panic!("valid quote");
        };
        prop_assert!(quote.min_amount_out <= quote.amount_out);
        if bps == 0 {
            prop_assert_eq!(quote.min_amount_out, quote.amount_out);
        } else if quote.amount_out >= 10_000 {
            prop_assert!(quote.min_amount_out < quote.amount_out);
        }
    }

    #[test]
    fn quoting_is_pure(
        r_in in reserve(),
        r_out in reserve(),
        amount_in in amount(),
    ) {
        let pool = make_pool(mint_a(), mint_b());
        let reserves = make_reserves(r_in, r_out, 25);
        let intent = make_intent(pool.mint_a.address, amount_in, 50);
        let first = compute_quote(&pool, &reserves, &intent).ok();
        let second = compute_quote(&pool, &reserves, &intent).ok();
        prop_assert_eq!(first, second);
    }

    #[test]
    fn mirrored_pool_mirrors_quote(
        r_base in reserve(),
        r_quote in reserve(),
        amount_in in amount(),
    ) {
        let pool = make_pool(mint_a(), mint_b());
        let mirrored = make_pool(mint_b(), mint_a());
        let intent = make_intent(mint_a().address, amount_in, 100);

        let Ok(forward) = compute_quote(&pool, &make_reserves(r_base, r_quote, 25), &intent) else {
            panic!("valid quote");
        };
        let mirrored_reserves = make_reserves(r_quote, r_base, 25);
        let Ok(mirror) = compute_quote(&mirrored, &mirrored_reserves, &intent) else {
            panic!("valid quote");
        };
        prop_assert!(forward.base_in);
        prop_assert!(!mirror.base_in);
        prop_assert_eq!(forward.amount_out, mirror.amount_out);
        prop_assert_eq!(forward.min_amount_out, mirror.min_amount_out);
        prop_assert_eq!(forward.mint_out, mirror.mint_out);
    }
}
