//! Raydium AMM v4 integration
//!
//! Program identifiers, the swap instruction encoding, and assembly of the
//! unsigned swap transaction around it (compute budget, token accounts,
//! native SOL wrapping).

use solana_sdk::{
    compute_budget::ComputeBudgetInstruction,
    hash::Hash,
    instruction::{AccountMeta, Instruction},
    message::{v0, Message, VersionedMessage},
    packet::PACKET_DATA_SIZE,
    pubkey,
    pubkey::Pubkey,
    signature::Signature,
    system_instruction,
    transaction::VersionedTransaction,
};
use spl_associated_token_account::{
    get_associated_token_address, instruction::create_associated_token_account_idempotent,
};
use tracing::info;

use crate::{
    swap::{
        quote::Quote,
        state::{Pool, RoutingKeys},
    },
    Config, Result, SwapError, TxVersion,
};

/// Raydium AMM v4 program (mainnet)
pub const AMM_V4_PROGRAM_ID: Pubkey = pubkey!("675kPX9MHTjS2zt1qfr1NYHuzeLXfQM9H24wFSUt1Mp8");

/// Raydium AMM v4 program (devnet)
pub const AMM_V4_DEVNET_PROGRAM_ID: Pubkey =
    pubkey!("DRaya7Kj3aMWQSy19kSjvmuwq9docCHofyP9kanQGaav");

/// Model version of constant-product pools
pub const AMM_V4_VERSION: u8 = 4;

const AMM_AUTHORITY_SEED: &[u8] = b"amm authority";

const SWAP_BASE_IN_TAG: u8 = 9;
const SWAP_BASE_OUT_TAG: u8 = 11;

pub fn is_amm_v4_program(program_id: &Pubkey) -> bool {
    *program_id == AMM_V4_PROGRAM_ID || *program_id == AMM_V4_DEVNET_PROGRAM_ID
}

/// Authority PDA that owns the pool vaults.
pub fn amm_authority(program_id: &Pubkey) -> Pubkey {
    Pubkey::find_program_address(&[AMM_AUTHORITY_SEED], program_id).0
}

/// Which leg of the swap is fixed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixedSide {
    /// Exact input, output bounded below
    In,
    /// Exact output, input bounded above
    Out,
}

/// AMM v4 swap instruction payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapInstruction {
    BaseIn {
        amount_in: u64,
        minimum_amount_out: u64,
    },
    BaseOut {
        max_amount_in: u64,
        amount_out: u64,
    },
}

impl SwapInstruction {
    /// Payload for a quote. With `FixedSide::In` the on-chain floor is the
    /// slippage-adjusted minimum, never the expected output.
    ///
    /// `FixedSide::Out` asks for exactly `min_amount_out` and caps the input
    /// at `amount_in`. The cap carries no slippage headroom of its own, so
    /// the swap fails on-chain if reserves move against the quote.
    pub fn from_quote(quote: &Quote, side: FixedSide) -> Self {
        match side {
            FixedSide::In => SwapInstruction::BaseIn {
                amount_in: quote.amount_in,
                minimum_amount_out: quote.min_amount_out,
            },
            FixedSide::Out => SwapInstruction::BaseOut {
                max_amount_in: quote.amount_in,
                amount_out: quote.min_amount_out,
            },
        }
    }

    pub fn pack(&self) -> Vec<u8> {
        let (tag, first, second) = match *self {
            SwapInstruction::BaseIn {
                amount_in,
                minimum_amount_out,
            } => (SWAP_BASE_IN_TAG, amount_in, minimum_amount_out),
            SwapInstruction::BaseOut {
                max_amount_in,
                amount_out,
            } => (SWAP_BASE_OUT_TAG, max_amount_in, amount_out),
        };
        let mut data = Vec::with_capacity(17);
        data.push(tag);
        data.extend_from_slice(&first.to_le_bytes());
        data.extend_from_slice(&second.to_le_bytes());
        data
    }
}

/// Builds the AMM v4 swap instruction.
pub fn create_swap_instruction(
    pool: &Pool,
    keys: &RoutingKeys,
    user_source: &Pubkey,
    user_destination: &Pubkey,
    owner: &Pubkey,
    payload: SwapInstruction,
) -> Instruction {
    let accounts = vec![
        AccountMeta::new_readonly(spl_token::id(), false),       // token_program
        AccountMeta::new(pool.id, false),                        // amm
        AccountMeta::new_readonly(keys.authority, false),        // amm_authority
        AccountMeta::new(keys.open_orders, false),               // amm_open_orders
        AccountMeta::new(keys.target_orders, false),             // amm_target_orders
        AccountMeta::new(keys.base_vault, false),                // pool_coin_token_account
        AccountMeta::new(keys.quote_vault, false),               // pool_pc_token_account
        AccountMeta::new_readonly(keys.market_program, false),   // serum_program
        AccountMeta::new(keys.market, false),                    // serum_market
        AccountMeta::new(keys.market_bids, false),               // serum_bids
        AccountMeta::new(keys.market_asks, false),               // serum_asks
        AccountMeta::new(keys.market_event_queue, false),        // serum_event_queue
        AccountMeta::new(keys.market_base_vault, false),         // serum_coin_vault
        AccountMeta::new(keys.market_quote_vault, false),        // serum_pc_vault
        AccountMeta::new_readonly(keys.market_authority, false), // serum_vault_signer
        AccountMeta::new(*user_source, false),                   // user_source_token_account
        AccountMeta::new(*user_destination, false),              // user_destination_token_account
        AccountMeta::new_readonly(*owner, true),                 // user_owner
    ];

    Instruction {
        program_id: pool.program_id,
        accounts,
        data: payload.pack(),
    }
}

/// Swap transaction ready to be signed once a blockhash is known
#[derive(Debug, Clone)]
pub struct UnsignedSwapTransaction {
    /// Instructions in execution order
    pub instructions: Vec<Instruction>,
    /// Fee payer and swap owner
    pub payer: Pubkey,
    /// Message format
    pub version: TxVersion,
}

impl UnsignedSwapTransaction {
    /// Compiles the message against `blockhash` and checks it fits a packet.
    pub fn compile(&self, blockhash: Hash) -> Result<VersionedMessage> {
        let message = match self.version {
            TxVersion::Legacy => VersionedMessage::Legacy(Message::new_with_blockhash(
                &self.instructions,
                Some(&self.payer),
                &blockhash,
            )),
            TxVersion::V0 => VersionedMessage::V0(
                v0::Message::try_compile(&self.payer, &self.instructions, &[], blockhash)
                    .map_err(|e| SwapError::Transaction(e.to_string()))?,
            ),
        };

        let placeholder = VersionedTransaction {
            signatures: vec![
                Signature::default();
                usize::from(message.header().num_required_signatures)
            ],
            message,
        };
        let size = bincode::serialized_size(&placeholder)
            .map_err(|e| SwapError::Transaction(e.to_string()))? as usize;
        if size > PACKET_DATA_SIZE {
            return Err(SwapError::TransactionTooLarge {
                size,
                limit: PACKET_DATA_SIZE,
            });
        }
        Ok(placeholder.message)
    }
}

/// Turns a validated quote into the swap transaction
#[derive(Debug, Clone)]
pub struct TransactionBuilder {
    version: TxVersion,
    compute_unit_limit: Option<u32>,
    compute_unit_price: Option<u64>,
}

impl TransactionBuilder {
    pub fn new(version: TxVersion) -> Self {
        Self {
            version,
            compute_unit_limit: None,
            compute_unit_price: None,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            version: config.tx_version,
            compute_unit_limit: config.compute_unit_limit,
            compute_unit_price: config.compute_unit_price,
        }
    }

    #[must_use]
    pub fn with_compute_budget(mut self, unit_limit: Option<u32>, unit_price: Option<u64>) -> Self {
        self.compute_unit_limit = unit_limit;
        self.compute_unit_price = unit_price;
        self
    }

    /// Builds an exact-input swap of `quote` owned and paid for by `owner`.
    pub fn build(
        &self,
        pool: &Pool,
        keys: &RoutingKeys,
        quote: &Quote,
        owner: &Pubkey,
    ) -> Result<UnsignedSwapTransaction> {
        self.build_with_side(pool, keys, quote, owner, FixedSide::In)
    }

    /// Like [`build`](Self::build) with an explicit fixed leg. Exact-output
    /// swaps use the payload of [`SwapInstruction::from_quote`] and get no
    /// input headroom beyond `quote.amount_in`; the engine only builds
    /// exact-input swaps.
    pub fn build_with_side(
        &self,
        pool: &Pool,
        keys: &RoutingKeys,
        quote: &Quote,
        owner: &Pubkey,
        side: FixedSide,
    ) -> Result<UnsignedSwapTransaction> {
        let native = spl_token::native_mint::id();
        let mint_in = quote.mint_in.address;
        let mint_out = quote.mint_out.address;
        let source = get_associated_token_address(owner, &mint_in);
        let destination = get_associated_token_address(owner, &mint_out);

        let mut instructions = Vec::new();
        if let Some(units) = self.compute_unit_limit {
            instructions.push(ComputeBudgetInstruction::set_compute_unit_limit(units));
        }
        if let Some(price) = self.compute_unit_price {
            instructions.push(ComputeBudgetInstruction::set_compute_unit_price(price));
        }

        instructions.push(create_associated_token_account_idempotent(
            owner,
            owner,
            &mint_in,
            &spl_token::id(),
        ));
        if mint_in == native {
            instructions.push(system_instruction::transfer(owner, &source, quote.amount_in));
            instructions.push(
                spl_token::instruction::sync_native(&spl_token::id(), &source)
                    .map_err(|e| SwapError::Transaction(e.to_string()))?,
            );
        }
        instructions.push(create_associated_token_account_idempotent(
            owner,
            owner,
            &mint_out,
            &spl_token::id(),
        ));

        instructions.push(create_swap_instruction(
            pool,
            keys,
            &source,
            &destination,
            owner,
            SwapInstruction::from_quote(quote, side),
        ));

        // Unwrap whichever side holds wrapped SOL back to lamports.
        if mint_in == native || mint_out == native {
            let wrapped = if mint_in == native { source } else { destination };
            instructions.push(
                spl_token::instruction::close_account(&spl_token::id(), &wrapped, owner, owner, &[])
                    .map_err(|e| SwapError::Transaction(e.to_string()))?,
            );
        }

        info!(
            pool = %pool.id,
            owner = %owner,
            amount_in = quote.amount_in,
            min_amount_out = quote.min_amount_out,
            instructions = instructions.len(),
            version = ?self.version,
            "swap transaction built"
        );

        Ok(UnsignedSwapTransaction {
            instructions,
            payer: *owner,
            version: self.version,
        })
    }
}
