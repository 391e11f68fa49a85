//! Instruction encoding and planning for the bonding-curve program
//!
//! Every pump.fun instruction is an 8-byte Anchor discriminator followed by
//! borsh-encoded arguments, with a fixed account order. The request structs
//! here name every input an instruction needs; the account lists are derived
//! from them deterministically.
//!
//! Compiled transactions follow one layout:
//! 1. Compute budget instructions (CU limit, CU price)
//! 2. Program instructions

use borsh::BorshSerialize;
use solana_sdk::{
    compute_budget::{self, ComputeBudgetInstruction},
    instruction::{AccountMeta, Instruction},
    pubkey::Pubkey,
    system_program,
};
use spl_associated_token_account::{
    get_associated_token_address, instruction::create_associated_token_account_idempotent,
};

use crate::constants::{
    BONDING_CURVE_SEED, BUY_DISCRIMINATOR, CREATE_DISCRIMINATOR, CREATOR_VAULT_SEED,
    FEE_CONFIG_SEED, GLOBAL_VOLUME_ACCUMULATOR_SEED, METADATA_SEED, MINT_AUTHORITY_SEED,
    MPL_TOKEN_METADATA, PUMPFUN_EVENT_AUTHORITY, PUMPFUN_FEE_PROGRAM, PUMPFUN_FEE_RECIPIENT,
    PUMPFUN_GLOBAL, PUMPFUN_PROGRAM_ID, SELL_DISCRIMINATOR, SYSVAR_RENT,
    USER_VOLUME_ACCUMULATOR_SEED,
};
use crate::tx_builder::errors::TransactionBuilderError;

const PROGRAM: &str = "pump.fun";

pub fn bonding_curve_pda(mint: &Pubkey) -> Pubkey {
    Pubkey::find_program_address(&[BONDING_CURVE_SEED, mint.as_ref()], &PUMPFUN_PROGRAM_ID).0
}

/// Token account holding the curve's unsold supply.
pub fn associated_bonding_curve(mint: &Pubkey) -> Pubkey {
    get_associated_token_address(&bonding_curve_pda(mint), mint)
}

pub fn creator_vault_pda(creator: &Pubkey) -> Pubkey {
    Pubkey::find_program_address(&[CREATOR_VAULT_SEED, creator.as_ref()], &PUMPFUN_PROGRAM_ID).0
}

pub fn mint_authority_pda() -> Pubkey {
    Pubkey::find_program_address(&[MINT_AUTHORITY_SEED], &PUMPFUN_PROGRAM_ID).0
}

pub fn metadata_pda(mint: &Pubkey) -> Pubkey {
    Pubkey::find_program_address(
        &[METADATA_SEED, MPL_TOKEN_METADATA.as_ref(), mint.as_ref()],
        &MPL_TOKEN_METADATA,
    )
    .0
}

pub fn global_volume_accumulator_pda() -> Pubkey {
    Pubkey::find_program_address(&[GLOBAL_VOLUME_ACCUMULATOR_SEED], &PUMPFUN_PROGRAM_ID).0
}

pub fn user_volume_accumulator_pda(user: &Pubkey) -> Pubkey {
    Pubkey::find_program_address(
        &[USER_VOLUME_ACCUMULATOR_SEED, user.as_ref()],
        &PUMPFUN_PROGRAM_ID,
    )
    .0
}

pub fn fee_config_pda() -> Pubkey {
    Pubkey::find_program_address(
        &[FEE_CONFIG_SEED, PUMPFUN_PROGRAM_ID.as_ref()],
        &PUMPFUN_FEE_PROGRAM,
    )
    .0
}

/// Registers a new mint on the curve program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateRequest {
    pub mint: Pubkey,
    pub creator: Pubkey,
    pub name: String,
    pub symbol: String,
    pub uri: String,
}

/// Buys an exact token amount, spending at most `max_sol_cost` lamports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuyRequest {
    pub mint: Pubkey,
    pub user: Pubkey,
    /// Curve creator, used to derive the creator fee vault
    pub creator: Pubkey,
    pub token_amount: u64,
    pub max_sol_cost: u64,
}

/// Sells an exact token amount, accepting no less than `min_sol_output`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SellRequest {
    pub mint: Pubkey,
    pub user: Pubkey,
    pub creator: Pubkey,
    pub token_amount: u64,
    pub min_sol_output: u64,
}

#[derive(BorshSerialize)]
struct CreateArgs<'a> {
    name: &'a str,
    symbol: &'a str,
    uri: &'a str,
    creator: [u8; 32],
}

#[derive(BorshSerialize)]
struct BuyArgs {
    amount: u64,
    max_sol_cost: u64,
    track_volume: bool,
}

#[derive(BorshSerialize)]
struct SellArgs {
    amount: u64,
    min_sol_output: u64,
}

fn encode<T: BorshSerialize>(
    discriminator: [u8; 8],
    args: &T,
) -> Result<Vec<u8>, TransactionBuilderError> {
    let mut data = discriminator.to_vec();
    args.serialize(&mut data)
        .map_err(|e| TransactionBuilderError::instruction_failed(PROGRAM, e.to_string()))?;
    Ok(data)
}

pub fn create_ix(req: &CreateRequest) -> Result<Instruction, TransactionBuilderError> {
    if req.name.is_empty() || req.symbol.is_empty() || req.uri.is_empty() {
        return Err(TransactionBuilderError::instruction_failed(
            PROGRAM,
            "create requires name, symbol and metadata uri",
        ));
    }

    let data = encode(
        CREATE_DISCRIMINATOR,
        &CreateArgs {
            name: &req.name,
            symbol: &req.symbol,
            uri: &req.uri,
            creator: req.creator.to_bytes(),
        },
    )?;

    let bonding_curve = bonding_curve_pda(&req.mint);
    let accounts = vec![
        AccountMeta::new(req.mint, true),
        AccountMeta::new_readonly(mint_authority_pda(), false),
        AccountMeta::new(bonding_curve, false),
        AccountMeta::new(get_associated_token_address(&bonding_curve, &req.mint), false),
        AccountMeta::new_readonly(PUMPFUN_GLOBAL, false),
        AccountMeta::new_readonly(MPL_TOKEN_METADATA, false),
        AccountMeta::new(metadata_pda(&req.mint), false),
        AccountMeta::new(req.creator, true),
        AccountMeta::new_readonly(system_program::id(), false),
        AccountMeta::new_readonly(spl_token::id(), false),
        AccountMeta::new_readonly(spl_associated_token_account::id(), false),
        AccountMeta::new_readonly(SYSVAR_RENT, false),
        AccountMeta::new_readonly(PUMPFUN_EVENT_AUTHORITY, false),
        AccountMeta::new_readonly(PUMPFUN_PROGRAM_ID, false),
    ];

    Ok(Instruction::new_with_bytes(PUMPFUN_PROGRAM_ID, &data, accounts))
}

pub fn buy_ix(req: &BuyRequest) -> Result<Instruction, TransactionBuilderError> {
    if req.token_amount == 0 {
        return Err(TransactionBuilderError::instruction_failed(
            PROGRAM,
            "buy amount must be positive",
        ));
    }

    let data = encode(
        BUY_DISCRIMINATOR,
        &BuyArgs {
            amount: req.token_amount,
            max_sol_cost: req.max_sol_cost,
            track_volume: true,
        },
    )?;

    let accounts = vec![
        AccountMeta::new_readonly(PUMPFUN_GLOBAL, false),
        AccountMeta::new(PUMPFUN_FEE_RECIPIENT, false),
        AccountMeta::new_readonly(req.mint, false),
        AccountMeta::new(bonding_curve_pda(&req.mint), false),
        AccountMeta::new(associated_bonding_curve(&req.mint), false),
        AccountMeta::new(get_associated_token_address(&req.user, &req.mint), false),
        AccountMeta::new(req.user, true),
        AccountMeta::new_readonly(system_program::id(), false),
        AccountMeta::new_readonly(spl_token::id(), false),
        AccountMeta::new(creator_vault_pda(&req.creator), false),
        AccountMeta::new_readonly(PUMPFUN_EVENT_AUTHORITY, false),
        AccountMeta::new_readonly(PUMPFUN_PROGRAM_ID, false),
        AccountMeta::new(global_volume_accumulator_pda(), false),
        AccountMeta::new(user_volume_accumulator_pda(&req.user), false),
        AccountMeta::new_readonly(fee_config_pda(), false),
        AccountMeta::new_readonly(PUMPFUN_FEE_PROGRAM, false),
    ];

    Ok(Instruction::new_with_bytes(PUMPFUN_PROGRAM_ID, &data, accounts))
}

pub fn sell_ix(req: &SellRequest) -> Result<Instruction, TransactionBuilderError> {
    if req.token_amount == 0 {
        return Err(TransactionBuilderError::instruction_failed(
            PROGRAM,
            "sell amount must be positive",
        ));
    }

    let data = encode(
        SELL_DISCRIMINATOR,
        &SellArgs {
            amount: req.token_amount,
            min_sol_output: req.min_sol_output,
        },
    )?;

    let accounts = vec![
        AccountMeta::new_readonly(PUMPFUN_GLOBAL, false),
        AccountMeta::new(PUMPFUN_FEE_RECIPIENT, false),
        AccountMeta::new_readonly(req.mint, false),
        AccountMeta::new(bonding_curve_pda(&req.mint), false),
        AccountMeta::new(associated_bonding_curve(&req.mint), false),
        AccountMeta::new(get_associated_token_address(&req.user, &req.mint), false),
        AccountMeta::new(req.user, true),
        AccountMeta::new_readonly(system_program::id(), false),
        AccountMeta::new(creator_vault_pda(&req.creator), false),
        AccountMeta::new_readonly(spl_token::id(), false),
        AccountMeta::new_readonly(PUMPFUN_EVENT_AUTHORITY, false),
        AccountMeta::new_readonly(PUMPFUN_PROGRAM_ID, false),
        AccountMeta::new_readonly(fee_config_pda(), false),
        AccountMeta::new_readonly(PUMPFUN_FEE_PROGRAM, false),
    ];

    Ok(Instruction::new_with_bytes(PUMPFUN_PROGRAM_ID, &data, accounts))
}

/// Creates `owner`'s token account for `mint` if it does not exist yet.
pub fn ensure_token_account_ix(payer: &Pubkey, owner: &Pubkey, mint: &Pubkey) -> Instruction {
    create_associated_token_account_idempotent(payer, owner, mint, &spl_token::id())
}

/// Closes `owner`'s (emptied) token account, returning its rent to the owner.
pub fn close_token_account_ix(
    owner: &Pubkey,
    mint: &Pubkey,
) -> Result<Instruction, TransactionBuilderError> {
    let ata = get_associated_token_address(owner, mint);
    spl_token::instruction::close_account(&spl_token::id(), &ata, owner, owner, &[])
        .map_err(|e| TransactionBuilderError::instruction_failed("spl-token", e.to_string()))
}

/// Ordered instruction list ready for compilation
///
/// `operation_count` counts the program instructions, excluding the compute
/// budget prefix.
#[derive(Debug, Clone)]
pub struct InstructionPlan {
    pub instructions: Vec<Instruction>,
    pub operation_count: usize,
}

impl InstructionPlan {
    /// True when nothing but compute budget instructions would be sent.
    pub fn is_empty(&self) -> bool {
        self.operation_count == 0
    }
}

/// Prefixes `body` with compute budget instructions.
///
/// A zero `cu_limit` or `cu_price` skips that instruction.
pub fn plan_instructions(
    cu_limit: u32,
    cu_price: u64,
    body: Vec<Instruction>,
) -> Result<InstructionPlan, TransactionBuilderError> {
    if let Some(ix) = body.iter().find(|ix| ix.accounts.is_empty()) {
        return Err(TransactionBuilderError::Configuration(format!(
            "Instruction for program {} has no accounts",
            ix.program_id
        )));
    }

    let operation_count = body.len();
    let mut instructions = Vec::with_capacity(body.len() + 2);

    if cu_limit > 0 {
        instructions.push(ComputeBudgetInstruction::set_compute_unit_limit(cu_limit));
    }
    if cu_price > 0 {
        instructions.push(ComputeBudgetInstruction::set_compute_unit_price(cu_price));
    }
    instructions.extend(body);

    Ok(InstructionPlan {
        instructions,
        operation_count,
    })
}

/// Validate instruction ordering (debug/test only)
///
/// Compute budget instructions may only appear as a prefix, at most two of
/// them, and must be followed by at least one program instruction.
#[cfg(debug_assertions)]
pub fn sanity_check_ix_order(instructions: &[Instruction]) -> Result<(), TransactionBuilderError> {
    if instructions.is_empty() {
        return Err(TransactionBuilderError::invalid_order("Instruction list is empty"));
    }

    let is_budget = |ix: &Instruction| ix.program_id == compute_budget::id();
    let prefix = instructions.iter().take_while(|ix| is_budget(ix)).count();

    if prefix > 2 {
        return Err(TransactionBuilderError::invalid_order(format!(
            "Expected at most 2 compute budget instructions, found {prefix}"
        )));
    }
    if prefix == instructions.len() {
        return Err(TransactionBuilderError::invalid_order(
            "Only compute budget instructions present",
        ));
    }
    if let Some(idx) = instructions.iter().skip(prefix).position(|ix| is_budget(ix)) {
        return Err(TransactionBuilderError::invalid_order(format!(
            "Compute budget instruction after program instructions (at position {})",
            idx + prefix
        )));
    }

    Ok(())
}

/// No-op version of sanity_check_ix_order for release builds
#[cfg(not(debug_assertions))]
#[inline]
pub fn sanity_check_ix_order(_instructions: &[Instruction]) -> Result<(), TransactionBuilderError> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buy_request() -> BuyRequest {
        BuyRequest {
            mint: Pubkey::new_unique(),
            user: Pubkey::new_unique(),
            creator: Pubkey::new_unique(),
            token_amount: 1_000,
            max_sol_cost: 5_000,
        }
    }

    #[test]
    fn test_buy_ix_layout() {
        let req = buy_request();
        let ix = buy_ix(&req).unwrap();

        assert_eq!(ix.program_id, PUMPFUN_PROGRAM_ID);
        assert_eq!(&ix.data[..8], &BUY_DISCRIMINATOR);
        assert_eq!(&ix.data[8..16], &1_000u64.to_le_bytes());
        assert_eq!(&ix.data[16..24], &5_000u64.to_le_bytes());
        assert_eq!(ix.data[24], 1);
        assert_eq!(ix.data.len(), 25);

        assert_eq!(ix.accounts.len(), 16);
        assert_eq!(ix.accounts[2].pubkey, req.mint);
        assert_eq!(ix.accounts[3].pubkey, bonding_curve_pda(&req.mint));
        assert_eq!(ix.accounts[6].pubkey, req.user);
        assert!(ix.accounts[6].is_signer);
        assert_eq!(ix.accounts[9].pubkey, creator_vault_pda(&req.creator));

        let signers: Vec<_> = ix.accounts.iter().filter(|a| a.is_signer).collect();
        assert_eq!(signers.len(), 1);
    }

    #[test]
    fn test_sell_ix_layout() {
        let req = SellRequest {
            mint: Pubkey::new_unique(),
            user: Pubkey::new_unique(),
            creator: Pubkey::new_unique(),
            token_amount: 77,
            min_sol_output: 0,
        };
        let ix = sell_ix(&req).unwrap();

        assert_eq!(&ix.data[..8], &SELL_DISCRIMINATOR);
        assert_eq!(&ix.data[8..16], &77u64.to_le_bytes());
        assert_eq!(ix.data.len(), 24);
        assert_eq!(ix.accounts.len(), 14);
        assert_eq!(ix.accounts[8].pubkey, creator_vault_pda(&req.creator));
        assert_eq!(ix.accounts[9].pubkey, spl_token::id());
    }

    #[test]
    fn test_create_ix_requires_two_signers() {
        let req = CreateRequest {
            mint: Pubkey::new_unique(),
            creator: Pubkey::new_unique(),
            name: "Token".to_string(),
            symbol: "TKN".to_string(),
            uri: "https://ipfs.io/ipfs/abc".to_string(),
        };
        let ix = create_ix(&req).unwrap();

        assert_eq!(&ix.data[..8], &CREATE_DISCRIMINATOR);
        // borsh string: u32 length prefix
        assert_eq!(&ix.data[8..12], &5u32.to_le_bytes());
        assert_eq!(&ix.data[12..17], b"Token");
        assert_eq!(&ix.data[ix.data.len() - 32..], req.creator.as_ref());

        let signers: Vec<_> = ix
            .accounts
            .iter()
            .filter(|a| a.is_signer)
            .map(|a| a.pubkey)
            .collect();
        assert_eq!(signers, vec![req.mint, req.creator]);
    }

    #[test]
    fn test_zero_amounts_rejected() {
        let mut req = buy_request();
        req.token_amount = 0;
        assert!(matches!(
            buy_ix(&req),
            Err(TransactionBuilderError::InstructionBuild { .. })
        ));

        let create = CreateRequest {
            mint: Pubkey::new_unique(),
            creator: Pubkey::new_unique(),
            name: String::new(),
            symbol: "X".to_string(),
            uri: "u".to_string(),
        };
        assert!(create_ix(&create).is_err());
    }

    #[test]
    fn test_pdas_are_deterministic() {
        let mint = Pubkey::new_unique();
        assert_eq!(bonding_curve_pda(&mint), bonding_curve_pda(&mint));
        assert_ne!(bonding_curve_pda(&mint), bonding_curve_pda(&Pubkey::new_unique()));
        assert_eq!(
            associated_bonding_curve(&mint),
            get_associated_token_address(&bonding_curve_pda(&mint), &mint)
        );
    }

    #[test]
    fn test_close_token_account_targets_owner_ata() {
        let owner = Pubkey::new_unique();
        let mint = Pubkey::new_unique();
        let ix = close_token_account_ix(&owner, &mint).unwrap();
        assert_eq!(ix.program_id, spl_token::id());
        assert_eq!(ix.accounts[0].pubkey, get_associated_token_address(&owner, &mint));
        assert_eq!(ix.accounts[1].pubkey, owner);
    }

    #[test]
    fn test_plan_prepends_compute_budget() {
        let body = vec![buy_ix(&buy_request()).unwrap(), buy_ix(&buy_request()).unwrap()];
        let plan = plan_instructions(300_000, 200_000, body).unwrap();

        assert_eq!(plan.instructions.len(), 4);
        assert_eq!(plan.operation_count, 2);
        assert_eq!(plan.instructions[0].program_id, compute_budget::id());
        assert_eq!(plan.instructions[1].program_id, compute_budget::id());
        assert!(sanity_check_ix_order(&plan.instructions).is_ok());
    }

    #[test]
    fn test_plan_of_nothing_is_empty() {
        let plan = plan_instructions(600_000, 200_000, vec![]).unwrap();
        assert!(plan.is_empty());
        assert_eq!(plan.instructions.len(), 2);
    }

    #[test]
    fn test_plan_rejects_accountless_instruction() {
        let ix = Instruction::new_with_bytes(Pubkey::new_unique(), &[1], vec![]);
        let result = plan_instructions(0, 0, vec![ix]);
        assert!(matches!(
            result,
            Err(TransactionBuilderError::Configuration(msg)) if msg.contains("no accounts")
        ));
    }

    #[cfg(debug_assertions)]
    #[test]
    fn test_sanity_check_rejects_misplaced_budget() {
        let instructions = vec![
            buy_ix(&buy_request()).unwrap(),
            ComputeBudgetInstruction::set_compute_unit_limit(200_000),
        ];
        let result = sanity_check_ix_order(&instructions);
        assert!(matches!(
            result,
            Err(TransactionBuilderError::InvalidInstructionOrder(msg)) if msg.contains("position 1")
        ));

        let only_budget = vec![ComputeBudgetInstruction::set_compute_unit_limit(1)];
        assert!(sanity_check_ix_order(&only_budget).is_err());
        assert!(sanity_check_ix_order(&[]).is_err());
    }
}
