//! Program ids, PDA seeds and trading defaults for the pump.fun launch flow.

use solana_sdk::{pubkey, pubkey::Pubkey};

/// pump.fun bonding-curve program
pub const PUMPFUN_PROGRAM_ID: Pubkey = pubkey!("6EF8rrecthR5Dkzon8Nwu78hRvfCKubJ14M5uBEwF6P");
pub const PUMPFUN_GLOBAL: Pubkey = pubkey!("4wTV1YmiEkRvAtNtsSGPtUrqRYQMe5SKy2uB4Jjaxnjf");
pub const PUMPFUN_FEE_RECIPIENT: Pubkey = pubkey!("62qc2CNXwrYqQScmEdiZFFAnJR262PxWEuNQtxfafNgV");
pub const PUMPFUN_EVENT_AUTHORITY: Pubkey = pubkey!("Ce6TQqeHC9p8KetsN6JsjHK7UTZk7nasjjnr7XxXp9F1");
pub const PUMPFUN_FEE_PROGRAM: Pubkey = pubkey!("pfeeUxB6jkeY1Hxd7CsFCAjcbHA9rWtchMGdZ6VojVZ");
pub const MPL_TOKEN_METADATA: Pubkey = pubkey!("metaqbxxUerdq28cj1RbAWkYQm3ybzjb6a8bt518x1s");
pub const SYSVAR_RENT: Pubkey = pubkey!("SysvarRent111111111111111111111111111111111");

// PDA seeds
pub const BONDING_CURVE_SEED: &[u8] = b"bonding-curve";
pub const CREATOR_VAULT_SEED: &[u8] = b"creator-vault";
pub const MINT_AUTHORITY_SEED: &[u8] = b"mint-authority";
pub const METADATA_SEED: &[u8] = b"metadata";
pub const GLOBAL_VOLUME_ACCUMULATOR_SEED: &[u8] = b"global_volume_accumulator";
pub const USER_VOLUME_ACCUMULATOR_SEED: &[u8] = b"user_volume_accumulator";
pub const FEE_CONFIG_SEED: &[u8] = b"fee_config";

// Anchor instruction discriminators
pub const CREATE_DISCRIMINATOR: [u8; 8] = [24, 30, 200, 40, 5, 28, 7, 119];
pub const BUY_DISCRIMINATOR: [u8; 8] = [102, 6, 61, 18, 1, 218, 235, 234];
pub const SELL_DISCRIMINATOR: [u8; 8] = [51, 230, 133, 164, 1, 127, 131, 173];
pub const BONDING_CURVE_DISCRIMINATOR: [u8; 8] = [23, 183, 248, 55, 96, 216, 172, 96];

/// Virtual reserves of a freshly created curve.
pub const INITIAL_VIRTUAL_SOL_RESERVES: u64 = 30_000_000_000;
pub const INITIAL_VIRTUAL_TOKEN_RESERVES: u64 = 1_073_000_000_000_000;

pub const LAMPORTS_PER_SOL: u64 = 1_000_000_000;

/// bloXroute batch submission endpoint
pub const DEFAULT_RELAY_URL: &str = "https://germany.solana.dex.blxrbdn.com/api/v2/submit-batch";
pub const DEFAULT_TIP_ACCOUNTS: [&str; 2] = [
    "HWEoBxYs7ssKuudEjzjmpfJVX7Dvi7wescFsVx2L5yoY",
    "95cfoy472fcQHaw4tPGBTKpn6ZQnfEPfBgDQx6gcRmRg",
];
/// 0.001 SOL
pub const DEFAULT_TIP_LAMPORTS: u64 = 1_000_000;

pub const DEFAULT_METADATA_API_URL: &str = "https://pump.fun/api/ipfs";

// Compute budget
pub const DEFAULT_COMPUTE_UNIT_PRICE: u64 = 200_000;
pub const DEFAULT_COMPUTE_UNIT_LIMIT: u32 = 600_000;
pub const DEFAULT_MULTI_BUY_COMPUTE_UNIT_LIMIT: u32 = 300_000;
pub const FUNDING_COMPUTE_UNIT_LIMIT: u32 = 100_000;
pub const FUNDING_COMPUTE_UNIT_PRICE: u64 = 250_000;

/// Spend cap for the rebuy leg, which is sized in tokens rather than SOL.
pub const DEFAULT_REBUY_MAX_SOL: f64 = 50.0;

/// Converts a SOL amount to lamports, rounded to the nearest lamport.
pub fn sol_to_lamports(sol: f64) -> u64 {
    (sol * LAMPORTS_PER_SOL as f64).round() as u64
}

pub fn lamports_to_sol(lamports: u64) -> f64 {
    lamports as f64 / LAMPORTS_PER_SOL as f64
}
