//! Core transaction builder
//!
//! `TxBuilder` turns typed trade requests into signed transactions. Each
//! call performs at most the reads it needs (destination-account existence,
//! token balances, the curve's creator) and never retries; a failed read is
//! returned to the caller as [`TransactionBuilderError::Rpc`].
//!
//! Multi-wallet builders fan the per-wallet work out concurrently and join
//! it back in input order before compiling one transaction.

use std::sync::Arc;

use futures::future::try_join_all;
use solana_sdk::{
    hash::Hash,
    instruction::Instruction,
    pubkey::Pubkey,
    signature::Keypair,
    signer::Signer,
};
use spl_associated_token_account::get_associated_token_address;
use tracing::{debug, info};

use crate::constants::{
    DEFAULT_COMPUTE_UNIT_LIMIT, DEFAULT_COMPUTE_UNIT_PRICE, DEFAULT_MULTI_BUY_COMPUTE_UNIT_LIMIT,
    FUNDING_COMPUTE_UNIT_LIMIT, FUNDING_COMPUTE_UNIT_PRICE,
};
use crate::curve::BondingCurveAccount;
use crate::rpc_manager::ChainReader;
use crate::tx_builder::errors::TransactionBuilderError;
use crate::tx_builder::instructions::{
    bonding_curve_pda, buy_ix, close_token_account_ix, create_ix, ensure_token_account_ix,
    plan_instructions, sell_ix, BuyRequest, CreateRequest, SellRequest,
};
use crate::tx_builder::output::{TransactionStep, TxBuildOutput};

/// Compute unit limit and price for one transaction kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComputeBudget {
    pub unit_limit: u32,
    /// Micro-lamports per compute unit
    pub unit_price: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxBuilderConfig {
    pub create: ComputeBudget,
    pub multi_buy: ComputeBudget,
    pub multi_sell: ComputeBudget,
    pub funding: ComputeBudget,
}

impl Default for TxBuilderConfig {
    fn default() -> Self {
        let standard = ComputeBudget {
            unit_limit: DEFAULT_COMPUTE_UNIT_LIMIT,
            unit_price: DEFAULT_COMPUTE_UNIT_PRICE,
        };
        Self {
            create: standard,
            multi_buy: ComputeBudget {
                unit_limit: DEFAULT_MULTI_BUY_COMPUTE_UNIT_LIMIT,
                unit_price: DEFAULT_COMPUTE_UNIT_PRICE,
            },
            multi_sell: standard,
            funding: ComputeBudget {
                unit_limit: FUNDING_COMPUTE_UNIT_LIMIT,
                unit_price: FUNDING_COMPUTE_UNIT_PRICE,
            },
        }
    }
}

/// Token amount and spend cap for one buy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuyAmount {
    pub token_amount: u64,
    pub max_sol_cost: u64,
}

/// One wallet's share of a multi-wallet buy
#[derive(Debug, Clone, Copy)]
pub struct BuyLeg<'a> {
    pub wallet: &'a Keypair,
    pub amount: BuyAmount,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SellAmount {
    Exact(u64),
    /// Whole on-chain balance; the emptied token account is closed
    All,
}

/// One wallet's share of a multi-wallet sell
#[derive(Debug, Clone, Copy)]
pub struct SellLeg<'a> {
    pub wallet: &'a Keypair,
    pub amount: SellAmount,
}

/// Token and curve metadata the create instruction registers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetInfo {
    pub name: String,
    pub symbol: String,
    pub uri: String,
}

pub struct TxBuilder {
    reader: Arc<dyn ChainReader>,
    config: TxBuilderConfig,
}

impl TxBuilder {
    pub fn new(reader: Arc<dyn ChainReader>, config: TxBuilderConfig) -> Self {
        Self { reader, config }
    }

    pub fn config(&self) -> &TxBuilderConfig {
        &self.config
    }

    /// Asset creation and the creator's seed buy in one transaction.
    ///
    /// Signed by the creator (fee payer) and the mint keypair.
    pub fn create_and_buy(
        &self,
        mint: &Keypair,
        creator: &Keypair,
        asset: &AssetInfo,
        seed: BuyAmount,
        blockhash: Hash,
    ) -> Result<TxBuildOutput, TransactionBuilderError> {
        let mint_pk = mint.pubkey();
        let creator_pk = creator.pubkey();

        let body = vec![
            create_ix(&CreateRequest {
                mint: mint_pk,
                creator: creator_pk,
                name: asset.name.clone(),
                symbol: asset.symbol.clone(),
                uri: asset.uri.clone(),
            })?,
            ensure_token_account_ix(&creator_pk, &creator_pk, &mint_pk),
            buy_ix(&BuyRequest {
                mint: mint_pk,
                user: creator_pk,
                creator: creator_pk,
                token_amount: seed.token_amount,
                max_sol_cost: seed.max_sol_cost,
            })?,
        ];

        let budget = self.config.create;
        let plan = plan_instructions(budget.unit_limit, budget.unit_price, body)?;
        info!(
            mint = %mint_pk,
            creator = %creator_pk,
            tokens = seed.token_amount,
            "Building create + seed buy"
        );
        TransactionStep::new("create_and_buy", creator_pk, plan).sign(blockhash, &[creator, mint])
    }

    /// One transaction buying for every leg, fee paid by `payer` or the first leg.
    pub async fn multi_buy(
        &self,
        mint: &Pubkey,
        creator: &Pubkey,
        legs: &[BuyLeg<'_>],
        payer: Option<&Keypair>,
        blockhash: Hash,
    ) -> Result<TxBuildOutput, TransactionBuilderError> {
        let first = legs.first().ok_or_else(|| {
            TransactionBuilderError::configuration("multi-buy needs at least one wallet")
        })?;
        let payer = payer.unwrap_or(first.wallet);

        let reader = &self.reader;
        let per_wallet = legs.iter().map(|leg| async move {
            let owner = leg.wallet.pubkey();
            let ata = get_associated_token_address(&owner, mint);

            let mut ixs = Vec::with_capacity(2);
            if !reader.account_exists(&ata).await? {
                debug!(owner = %owner, ata = %ata, "Destination token account missing, creating");
                ixs.push(ensure_token_account_ix(&owner, &owner, mint));
            }
            ixs.push(buy_ix(&BuyRequest {
                mint: *mint,
                user: owner,
                creator: *creator,
                token_amount: leg.amount.token_amount,
                max_sol_cost: leg.amount.max_sol_cost,
            })?);
            Ok::<_, TransactionBuilderError>(ixs)
        });

        let body: Vec<Instruction> = try_join_all(per_wallet).await?.into_iter().flatten().collect();

        let budget = self.config.multi_buy;
        let plan = plan_instructions(budget.unit_limit, budget.unit_price, body)?;

        let mut keypairs: Vec<&Keypair> = legs.iter().map(|leg| leg.wallet).collect();
        keypairs.push(payer);

        info!(mint = %mint, wallets = legs.len(), payer = %payer.pubkey(), "Building multi-buy");
        TransactionStep::new("multi_buy", payer.pubkey(), plan).sign(blockhash, &keypairs)
    }

    /// One transaction selling for every leg with a positive amount.
    ///
    /// Returns `Ok(None)` when no leg has anything to sell. The fee payer is
    /// `payer` when given, otherwise the first funded leg.
    pub async fn multi_sell(
        &self,
        mint: &Pubkey,
        creator: &Pubkey,
        legs: &[SellLeg<'_>],
        payer: Option<&Keypair>,
        blockhash: Hash,
    ) -> Result<Option<TxBuildOutput>, TransactionBuilderError> {
        let reader = &self.reader;
        let per_wallet = legs.iter().map(|leg| async move {
            let owner = leg.wallet.pubkey();
            let (amount, close) = match leg.amount {
                SellAmount::Exact(amount) => (amount, false),
                SellAmount::All => match reader.token_balance(&owner, mint).await {
                    Ok(balance) => (balance, true),
                    Err(e) if e.is_account_not_found() => (0, false),
                    Err(e) => return Err(e.into()),
                },
            };

            if amount == 0 {
                debug!(owner = %owner, "Nothing to sell");
                return Ok((leg.wallet, Vec::new()));
            }

            let mut ixs = vec![sell_ix(&SellRequest {
                mint: *mint,
                user: owner,
                creator: *creator,
                token_amount: amount,
                min_sol_output: 0,
            })?];
            if close {
                ixs.push(close_token_account_ix(&owner, mint)?);
            }
            Ok::<_, TransactionBuilderError>((leg.wallet, ixs))
        });

        let built = try_join_all(per_wallet).await?;
        let funded: Vec<&Keypair> = built
            .iter()
            .filter(|(_, ixs)| !ixs.is_empty())
            .map(|(wallet, _)| *wallet)
            .collect();
        let body: Vec<Instruction> = built.into_iter().flat_map(|(_, ixs)| ixs).collect();

        let budget = self.config.multi_sell;
        let plan = plan_instructions(budget.unit_limit, budget.unit_price, body)?;
        if plan.is_empty() {
            info!(mint = %mint, wallets = legs.len(), "No balances to sell");
            return Ok(None);
        }

        let payer = match payer.or_else(|| funded.first().copied()) {
            Some(payer) => payer,
            None => return Ok(None),
        };
        let mut keypairs = funded.clone();
        keypairs.push(payer);

        info!(mint = %mint, sellers = funded.len(), payer = %payer.pubkey(), "Building multi-sell");
        TransactionStep::new("multi_sell", payer.pubkey(), plan)
            .sign(blockhash, &keypairs)
            .map(Some)
    }

    /// Sells an exact amount from one wallet, which also pays the fee.
    pub fn sell(
        &self,
        mint: &Pubkey,
        creator: &Pubkey,
        wallet: &Keypair,
        token_amount: u64,
        blockhash: Hash,
    ) -> Result<TxBuildOutput, TransactionBuilderError> {
        let owner = wallet.pubkey();
        let body = vec![sell_ix(&SellRequest {
            mint: *mint,
            user: owner,
            creator: *creator,
            token_amount,
            min_sol_output: 0,
        })?];

        let budget = self.config.multi_sell;
        let plan = plan_instructions(budget.unit_limit, budget.unit_price, body)?;
        info!(mint = %mint, owner = %owner, tokens = token_amount, "Building sell");
        TransactionStep::new("sell", owner, plan).sign(blockhash, &[wallet])
    }

    /// Plain SOL transfer with the funding compute budget.
    pub fn transfer(
        &self,
        from: &Keypair,
        to: &Pubkey,
        lamports: u64,
        blockhash: Hash,
    ) -> Result<TxBuildOutput, TransactionBuilderError> {
        if lamports == 0 {
            return Err(TransactionBuilderError::configuration("transfer amount must be positive"));
        }
        #[allow(deprecated)]
        let ix = solana_sdk::system_instruction::transfer(&from.pubkey(), to, lamports);

        let budget = self.config.funding;
        let plan = plan_instructions(budget.unit_limit, budget.unit_price, vec![ix])?;
        TransactionStep::new("transfer", from.pubkey(), plan).sign(blockhash, &[from])
    }

    /// Creator recorded in the mint's on-chain bonding-curve account.
    pub async fn resolve_creator(&self, mint: &Pubkey) -> Result<Pubkey, TransactionBuilderError> {
        let curve = bonding_curve_pda(mint);
        let data = self.reader.account_data(&curve).await?;
        let account = BondingCurveAccount::from_account_data(&data).map_err(|e| {
            TransactionBuilderError::instruction_failed(
                "pump.fun",
                format!("bonding curve {curve} unreadable: {e}"),
            )
        })?;
        Ok(account.creator())
    }
}
