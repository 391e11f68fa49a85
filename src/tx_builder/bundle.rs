//! Bundle composition
//!
//! A [`Bundle`] is an ordered list of fully signed transactions that always
//! ends with exactly one tip transfer to a relay tip account. Callers sign
//! their transactions against one shared blockhash; the tip is signed against
//! a blockhash fetched here, at bundle-build time. Submitted transactions are
//! never re-stamped.

use std::str::FromStr;
use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine};
use rand::seq::SliceRandom;
use solana_sdk::{
    pubkey::Pubkey, signature::Keypair, signer::Signer, transaction::VersionedTransaction,
};
use tracing::{debug, info, warn};

use crate::constants::{DEFAULT_TIP_ACCOUNTS, DEFAULT_TIP_LAMPORTS};
use crate::rpc_manager::ChainReader;
use crate::tx_builder::errors::TransactionBuilderError;
use crate::tx_builder::instructions::plan_instructions;
use crate::tx_builder::output::{TransactionStep, TxBuildOutput};

/// Relay tip destinations and amount
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TipConfig {
    pub accounts: Vec<Pubkey>,
    pub lamports: u64,
}

impl TipConfig {
    pub fn new(accounts: Vec<Pubkey>, lamports: u64) -> Self {
        Self { accounts, lamports }
    }

    /// Parses base58 tip addresses.
    pub fn from_addresses<S: AsRef<str>>(
        addresses: &[S],
        lamports: u64,
    ) -> Result<Self, TransactionBuilderError> {
        let accounts = addresses
            .iter()
            .map(|a| {
                Pubkey::from_str(a.as_ref()).map_err(|e| {
                    TransactionBuilderError::configuration(format!(
                        "invalid tip account {}: {}",
                        a.as_ref(),
                        e
                    ))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(accounts, lamports))
    }

    /// Uniform pick over the tip set, drawn fresh on every call.
    pub fn pick(&self) -> Result<Pubkey, TransactionBuilderError> {
        self.accounts
            .choose(&mut rand::thread_rng())
            .copied()
            .ok_or_else(|| TransactionBuilderError::configuration("tip account set is empty"))
    }
}

impl Default for TipConfig {
    fn default() -> Self {
        let accounts = DEFAULT_TIP_ACCOUNTS
            .iter()
            .filter_map(|a| Pubkey::from_str(a).ok())
            .collect();
        Self::new(accounts, DEFAULT_TIP_LAMPORTS)
    }
}

/// Ordered, fully signed transactions with the tip transfer last
#[derive(Debug, Clone)]
pub struct Bundle {
    pub transactions: Vec<VersionedTransaction>,
    pub labels: Vec<String>,
    pub tip_account: Pubkey,
    pub tip_lamports: u64,
}

impl Bundle {
    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    pub fn tip_transaction(&self) -> Option<&VersionedTransaction> {
        self.transactions.last()
    }

    /// Base64 of each transaction's wire encoding, in bundle order.
    pub fn wire_entries(&self) -> Result<Vec<String>, TransactionBuilderError> {
        self.transactions
            .iter()
            .map(|tx| {
                bincode::serialize(tx)
                    .map(|bytes| BASE64_STANDARD.encode(bytes))
                    .map_err(|e| TransactionBuilderError::Serialization(e.to_string()))
            })
            .collect()
    }
}

pub struct BundleBuilder {
    reader: Arc<dyn ChainReader>,
    tip: TipConfig,
}

impl BundleBuilder {
    pub fn new(reader: Arc<dyn ChainReader>, tip: TipConfig) -> Self {
        Self { reader, tip }
    }

    pub fn tip_config(&self) -> &TipConfig {
        &self.tip
    }

    /// Appends a tip signed by `fee_payer` to `transactions`.
    ///
    /// An empty tip set fails before any network read.
    pub async fn build(
        &self,
        transactions: Vec<TxBuildOutput>,
        fee_payer: &Keypair,
    ) -> Result<Bundle, TransactionBuilderError> {
        let tip_account = self.tip.pick()?;

        if let Some(first) = transactions.first() {
            let expected = first.blockhash;
            if transactions
                .iter()
                .any(|t| *crate::compat::get_recent_blockhash(&t.tx.message) != expected)
            {
                warn!(
                    transactions = transactions.len(),
                    "Bundle transactions were built against different blockhashes"
                );
            }
        }

        let blockhash = self
            .reader
            .latest_blockhash()
            .await
            .map_err(|e| TransactionBuilderError::blockhash_unavailable(e.to_string()))?;

        #[allow(deprecated)]
        let transfer = solana_sdk::system_instruction::transfer(
            &fee_payer.pubkey(),
            &tip_account,
            self.tip.lamports,
        );
        let plan = plan_instructions(0, 0, vec![transfer])?;
        let tip = TransactionStep::new("tip", fee_payer.pubkey(), plan).sign(blockhash, &[fee_payer])?;

        let mut labels = Vec::with_capacity(transactions.len() + 1);
        let mut signed = Vec::with_capacity(transactions.len() + 1);
        for output in transactions {
            labels.push(output.label.clone());
            signed.push(output.into_tx());
        }
        labels.push(tip.label.clone());
        signed.push(tip.into_tx());

        debug!(labels = ?labels, "Bundle order");
        info!(
            bundle_size = signed.len(),
            tip_account = %tip_account,
            tip_lamports = self.tip.lamports,
            "Bundle built"
        );

        Ok(Bundle {
            transactions: signed,
            labels,
            tip_account,
            tip_lamports: self.tip.lamports,
        })
    }
}
