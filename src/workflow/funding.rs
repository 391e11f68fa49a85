//! SOL distribution to launch wallets.
//!
//! Each attempt fetches a fresh blockhash, signs a new transfer and waits
//! for confirmation. Transient failures are retried with exponential backoff.

use solana_sdk::{
    pubkey::Pubkey,
    signature::{Keypair, Signature},
    signer::Signer,
};
use tracing::info;

use crate::constants::lamports_to_sol;
use crate::retry::RetryPolicy;
use crate::rpc_manager::ChainReader;
use crate::tx_builder::TxBuilder;
use crate::wallet::{save_new_wallet, WalletRole, WalletStore};
use crate::workflow::WorkflowError;

pub async fn distribute_sol(
    reader: &dyn ChainReader,
    builder: &TxBuilder,
    from: &Keypair,
    to: &Pubkey,
    lamports: u64,
    retry: &RetryPolicy,
) -> Result<Signature, WorkflowError> {
    let signature = retry
        .run_if(
            "distribute_sol",
            move || async move {
                let blockhash = reader.latest_blockhash().await?;
                let transfer = builder.transfer(from, to, lamports, blockhash)?;
                let signature = reader.send_and_confirm(transfer.tx_ref()).await?;
                Ok::<_, WorkflowError>(signature)
            },
            WorkflowError::is_retryable,
        )
        .await?;

    info!(
        from = %from.pubkey(),
        to = %to,
        sol = lamports_to_sol(lamports),
        signature = %signature,
        "SOL distributed"
    );
    Ok(signature)
}

/// Replaces the wallet for `role` with a fresh keypair and funds it from `funder`.
///
/// The new keypair is saved before funding, so a failed transfer leaves an
/// unfunded but recoverable wallet on disk.
pub async fn create_and_fund_wallet(
    store: &dyn WalletStore,
    role: WalletRole,
    reader: &dyn ChainReader,
    builder: &TxBuilder,
    funder: &Keypair,
    lamports: u64,
    retry: &RetryPolicy,
) -> Result<(Keypair, Signature), WorkflowError> {
    if role == WalletRole::Mint {
        return Err(WorkflowError::Configuration(
            "the mint keypair is created, not funded".into(),
        ));
    }
    let wallet = save_new_wallet(store, role)?;
    let signature = distribute_sol(reader, builder, funder, &wallet.pubkey(), lamports, retry).await?;
    Ok((wallet, signature))
}
