//! Chain reader
//!
//! Everything the launcher needs from a Solana node goes through the
//! [`ChainReader`] trait: blockhashes, balances, simulation, account lookups
//! and the one-shot sends used for funding. The concrete client is built once
//! and shared by `Arc`, so tests can swap in a scripted reader.

use async_trait::async_trait;
use solana_sdk::{
    hash::Hash, pubkey::Pubkey, signature::Signature, transaction::VersionedTransaction,
};

pub mod rpc_errors;
pub mod rpc_reader;

pub use rpc_errors::RpcManagerError;
pub use rpc_reader::RpcChainReader;

/// Result of simulating one transaction against current chain state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SimulationOutcome {
    /// Program error, if the simulation failed
    pub err: Option<String>,
    pub logs: Vec<String>,
    pub units_consumed: Option<u64>,
}

impl SimulationOutcome {
    pub fn is_ok(&self) -> bool {
        self.err.is_none()
    }
}

/// Read-mostly view of the chain.
///
/// All calls may fail transiently. Implementations do not retry; the caller
/// decides whether a failure is worth another attempt.
#[async_trait]
pub trait ChainReader: Send + Sync {
    async fn latest_blockhash(&self) -> Result<Hash, RpcManagerError>;

    /// Raw token amount held by `owner`'s associated account for `mint`.
    ///
    /// Fails with [`RpcManagerError::AccountNotFound`] when that account does not exist.
    async fn token_balance(&self, owner: &Pubkey, mint: &Pubkey) -> Result<u64, RpcManagerError>;

    async fn sol_balance(&self, address: &Pubkey) -> Result<u64, RpcManagerError>;

    async fn simulate(
        &self,
        tx: &VersionedTransaction,
    ) -> Result<SimulationOutcome, RpcManagerError>;

    async fn account_exists(&self, address: &Pubkey) -> Result<bool, RpcManagerError>;

    async fn account_data(&self, address: &Pubkey) -> Result<Vec<u8>, RpcManagerError>;

    async fn send_and_confirm(
        &self,
        tx: &VersionedTransaction,
    ) -> Result<Signature, RpcManagerError>;
}
