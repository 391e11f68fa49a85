//! Test Utilities Module
//!
//! Deterministic stand-ins for the chain, the relay and the metadata API.
//!
//! These utilities are only compiled when running tests or when the
//! `test_utils` feature is enabled.

#![cfg(any(test, feature = "test_utils"))]

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use solana_sdk::{
    hash::Hash,
    pubkey::Pubkey,
    signature::{Keypair, Signature},
    signer::Signer,
    transaction::VersionedTransaction,
};
use spl_associated_token_account::get_associated_token_address;

use crate::metadata::{MetadataError, MetadataService, PublishedMetadata, TokenMetadata};
use crate::rpc_manager::{ChainReader, RpcManagerError, SimulationOutcome};
use crate::tx_builder::errors::TransactionBuilderError;
use crate::tx_builder::instructions::plan_instructions;
use crate::tx_builder::output::{TransactionStep, TxBuildOutput};
use crate::tx_builder::relay::{Bundler, RelayResponse};

const MOCK_ENDPOINT: &str = "mock";

/// A signed one-instruction transfer with a unique destination.
pub fn signed_noop(payer: &Keypair, label: &str) -> TxBuildOutput {
    #[allow(deprecated)]
    let ix = solana_sdk::system_instruction::transfer(&payer.pubkey(), &Pubkey::new_unique(), 1);
    let plan = plan_instructions(0, 0, vec![ix]).expect("transfer has accounts");
    TransactionStep::new(label, payer.pubkey(), plan)
        .sign(Hash::new_unique(), &[payer])
        .expect("payer is the only signer")
}

pub fn transport_error(message: &str) -> RpcManagerError {
    RpcManagerError::Transport {
        endpoint: MOCK_ENDPOINT.to_string(),
        message: message.to_string(),
    }
}

/// Scripted in-memory chain
///
/// Token balances come from a per-owner script first (one entry consumed per
/// read), then from the static balance table. Owners with neither have no
/// token account.
#[derive(Default)]
pub struct MockChainReader {
    token_balances: Mutex<HashMap<(Pubkey, Pubkey), u64>>,
    balance_scripts: Mutex<HashMap<Pubkey, VecDeque<Result<u64, RpcManagerError>>>>,
    sol_balances: Mutex<HashMap<Pubkey, u64>>,
    accounts: Mutex<HashSet<Pubkey>>,
    account_data: Mutex<HashMap<Pubkey, Vec<u8>>>,
    simulation_failures: Mutex<HashMap<Signature, String>>,
    sent: Mutex<Vec<VersionedTransaction>>,
    send_failures: AtomicUsize,
    blockhash_calls: AtomicUsize,
    balance_reads: AtomicUsize,
}

impl MockChainReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_account(&self, address: Pubkey) {
        self.accounts.lock().unwrap().insert(address);
    }

    /// Sets a static balance and marks the owner's token account as existing.
    pub fn set_token_balance(&self, owner: Pubkey, mint: Pubkey, amount: u64) {
        self.token_balances
            .lock()
            .unwrap()
            .insert((owner, mint), amount);
        self.add_account(get_associated_token_address(&owner, &mint));
    }

    /// Queues per-read results for `owner`, for any mint.
    pub fn script_token_balances(&self, owner: Pubkey, script: Vec<Result<u64, RpcManagerError>>) {
        self.balance_scripts
            .lock()
            .unwrap()
            .insert(owner, script.into());
    }

    pub fn set_sol_balance(&self, address: Pubkey, lamports: u64) {
        self.sol_balances.lock().unwrap().insert(address, lamports);
    }

    pub fn set_account_data(&self, address: Pubkey, data: Vec<u8>) {
        self.account_data.lock().unwrap().insert(address, data);
    }

    /// Makes simulation of the transaction with this first signature fail.
    pub fn fail_simulation(&self, signature: Signature, error: &str) {
        self.simulation_failures
            .lock()
            .unwrap()
            .insert(signature, error.to_string());
    }

    /// The next `count` sends fail with a transport error.
    pub fn fail_sends(&self, count: usize) {
        self.send_failures.store(count, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<VersionedTransaction> {
        self.sent.lock().unwrap().clone()
    }

    pub fn blockhash_calls(&self) -> usize {
        self.blockhash_calls.load(Ordering::SeqCst)
    }

    pub fn balance_reads(&self) -> usize {
        self.balance_reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChainReader for MockChainReader {
    async fn latest_blockhash(&self) -> Result<Hash, RpcManagerError> {
        self.blockhash_calls.fetch_add(1, Ordering::SeqCst);
        Ok(Hash::new_unique())
    }

    async fn token_balance(&self, owner: &Pubkey, mint: &Pubkey) -> Result<u64, RpcManagerError> {
        self.balance_reads.fetch_add(1, Ordering::SeqCst);
        if let Some(next) = self
            .balance_scripts
            .lock()
            .unwrap()
            .get_mut(owner)
            .and_then(|script| script.pop_front())
        {
            return next;
        }
        self.token_balances
            .lock()
            .unwrap()
            .get(&(*owner, *mint))
            .copied()
            .ok_or_else(|| RpcManagerError::AccountNotFound {
                account: get_associated_token_address(owner, mint).to_string(),
                endpoint: MOCK_ENDPOINT.to_string(),
            })
    }

    async fn sol_balance(&self, address: &Pubkey) -> Result<u64, RpcManagerError> {
        Ok(self
            .sol_balances
            .lock()
            .unwrap()
            .get(address)
            .copied()
            .unwrap_or_default())
    }

    async fn simulate(
        &self,
        tx: &VersionedTransaction,
    ) -> Result<SimulationOutcome, RpcManagerError> {
        let err = tx
            .signatures
            .first()
            .and_then(|sig| self.simulation_failures.lock().unwrap().get(sig).cloned());
        Ok(SimulationOutcome {
            err,
            logs: vec!["Program log: mock".to_string()],
            units_consumed: Some(1_000),
        })
    }

    async fn account_exists(&self, address: &Pubkey) -> Result<bool, RpcManagerError> {
        Ok(self.accounts.lock().unwrap().contains(address)
            || self.account_data.lock().unwrap().contains_key(address))
    }

    async fn account_data(&self, address: &Pubkey) -> Result<Vec<u8>, RpcManagerError> {
        self.account_data
            .lock()
            .unwrap()
            .get(address)
            .cloned()
            .ok_or_else(|| RpcManagerError::AccountNotFound {
                account: address.to_string(),
                endpoint: MOCK_ENDPOINT.to_string(),
            })
    }

    async fn send_and_confirm(
        &self,
        tx: &VersionedTransaction,
    ) -> Result<Signature, RpcManagerError> {
        let remaining = self.send_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.send_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(transport_error("connection reset"));
        }
        self.sent.lock().unwrap().push(tx.clone());
        Ok(tx.signatures.first().copied().unwrap_or_default())
    }
}

/// Relay that records every batch
#[derive(Default)]
pub struct MockBundler {
    submitted: Mutex<Vec<Vec<String>>>,
    rejections: Mutex<VecDeque<(u16, String)>>,
}

impl MockBundler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reject_next(&self, status: u16, body: &str) {
        self.rejections
            .lock()
            .unwrap()
            .push_back((status, body.to_string()));
    }

    /// Every batch received, accepted or not.
    pub fn submitted(&self) -> Vec<Vec<String>> {
        self.submitted.lock().unwrap().clone()
    }
}

#[async_trait]
impl Bundler for MockBundler {
    async fn submit_batch(
        &self,
        entries: Vec<String>,
    ) -> Result<RelayResponse, TransactionBuilderError> {
        self.submitted.lock().unwrap().push(entries);
        if let Some((status, body)) = self.rejections.lock().unwrap().pop_front() {
            return Err(TransactionBuilderError::RelayRejected { status, body });
        }
        Ok(RelayResponse {
            status: 200,
            body: r#"{"transactions":[]}"#.to_string(),
        })
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// Echoes the request back with a fixed URI
#[derive(Default)]
pub struct MockMetadataService {
    pub fail: bool,
    calls: AtomicUsize,
}

impl MockMetadataService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MetadataService for MockMetadataService {
    async fn publish(&self, metadata: &TokenMetadata) -> Result<PublishedMetadata, MetadataError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(MetadataError::Http("mock upload failure".to_string()));
        }
        metadata.validate()?;
        Ok(PublishedMetadata {
            name: metadata.name.clone(),
            symbol: metadata.symbol.clone(),
            uri: format!("https://ipfs.io/ipfs/{}", metadata.symbol),
        })
    }
}
