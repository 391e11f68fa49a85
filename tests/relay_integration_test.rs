//! Bundle submission against a local HTTP relay
//!
//! Exercises the real bloXroute client and the submit path end to end:
//! simulation, tip append, wire encoding and the POST itself.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::prelude::*;
use mockito::Matcher;
use pump_bundler::observability::TraceContext;
use pump_bundler::rpc_manager::{ChainReader, RpcManagerError, SimulationOutcome};
use pump_bundler::tx_builder::instructions::plan_instructions;
use pump_bundler::tx_builder::{
    BloxrouteRelay, BundleBuilder, RelaySubmitter, SimulationPolicy, TipConfig,
    TransactionBuilderError, TransactionStep, TxBuildOutput,
};
use solana_sdk::{
    hash::Hash,
    pubkey::Pubkey,
    signature::{Keypair, Signature},
    signer::Signer,
    transaction::VersionedTransaction,
};

/// Chain where everything exists, simulates cleanly and confirms instantly
#[derive(Default)]
struct StaticChain {
    blockhash_calls: AtomicUsize,
}

#[async_trait]
impl ChainReader for StaticChain {
    async fn latest_blockhash(&self) -> Result<Hash, RpcManagerError> {
        self.blockhash_calls.fetch_add(1, Ordering::SeqCst);
        Ok(Hash::new_unique())
    }

    async fn token_balance(&self, _owner: &Pubkey, _mint: &Pubkey) -> Result<u64, RpcManagerError> {
        Ok(0)
    }

    async fn sol_balance(&self, _address: &Pubkey) -> Result<u64, RpcManagerError> {
        Ok(0)
    }

    async fn simulate(
        &self,
        _tx: &VersionedTransaction,
    ) -> Result<SimulationOutcome, RpcManagerError> {
        Ok(SimulationOutcome::default())
    }

    async fn account_exists(&self, _address: &Pubkey) -> Result<bool, RpcManagerError> {
        Ok(true)
    }

    async fn account_data(&self, _address: &Pubkey) -> Result<Vec<u8>, RpcManagerError> {
        Ok(Vec::new())
    }

    async fn send_and_confirm(
        &self,
        tx: &VersionedTransaction,
    ) -> Result<Signature, RpcManagerError> {
        Ok(tx.signatures[0])
    }
}

const BATCH_PATH: &str = "/api/v2/submit-batch";

fn transfer(payer: &Keypair, label: &str) -> TxBuildOutput {
    #[allow(deprecated)]
    let ix = solana_sdk::system_instruction::transfer(&payer.pubkey(), &Pubkey::new_unique(), 10);
    let plan = plan_instructions(0, 0, vec![ix]).unwrap();
    TransactionStep::new(label, payer.pubkey(), plan)
        .sign(Hash::new_unique(), &[payer])
        .unwrap()
}

fn submitter(url: String, tip: TipConfig) -> RelaySubmitter {
    let chain = Arc::new(StaticChain::default());
    let relay = BloxrouteRelay::new(url, Some("secret-token".into()), Duration::from_secs(5))
        .unwrap();
    RelaySubmitter::new(
        chain.clone(),
        BundleBuilder::new(chain, tip),
        Arc::new(relay),
        SimulationPolicy::default(),
    )
}

/// Body of exactly `n` base64 entries in the relay's batch shape.
fn batch_of(n: usize) -> Matcher {
    Matcher::Regex(format!(
        r#"^\{{"entries":\[\{{"transaction":\{{"content":"[A-Za-z0-9+/=]+"\}}\}}(,\{{"transaction":\{{"content":"[A-Za-z0-9+/=]+"\}}\}}){{{}}}\]\}}$"#,
        n - 1
    ))
}

#[tokio::test]
async fn accepted_bundle_carries_tip_and_raw_auth_header() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", BATCH_PATH)
        .match_header("authorization", "secret-token")
        .match_header("content-type", "application/json")
        .match_body(batch_of(3))
        .with_status(200)
        .with_body(r#"{"transactions":["a","b","c"]}"#)
        .create_async()
        .await;

    let tip_account = Pubkey::new_unique();
    let submitter = submitter(
        format!("{}{}", server.url(), BATCH_PATH),
        TipConfig::new(vec![tip_account], 1_000_000),
    );
    let payer = Keypair::new();

    let receipt = submitter
        .send_bundle(
            vec![transfer(&payer, "first"), transfer(&payer, "second")],
            &payer,
            &TraceContext::new("relay_it"),
        )
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(receipt.entries, 3);
    assert_eq!(receipt.signatures.len(), 3);
    assert_eq!(receipt.tip_account, tip_account);
    assert!(receipt.simulation.all_passed());
    assert_eq!(
        receipt.response.transaction_ids(),
        Some(serde_json::json!(["a", "b", "c"]))
    );
}

#[tokio::test]
async fn rejection_surfaces_status_and_body() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", BATCH_PATH)
        .with_status(400)
        .with_body("tip below minimum")
        .create_async()
        .await;

    let submitter = submitter(
        format!("{}{}", server.url(), BATCH_PATH),
        TipConfig::default(),
    );
    let payer = Keypair::new();

    let result = submitter
        .send_bundle(
            vec![transfer(&payer, "only")],
            &payer,
            &TraceContext::new("relay_reject"),
        )
        .await;

    match result {
        Err(TransactionBuilderError::RelayRejected { status, body }) => {
            assert_eq!(status, 400);
            assert_eq!(body, "tip below minimum");
        }
        other => panic!("expected rejection, got {other:?}"),
    }
}

#[tokio::test]
async fn unreachable_relay_is_a_transport_error() {
    // Nothing listens on port 9 locally
    let submitter = submitter(
        "http://127.0.0.1:9/api/v2/submit-batch".to_string(),
        TipConfig::default(),
    );
    let payer = Keypair::new();

    let result = submitter
        .send_bundle(
            vec![transfer(&payer, "only")],
            &payer,
            &TraceContext::new("relay_down"),
        )
        .await;
    assert!(matches!(result, Err(TransactionBuilderError::RelayTransport(_))));
}

#[tokio::test]
async fn wire_entries_decode_in_bundle_order() {
    let chain = Arc::new(StaticChain::default());
    let tip_account = Pubkey::new_unique();
    let builder = BundleBuilder::new(chain.clone(), TipConfig::new(vec![tip_account], 42));
    let payer = Keypair::new();
    let txs = vec![transfer(&payer, "a"), transfer(&payer, "b")];
    let expected: Vec<Signature> = txs.iter().map(|t| t.tx.signatures[0]).collect();

    let bundle = builder.build(txs, &payer).await.unwrap();
    assert_eq!(bundle.labels, vec!["a", "b", "tip"]);
    assert_eq!(chain.blockhash_calls.load(Ordering::SeqCst), 1);

    let decoded: Vec<VersionedTransaction> = bundle
        .wire_entries()
        .unwrap()
        .iter()
        .map(|entry| {
            let bytes = BASE64_STANDARD.decode(entry).unwrap();
            bincode::deserialize(&bytes).unwrap()
        })
        .collect();

    assert_eq!(decoded.len(), 3);
    assert_eq!(decoded[0].signatures[0], expected[0]);
    assert_eq!(decoded[1].signatures[0], expected[1]);
    let tip_keys = decoded[2].message.static_account_keys();
    assert_eq!(tip_keys[0], payer.pubkey());
    assert!(tip_keys.contains(&tip_account));
}

#[tokio::test]
async fn empty_tip_set_fails_before_any_read() {
    let chain = Arc::new(StaticChain::default());
    let builder = BundleBuilder::new(chain.clone(), TipConfig::new(Vec::new(), 1));
    let payer = Keypair::new();

    let result = builder.build(vec![transfer(&payer, "a")], &payer).await;
    assert!(matches!(result, Err(TransactionBuilderError::Configuration(_))));
    assert_eq!(chain.blockhash_calls.load(Ordering::SeqCst), 0);
}
