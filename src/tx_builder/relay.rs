//! Relay submission
//!
//! [`RelaySubmitter::send_bundle`] runs the full submission path for one
//! bundle: simulate, append the tip, encode, POST once. A rejected bundle is
//! returned as an error and never resubmitted here; confirmation is left to
//! the caller's state polling.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use solana_sdk::{signature::Keypair, signature::Signature};
use tracing::{debug, info};

use crate::metrics::{metrics, Timer};
use crate::observability::TraceContext;
use crate::rpc_manager::ChainReader;
use crate::structured_logging::StructuredLogger;
use crate::tx_builder::bundle::{Bundle, BundleBuilder};
use crate::tx_builder::errors::TransactionBuilderError;
use crate::tx_builder::output::TxBuildOutput;
use crate::tx_builder::simulate::{simulate_all, SimulationPolicy, SimulationReport};

#[derive(Debug, Serialize)]
struct SubmitBatchRequest {
    entries: Vec<BatchEntry>,
}

#[derive(Debug, Serialize)]
struct BatchEntry {
    transaction: TransactionContent,
}

#[derive(Debug, Serialize)]
struct TransactionContent {
    content: String,
}

/// A 2xx answer from the relay
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayResponse {
    pub status: u16,
    pub body: String,
}

impl RelayResponse {
    /// The `transactions` field of a JSON body, if present.
    pub fn transaction_ids(&self) -> Option<serde_json::Value> {
        serde_json::from_str::<serde_json::Value>(&self.body)
            .ok()?
            .get("transactions")
            .cloned()
    }
}

/// Batch submission endpoint
///
/// Implementations return `Ok` only for a 2xx answer. Any other status is
/// [`TransactionBuilderError::RelayRejected`] carrying the response body.
#[async_trait]
pub trait Bundler: Send + Sync {
    /// Submits base64 wire-encoded transactions as one ordered batch.
    async fn submit_batch(&self, entries: Vec<String>)
        -> Result<RelayResponse, TransactionBuilderError>;

    fn name(&self) -> &str;
}

/// bloXroute `submit-batch` client
pub struct BloxrouteRelay {
    http: Client,
    url: String,
    auth_token: String,
}

impl BloxrouteRelay {
    pub fn new(
        url: impl Into<String>,
        auth_token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, TransactionBuilderError> {
        let auth_token = auth_token.filter(|t| !t.trim().is_empty()).ok_or_else(|| {
            TransactionBuilderError::configuration("BLOXROUTE_AUTH_TOKEN is not set")
        })?;
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransactionBuilderError::RelayTransport(e.to_string()))?;

        Ok(Self {
            http,
            url: url.into(),
            auth_token,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Bundler for BloxrouteRelay {
    async fn submit_batch(
        &self,
        entries: Vec<String>,
    ) -> Result<RelayResponse, TransactionBuilderError> {
        let payload = SubmitBatchRequest {
            entries: entries
                .into_iter()
                .map(|content| BatchEntry {
                    transaction: TransactionContent { content },
                })
                .collect(),
        };

        // bloXroute expects the raw token, no scheme prefix
        let resp = self
            .http
            .post(&self.url)
            .header("Authorization", &self.auth_token)
            .json(&payload)
            .send()
            .await
            .map_err(|e| TransactionBuilderError::RelayTransport(e.to_string()))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| TransactionBuilderError::RelayTransport(e.to_string()))?;

        if status.is_success() {
            Ok(RelayResponse {
                status: status.as_u16(),
                body,
            })
        } else {
            Err(TransactionBuilderError::RelayRejected {
                status: status.as_u16(),
                body,
            })
        }
    }

    fn name(&self) -> &str {
        "bloxroute"
    }
}

/// What the relay accepted for one bundle
#[derive(Debug, Clone)]
pub struct BundleReceipt {
    pub span_id: String,
    pub entries: usize,
    pub tip_account: solana_sdk::pubkey::Pubkey,
    pub signatures: Vec<Signature>,
    pub simulation: SimulationReport,
    pub response: RelayResponse,
    pub latency_ms: u64,
}

pub struct RelaySubmitter {
    reader: Arc<dyn ChainReader>,
    bundles: BundleBuilder,
    relay: Arc<dyn Bundler>,
    policy: SimulationPolicy,
}

impl RelaySubmitter {
    pub fn new(
        reader: Arc<dyn ChainReader>,
        bundles: BundleBuilder,
        relay: Arc<dyn Bundler>,
        policy: SimulationPolicy,
    ) -> Self {
        Self {
            reader,
            bundles,
            relay,
            policy,
        }
    }

    pub fn policy(&self) -> SimulationPolicy {
        self.policy
    }

    /// Lamports the fee payer spends on the tip of every bundle.
    pub fn tip_lamports(&self) -> u64 {
        self.bundles.tip_config().lamports
    }

    /// Simulates, tips and submits `transactions` as one bundle, in order.
    pub async fn send_bundle(
        &self,
        transactions: Vec<TxBuildOutput>,
        fee_payer: &Keypair,
        trace: &TraceContext,
    ) -> Result<BundleReceipt, TransactionBuilderError> {
        let logger = StructuredLogger::for_trace(trace);
        let result = self.submit(transactions, fee_payer, trace).await;
        match &result {
            Ok(receipt) => {
                metrics().bundles_submitted.inc();
                logger.log_bundle_submitted(trace, receipt.entries, receipt.latency_ms);
                info!(
                    relay = self.relay.name(),
                    status = receipt.response.status,
                    transactions = ?receipt.response.transaction_ids(),
                    "Bundle submitted"
                );
            }
            Err(e) => {
                metrics().bundles_rejected.inc();
                debug!(category = e.category(), retryable = e.is_retryable(), "Bundle failed");
                logger.log_bundle_rejected(trace, &e.to_string());
            }
        }
        result
    }

    async fn submit(
        &self,
        transactions: Vec<TxBuildOutput>,
        fee_payer: &Keypair,
        trace: &TraceContext,
    ) -> Result<BundleReceipt, TransactionBuilderError> {
        let simulation = simulate_all(self.reader.as_ref(), &transactions, self.policy).await?;

        let bundle: Bundle = self.bundles.build(transactions, fee_payer).await?;
        let entries = bundle.wire_entries()?;
        let signatures = bundle
            .transactions
            .iter()
            .filter_map(|tx| tx.signatures.first().copied())
            .collect();
        debug!(entries = entries.len(), "Submitting batch");

        let timer = Timer::start();
        let response = self.relay.submit_batch(entries).await;
        timer.observe_duration(&metrics().relay_latency);
        let response = response?;

        Ok(BundleReceipt {
            span_id: trace.span_id.clone(),
            entries: bundle.len(),
            tip_account: bundle.tip_account,
            signatures,
            simulation,
            response,
            latency_ms: (timer.elapsed_secs() * 1000.0) as u64,
        })
    }
}
