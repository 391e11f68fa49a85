//! Token launch: create with seed buy, wait for the secondary wallet's
//! tokens, then sell them and rebuy from the third wallet.

use std::sync::Arc;

use solana_sdk::{pubkey::Pubkey, signer::Signer};
use tracing::info;

use crate::config::Config;
use crate::constants::sol_to_lamports;
use crate::curve::{max_sol_cost, BondingCurveState, BuyQuote};
use crate::metadata::{MetadataService, TokenMetadata};
use crate::observability::TraceContext;
use crate::retry::{poll_until, Cancellation, PollSettings};
use crate::rpc_manager::{ChainReader, RpcManagerError};
use crate::structured_logging::StructuredLogger;
use crate::tx_builder::{
    AssetInfo, BundleReceipt, BuyAmount, BuyLeg, RelaySubmitter, TxBuilder,
};
use crate::workflow::{cancellable, LaunchIdentities, WorkflowError, WorkflowPhase};

/// Amounts and polling for one launch
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LaunchSettings {
    pub dev_buy_lamports: u64,
    pub wallet_buy_lamports: u64,
    pub slippage_bps: u16,
    /// Spend cap for the third wallet's rebuy
    pub rebuy_max_lamports: u64,
    pub poll: PollSettings,
}

impl LaunchSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            dev_buy_lamports: sol_to_lamports(config.trading.dev_buy_sol),
            wallet_buy_lamports: sol_to_lamports(config.trading.wallet_buy_sol),
            slippage_bps: config.trading.max_slippage_bps,
            rebuy_max_lamports: sol_to_lamports(config.trading.rebuy_max_sol),
            poll: config.poll_settings(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LaunchReport {
    pub mint: Pubkey,
    pub metadata_uri: String,
    pub seed_quote: BuyQuote,
    pub secondary_quote: BuyQuote,
    /// Token balance the secondary wallet was observed holding
    pub secondary_balance: u64,
    pub first_bundle: BundleReceipt,
    pub second_bundle: BundleReceipt,
    pub phases: Vec<WorkflowPhase>,
}

pub struct LaunchWorkflow {
    reader: Arc<dyn ChainReader>,
    builder: Arc<TxBuilder>,
    submitter: Arc<RelaySubmitter>,
    metadata: Arc<dyn MetadataService>,
    settings: LaunchSettings,
}

impl LaunchWorkflow {
    pub fn new(
        reader: Arc<dyn ChainReader>,
        builder: Arc<TxBuilder>,
        submitter: Arc<RelaySubmitter>,
        metadata: Arc<dyn MetadataService>,
        settings: LaunchSettings,
    ) -> Self {
        Self {
            reader,
            builder,
            submitter,
            metadata,
            settings,
        }
    }

    /// Runs every phase to completion, or stops at the first failure.
    ///
    /// `cancel` is honoured at each suspension point. Without a poll
    /// timeout, the wait for the secondary balance only ends on success or
    /// cancellation.
    pub async fn run(
        &self,
        ids: &LaunchIdentities,
        token: &TokenMetadata,
        cancel: &Cancellation,
    ) -> Result<LaunchReport, WorkflowError> {
        let trace = TraceContext::new("launch");
        let logger = StructuredLogger::for_trace(&trace);
        let mint = ids.mint_address();
        let mut phases = Vec::with_capacity(4);

        let result = self
            .run_phases(ids, token, cancel, &trace, &logger, &mut phases)
            .await;
        if let Err(e) = &result {
            let failed_in = phases.last().copied().unwrap_or(WorkflowPhase::CreateAndSeedBuy);
            logger.error(&format!("launch of {mint} failed during {failed_in}: {e}"));
        }
        result
    }

    async fn run_phases(
        &self,
        ids: &LaunchIdentities,
        token: &TokenMetadata,
        cancel: &Cancellation,
        trace: &TraceContext,
        logger: &StructuredLogger,
        phases: &mut Vec<WorkflowPhase>,
    ) -> Result<LaunchReport, WorkflowError> {
        let mint = ids.mint_address();
        let creator = ids.creator.pubkey();
        let second = ids.second.pubkey();

        // CreateAndSeedBuy
        let mut phase = WorkflowPhase::CreateAndSeedBuy;
        phases.push(phase);
        logger.log_phase(phase.as_str(), &mint);

        let (published, blockhash) = cancellable(cancel, phase, async {
            tokio::try_join!(
                async { self.metadata.publish(token).await.map_err(WorkflowError::from) },
                async { self.reader.latest_blockhash().await.map_err(WorkflowError::from) },
            )
        })
        .await?;

        let curve = BondingCurveState::initial();
        let seed_quote = curve.quote_buy(self.settings.dev_buy_lamports);
        // Priced against the locally advanced reserves, not a chain read
        let secondary_quote = seed_quote.after.quote_buy(self.settings.wallet_buy_lamports);
        info!(
            mint = %mint,
            seed_tokens = seed_quote.token_out,
            secondary_tokens = secondary_quote.token_out,
            "Priced launch buys"
        );

        let asset = AssetInfo {
            name: published.name,
            symbol: published.symbol,
            uri: published.uri.clone(),
        };
        let create_tx = self.builder.create_and_buy(
            &ids.mint,
            &ids.creator,
            &asset,
            BuyAmount {
                token_amount: seed_quote.token_out,
                max_sol_cost: max_sol_cost(seed_quote.sol_in, self.settings.slippage_bps),
            },
            blockhash,
        )?;
        let secondary_legs = [BuyLeg {
            wallet: &ids.second,
            amount: BuyAmount {
                token_amount: secondary_quote.token_out,
                max_sol_cost: max_sol_cost(secondary_quote.sol_in, self.settings.slippage_bps),
            },
        }];
        let secondary_tx = cancellable(
            cancel,
            phase,
            self.builder
                .multi_buy(&mint, &creator, &secondary_legs, Some(&ids.creator), blockhash),
        )
        .await?;

        let first_bundle = cancellable(
            cancel,
            phase,
            self.submitter.send_bundle(
                vec![create_tx, secondary_tx],
                &ids.creator,
                &trace.child_span(phase.as_str()),
            ),
        )
        .await?;

        // AwaitSecondaryBalance
        phase = WorkflowPhase::AwaitSecondaryBalance;
        phases.push(phase);
        logger.log_phase(phase.as_str(), &mint);

        let reader = &self.reader;
        let secondary_balance =
            poll_until("secondary_balance", &self.settings.poll, cancel, move || async move {
                let balance = reader.token_balance(&second, &mint).await?;
                Ok::<_, RpcManagerError>((balance > 0).then_some(balance))
            })
            .await
            .map_err(|e| WorkflowError::from_poll(e, phase))?;
        logger.log_balance_observed(&second, secondary_balance);

        // SecondarySellAndRebuy
        phase = WorkflowPhase::SecondarySellAndRebuy;
        phases.push(phase);
        logger.log_phase(phase.as_str(), &mint);

        let blockhash = cancellable(cancel, phase, self.reader.latest_blockhash()).await?;
        let sell_tx = self
            .builder
            .sell(&mint, &creator, &ids.second, secondary_balance, blockhash)?;
        let rebuy_legs = [BuyLeg {
            wallet: &ids.third,
            amount: BuyAmount {
                token_amount: secondary_balance,
                max_sol_cost: self.settings.rebuy_max_lamports,
            },
        }];
        let rebuy_tx = cancellable(
            cancel,
            phase,
            self.builder
                .multi_buy(&mint, &creator, &rebuy_legs, Some(&ids.creator), blockhash),
        )
        .await?;

        let second_bundle = cancellable(
            cancel,
            phase,
            self.submitter.send_bundle(
                vec![sell_tx, rebuy_tx],
                &ids.creator,
                &trace.child_span(phase.as_str()),
            ),
        )
        .await?;

        phase = WorkflowPhase::Done;
        phases.push(phase);
        logger.log_phase(phase.as_str(), &mint);

        Ok(LaunchReport {
            mint,
            metadata_uri: published.uri,
            seed_quote,
            secondary_quote,
            secondary_balance,
            first_bundle,
            second_bundle,
            phases: phases.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine};
    use solana_sdk::{signature::Keypair, transaction::VersionedTransaction};

    use crate::retry::{cancellation, PollSettings};
    use crate::test_utils::{transport_error, MockBundler, MockChainReader, MockMetadataService};
    use crate::tx_builder::{BundleBuilder, SimulationPolicy, TipConfig, TxBuilderConfig};

    struct Harness {
        reader: Arc<MockChainReader>,
        relay: Arc<MockBundler>,
        workflow: LaunchWorkflow,
    }

    fn harness(poll: PollSettings) -> Harness {
        let reader = Arc::new(MockChainReader::new());
        let relay = Arc::new(MockBundler::new());
        let builder = Arc::new(TxBuilder::new(reader.clone(), TxBuilderConfig::default()));
        let submitter = Arc::new(RelaySubmitter::new(
            reader.clone(),
            BundleBuilder::new(reader.clone(), TipConfig::default()),
            relay.clone(),
            SimulationPolicy::default(),
        ));
        let workflow = LaunchWorkflow::new(
            reader.clone(),
            builder,
            submitter,
            Arc::new(MockMetadataService::new()),
            LaunchSettings {
                dev_buy_lamports: 100_000,
                wallet_buy_lamports: 100_000,
                slippage_bps: 500,
                rebuy_max_lamports: 50_000_000_000,
                poll,
            },
        );
        Harness {
            reader,
            relay,
            workflow,
        }
    }

    fn identities() -> LaunchIdentities {
        LaunchIdentities {
            creator: Keypair::new(),
            second: Keypair::new(),
            third: Keypair::new(),
            mint: Keypair::new(),
        }
    }

    fn token() -> TokenMetadata {
        TokenMetadata {
            name: "Bundle Coin".into(),
            symbol: "BNDL".into(),
            description: "test".into(),
            ..Default::default()
        }
    }

    fn decode(entry: &str) -> VersionedTransaction {
        bincode::deserialize(&BASE64_STANDARD.decode(entry).unwrap()).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_launch_submits_two_bundles() {
        let h = harness(PollSettings::default());
        let ids = identities();
        h.reader.script_token_balances(
            ids.second.pubkey(),
            vec![Err(transport_error("timeout")), Ok(0), Ok(5_000)],
        );

        let (_handle, cancel) = cancellation();
        let report = h.workflow.run(&ids, &token(), &cancel).await.unwrap();

        assert_eq!(report.secondary_balance, 5_000);
        assert_eq!(report.phases.last(), Some(&WorkflowPhase::Done));
        assert_eq!(report.phases.len(), 4);
        assert!(report.secondary_quote.token_out < report.seed_quote.token_out);
        assert_eq!(h.reader.balance_reads(), 3);

        let batches = h.relay.submitted();
        assert_eq!(batches.len(), 2);
        for batch in &batches {
            assert_eq!(batch.len(), 3);
            let tip = decode(&batch[2]);
            assert_eq!(
                crate::compat::get_fee_payer(&tip.message),
                Some(&ids.creator.pubkey())
            );
            assert_eq!(tip.message.instructions().len(), 1);
        }

        // create tx is signed by creator and mint, both launch txs share a blockhash
        let create = decode(&batches[0][0]);
        let signers = crate::compat::get_required_signers(&create.message);
        assert!(signers.contains(&ids.creator.pubkey()));
        assert!(signers.contains(&ids.mint.pubkey()));
        let secondary = decode(&batches[0][1]);
        assert_eq!(
            create.message.recent_blockhash(),
            secondary.message.recent_blockhash()
        );

        // second bundle: the secondary wallet sells, the third wallet rebuys
        let sell = decode(&batches[1][0]);
        assert_eq!(
            crate::compat::get_fee_payer(&sell.message),
            Some(&ids.second.pubkey())
        );
        let rebuy = decode(&batches[1][1]);
        assert!(crate::compat::get_required_signers(&rebuy.message).contains(&ids.third.pubkey()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_blocks_until_cancelled() {
        let h = harness(PollSettings::default());
        let ids = identities();
        let (handle, cancel) = cancellation();

        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(30)).await;
            handle.cancel();
        });

        let result = h.workflow.run(&ids, &token(), &cancel).await;
        canceller.await.unwrap();

        assert!(matches!(
            result,
            Err(WorkflowError::Cancelled {
                phase: WorkflowPhase::AwaitSecondaryBalance
            })
        ));
        assert_eq!(h.relay.submitted().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_timeout_is_distinct_error() {
        let h = harness(PollSettings {
            timeout: Some(Duration::from_secs(5)),
            ..PollSettings::default()
        });
        let ids = identities();
        h.reader.set_token_balance(ids.second.pubkey(), ids.mint.pubkey(), 0);

        let result = h.workflow.run(&ids, &token(), &Cancellation::never()).await;
        assert!(matches!(result, Err(WorkflowError::PollTimedOut { .. })));
    }

    #[tokio::test]
    async fn test_first_bundle_rejection_stops_run() {
        let h = harness(PollSettings::default());
        h.relay.reject_next(403, "unauthorized");
        let ids = identities();

        let result = h.workflow.run(&ids, &token(), &Cancellation::never()).await;
        assert!(matches!(
            result,
            Err(WorkflowError::Build(
                crate::tx_builder::TransactionBuilderError::RelayRejected { status: 403, .. }
            ))
        ));
        assert_eq!(h.reader.balance_reads(), 0);
    }

    #[test]
    fn test_settings_from_config() {
        let settings = LaunchSettings::from_config(&Config::default());
        assert_eq!(settings.dev_buy_lamports, 100_000);
        assert_eq!(settings.rebuy_max_lamports, 50_000_000_000);
        assert_eq!(settings.slippage_bps, 500);
    }
}
