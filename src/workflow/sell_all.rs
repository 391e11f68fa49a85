//! Liquidate every wallet's position in one mint with a single bundle.

use std::sync::Arc;

use futures::future::try_join_all;
use solana_sdk::{pubkey::Pubkey, signature::Keypair, signer::Signer};
use tracing::info;

use crate::observability::TraceContext;
use crate::rpc_manager::{ChainReader, RpcManagerError};
use crate::tx_builder::{BundleReceipt, RelaySubmitter, SellAmount, SellLeg, TxBuilder};
use crate::workflow::WorkflowError;

/// SOL the treasury must hold beyond the tip to be chosen as fee payer.
pub const PAYER_FEE_RESERVE_LAMPORTS: u64 = 1_000_000;

#[derive(Debug)]
pub enum SellAllOutcome {
    /// No wallet holds the token; nothing was built or sent
    NothingToSell,
    Submitted {
        sellers: Vec<Pubkey>,
        payer: Pubkey,
        receipt: BundleReceipt,
    },
}

pub struct SellAllWorkflow {
    reader: Arc<dyn ChainReader>,
    builder: Arc<TxBuilder>,
    submitter: Arc<RelaySubmitter>,
}

impl SellAllWorkflow {
    pub fn new(
        reader: Arc<dyn ChainReader>,
        builder: Arc<TxBuilder>,
        submitter: Arc<RelaySubmitter>,
    ) -> Self {
        Self {
            reader,
            builder,
            submitter,
        }
    }

    /// Sells the whole balance of every holder and closes their token accounts.
    ///
    /// `treasury` pays fees and the tip when it holds enough SOL, otherwise
    /// the first holder with a balance does.
    pub async fn run(
        &self,
        mint: &Pubkey,
        treasury: &Keypair,
        holders: &[&Keypair],
    ) -> Result<SellAllOutcome, WorkflowError> {
        let balances = try_join_all(holders.iter().map(|holder| async move {
            match self.reader.token_balance(&holder.pubkey(), mint).await {
                Ok(balance) => Ok(balance),
                Err(e) if e.is_account_not_found() => Ok(0),
                Err(e) => Err::<u64, RpcManagerError>(e),
            }
        }))
        .await?;

        let funded: Vec<&Keypair> = holders
            .iter()
            .zip(&balances)
            .filter(|(_, balance)| **balance > 0)
            .map(|(holder, balance)| {
                info!(owner = %holder.pubkey(), tokens = balance, "Holder found");
                *holder
            })
            .collect();

        let Some(first_funded) = funded.first().copied() else {
            info!(mint = %mint, "No wallets hold tokens");
            return Ok(SellAllOutcome::NothingToSell);
        };

        let treasury_sol = self.reader.sol_balance(&treasury.pubkey()).await?;
        let payer = if treasury_sol
            >= self.submitter.tip_lamports().saturating_add(PAYER_FEE_RESERVE_LAMPORTS)
        {
            treasury
        } else {
            info!(
                treasury = %treasury.pubkey(),
                lamports = treasury_sol,
                "Treasury cannot cover fees, using first holder"
            );
            first_funded
        };

        let creator = self.builder.resolve_creator(mint).await?;
        let legs: Vec<SellLeg> = funded
            .iter()
            .map(|wallet| SellLeg {
                wallet: *wallet,
                amount: SellAmount::All,
            })
            .collect();

        let blockhash = self.reader.latest_blockhash().await?;
        let Some(sell_tx) = self
            .builder
            .multi_sell(mint, &creator, &legs, Some(payer), blockhash)
            .await?
        else {
            return Ok(SellAllOutcome::NothingToSell);
        };

        let receipt = self
            .submitter
            .send_bundle(vec![sell_tx], payer, &TraceContext::new("sell_all"))
            .await?;

        Ok(SellAllOutcome::Submitted {
            sellers: funded.iter().map(|w| w.pubkey()).collect(),
            payer: payer.pubkey(),
            receipt,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::BONDING_CURVE_DISCRIMINATOR;
    use crate::test_utils::{MockBundler, MockChainReader};
    use crate::tx_builder::instructions::bonding_curve_pda;
    use crate::tx_builder::{BundleBuilder, SimulationPolicy, TipConfig, TxBuilderConfig};

    fn workflow(reader: Arc<MockChainReader>, relay: Arc<MockBundler>) -> SellAllWorkflow {
        let builder = Arc::new(TxBuilder::new(reader.clone(), TxBuilderConfig::default()));
        let submitter = Arc::new(RelaySubmitter::new(
            reader.clone(),
            BundleBuilder::new(reader.clone(), TipConfig::default()),
            relay,
            SimulationPolicy::default(),
        ));
        SellAllWorkflow::new(reader, builder, submitter)
    }

    fn with_curve(reader: &MockChainReader, mint: &Pubkey) {
        let mut data = BONDING_CURVE_DISCRIMINATOR.to_vec();
        data.extend_from_slice(&[0u8; 41]);
        data.extend_from_slice(Pubkey::new_unique().as_ref());
        reader.set_account_data(bonding_curve_pda(mint), data);
    }

    #[tokio::test]
    async fn test_nothing_to_sell_is_not_an_error() {
        let reader = Arc::new(MockChainReader::new());
        let relay = Arc::new(MockBundler::new());
        let mint = Pubkey::new_unique();
        let (a, b) = (Keypair::new(), Keypair::new());
        reader.set_token_balance(a.pubkey(), mint, 0);

        let outcome = workflow(reader, relay.clone())
            .run(&mint, &a, &[&a, &b])
            .await
            .unwrap();
        assert!(matches!(outcome, SellAllOutcome::NothingToSell));
        assert!(relay.submitted().is_empty());
    }

    #[tokio::test]
    async fn test_treasury_pays_when_funded() {
        let reader = Arc::new(MockChainReader::new());
        let relay = Arc::new(MockBundler::new());
        let mint = Pubkey::new_unique();
        with_curve(&reader, &mint);
        let (treasury, a, b) = (Keypair::new(), Keypair::new(), Keypair::new());
        reader.set_sol_balance(treasury.pubkey(), 1_000_000_000);
        reader.set_token_balance(a.pubkey(), mint, 0);
        reader.set_token_balance(b.pubkey(), mint, 5);

        let outcome = workflow(reader, relay.clone())
            .run(&mint, &treasury, &[&treasury, &a, &b])
            .await
            .unwrap();

        match outcome {
            SellAllOutcome::Submitted {
                sellers,
                payer,
                receipt,
            } => {
                assert_eq!(sellers, vec![b.pubkey()]);
                assert_eq!(payer, treasury.pubkey());
                assert_eq!(receipt.entries, 2);
            }
            other => panic!("expected submission, got {other:?}"),
        }
        assert_eq!(relay.submitted().len(), 1);
    }

    #[tokio::test]
    async fn test_first_holder_pays_when_treasury_empty() {
        let reader = Arc::new(MockChainReader::new());
        let relay = Arc::new(MockBundler::new());
        let mint = Pubkey::new_unique();
        with_curve(&reader, &mint);
        let (treasury, a, b) = (Keypair::new(), Keypair::new(), Keypair::new());
        reader.set_token_balance(a.pubkey(), mint, 7);
        reader.set_token_balance(b.pubkey(), mint, 9);

        let outcome = workflow(reader, relay)
            .run(&mint, &treasury, &[&treasury, &a, &b])
            .await
            .unwrap();

        match outcome {
            SellAllOutcome::Submitted { sellers, payer, .. } => {
                assert_eq!(sellers, vec![a.pubkey(), b.pubkey()]);
                assert_eq!(payer, a.pubkey());
            }
            other => panic!("expected submission, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_balance_read_failure_propagates() {
        let reader = Arc::new(MockChainReader::new());
        let relay = Arc::new(MockBundler::new());
        let mint = Pubkey::new_unique();
        let a = Keypair::new();
        reader.script_token_balances(
            a.pubkey(),
            vec![Err(crate::test_utils::transport_error("down"))],
        );

        let result = workflow(reader, relay).run(&mint, &a, &[&a]).await;
        assert!(matches!(result, Err(WorkflowError::Network(_))));
    }
}
