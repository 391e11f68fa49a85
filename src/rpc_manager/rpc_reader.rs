use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use solana_client::{
    client_error::ClientError, nonblocking::rpc_client::RpcClient,
    rpc_config::RpcSimulateTransactionConfig,
};
use solana_sdk::{
    commitment_config::CommitmentConfig, hash::Hash, pubkey::Pubkey, signature::Signature,
    transaction::VersionedTransaction,
};
use spl_associated_token_account::get_associated_token_address;
use tracing::debug;

use super::{ChainReader, RpcManagerError, SimulationOutcome};

/// [`ChainReader`] backed by a single nonblocking `RpcClient`.
#[derive(Clone)]
pub struct RpcChainReader {
    client: Arc<RpcClient>,
    endpoint: String,
    commitment: CommitmentConfig,
}

impl RpcChainReader {
    pub fn new(
        endpoint: impl Into<String>,
        commitment: CommitmentConfig,
        timeout: Duration,
    ) -> Self {
        let endpoint = endpoint.into();
        let client =
            RpcClient::new_with_timeout_and_commitment(endpoint.clone(), timeout, commitment);
        Self {
            client: Arc::new(client),
            endpoint,
            commitment,
        }
    }

    /// Parses a commitment name from configuration, defaulting to `confirmed`.
    pub fn parse_commitment(name: &str) -> Result<CommitmentConfig, RpcManagerError> {
        match name {
            "processed" => Ok(CommitmentConfig::processed()),
            "confirmed" | "" => Ok(CommitmentConfig::confirmed()),
            "finalized" => Ok(CommitmentConfig::finalized()),
            other => Err(RpcManagerError::Configuration(format!(
                "unknown commitment level '{other}'"
            ))),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn map_err(&self, account: Option<&Pubkey>) -> impl Fn(ClientError) -> RpcManagerError + '_ {
        let account = account.map(|a| a.to_string());
        move |e| RpcManagerError::from_client_error(e, &self.endpoint, account.as_deref())
    }
}

#[async_trait]
impl ChainReader for RpcChainReader {
    async fn latest_blockhash(&self) -> Result<Hash, RpcManagerError> {
        self.client.get_latest_blockhash().await.map_err(self.map_err(None))
    }

    async fn token_balance(&self, owner: &Pubkey, mint: &Pubkey) -> Result<u64, RpcManagerError> {
        let ata = get_associated_token_address(owner, mint);
        let amount = self
            .client
            .get_token_account_balance(&ata)
            .await
            .map_err(self.map_err(Some(&ata)))?;

        amount.amount.parse::<u64>().map_err(|e| {
            RpcManagerError::InvalidResponse(format!(
                "token amount '{}' for {ata}: {e}",
                amount.amount
            ))
        })
    }

    async fn sol_balance(&self, address: &Pubkey) -> Result<u64, RpcManagerError> {
        self.client
            .get_balance(address)
            .await
            .map_err(self.map_err(Some(address)))
    }

    async fn simulate(
        &self,
        tx: &VersionedTransaction,
    ) -> Result<SimulationOutcome, RpcManagerError> {
        let config = RpcSimulateTransactionConfig {
            sig_verify: false,
            commitment: Some(self.commitment),
            ..RpcSimulateTransactionConfig::default()
        };
        let response = self
            .client
            .simulate_transaction_with_config(tx, config)
            .await
            .map_err(self.map_err(None))?;

        let result = response.value;
        debug!(
            units = ?result.units_consumed,
            failed = result.err.is_some(),
            "Simulation completed"
        );

        Ok(SimulationOutcome {
            err: result.err.map(|e| format!("{e:?}")),
            logs: result.logs.unwrap_or_default(),
            units_consumed: result.units_consumed,
        })
    }

    async fn account_exists(&self, address: &Pubkey) -> Result<bool, RpcManagerError> {
        let response = self
            .client
            .get_account_with_commitment(address, self.commitment)
            .await
            .map_err(self.map_err(Some(address)))?;
        Ok(response.value.is_some())
    }

    async fn account_data(&self, address: &Pubkey) -> Result<Vec<u8>, RpcManagerError> {
        self.client
            .get_account_data(address)
            .await
            .map_err(self.map_err(Some(address)))
    }

    async fn send_and_confirm(
        &self,
        tx: &VersionedTransaction,
    ) -> Result<Signature, RpcManagerError> {
        self.client
            .send_and_confirm_transaction(tx)
            .await
            .map_err(self.map_err(None))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commitment() {
        assert_eq!(
            RpcChainReader::parse_commitment("finalized").unwrap(),
            CommitmentConfig::finalized()
        );
        assert_eq!(
            RpcChainReader::parse_commitment("").unwrap(),
            CommitmentConfig::confirmed()
        );
        assert!(matches!(
            RpcChainReader::parse_commitment("eventual"),
            Err(RpcManagerError::Configuration(_))
        ));
    }

    #[test]
    fn test_endpoint_is_kept() {
        let reader = RpcChainReader::new(
            "http://127.0.0.1:8899",
            CommitmentConfig::confirmed(),
            Duration::from_secs(5),
        );
        assert_eq!(reader.endpoint(), "http://127.0.0.1:8899");
    }
}
