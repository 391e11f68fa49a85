//! SOL balance report for the launch wallets.

use futures::future::try_join_all;
use solana_sdk::pubkey::Pubkey;

use crate::constants::lamports_to_sol;
use crate::rpc_manager::{ChainReader, RpcManagerError};
use crate::wallet::WalletRole;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WalletBalance {
    pub role: WalletRole,
    pub pubkey: Pubkey,
    pub lamports: u64,
}

impl WalletBalance {
    pub fn sol(&self) -> f64 {
        lamports_to_sol(self.lamports)
    }
}

impl std::fmt::Display for WalletBalance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:<8} {} {:.9} SOL", self.role, self.pubkey, self.sol())
    }
}

/// Reads every wallet's SOL balance concurrently, preserving input order.
pub async fn balance_report(
    reader: &dyn ChainReader,
    wallets: &[(WalletRole, Pubkey)],
) -> Result<Vec<WalletBalance>, RpcManagerError> {
    try_join_all(wallets.iter().map(|&(role, pubkey)| async move {
        let lamports = reader.sol_balance(&pubkey).await?;
        Ok::<_, RpcManagerError>(WalletBalance {
            role,
            pubkey,
            lamports,
        })
    }))
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::MockChainReader;

    #[tokio::test]
    async fn test_report_order_and_amounts() {
        let reader = MockChainReader::new();
        let creator = Pubkey::new_unique();
        let second = Pubkey::new_unique();
        reader.set_sol_balance(creator, 1_500_000_000);

        let report = balance_report(
            &reader,
            &[(WalletRole::Creator, creator), (WalletRole::Second, second)],
        )
        .await
        .unwrap();

        assert_eq!(report.len(), 2);
        assert_eq!(report[0].role, WalletRole::Creator);
        assert_eq!(report[0].sol(), 1.5);
        assert_eq!(report[1].lamports, 0);
        assert!(report[0].to_string().contains("1.500000000 SOL"));
    }
}
