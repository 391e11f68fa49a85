//! Launch and liquidation workflows
//!
//! The launch runs four linear phases:
//!
//! ```text
//! CreateAndSeedBuy -> AwaitSecondaryBalance -> SecondarySellAndRebuy -> Done
//! ```
//!
//! Each bundle is atomic on its own. The run as a whole is not: when the
//! second bundle fails after the first landed, nothing is rolled back.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use solana_sdk::{pubkey::Pubkey, signature::Keypair, signer::Signer};
use thiserror::Error;

use crate::metadata::MetadataError;
use crate::retry::{Cancellation, PollError};
use crate::rpc_manager::RpcManagerError;
use crate::tx_builder::TransactionBuilderError;
use crate::wallet::{WalletError, WalletRole, WalletStore};

pub mod funding;
pub mod launch;
pub mod report;
pub mod sell_all;

pub use funding::{create_and_fund_wallet, distribute_sol};
pub use launch::{LaunchReport, LaunchSettings, LaunchWorkflow};
pub use report::{balance_report, WalletBalance};
pub use sell_all::{SellAllOutcome, SellAllWorkflow};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkflowPhase {
    CreateAndSeedBuy,
    AwaitSecondaryBalance,
    SecondarySellAndRebuy,
    Done,
}

impl WorkflowPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowPhase::CreateAndSeedBuy => "create_and_seed_buy",
            WorkflowPhase::AwaitSecondaryBalance => "await_secondary_balance",
            WorkflowPhase::SecondarySellAndRebuy => "secondary_sell_and_rebuy",
            WorkflowPhase::Done => "done",
        }
    }

    pub fn next(&self) -> Option<WorkflowPhase> {
        match self {
            WorkflowPhase::CreateAndSeedBuy => Some(WorkflowPhase::AwaitSecondaryBalance),
            WorkflowPhase::AwaitSecondaryBalance => Some(WorkflowPhase::SecondarySellAndRebuy),
            WorkflowPhase::SecondarySellAndRebuy => Some(WorkflowPhase::Done),
            WorkflowPhase::Done => None,
        }
    }
}

impl fmt::Display for WorkflowPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

#[derive(Error, Debug)]
pub enum WorkflowError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Wallet error: {0}")]
    Wallet(#[from] WalletError),

    #[error("Metadata error: {0}")]
    Metadata(#[from] MetadataError),

    #[error(transparent)]
    Build(#[from] TransactionBuilderError),

    #[error("Network error: {0}")]
    Network(#[from] RpcManagerError),

    #[error("Condition not met within {waited:?} after {attempts} checks")]
    PollTimedOut { waited: Duration, attempts: u32 },

    #[error("Cancelled during {phase}")]
    Cancelled { phase: WorkflowPhase },
}

impl WorkflowError {
    /// Whether the retry policy should try the failed step again.
    pub fn is_retryable(&self) -> bool {
        match self {
            WorkflowError::Network(e) => e.is_retryable(),
            WorkflowError::Build(e) => e.is_retryable(),
            WorkflowError::Metadata(MetadataError::Http(_)) => true,
            _ => false,
        }
    }

    /// Maps a poll failure observed in `phase`.
    pub fn from_poll(error: PollError, phase: WorkflowPhase) -> Self {
        match error {
            PollError::TimedOut { waited, attempts } => {
                WorkflowError::PollTimedOut { waited, attempts }
            }
            PollError::Cancelled { .. } => WorkflowError::Cancelled { phase },
        }
    }
}

/// The four keypairs a launch needs
pub struct LaunchIdentities {
    pub creator: Keypair,
    pub second: Keypair,
    pub third: Keypair,
    pub mint: Keypair,
}

impl LaunchIdentities {
    pub fn load(store: &dyn WalletStore) -> Result<Self, WorkflowError> {
        Ok(Self {
            creator: store.load(WalletRole::Creator)?,
            second: store.load(WalletRole::Second)?,
            third: store.load(WalletRole::Third)?,
            mint: store.load(WalletRole::Mint)?,
        })
    }

    pub fn mint_address(&self) -> Pubkey {
        self.mint.pubkey()
    }
}

/// Runs `fut` unless `cancel` fires first.
pub(crate) async fn cancellable<T, E, F>(
    cancel: &Cancellation,
    phase: WorkflowPhase,
    fut: F,
) -> Result<T, WorkflowError>
where
    F: Future<Output = Result<T, E>>,
    WorkflowError: From<E>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(WorkflowError::Cancelled { phase }),
        result = fut => result.map_err(WorkflowError::from),
    }
}
