//! Pre-submission simulation
//!
//! Every transaction of a bundle is simulated concurrently against current
//! chain state. Transactions later in a bundle may depend on earlier ones
//! (a buy of a mint created by the first transaction), so by default a
//! failed simulation is only logged and counted.

use futures::future::try_join_all;
use tracing::{debug, warn};

use crate::metrics::metrics;
use crate::rpc_manager::ChainReader;
use crate::tx_builder::errors::TransactionBuilderError;
use crate::tx_builder::output::TxBuildOutput;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SimulationPolicy {
    /// Fail the whole bundle when any transaction fails to simulate
    pub abort_on_failure: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulationFailure {
    pub index: usize,
    pub label: String,
    pub error: String,
    pub logs: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct SimulationReport {
    pub simulated: usize,
    pub failures: Vec<SimulationFailure>,
}

impl SimulationReport {
    pub fn all_passed(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Simulates `transactions` and applies `policy` to the failures.
///
/// RPC errors are not simulation failures and are returned as
/// [`TransactionBuilderError::Rpc`] regardless of policy.
pub async fn simulate_all(
    reader: &dyn ChainReader,
    transactions: &[TxBuildOutput],
    policy: SimulationPolicy,
) -> Result<SimulationReport, TransactionBuilderError> {
    let outcomes = try_join_all(transactions.iter().map(|t| reader.simulate(&t.tx))).await?;

    let mut report = SimulationReport {
        simulated: outcomes.len(),
        failures: Vec::new(),
    };

    for (index, (output, outcome)) in transactions.iter().zip(outcomes).enumerate() {
        match outcome.err {
            None => debug!(
                label = %output.label,
                units = ?outcome.units_consumed,
                "Simulation passed"
            ),
            Some(error) => {
                metrics().simulation_failures.inc();
                warn!(
                    label = %output.label,
                    index,
                    error = %error,
                    abort = policy.abort_on_failure,
                    "Simulation failed"
                );
                report.failures.push(SimulationFailure {
                    index,
                    label: output.label.clone(),
                    error,
                    logs: outcome.logs,
                });
            }
        }
    }

    if policy.abort_on_failure {
        if let Some(first) = report.failures.first() {
            return Err(TransactionBuilderError::simulation_failed(format!(
                "{} (transaction {} '{}')",
                first.error, first.index, first.label
            )));
        }
    }

    Ok(report)
}
